//! 유닛 디렉토리 단위 직렬화
//!
//! 같은 유닛 디렉토리를 사용하는 두 시나리오는 상태 파일을 공유하므로
//! 동시에 실행될 수 없습니다. [`UnitLocks`]는 경로별 비동기 뮤텍스를 관리하여
//! 서로 다른 유닛은 병렬로, 같은 유닛은 순서대로 실행되게 합니다.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// 유닛 경로별 락 레지스트리
///
/// 항목은 제거하지 않습니다. 크기는 실행 중 사용된 서로 다른 유닛 수로 제한됩니다.
#[derive(Debug, Clone, Default)]
pub struct UnitLocks {
    inner: Arc<std::sync::Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>>,
}

impl UnitLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 유닛 락을 획득합니다. 가드가 drop 될 때 해제됩니다.
    ///
    /// 경로는 정규화하여 비교합니다. 정규화할 수 없으면 주어진 경로 그대로 사용합니다.
    pub async fn lock(&self, unit_path: &Path) -> OwnedMutexGuard<()> {
        let key = tokio::fs::canonicalize(unit_path)
            .await
            .unwrap_or_else(|_| unit_path.to_path_buf());
        let mutex = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(key).or_default())
        };
        mutex.lock_owned().await
    }

    /// 등록된 유닛 수
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
