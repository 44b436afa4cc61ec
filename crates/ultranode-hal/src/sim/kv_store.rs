use crate::error::StoreError;
use crate::ports::KvStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

struct Inner {
    map: HashMap<String, Vec<u8>>,
    fail_writes: bool,
}

/// In-memory NVS stand-in for hosted builds and tests. Cheaply `Clone`s to
/// a shared handle so a test can keep reading the store after handing a
/// boxed copy to something that takes ownership (the persistence writer
/// thread, for instance).
#[derive(Clone, Default)]
pub struct MemKvStore {
    inner: Arc<Mutex<Inner>>,
}

impl Default for Inner {
    fn default() -> Self { Self { map: HashMap::new(), fail_writes: false } }
}

impl MemKvStore {
    pub fn new() -> Self { Self::default() }

    /// Test hook: make the next `set`/`commit` fail, to exercise the
    /// persistence writer's re-mark-dirty-and-rearm path (§4.6, §7).
    pub fn set_fail_writes(&self, fail: bool) { self.inner.lock().fail_writes = fail; }
}

impl KvStore for MemKvStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> { Ok(self.inner.lock().map.get(key).cloned()) }

    fn set(&mut self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.fail_writes {
            return Err(StoreError::WriteFailed("simulated failure".to_string()));
        }
        inner.map.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        let inner = self.inner.lock();
        if inner.fail_writes {
            return Err(StoreError::CommitFailed("simulated failure".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_no_prior_state() {
        let store = MemKvStore::new();
        assert_eq!(store.get("ws0").unwrap(), None);
    }

    #[test]
    fn write_then_commit_persists() {
        let mut store = MemKvStore::new();
        store.set("ws0", b"hello").unwrap();
        store.commit().unwrap();
        assert_eq!(store.get("ws0").unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn fail_writes_surfaces_error() {
        let mut store = MemKvStore::new();
        store.set_fail_writes(true);
        assert!(store.set("ws0", b"x").is_err());
    }

    #[test]
    fn cloned_handle_observes_the_same_store() {
        let mut store = MemKvStore::new();
        let handle = store.clone();
        store.set("ws0", b"hello").unwrap();
        store.commit().unwrap();
        assert_eq!(handle.get("ws0").unwrap(), Some(b"hello".to_vec()));
    }
}
