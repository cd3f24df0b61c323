//! One validation watch per dataset id.

use crate::error::FinetuneError;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use voxline_types::DatasetId;

/// Registry of datasets that currently have a task waiting on validation.
///
/// Uses `std::sync::Mutex`: the lock only guards set insert/remove and is
/// never held across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct ValidationWatches {
    active: Arc<Mutex<HashSet<DatasetId>>>,
}

impl ValidationWatches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the watch for `id`.
    ///
    /// Returns [`FinetuneError::AlreadyWatching`] if another guard for the
    /// same id is alive. The claim is released when the guard is dropped.
    pub fn acquire(&self, id: &DatasetId) -> Result<WatchGuard, FinetuneError> {
        if !self.lock().insert(id.clone()) {
            return Err(FinetuneError::AlreadyWatching(id.clone()));
        }
        Ok(WatchGuard {
            id: id.clone(),
            active: Arc::clone(&self.active),
        })
    }

    pub fn is_watching(&self, id: &DatasetId) -> bool {
        self.lock().contains(id)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<DatasetId>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Held while a validation watch is outstanding.
#[derive(Debug)]
pub struct WatchGuard {
    id: DatasetId,
    active: Arc<Mutex<HashSet<DatasetId>>>,
}

impl WatchGuard {
    pub fn dataset_id(&self) -> &DatasetId {
        &self.id
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        let mut active = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        active.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_watch_for_same_id_is_refused() {
        let watches = ValidationWatches::new();
        let id = DatasetId::new("ds-1").unwrap();

        let guard = watches.acquire(&id).unwrap();
        assert!(watches.is_watching(&id));
        assert!(matches!(
            watches.acquire(&id),
            Err(FinetuneError::AlreadyWatching(ref dup)) if *dup == id
        ));

        drop(guard);
        assert!(!watches.is_watching(&id));
        assert!(watches.acquire(&id).is_ok());
    }

    #[test]
    fn different_ids_do_not_conflict() {
        let watches = ValidationWatches::new();
        let a = watches.acquire(&DatasetId::new("a").unwrap()).unwrap();
        let b = watches.clone().acquire(&DatasetId::new("b").unwrap()).unwrap();
        assert_eq!(a.dataset_id().as_str(), "a");
        assert_eq!(b.dataset_id().as_str(), "b");
    }
}
