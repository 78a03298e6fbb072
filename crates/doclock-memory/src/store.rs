use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use doclock_core::{LockDataStore, LockTarget, LockToken, Lockable, StoreError};
use tracing::{debug, instrument};

/// Lock data store backed by a mutex-guarded document map.
///
/// Every operation is one critical section over the map, which supplies the
/// same "single atomic conditional find-and-modify" guarantee the real
/// document stores provide. Clones share the map, so any number of handles
/// and tasks can contend over one store instance.
#[derive(Clone)]
pub struct MemoryLockStore<T: Lockable> {
    docs: Arc<Mutex<HashMap<T::Id, T>>>,
    lease: Duration,
}

impl<T: Lockable> MemoryLockStore<T> {
    /// Create a store with the given lease duration.
    pub fn new(lease: Duration) -> Self {
        Self {
            docs: Arc::new(Mutex::new(HashMap::new())),
            lease,
        }
    }

    /// Insert or replace a document.
    pub fn insert(&self, doc: T) {
        self.docs.lock().unwrap().insert(doc.id(), doc);
    }

    /// Detached copy of a stored document.
    pub fn find(&self, id: &T::Id) -> Option<T> {
        self.docs.lock().unwrap().get(id).cloned()
    }

    /// Remove a document entirely.
    pub fn remove(&self, id: &T::Id) -> Option<T> {
        self.docs.lock().unwrap().remove(id)
    }

    fn is_stale(lock_time: DateTime<Utc>, threshold: Duration) -> bool {
        let age = Utc::now()
            .signed_duration_since(lock_time)
            .to_std()
            .unwrap_or(Duration::ZERO);
        age >= threshold
    }
}

#[async_trait]
impl<T, I> LockDataStore<T, I> for MemoryLockStore<T>
where
    T: Lockable,
    I: Lockable,
{
    fn lease_time(&self) -> Duration {
        self.lease
    }

    #[instrument(skip(self, target), level = "debug")]
    async fn try_acquire_lock(
        &self,
        root_id: &T::Id,
        target: &LockTarget<T, I>,
        nested_id: Option<&I::Id>,
        stale_multiplier: NonZeroU32,
    ) -> Result<Option<I>, StoreError> {
        let threshold = self.lease * stale_multiplier.get();
        let mut docs = self.docs.lock().unwrap();
        let Some(root) = docs.get_mut(root_id) else {
            debug!(%root_id, "acquire matched nothing: root document not found");
            return Ok(None);
        };
        let Some(entity) = target.resolve_mut(root, nested_id) else {
            debug!(%root_id, ?nested_id, "acquire matched nothing: target not present");
            return Ok(None);
        };
        let held = entity.lock_id().is_some();
        let stale = entity
            .lock_time()
            .is_some_and(|time| Self::is_stale(time, threshold));
        if held && !stale {
            debug!(%root_id, ?nested_id, "acquire matched nothing: lock held and fresh");
            return Ok(None);
        }
        let token = LockToken::generate();
        entity.set_lock(token, Utc::now());
        let snapshot = entity.clone();
        debug!(%root_id, ?nested_id, lock_id = %token, reclaimed = held, "lock acquired");
        Ok(Some(snapshot))
    }

    #[instrument(skip(self, target), level = "debug")]
    async fn refresh_lock(
        &self,
        root_id: &T::Id,
        target: &LockTarget<T, I>,
        nested_id: Option<&I::Id>,
        token: LockToken,
    ) -> Result<bool, StoreError> {
        let mut docs = self.docs.lock().unwrap();
        let refreshed = docs
            .get_mut(root_id)
            .and_then(|root| target.resolve_mut(root, nested_id))
            .filter(|entity| entity.lock_id() == Some(token))
            .map(|entity| entity.set_lock(token, Utc::now()))
            .is_some();
        debug!(%root_id, ?nested_id, lock_id = %token, refreshed, "refresh lock");
        Ok(refreshed)
    }

    #[instrument(skip(self, target), level = "debug")]
    async fn release_lock(
        &self,
        root_id: &T::Id,
        target: &LockTarget<T, I>,
        nested_id: Option<&I::Id>,
        token: LockToken,
    ) -> Result<bool, StoreError> {
        let mut docs = self.docs.lock().unwrap();
        let released = docs
            .get_mut(root_id)
            .and_then(|root| target.resolve_mut(root, nested_id))
            .filter(|entity| entity.lock_id() == Some(token))
            .map(|entity| entity.clear_lock())
            .is_some();
        debug!(%root_id, ?nested_id, lock_id = %token, released, "release lock");
        Ok(released)
    }

    #[instrument(skip(self, target), level = "debug")]
    async fn get_locked_object(
        &self,
        root_id: &T::Id,
        target: &LockTarget<T, I>,
        nested_id: Option<&I::Id>,
        token: LockToken,
    ) -> Result<Option<I>, StoreError> {
        let docs = self.docs.lock().unwrap();
        Ok(docs
            .get(root_id)
            .and_then(|root| target.resolve(root, nested_id))
            .filter(|entity| entity.lock_id() == Some(token))
            .cloned())
    }
}
