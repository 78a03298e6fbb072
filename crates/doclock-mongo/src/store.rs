use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use doclock_core::{LockDataStore, LockTarget, LockToken, Lockable, StoreError, TargetShape};
use mongodb::bson::{self, Bson};
use mongodb::options::ReturnDocument;
use mongodb::Collection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::query::{self, QueryTarget};

/// Lock data store over one MongoDB collection.
///
/// Cheap to clone; clones share the underlying driver connection pool.
#[derive(Clone)]
pub struct MongoLockStore<T>
where
    T: Lockable + Serialize + DeserializeOwned,
{
    collection: Collection<T>,
    lease: Duration,
}

impl<T> MongoLockStore<T>
where
    T: Lockable + Serialize + DeserializeOwned,
{
    /// Bind a store to a collection and a lease duration.
    pub fn new(collection: Collection<T>, lease: Duration) -> Self {
        Self { collection, lease }
    }
}

fn to_bson<V: Serialize>(value: &V) -> Result<Bson, StoreError> {
    bson::to_bson(value).map_err(|err| StoreError::Serialization(err.to_string()))
}

fn driver_error(err: mongodb::error::Error) -> StoreError {
    StoreError::Connection(err.to_string())
}

fn query_target<'a, T, I>(
    target: &'a LockTarget<T, I>,
    nested_id: Option<&I::Id>,
) -> Result<QueryTarget<'a>, StoreError>
where
    T: Lockable,
    I: Lockable,
    I::Id: Serialize,
{
    match (target.shape(), target.path(), nested_id) {
        (TargetShape::Root, _, _) => Ok(QueryTarget::Root),
        (TargetShape::Single, Some(path), _) => Ok(QueryTarget::Field(path)),
        (TargetShape::Collection, Some(path), Some(nested_id)) => Ok(QueryTarget::Element {
            path,
            id: to_bson(nested_id)?,
        }),
        _ => Err(StoreError::Backend(
            "collection target addressed without an element id".into(),
        )),
    }
}

#[async_trait]
impl<T, I> LockDataStore<T, I> for MongoLockStore<T>
where
    T: Lockable + Serialize + DeserializeOwned,
    I: Lockable,
    T::Id: Serialize,
    I::Id: Serialize,
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
        let query_target = query_target(target, nested_id)?;
        let now = Utc::now();
        let stale_window = (self.lease * stale_multiplier.get()).as_millis() as i64;
        let cutoff_ms = now.timestamp_millis() - stale_window;

        let filter = query::acquire_filter(to_bson(root_id)?, &query_target, cutoff_ms);
        let token = LockToken::generate();
        let update = query::acquire_update(&query_target, &token, now.timestamp_millis());
        debug!(filter = %filter, update = %update, "acquire lock");

        let updated = self
            .collection
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(driver_error)?;
        Ok(updated.and_then(|root| target.resolve(&root, nested_id).cloned()))
    }

    #[instrument(skip(self, target), level = "debug")]
    async fn refresh_lock(
        &self,
        root_id: &T::Id,
        target: &LockTarget<T, I>,
        nested_id: Option<&I::Id>,
        token: LockToken,
    ) -> Result<bool, StoreError> {
        let query_target = query_target(target, nested_id)?;
        let filter = query::held_filter(to_bson(root_id)?, &query_target, &token);
        let update = query::refresh_update(&query_target, Utc::now().timestamp_millis());
        debug!(filter = %filter, update = %update, "refresh lock");

        let result = self
            .collection
            .update_one(filter, update)
            .await
            .map_err(driver_error)?;
        Ok(result.matched_count > 0)
    }

    #[instrument(skip(self, target), level = "debug")]
    async fn release_lock(
        &self,
        root_id: &T::Id,
        target: &LockTarget<T, I>,
        nested_id: Option<&I::Id>,
        token: LockToken,
    ) -> Result<bool, StoreError> {
        let query_target = query_target(target, nested_id)?;
        let filter = query::held_filter(to_bson(root_id)?, &query_target, &token);
        let update = query::release_update(&query_target);
        debug!(filter = %filter, update = %update, "release lock");

        let result = self
            .collection
            .update_one(filter, update)
            .await
            .map_err(driver_error)?;
        Ok(result.matched_count > 0)
    }

    #[instrument(skip(self, target), level = "debug")]
    async fn get_locked_object(
        &self,
        root_id: &T::Id,
        target: &LockTarget<T, I>,
        nested_id: Option<&I::Id>,
        token: LockToken,
    ) -> Result<Option<I>, StoreError> {
        let query_target = query_target(target, nested_id)?;
        let filter = query::held_filter(to_bson(root_id)?, &query_target, &token);
        debug!(filter = %filter, "get locked object");

        let found = self
            .collection
            .find_one(filter)
            .await
            .map_err(driver_error)?;
        Ok(found.and_then(|root| target.resolve(&root, nested_id).cloned()))
    }
}
