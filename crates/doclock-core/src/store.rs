use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};

use crate::error::StoreError;
use crate::lockable::Lockable;
use crate::target::LockTarget;
use crate::token::LockToken;

/// Interval between attempts while acquiring with a timeout.
pub const ACQUIRE_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Atomic lock operations against one backing collection.
///
/// Implementations are bound at construction to a collection handle and a
/// lease duration. Correctness rests entirely on each mutating operation
/// being a single atomic conditional find-and-modify in the backing store:
/// of N concurrent acquire attempts racing for the same unlocked-or-stale
/// target, exactly one may observe success. No in-process coordination
/// state exists beyond that.
///
/// Operations are plain futures; dropping one abandons the pending store
/// call without partial effects, because the underlying atomic operation
/// either completed or never started.
#[async_trait]
pub trait LockDataStore<T: Lockable, I: Lockable>: Send + Sync {
    /// The lease duration: how long a lock stays fresh without refresh.
    fn lease_time(&self) -> Duration;

    /// One atomic conditional acquire attempt.
    ///
    /// Matches the root document with `root_id` whose target entity is
    /// currently unlocked, or stale (last touched at least
    /// `lease_time × stale_multiplier` ago), stamps a freshly generated
    /// token and the current time onto it, and returns the post-update
    /// target snapshot. `None` means nothing matched: the lock is held by
    /// someone else, the root document is missing, or the collection
    /// element is missing. All three are the same non-exceptional outcome.
    async fn try_acquire_lock(
        &self,
        root_id: &T::Id,
        target: &LockTarget<T, I>,
        nested_id: Option<&I::Id>,
        stale_multiplier: NonZeroU32,
    ) -> Result<Option<I>, StoreError>;

    /// Acquire with optional polling.
    ///
    /// Without a timeout this is exactly one attempt. With one, the single
    /// atomic attempt is retried on a fixed short interval until it
    /// succeeds or the deadline passes, and `None` is reported then. Only
    /// the contention outcome is retried; infrastructure errors propagate
    /// immediately.
    async fn acquire_lock(
        &self,
        root_id: &T::Id,
        target: &LockTarget<T, I>,
        nested_id: Option<&I::Id>,
        stale_multiplier: NonZeroU32,
        timeout: Option<Duration>,
    ) -> Result<Option<I>, StoreError> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        loop {
            if let Some(locked) = self
                .try_acquire_lock(root_id, target, nested_id, stale_multiplier)
                .await?
            {
                return Ok(Some(locked));
            }
            match deadline {
                Some(deadline) if Instant::now() + ACQUIRE_POLL_INTERVAL <= deadline => {
                    sleep(ACQUIRE_POLL_INTERVAL).await;
                }
                _ => return Ok(None),
            }
        }
    }

    /// Re-assert a held lock, stamping its `lock_time` to now.
    ///
    /// `false` means the caller no longer holds the lock: released,
    /// reclaimed after going stale, or the root document is gone. Never
    /// treated as fatal at this layer.
    async fn refresh_lock(
        &self,
        root_id: &T::Id,
        target: &LockTarget<T, I>,
        nested_id: Option<&I::Id>,
        token: LockToken,
    ) -> Result<bool, StoreError>;

    /// Clear both lock fields in one atomic update, provided `token` still
    /// matches the stored one.
    async fn release_lock(
        &self,
        root_id: &T::Id,
        target: &LockTarget<T, I>,
        nested_id: Option<&I::Id>,
        token: LockToken,
    ) -> Result<bool, StoreError>;

    /// Read-only fetch of the locked value, provided `token` still matches.
    /// Does not mutate lock state.
    async fn get_locked_object(
        &self,
        root_id: &T::Id,
        target: &LockTarget<T, I>,
        nested_id: Option<&I::Id>,
        token: LockToken,
    ) -> Result<Option<I>, StoreError>;
}
