use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{DistributedLockError, StoreError};
use crate::lockable::Lockable;
use crate::store::LockDataStore;
use crate::target::{LockTarget, TargetShape};
use crate::token::LockToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandleState {
    NotAcquired,
    Acquired,
    Disposed,
}

/// Client-side handle for one lock attempt.
///
/// The handle owns the token for the lock it holds and the record of which
/// root/nested identity it last locked; the underlying document stays
/// shared mutable state in the backing store. Handles carry no in-process
/// coordination state, so any number of them, on unrelated processes or
/// machines, may contend for the same target independently.
///
/// Lease refresh is entirely the caller's responsibility: the handle
/// provides [`refresh_lock`](Self::refresh_lock) but never schedules it.
pub struct DistributedLock<T, I, S>
where
    T: Lockable,
    I: Lockable,
{
    store: S,
    target: LockTarget<T, I>,
    stale_multiplier: NonZeroU32,
    state: HandleState,
    token: Option<LockToken>,
    locked_root_id: Option<T::Id>,
    locked_nested_id: Option<I::Id>,
}

impl<T, I, S> DistributedLock<T, I, S>
where
    T: Lockable,
    I: Lockable,
    S: LockDataStore<T, I>,
{
    /// Create a handle with the default stale multiplier of 1: a lock
    /// becomes reclaimable one full lease period after its last touch.
    pub fn new(store: S, target: LockTarget<T, I>) -> Self {
        Self::with_stale_multiplier(store, target, NonZeroU32::MIN)
    }

    /// Create a handle whose abandonment window is
    /// `lease × stale_multiplier`.
    pub fn with_stale_multiplier(
        store: S,
        target: LockTarget<T, I>,
        stale_multiplier: NonZeroU32,
    ) -> Self {
        Self {
            store,
            target,
            stale_multiplier,
            state: HandleState::NotAcquired,
            token: None,
            locked_root_id: None,
            locked_nested_id: None,
        }
    }

    pub fn lock_acquired(&self) -> bool {
        self.state == HandleState::Acquired
    }

    pub fn disposed(&self) -> bool {
        self.state == HandleState::Disposed
    }

    /// Token of the currently held lock.
    pub fn lock_token(&self) -> Option<LockToken> {
        self.token
    }

    /// Root document id of the currently held lock.
    pub fn locked_object_id(&self) -> Option<&T::Id> {
        self.locked_root_id.as_ref()
    }

    fn ensure_live(&self) -> Result<(), DistributedLockError> {
        if self.state == HandleState::Disposed {
            Err(DistributedLockError::Disposed)
        } else {
            Ok(())
        }
    }

    /// Attempt to take the lock on `root`, or on `element` inside it.
    ///
    /// Valid only while no lock is held. `element` names the collection
    /// element to lock and is ignored for root and single-field targets.
    /// `Ok(None)` — lock currently held elsewhere and not yet stale, or
    /// target missing — is an expected outcome callers poll or fall back
    /// on, not an error. With a `timeout`, the attempt is retried on a
    /// fixed interval until the deadline.
    pub async fn acquire_lock(
        &mut self,
        root: &T,
        element: Option<&I>,
        timeout: Option<Duration>,
    ) -> Result<Option<I>, DistributedLockError> {
        self.ensure_live()?;
        if self.state == HandleState::Acquired {
            return Err(DistributedLockError::AlreadyAcquired);
        }
        let nested_id = match self.target.shape() {
            TargetShape::Collection => {
                Some(element.ok_or(DistributedLockError::TargetRequired)?.id())
            }
            TargetShape::Root | TargetShape::Single => None,
        };
        let root_id = root.id();
        let locked = self
            .store
            .acquire_lock(
                &root_id,
                &self.target,
                nested_id.as_ref(),
                self.stale_multiplier,
                timeout,
            )
            .await?;
        let Some(locked) = locked else {
            return Ok(None);
        };
        let Some(token) = locked.lock_id() else {
            return Err(
                StoreError::Backend("acquired snapshot carries no lock token".into()).into(),
            );
        };
        self.token = Some(token);
        self.locked_root_id = Some(root_id);
        self.locked_nested_id = nested_id;
        self.state = HandleState::Acquired;
        Ok(Some(locked))
    }

    /// Re-assert the held lock.
    ///
    /// `Ok(false)` means the lock was lost (or none is held). The handle
    /// deliberately stays in its current state; the caller decides whether
    /// to release or dispose.
    pub async fn refresh_lock(&mut self) -> Result<bool, DistributedLockError> {
        self.ensure_live()?;
        let (Some(token), Some(root_id)) = (self.token, self.locked_root_id.as_ref()) else {
            return Ok(false);
        };
        Ok(self
            .store
            .refresh_lock(root_id, &self.target, self.locked_nested_id.as_ref(), token)
            .await?)
    }

    /// Strict refresh: an observed loss of the lock becomes
    /// [`DistributedLockError::RefreshFailed`] carrying the locked identity.
    pub async fn ensure_refreshed(&mut self) -> Result<(), DistributedLockError> {
        if self.refresh_lock().await? {
            Ok(())
        } else {
            Err(DistributedLockError::RefreshFailed {
                target: self.target_description(),
            })
        }
    }

    /// Give the lock back.
    ///
    /// Whatever the remote outcome, the handle forgets its token and
    /// returns to the unacquired state: after a failed or raced release it
    /// can no longer assume ownership. A release without a held lock
    /// returns `Ok(false)`.
    pub async fn release_lock(&mut self) -> Result<bool, DistributedLockError> {
        self.ensure_live()?;
        let (Some(token), Some(root_id)) = (self.token, self.locked_root_id.take()) else {
            return Ok(false);
        };
        let released = self
            .store
            .release_lock(&root_id, &self.target, self.locked_nested_id.as_ref(), token)
            .await;
        self.token = None;
        self.locked_nested_id = None;
        self.state = HandleState::NotAcquired;
        Ok(released?)
    }

    /// Fetch a detached copy of the locked value, `None` when no lock is
    /// held or the token no longer matches.
    ///
    /// The copy may be observably newer than the snapshot seen at
    /// acquisition time; the token match is the only isolation guarantee.
    pub async fn get_object(&self) -> Result<Option<I>, DistributedLockError> {
        self.ensure_live()?;
        let (Some(token), Some(root_id)) = (self.token, self.locked_root_id.as_ref()) else {
            return Ok(None);
        };
        Ok(self
            .store
            .get_locked_object(root_id, &self.target, self.locked_nested_id.as_ref(), token)
            .await?)
    }

    /// Like [`get_object`](Self::get_object), but an unacquired handle is a
    /// caller error rather than `None`.
    pub async fn expect_object(&self) -> Result<Option<I>, DistributedLockError> {
        self.ensure_live()?;
        if self.state != HandleState::Acquired {
            return Err(DistributedLockError::NotAcquired);
        }
        self.get_object().await
    }

    /// Best-effort release followed by retiring the handle.
    ///
    /// A failed release is swallowed: the lease will simply lapse and the
    /// lock becomes reclaimable once stale. Disposal is idempotent, and
    /// every other operation on a disposed handle fails with
    /// [`DistributedLockError::Disposed`].
    pub async fn dispose(&mut self) {
        if self.state == HandleState::Acquired {
            if let Err(err) = self.release_lock().await {
                debug!(error = %err, "best-effort release during dispose failed");
            }
        }
        self.state = HandleState::Disposed;
    }

    fn target_description(&self) -> String {
        match (&self.locked_root_id, &self.locked_nested_id) {
            (Some(root_id), Some(nested_id)) => format!("{root_id}/{nested_id}"),
            (Some(root_id), None) => root_id.to_string(),
            _ => "unacquired handle".to_string(),
        }
    }
}

impl<T, I, S> fmt::Display for DistributedLock<T, I, S>
where
    T: Lockable,
    I: Lockable,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.state, self.token, &self.locked_root_id) {
            (HandleState::Acquired, Some(token), Some(root_id)) => {
                write!(f, "LockId: {token}, Locked ObjectId: {root_id}.")
            }
            _ => write!(f, "No lock acquired."),
        }
    }
}

impl<T, I, S> Drop for DistributedLock<T, I, S>
where
    T: Lockable,
    I: Lockable,
{
    fn drop(&mut self) {
        if self.state == HandleState::Acquired {
            warn!(
                lock = %self,
                "lock handle dropped while still held; the lease will lapse without release"
            );
        }
    }
}
