use thiserror::Error;

/// Errors surfaced by lock handles.
///
/// Contention ("lock unavailable" / "lock lost") is never an error; the
/// operations report it as `Ok(None)` or `Ok(false)`.
#[derive(Error, Debug)]
pub enum DistributedLockError {
    /// An operation that requires a held lock ran on an unacquired handle.
    #[error("no lock acquired")]
    NotAcquired,

    /// `acquire_lock` was called while the handle already holds a lock.
    #[error("lock already acquired")]
    AlreadyAcquired,

    /// A collection target was addressed without naming the element to lock.
    #[error("collection targets require the element to lock")]
    TargetRequired,

    /// The handle was disposed; no further operations are permitted.
    #[error("lock handle disposed")]
    Disposed,

    /// A strict refresh observed that the lock is no longer held.
    #[error("failed to refresh lock on {target}")]
    RefreshFailed { target: String },

    /// Infrastructure failure from the backing store, propagated unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Infrastructure failures reported by store adapters.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failure talking to the backing store.
    #[error("store connection error: {0}")]
    Connection(String),

    /// Conversion failure between documents and the store's data model.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The adapter observed a request or response it cannot represent.
    #[error("store error: {0}")]
    Backend(String),
}
