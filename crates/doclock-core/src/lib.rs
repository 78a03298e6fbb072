//! Optimistic distributed locking over document stores.
//!
//! Independent processes coordinate exclusive access to a document, or to a
//! sub-object nested inside one, through conditional updates on the
//! document's own lock fields rather than a dedicated lock service:
//! - `Lockable`: the capability contract for lock targets (identity + lock state)
//! - `LockTarget`: root document, single nested field, or collection element
//! - `LockDataStore`: atomic acquire/refresh/release/read operations per backend
//! - `DistributedLock`: the per-attempt client handle state machine
//!
//! Store adapters live in their own crates (`doclock-memory`, `doclock-mongo`).

mod error;
mod lock;
mod lockable;
mod store;
mod target;
mod token;

pub use error::{DistributedLockError, StoreError};
pub use lock::DistributedLock;
pub use lockable::Lockable;
pub use store::{LockDataStore, ACQUIRE_POLL_INTERVAL};
pub use target::{LockTarget, TargetShape};
pub use token::LockToken;
