//! In-process adapter for doclock.
//!
//! [`MemoryLockStore`] keeps documents in a mutex-guarded map and applies
//! the same conditional-update semantics a document store would, making it
//! suitable for single-process deployments and for exercising lock behavior
//! without a running database.

mod store;

pub use store::MemoryLockStore;
