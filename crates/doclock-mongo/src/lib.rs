//! MongoDB adapter for doclock.
//!
//! Lock operations become single `findOneAndUpdate` / `findOne` calls whose
//! filters and updates are built per target shape, so the at-most-one-winner
//! guarantee is exactly MongoDB's single-document atomicity.
//!
//! Documents in the collection must follow the lock field contract:
//! - the root id serializes under `_id`, nested element ids under `id`
//! - `lock_id` serializes as the token's hyphenated string (the
//!   [`doclock_core::LockToken`] serde impl already does this), or null
//! - `lock_time` serializes as epoch milliseconds; annotate the field with
//!   `#[serde(with = "chrono::serde::ts_milliseconds_option")]`
//!
//! Millisecond integers keep the staleness range filter well-ordered in
//! BSON regardless of the server's extended-JSON handling of dates.

mod query;
mod store;

pub use query::{ELEMENT_ID_FIELD, LOCK_ID_FIELD, LOCK_TIME_FIELD, ROOT_ID_FIELD};
pub use store::MongoLockStore;
