use std::fmt::{Debug, Display};
use std::hash::Hash;

use chrono::{DateTime, Utc};

use crate::token::LockToken;

/// Capability contract for any value that can be a lock target.
///
/// Both root documents and nested sub-objects implement this. A root
/// document's id doubles as its store-level primary key and must be unique
/// collection-wide; a nested value's id only needs to be unique within its
/// parent's collection field.
///
/// `set_lock` and `clear_lock` are the only mutators of the lock fields, so
/// `lock_id` and `lock_time` are always either both set or both unset.
pub trait Lockable: Clone + Send + Sync + 'static {
    /// Store-comparable identity value.
    type Id: Clone + Eq + Hash + Debug + Display + Send + Sync + 'static;

    fn id(&self) -> Self::Id;

    /// Token of the current holder, `None` when unlocked.
    fn lock_id(&self) -> Option<LockToken>;

    /// When the lock was last (re)asserted, `None` when unlocked.
    fn lock_time(&self) -> Option<DateTime<Utc>>;

    fn set_lock(&mut self, token: LockToken, time: DateTime<Utc>);

    fn clear_lock(&mut self);
}
