use crate::lockable::Lockable;

/// Which of the three lockable shapes a handle addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetShape {
    /// The root document's own lock fields.
    Root,
    /// One embedded value reachable at a dotted field path.
    Single,
    /// One element of a collection field, identified by its own id.
    Collection,
}

enum TargetKind<T, I> {
    Root {
        get: fn(&T) -> &I,
        get_mut: fn(&mut T) -> &mut I,
    },
    Single {
        path: &'static str,
        get: fn(&T) -> &I,
        get_mut: fn(&mut T) -> &mut I,
    },
    Collection {
        path: &'static str,
        get: fn(&T) -> &[I],
        get_mut: fn(&mut T) -> &mut [I],
    },
}

impl<T, I> Clone for TargetKind<T, I> {
    fn clone(&self) -> Self {
        match *self {
            Self::Root { get, get_mut } => Self::Root { get, get_mut },
            Self::Single { path, get, get_mut } => Self::Single { path, get, get_mut },
            Self::Collection { path, get, get_mut } => Self::Collection { path, get, get_mut },
        }
    }
}

/// Pure mapping from a root document to the specific value being locked.
///
/// Resolved once at handle construction and cached; adapters read the shape
/// and path to build their filter/update documents, and use the accessors to
/// project the target back out of returned root snapshots.
pub struct LockTarget<T, I> {
    kind: TargetKind<T, I>,
}

impl<T, I> Clone for LockTarget<T, I> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind.clone(),
        }
    }
}

impl<T: Lockable> LockTarget<T, T> {
    /// Lock the root document itself.
    pub fn root() -> Self {
        Self {
            kind: TargetKind::Root {
                get: |root| root,
                get_mut: |root| root,
            },
        }
    }
}

impl<T: Lockable, I: Lockable> LockTarget<T, I> {
    /// Lock the single embedded value reachable at `path`.
    pub fn single(path: &'static str, get: fn(&T) -> &I, get_mut: fn(&mut T) -> &mut I) -> Self {
        Self {
            kind: TargetKind::Single { path, get, get_mut },
        }
    }

    /// Lock one element of the collection field at `path`. Which element is
    /// decided per acquisition, by the element's own id.
    pub fn collection(
        path: &'static str,
        get: fn(&T) -> &[I],
        get_mut: fn(&mut T) -> &mut [I],
    ) -> Self {
        Self {
            kind: TargetKind::Collection { path, get, get_mut },
        }
    }

    pub fn shape(&self) -> TargetShape {
        match self.kind {
            TargetKind::Root { .. } => TargetShape::Root,
            TargetKind::Single { .. } => TargetShape::Single,
            TargetKind::Collection { .. } => TargetShape::Collection,
        }
    }

    /// Declared field path into the root document, `None` for the root shape.
    pub fn path(&self) -> Option<&'static str> {
        match self.kind {
            TargetKind::Root { .. } => None,
            TargetKind::Single { path, .. } | TargetKind::Collection { path, .. } => Some(path),
        }
    }

    /// Project the target value out of a root snapshot.
    ///
    /// Collection elements are looked up by `nested_id`; an id that is no
    /// longer present resolves to `None`, the same observable outcome as a
    /// lock held by someone else.
    pub fn resolve<'a>(&self, root: &'a T, nested_id: Option<&I::Id>) -> Option<&'a I> {
        match &self.kind {
            TargetKind::Root { get, .. } | TargetKind::Single { get, .. } => Some(get(root)),
            TargetKind::Collection { get, .. } => {
                let nested_id = nested_id?;
                get(root).iter().find(|element| element.id() == *nested_id)
            }
        }
    }

    /// Like [`resolve`](Self::resolve), but mutable. Used by adapters that
    /// mutate documents in process.
    pub fn resolve_mut<'a>(&self, root: &'a mut T, nested_id: Option<&I::Id>) -> Option<&'a mut I> {
        match &self.kind {
            TargetKind::Root { get_mut, .. } | TargetKind::Single { get_mut, .. } => {
                Some(get_mut(root))
            }
            TargetKind::Collection { get_mut, .. } => {
                let nested_id = nested_id?;
                get_mut(root)
                    .iter_mut()
                    .find(|element| element.id() == *nested_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::LockToken;
    use chrono::{DateTime, Utc};

    #[derive(Debug, Clone)]
    struct Valve {
        id: u32,
        lock_id: Option<LockToken>,
        lock_time: Option<DateTime<Utc>>,
    }

    impl Valve {
        fn new(id: u32) -> Self {
            Self {
                id,
                lock_id: None,
                lock_time: None,
            }
        }
    }

    impl Lockable for Valve {
        type Id = u32;

        fn id(&self) -> u32 {
            self.id
        }

        fn lock_id(&self) -> Option<LockToken> {
            self.lock_id
        }

        fn lock_time(&self) -> Option<DateTime<Utc>> {
            self.lock_time
        }

        fn set_lock(&mut self, token: LockToken, time: DateTime<Utc>) {
            self.lock_id = Some(token);
            self.lock_time = Some(time);
        }

        fn clear_lock(&mut self) {
            self.lock_id = None;
            self.lock_time = None;
        }
    }

    #[derive(Debug, Clone)]
    struct Rig {
        id: u32,
        lock_id: Option<LockToken>,
        lock_time: Option<DateTime<Utc>>,
        head: Valve,
        valves: Vec<Valve>,
    }

    impl Rig {
        fn new(id: u32) -> Self {
            Self {
                id,
                lock_id: None,
                lock_time: None,
                head: Valve::new(100),
                valves: vec![Valve::new(0), Valve::new(1), Valve::new(2)],
            }
        }
    }

    impl Lockable for Rig {
        type Id = u32;

        fn id(&self) -> u32 {
            self.id
        }

        fn lock_id(&self) -> Option<LockToken> {
            self.lock_id
        }

        fn lock_time(&self) -> Option<DateTime<Utc>> {
            self.lock_time
        }

        fn set_lock(&mut self, token: LockToken, time: DateTime<Utc>) {
            self.lock_id = Some(token);
            self.lock_time = Some(time);
        }

        fn clear_lock(&mut self) {
            self.lock_id = None;
            self.lock_time = None;
        }
    }

    #[test]
    fn root_resolves_to_the_document_itself() {
        let target = LockTarget::<Rig, Rig>::root();
        let rig = Rig::new(7);

        assert_eq!(target.shape(), TargetShape::Root);
        assert_eq!(target.path(), None);
        assert_eq!(target.resolve(&rig, None).map(|r| r.id()), Some(7));
    }

    #[test]
    fn single_resolves_the_embedded_field() {
        let target = LockTarget::single("head", |r: &Rig| &r.head, |r: &mut Rig| &mut r.head);
        let rig = Rig::new(7);

        assert_eq!(target.shape(), TargetShape::Single);
        assert_eq!(target.path(), Some("head"));
        assert_eq!(target.resolve(&rig, None).map(|v| v.id()), Some(100));
    }

    #[test]
    fn collection_resolves_elements_by_id() {
        let target =
            LockTarget::collection("valves", |r: &Rig| &r.valves, |r: &mut Rig| &mut r.valves);
        let mut rig = Rig::new(7);

        assert_eq!(target.shape(), TargetShape::Collection);
        assert_eq!(target.path(), Some("valves"));
        assert_eq!(target.resolve(&rig, Some(&1)).map(|v| v.id()), Some(1));
        assert!(target.resolve(&rig, Some(&99)).is_none());
        assert!(target.resolve(&rig, None).is_none());

        let token = LockToken::generate();
        target
            .resolve_mut(&mut rig, Some(&2))
            .unwrap()
            .set_lock(token, Utc::now());
        assert_eq!(rig.valves[2].lock_id, Some(token));
        assert!(rig.valves[0].lock_id.is_none());
    }
}
