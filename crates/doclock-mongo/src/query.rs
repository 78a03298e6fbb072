use doclock_core::LockToken;
use mongodb::bson::{doc, Bson, Document};

/// Field carrying the root document id.
pub const ROOT_ID_FIELD: &str = "_id";
/// Field carrying a collection element's own id.
pub const ELEMENT_ID_FIELD: &str = "id";
/// Field carrying the holder token, null when unlocked.
pub const LOCK_ID_FIELD: &str = "lock_id";
/// Field carrying the last-asserted time in epoch milliseconds, null when unlocked.
pub const LOCK_TIME_FIELD: &str = "lock_time";

/// Store-level rendering of a lock target: the document location the filter
/// and update address.
pub(crate) enum QueryTarget<'a> {
    Root,
    Field(&'a str),
    Element { path: &'a str, id: Bson },
}

/// Lock field paths as used in filters. Element filters go through
/// `$elemMatch`, so their paths are the bare field names.
fn filter_paths(target: &QueryTarget<'_>) -> (String, String) {
    match target {
        QueryTarget::Root | QueryTarget::Element { .. } => {
            (LOCK_ID_FIELD.to_string(), LOCK_TIME_FIELD.to_string())
        }
        QueryTarget::Field(path) => (
            format!("{path}.{LOCK_ID_FIELD}"),
            format!("{path}.{LOCK_TIME_FIELD}"),
        ),
    }
}

/// Lock field paths as used in updates. Element updates address exactly the
/// matched element through the positional operator, leaving siblings alone.
fn update_paths(target: &QueryTarget<'_>) -> (String, String) {
    match target {
        QueryTarget::Root => (LOCK_ID_FIELD.to_string(), LOCK_TIME_FIELD.to_string()),
        QueryTarget::Field(path) => (
            format!("{path}.{LOCK_ID_FIELD}"),
            format!("{path}.{LOCK_TIME_FIELD}"),
        ),
        QueryTarget::Element { path, .. } => (
            format!("{path}.$.{LOCK_ID_FIELD}"),
            format!("{path}.$.{LOCK_TIME_FIELD}"),
        ),
    }
}

/// Target is unlocked, or its last touch is at or before the staleness
/// cutoff.
fn acquirable_condition(lock_id_path: String, lock_time_path: String, cutoff_ms: i64) -> Bson {
    Bson::Array(vec![
        Bson::Document(doc! { lock_id_path: Bson::Null }),
        Bson::Document(doc! { lock_time_path: { "$lte": cutoff_ms } }),
    ])
}

pub(crate) fn acquire_filter(root_id: Bson, target: &QueryTarget<'_>, cutoff_ms: i64) -> Document {
    let (lock_id_path, lock_time_path) = filter_paths(target);
    let acquirable = acquirable_condition(lock_id_path, lock_time_path, cutoff_ms);
    match target {
        QueryTarget::Element { path, id } => doc! {
            ROOT_ID_FIELD: root_id,
            *path: {
                "$elemMatch": {
                    ELEMENT_ID_FIELD: id.clone(),
                    "$or": acquirable,
                }
            },
        },
        QueryTarget::Root | QueryTarget::Field(_) => doc! {
            ROOT_ID_FIELD: root_id,
            "$or": acquirable,
        },
    }
}

pub(crate) fn acquire_update(target: &QueryTarget<'_>, token: &LockToken, now_ms: i64) -> Document {
    let (lock_id_path, lock_time_path) = update_paths(target);
    doc! {
        "$set": {
            lock_id_path: token.to_string(),
            lock_time_path: now_ms,
        }
    }
}

/// Filter matching the target only while `token` is still the stored holder.
pub(crate) fn held_filter(root_id: Bson, target: &QueryTarget<'_>, token: &LockToken) -> Document {
    match target {
        QueryTarget::Element { path, id } => doc! {
            ROOT_ID_FIELD: root_id,
            *path: {
                "$elemMatch": {
                    ELEMENT_ID_FIELD: id.clone(),
                    LOCK_ID_FIELD: token.to_string(),
                }
            },
        },
        QueryTarget::Root | QueryTarget::Field(_) => {
            let (lock_id_path, _) = filter_paths(target);
            doc! {
                ROOT_ID_FIELD: root_id,
                lock_id_path: token.to_string(),
            }
        }
    }
}

pub(crate) fn refresh_update(target: &QueryTarget<'_>, now_ms: i64) -> Document {
    let (_, lock_time_path) = update_paths(target);
    doc! {
        "$set": { lock_time_path: now_ms }
    }
}

pub(crate) fn release_update(target: &QueryTarget<'_>) -> Document {
    let (lock_id_path, lock_time_path) = update_paths(target);
    doc! {
        "$set": {
            lock_id_path: Bson::Null,
            lock_time_path: Bson::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element_target() -> QueryTarget<'static> {
        QueryTarget::Element {
            path: "parcels",
            id: Bson::String("p0".to_string()),
        }
    }

    #[test]
    fn acquire_filter_for_root() {
        let filter = acquire_filter(Bson::String("ship-1".into()), &QueryTarget::Root, 1_000);
        assert_eq!(
            filter,
            doc! {
                "_id": "ship-1",
                "$or": [
                    { "lock_id": Bson::Null },
                    { "lock_time": { "$lte": 1_000i64 } },
                ],
            }
        );
    }

    #[test]
    fn acquire_filter_for_single_field() {
        let filter = acquire_filter(
            Bson::String("ship-1".into()),
            &QueryTarget::Field("manifest"),
            1_000,
        );
        assert_eq!(
            filter,
            doc! {
                "_id": "ship-1",
                "$or": [
                    { "manifest.lock_id": Bson::Null },
                    { "manifest.lock_time": { "$lte": 1_000i64 } },
                ],
            }
        );
    }

    #[test]
    fn acquire_filter_for_collection_element() {
        let filter = acquire_filter(Bson::String("ship-1".into()), &element_target(), 1_000);
        assert_eq!(
            filter,
            doc! {
                "_id": "ship-1",
                "parcels": {
                    "$elemMatch": {
                        "id": "p0",
                        "$or": [
                            { "lock_id": Bson::Null },
                            { "lock_time": { "$lte": 1_000i64 } },
                        ],
                    }
                },
            }
        );
    }

    #[test]
    fn acquire_update_stamps_both_lock_fields() {
        let token = LockToken::generate();
        let update = acquire_update(&QueryTarget::Field("manifest"), &token, 2_000);
        assert_eq!(
            update,
            doc! {
                "$set": {
                    "manifest.lock_id": token.to_string(),
                    "manifest.lock_time": 2_000i64,
                }
            }
        );
    }

    #[test]
    fn element_updates_use_the_positional_operator() {
        let token = LockToken::generate();
        let update = acquire_update(&element_target(), &token, 2_000);
        assert_eq!(
            update,
            doc! {
                "$set": {
                    "parcels.$.lock_id": token.to_string(),
                    "parcels.$.lock_time": 2_000i64,
                }
            }
        );

        assert_eq!(
            release_update(&element_target()),
            doc! {
                "$set": {
                    "parcels.$.lock_id": Bson::Null,
                    "parcels.$.lock_time": Bson::Null,
                }
            }
        );
    }

    #[test]
    fn held_filter_matches_the_token() {
        let token = LockToken::generate();
        assert_eq!(
            held_filter(Bson::String("ship-1".into()), &QueryTarget::Root, &token),
            doc! {
                "_id": "ship-1",
                "lock_id": token.to_string(),
            }
        );

        assert_eq!(
            held_filter(Bson::String("ship-1".into()), &element_target(), &token),
            doc! {
                "_id": "ship-1",
                "parcels": {
                    "$elemMatch": {
                        "id": "p0",
                        "lock_id": token.to_string(),
                    }
                },
            }
        );
    }

    #[test]
    fn refresh_update_touches_only_the_time() {
        assert_eq!(
            refresh_update(&QueryTarget::Root, 3_000),
            doc! { "$set": { "lock_time": 3_000i64 } }
        );
    }
}
