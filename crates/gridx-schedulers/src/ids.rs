//! Unique app names for backends that need caller-chosen ids.

use uuid::Uuid;

const SUFFIX_LEN: usize = 10;

/// A short hex id taken from a random (v4) UUID.
pub fn random_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(SUFFIX_LEN);
    id
}

/// `<name>-<random id>`, e.g. `trainer-3f9a0c1b2d`.
pub fn make_unique(name: &str) -> String {
    format!("{name}-{}", random_id())
}
