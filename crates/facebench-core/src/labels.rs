//! Identity label assignment.
//!
//! LFW image paths have the form `person/person_0001.jpg`; the identity key
//! is the path prefix before the first `/`. Ids are handed out lazily in
//! order of first appearance and stay stable for the lifetime of the map.
//! The map is an explicit object owned by the evaluation driver, so runs
//! are isolated from each other.

use std::collections::HashMap;

/// Identity-string → integer-label map.
#[derive(Debug, Default)]
pub struct LabelMap {
    ids: HashMap<String, i32>,
}

impl LabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label for the identity owning `image_path`. Assigns the next
    /// consecutive id (starting at 0) on first encounter.
    pub fn get(&mut self, image_path: &str) -> i32 {
        let identity = image_path.split('/').next().unwrap_or(image_path);
        if let Some(&id) = self.ids.get(identity) {
            return id;
        }
        let id = self.ids.len() as i32;
        self.ids.insert(identity.to_string(), id);
        id
    }

    /// Number of distinct identities seen so far.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
