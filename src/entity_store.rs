//! Entity state store.
//!
//! Registry entities are derived from upstream data, but each logical path
//! still needs stable `epoch` / `createdat` / `modifiedat` attributes. The
//! store keeps a process-local map, seeded on first observation. `epoch`
//! only moves forward; it bumps when a facade reports a changed upstream
//! payload for a path.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use prism_core::EntityStamp;

/// Process-local `path -> stamp` map.
#[derive(Debug, Default)]
pub struct EntityStore {
    entries: RwLock<HashMap<String, Entry>>,
}

#[derive(Debug, Clone)]
struct Entry {
    stamp: EntityStamp,
    /// Hash of the upstream payload last seen for this path.
    content_hash: Option<u64>,
}

impl EntityStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The stamp for a path, seeding it on first observation.
    pub fn get(&self, path: &str) -> EntityStamp {
        if let Some(entry) = self.entries.read().expect("entity store lock").get(path) {
            return entry.stamp;
        }
        let mut entries = self.entries.write().expect("entity store lock");
        entries
            .entry(path.to_string())
            .or_insert_with(|| Entry { stamp: EntityStamp::seeded_at(Utc::now()), content_hash: None })
            .stamp
    }

    /// Bump `epoch` and `modifiedat` for a path.
    pub fn touch(&self, path: &str) -> EntityStamp {
        let mut entries = self.entries.write().expect("entity store lock");
        let now = Utc::now();
        let entry = entries
            .entry(path.to_string())
            .or_insert_with(|| Entry { stamp: EntityStamp::seeded_at(now), content_hash: None });
        entry.stamp.epoch += 1;
        entry.stamp.modified_at = now;
        entry.stamp
    }

    /// Record the upstream payload hash for a path, bumping the stamp when
    /// the payload changed since the last observation.
    pub fn observe(&self, path: &str, content_hash: u64) -> EntityStamp {
        {
            let entries = self.entries.read().expect("entity store lock");
            if let Some(entry) = entries.get(path) {
                if entry.content_hash == Some(content_hash) {
                    return entry.stamp;
                }
            }
        }

        let mut entries = self.entries.write().expect("entity store lock");
        let now = Utc::now();
        let entry = entries
            .entry(path.to_string())
            .or_insert_with(|| Entry { stamp: EntityStamp::seeded_at(now), content_hash: None });
        match entry.content_hash {
            None => entry.content_hash = Some(content_hash),
            Some(seen) if seen == content_hash => {}
            Some(_) => {
                entry.content_hash = Some(content_hash);
                entry.stamp.epoch += 1;
                entry.stamp.modified_at = now;
            }
        }
        entry.stamp
    }

    /// Number of tracked paths.
    pub fn len(&self) -> usize {
        self.entries.read().expect("entity store lock").len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
