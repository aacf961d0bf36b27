//! Known covers keyed by name.

use crate::discovery::Cover;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Table of discovered covers. Entries are never removed; a re-announcement
/// under the same name replaces the stored cover in place.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    covers: RwLock<HashMap<String, Cover>>,
}

impl DeviceRegistry {
    /// Inserts or replaces `cover`. Returns true if its name was not known before.
    pub fn upsert(&self, cover: Cover) -> bool {
        self.covers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(cover.name.clone(), cover)
            .is_none()
    }

    pub fn lookup(&self, name: &str) -> Option<Cover> {
        self.covers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.covers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn cover(name: &str, prefix: &str) -> Cover {
        Cover {
            name: name.to_string(),
            command_topic: format!("{prefix}/set"),
            position_topic: format!("{prefix}/position"),
            position_open: 100,
        }
    }

    #[test]
    fn reannouncement_replaces_without_growing() {
        let registry = DeviceRegistry::default();

        assert!(registry.upsert(cover("Kitchen", "old")));
        assert!(!registry.upsert(cover("Kitchen", "new")));

        assert_eq!(registry.len(), 1);
        let stored = registry.lookup("Kitchen").unwrap();
        assert_eq!(stored.command_topic, "new/set");
        assert_eq!(stored.position_topic, "new/position");
    }

    #[test]
    fn unknown_name_is_absent() {
        let registry = DeviceRegistry::default();
        assert!(registry.is_empty());
        assert_eq!(registry.lookup("Kitchen"), None);
    }

    #[test]
    fn concurrent_upserts_count_each_name_once() {
        let registry = Arc::new(DeviceRegistry::default());
        let workers: Vec<_> = (0..8)
            .map(|worker| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .filter(|i| {
                            registry.upsert(cover(&format!("cover-{i}"), &format!("w{worker}")))
                        })
                        .count()
                })
            })
            .collect();

        let newly_added: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();

        assert_eq!(newly_added, 50);
        assert_eq!(registry.len(), 50);
    }
}
