//! The shared, wholesale-replaced list of backend addresses.

use std::sync::{Arc, PoisonError, RwLock};

/// A backend's `host:port`.
pub type TargetAddress = String;

/// Immutable snapshot handed to readers. Cloning only bumps a refcount.
pub type TargetSnapshot = Arc<[TargetAddress]>;

/// Current set of broadcast targets.
///
/// Readers get a complete snapshot; a concurrent [`set`](Self::set) is
/// observed either entirely or not at all. No merging, ordering or
/// deduplication is applied.
#[derive(Debug)]
pub struct TargetRegistry {
    targets: RwLock<TargetSnapshot>,
}

impl Default for TargetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            targets: RwLock::new(Arc::from(Vec::new())),
        }
    }

    #[must_use]
    pub fn with_targets(targets: Vec<TargetAddress>) -> Self {
        Self {
            targets: RwLock::new(Arc::from(targets)),
        }
    }

    #[must_use]
    pub fn get(&self) -> TargetSnapshot {
        // The guarded value is a single pointer swap, so a poisoned lock
        // still holds a whole snapshot.
        Arc::clone(&self.targets.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn set(&self, targets: Vec<TargetAddress>) {
        let snapshot: TargetSnapshot = Arc::from(targets);
        *self.targets.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.get().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let registry = TargetRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get().is_empty());
    }

    #[test]
    fn set_replaces_wholesale() {
        let registry = TargetRegistry::with_targets(vec!["a:1".into(), "b:2".into()]);
        registry.set(vec!["c:3".into()]);
        assert_eq!(&*registry.get(), &["c:3".to_string()]);
    }

    #[test]
    fn duplicates_are_kept() {
        let registry = TargetRegistry::new();
        registry.set(vec!["a:1".into(), "a:1".into()]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn snapshot_survives_later_update() {
        let registry = TargetRegistry::with_targets(vec!["old:1".into()]);
        let snapshot = registry.get();
        registry.set(vec!["new:1".into(), "new:2".into()]);
        assert_eq!(&*snapshot, &["old:1".to_string()]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn concurrent_readers_see_whole_snapshots() {
        let registry = Arc::new(TargetRegistry::new());
        let writer = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for n in 0..200 {
                    registry.set(vec![format!("host:{n}"); n % 7]);
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let snapshot = registry.get();
                        if let Some(first) = snapshot.first() {
                            assert!(snapshot.iter().all(|t| t == first));
                        }
                    }
                })
            })
            .collect();
        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
