//! Craft registry: id → craft state.
//!
//! The server owns the canonical registry; every client keeps a mirror.
//! All mutations are permissive: duplicates and unknown ids are dropped,
//! never reported to the peer that caused them.

use hashbrown::HashMap;
use tracing::debug;

use crate::game::craft::{Craft, CraftId};

/// Outcome of [`CraftRegistry::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Inserted,
    /// Id already present; the stored record was kept
    Duplicate,
}

/// Outcome of [`CraftRegistry::update`] and [`CraftRegistry::remove`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    Applied,
    /// No entry with that id; nothing changed
    UnknownId,
}

#[derive(Debug, Clone, Default)]
pub struct CraftRegistry {
    crafts: HashMap<CraftId, Craft>,
}

impl CraftRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a craft if its id is not registered yet
    pub fn register(&mut self, craft: Craft) -> RegisterOutcome {
        if self.crafts.contains_key(&craft.id) {
            debug!("Craft {} already registered, ignoring duplicate", craft.id);
            return RegisterOutcome::Duplicate;
        }
        self.crafts.insert(craft.id.clone(), craft);
        RegisterOutcome::Inserted
    }

    /// Replace the stored record for an already registered craft
    pub fn update(&mut self, craft: Craft) -> ChangeOutcome {
        match self.crafts.get_mut(&craft.id) {
            Some(entry) => {
                *entry = craft;
                ChangeOutcome::Applied
            }
            None => {
                debug!("Update for unknown craft {}, dropping", craft.id);
                ChangeOutcome::UnknownId
            }
        }
    }

    pub fn remove(&mut self, craft_id: &str) -> ChangeOutcome {
        match self.crafts.remove(craft_id) {
            Some(_) => ChangeOutcome::Applied,
            None => ChangeOutcome::UnknownId,
        }
    }

    /// All records, ordered by id
    pub fn snapshot(&self) -> Vec<Craft> {
        let mut crafts: Vec<Craft> = self.crafts.values().cloned().collect();
        crafts.sort_unstable_by(|a, b| a.id.cmp(&b.id));
        crafts
    }

    /// Replace the contents with `snapshot`, leaving the entry `keep` as it is.
    ///
    /// Records missing from the snapshot are dropped, new ones inserted and
    /// matching ones overwritten wholesale.
    pub fn reconcile(&mut self, snapshot: Vec<Craft>, keep: &str) {
        let kept = self.crafts.remove(keep);

        self.crafts.clear();
        for craft in snapshot {
            if craft.id != keep {
                self.crafts.insert(craft.id.clone(), craft);
            }
        }

        if let Some(craft) = kept {
            self.crafts.insert(craft.id.clone(), craft);
        }
    }

    pub fn get(&self, craft_id: &str) -> Option<&Craft> {
        self.crafts.get(craft_id)
    }

    pub fn get_mut(&mut self, craft_id: &str) -> Option<&mut Craft> {
        self.crafts.get_mut(craft_id)
    }

    pub fn contains(&self, craft_id: &str) -> bool {
        self.crafts.contains_key(craft_id)
    }

    pub fn len(&self) -> usize {
        self.crafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crafts.is_empty()
    }

    pub fn ids(&self) -> Vec<CraftId> {
        let mut ids: Vec<CraftId> = self.crafts.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &Craft> {
        self.crafts.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Craft> {
        self.crafts.values_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::BTreeSet;

    fn craft(id: &str, a: f64) -> Craft {
        Craft::new(id, format!("name-{}", id), a, 0.002)
    }

    #[test]
    fn test_register_inserts() {
        let mut registry = CraftRegistry::new();
        let a1 = craft("a1", 30.0).with_eccentricity(0.05);

        assert_eq!(registry.register(a1.clone()), RegisterOutcome::Inserted);
        assert_eq!(registry.snapshot(), vec![a1]);
    }

    #[test]
    fn test_duplicate_register_keeps_first() {
        let mut registry = CraftRegistry::new();
        let first = craft("a1", 30.0);
        let second = craft("a1", 45.0);

        registry.register(first.clone());
        assert_eq!(registry.register(second), RegisterOutcome::Duplicate);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("a1"), Some(&first));
    }

    #[test]
    fn test_update_replaces_known() {
        let mut registry = CraftRegistry::new();
        registry.register(craft("a1", 30.0));

        let mut changed = craft("a1", 31.0);
        changed.main_fuel = 42.0;
        assert_eq!(registry.update(changed.clone()), ChangeOutcome::Applied);
        assert_eq!(registry.get("a1"), Some(&changed));
    }

    #[test]
    fn test_update_unknown_does_not_create() {
        let mut registry = CraftRegistry::new();
        assert_eq!(registry.update(craft("ghost", 30.0)), ChangeOutcome::UnknownId);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut registry = CraftRegistry::new();
        registry.register(craft("a1", 30.0));
        registry.register(craft("b2", 32.0));
        let before = registry.snapshot();

        assert_eq!(registry.remove("nobody"), ChangeOutcome::UnknownId);
        assert_eq!(registry.snapshot(), before);
    }

    #[test]
    fn test_remove_known() {
        let mut registry = CraftRegistry::new();
        registry.register(craft("a1", 30.0));
        assert_eq!(registry.remove("a1"), ChangeOutcome::Applied);
        assert!(!registry.contains("a1"));
    }

    #[test]
    fn test_snapshot_sorted_by_id() {
        let mut registry = CraftRegistry::new();
        for id in ["c", "a", "b"] {
            registry.register(craft(id, 30.0));
        }
        let ids: Vec<_> = registry.snapshot().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(registry.ids(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_snapshot_ids_match_operation_history() {
        let mut rng = StdRng::seed_from_u64(99);
        let mut registry = CraftRegistry::new();
        let mut expected = BTreeSet::new();

        for _ in 0..2000 {
            let id = format!("c{}", rng.gen_range(0..20));
            match rng.gen_range(0..3) {
                0 => {
                    registry.register(craft(&id, 30.0));
                    expected.insert(id);
                }
                1 => {
                    registry.update(craft(&id, rng.gen_range(30.0..40.0)));
                }
                _ => {
                    registry.remove(&id);
                    expected.remove(&id);
                }
            }
        }

        let actual: BTreeSet<_> = registry.snapshot().into_iter().map(|c| c.id).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_reconcile_upserts_and_prunes() {
        let mut registry = CraftRegistry::new();
        registry.register(craft("mine", 30.0));
        registry.register(craft("stale", 30.0));
        registry.register(craft("other", 30.0));

        let mut mine_on_server = craft("mine", 99.0);
        mine_on_server.main_fuel = 100.0;
        let snapshot = vec![craft("other", 35.0), craft("late", 36.0), mine_on_server];

        registry.reconcile(snapshot, "mine");

        assert_eq!(registry.ids(), vec!["late", "mine", "other"]);
        assert_eq!(registry.get("other").map(|c| c.semi_major_axis), Some(35.0));
        // The kept entry is never overwritten
        assert_eq!(registry.get("mine").map(|c| c.semi_major_axis), Some(30.0));
    }

    #[test]
    fn test_reconcile_without_local_entry() {
        let mut registry = CraftRegistry::new();
        registry.reconcile(vec![craft("mine", 30.0), craft("x", 31.0)], "mine");
        assert_eq!(registry.ids(), vec!["x"]);
    }
}
