use std::rc::Rc;

use crate::clock::ClockKey;
use crate::rules::ParsedRuleSet;
use crate::store::RuleStore;

#[derive(Debug)]
struct CacheEntry {
    rules: Rc<ParsedRuleSet>,
    /// `None` when the entry was built without an active world.
    key: Option<ClockKey>,
}

/// Single snapshot of the parsed rules, valid for one simulated moment.
#[derive(Debug, Default)]
pub struct RuleCache {
    entry: Option<CacheEntry>,
    refreshes: u64,
}

impl RuleCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the current rules, rebuilding them from `store` when there is no
    /// entry, `clock` moved, `stale` is set, or no world is active.
    pub fn current(
        &mut self,
        clock: Option<ClockKey>,
        stale: bool,
        store: &RuleStore,
    ) -> Rc<ParsedRuleSet> {
        if let Some(entry) = &self.entry {
            if !stale && clock.is_some() && entry.key == clock {
                return Rc::clone(&entry.rules);
            }
        }

        let raw = store.load();
        let rules = Rc::new(ParsedRuleSet::from_raw(&raw));
        self.entry = Some(CacheEntry { rules: Rc::clone(&rules), key: clock });
        self.refreshes += 1;

        tracing::trace!(
            target: "exclusions",
            asset = %store.asset_name(),
            actors = rules.len(),
            clock = ?clock,
            stale,
            "refreshed exclusion rules"
        );
        rules
    }

    /// Number of rebuilds since creation.
    #[must_use]
    pub fn refresh_count(&self) -> u64 {
        self.refreshes
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RawRuleSet;
    use crate::store::{MemoryContentProvider, DEFAULT_ASSET_NAME};

    fn fixture_store() -> (Rc<MemoryContentProvider>, RuleStore) {
        let raw: RawRuleSet = [("Gus", "ShopDialog")].into_iter().collect();
        let provider = Rc::new(MemoryContentProvider::with_asset(DEFAULT_ASSET_NAME, raw));
        let store = RuleStore::new(Rc::clone(&provider));
        (provider, store)
    }

    #[test]
    fn same_clock_key_reuses_snapshot() {
        let (provider, store) = fixture_store();
        let mut cache = RuleCache::new();
        let key = Some(ClockKey::new(12, 900));

        let first = cache.current(key, false, &store);
        let second = cache.current(key, false, &store);

        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(provider.fetch_count(), 1);
        assert_eq!(cache.refresh_count(), 1);
    }

    #[test]
    fn advancing_either_coordinate_refetches_once() {
        let (provider, store) = fixture_store();
        let mut cache = RuleCache::new();

        let _ = cache.current(Some(ClockKey::new(3, 600)), false, &store);
        let _ = cache.current(Some(ClockKey::new(3, 610)), false, &store);
        let _ = cache.current(Some(ClockKey::new(3, 610)), false, &store);
        assert_eq!(provider.fetch_count(), 2);

        let _ = cache.current(Some(ClockKey::new(4, 610)), false, &store);
        let _ = cache.current(Some(ClockKey::new(4, 610)), false, &store);
        assert_eq!(provider.fetch_count(), 3);
    }

    #[test]
    fn stale_flag_forces_one_refetch() {
        let (provider, store) = fixture_store();
        let mut cache = RuleCache::new();
        let key = Some(ClockKey::new(1, 600));

        let first = cache.current(key, false, &store);
        let second = cache.current(key, true, &store);
        let third = cache.current(key, false, &store);

        assert!(!Rc::ptr_eq(&first, &second));
        assert!(Rc::ptr_eq(&second, &third));
        assert_eq!(provider.fetch_count(), 2);
    }

    #[test]
    fn no_active_world_always_refetches() {
        let (provider, store) = fixture_store();
        let mut cache = RuleCache::new();

        let _ = cache.current(None, false, &store);
        let _ = cache.current(None, false, &store);
        assert_eq!(provider.fetch_count(), 2);

        let key = Some(ClockKey::new(1, 600));
        let _ = cache.current(key, false, &store);
        let _ = cache.current(key, false, &store);
        assert_eq!(provider.fetch_count(), 3);
    }

    #[test]
    fn refresh_replaces_entry_wholesale() {
        let (provider, store) = fixture_store();
        let mut cache = RuleCache::new();
        let key = Some(ClockKey::new(5, 800));

        let before = cache.current(key, false, &store);
        assert!(before.get("Gus").is_some());

        provider.insert(DEFAULT_ASSET_NAME, [("Pierre", "All")].into_iter().collect());
        let after = cache.current(Some(ClockKey::new(5, 810)), false, &store);

        assert!(after.get("Gus").is_none());
        assert!(after.get("Pierre").is_some());
        assert!(before.get("Gus").is_some());
    }
}
