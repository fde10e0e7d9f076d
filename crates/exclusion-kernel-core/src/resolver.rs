use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;

use crate::cache::RuleCache;
use crate::clock::ClockSource;
use crate::parser::RuleToken;
use crate::rules::ParsedRuleSet;
use crate::settings::ExclusionSettings;
use crate::store::{ContentProvider, RuleStore};
use crate::taxonomy::Scope;

/// Answers exclusion queries against the cached rules.
///
/// Owns the only [`RuleCache`]; every query goes through [`Resolver::snapshot`],
/// which refreshes the cache when the clock moved, the context changed, or a
/// reload was forced.
pub struct Resolver {
    store: RuleStore,
    clock: Box<dyn ClockSource>,
    cache: RefCell<RuleCache>,
    stale: Cell<bool>,
}

impl Resolver {
    pub fn new(
        provider: impl ContentProvider + 'static,
        clock: impl ClockSource + 'static,
    ) -> Self {
        Self::with_settings(provider, clock, &ExclusionSettings::default())
    }

    pub fn with_settings(
        provider: impl ContentProvider + 'static,
        clock: impl ClockSource + 'static,
        settings: &ExclusionSettings,
    ) -> Self {
        Self {
            store: RuleStore::with_asset_name(provider, settings.asset_name.clone()),
            clock: Box::new(clock),
            cache: RefCell::new(RuleCache::new()),
            stale: Cell::new(false),
        }
    }

    #[must_use]
    pub fn asset_name(&self) -> &str {
        self.store.asset_name()
    }

    /// Rules valid for the current simulated moment.
    pub fn snapshot(&self) -> Rc<ParsedRuleSet> {
        let stale = self.stale.replace(false) | self.store.take_reload_request();
        self.cache.borrow_mut().current(self.clock.now(), stale, &self.store)
    }

    /// Whether `name` is excluded from `scope`. Actors without rules never are.
    pub fn is_excluded(&self, name: &str, scope: Scope) -> bool {
        self.snapshot().is_excluded(name, scope)
    }

    /// Configured names of every actor excluded from `scope`.
    pub fn all_excluded(&self, scope: Scope) -> BTreeSet<String> {
        let rules = self.snapshot();
        let excluded = rules
            .actors()
            .filter(|actor| actor.excludes(scope))
            .map(|actor| actor.name.clone())
            .collect::<BTreeSet<_>>();

        if !excluded.is_empty() && tracing::enabled!(tracing::Level::TRACE) {
            let names = excluded.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
            tracing::trace!(
                target: "exclusions",
                scope = %scope,
                actors = %names,
                "excluded actors"
            );
        }
        excluded
    }

    /// Tokens configured for `name`, empty when the actor has no entry.
    pub fn rules_for(&self, name: &str) -> Vec<RuleToken> {
        self.snapshot().get(name).map(|actor| actor.tokens.clone()).unwrap_or_default()
    }

    /// Mark the cached rules stale, e.g. after a location change. The
    /// provider's own copy is dropped as well, so the next query reads the
    /// asset source.
    pub fn invalidate(&self) {
        self.store.invalidate_provider();
        self.stale.set(true);
    }

    /// Drop cached copies in the provider and here; the next query fetches.
    pub fn force_reload(&self) {
        self.store.force_reload();
    }

    #[must_use]
    pub fn refresh_count(&self) -> u64 {
        self.cache.borrow().refresh_count()
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("store", &self.store)
            .field("cache", &self.cache)
            .field("stale", &self.stale.get())
            .finish_non_exhaustive()
    }
}
