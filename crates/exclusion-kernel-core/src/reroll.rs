use std::cell::Cell;
use std::collections::BTreeSet;

use crate::filter::Actor;
use crate::resolver::Resolver;
use crate::taxonomy::Scope;

/// Repeats a host selection routine until it yields an acceptable actor.
///
/// Only the outermost call loops. While a loop is running, a call reaching the
/// reroller again (typically because `select` is itself intercepted) invokes
/// its own `select` once and returns that result unchecked.
///
/// The loop has no attempt limit: callers must make sure the population that
/// `select` draws from holds at least one acceptable actor.
#[derive(Debug, Default)]
pub struct CandidateReroller {
    active: Cell<bool>,
    last_discarded: Cell<usize>,
}

/// Marks a reroll loop as running; cleared on drop, including unwinding.
struct LoopMarker<'a> {
    active: &'a Cell<bool>,
}

impl<'a> LoopMarker<'a> {
    fn enter(active: &'a Cell<bool>) -> Option<Self> {
        if active.replace(true) {
            return None;
        }
        Some(Self { active })
    }
}

impl Drop for LoopMarker<'_> {
    fn drop(&mut self) {
        self.active.set(false);
    }
}

impl CandidateReroller {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an outer loop is currently running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Attempts discarded by the most recent outer loop.
    #[must_use]
    pub fn last_discarded(&self) -> usize {
        self.last_discarded.get()
    }

    /// Call `select` until it returns an actor not excluded from `scope`.
    pub fn select_valid<A, F>(&self, resolver: &Resolver, scope: Scope, select: F) -> Option<A>
    where
        A: Actor,
        F: FnMut() -> Option<A>,
    {
        self.run(select, |actor| !resolver.is_excluded(actor.name(), scope), scope.feature.as_str())
    }

    /// Call `select` until it returns anything at all. Covers host routines
    /// that intermittently come back empty.
    pub fn select_present<A, F>(&self, select: F) -> Option<A>
    where
        A: Actor,
        F: FnMut() -> Option<A>,
    {
        self.run(select, |_| true, "present")
    }

    fn run<A, F, P>(&self, mut select: F, mut accept: P, purpose: &str) -> Option<A>
    where
        A: Actor,
        F: FnMut() -> Option<A>,
        P: FnMut(&A) -> bool,
    {
        let Some(_marker) = LoopMarker::enter(&self.active) else {
            return select();
        };

        let verbose = tracing::enabled!(tracing::Level::TRACE);
        let mut discarded = 0_usize;
        let mut rerolled = BTreeSet::new();
        loop {
            match select() {
                Some(actor) if accept(&actor) => {
                    self.last_discarded.set(discarded);
                    if discarded > 0 && verbose {
                        let names = rerolled.into_iter().collect::<Vec<_>>().join(", ");
                        tracing::trace!(
                            target: "exclusions",
                            purpose,
                            discarded,
                            rerolled = %names,
                            selected = %actor.name(),
                            "rerolled selection"
                        );
                    }
                    return Some(actor);
                }
                other => {
                    discarded += 1;
                    if verbose {
                        let name = other.as_ref().map_or("<none>", |actor| actor.name());
                        rerolled.insert(name.to_string());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use super::*;
    use crate::clock::ManualClock;
    use crate::rules::RawRuleSet;
    use crate::store::{MemoryContentProvider, DEFAULT_ASSET_NAME};
    use crate::taxonomy::Feature;

    fn fixture_resolver() -> Resolver {
        let raw: RawRuleSet =
            [("Krobus", "WinterStar"), ("Dwarf", "TownEvent")].into_iter().collect();
        Resolver::new(
            MemoryContentProvider::with_asset(DEFAULT_ASSET_NAME, raw),
            ManualClock::at(112, 900),
        )
    }

    fn sequence(names: &[&'static str]) -> RefCell<VecDeque<&'static str>> {
        RefCell::new(names.iter().copied().collect())
    }

    #[test]
    fn rerolls_past_excluded_actors() {
        let resolver = fixture_resolver();
        let reroller = CandidateReroller::new();
        let draws = sequence(&["Krobus", "Krobus", "Penny"]);

        let selected = reroller.select_valid(&resolver, Feature::WinterStar.scope(), || {
            draws.borrow_mut().pop_front()
        });

        assert_eq!(selected, Some("Penny"));
        assert_eq!(reroller.last_discarded(), 2);
        assert!(!reroller.is_active());
    }

    #[test]
    fn empty_draws_are_discarded_too() {
        let resolver = fixture_resolver();
        let reroller = CandidateReroller::new();
        let draws = RefCell::new(VecDeque::from([None, Some("dwarf"), None, Some("Emily")]));

        let selected = reroller.select_valid(&resolver, Feature::WinterStar.scope(), || {
            draws.borrow_mut().pop_front().flatten()
        });

        assert_eq!(selected, Some("Emily"));
        assert_eq!(reroller.last_discarded(), 3);
    }

    #[test]
    fn first_valid_draw_needs_no_reroll() {
        let resolver = fixture_resolver();
        let reroller = CandidateReroller::new();
        let selected =
            reroller.select_valid(&resolver, Feature::WinterStar.scope(), || Some("Lewis"));
        assert_eq!(selected, Some("Lewis"));
        assert_eq!(reroller.last_discarded(), 0);
    }

    #[test]
    fn nested_entry_falls_through_to_one_direct_call() {
        let resolver = fixture_resolver();
        let reroller = CandidateReroller::new();
        let scope = Feature::WinterStar.scope();
        let inner_calls = Cell::new(0_u32);
        let outer_draws = sequence(&["Krobus", "Pam"]);

        let selected = reroller.select_valid(&resolver, scope, || {
            let nested = reroller.select_valid(&resolver, scope, || {
                inner_calls.set(inner_calls.get() + 1);
                Some("Krobus")
            });
            assert_eq!(nested, Some("Krobus"));
            assert!(reroller.is_active());
            outer_draws.borrow_mut().pop_front()
        });

        assert_eq!(selected, Some("Pam"));
        assert_eq!(inner_calls.get(), 2);
        assert_eq!(reroller.last_discarded(), 1);
        assert!(!reroller.is_active());
    }

    #[test]
    fn marker_is_released_when_select_panics() {
        let resolver = fixture_resolver();
        let reroller = CandidateReroller::new();

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            reroller.select_valid::<&str, _>(&resolver, Feature::WinterStar.scope(), || {
                panic!("host selection failed")
            })
        }));

        assert!(outcome.is_err());
        assert!(!reroller.is_active());
        let selected =
            reroller.select_valid(&resolver, Feature::WinterStar.scope(), || Some("Robin"));
        assert_eq!(selected, Some("Robin"));
    }

    #[test]
    fn select_present_retries_only_empty_results() {
        let reroller = CandidateReroller::new();
        let draws = RefCell::new(VecDeque::from([None, None, Some("Krobus")]));

        let selected = reroller.select_present(|| draws.borrow_mut().pop_front().flatten());

        assert_eq!(selected, Some("Krobus"));
        assert_eq!(reroller.last_discarded(), 2);
    }

    #[test]
    fn select_closure_may_query_resolver() {
        let resolver = fixture_resolver();
        let reroller = CandidateReroller::new();
        let draws = sequence(&["Dwarf", "Maru"]);

        let selected = reroller.select_valid(&resolver, Feature::Calendar.scope(), || {
            let next = draws.borrow_mut().pop_front();
            let _ = resolver.all_excluded(Feature::Calendar.scope());
            next
        });

        assert_eq!(selected, Some("Maru"));
    }
}
