use crate::resolver::Resolver;
use crate::taxonomy::Scope;

/// Anything the host can hand over as a named actor.
pub trait Actor {
    fn name(&self) -> &str;
}

impl Actor for str {
    fn name(&self) -> &str {
        self
    }
}

impl Actor for String {
    fn name(&self) -> &str {
        self
    }
}

impl<A: Actor + ?Sized> Actor for &A {
    fn name(&self) -> &str {
        (**self).name()
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Partition<A> {
    pub kept: Vec<A>,
    pub excluded: Vec<A>,
}

/// Split `candidates` into eligible and excluded actors, both in input order.
/// All candidates are checked against one rules snapshot.
pub fn partition<A: Actor + Clone>(
    resolver: &Resolver,
    candidates: &[A],
    scope: Scope,
) -> Partition<A> {
    let rules = resolver.snapshot();
    let (excluded, kept): (Vec<A>, Vec<A>) = candidates
        .iter()
        .cloned()
        .partition(|candidate| rules.is_excluded(candidate.name(), scope));

    if !excluded.is_empty() && tracing::enabled!(tracing::Level::TRACE) {
        let names = excluded.iter().map(Actor::name).collect::<Vec<_>>().join(", ");
        tracing::trace!(
            target: "exclusions",
            scope = %scope,
            actors = %names,
            "filtered excluded candidates"
        );
    }
    Partition { kept, excluded }
}

/// Eligible `candidates` in their original order; the input is left as is.
pub fn filter<A: Actor + Clone>(resolver: &Resolver, candidates: &[A], scope: Scope) -> Vec<A> {
    partition(resolver, candidates, scope).kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::rules::RawRuleSet;
    use crate::store::{MemoryContentProvider, DEFAULT_ASSET_NAME};
    use crate::taxonomy::Feature;

    #[derive(Debug, Clone, Eq, PartialEq)]
    struct Npc {
        display: &'static str,
        heart_level: u8,
    }

    impl Actor for Npc {
        fn name(&self) -> &str {
            self.display
        }
    }

    fn fixture_resolver() -> Resolver {
        let raw: RawRuleSet =
            [("B", "ItemDelivery"), ("Vincent", "TownQuest")].into_iter().collect();
        Resolver::new(
            MemoryContentProvider::with_asset(DEFAULT_ASSET_NAME, raw),
            ManualClock::at(8, 1300),
        )
    }

    #[test]
    fn filter_drops_excluded_and_keeps_order() {
        let resolver = fixture_resolver();
        let candidates = vec!["A".to_string(), "B".to_string(), "C".to_string()];

        let kept = filter(&resolver, &candidates, Feature::ItemDelivery.scope());

        assert_eq!(kept, ["A", "C"]);
        assert_eq!(candidates, ["A", "B", "C"]);
    }

    #[test]
    fn partition_reports_excluded_candidates() {
        let resolver = fixture_resolver();
        let candidates = [
            Npc { display: "Jas", heart_level: 2 },
            Npc { display: "vincent", heart_level: 4 },
            Npc { display: "Sam", heart_level: 6 },
        ];

        let split = partition(&resolver, &candidates, Feature::Socialize.scope());

        assert_eq!(split.kept, [candidates[0].clone(), candidates[2].clone()]);
        assert_eq!(split.excluded, [candidates[1].clone()]);
        assert_eq!(split.excluded[0].heart_level, 4);
    }

    #[test]
    fn unrelated_scope_keeps_everyone() {
        let resolver = fixture_resolver();
        let candidates = ["B", "Vincent"];
        assert_eq!(filter(&resolver, &candidates, Feature::Calendar.scope()), candidates);
    }
}
