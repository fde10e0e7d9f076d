use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::parser::{fold_case, parse, RuleToken};
use crate::taxonomy::Scope;

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct RawRuleEntry {
    pub actor: String,
    pub rules: String,
}

/// Actor name to raw rule text, in the order the provider delivered it.
///
/// Deserializes from any string-to-string map and keeps document order,
/// including keys repeated with different case.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct RawRuleSet {
    entries: Vec<RawRuleEntry>,
}

impl RawRuleSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, actor: impl Into<String>, rules: impl Into<String>) {
        self.entries.push(RawRuleEntry { actor: actor.into(), rules: rules.into() });
    }

    #[must_use]
    pub fn entries(&self) -> &[RawRuleEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<A, R> FromIterator<(A, R)> for RawRuleSet
where
    A: Into<String>,
    R: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (A, R)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (actor, rules) in iter {
            set.push(actor, rules);
        }
        set
    }
}

impl Serialize for RawRuleSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.actor, &entry.rules)?;
        }
        map.end()
    }
}

struct RawRuleSetVisitor;

impl<'de> Visitor<'de> for RawRuleSetVisitor {
    type Value = RawRuleSet;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a map of actor names to rule strings")
    }

    fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
        Ok(RawRuleSet::new())
    }

    fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
        Ok(RawRuleSet::new())
    }

    fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<Self::Value, M::Error> {
        let mut set = RawRuleSet::new();
        while let Some((actor, rules)) = access.next_entry::<String, String>()? {
            set.push(actor, rules);
        }
        Ok(set)
    }
}

impl<'de> Deserialize<'de> for RawRuleSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RawRuleSetVisitor)
    }
}

/// Parsed rules of one actor, under the name spelling the asset used.
#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
pub struct ActorRules {
    pub name: String,
    pub tokens: Vec<RuleToken>,
}

impl ActorRules {
    /// First token that excludes this actor from `scope`.
    #[must_use]
    pub fn matching_token(&self, scope: Scope) -> Option<&RuleToken> {
        let terms = scope.terms();
        self.tokens.iter().find(|token| terms.iter().any(|term| token.matches(term)))
    }

    #[must_use]
    pub fn excludes(&self, scope: Scope) -> bool {
        self.matching_token(scope).is_some()
    }
}

/// Case-insensitive actor → tokens map derived from one [`RawRuleSet`].
///
/// When two raw entries fold to the same actor name the first one wins; the
/// later spellings are kept in [`ParsedRuleSet::shadowed`].
#[derive(Debug, Clone, Default, Serialize, Eq, PartialEq)]
pub struct ParsedRuleSet {
    actors: BTreeMap<String, ActorRules>,
    shadowed: Vec<String>,
}

impl ParsedRuleSet {
    #[must_use]
    pub fn from_raw(raw: &RawRuleSet) -> Self {
        let mut parsed = Self::default();
        for entry in raw.entries() {
            match parsed.actors.entry(fold_case(&entry.actor)) {
                Entry::Vacant(slot) => {
                    slot.insert(ActorRules {
                        name: entry.actor.clone(),
                        tokens: parse(&entry.rules),
                    });
                }
                Entry::Occupied(existing) => {
                    tracing::warn!(
                        target: "exclusions",
                        actor = %entry.actor,
                        kept = %existing.get().name,
                        "duplicate actor entry ignored; first entry wins"
                    );
                    parsed.shadowed.push(entry.actor.clone());
                }
            }
        }
        parsed
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ActorRules> {
        self.actors.get(&fold_case(name))
    }

    /// Whether `name` has a token matching `scope`. Unknown actors are never
    /// excluded.
    #[must_use]
    pub fn is_excluded(&self, name: &str, scope: Scope) -> bool {
        self.get(name).is_some_and(|rules| rules.excludes(scope))
    }

    pub fn actors(&self) -> impl Iterator<Item = &ActorRules> {
        self.actors.values()
    }

    #[must_use]
    pub fn shadowed(&self) -> &[String] {
        &self.shadowed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}
