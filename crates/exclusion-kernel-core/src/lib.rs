//! Exclusion rules for named actors: parsing, cached resolution against the
//! simulated clock, and the candidate filter / reroll protocols integrations
//! build on.

mod cache;
mod clock;
mod fail_open;
mod filter;
mod parser;
mod reroll;
mod resolver;
mod rules;
mod settings;
mod store;
mod taxonomy;

pub use cache::RuleCache;
pub use clock::{ClockKey, ClockSource, ManualClock};
pub use fail_open::FailOpen;
pub use filter::{filter as filter_candidates, partition as partition_candidates, Actor, Partition};
pub use parser::{fold_case, parse, RuleToken, TokenError, DELIMITERS};
pub use reroll::CandidateReroller;
pub use resolver::Resolver;
pub use rules::{ActorRules, ParsedRuleSet, RawRuleEntry, RawRuleSet};
pub use settings::ExclusionSettings;
pub use store::{
    ContentProvider, MemoryContentProvider, ProviderError, RuleStore, DEFAULT_ASSET_NAME,
};
pub use taxonomy::{Category, Feature, Scope, ALL_TOKEN};
