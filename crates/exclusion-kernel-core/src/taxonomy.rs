use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Rule token that matches every category and feature.
pub const ALL_TOKEN: &str = "All";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Category {
    TownEvent,
    TownQuest,
    OtherEvent,
}

impl Category {
    pub const ALL: [Self; 3] = [Self::TownEvent, Self::TownQuest, Self::OtherEvent];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TownEvent => "TownEvent",
            Self::TownQuest => "TownQuest",
            Self::OtherEvent => "OtherEvent",
        }
    }

    /// Case-insensitive lookup by token name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Feature {
    /// Birthday shown on the calendar.
    Calendar,
    /// Gift exchange during the Feast of the Winter Star.
    WinterStar,
    /// Random dialog about items the player sold to a shop.
    ShopDialog,
    /// Target of "item delivery" help-wanted quests.
    ItemDelivery,
    /// Target of "socialize" help-wanted quests.
    Socialize,
    /// Counted towards the perfection friendship percentage.
    PerfectFriend,
    /// Visiting the resort island.
    IslandEvent,
    /// Accepting movie invitations.
    MovieInvite,
    /// Greeting other NPCs while walking past.
    Greetings,
}

impl Feature {
    pub const ALL: [Self; 9] = [
        Self::Calendar,
        Self::WinterStar,
        Self::ShopDialog,
        Self::ItemDelivery,
        Self::Socialize,
        Self::PerfectFriend,
        Self::IslandEvent,
        Self::MovieInvite,
        Self::Greetings,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Calendar => "Calendar",
            Self::WinterStar => "WinterStar",
            Self::ShopDialog => "ShopDialog",
            Self::ItemDelivery => "ItemDelivery",
            Self::Socialize => "Socialize",
            Self::PerfectFriend => "PerfectFriend",
            Self::IslandEvent => "IslandEvent",
            Self::MovieInvite => "MovieInvite",
            Self::Greetings => "Greetings",
        }
    }

    /// Case-insensitive lookup by token name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|feature| feature.as_str().eq_ignore_ascii_case(value.trim()))
    }

    #[must_use]
    pub fn category(self) -> Category {
        match self {
            Self::Calendar | Self::WinterStar | Self::ShopDialog => Category::TownEvent,
            Self::ItemDelivery | Self::Socialize => Category::TownQuest,
            Self::PerfectFriend | Self::IslandEvent | Self::MovieInvite | Self::Greetings => {
                Category::OtherEvent
            }
        }
    }

    /// The feature under its fixed parent category.
    #[must_use]
    pub fn scope(self) -> Scope {
        Scope::new(self.category(), self)
    }
}

impl Display for Feature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A (category, feature) pair an actor can be excluded from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Scope {
    pub category: Category,
    pub feature: Feature,
}

impl Scope {
    #[must_use]
    pub fn new(category: Category, feature: Feature) -> Self {
        Self { category, feature }
    }

    /// Token names that exclude an actor from this scope.
    #[must_use]
    pub fn terms(self) -> [&'static str; 3] {
        [ALL_TOKEN, self.category.as_str(), self.feature.as_str()]
    }
}

impl From<Feature> for Scope {
    fn from(feature: Feature) -> Self {
        feature.scope()
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.category, self.feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn features_parse_case_insensitively() {
        assert_eq!(Feature::parse("winterstar"), Some(Feature::WinterStar));
        assert_eq!(Feature::parse(" ITEMDELIVERY "), Some(Feature::ItemDelivery));
        assert_eq!(Feature::parse("Calendar2"), None);
        assert_eq!(Category::parse("townquest"), Some(Category::TownQuest));
        assert_eq!(Category::parse("All"), None);
    }

    #[test]
    fn every_feature_round_trips_through_its_name() {
        for feature in Feature::ALL {
            assert_eq!(Feature::parse(feature.as_str()), Some(feature));
        }
        for category in Category::ALL {
            assert_eq!(Category::parse(category.as_str()), Some(category));
        }
    }

    #[test]
    fn fixed_vocabulary_pairs_match_feature_parents() {
        let pairs = [
            (Category::TownEvent, Feature::Calendar),
            (Category::TownEvent, Feature::WinterStar),
            (Category::TownQuest, Feature::ItemDelivery),
            (Category::TownEvent, Feature::ShopDialog),
            (Category::OtherEvent, Feature::PerfectFriend),
        ];
        for (category, feature) in pairs {
            assert_eq!(feature.scope(), Scope::new(category, feature));
        }
    }

    #[test]
    fn scope_terms_lead_with_wildcard() {
        let scope = Scope::from(Feature::Calendar);
        assert_eq!(scope.terms(), ["All", "TownEvent", "Calendar"]);
        assert_eq!(scope.to_string(), "TownEvent/Calendar");
    }
}
