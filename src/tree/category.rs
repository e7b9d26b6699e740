//! Display category of a tree node.

use super::node::SCORE_NO_DUPES;

/// How a node's subtree relates to the dupe set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Everything below is part of some dupe.
    Dupe,
    /// Nothing below is part of any dupe.
    Unique,
    /// The node is itself a dupe, but unique content exists below it.
    MixedUniqueBelow,
    /// The node is not a dupe itself; its subtree mixes dupes and unique content.
    MixedDupeBelow,
    /// The scores contradict each other.
    Inconsistent,
}

impl Category {
    /// Short label for text output.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Dupe => "dupe",
            Self::Unique => "unique",
            Self::MixedUniqueBelow => "dupe+unique",
            Self::MixedDupeBelow => "mixed",
            Self::Inconsistent => "??",
        }
    }
}

/// Classify a node from its subtree minimum, maximum and own score.
///
/// A pure function: the same triple always yields the same category.
#[must_use]
pub fn classify(smin: f64, smax: f64, scur: Option<f64>) -> Category {
    if smin.is_nan() || smax.is_nan() || scur.is_some_and(f64::is_nan) || smin > smax {
        return Category::Inconsistent;
    }
    if let Some(s) = scur {
        if s < smin || s > smax || s <= SCORE_NO_DUPES {
            return Category::Inconsistent;
        }
    }
    if smax <= SCORE_NO_DUPES {
        Category::Unique
    } else if smin > SCORE_NO_DUPES {
        Category::Dupe
    } else if scur.is_some() {
        Category::MixedUniqueBelow
    } else {
        Category::MixedDupeBelow
    }
}
