//! Category (swimlane)
//!
//! The closed set of buckets a card can live in. Rows carry the raw tag string;
//! everything past the row boundary uses this enum.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::entity::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    WhatWentWell,
    ToImprove,
    ActionItems,
}

impl Category {
    /// Board order
    pub const ALL: [Category; 3] = [Category::WhatWentWell, Category::ToImprove, Category::ActionItems];

    /// Tag stored in the `swimlane` column
    pub fn as_tag(&self) -> &'static str {
        match self {
            Category::WhatWentWell => "whatWentWell",
            Category::ToImprove => "toImprove",
            Category::ActionItems => "actionItems",
        }
    }

    /// Strict parse of a stored tag; unknown tags yield `None`
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "whatWentWell" => Some(Category::WhatWentWell),
            "toImprove" => Some(Category::ToImprove),
            "actionItems" => Some(Category::ActionItems),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::WhatWentWell => "What Went Well",
            Category::ToImprove => "To Improve",
            Category::ActionItems => "Action Items",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Lenient parse for user input: stored tags in any case, plus kebab-case names
impl FromStr for Category {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "whatwentwell" | "wentwell" | "well" => Ok(Category::WhatWentWell),
            "toimprove" | "improve" => Ok(Category::ToImprove),
            "actionitems" | "actionitem" | "actions" | "action" => Ok(Category::ActionItems),
            _ => Err(DomainError::Validation(format!(
                "unknown category '{}' (expected one of: whatWentWell, toImprove, actionItems)",
                s.trim()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::from_tag(category.as_tag()), Some(category));
        }
    }

    #[test]
    fn test_unknown_tag_is_none() {
        assert_eq!(Category::from_tag("parkingLot"), None);
        assert_eq!(Category::from_tag("ToImprove"), None);
        assert_eq!(Category::from_tag(""), None);
    }

    #[test]
    fn test_user_input_aliases() {
        assert_eq!("to-improve".parse::<Category>().unwrap(), Category::ToImprove);
        assert_eq!("WhatWentWell".parse::<Category>().unwrap(), Category::WhatWentWell);
        assert_eq!(" action_items ".parse::<Category>().unwrap(), Category::ActionItems);
        assert!(matches!("later".parse::<Category>(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_serde_uses_tags() {
        let json = serde_json::to_string(&Category::ActionItems).unwrap();
        assert_eq!(json, "\"actionItems\"");
    }
}
