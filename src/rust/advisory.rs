//! Maps a predicted label to a disposal tip.
//!
//! The mapping is an ordered decision list kept as data: each [`AdvisoryRule`]
//! pairs a keyword predicate with a tip, rules are tried in order, and the first
//! rule with a keyword contained in the label wins. Order is significant: a
//! "glass bottle" resolves to the plastic/bottle rule because that rule comes
//! first.

use std::fmt;

use lazy_static::lazy_static;
use serde::Serialize;

/// Tip used when no rule matches.
pub const GENERIC_TIP: &str = "Please refer to local recycling guidelines.";

/// Broad disposal stream a rule stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WasteCategory {
    PlasticBottle,
    MetalCan,
    PaperCardboard,
    Glass,
    Organic,
    General,
}

impl fmt::Display for WasteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WasteCategory::PlasticBottle => "plastic bottle",
            WasteCategory::MetalCan => "metal can",
            WasteCategory::PaperCardboard => "paper/cardboard",
            WasteCategory::Glass => "glass",
            WasteCategory::Organic => "organic",
            WasteCategory::General => "general",
        };
        f.write_str(name)
    }
}

/// One row of the decision list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvisoryRule {
    pub category: WasteCategory,
    /// Lower-case substrings; any one of them selects this rule
    pub keywords: Vec<String>,
    pub tip: String,
}

impl AdvisoryRule {
    pub fn new(category: WasteCategory, keywords: &[&str], tip: impl Into<String>) -> Self {
        Self {
            category,
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            tip: tip.into(),
        }
    }

    fn matches(&self, lowered_label: &str) -> bool {
        self.keywords.iter().any(|k| lowered_label.contains(k.as_str()))
    }
}

/// The outcome of a lookup: which stream the label fell into and what to tell the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advice<'a> {
    pub category: WasteCategory,
    pub tip: &'a str,
}

/// Ordered keyword rules with a fallback tip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvisoryMapper {
    rules: Vec<AdvisoryRule>,
    fallback: String,
}

lazy_static! {
    static ref DEFAULT_MAPPER: AdvisoryMapper = AdvisoryMapper::new(
        vec![
            AdvisoryRule::new(
                WasteCategory::PlasticBottle,
                &["bottle", "plastic"],
                "Plastic bottles are often recyclable. Empty, rinse, and remove caps (check local rules if caps should be on or off).",
            ),
            AdvisoryRule::new(
                WasteCategory::MetalCan,
                &["can", "aluminum", "tin"],
                "Metal cans are usually recyclable. Empty and rinse them before placing in the recycling bin.",
            ),
            AdvisoryRule::new(
                WasteCategory::PaperCardboard,
                &["paper", "cardboard"],
                "Clean paper and cardboard are widely recyclable. Flatten boxes. Avoid soiled paper (e.g., greasy pizza boxes).",
            ),
            AdvisoryRule::new(
                WasteCategory::Glass,
                &["glass"],
                "Glass bottles and jars are recyclable. Rinse them and check if your local facility requires sorting by color.",
            ),
            AdvisoryRule::new(
                WasteCategory::Organic,
                &["organic", "food", "compost"],
                "Organic waste like fruit peels or vegetable scraps can often be composted. Check for local composting programs.",
            ),
        ],
        GENERIC_TIP,
    );
}

impl Default for AdvisoryMapper {
    fn default() -> Self {
        DEFAULT_MAPPER.clone()
    }
}

impl AdvisoryMapper {
    pub fn new(rules: Vec<AdvisoryRule>, fallback: impl Into<String>) -> Self {
        Self {
            rules,
            fallback: fallback.into(),
        }
    }

    /// Appends a rule after the existing ones, so it only applies when no
    /// earlier rule matches.
    pub fn with_rule(mut self, rule: AdvisoryRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[AdvisoryRule] {
        &self.rules
    }

    /// Looks up the category and tip for a label. Matching ignores case.
    pub fn advise(&self, label: &str) -> Advice<'_> {
        let lowered = label.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&lowered))
            .map(|rule| Advice {
                category: rule.category,
                tip: &rule.tip,
            })
            .unwrap_or(Advice {
                category: WasteCategory::General,
                tip: &self.fallback,
            })
    }

    /// Returns the disposal tip for a label. Total and side-effect free.
    pub fn map_to_tip(&self, label: &str) -> &str {
        self.advise(label).tip
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tip_for(category: WasteCategory) -> String {
        AdvisoryMapper::default()
            .rules()
            .iter()
            .find(|r| r.category == category)
            .map(|r| r.tip.clone())
            .unwrap()
    }

    #[test]
    fn test_each_rule_is_reachable() {
        let mapper = AdvisoryMapper::default();
        assert_eq!(mapper.advise("water bottle").category, WasteCategory::PlasticBottle);
        assert_eq!(mapper.advise("plastic bag").category, WasteCategory::PlasticBottle);
        assert_eq!(mapper.advise("beer can").category, WasteCategory::MetalCan);
        assert_eq!(mapper.advise("aluminum foil").category, WasteCategory::MetalCan);
        assert_eq!(mapper.advise("tin opener").category, WasteCategory::MetalCan);
        assert_eq!(mapper.advise("paper towel").category, WasteCategory::PaperCardboard);
        assert_eq!(mapper.advise("cardboard box").category, WasteCategory::PaperCardboard);
        assert_eq!(mapper.advise("wine glass").category, WasteCategory::Glass);
        assert_eq!(mapper.advise("compost heap").category, WasteCategory::Organic);
        assert_eq!(mapper.advise("dog food").category, WasteCategory::Organic);
        assert_eq!(mapper.advise("organic matter").category, WasteCategory::Organic);
    }

    #[test]
    fn test_glass_bottle_resolves_to_bottle_rule() {
        let mapper = AdvisoryMapper::default();
        assert_eq!(
            mapper.map_to_tip("glass bottle, container"),
            tip_for(WasteCategory::PlasticBottle)
        );
    }

    #[test]
    fn test_matching_ignores_case() {
        let mapper = AdvisoryMapper::default();
        assert_eq!(mapper.map_to_tip("GLASS Bottle"), tip_for(WasteCategory::PlasticBottle));
        assert_eq!(mapper.map_to_tip("Carton, PAPER"), tip_for(WasteCategory::PaperCardboard));
    }

    #[test]
    fn test_substring_containment_is_literal() {
        // "pelican" contains "can"
        let mapper = AdvisoryMapper::default();
        assert_eq!(mapper.advise("pelican").category, WasteCategory::MetalCan);
    }

    #[test]
    fn test_unmatched_label_gets_generic_tip() {
        let mapper = AdvisoryMapper::default();
        assert_eq!(mapper.map_to_tip("golden retriever"), GENERIC_TIP);
        assert_eq!(mapper.map_to_tip(""), GENERIC_TIP);
        assert_eq!(mapper.advise("golden retriever").category, WasteCategory::General);
    }

    #[test]
    fn test_lookup_is_idempotent() {
        let mapper = AdvisoryMapper::default();
        let before = mapper.clone();
        let first = mapper.map_to_tip("beer bottle").to_string();
        for _ in 0..5 {
            assert_eq!(mapper.map_to_tip("beer bottle"), first);
        }
        assert_eq!(mapper, before);
    }

    #[test]
    fn test_appended_rule_has_lowest_precedence() {
        let mapper = AdvisoryMapper::default().with_rule(AdvisoryRule::new(
            WasteCategory::General,
            &["battery", "bottle"],
            "Take batteries to a hazardous waste drop-off.",
        ));
        assert_eq!(mapper.map_to_tip("battery pack"), "Take batteries to a hazardous waste drop-off.");
        assert_eq!(mapper.advise("milk bottle").category, WasteCategory::PlasticBottle);
    }
}
