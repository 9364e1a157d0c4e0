use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

const DEFAULT_FACTS: [&str; 8] = [
    "Recycling one aluminum can save enough energy to run a TV for 3 hours.",
    "Glass can be recycled endlessly without losing quality or purity.",
    "Around 8 million metric tons of plastic are dumped into our oceans every year.",
    "Composting food scraps can reduce landfill waste by up to 30%.",
    "Recycling paper saves trees and reduces greenhouse gas emissions.",
    "The average person generates over 4 pounds of trash every day.",
    "E-waste contains valuable materials like gold and silver that can be recovered through recycling.",
    "Plastic bags can take up to 1,000 years to decompose in landfills.",
];

/// A short informational note shown next to a successful classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Fact(String);

impl Fact {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Uniform random picks from a fixed catalog. Holds no memory of earlier
/// picks, so repeats are possible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactProvider {
    catalog: Vec<String>,
}

impl Default for FactProvider {
    fn default() -> Self {
        Self::new(DEFAULT_FACTS.iter().map(|f| f.to_string()).collect())
    }
}

impl FactProvider {
    pub fn new(catalog: Vec<String>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &[String] {
        &self.catalog
    }

    /// Picks a fact using the thread-local RNG. `None` only for an empty catalog.
    pub fn pick_fact(&self) -> Option<Fact> {
        self.pick_fact_with(&mut rand::thread_rng())
    }

    pub fn pick_fact_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Fact> {
        self.catalog.choose(rng).cloned().map(Fact)
    }
}
