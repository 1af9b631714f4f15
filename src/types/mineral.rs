//! Mineral rules and match results

use serde::{Deserialize, Serialize};

/// Knowledge-base entry: mineral, diagnostic traits, qualification threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MineralRule {
    /// Display name (with formula where known)
    pub name: &'static str,
    /// Diagnostic traits, in declaration order
    pub traits: &'static [&'static str],
    /// Traits that must be observed before the rule qualifies
    pub min_matches: usize,
}

impl MineralRule {
    /// Check `1 <= min_matches <= traits.len()`
    pub fn is_well_formed(&self) -> bool {
        self.min_matches >= 1 && self.min_matches <= self.traits.len()
    }
}

/// Best candidate from local inference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Mineral name
    pub name: String,
    /// min(match_count / 4, 1.0)
    pub confidence: f64,
    /// Rule traits present in the observation set
    pub match_count: usize,
}

impl std::fmt::Display for MatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} traits, {:.0}%)",
            self.name,
            self.match_count,
            self.confidence * 100.0
        )
    }
}
