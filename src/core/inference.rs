//! Local Inference Engine: deterministic rule scoring
//!
//! For each rule, count how many of its traits were observed. A rule
//! qualifies once the count reaches its threshold; the qualifying rule with
//! the highest count wins, ties going to the rule declared first.

use std::collections::HashSet;

use tracing::trace;

use crate::core::knowledge::MINERAL_RULES;
use crate::types::{canonical_trait, MatchResult, MineralRule, ObservationSet};
use crate::CONFIDENCE_BASELINE;

/// Score observations against the built-in knowledge base.
///
/// `None` means "insufficient evidence", a normal outcome.
pub fn infer(observations: &ObservationSet) -> Option<MatchResult> {
    infer_with(MINERAL_RULES, observations)
}

/// Score observations against an explicit rule table
pub fn infer_with(rules: &[MineralRule], observations: &ObservationSet) -> Option<MatchResult> {
    let observed: HashSet<&str> = observations.canonical_keys().collect();

    let mut best: Option<(&MineralRule, usize)> = None;
    for rule in rules {
        let count = match_count(rule, &observed);
        if count < rule.min_matches {
            continue;
        }
        trace!(rule = rule.name, count, "rule qualifies");
        // Strictly greater: an equal count never displaces an earlier rule
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((rule, count));
        }
    }

    best.map(|(rule, count)| MatchResult {
        name: rule.name.to_string(),
        confidence: confidence_for(count),
        match_count: count,
    })
}

/// min(count / 4, 1.0)
pub fn confidence_for(match_count: usize) -> f64 {
    (match_count as f64 / CONFIDENCE_BASELINE).min(1.0)
}

fn match_count(rule: &MineralRule, observed: &HashSet<&str>) -> usize {
    rule.traits
        .iter()
        .filter(|t| observed.contains(canonical_trait(t).as_str()))
        .count()
}
