//! Trait knowledge base
//!
//! Static, compiled-in data: the mineral rule table used by local inference,
//! and the priority-ordered visual criteria plus escape hatches used to build
//! the remote system prompt. Coverage is intentionally small and limited to
//! field-identifiable minerals.

use crate::types::MineralRule;

/// Mineral rules. Declaration order is the inference tie-break:
/// on equal match counts the earlier rule wins.
pub static MINERAL_RULES: &[MineralRule] = &[
    MineralRule {
        name: "Quartz (SiO₂)",
        traits: &["Glassy", "Transparent", "Translucent", "Hexagonal", "Conchoidal", "Colorless"],
        min_matches: 3,
    },
    MineralRule {
        name: "Calcite (CaCO₃)",
        traits: &["Rhombohedral", "Glassy", "Pearly", "White", "Transparent"],
        min_matches: 2,
    },
    MineralRule {
        name: "Feldspar",
        traits: &["Opaque", "Glassy", "Pink", "White", "Blocky"],
        min_matches: 3,
    },
    MineralRule {
        name: "Pyrite (FeS₂)",
        traits: &["Metallic", "Gold", "Yellow", "Cubic", "Massive"],
        min_matches: 3,
    },
    MineralRule {
        name: "Galena (PbS)",
        traits: &["Metallic", "Cubic", "Silver", "Grey", "Opaque", "Heavy"],
        min_matches: 3,
    },
    MineralRule {
        name: "Hematite (Fe₂O₃)",
        traits: &["Red", "Brown", "Dull", "Earthy", "Metallic"],
        min_matches: 2,
    },
    MineralRule {
        name: "Magnetite (Fe₃O₄)",
        traits: &["Metallic", "Black", "Opaque", "Magnetic"],
        min_matches: 3,
    },
    MineralRule {
        name: "Halite (NaCl)",
        traits: &["Cubic", "Transparent", "Colorless", "Salty"],
        min_matches: 3,
    },
    MineralRule {
        name: "Gypsum (CaSO₄·2H₂O)",
        traits: &["White", "Transparent", "Tabular", "Soft"],
        min_matches: 2,
    },
];

/// A visual criterion the remote engine asks about, in priority order
#[derive(Debug, Clone, Copy)]
pub struct VisualCriterion {
    /// Category name (also used in `completed_categories`)
    pub category: &'static str,
    /// Standard options
    pub options: &'static [&'static str],
    /// Escape-hatch options; at least one is appended to every question
    pub escape_hatches: &'static [&'static str],
}

/// Visual criteria, highest priority first
pub static VISUAL_CRITERIA: &[VisualCriterion] = &[
    VisualCriterion {
        category: "Color",
        options: &["Overall", "Variations", "Uniform vs Mixed"],
        escape_hatches: &["Clear / Colorless", "Other"],
    },
    VisualCriterion {
        category: "Luster",
        options: &["Glassy", "Metallic", "Pearly", "Dull", "Waxy", "Silky"],
        escape_hatches: &["Dull / Earthy", "Unsure"],
    },
    VisualCriterion {
        category: "Transparency",
        options: &["Transparent", "Translucent", "Opaque"],
        escape_hatches: &["Unsure"],
    },
    VisualCriterion {
        category: "Crystal Shape",
        options: &["Cubic", "Hexagonal", "Rhombohedral", "Prismatic", "Massive"],
        escape_hatches: &["No Visible Crystals (Massive)"],
    },
    VisualCriterion {
        category: "Cleavage",
        options: &["Cleavage (1, 2, 3 directions)", "Fracture (Conchoidal, Irregular)"],
        escape_hatches: &["No Cleavage (Fracture)", "Unsure"],
    },
    VisualCriterion {
        category: "Texture",
        options: &["Smooth", "Rough", "Grainy", "Layered"],
        escape_hatches: &["Other / Mixed"],
    },
    VisualCriterion {
        category: "Impurities",
        options: &["Veins", "Specks", "Bubbles"],
        escape_hatches: &["None Visible"],
    },
    VisualCriterion {
        category: "Tarnish",
        options: &["Rust", "Oxidation colors"],
        escape_hatches: &["No Tarnish Visible"],
    },
    VisualCriterion {
        category: "Growth",
        options: &["Single", "Clustered", "Radiating"],
        escape_hatches: &["Massive / No Pattern"],
    },
    VisualCriterion {
        category: "Appearance",
        options: &["Glass-like", "Metal-like", "Rock-like"],
        escape_hatches: &["Unsure"],
    },
];

/// Look up a criterion by category name (case-insensitive)
pub fn criterion(category: &str) -> Option<&'static VisualCriterion> {
    VISUAL_CRITERIA
        .iter()
        .find(|c| c.category.eq_ignore_ascii_case(category))
}

/// Check every rule is well formed and names are unique.
/// Returns the names of offending rules.
pub fn validate_rules(rules: &[MineralRule]) -> Result<(), Vec<&'static str>> {
    let mut bad: Vec<&'static str> = rules
        .iter()
        .filter(|r| !r.is_well_formed())
        .map(|r| r.name)
        .collect();

    for (i, rule) in rules.iter().enumerate() {
        if rules[..i].iter().any(|earlier| earlier.name == rule.name) {
            bad.push(rule.name);
        }
    }

    if bad.is_empty() {
        Ok(())
    } else {
        Err(bad)
    }
}
