//! Validity decision
//!
//! Decides L(G_S) ⊆ pre_M(L(G_T)) by pattern cover: every top-level
//! source pattern must be covered by some accepted preimage pattern.
//! Uncovered patterns become counterexamples with a generated skeletal
//! instance, so a failing transformation points at concrete inputs.

use serde::Serialize;

use crate::grammar::{Production, TreeGrammar};
use crate::preimage::{InputPattern, PreimageReport};

/// A source pattern not covered by the preimage
#[derive(Debug, Clone, Serialize)]
pub struct Counterexample {
    /// Source element
    pub element: String,
    /// The uncovered pattern, e.g. `Organization(OrgName)`
    pub pattern: String,
    /// Why no preimage pattern accepts it
    pub reason: String,
    /// Skeletal XML instance exhibiting the gap
    pub example_xml: String,
}

/// Result of the validity decision
#[derive(Debug, Clone, Serialize)]
pub struct ValidityReport {
    /// Whether L(G_S) ⊆ pre_M(L(G_T))
    pub valid: bool,
    /// Total top-level source patterns
    pub total: usize,
    /// Patterns covered by the preimage
    pub covered: usize,
    /// Patterns not covered
    pub uncovered: usize,
    /// One counterexample per uncovered pattern
    pub counterexamples: Vec<Counterexample>,
    /// covered / total × 100
    pub coverage_percent: f64,
    /// Human-readable summary
    pub explanation: String,
}

/// Top-level source pattern extracted from the grammar
struct SourcePattern<'a> {
    element: &'a str,
    children: Vec<String>,
    production: &'a Production,
}

/// Decides validity of the transformation against the preimage
#[derive(Debug, Default)]
pub struct ValidityChecker;

impl ValidityChecker {
    /// Create a checker
    pub fn new() -> Self {
        Self
    }

    /// Check that every top-level source pattern is covered by an
    /// accepted preimage pattern.
    pub fn check(&self, source: &TreeGrammar, preimage: &PreimageReport) -> ValidityReport {
        let patterns = extract_source_patterns(source);
        let total = patterns.len();

        let mut counterexamples = Vec::new();
        let mut covered = 0usize;

        for pattern in &patterns {
            if covering_pattern(pattern, &preimage.accepted_patterns).is_some() {
                covered += 1;
            } else {
                counterexamples.push(Counterexample {
                    element: pattern.element.to_string(),
                    pattern: format!("{}({})", pattern.element, pattern.children.join(", ")),
                    reason: format!(
                        "no preimage pattern accepts '{}'; the element is not transformed \
                         or fails the target constraints",
                        pattern.element
                    ),
                    example_xml: skeletal_instance(pattern.production),
                });
            }
        }

        let uncovered = counterexamples.len();
        let coverage_percent = if total > 0 {
            covered as f64 / total as f64 * 100.0
        } else {
            100.0
        };
        let valid = uncovered == 0;

        let explanation = if valid {
            format!(
                "validity holds: all {} source pattern(s) are covered by the preimage; \
                 every valid source document transforms to a valid target document",
                total
            )
        } else {
            format!(
                "validity does not hold: {} source pattern(s) are not covered by the \
                 preimage; some valid source documents produce invalid output or are \
                 not transformed at all",
                uncovered
            )
        };

        ValidityReport {
            valid,
            total,
            covered,
            uncovered,
            counterexamples,
            coverage_percent,
            explanation,
        }
    }
}

/// Top-level source patterns: every production that is not a simple leaf,
/// plus the root always.
fn extract_source_patterns(source: &TreeGrammar) -> Vec<SourcePattern<'_>> {
    source
        .productions
        .iter()
        .filter(|prod| !prod.is_leaf() || prod.lhs == source.root_element)
        .map(|prod| SourcePattern {
            element: &prod.lhs,
            children: if prod.rhs.is_empty() {
                vec!["*".to_string()]
            } else {
                prod.rhs.clone()
            },
            production: prod,
        })
        .collect()
}

/// First accepted pattern covering the source pattern: element names must
/// agree and the preimage children must be the wildcard or a superset of
/// the source children.
fn covering_pattern<'a>(
    pattern: &SourcePattern<'_>,
    accepted: &'a [InputPattern],
) -> Option<&'a InputPattern> {
    accepted.iter().find(|candidate| {
        if candidate.element != pattern.element {
            return false;
        }
        if candidate.children == ["*"] || candidate.children == ["children"] {
            return true;
        }
        pattern
            .children
            .iter()
            .all(|child| candidate.children.contains(child))
    })
}

/// Generate a skeletal XML instance for a production
fn skeletal_instance(production: &Production) -> String {
    let mut xml = format!("<{}>\n", production.lhs);
    for child in &production.rhs {
        xml.push_str(&format!("  <{}>example_value</{}>\n", child, child));
    }
    xml.push_str(&format!("</{}>", production.lhs));
    xml
}
