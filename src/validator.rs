//! Type-preservation validation
//!
//! Checks that the transducer maps every tree of the source grammar to a
//! tree of the target grammar, by structural induction over matched
//! productions: structural coverage, type-constraint compatibility, and
//! cardinality compatibility. Every check appends to a proof trace; the
//! trace alone reconstructs the argument.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::grammar::{TreeGrammar, TypeConstraint};
use crate::trace::ProofTrace;
use crate::transducer::Mtt;

/// Numeric base types that widen into each other
const NUMERIC_TYPES: [&str; 6] = ["integer", "int", "long", "decimal", "float", "double"];

/// String base types a source `string` may map into
const STRINGLIKE_TYPES: [&str; 3] = ["string", "normalizedString", "token"];

/// One row of the coverage matrix
#[derive(Debug, Clone)]
pub struct CoverageEntry {
    /// Source production lhs
    pub source: String,
    /// Resolved target element or attribute, `None` when unmapped
    pub target: Option<String>,
}

impl CoverageEntry {
    /// Whether the source element reaches the target
    pub fn is_covered(&self) -> bool {
        self.target.is_some()
    }
}

impl Serialize for CoverageEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CoverageEntry", 3)?;
        state.serialize_field("source", &self.source)?;
        match &self.target {
            Some(target) => state.serialize_field("target", target)?,
            None => state.serialize_field("target", "UNMAPPED")?,
        }
        state.serialize_field("status", if self.is_covered() { "✓" } else { "✗" })?;
        state.end()
    }
}

/// Result of type-preservation validation
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// Whether type preservation holds (no errors)
    pub valid: bool,
    /// Hard incompatibilities
    pub errors: Vec<String>,
    /// Constraints the source does not guarantee
    pub warnings: Vec<String>,
    /// Ordered proof trace
    #[serde(rename = "proof_steps")]
    pub proof: ProofTrace,
    /// Source-to-target coverage matrix
    pub coverage: Vec<CoverageEntry>,
}

/// Validates type preservation of a transducer between two grammars
#[derive(Debug, Default)]
pub struct TypePreservationValidator {
    proof: ProofTrace,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl TypePreservationValidator {
    /// Create a validator
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate that the MTT maps L(G_S) into L(G_T)
    pub fn validate(
        mut self,
        source: &TreeGrammar,
        target: &TreeGrammar,
        mtt: &Mtt,
    ) -> ValidationReport {
        self.proof.section("Type Preservation Validation");
        self.proof
            .info(format!("source grammar root: {}", source.root_element));
        self.proof
            .info(format!("target grammar root: {}", target.root_element));
        self.proof.info(format!("MTT states: {}", mtt.states.len()));

        self.proof.section("Step 1: Structural Validation");
        self.validate_structure(source, mtt);

        self.proof.section("Step 2: Type Constraint Validation");
        self.validate_type_constraints(source, target, mtt);

        self.proof.section("Step 3: Cardinality Validation");
        self.validate_cardinality(source, target, mtt);

        let coverage = self.build_coverage_matrix(source, target, mtt);

        let valid = self.errors.is_empty();
        if valid {
            self.proof.ok("conclusion: type preservation is satisfied");
        } else {
            self.proof.error(format!(
                "conclusion: type preservation FAILED ({} error(s))",
                self.errors.len()
            ));
        }

        ValidationReport {
            valid,
            errors: self.errors,
            warnings: self.warnings,
            proof: self.proof,
            coverage,
        }
    }

    fn validate_structure(&mut self, source: &TreeGrammar, mtt: &Mtt) {
        let root_covered = mtt
            .rules
            .iter()
            .any(|r| r.pattern.element == source.root_element);

        if root_covered {
            self.proof.ok(format!(
                "root element mapping found: {}",
                source.root_element
            ));
        } else {
            let message = format!(
                "no transformation rule for root element '{}'",
                source.root_element
            );
            self.proof.error(message.as_str());
            self.errors.push(message);
        }

        for prod in &source.productions {
            let covered = mtt
                .rules
                .iter()
                .any(|r| r.pattern.element == prod.lhs || r.output.mentions(&prod.lhs));

            if covered {
                self.proof.ok(format!(
                    "production covered: {} → [{}]",
                    prod.lhs,
                    prod.rhs.join(", ")
                ));
            } else {
                let message = format!(
                    "production not covered: {} → [{}] (element is silently dropped)",
                    prod.lhs,
                    prod.rhs.join(", ")
                );
                self.proof.warn(message.as_str());
                self.warnings.push(message);
            }
        }

        // Discarded subtrees reported by the transducer builder surface
        // here as structural warnings.
        for warning in &mtt.warnings {
            self.proof.warn(warning.as_str());
            self.warnings.push(warning.clone());
        }
    }

    fn validate_type_constraints(
        &mut self,
        source: &TreeGrammar,
        target: &TreeGrammar,
        mtt: &Mtt,
    ) {
        for (elem_name, src_constraint) in source.type_constraints.iter() {
            self.proof
                .info(format!("checking type constraint for: {}", elem_name));

            let Some(target_name) = resolve_target(elem_name, mtt, target) else {
                let message = format!(
                    "could not find target element for source element: {}",
                    elem_name
                );
                self.proof.warn(message.as_str());
                self.warnings.push(message);
                continue;
            };

            let Some(tgt_constraint) = target.type_constraints.get(&target_name) else {
                self.proof
                    .warn(format!("no type constraint in target for {}", target_name));
                continue;
            };

            if types_compatible(&src_constraint.base_type, &tgt_constraint.base_type) {
                self.proof.ok(format!(
                    "type compatible: {} → {}",
                    src_constraint.base_type, tgt_constraint.base_type
                ));
                self.check_restrictions(
                    elem_name,
                    src_constraint,
                    &target_name,
                    tgt_constraint,
                    mtt,
                );
            } else {
                let message = format!(
                    "type incompatibility: {} ({} → {})",
                    elem_name, src_constraint.base_type, tgt_constraint.base_type
                );
                self.proof.error(message.as_str());
                self.errors.push(message);
            }
        }
    }

    /// Restriction keys the target requires but the source does not
    /// guarantee become warnings, unless the governing rule's guard
    /// implies them.
    fn check_restrictions(
        &mut self,
        source_elem: &str,
        src_constraint: &TypeConstraint,
        target_name: &str,
        tgt_constraint: &TypeConstraint,
        mtt: &Mtt,
    ) {
        let guard = governing_guard(source_elem, mtt);
        let mut enumeration_done = false;

        for facet in &tgt_constraint.restrictions {
            if src_constraint.has_restriction(&facet.name) {
                continue;
            }

            if facet.name == "enumeration" {
                if enumeration_done {
                    continue;
                }
                enumeration_done = true;

                let allowed = tgt_constraint.enumeration_values();
                if let Some(guard) = guard {
                    if guard.predicate.implies_enumeration(source_elem, &allowed) {
                        self.proof.ok(format!(
                            "guard '{}' ensures enumeration on '{}'",
                            guard.raw, target_name
                        ));
                        continue;
                    }
                }
                let message = format!(
                    "target '{}' restricts values to enumeration {{{}}}; source '{}' \
                     carries no enumeration",
                    target_name,
                    allowed.join(", "),
                    source_elem
                );
                self.proof.warn(message.as_str());
                self.warnings.push(message);
                continue;
            }

            if let Some(guard) = guard {
                if guard
                    .predicate
                    .implies_bound(source_elem, &facet.name, &facet.value)
                {
                    self.proof.ok(format!(
                        "guard '{}' ensures {}={} on '{}'",
                        guard.raw, facet.name, facet.value, target_name
                    ));
                    continue;
                }
            }

            let message = format!(
                "target '{}' has {}={}; source values for '{}' are not guaranteed \
                 to satisfy this constraint",
                target_name, facet.name, facet.value, source_elem
            );
            self.proof.warn(message.as_str());
            self.warnings.push(message);
        }
    }

    fn validate_cardinality(&mut self, source: &TreeGrammar, target: &TreeGrammar, mtt: &Mtt) {
        for src_prod in &source.productions {
            let Some(target_name) = resolve_target(&src_prod.lhs, mtt, target) else {
                continue;
            };
            let Some(tgt_prod) = target.production(&target_name) else {
                continue;
            };

            let src_card = src_prod.cardinality;
            let tgt_card = tgt_prod.cardinality;
            self.proof.info(format!(
                "cardinality check: {} {} → {} {}",
                src_prod.lhs, src_card, tgt_prod.lhs, tgt_card
            ));

            let mut conflicts = Vec::new();
            if src_card.is_optional() && tgt_card.min > 0 {
                conflicts.push("source may be empty but target requires presence");
            }
            if src_card.is_many() && tgt_card.max == Some(1) {
                conflicts.push("many occurrences collapse into one");
            }

            if conflicts.is_empty() {
                self.proof.ok("cardinality compatible");
            } else {
                let message = format!(
                    "cardinality mismatch: {} {} → {} {}: {}",
                    src_prod.lhs,
                    src_card,
                    tgt_prod.lhs,
                    tgt_card,
                    conflicts.join("; ")
                );
                self.proof.warn(message.as_str());
                self.warnings.push(message);
            }
        }
    }

    fn build_coverage_matrix(
        &mut self,
        source: &TreeGrammar,
        target: &TreeGrammar,
        mtt: &Mtt,
    ) -> Vec<CoverageEntry> {
        source
            .productions
            .iter()
            .map(|prod| CoverageEntry {
                source: prod.lhs.clone(),
                target: resolve_target(&prod.lhs, mtt, target),
            })
            .collect()
    }
}

/// Resolve the target element or attribute a source name maps to:
/// a rule matching it directly yields its outermost literal element, a
/// rule reading it through an attribute yields that attribute's name, and
/// failing both, a same-name element in the target grammar.
fn resolve_target(source_elem: &str, mtt: &Mtt, target: &TreeGrammar) -> Option<String> {
    for rule in mtt.rules_for(source_elem) {
        if let Some(name) = rule.output.outermost_element() {
            return Some(name.to_string());
        }
    }

    for rule in &mtt.rules {
        if let Some(attr) = rule.output.attribute_reading(source_elem) {
            return Some(attr.to_string());
        }
    }

    if target.has_element(source_elem) {
        return Some(source_elem.to_string());
    }

    None
}

/// The guard of the rule that governs a source name: the rule matching it
/// directly, or the rule reading it through an attribute.
fn governing_guard<'a>(source_elem: &str, mtt: &'a Mtt) -> Option<&'a crate::transducer::Guard> {
    for rule in mtt.rules_for(source_elem) {
        if rule.guard.is_some() {
            return rule.guard.as_ref();
        }
    }
    mtt.rules
        .iter()
        .find(|r| r.output.attribute_reading(source_elem).is_some())
        .and_then(|r| r.guard.as_ref())
}

fn types_compatible(src: &str, tgt: &str) -> bool {
    if src == tgt {
        return true;
    }
    if NUMERIC_TYPES.contains(&src) && NUMERIC_TYPES.contains(&tgt) {
        return true;
    }
    src == "string" && STRINGLIKE_TYPES.contains(&tgt)
}
