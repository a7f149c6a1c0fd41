//! Rule-indexed preimage computation
//!
//! For each transducer rule, decides whether its output skeleton is valid
//! in the target grammar and, if so, reconstructs the input pattern the
//! rule accepts together with the constraints a matching input must
//! satisfy. The accepted patterns approximate pre_M(L(G_T)) and feed the
//! validity decision.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;

use crate::grammar::TreeGrammar;
use crate::transducer::{AttrValue, Branch, ChildrenMatch, Mtt, OutputNode, Rule};

/// Bound facets that synthesize predicates over the source path
const BOUND_FACETS: [(&str, &str); 4] = [
    ("minInclusive", ">="),
    ("maxInclusive", "<="),
    ("minExclusive", ">"),
    ("maxExclusive", "<"),
];

/// An accepted input pattern with its constraints
#[derive(Debug, Clone)]
pub struct InputPattern {
    /// Matched element name
    pub element: String,
    /// Child names, or `["*"]` for any
    pub children: Vec<String>,
    /// Atomic predicates a matching input must satisfy, normalized
    pub constraints: Vec<String>,
}

impl fmt::Display for InputPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.children.is_empty() {
            write!(f, "{}", self.element)?;
        } else {
            write!(f, "{}({})", self.element, self.children.join(", "))?;
        }
        if !self.constraints.is_empty() {
            write!(f, " where {}", self.constraints.join(" and "))?;
        }
        Ok(())
    }
}

impl Serialize for InputPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("InputPattern", 4)?;
        state.serialize_field("element", &self.element)?;
        state.serialize_field("children", &self.children)?;
        state.serialize_field("constraints", &self.constraints)?;
        state.serialize_field("pattern_string", &self.to_string())?;
        state.end()
    }
}

/// A rule whose output cannot be valid in the target grammar
#[derive(Debug, Clone, Serialize)]
pub struct RejectedPattern {
    /// The rule's input pattern
    pub pattern: String,
    /// Why the output is invalid
    pub reason: String,
}

/// Preimage statistics
#[derive(Debug, Clone, Serialize)]
pub struct PreimageStats {
    /// Number of transducer rules analyzed
    pub total_rules: usize,
    /// Number of accepted input patterns
    pub accepted_patterns: usize,
    /// Number of rejected rules
    pub rejected_patterns: usize,
    /// accepted / total
    pub coverage: f64,
}

/// Result of preimage computation
#[derive(Debug, Clone, Serialize)]
pub struct PreimageReport {
    /// Accepted input patterns in rule order
    pub accepted_patterns: Vec<InputPattern>,
    /// Rejected rules with reasons
    pub rejected_patterns: Vec<RejectedPattern>,
    /// Statistics
    pub statistics: PreimageStats,
}

/// Computes the rule-indexed preimage of the target language
#[derive(Debug, Default)]
pub struct PreimageComputer;

impl PreimageComputer {
    /// Create a computer
    pub fn new() -> Self {
        Self
    }

    /// Compute the preimage of L(G_T) under the MTT
    pub fn compute(&self, target: &TreeGrammar, mtt: &Mtt) -> PreimageReport {
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();

        for rule in &mtt.rules {
            match validate_output(&rule.output, target) {
                Ok(()) => accepted.push(self.build_pattern(rule, target)),
                Err(reason) => rejected.push(RejectedPattern {
                    pattern: rule.pattern.to_string(),
                    reason,
                }),
            }
        }

        let total = mtt.rules.len();
        let statistics = PreimageStats {
            total_rules: total,
            accepted_patterns: accepted.len(),
            rejected_patterns: rejected.len(),
            coverage: if total > 0 {
                accepted.len() as f64 / total as f64
            } else {
                0.0
            },
        };

        PreimageReport {
            accepted_patterns: accepted,
            rejected_patterns: rejected,
            statistics,
        }
    }

    /// Reconstruct the input pattern of an accepted rule and collect its
    /// constraints from the guard, from tests inside the output, and from
    /// target attribute restrictions reached through value templates.
    fn build_pattern(&self, rule: &Rule, target: &TreeGrammar) -> InputPattern {
        let children = match &rule.pattern.children {
            ChildrenMatch::Any => vec!["*".to_string()],
            ChildrenMatch::Names(names) => names.clone(),
        };

        let mut constraints: Vec<String> = Vec::new();
        let mut add = |constraint: String| {
            if !constraints.contains(&constraint) {
                constraints.push(constraint);
            }
        };

        if let Some(guard) = &rule.guard {
            for conjunct in guard.predicate.conjuncts() {
                if !conjunct.is_opaque() {
                    add(conjunct.to_string());
                }
            }
        }

        collect_constraint_tests(&rule.output, &mut |test| {
            for conjunct in test.predicate.conjuncts() {
                if !conjunct.is_opaque() {
                    add(conjunct.to_string());
                }
            }
        });

        visit_avt_attributes(&rule.output, &mut |element, attr_name, path| {
            let Some(decl) = target.attributes.decl(element, attr_name) else {
                return;
            };
            for facet in &decl.restrictions {
                if let Some((_, op)) = BOUND_FACETS.iter().find(|(key, _)| *key == facet.name) {
                    add(format!("{} {} {}", path, op, facet.value));
                }
            }
        });

        InputPattern {
            element: rule.pattern.element.clone(),
            children,
            constraints,
        }
    }
}

/// Check that an output skeleton only produces trees the target grammar
/// derives: every literal element exists in G_T and carries only declared
/// attributes. Recursion through `apply-templates` and `for-each` reduces
/// to the callee rule's own preimage step.
fn validate_output(output: &OutputNode, target: &TreeGrammar) -> Result<(), String> {
    match output {
        OutputNode::Text { .. } | OutputNode::ValueOf { .. } => Ok(()),
        OutputNode::ApplyTemplates { .. } | OutputNode::ForEach { .. } => Ok(()),
        OutputNode::Attribute { .. } => Ok(()),
        OutputNode::Sequence { children } => {
            for child in children {
                validate_output(child, target)?;
            }
            Ok(())
        }
        OutputNode::If { then, .. } => validate_output(then, target),
        OutputNode::Choose { branches } => {
            for branch in branches {
                validate_output(branch.body(), target)?;
            }
            Ok(())
        }
        OutputNode::Element {
            name,
            attributes,
            children,
        } => {
            if !target.has_element(name) {
                return Err(format!("element '{}' not found in target grammar", name));
            }

            for attr in attributes {
                if target.attributes.decl(name, &attr.name).is_none() {
                    return Err(format!(
                        "attribute '{}' is not declared for element '{}'",
                        attr.name, name
                    ));
                }
            }

            for child in children {
                // Dynamic attribute constructors attach to this element,
                // so their names check against its declared set.
                if let OutputNode::Attribute {
                    name: attr_name, ..
                } = child
                {
                    if target.attributes.decl(name, attr_name).is_none() {
                        return Err(format!(
                            "attribute '{}' is not declared for element '{}'",
                            attr_name, name
                        ));
                    }
                    continue;
                }
                validate_output(child, target)?;
            }
            Ok(())
        }
    }
}

/// Visit the tests that constrain a matching input: every `if` test, and
/// `when` tests of chooses without an `otherwise` (a fallback branch makes
/// the `when` conditions non-binding). Branch bodies are walked either
/// way for nested conditionals.
fn collect_constraint_tests<'a>(
    output: &'a OutputNode,
    visit: &mut impl FnMut(&'a crate::transducer::TestExpr),
) {
    match output {
        OutputNode::Sequence { children } | OutputNode::Element { children, .. } => {
            for child in children {
                collect_constraint_tests(child, visit);
            }
        }
        OutputNode::If { test, then } => {
            visit(test);
            collect_constraint_tests(then, visit);
        }
        OutputNode::Choose { branches } => {
            let has_otherwise = branches
                .iter()
                .any(|b| matches!(b, Branch::Otherwise { .. }));
            for branch in branches {
                if let Branch::When { test, .. } = branch {
                    if !has_otherwise {
                        visit(test);
                    }
                }
                collect_constraint_tests(branch.body(), visit);
            }
        }
        OutputNode::ForEach { body, .. } => collect_constraint_tests(body, visit),
        OutputNode::Attribute { children, .. } => {
            for child in children {
                collect_constraint_tests(child, visit);
            }
        }
        _ => {}
    }
}

/// Visit every attribute-value template under literal elements, in
/// document order: (element name, attribute name, source path)
fn visit_avt_attributes<'a>(
    output: &'a OutputNode,
    visit: &mut impl FnMut(&'a str, &'a str, &'a str),
) {
    match output {
        OutputNode::Element {
            name,
            attributes,
            children,
        } => {
            for attr in attributes {
                if let AttrValue::Path(path) = &attr.value {
                    visit(name, &attr.name, path);
                }
            }
            for child in children {
                visit_avt_attributes(child, visit);
            }
        }
        OutputNode::Sequence { children } => {
            for child in children {
                visit_avt_attributes(child, visit);
            }
        }
        OutputNode::If { then, .. } => visit_avt_attributes(then, visit),
        OutputNode::Choose { branches } => {
            for branch in branches {
                match branch {
                    Branch::When { body, .. } => visit_avt_attributes(body, visit),
                    Branch::Otherwise { body } => visit_avt_attributes(body, visit),
                }
            }
        }
        OutputNode::ForEach { body, .. } => visit_avt_attributes(body, visit),
        OutputNode::Attribute { children, .. } => {
            for child in children {
                visit_avt_attributes(child, visit);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::SchemaParser;
    use crate::transducer::StylesheetCompiler;

    const TARGET_XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Individual">
    <xs:complexType>
      <xs:attribute name="fullname" type="xs:string" use="required"/>
      <xs:attribute name="years">
        <xs:simpleType>
          <xs:restriction base="xs:integer">
            <xs:minInclusive value="0"/>
          </xs:restriction>
        </xs:simpleType>
      </xs:attribute>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

    fn compute(target_xsd: &str, xslt: &str) -> PreimageReport {
        let target = SchemaParser::new().parse(target_xsd).unwrap().grammar;
        let mtt = StylesheetCompiler::new().compile(xslt).unwrap();
        PreimageComputer::new().compute(&target, &mtt)
    }

    #[test]
    fn test_guarded_rule_pattern() {
        let report = compute(
            TARGET_XSD,
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="Person">
    <xsl:if test="Age &gt;= 0">
      <Individual fullname="{Name}" years="{Age}"/>
    </xsl:if>
  </xsl:template>
</xsl:stylesheet>"#,
        );

        assert_eq!(report.accepted_patterns.len(), 1);
        assert!(report.rejected_patterns.is_empty());

        let pattern = &report.accepted_patterns[0];
        assert_eq!(pattern.element, "Person");
        assert_eq!(pattern.children, vec!["*"]);
        // The guard and the mirrored if test collapse to one constraint.
        assert_eq!(pattern.constraints, vec!["Age >= 0"]);
        assert_eq!(pattern.to_string(), "Person(*) where Age >= 0");
    }

    #[test]
    fn test_unguarded_rule_has_no_constraints() {
        let report = compute(
            TARGET_XSD,
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="Person">
    <Individual fullname="{Name}" years="{Age}"/>
  </xsl:template>
</xsl:stylesheet>"#,
        );

        let pattern = &report.accepted_patterns[0];
        assert!(pattern.constraints.is_empty());
        assert_eq!(pattern.to_string(), "Person(*)");
    }

    #[test]
    fn test_unknown_target_element_rejected() {
        let report = compute(
            TARGET_XSD,
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="Person">
    <Stranger/>
  </xsl:template>
</xsl:stylesheet>"#,
        );

        assert!(report.accepted_patterns.is_empty());
        assert_eq!(report.rejected_patterns.len(), 1);
        assert_eq!(report.rejected_patterns[0].pattern, "Person(children)");
        assert!(report.rejected_patterns[0].reason.contains("Stranger"));
        assert_eq!(report.statistics.coverage, 0.0);
    }

    #[test]
    fn test_undeclared_attribute_rejected() {
        let report = compute(
            TARGET_XSD,
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="Person">
    <Individual nickname="{Name}"/>
  </xsl:template>
</xsl:stylesheet>"#,
        );

        assert_eq!(report.rejected_patterns.len(), 1);
        assert!(report.rejected_patterns[0].reason.contains("nickname"));
    }

    #[test]
    fn test_choose_requires_every_branch_valid() {
        let report = compute(
            TARGET_XSD,
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="Person">
    <xsl:choose>
      <xsl:when test="Age &gt;= 18"><Individual/></xsl:when>
      <xsl:otherwise><Unknown/></xsl:otherwise>
    </xsl:choose>
  </xsl:template>
</xsl:stylesheet>"#,
        );

        assert_eq!(report.rejected_patterns.len(), 1);
        assert!(report.rejected_patterns[0].reason.contains("Unknown"));
    }

    #[test]
    fn test_guard_conjunction_splits() {
        let report = compute(
            TARGET_XSD,
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="Person">
    <xsl:if test="Name != 'x' and Age &gt;= 0">
      <Individual fullname="{Name}" years="{Age}"/>
    </xsl:if>
  </xsl:template>
</xsl:stylesheet>"#,
        );

        let pattern = &report.accepted_patterns[0];
        assert_eq!(
            pattern.constraints,
            vec!["Name != 'x'", "Age >= 0"]
        );
    }

    #[test]
    fn test_named_type_attribute_restriction_synthesizes_predicate() {
        // The years attribute references a declared simple type, so its
        // bound facet lands on the declaration and synthesizes Age >= 0.
        let target_named = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:simpleType name="nonNegative">
    <xs:restriction base="xs:integer">
      <xs:minInclusive value="0"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:element name="Individual">
    <xs:complexType>
      <xs:attribute name="fullname" type="xs:string"/>
      <xs:attribute name="years" type="nonNegative"/>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

        let report = compute(
            target_named,
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="Person">
    <Individual fullname="{Name}" years="{Age}"/>
  </xsl:template>
</xsl:stylesheet>"#,
        );

        let pattern = &report.accepted_patterns[0];
        assert_eq!(pattern.constraints, vec!["Age >= 0"]);
    }

    #[test]
    fn test_when_tests_with_otherwise_are_not_binding() {
        let report = compute(
            TARGET_XSD,
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="Person">
    <xsl:choose>
      <xsl:when test="Age &gt;= 18"><Individual/></xsl:when>
      <xsl:otherwise><Individual/></xsl:otherwise>
    </xsl:choose>
  </xsl:template>
</xsl:stylesheet>"#,
        );

        // The otherwise branch handles every remaining input, so the when
        // condition does not constrain the preimage.
        assert!(report.accepted_patterns[0].constraints.is_empty());
    }

    #[test]
    fn test_when_tests_without_otherwise_constrain() {
        let report = compute(
            TARGET_XSD,
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="Person">
    <xsl:choose>
      <xsl:when test="Age &gt;= 18"><Individual/></xsl:when>
    </xsl:choose>
  </xsl:template>
</xsl:stylesheet>"#,
        );

        assert_eq!(report.accepted_patterns[0].constraints, vec!["Age >= 18"]);
    }

    #[test]
    fn test_opaque_tests_contribute_no_constraint() {
        let report = compute(
            TARGET_XSD,
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="Person">
    <xsl:if test="contains(Name, 'a')">
      <Individual fullname="{Name}"/>
    </xsl:if>
  </xsl:template>
</xsl:stylesheet>"#,
        );

        assert!(report.accepted_patterns[0].constraints.is_empty());
    }

    #[test]
    fn test_statistics() {
        let report = compute(
            TARGET_XSD,
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="Person"><Individual/></xsl:template>
  <xsl:template match="Other"><Nope/></xsl:template>
</xsl:stylesheet>"#,
        );

        assert_eq!(report.statistics.total_rules, 2);
        assert_eq!(report.statistics.accepted_patterns, 1);
        assert_eq!(report.statistics.rejected_patterns, 1);
        assert!((report.statistics.coverage - 0.5).abs() < f64::EPSILON);
    }
}
