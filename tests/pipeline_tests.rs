//! End-to-end pipeline tests
//!
//! Each scenario runs the full analysis on literal textual inputs and
//! asserts on element names, facets, and verdicts.

use xslcheck::analysis::{AnalysisRequest, Analyzer};
use xslcheck::trace::TraceLevel;

fn analyze(source: &str, target: &str, stylesheet: &str) -> xslcheck::analysis::AnalysisReport {
    Analyzer::new()
        .analyze(&AnalysisRequest {
            source_schema: source.to_string(),
            target_schema: target.to_string(),
            stylesheet: stylesheet.to_string(),
        })
        .expect("pipeline should not error")
}

// ============================================================================
// Shared fixtures
// ============================================================================

const PERSON_XSD: &str = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Person">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="Name" type="xs:string"/>
        <xs:element name="Age" type="xs:integer"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

const INDIVIDUAL_XSD: &str = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
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

const GUARDED_XSLT: &str = r#"<?xml version="1.0"?>
<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="Person">
    <xsl:if test="Age &gt;= 0">
      <Individual fullname="{Name}" years="{Age}"/>
    </xsl:if>
  </xsl:template>
</xsl:stylesheet>"#;

const UNGUARDED_XSLT: &str = r#"<?xml version="1.0"?>
<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="Person">
    <Individual fullname="{Name}" years="{Age}"/>
  </xsl:template>
</xsl:stylesheet>"#;

// ============================================================================
// Scenario 1: minimal type-preserving, guarded
// ============================================================================

#[test]
fn scenario_1_guarded_type_preserving() {
    let report = analyze(PERSON_XSD, INDIVIDUAL_XSD, GUARDED_XSLT);

    assert!(report.subset_check.valid);

    let mtt = report.mtt.as_ref().unwrap();
    assert_eq!(mtt.rules.len(), 1);
    let guard = mtt.rules[0].guard.as_ref().expect("rule carries the guard");
    assert_eq!(guard.predicate.to_string(), "Age >= 0");

    let validation = report.type_validation.as_ref().unwrap();
    assert!(validation.valid);
    // The guard reconciles the minInclusive warning away.
    assert!(
        validation.warnings.is_empty(),
        "warnings: {:?}",
        validation.warnings
    );

    let preimage = report.preimage.as_ref().unwrap();
    assert_eq!(preimage.accepted_patterns.len(), 1);
    assert_eq!(
        preimage.accepted_patterns[0].to_string(),
        "Person(*) where Age >= 0"
    );

    let validity = report.validity.as_ref().unwrap();
    assert!(validity.valid);
    assert!((validity.coverage_percent - 100.0).abs() < f64::EPSILON);

    assert!(report.valid);
}

// ============================================================================
// Scenario 2: missing guard surfaces the target restriction
// ============================================================================

#[test]
fn scenario_2_missing_guard_surfaces_restriction() {
    let report = analyze(PERSON_XSD, INDIVIDUAL_XSD, UNGUARDED_XSLT);

    let validation = report.type_validation.as_ref().unwrap();
    assert!(validation.valid);
    assert_eq!(validation.warnings.len(), 1);
    assert!(validation.warnings[0].contains("years"));
    assert!(validation.warnings[0].contains("minInclusive=0"));

    let preimage = report.preimage.as_ref().unwrap();
    assert_eq!(preimage.accepted_patterns[0].to_string(), "Person(*)");
    assert!(preimage.accepted_patterns[0].constraints.is_empty());

    // Structurally covered, so validity still holds.
    assert!(report.validity.as_ref().unwrap().valid);
    assert!(report.valid);
}

// ============================================================================
// Scenario 3: uncovered source element
// ============================================================================

#[test]
fn scenario_3_uncovered_source_element() {
    let source = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Person">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="Name" type="xs:string"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
  <xs:element name="Organization">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="OrgName" type="xs:string"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

    let stylesheet = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="Person">
    <Individual fullname="{Name}"/>
  </xsl:template>
</xsl:stylesheet>"#;

    let report = analyze(source, INDIVIDUAL_XSD, stylesheet);

    // Structural coverage warns about the dropped element.
    let validation = report.type_validation.as_ref().unwrap();
    assert!(validation
        .warnings
        .iter()
        .any(|w| w.contains("Organization")));

    // Validity fails with one counterexample naming it.
    let validity = report.validity.as_ref().unwrap();
    assert!(!validity.valid);
    assert_eq!(validity.counterexamples.len(), 1);
    let cx = &validity.counterexamples[0];
    assert_eq!(cx.element, "Organization");
    assert!(cx.reason.contains("no preimage pattern"));

    assert!(!report.valid);
}

// ============================================================================
// Scenario 4: cardinality many-to-one
// ============================================================================

#[test]
fn scenario_4_cardinality_many_to_one() {
    let source = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Contact">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="Phone" type="xs:string" minOccurs="0" maxOccurs="unbounded"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

    let target = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Person">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="Phone" type="xs:string"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

    let stylesheet = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="Contact">
    <Person>
      <xsl:for-each select="Phone">
        <Phone><xsl:value-of select="."/></Phone>
      </xsl:for-each>
    </Person>
  </xsl:template>
</xsl:stylesheet>"#;

    let report = analyze(source, target, stylesheet);

    let validation = report.type_validation.as_ref().unwrap();
    assert!(validation.valid);
    assert!(validation
        .warnings
        .iter()
        .any(|w| w.contains("(0,∞)") && w.contains("(1,1)")));
}

// ============================================================================
// Scenario 5: choose with enumeration
// ============================================================================

#[test]
fn scenario_5_choose_with_enumeration() {
    let source = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Employee">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="Role" type="xs:string"/>
        <xs:element name="Age" type="xs:integer"/>
        <xs:element name="Salary" type="xs:decimal"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

    let target = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Staff">
    <xs:complexType>
      <xs:attribute name="age">
        <xs:simpleType>
          <xs:restriction base="xs:int">
            <xs:minInclusive value="18"/>
          </xs:restriction>
        </xs:simpleType>
      </xs:attribute>
      <xs:attribute name="position">
        <xs:simpleType>
          <xs:restriction base="xs:string">
            <xs:enumeration value="engineer"/>
            <xs:enumeration value="lead"/>
          </xs:restriction>
        </xs:simpleType>
      </xs:attribute>
      <xs:attribute name="income">
        <xs:simpleType>
          <xs:restriction base="xs:decimal">
            <xs:minExclusive value="0"/>
          </xs:restriction>
        </xs:simpleType>
      </xs:attribute>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

    let stylesheet = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="Employee">
    <xsl:if test="Role != 'intern' and Age &gt;= 18 and Salary &gt; 0">
      <Staff age="{Age}" income="{Salary}">
        <xsl:attribute name="position">
          <xsl:choose>
            <xsl:when test="Role = 'manager'">lead</xsl:when>
            <xsl:when test="Role = 'developer'">engineer</xsl:when>
            <xsl:otherwise>engineer</xsl:otherwise>
          </xsl:choose>
        </xsl:attribute>
      </Staff>
    </xsl:if>
  </xsl:template>
</xsl:stylesheet>"#;

    let report = analyze(source, target, stylesheet);

    // The rule carries the full conjunction guard.
    let mtt = report.mtt.as_ref().unwrap();
    let guard = mtt.rules[0].guard.as_ref().unwrap();
    assert_eq!(guard.predicate.conjuncts().len(), 3);

    // Preimage emits exactly the three guard predicates.
    let preimage = report.preimage.as_ref().unwrap();
    assert_eq!(
        preimage.accepted_patterns[0].constraints,
        vec!["Role != 'intern'", "Age >= 18", "Salary > 0"]
    );

    // The age and income restrictions reconcile against the guard; only
    // the enumeration on position stays a warning.
    let validation = report.type_validation.as_ref().unwrap();
    assert!(validation.valid);
    assert_eq!(
        validation.warnings.len(),
        1,
        "warnings: {:?}",
        validation.warnings
    );
    assert!(validation.warnings[0].contains("position"));
    assert!(validation.warnings[0].contains("enumeration"));

    assert!(report.validity.as_ref().unwrap().valid);
}

// ============================================================================
// Scenario 6: disallowed constructs
// ============================================================================

#[test]
fn scenario_6_disallowed_constructs_halt_pipeline() {
    let stylesheet = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="Person">
    <xsl:variable name="x" select="Name"/>
    <xsl:copy-of select="."/>
  </xsl:template>
</xsl:stylesheet>"#;

    let report = analyze(PERSON_XSD, INDIVIDUAL_XSD, stylesheet);

    assert!(!report.subset_check.valid);
    assert_eq!(report.subset_check.errors.len(), 2);
    assert!(report.rejected_by_linter());

    // Nothing downstream of the linter is emitted.
    assert!(report.source_grammar.is_none());
    assert!(report.target_grammar.is_none());
    assert!(report.mtt.is_none());
    assert!(report.type_validation.is_none());
    assert!(report.preimage.is_none());
    assert!(report.validity.is_none());
    assert!(!report.valid);
}

// ============================================================================
// Universal properties
// ============================================================================

#[test]
fn property_grammar_invariants_hold_for_valid_schemas() {
    for xsd in [PERSON_XSD, INDIVIDUAL_XSD] {
        let translation = Analyzer::new().translate_schema(xsd).unwrap();
        let grammar = &translation.grammar;
        assert!(grammar.has_element(&grammar.root_element));
        assert!(
            grammar.invariant_violations().is_empty(),
            "violations: {:?}",
            grammar.invariant_violations()
        );
    }
}

#[test]
fn property_mtt_rules_are_pairwise_distinct_and_callees_exist() {
    let stylesheet = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="/">
    <Doc><xsl:apply-templates select="Person"/></Doc>
  </xsl:template>
  <xsl:template match="Person">
    <xsl:if test="Age &gt;= 18"><Adult/></xsl:if>
  </xsl:template>
  <xsl:template match="Person">
    <xsl:if test="Age &lt; 18"><Minor/></xsl:if>
  </xsl:template>
</xsl:stylesheet>"#;

    let mtt = Analyzer::new().compile_stylesheet(stylesheet).unwrap();

    // (state, pattern, guard) triples are pairwise distinct.
    let triples: Vec<(String, String, Option<String>)> = mtt
        .rules
        .iter()
        .map(|r| {
            (
                r.state.clone(),
                r.pattern.to_string(),
                r.guard.as_ref().map(|g| g.predicate.to_string()),
            )
        })
        .collect();
    for (i, a) in triples.iter().enumerate() {
        for b in triples.iter().skip(i + 1) {
            assert_ne!(a, b);
        }
    }

    // Every resolved callee names an existing state.
    let json = serde_json::to_value(&mtt).unwrap();
    let mut stack = vec![&json];
    while let Some(value) = stack.pop() {
        if let Some(obj) = value.as_object() {
            if let Some(callee) = obj.get("callee") {
                if let Some(name) = callee.as_str() {
                    assert!(mtt.has_state(name), "unknown callee state {}", name);
                }
            }
            stack.extend(obj.values());
        } else if let Some(arr) = value.as_array() {
            stack.extend(arr.iter());
        }
    }
}

#[test]
fn property_valid_implies_root_mapped() {
    let report = analyze(PERSON_XSD, INDIVIDUAL_XSD, GUARDED_XSLT);
    let validation = report.type_validation.as_ref().unwrap();
    assert!(validation.valid);

    for entry in &validation.coverage {
        if entry.source == "Person" {
            assert!(entry.is_covered(), "root production must not be UNMAPPED");
        }
    }
}

#[test]
fn property_linter_is_idempotent() {
    let stylesheet = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="//Person">
    <xsl:sort/>
    <Out label="{A}-{B}"/>
  </xsl:template>
</xsl:stylesheet>"#;

    let analyzer = Analyzer::new();
    let first = analyzer.check_subset(stylesheet);
    let second = analyzer.check_subset(stylesheet);
    assert_eq!(first.errors, second.errors);
    assert_eq!(first.warnings, second.warnings);
}

#[test]
fn property_warning_monotonic_under_restriction_tightening() {
    let tightened_target = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Individual">
    <xs:complexType>
      <xs:attribute name="fullname" type="xs:string" use="required"/>
      <xs:attribute name="years">
        <xs:simpleType>
          <xs:restriction base="xs:integer">
            <xs:minInclusive value="0"/>
            <xs:maxInclusive value="150"/>
          </xs:restriction>
        </xs:simpleType>
      </xs:attribute>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

    let base = analyze(PERSON_XSD, INDIVIDUAL_XSD, UNGUARDED_XSLT);
    let tightened = analyze(PERSON_XSD, tightened_target, UNGUARDED_XSLT);

    let base_warnings = base.type_validation.as_ref().unwrap().warnings.len();
    let tightened_warnings = tightened.type_validation.as_ref().unwrap().warnings.len();
    assert!(tightened_warnings >= base_warnings);
}

#[test]
fn property_guard_restriction_soundness() {
    // Guard implies the restriction: no warning, demoted to ok.
    let implied = analyze(PERSON_XSD, INDIVIDUAL_XSD, GUARDED_XSLT);
    let validation = implied.type_validation.as_ref().unwrap();
    assert!(validation.warnings.is_empty());
    assert!(validation
        .proof
        .entries()
        .iter()
        .any(|e| e.level == TraceLevel::Ok && e.message.contains("minInclusive=0")));

    // Guard does not imply it (Age >= -5 is weaker than minInclusive=0):
    // the warning is present.
    let weak_guard = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="Person">
    <xsl:if test="Age &gt;= -5">
      <Individual fullname="{Name}" years="{Age}"/>
    </xsl:if>
  </xsl:template>
</xsl:stylesheet>"#;

    let unimplied = analyze(PERSON_XSD, INDIVIDUAL_XSD, weak_guard);
    let validation = unimplied.type_validation.as_ref().unwrap();
    assert!(validation
        .warnings
        .iter()
        .any(|w| w.contains("minInclusive=0")));
}

#[test]
fn property_proof_trace_order_is_deterministic() {
    let first = analyze(PERSON_XSD, INDIVIDUAL_XSD, GUARDED_XSLT);
    let second = analyze(PERSON_XSD, INDIVIDUAL_XSD, GUARDED_XSLT);

    let first_messages = first.type_validation.as_ref().unwrap().proof.messages();
    let second_messages = second.type_validation.as_ref().unwrap().proof.messages();
    assert_eq!(first_messages, second_messages);
}

#[test]
fn property_cardinality_serializes_unbounded_as_minus_one() {
    let source = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Contact">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="Phone" type="xs:string" minOccurs="0" maxOccurs="unbounded"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

    let translation = Analyzer::new().translate_schema(source).unwrap();
    let json = serde_json::to_value(&translation.grammar).unwrap();

    let phone = json["productions"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["lhs"] == "Phone")
        .unwrap();
    assert_eq!(phone["cardinality"], serde_json::json!([0, -1]));
}
