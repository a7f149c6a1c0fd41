//! CLI integration tests
//!
//! These tests verify the exit-code contract by running the binary:
//! 0 for a valid transformation, 1 for a semantic failure, 2 for a
//! stylesheet outside the analyzable subset.

#![cfg(feature = "cli")]

use std::path::PathBuf;
use std::process::Command;

const SOURCE_XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Person">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="Name" type="xs:string"/>
        <xs:element name="Age" type="xs:integer"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

const TARGET_XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Individual">
    <xs:complexType>
      <xs:attribute name="fullname" type="xs:string" use="required"/>
      <xs:attribute name="years" type="xs:integer"/>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

const VALID_XSLT: &str = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="Person">
    <Individual fullname="{Name}" years="{Age}"/>
  </xsl:template>
</xsl:stylesheet>"#;

const DISALLOWED_XSLT: &str = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="Person">
    <xsl:copy-of select="."/>
  </xsl:template>
</xsl:stylesheet>"#;

const DROPPING_XSLT: &str = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="Unrelated">
    <Individual/>
  </xsl:template>
</xsl:stylesheet>"#;

/// Write the three inputs into a scratch directory and return their paths
fn write_fixtures(tag: &str, source: &str, target: &str, xslt: &str) -> (PathBuf, PathBuf, PathBuf) {
    let dir = std::env::temp_dir().join(format!("xslcheck-cli-{}-{}", tag, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let source_path = dir.join("source.xsd");
    let target_path = dir.join("target.xsd");
    let xslt_path = dir.join("transform.xsl");
    std::fs::write(&source_path, source).unwrap();
    std::fs::write(&target_path, target).unwrap();
    std::fs::write(&xslt_path, xslt).unwrap();

    (source_path, target_path, xslt_path)
}

fn run(source: &PathBuf, target: &PathBuf, xslt: &PathBuf, json: bool) -> std::process::Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_xslcheck"));
    cmd.args([
        "--source",
        source.to_str().unwrap(),
        "--target",
        target.to_str().unwrap(),
        "--stylesheet",
        xslt.to_str().unwrap(),
    ]);
    if json {
        cmd.arg("--json");
    }
    cmd.output().expect("failed to execute xslcheck")
}

#[test]
fn test_valid_transformation_exits_zero() {
    let (source, target, xslt) = write_fixtures("valid", SOURCE_XSD, TARGET_XSD, VALID_XSLT);
    let output = run(&source, &target, &xslt, false);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stdout: {}", stdout);
    assert!(stdout.contains("result: VALID"));
}

#[test]
fn test_subset_rejection_exits_two() {
    let (source, target, xslt) = write_fixtures("subset", SOURCE_XSD, TARGET_XSD, DISALLOWED_XSLT);
    let output = run(&source, &target, &xslt, false);

    assert_eq!(output.status.code(), Some(2));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("REJECTED"));
    assert!(stdout.contains("copy-of"));
}

#[test]
fn test_invalid_transformation_exits_one() {
    let (source, target, xslt) = write_fixtures("invalid", SOURCE_XSD, TARGET_XSD, DROPPING_XSLT);
    let output = run(&source, &target, &xslt, false);

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("result: INVALID"));
}

#[test]
fn test_json_output_parses() {
    let (source, target, xslt) = write_fixtures("json", SOURCE_XSD, TARGET_XSD, VALID_XSLT);
    let output = run(&source, &target, &xslt, true);

    assert!(output.status.success());
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("output should be valid JSON");
    assert_eq!(json["valid"], true);
    assert_eq!(json["source_grammar"]["root_element"], "Person");
    assert_eq!(json["mtt"]["rules"][0]["state"], "q_Person_default");
}

#[test]
fn test_missing_file_fails() {
    let (source, target, _) = write_fixtures("missing", SOURCE_XSD, TARGET_XSD, VALID_XSLT);
    let bogus = PathBuf::from("/nonexistent/transform.xsl");
    let output = run(&source, &target, &bogus, false);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error"));
}
