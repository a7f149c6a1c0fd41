//! Analysis request surface
//!
//! The single entry point wires the pipeline together: subset linting,
//! schema translation for both schemas, stylesheet translation, type
//! preservation, preimage, and validity. Linter rejection and input
//! malformation halt the pipeline; semantic findings accumulate so the
//! caller always gets the fullest picture available.

use serde::Serialize;

use crate::error::Result;
use crate::grammar::{SchemaParser, SchemaTranslation, TreeGrammar};
use crate::limits::Limits;
use crate::linter::{SubsetLinter, SubsetReport};
use crate::preimage::{PreimageComputer, PreimageReport};
use crate::transducer::{Mtt, StylesheetCompiler};
use crate::validator::{TypePreservationValidator, ValidationReport};
use crate::validity::{ValidityChecker, ValidityReport};

/// The three input blobs of one analysis
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Source schema text
    pub source_schema: String,
    /// Target schema text
    pub target_schema: String,
    /// Stylesheet text
    pub stylesheet: String,
}

/// A translated grammar together with its translation warnings
#[derive(Debug, Serialize)]
pub struct GrammarSection {
    /// The tree grammar
    #[serde(flatten)]
    pub grammar: TreeGrammar,
    /// Degraded-default warnings
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl From<SchemaTranslation> for GrammarSection {
    fn from(translation: SchemaTranslation) -> Self {
        Self {
            grammar: translation.grammar,
            warnings: translation.warnings,
        }
    }
}

/// Full analysis result
#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    /// Overall verdict: subset-conforming, type-preserving, and valid
    pub valid: bool,
    /// Linter result
    pub subset_check: SubsetReport,
    /// Source grammar, absent when the linter rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_grammar: Option<GrammarSection>,
    /// Target grammar, absent when the linter rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_grammar: Option<GrammarSection>,
    /// The transducer, absent when the linter rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtt: Option<Mtt>,
    /// Type-preservation result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_validation: Option<ValidationReport>,
    /// Preimage result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preimage: Option<PreimageReport>,
    /// Validity result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validity: Option<ValidityReport>,
}

impl AnalysisReport {
    /// Whether the pipeline stopped at the linter
    pub fn rejected_by_linter(&self) -> bool {
        !self.subset_check.valid
    }
}

/// Runs the full analysis pipeline
#[derive(Debug, Default)]
pub struct Analyzer {
    limits: Limits,
}

impl Analyzer {
    /// Create an analyzer with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an analyzer with explicit limits
    pub fn with_limits(limits: Limits) -> Self {
        Self { limits }
    }

    /// Run the pipeline on three input blobs
    pub fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisReport> {
        // Stage A: subset linting. Errors halt the pipeline before any
        // grammar or transducer work.
        let subset_check = self.check_subset(&request.stylesheet);
        if !subset_check.valid {
            return Ok(AnalysisReport {
                valid: false,
                subset_check,
                source_grammar: None,
                target_grammar: None,
                mtt: None,
                type_validation: None,
                preimage: None,
                validity: None,
            });
        }

        // Stage B: both schemas. The two translations are independent.
        let source = self.translate_schema(&request.source_schema)?;
        let target = self.translate_schema(&request.target_schema)?;

        // Stage C: stylesheet to MTT.
        let mtt = self.compile_stylesheet(&request.stylesheet)?;

        // Stage D: type preservation. Semantic mismatches accumulate in
        // the report; the pipeline continues.
        let type_validation =
            TypePreservationValidator::new().validate(&source.grammar, &target.grammar, &mtt);

        // Stage E: preimage and validity.
        let preimage = PreimageComputer::new().compute(&target.grammar, &mtt);
        let validity = ValidityChecker::new().check(&source.grammar, &preimage);

        let valid = type_validation.valid && validity.valid;

        Ok(AnalysisReport {
            valid,
            subset_check,
            source_grammar: Some(source.into()),
            target_grammar: Some(target.into()),
            mtt: Some(mtt),
            type_validation: Some(type_validation),
            preimage: Some(preimage),
            validity: Some(validity),
        })
    }

    /// Diagnostic entry point: subset linting only
    pub fn check_subset(&self, stylesheet: &str) -> SubsetReport {
        SubsetLinter::new().lint(stylesheet)
    }

    /// Diagnostic entry point: schema to grammar only
    pub fn translate_schema(&self, schema: &str) -> Result<SchemaTranslation> {
        SchemaParser::with_limits(self.limits.clone()).parse(schema)
    }

    /// Diagnostic entry point: stylesheet to MTT only
    pub fn compile_stylesheet(&self, stylesheet: &str) -> Result<Mtt> {
        StylesheetCompiler::with_limits(self.limits.clone()).compile(stylesheet)
    }
}
