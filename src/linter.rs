//! Stylesheet subset linter
//!
//! Rejects stylesheets that fall outside the analyzable subset before any
//! grammar or transducer work runs. Structural violations are errors;
//! path features the subset tolerates but cannot analyze precisely are
//! warnings.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashSet;

use crate::documents::{Document, Element};
use crate::XSLT_NAMESPACE;

/// Instruction local names the subset accepts
static ALLOWED_ELEMENTS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "stylesheet",
        "transform",
        "template",
        "apply-templates",
        "for-each",
        "if",
        "choose",
        "when",
        "otherwise",
        "value-of",
        "text",
        "element",
        "attribute",
        "with-param",
        "param",
    ]
    .into_iter()
    .collect()
});

/// Reserved local names rejected with a dedicated diagnostic
static RESERVED_ELEMENTS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "document",
        "key",
        "import",
        "include",
        "call-template",
        "variable",
        "sort",
        "number",
        "copy",
        "copy-of",
    ]
    .into_iter()
    .collect()
});

/// Pattern fragments in `template/@match` the analysis cannot track precisely
const COMPLEX_MATCH_TOKENS: [&str; 3] = ["//", "ancestor::", "following::"];

/// Expression fragments in tests/selects the analysis cannot track precisely
const COMPLEX_EXPR_TOKENS: [&str; 5] = [
    "contains(",
    "substring(",
    "concat(",
    "preceding::",
    "following::",
];

/// Category of a linter diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticCategory {
    /// XSLT-namespace element outside the allowed set
    Disallowed,
    /// Element from the reserved rejected set
    Reserved,
    /// Required attribute is missing
    MissingAttribute,
    /// Structural constraint violated (e.g. `choose` without `when`)
    Structure,
    /// Attribute-value template with more than one `{...}` segment
    AvtSegments,
    /// Pattern or expression feature accepted but imprecisely analyzed
    ComplexPattern,
    /// Input is not well-formed XML
    Malformed,
}

/// A single linter diagnostic with its location in the stylesheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Diagnostic category
    pub category: DiagnosticCategory,
    /// Human-readable message
    pub message: String,
    /// Path of the offending node, e.g. `/stylesheet/template[2]/if`
    pub path: String,
}

/// Result of subset linting
#[derive(Debug, Clone, Serialize)]
pub struct SubsetReport {
    /// Whether the stylesheet is inside the subset
    pub valid: bool,
    /// Structural violations
    pub errors: Vec<Diagnostic>,
    /// Imprecision warnings
    pub warnings: Vec<Diagnostic>,
}

/// Checks that a stylesheet uses only the analyzable subset
#[derive(Debug, Default)]
pub struct SubsetLinter {
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

impl SubsetLinter {
    /// Create a new linter
    pub fn new() -> Self {
        Self::default()
    }

    /// Lint a stylesheet. Never fails: malformed XML becomes an error
    /// diagnostic in the report.
    pub fn lint(mut self, stylesheet: &str) -> SubsetReport {
        let root = match Document::from_string(stylesheet) {
            Ok(doc) => match doc.into_root() {
                Ok(root) => root,
                Err(e) => {
                    self.push_error(DiagnosticCategory::Malformed, e.to_string(), "/");
                    return self.finish();
                }
            },
            Err(e) => {
                self.push_error(DiagnosticCategory::Malformed, e.to_string(), "/");
                return self.finish();
            }
        };

        let root_path = format!("/{}", root.local_name());
        self.check_element(&root, &root_path);
        self.finish()
    }

    fn finish(self) -> SubsetReport {
        SubsetReport {
            valid: self.errors.is_empty(),
            errors: self.errors,
            warnings: self.warnings,
        }
    }

    fn push_error(
        &mut self,
        category: DiagnosticCategory,
        message: impl Into<String>,
        path: impl Into<String>,
    ) {
        self.errors.push(Diagnostic {
            category,
            message: message.into(),
            path: path.into(),
        });
    }

    fn push_warning(
        &mut self,
        category: DiagnosticCategory,
        message: impl Into<String>,
        path: impl Into<String>,
    ) {
        self.warnings.push(Diagnostic {
            category,
            message: message.into(),
            path: path.into(),
        });
    }

    /// Check one element; `path` is the element's own full path.
    fn check_element(&mut self, elem: &Element, path: &str) {
        if elem.qname.in_namespace(XSLT_NAMESPACE) {
            let name = elem.local_name().to_string();

            if RESERVED_ELEMENTS.contains(name.as_str()) {
                self.push_error(
                    DiagnosticCategory::Reserved,
                    format!("disallowed XSLT element '{}'", name),
                    path,
                );
            } else if !ALLOWED_ELEMENTS.contains(name.as_str()) {
                self.push_error(
                    DiagnosticCategory::Disallowed,
                    format!("XSLT element '{}' is outside the analyzable subset", name),
                    path,
                );
            }

            match name.as_str() {
                "template" => self.check_template(elem, path),
                "if" => self.check_if(elem, path),
                "choose" => self.check_choose(elem, path),
                "apply-templates" => self.check_expr_tokens(elem, "select", path),
                "for-each" => self.check_required_select(elem, "for-each", path),
                "value-of" => self.check_required_select(elem, "value-of", path),
                _ => {}
            }
        } else {
            // Literal result element: attribute-value templates must carry
            // at most one {...} segment.
            for (attr_qname, value) in &elem.attributes {
                if value.matches('{').count() > 1 {
                    self.push_error(
                        DiagnosticCategory::AvtSegments,
                        format!(
                            "attribute '{}' uses more than one value-template segment: '{}'",
                            attr_qname.local_name, value
                        ),
                        path,
                    );
                }
            }
        }

        // Recurse with sibling indices so repeated children get distinct paths.
        let mut seen: Vec<(&str, usize)> = Vec::new();
        for child in &elem.children {
            let local = child.local_name();
            let total = elem
                .children
                .iter()
                .filter(|c| c.local_name() == local)
                .count();
            let index = match seen.iter_mut().find(|(n, _)| *n == local) {
                Some((_, i)) => {
                    *i += 1;
                    *i
                }
                None => {
                    seen.push((local, 1));
                    1
                }
            };
            let child_path = if total > 1 {
                format!("{}/{}[{}]", path, local, index)
            } else {
                format!("{}/{}", path, local)
            };
            self.check_element(child, &child_path);
        }
    }

    fn check_template(&mut self, elem: &Element, path: &str) {
        let Some(match_value) = elem.get_attribute("match") else {
            self.push_error(
                DiagnosticCategory::MissingAttribute,
                "template without 'match' attribute",
                path,
            );
            return;
        };

        if COMPLEX_MATCH_TOKENS.iter().any(|t| match_value.contains(t)) {
            self.push_warning(
                DiagnosticCategory::ComplexPattern,
                format!(
                    "complex pattern '{}' may not be fully supported",
                    match_value
                ),
                path,
            );
        }
    }

    fn check_if(&mut self, elem: &Element, path: &str) {
        let Some(test) = elem.get_attribute("test") else {
            self.push_error(
                DiagnosticCategory::MissingAttribute,
                "'if' without 'test' attribute",
                path,
            );
            return;
        };

        if COMPLEX_EXPR_TOKENS.iter().any(|t| test.contains(t)) {
            self.push_warning(
                DiagnosticCategory::ComplexPattern,
                format!("complex expression in test '{}'", test),
                path,
            );
        }
    }

    fn check_choose(&mut self, elem: &Element, path: &str) {
        if elem.find_child("when").is_none() {
            self.push_error(
                DiagnosticCategory::Structure,
                "'choose' without 'when'",
                path,
            );
        }
    }

    fn check_expr_tokens(&mut self, elem: &Element, attr: &str, path: &str) {
        if let Some(value) = elem.get_attribute(attr) {
            if COMPLEX_EXPR_TOKENS.iter().any(|t| value.contains(t)) {
                self.push_warning(
                    DiagnosticCategory::ComplexPattern,
                    format!("complex expression in {} '{}'", attr, value),
                    path,
                );
            }
        }
    }

    fn check_required_select(&mut self, elem: &Element, name: &str, path: &str) {
        if elem.get_attribute("select").is_none() {
            self.push_error(
                DiagnosticCategory::MissingAttribute,
                format!("'{}' without 'select' attribute", name),
                path,
            );
            return;
        }
        self.check_expr_tokens(elem, "select", path);
    }
}
