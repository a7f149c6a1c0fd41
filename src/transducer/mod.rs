//! Macro tree transducer model
//!
//! A stylesheet translates into an [`Mtt`]: a set of states, one rule per
//! template, and for each rule a guarded input pattern plus an output-tree
//! skeleton. The skeleton is a closed tagged sum; the validator and the
//! preimage computation pattern-match it exhaustively.

mod builder;

pub use builder::StylesheetCompiler;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;

use crate::predicate::Predicate;

/// Children descriptor of an input pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildrenMatch {
    /// Matches any children (the `*` / `children` token)
    Any,
    /// Matches an ordered list of child names
    Names(Vec<String>),
}

impl Serialize for ChildrenMatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ChildrenMatch::Any => vec!["*".to_string()].serialize(serializer),
            ChildrenMatch::Names(names) => names.serialize(serializer),
        }
    }
}

/// Input pattern of a rule: element name plus children descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputMatch {
    /// Matched element name (`root` for the document root)
    pub element: String,
    /// Children descriptor
    pub children: ChildrenMatch,
}

impl fmt::Display for InputMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.children {
            ChildrenMatch::Any => write!(f, "{}(children)", self.element),
            ChildrenMatch::Names(names) => write!(f, "{}({})", self.element, names.join(", ")),
        }
    }
}

/// A boolean test kept in both source and parsed form
#[derive(Debug, Clone)]
pub struct TestExpr {
    /// Original textual form (for diagnostics)
    pub raw: String,
    /// Parsed predicate
    pub predicate: Predicate,
}

impl TestExpr {
    /// Parse a test expression
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let predicate = Predicate::parse(&raw);
        Self { raw, predicate }
    }
}

impl Serialize for TestExpr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

/// Guard condition on a rule, mirroring a top-level `if` test
pub type Guard = TestExpr;

/// Attribute value on a literal output element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    /// Literal text
    Literal(String),
    /// Attribute-value template: a single path expression on the matched
    /// node
    Path(String),
}

/// An attribute on a literal output element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputAttribute {
    /// Attribute name
    pub name: String,
    /// Literal or path value
    pub value: AttrValue,
}

impl Serialize for OutputAttribute {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("OutputAttribute", 2)?;
        state.serialize_field("name", &self.name)?;
        match &self.value {
            AttrValue::Literal(value) => state.serialize_field("value", value)?,
            AttrValue::Path(expr) => state.serialize_field("value_expr", expr)?,
        }
        state.end()
    }
}

/// A branch of a `choose` skeleton
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Branch {
    /// Guarded branch
    When {
        /// Branch test
        test: TestExpr,
        /// Branch body
        body: OutputNode,
    },
    /// Fallback branch
    Otherwise {
        /// Branch body
        body: OutputNode,
    },
}

impl Branch {
    /// The branch body
    pub fn body(&self) -> &OutputNode {
        match self {
            Branch::When { body, .. } => body,
            Branch::Otherwise { body } => body,
        }
    }
}

/// Output-tree skeleton of a rule
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutputNode {
    /// Ordered output forest
    Sequence {
        /// Forest members
        children: Vec<OutputNode>,
    },
    /// Literal result element
    Element {
        /// Element name
        name: String,
        /// Attributes in document order
        #[serde(skip_serializing_if = "Vec::is_empty")]
        attributes: Vec<OutputAttribute>,
        /// Child skeletons
        children: Vec<OutputNode>,
    },
    /// Literal text
    Text {
        /// The text
        value: String,
    },
    /// Value read from the matched node
    ValueOf {
        /// Path expression
        select: String,
    },
    /// Recursive template application
    ApplyTemplates {
        /// Path expression selecting the subtrees
        select: String,
        /// Resolved callee state, `None` when no template matches
        callee: Option<String>,
    },
    /// Iteration over selected subtrees
    ForEach {
        /// Path expression selecting the subtrees
        select: String,
        /// Loop body
        body: Box<OutputNode>,
        /// Auxiliary list-processing state
        list_state: String,
    },
    /// Conditional output
    If {
        /// Condition
        test: TestExpr,
        /// Output when the condition holds
        then: Box<OutputNode>,
    },
    /// First-match branching
    Choose {
        /// `when` branches in source order, then at most one `otherwise`
        branches: Vec<Branch>,
    },
    /// Dynamic attribute constructor
    Attribute {
        /// Attribute name, captured literally
        name: String,
        /// Literal value text, when the constructor body is plain text
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        /// Computed value skeletons
        #[serde(skip_serializing_if = "Vec::is_empty")]
        children: Vec<OutputNode>,
    },
}

impl OutputNode {
    /// An empty output forest
    pub fn empty() -> Self {
        OutputNode::Sequence {
            children: Vec::new(),
        }
    }

    /// Name of the outermost literal element produced by this skeleton,
    /// looking through sequences and conditionals.
    pub fn outermost_element(&self) -> Option<&str> {
        match self {
            OutputNode::Element { name, .. } => Some(name),
            OutputNode::Sequence { children } => {
                children.iter().find_map(|c| c.outermost_element())
            }
            OutputNode::If { then, .. } => then.outermost_element(),
            OutputNode::Choose { branches } => {
                branches.iter().find_map(|b| b.body().outermost_element())
            }
            _ => None,
        }
    }

    /// Whether this skeleton references the given source name: as a
    /// literal element, through a select/value path, in a test, or in an
    /// attribute.
    pub fn mentions(&self, name: &str) -> bool {
        match self {
            OutputNode::Sequence { children } => children.iter().any(|c| c.mentions(name)),
            OutputNode::Element {
                name: elem_name,
                attributes,
                children,
            } => {
                elem_name == name
                    || attributes.iter().any(|a| match &a.value {
                        AttrValue::Path(expr) => expr_references(expr, name),
                        AttrValue::Literal(_) => false,
                    })
                    || children.iter().any(|c| c.mentions(name))
            }
            OutputNode::Text { .. } => false,
            OutputNode::ValueOf { select } => expr_references(select, name),
            OutputNode::ApplyTemplates { select, .. } => expr_references(select, name),
            OutputNode::ForEach { select, body, .. } => {
                expr_references(select, name) || body.mentions(name)
            }
            OutputNode::If { test, then } => {
                test_references(test, name) || then.mentions(name)
            }
            OutputNode::Choose { branches } => branches.iter().any(|b| match b {
                Branch::When { test, body } => test_references(test, name) || body.mentions(name),
                Branch::Otherwise { body } => body.mentions(name),
            }),
            OutputNode::Attribute {
                value, children, ..
            } => {
                value.as_deref().is_some_and(|v| expr_references(v, name))
                    || children.iter().any(|c| c.mentions(name))
            }
        }
    }

    /// Name of the attribute through which this skeleton reads the given
    /// source name, if any: an attribute-value template over a matching
    /// path, or an attribute constructor whose body mentions it.
    pub fn attribute_reading(&self, source: &str) -> Option<&str> {
        match self {
            OutputNode::Element {
                attributes,
                children,
                ..
            } => {
                for attr in attributes {
                    if let AttrValue::Path(expr) = &attr.value {
                        if expr_references(expr, source) {
                            return Some(&attr.name);
                        }
                    }
                }
                children.iter().find_map(|c| c.attribute_reading(source))
            }
            OutputNode::Attribute {
                name,
                value,
                children,
            } => {
                let reads = value.as_deref().is_some_and(|v| expr_references(v, source))
                    || children.iter().any(|c| c.mentions(source));
                if reads {
                    Some(name)
                } else {
                    None
                }
            }
            OutputNode::Sequence { children } => {
                children.iter().find_map(|c| c.attribute_reading(source))
            }
            OutputNode::If { then, .. } => then.attribute_reading(source),
            OutputNode::Choose { branches } => branches
                .iter()
                .find_map(|b| b.body().attribute_reading(source)),
            OutputNode::ForEach { body, .. } => body.attribute_reading(source),
            _ => None,
        }
    }

    /// Visit every `if` and `when` test in document order
    pub fn visit_tests<'a>(&'a self, visit: &mut impl FnMut(&'a TestExpr)) {
        match self {
            OutputNode::Sequence { children } => {
                for child in children {
                    child.visit_tests(visit);
                }
            }
            OutputNode::Element { children, .. } => {
                for child in children {
                    child.visit_tests(visit);
                }
            }
            OutputNode::If { test, then } => {
                visit(test);
                then.visit_tests(visit);
            }
            OutputNode::Choose { branches } => {
                for branch in branches {
                    if let Branch::When { test, body } = branch {
                        visit(test);
                        body.visit_tests(visit);
                    } else {
                        branch.body().visit_tests(visit);
                    }
                }
            }
            OutputNode::ForEach { body, .. } => body.visit_tests(visit),
            OutputNode::Attribute { children, .. } => {
                for child in children {
                    child.visit_tests(visit);
                }
            }
            _ => {}
        }
    }

    /// Collect the names of all literal elements in this skeleton
    pub fn collect_element_names(&self, into: &mut Vec<String>) {
        match self {
            OutputNode::Element { name, children, .. } => {
                if !into.iter().any(|n| n == name) {
                    into.push(name.clone());
                }
                for child in children {
                    child.collect_element_names(into);
                }
            }
            OutputNode::Sequence { children } => {
                for child in children {
                    child.collect_element_names(into);
                }
            }
            OutputNode::If { then, .. } => then.collect_element_names(into),
            OutputNode::Choose { branches } => {
                for branch in branches {
                    branch.body().collect_element_names(into);
                }
            }
            OutputNode::ForEach { body, .. } => body.collect_element_names(into),
            OutputNode::Attribute { children, .. } => {
                for child in children {
                    child.collect_element_names(into);
                }
            }
            _ => {}
        }
    }
}

/// Whether a path expression references a name in any of its segments
fn expr_references(expr: &str, name: &str) -> bool {
    expr.split(['/', '.'])
        .map(|seg| seg.trim().trim_start_matches('@'))
        .any(|seg| seg == name)
}

fn test_references(test: &TestExpr, name: &str) -> bool {
    predicate_references(&test.predicate, name) || expr_references(&test.raw, name)
}

fn predicate_references(pred: &Predicate, name: &str) -> bool {
    match pred {
        Predicate::Compare { path, .. } => crate::predicate::path_refers_to(path, name),
        Predicate::And(parts) | Predicate::Or(parts) => {
            parts.iter().any(|p| predicate_references(p, name))
        }
        Predicate::Not(inner) => predicate_references(inner, name),
        Predicate::Opaque(text) => text.contains(name),
    }
}

/// A single transducer rule
#[derive(Debug, Clone, Serialize)]
pub struct Rule {
    /// Owning state
    pub state: String,
    /// Guarded input pattern
    #[serde(rename = "lhs")]
    pub pattern: InputMatch,
    /// Optional guard over the matched node's children
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guard: Option<Guard>,
    /// Output-tree skeleton
    #[serde(rename = "rhs")]
    pub output: OutputNode,
}

/// Macro tree transducer
#[derive(Debug, Clone, Serialize)]
pub struct Mtt {
    /// State identifiers in creation order
    pub states: Vec<String>,
    /// Designated initial state
    pub initial_state: String,
    /// Element names referenced by input patterns
    pub input_alphabet: Vec<String>,
    /// Element names produced by literal output
    pub output_alphabet: Vec<String>,
    /// Rules in template order
    pub rules: Vec<Rule>,
    /// Construction warnings (e.g. unmatched apply-templates)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Mtt {
    /// Whether a state identifier exists
    pub fn has_state(&self, name: &str) -> bool {
        self.states.iter().any(|s| s == name)
    }

    /// Rules whose input pattern matches the given element
    pub fn rules_for<'m>(&'m self, element: &str) -> impl Iterator<Item = &'m Rule> + 'm {
        let element = element.to_string();
        self.rules
            .iter()
            .filter(move |r| r.pattern.element == element)
    }
}
