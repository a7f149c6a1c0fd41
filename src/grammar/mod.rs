//! Regular tree grammars with type constraints and cardinalities
//!
//! A schema is translated into a [`TreeGrammar`]: a root nonterminal, an
//! ordered list of productions over element names and atomic type labels,
//! a table of value constraints (base type plus facets), and a table of
//! attribute declarations. Grammars are built once per schema and read-only
//! afterwards.

mod parser;

pub use parser::{SchemaParser, SchemaTranslation};

use once_cell::sync::Lazy;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;

/// Atomic type labels (the Σ alphabet of the grammar)
static ATOMIC_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "string",
        "normalizedString",
        "token",
        "boolean",
        "integer",
        "int",
        "long",
        "short",
        "byte",
        "nonNegativeInteger",
        "positiveInteger",
        "decimal",
        "float",
        "double",
        "date",
        "dateTime",
        "time",
        "anyURI",
    ]
    .into_iter()
    .collect()
});

/// Whether a symbol is an atomic type label rather than a nonterminal
pub fn is_atomic_type(name: &str) -> bool {
    ATOMIC_TYPES.contains(name)
}

/// Content model kind of a production
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Ordered children
    Sequence,
    /// Exactly one of the listed children
    Choice,
    /// All listed children in any order
    All,
}

/// Occurrence bounds for a production's rhs in its parent
///
/// `max == None` means unbounded; it serializes as `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cardinality {
    /// Minimum occurrences
    pub min: u32,
    /// Maximum occurrences, `None` for unbounded
    pub max: Option<u32>,
}

impl Cardinality {
    /// The default (1, 1) cardinality
    pub const ONE: Cardinality = Cardinality {
        min: 1,
        max: Some(1),
    };

    /// Create a bounded cardinality
    pub fn bounded(min: u32, max: u32) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    /// Create an unbounded cardinality
    pub fn unbounded(min: u32) -> Self {
        Self { min, max: None }
    }

    /// Whether the lower bound admits absence
    pub fn is_optional(&self) -> bool {
        self.min == 0
    }

    /// Whether more than one occurrence is admitted
    pub fn is_many(&self) -> bool {
        match self.max {
            None => true,
            Some(max) => max > 1,
        }
    }
}

impl Default for Cardinality {
    fn default() -> Self {
        Self::ONE
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "({},{})", self.min, max),
            None => write!(f, "({},∞)", self.min),
        }
    }
}

impl Serialize for Cardinality {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(2))?;
        seq.serialize_element(&(self.min as i64))?;
        seq.serialize_element(&self.max.map_or(-1i64, |m| m as i64))?;
        seq.end()
    }
}

/// A production rule: `lhs → rhs` with a content kind and cardinality
#[derive(Debug, Clone, Serialize)]
pub struct Production {
    /// Parent element name (nonterminal)
    pub lhs: String,
    /// Ordered child symbols (nonterminals or atomic type labels)
    pub rhs: Vec<String>,
    /// Content model kind
    #[serde(rename = "type")]
    pub kind: ContentKind,
    /// Occurrence bounds
    pub cardinality: Cardinality,
}

impl Production {
    /// Whether this production derives a single atomic type label
    pub fn is_leaf(&self) -> bool {
        self.rhs.len() == 1 && is_atomic_type(&self.rhs[0])
    }
}

/// A single constraining facet, e.g. `minInclusive = 0`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Facet {
    /// Facet keyword (from the closed XSD facet set)
    pub name: String,
    /// Literal facet value
    pub value: String,
}

/// Facet keywords the grammar records
pub const FACET_KEYS: [&str; 9] = [
    "minInclusive",
    "maxInclusive",
    "minExclusive",
    "maxExclusive",
    "enumeration",
    "pattern",
    "length",
    "minLength",
    "maxLength",
];

/// Value constraint for an element or attribute: base type plus facets
#[derive(Debug, Clone, Default, Serialize)]
pub struct TypeConstraint {
    /// Base atomic type
    pub base_type: String,
    /// Facets in document order; `enumeration` may occur repeatedly
    pub restrictions: Vec<Facet>,
}

impl TypeConstraint {
    /// Create a constraint with no facets
    pub fn new(base_type: impl Into<String>) -> Self {
        Self {
            base_type: base_type.into(),
            restrictions: Vec::new(),
        }
    }

    /// First value recorded for a facet keyword
    pub fn restriction(&self, name: &str) -> Option<&str> {
        self.restrictions
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    /// Whether a facet keyword is present
    pub fn has_restriction(&self, name: &str) -> bool {
        self.restrictions.iter().any(|f| f.name == name)
    }

    /// All `enumeration` facet values in document order
    pub fn enumeration_values(&self) -> Vec<&str> {
        self.restrictions
            .iter()
            .filter(|f| f.name == "enumeration")
            .map(|f| f.value.as_str())
            .collect()
    }
}

/// Attribute declaration on an element
#[derive(Debug, Clone, Serialize)]
pub struct AttributeDecl {
    /// Attribute name
    pub name: String,
    /// Base type name
    pub type_ref: String,
    /// Whether `use="required"` was declared
    pub required: bool,
    /// Facets carried by a named simple type reference. Inline
    /// restrictions are recorded in the constraint table only.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub restrictions: Vec<Facet>,
}

/// Insertion-ordered table from name to [`TypeConstraint`]
///
/// Serializes as a JSON map; iteration order mirrors schema order.
#[derive(Debug, Clone, Default)]
pub struct ConstraintTable {
    entries: Vec<(String, TypeConstraint)>,
}

impl ConstraintTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a constraint
    pub fn insert(&mut self, name: impl Into<String>, constraint: TypeConstraint) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = constraint,
            None => self.entries.push((name, constraint)),
        }
    }

    /// Look up a constraint by name
    pub fn get(&self, name: &str) -> Option<&TypeConstraint> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
    }

    /// Whether a name has a constraint
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypeConstraint)> {
        self.entries.iter().map(|(n, c)| (n.as_str(), c))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ConstraintTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, constraint) in &self.entries {
            map.serialize_entry(name, constraint)?;
        }
        map.end()
    }
}

/// Insertion-ordered table from element name to its attribute declarations
#[derive(Debug, Clone, Default)]
pub struct AttributeTable {
    entries: Vec<(String, Vec<AttributeDecl>)>,
}

impl AttributeTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the declarations for an element
    pub fn insert(&mut self, element: impl Into<String>, decls: Vec<AttributeDecl>) {
        let element = element.into();
        match self.entries.iter_mut().find(|(n, _)| *n == element) {
            Some((_, existing)) => *existing = decls,
            None => self.entries.push((element, decls)),
        }
    }

    /// Declarations for an element, if any
    pub fn get(&self, element: &str) -> Option<&[AttributeDecl]> {
        self.entries
            .iter()
            .find(|(n, _)| n == element)
            .map(|(_, d)| d.as_slice())
    }

    /// Find a single declaration by element and attribute name
    pub fn decl(&self, element: &str, attribute: &str) -> Option<&AttributeDecl> {
        self.get(element)?.iter().find(|d| d.name == attribute)
    }

    /// Iterate entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[AttributeDecl])> {
        self.entries.iter().map(|(n, d)| (n.as_str(), d.as_slice()))
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for AttributeTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (element, decls) in &self.entries {
            map.serialize_entry(element, decls)?;
        }
        map.end()
    }
}

/// Regular tree grammar built from a schema
#[derive(Debug, Clone, Default, Serialize)]
pub struct TreeGrammar {
    /// Root nonterminal
    pub root_element: String,
    /// Productions in schema order
    pub productions: Vec<Production>,
    /// Value constraints keyed by element or attribute name
    pub type_constraints: ConstraintTable,
    /// Attribute declarations keyed by element name
    pub attributes: AttributeTable,
}

impl TreeGrammar {
    /// First production whose lhs is the given element
    pub fn production(&self, lhs: &str) -> Option<&Production> {
        self.productions.iter().find(|p| p.lhs == lhs)
    }

    /// Whether any production derives the given element
    pub fn has_element(&self, name: &str) -> bool {
        self.productions.iter().any(|p| p.lhs == name)
    }

    /// Structural invariant check: every rhs symbol is atomic or produced,
    /// the root has a production, and all bounds are consistent.
    ///
    /// Returns the list of violations (empty when the grammar is sound).
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();

        if !self.root_element.is_empty() && !self.has_element(&self.root_element) {
            violations.push(format!(
                "root element '{}' has no production",
                self.root_element
            ));
        }

        for prod in &self.productions {
            for symbol in &prod.rhs {
                if !is_atomic_type(symbol) && !self.has_element(symbol) {
                    violations.push(format!(
                        "symbol '{}' in production for '{}' is neither atomic nor produced",
                        symbol, prod.lhs
                    ));
                }
            }
            if let Some(max) = prod.cardinality.max {
                if max < prod.cardinality.min {
                    violations.push(format!(
                        "production for '{}' has maxOccurs {} < minOccurs {}",
                        prod.lhs, max, prod.cardinality.min
                    ));
                }
            }
        }

        violations
    }
}
