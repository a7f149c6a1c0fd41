//! Schema document parsing
//!
//! Translates an XML-Schema-shaped document into a [`TreeGrammar`]. The
//! walk is two-pass: named type definitions are collected first so element
//! declarations can resolve `type=` references, then top-level elements
//! are processed in document order. The first top-level element becomes
//! the grammar root.

use std::collections::{HashMap, HashSet};

use super::{
    AttributeDecl, Cardinality, ContentKind, Facet, Production, TreeGrammar, TypeConstraint,
    FACET_KEYS,
};
use crate::documents::{Document, Element};
use crate::error::{Error, Result, SchemaError};
use crate::limits::Limits;
use crate::XSD_NAMESPACE;

/// XSD element local names
mod xsd_elements {
    pub const SCHEMA: &str = "schema";
    pub const ELEMENT: &str = "element";
    pub const COMPLEX_TYPE: &str = "complexType";
    pub const SIMPLE_TYPE: &str = "simpleType";
    pub const ATTRIBUTE: &str = "attribute";
    pub const SEQUENCE: &str = "sequence";
    pub const CHOICE: &str = "choice";
    pub const ALL: &str = "all";
    pub const RESTRICTION: &str = "restriction";
    pub const EXTENSION: &str = "extension";
    pub const SIMPLE_CONTENT: &str = "simpleContent";
}

/// XSD attribute names
mod xsd_attrs {
    pub const NAME: &str = "name";
    pub const TYPE: &str = "type";
    pub const REF: &str = "ref";
    pub const BASE: &str = "base";
    pub const VALUE: &str = "value";
    pub const USE: &str = "use";
    pub const MIN_OCCURS: &str = "minOccurs";
    pub const MAX_OCCURS: &str = "maxOccurs";
}

/// Built-in type prefix in schema documents
const XS_PREFIX: &str = "xs:";

/// Result of translating one schema
#[derive(Debug)]
pub struct SchemaTranslation {
    /// The tree grammar
    pub grammar: TreeGrammar,
    /// Degraded-default warnings collected during translation
    pub warnings: Vec<String>,
}

/// Parses a schema document into a tree grammar
#[derive(Debug)]
pub struct SchemaParser {
    limits: Limits,
    warnings: Vec<String>,
    complex_types: HashMap<String, Element>,
    simple_types: HashMap<String, Element>,
    emitted: HashSet<String>,
    grammar: TreeGrammar,
}

impl Default for SchemaParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaParser {
    /// Create a parser with default limits
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    /// Create a parser with explicit limits
    pub fn with_limits(limits: Limits) -> Self {
        Self {
            limits,
            warnings: Vec::new(),
            complex_types: HashMap::new(),
            simple_types: HashMap::new(),
            emitted: HashSet::new(),
            grammar: TreeGrammar::default(),
        }
    }

    /// Parse a schema document into a tree grammar
    pub fn parse(mut self, schema: &str) -> Result<SchemaTranslation> {
        let doc = Document::parse(schema, &self.limits)?;
        let root = doc.into_root()?;

        if root.local_name() != xsd_elements::SCHEMA || !root.qname.in_namespace(XSD_NAMESPACE) {
            return Err(Error::Schema(SchemaError::new(
                "root element is not an XML Schema document",
            )));
        }

        // First pass: collect named type definitions.
        self.collect_types(&root);

        // Second pass: process top-level element declarations. The first
        // one becomes the grammar root.
        for elem in root.find_children(xsd_elements::ELEMENT) {
            if let Some(name) = elem.get_attribute(xsd_attrs::NAME) {
                let name = name.to_string();
                if self.grammar.root_element.is_empty() {
                    self.grammar.root_element = name.clone();
                }
                self.process_element(elem, &name)?;
            }
        }

        if self.grammar.root_element.is_empty() {
            return Err(Error::Schema(SchemaError::new(
                "schema declares no top-level element",
            )));
        }

        self.limits.check_productions(self.grammar.productions.len())?;

        Ok(SchemaTranslation {
            grammar: self.grammar,
            warnings: self.warnings,
        })
    }

    fn collect_types(&mut self, elem: &Element) {
        for child in &elem.children {
            if child.qname.in_namespace(XSD_NAMESPACE) {
                if let Some(name) = child.get_attribute(xsd_attrs::NAME) {
                    match child.local_name() {
                        xsd_elements::COMPLEX_TYPE => {
                            self.complex_types.insert(name.to_string(), child.clone());
                        }
                        xsd_elements::SIMPLE_TYPE => {
                            self.simple_types.insert(name.to_string(), child.clone());
                        }
                        _ => {}
                    }
                }
            }
            self.collect_types(child);
        }
    }

    fn process_element(&mut self, elem: &Element, name: &str) -> Result<()> {
        // Circular definitions and repeated references reuse the
        // already-emitted production.
        if !self.emitted.insert(name.to_string()) {
            return Ok(());
        }

        let cardinality = self.read_occurs(elem, name)?;

        if let Some(type_ref) = elem.get_attribute(xsd_attrs::TYPE) {
            let type_ref = type_ref.to_string();
            if let Some(base) = type_ref.strip_prefix(XS_PREFIX) {
                self.emit_leaf(name, base, Vec::new(), cardinality);
            } else if let Some(ct) = self.complex_types.get(&type_ref).cloned() {
                self.process_complex_type(&ct, name, cardinality)?;
            } else if let Some(st) = self.simple_types.get(&type_ref).cloned() {
                self.process_simple_type(&st, name, cardinality);
            } else {
                self.warnings.push(format!(
                    "unknown type reference '{}' for element '{}'; defaulting to string",
                    type_ref, name
                ));
                self.emit_leaf(name, "string", Vec::new(), cardinality);
            }
        } else if let Some(ct) = elem.find_child(xsd_elements::COMPLEX_TYPE) {
            self.process_complex_type(ct, name, cardinality)?;
        } else if let Some(st) = elem.find_child(xsd_elements::SIMPLE_TYPE) {
            self.process_simple_type(st, name, cardinality);
        } else {
            self.warnings.push(format!(
                "element '{}' declares no type; defaulting to string",
                name
            ));
            self.emit_leaf(name, "string", Vec::new(), cardinality);
        }

        Ok(())
    }

    /// Register a constraint and a leaf production `name → base`
    fn emit_leaf(&mut self, name: &str, base: &str, facets: Vec<Facet>, cardinality: Cardinality) {
        self.grammar.type_constraints.insert(
            name,
            TypeConstraint {
                base_type: base.to_string(),
                restrictions: facets,
            },
        );
        self.grammar.productions.push(Production {
            lhs: name.to_string(),
            rhs: vec![base.to_string()],
            kind: ContentKind::Sequence,
            cardinality,
        });
    }

    fn read_occurs(&self, elem: &Element, name: &str) -> Result<Cardinality> {
        let min = match elem.get_attribute(xsd_attrs::MIN_OCCURS) {
            Some(value) => value.parse::<u32>().map_err(|_| {
                Error::Schema(
                    SchemaError::new(format!("invalid minOccurs value '{}'", value))
                        .with_component(name),
                )
            })?,
            None => 1,
        };

        let max = match elem.get_attribute(xsd_attrs::MAX_OCCURS) {
            Some("unbounded") => None,
            Some(value) => Some(value.parse::<u32>().map_err(|_| {
                Error::Schema(
                    SchemaError::new(format!("invalid maxOccurs value '{}'", value))
                        .with_component(name),
                )
            })?),
            None => Some(1),
        };

        if let Some(max) = max {
            if max < min {
                return Err(Error::Schema(
                    SchemaError::new(format!(
                        "inconsistent cardinality: maxOccurs {} < minOccurs {}",
                        max, min
                    ))
                    .with_component(name),
                ));
            }
        }

        Ok(Cardinality { min, max })
    }

    fn process_complex_type(
        &mut self,
        ct: &Element,
        element_name: &str,
        cardinality: Cardinality,
    ) -> Result<()> {
        // Attribute declarations: direct children, plus the ones carried
        // by a simpleContent extension.
        let mut decls = Vec::new();
        for attr in ct.find_children(xsd_elements::ATTRIBUTE) {
            if let Some(decl) = self.process_attribute(attr) {
                decls.push(decl);
            }
        }
        if let Some(sc) = ct.find_child(xsd_elements::SIMPLE_CONTENT) {
            if let Some(ext) = sc.find_child(xsd_elements::EXTENSION) {
                for attr in ext.find_children(xsd_elements::ATTRIBUTE) {
                    if let Some(decl) = self.process_attribute(attr) {
                        decls.push(decl);
                    }
                }
            }
        }
        if !decls.is_empty() {
            self.grammar.attributes.insert(element_name, decls);
        }

        // Content model: exactly one of sequence / choice / all, or
        // simpleContent, or nothing (attributes-only).
        if let Some(model) = ct.find_child(xsd_elements::SEQUENCE) {
            self.process_model(model, ContentKind::Sequence, element_name, cardinality)?;
        } else if let Some(model) = ct.find_child(xsd_elements::CHOICE) {
            self.process_model(model, ContentKind::Choice, element_name, cardinality)?;
        } else if let Some(model) = ct.find_child(xsd_elements::ALL) {
            self.process_model(model, ContentKind::All, element_name, cardinality)?;
        } else if let Some(sc) = ct.find_child(xsd_elements::SIMPLE_CONTENT) {
            let base = sc
                .find_child(xsd_elements::EXTENSION)
                .and_then(|ext| ext.get_attribute(xsd_attrs::BASE))
                .map(|b| b.strip_prefix(XS_PREFIX).unwrap_or(b).to_string())
                .unwrap_or_else(|| "string".to_string());
            self.emit_leaf(element_name, &base, Vec::new(), cardinality);
        } else {
            // Attributes-only content still derives the empty forest, so
            // the element keeps a production.
            self.grammar.productions.push(Production {
                lhs: element_name.to_string(),
                rhs: Vec::new(),
                kind: ContentKind::Sequence,
                cardinality,
            });
        }

        Ok(())
    }

    fn process_model(
        &mut self,
        model: &Element,
        kind: ContentKind,
        parent_name: &str,
        cardinality: Cardinality,
    ) -> Result<()> {
        let mut children = Vec::new();

        for child in model.find_children(xsd_elements::ELEMENT) {
            if let Some(name) = child.get_attribute(xsd_attrs::NAME) {
                let name = name.to_string();
                children.push(name.clone());
                self.process_element(child, &name)?;
            } else if let Some(reference) = child.get_attribute(xsd_attrs::REF) {
                // A ref= reuses the referenced element's nonterminal
                // without duplicating its productions.
                let reference = reference.strip_prefix(XS_PREFIX).unwrap_or(reference);
                children.push(reference.to_string());
            }
        }

        self.grammar.productions.push(Production {
            lhs: parent_name.to_string(),
            rhs: children,
            kind,
            cardinality,
        });

        Ok(())
    }

    fn process_simple_type(&mut self, st: &Element, element_name: &str, cardinality: Cardinality) {
        let (base, facets) = self.read_restriction(st, element_name);
        self.emit_leaf(element_name, &base, facets, cardinality);
    }

    /// Read a simpleType's restriction: base type plus facets in document
    /// order. `enumeration` accumulates across occurrences.
    fn read_restriction(&mut self, st: &Element, owner: &str) -> (String, Vec<Facet>) {
        let Some(restriction) = st.find_child(xsd_elements::RESTRICTION) else {
            self.warnings.push(format!(
                "simple type for '{}' has no restriction; defaulting to string",
                owner
            ));
            return ("string".to_string(), Vec::new());
        };

        let base = restriction
            .get_attribute(xsd_attrs::BASE)
            .map(|b| b.strip_prefix(XS_PREFIX).unwrap_or(b).to_string())
            .unwrap_or_else(|| "string".to_string());

        let mut facets = Vec::new();
        for child in &restriction.children {
            let facet_name = child.local_name();
            if !FACET_KEYS.contains(&facet_name) {
                continue;
            }
            let Some(value) = child.get_attribute(xsd_attrs::VALUE) else {
                continue;
            };

            if facet_name == "pattern" && regex::Regex::new(value).is_err() {
                self.warnings.push(format!(
                    "pattern facet '{}' on '{}' is not a valid regular expression",
                    value, owner
                ));
            }

            facets.push(Facet {
                name: facet_name.to_string(),
                value: value.to_string(),
            });
        }

        (base, facets)
    }

    fn process_attribute(&mut self, attr: &Element) -> Option<AttributeDecl> {
        let Some(name) = attr.get_attribute(xsd_attrs::NAME) else {
            self.warnings
                .push("attribute declaration without a name was skipped".to_string());
            return None;
        };
        let name = name.to_string();
        let required = attr.get_attribute(xsd_attrs::USE) == Some("required");

        if let Some(st) = attr.find_child(xsd_elements::SIMPLE_TYPE) {
            // Inline restriction: facets are recorded in the constraint
            // table only.
            let (base, facets) = self.read_restriction(st, &name);
            self.grammar.type_constraints.insert(
                name.as_str(),
                TypeConstraint {
                    base_type: base.clone(),
                    restrictions: facets,
                },
            );
            return Some(AttributeDecl {
                name,
                type_ref: base,
                required,
                restrictions: Vec::new(),
            });
        }

        if let Some(type_ref) = attr.get_attribute(xsd_attrs::TYPE) {
            if let Some(base) = type_ref.strip_prefix(XS_PREFIX) {
                self.grammar
                    .type_constraints
                    .insert(name.as_str(), TypeConstraint::new(base));
                return Some(AttributeDecl {
                    name,
                    type_ref: base.to_string(),
                    required,
                    restrictions: Vec::new(),
                });
            }

            // Named simple type: resolve through the table and carry the
            // facets on the declaration as well.
            if let Some(st) = self.simple_types.get(type_ref).cloned() {
                let (base, facets) = self.read_restriction(&st, &name);
                self.grammar.type_constraints.insert(
                    name.as_str(),
                    TypeConstraint {
                        base_type: base.clone(),
                        restrictions: facets.clone(),
                    },
                );
                return Some(AttributeDecl {
                    name,
                    type_ref: base,
                    required,
                    restrictions: facets,
                });
            }

            self.warnings.push(format!(
                "unknown type reference '{}' for attribute '{}'; defaulting to string",
                type_ref, name
            ));
        }

        self.grammar
            .type_constraints
            .insert(name.as_str(), TypeConstraint::new("string"));
        Some(AttributeDecl {
            name,
            type_ref: "string".to_string(),
            required,
            restrictions: Vec::new(),
        })
    }
}
