//! Stylesheet to MTT translation
//!
//! Each template becomes one rule: a state derived from its match pattern
//! and mode, a guarded input pattern, and an output-tree skeleton
//! translated from the template body. Translation is two-phase so that
//! `apply-templates` callees resolve against the full template set.

use std::collections::HashMap;

use super::{
    AttrValue, Branch, ChildrenMatch, Guard, InputMatch, Mtt, OutputAttribute, OutputNode, Rule,
    TestExpr,
};
use crate::documents::{Document, Element};
use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::XSLT_NAMESPACE;

/// Mode value used when a template declares none
const DEFAULT_MODE: &str = "default";

/// One template collected in the first pass
struct TemplateEntry<'a> {
    element: &'a Element,
    match_value: String,
    mode: String,
    state: String,
    guard_text: Option<String>,
}

/// Translates a subset-conforming stylesheet into an [`Mtt`]
#[derive(Debug)]
pub struct StylesheetCompiler {
    limits: Limits,
}

impl Default for StylesheetCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl StylesheetCompiler {
    /// Create a compiler with default limits
    pub fn new() -> Self {
        Self {
            limits: Limits::default(),
        }
    }

    /// Create a compiler with explicit limits
    pub fn with_limits(limits: Limits) -> Self {
        Self { limits }
    }

    /// Translate a stylesheet into an MTT
    pub fn compile(self, stylesheet: &str) -> Result<Mtt> {
        let doc = Document::parse(stylesheet, &self.limits)?;
        let root = doc.into_root()?;

        let mut templates = Vec::new();
        collect_templates(&root, &mut templates);
        self.limits.check_templates(templates.len())?;

        // First pass: derive states and reject ambiguous template pairs,
        // so the second pass can resolve callees against every state.
        let mut states: Vec<String> = Vec::new();
        let mut entries: Vec<TemplateEntry> = Vec::new();
        let mut seen: HashMap<(String, String), usize> = HashMap::new();

        for template in templates {
            let Some(match_value) = template.get_attribute("match") else {
                continue;
            };
            let match_value = match_value.to_string();
            let mode = template
                .get_attribute("mode")
                .unwrap_or(DEFAULT_MODE)
                .to_string();
            let guard_text = template_guard(template);

            if let Some(&prev) = seen.get(&(match_value.clone(), mode.clone())) {
                let prev_guard = &entries[prev].guard_text;
                let distinct_guards = match (prev_guard, &guard_text) {
                    (Some(a), Some(b)) => normalize_guard(a) != normalize_guard(b),
                    _ => false,
                };
                if !distinct_guards {
                    return Err(Error::Transducer(format!(
                        "ambiguous templates: duplicate match '{}' in mode '{}' without \
                         distinguishing guards",
                        match_value, mode
                    )));
                }
            } else {
                seen.insert((match_value.clone(), mode.clone()), entries.len());
            }

            let state = unique_state_name(&match_value, &mode, &states);
            states.push(state.clone());
            entries.push(TemplateEntry {
                element: template,
                match_value,
                mode,
                state,
                guard_text,
            });
        }

        // Second pass: translate bodies.
        let mut translator = BodyTranslator {
            states,
            warnings: Vec::new(),
            resolver: entries
                .iter()
                .map(|e| (e.match_value.clone(), e.mode.clone(), e.state.clone()))
                .collect(),
        };

        let mut rules = Vec::new();
        for entry in &entries {
            let output = OutputNode::Sequence {
                children: translator.translate_body(entry.element, &entry.state),
            };
            rules.push(Rule {
                state: entry.state.clone(),
                pattern: parse_match_pattern(&entry.match_value),
                guard: entry.guard_text.as_deref().map(Guard::new),
                output,
            });
        }

        // Alphabets, in rule order.
        let mut input_alphabet = Vec::new();
        for rule in &rules {
            if !input_alphabet.contains(&rule.pattern.element) {
                input_alphabet.push(rule.pattern.element.clone());
            }
        }
        let mut output_alphabet = Vec::new();
        for rule in &rules {
            rule.output.collect_element_names(&mut output_alphabet);
        }

        let initial_state = entries
            .iter()
            .find(|e| e.match_value == "/")
            .or_else(|| entries.first())
            .map(|e| e.state.clone())
            .unwrap_or_else(|| "q_root".to_string());

        Ok(Mtt {
            states: translator.states,
            initial_state,
            input_alphabet,
            output_alphabet,
            rules,
            warnings: translator.warnings,
        })
    }
}

/// Collect template elements anywhere under the stylesheet root
fn collect_templates<'a>(elem: &'a Element, into: &mut Vec<&'a Element>) {
    for child in &elem.children {
        if child.qname.in_namespace(XSLT_NAMESPACE) && child.local_name() == "template" {
            into.push(child);
        } else {
            collect_templates(child, into);
        }
    }
}

/// Test of a top-level `xsl:if` wrapping the whole template body, if any
fn template_guard(template: &Element) -> Option<String> {
    if template.children.len() != 1 {
        return None;
    }
    let only = &template.children[0];
    if only.qname.in_namespace(XSLT_NAMESPACE) && only.local_name() == "if" {
        only.get_attribute("test").map(|t| t.to_string())
    } else {
        None
    }
}

/// Canonical text of a guard, for ambiguity comparison
fn normalize_guard(text: &str) -> String {
    crate::predicate::Predicate::parse(text).to_string()
}

/// Derive a state name from a match pattern and mode:
/// `/` → `root`, interior `/` → `_`, leading `@` → `attr_`, `*` → `any`,
/// then `q_<base>_<mode>`. Collisions append a monotone counter.
fn unique_state_name(match_value: &str, mode: &str, taken: &[String]) -> String {
    let base = if match_value == "/" {
        "root".to_string()
    } else {
        let stripped = match match_value.strip_prefix('@') {
            Some(rest) => format!("attr_{}", rest),
            None => match_value.to_string(),
        };
        stripped.replace('/', "_").replace('*', "any")
    };

    let candidate = format!("q_{}_{}", base, mode);
    if !taken.contains(&candidate) {
        return candidate;
    }
    let mut counter = 2;
    loop {
        let numbered = format!("{}_{}", candidate, counter);
        if !taken.contains(&numbered) {
            return numbered;
        }
        counter += 1;
    }
}

/// Derive the input pattern from a match pattern
fn parse_match_pattern(match_value: &str) -> InputMatch {
    let element = if match_value == "/" {
        "root".to_string()
    } else {
        match_value
            .trim_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(match_value)
            .to_string()
    };

    InputMatch {
        element,
        children: ChildrenMatch::Any,
    }
}

/// Final path segment of a select expression
fn select_tail(select: &str) -> &str {
    select
        .trim_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(select)
}

struct BodyTranslator {
    states: Vec<String>,
    warnings: Vec<String>,
    /// (match, mode, state) for every registered template
    resolver: Vec<(String, String, String)>,
}

impl BodyTranslator {
    fn translate_body(&mut self, elem: &Element, state: &str) -> Vec<OutputNode> {
        let mut children = Vec::new();

        if let Some(text) = &elem.text {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                children.push(OutputNode::Text {
                    value: trimmed.to_string(),
                });
            }
        }

        for child in &elem.children {
            if let Some(output) = self.translate_instruction(child, state) {
                children.push(output);
            }
        }

        children
    }

    fn translate_instruction(&mut self, elem: &Element, state: &str) -> Option<OutputNode> {
        if elem.qname.in_namespace(XSLT_NAMESPACE) {
            match elem.local_name() {
                "apply-templates" => Some(self.translate_apply_templates(elem)),
                "for-each" => Some(self.translate_for_each(elem, state)),
                "value-of" => Some(OutputNode::ValueOf {
                    select: elem.get_attribute("select").unwrap_or_default().to_string(),
                }),
                "if" => Some(OutputNode::If {
                    test: TestExpr::new(elem.get_attribute("test").unwrap_or_default()),
                    then: Box::new(OutputNode::Sequence {
                        children: self.translate_body(elem, state),
                    }),
                }),
                "choose" => Some(self.translate_choose(elem, state)),
                "text" => Some(OutputNode::Text {
                    value: elem.text.clone().unwrap_or_default(),
                }),
                "element" => Some(OutputNode::Element {
                    name: elem.get_attribute("name").unwrap_or_default().to_string(),
                    attributes: Vec::new(),
                    children: self.translate_body(elem, state),
                }),
                "attribute" => Some(self.translate_attribute(elem, state)),
                // Parameters carry no output
                _ => None,
            }
        } else {
            Some(self.translate_literal_element(elem, state))
        }
    }

    fn translate_apply_templates(&mut self, elem: &Element) -> OutputNode {
        let select = elem
            .get_attribute("select")
            .unwrap_or("node()")
            .to_string();
        let mode = elem.get_attribute("mode").unwrap_or(DEFAULT_MODE);

        let callee = self.resolve_callee(&select, mode);
        if callee.is_none() {
            self.warnings.push(format!(
                "no template matches apply-templates select '{}' (mode '{}'); \
                 the selected subtree is discarded",
                select, mode
            ));
        }

        OutputNode::ApplyTemplates { select, callee }
    }

    /// Resolve a callee state: exact match value first, then final path
    /// segment agreement, in template order.
    fn resolve_callee(&self, select: &str, mode: &str) -> Option<String> {
        if let Some((_, _, state)) = self
            .resolver
            .iter()
            .find(|(m, md, _)| m == select && md == mode)
        {
            return Some(state.clone());
        }

        let tail = select_tail(select);
        self.resolver
            .iter()
            .find(|(m, md, _)| md == mode && select_tail(m) == tail)
            .map(|(_, _, state)| state.clone())
    }

    fn translate_for_each(&mut self, elem: &Element, state: &str) -> OutputNode {
        let select = elem.get_attribute("select").unwrap_or_default().to_string();

        // Fresh auxiliary state for list processing
        let list_state = format!("{}_foreach_{}", state, self.states.len());
        self.states.push(list_state.clone());

        let body = OutputNode::Sequence {
            children: self.translate_body(elem, &list_state),
        };

        OutputNode::ForEach {
            select,
            body: Box::new(body),
            list_state,
        }
    }

    fn translate_choose(&mut self, elem: &Element, state: &str) -> OutputNode {
        let mut branches = Vec::new();

        for child in &elem.children {
            match child.local_name() {
                "when" => branches.push(Branch::When {
                    test: TestExpr::new(child.get_attribute("test").unwrap_or_default()),
                    body: OutputNode::Sequence {
                        children: self.translate_body(child, state),
                    },
                }),
                "otherwise" => branches.push(Branch::Otherwise {
                    body: OutputNode::Sequence {
                        children: self.translate_body(child, state),
                    },
                }),
                _ => {}
            }
        }

        OutputNode::Choose { branches }
    }

    fn translate_attribute(&mut self, elem: &Element, state: &str) -> OutputNode {
        let name = elem.get_attribute("name").unwrap_or_default().to_string();
        let children = self.translate_children_only(elem, state);

        if children.is_empty() {
            OutputNode::Attribute {
                name,
                value: Some(elem.text.clone().unwrap_or_default()),
                children,
            }
        } else {
            OutputNode::Attribute {
                name,
                value: None,
                children,
            }
        }
    }

    /// Translate element children without lifting the element's own text
    fn translate_children_only(&mut self, elem: &Element, state: &str) -> Vec<OutputNode> {
        let mut children = Vec::new();
        for child in &elem.children {
            if let Some(output) = self.translate_instruction(child, state) {
                children.push(output);
            }
        }
        children
    }

    fn translate_literal_element(&mut self, elem: &Element, state: &str) -> OutputNode {
        let mut attributes = Vec::new();
        for (qname, value) in &elem.attributes {
            let attr_value = match parse_avt(value) {
                Some(expr) => AttrValue::Path(expr),
                None => AttrValue::Literal(value.clone()),
            };
            attributes.push(OutputAttribute {
                name: qname.local_name.clone(),
                value: attr_value,
            });
        }

        OutputNode::Element {
            name: elem.local_name().to_string(),
            attributes,
            children: self.translate_body(elem, state),
        }
    }
}

/// Extract the path of a single-segment attribute-value template, if the
/// value contains one
fn parse_avt(value: &str) -> Option<String> {
    let start = value.find('{')?;
    let end = value.find('}')?;
    if end <= start {
        return None;
    }
    Some(value[start + 1..end].to_string())
}
