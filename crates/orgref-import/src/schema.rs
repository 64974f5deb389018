//! Schema compilation and document validation
//!
//! Compiles the published XSD into a rule set (declared elements, the child
//! elements their content models allow, and the attributes they require) and
//! checks the parsed document against it before any record is produced.
//!
//! This covers the subset of XSD the reference schema exercises: element
//! declarations (global, inline and by reference), named complex types, and
//! sequence/choice/all content models. Contexts that share an element name
//! are merged: allowed children are unioned, required attributes
//! intersected.

use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

use crate::dom::{Document, Element};

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to compile schema: {0}")]
    Compile(String),

    #[error("document is not valid against the schema:\n  {}", .violations.join("\n  "))]
    Invalid { violations: Vec<String> },
}

pub type Result<T> = std::result::Result<T, SchemaError>;

/// What a declared element may contain and must carry
#[derive(Debug, Default, Clone)]
struct ElementRule {
    children: HashSet<String>,
    required_attributes: HashSet<String>,
}

/// A schema compiled into a validator
#[derive(Debug)]
pub struct CompiledSchema {
    rules: HashMap<String, ElementRule>,
    roots: HashSet<String>,
}

impl CompiledSchema {
    /// Compile an XSD document into a validator
    pub fn compile(xsd: &str) -> Result<CompiledSchema> {
        let doc = Document::parse(xsd).map_err(|e| SchemaError::Compile(e.to_string()))?;
        let schema = doc.root();
        if schema.local_name() != "schema" {
            return Err(SchemaError::Compile(format!(
                "expected a schema document, found <{}>",
                schema.name()
            )));
        }

        let mut named_types = HashMap::new();
        for child in schema.all_children() {
            if child.local_name() == "complexType" {
                if let Some(name) = child.attr("name") {
                    named_types.insert(name.to_string(), child);
                }
            }
        }

        let mut compiler = Compiler {
            named_types,
            expanding: HashSet::new(),
            rules: HashMap::new(),
        };
        let mut roots = HashSet::new();
        for child in schema.all_children() {
            if child.local_name() == "element" {
                if let Some(name) = compiler.declare_element(child)? {
                    roots.insert(name);
                }
            }
        }

        if compiler.rules.is_empty() {
            return Err(SchemaError::Compile("schema declares no elements".to_string()));
        }

        debug!(
            elements = compiler.rules.len(),
            roots = roots.len(),
            "Compiled schema"
        );
        Ok(CompiledSchema {
            rules: compiler.rules,
            roots,
        })
    }

    /// Compile raw XSD bytes (must be UTF-8)
    pub fn compile_bytes(xsd: &[u8]) -> Result<CompiledSchema> {
        let text = std::str::from_utf8(xsd)
            .map_err(|e| SchemaError::Compile(format!("schema is not UTF-8: {}", e)))?;
        Self::compile(text)
    }

    /// Validate a parsed document; any violation fails the whole document
    pub fn validate(&self, doc: &Document) -> Result<()> {
        let mut violations = Vec::new();
        let root = doc.root();

        if !self.roots.contains(root.name()) {
            violations.push(format!("<{}> is not a declared root element", root.name()));
        }
        self.check_element(root, &mut violations);

        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::Invalid { violations })
        }
    }

    fn check_element(&self, element: &Element, violations: &mut Vec<String>) {
        let Some(rule) = self.rules.get(element.name()) else {
            violations.push(format!("<{}> is not declared in the schema", element.name()));
            return;
        };

        for attribute in &rule.required_attributes {
            if element.attr(attribute).is_none() {
                violations.push(format!(
                    "<{}> is missing required attribute {:?}",
                    element.name(),
                    attribute
                ));
            }
        }

        for child in element.all_children() {
            if rule.children.contains(child.name()) {
                self.check_element(child, violations);
            } else {
                violations.push(format!(
                    "<{}> does not allow child <{}>",
                    element.name(),
                    child.name()
                ));
            }
        }
    }
}

struct Compiler<'a> {
    named_types: HashMap<String, &'a Element>,
    /// Named types currently being expanded, to cut reference cycles
    expanding: HashSet<String>,
    rules: HashMap<String, ElementRule>,
}

impl<'a> Compiler<'a> {
    /// Register an element declaration; returns its name, or None for a
    /// reference (resolved at its global declaration)
    fn declare_element(&mut self, element: &'a Element) -> Result<Option<String>> {
        if element.attr("ref").is_some() {
            return Ok(None);
        }
        let Some(name) = element.attr("name") else {
            return Err(SchemaError::Compile(
                "element declaration has neither name nor ref".to_string(),
            ));
        };

        let mut rule = ElementRule::default();

        // A type attribute either names a complex type declared elsewhere or
        // a built-in simple type, which contributes nothing
        if let Some(type_name) = element.attr("type") {
            let key = local(type_name).to_string();
            if self.expanding.insert(key.clone()) {
                if let Some(named) = self.named_types.get(&key).copied() {
                    self.collect_type(named, &mut rule)?;
                }
                self.expanding.remove(&key);
            }
        }

        for child in element.all_children() {
            if child.local_name() == "complexType" {
                self.collect_type(child, &mut rule)?;
            }
        }

        self.merge_rule(name, rule);
        Ok(Some(name.to_string()))
    }

    fn collect_type(&mut self, complex_type: &'a Element, rule: &mut ElementRule) -> Result<()> {
        for child in complex_type.all_children() {
            match child.local_name() {
                "attribute" => {
                    if let Some(attr_name) = child.attr("name") {
                        if child.attr("use") == Some("required") {
                            rule.required_attributes.insert(attr_name.to_string());
                        }
                    }
                },
                "sequence" | "choice" | "all" => self.collect_particles(child, rule)?,
                "simpleContent" | "complexContent" | "extension" | "restriction" => {
                    self.collect_type(child, rule)?;
                },
                _ => {},
            }
        }
        Ok(())
    }

    fn collect_particles(&mut self, particle: &'a Element, rule: &mut ElementRule) -> Result<()> {
        for child in particle.all_children() {
            match child.local_name() {
                "element" => {
                    if let Some(reference) = child.attr("ref") {
                        rule.children.insert(local(reference).to_string());
                    } else if let Some(name) = child.attr("name") {
                        rule.children.insert(name.to_string());
                        self.declare_element(child)?;
                    }
                },
                "sequence" | "choice" | "all" => self.collect_particles(child, rule)?,
                _ => {},
            }
        }
        Ok(())
    }

    fn merge_rule(&mut self, name: &str, rule: ElementRule) {
        match self.rules.get_mut(name) {
            Some(existing) => {
                existing.children.extend(rule.children);
                existing
                    .required_attributes
                    .retain(|a| rule.required_attributes.contains(a));
            },
            None => {
                self.rules.insert(name.to_string(), rule);
            },
        }
    }
}

fn local(name: &str) -> &str {
    match name.rsplit(':').next() {
        Some(local) => local,
        None => name,
    }
}
