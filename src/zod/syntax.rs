//! Syntax tree access and builder binding resolution
//!
//! Source text is parsed with the tree-sitter TypeScript grammar. A chain is
//! only treated as a builder chain when its root identifier resolves to an
//! import of one of the configured builder modules and no closer scope
//! rebinds that name.

use serde_json::{Number, Value};
use std::collections::{HashMap, HashSet};
use tree_sitter::{Node, Parser, Tree};

use super::ParseFailure;
use crate::config::{ParseConfig, DEFAULT_MAX_DEPTH};

/// Parse TypeScript source into a syntax tree
pub fn parse_tree(source: &str) -> Result<Tree, ParseFailure> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_typescript::language_typescript())
        .map_err(|e| ParseFailure::new(format!("failed to load TypeScript grammar: {}", e)))?;
    parser
        .parse(source, None)
        .ok_or_else(|| ParseFailure::new("parser produced no syntax tree"))
}

// =============================================================================
// Node Helpers
// =============================================================================

pub fn text<'s>(node: &Node, source: &'s str) -> &'s str {
    node.utf8_text(source.as_bytes()).unwrap_or_default()
}

/// Strip wrappers that do not change the value of an expression
pub fn unwrap_expression(mut node: Node) -> Node {
    loop {
        match node.kind() {
            "parenthesized_expression" | "as_expression" | "satisfies_expression"
            | "non_null_expression" => match node.named_child(0) {
                Some(inner) => node = inner,
                None => return node,
            },
            _ => return node,
        }
    }
}

pub fn named_children<'t>(node: &Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

/// Expressions inside an `arguments` node
pub fn arguments<'t>(node: Option<Node<'t>>) -> Vec<Node<'t>> {
    node.map(|args| named_children(&args)).unwrap_or_default()
}

/// First descendant (including the node itself) matching `predicate`
pub fn find_descendant<'t>(node: Node<'t>, predicate: &dyn Fn(&Node) -> bool) -> Option<Node<'t>> {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if predicate(&current) {
            return Some(current);
        }
        let mut cursor = current.walk();
        let children: Vec<_> = current.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    None
}

// =============================================================================
// Literals
// =============================================================================

/// Statically known value of a literal expression. Literals nested deeper
/// than [`DEFAULT_MAX_DEPTH`] are not evaluated.
pub fn literal_value(node: Node, source: &str) -> Option<Value> {
    literal_at(node, source, 0)
}

fn literal_at(node: Node, source: &str, depth: usize) -> Option<Value> {
    if depth > DEFAULT_MAX_DEPTH {
        return None;
    }
    let node = unwrap_expression(node);
    match node.kind() {
        "string" => Some(Value::String(string_value(&node, source))),
        "template_string" => {
            let has_substitution = named_children(&node)
                .iter()
                .any(|child| child.kind() == "template_substitution");
            if has_substitution {
                return None;
            }
            let raw = text(&node, source);
            Some(Value::String(raw.trim_matches('`').to_string()))
        }
        "number" => number_value(text(&node, source)),
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        "null" => Some(Value::Null),
        "unary_expression" => {
            let operator = node.child_by_field_name("operator")?;
            let argument = node.child_by_field_name("argument")?;
            let value = literal_at(argument, source, depth + 1)?;
            match (text(&operator, source), value) {
                ("-", Value::Number(n)) => negate(&n),
                ("+", Value::Number(n)) => Some(Value::Number(n)),
                _ => None,
            }
        }
        "array" => named_children(&node)
            .into_iter()
            .map(|element| literal_at(element, source, depth + 1))
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        "object" => {
            let mut map = serde_json::Map::new();
            for child in named_children(&node) {
                if child.kind() != "pair" {
                    return None;
                }
                let key = property_key(&child.child_by_field_name("key")?, source)?;
                let value = literal_at(child.child_by_field_name("value")?, source, depth + 1)?;
                map.insert(key, value);
            }
            Some(Value::Object(map))
        }
        _ => None,
    }
}

/// Decoded content of a string literal
pub fn string_value(node: &Node, source: &str) -> String {
    let mut out = String::new();
    for child in named_children(node) {
        match child.kind() {
            "string_fragment" => out.push_str(text(&child, source)),
            "escape_sequence" => out.push_str(&unescape(text(&child, source))),
            _ => {}
        }
    }
    out
}

fn unescape(sequence: &str) -> String {
    match sequence {
        "\\n" => "\n".to_string(),
        "\\t" => "\t".to_string(),
        "\\r" => "\r".to_string(),
        "\\0" => "\0".to_string(),
        other => other.trim_start_matches('\\').to_string(),
    }
}

fn number_value(raw: &str) -> Option<Value> {
    let cleaned = raw.replace('_', "");
    let lower = cleaned.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        return i64::from_str_radix(hex, 16).ok().map(Value::from);
    }
    if let Some(bin) = lower.strip_prefix("0b") {
        return i64::from_str_radix(bin, 2).ok().map(Value::from);
    }
    if let Some(oct) = lower.strip_prefix("0o") {
        return i64::from_str_radix(oct, 8).ok().map(Value::from);
    }
    if let Ok(int) = cleaned.parse::<i64>() {
        return Some(Value::from(int));
    }
    cleaned
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

fn negate(n: &Number) -> Option<Value> {
    if let Some(i) = n.as_i64() {
        return Some(Value::from(-i));
    }
    n.as_f64().and_then(|f| Number::from_f64(-f)).map(Value::Number)
}

/// Name of a non-computed object key
pub fn property_key(key: &Node, source: &str) -> Option<String> {
    match key.kind() {
        "property_identifier" | "identifier" => Some(text(key, source).to_string()),
        "string" => Some(string_value(key, source)),
        "number" => Some(text(key, source).to_string()),
        _ => None,
    }
}

// =============================================================================
// Bindings
// =============================================================================

/// What a builder-bound identifier stands for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// The builder namespace object (`z`)
    Namespace,
    /// One factory imported on its own (`import { string } from "zod"`)
    Factory(String),
}

/// Builder bindings of one source file
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    imported: HashMap<String, Binding>,
    /// Names imported from modules that are not builder modules
    foreign: HashSet<String>,
    ambient: Option<String>,
}

impl Bindings {
    /// Collect builder imports from the top level of `root`
    pub fn collect(root: &Node, source: &str, config: &ParseConfig) -> Self {
        let mut bindings = Self::default();
        let mut saw_builder_import = false;

        for statement in named_children(root) {
            if statement.kind() != "import_statement" {
                continue;
            }
            let Some(module) = statement.child_by_field_name("source") else {
                continue;
            };
            let module = string_value(&module, source);
            let is_builder = config.builder_modules.iter().any(|m| *m == module);
            saw_builder_import |= is_builder;

            for clause in named_children(&statement) {
                if clause.kind() == "import_clause" {
                    bindings.collect_clause(&clause, source, is_builder);
                }
            }
        }

        if !saw_builder_import && config.allow_ambient_builder {
            bindings.ambient = Some(config.ambient_identifier.clone());
        }
        bindings
    }

    fn collect_clause(&mut self, clause: &Node, source: &str, is_builder: bool) {
        for part in named_children(clause) {
            match part.kind() {
                // default import
                "identifier" => self.bind(text(&part, source), Binding::Namespace, is_builder),
                "namespace_import" => {
                    if let Some(ident) = named_children(&part).into_iter().find(|n| n.kind() == "identifier") {
                        self.bind(text(&ident, source), Binding::Namespace, is_builder);
                    }
                }
                "named_imports" => {
                    for specifier in named_children(&part) {
                        if specifier.kind() != "import_specifier" {
                            continue;
                        }
                        let Some(name) = specifier.child_by_field_name("name") else {
                            continue;
                        };
                        let imported = text(&name, source);
                        let local = specifier
                            .child_by_field_name("alias")
                            .map(|alias| text(&alias, source))
                            .unwrap_or(imported);
                        let binding = match imported {
                            "z" | "default" => Binding::Namespace,
                            factory => Binding::Factory(factory.to_string()),
                        };
                        self.bind(local, binding, is_builder);
                    }
                }
                _ => {}
            }
        }
    }

    fn bind(&mut self, local: &str, binding: Binding, is_builder: bool) {
        if is_builder {
            self.imported.insert(local.to_string(), binding);
        } else {
            self.foreign.insert(local.to_string());
        }
    }

    /// Whether any builder binding exists at all
    pub fn is_empty(&self) -> bool {
        self.imported.is_empty() && self.ambient.is_none()
    }

    /// Resolve an identifier at its use site
    pub fn resolve(&self, ident: &Node, source: &str) -> Option<Binding> {
        let name = text(ident, source);
        let binding = match self.imported.get(name) {
            Some(binding) => binding.clone(),
            None if self.ambient.as_deref() == Some(name) && !self.foreign.contains(name) => {
                Binding::Namespace
            }
            None => return None,
        };
        if is_shadowed(ident, source, name) {
            return None;
        }
        Some(binding)
    }
}

/// Whether a scope between `use_site` and the module root rebinds `name`
pub fn is_shadowed(use_site: &Node, source: &str, name: &str) -> bool {
    let mut current = *use_site;
    while let Some(scope) = current.parent() {
        let rebinds = match scope.kind() {
            "arrow_function" | "function_declaration" | "function_expression" | "function"
            | "generator_function" | "generator_function_declaration" | "method_definition" => {
                ["parameters", "parameter"]
                    .iter()
                    .filter_map(|field| scope.child_by_field_name(field))
                    .any(|params| pattern_binds(&params, source, name))
            }
            "catch_clause" => scope
                .child_by_field_name("parameter")
                .is_some_and(|param| pattern_binds(&param, source, name)),
            "for_statement" => scope
                .child_by_field_name("initializer")
                .is_some_and(|init| declares(&init, source, name)),
            "for_in_statement" => scope
                .child_by_field_name("left")
                .is_some_and(|left| pattern_binds(&left, source, name)),
            "statement_block" | "program" | "class_body" | "switch_body" => named_children(&scope)
                .iter()
                .any(|statement| declares(statement, source, name)),
            _ => false,
        };
        if rebinds {
            return true;
        }
        current = scope;
    }
    false
}

/// Whether a statement declares `name` in its enclosing scope
fn declares(statement: &Node, source: &str, name: &str) -> bool {
    match statement.kind() {
        "lexical_declaration" | "variable_declaration" => named_children(statement)
            .iter()
            .filter(|d| d.kind() == "variable_declarator")
            .filter_map(|d| d.child_by_field_name("name"))
            .any(|pattern| pattern_binds(&pattern, source, name)),
        "function_declaration" | "generator_function_declaration" | "class_declaration"
        | "abstract_class_declaration" | "enum_declaration" => statement
            .child_by_field_name("name")
            .is_some_and(|n| text(&n, source) == name),
        "export_statement" => statement
            .child_by_field_name("declaration")
            .is_some_and(|decl| declares(&decl, source, name)),
        _ => false,
    }
}

/// Whether a binding pattern introduces `name`
fn pattern_binds(pattern: &Node, source: &str, name: &str) -> bool {
    match pattern.kind() {
        "identifier" | "shorthand_property_identifier_pattern" => text(pattern, source) == name,
        "required_parameter" | "optional_parameter" => pattern
            .child_by_field_name("pattern")
            .is_some_and(|p| pattern_binds(&p, source, name)),
        "pair_pattern" => pattern
            .child_by_field_name("value")
            .is_some_and(|v| pattern_binds(&v, source, name)),
        "assignment_pattern" | "object_assignment_pattern" => pattern
            .child_by_field_name("left")
            .is_some_and(|l| pattern_binds(&l, source, name)),
        "formal_parameters" | "object_pattern" | "array_pattern" | "rest_pattern"
        | "lexical_declaration" | "variable_declaration" => named_children(pattern)
            .iter()
            .any(|child| pattern_binds(child, source, name)),
        "variable_declarator" => pattern
            .child_by_field_name("name")
            .is_some_and(|n| pattern_binds(&n, source, name)),
        _ => false,
    }
}
