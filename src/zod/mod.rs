//! Builder-syntax parser
//!
//! Parses TypeScript source containing zod schema declarations into an IR
//! [`Document`]. Unlike the structured-description builder, problems do not
//! abort the pass: each declaration either lowers cleanly or contributes a
//! diagnostic, and parsing moves on to the next one.
//!
//! ```ignore
//! let output = schema_ir::zod::parse(source);
//! for diagnostic in &output.diagnostics {
//!     eprintln!("{diagnostic}");
//! }
//! let user = output.ir.schema("User");
//! ```

pub mod chain;
pub mod constraints;
pub mod diagnostics;
pub mod handlers;
pub mod lint;
pub mod syntax;

pub use diagnostics::{Diagnostic, DiagnosticCode, Severity, SourceLocation};
pub use handlers::{Dispatcher, NodeHandler};

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use indexmap::IndexSet;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use tree_sitter::Node;

use crate::config::ParseConfig;
use crate::graph;
use crate::ir::{schema_name_of, Component, Document, DocumentInfo, SchemaNode};
use chain::{extract, ChainOrigin};
use handlers::LowerContext;
use syntax::{find_descendant, named_children, parse_tree, text, Bindings};

/// `sourceFormatVersion` of documents produced here
pub const SOURCE_FORMAT: &str = "builder-syntax";

// =============================================================================
// Parse Failure
// =============================================================================

/// A declaration that could not be lowered
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ParseFailure {
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl ParseFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn at_node(self, node: &Node, source: &str) -> Self {
        self.at(SourceLocation::of(node, source))
    }

    pub fn into_diagnostic(self, declaration: Option<&str>) -> Diagnostic {
        let mut diagnostic = Diagnostic::new(DiagnosticCode::ParseFailure, self.message);
        diagnostic.location = self.location;
        diagnostic.declaration = declaration.map(str::to_string);
        diagnostic
    }
}

pub type ParseResult<T> = std::result::Result<T, ParseFailure>;

// =============================================================================
// Output
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ParseOutput {
    pub ir: Document,
    /// Errors: lint findings and parse failures
    pub diagnostics: Vec<Diagnostic>,
    pub advisories: Vec<Diagnostic>,
}

impl ParseOutput {
    fn empty() -> Self {
        Self {
            ir: Document::new(SOURCE_FORMAT, DocumentInfo::default()),
            diagnostics: Vec::new(),
            advisories: Vec::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// A top-level declaration whose initializer is a schema chain
#[derive(Debug, Clone)]
pub struct Declaration<'t> {
    pub name: String,
    pub value: Node<'t>,
    pub exported: bool,
}

// =============================================================================
// Parser
// =============================================================================

/// Parse with default settings
pub fn parse(source: &str) -> ParseOutput {
    Parser::default().parse(source)
}

pub struct Parser {
    config: ParseConfig,
    dispatcher: Dispatcher,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new(ParseConfig::default())
    }
}

impl Parser {
    pub fn new(config: ParseConfig) -> Self {
        Self {
            config,
            dispatcher: Dispatcher::new(),
        }
    }

    pub fn parse(&self, source: &str) -> ParseOutput {
        let mut output = ParseOutput::empty();

        let tree = match parse_tree(source) {
            Ok(tree) => tree,
            Err(failure) => {
                output.diagnostics.push(failure.into_diagnostic(None));
                graph::analyze(&mut output.ir);
                return output;
            }
        };
        let root = tree.root_node();
        let bindings = Bindings::collect(&root, source, &self.config);
        let (declarations, duplicates) = unique_declarations(find_declarations(root, source, &bindings), source);
        output.diagnostics.extend(duplicates);
        let names: IndexSet<String> = declarations.iter().map(|d| d.name.clone()).collect();

        let findings = lint::check(root, source, &bindings, &declarations);
        let rejected: HashSet<String> = findings
            .iter()
            .filter(|d| d.is_error())
            .filter_map(|d| d.declaration.clone())
            .collect();
        output.diagnostics.extend(findings);

        let mut lowered = Vec::new();
        for declaration in &declarations {
            if let Some(failure) = syntax_failure(declaration.value, source) {
                output
                    .diagnostics
                    .push(failure.into_diagnostic(Some(&declaration.name)));
                continue;
            }
            if rejected.contains(&declaration.name) {
                debug!(declaration = %declaration.name, "Skipping declaration rejected by lint");
                continue;
            }

            let cx = LowerContext::new(source, &bindings, &names, root, self.config.max_depth);
            match self.dispatcher.lower(declaration.value, cx) {
                Ok(mut schema) => {
                    finalize_tree(&mut schema, 0);
                    debug!(
                        declaration = %declaration.name,
                        references = schema.metadata.dependency_graph.references.len(),
                        "Lowered declaration"
                    );
                    lowered.push((declaration, schema));
                }
                Err(failure) => {
                    output
                        .diagnostics
                        .push(failure.into_diagnostic(Some(&declaration.name)));
                }
            }
        }

        // Only declarations that produced a schema can be referenced
        let emitted: IndexSet<String> = lowered.iter().map(|(d, _)| d.name.clone()).collect();
        for (declaration, schema) in lowered {
            self.advise(declaration, &schema, &emitted, &names, source, &mut output.advisories);
            output.ir.components.push(Component::Schema {
                name: declaration.name.clone(),
                schema,
            });
        }

        graph::analyze(&mut output.ir);

        for advisory in &output.advisories {
            warn!(advisory = %advisory, "Builder-syntax advisory");
        }
        info!(
            declarations = declarations.len(),
            schemas = output.ir.schema_names.len(),
            errors = output.diagnostics.len(),
            advisories = output.advisories.len(),
            "Parsed builder-syntax source"
        );
        output
    }

    /// Run only the lint pass
    pub fn lint(&self, source: &str) -> Vec<Diagnostic> {
        let tree = match parse_tree(source) {
            Ok(tree) => tree,
            Err(failure) => return vec![failure.into_diagnostic(None)],
        };
        let root = tree.root_node();
        let bindings = Bindings::collect(&root, source, &self.config);
        let (declarations, mut findings) = unique_declarations(find_declarations(root, source, &bindings), source);
        findings.extend(lint::check(root, source, &bindings, &declarations));
        findings
    }

    fn advise(
        &self,
        declaration: &Declaration,
        schema: &SchemaNode,
        emitted: &IndexSet<String>,
        declared: &IndexSet<String>,
        source: &str,
        advisories: &mut Vec<Diagnostic>,
    ) {
        if self.config.require_descriptions && declaration.exported && schema.description.is_none() {
            advisories.push(
                Diagnostic::new(
                    DiagnosticCode::MissingDescription,
                    format!("exported schema `{}` has no description", declaration.name),
                )
                .at_node(&declaration.value, source)
                .in_declaration(&declaration.name)
                .with_replacement(".describe(\"...\")"),
            );
        }

        for reference in &schema.metadata.dependency_graph.references {
            let Some(target) = schema_name_of(reference) else {
                continue;
            };
            if emitted.contains(&target) {
                continue;
            }
            let message = if declared.contains(&target) {
                format!("`{}` was rejected and contributes no schema", target)
            } else {
                format!("`{}` is not a schema declared in this file", target)
            };
            let mut advisory =
                Diagnostic::new(DiagnosticCode::UnresolvedReference, message).in_declaration(&declaration.name);
            if let Some(site) = find_descendant(declaration.value, &|n| {
                n.kind() == "identifier" && text(n, source) == target
            }) {
                advisory = advisory.at_node(&site, source);
            }
            if !declared.contains(&target) {
                if let Some(suggestion) = closest_name(&target, emitted) {
                    advisory = advisory.with_replacement(suggestion);
                }
            }
            advisories.push(advisory);
        }
    }
}

/// Top-level declarators whose initializer is a builder chain, or an
/// identifier chain rooted at another such declaration
pub fn find_declarations<'t>(root: Node<'t>, source: &str, bindings: &Bindings) -> Vec<Declaration<'t>> {
    let mut declarators = Vec::new();
    for statement in named_children(&root) {
        let (declaration, exported) = match statement.kind() {
            "export_statement" => match statement.child_by_field_name("declaration") {
                Some(inner) => (inner, true),
                None => continue,
            },
            _ => (statement, false),
        };
        if !matches!(declaration.kind(), "lexical_declaration" | "variable_declaration") {
            continue;
        }
        for declarator in named_children(&declaration) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let (Some(name), Some(value)) = (
                declarator.child_by_field_name("name"),
                declarator.child_by_field_name("value"),
            ) else {
                continue;
            };
            if name.kind() != "identifier" {
                continue;
            }
            let origin = extract(value, source, bindings).origin;
            declarators.push((text(&name, source).to_string(), value, exported, origin));
        }
    }

    // Identifier chains are accepted once their root is accepted
    let mut accepted: HashSet<String> = declarators
        .iter()
        .filter(|(_, _, _, origin)| *origin == ChainOrigin::Builder)
        .map(|(name, ..)| name.clone())
        .collect();
    loop {
        let before = accepted.len();
        for (name, _, _, origin) in &declarators {
            if let ChainOrigin::Identifier(root) = origin {
                if accepted.contains(root) {
                    accepted.insert(name.clone());
                }
            }
        }
        if accepted.len() == before {
            break;
        }
    }

    declarators
        .into_iter()
        .filter(|(name, ..)| accepted.contains(name))
        .map(|(name, value, exported, _)| Declaration { name, value, exported })
        .collect()
}

/// Keep the first declaration of each name. Later ones are reported and
/// dropped.
fn unique_declarations<'t>(declarations: Vec<Declaration<'t>>, source: &str) -> (Vec<Declaration<'t>>, Vec<Diagnostic>) {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(declarations.len());
    let mut duplicates = Vec::new();
    for declaration in declarations {
        if seen.insert(declaration.name.clone()) {
            unique.push(declaration);
        } else {
            duplicates.push(
                Diagnostic::new(
                    DiagnosticCode::DuplicateDeclaration,
                    format!("`{}` is already declared; this declaration is ignored", declaration.name),
                )
                .at_node(&declaration.value, source)
                .in_declaration(&declaration.name),
            );
        }
    }
    (unique, duplicates)
}

/// Parse failure for the first error or missing node under `value`
fn syntax_failure(value: Node, source: &str) -> Option<ParseFailure> {
    if !value.has_error() {
        return None;
    }
    let broken = find_descendant(value, &|n| n.is_error() || n.is_missing()).unwrap_or(value);
    let message = if broken.is_missing() {
        format!("missing `{}`", broken.kind())
    } else {
        "unexpected syntax".to_string()
    };
    Some(ParseFailure::new(message).at_node(&broken, source))
}

/// Children sit one level deeper than their parent
fn finalize_tree(node: &mut SchemaNode, depth: usize) {
    for child in node.children_mut() {
        finalize_tree(child, depth + 1);
    }
    node.finalize(depth);
}

fn closest_name(target: &str, names: &IndexSet<String>) -> Option<String> {
    let matcher = SkimMatcherV2::default();
    let lowered = target.to_lowercase();
    names
        .iter()
        .filter_map(|name| {
            matcher
                .fuzzy_match(&name.to_lowercase(), &lowered)
                .map(|score| (score, name))
        })
        .max_by_key(|(score, _)| *score)
        .map(|(_, name)| name.clone())
}
