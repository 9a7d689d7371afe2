//! Pre-parse lint
//!
//! Runs over every builder chain before lowering and rejects two classes of
//! input:
//!
//! 1. **Legacy syntax**: deprecated builder methods that have a fixed modern
//!    replacement (`.nonempty()` on strings becomes `.min(1)`, ...)
//! 2. **Non-analyzable schemas**: object shapes built from computed keys or
//!    spreads, whose property set is only known at runtime
//!
//! A declaration with any finding contributes no IR node.

use std::collections::HashMap;
use tree_sitter::Node;

use super::chain::{extract, ChainOrigin, MethodChain};
use super::constraints::format_for;
use super::diagnostics::{Diagnostic, DiagnosticCode, SourceLocation};
use super::syntax::{literal_value, named_children, text, unwrap_expression, Bindings};
use super::Declaration;

/// Coarse node kind, tracked along a chain to pick the applicable checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    String,
    Object,
    Array,
    Other,
}

impl Kind {
    fn of_base(name: &str) -> Self {
        match name {
            "string" => Self::String,
            name if format_for(name).is_some() => Self::String,
            "object" | "strictObject" | "looseObject" => Self::Object,
            "array" | "tuple" | "set" => Self::Array,
            _ => Self::Other,
        }
    }

    fn after(self, method: &str) -> Self {
        match method {
            "array" => Self::Array,
            "or" | "and" | "keyof" | "transform" | "pipe" => Self::Other,
            _ => self,
        }
    }
}

/// Legacy methods per kind: (method, message)
const LEGACY: &[(Kind, &str, &str)] = &[
    (Kind::String, "nonempty", "`nonempty` on strings is legacy syntax"),
    (Kind::Object, "deepPartial", "`deepPartial` is legacy syntax"),
    (Kind::Object, "merge", "`merge` is legacy syntax"),
    (Kind::Object, "nonstrict", "`nonstrict` is legacy syntax"),
    (Kind::Object, "setKey", "`setKey` is legacy syntax"),
];

/// Calls whose first argument is an object shape
const SHAPE_CALLS: &[&str] = &["object", "strictObject", "looseObject", "extend", "safeExtend"];

/// Lint every builder chain under `root`. Findings are sorted by location.
pub fn check(root: Node, source: &str, bindings: &Bindings, declarations: &[Declaration]) -> Vec<Diagnostic> {
    let kinds = declaration_kinds(source, bindings, declarations);
    let mut findings = Vec::new();

    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.kind() == "call_expression" && is_outermost(&node) {
            let chain = extract(node, source, bindings);
            let start = match &chain.origin {
                ChainOrigin::Builder => chain.base_name().map(Kind::of_base),
                ChainOrigin::Identifier(name) => kinds.get(name.as_str()).copied(),
                ChainOrigin::Other => None,
            };
            if let Some(start) = start {
                let declaration = enclosing(declarations, &node).map(|d| d.name.as_str());
                let before = findings.len();
                check_chain(&chain, start, source, &mut findings);
                if let Some(name) = declaration {
                    for finding in &mut findings[before..] {
                        finding.declaration = Some(name.to_string());
                    }
                }
            }
        }
        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }

    findings.sort_by_key(|d| d.location.map(|l| (l.line, l.column)));
    findings
}

fn check_chain(chain: &MethodChain, start: Kind, source: &str, findings: &mut Vec<Diagnostic>) {
    if let Some(base) = &chain.base {
        if SHAPE_CALLS.contains(&base.name.as_str()) {
            if let Some(arg) = base.arg(0) {
                check_shape(arg.node, source, findings);
            }
        }
    }

    let mut kind = start;
    for call in &chain.calls {
        if let Some((_, _, message)) = LEGACY
            .iter()
            .find(|(k, method, _)| *k == kind && *method == call.name)
        {
            findings.push(
                Diagnostic::new(DiagnosticCode::LegacySyntax, *message)
                    .at(call.location)
                    .with_replacement(replacement(&call.name, call.arg(0).map(|a| a.node), source)),
            );
        }
        if SHAPE_CALLS.contains(&call.name.as_str()) {
            if let Some(arg) = call.arg(0) {
                check_shape(arg.node, source, findings);
            }
        }
        kind = kind.after(&call.name);
    }
}

/// Modern equivalent of a legacy method
fn replacement(method: &str, arg: Option<Node>, source: &str) -> String {
    match method {
        "nonempty" => ".min(1)".to_string(),
        "deepPartial" => ".partial() on each nested object".to_string(),
        "merge" => {
            let other = arg
                .map(unwrap_expression)
                .filter(|a| a.kind() == "identifier")
                .map(|a| text(&a, source).to_string())
                .unwrap_or_else(|| "Other".to_string());
            format!(".extend({}.shape)", other)
        }
        "nonstrict" => ".passthrough()".to_string(),
        "setKey" => {
            let key = arg
                .and_then(|a| literal_value(a, source))
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| "key".to_string());
            format!(".extend({{ {}: schema }})", key)
        }
        other => format!(".{}()", other),
    }
}

/// Flag computed keys and spreads in an object shape literal
fn check_shape(arg: Node, source: &str, findings: &mut Vec<Diagnostic>) {
    let literal = unwrap_expression(arg);
    if literal.kind() != "object" {
        return;
    }
    for member in named_children(&literal) {
        match member.kind() {
            "pair" | "method_definition" => {
                let Some(key) = member.child_by_field_name(if member.kind() == "pair" { "key" } else { "name" }) else {
                    continue;
                };
                if key.kind() == "computed_property_name" {
                    findings.push(
                        Diagnostic::new(
                            DiagnosticCode::NonAnalyzableSchema,
                            format!("computed property key `{}` cannot be analyzed statically", text(&key, source)),
                        )
                        .at_node(&key, source),
                    );
                }
            }
            "spread_element" => {
                findings.push(
                    Diagnostic::new(
                        DiagnosticCode::NonAnalyzableSchema,
                        format!("spread-merged property set `{}` cannot be analyzed statically", text(&member, source)),
                    )
                    .at(SourceLocation::of(&member, source)),
                );
            }
            _ => {}
        }
    }
}

/// Whether `call` is the last call of its chain rather than the receiver of
/// a further method call
fn is_outermost(call: &Node) -> bool {
    let Some(parent) = call.parent() else {
        return true;
    };
    if parent.kind() != "member_expression" {
        return true;
    }
    let is_receiver = parent
        .child_by_field_name("object")
        .is_some_and(|object| object.id() == call.id());
    let is_called = parent
        .parent()
        .filter(|grandparent| grandparent.kind() == "call_expression")
        .and_then(|grandparent| grandparent.child_by_field_name("function"))
        .is_some_and(|function| function.id() == parent.id());
    !(is_receiver && is_called)
}

/// Declaration whose initializer contains `node`
fn enclosing<'d, 't>(declarations: &'d [Declaration<'t>], node: &Node) -> Option<&'d Declaration<'t>> {
    declarations
        .iter()
        .find(|d| d.value.start_byte() <= node.start_byte() && node.end_byte() <= d.value.end_byte())
}

/// Final kind of each declaration, so identifier chains inherit it
fn declaration_kinds<'d>(
    source: &str,
    bindings: &Bindings,
    declarations: &'d [Declaration],
) -> HashMap<&'d str, Kind> {
    let mut kinds: HashMap<&str, Kind> = HashMap::new();
    // Second round settles identifiers declared before their root
    for _ in 0..2 {
        for declaration in declarations {
            let chain = extract(declaration.value, source, bindings);
            let start = match &chain.origin {
                ChainOrigin::Builder => chain.base_name().map(Kind::of_base),
                ChainOrigin::Identifier(root) => kinds.get(root.as_str()).copied(),
                ChainOrigin::Other => None,
            };
            let kind = chain
                .calls
                .iter()
                .fold(start.unwrap_or(Kind::Other), |kind, call| kind.after(&call.name));
            kinds.insert(declaration.name.as_str(), kind);
        }
    }
    kinds
}
