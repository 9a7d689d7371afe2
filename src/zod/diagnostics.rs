//! Builder-syntax diagnostics
//!
//! Errors and advisories are collected instead of raised so one pass reports
//! every problem in a source file.

use serde::{Deserialize, Serialize};
use std::fmt;
use tree_sitter::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Advisory,
}

/// Stable diagnostic codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticCode {
    /// Deprecated builder method with a fixed modern replacement
    LegacySyntax,
    /// Object shape that cannot be analyzed statically
    NonAnalyzableSchema,
    ParseFailure,
    MissingDescription,
    UnresolvedReference,
    /// A second declaration reusing an earlier name
    DuplicateDeclaration,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LegacySyntax => "legacy-syntax",
            Self::NonAnalyzableSchema => "non-analyzable-schema",
            Self::ParseFailure => "parse-failure",
            Self::MissingDescription => "missing-description",
            Self::UnresolvedReference => "unresolved-reference",
            Self::DuplicateDeclaration => "duplicate-declaration",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::LegacySyntax | Self::NonAnalyzableSchema | Self::ParseFailure | Self::DuplicateDeclaration => {
                Severity::Error
            }
            Self::MissingDescription | Self::UnresolvedReference => Severity::Advisory,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 1-indexed position in the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Start of a syntax node. Tree-sitter columns are byte offsets; the
    /// column here counts characters.
    pub fn of(node: &Node, source: &str) -> Self {
        let point = node.start_position();
        let start = node.start_byte();
        let column = source
            .get(start - point.column.min(start)..start)
            .map(|prefix| prefix.chars().count())
            .unwrap_or(point.column);
        Self {
            line: point.row + 1,
            column: column + 1,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    /// Declaration the diagnostic belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declaration: Option<String>,
    /// Suggested replacement text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.severity(),
            message: message.into(),
            location: None,
            declaration: None,
            replacement: None,
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn at_node(self, node: &Node, source: &str) -> Self {
        self.at(SourceLocation::of(node, source))
    }

    pub fn in_declaration(mut self, name: impl Into<String>) -> Self {
        self.declaration = Some(name.into());
        self
    }

    pub fn with_replacement(mut self, replacement: impl Into<String>) -> Self {
        self.replacement = Some(replacement.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "{}: ", location)?;
        }
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(declaration) = &self.declaration {
            write!(f, " (in {})", declaration)?;
        }
        if let Some(replacement) = &self.replacement {
            write!(f, "; use {}", replacement)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_by_code() {
        assert!(Diagnostic::new(DiagnosticCode::LegacySyntax, "x").is_error());
        assert!(Diagnostic::new(DiagnosticCode::NonAnalyzableSchema, "x").is_error());
        assert!(Diagnostic::new(DiagnosticCode::ParseFailure, "x").is_error());
        assert!(Diagnostic::new(DiagnosticCode::DuplicateDeclaration, "x").is_error());
        assert!(!Diagnostic::new(DiagnosticCode::MissingDescription, "x").is_error());
        assert!(!Diagnostic::new(DiagnosticCode::UnresolvedReference, "x").is_error());
    }

    #[test]
    fn test_display() {
        let diag = Diagnostic::new(DiagnosticCode::LegacySyntax, "`nonempty` is deprecated")
            .at(SourceLocation::new(3, 14))
            .in_declaration("Name")
            .with_replacement(".min(1)");
        assert_eq!(
            diag.to_string(),
            "3:14: [legacy-syntax] `nonempty` is deprecated (in Name); use .min(1)"
        );
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["code"], "legacy-syntax");
        assert_eq!(json["location"]["line"], 3);
    }

    #[test]
    fn test_column_counts_characters() {
        let source = "const é = \"ü\"; const Name = z.string();\n";
        let tree = crate::zod::syntax::parse_tree(source).unwrap();
        let target = crate::zod::syntax::find_descendant(tree.root_node(), &|n| {
            n.kind() == "identifier" && crate::zod::syntax::text(n, source) == "Name"
        })
        .unwrap();
        // Two 2-byte characters precede `Name`
        assert_eq!(target.start_position().column, 23);
        assert_eq!(SourceLocation::of(&target, source), SourceLocation::new(1, 22));
    }
}
