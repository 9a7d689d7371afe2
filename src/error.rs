//! Error types for IR construction

use thiserror::Error;

/// Result type for IR operations
pub type Result<T> = std::result::Result<T, IrError>;

/// IR construction errors
///
/// Structural errors carry the location path of the offending node as a JSON
/// pointer into the source document.
#[derive(Error, Debug)]
pub enum IrError {
    #[error("Invalid reference format '{reference}' at {path}")]
    InvalidReferenceFormat { reference: String, path: String },

    #[error("Reference '{reference}' at {path} points at a {found} component, expected {expected}")]
    UnsupportedReferenceTarget {
        reference: String,
        expected: String,
        found: String,
        path: String,
    },

    #[error("Circular component reference at {path}: {}", chain.join(" -> "))]
    CircularComponentReference { chain: Vec<String>, path: String },

    #[error("Reference '{reference}' at {path} targets another reference; bundle and dereference the document first")]
    NestedReferenceNotBundled { reference: String, path: String },

    #[error("Reference '{reference}' at {path} does not resolve to a component")]
    UnresolvedReference { reference: String, path: String },

    #[error("Unknown schema shape at {path}: {reason}")]
    UnknownSchemaShape { path: String, reason: String },

    #[error("Schema nesting exceeds {limit} levels at {path}")]
    RecursionLimit { limit: usize, path: String },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("IR boundary violation: {0}")]
    BoundaryViolation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl IrError {
    /// Location path carried by structural errors
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::InvalidReferenceFormat { path, .. }
            | Self::UnsupportedReferenceTarget { path, .. }
            | Self::CircularComponentReference { path, .. }
            | Self::NestedReferenceNotBundled { path, .. }
            | Self::UnresolvedReference { path, .. }
            | Self::UnknownSchemaShape { path, .. }
            | Self::RecursionLimit { path, .. } => Some(path),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_errors_carry_path() {
        let err = IrError::CircularComponentReference {
            chain: vec!["#/components/schemas/A".into(), "#/components/schemas/A".into()],
            path: "#/components/schemas/A".into(),
        };
        assert_eq!(err.path(), Some("#/components/schemas/A"));
        assert!(err.to_string().contains("at #/components/schemas/A:"));

        assert_eq!(IrError::InvalidDocument("x".into()).path(), None);
    }
}
