//! Component References
//!
//! Two reference shapes are accepted:
//!
//! ```text
//! #/components/{type}/{name}
//! #/x-ext/{hash}/components/{type}/{name}
//! ```
//!
//! The second form is produced by bundlers for definitions lifted out of
//! external documents. Anything else is rejected by the builder.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const COMPONENTS_PREFIX: &str = "#/components/";
pub const VENDOR_PREFIX: &str = "#/x-ext/";

/// Component section a reference points into
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComponentKind {
    Schema,
    Parameter,
    Response,
    RequestBody,
    Header,
    SecurityScheme,
    /// A well-formed section this IR does not model (examples, links, ...)
    Other(String),
}

impl ComponentKind {
    pub fn from_segment(segment: &str) -> Self {
        match segment {
            "schemas" => Self::Schema,
            "parameters" => Self::Parameter,
            "responses" => Self::Response,
            "requestBodies" => Self::RequestBody,
            "headers" => Self::Header,
            "securitySchemes" => Self::SecurityScheme,
            other => Self::Other(other.to_string()),
        }
    }

    /// Section name under `components`
    pub fn segment(&self) -> &str {
        match self {
            Self::Schema => "schemas",
            Self::Parameter => "parameters",
            Self::Response => "responses",
            Self::RequestBody => "requestBodies",
            Self::Header => "headers",
            Self::SecurityScheme => "securitySchemes",
            Self::Other(segment) => segment,
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema => write!(f, "schema"),
            Self::Parameter => write!(f, "parameter"),
            Self::Response => write!(f, "response"),
            Self::RequestBody => write!(f, "requestBody"),
            Self::Header => write!(f, "header"),
            Self::SecurityScheme => write!(f, "securityScheme"),
            Self::Other(segment) => write!(f, "{}", segment),
        }
    }
}

/// Where a referenced component lives
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RefOrigin {
    /// `#/components/...` in the document itself
    Standard,
    /// `#/x-ext/{hash}/components/...` lifted in by a bundler
    External { hash: String },
}

/// A parsed component reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentRef {
    pub origin: RefOrigin,
    pub kind: ComponentKind,
    pub name: String,
}

impl ComponentRef {
    /// Parse a `$ref` string. Returns `None` for any unsupported shape.
    pub fn parse(reference: &str) -> Option<Self> {
        if let Some(rest) = reference.strip_prefix(COMPONENTS_PREFIX) {
            let (kind, name) = split_kind_and_name(rest)?;
            return Some(Self {
                origin: RefOrigin::Standard,
                kind,
                name,
            });
        }

        let rest = reference.strip_prefix(VENDOR_PREFIX)?;
        let (hash, rest) = rest.split_once('/')?;
        if hash.is_empty() {
            return None;
        }
        let rest = rest.strip_prefix("components/")?;
        let (kind, name) = split_kind_and_name(rest)?;
        Some(Self {
            origin: RefOrigin::External { hash: hash.to_string() },
            kind,
            name,
        })
    }

    /// Standard reference to a schema component
    pub fn schema(name: impl Into<String>) -> Self {
        Self {
            origin: RefOrigin::Standard,
            kind: ComponentKind::Schema,
            name: name.into(),
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self.origin, RefOrigin::External { .. })
    }

    /// JSON pointer of the target inside the root document
    pub fn pointer(&self) -> String {
        let name = escape_pointer_segment(&self.name);
        match &self.origin {
            RefOrigin::Standard => format!("/components/{}/{}", self.kind.segment(), name),
            RefOrigin::External { hash } => {
                format!("/x-ext/{}/components/{}/{}", hash, self.kind.segment(), name)
            }
        }
    }
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.pointer())
    }
}

/// `#/components/schemas/{name}` for a schema component name
pub fn schema_ref(name: &str) -> String {
    ComponentRef::schema(name).to_string()
}

/// Name of a standard schema reference, `None` for other kinds or origins
pub fn schema_name_of(reference: &str) -> Option<String> {
    let parsed = ComponentRef::parse(reference)?;
    (parsed.origin == RefOrigin::Standard && parsed.kind == ComponentKind::Schema)
        .then_some(parsed.name)
}

fn split_kind_and_name(rest: &str) -> Option<(ComponentKind, String)> {
    let (kind, name) = rest.split_once('/')?;
    if kind.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }
    if !kind.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some((ComponentKind::from_segment(kind), unescape_pointer_segment(name)))
}

fn escape_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn unescape_pointer_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}
