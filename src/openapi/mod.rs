//! Structured-description builder
//!
//! Lowers an already-bundled OpenAPI 3.x document into an IR [`Document`].
//! The build is all-or-nothing: the first structural problem is returned as
//! an [`IrError`] carrying the JSON pointer of the offending node.
//!
//! ```ignore
//! let source: serde_json::Value = serde_json::from_str(&text)?;
//! let doc = schema_ir::openapi::build(&source)?;
//! for name in &doc.dependency_graph.topological_order {
//!     println!("{name}");
//! }
//! ```

pub mod context;
pub mod operations;
pub mod resolve;
pub mod schema;
pub mod security;

pub use context::BuildContext;

use semver::Version;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::BuildConfig;
use crate::error::{IrError, Result};
use crate::graph;
use crate::ir::{Component, Document, DocumentInfo, Server};

use operations::{lower_parameter_body, lower_request_body_inner, lower_response_inner};
use schema::{lower_schema, string_field};
use security::{lower_requirements, lower_security_scheme};

/// Build with default settings
pub fn build(source: &Value) -> Result<Document> {
    Builder::default().build(source)
}

/// Configured builder. Holds no state between builds.
#[derive(Debug, Clone, Default)]
pub struct Builder {
    config: BuildConfig,
}

impl Builder {
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    pub fn build(&self, source: &Value) -> Result<Document> {
        let Some(root) = source.as_object() else {
            return Err(IrError::InvalidDocument("document root must be an object".to_string()));
        };
        let version = check_version(source)?;

        let info = match root.get("info").and_then(Value::as_object) {
            Some(info) => DocumentInfo {
                title: string_field(info, "title").unwrap_or_default(),
                version: string_field(info, "version").unwrap_or_default(),
                description: string_field(info, "description"),
            },
            None => DocumentInfo::default(),
        };

        let mut doc = Document::new(version, info);
        doc.servers = lower_servers(source);

        let cx = BuildContext::new(source, self.config.max_depth);
        if let Some(security) = root.get("security") {
            doc.security = Some(lower_requirements(&cx.at(&["security"]), security)?);
        }

        doc.components = lower_components(&cx)?;
        doc.operations = operations::lower_paths(&cx, doc.security.as_ref())?;

        graph::analyze(&mut doc);

        info!(
            source_version = %doc.source_format_version,
            components = doc.components.len(),
            operations = doc.operations.len(),
            "Built IR document"
        );
        Ok(doc)
    }
}

/// `openapi` must be a 3.x version. Two-part versions such as `3.1` are
/// accepted.
fn check_version(source: &Value) -> Result<String> {
    let Some(raw) = source.get("openapi").and_then(Value::as_str) else {
        return Err(IrError::InvalidDocument("missing `openapi` version string".to_string()));
    };

    let normalized = match raw.split('.').count() {
        2 => format!("{}.0", raw),
        _ => raw.to_string(),
    };
    let version = Version::parse(&normalized)
        .map_err(|e| IrError::InvalidDocument(format!("invalid openapi version '{}': {}", raw, e)))?;
    if version.major != 3 {
        return Err(IrError::InvalidDocument(format!(
            "unsupported openapi version '{}', expected 3.x",
            raw
        )));
    }
    Ok(raw.to_string())
}

fn lower_servers(source: &Value) -> Vec<Server> {
    source
        .get("servers")
        .and_then(Value::as_array)
        .map(|servers| {
            servers
                .iter()
                .filter_map(Value::as_object)
                .filter_map(|server| {
                    Some(Server {
                        url: string_field(server, "url")?,
                        description: string_field(server, "description"),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Lower every modelled component section, schemas first
fn lower_components(cx: &BuildContext) -> Result<Vec<Component>> {
    let Some(components) = cx.root.get("components") else {
        return Ok(Vec::new());
    };
    let Some(components) = components.as_object() else {
        return Err(IrError::InvalidDocument("components must be an object".to_string()));
    };

    let mut lowered = Vec::new();

    if let Some(schemas) = section(cx, components, "schemas")? {
        for (name, value) in schemas {
            let schema = lower_schema(&cx.at(&["components", "schemas", name.as_str()]), value)?;
            debug!(
                schema = %name,
                references = schema.metadata.dependency_graph.references.len(),
                "Lowered schema component"
            );
            lowered.push(Component::Schema {
                name: name.clone(),
                schema,
            });
        }
    }

    if let Some(parameters) = section(cx, components, "parameters")? {
        for (name, value) in parameters {
            let param_cx = cx.at(&["components", "parameters", name.as_str()]);
            no_alias(&param_cx, value)?;
            lowered.push(Component::Parameter {
                name: name.clone(),
                parameter: lower_parameter_body(&param_cx, value, Some(name.clone()))?,
            });
        }
    }

    if let Some(responses) = section(cx, components, "responses")? {
        for (name, value) in responses {
            let response_cx = cx.at(&["components", "responses", name.as_str()]);
            no_alias(&response_cx, value)?;
            lowered.push(Component::Response {
                name: name.clone(),
                response: lower_response_inner(&response_cx, value, Some(name.clone()))?,
            });
        }
    }

    if let Some(bodies) = section(cx, components, "requestBodies")? {
        for (name, value) in bodies {
            let body_cx = cx.at(&["components", "requestBodies", name.as_str()]);
            no_alias(&body_cx, value)?;
            lowered.push(Component::RequestBody {
                name: name.clone(),
                body: lower_request_body_inner(&body_cx, value, Some(name.clone()))?,
            });
        }
    }

    if let Some(schemes) = section(cx, components, "securitySchemes")? {
        for (name, value) in schemes {
            let scheme_cx = cx.at(&["components", "securitySchemes", name.as_str()]);
            no_alias(&scheme_cx, value)?;
            lowered.push(Component::SecurityScheme {
                name: name.clone(),
                scheme: lower_security_scheme(&scheme_cx, value)?,
            });
        }
    }

    Ok(lowered)
}

fn section<'v>(
    cx: &BuildContext,
    components: &'v Map<String, Value>,
    key: &str,
) -> Result<Option<&'v Map<String, Value>>> {
    match components.get(key) {
        None => Ok(None),
        Some(Value::Object(entries)) => Ok(Some(entries)),
        Some(_) => Err(cx
            .at(&["components", key])
            .shape_error(format!("{} must be an object", key))),
    }
}

/// Non-schema components that are themselves references need bundling
fn no_alias(cx: &BuildContext, value: &Value) -> Result<()> {
    match resolve::ref_of(cx, value)? {
        Some(reference) => Err(IrError::NestedReferenceNotBundled {
            reference: reference.to_string(),
            path: cx.path(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_version_check() {
        assert_eq!(check_version(&json!({ "openapi": "3.1.0" })).unwrap(), "3.1.0");
        assert_eq!(check_version(&json!({ "openapi": "3.0" })).unwrap(), "3.0");
        assert!(check_version(&json!({ "openapi": "2.0" })).is_err());
        assert!(check_version(&json!({ "swagger": "2.0" })).is_err());
        assert!(check_version(&json!({ "openapi": "three" })).is_err());
    }

    #[test]
    fn test_recursion_ceiling() {
        let mut nested = json!({ "type": "string" });
        for _ in 0..6 {
            nested = json!({ "type": "array", "items": nested });
        }
        let source = json!({
            "openapi": "3.1.0",
            "components": { "schemas": { "Deep": nested } }
        });

        let shallow = Builder::new(BuildConfig { max_depth: 3 });
        assert!(matches!(
            shallow.build(&source),
            Err(IrError::RecursionLimit { limit: 3, .. })
        ));
        assert!(build(&source).is_ok());
    }

    #[test]
    fn test_component_kinds_in_order() {
        let source = json!({
            "openapi": "3.1.0",
            "components": {
                "securitySchemes": { "bearer": { "type": "http", "scheme": "bearer" } },
                "schemas": { "Pet": { "type": "object" } },
                "parameters": { "Limit": { "name": "limit", "in": "query" } }
            }
        });
        let doc = build(&source).unwrap();
        let kinds: Vec<String> = doc.components.iter().map(|c| c.kind().to_string()).collect();
        assert_eq!(kinds, vec!["schema", "parameter", "securityScheme"]);
        assert_eq!(doc.schema_names, vec!["Pet"]);
    }

    #[test]
    fn test_security_scheme_alias_needs_bundling() {
        let source = json!({
            "openapi": "3.1.0",
            "components": {
                "securitySchemes": {
                    "bearer": { "type": "http", "scheme": "bearer" },
                    "token": { "$ref": "#/components/securitySchemes/bearer" }
                }
            }
        });
        match build(&source) {
            Err(IrError::NestedReferenceNotBundled { reference, path }) => {
                assert_eq!(reference, "#/components/securitySchemes/bearer");
                assert_eq!(path, "#/components/securitySchemes/token");
            }
            other => panic!("Expected NestedReferenceNotBundled, got {:?}", other),
        }
    }
}
