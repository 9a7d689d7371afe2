//! OpenAPI Build Tests
//!
//! Builds the petstore fixture end to end and checks the IR a writer sees.

use serde_json::{json, Value};

use schema_ir::ir::{ComponentKind, HttpMethod, JsonType, ParameterLocation, ResponseAdvisory};
use schema_ir::ir::{schema_ref, Component};
use schema_ir::writer::WriterContext;
use schema_ir::{openapi, Document, IrError};

fn petstore() -> Document {
    let source: Value = serde_json::from_str(include_str!("fixtures/petstore.json")).unwrap();
    openapi::build(&source).unwrap()
}

fn with_schemas(schemas: Value) -> Value {
    json!({
        "openapi": "3.1.0",
        "info": { "title": "t", "version": "1" },
        "components": { "schemas": schemas }
    })
}

// =============================================================================
// Schemas
// =============================================================================

#[test]
fn test_document_header() {
    let doc = petstore();
    assert_eq!(doc.source_format_version, "3.1.0");
    assert_eq!(doc.info.title, "Petstore");
    assert_eq!(doc.servers.len(), 1);
    assert_eq!(doc.schema_names, vec!["Pet", "Owner", "Person", "Registry"]);
}

#[test]
fn test_property_order_and_required() {
    let doc = petstore();
    let pet = doc.schema("Pet").unwrap();
    let props = pet.properties.as_ref().unwrap();

    assert_eq!(props.names().collect::<Vec<_>>(), vec!["id", "name", "owner"]);
    assert_eq!(pet.required, Some(vec!["id".to_string()]));
    assert!(props.get("id").unwrap().metadata.required);
    assert!(!props.get("name").unwrap().metadata.required);
    assert_eq!(props.get("id").unwrap().format.as_deref(), Some("uuid"));
}

#[test]
fn test_numeric_bounds_become_validations() {
    let doc = petstore();
    let person = doc.schema("Person").unwrap();
    let age = person.properties.as_ref().unwrap().get("age").unwrap();

    assert_eq!(age.schema_type, Some(JsonType::Integer));
    assert_eq!(age.minimum, Some(0.0));
    assert_eq!(age.maximum, Some(150.0));
    assert!(!age.metadata.required);
    assert_eq!(
        age.metadata.validation_chain.validations,
        vec!["minimum:0".to_string(), "maximum:150".to_string()]
    );
    assert!(person.required.is_none());
}

#[test]
fn test_type_array_with_null() {
    let doc = petstore();
    let person = doc.schema("Person").unwrap();
    let nickname = person.properties.as_ref().unwrap().get("nickname").unwrap();
    assert_eq!(nickname.schema_type, Some(JsonType::String));
    assert!(nickname.metadata.nullable);
    assert!(nickname.one_of.is_none());
}

#[test]
fn test_cycle_is_marked() {
    let doc = petstore();
    assert_eq!(doc.dependency_graph.circular_references, vec!["Pet", "Owner"]);
    assert_eq!(
        doc.dependency_graph.topological_order,
        vec!["Owner", "Pet", "Person", "Registry"]
    );

    let pet = doc.schema("Pet").unwrap();
    assert_eq!(
        pet.metadata.circular_references,
        vec![schema_ref("Pet"), schema_ref("Owner")]
    );
    let owner_prop = pet.properties.as_ref().unwrap().get("owner").unwrap();
    assert_eq!(owner_prop.metadata.circular_references, vec![schema_ref("Owner")]);

    // Points into the cycle without being on it
    let registry = doc.schema("Registry").unwrap();
    assert!(registry.metadata.circular_references.is_empty());
    assert_eq!(registry.metadata.dependency_graph.references, vec![schema_ref("Pet")]);
}

#[test]
fn test_built_document_passes_writer_boundary() {
    let doc = petstore();
    let cx = WriterContext::new(&doc).unwrap();
    let names: Vec<_> = cx.regions().iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["Owner", "Pet", "Person", "Registry"]);
    assert!(cx.region("Pet").unwrap().needs_lazy());
    assert!(!cx.region("Registry").unwrap().needs_lazy());
}

// =============================================================================
// Operations
// =============================================================================

#[test]
fn test_path_parameter_override_in_place() {
    let doc = petstore();
    let op = doc.operation(HttpMethod::Get, "/pets/{petId}").unwrap();

    let names: Vec<_> = op.parameters.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["petId", "limit", "X-Trace"]);

    let pet_id = &op.parameters[0];
    assert_eq!(pet_id.location, ParameterLocation::Path);
    assert!(pet_id.required);
    assert_eq!(pet_id.description.as_deref(), Some("override"));
    assert_eq!(
        pet_id.schema.as_ref().and_then(|s| s.schema_type),
        Some(JsonType::Integer)
    );

    let limit = &op.parameters[1];
    assert_eq!(limit.component.as_deref(), Some("Limit"));
    assert!(!limit.required);

    assert_eq!(op.parameter_groups.path.len(), 1);
    assert_eq!(op.parameter_groups.query.len(), 1);
    assert_eq!(op.parameter_groups.header.len(), 1);
}

#[test]
fn test_security_fallback_and_public_operation() {
    let doc = petstore();

    let get = doc.operation(HttpMethod::Get, "/pets/{petId}").unwrap();
    assert_eq!(get.security, doc.security);
    assert!(!get.is_public());

    let health = doc.operation(HttpMethod::Get, "/health").unwrap();
    assert_eq!(health.security, Some(vec![]));
    assert!(health.is_public());

    assert!(doc.component(&ComponentKind::SecurityScheme, "apiKey").is_some());
}

#[test]
fn test_response_advisories() {
    let doc = petstore();

    let get = doc.operation(HttpMethod::Get, "/pets/{petId}").unwrap();
    assert_eq!(get.response_advisory, None);
    assert_eq!(
        get.response("404").unwrap().response.component.as_deref(),
        Some("NotFound")
    );

    let delete = doc.operation(HttpMethod::Delete, "/pets/{petId}").unwrap();
    assert_eq!(delete.response_advisory, Some(ResponseAdvisory::DefaultOnly));

    let health = doc.operation(HttpMethod::Get, "/health").unwrap();
    assert_eq!(health.response_advisory, Some(ResponseAdvisory::MissingSuccess));
}

#[test]
fn test_request_body_reference() {
    let doc = petstore();
    let op = doc.operation(HttpMethod::Post, "/people").unwrap();
    let body = op.request_body.as_ref().unwrap();

    assert_eq!(body.component.as_deref(), Some("PersonBody"));
    assert!(body.required);
    let schema = body.content["application/json"].schema.as_ref().unwrap();
    assert_eq!(schema.reference.as_deref(), Some("#/components/schemas/Person"));

    let declared = doc.component(&ComponentKind::RequestBody, "PersonBody");
    assert!(matches!(declared, Some(Component::RequestBody { .. })));
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_unresolved_reference() {
    let source = with_schemas(json!({
        "A": { "type": "object", "properties": { "b": { "$ref": "#/components/schemas/Missing" } } }
    }));
    match openapi::build(&source) {
        Err(IrError::UnresolvedReference { reference, path }) => {
            assert_eq!(reference, "#/components/schemas/Missing");
            assert_eq!(path, "#/components/schemas/A/properties/b");
        }
        other => panic!("Expected UnresolvedReference, got {:?}", other),
    }
}

#[test]
fn test_invalid_reference_format() {
    let source = with_schemas(json!({
        "A": { "$ref": "#/definitions/A" }
    }));
    assert!(matches!(
        openapi::build(&source),
        Err(IrError::InvalidReferenceFormat { .. })
    ));
}

#[test]
fn test_nested_parameter_alias() {
    let source = json!({
        "openapi": "3.1.0",
        "info": { "title": "t", "version": "1" },
        "components": {
            "parameters": {
                "Limit": { "name": "limit", "in": "query" },
                "Alias": { "$ref": "#/components/parameters/Limit" }
            }
        }
    });
    assert!(matches!(
        openapi::build(&source),
        Err(IrError::NestedReferenceNotBundled { .. })
    ));
}

#[test]
fn test_circular_component_alias() {
    let source = with_schemas(json!({
        "LoopA": { "$ref": "#/components/schemas/LoopB" },
        "LoopB": { "$ref": "#/components/schemas/LoopA" }
    }));
    match openapi::build(&source) {
        Err(IrError::CircularComponentReference { chain, path }) => {
            assert_eq!(chain.first(), chain.last());
            assert_eq!(path, "#/components/schemas/LoopA");
        }
        other => panic!("Expected CircularComponentReference, got {:?}", other),
    }
}

#[test]
fn test_schema_reference_to_parameter() {
    let source = json!({
        "openapi": "3.1.0",
        "info": { "title": "t", "version": "1" },
        "components": {
            "schemas": { "A": { "$ref": "#/components/parameters/Limit" } },
            "parameters": { "Limit": { "name": "limit", "in": "query" } }
        }
    });
    assert!(matches!(
        openapi::build(&source),
        Err(IrError::UnsupportedReferenceTarget { .. })
    ));
}
