//! Builder-Syntax Parser Tests
//!
//! Parses the zod fixtures end to end: lowering, lint, binding resolution and
//! the dependency facts written into the resulting Document.

use serde_json::json;

use schema_ir::config::ParseConfig;
use schema_ir::ir::{schema_ref, JsonType, Presence};
use schema_ir::writer::WriterContext;
use schema_ir::zod::{self, DiagnosticCode, Parser, SourceLocation};

// =============================================================================
// Lowering
// =============================================================================

#[test]
fn test_single_required_property() {
    let output = zod::parse("import { z } from \"zod\";\nexport const Named = z.object({ name: z.string() });\n");
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);

    let named = output.ir.schema("Named").unwrap();
    assert_eq!(named.schema_type, Some(JsonType::Object));
    assert_eq!(named.required, Some(vec!["name".to_string()]));
    let props = named.properties.as_ref().unwrap();
    assert_eq!(props.len(), 1);
    assert_eq!(props.get("name").unwrap().schema_type, Some(JsonType::String));
}

#[test]
fn test_fixture_declarations() {
    let output = zod::parse(include_str!("fixtures/user.ts"));
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    assert!(output.advisories.is_empty(), "{:?}", output.advisories);

    let ir = &output.ir;
    assert_eq!(ir.schema_names, vec!["Address", "Role", "User", "Admin", "Category"]);
    assert_eq!(
        ir.dependency_graph.topological_order,
        vec!["Address", "Role", "User", "Admin", "Category"]
    );
}

#[test]
fn test_property_presence_and_constraints() {
    let output = zod::parse(include_str!("fixtures/user.ts"));
    let user = output.ir.schema("User").unwrap();
    let props = user.properties.as_ref().unwrap();

    assert_eq!(
        props.names().collect::<Vec<_>>(),
        vec!["name", "email", "website", "age", "address", "role", "tags"]
    );
    assert_eq!(
        user.required,
        Some(vec![
            "name".to_string(),
            "email".to_string(),
            "age".to_string(),
            "address".to_string(),
            "role".to_string(),
        ])
    );

    assert_eq!(props.get("email").unwrap().format.as_deref(), Some("email"));

    let website = props.get("website").unwrap();
    assert_eq!(website.format.as_deref(), Some("uri"));
    assert_eq!(website.metadata.validation_chain.presence, Presence::Optional);

    let age = props.get("age").unwrap();
    assert_eq!(age.schema_type, Some(JsonType::Integer));
    assert_eq!(age.minimum, Some(0.0));
    assert_eq!(age.maximum, Some(150.0));

    let address = props.get("address").unwrap();
    assert_eq!(address.reference.as_deref(), Some("#/components/schemas/Address"));
    assert!(address.metadata.required);

    let role = props.get("role").unwrap();
    assert!(role.is_reference());
    assert!(role.metadata.nullable);
    assert_eq!(role.metadata.validation_chain.presence, Presence::Nullable);

    let tags = props.get("tags").unwrap();
    assert_eq!(tags.default, Some(json!([])));
    assert!(!tags.metadata.required);
    assert_eq!(tags.items.as_ref().unwrap().schema_type, Some(JsonType::String));
}

#[test]
fn test_regex_and_length() {
    let output = zod::parse(include_str!("fixtures/user.ts"));
    let address = output.ir.schema("Address").unwrap();
    let props = address.properties.as_ref().unwrap();
    assert_eq!(props.get("street").unwrap().min_length, Some(1));
    assert_eq!(props.get("zip").unwrap().pattern.as_deref(), Some(r"^\d{5}$"));
}

#[test]
fn test_enum_declaration() {
    let output = zod::parse(include_str!("fixtures/user.ts"));
    let role = &output.ir.enums["Role"];
    assert_eq!(role.values, vec![json!("owner"), json!("editor"), json!("viewer")]);
    assert_eq!(role.value_type, Some(JsonType::String));
}

#[test]
fn test_extend_of_reference() {
    let output = zod::parse(include_str!("fixtures/user.ts"));
    let admin = output.ir.schema("Admin").unwrap();
    let members = admin.all_of.as_ref().unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].reference.as_deref(), Some("#/components/schemas/User"));

    let permissions = members[1].properties.as_ref().unwrap().get("permissions").unwrap();
    assert_eq!(permissions.schema_type, Some(JsonType::Array));
    assert_eq!(permissions.unique_items, Some(true));
}

#[test]
fn test_lazy_self_reference() {
    let output = zod::parse(include_str!("fixtures/user.ts"));
    let ir = &output.ir;
    assert_eq!(ir.dependency_graph.circular_references, vec!["Category"]);

    let category = ir.schema("Category").unwrap();
    assert_eq!(category.metadata.circular_references, vec![schema_ref("Category")]);
    let children = category.properties.as_ref().unwrap().get("children").unwrap();
    let items = children.items.as_ref().unwrap();
    assert_eq!(items.metadata.circular_references, vec![schema_ref("Category")]);

    // Declarations pointing at other schemas stay unmarked
    assert!(ir.schema("User").unwrap().metadata.circular_references.is_empty());
}

#[test]
fn test_parsed_document_passes_writer_boundary() {
    let output = zod::parse(include_str!("fixtures/user.ts"));
    let cx = WriterContext::new(&output.ir).unwrap();
    assert_eq!(cx.schema_count(), 5);
    let category = cx.region("Category").unwrap();
    assert!(category.needs_lazy());
    assert!(category.property_needs_lazy("children"));
    assert!(!category.property_needs_lazy("name"));
    assert_eq!(cx.region("User").unwrap().dependencies, vec!["Address", "Role"]);
}

// =============================================================================
// Lint
// =============================================================================

#[test]
fn test_legacy_and_non_analyzable() {
    let output = zod::parse(include_str!("fixtures/legacy.ts"));
    let findings = &output.diagnostics;
    assert_eq!(findings.len(), 3, "{:?}", findings);

    assert_eq!(findings[0].code, DiagnosticCode::LegacySyntax);
    assert_eq!(findings[0].declaration.as_deref(), Some("Title"));
    assert_eq!(findings[0].location, Some(SourceLocation::new(6, 33)));
    assert_eq!(findings[0].replacement.as_deref(), Some(".min(1)"));

    assert_eq!(findings[1].code, DiagnosticCode::NonAnalyzableSchema);
    assert!(findings[1].message.contains("computed"));
    assert_eq!(findings[1].location, Some(SourceLocation::new(7, 36)));

    assert_eq!(findings[2].code, DiagnosticCode::NonAnalyzableSchema);
    assert!(findings[2].message.contains("spread"));
    assert_eq!(findings[2].location, Some(SourceLocation::new(8, 34)));

    // Rejected declarations contribute nothing
    assert_eq!(output.ir.schema_names, vec!["Clean"]);
    assert!(output.has_errors());

    // `Clean` points at the rejected `Title`, which is reported
    assert_eq!(output.advisories.len(), 1, "{:?}", output.advisories);
    let advisory = &output.advisories[0];
    assert_eq!(advisory.code, DiagnosticCode::UnresolvedReference);
    assert_eq!(advisory.declaration.as_deref(), Some("Clean"));
    assert!(advisory.message.contains("`Title` was rejected"));
    assert_eq!(advisory.location, Some(SourceLocation::new(9, 40)));
    assert_eq!(advisory.replacement, None);
}

#[test]
fn test_reference_to_rejected_declaration_is_reported() {
    let output = zod::parse(
        r#"import { z } from "zod";
const Title = z.string().nonempty();
const Clean = z.object({ title: Title });
"#,
    );
    assert_eq!(output.ir.schema_names, vec!["Clean"]);
    assert_eq!(output.advisories.len(), 1);
    assert_eq!(output.advisories[0].code, DiagnosticCode::UnresolvedReference);
    assert_eq!(output.advisories[0].location, Some(SourceLocation::new(3, 33)));
}

#[test]
fn test_duplicate_declaration() {
    let output = zod::parse(
        r#"import { z } from "zod";
var Name = z.string();
var Name = z.number();
"#,
    );
    assert_eq!(output.ir.schema_names, vec!["Name"]);
    assert_eq!(output.ir.schema("Name").unwrap().schema_type, Some(JsonType::String));
    assert_eq!(output.ir.components.len(), 1);

    assert_eq!(output.diagnostics.len(), 1);
    let duplicate = &output.diagnostics[0];
    assert_eq!(duplicate.code, DiagnosticCode::DuplicateDeclaration);
    assert_eq!(duplicate.declaration.as_deref(), Some("Name"));
    assert_eq!(duplicate.location, Some(SourceLocation::new(3, 12)));
}

#[test]
fn test_columns_count_characters() {
    let output = zod::parse(
        "import { z } from \"zod\";\nconst Café = z.string().frobnicate();\n",
    );
    assert_eq!(output.diagnostics.len(), 1);
    // `é` is two bytes; the column counts it once
    assert_eq!(output.diagnostics[0].location, Some(SourceLocation::new(2, 25)));
}

#[test]
fn test_annotated_reference_passes_writer_boundary() {
    let output = zod::parse(
        r#"import { z } from "zod";
const Address = z.object({ street: z.string() });
const User = z.object({ home: Address.describe("Home address") });
"#,
    );
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);

    let home = output.ir.schema("User").unwrap().properties.as_ref().unwrap().get("home").unwrap();
    assert!(home.reference.is_none());
    assert_eq!(home.description.as_deref(), Some("Home address"));
    assert_eq!(home.all_of.as_ref().unwrap()[0].reference.as_deref(), Some("#/components/schemas/Address"));

    let cx = WriterContext::new(&output.ir).unwrap();
    assert_eq!(cx.region("User").unwrap().dependencies, vec!["Address"]);
}

#[test]
fn test_lint_only_matches_parse() {
    let source = include_str!("fixtures/legacy.ts");
    let linted = Parser::default().lint(source);
    let parsed = zod::parse(source).diagnostics;
    assert_eq!(linted, parsed);
}

#[test]
fn test_aliased_import_and_shadowing() {
    let output = zod::parse(include_str!("fixtures/shadowed.ts"));
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);

    // `z` comes from a local module here, `schema` is the builder
    assert_eq!(output.ir.schema_names, vec!["Local"]);
    let local = output.ir.schema("Local").unwrap();
    let id = local.properties.as_ref().unwrap().get("id").unwrap();
    assert_eq!(id.format.as_deref(), Some("uuid"));
}

#[test]
fn test_ambient_builder() {
    let source = "export const Flag = z.boolean();\n";
    let output = zod::parse(source);
    assert_eq!(output.ir.schema_names, vec!["Flag"]);

    let strict = Parser::new(ParseConfig {
        allow_ambient_builder: false,
        ..ParseConfig::default()
    });
    assert!(strict.parse(source).ir.schema_names.is_empty());
}

// =============================================================================
// Advisories
// =============================================================================

#[test]
fn test_missing_description_advisory() {
    let parser = Parser::new(ParseConfig {
        require_descriptions: true,
        ..ParseConfig::default()
    });
    let output = parser.parse(
        r#"import { z } from "zod";
export const Documented = z.string().describe("A documented string");
export const Bare = z.string();
const Internal = z.string();
"#,
    );
    assert!(output.diagnostics.is_empty());
    assert_eq!(output.advisories.len(), 1);
    assert_eq!(output.advisories[0].code, DiagnosticCode::MissingDescription);
    assert_eq!(output.advisories[0].declaration.as_deref(), Some("Bare"));
    assert!(!output.has_errors());
}
