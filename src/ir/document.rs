//! IR Document
//!
//! One Document is produced per build or parse invocation. Components and
//! operations are fixed at construction; `graph::analyze` fills the dependency
//! summary and is the only pass allowed to touch nodes afterwards.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ComponentKind, JsonType, SchemaNode};

/// Version of the IR format itself
pub const IR_VERSION: &str = "1.0.0";

// =============================================================================
// Document
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    pub title: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Node entry of the document-level dependency graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyGraphSummary {
    pub nodes: IndexMap<String, GraphNode>,
    pub topological_order: Vec<String>,
    /// Names of schema components that sit on a reference cycle
    pub circular_references: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumDef {
    pub name: String,
    pub values: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<JsonType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub version: String,
    pub source_format_version: String,
    pub info: DocumentInfo,
    #[serde(default)]
    pub servers: Vec<Server>,
    /// Document-level default security requirements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<Vec<SecurityRequirement>>,
    pub components: Vec<Component>,
    pub operations: Vec<Operation>,
    pub dependency_graph: DependencyGraphSummary,
    pub schema_names: Vec<String>,
    pub enums: IndexMap<String, EnumDef>,
}

impl Document {
    /// An empty document; run `graph::analyze` once components are in place
    pub fn new(source_format_version: impl Into<String>, info: DocumentInfo) -> Self {
        Self {
            version: IR_VERSION.to_string(),
            source_format_version: source_format_version.into(),
            info,
            servers: Vec::new(),
            security: None,
            components: Vec::new(),
            operations: Vec::new(),
            dependency_graph: DependencyGraphSummary::default(),
            schema_names: Vec::new(),
            enums: IndexMap::new(),
        }
    }

    /// Schema component by name
    pub fn schema(&self, name: &str) -> Option<&SchemaNode> {
        self.schemas().find(|(n, _)| *n == name).map(|(_, s)| s)
    }

    /// Schema components in declaration order
    pub fn schemas(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.components.iter().filter_map(|c| match c {
            Component::Schema { name, schema } => Some((name.as_str(), schema)),
            _ => None,
        })
    }

    pub fn schemas_mut(&mut self) -> impl Iterator<Item = (&str, &mut SchemaNode)> {
        self.components.iter_mut().filter_map(|c| match c {
            Component::Schema { name, schema } => Some((name.as_str(), schema)),
            _ => None,
        })
    }

    /// Component of any kind by name
    pub fn component(&self, kind: &ComponentKind, name: &str) -> Option<&Component> {
        self.components
            .iter()
            .find(|c| &c.kind() == kind && c.name() == name)
    }

    pub fn operation(&self, method: HttpMethod, path: &str) -> Option<&Operation> {
        self.operations
            .iter()
            .find(|op| op.method == method && op.path == path)
    }
}

// =============================================================================
// Components
// =============================================================================

/// A named, reusable IR entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Component {
    Schema { name: String, schema: SchemaNode },
    Parameter { name: String, parameter: Parameter },
    Response { name: String, response: Response },
    RequestBody { name: String, body: RequestBody },
    SecurityScheme { name: String, scheme: SecurityScheme },
}

impl Component {
    pub fn name(&self) -> &str {
        match self {
            Self::Schema { name, .. }
            | Self::Parameter { name, .. }
            | Self::Response { name, .. }
            | Self::RequestBody { name, .. }
            | Self::SecurityScheme { name, .. } => name,
        }
    }

    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::Schema { .. } => ComponentKind::Schema,
            Self::Parameter { .. } => ComponentKind::Parameter,
            Self::Response { .. } => ComponentKind::Response,
            Self::RequestBody { .. } => ComponentKind::RequestBody,
            Self::SecurityScheme { .. } => ComponentKind::SecurityScheme,
        }
    }

    pub fn as_schema(&self) -> Option<&SchemaNode> {
        match self {
            Self::Schema { schema, .. } => Some(schema),
            _ => None,
        }
    }
}

// =============================================================================
// Parameters / Bodies / Responses
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "path" => Some(Self::Path),
            "query" => Some(Self::Query),
            "header" => Some(Self::Header),
            "cookie" => Some(Self::Cookie),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    pub required: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explode: Option<bool>,
    /// Parameter component this was resolved from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
}

/// Parameters split by location, each list in declaration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterGroups {
    pub path: Vec<Parameter>,
    pub query: Vec<Parameter>,
    pub header: Vec<Parameter>,
    pub cookie: Vec<Parameter>,
}

impl ParameterGroups {
    pub fn from_parameters(parameters: &[Parameter]) -> Self {
        let mut groups = Self::default();
        for param in parameters {
            let bucket = match param.location {
                ParameterLocation::Path => &mut groups.path,
                ParameterLocation::Query => &mut groups.query,
                ParameterLocation::Header => &mut groups.header,
                ParameterLocation::Cookie => &mut groups.cookie,
            };
            bucket.push(param.clone());
        }
        groups
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    pub content: IndexMap<String, MediaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub content: IndexMap<String, MediaType>,
    #[serde(default)]
    pub headers: IndexMap<String, Header>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
}

/// A response keyed by status code or `"default"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResponse {
    pub status: String,
    #[serde(flatten)]
    pub response: Response,
}

impl OperationResponse {
    pub fn is_success(&self) -> bool {
        self.status.starts_with('2')
    }

    pub fn is_default(&self) -> bool {
        self.status == "default"
    }
}

/// Response coverage problems the caller may want to patch over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseAdvisory {
    /// Neither a 2xx nor a `default` response
    MissingSuccess,
    /// Only a `default` response, no 2xx
    DefaultOnly,
}

// =============================================================================
// Security
// =============================================================================

/// Scheme name -> required scopes
pub type SecurityRequirement = IndexMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SecuritySchemeType {
    ApiKey,
    Http,
    #[serde(rename = "oauth2")]
    OAuth2,
    OpenIdConnect,
    #[serde(rename = "mutualTLS")]
    MutualTls,
}

impl SecuritySchemeType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "apiKey" => Some(Self::ApiKey),
            "http" => Some(Self::Http),
            "oauth2" => Some(Self::OAuth2),
            "openIdConnect" => Some(Self::OpenIdConnect),
            "mutualTLS" => Some(Self::MutualTls),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthFlow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_url: Option<String>,
    #[serde(default)]
    pub scopes: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthFlows {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implicit: Option<OAuthFlow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<OAuthFlow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_credentials: Option<OAuthFlow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_code: Option<OAuthFlow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityScheme {
    #[serde(rename = "type")]
    pub scheme_type: SecuritySchemeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Header, query or cookie name for `apiKey`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "in", default, skip_serializing_if = "Option::is_none")]
    pub location: Option<ParameterLocation>,
    /// HTTP auth scheme (`bearer`, `basic`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flows: Option<OAuthFlows>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_id_connect_url: Option<String>,
}

// =============================================================================
// Operations
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl HttpMethod {
    /// Path-item keys in the order operations are emitted
    pub const ALL: [HttpMethod; 8] = [
        Self::Get,
        Self::Put,
        Self::Post,
        Self::Delete,
        Self::Options,
        Self::Head,
        Self::Patch,
        Self::Trace,
    ];

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == key)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Put => "put",
            Self::Post => "post",
            Self::Delete => "delete",
            Self::Options => "options",
            Self::Head => "head",
            Self::Patch => "patch",
            Self::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub method: HttpMethod,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    pub parameters: Vec<Parameter>,
    pub parameter_groups: ParameterGroups,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    pub responses: Vec<OperationResponse>,
    /// `Some(vec![])` marks a public operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<Vec<SecurityRequirement>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_advisory: Option<ResponseAdvisory>,
}

impl Operation {
    /// Explicitly requires no authentication
    pub fn is_public(&self) -> bool {
        matches!(&self.security, Some(reqs) if reqs.is_empty())
    }

    pub fn response(&self, status: &str) -> Option<&OperationResponse> {
        self.responses.iter().find(|r| r.status == status)
    }
}
