//! Operations, parameters, request bodies and responses
//!
//! Parameter, response, request-body and header references are resolved and
//! lowered in place; the component name they came from is kept on the result.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::context::BuildContext;
use super::resolve::{self, Resolved};
use super::schema::{bool_field, lower_schema, string_field};
use super::security::lower_requirements;
use crate::error::{IrError, Result};
use crate::ir::{
    ComponentKind, Header, HttpMethod, MediaType, Operation, OperationResponse, Parameter,
    ParameterGroups, ParameterLocation, RequestBody, Response, ResponseAdvisory,
    SecurityRequirement,
};

/// Every operation under `paths`, in document order
pub fn lower_paths(
    cx: &BuildContext,
    default_security: Option<&Vec<SecurityRequirement>>,
) -> Result<Vec<Operation>> {
    let Some(paths) = cx.root.get("paths") else {
        return Ok(Vec::new());
    };
    let Some(paths) = paths.as_object() else {
        return Err(IrError::InvalidDocument("paths must be an object".to_string()));
    };

    let mut operations = Vec::new();
    for (path, item) in paths {
        let item_cx = cx.at(&["paths", path.as_str()]);
        let Some(item) = item.as_object() else {
            return Err(item_cx.shape_error("path item must be an object"));
        };
        if item.contains_key("$ref") {
            return Err(item_cx.shape_error("path item references must be bundled first"));
        }

        let shared = match item.get("parameters") {
            Some(params) => lower_parameter_list(&item_cx.token("parameters"), params)?,
            None => Vec::new(),
        };

        for (key, op) in item {
            let Some(method) = HttpMethod::from_key(key) else {
                continue;
            };
            let op_cx = item_cx.token(key);
            let operation = lower_operation(&op_cx, method, path, op, &shared, default_security)?;
            debug!(
                method = method.as_str(),
                path = %path,
                parameters = operation.parameters.len(),
                "Lowered operation"
            );
            operations.push(operation);
        }
    }
    Ok(operations)
}

fn lower_operation(
    cx: &BuildContext,
    method: HttpMethod,
    path: &str,
    value: &Value,
    shared: &[Parameter],
    default_security: Option<&Vec<SecurityRequirement>>,
) -> Result<Operation> {
    let Some(obj) = value.as_object() else {
        return Err(cx.shape_error("operation must be an object"));
    };

    let mut parameters = shared.to_vec();
    if let Some(params) = obj.get("parameters") {
        for param in lower_parameter_list(&cx.token("parameters"), params)? {
            merge_parameter(&mut parameters, param);
        }
    }

    let request_body = match obj.get("requestBody") {
        Some(body) => Some(lower_request_body(&cx.token("requestBody"), body)?),
        None => None,
    };

    let responses = match obj.get("responses") {
        Some(responses) => lower_responses(&cx.token("responses"), responses)?,
        None => Vec::new(),
    };
    let response_advisory = response_advisory(&responses);
    if let Some(advisory) = response_advisory {
        warn!(method = method.as_str(), path, ?advisory, "Incomplete response coverage");
    }

    // An explicit key wins, even when empty
    let security = match obj.get("security") {
        Some(security) => Some(lower_requirements(&cx.token("security"), security)?),
        None => default_security.cloned(),
    };

    let tags = obj
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| tags.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();

    Ok(Operation {
        method,
        path: path.to_string(),
        operation_id: string_field(obj, "operationId"),
        summary: string_field(obj, "summary"),
        description: string_field(obj, "description"),
        deprecated: bool_field(obj, "deprecated"),
        tags,
        parameter_groups: ParameterGroups::from_parameters(&parameters),
        parameters,
        request_body,
        responses,
        security,
        response_advisory,
    })
}

/// Same `(name, in)` replaces in place, anything else is appended
fn merge_parameter(parameters: &mut Vec<Parameter>, param: Parameter) {
    match parameters
        .iter_mut()
        .find(|p| p.name == param.name && p.location == param.location)
    {
        Some(existing) => *existing = param,
        None => parameters.push(param),
    }
}

fn response_advisory(responses: &[OperationResponse]) -> Option<ResponseAdvisory> {
    let has_success = responses.iter().any(OperationResponse::is_success);
    let has_default = responses.iter().any(OperationResponse::is_default);
    match (has_success, has_default) {
        (true, _) => None,
        (false, true) => Some(ResponseAdvisory::DefaultOnly),
        (false, false) => Some(ResponseAdvisory::MissingSuccess),
    }
}

// =============================================================================
// Parameters
// =============================================================================

fn lower_parameter_list(cx: &BuildContext, value: &Value) -> Result<Vec<Parameter>> {
    let Some(params) = value.as_array() else {
        return Err(cx.shape_error("parameters must be an array"));
    };
    params
        .iter()
        .enumerate()
        .map(|(i, param)| lower_parameter(&cx.token(&i.to_string()), param))
        .collect()
}

/// A parameter, following a parameter component reference
pub fn lower_parameter(cx: &BuildContext, value: &Value) -> Result<Parameter> {
    let Some(reference) = resolve::ref_of(cx, value)? else {
        return lower_parameter_body(cx, value, None);
    };
    let (name, target) = resolve_local(cx, reference, ComponentKind::Parameter)?;
    let target_cx = cx.at(&["components", "parameters", name.as_str()]);
    lower_parameter_body(&target_cx, target, Some(name))
}

pub(crate) fn lower_parameter_body(
    cx: &BuildContext,
    value: &Value,
    component: Option<String>,
) -> Result<Parameter> {
    let Some(obj) = value.as_object() else {
        return Err(cx.shape_error("parameter must be an object"));
    };
    let Some(name) = obj.get("name").and_then(Value::as_str) else {
        return Err(cx.shape_error("parameter requires a name"));
    };
    let Some(location_name) = obj.get("in").and_then(Value::as_str) else {
        return Err(cx.shape_error("parameter requires a location"));
    };
    let Some(location) = ParameterLocation::from_name(location_name) else {
        return Err(cx.token("in").shape_error(format!("unknown location '{}'", location_name)));
    };

    let required = location == ParameterLocation::Path || bool_field(obj, "required");
    let schema = match (obj.get("schema"), obj.get("content")) {
        (Some(schema), _) => Some(lower_schema(&cx.child("schema").with_required(required), schema)?),
        (None, Some(content)) => first_content_schema(&cx.token("content"), content, required)?,
        (None, None) => None,
    };

    Ok(Parameter {
        name: name.to_string(),
        location,
        required,
        deprecated: bool_field(obj, "deprecated"),
        description: string_field(obj, "description"),
        schema,
        style: string_field(obj, "style"),
        explode: obj.get("explode").and_then(Value::as_bool),
        component,
    })
}

fn first_content_schema(
    cx: &BuildContext,
    content: &Value,
    required: bool,
) -> Result<Option<crate::ir::SchemaNode>> {
    let Some((media, entry)) = content.as_object().and_then(|c| c.iter().next()) else {
        return Ok(None);
    };
    match entry.get("schema") {
        Some(schema) => Ok(Some(lower_schema(
            &cx.token(media).child("schema").with_required(required),
            schema,
        )?)),
        None => Ok(None),
    }
}

// =============================================================================
// Request Bodies / Responses
// =============================================================================

pub fn lower_request_body(cx: &BuildContext, value: &Value) -> Result<RequestBody> {
    let Some(reference) = resolve::ref_of(cx, value)? else {
        return lower_request_body_inner(cx, value, None);
    };
    let (name, target) = resolve_local(cx, reference, ComponentKind::RequestBody)?;
    let target_cx = cx.at(&["components", "requestBodies", name.as_str()]);
    lower_request_body_inner(&target_cx, target, Some(name))
}

pub(crate) fn lower_request_body_inner(
    cx: &BuildContext,
    value: &Value,
    component: Option<String>,
) -> Result<RequestBody> {
    let Some(obj) = value.as_object() else {
        return Err(cx.shape_error("request body must be an object"));
    };
    Ok(RequestBody {
        description: string_field(obj, "description"),
        required: bool_field(obj, "required"),
        content: lower_content(cx, obj)?,
        component,
    })
}

fn lower_responses(cx: &BuildContext, value: &Value) -> Result<Vec<OperationResponse>> {
    let Some(responses) = value.as_object() else {
        return Err(cx.shape_error("responses must be an object"));
    };
    responses
        .iter()
        .map(|(status, response)| {
            Ok(OperationResponse {
                status: status.clone(),
                response: lower_response(&cx.token(status), response)?,
            })
        })
        .collect()
}

pub fn lower_response(cx: &BuildContext, value: &Value) -> Result<Response> {
    let Some(reference) = resolve::ref_of(cx, value)? else {
        return lower_response_inner(cx, value, None);
    };
    let (name, target) = resolve_local(cx, reference, ComponentKind::Response)?;
    let target_cx = cx.at(&["components", "responses", name.as_str()]);
    lower_response_inner(&target_cx, target, Some(name))
}

pub(crate) fn lower_response_inner(
    cx: &BuildContext,
    value: &Value,
    component: Option<String>,
) -> Result<Response> {
    let Some(obj) = value.as_object() else {
        return Err(cx.shape_error("response must be an object"));
    };

    let mut headers = IndexMap::new();
    if let Some(declared) = obj.get("headers") {
        let headers_cx = cx.token("headers");
        let Some(declared) = declared.as_object() else {
            return Err(headers_cx.shape_error("headers must be an object"));
        };
        for (name, header) in declared {
            headers.insert(name.clone(), lower_header(&headers_cx.token(name), header)?);
        }
    }

    Ok(Response {
        description: string_field(obj, "description"),
        content: lower_content(cx, obj)?,
        headers,
        component,
    })
}

fn lower_header(cx: &BuildContext, value: &Value) -> Result<Header> {
    let (cx, value) = match resolve::ref_of(cx, value)? {
        Some(reference) => {
            let (name, target) = resolve_local(cx, reference, ComponentKind::Header)?;
            (cx.at(&["components", "headers", name.as_str()]), target)
        }
        None => (cx.clone(), value),
    };
    let Some(obj) = value.as_object() else {
        return Err(cx.shape_error("header must be an object"));
    };
    let required = bool_field(obj, "required");
    let schema = match obj.get("schema") {
        Some(schema) => Some(lower_schema(&cx.child("schema").with_required(required), schema)?),
        None => None,
    };
    Ok(Header {
        description: string_field(obj, "description"),
        required,
        deprecated: bool_field(obj, "deprecated"),
        schema,
    })
}

/// `content`: media type -> schema, in declaration order
fn lower_content(cx: &BuildContext, obj: &Map<String, Value>) -> Result<IndexMap<String, MediaType>> {
    let mut content = IndexMap::new();
    let Some(declared) = obj.get("content") else {
        return Ok(content);
    };
    let content_cx = cx.token("content");
    let Some(declared) = declared.as_object() else {
        return Err(content_cx.shape_error("content must be an object"));
    };
    for (media, entry) in declared {
        let media_cx = content_cx.token(media);
        let schema = match entry.get("schema") {
            Some(schema) => Some(lower_schema(&media_cx.child("schema"), schema)?),
            None => None,
        };
        content.insert(media.clone(), MediaType { schema });
    }
    Ok(content)
}

/// Resolve a non-schema reference to its local definition
fn resolve_local<'a>(
    cx: &BuildContext<'a>,
    reference: &str,
    kind: ComponentKind,
) -> Result<(String, &'a Value)> {
    match resolve::resolve(cx, reference, kind)? {
        Resolved::Local { reference, target } => Ok((reference.name, target)),
        // Only schema references can stay unresolved in the IR
        Resolved::External { .. } => Err(IrError::UnresolvedReference {
            reference: reference.to_string(),
            path: cx.path(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: &str) -> OperationResponse {
        OperationResponse {
            status: status.to_string(),
            response: Response::default(),
        }
    }

    #[test]
    fn test_response_advisories() {
        assert_eq!(response_advisory(&[response("200")]), None);
        assert_eq!(response_advisory(&[response("204"), response("default")]), None);
        assert_eq!(
            response_advisory(&[response("default")]),
            Some(ResponseAdvisory::DefaultOnly)
        );
        assert_eq!(
            response_advisory(&[response("404")]),
            Some(ResponseAdvisory::MissingSuccess)
        );
        assert_eq!(response_advisory(&[]), Some(ResponseAdvisory::MissingSuccess));
    }

    #[test]
    fn test_path_parameter_always_required() {
        let root = json!({});
        let cx = BuildContext::new(&root, 8);
        let param = lower_parameter(
            &cx,
            &json!({ "name": "id", "in": "path", "schema": { "type": "string" } }),
        )
        .unwrap();
        assert!(param.required);
        assert!(param.schema.unwrap().metadata.required);
    }

    #[test]
    fn test_parameter_reference_records_component() {
        let root = json!({
            "components": { "parameters": { "Limit": { "name": "limit", "in": "query" } } }
        });
        let cx = BuildContext::new(&root, 8).at(&["paths", "/items", "get", "parameters", "0"]);
        let param = lower_parameter(&cx, &json!({ "$ref": "#/components/parameters/Limit" })).unwrap();
        assert_eq!(param.name, "limit");
        assert_eq!(param.component.as_deref(), Some("Limit"));
        assert!(!param.required);
    }

    #[test]
    fn test_merge_replaces_in_place() {
        let root = json!({});
        let cx = BuildContext::new(&root, 8);
        let mut params = vec![
            lower_parameter(&cx, &json!({ "name": "a", "in": "query" })).unwrap(),
            lower_parameter(&cx, &json!({ "name": "b", "in": "query" })).unwrap(),
        ];
        merge_parameter(
            &mut params,
            lower_parameter(&cx, &json!({ "name": "a", "in": "query", "required": true })).unwrap(),
        );
        merge_parameter(
            &mut params,
            lower_parameter(&cx, &json!({ "name": "a", "in": "header" })).unwrap(),
        );
        let names: Vec<_> = params.iter().map(|p| (p.name.as_str(), p.location)).collect();
        assert_eq!(
            names,
            vec![
                ("a", ParameterLocation::Query),
                ("b", ParameterLocation::Query),
                ("a", ParameterLocation::Header)
            ]
        );
        assert!(params[0].required);
    }
}
