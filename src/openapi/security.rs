//! Security schemes and requirements

use indexmap::IndexMap;
use serde_json::Value;

use super::context::BuildContext;
use super::schema::string_field;
use crate::error::Result;
use crate::ir::{
    OAuthFlow, OAuthFlows, ParameterLocation, SecurityRequirement, SecurityScheme,
    SecuritySchemeType,
};

pub fn lower_security_scheme(cx: &BuildContext, value: &Value) -> Result<SecurityScheme> {
    let Some(obj) = value.as_object() else {
        return Err(cx.shape_error("security scheme must be an object"));
    };
    let Some(type_name) = obj.get("type").and_then(Value::as_str) else {
        return Err(cx.shape_error("security scheme requires a type"));
    };
    let Some(scheme_type) = SecuritySchemeType::from_name(type_name) else {
        return Err(cx.token("type").shape_error(format!("unknown security scheme type '{}'", type_name)));
    };

    let location = match obj.get("in").and_then(Value::as_str) {
        None => None,
        Some(name) => Some(ParameterLocation::from_name(name).ok_or_else(|| {
            cx.token("in").shape_error(format!("unknown location '{}'", name))
        })?),
    };

    let flows = match obj.get("flows") {
        None => None,
        Some(flows) => Some(lower_flows(&cx.token("flows"), flows)?),
    };

    Ok(SecurityScheme {
        scheme_type,
        description: string_field(obj, "description"),
        name: string_field(obj, "name"),
        location,
        scheme: string_field(obj, "scheme"),
        bearer_format: string_field(obj, "bearerFormat"),
        flows,
        open_id_connect_url: string_field(obj, "openIdConnectUrl"),
    })
}

fn lower_flows(cx: &BuildContext, value: &Value) -> Result<OAuthFlows> {
    let flow = |key: &str| -> Result<Option<OAuthFlow>> {
        match value.get(key) {
            None => Ok(None),
            Some(flow) => lower_flow(&cx.token(key), flow).map(Some),
        }
    };
    Ok(OAuthFlows {
        implicit: flow("implicit")?,
        password: flow("password")?,
        client_credentials: flow("clientCredentials")?,
        authorization_code: flow("authorizationCode")?,
    })
}

fn lower_flow(cx: &BuildContext, value: &Value) -> Result<OAuthFlow> {
    let Some(obj) = value.as_object() else {
        return Err(cx.shape_error("OAuth flow must be an object"));
    };
    let mut scopes = IndexMap::new();
    if let Some(declared) = obj.get("scopes").and_then(Value::as_object) {
        for (scope, description) in declared {
            scopes.insert(scope.clone(), description.as_str().unwrap_or_default().to_string());
        }
    }
    Ok(OAuthFlow {
        authorization_url: string_field(obj, "authorizationUrl"),
        token_url: string_field(obj, "tokenUrl"),
        refresh_url: string_field(obj, "refreshUrl"),
        scopes,
    })
}

/// A `security` array: each entry maps scheme names to scopes
pub fn lower_requirements(cx: &BuildContext, value: &Value) -> Result<Vec<SecurityRequirement>> {
    let Some(entries) = value.as_array() else {
        return Err(cx.shape_error("security must be an array"));
    };

    let mut requirements = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let entry_cx = cx.token(&i.to_string());
        let Some(entry) = entry.as_object() else {
            return Err(entry_cx.shape_error("security requirement must be an object"));
        };
        let mut requirement = SecurityRequirement::new();
        for (scheme, scopes) in entry {
            let scopes = scopes
                .as_array()
                .map(|s| s.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default();
            requirement.insert(scheme.clone(), scopes);
        }
        requirements.push(requirement);
    }
    Ok(requirements)
}
