//! Per-operation resolvers that execute REST calls.
//!
//! A resolve call runs through these steps:
//!
//! 1. recover the state recorded by the parent's call
//! 2. fill missing arguments from parameter defaults
//! 3. evaluate link parameter bindings
//! 4. build the request (path, query, headers, cookies)
//! 5. serialize the payload
//! 6. sign the request
//! 7. dispatch it
//! 8. classify the response and record the call for descendants

use crate::auth::{self, AuthState};
use crate::definition::{DefId, DefKind};
use crate::error::{HttpErrorDetails, OpenApiError, Result};
use crate::expression::Binding;
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use crate::naming::{CaseStyle, sanitize};
use crate::registry::Registry;
use crate::state::{CallContext, CallRecord, ResolvedValue, path_key};
use crate::types::{Operation, ParameterLocation};
use async_trait::async_trait;
use indexmap::IndexMap;
use oasgraph_telemetry::{RestCallSpanAttributes, trace_rest_call};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Replaces the REST call of one operation.
///
/// Registered per (document title, path, method); the returned value is
/// used as the field's data as is.
#[async_trait]
pub trait CustomResolver: Send + Sync {
    async fn resolve(
        &self,
        operation: &Operation,
        parent: Option<&Value>,
        args: &IndexMap<String, Value>,
    ) -> Result<Value>;
}

/// Custom resolvers keyed by (document title, path, uppercase method).
pub(crate) type CustomResolverTable = HashMap<(String, String, String), Arc<dyn CustomResolver>>;

pub(crate) fn custom_resolver_key(title: &str, path: &str, method: &str) -> (String, String, String) {
    (title.to_string(), path.to_string(), method.to_uppercase())
}

/// Inputs of one resolver invocation.
#[derive(Debug, Default)]
pub struct ResolverCall<'a> {
    /// The value the field is resolved on; `None` for root fields
    pub parent: Option<&'a ResolvedValue>,
    /// Argument values keyed by sanitized argument name
    pub args: IndexMap<String, Value>,
    /// Credentials supplied with the GraphQL request
    pub auth: Option<&'a AuthState>,
    /// Response keys from the root to this field, list indices dropped
    pub path: Vec<String>,
    /// Value of the synthetic `limit` argument
    pub limit: Option<i64>,
}

/// Executes one operation.
#[derive(Clone)]
pub struct Resolver {
    registry: Arc<Registry>,
    client: Arc<dyn HttpClient>,
    operation_id: String,
    /// Link bindings: target parameter name → literal or expression
    link_parameters: IndexMap<String, Value>,
    custom: Option<Arc<dyn CustomResolver>>,
}

impl Resolver {
    pub fn new(
        registry: Arc<Registry>,
        client: Arc<dyn HttpClient>,
        operation_id: impl Into<String>,
    ) -> Result<Self> {
        let operation_id = operation_id.into();
        if registry.operation(&operation_id).is_none() {
            return Err(OpenApiError::OperationNotFound(operation_id));
        }
        Ok(Self {
            registry,
            client,
            operation_id,
            link_parameters: IndexMap::new(),
            custom: None,
        })
    }

    /// Bind some of the operation's parameters through a link.
    pub fn with_link_parameters(mut self, parameters: IndexMap<String, Value>) -> Self {
        self.link_parameters = parameters;
        self
    }

    pub fn with_custom(mut self, custom: Option<Arc<dyn CustomResolver>>) -> Self {
        self.custom = custom;
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn operation(&self) -> &Operation {
        // Checked in `new`; the registry is immutable.
        &self.registry.operations()[self.operation_id.as_str()]
    }

    pub async fn resolve(&self, call: ResolverCall<'_>) -> Result<ResolvedValue> {
        let operation = self.operation();
        let path = path_key(call.path.iter().map(String::as_str));
        debug!("Resolving {} at '{}'", operation.operation_id, path);

        let context = call
            .parent
            .map(|p| p.context.clone())
            .unwrap_or_default();
        let parent_path = path_key(
            call.path
                .iter()
                .take(call.path.len().saturating_sub(1))
                .map(String::as_str),
        );
        let parent_data = call.parent.map(|p| &p.data);

        let mut args = call.args;
        self.fill_defaults(operation, &mut args);
        self.resolve_link_arguments(operation, &mut args, &context, &parent_path, parent_data)?;

        if let Some(custom) = &self.custom {
            let data = custom.resolve(operation, parent_data, &args).await?;
            return Ok(ResolvedValue::new(data, context));
        }

        let (mut request, mut record) = self.build_request(operation, &args)?;
        auth::inject(
            &mut request,
            operation,
            self.registry.security_schemes(),
            context.credentials(),
            call.auth,
            self.registry.options().viewer,
        )?;

        let response = self.execute_request(operation, &path, request).await?;
        let data = self.classify_response(operation, &response, call.limit, &mut record)?;

        Ok(ResolvedValue::new(data, context.with_record(path, record)))
    }

    fn fill_defaults(&self, operation: &Operation, args: &mut IndexMap<String, Value>) {
        for parameter in &operation.parameters {
            if args.get(&parameter.name).is_none_or(Value::is_null) {
                if let Some(default) = &parameter.default {
                    args.insert(parameter.name.clone(), default.clone());
                }
            }
        }
    }

    fn resolve_link_arguments(
        &self,
        operation: &Operation,
        args: &mut IndexMap<String, Value>,
        context: &CallContext,
        parent_path: &str,
        parent: Option<&Value>,
    ) -> Result<()> {
        if self.link_parameters.is_empty() {
            return Ok(());
        }

        let empty = CallRecord::default();
        let record = context.record(parent_path).unwrap_or(&empty);
        let parent = self
            .registry
            .name_map()
            .desanitize(parent.unwrap_or(&Value::Null));

        // A list response is recorded once for all of its items, bind
        // against the item instead.
        let item_record;
        let record = match &record.response_body {
            Some(Value::Array(_)) => {
                item_record = CallRecord {
                    response_body: Some(parent.clone()),
                    ..record.clone()
                };
                &item_record
            }
            _ => record,
        };
        let parent = &parent;

        for (name, raw) in &self.link_parameters {
            let Some(parameter) = link_target_parameter(operation, name) else {
                debug!(
                    "Link parameter '{}' does not match a parameter of {}",
                    name, operation.operation_string
                );
                continue;
            };
            let value = Binding::parse(raw)?.evaluate(record, parent)?;
            if !value.is_null() {
                args.insert(parameter.name.clone(), value);
            }
        }
        Ok(())
    }

    /// Build an HTTP request from the arguments.
    #[instrument(skip(self, operation, args), fields(operation = %operation.operation_id))]
    fn build_request(
        &self,
        operation: &Operation,
        args: &IndexMap<String, Value>,
    ) -> Result<(HttpRequest, CallRecord)> {
        let options = self.registry.options();
        let mut record = CallRecord {
            operation_id: operation.operation_id.clone(),
            method: operation.method.clone(),
            ..CallRecord::default()
        };
        let mut request = HttpRequest {
            method: operation.method.clone(),
            ..HttpRequest::default()
        };

        let mut path = operation.path.clone();
        for parameter in &operation.parameters {
            if parameter.is_statically_supplied(options) {
                continue;
            }
            let value = match args.get(&parameter.name) {
                Some(value) if !value.is_null() => value,
                _ if parameter.required => {
                    return Err(OpenApiError::MissingParameter(parameter.original_name.clone()));
                }
                _ => continue,
            };
            let value = self.to_request_value(parameter.def, value);
            let name = &parameter.original_name;

            match parameter.location {
                ParameterLocation::Path => {
                    let text = param_string(&value);
                    path = path.replace(&format!("{{{}}}", name), &urlencoding::encode(&text));
                    record.request_path.insert(name.clone(), text);
                }
                ParameterLocation::Query => {
                    let values = match &value {
                        Value::Array(items) => items.iter().map(param_string).collect(),
                        other => vec![param_string(other)],
                    };
                    for text in values {
                        request.query.push((name.clone(), text.clone()));
                        record.request_query.insert(name.clone(), text);
                    }
                }
                ParameterLocation::Header => {
                    let text = param_string(&value);
                    request.headers.push((name.clone(), text.clone()));
                    record.request_headers.insert(name.clone(), text);
                }
                ParameterLocation::Cookie => {
                    auth::add_cookie(&mut request, name, &param_string(&value));
                }
            }
        }

        for (name, value) in &options.headers {
            request.headers.push((name.clone(), value.clone()));
            record.request_headers.insert(name.clone(), value.clone());
        }
        for (name, value) in &options.query_params {
            request.query.push((name.clone(), value.clone()));
            record.request_query.insert(name.clone(), value.clone());
        }

        let base = options
            .base_url
            .as_deref()
            .or_else(|| operation.servers.first().map(String::as_str))
            .unwrap_or("/");
        request.url = format!("{}{}", base.trim_end_matches('/'), path);
        record.url = request.url.clone();

        self.serialize_payload(operation, args, &mut request, &mut record)?;

        debug!("Request URL: {} {}", request.method, request.full_url());
        Ok((request, record))
    }

    fn serialize_payload(
        &self,
        operation: &Operation,
        args: &IndexMap<String, Value>,
        request: &mut HttpRequest,
        record: &mut CallRecord,
    ) -> Result<()> {
        let (Some(def), Some(content_type)) = (operation.payload_def, &operation.payload_content_type) else {
            return Ok(());
        };
        let name = crate::fields::payload_argument_name(&self.registry, operation);
        let Some(value) = args.get(&name).filter(|v| !v.is_null()) else {
            if operation.payload_required {
                return Err(OpenApiError::MissingParameter(name));
            }
            return Ok(());
        };

        let body = if content_type.contains("json") {
            let payload = self.to_request_value(def, value);
            let body = serde_json::to_string(&payload)?;
            record.request_body = Some(payload);
            body
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let payload = self.to_request_value(def, value);
            let body = form_encode(&payload);
            record.request_body = Some(payload);
            body
        } else {
            param_string(value)
        };

        request
            .headers
            .push(("Content-Type".to_string(), content_type.clone()));
        request.body = Some(body);
        Ok(())
    }

    /// Execute the request and trace the call.
    #[instrument(skip(self, operation, request), fields(operation = %operation.operation_id))]
    async fn execute_request(
        &self,
        operation: &Operation,
        field_path: &str,
        request: HttpRequest,
    ) -> Result<HttpResponse> {
        let url = request.full_url();
        let result = self.client.send(request).await;

        trace_rest_call(RestCallSpanAttributes {
            operation_id: operation.operation_id.clone(),
            field_path: field_path.to_string(),
            method: operation.method.clone(),
            url,
            status_code: result.as_ref().ok().map(|r| r.status),
        });

        result
    }

    fn classify_response(
        &self,
        operation: &Operation,
        response: &HttpResponse,
        limit: Option<i64>,
        record: &mut CallRecord,
    ) -> Result<Value> {
        record.status_code = response.status;
        record.response_headers = response.headers.clone().into_iter().collect();

        if !response.is_success() {
            error!(
                "API request failed: {} - Status: {} - Body: {}",
                operation.operation_string, response.status, response.body
            );
            let details = self.registry.options().provide_error_extensions.then(|| {
                Box::new(HttpErrorDetails {
                    method: operation.method.clone(),
                    path: operation.path.clone(),
                    url: record.url.clone(),
                    status_code: response.status,
                    status_text: response.status_text.clone(),
                    response_headers: Value::Object(
                        response
                            .headers
                            .iter()
                            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                            .collect(),
                    ),
                    response_body: serde_json::from_str(&response.body)
                        .unwrap_or_else(|_| Value::String(response.body.clone())),
                })
            });
            return Err(OpenApiError::HttpStatus {
                operation: operation.operation_string.clone(),
                status_code: response.status,
                status_text: response.status_text.clone(),
                details,
            });
        }

        let Some(content_type) = response.header("content-type") else {
            if operation.empty_response {
                return Ok(Value::Null);
            }
            return Err(OpenApiError::MissingContentType(
                operation.operation_string.clone(),
            ));
        };

        let actual = media_type(content_type);
        if let Some(expected) = operation.response_content_type.as_deref().map(media_type) {
            if !actual.contains(expected) && !expected.contains(actual) {
                return Err(OpenApiError::ContentTypeMismatch {
                    operation: operation.operation_string.clone(),
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                });
            }
        }

        if !actual.contains("json") {
            return Ok(Value::String(response.body.clone()));
        }
        if operation.empty_response && response.body.trim().is_empty() {
            return Ok(Value::Null);
        }

        let raw: Value =
            serde_json::from_str(&response.body).map_err(|source| OpenApiError::ResponseParse {
                operation: operation.operation_string.clone(),
                source,
            })?;
        let mut data = self.shape_response(operation.response_def, &raw);

        if let Some(limit) = limit {
            if limit < 0 {
                return Err(OpenApiError::NegativeLimit(limit));
            }
            if let Value::Array(items) = &mut data {
                items.truncate(limit as usize);
            }
        }

        record.response_body = Some(raw);
        Ok(data)
    }

    /// Sanitize a response for the output types of `def`: keys become field
    /// names, enum values become enum item names, and objects without
    /// declared properties become JSON text.
    pub(crate) fn shape_response(&self, def: DefId, value: &Value) -> Value {
        let registry = &self.registry;
        let def = registry.def(def);

        match (def.kind, value) {
            (DefKind::Object, Value::Object(map)) => {
                let properties = def.properties();
                let shaped: Map<String, Value> = map
                    .iter()
                    .map(|(key, child)| {
                        let child = match properties.and_then(|p| p.get(key)) {
                            Some(child_def) => self.shape_response(*child_def, child),
                            None => child.clone(),
                        };
                        (registry.field_name(key), child)
                    })
                    .collect();
                Value::Object(shaped)
            }
            (DefKind::Array, Value::Array(items)) => match def.sub_definitions {
                crate::definition::SubDefinitions::Array(item) => {
                    Value::Array(items.iter().map(|i| self.shape_response(item, i)).collect())
                }
                _ => value.clone(),
            },
            (DefKind::Union, Value::Object(map)) => {
                let member = match &def.sub_definitions {
                    crate::definition::SubDefinitions::Union(members) => {
                        registry.select_union_member(members, map, false)
                    }
                    _ => None,
                };
                match member {
                    Some(member) => self.shape_response(member, value),
                    None => value.clone(),
                }
            }
            (DefKind::Enum, Value::String(s)) => Value::String(sanitize(s, CaseStyle::AllCaps)),
            (DefKind::Enum, Value::Number(_) | Value::Bool(_)) => {
                Value::String(sanitize(&value.to_string(), CaseStyle::AllCaps))
            }
            (DefKind::Json, Value::Object(_)) => Value::String(value.to_string()),
            _ => value.clone(),
        }
    }

    /// Turn an argument value back into what the API expects: original
    /// field names and raw enum values.
    pub(crate) fn to_request_value(&self, def: DefId, value: &Value) -> Value {
        let registry = &self.registry;
        let def = registry.def(def);

        match (def.kind, value) {
            (DefKind::Object, Value::Object(map)) => {
                let properties = def.properties();
                let raw: Map<String, Value> = map
                    .iter()
                    .map(|(key, child)| {
                        let property = properties.and_then(|props| {
                            props.iter().find(|(original, _)| registry.field_name(original) == *key)
                        });
                        match property {
                            Some((original, child_def)) => {
                                (original.clone(), self.to_request_value(*child_def, child))
                            }
                            None => (
                                registry.name_map().original(key).unwrap_or(key).to_string(),
                                child.clone(),
                            ),
                        }
                    })
                    .collect();
                Value::Object(raw)
            }
            (DefKind::Array, Value::Array(items)) => match def.sub_definitions {
                crate::definition::SubDefinitions::Array(item) => {
                    Value::Array(items.iter().map(|i| self.to_request_value(item, i)).collect())
                }
                _ => value.clone(),
            },
            (DefKind::Enum, Value::String(name)) => def
                .enum_values
                .iter()
                .find(|raw| enum_item_name(raw) == *name)
                .cloned()
                .unwrap_or_else(|| value.clone()),
            (DefKind::Json, _) => registry.name_map().desanitize(value),
            _ => value.clone(),
        }
    }
}

/// GraphQL enum item name of a raw enum value.
pub(crate) fn enum_item_name(raw: &Value) -> String {
    match raw {
        Value::String(s) => sanitize(s, CaseStyle::AllCaps),
        other => sanitize(&other.to_string(), CaseStyle::AllCaps),
    }
}

/// A link may name a parameter plainly or qualified by its location, as in
/// `path.id`.
fn link_target_parameter<'a>(
    operation: &'a Operation,
    name: &str,
) -> Option<&'a crate::types::ApiParameter> {
    operation.parameter_by_original_name(name).or_else(|| {
        let (location, name) = name.split_once('.')?;
        operation
            .parameters
            .iter()
            .find(|p| p.original_name == name && p.location.to_string() == location)
    })
}

fn param_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(param_string).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

fn form_encode(value: &Value) -> String {
    let Value::Object(map) = value else {
        return param_string(value);
    };
    map.iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                urlencoding::encode(k),
                urlencoding::encode(&param_string(v))
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Media type without parameters, e.g. `application/json` for
/// `application/json; charset=utf-8`.
fn media_type(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or_default().trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::http::mock::MockHttpClient;
    use crate::preprocessor::preprocess;
    use crate::state::CallContext;
    use oasgraph_core::Options;
    use serde_json::json;

    const ITEMS: &str = r##"
openapi: 3.0.0
info:
  title: Items
  version: 1.0.0
servers:
  - url: http://api.test
paths:
  /items:
    get:
      operationId: listItems
      parameters:
        - name: status
          in: query
          schema:
            type: string
            enum: [in-stock, sold out]
        - name: page-size
          in: query
          schema:
            type: integer
            default: 20
      responses:
        '200':
          description: ok
          content:
            application/json:
              schema:
                type: array
                items:
                  $ref: '#/components/schemas/Item'
    post:
      operationId: createItem
      requestBody:
        required: true
        content:
          application/json:
            schema:
              $ref: '#/components/schemas/Item'
      responses:
        '201':
          description: created
          content:
            application/json:
              schema:
                $ref: '#/components/schemas/Item'
  /items/{id}:
    get:
      operationId: getItem
      parameters:
        - name: id
          in: path
          required: true
          schema:
            type: string
        - name: X-Trace
          in: header
          schema:
            type: string
        - name: session
          in: cookie
          schema:
            type: string
      responses:
        '200':
          description: ok
          content:
            application/json:
              schema:
                $ref: '#/components/schemas/Item'
  /items/{id}/owner:
    get:
      operationId: getOwner
      parameters:
        - name: id
          in: path
          required: true
          schema:
            type: string
      responses:
        '200':
          description: ok
          content:
            application/json:
              schema:
                type: object
                properties:
                  owner:
                    type: string
  /items/{id}/label:
    get:
      operationId: getLabel
      parameters:
        - name: id
          in: path
          required: true
          schema:
            type: string
      responses:
        '200':
          description: ok
          content:
            text/plain:
              schema:
                type: string
components:
  schemas:
    Item:
      type: object
      properties:
        id:
          type: string
        item_name:
          type: string
        state:
          type: string
          enum: [in-stock, sold out]
        extra:
          type: object
          additionalProperties: true
"##;

    fn setup(client: MockHttpClient, options: Options) -> (Arc<Registry>, Arc<MockHttpClient>) {
        let doc = Document::from_str(ITEMS).unwrap();
        let registry = Arc::new(preprocess(&[doc], &options).unwrap());
        (registry, Arc::new(client))
    }

    fn resolver(registry: &Arc<Registry>, client: &Arc<MockHttpClient>, id: &str) -> Resolver {
        Resolver::new(registry.clone(), client.clone(), id).unwrap()
    }

    fn call(args: Value, path: &[&str]) -> ResolverCall<'static> {
        ResolverCall {
            args: args
                .as_object()
                .map(|m| m.clone().into_iter().collect())
                .unwrap_or_default(),
            path: path.iter().map(|s| s.to_string()).collect(),
            ..ResolverCall::default()
        }
    }

    #[tokio::test]
    async fn test_builds_path_header_and_cookie() {
        let client = MockHttpClient::new().json("GET", "/items/a%20b", json!({"id": "a b"}));
        let (registry, client) = setup(client, Options::default());

        resolver(&registry, &client, "getItem")
            .resolve(call(json!({"id": "a b", "xTrace": "t1", "session": "s1"}), &["item"]))
            .await
            .unwrap();

        let request = &client.requests()[0];
        assert_eq!(request.url, "http://api.test/items/a%20b");
        assert_eq!(request.header("X-Trace"), Some("t1"));
        assert_eq!(request.header("Cookie"), Some("session=s1"));
    }

    #[tokio::test]
    async fn test_missing_required_parameter() {
        let (registry, client) = setup(MockHttpClient::new(), Options::default());
        let err = resolver(&registry, &client, "getItem")
            .resolve(call(json!({}), &["item"]))
            .await
            .unwrap_err();
        assert!(matches!(err, OpenApiError::MissingParameter(name) if name == "id"));
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_defaults_enums_and_response_shaping() {
        let client = MockHttpClient::new().json(
            "GET",
            "/items",
            json!([
                {"id": "1", "item_name": "one", "state": "sold out", "extra": {"a": 1}},
                {"id": "2", "item_name": "two", "state": "in-stock"}
            ]),
        );
        let (registry, client) = setup(client, Options::default());

        let resolved = resolver(&registry, &client, "listItems")
            .resolve(call(json!({"status": "SOLD_OUT"}), &["items"]))
            .await
            .unwrap();

        let request = &client.requests()[0];
        assert_eq!(request.query_param("status"), Some("sold out"));
        assert_eq!(request.query_param("page-size"), Some("20"));

        assert_eq!(resolved.data[0]["itemName"], json!("one"));
        assert_eq!(resolved.data[0]["state"], json!("SOLD_OUT"));
        assert_eq!(resolved.data[0]["extra"], json!("{\"a\":1}"));
        assert_eq!(resolved.data[1]["state"], json!("IN_STOCK"));

        let record = resolved.context.record("items").unwrap();
        assert_eq!(record.status_code, 200);
        assert_eq!(record.response_body.as_ref().unwrap()[0]["item_name"], json!("one"));
    }

    #[tokio::test]
    async fn test_limit() {
        let items: Vec<Value> = (1..=5).map(|i| json!({"id": i.to_string()})).collect();
        let client = MockHttpClient::new().json("GET", "/items", Value::Array(items));
        let (registry, client) = setup(client, Options::default());

        let mut limited = call(json!({}), &["items"]);
        limited.limit = Some(2);
        let resolved = resolver(&registry, &client, "listItems")
            .resolve(limited)
            .await
            .unwrap();
        assert_eq!(resolved.data.as_array().unwrap().len(), 2);
        assert_eq!(resolved.data[1]["id"], json!("2"));

        let mut negative = call(json!({}), &["items"]);
        negative.limit = Some(-1);
        let err = resolver(&registry, &client, "listItems")
            .resolve(negative)
            .await
            .unwrap_err();
        assert!(matches!(err, OpenApiError::NegativeLimit(-1)));
    }

    #[tokio::test]
    async fn test_payload_is_desanitized() {
        let client = MockHttpClient::new().route(
            "POST",
            "/items",
            201,
            Some("application/json"),
            r#"{"id": "9", "item_name": "new"}"#,
        );
        let (registry, client) = setup(client, Options::default());

        let resolved = resolver(&registry, &client, "createItem")
            .resolve(call(
                json!({"itemInput": {"itemName": "new", "state": "IN_STOCK"}}),
                &["createItem"],
            ))
            .await
            .unwrap();

        let request = &client.requests()[0];
        let body: Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"item_name": "new", "state": "in-stock"}));
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(resolved.data["itemName"], json!("new"));
    }

    #[tokio::test]
    async fn test_link_arguments_from_parent_call() {
        let client = MockHttpClient::new()
            .json("GET", "/items/5", json!({"id": "5", "item_name": "five"}))
            .json("GET", "/items/5/owner", json!({"owner": "ann"}));
        let (registry, client) = setup(client, Options::default());

        let parent = resolver(&registry, &client, "getItem")
            .resolve(call(json!({"id": "5"}), &["item"]))
            .await
            .unwrap();

        let mut bindings = IndexMap::new();
        bindings.insert("id".to_string(), json!("$request.path.id"));
        let owner = resolver(&registry, &client, "getOwner")
            .with_link_parameters(bindings)
            .resolve(ResolverCall {
                parent: Some(&parent),
                path: vec!["item".to_string(), "owner".to_string()],
                ..ResolverCall::default()
            })
            .await
            .unwrap();

        assert_eq!(owner.data, json!({"owner": "ann"}));
        assert_eq!(client.requests()[1].url, "http://api.test/items/5/owner");
        assert!(owner.context.record("item").is_some());
        assert!(owner.context.record("item.owner").is_some());
    }

    #[tokio::test]
    async fn test_invalid_link_expression_fails_the_call() {
        let (registry, client) = setup(MockHttpClient::new(), Options::default());
        let parent = ResolvedValue::new(json!({"id": "5"}), CallContext::new());

        let mut bindings = IndexMap::new();
        bindings.insert("id".to_string(), json!("$bogus"));
        let err = resolver(&registry, &client, "getOwner")
            .with_link_parameters(bindings)
            .resolve(ResolverCall {
                parent: Some(&parent),
                path: vec!["item".to_string(), "owner".to_string()],
                ..ResolverCall::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, OpenApiError::RuntimeExpression(_)));
    }

    #[tokio::test]
    async fn test_error_status_carries_details() {
        let client = MockHttpClient::new().route(
            "GET",
            "/items/1",
            404,
            Some("application/json"),
            r#"{"message": "not found"}"#,
        );
        let (registry, client) = setup(client, Options::default());

        let err = resolver(&registry, &client, "getItem")
            .resolve(call(json!({"id": "1"}), &["item"]))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("GET /items/{id}"));
        let details = err.http_details().unwrap();
        assert_eq!(details.status_code, 404);
        assert_eq!(details.response_body, json!({"message": "not found"}));
    }

    #[tokio::test]
    async fn test_content_type_checks() {
        let client = MockHttpClient::new()
            .route("GET", "/items/1", 200, None, "{}")
            .route("GET", "/items/2", 200, Some("text/html"), "<p/>")
            .route("GET", "/items/3", 200, Some("application/json; charset=utf-8"), "{not json")
            .route("GET", "/items/4/label", 200, Some("text/plain; charset=utf-8"), "label");
        let (registry, client) = setup(client, Options::default());
        let get = resolver(&registry, &client, "getItem");

        let missing = get.resolve(call(json!({"id": "1"}), &["item"])).await.unwrap_err();
        assert!(matches!(missing, OpenApiError::MissingContentType(_)));

        let mismatch = get.resolve(call(json!({"id": "2"}), &["item"])).await.unwrap_err();
        assert!(matches!(mismatch, OpenApiError::ContentTypeMismatch { .. }));

        let parse = get.resolve(call(json!({"id": "3"}), &["item"])).await.unwrap_err();
        assert!(matches!(parse, OpenApiError::ResponseParse { .. }));

        let label = resolver(&registry, &client, "getLabel")
            .resolve(call(json!({"id": "4"}), &["label"]))
            .await
            .unwrap();
        assert_eq!(label.data, json!("label"));
    }

    #[tokio::test]
    async fn test_static_headers_and_base_url() {
        let client = MockHttpClient::new().json("GET", "/items/1", json!({}));
        let mut options = Options {
            base_url: Some("http://override.test/".to_string()),
            ..Options::default()
        };
        options.headers.insert("X-Client".to_string(), "oasgraph".to_string());
        options.query_params.insert("key".to_string(), "k".to_string());
        let (registry, client) = setup(client, options);

        resolver(&registry, &client, "getItem")
            .resolve(call(json!({"id": "1"}), &["item"]))
            .await
            .unwrap();

        let request = &client.requests()[0];
        assert_eq!(request.url, "http://override.test/items/1");
        assert_eq!(request.header("x-client"), Some("oasgraph"));
        assert_eq!(request.query_param("key"), Some("k"));
    }

    struct Fixed;

    #[async_trait]
    impl CustomResolver for Fixed {
        async fn resolve(
            &self,
            _operation: &Operation,
            _parent: Option<&Value>,
            args: &IndexMap<String, Value>,
        ) -> Result<Value> {
            Ok(json!({"id": args["id"], "itemName": "custom"}))
        }
    }

    #[tokio::test]
    async fn test_custom_resolver_skips_http() {
        let (registry, client) = setup(MockHttpClient::new(), Options::default());
        let resolved = resolver(&registry, &client, "getItem")
            .with_custom(Some(Arc::new(Fixed)))
            .resolve(call(json!({"id": "7"}), &["item"]))
            .await
            .unwrap();

        assert_eq!(resolved.data["itemName"], json!("custom"));
        assert!(client.requests().is_empty());
    }
}
