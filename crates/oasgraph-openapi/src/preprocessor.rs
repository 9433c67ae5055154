//! API document preprocessing.
//!
//! Walks every path and HTTP method of the input documents, extracts the
//! canonical [`Operation`]s and seeds the definition registry through the
//! type builder.

use crate::document::{Document, to_schema_value};
use crate::error::Result;
use crate::naming::{CaseStyle, infer_resource_name_from_path, sanitize};
use crate::registry::{Registry, WarningKind};
use crate::schema::{NameHints, TypeBuilder};
use crate::types::{
    ApiKeyLocation, ApiParameter, LinkDef, LinkTarget, Operation, ParameterLocation,
    SecuritySchemeInfo, SecuritySchemeKind,
};
use indexmap::IndexMap;
use oasgraph_core::{OperationType, Options};
use openapiv3::{
    APIKeyLocation, LinkOperation, MediaType, Parameter, ParameterSchemaOrContent, PathItem,
    ReferenceOr, Response, SecurityScheme, Server, StatusCode,
};
use serde_json::{Value, json};
use tracing::{debug, info};

const JSON_CONTENT_TYPE: &str = "application/json";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Build the registry for a set of documents.
///
/// Security schemes of all documents are extracted first so that every
/// operation sees the complete set.
pub fn preprocess(documents: &[Document], options: &Options) -> Result<Registry> {
    let mut registry = Registry::new(options.clone());

    for (index, document) in documents.iter().enumerate() {
        extract_security_schemes(&mut registry, document, index)?;
    }

    for (index, document) in documents.iter().enumerate() {
        DocumentWalker {
            registry: &mut registry,
            document,
            index,
        }
        .walk()?;
    }

    let report = &registry.report;
    info!(
        "Preprocessed {} operations ({} queries, {} mutations, {} dropped)",
        report.num_ops, report.num_ops_query, report.num_ops_mutation, report.num_ops_dropped
    );
    Ok(registry)
}

fn extract_security_schemes(
    registry: &mut Registry,
    document: &Document,
    index: usize,
) -> Result<()> {
    let Some(components) = &document.spec().components else {
        return Ok(());
    };

    for (raw_name, scheme) in &components.security_schemes {
        if registry.security_schemes.contains_key(raw_name) {
            registry.warn(
                WarningKind::DuplicateSecurityScheme,
                format!("Multiple security schemes are named '{}'", raw_name),
                "Keep the first security scheme",
            )?;
            continue;
        }

        let scheme: SecurityScheme = document.resolve(scheme)?;
        let (kind, description, credential_schema) = match scheme {
            SecurityScheme::APIKey {
                location,
                name,
                description,
                ..
            } => {
                let location = match location {
                    APIKeyLocation::Header => ApiKeyLocation::Header,
                    APIKeyLocation::Query => ApiKeyLocation::Query,
                    APIKeyLocation::Cookie => ApiKeyLocation::Cookie,
                };
                (
                    SecuritySchemeKind::ApiKey { name, location },
                    description,
                    Some(json!({
                        "type": "object",
                        "required": ["apiKey"],
                        "properties": {"apiKey": {"type": "string"}}
                    })),
                )
            }
            SecurityScheme::HTTP {
                scheme,
                description,
                ..
            } if scheme.eq_ignore_ascii_case("basic") => (
                SecuritySchemeKind::HttpBasic,
                description,
                Some(json!({
                    "type": "object",
                    "required": ["username", "password"],
                    "properties": {
                        "username": {"type": "string"},
                        "password": {"type": "string"}
                    }
                })),
            ),
            SecurityScheme::HTTP {
                scheme,
                description,
                ..
            } => {
                registry.warn(
                    WarningKind::UnsupportedSecurityScheme,
                    format!(
                        "Security scheme '{}' uses unsupported HTTP scheme '{}'",
                        raw_name, scheme
                    ),
                    "Ignore security scheme",
                )?;
                (SecuritySchemeKind::Http { scheme }, description, None)
            }
            SecurityScheme::OpenIDConnect { description, .. } => {
                registry.warn(
                    WarningKind::UnsupportedSecurityScheme,
                    format!("OpenID Connect security scheme '{}' is not supported", raw_name),
                    "Ignore security scheme",
                )?;
                (SecuritySchemeKind::OpenIdConnect, description, None)
            }
            SecurityScheme::OAuth2 { description, .. } => {
                registry.warn(
                    WarningKind::OAuthSecurityScheme,
                    format!("OAuth2 security scheme '{}' is handled externally", raw_name),
                    "Pass the token through the static headers",
                )?;
                (SecuritySchemeKind::OAuth2, description, None)
            }
        };

        let credential_def = match credential_schema {
            Some(schema) => Some(TypeBuilder::new(registry, document, index).get_or_create_def(
                NameHints {
                    preferred: Some(format!("{}Credentials", raw_name)),
                    ..NameHints::default()
                },
                &schema,
                true,
                IndexMap::new(),
            )?),
            None => None,
        };

        debug!("Registered security scheme '{}' as {:?}", raw_name, kind);
        registry.security_schemes.insert(
            raw_name.clone(),
            SecuritySchemeInfo {
                raw_name: raw_name.clone(),
                kind,
                description,
                credential_def,
                document: index,
            },
        );
    }
    Ok(())
}

struct DocumentWalker<'a> {
    registry: &'a mut Registry,
    document: &'a Document,
    index: usize,
}

impl DocumentWalker<'_> {
    fn walk(&mut self) -> Result<()> {
        let document = self.document;

        for (path, item) in &document.spec().paths.paths {
            let path_item: PathItem = document.resolve(item)?;

            let methods = [
                ("get", &path_item.get),
                ("put", &path_item.put),
                ("post", &path_item.post),
                ("patch", &path_item.patch),
                ("delete", &path_item.delete),
                ("options", &path_item.options),
                ("head", &path_item.head),
            ];

            for (method, operation) in methods {
                if let Some(operation) = operation {
                    self.registry.report.num_ops += 1;
                    self.process_operation(path, method, &path_item, operation)?;
                }
            }
        }
        Ok(())
    }

    fn process_operation(
        &mut self,
        path: &str,
        method: &str,
        path_item: &PathItem,
        operation: &openapiv3::Operation,
    ) -> Result<()> {
        let operation_string = format!("{} {}", method.to_uppercase(), path);
        let title = self.document.title().to_string();

        let operation_type = match self.registry.options.operation_type_override(&title, path, method) {
            Some(operation_type) => operation_type,
            None if method == "get" => OperationType::Query,
            None => OperationType::Mutation,
        };
        if operation_type == OperationType::Subscription {
            self.registry.warn(
                WarningKind::SubscriptionSkipped,
                format!("Operation {} is configured as a subscription", operation_string),
                "Skip operation",
            )?;
            self.registry.report.num_ops_dropped += 1;
            return Ok(());
        }

        let mut description = operation
            .description
            .clone()
            .or_else(|| operation.summary.clone())
            .unwrap_or_else(|| "No description available.".to_string());
        if self.registry.options.equivalent_to_messages {
            description.push_str(&format!("\n\nEquivalent to {}", operation_string));
        }

        let operation_id = operation
            .operation_id
            .clone()
            .unwrap_or_else(|| sanitize(&format!("{} {}", method, path), CaseStyle::CamelCase));

        if self.registry.operations.contains_key(&operation_id) {
            self.registry.warn(
                WarningKind::DuplicateOperationId,
                format!(
                    "Operation id '{}' of {} is already in use",
                    operation_id, operation_string
                ),
                "Keep the first operation",
            )?;
            self.registry.report.num_ops_dropped += 1;
            return Ok(());
        }

        let resource_name = infer_resource_name_from_path(path);

        // Response first: an operation without one is dropped before any
        // of its other types are registered.
        let Some((status_code, response)) = self.success_response(operation, &operation_string)? else {
            return self.drop_operation(operation_string);
        };
        let links = self.links(&response, &operation_string)?;
        let (response_content_type, response_schema) = match pick_media_type(&response.content, false) {
            Some((content_type, media)) if content_type.contains("json") => (
                Some(content_type.to_string()),
                media.schema.as_ref().map(to_schema_value).transpose()?,
            ),
            Some((content_type, _)) => {
                info!(
                    "Response of content-type '{}' is returned as a string",
                    content_type
                );
                (
                    Some(content_type.to_string()),
                    Some(opaque_string_schema("response", content_type)),
                )
            }
            None => (None, None),
        };

        let (response_schema, empty_response) = match response_schema {
            Some(schema) => (schema, false),
            None if self.registry.options.fill_empty_responses => (placeholder_schema(), true),
            None => return self.drop_operation(operation_string),
        };

        let response_def = TypeBuilder::new(self.registry, self.document, self.index).get_or_create_def(
            NameHints::from_path(resource_name.clone()),
            &response_schema,
            false,
            links,
        )?;

        let (payload_def, payload_content_type, payload_required) =
            self.payload(operation, &resource_name)?;
        let parameters = self.parameters(path_item, operation, &operation_id, &operation_string)?;
        let security_requirements = self.security_requirements(operation);
        let requires_viewer = self.registry.options.viewer
            && security_requirements.iter().any(|name| {
                self.registry
                    .security_schemes
                    .get(name)
                    .is_some_and(SecuritySchemeInfo::is_supported)
            });
        let servers = self.servers(path_item, operation);


        match operation_type {
            OperationType::Query => self.registry.report.num_ops_query += 1,
            _ => self.registry.report.num_ops_mutation += 1,
        }

        debug!(
            "Preprocessed {} as {} '{}' ({} parameters)",
            operation_string,
            operation_type,
            operation_id,
            parameters.len()
        );

        self.registry.operations.insert(
            operation_id.clone(),
            Operation {
                operation_id,
                operation_string,
                description,
                path: path.to_string(),
                method: method.to_uppercase(),
                payload_def,
                payload_content_type,
                payload_required,
                response_def,
                response_content_type,
                status_code,
                empty_response,
                parameters,
                security_requirements,
                servers,
                operation_type,
                requires_viewer,
                document: self.index,
                document_title: title,
                tags: operation.tags.clone(),
            },
        );
        Ok(())
    }

    fn drop_operation(&mut self, operation_string: String) -> Result<()> {
        self.registry.warn(
            WarningKind::MissingResponseSchema,
            format!("Operation {} has no usable response schema", operation_string),
            "Ignore operation",
        )?;
        self.registry.report.num_ops_dropped += 1;
        Ok(())
    }

    /// The first 2xx response. With empty responses filled, an operation
    /// without any 2xx response gets an empty one.
    fn success_response(
        &mut self,
        operation: &openapiv3::Operation,
        operation_string: &str,
    ) -> Result<Option<(String, Response)>> {
        let successes: Vec<(String, &ReferenceOr<Response>)> = operation
            .responses
            .responses
            .iter()
            .filter_map(|(code, response)| match code {
                StatusCode::Code(c) if (200..300).contains(c) => Some((c.to_string(), response)),
                StatusCode::Range(2) => Some(("2XX".to_string(), response)),
                _ => None,
            })
            .collect();

        if successes.len() > 1 {
            self.registry.warn(
                WarningKind::MultipleResponses,
                format!(
                    "Operation {} has multiple success responses ({})",
                    operation_string,
                    successes
                        .iter()
                        .map(|(code, _)| code.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                format!("Use the response for status code {}", successes[0].0),
            )?;
        }

        match successes.into_iter().next() {
            Some((code, response)) => Ok(Some((code, self.document.resolve(response)?))),
            None if self.registry.options.fill_empty_responses => {
                let empty: Response = serde_json::from_value(json!({"description": ""}))?;
                Ok(Some(("200".to_string(), empty)))
            }
            None => Ok(None),
        }
    }

    fn links(
        &mut self,
        response: &Response,
        operation_string: &str,
    ) -> Result<IndexMap<String, LinkDef>> {
        let mut links = IndexMap::new();

        for (name, link) in &response.links {
            let link: openapiv3::Link = match self.document.resolve(link) {
                Ok(link) => link,
                Err(e) => {
                    self.registry.warn(
                        WarningKind::InvalidLink,
                        format!("Link '{}' of {} cannot be resolved: {}", name, operation_string, e),
                        "Ignore link",
                    )?;
                    continue;
                }
            };

            let target = match link.operation {
                LinkOperation::OperationId(id) => LinkTarget::OperationId(id),
                LinkOperation::OperationRef(reference) => LinkTarget::OperationRef(reference),
            };

            let key = self.registry.store_field_name(name);
            links.insert(
                key,
                LinkDef {
                    name: name.clone(),
                    target,
                    parameters: link.parameters.into_iter().collect(),
                    description: link.description,
                    document: self.index,
                },
            );
        }
        Ok(links)
    }

    fn payload(
        &mut self,
        operation: &openapiv3::Operation,
        resource_name: &str,
    ) -> Result<(Option<usize>, Option<String>, bool)> {
        let Some(request_body) = &operation.request_body else {
            return Ok((None, None, false));
        };
        let request_body: openapiv3::RequestBody = self.document.resolve(request_body)?;

        let Some((content_type, media)) = pick_media_type(&request_body.content, true) else {
            return Ok((None, None, false));
        };

        let schema = if is_structured(content_type) {
            match &media.schema {
                Some(schema) => to_schema_value(schema)?,
                None => return Ok((None, None, false)),
            }
        } else {
            info!(
                "Request body of content-type '{}' is passed through as a string",
                content_type
            );
            opaque_string_schema("payload", content_type)
        };

        let def = TypeBuilder::new(self.registry, self.document, self.index).get_or_create_def(
            NameHints::from_path(resource_name),
            &schema,
            true,
            IndexMap::new(),
        )?;
        Ok((Some(def), Some(content_type.to_string()), request_body.required))
    }

    fn parameters(
        &mut self,
        path_item: &PathItem,
        operation: &openapiv3::Operation,
        operation_id: &str,
        operation_string: &str,
    ) -> Result<Vec<ApiParameter>> {
        let mut merged: IndexMap<String, Parameter> = IndexMap::new();
        for parameter in path_item.parameters.iter().chain(&operation.parameters) {
            let parameter: Parameter = self.document.resolve(parameter)?;
            merged.insert(parameter.parameter_data_ref().name.clone(), parameter);
        }

        let mut parameters = Vec::with_capacity(merged.len());
        for (original_name, parameter) in merged {
            if original_name.is_empty() {
                self.registry.warn(
                    WarningKind::InvalidParameter,
                    format!("Operation {} has a parameter without a name", operation_string),
                    "Ignore parameter",
                )?;
                continue;
            }

            let location = match &parameter {
                Parameter::Query { .. } => ParameterLocation::Query,
                Parameter::Header { .. } => ParameterLocation::Header,
                Parameter::Path { .. } => ParameterLocation::Path,
                Parameter::Cookie { .. } => ParameterLocation::Cookie,
            };
            let data = parameter.parameter_data_ref();

            let raw_schema = match &data.format {
                ParameterSchemaOrContent::Schema(schema) => to_schema_value(schema)?,
                ParameterSchemaOrContent::Content(content) => {
                    match pick_media_type(content, false).and_then(|(_, m)| m.schema.as_ref()) {
                        Some(schema) => to_schema_value(schema)?,
                        None => json!({"type": "string"}),
                    }
                }
            };
            let (schema, _) = self.document.deref_schema(&raw_schema)?;

            let def = TypeBuilder::new(self.registry, self.document, self.index).get_or_create_def(
                NameHints::from_path(format!("{} {}", operation_id, original_name)),
                &raw_schema,
                true,
                IndexMap::new(),
            )?;

            parameters.push(ApiParameter {
                name: self.registry.store_field_name(&original_name),
                original_name,
                location,
                required: data.required || location == ParameterLocation::Path,
                default: schema.get("default").cloned(),
                description: data.description.clone(),
                schema,
                def,
            });
        }
        Ok(parameters)
    }

    /// Global and operation requirements, without OAuth2 schemes.
    fn security_requirements(&self, operation: &openapiv3::Operation) -> Vec<String> {
        let global = self.document.spec().security.iter().flatten();
        let local = operation.security.iter().flatten();

        let mut names: Vec<String> = Vec::new();
        for requirement in global.chain(local) {
            for name in requirement.keys() {
                match self.registry.security_schemes.get(name) {
                    Some(scheme) if scheme.kind == SecuritySchemeKind::OAuth2 => {
                        debug!("Security scheme '{}' is handled externally", name);
                    }
                    Some(_) if !names.contains(name) => names.push(name.clone()),
                    Some(_) => {}
                    None => debug!("Ignoring undefined security scheme '{}'", name),
                }
            }
        }
        names
    }

    /// Candidate server URLs: operation, then path item, then document,
    /// then `/`.
    fn servers(&self, path_item: &PathItem, operation: &openapiv3::Operation) -> Vec<String> {
        let servers = [
            &operation.servers,
            &path_item.servers,
            &self.document.spec().servers,
        ]
        .into_iter()
        .find(|servers| !servers.is_empty());

        match servers {
            Some(servers) => servers.iter().map(server_url).collect(),
            None => vec!["/".to_string()],
        }
    }
}

/// Server URL with variables replaced by their defaults.
fn server_url(server: &Server) -> String {
    let mut url = server.url.clone();
    for (name, variable) in server.variables.iter().flatten() {
        url = url.replace(&format!("{{{}}}", name), &variable.default);
    }
    url
}

/// Prefer JSON, then other structured content when allowed, then anything.
fn pick_media_type(
    content: &IndexMap<String, MediaType>,
    allow_form: bool,
) -> Option<(&str, &MediaType)> {
    content
        .get_key_value(JSON_CONTENT_TYPE)
        .or_else(|| content.iter().find(|(ct, _)| ct.contains("json")))
        .or_else(|| {
            allow_form
                .then(|| content.get_key_value(FORM_CONTENT_TYPE))
                .flatten()
        })
        .or_else(|| content.iter().next())
        .map(|(ct, media)| (ct.as_str(), media))
}

fn is_structured(content_type: &str) -> bool {
    content_type.contains("json") || content_type.starts_with(FORM_CONTENT_TYPE)
}

/// Bodies that are not parsed are exposed as their raw text.
fn opaque_string_schema(role: &str, content_type: &str) -> Value {
    json!({
        "type": "string",
        "description": format!("String represents a {} of content-type '{}'", role, content_type)
    })
}

fn placeholder_schema() -> Value {
    json!({
        "type": "string",
        "description": "Placeholder for an operation without a response schema"
    })
}
