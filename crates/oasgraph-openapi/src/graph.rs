//! Top-level builder turning API documents into an executable schema.

use crate::document::Document;
use crate::error::{OpenApiError, Result};
use crate::fields::{FieldBuilder, operation_field_name, operation_id_field_name};
use crate::http::{HttpClient, ReqwestClient};
use crate::preprocessor::preprocess;
use crate::registry::{Report, WarningKind};
use crate::resolver::{CustomResolver, CustomResolverTable, custom_resolver_key};
use crate::viewer::build_viewers;
use async_graphql::Value as GqlValue;
use async_graphql::dynamic::{Field, FieldFuture, FieldValue, Object, Schema, TypeRef};
use oasgraph_core::{OperationType, Options};
use std::sync::Arc;
use tracing::{debug, info};

const QUERY_TYPE: &str = "Query";
const MUTATION_TYPE: &str = "Mutation";
const PLACEHOLDER_FIELD: &str = "placeholder";

/// Translates one or more API documents into a GraphQL schema whose
/// resolvers call the described REST endpoints.
///
/// # Example
///
/// ```no_run
/// use oasgraph_openapi::{AuthState, Credentials, OpenApiGraph};
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let (schema, report) = OpenApiGraph::from_file("./api/openapi.yaml")?.build()?;
/// println!("{} warnings", report.warnings.len());
///
/// let request = async_graphql::Request::new("{ users { name } }")
///     .data(AuthState::new().with("apiKeyAuth", Credentials::api_key("secret")));
/// let response = schema.execute(request).await;
/// println!("{}", serde_json::to_string(&response)?);
/// # Ok(())
/// # }
/// ```
pub struct OpenApiGraph {
    documents: Vec<Document>,
    options: Options,
    client: Arc<dyn HttpClient>,
    custom_resolvers: CustomResolverTable,
}

impl OpenApiGraph {
    /// Load an API document from a file.
    ///
    /// Supports both JSON and YAML formats.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use oasgraph_openapi::OpenApiGraph;
    ///
    /// let graph = OpenApiGraph::from_file("./api/openapi.yaml")?;
    /// # Ok::<(), oasgraph_openapi::OpenApiError>(())
    /// ```
    pub fn from_file(path: &str) -> Result<Self> {
        info!("Loading API document from file: {}", path);
        Ok(Self::from_documents(vec![Document::from_file(path)?]))
    }

    /// Load an API document from a URL.
    pub async fn from_url(url: &str) -> Result<Self> {
        info!("Loading API document from URL: {}", url);
        Ok(Self::from_documents(vec![Document::from_url(url).await?]))
    }

    /// Parse an API document from a string.
    ///
    /// Automatically detects JSON or YAML format.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use oasgraph_openapi::OpenApiGraph;
    ///
    /// let spec = r#"
    /// openapi: 3.0.0
    /// info:
    ///   title: Example API
    ///   version: 1.0.0
    /// paths:
    ///   /users:
    ///     get:
    ///       operationId: listUsers
    ///       responses:
    ///         '200':
    ///           description: Success
    ///           content:
    ///             application/json:
    ///               schema:
    ///                 type: array
    ///                 items:
    ///                   type: string
    /// "#;
    ///
    /// let (schema, _report) = OpenApiGraph::from_str(spec)?.build()?;
    /// # Ok::<(), oasgraph_openapi::OpenApiError>(())
    /// ```
    pub fn from_str(content: &str) -> Result<Self> {
        debug!("Parsing API document from string");
        Ok(Self::from_documents(vec![Document::from_str(content)?]))
    }

    /// Translate several documents into one schema.
    pub fn from_documents(documents: Vec<Document>) -> Self {
        Self {
            documents,
            options: Options::default(),
            client: Arc::new(ReqwestClient::new()),
            custom_resolvers: CustomResolverTable::new(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Send REST calls through `client` instead of a default `reqwest` client.
    pub fn with_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.client = client;
        self
    }

    /// Replace the REST call of the operation at (`title`, `path`, `method`).
    pub fn with_custom_resolver(
        mut self,
        title: &str,
        path: &str,
        method: &str,
        resolver: Arc<dyn CustomResolver>,
    ) -> Self {
        self.custom_resolvers
            .insert(custom_resolver_key(title, path, method), resolver);
        self
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Build the schema and the translation report.
    pub fn build(&self) -> Result<(Schema, Report)> {
        info!("Translating {} API document(s)", self.documents.len());
        let registry = Arc::new(preprocess(&self.documents, &self.options)?);
        let mut builder = FieldBuilder::new(
            registry.clone(),
            self.client.clone(),
            self.custom_resolvers.clone(),
        );

        let mut queries = Vec::new();
        let mut mutations = Vec::new();
        for operation in registry.operations().values() {
            if operation.requires_viewer {
                continue;
            }
            let fields = match operation.operation_type {
                OperationType::Query => &mut queries,
                OperationType::Mutation => &mut mutations,
                OperationType::Subscription => continue,
            };

            let mut name = operation_field_name(&registry, operation);
            if contains(fields, &name) {
                name = operation_id_field_name(&registry, operation);
            }
            if contains(fields, &name) {
                builder.warn(
                    WarningKind::DuplicateFieldName,
                    format!("Root field '{}' already exists", name),
                    format!("Ignore operation {}", operation.operation_string),
                )?;
                continue;
            }
            let field = builder.operation_field(&operation.operation_id, &name)?;
            fields.push((name, field));
        }

        let (viewer_queries, viewer_mutations) = build_viewers(&mut builder)?;
        for (fields, viewers) in [(&mut queries, viewer_queries), (&mut mutations, viewer_mutations)] {
            for (name, field) in viewers {
                if contains(fields, &name) {
                    builder.warn(
                        WarningKind::DuplicateFieldName,
                        format!("Viewer field '{}' collides with an operation field", name),
                        "Ignore viewer",
                    )?;
                    continue;
                }
                fields.push((name, field));
            }
        }

        let num_queries = queries.len();
        let num_mutations = mutations.len();

        let mut query = Object::new(QUERY_TYPE);
        if queries.is_empty() {
            debug!("No query fields, adding '{}'", PLACEHOLDER_FIELD);
            query = query.field(placeholder_field());
        }
        for (_, field) in queries {
            query = query.field(field);
        }

        let mut schema = Schema::build(
            QUERY_TYPE,
            (!mutations.is_empty()).then_some(MUTATION_TYPE),
            None,
        )
        .register(query);
        if !mutations.is_empty() {
            let mut mutation = Object::new(MUTATION_TYPE);
            for (_, field) in mutations {
                mutation = mutation.field(field);
            }
            schema = schema.register(mutation);
        }

        let (types, mut report) = builder.finish()?;
        for ty in types {
            schema = schema.register(ty);
        }
        let schema = schema
            .finish()
            .map_err(|e| OpenApiError::SchemaError(e.to_string()))?;

        report.num_queries_created = num_queries;
        report.num_mutations_created = num_mutations;
        info!(
            "Created {} query and {} mutation fields from {} operations ({} warnings)",
            report.num_queries_created,
            report.num_mutations_created,
            report.num_ops,
            report.warnings.len()
        );
        Ok((schema, report))
    }
}

fn contains(fields: &[(String, Field)], name: &str) -> bool {
    fields.iter().any(|(n, _)| n == name)
}

/// Query field keeping a schema valid when no operation is a query.
fn placeholder_field() -> Field {
    Field::new(PLACEHOLDER_FIELD, TypeRef::named_nn(TypeRef::STRING), |_| {
        FieldFuture::new(async {
            Ok(Some(FieldValue::value(GqlValue::from(
                "Placeholder field: the API documents define no queries",
            ))))
        })
    })
    .description("Placeholder field: the API documents define no queries")
}
