//! # oasgraph OpenAPI translator
//!
//! Turns OpenAPI 3 documents into an executable GraphQL schema whose
//! resolvers call the described REST endpoints.
//!
//! ## Features
//!
//! - Parse OpenAPI 3.x documents (JSON and YAML), several at once
//! - One GraphQL type per distinct schema, with cycles, `allOf`, `anyOf`
//!   and `oneOf` support
//! - Query fields for GET operations, mutation fields for everything else
//! - Response links become fields that chain REST calls
//! - API key and HTTP basic authentication, through viewer fields or
//!   credentials supplied with the request
//! - Per-operation custom resolvers
//!
//! ## Example
//!
//! ```no_run
//! use oasgraph_openapi::{OpenApiGraph, Options};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let options = Options {
//!     add_limit_argument: true,
//!     ..Options::default()
//! };
//! let (schema, report) = OpenApiGraph::from_file("./api/openapi.yaml")?
//!     .with_options(options)
//!     .build()?;
//!
//! println!("{}", schema.sdl());
//! println!("{} operations, {} warnings", report.num_ops, report.warnings.len());
//! # Ok(())
//! # }
//! ```

mod auth;
mod definition;
mod document;
mod error;
mod expression;
mod fields;
mod graph;
mod http;
mod naming;
mod preprocessor;
mod registry;
mod resolver;
mod schema;
mod state;
mod types;
mod viewer;

pub use async_graphql::dynamic::Schema;
pub use auth::{AuthState, Credentials};
pub use definition::{DataDefinition, DefId, DefKind, ScalarKind, SubDefinitions};
pub use document::Document;
pub use error::{HttpErrorDetails, OpenApiError, Result};
pub use expression::{Binding, RuntimeExpression};
pub use fields::{JSON_SCALAR, LIMIT_ARGUMENT};
pub use graph::OpenApiGraph;
pub use http::{HttpClient, HttpRequest, HttpResponse, ReqwestClient};
pub use naming::{CaseStyle, sanitize};
pub use oasgraph_core::{OperationType, Options};
pub use preprocessor::preprocess;
pub use registry::{Registry, Report, Warning, WarningKind};
pub use resolver::{CustomResolver, Resolver, ResolverCall};
pub use state::{CallContext, CallRecord, ResolvedValue};
pub use types::{ApiParameter, LinkDef, LinkTarget, Operation, ParameterLocation};
