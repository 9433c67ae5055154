//! Request signing for operations behind security schemes.
//!
//! Supported methods:
//! - API key (in header, query parameter or cookie)
//! - HTTP basic (Authorization: Basic <base64>)
//!
//! OAuth2 tokens are expected in the static headers. Other HTTP schemes and
//! OpenID Connect cannot sign requests.

use crate::error::{OpenApiError, Result};
use crate::http::HttpRequest;
use crate::types::{ApiKeyLocation, Operation, SecuritySchemeInfo, SecuritySchemeKind};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use indexmap::IndexMap;
use oasgraph_core::CredentialConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Credentials for one security scheme.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    /// API key authentication
    ApiKey {
        /// The API key value
        key: String,
    },

    /// HTTP Basic authentication
    Basic {
        /// Username
        username: String,
        /// Password
        password: String,
    },
}

impl Credentials {
    /// Create API key credentials.
    ///
    /// # Example
    ///
    /// ```
    /// use oasgraph_openapi::Credentials;
    ///
    /// let credentials = Credentials::api_key("my-secret-key");
    /// ```
    pub fn api_key(key: impl Into<String>) -> Self {
        Self::ApiKey { key: key.into() }
    }

    /// Create basic authentication credentials.
    ///
    /// # Example
    ///
    /// ```
    /// use oasgraph_openapi::Credentials;
    ///
    /// let credentials = Credentials::basic("username", "password");
    /// ```
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl From<&CredentialConfig> for Credentials {
    fn from(config: &CredentialConfig) -> Self {
        match config {
            CredentialConfig::ApiKey { key } => Self::api_key(key),
            CredentialConfig::Basic { username, password } => Self::basic(username, password),
        }
    }
}

/// Credentials available to every operation of a GraphQL request, keyed by
/// raw security scheme name. Put it into the request data to authenticate
/// operations outside viewer fields.
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    credentials: IndexMap<String, Credentials>,
}

impl AuthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, scheme: impl Into<String>, credentials: Credentials) -> Self {
        self.credentials.insert(scheme.into(), credentials);
        self
    }

    pub fn from_config(config: &IndexMap<String, CredentialConfig>) -> Self {
        Self {
            credentials: config
                .iter()
                .map(|(scheme, c)| (scheme.clone(), Credentials::from(c)))
                .collect(),
        }
    }

    pub fn get(&self, scheme: &str) -> Option<&Credentials> {
        self.credentials.get(scheme)
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

/// Sign `request` with the first security requirement of `operation` that
/// has credentials, looking in `scoped` before `ambient`.
///
/// Without any matching credentials the call fails, unless `required` is
/// false (credentials are then expected in the static headers). Requirements
/// that only name schemes which cannot sign requests always fail.
pub(crate) fn inject(
    request: &mut HttpRequest,
    operation: &Operation,
    schemes: &IndexMap<String, SecuritySchemeInfo>,
    scoped: &IndexMap<String, Credentials>,
    ambient: Option<&AuthState>,
    required: bool,
) -> Result<()> {
    if operation.security_requirements.is_empty() {
        return Ok(());
    }

    for name in &operation.security_requirements {
        let credentials = scoped
            .get(name)
            .or_else(|| ambient.and_then(|a| a.get(name)));
        let (Some(credentials), Some(scheme)) = (credentials, schemes.get(name)) else {
            continue;
        };

        debug!(
            "Signing {} with security scheme '{}'",
            operation.operation_string, name
        );
        return apply(request, scheme, credentials);
    }

    let signable = operation
        .security_requirements
        .iter()
        .filter_map(|name| schemes.get(name))
        .any(SecuritySchemeInfo::is_supported);
    if !signable {
        return Err(OpenApiError::UnsupportedAuth(format!(
            "{} requires security schemes that cannot sign requests: {}",
            operation.operation_string,
            operation.security_requirements.join(", ")
        )));
    }

    if !required {
        return Ok(());
    }

    Err(OpenApiError::MissingCredentials {
        operation: operation.operation_string.clone(),
        schemes: operation.security_requirements.join(", "),
    })
}

fn apply(request: &mut HttpRequest, scheme: &SecuritySchemeInfo, credentials: &Credentials) -> Result<()> {
    match (&scheme.kind, credentials) {
        (SecuritySchemeKind::ApiKey { name, location }, Credentials::ApiKey { key }) => {
            match location {
                ApiKeyLocation::Header => request.headers.push((name.clone(), key.clone())),
                ApiKeyLocation::Query => request.query.push((name.clone(), key.clone())),
                ApiKeyLocation::Cookie => add_cookie(request, name, key),
            }
            Ok(())
        }
        (SecuritySchemeKind::HttpBasic, Credentials::Basic { username, password }) => {
            let encoded = STANDARD.encode(format!("{}:{}", username, password));
            request
                .headers
                .push(("Authorization".to_string(), format!("Basic {}", encoded)));
            Ok(())
        }
        (SecuritySchemeKind::ApiKey { .. } | SecuritySchemeKind::HttpBasic, _) => {
            Err(OpenApiError::UnsupportedAuth(format!(
                "credentials for security scheme '{}' have the wrong type",
                scheme.raw_name
            )))
        }
        (kind, _) => Err(OpenApiError::UnsupportedAuth(format!(
            "security scheme '{}' ({:?}) cannot sign requests",
            scheme.raw_name, kind
        ))),
    }
}

/// Append to the request's single `Cookie` header.
pub(crate) fn add_cookie(request: &mut HttpRequest, name: &str, value: &str) {
    let cookie = format!("{}={}", name, value);
    match request
        .headers
        .iter_mut()
        .find(|(k, _)| k.eq_ignore_ascii_case("cookie"))
    {
        Some((_, existing)) => {
            existing.push_str("; ");
            existing.push_str(&cookie);
        }
        None => request.headers.push(("Cookie".to_string(), cookie)),
    }
}
