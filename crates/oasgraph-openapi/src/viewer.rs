//! Viewer fields.
//!
//! A viewer takes the credentials of one security scheme as arguments and
//! groups the operations that scheme can authorize. The credentials are
//! stored in the call context of the viewer's value, so every resolver
//! below it signs its requests with them.

use crate::auth::Credentials;
use crate::error::{OpenApiError, Result};
use crate::fields::{FieldBuilder, operation_field_name, operation_id_field_name};
use crate::naming::sanitize;
use crate::registry::WarningKind;
use crate::state::{CallContext, ResolvedValue};
use crate::types::{Operation, SecuritySchemeInfo, SecuritySchemeKind};
use async_graphql::dynamic::{Field, FieldFuture, FieldValue, InputValue, Object, TypeRef};
use indexmap::IndexMap;
use oasgraph_core::OperationType;
use serde_json::{Value, json};
use std::collections::HashSet;
use tracing::debug;

/// A named root field.
pub(crate) type NamedField = (String, Field);

/// Query and mutation viewer fields, one per supported scheme that
/// authorizes at least one operation of that kind.
pub(crate) fn build_viewers(
    builder: &mut FieldBuilder,
) -> Result<(Vec<NamedField>, Vec<NamedField>)> {
    let registry = builder.registry().clone();
    let mut queries = Vec::new();
    let mut mutations = Vec::new();

    for (scheme_name, scheme) in registry.security_schemes() {
        if !scheme.is_supported() {
            continue;
        }

        for (operation_type, prefix, fields) in [
            (OperationType::Query, "viewer", &mut queries),
            (OperationType::Mutation, "mutationViewer", &mut mutations),
        ] {
            let operations: Vec<&Operation> = registry
                .operations()
                .values()
                .filter(|op| {
                    op.requires_viewer
                        && op.operation_type == operation_type
                        && op.security_requirements.contains(scheme_name)
                })
                .collect();
            if operations.is_empty() {
                continue;
            }

            debug!(
                "Creating {} viewer for '{}' with {} operations",
                operation_type,
                scheme_name,
                operations.len()
            );
            fields.push(viewer_field(builder, scheme, prefix, &operations)?);
        }
    }

    Ok((queries, mutations))
}

fn viewer_field(
    builder: &mut FieldBuilder,
    scheme: &SecuritySchemeInfo,
    prefix: &str,
    operations: &[&Operation],
) -> Result<NamedField> {
    let registry = builder.registry().clone();
    let credential_def = scheme.credential_def.ok_or_else(|| {
        OpenApiError::UnsupportedAuth(format!(
            "security scheme '{}' has no credential type",
            scheme.raw_name
        ))
    })?;

    let type_name = builder.claim_type_name(&registry.type_name(&format!(
        "{} {}",
        prefix, scheme.raw_name
    )));
    let field_name = sanitize(&format!("{} {}", prefix, scheme.raw_name), registry.field_case());

    let mut object = Object::new(type_name.clone()).description(format!(
        "A viewer for security scheme '{}'",
        scheme.raw_name
    ));
    let mut names = HashSet::new();
    for operation in operations {
        let mut name = operation_field_name(&registry, operation);
        if names.contains(&name) {
            name = operation_id_field_name(&registry, operation);
        }
        if !names.insert(name.clone()) {
            builder.warn(
                WarningKind::DuplicateFieldName,
                format!(
                    "Field '{}' of viewer '{}' already exists",
                    name, type_name
                ),
                format!("Ignore operation {}", operation.operation_string),
            )?;
            continue;
        }
        object = object.field(builder.operation_field(&operation.operation_id, &name)?);
    }
    builder.push_type(object);

    let raw_name = scheme.raw_name.clone();
    let kind = scheme.kind.clone();
    let mut field = Field::new(field_name.clone(), TypeRef::named_nn(type_name), move |ctx| {
        let raw_name = raw_name.clone();
        let kind = kind.clone();
        FieldFuture::new(async move {
            let mut args = IndexMap::new();
            for (name, value) in ctx.args.as_index_map() {
                args.insert(name.to_string(), value.clone().into_json()?);
            }
            let credentials = credentials_from_args(&kind, &args)?;

            let context = ctx
                .parent_value
                .try_downcast_ref::<ResolvedValue>()
                .map(|p| p.context.clone())
                .unwrap_or_else(|_| CallContext::new());
            let value = ResolvedValue::new(json!({}), context.with_credentials(raw_name, credentials));
            Ok(Some(FieldValue::owned_any(value)))
        })
    })
    .description(scheme.description.clone().unwrap_or_else(|| {
        format!(
            "Operations authorized by security scheme '{}'",
            scheme.raw_name
        )
    }));

    let credential = registry.def(credential_def);
    for (original, child) in credential.properties().into_iter().flatten() {
        let type_ref = TypeRef::NonNull(Box::new(builder.input_type_ref(*child)));
        field = field.argument(InputValue::new(registry.field_name(original), type_ref));
    }
    Ok((field_name, field))
}

/// Credentials from viewer arguments, keyed by sanitized credential field.
fn credentials_from_args(
    kind: &SecuritySchemeKind,
    args: &IndexMap<String, Value>,
) -> async_graphql::Result<Credentials> {
    let text = |name: &str| -> async_graphql::Result<String> {
        match args.get(name) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) if !other.is_null() => Ok(other.to_string()),
            _ => Err(async_graphql::Error::new(format!(
                "Missing viewer argument '{}'",
                name
            ))),
        }
    };

    match kind {
        SecuritySchemeKind::ApiKey { .. } => Ok(Credentials::api_key(text("apiKey")?)),
        SecuritySchemeKind::HttpBasic => Ok(Credentials::basic(text("username")?, text("password")?)),
        other => Err(async_graphql::Error::new(format!(
            "Security scheme {:?} cannot be used in a viewer",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ApiKeyLocation;

    #[test]
    fn test_credentials_from_args() {
        let mut args = IndexMap::new();
        args.insert("apiKey".to_string(), json!("secret"));
        let kind = SecuritySchemeKind::ApiKey {
            name: "X-Api-Key".to_string(),
            location: ApiKeyLocation::Header,
        };
        assert_eq!(
            credentials_from_args(&kind, &args).unwrap(),
            Credentials::api_key("secret")
        );

        let mut args = IndexMap::new();
        args.insert("username".to_string(), json!("u"));
        args.insert("password".to_string(), json!(1234));
        assert_eq!(
            credentials_from_args(&SecuritySchemeKind::HttpBasic, &args).unwrap(),
            Credentials::basic("u", "1234")
        );
    }

    #[test]
    fn test_missing_viewer_argument() {
        let err = credentials_from_args(&SecuritySchemeKind::HttpBasic, &IndexMap::new()).unwrap_err();
        assert!(err.message.contains("username"));
    }
}
