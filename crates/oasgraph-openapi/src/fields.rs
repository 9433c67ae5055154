//! GraphQL types and fields for definitions and operations.
//!
//! Output types are built lazily: asking for the type reference of a
//! definition queues its named type, and [`FieldBuilder::finish`] drains the
//! queue. Child values travel as [`ResolvedValue`]s so every field resolver
//! sees the call context of the operation that produced its parent.

use crate::auth::AuthState;
use crate::definition::{DefId, DefKind, ScalarKind, SubDefinitions};
use crate::error::{OpenApiError, Result};
use crate::http::HttpClient;
use crate::naming::sanitize;
use crate::registry::{Registry, Report, WarningKind, record_warning};
use crate::resolver::{CustomResolverTable, Resolver, ResolverCall, custom_resolver_key, enum_item_name};
use crate::state::ResolvedValue;
use crate::types::{LinkDef, LinkTarget, Operation};
use async_graphql::dynamic::{
    Enum, EnumItem, Field, FieldFuture, FieldValue, InputObject, InputValue, Object,
    ResolverContext, Scalar, Type, TypeRef, Union,
};
use async_graphql::{ErrorExtensions, Name, QueryPathSegment, Value as GqlValue};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Name of the opaque JSON scalar.
pub const JSON_SCALAR: &str = "JSON";

/// Name of the synthetic list-limiting argument.
pub const LIMIT_ARGUMENT: &str = "limit";

/// Builds fields and the named types they reference.
pub(crate) struct FieldBuilder {
    registry: Arc<Registry>,
    client: Arc<dyn HttpClient>,
    custom_resolvers: CustomResolverTable,
    report: Report,
    pending: Vec<(DefId, bool)>,
    registered: HashSet<String>,
    types: Vec<Type>,
    uses_json: bool,
    limit_enabled: HashMap<String, bool>,
}

impl FieldBuilder {
    pub(crate) fn new(
        registry: Arc<Registry>,
        client: Arc<dyn HttpClient>,
        custom_resolvers: CustomResolverTable,
    ) -> Self {
        Self {
            report: registry.report().clone(),
            registry,
            client,
            custom_resolvers,
            pending: Vec::new(),
            registered: HashSet::new(),
            types: Vec::new(),
            uses_json: false,
            limit_enabled: HashMap::new(),
        }
    }

    pub(crate) fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub(crate) fn warn(
        &mut self,
        kind: WarningKind,
        message: impl Into<String>,
        mitigation: impl Into<String>,
    ) -> Result<()> {
        let strict = self.registry.options().strict;
        record_warning(&mut self.report, strict, kind, message, mitigation)
    }

    /// Claim a type name not used by any definition, suffixing if needed.
    pub(crate) fn claim_type_name(&mut self, base: &str) -> String {
        let taken = |name: &str, registered: &HashSet<String>| {
            self.registry.claimed_names.contains(name) || registered.contains(name)
        };
        let mut name = base.to_string();
        let mut suffix = 2;
        while taken(&name, &self.registered) {
            name = format!("{}{}", base, suffix);
            suffix += 1;
        }
        self.registered.insert(name.clone());
        name
    }

    pub(crate) fn push_type(&mut self, ty: impl Into<Type>) {
        self.types.push(ty.into());
    }

    /// The root field of an operation.
    pub(crate) fn operation_field(&mut self, operation_id: &str, field_name: &str) -> Result<Field> {
        let registry = self.registry.clone();
        let operation = registry
            .operation(operation_id)
            .ok_or_else(|| OpenApiError::OperationNotFound(operation_id.to_string()))?;

        let limit = self.limit_enabled(operation)?;
        let resolver = self.resolver(operation)?;
        let type_ref = self.output_type_ref(operation.response_def);

        let mut field = resolver_field(field_name, type_ref, resolver, operation.response_def, limit)
            .description(operation.description.clone());
        for argument in self.operation_arguments(operation, &HashSet::new(), limit) {
            field = field.argument(argument);
        }
        Ok(field)
    }

    fn resolver(&self, operation: &Operation) -> Result<Resolver> {
        let custom = self
            .custom_resolvers
            .get(&custom_resolver_key(
                &operation.document_title,
                &operation.path,
                &operation.method,
            ))
            .cloned();
        Ok(Resolver::new(
            self.registry.clone(),
            self.client.clone(),
            operation.operation_id.clone(),
        )?
        .with_custom(custom))
    }

    /// Whether an operation gets the synthetic `limit` argument.
    fn limit_enabled(&mut self, operation: &Operation) -> Result<bool> {
        if let Some(enabled) = self.limit_enabled.get(&operation.operation_id) {
            return Ok(*enabled);
        }

        let registry = self.registry.clone();
        let returns_list_of_objects = match &registry.def(operation.response_def).sub_definitions {
            SubDefinitions::Array(item) => matches!(
                registry.def(*item).kind,
                DefKind::Object | DefKind::Array | DefKind::Union
            ),
            _ => false,
        };

        let mut enabled = registry.options().add_limit_argument && returns_list_of_objects;
        if enabled && operation.parameter(LIMIT_ARGUMENT).is_some() {
            self.warn(
                WarningKind::LimitArgument,
                format!(
                    "Operation {} already has a parameter named 'limit'",
                    operation.operation_string
                ),
                "Do not add the auto-generated limit argument",
            )?;
            enabled = false;
        }

        self.limit_enabled
            .insert(operation.operation_id.clone(), enabled);
        Ok(enabled)
    }

    /// Arguments of an operation, minus parameters in `bound` (original
    /// names) and those covered by static headers or query parameters.
    fn operation_arguments(
        &mut self,
        operation: &Operation,
        bound: &HashSet<String>,
        limit: bool,
    ) -> Vec<InputValue> {
        let registry = self.registry.clone();
        let options = registry.options();
        let mut arguments = Vec::new();

        for parameter in &operation.parameters {
            if bound.contains(&parameter.original_name) {
                continue;
            }
            if parameter.is_statically_supplied(options) {
                continue;
            }

            let mut type_ref = self.input_type_ref(parameter.def);
            if parameter.is_required_argument() {
                type_ref = TypeRef::NonNull(Box::new(type_ref));
            }
            let mut argument = InputValue::new(parameter.name.clone(), type_ref);
            if let Some(description) = &parameter.description {
                argument = argument.description(description.clone());
            }
            arguments.push(argument);
        }

        if limit {
            arguments.push(
                InputValue::new(LIMIT_ARGUMENT, TypeRef::named(TypeRef::INT)).description(
                    "Auto-generated argument that limits the size of the returned list to its first n elements",
                ),
            );
        }

        if let Some(def) = operation.payload_def {
            let mut type_ref = self.input_type_ref(def);
            if operation.payload_required {
                type_ref = TypeRef::NonNull(Box::new(type_ref));
            }
            arguments.push(InputValue::new(
                payload_argument_name(&registry, operation),
                type_ref,
            ));
        }

        arguments
    }

    /// Type reference for a definition used as output.
    pub(crate) fn output_type_ref(&mut self, id: DefId) -> TypeRef {
        let registry = self.registry.clone();
        let def = registry.def(id);
        match (&def.kind, &def.sub_definitions) {
            (DefKind::Object | DefKind::Enum | DefKind::Union, _) => {
                self.queue(id, false);
                TypeRef::named(def.output_type_name.clone())
            }
            (DefKind::Array, SubDefinitions::Array(item)) => {
                TypeRef::List(Box::new(self.output_type_ref(*item)))
            }
            (DefKind::Scalar(scalar), _) => TypeRef::named(scalar.type_name()),
            _ => self.json_type_ref(),
        }
    }

    /// Type reference for a definition used as input. Unions have no input
    /// form and are accepted as JSON.
    pub(crate) fn input_type_ref(&mut self, id: DefId) -> TypeRef {
        let registry = self.registry.clone();
        let def = registry.def(id);
        match (&def.kind, &def.sub_definitions) {
            (DefKind::Object, _) => {
                self.queue(id, true);
                TypeRef::named(def.input_type_name.clone())
            }
            (DefKind::Enum, _) => {
                self.queue(id, false);
                TypeRef::named(def.output_type_name.clone())
            }
            (DefKind::Array, SubDefinitions::Array(item)) => {
                TypeRef::List(Box::new(self.input_type_ref(*item)))
            }
            (DefKind::Scalar(scalar), _) => TypeRef::named(scalar.type_name()),
            _ => self.json_type_ref(),
        }
    }

    fn json_type_ref(&mut self) -> TypeRef {
        self.uses_json = true;
        TypeRef::named(JSON_SCALAR)
    }

    fn queue(&mut self, id: DefId, is_input: bool) {
        let def = self.registry.def(id);
        let name = if is_input {
            &def.input_type_name
        } else {
            &def.output_type_name
        };
        if self.registered.insert(name.clone()) {
            self.pending.push((id, is_input));
        }
    }

    /// Build every queued type and return all types with the final report.
    pub(crate) fn finish(mut self) -> Result<(Vec<Type>, Report)> {
        while let Some((id, is_input)) = self.pending.pop() {
            let registry = self.registry.clone();
            let def = registry.def(id);
            debug!(
                "Building {} type for definition {} ({:?})",
                if is_input { "input" } else { "output" },
                id,
                def.kind
            );

            match def.kind {
                DefKind::Object if is_input => {
                    let input = self.input_object(id);
                    self.types.push(input.into());
                }
                DefKind::Object => {
                    let object = self.object(id)?;
                    self.types.push(object.into());
                }
                DefKind::Enum => {
                    let mut seen = HashSet::new();
                    let mut enum_type = Enum::new(def.output_type_name.clone());
                    for raw in &def.enum_values {
                        let item = enum_item_name(raw);
                        if seen.insert(item.clone()) {
                            enum_type = enum_type.item(EnumItem::new(item));
                        }
                    }
                    if let Some(description) = &def.description {
                        enum_type = enum_type.description(description.clone());
                    }
                    self.types.push(enum_type.into());
                }
                DefKind::Union => {
                    let mut union = Union::new(def.output_type_name.clone());
                    if let SubDefinitions::Union(members) = &def.sub_definitions {
                        for member in members {
                            self.queue(*member, false);
                            union = union.possible_type(registry.def(*member).output_type_name.clone());
                        }
                    }
                    if let Some(description) = &def.description {
                        union = union.description(description.clone());
                    }
                    self.types.push(union.into());
                }
                _ => {}
            }
        }

        if self.uses_json {
            self.types.push(
                Scalar::new(JSON_SCALAR)
                    .description("Arbitrary JSON value")
                    .into(),
            );
        }
        Ok((self.types, self.report))
    }

    fn object(&mut self, id: DefId) -> Result<Object> {
        let registry = self.registry.clone();
        let def = registry.def(id);
        let mut object = Object::new(def.output_type_name.clone());
        if let Some(description) = &def.description {
            object = object.description(description.clone());
        }

        let mut names = HashSet::new();
        for (original, child) in def.properties().into_iter().flatten() {
            let name = registry.field_name(original);
            if !names.insert(name.clone()) {
                self.warn(
                    WarningKind::DuplicateFieldName,
                    format!(
                        "Properties of '{}' collide on field name '{}'",
                        def.output_type_name, name
                    ),
                    "Keep the first property",
                )?;
                continue;
            }
            let type_ref = self.output_type_ref(*child);
            object = object.field(property_field(name, type_ref, registry.clone(), *child));
        }

        for (key, link) in &def.links {
            if names.contains(key) {
                self.warn(
                    WarningKind::DuplicateFieldName,
                    format!(
                        "Link '{}' of '{}' collides with an existing field",
                        link.name, def.output_type_name
                    ),
                    "Ignore link",
                )?;
                continue;
            }
            if let Some(field) = self.link_field(key, link)? {
                names.insert(key.clone());
                object = object.field(field);
            }
        }

        Ok(object)
    }

    fn input_object(&mut self, id: DefId) -> InputObject {
        let registry = self.registry.clone();
        let def = registry.def(id);
        let mut input = InputObject::new(def.input_type_name.clone());
        if let Some(description) = &def.description {
            input = input.description(description.clone());
        }

        let mut names = HashSet::new();
        for (original, child) in def.properties().into_iter().flatten() {
            let name = registry.field_name(original);
            if !names.insert(name.clone()) {
                continue;
            }
            let mut type_ref = self.input_type_ref(*child);
            if def.is_required(original) {
                type_ref = TypeRef::NonNull(Box::new(type_ref));
            }
            input = input.field(InputValue::new(name, type_ref));
        }
        input
    }

    fn link_field(&mut self, key: &str, link: &LinkDef) -> Result<Option<Field>> {
        let registry = self.registry.clone();
        let Some(operation) = link_target(&registry, link) else {
            self.warn(
                WarningKind::InvalidLink,
                format!("Cannot find the target operation of link '{}'", link.name),
                "Ignore link",
            )?;
            return Ok(None);
        };

        let bound: HashSet<String> = link
            .parameters
            .keys()
            .map(|name| match name.split_once('.') {
                Some((_, name)) if operation.parameter_by_original_name(name).is_some() => {
                    name.to_string()
                }
                _ => name.clone(),
            })
            .collect();

        let limit = self.limit_enabled(operation)?;
        let resolver = self
            .resolver(operation)?
            .with_link_parameters(link.parameters.clone());
        let type_ref = self.output_type_ref(operation.response_def);

        let description = link
            .description
            .clone()
            .unwrap_or_else(|| format!("Link to {}", operation.operation_string));
        let mut field = resolver_field(key, type_ref, resolver, operation.response_def, limit)
            .description(description);
        for argument in self.operation_arguments(operation, &bound, limit) {
            field = field.argument(argument);
        }
        Ok(Some(field))
    }
}

/// Resolve the operation a link points to, by id or by `#/paths/...`
/// reference.
fn link_target<'a>(registry: &'a Registry, link: &LinkDef) -> Option<&'a Operation> {
    match &link.target {
        LinkTarget::OperationId(id) => registry.operation(id),
        LinkTarget::OperationRef(reference) => {
            let pointer = reference
                .split_once('#')
                .map_or(reference.as_str(), |(_, p)| p);
            let mut segments = pointer.trim_start_matches('/').split('/');
            let (Some("paths"), Some(path), Some(method), None) = (
                segments.next(),
                segments.next(),
                segments.next(),
                segments.next(),
            ) else {
                return None;
            };
            let path = urlencoding::decode(path)
                .ok()?
                .replace("~1", "/")
                .replace("~0", "~");

            let mut candidates = registry
                .operations()
                .values()
                .filter(|op| op.path == path && op.method.eq_ignore_ascii_case(method));
            let first = candidates.next()?;
            if first.document == link.document {
                return Some(first);
            }
            candidates
                .find(|op| op.document == link.document)
                .or(Some(first))
        }
    }
}

/// Argument name of an operation's request body.
pub(crate) fn payload_argument_name(registry: &Registry, operation: &Operation) -> String {
    match operation.payload_def.map(|def| registry.def(def)) {
        Some(def) if matches!(def.kind, DefKind::Object | DefKind::Array) => {
            sanitize(&def.input_type_name, registry.field_case())
        }
        _ => sanitize("requestBody", registry.field_case()),
    }
}

fn resolver_field(
    name: &str,
    type_ref: TypeRef,
    resolver: Resolver,
    response_def: DefId,
    limit: bool,
) -> Field {
    Field::new(name, type_ref, move |ctx| {
        let resolver = resolver.clone();
        FieldFuture::new(async move {
            let parent = ctx.parent_value.try_downcast_ref::<ResolvedValue>().ok();

            let mut args = IndexMap::new();
            let mut limit_value = None;
            for (name, value) in ctx.args.as_index_map() {
                let value = value.clone().into_json()?;
                if limit && name.as_str() == LIMIT_ARGUMENT {
                    limit_value = value.as_i64();
                    continue;
                }
                args.insert(name.to_string(), value);
            }

            let resolved = resolver
                .resolve(ResolverCall {
                    parent,
                    args,
                    auth: ctx.data_opt::<AuthState>(),
                    path: field_path(&ctx),
                    limit: limit_value,
                })
                .await
                .map_err(to_graphql_error)?;

            to_field_value(resolver.registry(), response_def, resolved)
        })
    })
}

fn property_field(name: String, type_ref: TypeRef, registry: Arc<Registry>, child: DefId) -> Field {
    Field::new(name.clone(), type_ref, move |ctx| {
        let registry = registry.clone();
        let key = name.clone();
        FieldFuture::new(async move {
            let parent = ctx.parent_value.try_downcast_ref::<ResolvedValue>()?;
            let value = parent.data.get(&key).cloned().unwrap_or(Value::Null);
            to_field_value(&registry, child, parent.child(value))
        })
    })
}

/// Response keys from the root to the current field, list indices dropped.
fn field_path(ctx: &ResolverContext<'_>) -> Vec<String> {
    let mut segments = Vec::new();
    let mut node = ctx.path_node.as_ref();
    while let Some(current) = node {
        if let QueryPathSegment::Name(name) = current.segment {
            segments.push(name.to_string());
        }
        node = current.parent;
    }
    segments.reverse();
    segments
}

/// Convert sanitized data into the field value for its definition.
pub(crate) fn to_field_value<'a>(
    registry: &Registry,
    id: DefId,
    value: ResolvedValue,
) -> async_graphql::Result<Option<FieldValue<'a>>> {
    if value.data.is_null() {
        return Ok(None);
    }
    let def = registry.def(id);

    let field_value = match (&def.kind, &def.sub_definitions) {
        (DefKind::Object, _) => FieldValue::owned_any(value),
        (DefKind::Union, SubDefinitions::Union(members)) => {
            let member = match &value.data {
                Value::Object(map) => registry.select_union_member(members, map, true),
                _ => None,
            }
            .ok_or_else(|| {
                async_graphql::Error::new(format!(
                    "Value does not match any member of union '{}'",
                    def.output_type_name
                ))
            })?;
            let type_name = registry.def(member).output_type_name.clone();
            FieldValue::owned_any(value).with_type(type_name)
        }
        (DefKind::Array, SubDefinitions::Array(item)) => {
            let Value::Array(items) = &value.data else {
                return Err(async_graphql::Error::new(format!(
                    "Expected a list for '{}'",
                    def.output_type_name
                )));
            };
            let mut list = Vec::with_capacity(items.len());
            for entry in items {
                let entry = to_field_value(registry, *item, value.child(entry.clone()))?;
                list.push(entry.unwrap_or(FieldValue::NULL));
            }
            FieldValue::list(list)
        }
        (DefKind::Enum, _) => {
            let item = match &value.data {
                Value::String(s) => s.clone(),
                other => enum_item_name(other),
            };
            FieldValue::value(GqlValue::Enum(Name::new(item)))
        }
        (DefKind::Scalar(ScalarKind::String | ScalarKind::Id), _) => match value.data {
            Value::String(s) => FieldValue::value(GqlValue::String(s)),
            other => FieldValue::value(GqlValue::String(other.to_string())),
        },
        _ => FieldValue::value(GqlValue::from_json(value.data)?),
    };
    Ok(Some(field_value))
}

/// Convert a resolver error, attaching call diagnostics as extensions.
pub(crate) fn to_graphql_error(err: OpenApiError) -> async_graphql::Error {
    let error = async_graphql::Error::new(err.to_string());
    let Some(details) = err.http_details() else {
        return error;
    };

    error.extend_with(|_, e| {
        e.set("method", details.method.clone());
        e.set("path", details.path.clone());
        e.set("url", details.url.clone());
        e.set("statusCode", i32::from(details.status_code));
        e.set("statusText", details.status_text.clone());
        e.set(
            "responseHeaders",
            GqlValue::from_json(details.response_headers.clone()).unwrap_or_default(),
        );
        e.set(
            "responseBody",
            GqlValue::from_json(details.response_body.clone()).unwrap_or_default(),
        );
    })
}

/// Field name for an operation exposed on a root or viewer type.
pub(crate) fn operation_field_name(registry: &Registry, operation: &Operation) -> String {
    let style = registry.field_case();
    let response = registry.def(operation.response_def);
    let named_response = matches!(
        response.kind,
        DefKind::Object | DefKind::Array | DefKind::Enum | DefKind::Union
    );

    if registry.options().operation_id_field_names
        || operation.operation_type != oasgraph_core::OperationType::Query
        || !named_response
    {
        return sanitize(&operation.operation_id, style);
    }
    sanitize(&response.output_type_name, style)
}

/// Fallback name when the preferred field name is taken.
pub(crate) fn operation_id_field_name(registry: &Registry, operation: &Operation) -> String {
    sanitize(&operation.operation_id, registry.field_case())
}
