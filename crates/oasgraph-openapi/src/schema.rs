//! Compilation of JSON schemas into the deduplicated type graph.
//!
//! A definition is pushed into the registry before its children are
//! compiled. A property that points back at a schema under construction
//! therefore finds the existing node through the deduplication lookup and
//! recursion stops there.

use crate::definition::{DataDefinition, DefId, DefKind, ScalarKind, SubDefinitions};
use crate::document::Document;
use crate::error::{OpenApiError, Result};
use crate::registry::{Registry, WarningKind};
use crate::types::LinkDef;
use indexmap::IndexMap;
use serde_json::{Map, Value, json};
use tracing::debug;

/// Marks a property demoted to an opaque JSON value while merging `anyOf`.
const OPAQUE_MARKER: &str = "x-oasgraph-opaque";

const PLACEHOLDER_NAME: &str = "PlaceholderName";

/// Sources a definition's name can be derived from, in priority order.
#[derive(Debug, Clone, Default)]
pub struct NameHints {
    /// Name chosen by the caller
    pub preferred: Option<String>,
    /// Last segment of the `$ref` the schema was reached through
    pub from_ref: Option<String>,
    /// The schema's `title`
    pub from_schema: Option<String>,
    /// Name derived from the API path
    pub from_path: Option<String>,
}

impl NameHints {
    pub fn from_path(name: impl Into<String>) -> Self {
        Self {
            from_path: Some(name.into()),
            ..Self::default()
        }
    }

    fn candidates(&self) -> impl Iterator<Item = &String> {
        [
            &self.preferred,
            &self.from_ref,
            &self.from_schema,
            &self.from_path,
        ]
        .into_iter()
        .flatten()
    }

    fn preferred_name(&self) -> String {
        self.candidates()
            .next()
            .cloned()
            .unwrap_or_else(|| PLACEHOLDER_NAME.to_string())
    }
}

/// Compiles schemas of one document into the registry.
pub(crate) struct TypeBuilder<'a> {
    registry: &'a mut Registry,
    document: &'a Document,
    document_index: usize,
}

impl<'a> TypeBuilder<'a> {
    pub(crate) fn new(
        registry: &'a mut Registry,
        document: &'a Document,
        document_index: usize,
    ) -> Self {
        Self {
            registry,
            document,
            document_index,
        }
    }

    /// Return the definition for `schema`, creating it and its children if
    /// no structurally equal schema with the same preferred name exists.
    ///
    /// `links` are attached to the definition, or to its items for a list,
    /// and merged into an existing definition; they are ignored in input
    /// contexts.
    pub(crate) fn get_or_create_def(
        &mut self,
        hints: NameHints,
        schema: &Value,
        is_input: bool,
        links: IndexMap<String, LinkDef>,
    ) -> Result<DefId> {
        self.compile(hints, schema, is_input, links, 0)
    }

    fn compile(
        &mut self,
        mut hints: NameHints,
        schema: &Value,
        is_input: bool,
        links: IndexMap<String, LinkDef>,
        depth: usize,
    ) -> Result<DefId> {
        let (schema, ref_name) = self.document.deref_schema(schema)?;
        if ref_name.is_some() {
            hints.from_ref = ref_name;
        }
        hints.from_schema = schema
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string);
        let preferred_name = hints.preferred_name();
        let links = if is_input { IndexMap::new() } else { links };

        if let Some(existing) = self
            .registry
            .defs
            .iter()
            .find(|d| d.preferred_name == preferred_name && d.schema == schema)
            .map(|d| d.id)
        {
            let target = match self.registry.defs[existing].sub_definitions {
                SubDefinitions::Array(item) => item,
                _ => existing,
            };
            self.merge_links(target, links)?;
            return Ok(existing);
        }

        let limit = self.registry.options.max_recursion_depth;
        if depth > limit {
            return Err(OpenApiError::RecursionLimit {
                name: preferred_name,
                limit,
            });
        }

        let merged = self.merge_all_of(&schema, depth)?;
        let merged = self.merge_any_of(&merged, &preferred_name, depth)?;
        let kind = self.classify(&merged, &preferred_name)?;

        let (output_type_name, input_type_name) = match kind {
            DefKind::Scalar(scalar) => (
                scalar.type_name().to_string(),
                scalar.type_name().to_string(),
            ),
            DefKind::Json => ("JSON".to_string(), "JSON".to_string()),
            DefKind::Array => {
                let name = self.registry.type_name(&preferred_name);
                (format!("{}List", name), format!("{}ListInput", name))
            }
            DefKind::Object | DefKind::Enum | DefKind::Union => self.allocate_names(&hints),
        };

        // Links of a list response belong to its items.
        let (links, item_links) = match kind {
            DefKind::Array => (IndexMap::new(), links),
            _ => (links, IndexMap::new()),
        };

        let id = self.registry.defs.len();
        let sub_definitions = match kind {
            DefKind::Object => SubDefinitions::Object(IndexMap::new()),
            _ => SubDefinitions::None,
        };
        let enum_values = match kind {
            DefKind::Enum => enum_values(&merged),
            _ => Vec::new(),
        };
        let required = merged
            .get("required")
            .and_then(Value::as_array)
            .map(|r| {
                r.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let description = merged
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);

        debug!(
            "Registering definition {} '{}' as {:?} ({})",
            id, preferred_name, kind, output_type_name
        );

        self.registry.defs.push(DataDefinition {
            id,
            preferred_name: preferred_name.clone(),
            schema,
            kind,
            output_type_name,
            input_type_name,
            sub_definitions,
            required,
            links,
            description,
            enum_values,
            document: self.document_index,
        });

        match kind {
            DefKind::Object => self.compile_properties(id, &merged, &preferred_name, is_input, depth)?,
            DefKind::Array => {
                let items = merged.get("items").cloned().unwrap_or_else(|| json!({}));
                let child = self.compile(
                    NameHints::from_path(format!("{}ListItem", preferred_name)),
                    &items,
                    is_input,
                    item_links,
                    depth + 1,
                )?;
                self.registry.defs[id].sub_definitions = SubDefinitions::Array(child);
            }
            DefKind::Union => {
                let members = merged
                    .get("oneOf")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let mut children = Vec::with_capacity(members.len());
                for (i, member) in members.iter().enumerate() {
                    let child = self.compile(
                        NameHints::from_path(format!("{}Member{}", preferred_name, i + 1)),
                        member,
                        is_input,
                        IndexMap::new(),
                        depth + 1,
                    )?;
                    children.push(child);
                }
                self.registry.defs[id].sub_definitions = SubDefinitions::Union(children);
            }
            _ => {}
        }

        Ok(id)
    }

    fn compile_properties(
        &mut self,
        id: DefId,
        merged: &Value,
        preferred_name: &str,
        is_input: bool,
        depth: usize,
    ) -> Result<()> {
        let Some(properties) = merged.get("properties").and_then(Value::as_object) else {
            return Ok(());
        };

        for (name, property) in properties {
            let recorded = self.registry.defs[id]
                .properties()
                .is_some_and(|p| p.contains_key(name));
            if recorded {
                continue;
            }

            self.registry.store_field_name(name);
            let hints = NameHints::from_path(format!(
                "{}{}",
                preferred_name,
                self.registry.type_name(name)
            ));
            let child = self.compile(hints, property, is_input, IndexMap::new(), depth + 1)?;

            if let SubDefinitions::Object(props) = &mut self.registry.defs[id].sub_definitions {
                props.insert(name.clone(), child);
            }
        }
        Ok(())
    }

    /// Pick the first unclaimed name among the hints, or suffix the best one.
    fn allocate_names(&mut self, hints: &NameHints) -> (String, String) {
        let candidates: Vec<String> = hints
            .candidates()
            .map(|c| self.registry.type_name(c))
            .collect();

        let claimed = &self.registry.claimed_names;
        let free = |name: &str| {
            !claimed.contains(name) && !claimed.contains(&format!("{}Input", name))
        };

        let output = match candidates.iter().find(|c| free(c)) {
            Some(name) => name.clone(),
            None => {
                let base = candidates
                    .first()
                    .cloned()
                    .unwrap_or_else(|| PLACEHOLDER_NAME.to_string());
                let mut suffix = 2;
                while !free(&format!("{}{}", base, suffix)) {
                    suffix += 1;
                }
                format!("{}{}", base, suffix)
            }
        };
        let input = format!("{}Input", output);

        self.registry.claimed_names.insert(output.clone());
        self.registry.claimed_names.insert(input.clone());
        (output, input)
    }

    fn merge_links(&mut self, id: DefId, links: IndexMap<String, LinkDef>) -> Result<()> {
        for (key, link) in links {
            match self.registry.defs[id].links.get(&key) {
                Some(existing) if *existing != link => {
                    let name = self.registry.defs[id].output_type_name.clone();
                    self.registry.warn(
                        WarningKind::DuplicateLinkKey,
                        format!("Type '{}' already has a different link '{}'", name, key),
                        "Keep the first link definition",
                    )?;
                }
                Some(_) => {}
                None => {
                    self.registry.defs[id].links.insert(key, link);
                }
            }
        }
        Ok(())
    }

    /// Fold `allOf` members into one schema.
    fn merge_all_of(&mut self, schema: &Value, depth: usize) -> Result<Value> {
        let Some(members) = schema.get("allOf").and_then(Value::as_array) else {
            return Ok(schema.clone());
        };
        if depth > self.registry.options.max_recursion_depth {
            return Err(OpenApiError::RecursionLimit {
                name: "allOf".to_string(),
                limit: self.registry.options.max_recursion_depth,
            });
        }

        let mut merged = schema.clone();
        if let Some(map) = merged.as_object_mut() {
            map.remove("allOf");
        }

        for member in members {
            let (member, _) = self.document.deref_schema(member)?;
            let member = self.merge_all_of(&member, depth + 1)?;
            self.merge_member(&mut merged, &member)?;
        }

        Ok(merged)
    }

    fn merge_member(&mut self, target: &mut Value, member: &Value) -> Result<()> {
        let (Some(target), Some(member)) = (target.as_object_mut(), member.as_object()) else {
            return Ok(());
        };

        for (key, value) in member {
            match key.as_str() {
                "properties" => {
                    let Some(incoming) = value.as_object() else {
                        continue;
                    };
                    let properties = target
                        .entry("properties")
                        .or_insert_with(|| Value::Object(Map::new()));
                    let Some(properties) = properties.as_object_mut() else {
                        continue;
                    };
                    for (name, property) in incoming {
                        match properties.get(name) {
                            Some(existing) if existing != property => {
                                self.registry.warn(
                                    WarningKind::CombineSchema,
                                    format!(
                                        "allOf members define property '{}' in conflicting ways",
                                        name
                                    ),
                                    "Keep the first definition of the property",
                                )?;
                            }
                            Some(_) => {}
                            None => {
                                properties.insert(name.clone(), property.clone());
                            }
                        }
                    }
                }
                "required" => {
                    let required = target
                        .entry("required")
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if let (Some(required), Some(incoming)) = (required.as_array_mut(), value.as_array()) {
                        for name in incoming {
                            if !required.contains(name) {
                                required.push(name.clone());
                            }
                        }
                    }
                }
                "title" => {}
                _ => {
                    target.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
        }
        Ok(())
    }

    /// Fold `anyOf` members into one object schema when every member is an
    /// object. Properties the members disagree on become opaque JSON.
    fn merge_any_of(&mut self, schema: &Value, name: &str, depth: usize) -> Result<Value> {
        let Some(members) = schema.get("anyOf").and_then(Value::as_array) else {
            return Ok(schema.clone());
        };

        let mut resolved = Vec::with_capacity(members.len());
        for member in members {
            let (member, _) = self.document.deref_schema(member)?;
            resolved.push(self.merge_all_of(&member, depth + 1)?);
        }
        if !resolved.iter().all(has_properties) {
            // Classification reports the fallback to JSON.
            return Ok(schema.clone());
        }

        let mut merged = schema.clone();
        let Some(target) = merged.as_object_mut() else {
            return Ok(schema.clone());
        };
        target.remove("anyOf");
        let mut properties = target
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let mut conflicting = Vec::new();

        for member in &resolved {
            for (prop, value) in member["properties"].as_object().into_iter().flatten() {
                match properties.get(prop) {
                    Some(existing) if existing != value => {
                        if !conflicting.contains(prop) {
                            conflicting.push(prop.clone());
                        }
                    }
                    Some(_) => {}
                    None => {
                        properties.insert(prop.clone(), value.clone());
                    }
                }
            }
        }

        for prop in conflicting {
            self.registry.warn(
                WarningKind::CombineSchema,
                format!(
                    "anyOf members of '{}' define property '{}' in conflicting ways",
                    name, prop
                ),
                "Expose the property as an opaque JSON value",
            )?;
            properties.insert(
                prop,
                json!({ OPAQUE_MARKER: true, "description": "Value of varying shape" }),
            );
        }

        target.insert("properties".to_string(), Value::Object(properties));
        if !target.contains_key("type") {
            target.insert("type".to_string(), json!("object"));
        }
        Ok(merged)
    }

    fn classify(&mut self, schema: &Value, name: &str) -> Result<DefKind> {
        if schema.get(OPAQUE_MARKER).is_some() {
            return Ok(DefKind::Json);
        }

        if !enum_values(schema).is_empty() {
            return Ok(DefKind::Enum);
        }

        if has_properties(schema) {
            return Ok(DefKind::Object);
        }
        if schema.get("additionalProperties").is_some() {
            return Ok(DefKind::Json);
        }

        let declared = declared_type(schema);
        if schema.get("items").is_some() || declared == Some("array") {
            return Ok(DefKind::Array);
        }

        if let Some(members) = schema.get("oneOf").and_then(Value::as_array) {
            let mut all_objects = !members.is_empty();
            for member in members {
                let (member, _) = self.document.deref_schema(member)?;
                let member = self.merge_all_of(&member, 0)?;
                all_objects &= has_properties(&member) && enum_values(&member).is_empty();
            }
            if all_objects {
                return Ok(DefKind::Union);
            }
            self.registry.warn(
                WarningKind::CombineSchema,
                format!("oneOf members of '{}' are not all object types", name),
                "Expose the value as opaque JSON",
            )?;
            return Ok(DefKind::Json);
        }

        if schema.get("anyOf").is_some() {
            self.registry.warn(
                WarningKind::CombineSchema,
                format!("anyOf members of '{}' are not all object types", name),
                "Expose the value as opaque JSON",
            )?;
            return Ok(DefKind::Json);
        }

        let format = schema.get("format").and_then(Value::as_str);
        let is_id_format = |f: Option<&str>| {
            f.is_some_and(|f| f == "uuid" || self.registry.options.id_formats.iter().any(|i| i == f))
        };

        let kind = match declared {
            Some("integer") if is_id_format(format) => DefKind::Scalar(ScalarKind::Id),
            Some("integer") if format == Some("int64") => DefKind::Scalar(ScalarKind::Float),
            Some("integer") => DefKind::Scalar(ScalarKind::Int),
            Some("number") => DefKind::Scalar(ScalarKind::Float),
            Some("string") if is_id_format(format) => DefKind::Scalar(ScalarKind::Id),
            Some("string") => DefKind::Scalar(ScalarKind::String),
            Some("boolean") => DefKind::Scalar(ScalarKind::Boolean),
            Some("object") => DefKind::Json,
            other => {
                self.registry.warn(
                    WarningKind::UnknownTargetType,
                    format!(
                        "Cannot determine the type of schema '{}' (declared type {:?})",
                        name, other
                    ),
                    "Expose the value as opaque JSON",
                )?;
                DefKind::Json
            }
        };
        Ok(kind)
    }
}

fn has_properties(schema: &Value) -> bool {
    schema
        .get("properties")
        .and_then(Value::as_object)
        .is_some_and(|p| !p.is_empty())
}

/// The declared primitive type; for a list of types the first non-null one.
fn declared_type(schema: &Value) -> Option<&str> {
    match schema.get("type")? {
        Value::String(t) => Some(t.as_str()),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null"),
        _ => None,
    }
}

fn enum_values(schema: &Value) -> Vec<Value> {
    schema
        .get("enum")
        .and_then(Value::as_array)
        .map(|values| values.iter().filter(|v| !v.is_null()).cloned().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LinkTarget;
    use oasgraph_core::Options;

    fn document(components: &str) -> Document {
        let spec = format!(
            r#"
openapi: 3.0.0
info:
  title: Types
  version: 1.0.0
paths: {{}}
components:
  schemas:
{}
"#,
            components
        );
        Document::from_str(&spec).unwrap()
    }

    fn compile(registry: &mut Registry, doc: &Document, hints: NameHints, schema: Value) -> Result<DefId> {
        TypeBuilder::new(registry, doc, 0).get_or_create_def(hints, &schema, false, IndexMap::new())
    }

    const ITEM: &str = r#"
    Item:
      type: object
      properties:
        id:
          type: string
        name:
          type: string
"#;

    #[test]
    fn test_identical_schemas_share_a_definition() {
        let doc = document(ITEM);
        let mut registry = Registry::new(Options::default());
        let reference = json!({"$ref": "#/components/schemas/Item"});

        let first = compile(&mut registry, &doc, NameHints::from_path("Items"), reference.clone()).unwrap();
        let second = compile(&mut registry, &doc, NameHints::from_path("Other"), reference).unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.def(first).output_type_name, "Item");
        assert_eq!(registry.def(first).input_type_name, "ItemInput");
    }

    #[test]
    fn test_same_name_different_schema_gets_suffix() {
        let doc = document(ITEM);
        let mut registry = Registry::new(Options::default());

        let first = compile(
            &mut registry,
            &doc,
            NameHints::default(),
            json!({"$ref": "#/components/schemas/Item"}),
        )
        .unwrap();
        let other = compile(
            &mut registry,
            &doc,
            NameHints::default(),
            json!({"title": "Item", "type": "object", "properties": {"sku": {"type": "integer"}}}),
        )
        .unwrap();

        assert_ne!(first, other);
        assert_eq!(registry.def(first).output_type_name, "Item");
        assert_eq!(registry.def(other).output_type_name, "Item2");
        assert_eq!(registry.def(other).input_type_name, "Item2Input");
    }

    #[test]
    fn test_self_reference_terminates() {
        let doc = document(
            r#"
    Node:
      type: object
      properties:
        value:
          type: integer
        next:
          $ref: '#/components/schemas/Node'
"#,
        );
        let mut registry = Registry::new(Options::default());
        let id = compile(
            &mut registry,
            &doc,
            NameHints::default(),
            json!({"$ref": "#/components/schemas/Node"}),
        )
        .unwrap();

        let node = registry.def(id);
        assert_eq!(node.kind, DefKind::Object);
        assert_eq!(node.properties().unwrap()["next"], id);
        assert_eq!(registry.defs().len(), 2);
    }

    #[test]
    fn test_indirect_cycle_terminates() {
        let doc = document(
            r#"
    Person:
      type: object
      properties:
        employer:
          $ref: '#/components/schemas/Company'
    Company:
      type: object
      properties:
        ceo:
          $ref: '#/components/schemas/Person'
"#,
        );
        let mut registry = Registry::new(Options::default());
        let person = compile(
            &mut registry,
            &doc,
            NameHints::default(),
            json!({"$ref": "#/components/schemas/Person"}),
        )
        .unwrap();

        let company = registry.def(person).properties().unwrap()["employer"];
        assert_eq!(registry.def(company).output_type_name, "Company");
        assert_eq!(registry.def(company).properties().unwrap()["ceo"], person);
    }

    #[test]
    fn test_scalar_classification() {
        let doc = document(ITEM);
        let mut registry = Registry::new(Options {
            id_formats: vec!["objectid".to_string()],
            ..Options::default()
        });

        let cases = [
            (json!({"type": "integer"}), DefKind::Scalar(ScalarKind::Int)),
            (json!({"type": "integer", "format": "int64"}), DefKind::Scalar(ScalarKind::Float)),
            (json!({"type": "number"}), DefKind::Scalar(ScalarKind::Float)),
            (json!({"type": "string", "format": "uuid"}), DefKind::Scalar(ScalarKind::Id)),
            (json!({"type": "string", "format": "objectid"}), DefKind::Scalar(ScalarKind::Id)),
            (json!({"type": "boolean"}), DefKind::Scalar(ScalarKind::Boolean)),
            (json!({"type": ["null", "string"]}), DefKind::Scalar(ScalarKind::String)),
            (json!({"type": "object", "additionalProperties": {"type": "string"}}), DefKind::Json),
            (json!({"type": "string", "enum": ["a", "b"]}), DefKind::Enum),
            (json!({"type": "array", "items": {"type": "string"}}), DefKind::Array),
        ];

        for (i, (schema, expected)) in cases.into_iter().enumerate() {
            let id = compile(
                &mut registry,
                &doc,
                NameHints::from_path(format!("Case{}", i)),
                schema.clone(),
            )
            .unwrap();
            assert_eq!(registry.def(id).kind, expected, "schema {}", schema);
        }
        assert!(registry.report().warnings.is_empty());
    }

    #[test]
    fn test_unknown_type_degrades_to_json_with_warning() {
        let doc = document(ITEM);
        let mut registry = Registry::new(Options::default());
        let id = compile(&mut registry, &doc, NameHints::from_path("Odd"), json!({"description": "?"})).unwrap();

        assert_eq!(registry.def(id).kind, DefKind::Json);
        assert_eq!(registry.report().warnings[0].kind, WarningKind::UnknownTargetType);
    }

    #[test]
    fn test_all_of_merges_properties() {
        let doc = document(
            r#"
    Base:
      type: object
      required: [id]
      properties:
        id:
          type: string
    Pet:
      allOf:
        - $ref: '#/components/schemas/Base'
        - type: object
          required: [name]
          properties:
            name:
              type: string
            id:
              type: integer
"#,
        );
        let mut registry = Registry::new(Options::default());
        let id = compile(
            &mut registry,
            &doc,
            NameHints::default(),
            json!({"$ref": "#/components/schemas/Pet"}),
        )
        .unwrap();

        let pet = registry.def(id);
        assert_eq!(pet.kind, DefKind::Object);
        let props: Vec<&String> = pet.properties().unwrap().keys().collect();
        assert_eq!(props, vec!["id", "name"]);
        assert_eq!(pet.required, vec!["id".to_string(), "name".to_string()]);
        let id_def = pet.properties().unwrap()["id"];
        assert_eq!(registry.def(id_def).kind, DefKind::Scalar(ScalarKind::String));
        assert_eq!(registry.report().warnings[0].kind, WarningKind::CombineSchema);
    }

    #[test]
    fn test_any_of_demotes_only_conflicting_properties() {
        let doc = document(
            r#"
    Cat:
      type: object
      properties:
        name:
          type: string
        age:
          type: integer
    Dog:
      type: object
      properties:
        name:
          type: string
        age:
          type: string
        barks:
          type: boolean
"#,
        );
        let mut registry = Registry::new(Options::default());
        let id = compile(
            &mut registry,
            &doc,
            NameHints::from_path("Animal"),
            json!({"anyOf": [
                {"$ref": "#/components/schemas/Cat"},
                {"$ref": "#/components/schemas/Dog"}
            ]}),
        )
        .unwrap();

        let animal = registry.def(id);
        assert_eq!(animal.kind, DefKind::Object);
        let props = animal.properties().unwrap();
        assert_eq!(registry.def(props["name"]).kind, DefKind::Scalar(ScalarKind::String));
        assert_eq!(registry.def(props["age"]).kind, DefKind::Json);
        assert_eq!(registry.def(props["barks"]).kind, DefKind::Scalar(ScalarKind::Boolean));
    }

    #[test]
    fn test_one_of_objects_is_union() {
        let doc = document(
            r#"
    Cat:
      type: object
      properties:
        meows:
          type: boolean
    Dog:
      type: object
      properties:
        barks:
          type: boolean
"#,
        );
        let mut registry = Registry::new(Options::default());
        let id = compile(
            &mut registry,
            &doc,
            NameHints::from_path("Pet"),
            json!({"oneOf": [
                {"$ref": "#/components/schemas/Cat"},
                {"$ref": "#/components/schemas/Dog"}
            ]}),
        )
        .unwrap();

        let pet = registry.def(id);
        assert_eq!(pet.kind, DefKind::Union);
        let SubDefinitions::Union(members) = &pet.sub_definitions else {
            panic!("expected union members");
        };
        let names: Vec<&str> = members
            .iter()
            .map(|m| registry.def(*m).output_type_name.as_str())
            .collect();
        assert_eq!(names, vec!["Cat", "Dog"]);
    }

    #[test]
    fn test_one_of_with_scalars_is_json() {
        let doc = document(ITEM);
        let mut registry = Registry::new(Options::default());
        let id = compile(
            &mut registry,
            &doc,
            NameHints::from_path("Mixed"),
            json!({"oneOf": [{"$ref": "#/components/schemas/Item"}, {"type": "string"}]}),
        )
        .unwrap();

        assert_eq!(registry.def(id).kind, DefKind::Json);
        assert_eq!(registry.report().warnings[0].kind, WarningKind::CombineSchema);
    }

    #[test]
    fn test_recursion_limit_aborts() {
        let doc = document(ITEM);
        let mut registry = Registry::new(Options {
            max_recursion_depth: 5,
            ..Options::default()
        });

        let mut schema = json!({"type": "string"});
        for _ in 0..10 {
            schema = json!({"type": "object", "properties": {"child": schema}});
        }

        let err = compile(&mut registry, &doc, NameHints::from_path("Deep"), schema).unwrap_err();
        assert!(matches!(err, OpenApiError::RecursionLimit { limit: 5, .. }));
    }

    #[test]
    fn test_unresolvable_reference_is_fatal() {
        let doc = document(ITEM);
        let mut registry = Registry::new(Options::default());
        let err = compile(
            &mut registry,
            &doc,
            NameHints::default(),
            json!({"type": "object", "properties": {"x": {"$ref": "#/components/schemas/Nope"}}}),
        )
        .unwrap_err();
        assert!(matches!(err, OpenApiError::UnresolvableReference(_)));
    }

    #[test]
    fn test_links_merge_first_wins() {
        let doc = document(ITEM);
        let mut registry = Registry::new(Options::default());
        let reference = json!({"$ref": "#/components/schemas/Item"});
        let link = |target: &str| LinkDef {
            name: "owner".to_string(),
            target: LinkTarget::OperationId(target.to_string()),
            parameters: IndexMap::new(),
            description: None,
            document: 0,
        };

        let mut first_links = IndexMap::new();
        first_links.insert("owner".to_string(), link("getOwner"));
        let id = TypeBuilder::new(&mut registry, &doc, 0)
            .get_or_create_def(NameHints::default(), &reference, false, first_links)
            .unwrap();

        let mut second_links = IndexMap::new();
        second_links.insert("owner".to_string(), link("getOtherOwner"));
        TypeBuilder::new(&mut registry, &doc, 0)
            .get_or_create_def(NameHints::default(), &reference, false, second_links)
            .unwrap();

        assert_eq!(
            registry.def(id).links["owner"].target,
            LinkTarget::OperationId("getOwner".to_string())
        );
        assert_eq!(registry.report().warnings[0].kind, WarningKind::DuplicateLinkKey);
    }
}
