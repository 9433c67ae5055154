//! Nodes of the compiled type graph.

use crate::types::LinkDef;
use indexmap::IndexMap;
use serde_json::Value;

/// Index of a [`DataDefinition`] in the registry's arena.
pub type DefId = usize;

/// Scalar flavours a schema can compile to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Int,
    Float,
    String,
    Boolean,
    Id,
}

impl ScalarKind {
    /// Name of the matching built-in GraphQL scalar.
    pub fn type_name(&self) -> &'static str {
        match self {
            ScalarKind::Int => "Int",
            ScalarKind::Float => "Float",
            ScalarKind::String => "String",
            ScalarKind::Boolean => "Boolean",
            ScalarKind::Id => "ID",
        }
    }
}

/// What a schema compiles to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefKind {
    Object,
    Array,
    Enum,
    Union,
    Scalar(ScalarKind),
    /// Opaque JSON value
    Json,
}

impl DefKind {
    /// Kinds that get a named type of their own.
    pub fn is_named(&self) -> bool {
        matches!(self, DefKind::Object | DefKind::Enum | DefKind::Union)
    }
}

/// Children of a definition, shaped by its kind.
#[derive(Debug, Clone, PartialEq)]
pub enum SubDefinitions {
    None,
    /// Original property name → child
    Object(IndexMap<String, DefId>),
    Array(DefId),
    Union(Vec<DefId>),
}

/// A canonical, deduplicated node of the type graph.
#[derive(Debug, Clone)]
pub struct DataDefinition {
    pub id: DefId,
    pub preferred_name: String,
    /// Schema as it was encountered, after top-level dereferencing; nested
    /// references may still be unresolved
    pub schema: Value,
    pub kind: DefKind,
    pub output_type_name: String,
    pub input_type_name: String,
    pub sub_definitions: SubDefinitions,
    pub required: Vec<String>,
    /// Sanitized link key → link
    pub links: IndexMap<String, LinkDef>,
    pub description: Option<String>,
    /// Raw enum values, for enum definitions
    pub enum_values: Vec<Value>,
    /// Index of the document the schema came from
    pub document: usize,
}

impl DataDefinition {
    /// Whether the schema declared any properties of its own.
    pub fn has_properties(&self) -> bool {
        matches!(&self.sub_definitions, SubDefinitions::Object(props) if !props.is_empty())
    }

    pub fn properties(&self) -> Option<&IndexMap<String, DefId>> {
        match &self.sub_definitions {
            SubDefinitions::Object(props) => Some(props),
            _ => None,
        }
    }

    pub fn is_required(&self, property: &str) -> bool {
        self.required.iter().any(|r| r == property)
    }
}
