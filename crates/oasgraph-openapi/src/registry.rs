//! Per-translation registry of operations, definitions and names.
//!
//! Everything a translation run produces lives here instead of in process
//! globals, so several translations can run side by side. Once the schema is
//! built the registry is frozen behind an `Arc` and only read.

use crate::definition::{DataDefinition, DefId};
use crate::error::{OpenApiError, Result};
use crate::naming::{CaseStyle, NameMap, sanitize};
use crate::types::{Operation, SecuritySchemeInfo};
use indexmap::IndexMap;
use oasgraph_core::Options;
use serde::Serialize;
use std::collections::HashSet;
use tracing::warn;

/// Category of a recoverable build-time problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningKind {
    MissingResponseSchema,
    MultipleResponses,
    InvalidLink,
    DuplicateOperationId,
    DuplicateFieldName,
    DuplicateLinkKey,
    DuplicateSecurityScheme,
    UnsupportedSecurityScheme,
    OAuthSecurityScheme,
    UnknownTargetType,
    CombineSchema,
    LimitArgument,
    InvalidParameter,
    SubscriptionSkipped,
}

/// One recoverable problem, with what was done about it.
#[derive(Debug, Clone, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
    pub mitigation: String,
}

/// Summary of a translation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub warnings: Vec<Warning>,
    /// Operations found in the documents
    pub num_ops: usize,
    pub num_ops_query: usize,
    pub num_ops_mutation: usize,
    /// Operations dropped during preprocessing
    pub num_ops_dropped: usize,
    pub num_queries_created: usize,
    pub num_mutations_created: usize,
}

/// Record a recoverable problem in `report`, or fail in strict mode.
pub(crate) fn record_warning(
    report: &mut Report,
    strict: bool,
    kind: WarningKind,
    message: impl Into<String>,
    mitigation: impl Into<String>,
) -> Result<()> {
    let message = message.into();
    let mitigation = mitigation.into();

    if strict {
        return Err(OpenApiError::Strict(message));
    }

    warn!(?kind, "{} ({})", message, mitigation);
    report.warnings.push(Warning {
        kind,
        message,
        mitigation,
    });
    Ok(())
}

/// Registry built by the preprocessor and the type builder.
#[derive(Debug, Clone)]
pub struct Registry {
    pub(crate) options: Options,
    pub(crate) operations: IndexMap<String, Operation>,
    pub(crate) defs: Vec<DataDefinition>,
    pub(crate) security_schemes: IndexMap<String, SecuritySchemeInfo>,
    pub(crate) name_map: NameMap,
    pub(crate) claimed_names: HashSet<String>,
    pub(crate) report: Report,
}

impl Registry {
    pub fn new(options: Options) -> Self {
        Self {
            options,
            operations: IndexMap::new(),
            defs: Vec::new(),
            security_schemes: IndexMap::new(),
            name_map: NameMap::new(),
            claimed_names: HashSet::new(),
            report: Report::default(),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Operations keyed by operation id, in document order.
    pub fn operations(&self) -> &IndexMap<String, Operation> {
        &self.operations
    }

    pub fn operation(&self, operation_id: &str) -> Option<&Operation> {
        self.operations.get(operation_id)
    }

    pub fn defs(&self) -> &[DataDefinition] {
        &self.defs
    }

    /// Panics on an id that was not handed out by this registry.
    pub fn def(&self, id: DefId) -> &DataDefinition {
        &self.defs[id]
    }

    pub fn security_schemes(&self) -> &IndexMap<String, SecuritySchemeInfo> {
        &self.security_schemes
    }

    pub fn name_map(&self) -> &NameMap {
        &self.name_map
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    /// Record a recoverable problem. In strict mode it becomes an error.
    pub(crate) fn warn(
        &mut self,
        kind: WarningKind,
        message: impl Into<String>,
        mitigation: impl Into<String>,
    ) -> Result<()> {
        record_warning(&mut self.report, self.options.strict, kind, message, mitigation)
    }

    /// Case style for field and argument names.
    pub(crate) fn field_case(&self) -> CaseStyle {
        if self.options.simple_names {
            CaseStyle::Simple
        } else {
            CaseStyle::CamelCase
        }
    }

    /// Case style for type names.
    pub(crate) fn type_case(&self) -> CaseStyle {
        if self.options.simple_names {
            CaseStyle::Simple
        } else {
            CaseStyle::PascalCase
        }
    }

    /// Sanitize a field name and remember its original.
    pub(crate) fn store_field_name(&mut self, raw: &str) -> String {
        let style = self.field_case();
        self.name_map.sanitize_and_store(raw, style)
    }

    /// Sanitize a field name without storing it.
    pub fn field_name(&self, raw: &str) -> String {
        sanitize(raw, self.field_case())
    }

    pub(crate) fn type_name(&self, raw: &str) -> String {
        sanitize(raw, self.type_case())
    }

    /// Pick the union member a value belongs to: the first member whose
    /// properties cover every key of the value, else the member sharing the
    /// most keys. `sanitized` says whether the value's keys are sanitized.
    pub(crate) fn select_union_member(
        &self,
        members: &[DefId],
        value: &serde_json::Map<String, serde_json::Value>,
        sanitized: bool,
    ) -> Option<DefId> {
        let matching = |member: DefId| -> (usize, bool) {
            let names: HashSet<String> = self.defs[member]
                .properties()
                .map(|props| {
                    props
                        .keys()
                        .map(|k| if sanitized { self.field_name(k) } else { k.clone() })
                        .collect()
                })
                .unwrap_or_default();
            let shared = value.keys().filter(|k| names.contains(*k)).count();
            (shared, shared == value.len())
        };

        if let Some(member) = members.iter().copied().find(|m| matching(*m).1) {
            return Some(member);
        }
        members
            .iter()
            .copied()
            .enumerate()
            .max_by_key(|(i, m)| (matching(*m).0, std::cmp::Reverse(*i)))
            .map(|(_, m)| m)
    }
}
