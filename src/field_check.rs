//! Field references bound to a field group, and value extraction.
//!
//! A [`BoundField`] is produced once per occurrence of a field in a rule
//! or output template and is immutable afterwards. Extraction builds a
//! fresh string on every call, so one bound field can be evaluated against
//! many events from many threads at once.

use crate::error::Result;
use crate::event::{JsonEvent, NOT_AVAILABLE};
use crate::jevt::JevtFields;
use crate::k8s_audit::K8sAuditFields;
use crate::pointer::JsonPointer;
use crate::transform::{BoundIndex, Transform};
use crate::utils::{ts_to_iso_8601, ts_to_string};
use serde::Serialize;

// ============================================================================
// FIELD CATALOG
// ============================================================================

/// Name and description of one field, for help output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldInfo {
    pub name: String,
    pub description: String,
}

/// The documented fields of one field group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckInfo {
    /// Group name, the common prefix of its fields (`ka`, `jevt`)
    pub name: String,
    /// One line summary of the group
    pub description: String,
    pub fields: Vec<FieldInfo>,
}

impl CheckInfo {
    pub(crate) fn new(name: &str, description: &str, fields: &[(&str, &str)]) -> Self {
        CheckInfo {
            name: name.to_string(),
            description: description.to_string(),
            fields: fields
                .iter()
                .map(|(name, description)| FieldInfo {
                    name: name.to_string(),
                    description: description.to_string(),
                })
                .collect(),
        }
    }
}

// ============================================================================
// BOUND FIELDS
// ============================================================================

/// Where a bound field takes its value from.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FieldSource {
    /// A value inside the event body
    Pointer {
        pointer: JsonPointer,
        transform: Transform,
    },
    /// Event time as local `HH:MM:SS.nnnnnnnnn`
    Time,
    /// Event time in ISO 8601 UTC
    TimeIso8601,
    /// Event time in nanoseconds
    RawTime,
    /// The whole event body
    Object,
}

/// A field name resolved against a field group, ready for extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundField {
    field: String,
    index: BoundIndex,
    source: FieldSource,
}

impl BoundField {
    pub(crate) fn new(field: impl Into<String>, index: BoundIndex, source: FieldSource) -> Self {
        BoundField {
            field: field.into(),
            index,
            source,
        }
    }

    /// The canonical field name (for `jevt.value`, including its selector).
    pub fn field(&self) -> &str {
        &self.field
    }

    /// The raw index argument, empty if none was given.
    pub fn index(&self) -> &str {
        self.index.as_str()
    }

    /// Extracts the field's value from `event` as text.
    ///
    /// Returns `"<NA>"` when the field's path is absent from the event.
    pub fn extract(&self, event: &JsonEvent) -> String {
        match &self.source {
            FieldSource::Pointer { pointer, transform } => match event.lookup(pointer) {
                Some(value) => transform.apply(value, &self.field, &self.index),
                None => NOT_AVAILABLE.to_string(),
            },
            FieldSource::Time => ts_to_string(event.ts()),
            FieldSource::TimeIso8601 => ts_to_iso_8601(event.ts()),
            FieldSource::RawTime => event.ts().to_string(),
            FieldSource::Object => event.value().to_string(),
        }
    }
}

// ============================================================================
// FIELD GROUPS
// ============================================================================

/// The closed set of field groups.
#[derive(Debug, Clone)]
pub enum FieldGroup {
    /// Generic access to any JSON event (`jevt.*`)
    Jevt(JevtFields),
    /// Kubernetes audit events (`ka.*`)
    K8sAudit(K8sAuditFields),
}

impl FieldGroup {
    /// Parses a field reference at the start of `raw`.
    ///
    /// Returns the bound field and the number of bytes it took, or
    /// `Ok(None)` if no field of this group starts `raw`.
    pub fn parse_field_name(&self, raw: &str) -> Result<Option<(BoundField, usize)>> {
        match self {
            FieldGroup::Jevt(fields) => fields.parse_field_name(raw),
            FieldGroup::K8sAudit(fields) => fields.parse_field_name(raw),
        }
    }

    /// The group's field catalog.
    pub fn info(&self) -> &CheckInfo {
        match self {
            FieldGroup::Jevt(fields) => fields.info(),
            FieldGroup::K8sAudit(fields) => fields.info(),
        }
    }
}
