//! Field extraction, comparison and output formatting for JSON audit events.
//!
//! Rule conditions and output templates name event fields such as
//! `ka.user.name` or `ka.req.volume.hostpath[/etc]`. The [`FilterFactory`]
//! binds those names to JSON pointers and value transforms once; the bound
//! fields are then evaluated against any number of [`JsonEvent`]s.

pub mod alias;
pub mod comparator;
pub mod error;
pub mod event;
pub mod factory;
pub mod field_check;
pub mod filter;
pub mod formatter;
pub mod jevt;
pub mod k8s_audit;
pub mod output;
pub mod pointer;
pub mod range;
pub mod transform;
pub mod utils;

pub use error::{EngineError, Result};

pub use event::{json_as_string, JsonEvent, NOT_AVAILABLE};

pub use pointer::JsonPointer;

pub use alias::{
    AliasMatch,             // Result of a table lookup
    AliasTable,             // Ordered field name registry
    FieldAlias,             // Pointer, transform and index rules of a field
    IndexMode,              // Whether an index is allowed
    IndexType,              // What an index may contain
};

pub use field_check::{
    BoundField,             // Field reference ready for extraction
    CheckInfo,              // Field catalog of one group
    FieldGroup,             // The jevt and ka groups
    FieldInfo,              // Catalog entry of one field
};

pub use jevt::JevtFields;
pub use k8s_audit::K8sAuditFields;

pub use transform::{
    BoundIndex, ContainerFlag, Quantifier, SecurityId, Transform, MISSING_PROPERTY,
};

pub use range::RangeSpec;

pub use utils::GlobPattern;

pub use comparator::{compare, ComparisonOp, FilterCheck};

pub use filter::FilterExpr;

pub use factory::FilterFactory;

pub use formatter::{EventFormatter, FormatToken};

pub use output::{OutputConfig, OutputFormatter};
