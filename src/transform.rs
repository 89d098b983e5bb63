// Field specific value transforms.
//
// A transform receives the JSON value found at the field's pointer, the
// canonical field name and the raw index argument, and renders the text
// the field extracts to. Transforms never fail: missing structure resolves
// to "<NA>", "N/A", "false" or "0" depending on the transform.

use crate::event::{json_as_string, NOT_AVAILABLE};
use crate::range::RangeSpec;
use crate::utils::{query_param, split_container_image, split_string_set, GlobPattern};
use log::warn;
use serde_json::Value;
use std::collections::BTreeSet;

/// Placeholder for a missing sub-property of an array element.
pub const MISSING_PROPERTY: &str = "N/A";

const TRUE: &str = "true";
const FALSE: &str = "false";

/// Whether a check must hold for every item or for at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantifier {
    Any,
    All,
}

/// The security context id a run-as transform looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityId {
    /// `securityContext/runAsUser`
    User,
    /// `securityContext/runAsGroup`
    Group,
}

impl SecurityId {
    fn key(&self) -> &'static str {
        match self {
            SecurityId::User => "runAsUser",
            SecurityId::Group => "runAsGroup",
        }
    }
}

/// Per-container boolean security context flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerFlag {
    /// `securityContext/privileged`
    Privileged,
    /// `securityContext/allowPrivilegeEscalation`
    AllowPrivilegeEscalation,
}

impl ContainerFlag {
    fn key(&self) -> &'static str {
        match self {
            ContainerFlag::Privileged => "privileged",
            ContainerFlag::AllowPrivilegeEscalation => "allowPrivilegeEscalation",
        }
    }
}

/// How the value at a field's pointer is turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Transform {
    /// Strings as-is, anything else as compact JSON.
    #[default]
    Default,
    /// Image of the indexed container (default first); fields ending in
    /// `.repository` only get the repository part.
    Image,
    /// `true` if any subject has a `name` equal to the index.
    HasName,
    /// Decoded value of the query parameter named by the index.
    QueryParam,
    /// Whole value, or the indexed element.
    Generic,
    /// The property named by the last component of the field name, taken
    /// from every element (space separated) or from the indexed element.
    Select,
    /// A boolean container flag, for the indexed container or any container.
    ContainerFlag(ContainerFlag),
    /// Whether the indexed container, or any container, lacks a
    /// read-only root filesystem.
    ReadWriteFs,
    /// Whether a run-as id is set at pod level or on any container.
    HasRunAs(SecurityId),
    /// The effective run-as id: pod level, else the indexed container,
    /// else 0.
    RunAs(SecurityId),
    /// Run-as ids of all containers checked against the index ranges.
    RunAsWithin(SecurityId, Quantifier),
    /// All supplemental groups lie within the index ranges.
    SupplementalGroupsWithin,
    /// Host path volumes mount paths matching the index globs.
    HostPathVolumes(Quantifier),
    /// All flexVolume drivers are in the index set.
    FlexVolumeDrivers,
    /// All volume types are in the index set.
    VolumeTypes,
    /// All capabilities are in the index set.
    AllowedCapabilities,
    /// All host ports lie within the index ranges.
    HostPortWithin,
}

impl Transform {
    /// Renders `value` for the field `field` with the bound index `index`
    /// (empty when the field was referenced without one).
    pub fn apply(&self, value: &Value, field: &str, index: &BoundIndex) -> String {
        let raw = index.as_str();
        match self {
            Transform::Default => json_as_string(value),
            Transform::Image => index_image(value, field, raw),
            Transform::HasName => bool_str(has_name(value, raw)),
            Transform::QueryParam => value
                .as_str()
                .and_then(|uri| query_param(uri, raw))
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            Transform::Generic => index_generic(value, raw),
            Transform::Select => index_select(value, field, raw),
            Transform::ContainerFlag(flag) => bool_str(container_flag(value, *flag, raw)),
            Transform::ReadWriteFs => bool_str(read_write_fs(value, raw)),
            Transform::HasRunAs(id) => bool_str(has_run_as(value, *id)),
            Transform::RunAs(id) => run_as(value, *id, raw),
            Transform::RunAsWithin(id, quantifier) => {
                bool_str(run_as_within(value, *id, *quantifier, field, raw))
            }
            Transform::SupplementalGroupsWithin => {
                bool_str(supplemental_groups_within(value, field, raw))
            }
            Transform::HostPathVolumes(quantifier) => {
                bool_str(host_path_volumes(value, *quantifier, index.globs()))
            }
            Transform::FlexVolumeDrivers => bool_str(flex_volume_drivers(value, raw)),
            Transform::VolumeTypes => bool_str(volume_types(value, raw)),
            Transform::AllowedCapabilities => bool_str(allowed_capabilities(value, raw)),
            Transform::HostPortWithin => bool_str(host_port_within(value, field, raw)),
        }
    }
}

/// The bracketed index of a bound field, ready for repeated evaluation.
///
/// Host path patterns are compiled here, once per field reference, rather
/// than on every event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundIndex {
    raw: String,
    globs: Vec<GlobPattern>,
}

impl BoundIndex {
    /// Prepares `raw` as the index of a field using `transform`.
    ///
    /// Fails if `transform` matches globs and one of the comma separated
    /// patterns does not compile.
    pub fn new(transform: Transform, raw: &str) -> Result<Self, regex::Error> {
        let globs = match transform {
            Transform::HostPathVolumes(_) => split_string_set(raw, ',')
                .iter()
                .map(|pattern| GlobPattern::new(pattern))
                .collect::<Result<Vec<_>, _>>()?,
            _ => Vec::new(),
        };

        Ok(BoundIndex {
            raw: raw.to_string(),
            globs,
        })
    }

    /// The index text as written, empty when there was none.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn globs(&self) -> &[GlobPattern] {
        &self.globs
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn bool_str(b: bool) -> String {
    let s = if b { TRUE } else { FALSE };
    s.to_string()
}

// Iterates the way a JSON container is walked: array elements, object
// values, nothing for null and the value itself for any other scalar.
fn items(value: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match value {
        Value::Array(arr) => Box::new(arr.iter()),
        Value::Object(map) => Box::new(map.values()),
        Value::Null => Box::new(std::iter::empty()),
        other => Box::new(std::iter::once(other)),
    }
}

// The indexed array element. Index validation at parse time guarantees
// digits only; an overflowing index is simply out of range.
fn element<'a>(value: &'a Value, index: &str) -> Option<&'a Value> {
    index.parse::<usize>().ok().and_then(|i| value.get(i))
}

fn security_context<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.get("securityContext").and_then(|ctx| ctx.get(key))
}

fn parse_ranges(field: &str, index: &str) -> Option<RangeSpec> {
    let ranges = RangeSpec::parse(index);
    if ranges.is_none() {
        warn!("{}: could not parse range list \"{}\"", field, index);
    }
    ranges
}

// ============================================================================
// INDEXED ACCESS
// ============================================================================

fn index_image(value: &Value, field: &str, index: &str) -> String {
    let container = if index.is_empty() {
        value.get(0)
    } else {
        element(value, index)
    };

    let Some(image) = container
        .and_then(|c| c.get("image"))
        .and_then(Value::as_str)
    else {
        return NOT_AVAILABLE.to_string();
    };

    if field.ends_with(".repository") {
        return split_container_image(image).name;
    }

    image.to_string()
}

fn has_name(value: &Value, index: &str) -> bool {
    items(value).any(|subject| {
        subject
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(MISSING_PROPERTY)
            == index
    })
}

fn index_generic(value: &Value, index: &str) -> String {
    if index.is_empty() {
        return json_as_string(value);
    }

    element(value, index)
        .map(json_as_string)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn index_select(value: &Value, field: &str, index: &str) -> String {
    let prop = field.rsplit('.').next().unwrap_or(field);

    if !index.is_empty() {
        return element(value, index)
            .and_then(|obj| obj.get(prop))
            .map(json_as_string)
            .unwrap_or_else(|| MISSING_PROPERTY.to_string());
    }

    let mut ret = String::new();
    for obj in items(value) {
        if !ret.is_empty() {
            ret.push(' ');
        }
        match obj.get(prop) {
            Some(v) => ret.push_str(&json_as_string(v)),
            None => ret.push_str(MISSING_PROPERTY),
        }
    }
    ret
}

// ============================================================================
// CONTAINER SECURITY CONTEXT
// ============================================================================

fn container_flag(value: &Value, flag: ContainerFlag, index: &str) -> bool {
    let flag_of = |container: &Value| {
        security_context(container, flag.key())
            .and_then(Value::as_bool)
            .unwrap_or(false)
    };

    if index.is_empty() {
        items(value).any(flag_of)
    } else {
        element(value, index).map(flag_of).unwrap_or(false)
    }
}

fn read_write_fs(value: &Value, index: &str) -> bool {
    // Without readOnlyRootFilesystem the root filesystem is writable
    let writable = |container: &Value| {
        security_context(container, "readOnlyRootFilesystem")
            .and_then(Value::as_bool)
            .map(|read_only| !read_only)
            .unwrap_or(true)
    };

    if index.is_empty() {
        items(value).any(writable)
    } else {
        element(value, index).map(writable).unwrap_or(true)
    }
}

fn containers(spec: &Value) -> Option<&Value> {
    spec.get("containers")
}

fn has_run_as(spec: &Value, id: SecurityId) -> bool {
    if security_context(spec, id.key()).is_some() {
        return true;
    }

    containers(spec)
        .map(|list| items(list).any(|c| security_context(c, id.key()).is_some()))
        .unwrap_or(false)
}

fn run_as(spec: &Value, id: SecurityId, index: &str) -> String {
    // Pod level takes precedence over any container
    if let Some(v) = security_context(spec, id.key()) {
        return json_as_string(v);
    }

    let container = containers(spec).and_then(|list| {
        if index.is_empty() {
            list.get(0)
        } else {
            element(list, index)
        }
    });

    container
        .and_then(|c| security_context(c, id.key()))
        .map(json_as_string)
        .unwrap_or_else(|| "0".to_string())
}

// Every effective run-as id: the pod level id alone if set, otherwise one
// per container with unset ids counting as 0.
fn all_run_as_ids(spec: &Value, id: SecurityId) -> BTreeSet<i64> {
    let mut ids = BTreeSet::new();

    if let Some(pod_id) = security_context(spec, id.key()).and_then(Value::as_i64) {
        ids.insert(pod_id);
        return ids;
    }

    match containers(spec) {
        Some(list) => {
            for container in items(list) {
                let cid = security_context(container, id.key())
                    .and_then(Value::as_i64)
                    .unwrap_or(0);
                ids.insert(cid);
            }
        }
        None => {
            ids.insert(0);
        }
    }

    ids
}

fn run_as_within(
    spec: &Value,
    id: SecurityId,
    quantifier: Quantifier,
    field: &str,
    index: &str,
) -> bool {
    let Some(ranges) = parse_ranges(field, index) else {
        return false;
    };

    let ids = all_run_as_ids(spec, id);

    match quantifier {
        Quantifier::All => ranges.contains_all(&ids),
        Quantifier::Any => ranges.contains_any(&ids),
    }
}

fn supplemental_groups_within(spec: &Value, field: &str, index: &str) -> bool {
    let Some(ranges) = parse_ranges(field, index) else {
        return false;
    };

    // No groups, so can't be within
    let Some(groups) = security_context(spec, "supplementalGroups") else {
        return false;
    };

    items(groups).all(|gid| gid.as_i64().map(|g| ranges.contains(g)).unwrap_or(false))
}

fn allowed_capabilities(value: &Value, index: &str) -> bool {
    let allowed = split_string_set(index, ',');

    items(value).all(|cap| cap.as_str().map(|c| allowed.contains(c)).unwrap_or(false))
}

fn host_port_within(value: &Value, field: &str, index: &str) -> bool {
    let Some(ranges) = parse_ranges(field, index) else {
        return false;
    };

    for container in items(value) {
        // Containers without ports are within any range
        let Some(ports) = container.get("ports") else {
            continue;
        };

        for port in items(ports) {
            let resolved = port
                .get("hostPort")
                .or_else(|| port.get("containerPort"))
                .and_then(Value::as_i64);

            match resolved {
                Some(p) if ranges.contains(p) => {}
                _ => return false,
            }
        }
    }

    true
}

// ============================================================================
// VOLUMES
// ============================================================================

fn host_path_volumes(spec: &Value, quantifier: Quantifier, globs: &[GlobPattern]) -> bool {
    let Some(volumes) = spec.get("volumes") else {
        return true;
    };

    let mut eligible = 0usize;
    let mut matched = 0usize;

    for vol in items(volumes).filter(|v| v.get("hostPath").is_some()) {
        eligible += 1;

        let host_path = vol
            .get("hostPath")
            .and_then(|hp| hp.get("path"))
            .and_then(Value::as_str)
            .unwrap_or(MISSING_PROPERTY);

        if globs.iter().any(|glob| glob.matches(host_path)) {
            matched += 1;
        }
    }

    match quantifier {
        Quantifier::Any => matched > 0,
        Quantifier::All => matched == eligible,
    }
}

fn flex_volume_drivers(spec: &Value, index: &str) -> bool {
    let Some(volumes) = spec.get("volumes") else {
        return true;
    };

    let drivers = split_string_set(index, ',');

    items(volumes)
        .filter_map(|vol| vol.get("flexVolume"))
        .all(|flex| {
            let driver = flex
                .get("driver")
                .and_then(Value::as_str)
                .unwrap_or(MISSING_PROPERTY);
            drivers.contains(driver)
        })
}

fn volume_types(spec: &Value, index: &str) -> bool {
    let Some(volumes) = spec.get("volumes") else {
        return true;
    };

    let allowed = split_string_set(index, ',');

    // Any key other than "name" is a volume type
    items(volumes).all(|vol| match vol.as_object() {
        Some(map) => map
            .keys()
            .filter(|k| k.as_str() != "name")
            .all(|k| allowed.contains(k)),
        None => true,
    })
}
