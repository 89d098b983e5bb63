// The `jevt` field group: generic access to any JSON event. It has a fixed
// set of fields, matched by plain prefix, plus `jevt.value[<pointer>]`
// which reads an arbitrary property.

use crate::error::{EngineError, Result};
use crate::field_check::{BoundField, CheckInfo, FieldSource};
use crate::pointer::JsonPointer;
use crate::transform::{BoundIndex, Transform};

pub const JEVT_TIME: &str = "jevt.time";
pub const JEVT_TIME_ISO_8601: &str = "jevt.time.iso8601";
pub const JEVT_RAWTIME: &str = "jevt.rawtime";
pub const JEVT_VALUE: &str = "jevt.value";
pub const JEVT_OBJ: &str = "jevt.obj";

/// The `jevt` fields.
#[derive(Debug, Clone)]
pub struct JevtFields {
    info: CheckInfo,
}

impl JevtFields {
    pub fn new() -> Self {
        JevtFields {
            info: CheckInfo::new(
                "jevt",
                "generic ways to access json events",
                &[
                    (JEVT_TIME, "json event timestamp as a string that includes the nanosecond part"),
                    (JEVT_TIME_ISO_8601, "json event timestamp in ISO 8601 format, including nanoseconds and time zone offset (in UTC)"),
                    (JEVT_RAWTIME, "absolute event timestamp, i.e. nanoseconds from epoch."),
                    (JEVT_VALUE, "General way to access single property from json object. The syntax is [<json pointer expression>]. The property is returned as a string"),
                    (JEVT_OBJ, "The entire json object, stringified"),
                ],
            ),
        }
    }

    pub fn info(&self) -> &CheckInfo {
        &self.info
    }

    /// Parses a `jevt` field at the start of `raw`.
    ///
    /// The time and object fields are matched by prefix, longest first.
    /// `jevt.value` must be followed by a bracketed JSON pointer, which is
    /// validated here.
    pub fn parse_field_name(&self, raw: &str) -> Result<Option<(BoundField, usize)>> {
        let fixed = [
            (JEVT_TIME_ISO_8601, FieldSource::TimeIso8601),
            (JEVT_TIME, FieldSource::Time),
            (JEVT_RAWTIME, FieldSource::RawTime),
            (JEVT_OBJ, FieldSource::Object),
        ];

        for (name, source) in fixed {
            if raw.starts_with(name) {
                let field = BoundField::new(name, BoundIndex::default(), source);
                return Ok(Some((field, name.len())));
            }
        }

        if raw.starts_with(JEVT_VALUE) {
            return parse_value_selector(raw).map(Some);
        }

        Ok(None)
    }
}

impl Default for JevtFields {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_value_selector(raw: &str) -> Result<(BoundField, usize)> {
    let selector = raw[JEVT_VALUE.len()..]
        .strip_prefix('[')
        .and_then(|rest| rest.find(']').map(|end| &rest[..end]))
        .ok_or_else(|| EngineError::InvalidJevtValue(raw.to_string()))?;

    let pointer = JsonPointer::parse(selector).map_err(|reason| EngineError::InvalidSelector {
        raw: raw.to_string(),
        reason,
    })?;

    // The selector is part of the field name
    let consumed = JEVT_VALUE.len() + selector.len() + 2;
    let field = &raw[..consumed];

    let source = FieldSource::Pointer {
        pointer,
        transform: Transform::Default,
    };

    Ok((BoundField::new(field, BoundIndex::default(), source), consumed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::JsonEvent;
    use serde_json::json;

    fn parse(raw: &str) -> Option<(BoundField, usize)> {
        JevtFields::new().parse_field_name(raw).unwrap()
    }

    #[test]
    fn test_time_fields_prefer_longest() {
        let (f, len) = parse("jevt.time.iso8601 rest").unwrap();
        assert_eq!(f.field(), JEVT_TIME_ISO_8601);
        assert_eq!(len, JEVT_TIME_ISO_8601.len());

        let (f, len) = parse("jevt.time rest").unwrap();
        assert_eq!(f.field(), JEVT_TIME);
        assert_eq!(len, JEVT_TIME.len());
    }

    #[test]
    fn test_value_selector() {
        let (f, len) = parse("jevt.value[/user/username] rest").unwrap();
        assert_eq!(f.field(), "jevt.value[/user/username]");
        assert_eq!(len, "jevt.value[/user/username]".len());

        let evt = JsonEvent::from_value(json!({"user": {"username": "bob"}}), 0);
        assert_eq!(f.extract(&evt), "bob");
        let empty = JsonEvent::from_value(json!({}), 0);
        assert_eq!(f.extract(&empty), "<NA>");
    }

    #[test]
    fn test_value_requires_brackets() {
        let fields = JevtFields::new();
        let err = fields.parse_field_name("jevt.value").unwrap_err();
        assert!(matches!(err, EngineError::InvalidJevtValue(_)));
        let err = fields.parse_field_name("jevt.value[/a").unwrap_err();
        assert!(matches!(err, EngineError::InvalidJevtValue(_)));
    }

    #[test]
    fn test_value_invalid_selector() {
        let err = JevtFields::new()
            .parse_field_name("jevt.value[user]")
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidSelector { .. }));
        assert!(err.to_string().contains("jevt.value[user]"));
    }

    #[test]
    fn test_unknown_field() {
        assert!(parse("ka.verb").is_none());
        assert!(parse("jevt.other").is_none());
    }

    #[test]
    fn test_catalog() {
        let fields = JevtFields::new();
        assert_eq!(fields.info().name, "jevt");
        assert_eq!(fields.info().fields.len(), 5);
    }
}
