// Alert rendering: turns a matched event, the rule that matched and the
// rule's output template into the text or JSON line emitted to operators.

use crate::error::{EngineError, Result};
use crate::event::JsonEvent;
use crate::factory::FilterFactory;
use crate::formatter::EventFormatter;
use crate::utils::{ts_to_iso_8601, ts_to_string};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Emit one JSON object per alert instead of a text line
    pub json_output: bool,
    /// Include the rendered text line as `output` in JSON alerts
    pub json_include_output_property: bool,
    /// Use ISO 8601 UTC time in text alerts
    pub time_format_iso_8601: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json_output: false,
            json_include_output_property: true,
            time_format_iso_8601: false,
        }
    }
}

impl OutputConfig {
    /// Parses a configuration from JSON text. Missing keys take their
    /// default values.
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| EngineError::InvalidConfig(e.to_string()))
    }

    /// Loads a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

// ============================================================================
// OUTPUT FORMATTER
// ============================================================================

#[derive(Serialize)]
struct JsonAlert<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<&'a str>,
    priority: &'a str,
    rule: &'a str,
    time: String,
    output_fields: BTreeMap<String, String>,
}

/// Renders alerts, compiling each distinct template once.
///
/// Compiled templates are cached and shared by all callers; rendering
/// itself takes no lock.
#[derive(Debug)]
pub struct OutputFormatter {
    factory: Arc<FilterFactory>,
    config: OutputConfig,
    formatters: RwLock<HashMap<String, Arc<EventFormatter>>>,
}

impl OutputFormatter {
    pub fn new(factory: Arc<FilterFactory>, config: OutputConfig) -> Self {
        Self {
            factory,
            config,
            formatters: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    /// Number of compiled templates held in the cache.
    pub fn cached_formats(&self) -> usize {
        self.formatters.read().len()
    }

    /// Returns the compiled form of `format`, compiling it on first use.
    pub fn formatter(&self, format: &str) -> Result<Arc<EventFormatter>> {
        if let Some(found) = self.formatters.read().get(format) {
            return Ok(Arc::clone(found));
        }

        let compiled = Arc::new(EventFormatter::compile(&self.factory, format)?);

        let mut formatters = self.formatters.write();
        let entry = formatters
            .entry(format.to_string())
            .or_insert_with(|| Arc::clone(&compiled));
        Ok(Arc::clone(entry))
    }

    /// Renders one alert for `event`.
    ///
    /// Text alerts are `"<time>: <priority> <message>"`. JSON alerts carry
    /// the priority, rule name, ISO 8601 time and the template's field
    /// values, plus the text line as `output` when so configured.
    pub fn format_event(
        &self,
        event: &JsonEvent,
        rule: &str,
        priority: &str,
        format: &str,
    ) -> Result<String> {
        let formatter = self.formatter(format)?;
        let message = formatter.to_text(event);

        let time = if self.config.time_format_iso_8601 {
            ts_to_iso_8601(event.ts())
        } else {
            ts_to_string(event.ts())
        };
        let line = format!("{}: {} {}", time, priority, message);

        if !self.config.json_output {
            return Ok(line);
        }

        let alert = JsonAlert {
            output: self
                .config
                .json_include_output_property
                .then_some(line.as_str()),
            priority,
            rule,
            time: ts_to_iso_8601(event.ts()),
            output_fields: formatter.field_values(event),
        };

        Ok(serde_json::to_string(&alert)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TS: u64 = 1_556_912_734_123_456_789;
    const FORMAT: &str = "%ka.user.name created %ka.target.resource";

    fn event() -> JsonEvent {
        JsonEvent::from_value(
            json!({"user": {"username": "bob"}, "verb": "create", "objectRef": {"resource": "pods"}}),
            TS,
        )
    }

    fn formatter(config: OutputConfig) -> OutputFormatter {
        OutputFormatter::new(Arc::new(FilterFactory::new()), config)
    }

    #[test]
    fn test_config_defaults() {
        let config = OutputConfig::default();
        assert!(!config.json_output);
        assert!(config.json_include_output_property);
        assert!(!config.time_format_iso_8601);

        let parsed = OutputConfig::from_json_str(r#"{"json_output": true}"#).unwrap();
        assert!(parsed.json_output);
        assert!(parsed.json_include_output_property);
    }

    #[test]
    fn test_config_invalid() {
        let err = OutputConfig::from_json_str(r#"{"json_output": "yes"}"#).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"json_output": true, "time_format_iso_8601": true}}"#).unwrap();

        let config = OutputConfig::from_file(file.path()).unwrap();
        assert!(config.json_output);
        assert!(config.time_format_iso_8601);

        let err = OutputConfig::from_file("/nonexistent/output.json").unwrap_err();
        assert!(matches!(err, EngineError::Io(_)));
    }

    #[test]
    fn test_text_alert_iso_time() {
        let out = formatter(OutputConfig {
            time_format_iso_8601: true,
            ..OutputConfig::default()
        });
        let line = out.format_event(&event(), "Create Pod", "Warning", FORMAT).unwrap();
        assert_eq!(line, "2019-05-03T19:45:34.123456789Z: Warning bob created pods");
    }

    #[test]
    fn test_text_alert_local_time() {
        let out = formatter(OutputConfig::default());
        let line = out.format_event(&event(), "Create Pod", "Notice", FORMAT).unwrap();
        assert!(line.ends_with(": Notice bob created pods"));
        assert!(line.contains(".123456789"));
    }

    #[test]
    fn test_json_alert() {
        let out = formatter(OutputConfig {
            json_output: true,
            ..OutputConfig::default()
        });
        let line = out.format_event(&event(), "Create Pod", "Warning", FORMAT).unwrap();
        let alert: Value = serde_json::from_str(&line).unwrap();

        assert_eq!(alert["rule"], "Create Pod");
        assert_eq!(alert["priority"], "Warning");
        assert_eq!(alert["time"], "2019-05-03T19:45:34.123456789Z");
        assert_eq!(
            alert["output_fields"],
            json!({"ka.user.name": "bob", "ka.target.resource": "pods"})
        );
        assert!(alert["output"].as_str().unwrap().ends_with("Warning bob created pods"));
    }

    #[test]
    fn test_json_alert_without_output() {
        let out = formatter(OutputConfig {
            json_output: true,
            json_include_output_property: false,
            ..OutputConfig::default()
        });
        let line = out.format_event(&event(), "r", "Info", FORMAT).unwrap();
        let alert: Value = serde_json::from_str(&line).unwrap();
        assert!(alert.get("output").is_none());
    }

    #[test]
    fn test_formatters_are_cached() {
        let out = formatter(OutputConfig::default());
        let a = out.formatter(FORMAT).unwrap();
        let b = out.formatter(FORMAT).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(out.cached_formats(), 1);

        assert!(out.format_event(&event(), "r", "Info", "%nope").is_err());
        assert_eq!(out.cached_formats(), 1);
    }
}
