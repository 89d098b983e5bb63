//! Output templates.
//!
//! A template such as `"user=%ka.user.name verb=%ka.verb"` is compiled once
//! into a list of literal and field tokens, then rendered against many
//! events. A leading `*` on the template is accepted and ignored.

use crate::error::{EngineError, Result};
use crate::event::JsonEvent;
use crate::factory::FilterFactory;
use crate::field_check::BoundField;
use log::debug;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One piece of a compiled template.
#[derive(Debug, Clone, PartialEq)]
pub enum FormatToken {
    /// Text copied to the output as-is
    Literal(String),
    /// A field whose extracted value is substituted
    Field(BoundField),
}

/// A compiled output template.
#[derive(Debug, Clone, PartialEq)]
pub struct EventFormatter {
    format: String,
    tokens: Vec<FormatToken>,
}

impl EventFormatter {
    /// Compiles `format`, resolving each `%field` through `factory`.
    ///
    /// Fails if a `%` is not followed by a known field.
    pub fn compile(factory: &FilterFactory, format: &str) -> Result<Self> {
        let body = format.strip_prefix('*').unwrap_or(format);
        let mut tokens: Vec<FormatToken> = Vec::new();
        let mut cur = 0;

        while cur < body.len() {
            let rest = &body[cur..];

            let (token, len) = match rest.strip_prefix('%') {
                Some(field_text) => {
                    if field_text.is_empty() || field_text.starts_with('%') {
                        return Err(EngineError::EmptyFormatField(format.to_string()));
                    }
                    cur += 1;
                    let (field, len) = factory.new_filtercheck(field_text)?.ok_or_else(|| {
                        EngineError::UnknownFormatField {
                            format: format.to_string(),
                            rest: field_text.to_string(),
                        }
                    })?;
                    (FormatToken::Field(field), len)
                }
                None => {
                    let len = rest.find('%').unwrap_or(rest.len());
                    (FormatToken::Literal(rest[..len].to_string()), len)
                }
            };

            tokens.push(token);
            cur += len;
        }

        debug!("compiled output format \"{}\" into {} tokens", format, tokens.len());

        Ok(EventFormatter {
            format: format.to_string(),
            tokens,
        })
    }

    /// The template text as given.
    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn tokens(&self) -> &[FormatToken] {
        &self.tokens
    }

    /// Renders every token: `("", text)` for literals, `(field, value)` for
    /// fields.
    pub fn resolve_tokens(&self, event: &JsonEvent) -> Vec<(String, String)> {
        self.tokens
            .iter()
            .map(|token| match token {
                FormatToken::Literal(text) => (String::new(), text.clone()),
                FormatToken::Field(field) => (field.field().to_string(), field.extract(event)),
            })
            .collect()
    }

    /// Renders the template as text.
    pub fn to_text(&self, event: &JsonEvent) -> String {
        self.tokens
            .iter()
            .map(|token| match token {
                FormatToken::Literal(text) => text.clone(),
                FormatToken::Field(field) => field.extract(event),
            })
            .collect()
    }

    /// Field values keyed by field name. Literals are skipped; a field that
    /// appears twice keeps its last value.
    pub fn field_values(&self, event: &JsonEvent) -> BTreeMap<String, String> {
        self.tokens
            .iter()
            .filter_map(|token| match token {
                FormatToken::Literal(_) => None,
                FormatToken::Field(field) => Some((field.field().to_string(), field.extract(event))),
            })
            .collect()
    }

    /// Renders the field values as a JSON object of strings.
    pub fn to_json(&self, event: &JsonEvent) -> String {
        let map: Map<String, Value> = self
            .field_values(event)
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        Value::Object(map).to_string()
    }
}
