// JSON pointer paths (RFC 6901) used to locate a field inside an event.
// Pointers are parsed and validated once, when the alias tables are built
// or when a jevt.value[...] selector is parsed, and then resolved many
// times against incoming events.

use serde_json::Value;
use std::fmt;

/// A parsed JSON pointer such as `/annotations/authorization.k8s.io~1decision`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JsonPointer {
    /// The pointer text as written
    raw: String,
    /// Unescaped reference tokens
    tokens: Vec<String>,
}

impl JsonPointer {
    /// Parses a pointer expression.
    ///
    /// The empty string refers to the whole document. Any other expression
    /// must start with `/`. Within a token `~1` stands for `/` and `~0`
    /// for `~`; any other use of `~` is rejected.
    pub fn parse(raw: &str) -> Result<Self, String> {
        if raw.is_empty() {
            return Ok(JsonPointer {
                raw: String::new(),
                tokens: Vec::new(),
            });
        }

        let Some(rest) = raw.strip_prefix('/') else {
            return Err(format!(
                "JSON pointer must be empty or begin with '/' - was '{}'",
                raw
            ));
        };

        let tokens = rest
            .split('/')
            .map(unescape_token)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(JsonPointer {
            raw: raw.to_string(),
            tokens,
        })
    }

    /// Builds a pointer from a literal known to be valid, such as the paths
    /// in the built-in alias tables.
    ///
    /// # Panics
    /// Panics if `raw` is not a valid pointer expression.
    pub fn from_static(raw: &'static str) -> Self {
        match Self::parse(raw) {
            Ok(ptr) => ptr,
            Err(reason) => panic!("invalid built-in json pointer {}: {}", raw, reason),
        }
    }

    /// Returns the pointer text as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the unescaped reference tokens.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Resolves the pointer against a JSON value.
    ///
    /// Returns `None` when any step of the path does not exist.
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.tokens
            .iter()
            .try_fold(root, |current, token| match current {
                Value::Object(map) => map.get(token),
                Value::Array(items) => array_index(token).and_then(|i| items.get(i)),
                _ => None,
            })
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

fn unescape_token(token: &str) -> Result<String, String> {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();

    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => {
                return Err(format!(
                    "escape character '~' must be followed with '0' or '1' in token '{}'",
                    token
                ))
            }
        }
    }

    Ok(out)
}

// Array tokens are decimal without leading zeros.
fn array_index(token: &str) -> Option<usize> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if token.len() > 1 && token.starts_with('0') {
        return None;
    }
    token.parse().ok()
}
