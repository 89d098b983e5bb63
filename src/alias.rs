// Alias tables: the registry mapping canonical field names such as
// `ka.user.name` to the JSON pointer they read, the transform applied to
// the value found there and the constraints on the bracketed index.
//
// Tables are built once at startup and only read afterwards, so they can
// be shared freely between threads.

use crate::error::{EngineError, Result};
use crate::pointer::JsonPointer;
use crate::transform::Transform;

/// Whether a field accepts a bracketed index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexMode {
    /// No index may be supplied.
    #[default]
    None,
    /// An index must be supplied.
    Required,
    /// An index may be supplied.
    Allowed,
}

/// What an index may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexType {
    /// Digits only.
    #[default]
    Numeric,
    /// Any text: a key, a glob, a list or a list of ranges.
    Key,
}

/// Everything the engine knows about one canonical field name.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldAlias {
    /// Where in the event the field's value lives
    pub pointer: JsonPointer,
    /// How that value becomes text
    pub transform: Transform,
    pub index_mode: IndexMode,
    pub index_type: IndexType,
}

impl FieldAlias {
    /// A field read directly from `pointer` with no index.
    pub fn new(pointer: &'static str) -> Self {
        FieldAlias {
            pointer: JsonPointer::from_static(pointer),
            transform: Transform::Default,
            index_mode: IndexMode::None,
            index_type: IndexType::Numeric,
        }
    }

    /// A field whose value goes through `transform`, with no index.
    pub fn transformed(pointer: &'static str, transform: Transform) -> Self {
        FieldAlias {
            transform,
            ..Self::new(pointer)
        }
    }

    /// A field with a transform and index constraints.
    pub fn indexed(
        pointer: &'static str,
        transform: Transform,
        index_mode: IndexMode,
        index_type: IndexType,
    ) -> Self {
        FieldAlias {
            pointer: JsonPointer::from_static(pointer),
            transform,
            index_mode,
            index_type,
        }
    }
}

/// The result of matching a field reference against a table.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasMatch<'t> {
    /// The canonical field name that matched
    pub name: &'t str,
    pub alias: &'t FieldAlias,
    /// Text between the brackets, empty when there was no index
    pub index: String,
    /// Number of bytes of the input taken by the name and the index
    pub consumed: usize,
}

/// An ordered set of field aliases.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    /// Aliases in registration order
    entries: Vec<(String, FieldAlias)>,
    /// Entry positions by descending name length, ties in registration order
    by_length: Vec<usize>,
}

impl AliasTable {
    /// Builds a table from `(name, alias)` pairs.
    pub fn new<I>(aliases: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, FieldAlias)>,
    {
        let entries: Vec<(String, FieldAlias)> = aliases
            .into_iter()
            .map(|(name, alias)| (name.to_string(), alias))
            .collect();

        let mut by_length: Vec<usize> = (0..entries.len()).collect();
        // Stable sort keeps registration order between equal lengths
        by_length.sort_by(|&a, &b| entries[b].0.len().cmp(&entries[a].0.len()));

        AliasTable { entries, by_length }
    }

    /// Number of aliases in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up an alias by exact name.
    pub fn get(&self, name: &str) -> Option<&FieldAlias> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, alias)| alias)
    }

    /// Iterates over `(name, alias)` in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldAlias)> {
        self.entries.iter().map(|(n, a)| (n.as_str(), a))
    }

    /// Finds the longest field name that `raw` starts with and parses an
    /// optional `[index]` after it.
    ///
    /// The character after the name must not be alphanumeric or `.`, so
    /// `ka.user.namespace` never matches `ka.user.name`. Returns `Ok(None)`
    /// when no name in the table matches.
    pub fn parse(&self, raw: &str) -> Result<Option<AliasMatch<'_>>> {
        let Some(&pos) = self
            .by_length
            .iter()
            .find(|&&pos| matches_at_boundary(raw, &self.entries[pos].0))
        else {
            return Ok(None);
        };

        let (name, alias) = &self.entries[pos];
        let after = &raw[name.len()..];

        let (index, consumed) = match after.strip_prefix('[') {
            Some(rest) => match rest.find(']') {
                Some(end) => (rest[..end].to_string(), name.len() + end + 2),
                None => {
                    return Err(EngineError::UnterminatedIndex {
                        raw: raw.to_string(),
                        field: name.clone(),
                    })
                }
            },
            None => (String::new(), name.len()),
        };

        validate_index(raw, name, alias, &index)?;

        Ok(Some(AliasMatch {
            name,
            alias,
            index,
            consumed,
        }))
    }
}

fn matches_at_boundary(raw: &str, name: &str) -> bool {
    if !raw.starts_with(name) {
        return false;
    }
    match raw[name.len()..].chars().next() {
        Some(c) => !c.is_ascii_alphanumeric() && c != '.',
        None => true,
    }
}

fn validate_index(raw: &str, name: &str, alias: &FieldAlias, index: &str) -> Result<()> {
    if index.is_empty() && alias.index_mode == IndexMode::Required {
        return Err(EngineError::RequiresIndex {
            raw: raw.to_string(),
            field: name.to_string(),
        });
    }

    if !index.is_empty() && alias.index_mode == IndexMode::None {
        return Err(EngineError::ForbidsIndex {
            raw: raw.to_string(),
            field: name.to_string(),
        });
    }

    if !index.is_empty()
        && alias.index_type == IndexType::Numeric
        && !index.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(EngineError::NonNumericIndex {
            raw: raw.to_string(),
            field: name.to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> AliasTable {
        AliasTable::new([
            ("ka.user", FieldAlias::new("/user")),
            ("ka.user.name", FieldAlias::new("/user/username")),
            (
                "ka.req.container.image",
                FieldAlias::indexed(
                    "/requestObject/spec/containers",
                    Transform::Image,
                    IndexMode::Allowed,
                    IndexType::Numeric,
                ),
            ),
            (
                "ka.uri.param",
                FieldAlias::indexed(
                    "/requestURI",
                    Transform::QueryParam,
                    IndexMode::Required,
                    IndexType::Key,
                ),
            ),
            ("ka.dup", FieldAlias::new("/first")),
            ("ka.dup", FieldAlias::new("/second")),
        ])
    }

    #[test]
    fn test_longest_match_wins() {
        let t = table();
        let m = t.parse("ka.user.name = bob").unwrap().unwrap();
        assert_eq!(m.name, "ka.user.name");
        assert_eq!(m.consumed, "ka.user.name".len());

        let m = t.parse("ka.user").unwrap().unwrap();
        assert_eq!(m.name, "ka.user");
    }

    #[test]
    fn test_word_boundary() {
        let t = table();
        assert!(t.parse("ka.username").unwrap().is_none());
        assert!(t.parse("ka.user.namespace").unwrap().is_none());
        assert!(t.parse("ka.use").unwrap().is_none());
        // Only the shorter field stops at a boundary here
        let m = t.parse("ka.user.other").unwrap();
        assert!(m.is_none());
        let m = t.parse("ka.user)").unwrap().unwrap();
        assert_eq!(m.name, "ka.user");
    }

    #[test]
    fn test_first_registered_wins_ties() {
        let t = table();
        let m = t.parse("ka.dup").unwrap().unwrap();
        assert_eq!(m.alias.pointer.as_str(), "/first");
    }

    #[test]
    fn test_optional_numeric_index() {
        let t = table();
        let m = t.parse("ka.req.container.image[1] rest").unwrap().unwrap();
        assert_eq!(m.index, "1");
        assert_eq!(m.consumed, "ka.req.container.image[1]".len());

        let m = t.parse("ka.req.container.image").unwrap().unwrap();
        assert!(m.index.is_empty());
    }

    #[test]
    fn test_non_numeric_index_rejected() {
        let err = table().parse("ka.req.container.image[x]").unwrap_err();
        assert!(matches!(err, EngineError::NonNumericIndex { .. }));
        assert!(err.to_string().contains("requires a numeric index"));
    }

    #[test]
    fn test_required_index() {
        let t = table();
        let err = t.parse("ka.uri.param").unwrap_err();
        assert!(matches!(err, EngineError::RequiresIndex { .. }));
        assert!(err.to_string().contains("ka.uri.param"));

        let m = t.parse("ka.uri.param[key]").unwrap().unwrap();
        assert_eq!(m.index, "key");
    }

    #[test]
    fn test_forbidden_index() {
        let err = table().parse("ka.user.name[0]").unwrap_err();
        assert!(matches!(err, EngineError::ForbidsIndex { .. }));
    }

    #[test]
    fn test_unterminated_index() {
        let err = table().parse("ka.uri.param[key").unwrap_err();
        assert!(matches!(err, EngineError::UnterminatedIndex { .. }));
    }

    #[test]
    fn test_no_match() {
        assert!(table().parse("jevt.time").unwrap().is_none());
        assert!(table().parse("").unwrap().is_none());
    }
}
