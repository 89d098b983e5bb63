// String helpers shared by the transforms and the jevt time fields:
// shell-style globs, container image splitting, timestamp
// rendering, query string lookup and comma separated set parsing.

use chrono::{DateTime, Local, Utc};
use regex::Regex;
use std::collections::BTreeSet;
use percent_encoding::percent_decode_str;
use url::form_urlencoded;

// ============================================================================
// GLOB MATCHING
// ============================================================================

/// A shell glob (`*`, `?`, `[...]`) compiled once for repeated matching.
///
/// The pattern must match the whole text. `*` also matches `/`.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    pattern: String,
    regex: Regex,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(GlobPattern {
            pattern: pattern.to_string(),
            regex: Regex::new(&glob_to_regex(pattern))?,
        })
    }

    /// The glob as written.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for GlobPattern {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

fn glob_to_regex(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    out.push('[');
                    let mut j = i + 1;
                    if chars[j] == '!' || chars[j] == '^' {
                        out.push('^');
                        j += 1;
                    }
                    for &c in &chars[j..end] {
                        if matches!(c, '\\' | '[' | ']' | '&' | '~') {
                            out.push('\\');
                        }
                        out.push(c);
                    }
                    out.push(']');
                    i = end;
                }
                None => out.push_str(r"\["),
            },
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }

    out.push('$');
    out
}

// Index of the `]` closing the class opened at `start`. A `]` directly
// after the opening bracket (or after a negation) is part of the class.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 1;
    if j < chars.len() && (chars[j] == '!' || chars[j] == '^') {
        j += 1;
    }
    if j < chars.len() && chars[j] == ']' {
        j += 1;
    }
    (j..chars.len()).find(|&k| chars[k] == ']')
}

// ============================================================================
// CONTAINER IMAGES
// ============================================================================

/// The components of a container image reference such as
/// `registry.example.com:5000/team/app:1.2@sha256:abcd`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageRef {
    pub hostname: String,
    pub port: String,
    pub name: String,
    pub tag: String,
    pub digest: String,
}

/// Splits an image reference into registry host, port, repository name,
/// tag and digest.
///
/// The text before the first `/` is only taken as a registry when it
/// contains a `.` or `:`, or is `localhost`; otherwise it is part of the
/// repository name (`sysdig/falco`).
pub fn split_container_image(image: &str) -> ImageRef {
    let mut out = ImageRef::default();

    let rest = match image.split_once('/') {
        Some((hostport, rest))
            if hostport.contains(|c: char| c == '.' || c == ':') || hostport == "localhost" =>
        {
            match hostport.split_once(':') {
                Some((host, port)) => {
                    out.hostname = host.to_string();
                    out.port = port.to_string();
                }
                None => out.hostname = hostport.to_string(),
            }
            rest
        }
        _ => image,
    };

    let rest = match rest.split_once('@') {
        Some((name, digest)) => {
            out.digest = digest.to_string();
            name
        }
        None => rest,
    };

    match rest.split_once(':') {
        Some((name, tag)) => {
            out.name = name.to_string();
            out.tag = tag.to_string();
        }
        None => out.name = rest.to_string(),
    }

    out
}

// ============================================================================
// TIMESTAMPS
// ============================================================================

const NANOS_PER_SEC: u64 = 1_000_000_000;

fn ts_to_utc(ts: u64) -> DateTime<Utc> {
    let secs = (ts / NANOS_PER_SEC) as i64;
    let nanos = (ts % NANOS_PER_SEC) as u32;
    DateTime::from_timestamp(secs, nanos).unwrap_or_default()
}

/// Renders a nanosecond timestamp as local wall clock time,
/// `HH:MM:SS.nnnnnnnnn`.
pub fn ts_to_string(ts: u64) -> String {
    ts_to_utc(ts)
        .with_timezone(&Local)
        .format("%H:%M:%S%.9f")
        .to_string()
}

/// Renders a nanosecond timestamp in ISO 8601 UTC with nanoseconds,
/// `YYYY-MM-DDTHH:MM:SS.nnnnnnnnnZ`.
pub fn ts_to_iso_8601(ts: u64) -> String {
    ts_to_utc(ts).format("%Y-%m-%dT%H:%M:%S%.9fZ").to_string()
}

// ============================================================================
// QUERY STRINGS AND SETS
// ============================================================================

/// Returns the decoded value of query parameter `key` in `uri`.
///
/// The uri must contain exactly one `?`. Parameters are `&` separated and
/// only `name=value` items with a single `=` are considered. Names are
/// form decoded (`+` is a space); values are only percent decoded, so a
/// `+` in a value is kept.
pub fn query_param(uri: &str, key: &str) -> Option<String> {
    let mut parts = uri.split('?');
    let (_, query) = (parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    query.split('&').find_map(|part| {
        let (raw_name, raw_value) = part.split_once('=')?;
        if raw_value.contains('=') {
            return None;
        }
        let (name, _) = form_urlencoded::parse(raw_name.as_bytes()).next()?;
        (name == key).then(|| percent_decode_str(raw_value).decode_utf8_lossy().into_owned())
    })
}

/// Splits `s` on `delim` into a set. A trailing delimiter does not add an
/// empty item and the empty string yields the empty set.
pub fn split_string_set(s: &str, delim: char) -> BTreeSet<String> {
    if s.is_empty() {
        return BTreeSet::new();
    }
    let s = s.strip_suffix(delim).unwrap_or(s);
    s.split(delim).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glob_match(pattern: &str, text: &str) -> bool {
        GlobPattern::new(pattern).unwrap().matches(text)
    }

    #[test]
    fn test_glob_exact_and_wildcards() {
        assert!(glob_match("/etc", "/etc"));
        assert!(!glob_match("/etc", "/etc/config"));
        assert!(glob_match("/etc*", "/etc/config"));
        assert!(glob_match("/usr/*", "/usr/local"));
        assert!(glob_match("/var/lo?", "/var/log"));
        assert!(!glob_match("/usr/*", "/opt/bin"));
    }

    #[test]
    fn test_glob_classes_and_literals() {
        assert!(glob_match("/dev/sd[ab]", "/dev/sda"));
        assert!(!glob_match("/dev/sd[!ab]", "/dev/sda"));
        assert!(glob_match("/dev/sd[!ab]", "/dev/sdc"));
        assert!(glob_match("/a.b", "/a.b"));
        assert!(!glob_match("/a.b", "/axb"));
        assert!(glob_match("/weird[", "/weird["));
    }

    #[test]
    fn test_glob_compiled_once_reused() {
        let glob = GlobPattern::new("/var/log/*").unwrap();
        assert_eq!(glob.as_str(), "/var/log/*");
        for path in ["/var/log/pods", "/var/log/containers", "/var/log/"] {
            assert!(glob.matches(path), "{}", path);
        }
        assert!(!glob.matches("/var/lib"));
        assert_eq!(glob, GlobPattern::new("/var/log/*").unwrap());
    }

    #[test]
    fn test_glob_invalid_class_rejected() {
        assert!(GlobPattern::new("/dev/sd[z-a]").is_err());
    }

    #[test]
    fn test_split_image_plain() {
        let img = split_container_image("nginx");
        assert_eq!(img.name, "nginx");
        assert!(img.hostname.is_empty() && img.tag.is_empty());
    }

    #[test]
    fn test_split_image_user_repo_tag() {
        let img = split_container_image("sysdig/falco:0.13.0");
        assert_eq!(img.hostname, "");
        assert_eq!(img.name, "sysdig/falco");
        assert_eq!(img.tag, "0.13.0");
    }

    #[test]
    fn test_split_image_registry_port_digest() {
        let img = split_container_image("registry.example.com:5000/team/app:1.2@sha256:abcd");
        assert_eq!(img.hostname, "registry.example.com");
        assert_eq!(img.port, "5000");
        assert_eq!(img.name, "team/app");
        assert_eq!(img.tag, "1.2");
        assert_eq!(img.digest, "sha256:abcd");
    }

    #[test]
    fn test_split_image_localhost() {
        let img = split_container_image("localhost/app");
        assert_eq!(img.hostname, "localhost");
        assert_eq!(img.name, "app");
    }

    #[test]
    fn test_iso_8601() {
        assert_eq!(
            ts_to_iso_8601(1_556_912_734_123_456_789),
            "2019-05-03T19:45:34.123456789Z"
        );
        assert_eq!(ts_to_iso_8601(0), "1970-01-01T00:00:00.000000000Z");
    }

    #[test]
    fn test_local_time_shape() {
        let s = ts_to_string(1_556_912_734_123_456_789);
        assert_eq!(s.len(), "19:45:34.123456789".len());
        assert!(s.ends_with(".123456789"));
    }

    #[test]
    fn test_query_param() {
        assert_eq!(query_param("/api?key=val&x=1", "key").as_deref(), Some("val"));
        assert_eq!(query_param("/api?key=val&x=1", "x").as_deref(), Some("1"));
        assert_eq!(query_param("/api?key=val&x=1", "missing"), None);
        assert_eq!(query_param("/api", "key"), None);
        assert_eq!(query_param("/api?a=1?b=2", "a"), None);
        assert_eq!(query_param("/api?a=b=c", "a"), None);
    }

    #[test]
    fn test_query_param_decodes() {
        assert_eq!(
            query_param("/api?my%20key=a%2Fb", "my key").as_deref(),
            Some("a/b")
        );
        assert_eq!(query_param("/api?my+key=v", "my key").as_deref(), Some("v"));
    }

    #[test]
    fn test_query_param_keeps_plus_in_value() {
        let uri = "/api/v1/namespaces/default/pods/web/exec?command=a+b&x=1";
        assert_eq!(query_param(uri, "command").as_deref(), Some("a+b"));
        assert_eq!(query_param("/api?q=a%2Bb+c", "q").as_deref(), Some("a+b+c"));
    }

    #[test]
    fn test_split_string_set() {
        let set = split_string_set("configMap,downwardAPI", ',');
        assert_eq!(set.len(), 2);
        assert!(set.contains("configMap"));
        assert!(split_string_set("", ',').is_empty());
        assert_eq!(
            split_string_set("a,", ','),
            BTreeSet::from(["a".to_string()])
        );
    }
}
