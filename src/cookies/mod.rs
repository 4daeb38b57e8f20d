//! Session cookie accumulation across negotiation hops.
//!
//! Upstream pages hand out their session through `Set-Cookie` fragments that
//! arrive either as repeated headers or joined into a single header value. This
//! module merges those fragments into a [`CookieJar`] the way a browser would
//! replay them, and provides the persistent [`CookieStore`] capability used to
//! carry the session across process invocations.

mod store;

pub use store::{
    COOKIE_STORE_KEY, CookieStore, CookieStoreError, FileCookieStore, MemoryCookieStore,
};

use std::collections::BTreeMap;
use std::fmt;

use tracing::trace;

/// Attribute names that may appear in `Set-Cookie` values but are never cookies.
const COOKIE_ATTRIBUTES: [&str; 9] = [
    "path",
    "domain",
    "expires",
    "max-age",
    "samesite",
    "secure",
    "httponly",
    "priority",
    "partitioned",
];

/// Returns true if `name` (case-insensitive) is a `Set-Cookie` attribute.
#[must_use]
pub fn is_cookie_attribute(name: &str) -> bool {
    let name = name.trim();
    COOKIE_ATTRIBUTES
        .iter()
        .any(|attr| attr.eq_ignore_ascii_case(name))
}

/// Accumulated session cookies, keyed by case-sensitive cookie name.
///
/// Entries are kept sorted by name so the serialized header is deterministic
/// and two jars compare equal regardless of merge order.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    entries: BTreeMap<String, String>,
}

impl CookieJar {
    /// Creates an empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a jar from a serialized `Cookie` header (`name=value; name=value`).
    ///
    /// The same merge rules as [`merge_set_cookie`](Self::merge_set_cookie) apply,
    /// so a persisted header containing stray attributes is cleaned on load.
    #[must_use]
    pub fn from_header(header: &str) -> Self {
        let mut jar = Self::new();
        jar.merge_set_cookie(header);
        jar
    }

    /// Merges one raw `Set-Cookie` value into the jar.
    ///
    /// Segments without `=` and attribute segments (`Path`, `Expires`, ...) are
    /// dropped. An empty value never replaces a previously stored non-empty one.
    pub fn merge_set_cookie(&mut self, raw: &str) {
        for segment in split_segments(raw) {
            let segment = segment.trim();
            let Some((name, value)) = segment.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() || is_cookie_attribute(name) {
                continue;
            }
            self.insert(name, value.trim());
        }
    }

    /// Merges every value of a sequence of `Set-Cookie` headers.
    pub fn merge_all<'a, I>(&mut self, values: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for value in values {
            self.merge_set_cookie(value);
        }
    }

    fn insert(&mut self, name: &str, value: &str) {
        if value.is_empty()
            && self
                .entries
                .get(name)
                .is_some_and(|existing| !existing.is_empty())
        {
            trace!(cookie = name, "ignoring empty value for already-set cookie");
            return;
        }
        self.entries.insert(name.to_string(), value.to_string());
    }

    /// Returns the value stored for `name`.
    ///
    /// Cookie values are sensitive; avoid logging the return value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Number of cookies in the jar.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the jar holds no cookies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cookie names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Serializes the jar as a `Cookie` header value, sorted by name.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CookieJar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (name, value)) in self.entries.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

// Values are redacted so a stray `?jar` in a log line never leaks the session.
impl fmt::Debug for CookieJar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieJar")
            .field("names", &self.names().collect::<Vec<_>>())
            .field("values", &"[REDACTED]")
            .finish()
    }
}

/// Splits a raw header into `name=value` candidate segments.
///
/// Segments are separated by `;`. Upstreams that fold several cookies into one
/// header separate them with `,`, which also appears inside `Expires` dates, so
/// a comma only starts a new segment when it is followed by `name=`.
fn split_segments(raw: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    for part in raw.split(';') {
        let mut start = 0;
        for (index, _) in part.match_indices(',') {
            if starts_new_cookie(&part[index + 1..]) {
                segments.push(&part[start..index]);
                start = index + 1;
            }
        }
        segments.push(&part[start..]);
    }
    segments
}

fn starts_new_cookie(rest: &str) -> bool {
    rest.trim_start().split_once('=').is_some_and(|(name, _)| {
        !name.is_empty() && !name.contains(|c: char| c.is_whitespace() || c == ',')
    })
}
