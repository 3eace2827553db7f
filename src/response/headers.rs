//! Response header map.
//!
//! Unlike the canonical request map, response header names are preserved
//! exactly as the handler supplied them — the writer sets them verbatim on
//! the sink.

use std::fmt;

/// An insertion-ordered, case-preserving response header map.
///
/// One value per name: inserting a name that is already present (by exact,
/// case-sensitive match) replaces its value. Handlers needing multiple
/// values for one header name must pre-join them; the writer only ever sets
/// a single value per name.
///
/// # Examples
///
/// ```
/// use gantry::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Content-Type", "text/html");
/// headers.insert("X-Request-Id", "abc-123");
///
/// assert_eq!(headers.get("content-type"), Some("text/html"));
/// assert_eq!(headers.get_exact("Content-Type"), Some("text/html"));
/// assert_eq!(headers.get_exact("content-type"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header value. Replaces the value of an existing entry with the
    /// exact same name; otherwise appends.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.inner.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.inner.push((name, value)),
        }
    }

    /// Returns the value for the given name, matched case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the value for the given name, matched exactly
    /// (case-sensitive). The content-type precedence rule keys off the
    /// literal `"Content-Type"` spelling, which needs this.
    pub fn get_exact(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` if an entry with the given name exists
    /// (case-insensitive).
    pub fn contains(&self, name: &str) -> bool {
        self.inner.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Returns the number of header entries.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if there are no header entries.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over all `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.inner {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}
