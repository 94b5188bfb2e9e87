//! Merged property sets and flat `key=value` property files
//!
//! The flat format follows the usual `.properties` conventions:
//! - `#` and `!` start comment lines
//! - keys end at the first unescaped `=`, `:` or whitespace
//! - a trailing backslash continues the logical line
//! - `\t`, `\n`, `\r`, `\f`, `\uXXXX` and escaped separators are unescaped

use encoding_rs::{Encoding, WINDOWS_1252};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A set of string properties, keyed by name
///
/// Iteration follows first-insertion order; re-inserting a key replaces its
/// value in place (last-writer-wins).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertySet {
    entries: IndexMap<String, String>,
}

impl PropertySet {
    /// Create an empty property set
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value of a property
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Check if a property is defined
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Set a property, returning the previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    /// Merge another set into this one, key by key; `other` wins on conflicts
    pub fn merge(&mut self, other: PropertySet) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(key, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate over property names
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Apply `f` to every value, keeping keys and order
    pub fn map_values(self, mut f: impl FnMut(&str, String) -> String) -> Self {
        self.entries
            .into_iter()
            .map(|(k, v)| {
                let converted = f(&k, v);
                (k, converted)
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropertySet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for PropertySet {
    type Item = (String, String);
    type IntoIter = indexmap::map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Decode raw bytes using an optional encoding label (e.g. "ISO-8859-1")
///
/// Without a label the content is read as ISO-8859-1 (the WHATWG
/// `windows-1252` decoder), the traditional `.properties` encoding. A byte
/// order mark, if present, takes precedence over the label.
pub fn decode(bytes: &[u8], encoding: Option<&str>) -> Result<String> {
    let encoding = match encoding {
        Some(label) => Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| Error::parse(format!("Unknown file encoding '{}'", label)))?,
        None => WINDOWS_1252,
    };

    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(Error::parse(format!(
            "Content is not valid {}",
            used.name()
        )));
    }
    Ok(text.into_owned())
}

/// Parse flat property file content
pub fn parse_properties(input: &str) -> Result<PropertySet> {
    let mut properties = PropertySet::new();
    let mut lines = input.lines().enumerate();

    while let Some((line_no, line)) = lines.next() {
        let trimmed = line.trim_start_matches(is_blank);
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        let mut logical = trimmed.to_string();
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some((_, next)) => logical.push_str(next.trim_start_matches(is_blank)),
                None => break,
            }
        }

        let (key, value) = split_key_value(&logical);
        let key = unescape(key).map_err(|e| Error::parse(format!("line {}: {}", line_no + 1, e)))?;
        let value =
            unescape(value).map_err(|e| Error::parse(format!("line {}: {}", line_no + 1, e)))?;
        properties.insert(key, value);
    }

    Ok(properties)
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t' || c == '\u{000C}'
}

/// An odd number of trailing backslashes continues the line
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

/// Split a logical line into its raw (still escaped) key and value
fn split_key_value(line: &str) -> (&str, &str) {
    let mut key_end = line.len();
    let mut escaped = false;

    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                key_end = i;
                break;
            }
            c if is_blank(c) => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let mut rest = line[key_end..].trim_start_matches(is_blank);
    if let Some(stripped) = rest.strip_prefix(|c: char| c == '=' || c == ':') {
        rest = stripped.trim_start_matches(is_blank);
    }
    (key, rest)
}

fn unescape(raw: &str) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{000C}'),
            Some('u') => {
                let high = read_code_unit(&mut chars)?;
                if (0xD800..0xDC00).contains(&high) {
                    // Surrogate pair: a low surrogate escape must follow
                    if chars.next() != Some('\\') || chars.next() != Some('u') {
                        return Err(format!("unpaired surrogate \\u{:04X}", high));
                    }
                    let low = read_code_unit(&mut chars)?;
                    let decoded = char::decode_utf16([high, low])
                        .next()
                        .and_then(|r| r.ok())
                        .ok_or_else(|| format!("invalid surrogate pair \\u{:04X}\\u{:04X}", high, low))?;
                    out.push(decoded);
                } else {
                    let decoded = char::from_u32(u32::from(high))
                        .ok_or_else(|| format!("invalid escape \\u{:04X}", high))?;
                    out.push(decoded);
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }

    Ok(out)
}

fn read_code_unit(chars: &mut std::str::Chars<'_>) -> std::result::Result<u16, String> {
    let hex: String = chars.by_ref().take(4).collect();
    if hex.chars().count() != 4 {
        return Err(format!("malformed \\u escape '\\u{}'", hex));
    }
    u16::from_str_radix(&hex, 16).map_err(|_| format!("malformed \\u escape '\\u{}'", hex))
}
