//! Placeholder resolution
//!
//! Expands `${name}` tokens against a fixed property set:
//! - `${a}` - replaced with the value of `a`, itself fully expanded
//! - `${${env}.host}` - placeholder names are expanded first, innermost-first
//! - `${a:fallback}` - value separator: `fallback` when `a` is not found
//! - `${missing}` - left as literal text unless strict mode is enabled
//!
//! Each top-level call tracks the placeholders it is expanding; meeting one
//! again while it is still in progress is a circular reference.

use serde::{Deserialize, Serialize};

use crate::container::StringValueResolver;
use crate::error::{Error, Result};
use crate::properties::PropertySet;

/// Whether process environment variables take part in lookups
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentFallback {
    /// Only the property set is consulted
    #[default]
    Never,
    /// Environment variables are consulted when the property set has no value
    Fallback,
    /// Environment variables take precedence over the property set
    Override,
}

/// Placeholder syntax and resolution behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaceholderOptions {
    pub prefix: String,
    pub suffix: String,
    /// Separates a placeholder name from its fallback value; `None` disables fallbacks
    pub value_separator: Option<String>,
    /// Fully resolved value that means "no value"
    pub null_value: Option<String>,
    /// Leave unresolvable placeholders in place; `false` makes them an error
    pub ignore_unresolvable: bool,
    /// Trim surrounding whitespace from resolved values
    pub trim_values: bool,
    pub environment_fallback: EnvironmentFallback,
}

impl Default for PlaceholderOptions {
    fn default() -> Self {
        Self {
            prefix: "${".into(),
            suffix: "}".into(),
            value_separator: Some(":".into()),
            null_value: None,
            ignore_unresolvable: true,
            trim_values: false,
            environment_fallback: EnvironmentFallback::Never,
        }
    }
}

impl PlaceholderOptions {
    /// Reject syntax that cannot delimit a placeholder
    pub fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() || self.suffix.is_empty() {
            return Err(Error::parse(format!(
                "Placeholder prefix and suffix must not be empty (prefix '{}', suffix '{}')",
                self.prefix, self.suffix
            )));
        }
        if self.value_separator.as_deref() == Some("") {
            return Err(Error::parse("Placeholder value separator must not be empty")
                .with_help("Leave value_separator unset to disable fallback values"));
        }
        Ok(())
    }

    /// Opening text that nests inside a placeholder, e.g. `{` for `${...}`
    fn simple_prefix(&self) -> &str {
        let opener = match self.suffix.as_str() {
            "}" => "{",
            "]" => "[",
            ")" => "(",
            _ => return &self.prefix,
        };
        if self.prefix.ends_with(opener) {
            opener
        } else {
            &self.prefix
        }
    }
}

/// Resolves placeholders against a fixed property set
#[derive(Debug, Clone)]
pub struct PlaceholderResolver {
    properties: PropertySet,
    options: PlaceholderOptions,
}

impl PlaceholderResolver {
    pub fn new(properties: PropertySet, options: PlaceholderOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            properties,
            options,
        })
    }

    pub fn properties(&self) -> &PropertySet {
        &self.properties
    }

    pub fn options(&self) -> &PlaceholderOptions {
        &self.options
    }

    /// Expand every placeholder in `template`
    pub fn resolve_placeholders(&self, template: &str) -> Result<String> {
        let mut in_progress = Vec::new();
        let value = self.parse_string_value(template, &mut in_progress)?;
        if self.options.trim_values {
            Ok(value.trim().to_string())
        } else {
            Ok(value)
        }
    }

    /// Expand `template`; `None` when the result equals the null marker
    pub fn resolve(&self, template: &str) -> Result<Option<String>> {
        let value = self.resolve_placeholders(template)?;
        match &self.options.null_value {
            Some(null_value) if value == *null_value => Ok(None),
            _ => Ok(Some(value)),
        }
    }

    /// Resolve the value of a single property by name
    pub fn get(&self, name: &str) -> Result<Option<String>> {
        match self.lookup(name) {
            Some(raw) => self.resolve(&raw),
            None => Ok(None),
        }
    }

    /// Whether a property of this name is visible, honoring environment fallback
    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    fn lookup(&self, name: &str) -> Option<String> {
        let from_properties = || self.properties.get(name).map(str::to_string);
        let from_environment = || std::env::var(name).ok();

        match self.options.environment_fallback {
            EnvironmentFallback::Never => from_properties(),
            EnvironmentFallback::Fallback => from_properties().or_else(from_environment),
            EnvironmentFallback::Override => from_environment().or_else(from_properties),
        }
    }

    fn parse_string_value(&self, value: &str, in_progress: &mut Vec<String>) -> Result<String> {
        let prefix = self.options.prefix.as_str();
        let suffix = self.options.suffix.as_str();

        let mut buf = value.to_string();
        let mut start = find_from(&buf, prefix, 0);

        while let Some(start_index) = start {
            let Some(end_index) = self.find_placeholder_end(&buf, start_index) else {
                break;
            };

            let placeholder = buf[start_index + prefix.len()..end_index].to_string();
            if in_progress.contains(&placeholder) {
                let mut chain = in_progress.clone();
                chain.push(placeholder.clone());
                return Err(Error::circular_reference(placeholder, chain));
            }
            in_progress.push(placeholder.clone());

            // Nested placeholders in the name resolve first
            let name = self.parse_string_value(&placeholder, in_progress)?;
            let mut found = self.lookup(&name);

            if found.is_none() {
                if let Some(separator) = &self.options.value_separator {
                    if let Some(idx) = name.find(separator.as_str()) {
                        let actual = &name[..idx];
                        let fallback = &name[idx + separator.len()..];
                        found = self.lookup(actual).or_else(|| Some(fallback.to_string()));
                    }
                }
            }

            match found {
                Some(raw) => {
                    let resolved = self.parse_string_value(&raw, in_progress)?;
                    buf.replace_range(start_index..end_index + suffix.len(), &resolved);
                    log::trace!("Resolved placeholder '{}'", name);
                    start = find_from(&buf, prefix, start_index + resolved.len());
                }
                None if self.options.ignore_unresolvable => {
                    start = find_from(&buf, prefix, end_index + suffix.len());
                }
                None => return Err(Error::unresolved_placeholder(name, value)),
            }

            in_progress.pop();
        }

        Ok(buf)
    }

    /// Find the suffix closing the placeholder that starts at `start_index`
    fn find_placeholder_end(&self, buf: &str, start_index: usize) -> Option<usize> {
        let prefix = self.options.prefix.as_str();
        let suffix = self.options.suffix.as_str();
        let simple_prefix = self.options.simple_prefix();

        let mut index = start_index + prefix.len();
        let mut depth = 0usize;

        while index < buf.len() {
            let rest = &buf[index..];
            if rest.starts_with(suffix) {
                if depth == 0 {
                    return Some(index);
                }
                depth -= 1;
                index += suffix.len();
            } else if rest.starts_with(simple_prefix) {
                depth += 1;
                index += simple_prefix.len();
            } else {
                index += rest.chars().next().map_or(1, char::len_utf8);
            }
        }

        None
    }
}

impl StringValueResolver for PlaceholderResolver {
    fn resolve_string_value(&self, value: &str) -> Result<Option<String>> {
        self.resolve(value)
    }
}

fn find_from(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    haystack
        .get(from..)
        .and_then(|rest| rest.find(needle))
        .map(|i| i + from)
}
