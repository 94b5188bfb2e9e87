//! Multi-environment configuration documents
//!
//! A structured source declares a default environment and a list of
//! environments, each holding typed configuration entries:
//!
//! ```yaml
//! defaultEnvironment: dev
//! environments:
//!   - name: dev
//!     configs:
//!       - type: database
//!         properties:
//!           db.host: localhost
//!           db.port: 5432
//! ```
//!
//! The same shape is accepted as JSON.

use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

use crate::error::{Error, Result};
use crate::properties::PropertySet;

/// Serialization of a structured document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    /// Detect the structured format from a file name's extension
    ///
    /// Returns `None` for anything that should be read as a flat property file.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = Path::new(filename).extension()?.to_str()?;
        match ext.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(DocumentFormat::Yaml),
            "json" => Some(DocumentFormat::Json),
            _ => None,
        }
    }
}

/// One typed property subset scoped to an environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    config_type: String,
    environment: String,
    properties: PropertySet,
}

impl ConfigEntry {
    pub fn new(
        config_type: impl Into<String>,
        environment: impl Into<String>,
        properties: PropertySet,
    ) -> Self {
        Self {
            config_type: config_type.into(),
            environment: environment.into(),
            properties,
        }
    }

    /// The configuration type label (e.g. "database")
    pub fn config_type(&self) -> &str {
        &self.config_type
    }

    /// The environment this entry belongs to
    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn properties(&self) -> &PropertySet {
        &self.properties
    }
}

/// A parsed multi-environment document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentDocument {
    default_environment: String,
    environments: IndexMap<String, Vec<ConfigEntry>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    default_environment: String,
    #[serde(default)]
    environments: Vec<RawEnvironment>,
}

#[derive(Deserialize)]
struct RawEnvironment {
    name: String,
    #[serde(default)]
    configs: Vec<RawConfig>,
}

#[derive(Deserialize)]
struct RawConfig {
    #[serde(rename = "type")]
    config_type: String,
    #[serde(default)]
    properties: IndexMap<String, RawScalar>,
}

/// Property values may be strings, integers, booleans or null.
///
/// Floats are refused: the parsers hand them over as `f64`, so the text the
/// user wrote (`1.10`, `2.0`) cannot be recovered.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl RawScalar {
    fn into_text(self, key: &str) -> Result<String> {
        match self {
            RawScalar::Null => Ok(String::new()),
            RawScalar::Bool(b) => Ok(b.to_string()),
            RawScalar::Integer(i) => Ok(i.to_string()),
            RawScalar::Float(f) => Err(Error::malformed_document(format!(
                "property '{}' has a floating-point value ({})",
                key, f
            ))
            .with_help(format!("Quote the value to keep it as written, e.g. {}: \"...\"", key))),
            RawScalar::String(s) => Ok(s),
        }
    }
}

impl EnvironmentDocument {
    /// Parse a document in the given format
    pub fn parse(raw: &str, format: DocumentFormat) -> Result<Self> {
        let document: RawDocument = match format {
            DocumentFormat::Yaml => {
                serde_yaml::from_str(raw).map_err(|e| Error::malformed_document(e.to_string()))?
            }
            DocumentFormat::Json => {
                serde_json::from_str(raw).map_err(|e| Error::malformed_document(e.to_string()))?
            }
        };
        Self::from_raw(document)
    }

    /// Parse a YAML document
    pub fn from_yaml(raw: &str) -> Result<Self> {
        Self::parse(raw, DocumentFormat::Yaml)
    }

    /// Parse a JSON document
    pub fn from_json(raw: &str) -> Result<Self> {
        Self::parse(raw, DocumentFormat::Json)
    }

    fn from_raw(raw: RawDocument) -> Result<Self> {
        let mut environments: IndexMap<String, Vec<ConfigEntry>> = IndexMap::new();

        for env in raw.environments {
            let bucket = environments.entry(env.name.clone()).or_default();
            for config in env.configs {
                let properties = config
                    .properties
                    .into_iter()
                    .map(|(k, v)| v.into_text(&k).map(|text| (k, text)))
                    .collect::<Result<_>>()?;
                bucket.push(ConfigEntry::new(config.config_type, &env.name, properties));
            }
        }

        Ok(Self {
            default_environment: raw.default_environment,
            environments,
        })
    }

    /// The environment used when no override is given
    pub fn default_environment(&self) -> &str {
        &self.default_environment
    }

    /// Declared environment names, in document order
    pub fn environment_names(&self) -> impl Iterator<Item = &str> {
        self.environments.keys().map(String::as_str)
    }

    /// Entries of an environment, in document order; empty for unknown names
    pub fn entries_for(&self, environment: &str) -> &[ConfigEntry] {
        self.environments
            .get(environment)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Pick the active environment
    ///
    /// A present, non-empty override wins even if the document does not
    /// declare it. Otherwise the declared default is used, which must exist.
    pub fn select_environment<'a>(&'a self, override_name: Option<&'a str>) -> Result<&'a str> {
        if let Some(name) = override_name.filter(|n| !n.is_empty()) {
            if !self.environments.contains_key(name) {
                log::warn!(
                    "Environment '{}' is not declared; no structured configuration applies",
                    name
                );
            }
            return Ok(name);
        }

        if self.environments.contains_key(&self.default_environment) {
            Ok(&self.default_environment)
        } else {
            Err(Error::malformed_document(format!(
                "Default environment '{}' is not declared",
                self.default_environment
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOC: &str = r#"
defaultEnvironment: dev
environments:
  - name: dev
    configs:
      - type: database
        properties:
          db.host: localhost
          db.port: 5432
      - type: cache
        properties:
          cache.ttl: 60
          cache.enabled: true
  - name: prod
    configs:
      - type: database
        properties:
          db.host: db.internal
"#;

    #[test]
    fn test_parse_yaml() {
        let doc = EnvironmentDocument::from_yaml(DOC).unwrap();

        assert_eq!(doc.default_environment(), "dev");
        assert_eq!(doc.environment_names().collect::<Vec<_>>(), vec!["dev", "prod"]);

        let dev = doc.entries_for("dev");
        assert_eq!(dev.len(), 2);
        assert_eq!(dev[0].config_type(), "database");
        assert_eq!(dev[0].properties().get("db.port"), Some("5432"));
        assert_eq!(dev[1].properties().get("cache.enabled"), Some("true"));
    }

    #[test]
    fn test_entries_carry_their_environment() {
        let doc = EnvironmentDocument::from_yaml(DOC).unwrap();

        for name in ["dev", "prod"] {
            assert!(doc.entries_for(name).iter().all(|e| e.environment() == name));
        }
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{
            "defaultEnvironment": "qa",
            "environments": [
                {"name": "qa", "configs": [{"type": "web", "properties": {"port": 8080, "debug": null}}]}
            ]
        }"#;
        let doc = EnvironmentDocument::from_json(json).unwrap();
        let entries = doc.entries_for("qa");

        assert_eq!(entries[0].properties().get("port"), Some("8080"));
        assert_eq!(entries[0].properties().get("debug"), Some(""));
    }

    #[test]
    fn test_unknown_environment_is_empty() {
        let doc = EnvironmentDocument::from_yaml(DOC).unwrap();
        assert!(doc.entries_for("staging").is_empty());
    }

    #[test]
    fn test_duplicate_environment_appends() {
        let yaml = r#"
defaultEnvironment: dev
environments:
  - name: dev
    configs:
      - type: a
  - name: dev
    configs:
      - type: b
"#;
        let doc = EnvironmentDocument::from_yaml(yaml).unwrap();
        let types: Vec<_> = doc.entries_for("dev").iter().map(|e| e.config_type()).collect();
        assert_eq!(types, vec!["a", "b"]);
    }

    #[test]
    fn test_select_default_without_override() {
        let doc = EnvironmentDocument::from_yaml(DOC).unwrap();

        assert_eq!(doc.select_environment(None).unwrap(), "dev");
        assert_eq!(doc.select_environment(Some("")).unwrap(), "dev");
    }

    #[test]
    fn test_select_override() {
        let doc = EnvironmentDocument::from_yaml(DOC).unwrap();

        assert_eq!(doc.select_environment(Some("prod")).unwrap(), "prod");
        assert_eq!(doc.select_environment(Some("staging")).unwrap(), "staging");
    }

    #[test]
    fn test_missing_default_environment_is_malformed() {
        let yaml = r#"
defaultEnvironment: missing
environments:
  - name: dev
"#;
        let doc = EnvironmentDocument::from_yaml(yaml).unwrap();
        let err = doc.select_environment(None).unwrap_err();

        assert_eq!(err.kind, crate::error::ErrorKind::MalformedDocument);
        assert!(doc.select_environment(Some("dev")).is_ok());
    }

    #[test]
    fn test_malformed_documents() {
        let cases = [
            "environments: []",
            "defaultEnvironment: dev\nenvironments: {}",
            "defaultEnvironment: dev\nenvironments:\n  - configs: []",
            "defaultEnvironment: dev\nenvironments:\n  - name: dev\n    configs:\n      - type: a\n        properties:\n          nested: {x: 1}",
            "not: [valid",
        ];

        for case in cases {
            let err = EnvironmentDocument::from_yaml(case).unwrap_err();
            assert_eq!(err.kind, crate::error::ErrorKind::MalformedDocument, "{}", case);
        }
    }

    #[test]
    fn test_float_values_must_be_quoted() {
        let unquoted = "defaultEnvironment: dev\nenvironments:\n  - name: dev\n    configs:\n      - type: app\n        properties:\n          app.version: 1.10\n";
        let err = EnvironmentDocument::from_yaml(unquoted).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::MalformedDocument);
        assert!(err.to_string().contains("app.version"));

        let json = r#"{"defaultEnvironment": "dev", "environments": [{"name": "dev", "configs": [{"type": "app", "properties": {"ratio": 2.0}}]}]}"#;
        assert!(EnvironmentDocument::from_json(json).is_err());

        let quoted = "defaultEnvironment: dev\nenvironments:\n  - name: dev\n    configs:\n      - type: app\n        properties:\n          app.version: \"1.10\"\n          ratio: \"2.0\"\n";
        let doc = EnvironmentDocument::from_yaml(quoted).unwrap();
        let props = doc.entries_for("dev")[0].properties();
        assert_eq!(props.get("app.version"), Some("1.10"));
        assert_eq!(props.get("ratio"), Some("2.0"));
    }

    #[test]
    fn test_format_from_filename() {
        assert_eq!(DocumentFormat::from_filename("app.yaml"), Some(DocumentFormat::Yaml));
        assert_eq!(DocumentFormat::from_filename("app.YML"), Some(DocumentFormat::Yaml));
        assert_eq!(DocumentFormat::from_filename("conf/app.json"), Some(DocumentFormat::Json));
        assert_eq!(DocumentFormat::from_filename("app.properties"), None);
        assert_eq!(DocumentFormat::from_filename("README"), None);
    }
}
