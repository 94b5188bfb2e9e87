//! Definition container hand-off
//!
//! The resolver does not own the values it rewrites. A container of named
//! definitions exposes them through [`DefinitionContainer`]; the configurer
//! walks every definition with a [`StringValueResolver`] and then asks the
//! container to resolve its aliases.
//!
//! [`DefinitionTree`] is a ready-made container whose definitions are
//! YAML/JSON value trees:
//!
//! ```yaml
//! definitions:
//!   dataSource:
//!     url: jdbc:postgresql://${db.host}:${db.port}/app
//!     user: ${db.user}
//! aliases:
//!   ${primary.alias}: dataSource
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::value::Value;

/// Resolves placeholders in a single string value
pub trait StringValueResolver {
    /// The resolved value; `None` means "no value" (the null marker)
    fn resolve_string_value(&self, value: &str) -> Result<Option<String>>;
}

/// A container of named definitions whose string values can be rewritten
pub trait DefinitionContainer {
    /// Names of all definitions, in registration order
    fn definition_names(&self) -> Vec<String>;

    /// Whether a definition of this name is currently registered
    fn contains_definition(&self, name: &str) -> bool;

    /// Where a definition came from, for error context
    fn resource_description(&self, name: &str) -> Option<String>;

    /// Rewrite every string value of one definition in place
    fn visit_definition(&mut self, name: &str, resolver: &dyn StringValueResolver) -> Result<()>;

    /// Resolve placeholders in alias names and their targets
    fn resolve_aliases(&mut self, resolver: &dyn StringValueResolver) -> Result<()>;
}

/// Visit every definition except `exclude`, then resolve aliases
///
/// A failure while visiting keeps its kind and gains the definition's name
/// and resource description.
pub fn process_definitions(
    container: &mut dyn DefinitionContainer,
    resolver: &dyn StringValueResolver,
    exclude: Option<&str>,
) -> Result<()> {
    for name in container.definition_names() {
        if exclude == Some(name.as_str()) {
            log::debug!("Skipping own definition '{}'", name);
            continue;
        }
        if !container.contains_definition(&name) {
            log::debug!("Definition '{}' was removed during the walk", name);
            continue;
        }

        log::trace!("Resolving placeholders in definition '{}'", name);
        if let Err(e) = container.visit_definition(&name, resolver) {
            let description = container.resource_description(&name);
            return Err(e.with_definition(name, description));
        }
    }

    container.resolve_aliases(resolver)
}

/// Named definitions with value-tree bodies and an alias table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefinitionTree {
    #[serde(default)]
    definitions: IndexMap<String, Value>,
    /// alias → target definition name
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    aliases: IndexMap<String, String>,
    #[serde(skip)]
    source: Option<String>,
}

impl DefinitionTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse definitions from YAML
    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).map_err(|e| Error::parse(e.to_string()))
    }

    /// Parse definitions from JSON
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::parse(e.to_string()))
    }

    /// Load definitions from a file, picking the parser by extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let description = format!("file [{}]", path.display());
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::resource_open(&description, e.to_string()))?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let tree = if is_json {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        };

        tree.map(|tree| tree.with_source(&description))
            .map_err(|e| e.with_resource(description))
    }

    /// Set the description reported for every definition of this tree
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.definitions.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.definitions.get(name)
    }

    pub fn definitions(&self) -> &IndexMap<String, Value> {
        &self.definitions
    }

    /// Register `alias` as another name for `target`; an alias equal to its target is dropped
    pub fn register_alias(
        &mut self,
        alias: impl Into<String>,
        target: impl Into<String>,
    ) -> Result<()> {
        let (alias, target) = (alias.into(), target.into());
        if alias == target {
            self.aliases.shift_remove(&alias);
            return Ok(());
        }
        if self.has_alias(&alias, &target) {
            return Err(Error::alias_conflict(&alias, &target, &alias)
                .with_help("The alias would point back to itself"));
        }
        self.aliases.insert(alias, target);
        Ok(())
    }

    pub fn aliases(&self) -> &IndexMap<String, String> {
        &self.aliases
    }

    /// Follow aliases to a definition name
    pub fn canonical_name<'a>(&'a self, name: &'a str) -> &'a str {
        let mut current = name;
        let mut hops = 0;
        while let Some(target) = self.aliases.get(current) {
            current = target;
            hops += 1;
            if hops > self.aliases.len() {
                break;
            }
        }
        current
    }

    /// Whether `name` reaches `alias` by following registered aliases
    fn has_alias(&self, name: &str, alias: &str) -> bool {
        self.aliases.iter().any(|(registered_alias, target)| {
            target == name
                && (registered_alias == alias || self.has_alias(registered_alias, alias))
        })
    }
}

impl DefinitionContainer for DefinitionTree {
    fn definition_names(&self) -> Vec<String> {
        self.definitions.keys().cloned().collect()
    }

    fn contains_definition(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    fn resource_description(&self, name: &str) -> Option<String> {
        if self.contains_definition(name) {
            self.source.clone()
        } else {
            None
        }
    }

    fn visit_definition(&mut self, name: &str, resolver: &dyn StringValueResolver) -> Result<()> {
        match self.definitions.get_mut(name) {
            Some(value) => value.resolve_strings(resolver),
            None => Ok(()),
        }
    }

    fn resolve_aliases(&mut self, resolver: &dyn StringValueResolver) -> Result<()> {
        let snapshot: Vec<(String, String)> = self
            .aliases
            .iter()
            .map(|(a, t)| (a.clone(), t.clone()))
            .collect();

        for (alias, target) in snapshot {
            let resolved_alias = resolver.resolve_string_value(&alias)?;
            let resolved_target = resolver.resolve_string_value(&target)?;

            let (resolved_alias, resolved_target) = match (resolved_alias, resolved_target) {
                (Some(a), Some(t)) if a != t => (a, t),
                _ => {
                    log::debug!("Dropping alias '{}' for '{}'", alias, target);
                    self.aliases.shift_remove(&alias);
                    continue;
                }
            };

            if resolved_alias != alias {
                if let Some(existing) = self.aliases.get(&resolved_alias) {
                    if *existing == resolved_target {
                        self.aliases.shift_remove(&alias);
                        continue;
                    }
                    return Err(Error::alias_conflict(&resolved_alias, existing, &alias));
                }
                if self.has_alias(&resolved_alias, &resolved_target) {
                    return Err(Error::alias_conflict(&resolved_alias, &resolved_target, &alias)
                        .with_help("The alias would point back to itself"));
                }
                self.aliases.shift_remove(&alias);
                self.aliases.insert(resolved_alias, resolved_target);
            } else if target != resolved_target {
                self.aliases.insert(alias, resolved_target);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::placeholder::{EnvironmentFallback, PlaceholderOptions, PlaceholderResolver};
    use pretty_assertions::assert_eq;

    fn resolver(pairs: &[(&str, &str)]) -> PlaceholderResolver {
        let options = PlaceholderOptions {
            null_value: Some("@null".into()),
            environment_fallback: EnvironmentFallback::Never,
            ..Default::default()
        };
        PlaceholderResolver::new(pairs.iter().map(|(k, v)| (*k, *v)).collect(), options).unwrap()
    }

    const TREE: &str = r#"
definitions:
  dataSource:
    url: jdbc:postgresql://${db.host}:${db.port}/app
    pool: 10
    password: ${db.password}
  cache:
    hosts:
      - ${cache.host}
      - backup
"#;

    #[test]
    fn test_process_definitions() {
        let mut tree = DefinitionTree::from_yaml(TREE).unwrap();
        let r = resolver(&[
            ("db.host", "localhost"),
            ("db.port", "5432"),
            ("db.password", "@null"),
            ("cache.host", "redis"),
        ]);

        process_definitions(&mut tree, &r, None).unwrap();

        let ds = tree.get("dataSource").unwrap();
        assert_eq!(
            ds.get("url").and_then(Value::as_str),
            Some("jdbc:postgresql://localhost:5432/app")
        );
        assert_eq!(ds.get("pool"), Some(&Value::Integer(10)));
        assert_eq!(ds.get("password"), Some(&Value::Null));

        let hosts = tree.get("cache").unwrap().get("hosts").unwrap();
        assert_eq!(hosts, &Value::from(vec!["redis", "backup"]));
    }

    #[test]
    fn test_excluded_definition_untouched() {
        let mut tree = DefinitionTree::new();
        tree.insert("configurer", "${db.host}");
        tree.insert("service", "${db.host}");

        process_definitions(&mut tree, &resolver(&[("db.host", "h")]), Some("configurer")).unwrap();

        assert_eq!(tree.get("configurer"), Some(&Value::from("${db.host}")));
        assert_eq!(tree.get("service"), Some(&Value::from("h")));
    }

    #[test]
    fn test_failure_names_definition() {
        let mut tree = DefinitionTree::from_yaml("definitions:\n  loop: ${a}\n")
            .unwrap()
            .with_source("file [beans.yaml]");
        let err = process_definitions(&mut tree, &resolver(&[("a", "${a}")]), None).unwrap_err();

        assert_eq!(err.kind, ErrorKind::CircularReference);
        assert_eq!(err.definition.as_deref(), Some("loop"));
        assert_eq!(err.resource.as_deref(), Some("file [beans.yaml]"));
    }

    #[test]
    fn test_resolve_aliases() {
        let mut tree = DefinitionTree::new();
        tree.insert("dataSource", "x");
        tree.register_alias("${alias.name}", "dataSource").unwrap();
        tree.register_alias("plain", "${target.name}").unwrap();
        tree.register_alias("dropped", "${missing.value}").unwrap();

        let r = resolver(&[
            ("alias.name", "db"),
            ("target.name", "dataSource"),
            ("missing.value", "@null"),
        ]);
        process_definitions(&mut tree, &r, None).unwrap();

        let aliases: Vec<_> = tree
            .aliases()
            .iter()
            .map(|(a, t)| (a.as_str(), t.as_str()))
            .collect();
        assert_eq!(aliases, vec![("plain", "dataSource"), ("db", "dataSource")]);
        assert_eq!(tree.canonical_name("db"), "dataSource");
    }

    #[test]
    fn test_alias_resolving_to_target_is_dropped() {
        let mut tree = DefinitionTree::new();
        tree.register_alias("${self}", "dataSource").unwrap();

        tree.resolve_aliases(&resolver(&[("self", "dataSource")])).unwrap();
        assert!(tree.aliases().is_empty());
    }

    #[test]
    fn test_alias_conflict() {
        let mut tree = DefinitionTree::new();
        tree.register_alias("db", "primary").unwrap();
        tree.register_alias("${alias.name}", "secondary").unwrap();

        let err = tree
            .resolve_aliases(&resolver(&[("alias.name", "db")]))
            .unwrap_err();

        assert_eq!(
            err.kind,
            ErrorKind::AliasConflict {
                alias: "db".into(),
                target: "primary".into()
            }
        );
    }

    #[test]
    fn test_duplicate_alias_after_resolution_is_merged() {
        let mut tree = DefinitionTree::new();
        tree.register_alias("db", "primary").unwrap();
        tree.register_alias("${alias.name}", "primary").unwrap();

        tree.resolve_aliases(&resolver(&[("alias.name", "db")])).unwrap();
        assert_eq!(tree.aliases().len(), 1);
        assert_eq!(tree.canonical_name("db"), "primary");
    }

    #[test]
    fn test_alias_circle_rejected() {
        let mut tree = DefinitionTree::new();
        tree.register_alias("a", "b").unwrap();
        tree.register_alias("b", "c").unwrap();

        assert!(tree.register_alias("c", "a").is_err());
        assert_eq!(tree.canonical_name("a"), "c");
    }

    #[test]
    fn test_from_file_json() {
        let temp_dir = std::env::temp_dir().join("envconf_test_definitions_json");
        std::fs::create_dir_all(&temp_dir).unwrap();
        let path = temp_dir.join("beans.json");
        std::fs::write(
            &path,
            r#"{"definitions": {"svc": {"port": "${port}"}}, "aliases": {"service": "svc"}}"#,
        )
        .unwrap();

        let tree = DefinitionTree::from_file(&path).unwrap();
        assert_eq!(tree.definition_names(), vec!["svc"]);
        assert!(tree.resource_description("svc").unwrap().contains("beans.json"));
        assert_eq!(tree.resource_description("other"), None);
        assert_eq!(tree.canonical_name("service"), "svc");

        std::fs::remove_dir_all(&temp_dir).ok();
    }

    #[test]
    fn test_from_file_missing() {
        let err = DefinitionTree::from_file("/nonexistent/envconf/beans.yaml").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ResourceOpen);
    }

    #[test]
    fn test_serialize_round_trip_shape() {
        let tree = DefinitionTree::from_yaml(TREE).unwrap();
        let yaml = serde_yaml::to_string(&tree).unwrap();

        assert!(yaml.contains("dataSource:"));
        assert!(!yaml.contains("aliases"));
    }
}
