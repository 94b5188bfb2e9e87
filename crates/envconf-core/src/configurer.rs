//! Resolution pass
//!
//! [`PlaceholderConfigurer`] drives one pass end to end: load every location,
//! select the active environment, filter and merge configuration types, run
//! the conversion hook, then hand a resolver to the definition container.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::container::{process_definitions, DefinitionContainer};
use crate::error::{Error, Result};
use crate::loader::{LoadedProperties, LoaderOptions, SourceLoader};
use crate::merge::AllowList;
use crate::placeholder::{PlaceholderOptions, PlaceholderResolver};
use crate::properties::PropertySet;
use crate::source::{FileResource, Resource};

/// Process variable consulted for the environment override by default
pub const DEFAULT_ENVIRONMENT_VARIABLE: &str = "SERVER_ENVIRONMENT";

/// Configuration of a resolution pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigurerOptions {
    /// Source locations, in precedence order (later wins)
    pub locations: Vec<PathBuf>,
    /// Allowed configuration types, each a comma-separated list
    pub configuration_types: Vec<AllowList>,
    /// Encoding label for flat property files
    pub file_encoding: Option<String>,
    /// Skip locations that fail to read or parse
    pub ignore_resource_not_found: bool,
    /// Explicit environment override; takes precedence over `environment_variable`
    pub environment: Option<String>,
    /// Process variable holding the environment override
    pub environment_variable: String,
    /// Definition excluded from resolution (the configurer's own)
    pub own_definition: Option<String>,
    pub placeholder: PlaceholderOptions,
}

impl Default for ConfigurerOptions {
    fn default() -> Self {
        Self {
            locations: Vec::new(),
            configuration_types: Vec::new(),
            file_encoding: None,
            ignore_resource_not_found: false,
            environment: None,
            environment_variable: DEFAULT_ENVIRONMENT_VARIABLE.into(),
            own_definition: None,
            placeholder: PlaceholderOptions::default(),
        }
    }
}

impl ConfigurerOptions {
    /// Parse options from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let options: Self = serde_yaml::from_str(yaml).map_err(|e| Error::parse(e.to_string()))?;
        options.placeholder.validate()?;
        Ok(options)
    }

    /// Parse options from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json).map_err(|e| Error::parse(e.to_string()))?;
        options.placeholder.validate()?;
        Ok(options)
    }

    /// Load options from a file; relative locations resolve against its directory
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::parse(format!("Failed to read file '{}': {}", path.display(), e))
        })?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let mut options = if is_json {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
        .map_err(|e| e.with_resource(path.display().to_string()))?;

        if let Some(base) = path.parent() {
            for location in &mut options.locations {
                if location.is_relative() {
                    *location = base.join(&*location);
                }
            }
        }

        Ok(options)
    }

    fn loader_options(&self, environment: Option<String>) -> LoaderOptions {
        LoaderOptions {
            file_encoding: self.file_encoding.clone(),
            ignore_resource_not_found: self.ignore_resource_not_found,
            environment,
        }
    }
}

/// Hook applied to every merged property before resolution
pub trait PropertyConverter: Send + Sync {
    fn convert_property(&self, name: &str, value: String) -> String;
}

impl<F> PropertyConverter for F
where
    F: Fn(&str, String) -> String + Send + Sync,
{
    fn convert_property(&self, name: &str, value: String) -> String {
        self(name, value)
    }
}

/// Leaves every value as loaded
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityConverter;

impl PropertyConverter for IdentityConverter {
    fn convert_property(&self, _name: &str, value: String) -> String {
        value
    }
}

/// Loads environment-aware properties and resolves placeholders in a container
pub struct PlaceholderConfigurer {
    options: ConfigurerOptions,
    locations: Vec<Arc<dyn Resource>>,
    converter: Box<dyn PropertyConverter>,
}

impl fmt::Debug for PlaceholderConfigurer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaceholderConfigurer")
            .field("options", &self.options)
            .field(
                "locations",
                &self
                    .locations
                    .iter()
                    .map(|l| l.description())
                    .collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl PlaceholderConfigurer {
    /// Create a configurer reading `options.locations` from disk
    pub fn new(options: ConfigurerOptions) -> Self {
        let locations = options
            .locations
            .iter()
            .map(|p| Arc::new(FileResource::new(p)) as Arc<dyn Resource>)
            .collect();
        Self {
            options,
            locations,
            converter: Box::new(IdentityConverter),
        }
    }

    /// Replace the locations with arbitrary resources
    pub fn with_locations(mut self, locations: Vec<Arc<dyn Resource>>) -> Self {
        self.locations = locations;
        self
    }

    /// Install a property conversion hook
    pub fn with_converter(mut self, converter: impl PropertyConverter + 'static) -> Self {
        self.converter = Box::new(converter);
        self
    }

    pub fn options(&self) -> &ConfigurerOptions {
        &self.options
    }

    pub fn locations(&self) -> &[Arc<dyn Resource>] {
        &self.locations
    }

    /// The environment override for this pass; empty counts as absent
    pub fn environment_override(&self) -> Option<String> {
        let name = match &self.options.environment {
            Some(name) => Some(name.clone()),
            None => std::env::var(&self.options.environment_variable).ok(),
        };
        name.filter(|n| !n.is_empty())
    }

    /// Load and merge every location, then apply the conversion hook
    pub fn load_properties(&self) -> Result<LoadedProperties> {
        let environment = self.environment_override();
        match &environment {
            Some(name) => log::debug!("Environment override: '{}'", name),
            None => log::debug!("No environment override; using document defaults"),
        }

        let loader = SourceLoader::new(self.options.loader_options(environment));
        let mut loaded = loader.load(&self.locations, &self.options.configuration_types)?;

        let converter = &self.converter;
        loaded.properties = std::mem::take(&mut loaded.properties)
            .map_values(|name, value| converter.convert_property(name, value));

        log::debug!(
            "Loaded {} properties from {} locations ({} skipped)",
            loaded.properties.len(),
            self.locations.len(),
            loaded.skipped.len()
        );
        Ok(loaded)
    }

    /// Build a resolver over an already merged property set
    pub fn build_resolver(&self, properties: PropertySet) -> Result<PlaceholderResolver> {
        PlaceholderResolver::new(properties, self.options.placeholder.clone())
    }

    /// Run a full pass against `container`
    ///
    /// Without locations nothing happens: the container is not touched and
    /// `None` is returned. Otherwise the merged properties are returned after
    /// every definition has been resolved.
    pub fn post_process(
        &self,
        container: &mut dyn DefinitionContainer,
    ) -> Result<Option<PropertySet>> {
        if self.locations.is_empty() {
            log::debug!("No locations configured; skipping placeholder resolution");
            return Ok(None);
        }

        let loaded = self.load_properties()?;
        let resolver = self.build_resolver(loaded.properties)?;
        process_definitions(container, &resolver, self.options.own_definition.as_deref())?;

        Ok(Some(resolver.properties().clone()))
    }
}
