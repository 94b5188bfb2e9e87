//! Source loading
//!
//! Walks the configured locations in order and builds one merged property set:
//! - structured documents replace the running set with their matched entry
//! - flat property files merge into it key by key
//!
//! A location that cannot be opened is always skipped. A location that opens
//! but cannot be read or parsed aborts the pass, unless
//! `ignore_resource_not_found` is set.

use std::io::Read;
use std::sync::Arc;

use crate::document::{DocumentFormat, EnvironmentDocument};
use crate::error::{Error, Result};
use crate::merge::{merge_entries, AllowList};
use crate::properties::{self, PropertySet};
use crate::source::Resource;

/// Options for a loading pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Encoding label for flat property files (UTF-8 when unset)
    pub file_encoding: Option<String>,
    /// Skip locations that fail to read or parse instead of failing the pass
    pub ignore_resource_not_found: bool,
    /// Environment override; empty or unset selects the document default
    pub environment: Option<String>,
}

/// The outcome of a loading pass
#[derive(Debug, Clone, Default)]
pub struct LoadedProperties {
    /// The merged properties
    pub properties: PropertySet,
    /// Failures that were tolerated, in location order
    pub skipped: Vec<Error>,
}

/// Loads and merges properties from a list of locations
#[derive(Debug, Clone, Default)]
pub struct SourceLoader {
    options: LoaderOptions,
}

impl SourceLoader {
    pub fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Load every location in order into one merged set
    pub fn load(
        &self,
        locations: &[Arc<dyn Resource>],
        allow_lists: &[AllowList],
    ) -> Result<LoadedProperties> {
        let mut loaded = LoadedProperties::default();

        for location in locations {
            let description = location.description();

            let reader = match location.open() {
                Ok(reader) => reader,
                Err(e) => {
                    log::warn!("Could not open {}: {}", description, e);
                    loaded
                        .skipped
                        .push(Error::resource_open(&description, e.to_string()));
                    continue;
                }
            };

            log::debug!("Loading properties from {}", description);
            match self.load_location(location.as_ref(), reader, allow_lists, &mut loaded.properties)
            {
                Ok(()) => {}
                Err(e) if self.options.ignore_resource_not_found && e.is_read_failure() => {
                    log::warn!(
                        "Could not load properties from {}: {}",
                        description,
                        e.cause.as_deref().unwrap_or("unknown cause")
                    );
                    loaded.skipped.push(e);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(loaded)
    }

    /// Read one opened location; the reader is dropped before returning
    fn load_location(
        &self,
        location: &dyn Resource,
        mut reader: Box<dyn Read + '_>,
        allow_lists: &[AllowList],
        merged: &mut PropertySet,
    ) -> Result<()> {
        let description = location.description();

        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| Error::resource_read(&description, e.to_string()))?;
        drop(reader);

        match location.filename().and_then(DocumentFormat::from_filename) {
            Some(format) => {
                let text = std::str::from_utf8(&bytes).map_err(|e| {
                    Error::resource_read(&description, format!("Content is not valid UTF-8: {}", e))
                })?;
                let document = EnvironmentDocument::parse(text, format)
                    .map_err(|e| e.with_resource(&description))?;
                let environment = document
                    .select_environment(self.options.environment.as_deref())
                    .map_err(|e| e.with_resource(&description))?;
                log::debug!("Using environment '{}' from {}", environment, description);

                match merge_entries(document.entries_for(environment), allow_lists) {
                    Some(properties) => *merged = properties,
                    None => log::debug!(
                        "No configuration type in {} matched the allowed types",
                        description
                    ),
                }
            }
            None => {
                let parsed = properties::decode(&bytes, self.options.file_encoding.as_deref())
                    .and_then(|text| properties::parse_properties(&text))
                    .map_err(|e| {
                        Error::resource_read(&description, e.cause.unwrap_or_default())
                    })?;
                merged.merge(parsed);
            }
        }

        Ok(())
    }
}
