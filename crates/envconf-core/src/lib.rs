//! envconf-core: Environment-aware configuration with placeholder resolution
//!
//! This crate loads configuration from multi-environment documents and flat
//! property files, keeps the configuration types that apply to the active
//! environment, and resolves `${name}` placeholders in container definitions
//! against the merged result.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use envconf_core::{
//!     AllowList, ConfigurerOptions, DefinitionTree, InlineResource, PlaceholderConfigurer,
//!     Resource, Value,
//! };
//!
//! let document = r#"
//! defaultEnvironment: dev
//! environments:
//!   - name: dev
//!     configs:
//!       - type: database
//!         properties:
//!           db.host: localhost
//! "#;
//!
//! let options = ConfigurerOptions {
//!     configuration_types: vec![AllowList::parse("database")],
//!     environment: Some("dev".into()),
//!     ..Default::default()
//! };
//! let location: Arc<dyn Resource> = Arc::new(InlineResource::new("app.yaml", document));
//! let configurer = PlaceholderConfigurer::new(options).with_locations(vec![location]);
//!
//! let mut definitions = DefinitionTree::new();
//! definitions.insert("dataSource", "jdbc:postgresql://${db.host}/app");
//! configurer.post_process(&mut definitions).unwrap();
//!
//! assert_eq!(
//!     definitions.get("dataSource"),
//!     Some(&Value::from("jdbc:postgresql://localhost/app"))
//! );
//! ```

pub mod container;
pub mod document;
pub mod error;
pub mod loader;
pub mod merge;
pub mod placeholder;
pub mod properties;
pub mod source;
pub mod value;

mod configurer;

pub use configurer::{
    ConfigurerOptions, IdentityConverter, PlaceholderConfigurer, PropertyConverter,
    DEFAULT_ENVIRONMENT_VARIABLE,
};
pub use container::{process_definitions, DefinitionContainer, DefinitionTree, StringValueResolver};
pub use document::{ConfigEntry, DocumentFormat, EnvironmentDocument};
pub use error::{Error, ErrorKind, Result};
pub use loader::{LoadedProperties, LoaderOptions, SourceLoader};
pub use merge::{merge_entries, AllowList};
pub use placeholder::{EnvironmentFallback, PlaceholderOptions, PlaceholderResolver};
pub use properties::PropertySet;
pub use source::{FileResource, InlineResource, Resource};
pub use value::Value;
