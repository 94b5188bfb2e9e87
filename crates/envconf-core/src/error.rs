//! Error types for envconf
//!
//! Errors are structured: a kind, the resource or definition they relate to,
//! the underlying cause and an actionable help message.

use std::fmt;

/// Result type alias for envconf operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for envconf operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Resource (file, inline source) the error relates to
    pub resource: Option<String>,
    /// Container definition being processed when the error occurred
    pub definition: Option<String>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// A source location could not be opened; the loader skips it
    #[error("Could not open resource")]
    ResourceOpen,
    /// A source location was opened but could not be read or parsed
    #[error("Could not load properties from resource")]
    ResourceRead,
    /// A structured document does not have the expected shape
    #[error("Malformed configuration document")]
    MalformedDocument,
    /// A placeholder refers back to itself, directly or through other values
    #[error("Circular placeholder reference detected")]
    CircularReference,
    /// A placeholder could not be resolved and strict mode is enabled
    #[error("Could not resolve placeholder '{placeholder}'")]
    UnresolvedPlaceholder { placeholder: String },
    /// A resolved alias collides with an alias registered for another target
    #[error("Alias '{alias}' is already registered for '{target}'")]
    AliasConflict { alias: String, target: String },
    /// Error parsing options or definition files
    #[error("Parse error")]
    Parse,
}

impl Error {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            resource: None,
            definition: None,
            help: None,
            cause: None,
        }
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Parse)
        }
    }

    /// Create a resource open error
    pub fn resource_open(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            resource: Some(resource.into()),
            help: Some("Check that the location exists and is readable".into()),
            cause: Some(message.into()),
            ..Self::new(ErrorKind::ResourceOpen)
        }
    }

    /// Create a resource read error
    pub fn resource_read(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            resource: Some(resource.into()),
            help: Some(
                "Fix the file contents, or set ignore_resource_not_found to skip it".into(),
            ),
            cause: Some(message.into()),
            ..Self::new(ErrorKind::ResourceRead)
        }
    }

    /// Create a malformed document error
    pub fn malformed_document(message: impl Into<String>) -> Self {
        Self {
            help: Some(
                "Expected `defaultEnvironment` and `environments: [{ name, configs: [{ type, properties }] }]`"
                    .into(),
            ),
            cause: Some(message.into()),
            ..Self::new(ErrorKind::MalformedDocument)
        }
    }

    /// Create a circular reference error
    pub fn circular_reference(placeholder: impl Into<String>, chain: Vec<String>) -> Self {
        let chain_str = chain.join(" → ");
        Self {
            help: Some(format!(
                "Break the cycle by changing the value of '{}' or one of the properties it refers to",
                placeholder.into()
            )),
            cause: Some(format!("Chain: {}", chain_str)),
            ..Self::new(ErrorKind::CircularReference)
        }
    }

    /// Create an unresolved placeholder error
    pub fn unresolved_placeholder(placeholder: impl Into<String>, value: impl Into<String>) -> Self {
        let placeholder = placeholder.into();
        Self {
            help: Some(format!(
                "Define '{}' in one of the configured locations, or give it a default",
                placeholder
            )),
            cause: Some(format!("In value: \"{}\"", value.into())),
            ..Self::new(ErrorKind::UnresolvedPlaceholder { placeholder })
        }
    }

    /// Create an alias conflict error
    pub fn alias_conflict(
        alias: impl Into<String>,
        target: impl Into<String>,
        original: impl Into<String>,
    ) -> Self {
        Self {
            help: Some("Rename one of the aliases or make them resolve to the same target".into()),
            cause: Some(format!("Resolved from alias '{}'", original.into())),
            ..Self::new(ErrorKind::AliasConflict {
                alias: alias.into(),
                target: target.into(),
            })
        }
    }

    /// Add resource context to the error
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Add definition context to the error, keeping the first resource seen
    pub fn with_definition(mut self, name: impl Into<String>, description: Option<String>) -> Self {
        self.definition = Some(name.into());
        if self.resource.is_none() {
            self.resource = description;
        }
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Whether this is a read-class failure that `ignore_resource_not_found` may tolerate
    pub fn is_read_failure(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::ResourceRead | ErrorKind::MalformedDocument
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        if let Some(definition) = &self.definition {
            write!(f, "\n  Definition: {}", definition)?;
        }

        if let Some(resource) = &self.resource {
            write!(f, "\n  Resource: {}", resource)?;
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}
