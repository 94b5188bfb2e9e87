//! Source locations
//!
//! The loader only needs a name to pick a parser and a byte stream to read.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// A configuration source that can be opened for reading
pub trait Resource: Send + Sync {
    /// Human-readable description used in logs and errors
    fn description(&self) -> String;

    /// File name, used to detect structured documents by extension
    fn filename(&self) -> Option<&str>;

    /// Open a fresh stream over the resource's bytes
    fn open(&self) -> io::Result<Box<dyn Read + '_>>;
}

/// A resource backed by a file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResource {
    path: PathBuf,
}

impl FileResource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Resource for FileResource {
    fn description(&self) -> String {
        format!("file [{}]", self.path.display())
    }

    fn filename(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }

    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(File::open(&self.path)?))
    }
}

/// A named in-memory resource (stdin, tests, embedded defaults)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineResource {
    name: String,
    content: Vec<u8>,
}

impl InlineResource {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

impl Resource for InlineResource {
    fn description(&self) -> String {
        format!("inline [{}]", self.name)
    }

    fn filename(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(self.content.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_resource() {
        let resource = InlineResource::new("app.properties", "a=1\n");
        let mut content = String::new();
        resource.open().unwrap().read_to_string(&mut content).unwrap();

        assert_eq!(content, "a=1\n");
        assert_eq!(resource.filename(), Some("app.properties"));
        assert_eq!(resource.description(), "inline [app.properties]");
    }

    #[test]
    fn test_file_resource() {
        let temp_dir = std::env::temp_dir().join("envconf_test_file_resource");
        std::fs::create_dir_all(&temp_dir).unwrap();
        let path = temp_dir.join("settings.yaml");
        std::fs::write(&path, "defaultEnvironment: dev\n").unwrap();

        let resource = FileResource::new(&path);
        let mut content = String::new();
        resource.open().unwrap().read_to_string(&mut content).unwrap();

        assert_eq!(content, "defaultEnvironment: dev\n");
        assert_eq!(resource.filename(), Some("settings.yaml"));
        assert!(resource.description().contains("settings.yaml"));

        std::fs::remove_dir_all(&temp_dir).ok();
    }

    #[test]
    fn test_missing_file_fails_to_open() {
        let resource = FileResource::new("/nonexistent/envconf/app.properties");
        assert!(resource.open().is_err());
    }
}
