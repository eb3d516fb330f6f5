//! Document Sources
//!
//! Byte-level retrieval of the documents that external references point
//! into, and parsing of their text into a JSON value tree.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use url::Url;

use crate::error::{FlattenError, Result};
use crate::reference::RefFormat;

/// Fetches the text of a document by location (the part of a reference
/// before `#`).
pub trait DocumentSource {
    fn fetch(&self, location: &str, format: RefFormat) -> Result<String>;
}

impl<S: DocumentSource + ?Sized> DocumentSource for &S {
    fn fetch(&self, location: &str, format: RefFormat) -> Result<String> {
        (**self).fetch(location, format)
    }
}

// =============================================================================
// Filesystem
// =============================================================================

/// Reads documents from disk. Relative locations are resolved against `root`
/// (normally the directory of the root document); `file://` URLs are read
/// directly; other URLs are not supported.
#[derive(Debug, Clone)]
pub struct FileSystemSource {
    root: PathBuf,
}

impl FileSystemSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, location: &str) -> Result<PathBuf> {
        if location.contains("://") {
            let url = Url::parse(location)
                .map_err(|_| FlattenError::UnsupportedLocation(location.to_string()))?;
            if url.scheme() != "file" {
                return Err(FlattenError::UnsupportedLocation(location.to_string()));
            }
            return url
                .to_file_path()
                .map_err(|_| FlattenError::UnsupportedLocation(location.to_string()));
        }

        let path = Path::new(location);
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            Ok(self.root.join(path))
        }
    }
}

impl DocumentSource for FileSystemSource {
    fn fetch(&self, location: &str, _format: RefFormat) -> Result<String> {
        let path = self.path_for(location)?;
        fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => FlattenError::NotFound(path.display().to_string()),
            _ => FlattenError::Io(e),
        })
    }
}

// =============================================================================
// In-Memory
// =============================================================================

/// Documents held in memory, keyed by location. `./a.yaml` and `a.yaml` are
/// the same location.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    documents: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, location: &str, text: impl Into<String>) -> Self {
        self.insert(location, text);
        self
    }

    pub fn insert(&mut self, location: &str, text: impl Into<String>) {
        self.documents.insert(normalize_location(location), text.into());
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl DocumentSource for MemorySource {
    fn fetch(&self, location: &str, _format: RefFormat) -> Result<String> {
        self.documents
            .get(&normalize_location(location))
            .cloned()
            .ok_or_else(|| FlattenError::NotFound(location.to_string()))
    }
}

fn normalize_location(location: &str) -> String {
    let mut location = location;
    while let Some(rest) = location.strip_prefix("./") {
        location = rest;
    }
    location.to_string()
}

// =============================================================================
// Parsing
// =============================================================================

/// Parse document text. JSON when it opens with `{` or `[`, YAML otherwise.
pub fn parse_document(location: &str, text: &str) -> Result<Value> {
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    if trimmed.is_empty() {
        return Err(FlattenError::InvalidDocument {
            location: location.to_string(),
            reason: "document is empty".to_string(),
        });
    }

    let value = if trimmed.starts_with('{') || trimmed.starts_with('[') {
        serde_json::from_str(trimmed)?
    } else {
        serde_yaml::from_str::<Value>(trimmed)?
    };

    if value.is_null() {
        return Err(FlattenError::InvalidDocument {
            location: location.to_string(),
            reason: "document is null".to_string(),
        });
    }
    Ok(value)
}
