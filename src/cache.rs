//! Resolver Cache
//!
//! Per-pass memo tables: parsed documents by location, loaded fragments by raw
//! reference, the raw reference → local name map, and the names this pass has
//! put into the namespace. The name map is the only thing that breaks
//! reference cycles, so it must outlive any single recursive descent.

use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::model::ComponentKind;
use crate::reference::{location_of, pointer_of, RefFormat};
use crate::source::{parse_document, DocumentSource};

pub struct ResolverCache<'s> {
    source: &'s dyn DocumentSource,
    /// location -> parsed document (`None` when it could not be loaded)
    documents: HashMap<String, Option<Value>>,
    /// raw reference -> the fragment it points at
    fragments: HashMap<String, Value>,
    /// (kind, raw reference) -> local name
    renamed: HashMap<(ComponentKind, String), String>,
    /// names introduced into the namespace by this pass
    consumed: HashSet<(ComponentKind, String)>,
    /// references that could not be loaded, in order of first failure
    unresolved: IndexSet<String>,
}

impl<'s> ResolverCache<'s> {
    pub fn new(source: &'s dyn DocumentSource) -> Self {
        Self {
            source,
            documents: HashMap::new(),
            fragments: HashMap::new(),
            renamed: HashMap::new(),
            consumed: HashSet::new(),
            unresolved: IndexSet::new(),
        }
    }

    // --- Renamed references ---

    pub fn renamed(&self, kind: ComponentKind, reference: &str) -> Option<&str> {
        self.renamed
            .get(&(kind, reference.to_owned()))
            .map(String::as_str)
    }

    pub fn put_renamed(&mut self, kind: ComponentKind, reference: &str, name: &str) {
        self.renamed
            .insert((kind, reference.to_owned()), name.to_owned());
    }

    /// Number of raw references that have been given a local name
    pub fn renamed_count(&self) -> usize {
        self.renamed.len()
    }

    // --- Consumed names ---

    pub fn mark_consumed(&mut self, kind: ComponentKind, name: &str) {
        self.consumed.insert((kind, name.to_owned()));
    }

    pub fn is_consumed(&self, kind: ComponentKind, name: &str) -> bool {
        self.consumed.contains(&(kind, name.to_owned()))
    }

    pub fn consumed(&self) -> &HashSet<(ComponentKind, String)> {
        &self.consumed
    }

    // --- Unresolved references ---

    pub fn mark_unresolved(&mut self, reference: &str) {
        self.unresolved.insert(reference.to_owned());
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &str> {
        self.unresolved.iter().map(String::as_str)
    }

    // --- Loading ---

    /// Load the definition a reference points at.
    ///
    /// Any failure (document missing or unparseable, pointer not found,
    /// fragment of the wrong shape) is logged and reported as `None`.
    pub fn load<C: DeserializeOwned>(&mut self, reference: &str, format: RefFormat) -> Option<C> {
        let fragment = self.load_fragment(reference, format)?;
        match serde_json::from_value(fragment) {
            Ok(definition) => Some(definition),
            Err(e) => {
                debug!(reference, error = %e, "fragment does not deserialize as the requested kind");
                None
            }
        }
    }

    fn load_fragment(&mut self, reference: &str, format: RefFormat) -> Option<Value> {
        if let Some(fragment) = self.fragments.get(reference) {
            return Some(fragment.clone());
        }

        let location = location_of(reference);
        let pointer = pointer_of(reference).unwrap_or("");

        let fragment = {
            let document = self.document(location, format)?;
            match resolve_pointer(document, pointer) {
                Some(fragment) => fragment.clone(),
                None => {
                    debug!(reference, pointer, "pointer not found in document");
                    return None;
                }
            }
        };

        self.fragments.insert(reference.to_owned(), fragment.clone());
        Some(fragment)
    }

    fn document(&mut self, location: &str, format: RefFormat) -> Option<&Value> {
        if !self.documents.contains_key(location) {
            let parsed = self
                .source
                .fetch(location, format)
                .and_then(|text| parse_document(location, &text));
            let parsed = match parsed {
                Ok(document) => Some(document),
                Err(e) => {
                    debug!(location, error = %e, "failed to load document");
                    None
                }
            };
            self.documents.insert(location.to_owned(), parsed);
        }
        self.documents.get(location).and_then(Option::as_ref)
    }
}

/// Navigate a fragment pointer. The pointer may be percent-encoded and may
/// omit its leading slash; an empty pointer is the whole document.
pub fn resolve_pointer<'v>(document: &'v Value, pointer: &str) -> Option<&'v Value> {
    let decoded = percent_decode_str(pointer).decode_utf8().ok()?;
    let trimmed = decoded.trim_end_matches('/');
    if trimmed.is_empty() {
        return Some(document);
    }
    if trimmed.starts_with('/') {
        document.pointer(trimmed)
    } else {
        document.pointer(&format!("/{trimmed}"))
    }
}
