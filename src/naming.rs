//! Local Name Allocation
//!
//! Picks the key under which a flattened definition lands in its kind's
//! namespace. The candidate comes from the reference itself; collisions with
//! definitions this pass did not put there are disambiguated by suffixing.

use std::borrow::Cow;
use std::collections::HashSet;

use indexmap::IndexMap;
use percent_encoding::percent_decode_str;

use crate::config::NamingConfig;
use crate::model::ComponentKind;
use crate::reference::{location_of, pointer_of};

// =============================================================================
// Occupancy
// =============================================================================

/// State of a single name in a namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Nothing there
    Free,
    /// Occupied by a definition that is only a pointer; may be overwritten
    Alias,
    /// Occupied by a definition this pass already flattened
    Claimed,
    /// Occupied by a definition that came from somewhere else
    Taken,
}

/// Snapshot of one kind's namespace as seen by a [`NamingStrategy`]
#[derive(Debug)]
pub struct Occupancy<'a> {
    kind: ComponentKind,
    /// name -> whether the occupant is an alias
    occupants: IndexMap<&'a str, bool>,
    consumed: &'a HashSet<(ComponentKind, String)>,
}

impl<'a> Occupancy<'a> {
    pub fn new(
        kind: ComponentKind,
        occupants: impl IntoIterator<Item = (&'a str, bool)>,
        consumed: &'a HashSet<(ComponentKind, String)>,
    ) -> Self {
        Self {
            kind,
            occupants: occupants.into_iter().collect(),
            consumed,
        }
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn slot(&self, name: &str) -> Slot {
        match self.occupants.get(name) {
            None => Slot::Free,
            Some(true) => Slot::Alias,
            Some(false) if self.consumed.contains(&(self.kind, name.to_owned())) => Slot::Claimed,
            Some(false) => Slot::Taken,
        }
    }
}

// =============================================================================
// Strategy
// =============================================================================

/// Allocates local names.
///
/// Must be deterministic for a given reference and occupancy, and must never
/// hand out a [`Slot::Taken`] name.
pub trait NamingStrategy {
    fn allocate(&self, reference: &str, occupancy: &Occupancy<'_>) -> String;
}

/// Default strategy: reuse the candidate when it is free, an alias, or
/// already claimed by this pass; otherwise append `<separator><n>` with the
/// smallest `n >= first_suffix` that is not taken.
#[derive(Debug, Clone)]
pub struct SuffixNaming {
    separator: String,
    first_suffix: u32,
}

impl SuffixNaming {
    pub fn new(separator: impl Into<String>, first_suffix: u32) -> Self {
        Self {
            separator: separator.into(),
            first_suffix,
        }
    }
}

impl Default for SuffixNaming {
    fn default() -> Self {
        Self::from(&NamingConfig::default())
    }
}

impl From<&NamingConfig> for SuffixNaming {
    fn from(config: &NamingConfig) -> Self {
        Self::new(config.separator.clone(), config.first_suffix)
    }
}

impl NamingStrategy for SuffixNaming {
    fn allocate(&self, reference: &str, occupancy: &Occupancy<'_>) -> String {
        let candidate = candidate_name(reference);
        if occupancy.slot(&candidate) != Slot::Taken {
            return candidate;
        }
        (u64::from(self.first_suffix)..)
            .map(|n| format!("{candidate}{}{n}", self.separator))
            .find(|name| occupancy.slot(name) != Slot::Taken)
            .unwrap_or(candidate)
    }
}

// =============================================================================
// Candidate Names
// =============================================================================

/// The name a reference suggests for itself.
///
/// With a fragment, the last JSON pointer segment (unescaped and
/// percent-decoded). Without one, the first non-empty dot label of the file
/// name: `dir/pet.schema.yaml` → `pet`.
pub fn candidate_name(reference: &str) -> String {
    let from_pointer = pointer_of(reference)
        .filter(|pointer| !pointer.trim_matches('/').is_empty())
        .and_then(|pointer| pointer.rsplit('/').find(|segment| !segment.is_empty()))
        .map(|segment| {
            let decoded = percent_decode_str(segment)
                .decode_utf8()
                .unwrap_or(Cow::Borrowed(segment));
            decoded.replace("~1", "/").replace("~0", "~")
        });
    if let Some(name) = from_pointer {
        return name;
    }

    let location = location_of(reference).trim_end_matches('/');
    let file_name = location.rsplit('/').next().unwrap_or(location);
    file_name
        .split('.')
        .find(|label| !label.is_empty())
        .map(String::from)
        .unwrap_or_else(|| String::from("definition"))
}
