//! Reference Strings
//!
//! Classification of `$ref` strings, splitting them into document location and
//! JSON pointer, formatting local component pointers, and joining a nested
//! reference onto the location of the document that contains it.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::model::ComponentKind;

// =============================================================================
// Reference Format
// =============================================================================

/// Where a reference points, computed from its syntax alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefFormat {
    /// Points into the same document (`#/components/schemas/Foo`)
    Internal,
    /// Points into another file, resolved relative to a base (`./other.yaml#/Foo`)
    Relative,
    /// Absolute network or scheme-qualified location (`https://host/spec.yaml#/Foo`)
    Url,
}

impl RefFormat {
    /// Classify a raw reference string.
    ///
    /// A path without scheme that carries a file extension (`other.yaml#/Foo`)
    /// is read as `./other.yaml#/Foo`. A bare token (`Pet`) is shorthand for a
    /// local schema name and is internal.
    pub fn of(reference: &str) -> Self {
        let munged = munge(reference);
        let reference = munged.as_deref().unwrap_or(reference);

        if reference.starts_with("http") || has_scheme(reference) {
            RefFormat::Url
        } else if reference.starts_with("#/") {
            RefFormat::Internal
        } else if reference.starts_with('.')
            || reference.starts_with('/')
            || reference.find('#').is_some_and(|i| i > 0)
        {
            RefFormat::Relative
        } else {
            RefFormat::Internal
        }
    }

    /// Whether a reference of this format needs flattening
    pub fn is_external(self) -> bool {
        matches!(self, RefFormat::Relative | RefFormat::Url)
    }
}

impl fmt::Display for RefFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal => write!(f, "internal"),
            Self::Relative => write!(f, "relative"),
            Self::Url => write!(f, "url"),
        }
    }
}

fn munge(reference: &str) -> Option<String> {
    let bare_file = !reference.contains(':')
        && !reference.starts_with('#')
        && !reference.starts_with('/')
        && reference.find('.').is_some_and(|i| i > 0);
    bare_file.then(|| format!("./{reference}"))
}

/// RFC3986 scheme: ALPHA *( ALPHA / DIGIT / "+" / "-" / "." ) ":"
fn has_scheme(s: &str) -> bool {
    let Some((scheme, _)) = s.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

// =============================================================================
// Splitting
// =============================================================================

/// The document location of a reference: everything before the fragment
/// delimiter. A reference without a fragment is all location.
pub fn location_of(reference: &str) -> &str {
    reference.split_once('#').map_or(reference, |(location, _)| location)
}

/// The fragment (JSON pointer) of a reference, without the leading `#`
pub fn pointer_of(reference: &str) -> Option<&str> {
    reference.split_once('#').map(|(_, pointer)| pointer)
}

/// Local pointer for a flattened definition: `#/components/<kind>/<name>`
pub fn local_pointer(kind: ComponentKind, name: &str) -> String {
    let escaped = name.replace('~', "~0").replace('/', "~1");
    format!("#/components/{}/{}", kind.namespace_key(), escaped)
}

// =============================================================================
// URI Join
// =============================================================================

/// Resolve `fragment` against the location `base` of the document containing it.
///
/// Hierarchical resolution followed by normalization, with two corrections:
/// a base with an empty path is treated as ending in `/`, and when the base
/// was path- or dot-relative a result beginning with a letter gets its `./`
/// back. Anything unparseable returns `base` unchanged.
pub fn join(base: &str, fragment: &str) -> String {
    let is_relative = base.starts_with('/') || base.starts_with('.');

    let joined = if has_scheme(base) {
        join_absolute(base, fragment)
    } else {
        join_relative(base, fragment)
    };

    match joined {
        Some(joined)
            if is_relative
                && !has_scheme(&joined)
                && joined.starts_with(|c: char| c.is_alphabetic()) =>
        {
            format!("./{joined}")
        }
        Some(joined) => joined,
        None => base.to_string(),
    }
}

fn join_absolute(base: &str, fragment: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(fragment).ok().map(String::from)
}

fn join_relative(base: &str, fragment: &str) -> Option<String> {
    if !is_uri_text(base) || !is_uri_text(fragment) {
        return None;
    }
    if has_scheme(fragment) {
        return Url::parse(fragment).ok().map(String::from);
    }

    let base = UriRef::split(base);
    let reference = UriRef::split(fragment);

    let base_path = if base.path.is_empty() && !reference.path.starts_with('/') {
        "/"
    } else {
        base.path
    };

    let (path, query) = if reference.path.is_empty() {
        (base_path.to_string(), reference.query.or(base.query))
    } else if reference.path.starts_with('/') {
        (reference.path.to_string(), reference.query)
    } else {
        let directory = base_path.rfind('/').map_or("", |i| &base_path[..=i]);
        (format!("{directory}{}", reference.path), reference.query)
    };

    let mut joined = normalize_path(&path);
    if let Some(query) = query {
        joined.push('?');
        joined.push_str(query);
    }
    if let Some(fragment) = reference.fragment {
        joined.push('#');
        joined.push_str(fragment);
    }
    Some(joined)
}

/// Characters a URI reference may not contain unescaped
fn is_uri_text(s: &str) -> bool {
    !s.chars().any(|c| {
        c.is_whitespace()
            || c.is_control()
            || matches!(c, '"' | '<' | '>' | '\\' | '^' | '`' | '{' | '|' | '}')
    })
}

/// Path, query and fragment of a scheme-less reference
struct UriRef<'a> {
    path: &'a str,
    query: Option<&'a str>,
    fragment: Option<&'a str>,
}

impl<'a> UriRef<'a> {
    fn split(s: &'a str) -> Self {
        let (rest, fragment) = match s.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment)),
            None => (s, None),
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };
        Self { path, query, fragment }
    }
}

/// Remove `.` and `name/..` segments and redundant slashes. Unmatched `..`
/// segments are kept, so relative paths may still climb above their start.
fn normalize_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let body = if absolute { &path[1..] } else { path };
    let segments: Vec<&str> = body.split('/').collect();
    let last = segments.len() - 1;

    let mut stack: Vec<&str> = Vec::with_capacity(segments.len());
    let mut trailing_slash = false;

    for (i, segment) in segments.into_iter().enumerate() {
        match segment {
            "." => trailing_slash = i == last,
            ".." => {
                match stack.last() {
                    Some(&top) if top != ".." => {
                        stack.pop();
                    }
                    _ => stack.push(".."),
                }
                trailing_slash = i == last;
            }
            "" => trailing_slash = i == last && i > 0,
            segment => {
                stack.push(segment);
                trailing_slash = false;
            }
        }
    }

    let mut normalized = String::with_capacity(path.len());
    if absolute {
        normalized.push('/');
    }
    normalized.push_str(&stack.join("/"));
    if trailing_slash && !stack.is_empty() {
        normalized.push('/');
    }
    normalized
}
