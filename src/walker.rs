//! Nested Reference Walker
//!
//! Finds the references embedded in a schema and resolves each one against
//! the document the schema came from. The walk is deliberately shallow and
//! fixed in shape:
//!
//! 1. each named property: a direct reference, else array items, else the
//!    map value (direct or array-of-reference);
//! 2. the schema's own `additionalProperties`: direct, array-of-reference,
//!    or a nested map;
//! 3. the schema's own array items.
//!
//! Deeper structure is reached through the resolver: every definition it
//! inserts is walked in turn.
//!
//! Schemas written in the root document are different: nothing else will
//! visit them, so [`walk_root_schema`] descends through every subschema,
//! composition keywords included.

use std::borrow::Cow;

use crate::graph::DefinitionId;
use crate::model::{ComponentKind, Schema};
use crate::reference::{join, local_pointer, RefFormat};
use crate::resolver::{Resolution, Resolver};

/// Walk `schema`, resolving and rewriting the references it carries.
///
/// `location` is the document the schema was loaded from. `None` means the
/// root document: external references are resolved as written and internal
/// ones are already local.
pub(crate) fn walk_schema(
    resolver: &mut Resolver<'_>,
    schema: &mut Schema,
    location: Option<&str>,
    owner: Option<&DefinitionId>,
) {
    for property in schema.properties.values_mut() {
        if property.reference.is_some() {
            resolve_schema_ref(resolver, property, location, owner);
        } else if property.is_array() {
            if let Some(items) = property.items.as_deref_mut() {
                resolve_schema_ref(resolver, items, location, owner);
            }
        } else if let Some(values) = property.map_values_mut() {
            walk_map_value(resolver, values, location, owner, false);
        }
    }

    if let Some(values) = schema.map_values_mut() {
        walk_map_value(resolver, values, location, owner, true);
    }

    if schema.is_array() {
        if let Some(items) = schema.items.as_deref_mut() {
            resolve_schema_ref(resolver, items, location, owner);
        }
    }
}

/// Walk a schema of the root document and every subschema under it
/// (`properties`, `items`, `additionalProperties`, `allOf`, `oneOf`, `anyOf`,
/// `not`). A schema carrying a `$ref` is resolved and not descended into.
pub(crate) fn walk_root_schema(
    resolver: &mut Resolver<'_>,
    schema: &mut Schema,
    owner: Option<&DefinitionId>,
) {
    if schema.reference.is_some() {
        resolve_schema_ref(resolver, schema, None, owner);
        return;
    }

    for property in schema.properties.values_mut() {
        walk_root_schema(resolver, property, owner);
    }
    if let Some(items) = schema.items.as_deref_mut() {
        walk_root_schema(resolver, items, owner);
    }
    if let Some(values) = schema.map_values_mut() {
        walk_root_schema(resolver, values, owner);
    }
    for subschema in schema
        .all_of
        .iter_mut()
        .chain(schema.one_of.iter_mut())
        .chain(schema.any_of.iter_mut())
    {
        walk_root_schema(resolver, subschema, owner);
    }
    if let Some(not) = schema.not.as_deref_mut() {
        walk_root_schema(resolver, not, owner);
    }
}

/// The value schema of a map: a direct reference, an array of references, or
/// (one level only, when `nested` is set) another map.
fn walk_map_value(
    resolver: &mut Resolver<'_>,
    values: &mut Schema,
    location: Option<&str>,
    owner: Option<&DefinitionId>,
    nested: bool,
) {
    if values.reference.is_some() {
        resolve_schema_ref(resolver, values, location, owner);
    } else if values.is_array() {
        if let Some(items) = values.items.as_deref_mut() {
            resolve_schema_ref(resolver, items, location, owner);
        }
    } else if nested {
        if let Some(inner) = values.map_values_mut() {
            walk_map_value(resolver, inner, location, owner, false);
        }
    }
}

/// Resolve the `$ref` of `schema`, if any, and rewrite it.
///
/// External references are joined with the containing location first, and
/// keep the joined form when they cannot be loaded. Internal references are
/// re-anchored at the containing location.
fn resolve_schema_ref(
    resolver: &mut Resolver<'_>,
    schema: &mut Schema,
    location: Option<&str>,
    owner: Option<&DefinitionId>,
) {
    let Some(raw) = schema.reference.clone() else {
        return;
    };
    let format = RefFormat::of(&raw);

    let resolution = match (location, format.is_external()) {
        (Some(location), true) => {
            let joined = join(location, &raw);
            let joined_format = if joined.starts_with('.') {
                RefFormat::Relative
            } else {
                RefFormat::Url
            };
            schema.reference = Some(joined.clone());
            resolver.resolve_reference::<Schema>(&joined, joined_format, owner)
        }
        (Some(location), false) => {
            let anchored = format!("{location}{}", internal_fragment(&raw));
            resolver.resolve_reference::<Schema>(&anchored, RefFormat::Relative, owner)
        }
        (None, true) => resolver.resolve_reference::<Schema>(&raw, format, owner),
        (None, false) => return,
    };

    if let Resolution::Local(name) = resolution {
        schema.reference = Some(local_pointer(ComponentKind::Schema, &name));
    }
}

/// A bare schema name is shorthand for `#/components/schemas/<name>`
fn internal_fragment(reference: &str) -> Cow<'_, str> {
    if reference.starts_with('#') {
        Cow::Borrowed(reference)
    } else {
        Cow::Owned(local_pointer(ComponentKind::Schema, reference))
    }
}
