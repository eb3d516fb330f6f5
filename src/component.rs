//! Kind Descriptors
//!
//! [`Component`] ties a definition type to its kind, its namespace inside
//! [`Components`], and its alias field, so that one resolution routine serves
//! all nine kinds. Only [`Schema`] descends into nested fields.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::graph::DefinitionId;
use crate::model::{
    Callback, ComponentKind, Components, Example, Header, Link, Parameter, RequestBody,
    Response, Schema, SecurityScheme,
};
use crate::resolver::Resolver;
use crate::walker;

pub trait Component: DeserializeOwned + Serialize + Clone + PartialEq + Sized {
    const KIND: ComponentKind;

    fn namespace(components: &Components) -> &IndexMap<String, Self>;

    fn namespace_mut(components: &mut Components) -> &mut IndexMap<String, Self>;

    /// The pointer this definition is an alias for, if any
    fn alias(&self) -> Option<&str>;

    fn set_alias(&mut self, reference: String);

    /// Resolve references nested inside the definition body.
    ///
    /// `location` is where the definition was loaded from. No-op for every
    /// kind but schemas: the others only chain through their top-level alias.
    fn resolve_nested(&mut self, _resolver: &mut Resolver<'_>, _location: &str, _owner: &DefinitionId) {}
}

macro_rules! component {
    ($Type:ty, $Kind:ident, $field:ident, $alias:ident $(, { $($extra:tt)* })?) => {
        impl Component for $Type {
            const KIND: ComponentKind = ComponentKind::$Kind;

            fn namespace(components: &Components) -> &IndexMap<String, Self> {
                &components.$field
            }

            fn namespace_mut(components: &mut Components) -> &mut IndexMap<String, Self> {
                &mut components.$field
            }

            fn alias(&self) -> Option<&str> {
                self.$alias.as_deref()
            }

            fn set_alias(&mut self, reference: String) {
                self.$alias = Some(reference);
            }

            $($($extra)*)?
        }
    };
}

component!(Schema, Schema, schemas, reference, {
    fn resolve_nested(&mut self, resolver: &mut Resolver<'_>, location: &str, owner: &DefinitionId) {
        walker::walk_schema(resolver, self, Some(location), Some(owner));
    }
});
component!(Response, Response, responses, reference);
component!(RequestBody, RequestBody, request_bodies, reference);
component!(Header, Header, headers, reference);
component!(SecurityScheme, SecurityScheme, security_schemes, reference);
component!(Link, Link, links, reference);
component!(Example, Example, examples, reference);
component!(Parameter, Parameter, parameters, reference);
component!(Callback, Callback, callbacks, alias);
