//! Document Model
//!
//! Typed view of the parts of an OpenAPI document the flattener touches.
//! Every definition kind may be an alias (`$ref`); everything the flattener
//! does not care about is kept verbatim in ordered extension maps so that a
//! flattened document serializes back without losing fields.

use std::fmt;

use indexmap::IndexMap;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Component Kind
// =============================================================================

/// The nine reusable definition kinds, each with its own namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComponentKind {
    Schema,
    Response,
    RequestBody,
    Header,
    SecurityScheme,
    Link,
    Example,
    Parameter,
    Callback,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 9] = [
        ComponentKind::Schema,
        ComponentKind::Response,
        ComponentKind::RequestBody,
        ComponentKind::Header,
        ComponentKind::SecurityScheme,
        ComponentKind::Link,
        ComponentKind::Example,
        ComponentKind::Parameter,
        ComponentKind::Callback,
    ];

    /// Key of this kind's namespace under `components`
    pub fn namespace_key(&self) -> &'static str {
        match self {
            ComponentKind::Schema => "schemas",
            ComponentKind::Response => "responses",
            ComponentKind::RequestBody => "requestBodies",
            ComponentKind::Header => "headers",
            ComponentKind::SecurityScheme => "securitySchemes",
            ComponentKind::Link => "links",
            ComponentKind::Example => "examples",
            ComponentKind::Parameter => "parameters",
            ComponentKind::Callback => "callbacks",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComponentKind::Schema => "schema",
            ComponentKind::Response => "response",
            ComponentKind::RequestBody => "request body",
            ComponentKind::Header => "header",
            ComponentKind::SecurityScheme => "security scheme",
            ComponentKind::Link => "link",
            ComponentKind::Example => "example",
            ComponentKind::Parameter => "parameter",
            ComponentKind::Callback => "callback",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Schema
// =============================================================================

/// A schema definition. Only the reference-bearing fields are typed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<Value>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, Schema>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,

    #[serde(
        rename = "additionalProperties",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_properties: Option<AdditionalProperties>,

    #[serde(rename = "allOf", default, skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<Schema>,

    #[serde(rename = "oneOf", default, skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<Schema>,

    #[serde(rename = "anyOf", default, skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<Schema>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not: Option<Box<Schema>>,

    /// Everything else, in document order
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

/// `additionalProperties`: either a flag or the schema of map values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Any(bool),
    Schema(Box<Schema>),
}

impl Schema {
    /// A schema that is only a pointer
    pub fn new_ref(reference: impl Into<String>) -> Self {
        Self {
            reference: Some(reference.into()),
            ..Self::default()
        }
    }

    /// An array schema over `items`
    pub fn array_of(items: Schema) -> Self {
        Self {
            schema_type: Some(Value::String("array".into())),
            items: Some(Box::new(items)),
            ..Self::default()
        }
    }

    /// A map schema whose values are `values`
    pub fn map_of(values: Schema) -> Self {
        Self {
            schema_type: Some(Value::String("object".into())),
            additional_properties: Some(AdditionalProperties::Schema(Box::new(values))),
            ..Self::default()
        }
    }

    /// Array-shaped: typed `array` (also inside a 3.1 type list) or carrying `items`
    pub fn is_array(&self) -> bool {
        let typed_array = match &self.schema_type {
            Some(Value::String(t)) => t == "array",
            Some(Value::Array(types)) => types.iter().any(|t| t == "array"),
            _ => false,
        };
        typed_array || self.items.is_some()
    }

    /// The schema of map values, when `additionalProperties` is a schema
    pub fn map_values_mut(&mut self) -> Option<&mut Schema> {
        match self.additional_properties.as_mut() {
            Some(AdditionalProperties::Schema(schema)) => Some(schema),
            _ => None,
        }
    }
}

// =============================================================================
// Alias-or-Body Kinds
// =============================================================================

macro_rules! alias_component {
    ($(#[$meta:meta])* $Name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct $Name {
            #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
            pub reference: Option<String>,

            #[serde(flatten)]
            pub fields: IndexMap<String, Value>,
        }

        impl $Name {
            /// A definition that is only a pointer
            pub fn new_ref(reference: impl Into<String>) -> Self {
                Self {
                    reference: Some(reference.into()),
                    fields: IndexMap::new(),
                }
            }
        }
    };
}

alias_component!(
    /// A reusable response
    Response
);
alias_component!(
    /// A reusable request body
    RequestBody
);
alias_component!(
    /// A reusable header
    Header
);
alias_component!(
    /// A security scheme
    SecurityScheme
);
alias_component!(
    /// A design-time link
    Link
);
alias_component!(
    /// A reusable example
    Example
);
alias_component!(
    /// A reusable parameter
    Parameter
);

// =============================================================================
// Callback
// =============================================================================

/// A callback: runtime expression → path item.
///
/// On the wire a callback alias is a `$ref` key sitting next to (or instead
/// of) the expressions. It is lifted into `alias` so that it never shows up
/// as an expression.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Callback {
    pub alias: Option<String>,
    pub expressions: IndexMap<String, Value>,
}

impl Callback {
    pub fn new_ref(reference: impl Into<String>) -> Self {
        Self {
            alias: Some(reference.into()),
            expressions: IndexMap::new(),
        }
    }
}

impl Serialize for Callback {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.expressions.len() + usize::from(self.alias.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        if let Some(alias) = &self.alias {
            map.serialize_entry("$ref", alias)?;
        }
        for (expression, path_item) in &self.expressions {
            map.serialize_entry(expression, path_item)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Callback {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut expressions = IndexMap::<String, Value>::deserialize(deserializer)?;
        let alias = match expressions.shift_remove("$ref") {
            None => None,
            Some(Value::String(reference)) => Some(reference),
            Some(other) => {
                return Err(de::Error::custom(format!(
                    "callback `$ref` must be a string, found {other}"
                )))
            }
        };
        Ok(Self { alias, expressions })
    }
}

// =============================================================================
// Components and Document
// =============================================================================

/// The shared namespace: one ordered map per kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Components {
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub schemas: IndexMap<String, Schema>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub responses: IndexMap<String, Response>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub parameters: IndexMap<String, Parameter>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub examples: IndexMap<String, Example>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub request_bodies: IndexMap<String, RequestBody>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, Header>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub security_schemes: IndexMap<String, SecurityScheme>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub links: IndexMap<String, Link>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub callbacks: IndexMap<String, Callback>,

    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

impl Components {
    /// Total number of definitions across every kind
    pub fn len(&self) -> usize {
        self.schemas.len()
            + self.responses.len()
            + self.parameters.len()
            + self.examples.len()
            + self.request_bodies.len()
            + self.headers.len()
            + self.security_schemes.len()
            + self.links.len()
            + self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A root document. `paths` stays untyped; the processor walks it by context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenApi {
    /// `openapi`, `info`, `servers`, ... in document order
    #[serde(flatten)]
    pub fields: IndexMap<String, Value>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub paths: IndexMap<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
}
