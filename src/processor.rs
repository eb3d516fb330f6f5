//! Document Processor
//!
//! Drives a [`Resolver`] over a whole root document: component aliases of
//! every kind, the in-document schemas, the other in-document components,
//! and the `paths` tree. Every external reference found is flattened and
//! rewritten to its local pointer; unresolved ones are left as written.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::component::Component;
use crate::config::FlattenConfig;
use crate::error::{FlattenError, Result};
use crate::graph::DefinitionId;
use crate::model::{
    Callback, ComponentKind, Example, Header, Link, OpenApi, Parameter, RequestBody, Response,
    Schema, SecurityScheme,
};
use crate::naming::{NamingStrategy, SuffixNaming};
use crate::reference::{local_pointer, RefFormat};
use crate::resolver::{Resolution, Resolver};
use crate::source::{parse_document, DocumentSource};
use crate::walker;

/// HTTP methods that carry an operation inside a path item
const OPERATIONS: [&str; 8] = ["get", "put", "post", "delete", "options", "head", "patch", "trace"];

// =============================================================================
// Report
// =============================================================================

/// Outcome of one flattening pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlattenReport {
    /// Distinct external references given a local name
    pub resolved: usize,
    /// External references that could not be loaded, in order of first failure
    pub unresolved: Vec<String>,
    /// Groups of flattened definitions that reference each other
    pub cycles: Vec<Vec<DefinitionId>>,
    /// Definitions in `components` after the pass
    pub definitions: usize,
    /// Distinct definition → definition references recorded
    pub edges: usize,
}

impl FlattenReport {
    /// Every external reference was flattened
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

// =============================================================================
// Flattener
// =============================================================================

/// Flattens root documents against a [`DocumentSource`].
pub struct Flattener<'s, N = SuffixNaming> {
    source: &'s dyn DocumentSource,
    naming: N,
}

impl<'s> Flattener<'s> {
    pub fn new(source: &'s dyn DocumentSource) -> Self {
        Self {
            source,
            naming: SuffixNaming::default(),
        }
    }
}

impl<'s, N: NamingStrategy + Clone + 's> Flattener<'s, N> {
    pub fn with_naming<M: NamingStrategy + Clone + 's>(self, naming: M) -> Flattener<'s, M> {
        Flattener {
            source: self.source,
            naming,
        }
    }

    /// Flatten `document` in place
    pub fn flatten(&self, document: &mut OpenApi) -> FlattenReport {
        let had_components = document.components.is_some();
        let components = document.components.take().unwrap_or_default();
        let original_schemas: Vec<String> = components.schemas.keys().cloned().collect();

        let mut resolver = Resolver::new(components, self.source).with_naming(self.naming.clone());

        flatten_aliases::<Schema>(&mut resolver);
        flatten_aliases::<Response>(&mut resolver);
        flatten_aliases::<RequestBody>(&mut resolver);
        flatten_aliases::<Header>(&mut resolver);
        flatten_aliases::<SecurityScheme>(&mut resolver);
        flatten_aliases::<Link>(&mut resolver);
        flatten_aliases::<Example>(&mut resolver);
        flatten_aliases::<Parameter>(&mut resolver);
        flatten_aliases::<Callback>(&mut resolver);

        walk_component_schemas(&mut resolver, &original_schemas);
        walk_component_bodies(&mut resolver);

        for (path, item) in document.paths.iter_mut() {
            debug!(path = %path, "walking path item");
            walk_path_item(&mut resolver, item);
        }

        let resolved = resolver.cache().renamed_count();
        let unresolved: Vec<String> = resolver.cache().unresolved().map(String::from).collect();
        let (components, graph) = resolver.finish();

        let report = FlattenReport {
            resolved,
            unresolved,
            cycles: graph.cycles(),
            definitions: components.len(),
            edges: graph.edge_count(),
        };

        document.components =
            if had_components || !components.is_empty() || !components.extensions.is_empty() {
                Some(components)
            } else {
                None
            };

        info!(
            resolved = report.resolved,
            unresolved = report.unresolved.len(),
            cycles = report.cycles.len(),
            definitions = report.definitions,
            edges = report.edges,
            "flattened document"
        );
        report
    }
}

/// Flatten `document` with the naming settings from `config`
pub fn flatten(document: &mut OpenApi, source: &dyn DocumentSource, config: &FlattenConfig) -> FlattenReport {
    Flattener::new(source)
        .with_naming(SuffixNaming::from(&config.naming))
        .flatten(document)
}

/// Read and parse a root document from disk
pub fn read_document(path: &Path) -> Result<OpenApi> {
    let location = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => FlattenError::NotFound(location.clone()),
        _ => FlattenError::Io(e),
    })?;
    let value = parse_document(&location, &text)?;
    if !value.is_object() {
        return Err(FlattenError::InvalidDocument {
            location,
            reason: "root document must be a mapping".to_string(),
        });
    }
    Ok(serde_json::from_value(value)?)
}

// =============================================================================
// Components
// =============================================================================

/// Resolve every in-document definition of kind `C` that is an alias to an
/// external reference, and point it at the flattened copy.
fn flatten_aliases<C: Component>(resolver: &mut Resolver<'_>) {
    let aliases: Vec<(String, String)> = C::namespace(resolver.components())
        .iter()
        .filter_map(|(name, definition)| {
            definition
                .alias()
                .filter(|alias| RefFormat::of(alias).is_external())
                .map(|alias| (name.clone(), alias.to_owned()))
        })
        .collect();

    for (name, alias) in aliases {
        let resolution = resolver.resolve_reference::<C>(&alias, RefFormat::of(&alias), None);
        let Resolution::Local(target) = resolution else {
            continue;
        };
        // Same name: the alias was replaced by the definition it pointed at
        if target == name {
            continue;
        }
        resolver.graph_mut().add_edge(
            DefinitionId::new(C::KIND, name.as_str()),
            DefinitionId::new(C::KIND, target.as_str()),
        );
        if let Some(definition) = C::namespace_mut(resolver.components_mut()).get_mut(&name) {
            if definition.alias() == Some(alias.as_str()) {
                definition.set_alias(local_pointer(C::KIND, &target));
            }
        }
    }
}

/// Walk the schemas the document defined itself. Names this pass filled with
/// a flattened definition were already walked from their own document.
fn walk_component_schemas(resolver: &mut Resolver<'_>, names: &[String]) {
    for name in names {
        if resolver.cache().is_consumed(ComponentKind::Schema, name) {
            continue;
        }
        let Some(original) = resolver.components().schemas.get(name).cloned() else {
            continue;
        };
        if original.reference.is_some() {
            continue;
        }

        let owner = DefinitionId::new(ComponentKind::Schema, name.as_str());
        let mut schema = original.clone();
        walker::walk_root_schema(resolver, &mut schema, Some(&owner));

        if schema != original {
            let schemas = &mut resolver.components_mut().schemas;
            if schemas.get(name) == Some(&original) {
                schemas.insert(name.clone(), schema);
            }
        }
    }
}

/// Walk the bodies of in-document responses, request bodies, parameters,
/// headers and callbacks for the references nested in them.
fn walk_component_bodies(resolver: &mut Resolver<'_>) {
    walk_bodies::<Response>(resolver, |resolver, fields| {
        walk_object(resolver, fields, walk_response_fields)
    });
    walk_bodies::<RequestBody>(resolver, |resolver, fields| {
        walk_object(resolver, fields, walk_request_body_fields)
    });
    walk_bodies::<Parameter>(resolver, |resolver, fields| {
        walk_object(resolver, fields, walk_parameter_fields)
    });
    walk_bodies::<Header>(resolver, |resolver, fields| {
        walk_object(resolver, fields, walk_header_fields)
    });
    walk_bodies::<Callback>(resolver, |resolver, expressions| {
        for item in expressions.values_mut() {
            walk_path_item(resolver, item);
        }
    });
}

/// Access to the untyped body of a definition
trait Body: Component {
    fn body_mut(&mut self) -> &mut indexmap::IndexMap<String, Value>;
}

macro_rules! body {
    ($Type:ty, $field:ident) => {
        impl Body for $Type {
            fn body_mut(&mut self) -> &mut indexmap::IndexMap<String, Value> {
                &mut self.$field
            }
        }
    };
}

body!(Response, fields);
body!(RequestBody, fields);
body!(Parameter, fields);
body!(Header, fields);
body!(Callback, expressions);

fn walk_bodies<C: Body>(
    resolver: &mut Resolver<'_>,
    walk: impl Fn(&mut Resolver<'_>, &mut indexmap::IndexMap<String, Value>),
) {
    let names: Vec<String> = C::namespace(resolver.components())
        .iter()
        .filter(|(name, definition)| {
            definition.alias().is_none() && !resolver.cache().is_consumed(C::KIND, name)
        })
        .map(|(name, _)| name.clone())
        .collect();

    for name in names {
        let Some(original) = C::namespace(resolver.components()).get(&name).cloned() else {
            continue;
        };
        let mut definition = original.clone();
        walk(resolver, definition.body_mut());

        if definition != original {
            let namespace = C::namespace_mut(resolver.components_mut());
            if namespace.get(&name) == Some(&original) {
                namespace.insert(name, definition);
            }
        }
    }
}

/// Run a field walker over an ordered map by round-tripping it through a JSON object
fn walk_object(
    resolver: &mut Resolver<'_>,
    fields: &mut indexmap::IndexMap<String, Value>,
    walk: fn(&mut Resolver<'_>, &mut Map<String, Value>),
) {
    let mut object: Map<String, Value> = std::mem::take(fields).into_iter().collect();
    walk(resolver, &mut object);
    *fields = object.into_iter().collect();
}

// =============================================================================
// Paths
// =============================================================================

fn walk_path_item(resolver: &mut Resolver<'_>, item: &mut Value) {
    let Some(item) = item.as_object_mut() else {
        return;
    };
    if let Some(parameters) = item.get_mut("parameters") {
        walk_parameters(resolver, parameters);
    }
    for method in OPERATIONS {
        if let Some(Value::Object(operation)) = item.get_mut(method) {
            walk_operation(resolver, operation);
        }
    }
}

fn walk_operation(resolver: &mut Resolver<'_>, operation: &mut Map<String, Value>) {
    if let Some(parameters) = operation.get_mut("parameters") {
        walk_parameters(resolver, parameters);
    }
    if let Some(body) = operation.get_mut("requestBody") {
        walk_kind(resolver, body, ComponentKind::RequestBody, walk_request_body_fields);
    }
    if let Some(Value::Object(responses)) = operation.get_mut("responses") {
        for response in responses.values_mut() {
            walk_kind(resolver, response, ComponentKind::Response, walk_response_fields);
        }
    }
    if let Some(Value::Object(callbacks)) = operation.get_mut("callbacks") {
        for callback in callbacks.values_mut() {
            walk_callback(resolver, callback);
        }
    }
}

fn walk_parameters(resolver: &mut Resolver<'_>, parameters: &mut Value) {
    if let Value::Array(parameters) = parameters {
        for parameter in parameters {
            walk_kind(resolver, parameter, ComponentKind::Parameter, walk_parameter_fields);
        }
    }
}

fn walk_callback(resolver: &mut Resolver<'_>, callback: &mut Value) {
    if resolve_value_ref(resolver, callback, ComponentKind::Callback) {
        return;
    }
    if let Value::Object(expressions) = callback {
        for item in expressions.values_mut() {
            walk_path_item(resolver, item);
        }
    }
}

fn walk_parameter_fields(resolver: &mut Resolver<'_>, parameter: &mut Map<String, Value>) {
    if let Some(schema) = parameter.get_mut("schema") {
        walk_schema_value(resolver, schema);
    }
    walk_content(resolver, parameter);
    walk_named(resolver, parameter, "examples", ComponentKind::Example);
}

fn walk_request_body_fields(resolver: &mut Resolver<'_>, body: &mut Map<String, Value>) {
    walk_content(resolver, body);
}

fn walk_response_fields(resolver: &mut Resolver<'_>, response: &mut Map<String, Value>) {
    if let Some(Value::Object(headers)) = response.get_mut("headers") {
        for header in headers.values_mut() {
            walk_kind(resolver, header, ComponentKind::Header, walk_header_fields);
        }
    }
    walk_content(resolver, response);
    walk_named(resolver, response, "links", ComponentKind::Link);
}

fn walk_header_fields(resolver: &mut Resolver<'_>, header: &mut Map<String, Value>) {
    walk_parameter_fields(resolver, header);
}

/// `content`: media type → `{ schema, examples }`
fn walk_content(resolver: &mut Resolver<'_>, owner: &mut Map<String, Value>) {
    let Some(Value::Object(content)) = owner.get_mut("content") else {
        return;
    };
    for media in content.values_mut() {
        let Value::Object(media) = media else {
            continue;
        };
        if let Some(schema) = media.get_mut("schema") {
            walk_schema_value(resolver, schema);
        }
        walk_named(resolver, media, "examples", ComponentKind::Example);
    }
}

/// A map of leaf definitions (examples, links) that can only be aliases
fn walk_named(resolver: &mut Resolver<'_>, owner: &mut Map<String, Value>, key: &str, kind: ComponentKind) {
    if let Some(Value::Object(entries)) = owner.get_mut(key) {
        for entry in entries.values_mut() {
            resolve_value_ref(resolver, entry, kind);
        }
    }
}

/// A definition of `kind` in the tree: either an alias to resolve, or a body
/// to walk with `walk`.
fn walk_kind(
    resolver: &mut Resolver<'_>,
    value: &mut Value,
    kind: ComponentKind,
    walk: fn(&mut Resolver<'_>, &mut Map<String, Value>),
) {
    if resolve_value_ref(resolver, value, kind) {
        return;
    }
    if let Value::Object(object) = value {
        walk(resolver, object);
    }
}

/// Schemas in the tree are walked in full, like component schemas
fn walk_schema_value(resolver: &mut Resolver<'_>, value: &mut Value) {
    if resolve_value_ref(resolver, value, ComponentKind::Schema) {
        return;
    }
    let Ok(original) = serde_json::from_value::<Schema>(value.clone()) else {
        return;
    };
    let mut schema = original.clone();
    walker::walk_root_schema(resolver, &mut schema, None);
    if schema != original {
        if let Ok(rewritten) = serde_json::to_value(&schema) {
            *value = rewritten;
        }
    }
}

/// Resolve the `$ref` of `value` as `kind` when it is external. Returns
/// whether `value` was a reference at all, internal ones included.
fn resolve_value_ref(resolver: &mut Resolver<'_>, value: &mut Value, kind: ComponentKind) -> bool {
    let Some(reference) = value.get("$ref").and_then(Value::as_str).map(str::to_owned) else {
        return false;
    };
    let format = RefFormat::of(&reference);
    if !format.is_external() {
        return true;
    }
    if let Resolution::Local(name) = resolver.resolve_kind(kind, &reference, format, None) {
        value["$ref"] = Value::String(local_pointer(kind, &name));
    }
    true
}
