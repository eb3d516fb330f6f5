//! External Reference Resolver
//!
//! Flattens external references into the shared namespace. One routine serves
//! every kind:
//!
//! 1. a raw reference already given a name returns that name;
//! 2. the target is loaded, and a miss leaves the raw reference in place;
//! 3. a local name is allocated;
//! 4. a materialized occupant of that name is kept, an alias occupant is replaced;
//! 5. the raw reference → name mapping is recorded either way;
//! 6. a freshly inserted definition has its alias followed and, for schemas,
//!    its nested references resolved, all anchored at the document it came from.
//!
//! Step 5 runs before any descent, which is what makes cyclic graphs terminate.

use tracing::{debug, warn};

use crate::cache::ResolverCache;
use crate::component::Component;
use crate::graph::{DefinitionId, ReferenceGraph};
use crate::model::{
    Callback, ComponentKind, Components, Example, Header, Link, Parameter, RequestBody,
    Response, Schema, SecurityScheme,
};
use crate::naming::{NamingStrategy, Occupancy, SuffixNaming};
use crate::reference::{local_pointer, location_of, RefFormat};
use crate::source::DocumentSource;

/// Outcome of resolving one reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Flattened under this local name
    Local(String),
    /// Could not be loaded; the raw reference is kept
    Unresolved(String),
}

impl Resolution {
    /// The string callers hand back: local name or untouched raw reference
    pub fn into_string(self) -> String {
        match self {
            Resolution::Local(name) | Resolution::Unresolved(name) => name,
        }
    }

    /// What a `$ref` field should now contain
    pub fn pointer(&self, kind: ComponentKind) -> String {
        match self {
            Resolution::Local(name) => local_pointer(kind, name),
            Resolution::Unresolved(raw) => raw.clone(),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Resolution::Local(_))
    }
}

/// One flattening session. Owns the namespace and the cache for the duration
/// of a pass; not shared between passes.
pub struct Resolver<'s> {
    components: Components,
    cache: ResolverCache<'s>,
    naming: Box<dyn NamingStrategy + 's>,
    graph: ReferenceGraph,
}

impl<'s> Resolver<'s> {
    pub fn new(components: Components, source: &'s dyn DocumentSource) -> Self {
        Self {
            components,
            cache: ResolverCache::new(source),
            naming: Box::new(SuffixNaming::default()),
            graph: ReferenceGraph::new(),
        }
    }

    pub fn with_naming(mut self, naming: impl NamingStrategy + 's) -> Self {
        self.naming = Box::new(naming);
        self
    }

    pub fn components(&self) -> &Components {
        &self.components
    }

    pub fn components_mut(&mut self) -> &mut Components {
        &mut self.components
    }

    pub fn cache(&self) -> &ResolverCache<'s> {
        &self.cache
    }

    pub fn graph(&self) -> &ReferenceGraph {
        &self.graph
    }

    pub(crate) fn graph_mut(&mut self) -> &mut ReferenceGraph {
        &mut self.graph
    }

    /// End the session, handing back the namespace and the reference graph
    pub fn finish(self) -> (Components, ReferenceGraph) {
        (self.components, self.graph)
    }

    /// Resolve an external reference of a runtime-selected kind. Returns the
    /// local name, or the raw reference when it could not be loaded.
    pub fn resolve_external(&mut self, reference: &str, format: RefFormat, kind: ComponentKind) -> String {
        self.resolve_kind(kind, reference, format, None).into_string()
    }

    /// [`Resolver::resolve_reference`] for a runtime-selected kind
    pub fn resolve_kind(
        &mut self,
        kind: ComponentKind,
        reference: &str,
        format: RefFormat,
        owner: Option<&DefinitionId>,
    ) -> Resolution {
        match kind {
            ComponentKind::Schema => self.resolve_reference::<Schema>(reference, format, owner),
            ComponentKind::Response => self.resolve_reference::<Response>(reference, format, owner),
            ComponentKind::RequestBody => {
                self.resolve_reference::<RequestBody>(reference, format, owner)
            }
            ComponentKind::Header => self.resolve_reference::<Header>(reference, format, owner),
            ComponentKind::SecurityScheme => {
                self.resolve_reference::<SecurityScheme>(reference, format, owner)
            }
            ComponentKind::Link => self.resolve_reference::<Link>(reference, format, owner),
            ComponentKind::Example => self.resolve_reference::<Example>(reference, format, owner),
            ComponentKind::Parameter => self.resolve_reference::<Parameter>(reference, format, owner),
            ComponentKind::Callback => self.resolve_reference::<Callback>(reference, format, owner),
        }
    }

    /// Resolve an external reference to a `C`
    pub fn resolve<C: Component>(&mut self, reference: &str, format: RefFormat) -> String {
        self.resolve_reference::<C>(reference, format, None).into_string()
    }

    /// Resolve, recording an edge from `owner` in the reference graph
    pub fn resolve_reference<C: Component>(
        &mut self,
        reference: &str,
        format: RefFormat,
        owner: Option<&DefinitionId>,
    ) -> Resolution {
        let resolution = self.resolve_uncached::<C>(reference, format);
        if let (Some(owner), Resolution::Local(name)) = (owner, &resolution) {
            self.graph
                .add_edge(owner.clone(), DefinitionId::new(C::KIND, name.as_str()));
        }
        resolution
    }

    fn resolve_uncached<C: Component>(&mut self, reference: &str, format: RefFormat) -> Resolution {
        if let Some(name) = self.cache.renamed(C::KIND, reference) {
            return Resolution::Local(name.to_owned());
        }

        let kind = C::KIND;
        let Some(mut definition) = self.cache.load::<C>(reference, format) else {
            warn!(
                reference,
                kind = %kind,
                "unable to load reference; it may not be available or is not a valid {kind}"
            );
            self.cache.mark_unresolved(reference);
            return Resolution::Unresolved(reference.to_owned());
        };

        let name = {
            let namespace = C::namespace(&self.components);
            let occupancy = Occupancy::new(
                C::KIND,
                namespace
                    .iter()
                    .map(|(name, existing)| (name.as_str(), existing.alias().is_some())),
                self.cache.consumed(),
            );
            self.naming.allocate(reference, &occupancy)
        };

        let materialized = C::namespace(&self.components)
            .get(&name)
            .is_some_and(|existing| existing.alias().is_none());

        self.cache.put_renamed(C::KIND, reference, &name);

        if materialized {
            debug!(reference, name = %name, kind = %kind, "a materialized definition already holds this name; keeping it");
            return Resolution::Local(name);
        }

        C::namespace_mut(&mut self.components).insert(name.clone(), definition.clone());
        self.cache.mark_consumed(C::KIND, &name);

        let inserted = definition.clone();
        let location = location_of(reference).to_owned();
        let owner = DefinitionId::new(C::KIND, name.as_str());

        if let Some(alias) = definition.alias().map(str::to_owned) {
            let alias_format = RefFormat::of(&alias);
            let target = if alias_format.is_external() {
                self.resolve_reference::<C>(&alias, alias_format, None)
            } else {
                let anchored = format!("{location}{alias}");
                self.resolve_reference::<C>(&anchored, RefFormat::Relative, None)
            };
            if let Resolution::Local(target_name) = &target {
                // An alias whose target lands on the same name was replaced by it
                if *target_name != name {
                    self.graph
                        .add_edge(owner.clone(), DefinitionId::new(kind, target_name.as_str()));
                }
                definition.set_alias(target.pointer(kind));
            }
        }

        definition.resolve_nested(self, &location, &owner);

        // Write the rewritten copy back unless something replaced the slot meanwhile
        if definition != inserted {
            let namespace = C::namespace_mut(&mut self.components);
            if namespace.get(&name) == Some(&inserted) {
                namespace.insert(name.clone(), definition);
            }
        }

        Resolution::Local(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    #[test]
    fn test_resolution_strings() {
        let local = Resolution::Local("Pet".into());
        let missing = Resolution::Unresolved("./none.yaml#/Pet".into());
        assert_eq!(local.pointer(ComponentKind::Schema), "#/components/schemas/Pet");
        assert_eq!(missing.pointer(ComponentKind::Schema), "./none.yaml#/Pet");
        assert_eq!(local.into_string(), "Pet");
        assert_eq!(missing.into_string(), "./none.yaml#/Pet");
    }

    #[test]
    fn test_idempotent_resolution() {
        let source = MemorySource::new().with("pet.yaml", "Pet:\n  type: object\n");
        let mut resolver = Resolver::new(Components::default(), &source);

        let first = resolver.resolve::<Schema>("./pet.yaml#/Pet", RefFormat::Relative);
        let second = resolver.resolve::<Schema>("./pet.yaml#/Pet", RefFormat::Relative);
        assert_eq!(first, "Pet");
        assert_eq!(second, "Pet");
        assert_eq!(resolver.components().schemas.len(), 1);
    }

    #[test]
    fn test_graceful_miss() {
        let source = MemorySource::new();
        let mut resolver = Resolver::new(Components::default(), &source);

        let result = resolver.resolve::<Schema>("./missing.yaml#/Pet", RefFormat::Relative);
        assert_eq!(result, "./missing.yaml#/Pet");
        assert!(resolver.components().is_empty());
        assert_eq!(
            resolver.cache().unresolved().collect::<Vec<_>>(),
            vec!["./missing.yaml#/Pet"]
        );
    }

    #[test]
    fn test_resolve_external_dispatches_by_kind() {
        let source = MemorySource::new().with(
            "common.yaml",
            "responses:\n  NotFound:\n    description: not found\nparameters:\n  limit:\n    name: limit\n    in: query\n",
        );
        let mut resolver = Resolver::new(Components::default(), &source);

        let response = resolver.resolve_external(
            "./common.yaml#/responses/NotFound",
            RefFormat::Relative,
            ComponentKind::Response,
        );
        let parameter = resolver.resolve_external(
            "./common.yaml#/parameters/limit",
            RefFormat::Relative,
            ComponentKind::Parameter,
        );
        assert_eq!(response, "NotFound");
        assert_eq!(parameter, "limit");
        assert!(resolver.components().responses.contains_key("NotFound"));
        assert!(resolver.components().parameters.contains_key("limit"));
        assert!(resolver.components().schemas.is_empty());
    }

    #[test]
    fn test_existing_unrelated_definition_is_not_overwritten() {
        let mut components = Components::default();
        components.schemas.insert("Pet".into(), Schema::array_of(Schema::default()));
        let source = MemorySource::new().with("pet.yaml", "Pet:\n  type: object\n");
        let mut resolver = Resolver::new(components, &source);

        let name = resolver.resolve::<Schema>("./pet.yaml#/Pet", RefFormat::Relative);
        assert_eq!(name, "Pet_2");
        assert!(resolver.components().schemas["Pet"].is_array());
        assert!(!resolver.components().schemas["Pet_2"].is_array());
    }

    #[test]
    fn test_alias_occupant_is_replaced() {
        let mut components = Components::default();
        components.responses.insert("NotFound".into(), Response::new_ref("./r.yaml#/NotFound"));
        let source = MemorySource::new().with("r.yaml", "NotFound:\n  description: missing\n");
        let mut resolver = Resolver::new(components, &source);

        let name = resolver.resolve::<Response>("./r.yaml#/NotFound", RefFormat::Relative);
        assert_eq!(name, "NotFound");
        let response = &resolver.components().responses["NotFound"];
        assert!(response.reference.is_none());
        assert_eq!(response.fields["description"], "missing");
    }

    #[test]
    fn test_non_schema_kinds_do_not_descend() {
        let source = MemorySource::new().with(
            "h.yaml",
            "Rate:\n  description: rate\n  schema:\n    $ref: './s.yaml#/Limit'\n",
        );
        let mut resolver = Resolver::new(Components::default(), &source);

        resolver.resolve::<Header>("./h.yaml#/Rate", RefFormat::Relative);
        assert!(resolver.components().schemas.is_empty());
        assert_eq!(
            resolver.components().headers["Rate"].fields["schema"]["$ref"],
            "./s.yaml#/Limit"
        );
    }

    #[test]
    fn test_cycle_terminates() {
        let source = MemorySource::new()
            .with("a.yaml", "A:\n  type: object\n  properties:\n    b:\n      $ref: './b.yaml#/B'\n")
            .with("b.yaml", "B:\n  type: object\n  properties:\n    a:\n      $ref: './a.yaml#/A'\n");
        let mut resolver = Resolver::new(Components::default(), &source);

        assert_eq!(resolver.resolve::<Schema>("./a.yaml#/A", RefFormat::Relative), "A");

        let schemas = &resolver.components().schemas;
        assert_eq!(schemas.len(), 2);
        assert_eq!(
            schemas["A"].properties["b"].reference.as_deref(),
            Some("#/components/schemas/B")
        );
        assert_eq!(
            schemas["B"].properties["a"].reference.as_deref(),
            Some("#/components/schemas/A")
        );

        let a = DefinitionId::new(ComponentKind::Schema, "A");
        let b = DefinitionId::new(ComponentKind::Schema, "B");
        assert_eq!(resolver.graph().cycles(), vec![vec![a, b]]);
    }

    #[test]
    fn test_distinct_references_share_materialized_name() {
        let source = MemorySource::new()
            .with("a.yaml", "Pet:\n  type: object\n  description: from a\n")
            .with("b.yaml", "Pet:\n  type: object\n  description: from b\n");
        let mut resolver = Resolver::new(Components::default(), &source);

        let first = resolver.resolve::<Schema>("./a.yaml#/Pet", RefFormat::Relative);
        let second = resolver.resolve::<Schema>("./b.yaml#/Pet", RefFormat::Relative);
        assert_eq!(first, "Pet");
        assert_eq!(second, "Pet");

        let schemas = &resolver.components().schemas;
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas["Pet"].extensions["description"], "from a");
        assert_eq!(resolver.cache().renamed(ComponentKind::Schema, "./b.yaml#/Pet"), Some("Pet"));
    }

    #[test]
    fn test_alias_chaining() {
        let source = MemorySource::new()
            .with("a.yaml", "Error:\n  $ref: './b.yaml#/Problem'\n")
            .with("b.yaml", "Problem:\n  type: object\n");
        let mut resolver = Resolver::new(Components::default(), &source);

        assert_eq!(resolver.resolve::<Schema>("./a.yaml#/Error", RefFormat::Relative), "Error");

        let schemas = &resolver.components().schemas;
        assert_eq!(
            schemas["Error"].reference.as_deref(),
            Some("#/components/schemas/Problem")
        );
        assert!(schemas["Problem"].reference.is_none());
        assert!(resolver.graph().contains_edge(
            &DefinitionId::new(ComponentKind::Schema, "Error"),
            &DefinitionId::new(ComponentKind::Schema, "Problem"),
        ));
    }

    #[test]
    fn test_alias_onto_same_name_is_replaced_by_target() {
        let source = MemorySource::new()
            .with("a.yaml", "Pet:\n  $ref: './b.yaml#/Pet'\n")
            .with("b.yaml", "Pet:\n  type: object\n");
        let mut resolver = Resolver::new(Components::default(), &source);

        assert_eq!(resolver.resolve::<Schema>("./a.yaml#/Pet", RefFormat::Relative), "Pet");

        let pet = &resolver.components().schemas["Pet"];
        assert!(pet.reference.is_none());
        assert_eq!(pet.schema_type, Some(serde_json::json!("object")));
        assert!(resolver.graph().cycles().is_empty());
    }

    #[test]
    fn test_internal_alias_resolved_in_its_document() {
        let source = MemorySource::new().with(
            "common/errors.yaml",
            "responses:\n  Gone:\n    $ref: '#/responses/NotFound'\n  NotFound:\n    description: not found\n",
        );
        let mut resolver = Resolver::new(Components::default(), &source);

        let name = resolver.resolve::<Response>("./common/errors.yaml#/responses/Gone", RefFormat::Relative);
        assert_eq!(name, "Gone");

        let responses = &resolver.components().responses;
        assert_eq!(
            responses["Gone"].reference.as_deref(),
            Some("#/components/responses/NotFound")
        );
        assert_eq!(responses["NotFound"].fields["description"], "not found");
    }

    #[test]
    fn test_nested_schema_discovery() {
        let source = MemorySource::new()
            .with(
                "pet.yaml",
                "Pet:\n  type: object\n  properties:\n    tags:\n      type: array\n      items:\n        $ref: './tag.yaml#/Tag'\n",
            )
            .with("tag.yaml", "Tag:\n  type: object\n");
        let mut resolver = Resolver::new(Components::default(), &source);

        resolver.resolve::<Schema>("./pet.yaml#/Pet", RefFormat::Relative);

        let schemas = &resolver.components().schemas;
        assert!(schemas.contains_key("Tag"));
        assert_eq!(
            schemas["Pet"].properties["tags"].items.as_ref().unwrap().reference.as_deref(),
            Some("#/components/schemas/Tag")
        );
    }

    #[test]
    fn test_relative_reanchoring() {
        let source = MemorySource::new().with(
            "dir/a.yaml",
            "components:\n  schemas:\n    A:\n      properties:\n        x:\n          $ref: '#/components/schemas/X'\n    X:\n      type: string\n",
        );
        let mut resolver = Resolver::new(Components::default(), &source);

        resolver.resolve::<Schema>("./dir/a.yaml#/components/schemas/A", RefFormat::Relative);

        assert_eq!(
            resolver.cache().renamed(ComponentKind::Schema, "./dir/a.yaml#/components/schemas/X"),
            Some("X")
        );
        assert_eq!(
            resolver.components().schemas["A"].properties["x"].reference.as_deref(),
            Some("#/components/schemas/X")
        );
    }

    #[test]
    fn test_callback_alias_followed() {
        let source = MemorySource::new()
            .with("cb.yaml", "onEvent:\n  $ref: './hooks.yaml#/onPush'\n")
            .with("hooks.yaml", "onPush:\n  '{$request.body#/url}':\n    post:\n      responses: {}\n");
        let mut resolver = Resolver::new(Components::default(), &source);

        assert_eq!(resolver.resolve::<Callback>("./cb.yaml#/onEvent", RefFormat::Relative), "onEvent");

        let callbacks = &resolver.components().callbacks;
        assert_eq!(
            callbacks["onEvent"].alias.as_deref(),
            Some("#/components/callbacks/onPush")
        );
        assert_eq!(callbacks["onPush"].expressions.len(), 1);
    }
}
