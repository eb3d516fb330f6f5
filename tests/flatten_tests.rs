//! End-to-end flattening tests
//!
//! Flattens fixture documents from disk and checks the resulting components,
//! rewritten references and report.

use std::fs;
use std::path::{Path, PathBuf};

use openapi_flatten::{
    read_document, ComponentKind, DefinitionId, FileSystemSource, FlattenConfig, FlattenError,
    Flattener, MemorySource, OpenApi, RefFormat, Resolver, Schema,
};
use tempfile::TempDir;

fn petstore_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/petstore")
}

fn flatten_petstore() -> (OpenApi, openapi_flatten::FlattenReport) {
    let dir = petstore_dir();
    let mut document = read_document(&dir.join("openapi.yaml")).unwrap();
    let source = FileSystemSource::new(&dir);
    let report = Flattener::new(&source).flatten(&mut document);
    (document, report)
}

// =============================================================================
// Fixture Documents
// =============================================================================

#[test]
fn test_petstore_schemas_flattened() {
    let (document, _) = flatten_petstore();
    let schemas = &document.components.as_ref().unwrap().schemas;

    let names: Vec<&str> = schemas.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["Pet", "Owner", "Pet_2", "Category", "Tag", "Node"]);

    // The document's own Pet is untouched
    assert_eq!(schemas["Pet"].schema_type, Some(serde_json::json!("string")));

    let pet = &schemas["Pet_2"];
    assert_eq!(
        pet.properties["category"].reference.as_deref(),
        Some("#/components/schemas/Category")
    );
    assert_eq!(
        pet.properties["tags"].items.as_ref().unwrap().reference.as_deref(),
        Some("#/components/schemas/Tag")
    );
    assert_eq!(
        schemas["Owner"].properties["pets"].items.as_ref().unwrap().reference.as_deref(),
        Some("#/components/schemas/Pet_2")
    );
}

#[test]
fn test_petstore_paths_rewritten() {
    let (document, _) = flatten_petstore();
    let get = &document.paths["/pets"]["get"];

    assert_eq!(get["parameters"][0]["$ref"], "#/components/parameters/limit");
    assert_eq!(get["responses"]["404"]["$ref"], "#/components/responses/Gone");
    assert_eq!(
        get["responses"]["200"]["content"]["application/json"]["schema"]["items"]["$ref"],
        "#/components/schemas/Pet_2"
    );
    assert_eq!(
        document.paths["/tree"]["get"]["responses"]["200"]["content"]["application/json"]["schema"]
            ["$ref"],
        "#/components/schemas/Node"
    );
}

#[test]
fn test_petstore_alias_response_chained() {
    let (document, _) = flatten_petstore();
    let responses = &document.components.as_ref().unwrap().responses;

    assert_eq!(
        responses["Gone"].reference.as_deref(),
        Some("#/components/responses/NotFound")
    );
    assert_eq!(
        responses["NotFound"].fields["description"],
        "The resource does not exist"
    );
}

#[test]
fn test_petstore_report() {
    let (document, report) = flatten_petstore();

    assert_eq!(report.unresolved, vec!["./common/missing.yaml#/offset".to_string()]);
    assert_eq!(
        document.paths["/pets"]["get"]["parameters"][1]["$ref"],
        "./common/missing.yaml#/offset"
    );
    assert_eq!(
        report.cycles,
        vec![vec![DefinitionId::new(ComponentKind::Schema, "Node")]]
    );
    assert_eq!(report.resolved, 7);
    assert_eq!(report.definitions, 9);
    // Owner, Pet_2 (twice), Node and the Gone alias
    assert_eq!(report.edges, 5);
}

#[test]
fn test_flattened_document_is_stable() {
    let (mut document, _) = flatten_petstore();
    let before = document.clone();

    let source = FileSystemSource::new(petstore_dir());
    let report = Flattener::new(&source).flatten(&mut document);

    assert_eq!(document, before);
    assert_eq!(report.resolved, 0);
    assert_eq!(report.unresolved, vec!["./common/missing.yaml#/offset".to_string()]);
}

// =============================================================================
// Documents on Disk
// =============================================================================

fn write(dir: &TempDir, name: &str, text: &str) {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, text).unwrap();
}

#[test]
fn test_cycle_across_files() {
    let dir = TempDir::new().unwrap();
    write(&dir, "models/a.yaml", "A:\n  type: object\n  properties:\n    b:\n      $ref: './b.yaml#/B'\n");
    write(&dir, "models/b.yaml", "B:\n  type: object\n  properties:\n    a:\n      $ref: './a.yaml#/A'\n");

    let source = FileSystemSource::new(dir.path());
    let mut resolver = Resolver::new(Default::default(), &source);
    let name = resolver.resolve::<Schema>("./models/a.yaml#/A", RefFormat::Relative);
    assert_eq!(name, "A");

    let (components, graph) = resolver.finish();
    assert_eq!(components.schemas.len(), 2);
    assert_eq!(
        components.schemas["B"].properties["a"].reference.as_deref(),
        Some("#/components/schemas/A")
    );
    assert_eq!(graph.cycles().len(), 1);
    assert_eq!(graph.edge_count(), 2);
    assert!(graph.contains_edge(
        &DefinitionId::new(ComponentKind::Schema, "B"),
        &DefinitionId::new(ComponentKind::Schema, "A"),
    ));
}

#[test]
fn test_json_root_document() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "api.json",
        r#"{ "openapi": "3.1.0", "components": { "schemas": { "Id": { "$ref": "ids.json#/Id" } } } }"#,
    );
    write(&dir, "ids.json", r#"{ "Id": { "type": "string", "format": "uuid" } }"#);

    let mut document = read_document(&dir.path().join("api.json")).unwrap();
    let source = FileSystemSource::new(dir.path());
    let report = Flattener::new(&source).flatten(&mut document);

    let id = &document.components.as_ref().unwrap().schemas["Id"];
    assert!(id.reference.is_none());
    assert_eq!(id.extensions["format"], "uuid");
    assert_eq!(document.fields["openapi"], "3.1.0");
    assert!(report.is_complete());
}

#[test]
fn test_document_order_kept() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "api.yaml",
        "openapi: 3.0.3\ninfo:\n  title: Ordered\n  version: '1'\npaths:\n  /zoo: {}\n  /apes: {}\ncomponents:\n  schemas:\n    Zeta:\n      type: object\n      required: [b, a]\n      properties:\n        z: { type: string }\n        m: { $ref: './m.yaml#/Mid' }\n    Alpha:\n      type: string\n",
    );
    write(&dir, "m.yaml", "Mid:\n  type: integer\n");

    let mut document = read_document(&dir.path().join("api.yaml")).unwrap();
    let source = FileSystemSource::new(dir.path());
    Flattener::new(&source).flatten(&mut document);

    let fields: Vec<&str> = document.fields.keys().map(String::as_str).collect();
    assert_eq!(fields, vec!["openapi", "info"]);
    let paths: Vec<&str> = document.paths.keys().map(String::as_str).collect();
    assert_eq!(paths, vec!["/zoo", "/apes"]);

    let schemas = &document.components.as_ref().unwrap().schemas;
    let names: Vec<&str> = schemas.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
    let properties: Vec<&str> = schemas["Zeta"].properties.keys().map(String::as_str).collect();
    assert_eq!(properties, vec!["z", "m"]);
    assert_eq!(schemas["Zeta"].extensions["required"], serde_json::json!(["b", "a"]));

    let rendered = serde_json::to_string(&document).unwrap();
    assert!(rendered.find("\"openapi\"") < rendered.find("\"info\""));
}

#[test]
fn test_read_document_errors() {
    let dir = TempDir::new().unwrap();
    write(&dir, "list.yaml", "- a\n- b\n");

    assert!(matches!(
        read_document(&dir.path().join("list.yaml")),
        Err(FlattenError::InvalidDocument { .. })
    ));
    assert!(matches!(
        read_document(&dir.path().join("absent.yaml")),
        Err(FlattenError::NotFound(_))
    ));
}

#[test]
fn test_config_base_dir() {
    let dir = TempDir::new().unwrap();
    write(&dir, "shared/pet.yaml", "Pet:\n  type: object\n");

    let mut config = FlattenConfig::default();
    config.source.base_dir = Some(dir.path().join("shared"));
    let root = config.base_dir_for(Path::new("elsewhere/openapi.yaml"));

    let mut document: OpenApi = serde_json::from_value(serde_json::json!({
        "components": { "schemas": { "Animal": { "$ref": "./pet.yaml#/Pet" } } }
    }))
    .unwrap();
    let source = FileSystemSource::new(root);
    openapi_flatten::flatten(&mut document, &source, &config);

    let schemas = &document.components.as_ref().unwrap().schemas;
    assert_eq!(schemas["Animal"].reference.as_deref(), Some("#/components/schemas/Pet"));
    assert!(schemas.contains_key("Pet"));
}

// =============================================================================
// In-Memory Sources
// =============================================================================

#[test]
fn test_url_references_are_joined_against_their_document() {
    let source = MemorySource::new()
        .with(
            "https://example.com/specs/pet.yaml",
            "Pet:\n  type: object\n  properties:\n    owner:\n      $ref: 'owner.yaml#/Owner'\n",
        )
        .with("https://example.com/specs/owner.yaml", "Owner:\n  type: object\n");
    let mut resolver = Resolver::new(Default::default(), &source);

    let name = resolver.resolve::<Schema>("https://example.com/specs/pet.yaml#/Pet", RefFormat::Url);
    assert_eq!(name, "Pet");

    let components = resolver.components();
    assert!(components.schemas.contains_key("Owner"));
    assert_eq!(
        components.schemas["Pet"].properties["owner"].reference.as_deref(),
        Some("#/components/schemas/Owner")
    );
}
