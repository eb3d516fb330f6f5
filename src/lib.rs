//! OpenAPI Reference Flattener
//!
//! Pulls the definitions that a root OpenAPI document references from other
//! files or URLs into its own `components`, and rewrites every such external
//! `$ref` to a local pointer of the form `#/components/<kind>/<name>`.
//!
//! ## Features
//!
//! - **All nine component kinds**: schemas, responses, request bodies, headers,
//!   security schemes, links, examples, parameters, callbacks
//! - **Cycle safe**: each raw reference is named once per pass, so mutually
//!   recursive documents terminate
//! - **Collision aware**: a definition the document already owns is never
//!   overwritten; flattened copies get a suffixed name instead
//! - **Fail soft**: references that cannot be loaded stay as written and are
//!   reported
//!
//! ## Architecture
//!
//! ```text
//! processor ──> resolver ──> cache ──> source (filesystem, memory)
//!                  │  │
//!                  │  └────> naming
//!                  └──────> walker (schemas only)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use openapi_flatten::{read_document, FileSystemSource, Flattener};
//!
//! let mut document = read_document("api/openapi.yaml".as_ref())?;
//! let source = FileSystemSource::new("api");
//! let report = Flattener::new(&source).flatten(&mut document);
//! for reference in &report.unresolved {
//!     eprintln!("unresolved: {reference}");
//! }
//! # Ok::<(), openapi_flatten::FlattenError>(())
//! ```

pub mod cache;
pub mod component;
pub mod config;
pub mod error;
pub mod graph;
pub mod model;
pub mod naming;
pub mod processor;
pub mod reference;
pub mod resolver;
pub mod source;
mod walker;

pub use component::Component;
pub use config::{FlattenConfig, OutputFormat};
pub use error::{FlattenError, Result};
pub use graph::{DefinitionId, ReferenceGraph};
pub use model::{
    AdditionalProperties, Callback, ComponentKind, Components, Example, Header, Link, OpenApi,
    Parameter, RequestBody, Response, Schema, SecurityScheme,
};
pub use naming::{NamingStrategy, Occupancy, Slot, SuffixNaming};
pub use processor::{flatten, read_document, FlattenReport, Flattener};
pub use reference::{join, RefFormat};
pub use resolver::{Resolution, Resolver};
pub use source::{DocumentSource, FileSystemSource, MemorySource};
