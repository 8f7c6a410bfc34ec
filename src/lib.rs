//! kparams - a parameter overlay and resolution engine for Kubernetes
//! application configuration.
//!
//! An application is described once as a tree of components grouped into
//! modules, then rendered differently per environment through a layered
//! Jsonnet parameter store:
//!
//! - every module owns a `params.libsonnet` document with the defaults of
//!   its components,
//! - every environment owns a sparse override document that extends those
//!   defaults with `+:` inheritance,
//! - resolution merges defaults, globals and overrides into the final
//!   values consumed by rendering.
//!
//! The documents are edited programmatically while preserving the
//! human-authored structure around each edit: operations re-parse the file,
//! compute the affected byte span from the syntax tree, and splice
//! replacement text into the original source, so comments, ordering and
//! unrelated fields survive every write.
//!
//! The engine is synchronous and single-writer by design: every operation
//! is a read-modify-write cycle against one file, nothing is cached between
//! calls, and multi-file operations are not transactional.

pub mod app;
pub mod component;
pub mod diff;
pub mod doc;
pub mod env;
pub mod error;
mod eval;
pub mod module;
pub mod overlay;
pub mod resolve;
pub mod schema;
pub mod store;
pub mod value;

pub use app::{App, AppConfig, Destination, EnvironmentConfig};
pub use component::{Component, ComponentKind, Summary};
pub use diff::{diff, DiffRecord};
pub use env::Environment;
pub use error::{Error, Result};
pub use module::{Module, ModuleParameter};
pub use value::{ParamValue, Params};
