//! Error types for the parameter engine.
//!
//! Every store operation either produces the full rewritten document text or
//! fails without writing anything; the variants here mirror that contract.
//! Multi-file operations (component deletion across environments) are not
//! transactional and surface the first hard failure to the caller.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the parameter engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed Jsonnet source.
    #[error("parse error in {file}: {message}")]
    Parse { file: String, message: String },

    /// The document parsed, but does not have the expected params shape.
    #[error("invalid params schema: {0}")]
    Schema(String),

    /// A component has no parameter entry.
    #[error("no parameter entry for component {0:?}")]
    ComponentNotFound(String),

    /// A single parameter key is absent from a component entry.
    #[error("no parameter {key:?} for component {component:?}")]
    ParamNotFound { component: String, key: String },

    /// A module path does not resolve to a directory with a params file.
    #[error("unable to find module {0:?}")]
    ModuleNotFound(String),

    /// An environment is missing from disk or from the app config.
    #[error("unable to find environment {0:?}")]
    EnvironmentNotFound(String),

    /// Appending a component whose entry already exists.
    #[error("parameters for component {0:?} already exist")]
    DuplicateComponent(String),

    /// Creating an environment that already exists.
    #[error("environment {0:?} already exists")]
    EnvironmentExists(String),

    /// Creating a module that already has a params file.
    #[error("module {0:?} already exists")]
    ModuleExists(String),

    /// A parameter value is an expression where only literals are handled.
    #[error("unsupported value for parameter {key:?}: {reason}")]
    UnsupportedValue { key: String, reason: String },

    /// The embedded Jsonnet interpreter rejected the document.
    #[error("evaluation failed: {0}")]
    Eval(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
