//! Application handle and configuration.
//!
//! An application is a directory tree with an `app.yaml` config, a
//! `components/` root (every directory holding a params file is a module)
//! and an `environments/` root (one override document per environment).
//!
//! `App` is a plain value passed into every operation. There is no global
//! default handle; tests construct one over a temp directory and production
//! callers construct one over the real root.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::env::Environment;
use crate::error::{Error, Result};

/// Application config file at the root of the tree.
pub const APP_CONFIG_FILE: &str = "app.yaml";

/// Directory holding the component/module tree.
pub const COMPONENTS_DIR: &str = "components";

/// Directory holding per-environment override documents.
pub const ENVIRONMENTS_DIR: &str = "environments";

/// Handle to one application tree.
#[derive(Debug, Clone)]
pub struct App {
    root: PathBuf,
}

/// Contents of `app.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentConfig>,
}

/// Per-environment section of the app config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub destination: Destination,
}

/// Cluster destination metadata for an environment. Consumed by the
/// rendering layer through an external binding; the parameter engine itself
/// never reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub server: String,
    pub namespace: String,
}

impl App {
    /// Wrap an existing application root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        App { root: root.into() }
    }

    /// Create a fresh application tree: config file, component root with a
    /// seeded root-module params file, and an empty environments root.
    pub fn init(root: impl Into<PathBuf>, name: &str) -> Result<Self> {
        let app = App::new(root);
        if app.config_path().exists() {
            return Err(Error::Schema(format!(
                "application config already exists at {}",
                app.config_path().display()
            )));
        }

        fs::create_dir_all(app.components_dir())?;
        fs::create_dir_all(app.environments_dir())?;
        fs::write(
            app.components_dir().join(crate::store::PARAMS_FILE),
            crate::module::PARAMS_SKELETON,
        )?;
        app.write_config(&AppConfig {
            name: name.to_string(),
            environments: BTreeMap::new(),
        })?;

        debug!(name, root = %app.root.display(), "initialized application");
        Ok(app)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn components_dir(&self) -> PathBuf {
        self.root.join(COMPONENTS_DIR)
    }

    pub fn environments_dir(&self) -> PathBuf {
        self.root.join(ENVIRONMENTS_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(APP_CONFIG_FILE)
    }

    /// Read the app config from disk. Re-read on every call; nothing is
    /// cached between operations.
    pub fn config(&self) -> Result<AppConfig> {
        let text = fs::read_to_string(self.config_path())?;
        Ok(serde_yaml::from_str(&text)?)
    }

    pub fn write_config(&self, config: &AppConfig) -> Result<()> {
        fs::write(self.config_path(), serde_yaml::to_string(config)?)?;
        Ok(())
    }

    /// Look up an environment by name. The environment must have an
    /// override-document directory on disk.
    pub fn environment(&self, name: &str) -> Result<Environment> {
        Environment::find(self.clone(), name)
    }

    /// Every environment with an override document, in lexical name order.
    pub fn environments(&self) -> Result<Vec<Environment>> {
        let dir = self.environments_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() && path.join(crate::store::PARAMS_FILE).is_file() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();

        Ok(names
            .into_iter()
            .map(|name| Environment::new(self.clone(), name))
            .collect())
    }

    /// Create an environment: directory, override-document skeleton, and a
    /// destination entry in the app config.
    pub fn create_environment(&self, name: &str, destination: Destination) -> Result<Environment> {
        Environment::create(self.clone(), name, destination)
    }

    /// Destination metadata for an environment, from the app config.
    pub fn destination(&self, name: &str) -> Result<Destination> {
        let config = self.config()?;
        config
            .environments
            .get(name)
            .map(|e| e.destination.clone())
            .ok_or_else(|| Error::EnvironmentNotFound(name.to_string()))
    }

    /// Serialized destination metadata, for the rendering layer's external
    /// binding.
    pub fn destination_ext_code(&self, name: &str) -> Result<String> {
        let destination = self.destination(name)?;
        Ok(serde_json::to_string(&destination)?)
    }
}
