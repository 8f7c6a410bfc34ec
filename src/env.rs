//! File-level operations on one environment's override document.
//!
//! Each environment owns a single sparse override document; the text-level
//! mechanics live in [`crate::overlay`]. Every call here is a full
//! read-modify-write cycle against that file with no in-memory caching, so
//! concurrent reads are safe and writers must be serialized by the caller.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use tracing::debug;

use crate::app::{App, Destination, EnvironmentConfig};
use crate::error::{Error, Result};
use crate::overlay;
use crate::store::PARAMS_FILE;
use crate::value::Params;

/// Seed contents of a new environment's override document.
const OVERRIDES_SKELETON: &str = r#"local params = import "../../components/params.libsonnet";

params + {
  components +: {
    // Component-level overrides for this environment.
  },
}
"#;

/// One environment of an application.
#[derive(Debug, Clone)]
pub struct Environment {
    app: App,
    name: String,
}

impl Environment {
    pub(crate) fn new(app: App, name: impl Into<String>) -> Self {
        Environment {
            app,
            name: name.into(),
        }
    }

    /// Look up an existing environment by name.
    pub fn find(app: App, name: &str) -> Result<Self> {
        let env = Environment::new(app, name);
        if !env.params_path().is_file() {
            return Err(Error::EnvironmentNotFound(env.name));
        }
        Ok(env)
    }

    /// Create the environment directory, its override-document skeleton and
    /// its destination entry in the app config.
    pub fn create(app: App, name: &str, destination: Destination) -> Result<Self> {
        let env = Environment::new(app, name);
        if env.params_path().exists() {
            return Err(Error::EnvironmentExists(env.name));
        }

        fs::create_dir_all(env.dir())?;
        fs::write(env.params_path(), OVERRIDES_SKELETON)?;

        let mut config = env.app.config()?;
        config
            .environments
            .insert(name.to_string(), EnvironmentConfig { destination });
        env.app.write_config(&config)?;

        debug!(environment = name, "created environment");
        Ok(env)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> PathBuf {
        self.app.environments_dir().join(&self.name)
    }

    pub fn params_path(&self) -> PathBuf {
        self.dir().join(PARAMS_FILE)
    }

    pub fn destination(&self) -> Result<Destination> {
        self.app.destination(&self.name)
    }

    /// Raw override-document text.
    pub fn read_params(&self) -> Result<String> {
        Ok(fs::read_to_string(self.params_path())?)
    }

    fn write_params(&self, text: &str) -> Result<()> {
        fs::write(self.params_path(), text)?;
        Ok(())
    }

    /// One component's override map, plus whether an override block exists.
    pub fn component_params(&self, component: &str) -> Result<(Params, bool)> {
        overlay::get_environment_params(component, &self.read_params()?)
    }

    /// Every component's override map.
    pub fn all_component_params(&self) -> Result<BTreeMap<String, Params>> {
        overlay::get_all_environment_params(&self.read_params()?)
    }

    /// Overlay `params` onto a component's override block.
    pub fn set_component_params(&self, component: &str, params: &Params) -> Result<()> {
        let updated = overlay::set_environment_params(component, &self.read_params()?, params)?;
        self.write_params(&updated)?;
        debug!(
            environment = %self.name,
            component, "set environment parameters"
        );
        Ok(())
    }

    /// Remove a component's override block.
    pub fn delete_component(&self, component: &str) -> Result<()> {
        let updated = overlay::delete_environment_component(component, &self.read_params()?)?;
        self.write_params(&updated)?;
        debug!(
            environment = %self.name,
            component, "deleted environment parameter entry"
        );
        Ok(())
    }
}
