//! The module (namespace) tree.
//!
//! A module is a directory under the component root whose components share
//! one params document. The root module is the component root itself; nested
//! modules are any subdirectories that directly contain a params file.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::app::App;
use crate::component::Component;
use crate::error::{Error, Result};
use crate::resolve;
use crate::store::{self, PARAMS_FILE};
use crate::value::{self, ParamValue, Params};

/// Seed contents of a new module's params document.
pub(crate) const PARAMS_SKELETON: &str = r#"{
  global: {
    // Values shared across every component in this module.
  },
  components: {
    // One entry per component file in this directory.
  },
}
"#;

/// One flattened parameter record: component, manifest document index, key
/// and literal value. Produced on demand for listing and diffing; never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ModuleParameter {
    pub component: String,
    pub index: String,
    pub key: String,
    pub value: String,
}

/// A component module, addressed by a slash-separated path ("" is the root
/// module).
#[derive(Debug, Clone)]
pub struct Module {
    app: App,
    path: String,
}

impl Module {
    /// Wrap a module path without checking the filesystem.
    pub fn new(app: App, path: impl Into<String>) -> Self {
        Module {
            app,
            path: path.into(),
        }
    }

    /// Resolve a module path, failing when the directory does not exist.
    pub fn find(app: &App, path: &str) -> Result<Self> {
        let module = Module::new(app.clone(), path);
        if !module.dir().is_dir() {
            return Err(Error::ModuleNotFound(path.to_string()));
        }
        Ok(module)
    }

    /// Create a module directory and seed its params document.
    pub fn create(app: &App, path: &str) -> Result<Self> {
        let module = Module::new(app.clone(), path);
        if module.params_path().exists() {
            return Err(Error::ModuleExists(path.to_string()));
        }

        fs::create_dir_all(module.dir())?;
        fs::write(module.params_path(), PARAMS_SKELETON)?;
        debug!(module = %module.name(), "created module");
        Ok(module)
    }

    /// Every module under the app's component root, in lexical path order.
    /// A directory qualifies iff it directly contains a params document.
    pub fn all(app: &App) -> Result<Vec<Module>> {
        let root = app.components_dir();
        if !root.is_dir() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(&root).follow_links(false) {
            let entry = entry.map_err(|e| {
                Error::Schema(format!("walking component root: {e}"))
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            if !entry.path().join(PARAMS_FILE).is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&root)
                .unwrap_or(entry.path())
                .components()
                .filter_map(|c| c.as_os_str().to_str())
                .collect::<Vec<_>>()
                .join("/");
            paths.push(rel);
        }
        paths.sort();

        Ok(paths
            .into_iter()
            .map(|path| Module::new(app.clone(), path))
            .collect())
    }

    /// The module name: its path, or "/" for the root module.
    pub fn name(&self) -> String {
        if self.path.is_empty() {
            "/".to_string()
        } else {
            self.path.clone()
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn app(&self) -> &App {
        &self.app
    }

    /// Absolute directory of the module.
    pub fn dir(&self) -> PathBuf {
        let mut dir = self.app.components_dir();
        for part in self.path.split('/').filter(|p| !p.is_empty()) {
            dir.push(part);
        }
        dir
    }

    /// Path to the module's params document.
    pub fn params_path(&self) -> PathBuf {
        self.dir().join(PARAMS_FILE)
    }

    /// Raw params-document text. Re-read on every call.
    pub fn read_params(&self) -> Result<String> {
        Ok(fs::read_to_string(self.params_path())?)
    }

    pub(crate) fn write_params(&self, text: &str) -> Result<()> {
        fs::write(self.params_path(), text)?;
        Ok(())
    }

    /// Every recognized component file directly inside the module directory,
    /// in lexical order.
    pub fn components(&self) -> Result<Vec<Component>> {
        let mut entries: Vec<PathBuf> = fs::read_dir(self.dir())?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        entries.sort();

        Ok(entries
            .into_iter()
            .filter_map(|path| Component::from_path(self.clone(), path))
            .collect())
    }

    /// Look up one component by name (file stem).
    pub fn component(&self, name: &str) -> Result<Component> {
        self.components()?
            .into_iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| Error::ComponentNotFound(name.to_string()))
    }

    /// Flattened parameters for every component in the module, resolved
    /// against `env` when one is given.
    pub fn params(&self, env: Option<&str>) -> Result<Vec<ModuleParameter>> {
        debug!(module = %self.name(), env = env.unwrap_or(""), "listing module params");
        let mut all = Vec::new();
        for component in self.components()? {
            all.extend(component.params(env)?);
        }
        Ok(all)
    }

    /// The module's component defaults with globals applied, as JSON text.
    pub fn resolved_params(&self) -> Result<String> {
        resolve::resolved_params(self)
    }

    /// Every component entry's literal parameters, without resolution.
    pub fn all_component_params(&self) -> Result<BTreeMap<String, Params>> {
        store::get_all_component_params(&self.read_params()?)
    }

    /// Append a new component entry with its defaults.
    pub fn append_component_entry(&self, name: &str, params: &Params) -> Result<()> {
        let updated = store::append_component(name, &self.read_params()?, params)?;
        self.write_params(&updated)
    }

    /// Set one parameter on a component entry, creating the entry when it
    /// does not exist yet (a manifest document slot may not have been
    /// written before its first override). Dotted keys address nested
    /// values inside compound parameters.
    pub fn set_param(&self, entry: &str, key: &str, value: &ParamValue) -> Result<()> {
        let text = self.read_params()?;
        let (mut current, exists) = match store::get_component_params(entry, &text) {
            Ok(params) => (params, true),
            Err(Error::ComponentNotFound(_)) => (Params::new(), false),
            Err(err) => return Err(err),
        };
        let segments: Vec<&str> = key.split('.').collect();
        value::set_nested(&mut current, &segments, value.clone());
        let updated = if exists {
            store::set_component_params(entry, &text, &current)?
        } else {
            store::append_component(entry, &text, &current)?
        };
        self.write_params(&updated)?;
        debug!(module = %self.name(), entry, key, "set parameter");
        Ok(())
    }

    /// Delete one parameter from a component entry.
    pub fn delete_param(&self, entry: &str, key: &str) -> Result<()> {
        let text = self.read_params()?;
        let segments: Vec<&str> = key.split('.').collect();
        let updated = if segments.len() == 1 {
            store::delete_component_key(entry, key, &text)?
        } else {
            let mut current = store::get_component_params(entry, &text)?;
            if !value::delete_nested(&mut current, &segments) {
                return Err(Error::ParamNotFound {
                    component: entry.to_string(),
                    key: key.to_string(),
                });
            }
            store::set_component_params(entry, &text, &current)?
        };
        self.write_params(&updated)?;
        debug!(module = %self.name(), entry, key, "deleted parameter");
        Ok(())
    }

    /// Set a module-global parameter.
    pub fn set_global(&self, key: &str, value: &ParamValue) -> Result<()> {
        let mut params = Params::new();
        params.insert(key.to_string(), value.clone());
        let updated = store::set_global_params(&self.read_params()?, &params)?;
        self.write_params(&updated)
    }

    /// Delete a module-global parameter.
    pub fn delete_global(&self, key: &str) -> Result<()> {
        let updated = store::delete_global_param(key, &self.read_params()?)?;
        self.write_params(&updated)
    }

    /// Create a component file and seed its default parameter entry (one
    /// entry per embedded document for manifest components).
    pub fn create_component(
        &self,
        file_name: &str,
        contents: &str,
        params: &Params,
    ) -> Result<Component> {
        let source = self.dir().join(file_name);
        let component = Component::from_path(self.clone(), source.clone()).ok_or_else(|| {
            Error::Schema(format!("unrecognized component file name {file_name:?}"))
        })?;
        if source.exists() {
            return Err(Error::DuplicateComponent(component.name().to_string()));
        }

        fs::write(&source, contents)?;

        let mut text = self.read_params()?;
        let mut seeded = params.clone();
        for (i, entry) in component.entry_names()?.iter().enumerate() {
            text = store::append_component(entry, &text, &seeded)?;
            if i == 0 {
                // defaults apply to the first document; the rest get stubs
                seeded = Params::new();
            }
        }
        self.write_params(&text)?;

        debug!(module = %self.name(), component = component.name(), "created component");
        Ok(component)
    }

    /// Delete a component: its file, its parameter entry (or entries), and
    /// every environment's override entry.
    ///
    /// The steps are not transactional. Earlier writes stay if a later one
    /// fails, and the error reports where the deletion stopped.
    pub fn delete_component(&self, name: &str) -> Result<()> {
        let component = self.component(name)?;
        let entries = component.entry_names()?;

        let mut text = self.read_params()?;
        for entry in &entries {
            match store::delete_component(entry, &text) {
                Ok(updated) => text = updated,
                // manifest documents without a stub have no entry to delete
                Err(Error::ComponentNotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        self.write_params(&text)?;
        fs::remove_file(component.source())?;

        for env in self.app.environments()? {
            for entry in &entries {
                match env.delete_component(entry) {
                    Ok(()) | Err(Error::ComponentNotFound(_)) => {}
                    Err(err) => {
                        warn!(
                            component = name,
                            environment = env.name(),
                            "component deletion stopped partway; module files already updated"
                        );
                        return Err(err);
                    }
                }
            }
        }

        debug!(module = %self.name(), component = name, "deleted component");
        Ok(())
    }
}
