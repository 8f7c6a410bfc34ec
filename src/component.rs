//! Component abstraction.
//!
//! A component is one renderable unit inside a module: either *structured*
//! (a Jsonnet file describing objects as code) or *manifest* (a YAML/JSON
//! file holding one or more serialized resource documents). Components know
//! their name, their owning module, and how to report and mutate their
//! parameters.
//!
//! A manifest file with N documents contributes parameter entries
//! `<name>-0` .. `<name>-(N-1)`, one slot per document.

use std::path::{Path, PathBuf};

use serde_json::Value as Json;
use tracing::debug;

use crate::error::{Error, Result};
use crate::module::{Module, ModuleParameter};
use crate::resolve;
use crate::schema;
use crate::store;
use crate::value::{params_from_json_object, ParamValue, Params};

/// The component variant, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    /// Objects-as-code Jsonnet source (`.jsonnet`).
    Structured,
    /// Serialized resource documents (`.yaml`, `.json`).
    Manifest,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Structured => "structured",
            ComponentKind::Manifest => "manifest",
        }
    }
}

/// One entry slot contributed by a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub component_name: String,
    pub index: usize,
    pub kind: ComponentKind,
}

/// One component file inside a module.
#[derive(Debug, Clone)]
pub struct Component {
    module: Module,
    source: PathBuf,
    name: String,
    kind: ComponentKind,
}

impl Component {
    /// Recognize a component file by extension; `None` for anything else.
    pub fn from_path(module: Module, source: PathBuf) -> Option<Component> {
        let kind = match source.extension().and_then(|e| e.to_str()) {
            Some("jsonnet") => ComponentKind::Structured,
            Some("yaml") | Some("json") => ComponentKind::Manifest,
            _ => return None,
        };
        let name = source.file_stem()?.to_str()?.to_string();
        Some(Component {
            module,
            source,
            name,
            kind,
        })
    }

    /// The component name: its file stem.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The module-qualified name, e.g. `auth/tokens/web`.
    pub fn qualified_name(&self) -> String {
        if self.module.path().is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.module.path(), self.name)
        }
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Names of the parameter entries this component owns.
    pub fn entry_names(&self) -> Result<Vec<String>> {
        Ok(self
            .summaries()?
            .into_iter()
            .map(|s| self.entry_name(s.index))
            .collect())
    }

    fn entry_name(&self, index: usize) -> String {
        match self.kind {
            ComponentKind::Structured => self.name.clone(),
            ComponentKind::Manifest => format!("{}-{}", self.name, index),
        }
    }

    /// One summary per entry slot: a single one for structured components,
    /// one per embedded document for manifests.
    pub fn summaries(&self) -> Result<Vec<Summary>> {
        match self.kind {
            ComponentKind::Structured => Ok(vec![Summary {
                component_name: self.name.clone(),
                index: 0,
                kind: self.kind,
            }]),
            ComponentKind::Manifest => {
                let docs = self.documents()?;
                Ok((0..docs.len())
                    .map(|index| Summary {
                        component_name: self.name.clone(),
                        index,
                        kind: self.kind,
                    })
                    .collect())
            }
        }
    }

    /// The embedded resource documents of a manifest component.
    pub(crate) fn documents(&self) -> Result<Vec<serde_yaml::Value>> {
        let text = std::fs::read_to_string(&self.source)?;
        schema::decode_documents(&text)
    }

    /// Flattened parameters for this component.
    ///
    /// With no environment, values are the module defaults read literally
    /// from the params document. With an environment, defaults are resolved
    /// (globals applied), overlaid with the environment's overrides, and the
    /// final values extracted from the merged result.
    pub fn params(&self, env: Option<&str>) -> Result<Vec<ModuleParameter>> {
        debug!(component = %self.qualified_name(), env = env.unwrap_or(""), "getting component params");
        let mut params = match env {
            None => self.default_params()?,
            Some(env) => self.environment_params(env)?,
        };
        params.sort_by(|a, b| {
            (&a.component, &a.index, &a.key).cmp(&(&b.component, &b.index, &b.key))
        });
        Ok(params)
    }

    fn default_params(&self) -> Result<Vec<ModuleParameter>> {
        let text = self.module.read_params()?;
        match self.kind {
            ComponentKind::Structured => {
                let params = store::get_component_params(&self.name, &text)?;
                Ok(self.scalar_records(&params))
            }
            ComponentKind::Manifest => {
                let all = store::get_all_component_params(&text)?;
                let docs = self.documents()?;
                let mut records = Vec::new();
                for (entry, params) in &all {
                    let Some(index) = self.entry_index(entry) else {
                        continue;
                    };
                    let Some(doc) = docs.get(index) else {
                        debug!(%entry, "parameter entry has no matching manifest document");
                        continue;
                    };
                    let map = params_to_json_map(params);
                    records.extend(self.manifest_records(index, &map, doc));
                }
                Ok(records)
            }
        }
    }

    fn environment_params(&self, env: &str) -> Result<Vec<ModuleParameter>> {
        let components = resolve::environment_components(&self.module, env)?;
        let empty = serde_json::Map::new();
        let components = components.as_object().unwrap_or(&empty);

        match self.kind {
            ComponentKind::Structured => {
                let entry = components
                    .get(&self.name)
                    .and_then(|v| v.as_object())
                    .ok_or_else(|| Error::ComponentNotFound(self.name.clone()))?;
                let params = params_from_json_object(entry);
                Ok(self.scalar_records(&params))
            }
            ComponentKind::Manifest => {
                let docs = self.documents()?;
                let mut records = Vec::new();
                for (entry, value) in components {
                    let Some(index) = self.entry_index(entry) else {
                        continue;
                    };
                    let Some(doc) = docs.get(index) else {
                        continue;
                    };
                    let map = value.as_object().cloned().unwrap_or_default();
                    records.extend(self.manifest_records(index, &map, doc));
                }
                Ok(records)
            }
        }
    }

    fn scalar_records(&self, params: &Params) -> Vec<ModuleParameter> {
        params
            .iter()
            .map(|(key, value)| ModuleParameter {
                component: self.name.clone(),
                index: "0".to_string(),
                key: key.clone(),
                value: value.as_literal(),
            })
            .collect()
    }

    fn manifest_records(
        &self,
        index: usize,
        params: &serde_json::Map<String, Json>,
        doc: &serde_yaml::Value,
    ) -> Vec<ModuleParameter> {
        let leaves = schema::scalar_paths(doc);
        let mut records = Vec::new();
        self.walk_manifest_params(index, params, &[], &leaves, &mut records);
        records
    }

    /// Walk a manifest entry's parameter map. Scalars keep their dotted
    /// schema path; nested structures with no parameterizable leaf collapse
    /// to one JSON value.
    fn walk_manifest_params(
        &self,
        index: usize,
        params: &serde_json::Map<String, Json>,
        path: &[String],
        leaves: &std::collections::BTreeSet<String>,
        records: &mut Vec<ModuleParameter>,
    ) {
        for (key, value) in params {
            let mut child_path = path.to_vec();
            child_path.push(key.clone());
            let dotted = child_path.join(".");

            match value {
                Json::Object(map) => {
                    if leaves.contains(&dotted) {
                        records.push(self.manifest_record(index, dotted, value.to_string()));
                        continue;
                    }
                    let before = records.len();
                    self.walk_manifest_params(index, map, &child_path, leaves, records);
                    if records.len() == before {
                        records.push(self.manifest_record(index, dotted, value.to_string()));
                    }
                }
                Json::Array(_) => {
                    if leaves.contains(&dotted) {
                        records.push(self.manifest_record(index, dotted, value.to_string()));
                    }
                }
                scalar => {
                    if leaves.contains(&dotted) {
                        records.push(self.manifest_record(
                            index,
                            dotted,
                            ParamValue::from_json(scalar).as_literal(),
                        ));
                    }
                }
            }
        }
    }

    fn manifest_record(&self, index: usize, key: String, value: String) -> ModuleParameter {
        ModuleParameter {
            component: self.name.clone(),
            index: index.to_string(),
            key,
            value,
        }
    }

    /// Parse `<name>-<index>` entry names belonging to this component.
    fn entry_index(&self, entry: &str) -> Option<usize> {
        let rest = entry.strip_prefix(&self.name)?.strip_prefix('-')?;
        if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        rest.parse().ok()
    }

    /// Set one parameter, addressed by a dotted key and (for manifests) a
    /// document index.
    pub fn set_param(&self, key: &str, value: &ParamValue, index: usize) -> Result<()> {
        self.module.set_param(&self.entry_name(index), key, value)
    }

    /// Delete one parameter.
    pub fn delete_param(&self, key: &str, index: usize) -> Result<()> {
        self.module.delete_param(&self.entry_name(index), key)
    }
}

fn params_to_json_map(params: &Params) -> serde_json::Map<String, Json> {
    params
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect()
}
