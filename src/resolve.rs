//! Resolution pipeline.
//!
//! Merges a module's component defaults with its globals, then with an
//! environment's sparse overrides, producing the final values consumed by
//! rendering. Parameter values may be expressions (referencing `global.*`
//! or computed), so the general path evaluates the documents with the
//! embedded Jsonnet interpreter; when every value involved is a literal the
//! merge is computed as a pure data overlay instead and the interpreter is
//! never started.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value as Json;
use tracing::{debug, warn};

use crate::component::ComponentKind;
use crate::doc::ParamsDoc;
use crate::error::{Error, Result};
use crate::eval;
use crate::module::Module;
use crate::store::{self, PARAMS_FILE};
use crate::value::Params;

/// External-code binding carrying the serialized component defaults during
/// overlay evaluation.
pub const PARAMS_EXT_CODE: &str = "__kparams/params";

/// External-code binding carrying an environment's destination metadata.
/// Consumed by the rendering layer only; see
/// [`crate::app::App::destination_ext_code`].
pub const ENVIRONMENT_EXT_CODE: &str = "__kparams/environment";

/// The fixed apply-globals expression: every component entry is patched with
/// the module's `global` object.
const APPLY_GLOBALS_SNIPPET: &str = r#"
local params = std.extVar("__kparams/params");
local apply_global = function(key, value) std.mergePatch(value, params.global);
{
  components: std.mapWithKey(apply_global, params.components),
}
"#;

/// Resolve a module's component defaults: ensure every manifest document has
/// a parameter entry stub, then apply globals over components. Returns a
/// JSON-encoded object of the shape `{ "components": { ... } }`.
pub fn resolved_params(module: &Module) -> Result<String> {
    let text = insert_manifest_stubs(module, &module.read_params()?)?;
    let parsed = ParamsDoc::parse(PARAMS_FILE, &text)?;

    if let Some((global, components)) = literal_module(&parsed)? {
        debug!(module = %module.name(), "resolving params as pure data");
        let patch = Json::Object(global);
        let merged: serde_json::Map<String, Json> = components
            .into_iter()
            .map(|(name, map)| (name, json_merge_patch(Json::Object(map), &patch)))
            .collect();
        return Ok(serde_json::to_string_pretty(&serde_json::json!({
            "components": merged
        }))?);
    }

    debug!(module = %module.name(), "resolving params with the interpreter");
    let value = eval::evaluate(PARAMS_FILE, APPLY_GLOBALS_SNIPPET, &[(PARAMS_EXT_CODE, &text)])?;
    Ok(serde_json::to_string_pretty(&value)?)
}

/// Resolve the final per-component values for an environment: module
/// defaults (globals applied) overlaid with the environment's overrides.
/// Returns the merged `components` object.
pub fn environment_components(module: &Module, env: &str) -> Result<Json> {
    let environment = module.app().environment(env)?;
    let resolved = resolved_params(module)?;
    let resolved_value: Json = serde_json::from_str(&resolved)?;
    let defaults = resolved_value
        .get("components")
        .cloned()
        .unwrap_or_else(|| serde_json::json!({}));

    let override_text = environment.read_params()?;
    let overlay = ParamsDoc::parse(PARAMS_FILE, &override_text)?;
    if let Some(overrides) = literal_overrides(&overlay)? {
        debug!(module = %module.name(), env, "merging environment overrides as pure data");
        return Ok(apply_overrides(defaults, overrides));
    }

    debug!(module = %module.name(), env, "merging environment overrides with the interpreter");
    let rewritten = rewrite_params_import(env, &override_text);
    let value = eval::evaluate(PARAMS_FILE, &rewritten, &[(PARAMS_EXT_CODE, &resolved)])?;
    Ok(value
        .get("components")
        .cloned()
        .unwrap_or_else(|| serde_json::json!({})))
}

/// Replace the overlay document's relative params import with the external
/// binding, so it can be evaluated against the resolved defaults instead of
/// the raw file.
pub(crate) fn rewrite_params_import(env: &str, text: &str) -> String {
    let re = params_import_pattern();
    if re.is_match(text) {
        warn!(env, "rewriting environment params import to the defaults binding");
        re.replace_all(text, format!("std.extVar(\"{PARAMS_EXT_CODE}\")"))
            .into_owned()
    } else {
        text.to_string()
    }
}

fn params_import_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"import\s+"[^"]*params\.libsonnet""#).expect("import pattern is valid")
    })
}

/// Insert an empty `<name>-<index>` stub for every manifest document index
/// missing one. The stubs only exist in the resolved text; the params file
/// on disk is left alone.
fn insert_manifest_stubs(module: &Module, text: &str) -> Result<String> {
    let mut out = text.to_string();
    for component in module.components()? {
        if component.kind() != ComponentKind::Manifest {
            continue;
        }
        for entry in component.entry_names()? {
            out = store::ensure_component_stub(&entry, &out)?;
        }
    }
    Ok(out)
}

type LiteralComponents = BTreeMap<String, serde_json::Map<String, Json>>;

/// Extract the whole module document as literal data, or `None` when any
/// value is an expression and the interpreter is needed.
fn literal_module(
    parsed: &ParamsDoc,
) -> Result<Option<(serde_json::Map<String, Json>, LiteralComponents)>> {
    let global = match parsed.global()? {
        Some(entry) => match literal_entry(entry.params()) {
            Ok(Some(map)) => map,
            Ok(None) => return Ok(None),
            Err(err) => return Err(err),
        },
        None => serde_json::Map::new(),
    };

    let components = parsed.components()?;
    let mut out = LiteralComponents::new();
    for entry in components.entries() {
        match literal_entry(entry.params()) {
            Ok(Some(map)) => {
                out.insert(entry.name, map);
            }
            Ok(None) => return Ok(None),
            Err(err) => return Err(err),
        }
    }
    Ok(Some((global, out)))
}

/// Extract the overlay document's overrides as literal data, or `None` when
/// the interpreter is needed.
fn literal_overrides(parsed: &ParamsDoc) -> Result<Option<LiteralComponents>> {
    let components = parsed.env_components()?;
    let mut out = LiteralComponents::new();
    for entry in components.entries() {
        match literal_entry(entry.params()) {
            Ok(Some(map)) => {
                out.insert(entry.name, map);
            }
            Ok(None) => return Ok(None),
            Err(err) => return Err(err),
        }
    }
    Ok(Some(out))
}

/// Classify an entry-extraction result: literal data, needs-the-interpreter,
/// or a hard error.
fn literal_entry(
    params: Result<Params>,
) -> Result<Option<serde_json::Map<String, Json>>> {
    match params {
        Ok(params) => Ok(Some(
            params.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
        )),
        Err(Error::UnsupportedValue { .. }) | Err(Error::Schema(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Shallow per-entry overlay, matching the `+:` semantics of the override
/// document: override keys replace default keys, everything else inherits.
fn apply_overrides(defaults: Json, overrides: LiteralComponents) -> Json {
    let mut merged = defaults.as_object().cloned().unwrap_or_default();
    for (name, override_map) in overrides {
        let mut entry = merged
            .get(&name)
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();
        for (key, value) in override_map {
            entry.insert(key, value);
        }
        merged.insert(name, Json::Object(entry));
    }
    Json::Object(merged)
}

/// RFC 7386 style merge: objects merge recursively, `null` removes a key,
/// anything else replaces. This is the data equivalent of the interpreter's
/// `std.mergePatch`.
fn json_merge_patch(base: Json, patch: &Json) -> Json {
    match patch {
        Json::Object(patch_map) => {
            let mut out = base.as_object().cloned().unwrap_or_default();
            for (key, value) in patch_map {
                if value.is_null() {
                    out.remove(key);
                } else {
                    let child = out.remove(key).unwrap_or(Json::Null);
                    out.insert(key.clone(), json_merge_patch(child, value));
                }
            }
            Json::Object(out)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::App;
    use crate::value::ParamValue;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn test_module() -> (tempfile::TempDir, Module) {
        let dir = tempdir().unwrap();
        let app = App::init(dir.path(), "test-app").unwrap();
        let module = Module::find(&app, "").unwrap();
        (dir, module)
    }

    fn params(pairs: &[(&str, ParamValue)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_resolved_params_applies_globals_as_pure_data() {
        let (_dir, module) = test_module();
        module
            .append_component_entry(
                "web",
                &params(&[
                    ("name", ParamValue::Str("web".into())),
                    ("replicas", ParamValue::Num(1.0)),
                ]),
            )
            .unwrap();
        module.set_global("replicas", &ParamValue::Num(4.0)).unwrap();

        let resolved: Json = serde_json::from_str(&resolved_params(&module).unwrap()).unwrap();
        assert_eq!(
            resolved,
            serde_json::json!({
                "components": {
                    "web": { "name": "web", "replicas": 4 }
                }
            })
        );
    }

    #[test]
    fn test_resolved_params_inserts_manifest_stubs() {
        let (_dir, module) = test_module();
        fs::write(
            module.dir().join("site.yaml"),
            "kind: Deployment\n---\nkind: Service\n",
        )
        .unwrap();

        let resolved: Json = serde_json::from_str(&resolved_params(&module).unwrap()).unwrap();
        assert_eq!(resolved["components"]["site-0"], serde_json::json!({}));
        assert_eq!(resolved["components"]["site-1"], serde_json::json!({}));
        // stubs are not written back
        assert!(!module.read_params().unwrap().contains("site-0"));
    }

    #[test]
    fn test_environment_components_merges_overrides() {
        let (_dir, module) = test_module();
        module
            .append_component_entry(
                "web",
                &params(&[
                    ("name", ParamValue::Str("web".into())),
                    ("replicas", ParamValue::Num(1.0)),
                ]),
            )
            .unwrap();

        let app = module.app().clone();
        let env = app
            .create_environment("dev", Default::default())
            .unwrap();
        env.set_component_params("web", &params(&[("replicas", ParamValue::Num(5.0))]))
            .unwrap();

        let components = environment_components(&module, "dev").unwrap();
        assert_eq!(
            components["web"],
            serde_json::json!({ "name": "web", "replicas": 5 })
        );
    }

    #[test]
    fn test_environment_components_without_override_inherits_defaults() {
        let (_dir, module) = test_module();
        module
            .append_component_entry("web", &params(&[("replicas", ParamValue::Num(1.0))]))
            .unwrap();
        module.app().create_environment("dev", Default::default()).unwrap();

        let components = environment_components(&module, "dev").unwrap();
        assert_eq!(components["web"], serde_json::json!({ "replicas": 1 }));
    }

    #[test]
    fn test_rewrite_params_import() {
        let text = "local params = import \"../../components/params.libsonnet\";\nparams + {}";
        let rewritten = rewrite_params_import("dev", text);
        assert!(rewritten.contains("std.extVar(\"__kparams/params\")"));
        assert!(!rewritten.contains("import"));

        let untouched = rewrite_params_import("dev", "std.extVar(\"x\")");
        assert_eq!(untouched, "std.extVar(\"x\")");
    }

    #[test]
    fn test_json_merge_patch() {
        let base = serde_json::json!({"a": {"b": 1, "c": 2}, "d": 3});
        let patch = serde_json::json!({"a": {"b": 9}, "d": null, "e": 4});
        assert_eq!(
            json_merge_patch(base, &patch),
            serde_json::json!({"a": {"b": 9, "c": 2}, "e": 4})
        );
    }
}
