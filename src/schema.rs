//! Manifest value schema.
//!
//! Manifest components store one or more serialized resource documents per
//! file. When their parameters are flattened for listing and diffing, each
//! override key is classified against the manifest's own structure: a dotted
//! path that holds a scalar in the manifest is a parameterizable leaf; a
//! nested structure with no parameterizable leaf underneath collapses to a
//! single JSON-serialized value.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde_yaml::Value as Yaml;

use crate::error::Result;

/// Decode a (possibly multi-document) YAML or JSON source. Empty documents
/// are skipped; the remaining documents keep their file order, which defines
/// each document's parameter-entry index.
pub fn decode_documents(source: &str) -> Result<Vec<Yaml>> {
    let mut docs = Vec::new();
    for document in serde_yaml::Deserializer::from_str(source) {
        let value = Yaml::deserialize(document)?;
        if !matches!(value, Yaml::Null) {
            docs.push(value);
        }
    }
    Ok(docs)
}

/// The `apiVersion`/`kind` pair of a resource document, when present.
pub fn group_version_kind(doc: &Yaml) -> Option<(String, String)> {
    let api_version = doc.get("apiVersion")?.as_str()?.to_string();
    let kind = doc.get("kind")?.as_str()?.to_string();
    Some((api_version, kind))
}

/// Dotted paths of every scalar leaf in a resource document. These are the
/// parameterizable paths for the document.
pub fn scalar_paths(doc: &Yaml) -> BTreeSet<String> {
    let mut paths = BTreeSet::new();
    collect_scalar_paths(doc, &mut Vec::new(), &mut paths);
    paths
}

fn collect_scalar_paths(value: &Yaml, path: &mut Vec<String>, paths: &mut BTreeSet<String>) {
    match value {
        Yaml::Mapping(map) => {
            for (key, child) in map {
                let key = match key.as_str() {
                    Some(key) => key.to_string(),
                    None => continue,
                };
                path.push(key);
                collect_scalar_paths(child, path, paths);
                path.pop();
            }
        }
        Yaml::String(_) | Yaml::Number(_) | Yaml::Bool(_) => {
            if !path.is_empty() {
                paths.insert(path.join("."));
            }
        }
        // Sequences and nulls are not parameterizable leaves.
        _ => {}
    }
}
