//! Environment override layer.
//!
//! The same four store operations, against the overlay document shape:
//!
//! ```text
//! local params = import "../../components/params.libsonnet";
//! params + {
//!   components +: {
//!     <name> +: { <key>: <literal>, ... },
//!   },
//! }
//! ```
//!
//! The `+:` operator marks each level as "extend, don't replace": an
//! environment only records the keys it overrides, and everything else
//! inherits the module default at resolution time.

use crate::doc::{insert_at, line_start, remove_entry_lines, render_entry, ParamsDoc};
use crate::error::{Error, Result};
use crate::store::{rewrite_entry, PARAMS_FILE};
use crate::value::Params;
use std::collections::BTreeMap;

/// Read one component's override parameters.
///
/// Returns the (possibly empty) override map and whether the component has
/// an override block at all; a first-time `set` uses the `false` case to
/// synthesize a fresh block.
pub fn get_environment_params(name: &str, snippet: &str) -> Result<(Params, bool)> {
    let parsed = ParamsDoc::parse(PARAMS_FILE, snippet)?;
    let components = parsed.env_components()?;
    match components.entry(name) {
        Some(entry) => Ok((entry.params()?, true)),
        None => Ok((Params::new(), false)),
    }
}

/// Read every component's override parameters.
pub fn get_all_environment_params(snippet: &str) -> Result<BTreeMap<String, Params>> {
    let parsed = ParamsDoc::parse(PARAMS_FILE, snippet)?;
    let components = parsed.env_components()?;
    let mut all = BTreeMap::new();
    for entry in components.entries() {
        let params = entry.params()?;
        all.insert(entry.name, params);
    }
    Ok(all)
}

/// Overlay `params` onto a component's override block, synthesizing a new
/// `<name> +: {...}` block just before the closing brace of `components +:`
/// when the component has no overrides yet.
pub fn set_environment_params(name: &str, snippet: &str, params: &Params) -> Result<String> {
    let parsed = ParamsDoc::parse(PARAMS_FILE, snippet)?;
    let components = parsed.env_components()?;

    match components.entry(name) {
        Some(entry) => {
            let mut merged = entry.params()?;
            for (key, value) in params {
                merged.insert(key.clone(), value.clone());
            }
            Ok(rewrite_entry(snippet, entry.span()?, &merged))
        }
        None => {
            let offset = line_start(snippet, components.span().end.saturating_sub(1));
            Ok(insert_at(snippet, offset, &render_entry(name, params, true)))
        }
    }
}

/// Remove a component's whole override block.
pub fn delete_environment_component(name: &str, snippet: &str) -> Result<String> {
    let parsed = ParamsDoc::parse(PARAMS_FILE, snippet)?;
    let components = parsed.env_components()?;
    let entry = components
        .entry(name)
        .ok_or_else(|| Error::ComponentNotFound(name.to_string()))?;

    Ok(remove_entry_lines(snippet, entry.span()?))
}
