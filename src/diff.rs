//! Diff engine for flattened parameter lists.

use std::collections::{BTreeMap, BTreeSet};

use crate::module::ModuleParameter;

/// One row of a parameter diff. `left`/`right` hold the literal values on
/// each side; an absent value is the empty string, so additions and
/// removals surface as asymmetric rows.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DiffRecord {
    pub component: String,
    pub key: String,
    pub left: String,
    pub right: String,
}

impl DiffRecord {
    /// Whether the two sides disagree.
    pub fn is_changed(&self) -> bool {
        self.left != self.right
    }
}

/// Diff two flattened parameter lists.
///
/// The (component, key) key space of both sides is unioned and every pair is
/// reported in lexical component-then-key order; unchanged pairs are
/// retained so callers can render a full table and highlight
/// [`DiffRecord::is_changed`] rows.
pub fn diff(left: &[ModuleParameter], right: &[ModuleParameter]) -> Vec<DiffRecord> {
    let left = flatten(left);
    let right = flatten(right);

    let keys: BTreeSet<&(String, String)> = left.keys().chain(right.keys()).collect();
    keys.into_iter()
        .map(|pair| DiffRecord {
            component: pair.0.clone(),
            key: pair.1.clone(),
            left: left.get(pair).cloned().unwrap_or_default(),
            right: right.get(pair).cloned().unwrap_or_default(),
        })
        .collect()
}

fn flatten(params: &[ModuleParameter]) -> BTreeMap<(String, String), String> {
    params
        .iter()
        .map(|p| ((p.component.clone(), p.key.clone()), p.value.clone()))
        .collect()
}
