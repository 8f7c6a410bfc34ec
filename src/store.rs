//! Component parameter store.
//!
//! Text-to-text operations on the `components` object of a module params
//! document. Every operation re-parses the source, computes the affected
//! byte span from the syntax tree, and splices replacement text into the
//! original source; every line outside the touched entry is preserved
//! verbatim.

use crate::doc::{
    insert_at, line_start, remove_entry_lines, render_entry, replace_span, write_params_block,
    ParamsDoc, Span, ENTRY_INDENT, FIELD_INDENT,
};
use crate::error::{Error, Result};
use crate::value::Params;
use std::collections::BTreeMap;

/// Name of the params file inside a module directory, used in parse errors.
pub const PARAMS_FILE: &str = "params.libsonnet";

/// Append a new component entry with its default parameters.
///
/// The entry is rendered with sorted keys and spliced in just before the
/// closing brace of `components`. Fails with `DuplicateComponent` when the
/// component already has an entry.
pub fn append_component(name: &str, snippet: &str, params: &Params) -> Result<String> {
    let parsed = ParamsDoc::parse(PARAMS_FILE, snippet)?;
    let components = parsed.components()?;
    if components.entry(name).is_some() {
        return Err(Error::DuplicateComponent(name.to_string()));
    }

    let offset = line_start(snippet, components.span().end.saturating_sub(1));
    Ok(insert_at(snippet, offset, &render_entry(name, params, false)))
}

/// Read one component's parameters as literal values.
pub fn get_component_params(name: &str, snippet: &str) -> Result<Params> {
    let parsed = ParamsDoc::parse(PARAMS_FILE, snippet)?;
    let components = parsed.components()?;
    components
        .entry(name)
        .ok_or_else(|| Error::ComponentNotFound(name.to_string()))?
        .params()
}

/// Read every component's parameters.
pub fn get_all_component_params(snippet: &str) -> Result<BTreeMap<String, Params>> {
    let parsed = ParamsDoc::parse(PARAMS_FILE, snippet)?;
    let components = parsed.components()?;
    let mut all = BTreeMap::new();
    for entry in components.entries() {
        let params = entry.params()?;
        all.insert(entry.name, params);
    }
    Ok(all)
}

/// Overlay `params` onto a component's existing entry.
///
/// Existing keys absent from `params` are kept; present keys are
/// overwritten. The entry's field block is rewritten with sorted keys.
pub fn set_component_params(name: &str, snippet: &str, params: &Params) -> Result<String> {
    let parsed = ParamsDoc::parse(PARAMS_FILE, snippet)?;
    let components = parsed.components()?;
    let entry = components
        .entry(name)
        .ok_or_else(|| Error::ComponentNotFound(name.to_string()))?;

    let mut merged = entry.params()?;
    for (key, value) in params {
        merged.insert(key.clone(), value.clone());
    }

    Ok(rewrite_entry(snippet, entry.span()?, &merged))
}

/// Remove a component's whole entry, including its trailing comma.
pub fn delete_component(name: &str, snippet: &str) -> Result<String> {
    let parsed = ParamsDoc::parse(PARAMS_FILE, snippet)?;
    let components = parsed.components()?;
    let entry = components
        .entry(name)
        .ok_or_else(|| Error::ComponentNotFound(name.to_string()))?;

    Ok(remove_entry_lines(snippet, entry.span()?))
}

/// Remove a single key from a component's entry, keeping the rest.
pub fn delete_component_key(name: &str, key: &str, snippet: &str) -> Result<String> {
    let parsed = ParamsDoc::parse(PARAMS_FILE, snippet)?;
    let components = parsed.components()?;
    let entry = components
        .entry(name)
        .ok_or_else(|| Error::ComponentNotFound(name.to_string()))?;

    let mut params = entry.params()?;
    if params.remove(key).is_none() {
        return Err(Error::ParamNotFound {
            component: name.to_string(),
            key: key.to_string(),
        });
    }

    Ok(rewrite_entry(snippet, entry.span()?, &params))
}

/// Overlay `params` onto the module's `global` object.
pub fn set_global_params(snippet: &str, params: &Params) -> Result<String> {
    let parsed = ParamsDoc::parse(PARAMS_FILE, snippet)?;
    let entry = parsed
        .global()?
        .ok_or_else(|| Error::Schema("expected to find a top-level global object".into()))?;

    let mut merged = entry.params()?;
    for (key, value) in params {
        merged.insert(key.clone(), value.clone());
    }

    Ok(rewrite_entry_at(snippet, entry.span()?, &merged, 4, 2))
}

/// Remove a single key from the module's `global` object.
pub fn delete_global_param(key: &str, snippet: &str) -> Result<String> {
    let parsed = ParamsDoc::parse(PARAMS_FILE, snippet)?;
    let entry = parsed
        .global()?
        .ok_or_else(|| Error::Schema("expected to find a top-level global object".into()))?;

    let mut params = entry.params()?;
    if params.remove(key).is_none() {
        return Err(Error::ParamNotFound {
            component: "global".to_string(),
            key: key.to_string(),
        });
    }

    Ok(rewrite_entry_at(snippet, entry.span()?, &params, 4, 2))
}

/// Replace the interior of an entry's value object with a freshly written
/// parameter block.
pub(crate) fn rewrite_entry(snippet: &str, span: Span, params: &Params) -> String {
    rewrite_entry_at(snippet, span, params, FIELD_INDENT, ENTRY_INDENT)
}

fn rewrite_entry_at(
    snippet: &str,
    span: Span,
    params: &Params,
    field_indent: usize,
    closing_indent: usize,
) -> String {
    let interior = Span {
        begin: span.begin + 1,
        end: span.end - 1,
    };
    if params.is_empty() {
        return replace_span(snippet, interior, "");
    }
    let block = write_params_block(params, field_indent);
    let closing_pad = " ".repeat(closing_indent);
    replace_span(snippet, interior, &format!("{block}{closing_pad}"))
}

/// Ensure an empty stub entry exists for `name`; used for manifest
/// component document slots. Returns the (possibly unchanged) text.
pub(crate) fn ensure_component_stub(name: &str, snippet: &str) -> Result<String> {
    match append_component(name, snippet, &Params::new()) {
        Ok(updated) => Ok(updated),
        Err(Error::DuplicateComponent(_)) => Ok(snippet.to_string()),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ParamValue;
    use pretty_assertions::assert_eq;

    fn params(pairs: &[(&str, ParamValue)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    const WITH_COMPONENTS: &str = r#"
{
  global: {
    // Values shared across every component in this module.
    // replicas: 4,
  },
  components: {
    // One entry per component file in this directory.
    foo: {
      name: "foo",
      replicas: 1,
    },
    bar: {
      name: "bar",
    },
  },
}"#;

    const NO_COMPONENTS: &str = r#"
{
  global: {
    // Values shared across every component in this module.
    // replicas: 4,
  },
  components: {
    // One entry per component file in this directory.
  },
}"#;

    #[test]
    fn test_append_component_with_existing_entries() {
        let new_params = params(&[
            ("replicas", ParamValue::Num(5.0)),
            ("name", ParamValue::Str("baz".into())),
        ]);
        let updated = append_component("baz", WITH_COMPONENTS, &new_params).unwrap();
        let expected = r#"
{
  global: {
    // Values shared across every component in this module.
    // replicas: 4,
  },
  components: {
    // One entry per component file in this directory.
    foo: {
      name: "foo",
      replicas: 1,
    },
    bar: {
      name: "bar",
    },
    baz: {
      name: "baz",
      replicas: 5,
    },
  },
}"#;
        assert_eq!(updated, expected);
    }

    #[test]
    fn test_append_component_into_empty_components() {
        let new_params = params(&[
            ("replicas", ParamValue::Num(5.0)),
            ("name", ParamValue::Str("baz".into())),
        ]);
        let updated = append_component("baz", NO_COMPONENTS, &new_params).unwrap();
        let expected = r#"
{
  global: {
    // Values shared across every component in this module.
    // replicas: 4,
  },
  components: {
    // One entry per component file in this directory.
    baz: {
      name: "baz",
      replicas: 5,
    },
  },
}"#;
        assert_eq!(updated, expected);
    }

    #[test]
    fn test_append_component_duplicate_is_error() {
        let err = append_component("foo", WITH_COMPONENTS, &Params::new()).unwrap_err();
        assert!(matches!(err, Error::DuplicateComponent(ref name) if name == "foo"));
    }

    #[test]
    fn test_append_component_requires_components_object() {
        let missing = "{\n  global: {},\n}";
        assert!(matches!(
            append_component("baz", missing, &Params::new()),
            Err(Error::Schema(_))
        ));

        let nested = "{\n  global: {\n    components: {},\n  },\n}";
        assert!(matches!(
            append_component("baz", nested, &Params::new()),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn test_get_component_params() {
        let got = get_component_params("foo", WITH_COMPONENTS).unwrap();
        let expected = params(&[
            ("name", ParamValue::Str("foo".into())),
            ("replicas", ParamValue::Num(1.0)),
        ]);
        assert_eq!(got, expected);
    }

    #[test]
    fn test_get_component_params_not_found() {
        let err = get_component_params("baz", WITH_COMPONENTS).unwrap_err();
        assert!(matches!(err, Error::ComponentNotFound(ref name) if name == "baz"));
    }

    #[test]
    fn test_get_all_component_params() {
        let all = get_all_component_params(WITH_COMPONENTS).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(
            all["bar"],
            params(&[("name", ParamValue::Str("bar".into()))])
        );
        assert_eq!(
            all["foo"],
            params(&[
                ("name", ParamValue::Str("foo".into())),
                ("replicas", ParamValue::Num(1.0)),
            ])
        );
    }

    #[test]
    fn test_set_component_params_overlays_existing_keys() {
        let updated = set_component_params(
            "foo",
            WITH_COMPONENTS,
            &params(&[("replicas", ParamValue::Num(5.0))]),
        )
        .unwrap();

        let got = get_component_params("foo", &updated).unwrap();
        let expected = params(&[
            ("name", ParamValue::Str("foo".into())),
            ("replicas", ParamValue::Num(5.0)),
        ]);
        assert_eq!(got, expected);
    }

    #[test]
    fn test_set_component_params_writes_sorted_block() {
        let snippet = r#"
{
  components: {
    foo: {
      name: "foo",
    },
  },
}"#;
        let updated = set_component_params(
            "foo",
            snippet,
            &params(&[("replicas", ParamValue::Num(5.0))]),
        )
        .unwrap();
        let expected = r#"
{
  components: {
    foo: {
      name: "foo",
      replicas: 5,
    },
  },
}"#;
        assert_eq!(updated, expected);
    }

    #[test]
    fn test_set_component_params_not_found() {
        let err = set_component_params(
            "baz",
            WITH_COMPONENTS,
            &params(&[("name", ParamValue::Str("baz".into()))]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ComponentNotFound(_)));
    }

    #[test]
    fn test_edit_leaves_siblings_byte_identical() {
        let updated = set_component_params(
            "foo",
            WITH_COMPONENTS,
            &params(&[("replicas", ParamValue::Num(9.0))]),
        )
        .unwrap();

        // Excise foo's block from both texts; the rest must match exactly.
        let excise = |text: &str| -> String {
            text.lines()
                .filter(|line| !line.contains("foo") && !line.contains("replicas"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        assert_eq!(excise(WITH_COMPONENTS), excise(&updated));
    }

    #[test]
    fn test_delete_component_removes_exactly_one_entry() {
        let updated = delete_component("foo", WITH_COMPONENTS).unwrap();
        let all = get_all_component_params(&updated).unwrap();
        assert_eq!(all.keys().collect::<Vec<_>>(), vec!["bar"]);
        // bar's text is untouched
        assert!(updated.contains("    bar: {\n      name: \"bar\",\n    },"));
    }

    #[test]
    fn test_delete_component_not_found() {
        let err = delete_component("baz", WITH_COMPONENTS).unwrap_err();
        assert!(matches!(err, Error::ComponentNotFound(_)));
    }

    #[test]
    fn test_append_then_delete_restores_document() {
        let new_params = params(&[("name", ParamValue::Str("baz".into()))]);
        let appended = append_component("baz", WITH_COMPONENTS, &new_params).unwrap();
        let restored = delete_component("baz", &appended).unwrap();
        assert_eq!(restored, WITH_COMPONENTS);
    }

    #[test]
    fn test_delete_component_key() {
        let updated = delete_component_key("foo", "replicas", WITH_COMPONENTS).unwrap();
        let got = get_component_params("foo", &updated).unwrap();
        assert_eq!(got, params(&[("name", ParamValue::Str("foo".into()))]));

        let err = delete_component_key("foo", "missing", WITH_COMPONENTS).unwrap_err();
        assert!(matches!(err, Error::ParamNotFound { .. }));
    }

    #[test]
    fn test_set_global_params_leaves_components_untouched() {
        let updated = set_global_params(
            WITH_COMPONENTS,
            &params(&[("replicas", ParamValue::Num(4.0))]),
        )
        .unwrap();
        assert!(updated.contains("  global: {\n    replicas: 4,\n  },"));
        assert!(updated.contains("    foo: {\n      name: \"foo\",\n      replicas: 1,\n    },"));

        let removed = delete_global_param("replicas", &updated).unwrap();
        assert!(removed.contains("  global: {},"));
    }

    #[test]
    fn test_ensure_component_stub_is_idempotent() {
        let once = ensure_component_stub("site-0", NO_COMPONENTS).unwrap();
        assert!(once.contains("\"site-0\": {},"));
        let twice = ensure_component_stub("site-0", &once).unwrap();
        assert_eq!(once, twice);
    }
}
