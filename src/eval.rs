//! Thin adapter over the embedded Jsonnet interpreter.
//!
//! The resolution pipeline only needs one shape of call: evaluate a snippet
//! with a set of named external-code bindings and read the result back as
//! JSON. The call is blocking and CPU-bound with no timeout; callers that
//! need a deadline must wrap it themselves.

use std::path::Path;
use std::rc::Rc;

use jrsonnet_evaluator::{EvaluationState, ManifestFormat};

use crate::error::{Error, Result};

/// Evaluate `snippet` with the given external-code bindings, manifesting the
/// result as JSON. `file` is only used in error traces.
pub(crate) fn evaluate(
    file: &str,
    snippet: &str,
    ext_codes: &[(&str, &str)],
) -> Result<serde_json::Value> {
    let state = EvaluationState::default();
    state.with_stdlib();
    state.set_manifest_format(ManifestFormat::Json(2));

    for (name, code) in ext_codes {
        state
            .add_ext_code((*name).into(), (*code).into())
            .map_err(|e| Error::Eval(format!("binding {name:?}: {e:?}")))?;
    }

    let value = state
        .evaluate_snippet_raw(Rc::from(Path::new(file)), snippet.into())
        .map_err(|e| Error::Eval(format!("{e:?}")))?;
    let manifested = state
        .manifest(value)
        .map_err(|e| Error::Eval(format!("{e:?}")))?;

    Ok(serde_json::from_str(&manifested)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_with_ext_code() {
        let out = evaluate(
            "snippet",
            r#"local params = std.extVar("test/params"); { doubled: params.n * 2 }"#,
            &[("test/params", "{ n: 21 }")],
        )
        .unwrap();
        assert_eq!(out, serde_json::json!({"doubled": 42}));
    }

    #[test]
    fn test_evaluate_reports_errors() {
        let err = evaluate("snippet", "{ a: undefined_var }", &[]).unwrap_err();
        assert!(matches!(err, Error::Eval(_)));
    }
}
