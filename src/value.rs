//! Tagged parameter values.
//!
//! Parameters are stored in the params documents as literal source text: a
//! quoted string, a bare number or boolean, or serialized JSON for compound
//! values. `ParamValue` carries that distinction across the API boundary so
//! callers never have to quote strings by hand (or accidentally quote them
//! twice).

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value as Json;

/// A component's parameters, keyed by parameter name.
///
/// A `BTreeMap` so that iteration yields the sorted key order every write
/// path requires.
pub type Params = BTreeMap<String, ParamValue>;

/// One parameter value, tagged by its literal form.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// A string literal; rendered quoted and escaped.
    Str(String),
    /// A numeric literal; whole values render without a fractional part.
    Num(f64),
    /// A boolean literal.
    Bool(bool),
    /// Anything else representable as data: null, arrays, objects. Rendered
    /// as compact JSON, which is itself valid Jsonnet.
    Raw(Json),
}

impl ParamValue {
    /// Render the value as the exact source text stored in a params document.
    pub fn as_literal(&self) -> String {
        match self {
            ParamValue::Str(s) => Json::String(s.clone()).to_string(),
            ParamValue::Num(n) => format_number(*n),
            ParamValue::Bool(b) => b.to_string(),
            ParamValue::Raw(v) => v.to_string(),
        }
    }

    /// Classify a raw user-supplied string: booleans and numbers pass
    /// through bare, JSON compounds stay structured, everything else becomes
    /// a string literal.
    pub fn parse(input: &str) -> ParamValue {
        let trimmed = input.trim();
        match trimmed {
            "true" => return ParamValue::Bool(true),
            "false" => return ParamValue::Bool(false),
            "null" => return ParamValue::Raw(Json::Null),
            _ => {}
        }
        if let Ok(n) = trimmed.parse::<f64>() {
            return ParamValue::Num(n);
        }
        if trimmed.starts_with('{') || trimmed.starts_with('[') || trimmed.starts_with('"') {
            if let Ok(v) = serde_json::from_str::<Json>(trimmed) {
                return ParamValue::from_json(&v);
            }
        }
        ParamValue::Str(input.to_string())
    }

    /// Convert from an evaluated JSON value.
    pub fn from_json(value: &Json) -> ParamValue {
        match value {
            Json::String(s) => ParamValue::Str(s.clone()),
            Json::Number(n) => ParamValue::Num(n.as_f64().unwrap_or_default()),
            Json::Bool(b) => ParamValue::Bool(*b),
            other => ParamValue::Raw(other.clone()),
        }
    }

    /// Convert to a JSON value, keeping whole numbers integral.
    pub fn to_json(&self) -> Json {
        match self {
            ParamValue::Str(s) => Json::String(s.clone()),
            ParamValue::Num(n) => {
                if is_whole(*n) {
                    Json::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n).map(Json::Number).unwrap_or(Json::Null)
                }
            }
            ParamValue::Bool(b) => Json::Bool(*b),
            ParamValue::Raw(v) => v.clone(),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_literal())
    }
}

/// Convert an evaluated JSON object into a `Params` map.
pub fn params_from_json_object(object: &serde_json::Map<String, Json>) -> Params {
    object
        .iter()
        .map(|(k, v)| (k.clone(), ParamValue::from_json(v)))
        .collect()
}

/// Set a possibly dotted key inside a params map, creating intermediate
/// objects as needed. `path` must be non-empty.
pub fn set_nested(params: &mut Params, path: &[&str], value: ParamValue) {
    let (head, rest) = match path.split_first() {
        Some(split) => split,
        None => return,
    };
    if rest.is_empty() {
        params.insert((*head).to_string(), value);
        return;
    }

    let mut root = match params.get(*head) {
        Some(ParamValue::Raw(Json::Object(m))) => m.clone(),
        _ => serde_json::Map::new(),
    };
    set_in_object(&mut root, rest, value.to_json());
    params.insert((*head).to_string(), ParamValue::Raw(Json::Object(root)));
}

fn set_in_object(map: &mut serde_json::Map<String, Json>, path: &[&str], value: Json) {
    if path.len() == 1 {
        map.insert(path[0].to_string(), value);
        return;
    }
    let child = map
        .entry(path[0].to_string())
        .or_insert_with(|| Json::Object(serde_json::Map::new()));
    if !child.is_object() {
        *child = Json::Object(serde_json::Map::new());
    }
    if let Json::Object(m) = child {
        set_in_object(m, &path[1..], value);
    }
}

/// Remove a possibly dotted key from a params map. Returns false when the
/// path did not exist.
pub fn delete_nested(params: &mut Params, path: &[&str]) -> bool {
    let (head, rest) = match path.split_first() {
        Some(split) => split,
        None => return false,
    };
    if rest.is_empty() {
        return params.remove(*head).is_some();
    }

    let mut root = match params.get(*head) {
        Some(ParamValue::Raw(Json::Object(m))) => m.clone(),
        _ => return false,
    };
    if !delete_in_object(&mut root, rest) {
        return false;
    }
    params.insert((*head).to_string(), ParamValue::Raw(Json::Object(root)));
    true
}

fn delete_in_object(map: &mut serde_json::Map<String, Json>, path: &[&str]) -> bool {
    if path.len() == 1 {
        return map.remove(path[0]).is_some();
    }
    match map.get_mut(path[0]) {
        Some(Json::Object(m)) => delete_in_object(m, &path[1..]),
        _ => false,
    }
}

fn is_whole(n: f64) -> bool {
    n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15
}

fn format_number(n: f64) -> String {
    if is_whole(n) {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(ParamValue::Str("foo".into()), "\"foo\"" ; "plain string")]
    #[test_case(ParamValue::Str("a\"b".into()), "\"a\\\"b\"" ; "string with quote")]
    #[test_case(ParamValue::Num(1.0), "1" ; "whole number")]
    #[test_case(ParamValue::Num(0.25), "0.25" ; "fractional number")]
    #[test_case(ParamValue::Bool(true), "true" ; "boolean")]
    #[test_case(ParamValue::Raw(serde_json::json!({"a": 1})), "{\"a\":1}" ; "compound json")]
    fn test_literal_rendering(value: ParamValue, expected: &str) {
        assert_eq!(value.as_literal(), expected);
    }

    #[test]
    fn test_parse_classifies_input() {
        assert_eq!(ParamValue::parse("5"), ParamValue::Num(5.0));
        assert_eq!(ParamValue::parse("true"), ParamValue::Bool(true));
        assert_eq!(ParamValue::parse("web"), ParamValue::Str("web".into()));
        assert_eq!(
            ParamValue::parse(r#"{"port": 80}"#),
            ParamValue::Raw(serde_json::json!({"port": 80}))
        );
        assert_eq!(ParamValue::parse("\"quoted\""), ParamValue::Str("quoted".into()));
    }

    #[test]
    fn test_json_round_trip_keeps_whole_numbers() {
        let v = ParamValue::Num(3.0);
        assert_eq!(v.to_json(), serde_json::json!(3));
        assert_eq!(ParamValue::from_json(&v.to_json()), v);
    }

    #[test]
    fn test_set_nested_builds_objects() {
        let mut params = Params::new();
        set_nested(&mut params, &["metadata", "name"], ParamValue::Str("web".into()));
        assert_eq!(
            params.get("metadata"),
            Some(&ParamValue::Raw(serde_json::json!({"name": "web"})))
        );

        set_nested(&mut params, &["metadata", "labels", "app"], ParamValue::Str("web".into()));
        assert_eq!(
            params.get("metadata"),
            Some(&ParamValue::Raw(
                serde_json::json!({"name": "web", "labels": {"app": "web"}})
            ))
        );
    }

    #[test]
    fn test_delete_nested() {
        let mut params = Params::new();
        set_nested(&mut params, &["spec", "replicas"], ParamValue::Num(3.0));
        set_nested(&mut params, &["spec", "paused"], ParamValue::Bool(false));

        assert!(delete_nested(&mut params, &["spec", "replicas"]));
        assert!(!delete_nested(&mut params, &["spec", "replicas"]));
        assert_eq!(
            params.get("spec"),
            Some(&ParamValue::Raw(serde_json::json!({"paused": false})))
        );

        assert!(delete_nested(&mut params, &["spec"]));
        assert!(params.is_empty());
    }
}
