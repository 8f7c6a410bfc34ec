//! Document model for params files.
//!
//! Wraps the Jsonnet parser: a params document is parsed into a syntax tree
//! whose nodes carry byte-offset spans into the original source. Lookups
//! return spans; mutations are span-based splices against the original text,
//! so untouched regions (comments, sibling entries, unrelated fields) are
//! carried over byte-for-byte. Only freshly synthesized entries are printed
//! from scratch.
//!
//! Two document shapes are understood:
//! - module documents: `{ global: {...}, components: {...} }`
//! - environment overlays: `local params = import "..."; params + {
//!   components +: {...} }`

use std::path::Path;
use std::rc::Rc;

use jrsonnet_parser::{
    parse, Expr, FieldMember, FieldName, LiteralType, LocExpr, Member, ObjBody, ParserSettings,
};
use serde_json::Value as Json;

use crate::error::{Error, Result};
use crate::value::{ParamValue, Params};

/// Field holding the per-component parameter entries.
pub const COMPONENTS_FIELD: &str = "components";

/// Field holding cross-component values in a module document.
pub const GLOBAL_FIELD: &str = "global";

/// Indentation of a component entry line.
pub(crate) const ENTRY_INDENT: usize = 4;

/// Indentation of a parameter line inside an entry.
pub(crate) const FIELD_INDENT: usize = 6;

/// A half-open byte range into a document's source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub begin: usize,
    pub end: usize,
}

/// A parsed params document.
#[derive(Debug)]
pub struct ParamsDoc {
    source: String,
    root: LocExpr,
}

impl ParamsDoc {
    /// Parse Jsonnet source. `file` is only used in error messages.
    pub fn parse(file: &str, source: &str) -> Result<Self> {
        let settings = ParserSettings {
            loc_data: true,
            file_name: Rc::from(Path::new(file)),
        };
        let root = parse(source, &settings).map_err(|e| Error::Parse {
            file: file.to_string(),
            message: e.to_string(),
        })?;
        Ok(ParamsDoc {
            source: source.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The `components` object of a module document.
    pub fn components(&self) -> Result<Components<'_>> {
        let members = match self.root.0.as_ref() {
            Expr::Obj(ObjBody::MemberList(members)) => members,
            _ => return Err(Error::Schema("expected to find a top-level object".into())),
        };
        for member in members {
            if let Member::Field(field) = member {
                if field_name(field) == Some(COMPONENTS_FIELD) {
                    return Components::from_value(&field.value);
                }
            }
        }
        Err(Error::Schema(
            "expected to find a top-level components object".into(),
        ))
    }

    /// The `global` entry of a module document, when present.
    pub fn global(&self) -> Result<Option<Entry<'_>>> {
        let members = match self.root.0.as_ref() {
            Expr::Obj(ObjBody::MemberList(members)) => members,
            _ => return Err(Error::Schema("expected to find a top-level object".into())),
        };
        for member in members {
            if let Member::Field(field) = member {
                if field_name(field) == Some(GLOBAL_FIELD) {
                    return Ok(Some(Entry {
                        name: GLOBAL_FIELD.to_string(),
                        value: &field.value,
                    }));
                }
            }
        }
        Ok(None)
    }

    /// The `components` object of an environment overlay document, reached
    /// through `local` bindings and binary `+` expressions.
    pub fn env_components(&self) -> Result<Components<'_>> {
        let value = find_env_components(&self.root)?;
        Components::from_value(value)
    }
}

/// The `components` object of a parsed document.
pub struct Components<'a> {
    span: Span,
    members: &'a [Member],
}

impl<'a> Components<'a> {
    fn from_value(value: &'a LocExpr) -> Result<Self> {
        let members = match value.0.as_ref() {
            Expr::Obj(ObjBody::MemberList(members)) => members,
            _ => {
                return Err(Error::Schema(
                    "expected components node type to be an object".into(),
                ))
            }
        };
        Ok(Components {
            span: span_of(value)?,
            members,
        })
    }

    /// Span of the object, including its braces.
    pub fn span(&self) -> Span {
        self.span
    }

    /// Named entries in document order.
    pub fn entries(&self) -> Vec<Entry<'a>> {
        self.members
            .iter()
            .filter_map(|member| match member {
                Member::Field(field) => field_name(field).map(|name| Entry {
                    name: name.to_string(),
                    value: &field.value,
                }),
                _ => None,
            })
            .collect()
    }

    pub fn entry(&self, name: &str) -> Option<Entry<'a>> {
        self.entries().into_iter().find(|e| e.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.name).collect()
    }
}

/// One named component entry and its value object.
pub struct Entry<'a> {
    pub name: String,
    value: &'a LocExpr,
}

impl Entry<'_> {
    /// Span of the entry's value object, including its braces.
    pub fn span(&self) -> Result<Span> {
        match self.value.0.as_ref() {
            Expr::Obj(ObjBody::MemberList(_)) => span_of(self.value),
            _ => Err(Error::Schema(format!(
                "expected entry {:?} to be an object",
                self.name
            ))),
        }
    }

    /// Extract the entry's fields as literal parameter values.
    pub fn params(&self) -> Result<Params> {
        let members = match self.value.0.as_ref() {
            Expr::Obj(ObjBody::MemberList(members)) => members,
            _ => {
                return Err(Error::Schema(format!(
                    "expected entry {:?} to be an object",
                    self.name
                )))
            }
        };
        let mut params = Params::new();
        for member in members {
            if let Member::Field(field) = member {
                let key = match field_name(field) {
                    Some(key) => key.to_string(),
                    None => continue,
                };
                let value =
                    literal_value(&field.value).map_err(|reason| Error::UnsupportedValue {
                        key: key.clone(),
                        reason,
                    })?;
                params.insert(key, value);
            }
        }
        Ok(params)
    }
}

fn find_env_components(expr: &LocExpr) -> Result<&LocExpr> {
    match expr.0.as_ref() {
        Expr::LocalExpr(_, body) => find_env_components(body),
        Expr::BinaryOp(_, _, rhs) => find_env_components(rhs),
        Expr::Obj(ObjBody::MemberList(members)) => {
            for member in members {
                if let Member::Field(field) = member {
                    if field_name(field) == Some(COMPONENTS_FIELD) {
                        return Ok(&field.value);
                    }
                }
            }
            Err(Error::Schema(
                "expected a components object in the environment overlay".into(),
            ))
        }
        _ => Err(Error::Schema(
            "unexpected environment params document shape".into(),
        )),
    }
}

fn field_name(field: &FieldMember) -> Option<&str> {
    match &field.name {
        FieldName::Fixed(name) => Some(&**name),
        FieldName::Dyn(_) => None,
    }
}

fn span_of(expr: &LocExpr) -> Result<Span> {
    expr.1
        .as_ref()
        .map(|loc| Span {
            begin: loc.1,
            end: loc.2,
        })
        .ok_or_else(|| Error::Schema("document was parsed without source locations".into()))
}

/// Classify an expression as a literal value: a scalar literal, or an
/// array/object built only from literals (kept as serialized JSON).
/// Everything else is reported with a short reason.
pub(crate) fn literal_value(expr: &LocExpr) -> std::result::Result<ParamValue, String> {
    match expr.0.as_ref() {
        Expr::Str(s) => Ok(ParamValue::Str(s.to_string())),
        Expr::Num(n) => Ok(ParamValue::Num(*n)),
        Expr::Literal(LiteralType::True) => Ok(ParamValue::Bool(true)),
        Expr::Literal(LiteralType::False) => Ok(ParamValue::Bool(false)),
        Expr::Literal(LiteralType::Null) => Ok(ParamValue::Raw(Json::Null)),
        Expr::Arr(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(literal_value(item)?.to_json());
            }
            Ok(ParamValue::Raw(Json::Array(values)))
        }
        Expr::Obj(ObjBody::MemberList(members)) => {
            let mut map = serde_json::Map::new();
            for member in members {
                let field = match member {
                    Member::Field(field) => field,
                    _ => return Err("object with non-field members".to_string()),
                };
                if field.params.is_some() {
                    return Err("object with a method field".to_string());
                }
                let key = field_name(field).ok_or_else(|| "computed field name".to_string())?;
                map.insert(key.to_string(), literal_value(&field.value)?.to_json());
            }
            Ok(ParamValue::Raw(Json::Object(map)))
        }
        _ => Err("non-literal expression".to_string()),
    }
}

// --- text splicing -----------------------------------------------------------

/// Offset of the first byte of the line containing `offset`.
pub(crate) fn line_start(source: &str, offset: usize) -> usize {
    source[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0)
}

/// Offset one past the newline ending the line containing `offset`.
pub(crate) fn line_end(source: &str, offset: usize) -> usize {
    source[offset..]
        .find('\n')
        .map(|i| offset + i + 1)
        .unwrap_or(source.len())
}

pub(crate) fn replace_span(source: &str, span: Span, replacement: &str) -> String {
    let mut out = String::with_capacity(source.len() + replacement.len());
    out.push_str(&source[..span.begin]);
    out.push_str(replacement);
    out.push_str(&source[span.end..]);
    out
}

pub(crate) fn insert_at(source: &str, offset: usize, text: &str) -> String {
    replace_span(
        source,
        Span {
            begin: offset,
            end: offset,
        },
        text,
    )
}

/// Remove the full lines covered by `span` (an entry's value object),
/// including the trailing comma and newline on the last line.
pub(crate) fn remove_entry_lines(source: &str, span: Span) -> String {
    let begin = line_start(source, span.begin);
    let end = line_end(source, span.end.saturating_sub(1));
    replace_span(source, Span { begin, end }, "")
}

// --- rendering of synthesized entries ---------------------------------------

/// Keywords that cannot appear as bare field names.
const KEYWORDS: &[&str] = &[
    "assert", "else", "error", "false", "for", "function", "if", "import", "importstr", "in",
    "local", "null", "self", "super", "tailstrict", "then", "true",
];

/// Quote a field name unless it is a valid bare identifier. Manifest entry
/// names (`guestbook-ui-0`) always need quoting.
pub(crate) fn quote_field_name(name: &str) -> String {
    let bare = !name.is_empty()
        && !KEYWORDS.contains(&name)
        && name
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false)
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if bare {
        name.to_string()
    } else {
        Json::String(name.to_string()).to_string()
    }
}

/// Render a parameter block: one sorted `key: value,` line per parameter,
/// with a leading newline. The caller appends the closing-brace indent.
pub(crate) fn write_params_block(params: &Params, indent: usize) -> String {
    let pad = " ".repeat(indent);
    let mut out = String::from("\n");
    for (key, value) in params {
        out.push_str(&format!("{pad}{}: {value},\n", quote_field_name(key)));
    }
    out
}

/// Render a complete component entry, ready to be inserted on its own lines.
/// `plus` selects the overlay form (`name +: {...}`).
pub(crate) fn render_entry(name: &str, params: &Params, plus: bool) -> String {
    let pad = " ".repeat(ENTRY_INDENT);
    let name = quote_field_name(name);
    let sep = if plus { " +:" } else { ":" };
    if params.is_empty() {
        return format!("{pad}{name}{sep} {{}},\n");
    }
    let body = write_params_block(params, FIELD_INDENT);
    format!("{pad}{name}{sep} {{{body}{pad}}},\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODULE_DOC: &str = r#"{
  global: {
    // shared values
  },
  components: {
    foo: {
      name: "foo",
      replicas: 1,
    },
  },
}"#;

    const ENV_DOC: &str = r#"local params = import "../../components/params.libsonnet";
params + {
  components +: {
    foo +: {
      replicas: 5,
    },
  },
}"#;

    #[test]
    fn test_parse_rejects_malformed_source() {
        let err = ParamsDoc::parse("params.libsonnet", "{ components: {").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_components_lookup() {
        let doc = ParamsDoc::parse("params.libsonnet", MODULE_DOC).unwrap();
        let components = doc.components().unwrap();
        assert_eq!(components.names(), vec!["foo".to_string()]);

        let span = components.entry("foo").unwrap().span().unwrap();
        assert!(MODULE_DOC[span.begin..].starts_with('{'));
        assert!(MODULE_DOC[..span.end].ends_with('}'));
    }

    #[test]
    fn test_components_requires_object_root() {
        let doc = ParamsDoc::parse("params.libsonnet", "[1, 2]").unwrap();
        assert!(matches!(doc.components(), Err(Error::Schema(_))));

        let doc = ParamsDoc::parse("params.libsonnet", "{ global: {} }").unwrap();
        assert!(matches!(doc.components(), Err(Error::Schema(_))));
    }

    #[test]
    fn test_entry_params_extracts_literals() {
        let doc = ParamsDoc::parse("params.libsonnet", MODULE_DOC).unwrap();
        let components = doc.components().unwrap();
        let params = components.entry("foo").unwrap().params().unwrap();
        assert_eq!(params.get("name"), Some(&ParamValue::Str("foo".into())));
        assert_eq!(params.get("replicas"), Some(&ParamValue::Num(1.0)));
    }

    #[test]
    fn test_entry_params_rejects_expressions() {
        let source = r#"{
  components: {
    foo: {
      replicas: $.global.replicas,
    },
  },
}"#;
        let doc = ParamsDoc::parse("params.libsonnet", source).unwrap();
        let err = doc
            .components()
            .unwrap()
            .entry("foo")
            .unwrap()
            .params()
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedValue { ref key, .. } if key == "replicas"));
    }

    #[test]
    fn test_entry_params_accepts_compound_literals() {
        let source = r#"{
  components: {
    foo: {
      ports: [80, 443],
      labels: { app: "foo" },
    },
  },
}"#;
        let doc = ParamsDoc::parse("params.libsonnet", source).unwrap();
        let params = doc
            .components()
            .unwrap()
            .entry("foo")
            .unwrap()
            .params()
            .unwrap();
        assert_eq!(
            params.get("ports"),
            Some(&ParamValue::Raw(serde_json::json!([80, 443])))
        );
        assert_eq!(
            params.get("labels"),
            Some(&ParamValue::Raw(serde_json::json!({"app": "foo"})))
        );
    }

    #[test]
    fn test_env_components_walks_overlay_shape() {
        let doc = ParamsDoc::parse("params.libsonnet", ENV_DOC).unwrap();
        let components = doc.env_components().unwrap();
        assert_eq!(components.names(), vec!["foo".to_string()]);
    }

    #[test]
    fn test_env_components_rejects_bad_schema() {
        let source = r#"local params = import "/fake/path";
params + {
  badobj +: {
  },
}"#;
        let doc = ParamsDoc::parse("params.libsonnet", source).unwrap();
        assert!(matches!(doc.env_components(), Err(Error::Schema(_))));
    }

    #[test]
    fn test_render_entry() {
        let mut params = Params::new();
        params.insert("replicas".into(), ParamValue::Num(5.0));
        params.insert("name".into(), ParamValue::Str("baz".into()));

        assert_eq!(
            render_entry("baz", &params, false),
            "    baz: {\n      name: \"baz\",\n      replicas: 5,\n    },\n"
        );
        assert_eq!(
            render_entry("baz", &Params::new(), true),
            "    baz +: {},\n"
        );
    }

    #[test]
    fn test_remove_entry_lines_takes_whole_lines() {
        let doc = ParamsDoc::parse("params.libsonnet", MODULE_DOC).unwrap();
        let span = doc
            .components()
            .unwrap()
            .entry("foo")
            .unwrap()
            .span()
            .unwrap();
        let out = remove_entry_lines(MODULE_DOC, span);
        assert!(!out.contains("foo"));
        assert!(out.contains("components: {\n  },"));
    }
}
