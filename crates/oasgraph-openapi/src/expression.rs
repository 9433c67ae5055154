//! Runtime expressions used by link parameter bindings.
//!
//! Supported forms:
//!
//! ```text
//! $url | $method | $statusCode
//! $request.body | $request.body#/<json-pointer>
//! $request.query.<name> | $request.path.<name> | $request.header.<name>
//! ```
//!
//! and the same five forms under `$response.`. A binding may also be a
//! template mixing literal text with `{<expression>}` spans.

use crate::error::{OpenApiError, Result};
use crate::state::CallRecord;
use serde_json::Value;
use std::str::FromStr;

/// Which side of a recorded call an expression reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Request,
    Response,
}

/// Where a named value lives in a request or response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Query,
    Path,
    Header,
}

/// A parsed runtime expression.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeExpression {
    Url,
    Method,
    StatusCode,
    Body {
        source: Source,
        /// JSON pointer without the leading `#`
        pointer: Option<String>,
    },
    Named {
        source: Source,
        location: Location,
        name: String,
    },
}

impl FromStr for RuntimeExpression {
    type Err = OpenApiError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || OpenApiError::RuntimeExpression(s.to_string());

        match s {
            "$url" => return Ok(Self::Url),
            "$method" => return Ok(Self::Method),
            "$statusCode" => return Ok(Self::StatusCode),
            _ => {}
        }

        let (source, rest) = if let Some(rest) = s.strip_prefix("$request.") {
            (Source::Request, rest)
        } else if let Some(rest) = s.strip_prefix("$response.") {
            (Source::Response, rest)
        } else {
            return Err(invalid());
        };

        if rest == "body" {
            return Ok(Self::Body {
                source,
                pointer: None,
            });
        }
        if let Some(pointer) = rest.strip_prefix("body#") {
            if !pointer.is_empty() && !pointer.starts_with('/') {
                return Err(invalid());
            }
            return Ok(Self::Body {
                source,
                pointer: Some(pointer.to_string()),
            });
        }

        let (location, name) = rest.split_once('.').ok_or_else(invalid)?;
        let location = match location {
            "query" => Location::Query,
            "path" => Location::Path,
            "header" => Location::Header,
            _ => return Err(invalid()),
        };
        if name.is_empty() {
            return Err(invalid());
        }

        Ok(Self::Named {
            source,
            location,
            name: name.to_string(),
        })
    }
}

impl RuntimeExpression {
    /// Evaluate against the call that produced `parent`.
    ///
    /// Missing values evaluate to `null`. Response-side query and path
    /// expressions name things a response does not have and fail.
    pub fn evaluate(&self, record: &CallRecord, parent: &Value) -> Result<Value> {
        let value = match self {
            Self::Url => Value::String(record.url.clone()),
            Self::Method => Value::String(record.method.clone()),
            Self::StatusCode => Value::from(record.status_code),
            Self::Body { source, pointer } => {
                let body = match source {
                    Source::Request => record.request_body.as_ref().unwrap_or(&Value::Null),
                    Source::Response => record.response_body.as_ref().unwrap_or(parent),
                };
                match pointer {
                    Some(pointer) => body.pointer(pointer).cloned().unwrap_or(Value::Null),
                    None => body.clone(),
                }
            }
            Self::Named {
                source: Source::Request,
                location,
                name,
            } => {
                let values = match location {
                    Location::Query => &record.request_query,
                    Location::Path => &record.request_path,
                    Location::Header => &record.request_headers,
                };
                lookup(values, name, *location == Location::Header)
            }
            Self::Named {
                source: Source::Response,
                location: Location::Header,
                name,
            } => lookup(&record.response_headers, name, true),
            Self::Named { .. } => {
                return Err(OpenApiError::RuntimeExpression(format!(
                    "{:?} cannot be read from a response",
                    self
                )));
            }
        };
        Ok(value)
    }
}

fn lookup(values: &indexmap::IndexMap<String, String>, name: &str, ignore_case: bool) -> Value {
    let found = if ignore_case {
        values
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    } else {
        values.get(name)
    };
    found.cloned().map(Value::String).unwrap_or(Value::Null)
}

/// One span of a template.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Text(String),
    Expression(RuntimeExpression),
}

/// A link parameter binding.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Literal(Value),
    Expression(RuntimeExpression),
    Template(Vec<TemplatePart>),
}

impl Binding {
    /// Parse a binding as declared in a link.
    ///
    /// Strings starting with `$` must be valid expressions; strings with
    /// `{...}` spans are templates whose spans must be valid expressions.
    pub fn parse(value: &Value) -> Result<Self> {
        let Value::String(s) = value else {
            return Ok(Self::Literal(value.clone()));
        };

        if s.contains('{') {
            return parse_template(s).map(Self::Template);
        }
        if s.starts_with('$') {
            return s.parse().map(Self::Expression);
        }
        Ok(Self::Literal(value.clone()))
    }

    pub fn evaluate(&self, record: &CallRecord, parent: &Value) -> Result<Value> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Expression(expression) => expression.evaluate(record, parent),
            Self::Template(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Text(text) => out.push_str(text),
                        TemplatePart::Expression(expression) => {
                            match expression.evaluate(record, parent)? {
                                Value::String(s) => out.push_str(&s),
                                Value::Null => {}
                                other => out.push_str(&other.to_string()),
                            }
                        }
                    }
                }
                Ok(Value::String(out))
            }
        }
    }
}

fn parse_template(template: &str) -> Result<Vec<TemplatePart>> {
    let mut parts = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        if start > 0 {
            parts.push(TemplatePart::Text(rest[..start].to_string()));
        }
        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .ok_or_else(|| OpenApiError::RuntimeExpression(template.to_string()))?;
        parts.push(TemplatePart::Expression(after[..end].trim().parse()?));
        rest = &after[end + 1..];
    }
    if !rest.is_empty() {
        parts.push(TemplatePart::Text(rest.to_string()));
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> CallRecord {
        let mut record = CallRecord {
            operation_id: "getItem".to_string(),
            url: "http://localhost/items/5".to_string(),
            method: "GET".to_string(),
            status_code: 200,
            response_body: Some(json!({"a": {"b": 7}, "id": "5"})),
            ..CallRecord::default()
        };
        record.request_path.insert("id".to_string(), "5".to_string());
        record
            .response_headers
            .insert("X-Rate-Limit".to_string(), "10".to_string());
        record
    }

    fn eval(expression: &str) -> Result<Value> {
        expression
            .parse::<RuntimeExpression>()?
            .evaluate(&record(), &Value::Null)
    }

    #[test]
    fn test_request_path_parameter() {
        assert_eq!(eval("$request.path.id").unwrap(), json!("5"));
    }

    #[test]
    fn test_response_body_pointer() {
        assert_eq!(eval("$response.body#/a/b").unwrap(), json!(7));
        assert_eq!(eval("$response.body#/missing").unwrap(), Value::Null);
    }

    #[test]
    fn test_call_metadata() {
        assert_eq!(eval("$url").unwrap(), json!("http://localhost/items/5"));
        assert_eq!(eval("$method").unwrap(), json!("GET"));
        assert_eq!(eval("$statusCode").unwrap(), json!(200));
        assert_eq!(eval("$response.header.x-rate-limit").unwrap(), json!("10"));
    }

    #[test]
    fn test_invalid_expressions() {
        for bad in ["$bogus", "$request.cookie.x", "$request.path.", "$response.bodyx", "$request.body#a"] {
            assert!(
                matches!(bad.parse::<RuntimeExpression>(), Err(OpenApiError::RuntimeExpression(_))),
                "{} should not parse",
                bad
            );
        }
        assert!(eval("$response.path.id").is_err());
    }

    #[test]
    fn test_binding_kinds() {
        assert_eq!(Binding::parse(&json!(3)).unwrap(), Binding::Literal(json!(3)));
        assert_eq!(
            Binding::parse(&json!("plain")).unwrap(),
            Binding::Literal(json!("plain"))
        );
        assert!(matches!(
            Binding::parse(&json!("$request.path.id")).unwrap(),
            Binding::Expression(_)
        ));
        assert!(Binding::parse(&json!("$bogus")).is_err());
        assert!(Binding::parse(&json!("x{$bogus}")).is_err());
        assert!(Binding::parse(&json!("x{$url")).is_err());
    }

    #[test]
    fn test_template_substitution() {
        let binding = Binding::parse(&json!("items/{$request.path.id}/v{$response.body#/a/b}")).unwrap();
        let value = binding.evaluate(&record(), &Value::Null).unwrap();
        assert_eq!(value, json!("items/5/v7"));
    }

    #[test]
    fn test_response_body_falls_back_to_parent() {
        let record = CallRecord::default();
        let expression: RuntimeExpression = "$response.body#/id".parse().unwrap();
        let value = expression.evaluate(&record, &json!({"id": 9})).unwrap();
        assert_eq!(value, json!(9));
    }
}
