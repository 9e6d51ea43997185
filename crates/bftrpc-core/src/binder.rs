//! Argument binding: wire params -> typed call arguments.
//!
//! JSON-RPC params arrive as a mapping or a sequence and are decoded
//! structurally. HTTP path calls carry every argument as a query string, so a
//! single text value has to be told apart as an integer literal, a hex blob, a
//! quoted string, or a JSON literal using nothing but the target type.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::BindError;
use crate::param::{ArgValue, TypeTag};
use crate::registry::{BoundArgs, FunctionDescriptor};

static INT_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]+$").expect("integer literal pattern is valid"));

// ==============================================================================
// JSON Params
// ==============================================================================

/// Bind JSON-RPC `params` (mapping, sequence, or absent) against `descriptor`.
pub fn bind_json_params(
    descriptor: &FunctionDescriptor,
    params: &Value,
) -> Result<BoundArgs, BindError> {
    let args = match params {
        Value::Object(map) => map_args(descriptor, map),
        Value::Array(items) => sequence_args(descriptor, items)?,
        Value::Null => vec![ArgValue::Absent; descriptor.arg_names().len()],
        other => return Err(BindError::ParamsShape(json_kind(other))),
    };
    bind(descriptor, args)
}

fn map_args(descriptor: &FunctionDescriptor, params: &Map<String, Value>) -> Vec<ArgValue> {
    descriptor
        .arg_names()
        .iter()
        .map(|name| match params.get(name) {
            Some(value) if !value.is_null() => ArgValue::Json(value.clone()),
            _ => ArgValue::Absent,
        })
        .collect()
}

fn sequence_args(
    descriptor: &FunctionDescriptor,
    params: &[Value],
) -> Result<Vec<ArgValue>, BindError> {
    let names = descriptor.arg_names();
    if params.len() != names.len() {
        return Err(BindError::ParamCount {
            expected: names.len(),
            got: params.len(),
            names: names.to_vec(),
        });
    }
    Ok(params.iter().cloned().map(ArgValue::Json).collect())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ==============================================================================
// Query-String Params
// ==============================================================================

/// Bind URL query parameters of an HTTP path call against `descriptor`.
pub fn bind_query_params(
    descriptor: &FunctionDescriptor,
    query: &HashMap<String, String>,
) -> Result<BoundArgs, BindError> {
    let args = descriptor
        .params()
        .map(|(name, tag)| match query.get(name).map(String::as_str) {
            None | Some("") => Ok(ArgValue::Absent),
            Some(raw) => query_arg(tag, raw),
        })
        .collect::<Result<Vec<_>, _>>()?;
    bind(descriptor, args)
}

/// Resolve one non-empty query value against its target type.
pub fn query_arg(tag: &TypeTag, raw: &str) -> Result<ArgValue, BindError> {
    // Optional targets run the heuristics against the pointee; the
    // `Option` impl of `Param` wraps whatever is produced.
    let target = tag.pointee();

    if target.is_numeric() && INT_LITERAL.is_match(raw) {
        return integer_literal(raw).map(ArgValue::Json);
    }

    if let Some(hex_digits) = strip_hex_prefix(raw) {
        return match target {
            TypeTag::Bytes | TypeTag::String => Ok(ArgValue::Bytes(hex::decode(hex_digits)?)),
            _ => Err(BindError::HexTarget(tag.clone())),
        };
    }

    if *target == TypeTag::Bytes && is_quoted(raw) {
        let text: String = serde_json::from_str(raw)?;
        return Ok(ArgValue::Bytes(text.into_bytes()));
    }

    Ok(ArgValue::Json(serde_json::from_str(raw)?))
}

/// Integers are taken with quoted-integer semantics: `007` is seven.
fn integer_literal(raw: &str) -> Result<Value, BindError> {
    let parsed = if raw.starts_with('-') {
        raw.parse::<i64>().map(Value::from)
    } else {
        raw.parse::<u64>().map(Value::from)
    };
    parsed.map_err(|_| BindError::Integer(raw.to_owned()))
}

fn strip_hex_prefix(raw: &str) -> Option<&str> {
    raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X"))
}

fn is_quoted(raw: &str) -> bool {
    raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"')
}

fn bind(descriptor: &FunctionDescriptor, args: Vec<ArgValue>) -> Result<BoundArgs, BindError> {
    descriptor.handler().bind(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{call, test_registry};
    use crate::types::Bytes;
    use serde_json::json;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn integer_literals_bind_to_numeric_targets() {
        assert_eq!(query_arg(&TypeTag::Int, "-42").expect("bind"), ArgValue::Json(json!(-42)));
        assert_eq!(query_arg(&TypeTag::Uint, "007").expect("bind"), ArgValue::Json(json!(7)));
        assert!(matches!(
            query_arg(&TypeTag::Int, "99999999999999999999"),
            Err(BindError::Integer(_))
        ));
    }

    #[test]
    fn integer_literals_for_string_targets_fall_through_to_json() {
        // `5` is a JSON number, which a string target rejects.
        assert!(matches!(
            query_arg(&TypeTag::String, "5"),
            Ok(ArgValue::Json(Value::Number(_)))
        ));
    }

    #[test]
    fn hex_values_decode_into_bytes() {
        assert_eq!(
            query_arg(&TypeTag::Bytes, "0x68656c6c6f").expect("bind"),
            ArgValue::Bytes(b"hello".to_vec())
        );
        assert_eq!(
            query_arg(&TypeTag::String, "0X6869").expect("bind"),
            ArgValue::Bytes(b"hi".to_vec())
        );
    }

    #[test]
    fn hex_values_for_other_targets_fail() {
        let err = query_arg(&TypeTag::Bool, "0x01").expect_err("bool rejects hex");
        assert!(matches!(err, BindError::HexTarget(TypeTag::Bool)));
        assert!(err.to_string().contains("non-byte/non-string"));
        assert!(matches!(
            query_arg(&TypeTag::Bytes, "0xzz"),
            Err(BindError::Hex(_))
        ));
    }

    #[test]
    fn quoted_strings_bind_to_bytes() {
        assert_eq!(
            query_arg(&TypeTag::Bytes, "\"abc\"").expect("bind"),
            ArgValue::Bytes(b"abc".to_vec())
        );
    }

    #[test]
    fn everything_else_is_a_json_literal() {
        assert_eq!(
            query_arg(&TypeTag::String, "\"abc\"").expect("bind"),
            ArgValue::Json(json!("abc"))
        );
        assert_eq!(query_arg(&TypeTag::Bool, "true").expect("bind"), ArgValue::Json(json!(true)));
        assert!(matches!(
            query_arg(&TypeTag::String, "abc"),
            Err(BindError::Decode(_))
        ));
    }

    #[test]
    fn optional_targets_use_the_pointee() {
        let tag = TypeTag::Optional(Box::new(TypeTag::Bytes));
        assert_eq!(
            query_arg(&tag, "0x00ff").expect("bind"),
            ArgValue::Bytes(vec![0x00, 0xff])
        );
        let tag = TypeTag::Optional(Box::new(TypeTag::Int));
        assert_eq!(query_arg(&tag, "12").expect("bind"), ArgValue::Json(json!(12)));
    }

    #[tokio::test]
    async fn hex_query_arg_reaches_handler_as_bytes() {
        let registry = test_registry();
        let descriptor = registry.lookup("echo_bytes").expect("registered");
        let args = bind_query_params(descriptor, &query(&[("arg", "0x68656c6c6f")]))
            .expect("bind");
        let result = call(descriptor, args).await;
        let bytes: Bytes = serde_json::from_value(result).expect("bytes result");
        assert_eq!(bytes.as_slice(), b"hello");
    }

    #[tokio::test]
    async fn missing_and_empty_query_values_take_zero_values() {
        let registry = test_registry();
        let descriptor = registry.lookup("pair").expect("registered");
        let args = bind_query_params(descriptor, &query(&[("name", "")])).expect("bind");
        assert_eq!(call(descriptor, args).await, json!(["", 0]));
    }

    #[tokio::test]
    async fn mapping_params_bind_by_name_with_zero_defaults() {
        let registry = test_registry();
        let descriptor = registry.lookup("pair").expect("registered");

        let args = bind_json_params(descriptor, &json!({"count": 3})).expect("bind");
        assert_eq!(call(descriptor, args).await, json!(["", 3]));

        let args =
            bind_json_params(descriptor, &json!({"name": "x", "count": null, "extra": 1}))
                .expect("bind");
        assert_eq!(call(descriptor, args).await, json!(["x", 0]));
    }

    #[tokio::test]
    async fn sequence_params_bind_positionally() {
        let registry = test_registry();
        let descriptor = registry.lookup("pair").expect("registered");
        let args = bind_json_params(descriptor, &json!(["y", 9])).expect("bind");
        assert_eq!(call(descriptor, args).await, json!(["y", 9]));
    }

    #[test]
    fn sequence_length_must_match() {
        let registry = test_registry();
        let descriptor = registry.lookup("pair").expect("registered");
        let err = bind_json_params(descriptor, &json!(["only-one"])).expect_err("count mismatch");
        assert!(matches!(err, BindError::ParamCount { expected: 2, got: 1, .. }));
        assert!(err.to_string().contains("parameter count mismatch"));
    }

    #[test]
    fn mistyped_mapping_values_fail() {
        let registry = test_registry();
        let descriptor = registry.lookup("pair").expect("registered");
        let err = bind_json_params(descriptor, &json!({"count": "many"})).expect_err("bad type");
        assert!(matches!(err, BindError::Decode(_)));
    }

    #[test]
    fn scalar_params_are_rejected() {
        let registry = test_registry();
        let descriptor = registry.lookup("pair").expect("registered");
        let err = bind_json_params(descriptor, &json!(5)).expect_err("scalar params");
        assert!(matches!(err, BindError::ParamsShape("number")));
    }

    #[tokio::test]
    async fn absent_params_bind_zero_values() {
        let registry = test_registry();
        let descriptor = registry.lookup("pair").expect("registered");
        let args = bind_json_params(descriptor, &Value::Null).expect("bind");
        assert_eq!(call(descriptor, args).await, json!(["", 0]));
    }
}
