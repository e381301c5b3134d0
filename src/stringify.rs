//! Literal serialization of resolved compile-time values.
//!
//! Dispatch order: response-like, then buffer-like, then the generic
//! encoder. The output is always a single expression, safe to splice in
//! place of the original call.

use crate::error::{TransformError, TransformResult};
use crate::value::{Node, NodeId, ResponseParts, Value};

/// Serializes a resolved value into source text that evaluates back to an
/// equivalent value.
pub fn stringify_value(value: &Value) -> TransformResult<String> {
    match value.root_node() {
        Node::Response(parts) => Ok(response_literal(parts)),
        Node::Bytes(bytes) => Ok(format!("Buffer.from({})", byte_array_literal(bytes))),
        _ => uneval(value),
    }
}

fn response_literal(parts: &ResponseParts) -> String {
    let headers = parts
        .headers
        .iter()
        .map(|(name, value)| format!("[{},{}]", string_literal(name), string_literal(value)))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "new Response({}.buffer, {{ status: {}, headers: [{}] }})",
        byte_array_literal(&parts.body),
        parts.status,
        headers
    )
}

fn byte_array_literal(bytes: &[u8]) -> String {
    let body = bytes
        .iter()
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!("new Uint8Array([{}])", body)
}

// ═══════════════════════════════════════════════════════════════════════════════
// GENERIC ENCODER
// ═══════════════════════════════════════════════════════════════════════════════

/// Encodes a value graph as a plain expression. Array and object nodes that
/// are shared or take part in a cycle are hoisted into the parameters of a
/// wrapping closure and filled in with assignments before the root is
/// returned, so evaluation reconstructs the exact reference structure.
pub fn uneval(value: &Value) -> TransformResult<String> {
    let mut counts = vec![0usize; value.len()];
    let mut state = vec![0u8; value.len()];
    let mut cyclic = vec![false; value.len()];
    let mut order: Vec<NodeId> = Vec::new();
    mark(value, value.root(), &mut counts, &mut state, &mut cyclic, &mut order);

    let hoisted: Vec<NodeId> = order
        .iter()
        .copied()
        .filter(|&id| {
            matches!(value.node(id), Node::Array(_) | Node::Object(_))
                && (counts[id] > 1 || cyclic[id])
        })
        .collect();

    if hoisted.is_empty() {
        return emit(value, value.root(), &hoisted);
    }

    let name_of = |id: NodeId| -> String {
        let index = hoisted.iter().position(|&h| h == id).unwrap();
        hoist_name(index)
    };

    let mut params = Vec::with_capacity(hoisted.len());
    let mut inits = Vec::with_capacity(hoisted.len());
    let mut statements = String::new();
    for &id in &hoisted {
        let name = name_of(id);
        match value.node(id) {
            Node::Array(items) => {
                inits.push("[]".to_string());
                for (index, child) in items.iter().enumerate() {
                    statements.push_str(&format!(
                        "{}[{}]={};",
                        name,
                        index,
                        emit(value, *child, &hoisted)?
                    ));
                }
            }
            Node::Object(entries) => {
                inits.push("{}".to_string());
                for (key, child) in entries {
                    statements.push_str(&format!(
                        "{}{}={};",
                        name,
                        member_accessor(key),
                        emit(value, *child, &hoisted)?
                    ));
                }
            }
            _ => unreachable!("only containers are hoisted"),
        }
        params.push(name);
    }

    Ok(format!(
        "(function({}){{{}return {}}})({})",
        params.join(","),
        statements,
        emit(value, value.root(), &hoisted)?,
        inits.join(",")
    ))
}

fn mark(
    value: &Value,
    id: NodeId,
    counts: &mut [usize],
    state: &mut [u8],
    cyclic: &mut [bool],
    order: &mut Vec<NodeId>,
) {
    counts[id] += 1;
    match state[id] {
        1 => {
            // Back edge: the target is on the current path.
            cyclic[id] = true;
            return;
        }
        2 => return,
        _ => {}
    }
    state[id] = 1;
    order.push(id);
    match value.node(id) {
        Node::Array(items) => {
            for child in items.clone() {
                mark(value, child, counts, state, cyclic, order);
            }
        }
        Node::Object(entries) => {
            for (_, child) in entries.clone() {
                mark(value, child, counts, state, cyclic, order);
            }
        }
        _ => {}
    }
    state[id] = 2;
}

fn emit(value: &Value, id: NodeId, hoisted: &[NodeId]) -> TransformResult<String> {
    if let Some(index) = hoisted.iter().position(|&h| h == id) {
        return Ok(hoist_name(index));
    }
    match value.node(id) {
        Node::Undefined => Ok("void 0".to_string()),
        Node::Null => Ok("null".to_string()),
        Node::Bool(b) => Ok(b.to_string()),
        Node::Number(n) => Ok(number_literal(*n)),
        Node::String(s) => Ok(string_literal(s)),
        Node::Bytes(bytes) => Ok(byte_array_literal(bytes)),
        Node::Response(_) => Err(TransformError::serialization(
            "response values are only supported as a top-level result",
        )),
        Node::Array(items) => {
            let parts = items
                .iter()
                .map(|child| emit(value, *child, hoisted))
                .collect::<TransformResult<Vec<_>>>()?;
            Ok(format!("[{}]", parts.join(",")))
        }
        Node::Object(entries) => {
            let parts = entries
                .iter()
                .map(|(key, child)| {
                    Ok(format!(
                        "{}:{}",
                        object_key(key),
                        emit(value, *child, hoisted)?
                    ))
                })
                .collect::<TransformResult<Vec<_>>>()?;
            Ok(format!("{{{}}}", parts.join(",")))
        }
    }
}

fn hoist_name(index: usize) -> String {
    let letter = (b'a' + (index % 26) as u8) as char;
    if index < 26 {
        letter.to_string()
    } else {
        format!("{}{}", letter, index / 26)
    }
}

fn number_literal(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n == f64::INFINITY {
        "Infinity".to_string()
    } else if n == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else if n == 0.0 && n.is_sign_negative() {
        "-0".to_string()
    } else {
        format!("{}", n)
    }
}

fn object_key(key: &str) -> String {
    if is_valid_identifier(key) {
        key.to_string()
    } else {
        string_literal(key)
    }
}

fn member_accessor(key: &str) -> String {
    if is_valid_identifier(key) {
        format!(".{}", key)
    } else {
        format!("[{}]", string_literal(key))
    }
}

pub(crate) fn string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            // Keeps the literal safe to inline into a <script> block.
            '<' => out.push_str("\\u003C"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Check if a string is a valid JavaScript identifier.
pub(crate) fn is_valid_identifier(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    for c in chars {
        if !c.is_ascii_alphanumeric() && c != '_' && c != '$' {
            return false;
        }
    }
    true
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
use napi_derive::napi;

#[cfg(feature = "napi")]
#[napi]
pub fn serialize_value_native(value: serde_json::Value) -> napi::Result<String> {
    stringify_value(&Value::from_json(&value)).map_err(|e| napi::Error::from_reason(e.to_string()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_allocator::Allocator;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    fn assert_single_expression(literal: &str) {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, literal, SourceType::default()).parse_expression();
        assert!(ret.is_ok(), "not a single expression: {}", literal);
    }

    #[test]
    fn test_primitives() {
        assert_eq!(uneval(&Value::undefined()).unwrap(), "void 0");
        assert_eq!(uneval(&Value::null()).unwrap(), "null");
        assert_eq!(uneval(&Value::bool(true)).unwrap(), "true");
        assert_eq!(uneval(&Value::number(1.0)).unwrap(), "1");
        assert_eq!(uneval(&Value::number(1.5)).unwrap(), "1.5");
        assert_eq!(uneval(&Value::number(f64::NAN)).unwrap(), "NaN");
        assert_eq!(uneval(&Value::number(-0.0)).unwrap(), "-0");
        assert_eq!(uneval(&Value::number(f64::INFINITY)).unwrap(), "Infinity");
        assert_eq!(uneval(&Value::string("foo")).unwrap(), "\"foo\"");
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(uneval(&Value::string("a\"b\n")).unwrap(), "\"a\\\"b\\n\"");
        assert_eq!(
            uneval(&Value::string("</script>")).unwrap(),
            "\"\\u003C/script>\""
        );
    }

    #[test]
    fn test_nested_data() {
        let value = Value::object(vec![
            ("a", Value::string("a")),
            ("num", Value::number(3.0)),
            ("list", Value::array(vec![Value::number(1.0), Value::undefined()])),
            ("key with space", Value::null()),
        ]);
        let literal = uneval(&value).unwrap();
        assert_eq!(
            literal,
            "{a:\"a\",num:3,list:[1,void 0],\"key with space\":null}"
        );
        assert_single_expression(&literal);
    }

    #[test]
    fn test_shared_reference_is_hoisted() {
        let mut builder = Value::builder();
        let shared = builder.push_object();
        let one = builder.push(Node::Number(1.0));
        builder.object_set(shared, "n", one);
        let list = builder.push_array();
        builder.array_push(list, shared);
        builder.array_push(list, shared);
        let value = builder.finish(list);

        let literal = uneval(&value).unwrap();
        assert_eq!(literal, "(function(a){a.n=1;return [a,a]})({})");
        assert_single_expression(&literal);
    }

    #[test]
    fn test_cycle_is_hoisted() {
        let mut builder = Value::builder();
        let node = builder.push_object();
        builder.object_set(node, "self", node);
        let value = builder.finish(node);

        let literal = uneval(&value).unwrap();
        assert_eq!(literal, "(function(a){a.self=a;return a})({})");
        assert_single_expression(&literal);
    }

    #[test]
    fn test_buffer_dispatch() {
        let literal = stringify_value(&Value::bytes(b"hi".to_vec())).unwrap();
        assert_eq!(literal, "Buffer.from(new Uint8Array([104,105]))");
        assert_single_expression(&literal);
    }

    #[test]
    fn test_response_dispatch() {
        let value = Value::response(
            200,
            vec![("content-type".to_string(), "application/json".to_string())],
            b"hi".to_vec(),
        );
        let literal = stringify_value(&value).unwrap();
        assert_eq!(
            literal,
            "new Response(new Uint8Array([104,105]).buffer, { status: 200, headers: [[\"content-type\",\"application/json\"]] })"
        );
        assert_single_expression(&literal);
    }

    #[test]
    fn test_nested_response_is_rejected() {
        let value = Value::object(vec![("res", Value::response(200, vec![], vec![]))]);
        assert!(matches!(
            stringify_value(&value),
            Err(crate::error::TransformError::Serialization { .. })
        ));
    }
}
