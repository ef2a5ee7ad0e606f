//! Serialization of [`Value`] trees back to JSON text.
//!
//! The output format mirrors what the control protocol emits on the wire:
//! `", "` between elements, `": "` between keys and values, and string
//! contents written verbatim (the wire subset carries no escape sequences,
//! see the parser module).

use super::value::Value;

/// Render `value` as JSON text.
pub fn to_string(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::UInt(n) => out.push_str(&n.to_string()),
        Value::Int(n) => out.push_str(&n.to_string()),
        Value::Str(s) => write_string(out, s),
        Value::Object(object) => {
            out.push('{');
            let mut first = true;
            for (key, value) in object {
                if !first {
                    out.push_str(", ");
                }
                first = false;
                write_string(out, key);
                out.push_str(": ");
                write_value(out, value);
            }
            out.push('}');
        }
        Value::Array(array) => {
            out.push('[');
            let mut first = true;
            for value in array {
                if !first {
                    out.push_str(", ");
                }
                first = false;
                write_value(out, value);
            }
            out.push(']');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    out.push_str(s);
    out.push('"');
}
