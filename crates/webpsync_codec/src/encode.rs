//! Re-serializer for decoded metadata trees.
//!
//! Length prefixes are recomputed from the current contents, so a string
//! edited in place comes back with a correct byte count while every
//! untouched node re-emits exactly the bytes it was decoded from.

use crate::value::Value;

/// Serialize a value back to the PHP `serialize()` text form.
pub fn encode(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("N;"),
        Value::Bool(false) => out.push_str("b:0;"),
        Value::Bool(true) => out.push_str("b:1;"),
        Value::Int(n) => {
            out.push_str("i:");
            out.push_str(&n.to_string());
            out.push(';');
        }
        Value::Float(raw) => {
            out.push_str("d:");
            out.push_str(raw);
            out.push(';');
        }
        Value::Str(s) => write_quoted(out, s),
        Value::Array(entries) => {
            out.push_str("a:");
            out.push_str(&entries.len().to_string());
            out.push_str(":{");
            write_entries(out, entries);
        }
        Value::Object { class, entries } => {
            out.push_str("O:");
            out.push_str(&class.len().to_string());
            out.push_str(":\"");
            out.push_str(class);
            out.push_str("\":");
            out.push_str(&entries.len().to_string());
            out.push_str(":{");
            write_entries(out, entries);
        }
    }
}

fn write_quoted(out: &mut String, s: &str) {
    out.push_str("s:");
    out.push_str(&s.len().to_string());
    out.push_str(":\"");
    out.push_str(s);
    out.push_str("\";");
}

fn write_entries(out: &mut String, entries: &[(Value, Value)]) {
    for (key, value) in entries {
        write_value(out, key);
        write_value(out, value);
    }
    out.push('}');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_scalars() {
        assert_eq!(encode(&Value::Null), "N;");
        assert_eq!(encode(&Value::Bool(true)), "b:1;");
        assert_eq!(encode(&Value::Int(-3)), "i:-3;");
        assert_eq!(encode(&Value::Float("4.5".into())), "d:4.5;");
        assert_eq!(encode(&Value::Str("abc".into())), "s:3:\"abc\";");
    }

    #[test]
    fn string_prefix_counts_bytes_not_chars() {
        assert_eq!(encode(&Value::Str("héllo".into())), "s:6:\"héllo\";");
    }

    #[test]
    fn prefix_tracks_edited_string() {
        let mut value = Value::Array(vec![(
            Value::Str("file".into()),
            Value::Str("2024/03/foo.jpg".into()),
        )]);
        value.set("file", Value::Str("2024/03/foo.webp".into()));
        assert_eq!(
            encode(&value),
            "a:1:{s:4:\"file\";s:16:\"2024/03/foo.webp\";}"
        );
    }

    #[test]
    fn encodes_nested_arrays() {
        let value = Value::Array(vec![
            (Value::Int(0), Value::Str("x".into())),
            (
                Value::Str("inner".into()),
                Value::Array(vec![(Value::Str("k".into()), Value::Int(1))]),
            ),
        ]);
        assert_eq!(
            encode(&value),
            "a:2:{i:0;s:1:\"x\";s:5:\"inner\";a:1:{s:1:\"k\";i:1;}}"
        );
    }

    #[test]
    fn encodes_objects() {
        let value = Value::Object {
            class: "stdClass".into(),
            entries: vec![(Value::Str("prop".into()), Value::Int(3))],
        };
        assert_eq!(encode(&value), "O:8:\"stdClass\":1:{s:4:\"prop\";i:3;}");
    }
}
