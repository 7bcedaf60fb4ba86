//! Decoded form of a PHP-serialized value.

/// One node of a decoded PHP value tree.
///
/// Arrays are kept as entry vectors rather than maps: PHP arrays are
/// ordered, keys may be strings or integers, and re-encoding must preserve
/// the original entry order exactly.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    /// Raw source text between `d:` and `;`. PHP emits floats with its own
    /// precision rules; keeping the text is the only way untouched values
    /// re-encode byte-for-byte.
    Float(String),
    Str(String),
    Array(Vec<(Value, Value)>),
    Object {
        class: String,
        entries: Vec<(Value, Value)>,
    },
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Entries of an array value, `None` for scalars and objects.
    pub fn entries(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Array(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn entries_mut(&mut self) -> Option<&mut Vec<(Value, Value)>> {
        match self {
            Value::Array(entries) => Some(entries),
            _ => None,
        }
    }

    /// Look up an array entry by string key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries_mut()?
            .iter_mut()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    /// Replace the value of an existing string-keyed entry.
    ///
    /// Returns false (and changes nothing) when the key is absent or the
    /// receiver is not an array: mutations here are edits of recorded
    /// fields, never additions that would change the structure's shape.
    pub fn set(&mut self, key: &str, value: Value) -> bool {
        match self.get_mut(key) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}
