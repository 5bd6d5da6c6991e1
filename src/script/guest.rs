use std::fmt;

use quick_js::JsValue;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GuestKind {
    Object,
    Array,
    Function,
    String,
    Number,
    Boolean,
    Null,
    Undefined,
}

impl GuestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuestKind::Object => "object",
            GuestKind::Array => "array",
            GuestKind::Function => "function",
            GuestKind::String => "string",
            GuestKind::Number => "number",
            GuestKind::Boolean => "boolean",
            GuestKind::Null => "null",
            GuestKind::Undefined => "undefined",
        }
    }
}

impl fmt::Display for GuestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read access to a value owned by a guest runtime.
///
/// Implementations are cheap handles (usually borrows) into the runtime's own
/// representation; cloning a handle never copies the underlying value.
pub trait GuestValue: Clone {
    fn kind(&self) -> GuestKind;

    /// Own enumerable keys. Empty for anything but objects.
    fn keys(&self) -> Vec<String>;

    fn member(&self, key: &str) -> Option<Self>;

    fn has_member(&self, key: &str) -> bool {
        self.member(key).is_some()
    }

    /// Elements in index order. Empty for anything but arrays.
    fn elements(&self) -> Vec<Self>;

    fn as_string(&self) -> Option<String>;

    fn as_number(&self) -> Option<f64>;

    fn as_boolean(&self) -> Option<bool>;

    /// Stable identity of a heap value, for runtimes whose object graphs can
    /// contain cycles. Tree-shaped representations return `None`.
    fn identity(&self) -> Option<usize> {
        None
    }
}

impl<'a> GuestValue for &'a JsValue {
    fn kind(&self) -> GuestKind {
        match self {
            JsValue::Undefined => GuestKind::Undefined,
            JsValue::Null => GuestKind::Null,
            JsValue::Bool(_) => GuestKind::Boolean,
            JsValue::Int(_) | JsValue::Float(_) => GuestKind::Number,
            JsValue::String(_) => GuestKind::String,
            JsValue::Array(_) => GuestKind::Array,
            JsValue::Object(_) => GuestKind::Object,
            JsValue::__NonExhaustive => GuestKind::Undefined,
        }
    }

    fn keys(&self) -> Vec<String> {
        match self {
            JsValue::Object(map) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    fn member(&self, key: &str) -> Option<Self> {
        match *self {
            JsValue::Object(map) => map.get(key),
            _ => None,
        }
    }

    fn elements(&self) -> Vec<Self> {
        match *self {
            JsValue::Array(items) => items.iter().collect(),
            _ => Vec::new(),
        }
    }

    fn as_string(&self) -> Option<String> {
        match self {
            JsValue::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            JsValue::Int(n) => Some(f64::from(*n)),
            JsValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn as_boolean(&self) -> Option<bool> {
        match self {
            JsValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Host JSON viewed as a guest value; lets host data travel through the same
/// bridge as runtime values.
impl<'a> GuestValue for &'a Value {
    fn kind(&self) -> GuestKind {
        match self {
            Value::Null => GuestKind::Null,
            Value::Bool(_) => GuestKind::Boolean,
            Value::Number(_) => GuestKind::Number,
            Value::String(_) => GuestKind::String,
            Value::Array(_) => GuestKind::Array,
            Value::Object(_) => GuestKind::Object,
        }
    }

    fn keys(&self) -> Vec<String> {
        match self {
            Value::Object(map) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    fn member(&self, key: &str) -> Option<Self> {
        match *self {
            Value::Object(map) => map.get(key),
            _ => None,
        }
    }

    fn elements(&self) -> Vec<Self> {
        match *self {
            Value::Array(items) => items.iter().collect(),
            _ => Vec::new(),
        }
    }

    fn as_string(&self) -> Option<String> {
        Value::as_str(self).map(str::to_string)
    }

    fn as_number(&self) -> Option<f64> {
        Value::as_f64(self)
    }

    fn as_boolean(&self) -> Option<bool> {
        Value::as_bool(self)
    }
}
