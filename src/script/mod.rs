//! Uniform, read-only view over guest runtime values.
//!
//! Every guest value crossing into host code is wrapped by [`ScriptValue::new`],
//! which inspects the value once and picks the variant. Member and element
//! access go back through the same factory, so nested values are wrapped the
//! same way no matter how deep they sit. A `ScriptValue` borrows (or otherwise
//! cheaply refers to) the guest value; it is a per-call view and should not be
//! kept past the runtime turn that produced it.

pub mod convert;
pub mod guest;

use std::collections::BTreeSet;
use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

pub use convert::to_js_value;
pub use guest::{GuestKind, GuestValue};

use convert::{number_to_json, Converter};

pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeError {
    TypeMismatch {
        expected: GuestKind,
        actual: GuestKind,
    },
    DepthExceeded {
        limit: usize,
    },
    Conversion(String),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::TypeMismatch { expected, actual } => {
                write!(f, "type mismatch: expected {expected}, found {actual}")
            }
            BridgeError::DepthExceeded { limit } => {
                write!(f, "value nesting exceeds the conversion depth limit of {limit}")
            }
            BridgeError::Conversion(message) => write!(f, "conversion failed: {message}"),
        }
    }
}

impl std::error::Error for BridgeError {}

/// Opaque handle to a guest container or function. Never handed out raw.
#[derive(Clone, Debug)]
pub struct GuestRef<G>(G);

#[derive(Clone, Debug)]
pub enum ScriptValue<G> {
    Object(GuestRef<G>),
    Array(GuestRef<G>),
    Function(GuestRef<G>),
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
    Undefined,
}

impl<G: GuestValue> ScriptValue<G> {
    pub fn new(handle: G) -> Self {
        match handle.kind() {
            GuestKind::Object => ScriptValue::Object(GuestRef(handle)),
            GuestKind::Array => ScriptValue::Array(GuestRef(handle)),
            GuestKind::Function => ScriptValue::Function(GuestRef(handle)),
            GuestKind::String => ScriptValue::String(handle.as_string().unwrap_or_default()),
            GuestKind::Number => ScriptValue::Number(handle.as_number().unwrap_or(f64::NAN)),
            GuestKind::Boolean => ScriptValue::Boolean(handle.as_boolean().unwrap_or(false)),
            GuestKind::Null => ScriptValue::Null,
            GuestKind::Undefined => ScriptValue::Undefined,
        }
    }

    pub fn kind(&self) -> GuestKind {
        match self {
            ScriptValue::Object(_) => GuestKind::Object,
            ScriptValue::Array(_) => GuestKind::Array,
            ScriptValue::Function(_) => GuestKind::Function,
            ScriptValue::String(_) => GuestKind::String,
            ScriptValue::Number(_) => GuestKind::Number,
            ScriptValue::Boolean(_) => GuestKind::Boolean,
            ScriptValue::Null => GuestKind::Null,
            ScriptValue::Undefined => GuestKind::Undefined,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, ScriptValue::Object(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, ScriptValue::Array(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, ScriptValue::Function(_))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, ScriptValue::Null | ScriptValue::Undefined)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScriptValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScriptValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn get_keys(&self) -> Result<BTreeSet<String>, BridgeError> {
        Ok(self.object_handle()?.keys().into_iter().collect())
    }

    /// `false` for anything that is not an object.
    pub fn has_member(&self, key: &str) -> bool {
        match self {
            ScriptValue::Object(GuestRef(handle)) => handle.has_member(key),
            _ => false,
        }
    }

    /// A missing key reads as `Undefined`, as it would inside the script.
    pub fn get_member(&self, key: &str) -> Result<ScriptValue<G>, BridgeError> {
        Ok(self
            .object_handle()?
            .member(key)
            .map(ScriptValue::new)
            .unwrap_or(ScriptValue::Undefined))
    }

    pub fn get_elements(&self) -> Result<Vec<ScriptValue<G>>, BridgeError> {
        match self {
            ScriptValue::Array(GuestRef(handle)) => {
                Ok(handle.elements().into_iter().map(ScriptValue::new).collect())
            }
            other => Err(BridgeError::TypeMismatch {
                expected: GuestKind::Array,
                actual: other.kind(),
            }),
        }
    }

    pub fn get_map(&self) -> Result<Map<String, Value>, BridgeError> {
        self.get_map_with_depth(DEFAULT_MAX_DEPTH)
    }

    pub fn get_map_with_depth(&self, max_depth: usize) -> Result<Map<String, Value>, BridgeError> {
        let handle = self.object_handle()?;
        match Converter::new(max_depth).convert(handle, 0)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }

    /// Host-native form of any variant. Functions and `undefined` become `null`.
    pub fn to_json(&self) -> Result<Value, BridgeError> {
        self.to_json_with_depth(DEFAULT_MAX_DEPTH)
    }

    pub fn to_json_with_depth(&self, max_depth: usize) -> Result<Value, BridgeError> {
        match self {
            ScriptValue::Object(GuestRef(handle)) | ScriptValue::Array(GuestRef(handle)) => {
                Converter::new(max_depth).convert(handle, 0)
            }
            ScriptValue::Function(_) | ScriptValue::Null | ScriptValue::Undefined => Ok(Value::Null),
            ScriptValue::String(s) => Ok(Value::String(s.clone())),
            ScriptValue::Number(n) => Ok(number_to_json(*n)),
            ScriptValue::Boolean(b) => Ok(Value::Bool(*b)),
        }
    }

    /// Converts into a host type through its serde representation.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, BridgeError> {
        let json = self.to_json()?;
        serde_json::from_value(json).map_err(|err| BridgeError::Conversion(err.to_string()))
    }

    fn object_handle(&self) -> Result<&G, BridgeError> {
        match self {
            ScriptValue::Object(GuestRef(handle)) => Ok(handle),
            other => Err(BridgeError::TypeMismatch {
                expected: GuestKind::Object,
                actual: other.kind(),
            }),
        }
    }
}
