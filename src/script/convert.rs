use std::collections::HashMap;

use quick_js::JsValue;
use serde_json::{Map, Number, Value};

use super::guest::{GuestKind, GuestValue};
use super::BridgeError;

// 2^53: beyond this an f64 no longer holds every integer exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Eager guest-to-host conversion. Tracks the identities of the containers
/// currently being walked so a back-reference becomes `null` instead of
/// recursing forever; the depth cap covers runtimes without identities.
pub(crate) struct Converter {
    max_depth: usize,
    active: Vec<usize>,
}

impl Converter {
    pub(crate) fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            active: Vec::new(),
        }
    }

    pub(crate) fn convert<G: GuestValue>(
        &mut self,
        handle: &G,
        depth: usize,
    ) -> Result<Value, BridgeError> {
        let kind = handle.kind();
        match kind {
            GuestKind::Object | GuestKind::Array => {
                if !self.enter(handle, depth)? {
                    return Ok(Value::Null);
                }
                let result = if kind == GuestKind::Object {
                    self.object(handle, depth).map(Value::Object)
                } else {
                    self.array(handle, depth).map(Value::Array)
                };
                self.leave(handle);
                result
            }
            GuestKind::String => Ok(Value::String(handle.as_string().unwrap_or_default())),
            GuestKind::Number => Ok(number_to_json(handle.as_number().unwrap_or(f64::NAN))),
            GuestKind::Boolean => Ok(Value::Bool(handle.as_boolean().unwrap_or(false))),
            GuestKind::Function | GuestKind::Null | GuestKind::Undefined => Ok(Value::Null),
        }
    }

    fn enter<G: GuestValue>(&mut self, handle: &G, depth: usize) -> Result<bool, BridgeError> {
        if depth >= self.max_depth {
            return Err(BridgeError::DepthExceeded {
                limit: self.max_depth,
            });
        }
        match handle.identity() {
            Some(id) if self.active.contains(&id) => Ok(false),
            Some(id) => {
                self.active.push(id);
                Ok(true)
            }
            None => Ok(true),
        }
    }

    fn leave<G: GuestValue>(&mut self, handle: &G) {
        if handle.identity().is_some() {
            self.active.pop();
        }
    }

    fn object<G: GuestValue>(
        &mut self,
        handle: &G,
        depth: usize,
    ) -> Result<Map<String, Value>, BridgeError> {
        let mut map = Map::new();
        for key in handle.keys() {
            let value = match handle.member(&key) {
                Some(member) => self.convert(&member, depth + 1)?,
                None => Value::Null,
            };
            map.insert(key, value);
        }
        Ok(map)
    }

    fn array<G: GuestValue>(&mut self, handle: &G, depth: usize) -> Result<Vec<Value>, BridgeError> {
        handle
            .elements()
            .iter()
            .map(|item| self.convert(item, depth + 1))
            .collect()
    }
}

/// Integral values inside the safe range become JSON integers; NaN and the
/// infinities have no JSON form and become `null`.
pub(crate) fn number_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER {
        return Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

/// Host-to-guest conversion, used to hand host data to a script.
pub fn to_js_value(value: &Value) -> JsValue {
    match value {
        Value::Null => JsValue::Null,
        Value::Bool(b) => JsValue::Bool(*b),
        Value::Number(num) => {
            if let Some(int_val) = num.as_i64() {
                if let Ok(as_i32) = i32::try_from(int_val) {
                    return JsValue::Int(as_i32);
                }
                return JsValue::Float(int_val as f64);
            }
            if let Some(f) = num.as_f64() {
                return JsValue::Float(f);
            }
            JsValue::Null
        }
        Value::String(s) => JsValue::String(s.clone()),
        Value::Array(items) => JsValue::Array(items.iter().map(to_js_value).collect()),
        Value::Object(map) => {
            let mut entries: HashMap<String, JsValue> = HashMap::new();
            for (key, val) in map {
                entries.insert(key.clone(), to_js_value(val));
            }
            JsValue::Object(entries)
        }
    }
}
