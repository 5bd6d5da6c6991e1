use std::cell::RefCell;
use std::rc::Rc;

use jsembed_kernel_rs::script::{to_js_value, BridgeError, GuestKind, GuestValue, ScriptValue};
use serde_json::{json, Value};

/// A guest heap with shared, mutable containers, so object graphs can form
/// cycles the way they do inside a real runtime.
#[derive(Clone)]
enum Node {
    Object(Rc<RefCell<Vec<(String, Node)>>>),
    Array(Rc<RefCell<Vec<Node>>>),
    Function,
    Text(String),
    Number(f64),
    Flag(bool),
    Null,
    Undefined,
}

impl Node {
    fn object(entries: Vec<(&str, Node)>) -> Node {
        Node::Object(Rc::new(RefCell::new(
            entries
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        )))
    }

    fn set(&self, key: &str, value: Node) {
        if let Node::Object(entries) = self {
            entries.borrow_mut().push((key.to_string(), value));
        }
    }
}

impl GuestValue for Node {
    fn kind(&self) -> GuestKind {
        match self {
            Node::Object(_) => GuestKind::Object,
            Node::Array(_) => GuestKind::Array,
            Node::Function => GuestKind::Function,
            Node::Text(_) => GuestKind::String,
            Node::Number(_) => GuestKind::Number,
            Node::Flag(_) => GuestKind::Boolean,
            Node::Null => GuestKind::Null,
            Node::Undefined => GuestKind::Undefined,
        }
    }

    fn keys(&self) -> Vec<String> {
        match self {
            Node::Object(entries) => entries.borrow().iter().map(|(k, _)| k.clone()).collect(),
            _ => Vec::new(),
        }
    }

    fn member(&self, key: &str) -> Option<Self> {
        match self {
            Node::Object(entries) => entries
                .borrow()
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    fn elements(&self) -> Vec<Self> {
        match self {
            Node::Array(items) => items.borrow().clone(),
            _ => Vec::new(),
        }
    }

    fn as_string(&self) -> Option<String> {
        match self {
            Node::Text(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Node::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn as_boolean(&self) -> Option<bool> {
        match self {
            Node::Flag(b) => Some(*b),
            _ => None,
        }
    }

    fn identity(&self) -> Option<usize> {
        match self {
            Node::Object(entries) => Some(Rc::as_ptr(entries) as *const () as usize),
            Node::Array(items) => Some(Rc::as_ptr(items) as *const () as usize),
            _ => None,
        }
    }
}

#[test]
fn factory_picks_variant_from_the_guest_type() {
    assert!(ScriptValue::new(Node::object(vec![])).is_object());
    assert!(ScriptValue::new(Node::Array(Rc::new(RefCell::new(vec![])))).is_array());
    assert!(ScriptValue::new(Node::Function).is_function());
    assert_eq!(ScriptValue::new(Node::Text("s".into())).as_str(), Some("s"));
    assert_eq!(ScriptValue::new(Node::Number(2.0)).as_f64(), Some(2.0));
    assert_eq!(ScriptValue::new(Node::Flag(true)).as_bool(), Some(true));
    assert!(ScriptValue::new(Node::Null).is_nullish());
    assert_eq!(ScriptValue::new(Node::Undefined).kind(), GuestKind::Undefined);
}

#[test]
fn nested_members_are_wrapped_by_the_same_factory() {
    let root = Node::object(vec![
        ("config", Node::object(vec![("port", Node::Number(8080.0))])),
        ("handler", Node::Function),
    ]);
    let value = ScriptValue::new(root);
    let config = value.get_member("config").unwrap();
    assert!(config.is_object());
    assert_eq!(config.get_member("port").unwrap().as_f64(), Some(8080.0));
    assert!(value.get_member("handler").unwrap().is_function());
    assert!(matches!(value.get_member("absent").unwrap(), ScriptValue::Undefined));
}

#[test]
fn get_map_converts_recursively_and_is_idempotent() {
    let root = Node::object(vec![
        ("name", Node::Text("svc".into())),
        (
            "ports",
            Node::Array(Rc::new(RefCell::new(vec![
                Node::Number(80.0),
                Node::Number(443.0),
            ]))),
        ),
        ("tls", Node::object(vec![("enabled", Node::Flag(false))])),
        ("onError", Node::Function),
        ("missing", Node::Undefined),
    ]);
    let value = ScriptValue::new(root);
    let first = value.get_map().unwrap();
    let second = value.get_map().unwrap();
    assert_eq!(first, second);
    assert_eq!(
        Value::Object(first),
        json!({
            "name": "svc",
            "ports": [80, 443],
            "tls": { "enabled": false },
            "onError": null,
            "missing": null
        })
    );
}

#[test]
fn back_references_convert_to_null() {
    let root = Node::object(vec![("name", Node::Text("root".into()))]);
    let child = Node::object(vec![("parent", root.clone())]);
    root.set("child", child);
    root.set("me", root.clone());

    let map = ScriptValue::new(root).get_map().unwrap();
    assert_eq!(
        Value::Object(map),
        json!({ "name": "root", "child": { "parent": null }, "me": null })
    );
}

#[test]
fn shared_values_that_are_not_cycles_convert_everywhere() {
    let shared = Node::object(vec![("v", Node::Number(1.0))]);
    let root = Node::object(vec![("left", shared.clone()), ("right", shared)]);
    let json = ScriptValue::new(root).to_json().unwrap();
    assert_eq!(json, json!({ "left": { "v": 1 }, "right": { "v": 1 } }));
}

#[test]
fn deep_graphs_hit_the_depth_cap() {
    let mut node = Node::Number(0.0);
    for _ in 0..5 {
        node = Node::object(vec![("next", node)]);
    }
    let value = ScriptValue::new(node);
    assert_eq!(
        value.get_map_with_depth(3).unwrap_err(),
        BridgeError::DepthExceeded { limit: 3 }
    );
    assert!(value.get_map_with_depth(10).is_ok());
}

#[test]
fn non_objects_reject_object_operations() {
    let value = ScriptValue::new(Node::Text("plain".into()));
    assert_eq!(
        value.get_keys().unwrap_err(),
        BridgeError::TypeMismatch {
            expected: GuestKind::Object,
            actual: GuestKind::String,
        }
    );
    assert!(value.get_map().is_err());
    assert!(value.get_elements().is_err());
    assert!(!value.has_member("length"));
}

#[test]
fn host_mappings_round_trip_through_the_runtime_representation() {
    let host = json!({
        "id": 7,
        "ratio": 0.25,
        "label": "widget",
        "tags": ["a", "b"],
        "owner": { "name": "ops", "active": true },
        "note": null
    });
    let guest = to_js_value(&host);
    let value = ScriptValue::new(&guest);
    let keys: Vec<String> = value.get_keys().unwrap().into_iter().collect();
    assert_eq!(keys, ["id", "label", "note", "owner", "ratio", "tags"]);
    assert_eq!(Value::Object(value.get_map().unwrap()), host);
}
