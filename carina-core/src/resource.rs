//! Resource - Representing resources and their declarative state

use std::collections::HashMap;

/// Unique identifier for a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    /// Resource type (e.g., "msgraph.authentication_strength_policy")
    pub resource_type: String,
    /// Resource name (local name chosen by the user)
    pub name: String,
}

impl ResourceId {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

/// Attribute value of a resource
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
}

impl Value {
    /// Build a list of strings
    pub fn string_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::List(items.into_iter().map(|s| Value::String(s.into())).collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the items as strings, or None if this is not a list of strings
    pub fn as_string_list(&self) -> Option<Vec<String>> {
        match self {
            Value::List(items) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => None,
        }
    }

    /// Convert to JSON. Maps become objects, lists become arrays.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Int(n) => serde_json::Value::Number((*n).into()),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Convert from JSON. Returns None for `null` and for non-integer numbers.
    pub fn from_json(json: &serde_json::Value) -> Option<Value> {
        match json {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(Value::String(s.clone())),
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => n.as_i64().map(Value::Int),
            serde_json::Value::Array(items) => {
                Some(Value::List(items.iter().filter_map(Value::from_json).collect()))
            }
            serde_json::Value::Object(map) => Some(Value::Map(
                map.iter()
                    .filter_map(|(k, v)| Value::from_json(v).map(|v| (k.clone(), v)))
                    .collect(),
            )),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Declarative state record of one resource instance
///
/// The record holds the identifier assigned by the remote system and the
/// attributes last written by the provider (or the desired attributes before
/// creation). An identifier being present is the only signal that the
/// resource exists.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceData {
    pub id: ResourceId,
    identifier: Option<String>,
    attributes: HashMap<String, Value>,
}

impl ResourceData {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(resource_type, name),
            identifier: None,
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.set(key, value);
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.set_identifier(identifier);
        self
    }

    /// Remote identifier, if the resource exists
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// Set the remote identifier. An empty identifier marks the resource absent.
    pub fn set_identifier(&mut self, identifier: impl Into<String>) {
        let identifier = identifier.into();
        self.identifier = if identifier.is_empty() {
            None
        } else {
            Some(identifier)
        };
    }

    /// Mark the resource absent. Attributes are kept so a later create can reuse them.
    pub fn clear_identifier(&mut self) {
        self.identifier = None;
    }

    pub fn exists(&self) -> bool {
        self.identifier.is_some()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_string_list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).and_then(Value::as_string_list)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
    }

    /// Set an attribute from an optional value, removing it when None
    pub fn set_opt(&mut self, key: impl Into<String>, value: Option<Value>) {
        let key = key.into();
        match value {
            Some(v) => {
                self.attributes.insert(key, v);
            }
            None => {
                self.attributes.remove(&key);
            }
        }
    }

    pub fn attributes(&self) -> &HashMap<String, Value> {
        &self.attributes
    }
}
