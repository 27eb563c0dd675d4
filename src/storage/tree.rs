//! Hierarchical JSON tree with Realtime Database write semantics.
//!
//! `null` and empty objects mean "nothing here" and are pruned on every write,
//! so a node that loses its last child disappears along with it.

use crate::storage::storage_api::NodePath;
use serde_json::{Map, Value};

/// Whether a value counts as absent
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Drop `null` members and empty objects, recursively
pub fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let pruned: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, normalize(v)))
                .filter(|(_, v)| !is_empty(v))
                .collect();
            Value::Object(pruned)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        other => other,
    }
}

/// An in-memory tree rooted at some path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tree {
    root: Value,
}

impl Tree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Value at `path`, if any
    pub fn get(&self, path: &NodePath) -> Option<&Value> {
        let mut node = &self.root;
        for segment in path.segments() {
            node = match node {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        if is_empty(node) {
            None
        } else {
            Some(node)
        }
    }

    /// Replace the node at `path`
    pub fn set(&mut self, path: &NodePath, value: Value) {
        let segments: Vec<&str> = path.segments().collect();
        set_at(&mut self.root, &segments, normalize(value));
        if is_empty(&self.root) {
            self.root = Value::Null;
        }
    }

    /// Merge the direct children of `value` into the node at `path`.
    ///
    /// Each child key may itself be a multi-segment path and is replaced
    /// wholesale. Non-object values replace the node.
    pub fn update(&mut self, path: &NodePath, value: Value) {
        match value {
            Value::Object(children) => {
                for (key, child) in children {
                    self.set(&path.child(key), child);
                }
            }
            other => self.set(path, other),
        }
    }

    /// Delete the subtree at `path`
    pub fn remove(&mut self, path: &NodePath) {
        self.set(path, Value::Null);
    }
}

fn set_at(node: &mut Value, segments: &[&str], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = value;
        return;
    };

    if let Value::Array(items) = node {
        // arrays are stored as objects keyed by index
        let map: Map<String, Value> = std::mem::take(items)
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect();
        *node = Value::Object(map);
    }
    if !node.is_object() {
        if is_empty(&value) {
            return;
        }
        *node = Value::Object(Map::new());
    }

    if let Value::Object(map) = node {
        let prune = {
            let child = map.entry((*head).to_string()).or_insert(Value::Null);
            set_at(child, rest, value);
            is_empty(child)
        };
        if prune {
            map.remove(*head);
        }
    }
}
