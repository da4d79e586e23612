//! Reactive records
//!
//! A [`ReactiveRecord`] is a keyed record of JSON values where every field is
//! its own signal. Derived values that read a field are invalidated only when
//! that field changes. Adding or removing keys bumps a separate shape signal,
//! so a derived value that looked up a missing key or listed the keys is
//! invalidated when the set of keys changes.
//!
//! Fields are shallow: a nested object is one value. Nest records explicitly
//! when an inner object needs per-field tracking.
//!
//! Handles are cheap to clone and share identity; wrapping an existing record
//! again returns the same record.

use crate::error::{kind_of, CoreError, Result};
use crate::reactive::{SharedReactiveGraph, Signal};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

struct RecordInner {
    graph: SharedReactiveGraph,
    fields: RefCell<IndexMap<String, Signal<Value>>>,
    shape: Signal<u64>,
}

/// A record whose field mutations are observable by derived values
#[derive(Clone)]
pub struct ReactiveRecord {
    inner: Rc<RecordInner>,
}

impl ReactiveRecord {
    /// Wrap a JSON object as a reactive record
    pub fn new(graph: &SharedReactiveGraph, value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(CoreError::NotAnObject {
                found: kind_of(&value),
            });
        };
        Ok(Self::from_map(graph, map))
    }

    /// Create a record with no fields
    pub fn empty(graph: &SharedReactiveGraph) -> Self {
        Self::from_map(graph, Map::new())
    }

    fn from_map(graph: &SharedReactiveGraph, map: Map<String, Value>) -> Self {
        let fields = map
            .into_iter()
            .map(|(key, value)| (key, graph.create_signal(value)))
            .collect();
        Self {
            inner: Rc::new(RecordInner {
                graph: Rc::clone(graph),
                fields: RefCell::new(fields),
                shape: graph.create_signal(0),
            }),
        }
    }

    /// The graph this record's signals live in
    pub fn graph(&self) -> &SharedReactiveGraph {
        &self.inner.graph
    }

    /// Whether two handles refer to the same record
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    /// The signal backing a field, if present
    pub fn signal(&self, key: &str) -> Option<Signal<Value>> {
        self.inner.fields.borrow().get(key).copied()
    }

    /// All field signals in insertion order
    pub fn signals(&self) -> Vec<(String, Signal<Value>)> {
        self.inner
            .fields
            .borrow()
            .iter()
            .map(|(key, signal)| (key.clone(), *signal))
            .collect()
    }

    /// Read a field's raw value (tracked)
    pub fn value(&self, key: &str) -> Option<Value> {
        match self.signal(key) {
            Some(signal) => self.inner.graph.get(signal),
            None => {
                self.track_shape();
                None
            }
        }
    }

    /// Read a field and decode it (tracked)
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.value(key).ok_or_else(|| CoreError::MissingField {
            key: key.to_string(),
        })?;
        serde_json::from_value(value).map_err(|source| CoreError::Decode {
            key: key.to_string(),
            source,
        })
    }

    /// Write a field, adding it if missing
    ///
    /// Returns whether anything changed. Writing an equal value notifies
    /// nobody.
    pub fn set<V: Serialize>(&self, key: &str, value: V) -> Result<bool> {
        let value = serde_json::to_value(value).map_err(|source| CoreError::Encode {
            key: key.to_string(),
            source,
        })?;

        if let Some(signal) = self.signal(key) {
            return Ok(self.inner.graph.set_if_changed(signal, value));
        }

        let signal = self.inner.graph.create_signal(value);
        self.inner
            .fields
            .borrow_mut()
            .insert(key.to_string(), signal);
        self.bump_shape();
        Ok(true)
    }

    /// Write every field of a JSON object into this record
    pub fn assign(&self, value: Value) -> Result<()> {
        let Value::Object(map) = value else {
            return Err(CoreError::NotAnObject {
                found: kind_of(&value),
            });
        };
        for (key, value) in map {
            self.set(&key, value)?;
        }
        Ok(())
    }

    /// Remove a field, returning its last value
    pub fn remove(&self, key: &str) -> Option<Value> {
        let signal = self.inner.fields.borrow_mut().shift_remove(key)?;
        let last = self.inner.graph.get_untracked(signal);

        // Readers of the field are invalidated when its signal goes away
        self.inner.graph.dispose_signal(signal);
        self.bump_shape();
        last
    }

    /// Remove every field and the record's own signals from the graph
    ///
    /// The handle stays usable as an empty record that no longer notifies
    /// readers of its shape.
    pub fn dispose(&self) {
        let fields = std::mem::take(&mut *self.inner.fields.borrow_mut());
        for signal in fields.into_values() {
            self.inner.graph.dispose_signal(signal);
        }
        self.inner.graph.dispose_signal(self.inner.shape);
    }

    /// Whether the record holds a field (tracked)
    pub fn contains(&self, key: &str) -> bool {
        self.track_shape();
        self.inner.fields.borrow().contains_key(key)
    }

    /// Field names in insertion order (tracked)
    pub fn keys(&self) -> Vec<String> {
        self.track_shape();
        self.inner.fields.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.fields.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Plain JSON copy of the whole record (tracked)
    pub fn to_value(&self) -> Value {
        self.track_shape();
        let map = self
            .signals()
            .into_iter()
            .map(|(key, signal)| {
                let value = self.inner.graph.get(signal).unwrap_or(Value::Null);
                (key, value)
            })
            .collect::<Map<_, _>>();
        Value::Object(map)
    }

    fn track_shape(&self) {
        let _ = self.inner.graph.get(self.inner.shape);
    }

    fn bump_shape(&self) {
        self.inner.graph.update(self.inner.shape, |v| v + 1);
    }
}

impl From<&ReactiveRecord> for ReactiveRecord {
    fn from(record: &ReactiveRecord) -> Self {
        record.clone()
    }
}

impl fmt::Debug for ReactiveRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveRecord")
            .field("keys", &self.inner.fields.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}
