//! Options-style construction
//!
//! An options store is declared with an initial `state`, a set of `actions`
//! and a set of `getters`:
//!
//! ```rust
//! use pantry_core::Context;
//! use pantry_store::{arg, define_store, StoreOptions, StoreRegistry};
//! use serde_json::json;
//!
//! let use_store = define_store(
//!     "index",
//!     StoreOptions::new()
//!         .state(|| Ok(json!({ "name": "jacky chen", "age": 40 })))
//!         .action("increment", |store, args| {
//!             let age = store.get::<i64>("age")? + arg::<i64>(args, 0)?;
//!             store.set("age", age)?;
//!             Ok(age)
//!         })
//!         .getter("doubleAge", |store| Ok(store.get::<i64>("age")? * 2)),
//! )
//! .unwrap();
//!
//! let app = Context::root();
//! StoreRegistry::new().install(&app);
//!
//! let store = use_store.use_store(&app).unwrap();
//! assert_eq!(store.call("increment", &[json!(2)]).unwrap(), json!(42));
//! assert_eq!(store.get::<i64>("doubleAge").unwrap(), 84);
//! ```
//!
//! Construction goes through the setup pipeline: the state record, actions
//! and getters are assembled into a [`SetupRecord`] which is then handed to
//! the same code path setup stores use, so actions are bound identically.

use crate::error::{Result, StoreError};
use crate::registry::StoreRegistry;
use crate::setup::{action_fn, build_setup_store, SetupMember, SetupRecord};
use crate::store::{ActionFn, GetterFn, ResetState, Store, StoreKind};
use indexmap::IndexMap;
use pantry_core::error::kind_of;
use pantry_core::{CoreError, ReactiveRecord};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::rc::Rc;

/// An options-style store definition
#[derive(Clone, Default)]
pub struct StoreOptions {
    pub(crate) id: Option<String>,
    pub(crate) state: Option<crate::store::StateFn>,
    pub(crate) actions: IndexMap<String, ActionFn>,
    pub(crate) getters: IndexMap<String, GetterFn>,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that carry their own store id
    pub fn with_id(id: impl Into<String>) -> Self {
        Self::new().id(id)
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The initial state; must produce a JSON object
    pub fn state<F>(mut self, state: F) -> Self
    where
        F: Fn() -> anyhow::Result<Value> + 'static,
    {
        self.state = Some(Rc::new(state));
        self
    }

    /// An action; its receiver is the finished store
    pub fn action<R, F>(mut self, name: impl Into<String>, action: F) -> Self
    where
        R: Serialize,
        F: Fn(&Store, &[Value]) -> anyhow::Result<R> + 'static,
    {
        self.actions.insert(name.into(), action_fn(action));
        self
    }

    /// A getter; a pure function of the store, memoized between changes
    pub fn getter<V, F>(mut self, name: impl Into<String>, getter: F) -> Self
    where
        V: Serialize,
        F: Fn(&Store) -> Result<V> + 'static,
    {
        let name = name.into();
        let key = name.clone();
        let getter: GetterFn = Rc::new(move |store: &Store| -> Result<Value> {
            let value = getter(store)?;
            serde_json::to_value(value).map_err(|source| {
                StoreError::from(CoreError::Encode {
                    key: key.clone(),
                    source,
                })
            })
        });
        self.getters.insert(name, getter);
        self
    }

    pub fn id_ref(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("id", &self.id)
            .field("state", &self.state.is_some())
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("getters", &self.getters.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Build an options-style store and register it
pub(crate) fn build_options_store(
    id: &str,
    options: &StoreOptions,
    registry: &StoreRegistry,
) -> Result<Store> {
    let (record, reset) = assemble(id, options, registry)?;

    // 5. Hand the assembled record to the setup pipeline
    let built = build_setup_store(id, registry, StoreKind::Options, Some(reset), |_| Ok(record));
    if built.is_err() {
        registry.forget_state(id);
    }
    built
}

/// Steps 1-4: state record, actions and getters as one setup record
fn assemble(
    id: &str,
    options: &StoreOptions,
    registry: &StoreRegistry,
) -> Result<(SetupRecord, ResetState)> {
    // 1. Raw state, tracked separately in the registry
    let initial = match &options.state {
        Some(state) => state().map_err(StoreError::from_user)?,
        None => Value::Object(Map::new()),
    };
    if !initial.is_object() {
        return Err(StoreError::InvalidState {
            id: id.to_string(),
            found: kind_of(&initial),
        });
    }
    let state = ReactiveRecord::new(registry.graph(), initial)?;
    registry.set_state(id, state.clone());

    let mut record = SetupRecord::new();
    for (name, signal) in state.signals() {
        record.insert(name, SetupMember::State(signal));
    }

    // 2. Actions over state
    for (name, action) in &options.actions {
        record.insert(name.clone(), SetupMember::Action(Rc::clone(action)));
    }

    // 3. Getters evaluate against the registered store, looked up by id
    let log_evaluations = registry.config().log_getter_evaluations;
    for (name, getter) in &options.getters {
        let weak = registry.downgrade();
        let getter = Rc::clone(getter);
        let store_id = id.to_string();
        let getter_name = name.clone();

        let derived = registry.graph().create_try_derived(move |_| {
            let not_registered = || StoreError::NotRegistered {
                id: store_id.clone(),
                getter: getter_name.clone(),
            };
            let store = weak
                .upgrade()
                .and_then(|registry| registry.get(&store_id))
                .ok_or_else(not_registered)?;
            if log_evaluations {
                tracing::debug!(store = %store_id, getter = %getter_name, "computed");
            }
            getter(&store)
        });

        // 4. Getters over state and actions
        record.insert(name.clone(), SetupMember::Getter(derived));
    }

    let reset = ResetState {
        state: options.state.clone(),
        record: state,
    };
    Ok((record, reset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile() -> StoreOptions {
        StoreOptions::new()
            .state(|| Ok(json!({ "name": "jacky chen", "age": 40 })))
            .action("birthday", |store, _| {
                let age = store.get::<i64>("age")? + 1;
                store.set("age", age)?;
                Ok(age)
            })
            .getter("doubleAge", |store| Ok(store.get::<i64>("age")? * 2))
    }

    #[test]
    fn test_state_is_tracked_by_id() {
        let registry = StoreRegistry::new();
        let store = build_options_store("profile", &profile(), &registry).unwrap();

        let state = registry.state("profile").unwrap();
        assert_eq!(state.get::<i64>("age").unwrap(), 40);

        store.call("birthday", &[]).unwrap();
        assert_eq!(state.get::<i64>("age").unwrap(), 41);

        // Writes through the raw record are visible on the store
        state.set("name", "chen").unwrap();
        assert_eq!(store.get::<String>("name").unwrap(), "chen");
    }

    #[test]
    fn test_member_precedence() {
        let registry = StoreRegistry::new();
        let options = StoreOptions::new()
            .state(|| Ok(json!({ "total": 1, "label": "x" })))
            .action("total", |_, _| Ok("action"))
            .getter("label", |_| Ok("getter"));
        let store = build_options_store("clash", &options, &registry).unwrap();

        assert_eq!(store.call("total", &[]).unwrap(), json!("action"));
        assert_eq!(store.get::<String>("label").unwrap(), "getter");
        assert_eq!(store.keys(), vec!["total", "label"]);
    }

    #[test]
    fn test_missing_state_is_empty() {
        let registry = StoreRegistry::new();
        let options = StoreOptions::new().getter("answer", |_| Ok(42));
        let store = build_options_store("bare", &options, &registry).unwrap();

        assert_eq!(store.get::<i64>("answer").unwrap(), 42);
        assert!(registry.state("bare").unwrap().is_empty());
    }

    #[test]
    fn test_non_object_state_is_rejected() {
        let registry = StoreRegistry::new();
        let options = StoreOptions::new().state(|| Ok(json!(7)));
        let err = build_options_store("seven", &options, &registry).unwrap_err();

        assert!(matches!(
            err,
            StoreError::InvalidState { found: "a number", .. }
        ));
        assert!(registry.get("seven").is_none());
        assert!(registry.state("seven").is_none());
    }

    #[test]
    fn test_getter_before_registration_fails_explicitly() {
        let registry = StoreRegistry::new();
        let options = StoreOptions::new()
            .state(|| Ok(json!({ "age": 40 })))
            .getter("doubleAge", |store| Ok(store.get::<i64>("age")? * 2));

        let (record, reset) = assemble("early", &options, &registry).unwrap();
        let derived = match record.get("doubleAge") {
            Some(SetupMember::Getter(derived)) => *derived,
            _ => panic!("doubleAge should be a getter"),
        };

        let early = registry
            .graph()
            .try_get_derived::<Value, StoreError>(derived)
            .unwrap();
        assert!(matches!(early, Err(StoreError::NotRegistered { .. })));

        // Nothing was cached; once registered the getter evaluates
        build_setup_store("early", &registry, StoreKind::Options, Some(reset), |_| Ok(record))
            .unwrap();
        let store = registry.get("early").unwrap();
        assert_eq!(store.get::<i64>("doubleAge").unwrap(), 80);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let registry = StoreRegistry::new();
        let store = build_options_store("profile", &profile(), &registry).unwrap();

        store.call("birthday", &[]).unwrap();
        store.set("name", "someone").unwrap();
        assert_eq!(store.get::<i64>("doubleAge").unwrap(), 82);

        store.reset().unwrap();
        assert_eq!(store.get::<i64>("age").unwrap(), 40);
        assert_eq!(store.get::<String>("name").unwrap(), "jacky chen");
        assert_eq!(store.get::<i64>("doubleAge").unwrap(), 80);
    }

    #[test]
    fn test_reset_rejects_new_fields() {
        let registry = StoreRegistry::new();
        let calls = Rc::new(std::cell::Cell::new(0));
        let options = {
            let calls = calls.clone();
            StoreOptions::new().state(move || {
                calls.set(calls.get() + 1);
                if calls.get() == 1 {
                    Ok(json!({ "age": 40 }))
                } else {
                    Ok(json!({ "age": 0, "nickname": "jc" }))
                }
            })
        };
        let store = build_options_store("drifting", &options, &registry).unwrap();
        store.set("age", 41).unwrap();

        let err = store.reset().unwrap_err();
        assert!(matches!(err, StoreError::UnknownMember { ref name, .. } if name == "nickname"));

        // Nothing was written
        assert_eq!(store.get::<i64>("age").unwrap(), 41);
        assert!(!registry.state("drifting").unwrap().contains("nickname"));
    }

    #[test]
    fn test_state_error_propagates_unchanged() {
        let registry = StoreRegistry::new();
        let options = StoreOptions::new().state(|| anyhow::bail!("backend unavailable"));
        let err = build_options_store("remote", &options, &registry).unwrap_err();

        assert_eq!(err.to_string(), "backend unavailable");
        assert!(registry.state("remote").is_none());
    }
}
