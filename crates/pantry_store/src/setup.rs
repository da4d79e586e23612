//! Setup-style construction
//!
//! A setup store is defined by a function that runs once, builds its own
//! reactive bindings through a [`SetupScope`] and returns them as a
//! [`SetupRecord`]:
//!
//! ```rust
//! use pantry_core::Context;
//! use pantry_store::{define_setup_store, SetupRecord, StoreRegistry};
//! use serde_json::json;
//!
//! let use_fn_store = define_setup_store("fnStore", |s| {
//!     let a = s.reactive(json!({ "v": 10 }))?;
//!     let double_a = s.computed({
//!         let a = a.clone();
//!         move |_| Ok(a.get::<i64>("v")? * 2)
//!     });
//!     Ok(SetupRecord::new().record("a", a).getter("doubleA", double_a))
//! })
//! .unwrap();
//!
//! let app = Context::root();
//! StoreRegistry::new().install(&app);
//!
//! let store = use_fn_store.use_store(&app).unwrap();
//! assert_eq!(store.get::<i64>("doubleA").unwrap(), 20);
//! store.record("a").unwrap().set("v", 15).unwrap();
//! assert_eq!(store.get::<i64>("doubleA").unwrap(), 30);
//! ```

use crate::error::{Result, StoreError};
use crate::registry::StoreRegistry;
use crate::store::{ActionFn, BoundAction, Member, ResetState, Store, StoreKind};
use indexmap::IndexMap;
use pantry_core::{
    CoreError, Derived, ReactiveGraph, ReactiveRecord, SharedReactiveGraph, Signal,
};
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// A setup function
pub type SetupFn = Rc<dyn Fn(&SetupScope) -> anyhow::Result<SetupRecord>>;

/// Reactive building blocks available while a setup function runs
pub struct SetupScope {
    id: String,
    graph: SharedReactiveGraph,
    /// Everything created here, released if the setup function fails
    created: RefCell<Created>,
}

#[derive(Default)]
struct Created {
    signals: Vec<Signal<Value>>,
    records: Vec<ReactiveRecord>,
    derived: Vec<Derived<Value>>,
}

impl SetupScope {
    pub(crate) fn new(id: &str, graph: &SharedReactiveGraph) -> Self {
        Self {
            id: id.to_string(),
            graph: Rc::clone(graph),
            created: RefCell::new(Created::default()),
        }
    }

    /// Remove everything this scope created from the graph
    fn dispose(&self) {
        let created = std::mem::take(&mut *self.created.borrow_mut());
        for derived in created.derived {
            self.graph.dispose_derived(derived);
        }
        for record in created.records {
            record.dispose();
        }
        for signal in created.signals {
            self.graph.dispose_signal(signal);
        }
    }

    /// Id of the store being built
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn graph(&self) -> &SharedReactiveGraph {
        &self.graph
    }

    /// A single reactive value
    pub fn state<V: Serialize>(&self, initial: V) -> Result<Signal<Value>> {
        let value = serde_json::to_value(initial).map_err(|source| CoreError::Encode {
            key: self.id.clone(),
            source,
        })?;
        let signal = self.graph.create_signal(value);
        self.created.borrow_mut().signals.push(signal);
        Ok(signal)
    }

    /// A reactive record with per-field tracking
    pub fn reactive(&self, initial: Value) -> Result<ReactiveRecord> {
        let record = ReactiveRecord::new(&self.graph, initial)?;
        self.created.borrow_mut().records.push(record.clone());
        Ok(record)
    }

    /// A lazily evaluated, memoized value
    ///
    /// The body runs on first read and again only after something it read
    /// has changed.
    pub fn computed<V, F>(&self, compute: F) -> Derived<Value>
    where
        V: Serialize,
        F: Fn(&ReactiveGraph) -> Result<V> + 'static,
    {
        let id = self.id.clone();
        let derived = self.graph.create_try_derived(move |graph| {
            let value = compute(graph)?;
            serde_json::to_value(value).map_err(|source| {
                StoreError::from(CoreError::Encode {
                    key: id.clone(),
                    source,
                })
            })
        });
        self.created.borrow_mut().derived.push(derived);
        derived
    }
}

/// One member returned by a setup function, before actions are bound
#[derive(Clone)]
pub enum SetupMember {
    State(Signal<Value>),
    Record(ReactiveRecord),
    Getter(Derived<Value>),
    /// A plain function; bound to the store during construction
    Action(ActionFn),
}

/// The flat record of named members a setup function returns
#[derive(Clone, Default)]
pub struct SetupRecord {
    members: IndexMap<String, SetupMember>,
}

impl SetupRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a member
    pub fn insert(&mut self, name: impl Into<String>, member: SetupMember) {
        self.members.insert(name.into(), member);
    }

    pub fn state(mut self, name: impl Into<String>, signal: Signal<Value>) -> Self {
        self.insert(name, SetupMember::State(signal));
        self
    }

    pub fn record(mut self, name: impl Into<String>, record: ReactiveRecord) -> Self {
        self.insert(name, SetupMember::Record(record));
        self
    }

    pub fn getter(mut self, name: impl Into<String>, derived: Derived<Value>) -> Self {
        self.insert(name, SetupMember::Getter(derived));
        self
    }

    /// Add a plain function; it will be called with the finished store
    pub fn action<R, F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        R: Serialize,
        F: Fn(&Store, &[Value]) -> anyhow::Result<R> + 'static,
    {
        self.insert(name, SetupMember::Action(action_fn(f)));
        self
    }

    pub fn get(&self, name: &str) -> Option<&SetupMember> {
        self.members.get(name)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Wrap every plain function so its receiver is `store`
    fn bind(self, store: &Store) -> IndexMap<String, Member> {
        self.members
            .into_iter()
            .map(|(name, member)| {
                let member = match member {
                    SetupMember::State(signal) => Member::State(signal),
                    SetupMember::Record(record) => Member::Record(record),
                    SetupMember::Getter(derived) => Member::Getter(derived),
                    SetupMember::Action(run) => {
                        Member::Action(BoundAction::bind(store, &name, run))
                    }
                };
                (name, member)
            })
            .collect()
    }
}

/// Erase an action's return type to JSON
pub(crate) fn action_fn<R, F>(f: F) -> ActionFn
where
    R: Serialize,
    F: Fn(&Store, &[Value]) -> anyhow::Result<R> + 'static,
{
    Rc::new(move |store: &Store, args: &[Value]| -> anyhow::Result<Value> {
        let result = f(store, args)?;
        Ok(serde_json::to_value(result)?)
    })
}

/// Build a store from a setup function and register it
///
/// The setup function runs exactly once. Its plain functions are bound to the
/// store object that is registered, so they keep working when detached.
pub(crate) fn build_setup_store<F>(
    id: &str,
    registry: &StoreRegistry,
    kind: StoreKind,
    reset: Option<ResetState>,
    setup: F,
) -> Result<Store>
where
    F: FnOnce(&SetupScope) -> Result<SetupRecord>,
{
    let graph = registry.graph();
    let store = Store::empty(id, kind, graph, reset);

    let scope = SetupScope::new(id, graph);
    let record = match setup(&scope) {
        Ok(record) => record,
        Err(err) => {
            scope.dispose();
            return Err(err);
        }
    };
    let members = record.len();

    store.merge(record.bind(&store));
    registry.register(store.clone());

    tracing::debug!(store = %id, ?kind, members, "store registered");
    Ok(store)
}
