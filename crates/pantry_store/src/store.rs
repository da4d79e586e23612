//! Store instances
//!
//! A [`Store`] is the shared object `use_store` hands out. It is an ordered
//! map of named members:
//!
//! - **State**: a signal holding a JSON value
//! - **Record**: a nested [`ReactiveRecord`] with per-field tracking
//! - **Getter**: a derived value, recomputed only when what it read changes
//! - **Action**: a [`BoundAction`] whose receiver is always this store
//!
//! Cloning a `Store` clones the handle, not the state. Use [`Store::ptr_eq`]
//! to compare identity.

use crate::error::{Result, StoreError};
use indexmap::IndexMap;
use pantry_core::{CoreError, Derived, ReactiveRecord, SharedReactiveGraph, Signal};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// An action body: receives the store it is bound to and the call arguments
pub type ActionFn = Rc<dyn Fn(&Store, &[Value]) -> anyhow::Result<Value>>;

/// A getter body: a pure function of the store
pub type GetterFn = Rc<dyn Fn(&Store) -> Result<Value>>;

/// Produces the initial state of an options-style store
pub type StateFn = Rc<dyn Fn() -> anyhow::Result<Value>>;

/// Which authoring style a store was defined with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Options,
    Setup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    State,
    Record,
    Getter,
    Action,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MemberKind::State => "a state field",
            MemberKind::Record => "a reactive record",
            MemberKind::Getter => "a getter",
            MemberKind::Action => "an action",
        })
    }
}

/// One named member of a store
#[derive(Clone)]
pub enum Member {
    State(Signal<Value>),
    Record(ReactiveRecord),
    Getter(Derived<Value>),
    Action(BoundAction),
}

impl Member {
    pub fn kind(&self) -> MemberKind {
        match self {
            Member::State(_) => MemberKind::State,
            Member::Record(_) => MemberKind::Record,
            Member::Getter(_) => MemberKind::Getter,
            Member::Action(_) => MemberKind::Action,
        }
    }
}

/// An action bound to its store
///
/// The binding survives detaching: a `BoundAction` cloned out of the store,
/// stored in a callback or passed around still runs against the store it
/// came from. It holds the store weakly; the registry keeps the store alive.
#[derive(Clone)]
pub struct BoundAction {
    store_id: Rc<str>,
    name: Rc<str>,
    target: Weak<StoreInner>,
    run: ActionFn,
}

impl BoundAction {
    pub(crate) fn bind(store: &Store, name: &str, run: ActionFn) -> Self {
        Self {
            store_id: Rc::from(store.id()),
            name: Rc::from(name),
            target: Rc::downgrade(&store.inner),
            run,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the action with its store as receiver
    ///
    /// Errors raised by the action body are returned as they were raised.
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        let inner = self
            .target
            .upgrade()
            .ok_or_else(|| StoreError::StoreDropped {
                id: self.store_id.to_string(),
            })?;
        let store = Store { inner };
        (self.run)(&store, args).map_err(StoreError::from_user)
    }
}

impl fmt::Debug for BoundAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundAction")
            .field("store", &self.store_id)
            .field("name", &self.name)
            .finish()
    }
}

/// What `reset` needs to rebuild options-style state
pub(crate) struct ResetState {
    pub(crate) state: Option<StateFn>,
    pub(crate) record: ReactiveRecord,
}

pub(crate) struct StoreInner {
    id: String,
    kind: StoreKind,
    graph: SharedReactiveGraph,
    members: RefCell<IndexMap<String, Member>>,
    reset: Option<ResetState>,
}

/// A shared, reactive store instance
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

impl Store {
    /// An empty store, to be filled by the setup pipeline
    pub(crate) fn empty(
        id: &str,
        kind: StoreKind,
        graph: &SharedReactiveGraph,
        reset: Option<ResetState>,
    ) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                id: id.to_string(),
                kind,
                graph: Rc::clone(graph),
                members: RefCell::new(IndexMap::new()),
                reset,
            }),
        }
    }

    /// Shallow-merge members into the store; later entries win
    pub(crate) fn merge(&self, members: IndexMap<String, Member>) {
        self.inner.members.borrow_mut().extend(members);
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn kind(&self) -> StoreKind {
        self.inner.kind
    }

    pub fn graph(&self) -> &SharedReactiveGraph {
        &self.inner.graph
    }

    /// Whether two handles refer to the same store instance
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    /// Member names in definition order
    pub fn keys(&self) -> Vec<String> {
        self.inner.members.borrow().keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.members.borrow().contains_key(name)
    }

    pub fn member(&self, name: &str) -> Result<Member> {
        self.inner
            .members
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownMember {
                id: self.inner.id.clone(),
                name: name.to_string(),
            })
    }

    /// Read a state field, nested record or getter as raw JSON
    ///
    /// Reads are tracked, so a getter that calls this depends on `name`.
    pub fn value(&self, name: &str) -> Result<Value> {
        match self.member(name)? {
            Member::State(signal) => Ok(self.inner.graph.get(signal).unwrap_or(Value::Null)),
            Member::Record(record) => Ok(record.to_value()),
            Member::Getter(derived) => self.evaluate(name, derived),
            Member::Action(_) => Err(self.wrong_kind(name, MemberKind::State, MemberKind::Action)),
        }
    }

    /// Read a state field, nested record or getter and decode it
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self.value(name)?;
        serde_json::from_value(value).map_err(|source| {
            StoreError::from(CoreError::Decode {
                key: name.to_string(),
                source,
            })
        })
    }

    /// Write a state field
    ///
    /// Getters that read the field recompute on their next read. Writing an
    /// equal value notifies nobody.
    pub fn set<V: Serialize>(&self, name: &str, value: V) -> Result<()> {
        let signal = match self.member(name)? {
            Member::State(signal) => signal,
            other => return Err(self.wrong_kind(name, MemberKind::State, other.kind())),
        };
        let value = serde_json::to_value(value).map_err(|source| CoreError::Encode {
            key: name.to_string(),
            source,
        })?;
        self.inner.graph.set_if_changed(signal, value);
        Ok(())
    }

    /// Write several state fields; nested records are assigned field by field
    pub fn patch(&self, changes: Value) -> Result<()> {
        let Value::Object(changes) = changes else {
            return Err(StoreError::from(CoreError::NotAnObject {
                found: pantry_core::error::kind_of(&changes),
            }));
        };
        for (name, value) in changes {
            match self.member(&name)? {
                Member::State(signal) => {
                    self.inner.graph.set_if_changed(signal, value);
                }
                Member::Record(record) => record.assign(value)?,
                other => return Err(self.wrong_kind(&name, MemberKind::State, other.kind())),
            }
        }
        Ok(())
    }

    /// A nested reactive record member
    pub fn record(&self, name: &str) -> Result<ReactiveRecord> {
        match self.member(name)? {
            Member::Record(record) => Ok(record),
            other => Err(self.wrong_kind(name, MemberKind::Record, other.kind())),
        }
    }

    /// Detach an action; it stays bound to this store
    pub fn action(&self, name: &str) -> Result<BoundAction> {
        match self.member(name)? {
            Member::Action(action) => Ok(action),
            other => Err(self.wrong_kind(name, MemberKind::Action, other.kind())),
        }
    }

    /// Invoke an action by name
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        self.action(name)?.call(args)
    }

    /// Plain JSON copy of every state field, record and getter
    pub fn snapshot(&self) -> Result<Value> {
        let members: Vec<(String, Member)> = self
            .inner
            .members
            .borrow()
            .iter()
            .map(|(name, member)| (name.clone(), member.clone()))
            .collect();

        let mut out = Map::new();
        for (name, member) in members {
            let value = match member {
                Member::State(signal) => self.inner.graph.get(signal).unwrap_or(Value::Null),
                Member::Record(record) => record.to_value(),
                Member::Getter(derived) => self.evaluate(&name, derived)?,
                Member::Action(_) => continue,
            };
            out.insert(name, value);
        }
        Ok(Value::Object(out))
    }

    /// Restore the state produced by the options `state()` initializer
    ///
    /// Members are fixed when the store is built, so the initializer must not
    /// introduce fields the store did not start with. Such a field fails with
    /// [`StoreError::UnknownMember`] and nothing is written.
    pub fn reset(&self) -> Result<()> {
        let Some(reset) = &self.inner.reset else {
            return Err(StoreError::ResetUnsupported {
                id: self.inner.id.clone(),
            });
        };
        let fresh = match &reset.state {
            Some(state) => state().map_err(StoreError::from_user)?,
            None => Value::Object(Map::new()),
        };
        let Value::Object(fields) = &fresh else {
            return Err(StoreError::InvalidState {
                id: self.inner.id.clone(),
                found: pantry_core::error::kind_of(&fresh),
            });
        };
        if let Some(name) = fields.keys().find(|name| reset.record.signal(name).is_none()) {
            return Err(StoreError::UnknownMember {
                id: self.inner.id.clone(),
                name: name.clone(),
            });
        }
        reset.record.assign(fresh)?;
        tracing::debug!(store = %self.inner.id, "store state reset");
        Ok(())
    }

    fn evaluate(&self, name: &str, derived: Derived<Value>) -> Result<Value> {
        match self.inner.graph.try_get_derived::<Value, StoreError>(derived) {
            Some(result) => result,
            None => Err(StoreError::GetterCycle {
                id: self.inner.id.clone(),
                getter: name.to_string(),
            }),
        }
    }

    fn wrong_kind(&self, name: &str, expected: MemberKind, found: MemberKind) -> StoreError {
        StoreError::WrongMemberKind {
            id: self.inner.id.clone(),
            name: name.to_string(),
            expected,
            found,
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("members", &self.keys())
            .finish()
    }
}

/// Decode one action argument
///
/// ```rust
/// use pantry_store::arg;
/// use serde_json::json;
///
/// let args = [json!(2), json!("two")];
/// assert_eq!(arg::<i64>(&args, 0).unwrap(), 2);
/// assert!(arg::<i64>(&args, 2).is_err());
/// ```
pub fn arg<T: DeserializeOwned>(args: &[Value], index: usize) -> Result<T> {
    let value = args
        .get(index)
        .ok_or(StoreError::MissingArgument { index })?;
    serde_json::from_value(value.clone())
        .map_err(|source| StoreError::InvalidArgument { index, source })
}
