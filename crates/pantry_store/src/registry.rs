//! Store registry
//!
//! One [`StoreRegistry`] is created per application and installed into the
//! root [`Context`]. It owns:
//!
//! - the instance map: store id -> constructed [`Store`]
//! - the state map: store id -> raw state record of an options-style store
//! - the set of ids currently under construction
//!
//! Stores are created lazily and never evicted. Two registries never share
//! instances, even for the same store id.

use crate::config::RegistryConfig;
use crate::error::{Result, StoreError};
use crate::store::Store;
use pantry_core::{Context, ReactiveGraph, ReactiveRecord, SharedReactiveGraph};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

struct RegistryInner {
    config: RegistryConfig,
    graph: SharedReactiveGraph,
    /// Constructed store instances keyed by id
    stores: RefCell<FxHashMap<String, Store>>,
    /// Raw state records of options-style stores keyed by id
    state_by_id: RefCell<FxHashMap<String, ReactiveRecord>>,
    /// Ids whose construction is in progress
    constructing: RefCell<FxHashSet<String>>,
}

/// Per-application container of store instances
#[derive(Clone)]
pub struct StoreRegistry {
    inner: Rc<RegistryInner>,
}

impl StoreRegistry {
    /// Create a registry with the default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        tracing::debug!(registry = %config.label, "store registry created");
        Self {
            inner: Rc::new(RegistryInner {
                config,
                graph: ReactiveGraph::shared(),
                stores: RefCell::new(FxHashMap::default()),
                state_by_id: RefCell::new(FxHashMap::default()),
                constructing: RefCell::new(FxHashSet::default()),
            }),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// The reactive graph all of this registry's stores live in
    pub fn graph(&self) -> &SharedReactiveGraph {
        &self.inner.graph
    }

    /// Make this registry available to `cx` and every scope below it
    pub fn install(&self, cx: &Context) {
        cx.provide(self.clone());
    }

    /// The registry visible from `cx`, if one was installed
    pub fn from_context(cx: &Context) -> Option<Self> {
        cx.resolve::<Self>()
    }

    /// Whether two handles refer to the same registry
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    /// The constructed store for `id`
    pub fn get(&self, id: &str) -> Option<Store> {
        self.inner.stores.borrow().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.stores.borrow().contains_key(id)
    }

    /// The raw state record of an options-style store
    pub fn state(&self, id: &str) -> Option<ReactiveRecord> {
        self.inner.state_by_id.borrow().get(id).cloned()
    }

    /// Ids of every constructed store, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.stores.borrow().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.inner.stores.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn downgrade(&self) -> WeakRegistry {
        WeakRegistry {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Mark `id` as under construction
    ///
    /// Fails if it already is. The mark is cleared when the guard drops,
    /// whether construction succeeded or not.
    pub(crate) fn begin_construction(&self, id: &str) -> Result<ConstructionGuard> {
        if !self.inner.constructing.borrow_mut().insert(id.to_string()) {
            return Err(StoreError::Reentrant { id: id.to_string() });
        }
        Ok(ConstructionGuard {
            registry: self.clone(),
            id: id.to_string(),
        })
    }

    pub(crate) fn register(&self, store: Store) {
        self.inner
            .stores
            .borrow_mut()
            .insert(store.id().to_string(), store);
    }

    pub(crate) fn set_state(&self, id: &str, record: ReactiveRecord) {
        self.inner
            .state_by_id
            .borrow_mut()
            .insert(id.to_string(), record);
    }

    pub(crate) fn forget_state(&self, id: &str) {
        self.inner.state_by_id.borrow_mut().remove(id);
    }

    fn end_construction(&self, id: &str) {
        self.inner.constructing.borrow_mut().remove(id);
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("label", &self.inner.config.label)
            .field("stores", &self.ids())
            .finish()
    }
}

/// A registry handle that does not keep the registry alive
///
/// Getter evaluators hold one of these; the registry holds the stores whose
/// getters they are.
#[derive(Clone)]
pub(crate) struct WeakRegistry {
    inner: Weak<RegistryInner>,
}

impl WeakRegistry {
    pub(crate) fn upgrade(&self) -> Option<StoreRegistry> {
        self.inner.upgrade().map(|inner| StoreRegistry { inner })
    }
}

/// Clears an id's under-construction mark on drop
pub(crate) struct ConstructionGuard {
    registry: StoreRegistry,
    id: String,
}

impl Drop for ConstructionGuard {
    fn drop(&mut self) {
        // Release the id whether construction finished or bailed out
        self.registry.end_construction(&self.id);
    }
}
