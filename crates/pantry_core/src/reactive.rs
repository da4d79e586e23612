//! Fine-grained reactive signal system
//!
//! A push-pull hybrid:
//! - Signals push invalidation to the derived values that read them
//! - Derived values pull (lazily recompute) their value when accessed
//!
//! The graph is single-threaded and shared through [`SharedReactiveGraph`].
//! Every method takes `&self`; internal borrows are released before any user
//! compute function runs, so derived values may freely read signals and other
//! derived values of the same graph.
//!
//! # Example
//!
//! ```rust
//! use pantry_core::reactive::ReactiveGraph;
//!
//! let graph = ReactiveGraph::new();
//! let age = graph.create_signal(40i64);
//! let double_age = graph.create_derived(move |g| g.get(age).unwrap_or(0) * 2);
//! let quadruple_age = graph.create_derived(move |g| g.get_derived(double_age).unwrap_or(0) * 2);
//!
//! assert_eq!(graph.get_derived(quadruple_age), Some(160));
//! graph.set(age, 45);
//! assert_eq!(graph.get_derived(quadruple_age), Some(180));
//! ```

use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::rc::Rc;

new_key_type! {
    /// Unique identifier for a signal
    pub struct SignalId;
    /// Unique identifier for a derived/computed value
    pub struct DerivedId;
}

/// Anything a derived value can depend on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceId {
    Signal(SignalId),
    Derived(DerivedId),
}

/// A reactive signal handle (cheap to copy)
#[derive(Debug)]
pub struct Signal<T> {
    id: SignalId,
    _marker: PhantomData<T>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Signal<T> {}

impl<T> Signal<T> {
    /// Get the signal's internal ID
    pub fn id(&self) -> SignalId {
        self.id
    }
}

/// A derived/computed value handle
#[derive(Debug)]
pub struct Derived<T> {
    id: DerivedId,
    _marker: PhantomData<T>,
}

impl<T> Clone for Derived<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Derived<T> {}

impl<T> Derived<T> {
    pub fn id(&self) -> DerivedId {
        self.id
    }
}

/// Outcome of one evaluation, type-erased. `Err` is not cached.
type Computed = Result<Box<dyn Any>, Box<dyn Any>>;

type ComputeFn = Rc<dyn Fn(&ReactiveGraph) -> Computed>;

/// Internal signal node storage
struct SignalNode {
    /// The signal value (type-erased)
    value: Box<dyn Any>,
    /// Version counter for change detection
    version: u64,
    /// Derived values to invalidate on change
    subscribers: SmallVec<[DerivedId; 4]>,
}

/// Internal derived node storage
struct DerivedNode {
    /// Cached value (if computed)
    value: Option<Box<dyn Any>>,
    compute: ComputeFn,
    /// Sources read during the last evaluation
    dependencies: SmallVec<[SourceId; 4]>,
    /// Derived values that read this one
    subscribers: SmallVec<[DerivedId; 4]>,
    /// Whether the cached value is stale
    dirty: bool,
    /// Set while `compute` runs, to catch cycles
    evaluating: bool,
    /// Depth in the dependency graph
    depth: u32,
    /// Number of times `compute` has run
    evaluations: u64,
}

/// The reactive graph that manages all signals and derived values
pub struct ReactiveGraph {
    signals: RefCell<SlotMap<SignalId, SignalNode>>,
    derived: RefCell<SlotMap<DerivedId, DerivedNode>>,
    /// One frame per derived value currently evaluating
    tracking: RefCell<Vec<SmallVec<[SourceId; 4]>>>,
    /// Global version counter
    global_version: Cell<u64>,
}

/// Shared reactive graph handle
pub type SharedReactiveGraph = Rc<ReactiveGraph>;

impl ReactiveGraph {
    /// Create a new reactive graph
    pub fn new() -> Self {
        Self {
            signals: RefCell::new(SlotMap::with_key()),
            derived: RefCell::new(SlotMap::with_key()),
            tracking: RefCell::new(Vec::new()),
            global_version: Cell::new(0),
        }
    }

    /// Create a new graph behind a shared handle
    pub fn shared() -> SharedReactiveGraph {
        Rc::new(Self::new())
    }

    // =========================================================================
    // SIGNALS
    // =========================================================================

    /// Create a new signal with an initial value
    pub fn create_signal<T: 'static>(&self, initial: T) -> Signal<T> {
        let id = self.signals.borrow_mut().insert(SignalNode {
            value: Box::new(initial),
            version: 0,
            subscribers: SmallVec::new(),
        });
        Signal {
            id,
            _marker: PhantomData,
        }
    }

    /// Get the current value of a signal
    ///
    /// If called while a derived value is evaluating, this signal is recorded
    /// as one of its dependencies.
    pub fn get<T: Clone + 'static>(&self, signal: Signal<T>) -> Option<T> {
        self.track(SourceId::Signal(signal.id));
        self.get_untracked(signal)
    }

    /// Get the current value without tracking as a dependency
    pub fn get_untracked<T: Clone + 'static>(&self, signal: Signal<T>) -> Option<T> {
        self.signals
            .borrow()
            .get(signal.id)
            .and_then(|node| node.value.downcast_ref::<T>().cloned())
    }

    /// Set the value of a signal, invalidating every derived value that read it
    pub fn set<T: 'static>(&self, signal: Signal<T>, value: T) {
        let subscribers = {
            let mut signals = self.signals.borrow_mut();
            let Some(node) = signals.get_mut(signal.id) else {
                return;
            };
            node.value = Box::new(value);
            node.version += 1;
            node.subscribers.clone()
        };
        self.global_version.set(self.global_version.get() + 1);

        for sub in subscribers {
            self.mark_dirty(sub);
        }
    }

    /// Set the value only if it differs from the current one
    ///
    /// Returns whether the signal changed.
    pub fn set_if_changed<T: PartialEq + 'static>(&self, signal: Signal<T>, value: T) -> bool {
        let unchanged = self
            .signals
            .borrow()
            .get(signal.id)
            .and_then(|node| node.value.downcast_ref::<T>())
            .is_some_and(|current| *current == value);
        if unchanged {
            return false;
        }
        self.set(signal, value);
        true
    }

    /// Update a signal using a function
    pub fn update<T: Clone + 'static, F: FnOnce(T) -> T>(&self, signal: Signal<T>, f: F) {
        if let Some(current) = self.get_untracked(signal) {
            self.set(signal, f(current));
        }
    }

    /// Get the version of a signal (for change detection)
    pub fn signal_version(&self, id: SignalId) -> Option<u64> {
        self.signals.borrow().get(id).map(|n| n.version)
    }

    // =========================================================================
    // DERIVED VALUES
    // =========================================================================

    /// Create a derived (computed) value
    ///
    /// Nothing is evaluated until the first read.
    pub fn create_derived<T, F>(&self, compute: F) -> Derived<T>
    where
        T: Clone + 'static,
        F: Fn(&ReactiveGraph) -> T + 'static,
    {
        self.insert_derived(Rc::new(move |graph: &ReactiveGraph| -> Computed {
            Ok(Box::new(compute(graph)))
        }))
    }

    /// Create a derived value whose computation can fail
    ///
    /// A failed evaluation is handed to the reader and nothing is cached, so
    /// the next read evaluates again.
    pub fn create_try_derived<T, E, F>(&self, compute: F) -> Derived<T>
    where
        T: Clone + 'static,
        E: 'static,
        F: Fn(&ReactiveGraph) -> Result<T, E> + 'static,
    {
        self.insert_derived(Rc::new(move |graph: &ReactiveGraph| -> Computed {
            match compute(graph) {
                Ok(value) => Ok(Box::new(value)),
                Err(err) => Err(Box::new(err)),
            }
        }))
    }

    fn insert_derived<T>(&self, compute: ComputeFn) -> Derived<T> {
        let id = self.derived.borrow_mut().insert(DerivedNode {
            value: None,
            compute,
            dependencies: SmallVec::new(),
            subscribers: SmallVec::new(),
            dirty: true, // Start dirty to force initial computation
            evaluating: false,
            depth: 0,
            evaluations: 0,
        });
        Derived {
            id,
            _marker: PhantomData,
        }
    }

    /// Get the value of an infallible derived, computing if necessary
    ///
    /// Returns `None` if the derived does not exist, holds a different type,
    /// or is read from inside its own computation.
    pub fn get_derived<T: Clone + 'static>(&self, derived: Derived<T>) -> Option<T> {
        self.read_derived::<T, ()>(derived.id)?.ok()
    }

    /// Get the value of a fallible derived, computing if necessary
    pub fn try_get_derived<T: Clone + 'static, E: 'static>(
        &self,
        derived: Derived<T>,
    ) -> Option<Result<T, E>> {
        self.read_derived::<T, E>(derived.id)
    }

    /// Force the next read of a derived value to recompute
    pub fn invalidate_derived<T>(&self, derived: Derived<T>) {
        self.mark_dirty(derived.id);
    }

    /// Remove a signal from the graph
    ///
    /// Derived values that read it are invalidated; on their next read the
    /// signal is gone. Returns whether the signal existed.
    pub fn dispose_signal<T>(&self, signal: Signal<T>) -> bool {
        let Some(node) = self.signals.borrow_mut().remove(signal.id) else {
            return false;
        };
        for sub in node.subscribers {
            self.mark_dirty(sub);
        }
        true
    }

    /// Remove a derived value from the graph
    ///
    /// It is unsubscribed from everything it read, and derived values that
    /// read it are invalidated. Returns whether it existed.
    pub fn dispose_derived<T>(&self, derived: Derived<T>) -> bool {
        let Some(node) = self.derived.borrow_mut().remove(derived.id) else {
            return false;
        };

        {
            let mut signals = self.signals.borrow_mut();
            let mut nodes = self.derived.borrow_mut();
            for dep in &node.dependencies {
                let subscribers = match *dep {
                    SourceId::Signal(sig) => signals.get_mut(sig).map(|n| &mut n.subscribers),
                    SourceId::Derived(d) => nodes.get_mut(d).map(|n| &mut n.subscribers),
                };
                if let Some(subscribers) = subscribers {
                    subscribers.retain(|s| *s != derived.id);
                }
            }
        }

        for sub in node.subscribers {
            self.mark_dirty(sub);
        }
        true
    }

    /// Whether a derived value will recompute on its next read
    pub fn is_derived_dirty(&self, id: DerivedId) -> Option<bool> {
        self.derived
            .borrow()
            .get(id)
            .map(|n| n.dirty || n.value.is_none())
    }

    /// How many times a derived value has been evaluated
    pub fn derived_evaluations(&self, id: DerivedId) -> Option<u64> {
        self.derived.borrow().get(id).map(|n| n.evaluations)
    }

    fn read_derived<T: Clone + 'static, E: 'static>(
        &self,
        id: DerivedId,
    ) -> Option<Result<T, E>> {
        self.track(SourceId::Derived(id));

        let compute = {
            let mut derived = self.derived.borrow_mut();
            let node = derived.get_mut(id)?;

            // If not dirty and we have a cached value, return it
            if !node.dirty {
                if let Some(ref cached) = node.value {
                    return cached.downcast_ref::<T>().cloned().map(Ok);
                }
            }

            if node.evaluating {
                tracing::warn!(?id, "derived value read during its own evaluation");
                return None;
            }

            node.evaluating = true;
            node.dirty = false;
            Rc::clone(&node.compute)
        };

        self.tracking.borrow_mut().push(SmallVec::new());
        let computed = compute(self);
        let deps = self.tracking.borrow_mut().pop().unwrap_or_default();
        self.resubscribe(id, deps);

        tracing::trace!(?id, ok = computed.is_ok(), "derived value recomputed");

        let mut derived = self.derived.borrow_mut();
        let node = derived.get_mut(id)?;
        node.evaluating = false;
        node.evaluations += 1;

        match computed {
            Ok(value) => {
                let result = value.downcast_ref::<T>().cloned();
                node.value = Some(value);
                result.map(Ok)
            }
            Err(err) => {
                // Stays subscribed and clean with nothing cached: the next read
                // evaluates again, and a change still reaches downstream readers
                node.value = None;
                err.downcast::<E>().ok().map(|err| Err(*err))
            }
        }
    }

    // =========================================================================
    // INTERNAL
    // =========================================================================

    /// Record a read in the innermost evaluating derived value, if any
    fn track(&self, source: SourceId) {
        if let Some(deps) = self.tracking.borrow_mut().last_mut() {
            if !deps.contains(&source) {
                deps.push(source);
            }
        }
    }

    /// Replace a derived value's subscriptions with the sources it just read
    fn resubscribe(&self, id: DerivedId, deps: SmallVec<[SourceId; 4]>) {
        let old = {
            let mut derived = self.derived.borrow_mut();
            match derived.get_mut(id) {
                Some(node) => std::mem::take(&mut node.dependencies),
                None => return,
            }
        };

        let mut signals = self.signals.borrow_mut();
        let mut derived = self.derived.borrow_mut();

        // Unsubscribe from old dependencies
        for dep in &old {
            let subscribers = match *dep {
                SourceId::Signal(sig) => signals.get_mut(sig).map(|n| &mut n.subscribers),
                SourceId::Derived(d) => derived.get_mut(d).map(|n| &mut n.subscribers),
            };
            if let Some(subscribers) = subscribers {
                subscribers.retain(|s| *s != id);
            }
        }

        // Subscribe to new dependencies
        let mut depth = 0;
        for dep in &deps {
            let subscribers = match *dep {
                SourceId::Signal(sig) => signals.get_mut(sig).map(|n| &mut n.subscribers),
                SourceId::Derived(d) => derived.get_mut(d).map(|n| {
                    depth = depth.max(n.depth);
                    &mut n.subscribers
                }),
            };
            if let Some(subscribers) = subscribers {
                if !subscribers.contains(&id) {
                    subscribers.push(id);
                }
            }
        }

        if let Some(node) = derived.get_mut(id) {
            node.dependencies = deps;
            node.depth = depth + 1;
        }
    }

    /// Mark a derived value and everything downstream of it as dirty
    fn mark_dirty(&self, id: DerivedId) {
        let subscribers = {
            let mut derived = self.derived.borrow_mut();
            let Some(node) = derived.get_mut(id) else {
                return;
            };
            if node.dirty {
                return;
            }
            node.dirty = true;
            node.subscribers.clone()
        };

        for sub in subscribers {
            self.mark_dirty(sub);
        }
    }

    /// Get statistics about the reactive graph
    pub fn stats(&self) -> ReactiveStats {
        ReactiveStats {
            signal_count: self.signals.borrow().len(),
            derived_count: self.derived.borrow().len(),
            global_version: self.global_version.get(),
        }
    }
}

impl Default for ReactiveGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the reactive graph
#[derive(Debug, Clone)]
pub struct ReactiveStats {
    pub signal_count: usize,
    pub derived_count: usize,
    pub global_version: u64,
}
