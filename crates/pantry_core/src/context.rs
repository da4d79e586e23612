//! Scoped context for providing values to a subtree
//!
//! A [`Context`] is one node in a tree of scopes. A value provided on a scope
//! is visible to that scope and every descendant; the nearest provider wins.
//! Values are keyed by their type, the same way keyed hook state is keyed by
//! `TypeId`.
//!
//! ```rust
//! use pantry_core::Context;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Theme(&'static str);
//!
//! let app = Context::root();
//! app.provide(Theme("light"));
//!
//! let panel = app.child();
//! assert_eq!(panel.resolve::<Theme>(), Some(Theme("light")));
//!
//! panel.provide(Theme("dark"));
//! assert_eq!(panel.resolve::<Theme>(), Some(Theme("dark")));
//! assert_eq!(app.resolve::<Theme>(), Some(Theme("light")));
//! ```

use rustc_hash::FxHashMap;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

struct Scope {
    parent: Option<Context>,
    provided: RefCell<FxHashMap<TypeId, Rc<dyn Any>>>,
    depth: usize,
}

/// A scope in the component tree
#[derive(Clone)]
pub struct Context {
    scope: Rc<Scope>,
}

impl Context {
    /// Create a scope with no parent
    pub fn root() -> Self {
        Self {
            scope: Rc::new(Scope {
                parent: None,
                provided: RefCell::new(FxHashMap::default()),
                depth: 0,
            }),
        }
    }

    /// Create a scope that inherits everything provided here
    pub fn child(&self) -> Self {
        Self {
            scope: Rc::new(Scope {
                parent: Some(self.clone()),
                provided: RefCell::new(FxHashMap::default()),
                depth: self.scope.depth + 1,
            }),
        }
    }

    pub fn parent(&self) -> Option<&Context> {
        self.scope.parent.as_ref()
    }

    /// Distance from the root scope
    pub fn depth(&self) -> usize {
        self.scope.depth
    }

    /// Provide a value to this scope and its descendants
    ///
    /// Replaces any value of the same type provided on this scope.
    pub fn provide<T: Clone + 'static>(&self, value: T) {
        self.scope
            .provided
            .borrow_mut()
            .insert(TypeId::of::<T>(), Rc::new(value));
    }

    /// Find the nearest provided value of type `T`
    pub fn resolve<T: Clone + 'static>(&self) -> Option<T> {
        let mut current = Some(self);
        while let Some(cx) = current {
            let found = cx
                .scope
                .provided
                .borrow()
                .get(&TypeId::of::<T>())
                .and_then(|value| value.downcast_ref::<T>().cloned());
            if found.is_some() {
                return found;
            }
            current = cx.parent();
        }
        None
    }

    /// Whether a value of type `T` is visible from this scope
    pub fn has<T: 'static>(&self) -> bool {
        let mut current = Some(self);
        while let Some(cx) = current {
            if cx.scope.provided.borrow().contains_key(&TypeId::of::<T>()) {
                return true;
            }
            current = cx.parent();
        }
        false
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("depth", &self.scope.depth)
            .field("provided", &self.scope.provided.borrow().len())
            .finish()
    }
}
