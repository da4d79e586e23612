//! Pantry Store
//!
//! Shared reactive stores, keyed by id and created on first use.
//!
//! A store is defined once with [`define_store`] and obtained anywhere with
//! [`StoreDefinition::use_store`]. Every call for the same id in the same
//! application returns the same instance. Stores come in two styles:
//!
//! - **Options**: an initial `state`, a set of `actions` and a set of
//!   memoized `getters` ([`StoreOptions`])
//! - **Setup**: a function that builds its own reactive bindings and returns
//!   them as a record ([`SetupRecord`])
//!
//! # Example
//!
//! ```rust
//! use pantry_core::Context;
//! use pantry_store::{define_store, StoreOptions, StoreRegistry};
//! use serde_json::json;
//!
//! let use_counter = define_store(
//!     "counter",
//!     StoreOptions::new()
//!         .state(|| Ok(json!({ "count": 0 })))
//!         .action("inc", |store, _| {
//!             let count = store.get::<i64>("count")? + 1;
//!             store.set("count", count)?;
//!             Ok(count)
//!         }),
//! )
//! .unwrap();
//!
//! // One registry per application
//! let app = Context::root();
//! StoreRegistry::new().install(&app);
//!
//! // Any scope below the application sees the same instance
//! let page = app.child();
//! let a = use_counter.use_store(&app).unwrap();
//! let b = use_counter.use_store(&page).unwrap();
//!
//! a.call("inc", &[]).unwrap();
//! assert_eq!(b.get::<i64>("count").unwrap(), 1);
//! ```

pub mod config;
pub mod define;
pub mod error;
pub mod options;
pub mod registry;
pub mod setup;
pub mod store;

pub use config::RegistryConfig;
pub use define::{
    define_options_store, define_setup_store, define_store, Definition, StoreDefinition, StoreKey,
};
pub use error::{Result, StoreError};
pub use options::StoreOptions;
pub use registry::StoreRegistry;
pub use setup::{SetupFn, SetupMember, SetupRecord, SetupScope};
pub use store::{
    arg, ActionFn, BoundAction, GetterFn, Member, MemberKind, StateFn, Store, StoreKind,
};
