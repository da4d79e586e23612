//! Pantry Core
//!
//! This crate provides the primitives the Pantry store factory is built on:
//!
//! - **Reactive Graph**: signals and lazily recomputed derived values with
//!   automatic dependency tracking
//! - **Reactive Records**: keyed JSON records with one signal per field
//! - **Context**: a tree of scopes that provide values to their descendants
//!
//! # Example
//!
//! ```rust
//! use pantry_core::reactive::ReactiveGraph;
//!
//! let graph = ReactiveGraph::new();
//!
//! // Create a signal
//! let count = graph.create_signal(0i32);
//!
//! // Create a derived value
//! let doubled = graph.create_derived(move |g| g.get(count).unwrap_or(0) * 2);
//!
//! // Update the signal
//! graph.set(count, 5);
//! assert_eq!(graph.get_derived(doubled), Some(10));
//! ```

pub mod context;
pub mod error;
pub mod reactive;
pub mod record;

pub use context::Context;
pub use error::{CoreError, Result};
pub use reactive::{
    Derived, DerivedId, ReactiveGraph, ReactiveStats, SharedReactiveGraph, Signal, SignalId,
    SourceId,
};
pub use record::ReactiveRecord;

pub use serde_json::{json, Value};
