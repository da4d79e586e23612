//! Store definitions
//!
//! [`define_store`] accepts three call shapes:
//!
//! ```text
//! define_store("id", StoreOptions)            // id + options
//! define_store(StoreOptions::with_id("id"), ()) // options carrying their id
//! define_store("id", Definition::setup(f))     // id + setup function
//! ```
//!
//! and returns a [`StoreDefinition`], whose [`use_store`](StoreDefinition::use_store)
//! hands out the one shared instance for the registry visible from a context.

use crate::error::{Result, StoreError};
use crate::options::{build_options_store, StoreOptions};
use crate::registry::StoreRegistry;
use crate::setup::{build_setup_store, SetupFn, SetupRecord, SetupScope};
use crate::store::{Store, StoreKind};
use pantry_core::Context;
use std::fmt;
use std::rc::Rc;

/// First argument of [`define_store`]: an id, or options carrying one
pub enum StoreKey {
    Id(String),
    Options(StoreOptions),
}

impl From<&str> for StoreKey {
    fn from(id: &str) -> Self {
        StoreKey::Id(id.to_string())
    }
}

impl From<String> for StoreKey {
    fn from(id: String) -> Self {
        StoreKey::Id(id)
    }
}

impl From<StoreOptions> for StoreKey {
    fn from(options: StoreOptions) -> Self {
        StoreKey::Options(options)
    }
}

/// Second argument of [`define_store`]
pub enum Definition {
    /// Nothing: the first argument carries the whole definition
    Empty,
    Options(StoreOptions),
    Setup(SetupFn),
}

impl Definition {
    /// Wrap a setup function
    pub fn setup<F>(setup: F) -> Self
    where
        F: Fn(&SetupScope) -> anyhow::Result<SetupRecord> + 'static,
    {
        Definition::Setup(Rc::new(setup))
    }
}

impl From<()> for Definition {
    fn from(_: ()) -> Self {
        Definition::Empty
    }
}

impl From<StoreOptions> for Definition {
    fn from(options: StoreOptions) -> Self {
        Definition::Options(options)
    }
}

#[derive(Clone)]
enum Source {
    Options(StoreOptions),
    Setup(SetupFn),
}

/// The accessor returned by [`define_store`]
#[derive(Clone)]
pub struct StoreDefinition {
    id: Rc<str>,
    source: Source,
}

/// Define a store from any of the three call shapes
///
/// If the first argument is an id, the second is the definition. Otherwise
/// the first argument is an options record and its own id is used; passing a
/// second definition alongside it is rejected. An id given as the first
/// argument takes precedence over an id inside the options. A missing or
/// blank id fails here, not on first use.
pub fn define_store(
    key: impl Into<StoreKey>,
    definition: impl Into<Definition>,
) -> Result<StoreDefinition> {
    let (id, source) = match (key.into(), definition.into()) {
        (StoreKey::Id(id), Definition::Setup(setup)) => (Some(id), Source::Setup(setup)),
        (StoreKey::Id(id), Definition::Options(options)) => (Some(id), Source::Options(options)),
        (StoreKey::Id(id), Definition::Empty) => (Some(id), Source::Options(StoreOptions::new())),
        (StoreKey::Options(options), Definition::Empty) => {
            (options.id_ref().map(str::to_string), Source::Options(options))
        }
        (StoreKey::Options(options), _) => {
            return Err(StoreError::AmbiguousDefinition {
                id: options.id_ref().unwrap_or_default().to_string(),
            })
        }
    };

    let id = id
        .filter(|id| !id.trim().is_empty())
        .ok_or(StoreError::MissingId)?;

    tracing::trace!(store = %id, "store defined");
    Ok(StoreDefinition {
        id: Rc::from(id),
        source,
    })
}

/// Define an options-style store whose options carry the id
pub fn define_options_store(options: StoreOptions) -> Result<StoreDefinition> {
    define_store(options, ())
}

/// Define a setup-style store
pub fn define_setup_store<F>(id: impl Into<String>, setup: F) -> Result<StoreDefinition>
where
    F: Fn(&SetupScope) -> anyhow::Result<SetupRecord> + 'static,
{
    define_store(id.into(), Definition::setup(setup))
}

impl StoreDefinition {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> StoreKind {
        match self.source {
            Source::Options(_) => StoreKind::Options,
            Source::Setup(_) => StoreKind::Setup,
        }
    }

    /// The shared instance for the registry visible from `cx`
    ///
    /// Fails with [`StoreError::NoRegistry`] if no registry was installed in
    /// `cx` or any of its ancestors.
    pub fn use_store(&self, cx: &Context) -> Result<Store> {
        let registry =
            StoreRegistry::from_context(cx).ok_or_else(|| StoreError::NoRegistry {
                id: self.id.to_string(),
            })?;
        self.use_store_in(&registry)
    }

    /// The shared instance for an explicit registry
    ///
    /// Returns the cached store if there is one. Otherwise builds it, caches
    /// it and returns it. A build that fails caches nothing.
    pub fn use_store_in(&self, registry: &StoreRegistry) -> Result<Store> {
        if let Some(store) = registry.get(&self.id) {
            return Ok(store);
        }

        let _span = tracing::debug_span!(
            "use_store",
            registry = %registry.config().label,
            store = %self.id
        )
        .entered();
        let _guard = registry.begin_construction(&self.id)?;

        match &self.source {
            Source::Setup(setup) => {
                build_setup_store(&self.id, registry, StoreKind::Setup, None, |scope| {
                    setup(scope).map_err(StoreError::from_user)
                })
            }
            Source::Options(options) => build_options_store(&self.id, options, registry),
        }
    }
}

impl fmt::Debug for StoreDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreDefinition")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .finish()
    }
}
