//! Error types for pantry_store

use crate::store::MemberKind;
use pantry_core::CoreError;
use thiserror::Error;

/// Errors that can occur while defining, building or using a store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Neither call shape produced a non-empty store id
    #[error("store definition has no id")]
    MissingId,

    /// An options record carrying its own id was combined with a second definition
    #[error("store `{id}` was given both an options record and a second definition")]
    AmbiguousDefinition { id: String },

    /// The state initializer did not return an object
    #[error("state of store `{id}` must be an object, found {found}")]
    InvalidState { id: String, found: &'static str },

    /// `use_store` was called where no registry was provided
    #[error("no store registry provided in this context (while resolving store `{id}`)")]
    NoRegistry { id: String },

    /// A store was requested while it was still being constructed
    #[error("store `{id}` was requested again while it was being constructed")]
    Reentrant { id: String },

    /// A getter was read before its store was registered
    #[error("getter `{getter}` of store `{id}` was read before the store was registered")]
    NotRegistered { id: String, getter: String },

    /// A getter read itself, directly or through other getters
    #[error("getter `{getter}` of store `{id}` depends on itself")]
    GetterCycle { id: String, getter: String },

    #[error("store `{id}` has no member `{name}`")]
    UnknownMember { id: String, name: String },

    #[error("member `{name}` of store `{id}` is {found}, expected {expected}")]
    WrongMemberKind {
        id: String,
        name: String,
        expected: MemberKind,
        found: MemberKind,
    },

    /// A detached action outlived its store
    #[error("store `{id}` no longer exists")]
    StoreDropped { id: String },

    #[error("store `{id}` was defined with a setup function and cannot be reset")]
    ResetUnsupported { id: String },

    #[error("missing action argument {index}")]
    MissingArgument { index: usize },

    #[error("action argument {index} could not be decoded: {source}")]
    InvalidArgument {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Reactive record failure
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Failure raised by user code: a state initializer, setup function or action
    #[error(transparent)]
    User(#[from] anyhow::Error),
}

impl StoreError {
    /// Convert an error returned by user code
    ///
    /// A `StoreError` that travelled through `anyhow` comes back out as itself.
    pub fn from_user(err: anyhow::Error) -> Self {
        match err.downcast::<StoreError>() {
            Ok(err) => err,
            Err(err) => StoreError::User(err),
        }
    }
}

/// Result type for pantry_store operations
pub type Result<T> = std::result::Result<T, StoreError>;
