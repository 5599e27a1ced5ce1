use thiserror::Error;

/// Failures surfaced by resolution.
#[derive(Error, Debug)]
pub enum LoadError {
    /// No loader between the one asked and the root could locate the name.
    /// Carries the binary form (`java.lang.Object`).
    #[error("class not found: {name}")]
    ClassNotFound { name: String },

    /// Bytes were located but are not a valid definition of the name.
    /// Nothing is cached, a later resolution may succeed.
    #[error("malformed definition for {name}: {reason}")]
    MalformedDefinition { name: String, reason: String },

    /// The source could not be checked, as opposed to not containing the name.
    #[error("source {source_id} is unavailable: {cause}")]
    SourceUnavailable {
        source_id: String,
        cause: anyhow::Error,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl LoadError {
    pub fn not_found(name: impl Into<String>) -> Self {
        LoadError::ClassNotFound { name: name.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LoadError::ClassNotFound { .. })
    }
}

/// Failures building a hierarchy. These are always raised at construction,
/// never during resolution.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum HierarchyError {
    #[error("hierarchy declares no loaders")]
    Empty,

    #[error("loader {0} is declared more than once")]
    DuplicateLoader(String),

    #[error("loader {loader} names unknown parent {parent}")]
    UnknownParent { loader: String, parent: String },

    #[error("hierarchy has no root loader")]
    NoRoot,

    #[error("hierarchy has more than one root loader: {0:?}")]
    MultipleRoots(Vec<String>),

    #[error("parent chain of {0} forms a cycle")]
    Cycle(String),

    #[error("entry loader {0} is not declared")]
    UnknownEntry(String),

    #[error("built-in entry {name:?} is not a valid class name: {reason}")]
    InvalidEntry { name: String, reason: String },
}

#[macro_export]
macro_rules! internal {
    ($msg:literal $(,)?) => {
        $crate::LoadError::Internal(anyhow::anyhow!($msg))
    };
    ($err:expr $(,)?) => {
        $crate::LoadError::Internal(anyhow::anyhow!($err))
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::LoadError::Internal(anyhow::anyhow!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! internalise {
    () => {
        |f| $crate::internal!(f)
    };
}
