use thiserror::Error;

/// Errors constructing a [`crate::SplitOrderedHashSet`].
///
/// The core has essentially no recoverable error surface: membership
/// outcomes are booleans, not errors, and allocation failure is not caught.
/// The one place a caller can pass a genuinely invalid argument is an
/// explicit initial capacity.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CreateError {
    /// `initial_size` was not a power of two, or was below the minimum of 2.
    #[error("initial size {requested} must be a power of two >= 2")]
    InvalidInitialSize { requested: usize },
}
