//! A lock-free, concurrent, extensible hash set of 32-bit unsigned keys,
//! built on a single split-ordered list (Shalev & Shavit).
//!
//! The set never locks and never rehashes: growth only ever splices new
//! bucket-delimiter nodes into the list that's already there. See
//! [`SplitOrderedHashSet`] for the public surface.

pub mod error;
mod set;

pub use error::CreateError;
pub use set::SplitOrderedHashSet;
