//! Generic lock-free building blocks used to assemble a split-ordered hash
//! set: an ordered singly-linked list with Harris/Michael-style logical and
//! physical deletion, a growable array of atomic node pointers, and a
//! split-ordered bucket directory layered on top of both.
//!
//! Reclamation is epoch-based (`crossbeam-epoch`): every public entry point
//! takes a `&Guard` pinned by the caller, and nodes are retired with
//! `Guard::defer_destroy` once physically unlinked, never freed directly.

pub mod bucket_directory;
pub mod growable_array;
pub mod list;
pub mod sort_key;

pub use list::{List, Node};
