//! Embedded backend: collections held in memory, one directory per collection on disk.
//!
//! Every index type is accepted and recorded, but queries are always answered by an
//! exact cosine scan.

mod store;

pub use store::LocalStore;
