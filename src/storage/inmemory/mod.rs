//! In-memory storage implementations
//!
//! This module provides an in-memory document store suitable for development
//! and testing. Client and token stores run unchanged on top of it.

mod documents;

pub use documents::MemoryDocumentStore;
