//! Testing utilities and mock implementations
//!
//! Mocks for every collaborator seam, so the workflow can be exercised without
//! a rendering backend, an LLM or a live quiz server.

pub mod mocks;

pub use mocks::*;
