//! Testing utilities
//!
//! Mock collaborators so the coordinator can be exercised without a generative backend
//! or a filesystem.

pub mod mocks;

pub use mocks::*;
