//! prograreno-core: shared types and errors for prograreno
//!
//! This crate provides the foundational types used by all prograreno sub-crates:
//! - Error types and Result alias
//! - Utility functions (absolute path resolution, memory parsing, UID/GID queries)

pub mod error;
pub mod util;

pub use error::{ContainError, Result};
