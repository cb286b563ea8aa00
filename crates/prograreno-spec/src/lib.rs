//! prograreno-spec: the isolation document handed to the runtime
//!
//! The runtime supplies a baseline OCI configuration template. This crate
//! models only the fields prograreno sets (root, process, mounts, address
//! space limit) and merges them over that template, leaving everything else
//! as the runtime produced it.

pub mod document;
pub mod mount;
pub mod rlimit;

pub use document::{Process, Root, SpecDocument, User};
pub use mount::Mount;
pub use rlimit::{MemoryLimit, RLIM_INFINITY, Rlimit};
