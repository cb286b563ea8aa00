//! prograreno: run a program in a container and talk to it over pipes
//!
//! A [`ContainedProcess`] launches one program through an isolation runtime
//! with a read-only root filesystem, a read-only program directory mounted at
//! `/x`, an address space limit and no new privileges. Its stdin and stdout
//! are exposed as ordinary line-oriented streams.
//!
//! # Example
//!
//! ```ignore
//! use prograreno::{ContainedProcessBuilder, CrunRuntime};
//!
//! let mut child = ContainedProcessBuilder::new(["/usr/bin/python3", "double.py"])
//!     .root("rootfs")
//!     .mount("child")
//!     .memory_limit_str("50M")?
//!     .build(CrunRuntime::default())?;
//!
//! child.start()?;
//! child.send_line("21")?;
//! assert_eq!(child.recv_line()?.as_deref(), Some("42"));
//! child.stop()?;
//! ```

pub mod config;
pub mod process;
pub mod stream;

mod stdio;

// Re-export sub-crate types for convenience
pub use prograreno_core::{self as core, ContainError, Result, util};
pub use prograreno_runtime::{CrunConfig, CrunRuntime, IsolationRuntime};
pub use prograreno_spec::{MemoryLimit, Mount, Rlimit, SpecDocument};

pub use config::{CONTAINED_USER, ContainedProcessBuilder, ContainmentConfig, PROGRAM_MOUNT};
pub use process::ContainedProcess;
pub use stream::{ProcessStdin, ProcessStdout};
