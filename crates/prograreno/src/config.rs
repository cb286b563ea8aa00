//! Contained process configuration and builder

use prograreno_core::{ContainError, Result, util};
use prograreno_runtime::IsolationRuntime;
use prograreno_spec::{MemoryLimit, Mount, Process, Rlimit, Root, SpecDocument, User};
use std::path::{Path, PathBuf};

use crate::process::ContainedProcess;

/// Where the mounted program directory appears inside the container
pub const PROGRAM_MOUNT: &str = "/x";

/// Identity the program runs as inside the container. The runtime's
/// namespaces and capability set are what actually confine it.
pub const CONTAINED_USER: User = User { uid: 0, gid: 0 };

/// Inputs of a contained process
#[derive(Debug, Clone)]
pub struct ContainmentConfig {
    /// Program and arguments, resolved inside the container
    pub args: Vec<String>,
    /// Host directory used as the read-only root filesystem
    pub root: PathBuf,
    /// Host directory bind-mounted read-only at [`PROGRAM_MOUNT`]
    pub mount: PathBuf,
    /// Address space limit
    pub memory_limit: MemoryLimit,
}

impl Default for ContainmentConfig {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            root: PathBuf::from("rootfs"),
            mount: PathBuf::from("program"),
            memory_limit: MemoryLimit::Unlimited,
        }
    }
}

impl ContainmentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.args.is_empty() {
            return Err(ContainError::InvalidConfig(
                "Argument list cannot be empty".to_string(),
            ));
        }
        if self.args[0].is_empty() {
            return Err(ContainError::InvalidConfig(
                "Program name cannot be empty".to_string(),
            ));
        }
        self.memory_limit.validate()
    }

    /// Merge these settings into a runtime template.
    ///
    /// `root` and `mount` are made absolute here, so relative paths are
    /// interpreted against the current directory at construction time.
    pub fn apply_to(&self, spec: &mut SpecDocument) -> Result<()> {
        self.validate()?;

        let root = util::absolute_path(&self.root)?;
        let mount = util::absolute_path(&self.mount)?;

        spec.set_root(&Root {
            path: util::path_to_string(&root)?,
            readonly: true,
        })?;
        spec.set_process(&Process {
            terminal: false,
            cwd: PROGRAM_MOUNT.to_string(),
            args: self.args.clone(),
            user: CONTAINED_USER,
            no_new_privileges: true,
            rlimits: vec![Rlimit::address_space(self.memory_limit)],
        })?;
        spec.push_mount(&Mount::bind_readonly(
            util::path_to_string(&mount)?,
            PROGRAM_MOUNT,
        ))
    }
}

/// Builder for [`ContainedProcess`]
#[derive(Debug, Clone)]
pub struct ContainedProcessBuilder {
    config: ContainmentConfig,
}

impl ContainedProcessBuilder {
    /// Create a builder for a program and its arguments
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            config: ContainmentConfig {
                args: args.into_iter().map(Into::into).collect(),
                ..Default::default()
            },
        }
    }

    /// Set the root filesystem directory
    pub fn root(mut self, path: impl AsRef<Path>) -> Self {
        self.config.root = path.as_ref().to_path_buf();
        self
    }

    /// Set the directory mounted at [`PROGRAM_MOUNT`]
    pub fn mount(mut self, path: impl AsRef<Path>) -> Self {
        self.config.mount = path.as_ref().to_path_buf();
        self
    }

    /// Set memory limit
    pub fn memory_limit(mut self, bytes: u64) -> Self {
        self.config.memory_limit = MemoryLimit::Bytes(bytes);
        self
    }

    /// Set memory limit from string (e.g., "50M" or "unlimited")
    pub fn memory_limit_str(mut self, s: &str) -> Result<Self> {
        self.config.memory_limit = MemoryLimit::parse(s)?;
        Ok(self)
    }

    pub fn unlimited_memory(mut self) -> Self {
        self.config.memory_limit = MemoryLimit::Unlimited;
        self
    }

    pub fn config(&self) -> &ContainmentConfig {
        &self.config
    }

    /// Build the contained process. Nothing is started.
    pub fn build<R: IsolationRuntime>(self, runtime: R) -> Result<ContainedProcess<R>> {
        ContainedProcess::with_config(runtime, self.config)
    }
}
