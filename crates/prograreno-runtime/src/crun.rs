//! crun-backed isolation runtime
//!
//! Each context gets a bundle directory `<bundle_root>/<id>` holding the
//! `config.json` written by [`IsolationRuntime::run`]. The container is
//! started with `crun run --detach`, which hands the caller's stdio straight
//! to the contained program, and removed with `crun delete --force`.

use log::{debug, warn};
use prograreno_core::{ContainError, Result};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output, Stdio};

use crate::IsolationRuntime;

/// Environment variable overriding the crun binary
pub const CRUN_BINARY_ENV: &str = "PROGRARENO_CRUN";

const CONFIG_FILE: &str = "config.json";

/// crun runtime configuration
#[derive(Debug, Clone)]
pub struct CrunConfig {
    /// crun executable (looked up in PATH when not absolute)
    pub binary: PathBuf,
    /// crun state directory (`--root`), crun's default when unset
    pub state_root: Option<PathBuf>,
    /// Directory under which per-context bundles are created
    pub bundle_root: PathBuf,
    /// Ask crun for a rootless template
    pub rootless: bool,
}

impl Default for CrunConfig {
    fn default() -> Self {
        Self {
            binary: std::env::var_os(CRUN_BINARY_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("crun")),
            state_root: None,
            bundle_root: std::env::temp_dir().join("prograreno"),
            rootless: false,
        }
    }
}

impl CrunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.binary.as_os_str().is_empty() {
            return Err(ContainError::InvalidConfig(
                "crun binary cannot be empty".to_string(),
            ));
        }
        if self.bundle_root.as_os_str().is_empty() {
            return Err(ContainError::InvalidConfig(
                "Bundle root cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// A document accepted by [`CrunRuntime::load_spec`]
#[derive(Debug, Clone)]
pub struct CrunSpec {
    document: String,
}

impl CrunSpec {
    pub fn as_str(&self) -> &str {
        &self.document
    }
}

/// Bundle directory and mode of one container run
#[derive(Debug)]
pub struct CrunContext {
    id: String,
    bundle: PathBuf,
    detach: bool,
}

impl CrunContext {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bundle(&self) -> &Path {
        &self.bundle
    }

    pub fn is_detached(&self) -> bool {
        self.detach
    }
}

/// Runtime that shells out to the crun binary
#[derive(Debug, Clone, Default)]
pub struct CrunRuntime {
    config: CrunConfig,
}

impl CrunRuntime {
    pub fn new(config: CrunConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CrunConfig {
        &self.config
    }

    /// First line of `crun --version`
    pub fn version(&self) -> Result<String> {
        let output = self.output(Command::new(&self.config.binary).arg("--version"), "version")?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.config.binary);
        if let Some(root) = &self.config.state_root {
            cmd.arg("--root").arg(root);
        }
        cmd
    }

    /// Run with captured output, failing on a non-zero exit
    fn output(&self, cmd: &mut Command, op: &str) -> Result<Output> {
        let output = cmd
            .stdin(Stdio::null())
            .output()
            .map_err(|e| spawn_error(&self.config.binary, op, e))?;
        check_status(op, output.status, &output.stderr)?;
        Ok(output)
    }
}

impl IsolationRuntime for CrunRuntime {
    type Spec = CrunSpec;
    type Context = CrunContext;

    fn default_spec(&self) -> Result<Value> {
        let scratch = tempfile::Builder::new()
            .prefix("prograreno-spec-")
            .tempdir()?;

        let mut cmd = self.command();
        cmd.arg("spec").current_dir(scratch.path());
        if self.config.rootless {
            cmd.arg("--rootless");
        }
        self.output(&mut cmd, "spec")?;

        let template = fs::read_to_string(scratch.path().join(CONFIG_FILE))?;
        Ok(serde_json::from_str(&template)?)
    }

    fn load_spec(&self, document: &str) -> Result<CrunSpec> {
        let value: Value = serde_json::from_str(document)?;
        let object = value.as_object().ok_or_else(|| {
            ContainError::Runtime("Specification must be a JSON object".to_string())
        })?;
        for key in ["ociVersion", "root", "process"] {
            if !object.contains_key(key) {
                return Err(ContainError::Runtime(format!(
                    "Specification is missing `{}`",
                    key
                )));
            }
        }
        Ok(CrunSpec {
            document: document.to_string(),
        })
    }

    fn make_context(&self, id: &str, detach: bool) -> Result<CrunContext> {
        if id.is_empty() || id.contains('/') || id == "." || id == ".." {
            return Err(ContainError::InvalidConfig(format!(
                "Invalid container id: {:?}",
                id
            )));
        }

        let bundle = self.config.bundle_root.join(id);
        fs::create_dir_all(&bundle).map_err(|e| {
            ContainError::Runtime(format!(
                "Failed to create bundle {}: {}",
                bundle.display(),
                e
            ))
        })?;
        debug!("Created bundle {}", bundle.display());

        Ok(CrunContext {
            id: id.to_string(),
            bundle,
            detach,
        })
    }

    fn run(&self, context: &mut CrunContext, spec: &CrunSpec) -> Result<()> {
        fs::write(context.bundle.join(CONFIG_FILE), spec.as_str())?;

        let mut cmd = self.command();
        cmd.arg("run");
        if context.detach {
            cmd.arg("--detach");
        }
        cmd.arg("--bundle").arg(&context.bundle).arg(&context.id);

        // stdio is inherited on purpose: it is the container's stdio.
        let status = cmd
            .status()
            .map_err(|e| spawn_error(&self.config.binary, "run", e))?;
        check_status("run", status, &[])
    }

    fn delete(&self, context: CrunContext, id: &str, force: bool) -> Result<()> {
        let mut cmd = self.command();
        cmd.arg("delete");
        if force {
            cmd.arg("--force");
        }
        cmd.arg(id).stdout(Stdio::null());
        let deleted = self.output(&mut cmd, "delete").map(|_| ());

        match fs::remove_dir_all(&context.bundle) {
            Ok(()) => debug!("Removed bundle {}", context.bundle.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove bundle {}: {}",
                context.bundle.display(),
                e
            ),
        }

        deleted
    }
}

fn spawn_error(binary: &Path, op: &str, err: io::Error) -> ContainError {
    ContainError::Runtime(format!(
        "crun {}: cannot execute {}: {}",
        op,
        binary.display(),
        err
    ))
}

fn check_status(op: &str, status: ExitStatus, stderr: &[u8]) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(stderr);
    let detail = stderr.trim();
    Err(ContainError::Runtime(if detail.is_empty() {
        format!("crun {} failed with {}", op, status)
    } else {
        format!("crun {} failed with {}: {}", op, status, detail)
    }))
}
