//! A program running inside an isolation runtime, driven over pipes
//!
//! Starting a contained process:
//! 1. Create a caller→child and a child→caller pipe (close-on-exec)
//! 2. Under the process-wide stdio lock, point fds 0/1 at the child ends
//! 3. Load the document, create a detached context, run
//! 4. Restore fds 0/1, on every path
//! 5. Close the child ends and keep the caller ends as `stdin`/`stdout`

use log::{debug, info, warn};
use prograreno_core::{ContainError, Result};
use prograreno_runtime::IsolationRuntime;
use prograreno_spec::{MemoryLimit, SpecDocument};
use std::os::fd::AsFd;
use std::path::Path;
use uuid::Uuid;

use crate::config::ContainmentConfig;
use crate::stdio::{Pipe, StdioRedirect, stdio_lock};
use crate::stream::{ProcessStdin, ProcessStdout};

/// Context and streams of a started contained process. They exist together
/// or not at all.
struct ActiveRun<C> {
    context: C,
    stdin: ProcessStdin,
    stdout: ProcessStdout,
}

/// Run and communicate with a program in a contained environment.
///
/// While running (after [`start`](Self::start)), the program's standard
/// streams are available through [`stdin`](Self::stdin) and
/// [`stdout`](Self::stdout).
pub struct ContainedProcess<R: IsolationRuntime> {
    id: String,
    spec: SpecDocument,
    runtime: R,
    active: Option<ActiveRun<R::Context>>,
}

impl<R: IsolationRuntime> ContainedProcess<R> {
    /// Prepare a contained process. Nothing is started.
    ///
    /// `root` becomes the read-only root filesystem, `mount` is bind-mounted
    /// read-only at `/x` (the program's working directory).
    pub fn new<S: Into<String>>(
        runtime: R,
        args: impl IntoIterator<Item = S>,
        root: impl AsRef<Path>,
        mount: impl AsRef<Path>,
        memory_limit: MemoryLimit,
    ) -> Result<Self> {
        let config = ContainmentConfig {
            args: args.into_iter().map(Into::into).collect(),
            root: root.as_ref().to_path_buf(),
            mount: mount.as_ref().to_path_buf(),
            memory_limit,
        };
        Self::with_config(runtime, config)
    }

    pub(crate) fn with_config(runtime: R, config: ContainmentConfig) -> Result<Self> {
        config.validate()?;

        let id = Uuid::new_v4().to_string();
        let mut spec = SpecDocument::from_template(runtime.default_spec()?)?;
        config.apply_to(&mut spec)?;
        debug!("Prepared contained process {} for {:?}", id, config.args);

        Ok(Self {
            id,
            spec,
            runtime,
            active: None,
        })
    }

    /// Identifier naming the runtime context, stable across restarts
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The document handed to the runtime on start
    pub fn spec(&self) -> &SpecDocument {
        &self.spec
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Start the program. Does nothing if it is already running.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            debug!("Contained process {} already running", self.id);
            return Ok(());
        }

        let document = self
            .spec
            .to_json()
            .map_err(|e| ContainError::invocation("serialize specification", e))?;
        let to_child = Pipe::new().map_err(|e| ContainError::invocation("pipe", e))?;
        let to_parent = Pipe::new().map_err(|e| ContainError::invocation("pipe", e))?;

        let context = {
            let _lock = stdio_lock();
            let redirect = StdioRedirect::install(to_child.read.as_fd(), to_parent.write.as_fd())
                .map_err(|e| ContainError::invocation("redirect standard streams", e))?;
            let launched = self.launch(&document);
            let restored = redirect.restore();

            match (launched, restored) {
                (Ok(context), Ok(())) => context,
                (Ok(context), Err(e)) => {
                    self.discard(context);
                    return Err(ContainError::invocation("restore standard streams", e));
                }
                (Err(e), _) => return Err(e),
            }
        };

        // The program holds its own copies of these now.
        drop(to_child.read);
        drop(to_parent.write);

        self.active = Some(ActiveRun {
            context,
            stdin: ProcessStdin::new(to_child.write),
            stdout: ProcessStdout::new(to_parent.read),
        });
        info!("Started contained process {}", self.id);
        Ok(())
    }

    /// Load, create and run. Runs with fds 0/1 redirected: no logging here.
    fn launch(&self, document: &str) -> Result<R::Context> {
        let spec = self
            .runtime
            .load_spec(document)
            .map_err(|e| ContainError::invocation("load specification", e))?;
        let mut context = self
            .runtime
            .make_context(&self.id, true)
            .map_err(|e| ContainError::invocation("create context", e))?;

        match self.runtime.run(&mut context, &spec) {
            Ok(()) => Ok(context),
            Err(e) => match self.runtime.delete(context, &self.id, true) {
                Ok(()) => Err(ContainError::invocation("run", e)),
                // The context may still exist under this id; report both.
                Err(cleanup) => Err(ContainError::Invocation(format!(
                    "run: {}; delete after failed run: {}",
                    e, cleanup
                ))),
            },
        }
    }

    fn discard(&self, context: R::Context) {
        if let Err(e) = self.runtime.delete(context, &self.id, true) {
            warn!("Failed to delete context {}: {}", self.id, e);
        }
    }

    /// Stop the program, killing it if needed. Does nothing if not running.
    ///
    /// Streams are closed and the instance is stopped even when the runtime
    /// fails to delete the context; that failure is returned.
    pub fn stop(&mut self) -> Result<()> {
        let Some(active) = self.active.take() else {
            return Ok(());
        };

        let ActiveRun {
            context,
            stdin,
            stdout,
        } = active;
        drop(stdin);
        drop(stdout);

        self.runtime
            .delete(context, &self.id, true)
            .map_err(|e| ContainError::teardown("delete context", e))?;
        info!("Stopped contained process {}", self.id);
        Ok(())
    }

    /// Writer for the program's stdin
    pub fn stdin(&mut self) -> Result<&mut ProcessStdin> {
        self.active
            .as_mut()
            .map(|active| &mut active.stdin)
            .ok_or(ContainError::NotRunning)
    }

    /// Reader for the program's stdout
    pub fn stdout(&mut self) -> Result<&mut ProcessStdout> {
        self.active
            .as_mut()
            .map(|active| &mut active.stdout)
            .ok_or(ContainError::NotRunning)
    }

    /// Write one line to the program
    pub fn send_line(&mut self, line: &str) -> Result<()> {
        self.stdin()?.write_line(line)
    }

    /// Read one line from the program, `None` once its output has ended
    pub fn recv_line(&mut self) -> Result<Option<String>> {
        self.stdout()?.read_line()
    }
}

impl<R: IsolationRuntime> Drop for ContainedProcess<R> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Failed to stop contained process {}: {}", self.id, e);
        }
    }
}

impl<R: IsolationRuntime> std::fmt::Debug for ContainedProcess<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainedProcess")
            .field("id", &self.id)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
