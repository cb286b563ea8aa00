//! Pipes and scoped redirection of the caller's standard descriptors
//!
//! The runtime gives the contained program whatever descriptors 0 and 1 point
//! at when it is invoked. [`StdioRedirect`] points them at pipe ends for the
//! duration of that call and puts the originals back afterwards, also when
//! dropped on an error path.

use log::warn;
use nix::fcntl::{FcntlArg, OFlag, fcntl};
use nix::unistd::{dup2, pipe2};
use prograreno_core::{ContainError, Result};
use std::io::Write;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::sync::{Mutex, MutexGuard};

static STDIO_LOCK: Mutex<()> = Mutex::new(());

/// Serializes every redirection of descriptors 0 and 1 in this process
pub(crate) fn stdio_lock() -> MutexGuard<'static, ()> {
    STDIO_LOCK
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

/// Both ends of a unidirectional pipe, close-on-exec
pub(crate) struct Pipe {
    pub read: OwnedFd,
    pub write: OwnedFd,
}

impl Pipe {
    pub fn new() -> Result<Self> {
        let (read, write) = pipe2(OFlag::O_CLOEXEC)
            .map_err(|e| ContainError::Syscall(format!("pipe2 failed: {}", e)))?;
        Ok(Self { read, write })
    }
}

/// Descriptors 0 and 1 temporarily pointing at other files
pub(crate) struct StdioRedirect {
    saved_stdin: Option<OwnedFd>,
    saved_stdout: Option<OwnedFd>,
}

impl StdioRedirect {
    /// Save descriptors 0 and 1, then point them at `stdin` and `stdout`.
    ///
    /// Buffered writes to the caller's stdout are flushed first so they land
    /// on the original descriptor.
    pub fn install(stdin: BorrowedFd<'_>, stdout: BorrowedFd<'_>) -> Result<Self> {
        let _ = std::io::stdout().flush();

        let mut redirect = Self {
            saved_stdin: Some(dup_cloexec(libc::STDIN_FILENO)?),
            saved_stdout: None,
        };
        redirect.saved_stdout = Some(dup_cloexec(libc::STDOUT_FILENO)?);

        // On failure the drop below restores whatever was replaced.
        dup_onto(stdin.as_raw_fd(), libc::STDIN_FILENO)?;
        dup_onto(stdout.as_raw_fd(), libc::STDOUT_FILENO)?;
        Ok(redirect)
    }

    /// Put the saved descriptors back, reporting failures
    pub fn restore(mut self) -> Result<()> {
        self.restore_saved()
    }

    fn restore_saved(&mut self) -> Result<()> {
        let mut result = Ok(());
        if let Some(saved) = self.saved_stdin.take() {
            result = dup_onto(saved.as_raw_fd(), libc::STDIN_FILENO);
        }
        if let Some(saved) = self.saved_stdout.take() {
            let restored = dup_onto(saved.as_raw_fd(), libc::STDOUT_FILENO);
            if result.is_ok() {
                result = restored;
            }
        }
        result
    }
}

impl Drop for StdioRedirect {
    fn drop(&mut self) {
        if let Err(e) = self.restore_saved() {
            warn!("Failed to restore standard descriptors: {}", e);
        }
    }
}

fn dup_cloexec(fd: RawFd) -> Result<OwnedFd> {
    let duplicate = fcntl(fd, FcntlArg::F_DUPFD_CLOEXEC(3))
        .map_err(|e| ContainError::Syscall(format!("dup of fd {} failed: {}", fd, e)))?;
    // SAFETY: F_DUPFD_CLOEXEC returned a fresh descriptor nobody else owns
    Ok(unsafe { OwnedFd::from_raw_fd(duplicate) })
}

fn dup_onto(src: RawFd, target: RawFd) -> Result<()> {
    dup2(src, target)
        .map(|_| ())
        .map_err(|e| ContainError::Syscall(format!("dup2 onto fd {} failed: {}", target, e)))
}
