//! Test doubles for the isolation runtime

#![allow(dead_code)]

use nix::sys::stat::fstat;
use prograreno::{ContainError, IsolationRuntime, PROGRAM_MOUNT, Result, SpecDocument};
use serde_json::{Value, json};
use std::process::{Child, Command};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

static STDIO_TEST_LOCK: Mutex<()> = Mutex::new(());

/// Serializes tests that start contained processes (they repoint fds 0/1).
///
/// The harness reports finished tests on fd 1; the pause lets that land on
/// the real stdout before the next test repoints it.
pub fn stdio_guard() -> MutexGuard<'static, ()> {
    let guard = STDIO_TEST_LOCK
        .lock()
        .unwrap_or_else(|poison| poison.into_inner());
    std::thread::sleep(Duration::from_millis(20));
    guard
}

/// Device and inode behind fds 0 and 1
pub fn stdio_identity() -> [(u64, u64); 2] {
    [0, 1].map(|fd| {
        let stat = fstat(fd).expect("fstat");
        (stat.st_dev as u64, stat.st_ino as u64)
    })
}

pub fn template() -> Value {
    json!({
        "ociVersion": "1.0.0",
        "process": {
            "terminal": true,
            "user": {"uid": 1000, "gid": 1000},
            "args": ["sh"],
            "env": ["PATH=/usr/local/bin:/usr/bin:/bin"],
            "capabilities": {
                "bounding": ["CAP_KILL", "CAP_NET_BIND_SERVICE", "CAP_AUDIT_WRITE"],
                "permitted": ["CAP_KILL", "CAP_NET_BIND_SERVICE", "CAP_AUDIT_WRITE"]
            },
            "cwd": "/",
            "noNewPrivileges": false
        },
        "root": {"path": "rootfs", "readonly": false},
        "mounts": [{"destination": "/proc", "type": "proc", "source": "proc"}]
    })
}

/// Runtime that records calls and launches nothing
#[derive(Default)]
pub struct RecordingRuntime {
    pub calls: Mutex<Vec<String>>,
    pub fail_load: bool,
    pub fail_run: bool,
    pub fail_delete: bool,
}

#[derive(Debug)]
pub struct RecordedContext {
    pub id: String,
    pub detach: bool,
}

impl RecordingRuntime {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.split(' ').next() == Some(op))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl IsolationRuntime for RecordingRuntime {
    type Spec = SpecDocument;
    type Context = RecordedContext;

    fn default_spec(&self) -> Result<Value> {
        self.record("default_spec".to_string());
        Ok(template())
    }

    fn load_spec(&self, document: &str) -> Result<SpecDocument> {
        self.record("load_spec".to_string());
        if self.fail_load {
            return Err(ContainError::Runtime("invalid document".to_string()));
        }
        SpecDocument::from_json(document)
    }

    fn make_context(&self, id: &str, detach: bool) -> Result<RecordedContext> {
        self.record(format!("make_context {} {}", id, detach));
        Ok(RecordedContext {
            id: id.to_string(),
            detach,
        })
    }

    fn run(&self, context: &mut RecordedContext, _spec: &SpecDocument) -> Result<()> {
        self.record(format!("run {}", context.id));
        if self.fail_run {
            return Err(ContainError::Runtime("container failed to start".to_string()));
        }
        Ok(())
    }

    fn delete(&self, context: RecordedContext, id: &str, force: bool) -> Result<()> {
        assert_eq!(context.id, id);
        self.record(format!("delete {} {}", id, force));
        if self.fail_delete {
            return Err(ContainError::Runtime("container is busy".to_string()));
        }
        Ok(())
    }
}

/// Runtime that runs the program unconfined on the host, with the mounted
/// program directory as its working directory
#[derive(Default)]
pub struct HostRuntime {
    pids: Mutex<Vec<u32>>,
}

pub struct HostSpec {
    args: Vec<String>,
    workdir: String,
}

pub struct HostContext {
    detach: bool,
    child: Option<Child>,
}

impl HostRuntime {
    pub fn pids(&self) -> Vec<u32> {
        self.pids.lock().unwrap().clone()
    }
}

impl IsolationRuntime for HostRuntime {
    type Spec = HostSpec;
    type Context = HostContext;

    fn default_spec(&self) -> Result<Value> {
        Ok(template())
    }

    fn load_spec(&self, document: &str) -> Result<HostSpec> {
        let spec = SpecDocument::from_json(document)?;
        let workdir = spec
            .mounts()?
            .into_iter()
            .find(|mount| mount.destination == PROGRAM_MOUNT)
            .map(|mount| mount.source)
            .ok_or_else(|| ContainError::Runtime("no program mount".to_string()))?;
        Ok(HostSpec {
            args: spec.process()?.args,
            workdir,
        })
    }

    fn make_context(&self, _id: &str, detach: bool) -> Result<HostContext> {
        Ok(HostContext {
            detach,
            child: None,
        })
    }

    fn run(&self, context: &mut HostContext, spec: &HostSpec) -> Result<()> {
        let mut child = Command::new(&spec.args[0])
            .args(&spec.args[1..])
            .current_dir(&spec.workdir)
            .spawn()?;
        self.pids.lock().unwrap().push(child.id());
        if !context.detach {
            child.wait()?;
        }
        context.child = Some(child);
        Ok(())
    }

    fn delete(&self, context: HostContext, _id: &str, force: bool) -> Result<()> {
        if let Some(mut child) = context.child {
            if force {
                let _ = child.kill();
            }
            child.wait()?;
        }
        Ok(())
    }
}
