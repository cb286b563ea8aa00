use console::style;
use log::{debug, info};
use prograreno::{
    ContainedProcess, ContainedProcessBuilder, CrunConfig, CrunRuntime, IsolationRuntime,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;

use crate::cli::ProgramArgs;

/// Runtime flags shared by all subcommands
pub struct RuntimeOptions {
    pub crun: Option<PathBuf>,
    pub state_root: Option<PathBuf>,
    pub rootless: bool,
}

impl RuntimeOptions {
    pub fn crun_config(&self) -> CrunConfig {
        let mut config = CrunConfig::default();
        if let Some(binary) = &self.crun {
            config.binary = binary.clone();
        }
        config.state_root = self.state_root.clone();
        config.rootless = self.rootless;
        config
    }

    pub fn runtime(&self) -> prograreno::Result<CrunRuntime> {
        CrunRuntime::new(self.crun_config())
    }
}

/// Build a contained process from command line arguments
pub fn build_process<R: IsolationRuntime>(
    runtime: R,
    args: &ProgramArgs,
) -> prograreno::Result<ContainedProcess<R>> {
    let builder = ContainedProcessBuilder::new(args.args.iter().cloned())
        .root(&args.root)
        .mount(&args.mount)
        .memory_limit_str(&args.memory)?;

    let config = builder.config();
    debug!(
        "Root: {:?}, mount: {:?}, memory: {}",
        config.root, config.mount, config.memory_limit
    );
    builder.build(runtime)
}

/// Forward each input line to the program and print its answer.
///
/// Stops at the end of `input` or when the program closes its output.
/// Returns the number of answered lines.
pub fn relay<R: IsolationRuntime>(
    child: &mut ContainedProcess<R>,
    input: impl BufRead,
    mut output: impl Write,
) -> Result<usize, Box<dyn std::error::Error>> {
    let mut answered = 0;
    for line in input.lines() {
        let line = line?;
        writeln!(output, "{} {}", style("parent:").dim(), line)?;
        child.send_line(&line)?;

        match child.recv_line()? {
            Some(answer) => {
                writeln!(output, "{} {}", style("child:").bold(), answer)?;
                writeln!(output)?;
                answered += 1;
            }
            None => {
                info!("Contained program closed its output");
                break;
            }
        }
    }
    Ok(answered)
}

pub fn run_contained<R: IsolationRuntime>(
    runtime: R,
    args: ProgramArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut child = build_process(runtime, &args)?;

    info!("Starting {:?} as {}", args.args, child.id());
    child.start()?;

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let relayed = relay(&mut child, stdin.lock(), stdout.lock());

    let stopped = child.stop();
    let answered = relayed?;
    stopped?;

    info!("Relayed {} lines", answered);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prograreno::{ContainError, PROGRAM_MOUNT, SpecDocument};
    use serde_json::{Value, json};
    use std::process::{Child, Command};
    use std::sync::{Mutex, MutexGuard};
    use std::time::Duration;

    static STDIO_TEST_LOCK: Mutex<()> = Mutex::new(());

    /// Serializes relay tests; they repoint fds 0/1 while starting. The
    /// pause lets the harness finish reporting other tests first.
    fn stdio_guard() -> MutexGuard<'static, ()> {
        let guard = STDIO_TEST_LOCK
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        std::thread::sleep(Duration::from_millis(50));
        guard
    }

    /// Runs the program on the host, ignoring isolation
    struct Unconfined;

    impl IsolationRuntime for Unconfined {
        type Spec = SpecDocument;
        type Context = Option<Child>;

        fn default_spec(&self) -> prograreno::Result<Value> {
            Ok(json!({
                "ociVersion": "1.0.0",
                "process": {},
                "root": {"path": "rootfs"},
                "mounts": []
            }))
        }

        fn load_spec(&self, document: &str) -> prograreno::Result<SpecDocument> {
            SpecDocument::from_json(document)
        }

        fn make_context(&self, _id: &str, _detach: bool) -> prograreno::Result<Option<Child>> {
            Ok(None)
        }

        fn run(&self, context: &mut Option<Child>, spec: &SpecDocument) -> prograreno::Result<()> {
            let args = spec.process()?.args;
            let workdir = spec
                .mounts()?
                .into_iter()
                .find(|m| m.destination == PROGRAM_MOUNT)
                .map(|m| m.source)
                .ok_or_else(|| ContainError::Runtime("no program mount".to_string()))?;
            *context = Some(Command::new(&args[0]).args(&args[1..]).current_dir(workdir).spawn()?);
            Ok(())
        }

        fn delete(&self, context: Option<Child>, _id: &str, _force: bool) -> prograreno::Result<()> {
            if let Some(mut child) = context {
                let _ = child.kill();
                child.wait()?;
            }
            Ok(())
        }
    }

    fn program_args(tmp: &tempfile::TempDir, script: &str) -> ProgramArgs {
        ProgramArgs {
            root: tmp.path().to_path_buf(),
            mount: tmp.path().to_path_buf(),
            memory: "50M".to_string(),
            args: vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()],
        }
    }

    #[test]
    fn crun_config_from_options() {
        let options = RuntimeOptions {
            crun: Some(PathBuf::from("/opt/crun")),
            state_root: Some(PathBuf::from("/run/prograreno")),
            rootless: true,
        };
        let config = options.crun_config();
        assert_eq!(config.binary, PathBuf::from("/opt/crun"));
        assert_eq!(config.state_root, Some(PathBuf::from("/run/prograreno")));
        assert!(config.rootless);
    }

    #[test]
    fn build_process_rejects_bad_memory() {
        let tmp = tempfile::tempdir().unwrap();
        let mut args = program_args(&tmp, "true");
        args.memory = "plenty".to_string();
        assert!(build_process(Unconfined, &args).is_err());
    }

    #[test]
    fn relay_doubles_each_line() {
        let _guard = stdio_guard();
        let tmp = tempfile::tempdir().unwrap();
        let args = program_args(&tmp, "while read n; do echo $((n * 2)); done");
        let mut child = build_process(Unconfined, &args).unwrap();

        child.start().unwrap();
        let mut output = Vec::new();
        let answered = relay(&mut child, "21\n4\n".as_bytes(), &mut output).unwrap();
        child.stop().unwrap();

        assert_eq!(answered, 2);
        let text = console::strip_ansi_codes(std::str::from_utf8(&output).unwrap()).to_string();
        assert!(text.contains("parent: 21\nchild: 42\n"));
        assert!(text.contains("parent: 4\nchild: 8\n"));
    }

    #[test]
    fn relay_stops_when_program_exits() {
        let _guard = stdio_guard();
        let tmp = tempfile::tempdir().unwrap();
        let args = program_args(&tmp, "exit 0");
        let mut child = build_process(Unconfined, &args).unwrap();

        child.start().unwrap();
        let mut output = Vec::new();
        let answered = relay(&mut child, "1\n2\n3\n".as_bytes(), &mut output);
        child.stop().unwrap();

        // The program may be gone before the first write lands.
        match answered {
            Ok(count) => assert_eq!(count, 0),
            Err(e) => assert!(e.to_string().contains("Broken pipe")),
        }
    }
}
