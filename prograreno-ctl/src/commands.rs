use log::info;
use prograreno::{CrunRuntime, IsolationRuntime, util};
use std::io::Write;

use crate::cli::ProgramArgs;
use crate::runner::build_process;

/// Write the document the runtime would receive for `args`
pub fn print_spec<R: IsolationRuntime>(
    runtime: R,
    args: &ProgramArgs,
    mut output: impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let child = build_process(runtime, args)?;
    info!("Assembled document for {}", child.id());
    writeln!(output, "{}", child.spec().to_json_pretty()?)?;
    Ok(())
}

pub fn check_requirements(runtime: &CrunRuntime) {
    info!("Checking runtime requirements");
    println!("Checking runtime requirements...\n");

    let binary = runtime.config().binary.display();
    match runtime.version() {
        Ok(version) => println!("[✓] {} available ({})", binary, version),
        Err(e) => println!("[✗] {} NOT usable: {}", binary, e),
    }

    if util::is_root() {
        println!("[✓] Running as root");
    } else if runtime.config().rootless {
        println!("[✓] Rootless mode requested");
    } else {
        println!("[✗] NOT running as root (use --rootless for a rootless template)");
    }

    println!("\nSystem info:");
    println!("  UID: {}", util::get_uid());
    println!("  GID: {}", util::get_gid());
}
