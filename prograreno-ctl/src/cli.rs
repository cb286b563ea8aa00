use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "prograreno-ctl")]
#[command(version, about = "Run a program in a container and talk to it over pipes", long_about = None)]
#[command(after_help = "EXAMPLES:
    # Relay lines typed on stdin to a contained program and print its answers
    prograreno-ctl run --root rootfs --mount program --memory 50M -- /usr/bin/python3 main.py

    # Print the OCI document that would be handed to crun
    prograreno-ctl spec --mount child -- /usr/bin/python3 double.py

    # Check that crun is usable
    prograreno-ctl check
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// crun executable
    #[arg(long, value_name = "PATH", env = "PROGRARENO_CRUN", global = true)]
    pub crun: Option<PathBuf>,

    /// crun state directory
    #[arg(long, value_name = "DIR", env = "PROGRARENO_STATE_ROOT", global = true)]
    pub state_root: Option<PathBuf>,

    /// Start from crun's rootless template
    #[arg(long, global = true)]
    pub rootless: bool,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a contained program and relay stdin lines to it
    Run(ProgramArgs),

    /// Print the container document without starting anything
    Spec(ProgramArgs),

    /// Check runtime requirements
    Check,
}

#[derive(Args, Debug, Clone)]
pub struct ProgramArgs {
    /// Root filesystem directory
    #[arg(short, long, value_name = "PATH", default_value = "rootfs")]
    pub root: PathBuf,

    /// Program directory, mounted read-only at /x
    #[arg(short, long, value_name = "PATH", default_value = "program")]
    pub mount: PathBuf,

    /// Memory limit (50M, 1G, unlimited)
    #[arg(long, value_name = "SIZE", default_value = "unlimited")]
    pub memory: String,

    /// Program and arguments, resolved inside the container
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}
