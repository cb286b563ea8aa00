//! prograreno controller CLI - run a program in a container and talk to it over pipes

mod cli;
mod commands;
mod logging;
mod runner;

use clap::Parser;
use cli::{Cli, Commands};
use commands::{check_requirements, print_spec};
use console::style;
use runner::{RuntimeOptions, run_contained};

fn fail(e: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", style("error:").red().bold(), e);
    std::process::exit(1);
}

fn main() {
    let cli = Cli::parse();

    logging::init_logger(cli.verbose);

    let options = RuntimeOptions {
        crun: cli.crun,
        state_root: cli.state_root,
        rootless: cli.rootless,
    };
    let runtime = match options.runtime() {
        Ok(runtime) => runtime,
        Err(e) => fail(e),
    };

    let result = match cli.command {
        Commands::Run(args) => run_contained(runtime, args),
        Commands::Spec(args) => print_spec(runtime, &args, std::io::stdout().lock()),
        Commands::Check => {
            check_requirements(&runtime);
            Ok(())
        }
    };

    if let Err(e) = result {
        fail(e);
    }
}
