use console::{StyledObject, style};
use env_logger::{Builder, Env, Target};
use log::Level;
use std::io::Write;

/// Styled, fixed-width label printed before each record
fn level_label(level: Level) -> StyledObject<&'static str> {
    match level {
        Level::Error => style("ERROR").red().bold(),
        Level::Warn => style("WARN ").yellow().bold(),
        Level::Info => style("INFO ").green(),
        Level::Debug => style("DEBUG").cyan(),
        Level::Trace => style("TRACE").dim(),
    }
}

/// Log to stderr, which is never redirected into the contained program.
///
/// `RUST_LOG` takes precedence; without it `--verbose` selects debug and the
/// default is warn.
pub fn init_logger(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };

    Builder::from_env(Env::default().default_filter_or(default))
        .target(Target::Stderr)
        .format(|buf, record| writeln!(buf, "{} {}", level_label(record.level()), record.args()))
        .init();
}
