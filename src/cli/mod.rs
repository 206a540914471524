pub mod output;
pub mod parse;
pub mod run;

use clap::{Parser, Subcommand};

use crate::config::BarConfig;
use crate::engine::EngineConfig;

/// Status line driver for i3bar-protocol status commands
#[derive(Parser)]
#[command(name = "statline", version, about, long_about = None)]
pub struct Cli {
    /// Config file to use instead of the discovered one
    #[arg(long, global = true, env = "STATLINE_CONFIG")]
    pub config: Option<String>,

    /// Logging verbosity for stderr: off, error, warn, info, debug
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a status command and print every statusline it produces
    Run(run::Args),

    /// Decode a recorded status command stream
    Parse(parse::Args),
}

/// Initialize tracing to stderr. Unknown levels fall back to `warn`.
pub fn init_logging(level: Option<&str>) {
    let filter = match level.unwrap_or("warn") {
        "off" => "off",
        "error" => "error",
        "warn" => "warn",
        "info" => "info",
        "debug" => "debug",
        other => {
            output::warning(&format!(
                "unknown log level '{}', defaulting to 'warn'",
                other
            ));
            "warn"
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

/// Settings shared by every subcommand that renders, after flags have been
/// layered over the config file.
#[derive(Debug, Clone)]
pub struct BarSettings {
    pub engine: EngineConfig,
    pub colors: bool,
}

impl BarSettings {
    pub fn merge(
        config: &BarConfig,
        separator_symbol: Option<String>,
        hide_on_modifier: bool,
        no_color: bool,
    ) -> Self {
        Self {
            engine: EngineConfig {
                separator_symbol: separator_symbol.or_else(|| config.separator_symbol.clone()),
                hide_on_modifier: hide_on_modifier || config.hide_on_modifier,
            },
            colors: config.colors && !no_color,
        }
    }
}
