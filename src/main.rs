mod bar;
mod child;
mod cli;
mod config;
mod engine;
mod error;
mod status;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli::init_logging(cli.log_level.as_deref());
    let config = config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Run(args) => cli::run::run(args, config),
        Command::Parse(args) => cli::parse::run(args, config),
    }
}
