use anyhow::{Context, Result};
use clap::Args as ClapArgs;

use crate::bar::event_loop::{self, LoopOptions};
use crate::bar::{CharWidth, TerminalBar};
use crate::child::KillPg;
use crate::cli::{output, BarSettings};
use crate::config::BarConfig;
use crate::engine::StatusEngine;

#[derive(ClapArgs)]
pub struct Args {
    /// Shell command to run; overrides `status_command` from the config
    #[arg(long, short = 'c')]
    pub command: Option<String>,

    /// Symbol drawn between blocks
    #[arg(long)]
    pub separator_symbol: Option<String>,

    /// Pause the status command as soon as it speaks the JSON protocol
    #[arg(long)]
    pub hide_on_modifier: bool,

    /// Print statuslines without colors
    #[arg(long)]
    pub no_color: bool,

    /// Exit once the status command has exited
    #[arg(long)]
    pub exit_with_child: bool,

    /// Ignore control commands on stdin
    #[arg(long)]
    pub no_commands: bool,
}

pub fn run(args: Args, config: BarConfig) -> Result<()> {
    let command = args
        .command
        .or_else(|| config.status_command.clone())
        .filter(|c| !c.trim().is_empty())
        .context("no status command; pass --command or set status_command in the config")?;

    let settings = BarSettings::merge(
        &config,
        args.separator_symbol,
        args.hide_on_modifier,
        args.no_color,
    );
    let mut renderer = TerminalBar::new(
        std::io::stdout(),
        settings.engine.separator_symbol.as_deref(),
        settings.colors,
    );
    let mut engine = StatusEngine::new(settings.engine, Box::new(CharWidth), Box::new(KillPg));

    tracing::info!("starting status_command: {command}");
    let options = LoopOptions {
        command,
        exit_with_child: args.exit_with_child,
        read_commands: !args.no_commands,
    };
    event_loop::run(&mut engine, &mut renderer, &options)?;

    if args.exit_with_child {
        output::info("status_command exited");
    }
    Ok(())
}
