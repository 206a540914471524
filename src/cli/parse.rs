use std::io::Read;

use anyhow::{Context, Result};
use clap::builder::RangedU64ValueParser;
use clap::{Args as ClapArgs, ValueEnum};

use crate::bar::{CharWidth, JsonDump, Renderer, TerminalBar};
use crate::child::reader::CHUNK_SIZE;
use crate::child::KillPg;
use crate::cli::{output, BarSettings};
use crate::config::BarConfig;
use crate::engine::StatusEngine;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

#[derive(ClapArgs)]
pub struct Args {
    /// Recorded stream to read; stdin when omitted
    #[arg(long, short = 'i')]
    pub input: Option<String>,

    /// Bytes handed to the decoder per simulated read
    #[arg(long, default_value_t = CHUNK_SIZE, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub chunk_size: usize,

    /// How each statusline is printed
    #[arg(long, value_enum, default_value_t = Format::Text)]
    pub format: Format,

    /// Symbol drawn between blocks
    #[arg(long)]
    pub separator_symbol: Option<String>,

    /// Print statuslines without colors
    #[arg(long)]
    pub no_color: bool,
}

pub fn run(args: Args, config: BarConfig) -> Result<()> {
    let input = match &args.input {
        Some(path) => std::fs::read(path).with_context(|| format!("failed to read {path}"))?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };

    if input.is_empty() {
        output::warning("input is empty; nothing to parse");
        return Ok(());
    }

    let settings = BarSettings::merge(&config, args.separator_symbol, false, args.no_color);
    let stdout = std::io::stdout();
    let mut renderer: Box<dyn Renderer> = match args.format {
        Format::Text => Box::new(TerminalBar::new(
            stdout,
            settings.engine.separator_symbol.as_deref(),
            settings.colors,
        )),
        Format::Json => Box::new(JsonDump::new(stdout)),
    };

    let mut engine = StatusEngine::new(settings.engine, Box::new(CharWidth), Box::new(KillPg));
    for chunk in input.chunks(args.chunk_size) {
        engine.ingest(chunk, renderer.as_mut());
    }
    tracing::debug!(
        chunks = input.len().div_ceil(args.chunk_size),
        blocks = engine.active().len(),
        "parse finished"
    );
    Ok(())
}
