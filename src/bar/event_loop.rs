//! The single-threaded loop that drives a [`StatusEngine`]: readiness of the
//! child's output, child exits, termination signals and control commands
//! read from stdin.

use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd, RawFd};

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::io::unix::AsyncFd;
use tokio::signal::unix::{signal, SignalKind};

use crate::bar::Renderer;
use crate::engine::StatusEngine;
use crate::status::{ClickEvent, Modifiers};

#[derive(Debug, Clone, Default)]
pub struct LoopOptions {
    pub command: String,
    /// Leave the loop once the child has been reaped.
    pub exit_with_child: bool,
    /// Accept `stop`, `cont` and `click` lines on stdin.
    pub read_commands: bool,
}

/// A control line typed by the user or piped in by a test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Stop,
    Cont,
    Click {
        index: usize,
        button: i32,
        modifiers: Modifiers,
    },
}

/// `stop`, `cont` or `click <block> [button] [modifier...]`.
pub fn parse_command(line: &str) -> Result<ControlCommand> {
    let mut words = line.split_whitespace();
    match words.next() {
        Some("stop") => Ok(ControlCommand::Stop),
        Some("cont") => Ok(ControlCommand::Cont),
        Some("click") => {
            let index = words
                .next()
                .context("click needs a block index")?
                .parse()
                .context("block index must be a number")?;
            let button = match words.next() {
                Some(b) => b.parse().context("button must be a number")?,
                None => 1,
            };
            let mut modifiers = Modifiers::default();
            for name in words {
                let Some(bit) = Modifiers::from_name(name) else {
                    bail!("unknown modifier '{name}'");
                };
                modifiers.0 |= bit;
            }
            Ok(ControlCommand::Click {
                index,
                button,
                modifiers,
            })
        }
        Some(other) => bail!("unknown command '{other}'"),
        None => bail!("empty command"),
    }
}

/// Run the engine until the user interrupts it, or until the child exits
/// when [`LoopOptions::exit_with_child`] is set. The child is killed on the
/// way out.
pub fn run(
    engine: &mut StatusEngine,
    renderer: &mut dyn Renderer,
    options: &LoopOptions,
) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    let result = runtime.block_on(drive(engine, renderer, options));
    // A pending stdin read would otherwise keep the runtime alive.
    runtime.shutdown_background();

    if let Err(e) = engine.kill_child() {
        tracing::warn!("{e}");
    }
    result
}

async fn drive(
    engine: &mut StatusEngine,
    renderer: &mut dyn Renderer,
    options: &LoopOptions,
) -> Result<()> {
    // Registered before the child exists so an early exit is not missed.
    let mut sigchld = signal(SignalKind::child()).context("failed to watch SIGCHLD")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to watch SIGINT")?;
    let mut sigterm = signal(SignalKind::terminate()).context("failed to watch SIGTERM")?;

    engine
        .start(&options.command)
        .context("failed to start status_command")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = options.read_commands;
    let mut watch = sync_watch(None, engine.read_fd())?;

    loop {
        tokio::select! {
            ready = readable(watch.as_ref().map(|w| &w.ready)) => {
                ready.context("failed to poll status_command output")?;
                engine.handle_readable(renderer).context("failed to read status_command output")?;
            }
            _ = sigchld.recv() => {
                // Output written just before exiting is shown first.
                if watch.is_some() {
                    engine.handle_readable(renderer).context("failed to read status_command output")?;
                }
                let reaped = engine.handle_child_exit(renderer).context("failed to reap status_command")?;
                if reaped && options.exit_with_child {
                    tracing::info!("status_command is gone, exiting");
                    break;
                }
            }
            _ = sigint.recv() => {
                tracing::info!("interrupted");
                break;
            }
            _ = sigterm.recv() => {
                tracing::info!("terminated");
                break;
            }
            line = lines.next_line(), if stdin_open => {
                match line.context("failed to read stdin")? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => match parse_command(&line) {
                        Ok(command) => apply(engine, renderer, command),
                        Err(e) => tracing::warn!("{e:#}"),
                    },
                    None => stdin_open = false,
                }
            }
        }

        watch = sync_watch(watch, engine.read_fd())?;
    }

    Ok(())
}

fn apply(engine: &mut StatusEngine, renderer: &mut dyn Renderer, command: ControlCommand) {
    tracing::debug!(?command, phase = ?engine.child_phase(), "control");
    match command {
        ControlCommand::Stop => engine.stop_child(),
        ControlCommand::Cont => engine.cont_child(),
        ControlCommand::Click {
            index,
            button,
            modifiers,
        } => {
            if !engine.want_click_events() {
                tracing::debug!("status_command did not ask for click events");
                return;
            }
            let Some(block) = engine.active().get(index) else {
                tracing::warn!("no block at index {index}");
                return;
            };
            let name = block.name.clone();
            let instance = block.instance.clone();
            let event = ClickEvent {
                button,
                name: name.as_deref(),
                instance: instance.as_deref(),
                modifiers,
                ..Default::default()
            };
            engine.send_block_clicked(&event, renderer);
        }
    }
}

/// Readiness registration for the child's output.
///
/// The reactor holds a duplicate of the pipe, so the registration stays
/// valid after the child's own descriptor is closed on cleanup.
struct Watch {
    /// The engine's descriptor this duplicates.
    source: RawFd,
    ready: AsyncFd<OwnedFd>,
}

/// Keep the registration in step with the descriptor the engine wants
/// watched.
fn sync_watch(current: Option<Watch>, wanted: Option<BorrowedFd<'_>>) -> Result<Option<Watch>> {
    let source = wanted.as_ref().map(AsRawFd::as_raw_fd);
    if current.as_ref().map(|w| w.source) == source {
        return Ok(current);
    }
    drop(current);
    let Some(fd) = wanted else {
        return Ok(None);
    };
    let dup = fd
        .try_clone_to_owned()
        .context("failed to duplicate status_command output")?;
    let ready = AsyncFd::new(dup).context("failed to watch status_command output")?;
    Ok(Some(Watch {
        source: fd.as_raw_fd(),
        ready,
    }))
}

/// Resolves when the watched descriptor is readable, never when there is
/// none. Readiness is cleared up front; the engine reads until it would
/// block.
async fn readable(watch: Option<&AsyncFd<OwnedFd>>) -> io::Result<()> {
    let Some(fd) = watch else {
        return std::future::pending().await;
    };
    let mut guard = fd.readable().await?;
    guard.clear_ready();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::fd::AsFd;
    use std::os::unix::net::UnixStream;
    use std::time::Duration;

    #[tokio::test]
    async fn watch_survives_closing_the_watched_descriptor() {
        let (reader, mut writer) = UnixStream::pair().unwrap();
        reader.set_nonblocking(true).unwrap();
        let source = reader.as_raw_fd();

        let watch = sync_watch(None, Some(reader.as_fd())).unwrap().unwrap();
        let watch = sync_watch(Some(watch), Some(reader.as_fd())).unwrap().unwrap();
        assert_eq!(watch.source, source);

        drop(reader);
        writer.write_all(b"x").unwrap();
        tokio::time::timeout(Duration::from_secs(5), readable(Some(&watch.ready)))
            .await
            .expect("readiness reported")
            .unwrap();

        assert!(sync_watch(Some(watch), None).unwrap().is_none());
    }

    #[test]
    fn simple_commands_parse() {
        assert_eq!(parse_command("stop").unwrap(), ControlCommand::Stop);
        assert_eq!(parse_command("  cont ").unwrap(), ControlCommand::Cont);
    }

    #[test]
    fn click_defaults_to_left_button() {
        assert_eq!(
            parse_command("click 2").unwrap(),
            ControlCommand::Click {
                index: 2,
                button: 1,
                modifiers: Modifiers::default(),
            }
        );
    }

    #[test]
    fn click_collects_modifiers() {
        let ControlCommand::Click {
            button, modifiers, ..
        } = parse_command("click 0 3 Shift Mod4").unwrap()
        else {
            panic!("not a click");
        };
        assert_eq!(button, 3);
        assert_eq!(modifiers.names(), ["Shift", "Mod4"]);
    }

    #[test]
    fn bad_commands_are_rejected() {
        assert!(parse_command("").is_err());
        assert!(parse_command("jump").is_err());
        assert!(parse_command("click").is_err());
        assert!(parse_command("click x").is_err());
        assert!(parse_command("click 0 1 Hyper").is_err());
    }
}
