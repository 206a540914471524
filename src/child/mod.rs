//! Supervision of the status command: spawning it in its own process group,
//! pausing and resuming it, reading its output and writing click events to
//! it.

pub mod reader;
pub mod sys;

use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};

use crate::error::ChildError;
use crate::status::click::{self, ClickEvent};
use crate::status::ProtocolHeader;

pub use reader::ReadOutcome;
pub use sys::{KillPg, SignalSink};

const SHELL: &str = "/bin/sh";

/// What the bar knows about the running status command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildRecord {
    pub pid: i32,
    pub stopped: bool,
    /// `0` disables pausing.
    pub stop_signal: i32,
    /// `0` disables resuming.
    pub cont_signal: i32,
    /// The child asked for click events in its header.
    pub click_events: bool,
    /// The click stream's opening `[` has been written.
    pub click_events_init: bool,
    /// Negotiated protocol version, `0` for plain text.
    pub version: u32,
}

impl ChildRecord {
    pub fn apply_header(&mut self, header: &ProtocolHeader) {
        self.version = header.version;
        self.stop_signal = header.stop_signal;
        self.cont_signal = header.cont_signal;
        self.click_events = header.click_events;
    }

    /// Pause the whole process group. Returns whether a signal was sent.
    pub fn stop(&mut self, sink: &dyn SignalSink) -> Result<bool, ChildError> {
        if self.stop_signal <= 0 || self.stopped {
            return Ok(false);
        }
        self.stopped = true;
        self.signal(sink, self.stop_signal)?;
        Ok(true)
    }

    /// Resume the whole process group. Returns whether a signal was sent.
    pub fn cont(&mut self, sink: &dyn SignalSink) -> Result<bool, ChildError> {
        if self.cont_signal <= 0 || !self.stopped {
            return Ok(false);
        }
        self.stopped = false;
        self.signal(sink, self.cont_signal)?;
        Ok(true)
    }

    /// Ask the process group to exit. A stopped group is resumed first so
    /// the terminate signal is acted on.
    fn terminate(&self, sink: &dyn SignalSink) {
        if self.cont_signal > 0 && self.stopped {
            if let Err(e) = self.signal(sink, self.cont_signal) {
                tracing::debug!("{e}");
            }
        }
        if let Err(e) = self.signal(sink, libc::SIGTERM) {
            tracing::debug!("{e}");
        }
    }

    fn signal(&self, sink: &dyn SignalSink, signal: i32) -> Result<(), ChildError> {
        sink.signal_group(self.pid, signal)
            .map_err(|source| ChildError::Signal { signal, source })
    }

    fn trace(&self, op: &str) {
        tracing::debug!(
            op,
            pid = self.pid,
            stopped = self.stopped,
            stop_signal = self.stop_signal,
            cont_signal = self.cont_signal,
            click_events = self.click_events,
            click_events_init = self.click_events_init,
            version = self.version,
            "status_command"
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildPhase {
    Absent,
    Running,
    Stopped,
}

/// Which kind of read the next readable event is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPhase {
    /// The first chunk, used to detect the protocol.
    FirstLine,
    Stream,
    /// EOF was seen; the pipe is no longer watched.
    Closed,
}

struct RunningChild {
    process: Child,
    stdout: ChildStdout,
    stdin: ChildStdin,
    record: ChildRecord,
    read_phase: ReadPhase,
}

enum ChildState {
    Absent,
    Running(Box<RunningChild>),
}

/// Owner of the one status command process.
///
/// Dropping a supervisor with a live child resumes it if needed and sends
/// SIGTERM to its process group without waiting.
pub struct ChildProcess {
    state: ChildState,
    signals: Box<dyn SignalSink>,
}

impl ChildProcess {
    pub fn new(signals: Box<dyn SignalSink>) -> Self {
        Self {
            state: ChildState::Absent,
            signals,
        }
    }

    /// Run `command` through `/bin/sh -c` with piped stdin and stdout, in a
    /// new process group. An empty command starts nothing and returns
    /// `Ok(false)`. A previous child is killed first.
    pub fn start(&mut self, command: &str) -> Result<bool, ChildError> {
        if command.trim().is_empty() {
            return Ok(false);
        }
        self.kill()?;

        let mut cmd = Command::new(SHELL);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        sys::new_process_group(&mut cmd);

        let mut process = cmd.spawn().map_err(ChildError::Spawn)?;
        let (Some(stdout), Some(stdin)) = (process.stdout.take(), process.stdin.take()) else {
            return Err(ChildError::Spawn(io::Error::other("status_command pipes missing")));
        };
        let record = ChildRecord {
            pid: process.id() as i32,
            ..Default::default()
        };
        let fd = stdout.as_raw_fd();

        self.state = ChildState::Running(Box::new(RunningChild {
            process,
            stdout,
            stdin,
            record,
            read_phase: ReadPhase::FirstLine,
        }));

        if let Err(e) = sys::set_nonblocking(fd) {
            self.kill()?;
            return Err(ChildError::Spawn(e));
        }

        if let Some(record) = self.record() {
            record.trace("start");
        }
        Ok(true)
    }

    pub fn phase(&self) -> ChildPhase {
        match &self.state {
            ChildState::Absent => ChildPhase::Absent,
            ChildState::Running(child) if child.record.stopped => ChildPhase::Stopped,
            ChildState::Running(_) => ChildPhase::Running,
        }
    }

    pub fn record(&self) -> Option<&ChildRecord> {
        match &self.state {
            ChildState::Running(child) => Some(&child.record),
            ChildState::Absent => None,
        }
    }

    pub fn record_mut(&mut self) -> Option<&mut ChildRecord> {
        match &mut self.state {
            ChildState::Running(child) => Some(&mut child.record),
            ChildState::Absent => None,
        }
    }

    pub fn set_read_phase(&mut self, phase: ReadPhase) {
        if let ChildState::Running(child) = &mut self.state {
            child.read_phase = phase;
        }
    }

    /// The descriptor to watch for readability, while there is one.
    pub fn read_fd(&self) -> Option<BorrowedFd<'_>> {
        match &self.state {
            ChildState::Running(child) if child.read_phase != ReadPhase::Closed => {
                Some(child.stdout.as_fd())
            }
            _ => None,
        }
    }

    /// Drain whatever the child has written. `None` when there is no child
    /// or its output already reached EOF.
    pub fn read_available(&mut self) -> Result<Option<ReadOutcome>, ChildError> {
        let ChildState::Running(child) = &mut self.state else {
            return Ok(None);
        };
        if child.read_phase == ReadPhase::Closed {
            return Ok(None);
        }
        let outcome = reader::read_available(&mut child.stdout).map_err(ChildError::Read)?;
        if outcome.eof {
            tracing::info!(pid = child.record.pid, "status_command closed its output");
        }
        Ok(Some(outcome))
    }

    pub fn stop(&mut self) -> Result<bool, ChildError> {
        let ChildState::Running(child) = &mut self.state else {
            return Ok(false);
        };
        child.record.trace("stop");
        child.record.stop(self.signals.as_ref())
    }

    pub fn cont(&mut self) -> Result<bool, ChildError> {
        let ChildState::Running(child) = &mut self.state else {
            return Ok(false);
        };
        child.record.trace("cont");
        child.record.cont(self.signals.as_ref())
    }

    /// Terminate the process group, wait for the child and release it.
    pub fn kill(&mut self) -> Result<(), ChildError> {
        let ChildState::Running(child) = &mut self.state else {
            return Ok(());
        };
        child.record.trace("kill");
        child.record.terminate(self.signals.as_ref());
        let waited = child.process.wait();
        self.cleanup();
        waited.map(drop).map_err(ChildError::Wait)
    }

    /// Reap the child if it has exited, releasing it. Returns its status.
    pub fn try_reap(&mut self) -> Result<Option<ExitStatus>, ChildError> {
        let ChildState::Running(child) = &mut self.state else {
            return Ok(None);
        };
        let status = child.process.try_wait().map_err(ChildError::Wait)?;
        if status.is_some() {
            self.cleanup();
        }
        Ok(status)
    }

    pub fn want_click_events(&self) -> bool {
        self.record().is_some_and(|r| r.click_events)
    }

    pub fn disable_click_events(&mut self) {
        if let Some(record) = self.record_mut() {
            record.click_events = false;
        }
    }

    /// Send one click to the child, opening the click stream on first use.
    /// Returns `Ok(false)` when the child did not ask for clicks.
    pub fn write_click(&mut self, event: &ClickEvent<'_>) -> io::Result<bool> {
        let ChildState::Running(child) = &mut self.state else {
            return Ok(false);
        };
        if !child.record.click_events {
            return Ok(false);
        }
        if !child.record.click_events_init {
            child.record.trace("click_events_init");
            child.record.click_events_init = true;
            click::write_frame(&mut child.stdin, click::STREAM_OPEN)?;
        }
        let payload = click::encode(event)?;
        click::write_frame(&mut child.stdin, &payload)?;
        Ok(true)
    }

    /// Drop the child's pipes and forget it.
    fn cleanup(&mut self) {
        if let ChildState::Running(child) = std::mem::replace(&mut self.state, ChildState::Absent) {
            child.record.trace("cleanup");
        }
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        if let ChildState::Running(child) = &self.state {
            child.record.trace("exit");
            child.record.terminate(self.signals.as_ref());
        }
    }
}

/// Exit code of a finished child. Death by signal is reported as
/// `128 + signal`, like a shell does.
pub fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|s| 128 + s))
        .unwrap_or(0)
}

/// User-facing explanation of an unexpected exit.
pub fn exit_message(code: i32) -> String {
    match code {
        126 => format!("status_command is not executable (exit {code})"),
        127 => format!(
            "status_command not found or is missing a library dependency (exit {code})"
        ),
        _ => format!("status_command process exited unexpectedly (exit {code})"),
    }
}
