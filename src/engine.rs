use std::os::fd::BorrowedFd;

use crate::bar::{Renderer, TextMeasure};
use crate::child::{self, ChildProcess, ReadPhase, SignalSink};
use crate::error::ChildError;
use crate::status::{header, ClickEvent, JsonAdapter, Statusline, StatuslineStore};

/// Separator gap when no separator symbol is configured, and the padding
/// around a configured one.
const SEP_GAP_DEFAULT: u32 = 9;
const SEP_GAP_AROUND_SYMBOL: u32 = 8;

/// The parts of the bar configuration the engine reads.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub separator_symbol: Option<String>,
    /// The bar stays hidden until a modifier is held, so a JSON child is
    /// paused as soon as it is detected.
    pub hide_on_modifier: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    PlainText,
    Json { version: u32 },
}

/// The status line engine: owns the child, the statusline store and the
/// protocol decoder, and reports every update to a [`Renderer`].
pub struct StatusEngine {
    config: EngineConfig,
    measure: Box<dyn TextMeasure>,
    store: StatuslineStore,
    json: JsonAdapter,
    protocol: Option<Protocol>,
    sep_block_width: u32,
    child: ChildProcess,
}

impl StatusEngine {
    pub fn new(
        config: EngineConfig,
        measure: Box<dyn TextMeasure>,
        signals: Box<dyn SignalSink>,
    ) -> Self {
        let sep_block_width = match config.separator_symbol.as_deref() {
            Some(symbol) => {
                let symbol = crate::status::RichText::from_utf8(symbol);
                SEP_GAP_AROUND_SYMBOL + measure.predict_text_width(&symbol)
            }
            None => SEP_GAP_DEFAULT,
        };
        Self {
            config,
            measure,
            store: StatuslineStore::default(),
            json: JsonAdapter::default(),
            protocol: None,
            sep_block_width,
            child: ChildProcess::new(signals),
        }
    }

    pub fn active(&self) -> &Statusline {
        self.store.active()
    }

    #[cfg(test)]
    pub fn protocol(&self) -> Option<Protocol> {
        self.protocol
    }

    pub fn child_phase(&self) -> child::ChildPhase {
        self.child.phase()
    }

    /// Start the status command with a fresh decoder. An empty command is
    /// ignored.
    pub fn start(&mut self, command: &str) -> Result<bool, ChildError> {
        if command.trim().is_empty() {
            return Ok(false);
        }
        self.json = JsonAdapter::default();
        self.protocol = None;
        self.child.start(command)
    }

    /// Descriptor of the child's output while it should be watched.
    pub fn read_fd(&self) -> Option<BorrowedFd<'_>> {
        self.child.read_fd()
    }

    /// Handle a readiness notification on the child's output.
    ///
    /// Reads everything available, feeds it through [`Self::ingest`] and
    /// stops watching the pipe once it reaches EOF. Read errors other than
    /// would-block are returned and are fatal.
    pub fn handle_readable(&mut self, renderer: &mut dyn Renderer) -> Result<(), ChildError> {
        let Some(outcome) = self.child.read_available()? else {
            return Ok(());
        };
        if !outcome.bytes.is_empty() {
            self.ingest(&outcome.bytes, renderer);
            self.child.set_read_phase(ReadPhase::Stream);
        }
        if outcome.eof {
            self.child.set_read_phase(ReadPhase::Closed);
        }
        Ok(())
    }

    /// Interpret one chunk of child output and request a render.
    ///
    /// The first chunk decides the protocol; later chunks are either the
    /// next plain-text line or more of the JSON body.
    pub fn ingest(&mut self, chunk: &[u8], renderer: &mut dyn Renderer) {
        let body = match self.protocol {
            Some(_) => chunk,
            None => self.detect(chunk),
        };

        let has_urgent = match self.protocol {
            Some(Protocol::Json { version }) => {
                tracing::trace!(version, bytes = body.len(), "status body");
                self.read_json(body)
            }
            _ => {
                self.read_plain(body);
                false
            }
        };
        renderer.draw_bars(self.store.active(), has_urgent);
    }

    /// Returns the part of `chunk` that follows the header, if any.
    fn detect<'a>(&mut self, chunk: &'a [u8]) -> &'a [u8] {
        tracing::debug!("detecting protocol from {:?}", String::from_utf8_lossy(chunk));
        let Some((header, consumed)) = header::parse_header(chunk) else {
            self.protocol = Some(Protocol::PlainText);
            return chunk;
        };

        tracing::info!(version = header.version, click_events = header.click_events, "JSON status protocol");
        self.protocol = Some(Protocol::Json {
            version: header.version,
        });
        if let Some(record) = self.child.record_mut() {
            record.apply_header(&header);
        }
        if self.config.hide_on_modifier {
            self.stop_child();
        }
        &chunk[consumed..]
    }

    fn read_plain(&mut self, chunk: &[u8]) {
        let line = match chunk.last() {
            Some(b'\n' | b'\r') => &chunk[..chunk.len() - 1],
            _ => chunk,
        };
        self.store.set_plain_text(String::from_utf8_lossy(line));
    }

    fn read_json(&mut self, chunk: &[u8]) -> bool {
        match self
            .json
            .feed(chunk, &mut self.store, self.measure.as_ref(), self.sep_block_width)
        {
            Ok(has_urgent) => has_urgent,
            Err(e) => {
                tracing::error!(
                    "could not parse JSON input ({e}): {}",
                    String::from_utf8_lossy(chunk)
                );
                self.store.set_error(format_args!("Could not parse JSON ({e})"));
                false
            }
        }
    }

    /// Handle a child-exit notification. Returns `true` when the child was
    /// reaped, after replacing the statusline with an explanation.
    pub fn handle_child_exit(&mut self, renderer: &mut dyn Renderer) -> Result<bool, ChildError> {
        let pid = self.child.record().map(|r| r.pid);
        let Some(status) = self.child.try_reap()? else {
            return Ok(false);
        };
        let code = child::exit_code(status);
        tracing::error!(?pid, code, "status_command exited unexpectedly");
        self.store.set_error(child::exit_message(code));
        renderer.draw_bars(self.store.active(), false);
        Ok(true)
    }

    pub fn stop_child(&mut self) {
        if let Err(e) = self.child.stop() {
            tracing::warn!("{e}");
        }
    }

    pub fn cont_child(&mut self) {
        if let Err(e) = self.child.cont() {
            tracing::warn!("{e}");
        }
    }

    /// Terminate the child and wait for it.
    pub fn kill_child(&mut self) -> Result<(), ChildError> {
        self.child.kill()
    }

    pub fn want_click_events(&self) -> bool {
        self.child.want_click_events()
    }

    /// Forward a click to the child if it asked for clicks.
    ///
    /// A failed write means the click protocol is broken: clicks are
    /// disabled, the child is killed and the statusline shows the error.
    pub fn send_block_clicked(&mut self, event: &ClickEvent<'_>, renderer: &mut dyn Renderer) {
        if !self.child.want_click_events() {
            return;
        }
        let Err(e) = self.child.write_click(event) else {
            return;
        };

        tracing::error!("could not write click event: {e}");
        self.child.disable_click_events();
        if let Err(kill_err) = self.child.kill() {
            tracing::warn!("{kill_err}");
        }
        self.store
            .set_error(format_args!("Could not write click event to status_command ({e})"));
        renderer.draw_bars(self.store.active(), false);
    }
}
