//! Protocol detection on the first chunk of child output.
//!
//! A status command opts into the JSON protocol by starting with a header
//! object such as `{"version":1,"click_events":true}`. Anything else is the
//! plain-text protocol.

use serde::Deserialize;

/// The header a JSON-speaking status command sends before its body.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ProtocolHeader {
    pub version: u32,
    /// Sent to pause the child while the bar is hidden. `0` disables it.
    #[serde(default = "default_stop_signal")]
    pub stop_signal: i32,
    /// Sent to resume the child. `0` disables it.
    #[serde(default = "default_cont_signal")]
    pub cont_signal: i32,
    #[serde(default)]
    pub click_events: bool,
}

fn default_stop_signal() -> i32 {
    libc::SIGSTOP
}

fn default_cont_signal() -> i32 {
    libc::SIGCONT
}

/// Look for a header at the start of `buf`.
///
/// Returns the header and the number of bytes it occupied, or `None` when
/// the chunk does not begin with a header carrying a positive version.
pub fn parse_header(buf: &[u8]) -> Option<(ProtocolHeader, usize)> {
    let mut stream = serde_json::Deserializer::from_slice(buf).into_iter::<ProtocolHeader>();
    match stream.next() {
        Some(Ok(header)) if header.version > 0 => {
            let consumed = stream.byte_offset();
            Some((header, consumed))
        }
        _ => None,
    }
}
