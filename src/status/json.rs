//! Streaming decoder for the JSON body of the status protocol.
//!
//! The body is an endless outer array whose elements are status arrays:
//!
//! ```text
//! [
//!  [{"full_text":"cpu 4%"},{"full_text":"12:00","urgent":true}],
//!  [{"full_text":"cpu 7%"},{"full_text":"12:01"}],
//! ```
//!
//! Bytes are buffered until one element is complete, then serde_json walks
//! that element and reports its structure to a [`StreamHandler`]. The
//! handler used here builds one status block per object and publishes
//! one statusline per array.

use std::fmt;

use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};

use super::block::{Align, BlockBuilder, MinWidth, RichText};
use super::statusline::StatuslineStore;
use crate::bar::TextMeasure;
use crate::error::ProtocolError;

const SCALAR_WITHOUT_KEY: &str = "value outside of a map key";

/// Structural events of one JSON value, in document order.
pub trait StreamHandler {
    fn on_array_start(&mut self) -> Result<(), &'static str>;
    fn on_array_end(&mut self) -> Result<(), &'static str>;
    fn on_map_start(&mut self) -> Result<(), &'static str>;
    fn on_map_key(&mut self, key: &str) -> Result<(), &'static str>;
    fn on_map_end(&mut self) -> Result<(), &'static str>;
    fn on_bool(&mut self, value: bool) -> Result<(), &'static str>;
    fn on_integer(&mut self, value: i64) -> Result<(), &'static str>;
    fn on_string(&mut self, value: &str) -> Result<(), &'static str>;
}

// ---------------------------------------------------------------------------
// serde glue
// ---------------------------------------------------------------------------

/// Walks any JSON value and forwards its events to the handler.
struct Events<'h, H>(&'h mut H);

impl<'de, H: StreamHandler> DeserializeSeed<'de> for Events<'_, H> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de, H: StreamHandler> Visitor<'de> for Events<'_, H> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a status protocol value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<(), E> {
        self.0.on_bool(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<(), E> {
        self.0.on_integer(v).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<(), E> {
        self.0
            .on_integer(i64::try_from(v).unwrap_or(i64::MAX))
            .map_err(E::custom)
    }

    // Fractional numbers and nulls carry nothing a block can use.
    fn visit_f64<E: de::Error>(self, _: f64) -> Result<(), E> {
        Ok(())
    }

    fn visit_unit<E: de::Error>(self) -> Result<(), E> {
        Ok(())
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<(), E> {
        self.0.on_string(v).map_err(E::custom)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        let handler = self.0;
        handler.on_array_start().map_err(de::Error::custom)?;
        while seq.next_element_seed(Events(&mut *handler))?.is_some() {}
        handler.on_array_end().map_err(de::Error::custom)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let handler = self.0;
        handler.on_map_start().map_err(de::Error::custom)?;
        while map.next_key_seed(Key(&mut *handler))?.is_some() {
            map.next_value_seed(Events(&mut *handler))?;
        }
        handler.on_map_end().map_err(de::Error::custom)
    }
}

struct Key<'h, H>(&'h mut H);

impl<'de, H: StreamHandler> DeserializeSeed<'de> for Key<'_, H> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_str(self)
    }
}

impl<'de, H: StreamHandler> Visitor<'de> for Key<'_, H> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map key")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<(), E> {
        self.0.on_map_key(v).map_err(E::custom)
    }
}

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

/// Splits the outer array into complete elements as bytes arrive.
#[derive(Debug, Default)]
struct BodyFramer {
    pending: Vec<u8>,
    opened: bool,
    closed: bool,
    /// Set while the rest of a malformed element is being dropped.
    skipping: Option<SkipElement>,
}

impl BodyFramer {
    fn feed<H: StreamHandler>(&mut self, input: &[u8], handler: &mut H) -> Result<(), ProtocolError> {
        self.pending.extend_from_slice(input);
        self.drain(handler)
    }

    fn drain<H: StreamHandler>(&mut self, handler: &mut H) -> Result<(), ProtocolError> {
        let mut pos = 0;
        let outcome = loop {
            if self.skipping.is_some() {
                pos = self.skip_rejected(pos);
                if self.skipping.is_some() {
                    break Ok(());
                }
            }
            pos += self.pending[pos..]
                .iter()
                .take_while(|b| matches!(**b, b' ' | b'\t' | b'\n' | b'\r'))
                .count();
            let Some(&byte) = self.pending.get(pos) else {
                break Ok(());
            };

            if self.closed {
                pos = self.pending.len();
                break Err(ProtocolError::TrailingData);
            }
            if !self.opened {
                if byte != b'[' {
                    let err = ProtocolError::UnexpectedByte {
                        found: char::from(byte),
                        offset: pos,
                    };
                    pos = self.pending.len();
                    break Err(err);
                }
                self.opened = true;
                pos += 1;
                continue;
            }
            match byte {
                b',' => {
                    pos += 1;
                    continue;
                }
                b']' => {
                    self.closed = true;
                    pos += 1;
                    continue;
                }
                _ => {}
            }

            let framed = {
                let mut frame = serde_json::Deserializer::from_slice(&self.pending[pos..])
                    .into_iter::<IgnoredAny>();
                frame.next().map(|r| r.map(|_| frame.byte_offset()))
            };
            match framed {
                Some(Ok(end)) => {
                    let mut de = serde_json::Deserializer::from_slice(&self.pending[pos..pos + end]);
                    let replayed = Events(&mut *handler).deserialize(&mut de);
                    pos += end;
                    if let Err(e) = replayed {
                        break Err(e.into());
                    }
                }
                // Incomplete element: wait for more input.
                Some(Err(e)) if e.is_eof() => break Ok(()),
                Some(Err(e)) => {
                    self.skipping = Some(SkipElement::default());
                    pos = self.skip_rejected(pos);
                    break Err(e.into());
                }
                None => break Ok(()),
            }
        };
        self.pending.drain(..pos);
        outcome
    }

    /// Drop bytes of a malformed element starting at `pos`. Returns the
    /// position after it, or the end of the buffer if it goes on.
    fn skip_rejected(&mut self, pos: usize) -> usize {
        let Some(skip) = self.skipping.as_mut() else {
            return pos;
        };
        match skip.advance(&self.pending[pos..]) {
            Some(len) => {
                self.skipping = None;
                pos + len
            }
            None => self.pending.len(),
        }
    }
}

/// Bracket and string tracking for a malformed element that is being
/// dropped. Its own closing bracket never closes the outer array.
#[derive(Debug, Default, Clone, Copy)]
struct SkipElement {
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl SkipElement {
    /// Number of bytes of `bytes` that still belong to the element, or
    /// `None` when it continues past them.
    fn advance(&mut self, bytes: &[u8]) -> Option<usize> {
        for (i, &b) in bytes.iter().enumerate() {
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                }
                continue;
            }
            match b {
                b'"' => self.in_string = true,
                b'[' | b'{' => self.depth += 1,
                b']' | b'}' if self.depth > 0 => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        return Some(i + 1);
                    }
                }
                // A broken scalar element ends at the next separator.
                b',' if self.depth == 0 => return Some(i),
                _ => {}
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Statusline construction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKey {
    FullText,
    ShortText,
    Color,
    Background,
    Border,
    BorderTop,
    BorderRight,
    BorderBottom,
    BorderLeft,
    Markup,
    Align,
    MinWidth,
    Name,
    Instance,
    Urgent,
    Separator,
    SeparatorBlockWidth,
}

impl BlockKey {
    const ALL: [(&'static str, BlockKey); 17] = [
        ("full_text", BlockKey::FullText),
        ("short_text", BlockKey::ShortText),
        ("color", BlockKey::Color),
        ("background", BlockKey::Background),
        ("border", BlockKey::Border),
        ("border_top", BlockKey::BorderTop),
        ("border_right", BlockKey::BorderRight),
        ("border_bottom", BlockKey::BorderBottom),
        ("border_left", BlockKey::BorderLeft),
        ("markup", BlockKey::Markup),
        ("align", BlockKey::Align),
        ("min_width", BlockKey::MinWidth),
        ("name", BlockKey::Name),
        ("instance", BlockKey::Instance),
        ("urgent", BlockKey::Urgent),
        ("separator", BlockKey::Separator),
        ("separator_block_width", BlockKey::SeparatorBlockWidth),
    ];

    fn parse(key: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, k)| *k)
    }
}

/// Parser context that outlives a single read.
#[derive(Debug, Default)]
struct ParseState {
    /// Last map key seen; scalars are attributed to it.
    last_key: Option<String>,
    /// Whether any block of the current status array was urgent.
    has_urgent: bool,
    /// A status array is open.
    in_array: bool,
    block: Option<BlockBuilder>,
    /// Containers opened inside the current block or status array. Their
    /// contents are skipped.
    nested: usize,
}

struct StatuslineBuilder<'a> {
    state: &'a mut ParseState,
    store: &'a mut StatuslineStore,
    measure: &'a dyn TextMeasure,
    sep_block_width: u32,
}

impl StatuslineBuilder<'_> {
    /// The key and block a scalar belongs to. `Ok(None)` means the scalar is
    /// ignored.
    fn target(&mut self) -> Result<Option<(BlockKey, &mut BlockBuilder)>, &'static str> {
        if self.state.nested > 0 {
            return Ok(None);
        }
        let key = self.state.last_key.as_deref().ok_or(SCALAR_WITHOUT_KEY)?;
        let key = BlockKey::parse(key);
        Ok(key.zip(self.state.block.as_mut()))
    }

    fn close_nested(&mut self) -> bool {
        if self.state.nested > 0 {
            self.state.nested -= 1;
            true
        } else {
            false
        }
    }
}

fn to_px(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

impl StreamHandler for StatuslineBuilder<'_> {
    fn on_array_start(&mut self) -> Result<(), &'static str> {
        if self.state.in_array || self.state.block.is_some() || self.state.nested > 0 {
            self.state.nested += 1;
            return Ok(());
        }
        self.state.in_array = true;
        self.store.begin_update();
        self.state.has_urgent = false;
        Ok(())
    }

    fn on_array_end(&mut self) -> Result<(), &'static str> {
        if !self.close_nested() {
            self.state.in_array = false;
            self.store.publish();
        }
        Ok(())
    }

    fn on_map_start(&mut self) -> Result<(), &'static str> {
        if self.state.block.is_some() || self.state.nested > 0 {
            self.state.nested += 1;
            return Ok(());
        }
        self.state.block = Some(BlockBuilder::new(self.sep_block_width));
        Ok(())
    }

    fn on_map_key(&mut self, key: &str) -> Result<(), &'static str> {
        if self.state.nested == 0 {
            self.state.last_key = Some(key.to_owned());
        }
        Ok(())
    }

    fn on_map_end(&mut self) -> Result<(), &'static str> {
        if self.close_nested() {
            return Ok(());
        }
        if let Some(builder) = self.state.block.take() {
            self.store.stage(builder.finish(self.measure));
        }
        Ok(())
    }

    fn on_bool(&mut self, value: bool) -> Result<(), &'static str> {
        let Some((key, builder)) = self.target()? else {
            return Ok(());
        };
        match key {
            BlockKey::Urgent => {
                builder.block.urgent = value;
                self.state.has_urgent |= value;
            }
            BlockKey::Separator => builder.block.no_separator = !value,
            _ => {}
        }
        Ok(())
    }

    fn on_integer(&mut self, value: i64) -> Result<(), &'static str> {
        let Some((key, builder)) = self.target()? else {
            return Ok(());
        };
        let block = &mut builder.block;
        match key {
            BlockKey::MinWidth => builder.min_width = Some(MinWidth::Pixels(to_px(value))),
            BlockKey::SeparatorBlockWidth => block.sep_block_width = to_px(value),
            BlockKey::BorderTop => block.border_top = to_px(value),
            BlockKey::BorderRight => block.border_right = to_px(value),
            BlockKey::BorderBottom => block.border_bottom = to_px(value),
            BlockKey::BorderLeft => block.border_left = to_px(value),
            _ => {}
        }
        Ok(())
    }

    fn on_string(&mut self, value: &str) -> Result<(), &'static str> {
        let Some((key, builder)) = self.target()? else {
            return Ok(());
        };
        let block = &mut builder.block;
        match key {
            BlockKey::FullText => builder.full_text = Some(RichText::from_markup(value)),
            BlockKey::ShortText => block.short_text = Some(RichText::from_markup(value)),
            BlockKey::Color => block.color = Some(value.to_owned()),
            BlockKey::Background => block.background = Some(value.to_owned()),
            BlockKey::Border => block.border = Some(value.to_owned()),
            BlockKey::Markup => block.pango_markup = value.eq_ignore_ascii_case("pango"),
            BlockKey::Align => block.align = Align::from_protocol(value),
            BlockKey::MinWidth => builder.min_width = Some(MinWidth::Text(value.to_owned())),
            BlockKey::Name => block.name = Some(value.to_owned()),
            BlockKey::Instance => block.instance = Some(value.to_owned()),
            _ => {}
        }
        Ok(())
    }
}

/// Incremental decoder for one child's JSON body.
#[derive(Debug, Default)]
pub struct JsonAdapter {
    framer: BodyFramer,
    state: ParseState,
}

impl JsonAdapter {
    /// Feed raw bytes. Every completed status array is published to
    /// `store`. Returns whether the most recent status array had an urgent
    /// block.
    pub fn feed(
        &mut self,
        input: &[u8],
        store: &mut StatuslineStore,
        measure: &dyn TextMeasure,
        sep_block_width: u32,
    ) -> Result<bool, ProtocolError> {
        let mut builder = StatuslineBuilder {
            state: &mut self.state,
            store,
            measure,
            sep_block_width,
        };
        if let Err(e) = self.framer.feed(input, &mut builder) {
            self.state.block = None;
            self.state.in_array = false;
            self.state.nested = 0;
            return Err(e);
        }
        Ok(self.state.has_urgent)
    }
}
