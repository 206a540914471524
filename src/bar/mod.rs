//! Collaborators the engine draws through, and the terminal implementations
//! shipped with the binary.

pub mod event_loop;

use std::io::Write;

use colored::Colorize;

use crate::status::{Align, RichText, StatusBlock, Statusline};

/// Receives a render request after every statusline update.
pub trait Renderer {
    fn draw_bars(&mut self, statusline: &Statusline, has_urgent: bool);
}

/// Predicts how wide a text renders, in pixels.
pub trait TextMeasure {
    fn predict_text_width(&self, text: &RichText) -> u32;
}

/// Terminal measurement: one pixel per visible character.
#[derive(Debug, Default, Clone, Copy)]
pub struct CharWidth;

impl TextMeasure for CharWidth {
    fn predict_text_width(&self, text: &RichText) -> u32 {
        text.visible_text().chars().count() as u32
    }
}

const DEFAULT_SEPARATOR: &str = "|";

/// Prints each statusline as one line of text.
pub struct TerminalBar<W: Write> {
    out: W,
    separator: String,
    colors: bool,
}

impl<W: Write> TerminalBar<W> {
    pub fn new(out: W, separator_symbol: Option<&str>, colors: bool) -> Self {
        Self {
            out,
            separator: separator_symbol.unwrap_or(DEFAULT_SEPARATOR).to_string(),
            colors,
        }
    }

    pub fn format_line(&self, statusline: &Statusline) -> String {
        let blocks = statusline.blocks();
        let mut line = String::new();
        for (i, block) in blocks.iter().enumerate() {
            line.push_str(&self.format_block(block));
            if i + 1 < blocks.len() {
                line.push_str(&self.gap_after(block));
            }
        }
        line
    }

    fn format_block(&self, block: &StatusBlock) -> String {
        let text = pad(&block.full_text.visible_text(), block.min_width as usize, block.align);
        if !self.colors {
            return text;
        }

        let mut styled = text.normal();
        if let Some((r, g, b)) = block.color.as_deref().and_then(parse_hex) {
            styled = styled.truecolor(r, g, b);
        }
        if let Some((r, g, b)) = block.background.as_deref().and_then(parse_hex) {
            styled = styled.on_truecolor(r, g, b);
        }
        if block.urgent {
            styled = styled.bold();
        }
        styled.to_string()
    }

    fn gap_after(&self, block: &StatusBlock) -> String {
        match (block.no_separator, block.sep_block_width > 0) {
            (true, true) => " ".to_string(),
            (true, false) => String::new(),
            (false, true) => format!(" {} ", self.separator),
            (false, false) => self.separator.clone(),
        }
    }
}

impl<W: Write> Renderer for TerminalBar<W> {
    fn draw_bars(&mut self, statusline: &Statusline, has_urgent: bool) {
        let line = self.format_line(statusline);
        tracing::trace!(has_urgent, blocks = statusline.len(), "draw");
        if let Err(e) = writeln!(self.out, "{line}").and_then(|()| self.out.flush()) {
            tracing::warn!("could not write statusline: {e}");
        }
    }
}

/// Prints each statusline as a JSON array of blocks.
pub struct JsonDump<W: Write> {
    out: W,
}

impl<W: Write> JsonDump<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Renderer for JsonDump<W> {
    fn draw_bars(&mut self, statusline: &Statusline, _has_urgent: bool) {
        let written = serde_json::to_writer(&mut self.out, statusline)
            .map_err(std::io::Error::from)
            .and_then(|()| writeln!(self.out))
            .and_then(|()| self.out.flush());
        if let Err(e) = written {
            tracing::warn!("could not write statusline: {e}");
        }
    }
}

fn pad(text: &str, min_width: usize, align: Align) -> String {
    let width = text.chars().count();
    if width >= min_width {
        return text.to_string();
    }
    let fill = min_width - width;
    let (left, right) = match align {
        Align::Left => (0, fill),
        Align::Right => (fill, 0),
        Align::Center => (fill / 2, fill - fill / 2),
    };
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(right))
}

/// Parse `#rrggbb` or `#rrggbbaa`; alpha is ignored.
fn parse_hex(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 && hex.len() != 8 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatuslineStore;

    fn line_of(blocks: Vec<StatusBlock>) -> Statusline {
        let mut store = StatuslineStore::default();
        store.begin_update();
        for block in blocks {
            store.stage(block);
        }
        store.publish();
        store.active().clone()
    }

    #[test]
    fn blocks_are_joined_by_separator() {
        let bar = TerminalBar::new(Vec::new(), None, false);
        let mut first = StatusBlock::plain("cpu");
        first.sep_block_width = 9;
        let line = line_of(vec![first, StatusBlock::plain("mem")]);
        assert_eq!(bar.format_line(&line), "cpu | mem");
    }

    #[test]
    fn no_separator_and_zero_gap_are_respected() {
        let bar = TerminalBar::new(Vec::new(), Some("::"), false);
        let mut a = StatusBlock::plain("a");
        a.no_separator = true;
        a.sep_block_width = 9;
        let mut b = StatusBlock::plain("b");
        b.no_separator = true;
        let c = StatusBlock::plain("c");
        let d = StatusBlock::plain("d");
        let line = line_of(vec![a, b, c, d]);
        assert_eq!(bar.format_line(&line), "a bc::d");
    }

    #[test]
    fn min_width_pads_by_alignment() {
        assert_eq!(pad("ab", 6, Align::Left), "ab    ");
        assert_eq!(pad("ab", 6, Align::Right), "    ab");
        assert_eq!(pad("ab", 5, Align::Center), " ab  ");
        assert_eq!(pad("abcdef", 3, Align::Center), "abcdef");
    }

    #[test]
    fn markup_is_not_printed() {
        let bar = TerminalBar::new(Vec::new(), None, false);
        let mut block = StatusBlock::plain("x");
        block.full_text = RichText::from_markup("<span color='red'>hot</span>");
        assert_eq!(bar.format_line(&line_of(vec![block])), "hot");
    }

    #[test]
    fn hex_colors_parse() {
        assert_eq!(parse_hex("#ff0000"), Some((255, 0, 0)));
        assert_eq!(parse_hex("#00ff0080"), Some((0, 255, 0)));
        assert_eq!(parse_hex("red"), None);
        assert_eq!(parse_hex("#fff"), None);
    }

    #[test]
    fn render_writes_one_line() {
        let mut bar = TerminalBar::new(Vec::new(), None, false);
        bar.draw_bars(&line_of(vec![StatusBlock::plain("hello")]), false);
        assert_eq!(bar.out, b"hello\n");
    }

    #[test]
    fn json_dump_writes_blocks() {
        let mut dump = JsonDump::new(Vec::new());
        dump.draw_bars(&line_of(vec![StatusBlock::plain("hello")]), false);
        let value: serde_json::Value = serde_json::from_slice(&dump.out).unwrap();
        assert_eq!(value[0]["full_text"], "hello");
        assert_eq!(value[0]["align"], "left");
    }
}
