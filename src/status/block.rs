use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Serialize, Serializer};

use crate::bar::TextMeasure;

/// Substituted for `full_text` when a block never set one, so every block
/// that reaches the renderer has something to draw.
pub const MISSING_FULL_TEXT: &str = "PROTOCOL VIOLATION: full_text is missing";

/// Text that may carry Pango-style markup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RichText {
    text: String,
    markup: bool,
}

impl RichText {
    /// Literal text, never interpreted as markup.
    pub fn from_utf8(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: false,
        }
    }

    /// Text that is interpreted as markup until told otherwise.
    pub fn from_markup(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: true,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[cfg(test)]
    pub fn is_markup(&self) -> bool {
        self.markup
    }

    pub fn set_markup(&mut self, markup: bool) {
        self.markup = markup;
    }

    /// The text as it appears on screen: tags removed and entities decoded
    /// when this is markup, unchanged otherwise.
    pub fn visible_text(&self) -> Cow<'_, str> {
        if !self.markup {
            return Cow::Borrowed(&self.text);
        }
        let stripped = markup_tag().replace_all(&self.text, "");
        Cow::Owned(
            stripped
                .replace("&lt;", "<")
                .replace("&gt;", ">")
                .replace("&quot;", "\"")
                .replace("&apos;", "'")
                .replace("&amp;", "&"),
        )
    }
}

impl Serialize for RichText {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

fn markup_tag() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid regex"))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

impl Align {
    /// Protocol values are matched exactly; anything unrecognised is left.
    pub fn from_protocol(value: &str) -> Self {
        match value {
            "center" => Align::Center,
            "right" => Align::Right,
            _ => Align::Left,
        }
    }
}

/// One segment of the status line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusBlock {
    pub full_text: RichText,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_text: Option<RichText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border: Option<String>,
    pub border_top: u32,
    pub border_right: u32,
    pub border_bottom: u32,
    pub border_left: u32,
    /// Effective minimum width in pixels.
    pub min_width: u32,
    pub align: Align,
    pub urgent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    pub no_separator: bool,
    pub pango_markup: bool,
    pub sep_block_width: u32,
}

impl StatusBlock {
    /// A bare block holding literal text and nothing else.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            full_text: RichText::from_utf8(text),
            ..Default::default()
        }
    }
}

/// A `min_width` as the child sent it, before it is resolved to pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MinWidth {
    Pixels(u32),
    /// Width of this string when rendered with the block's markup mode.
    Text(String),
}

/// A block under construction while its JSON object is being parsed.
#[derive(Debug)]
pub struct BlockBuilder {
    pub block: StatusBlock,
    pub full_text: Option<RichText>,
    pub min_width: Option<MinWidth>,
}

impl BlockBuilder {
    /// Start a block with protocol defaults: all four borders drawn when a
    /// border color is set, and the given separator gap.
    pub fn new(sep_block_width: u32) -> Self {
        Self {
            block: StatusBlock {
                border_top: 1,
                border_right: 1,
                border_bottom: 1,
                border_left: 1,
                sep_block_width,
                ..Default::default()
            },
            full_text: None,
            min_width: None,
        }
    }

    /// Resolve deferred fields and apply the markup mode.
    pub fn finish(self, measure: &dyn TextMeasure) -> StatusBlock {
        let mut block = self.block;
        let markup = block.pango_markup;

        block.full_text = self
            .full_text
            .unwrap_or_else(|| RichText::from_utf8(MISSING_FULL_TEXT));
        block.full_text.set_markup(markup);
        if let Some(short) = block.short_text.as_mut() {
            short.set_markup(markup);
        }

        block.min_width = match self.min_width {
            Some(MinWidth::Pixels(px)) => px,
            Some(MinWidth::Text(text)) => {
                let mut sample = RichText::from_utf8(text);
                sample.set_markup(markup);
                measure.predict_text_width(&sample)
            }
            None => 0,
        };

        block
    }
}
