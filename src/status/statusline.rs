use std::fmt::{self, Write as FmtWrite};

use serde::Serialize;

use super::block::{RichText, StatusBlock};

const ERROR_COLOR: &str = "#ff0000";

/// An ordered list of blocks, rendered left to right.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Statusline {
    blocks: Vec<StatusBlock>,
}

impl Statusline {
    pub fn blocks(&self) -> &[StatusBlock] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StatusBlock> {
        self.blocks.get(index)
    }

    pub fn push(&mut self, block: StatusBlock) {
        self.blocks.push(block);
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
    }
}

/// The renderer's view (`active`) and the list being filled by the parser
/// (`staging`). Staging is never handed to the renderer.
#[derive(Debug, Default)]
pub struct StatuslineStore {
    active: Statusline,
    staging: Statusline,
}

impl StatuslineStore {
    pub fn active(&self) -> &Statusline {
        &self.active
    }

    #[cfg(test)]
    pub fn staging(&self) -> &Statusline {
        &self.staging
    }

    /// Start collecting a new status array.
    pub fn begin_update(&mut self) {
        self.staging.clear();
    }

    pub fn stage(&mut self, block: StatusBlock) {
        self.staging.push(block);
    }

    /// Move the staged blocks into `active`, dropping what was there.
    pub fn publish(&mut self) {
        self.active = std::mem::take(&mut self.staging);
        tracing::debug!(blocks = self.active.len(), "published statusline");
        for block in self.active.blocks() {
            tracing::trace!(
                full_text = block.full_text.as_str(),
                short_text = block.short_text.as_ref().map(RichText::as_str),
                color = block.color.as_deref(),
                "block"
            );
        }
    }

    /// Plain-text protocol: the whole statusline is a single block whose
    /// text is replaced on every line.
    pub fn set_plain_text(&mut self, text: impl Into<String>) {
        let text: String = text.into();
        match self.active.blocks.first_mut() {
            Some(first) => first.full_text = RichText::from_utf8(text),
            None => self.active.push(StatusBlock::plain(text)),
        }
    }

    /// Replace the active statusline with an "Error: " label followed by
    /// `message`, both red and without separators.
    ///
    /// The old contents are gone even if formatting `message` fails.
    pub fn set_error(&mut self, message: impl fmt::Display) {
        self.active.clear();

        let mut text = String::new();
        if write!(text, "{message}").is_err() {
            return;
        }

        self.active.push(error_block("Error: ", "error"));
        self.active.push(error_block(text, "error_message"));
    }
}

fn error_block(text: impl Into<String>, name: &str) -> StatusBlock {
    StatusBlock {
        full_text: RichText::from_utf8(text),
        name: Some(name.to_string()),
        color: Some(ERROR_COLOR.to_string()),
        no_separator: true,
        ..Default::default()
    }
}
