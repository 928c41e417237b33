//! Formatting commands and the derived format state.

use serde::{Deserialize, Serialize};

use crate::document::{Alignment, Document, InlineFormat, InlineStyle, Selection};

/// Command issued by the formatting toolbar or its keyboard shortcuts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FormatCommand {
    Bold,
    Italic,
    Underline,
    ToggleCenter,
    Undo,
}

impl FormatCommand {
    pub fn inline_format(self) -> Option<InlineFormat> {
        match self {
            FormatCommand::Bold => Some(InlineFormat::Bold),
            FormatCommand::Italic => Some(InlineFormat::Italic),
            FormatCommand::Underline => Some(InlineFormat::Underline),
            FormatCommand::ToggleCenter | FormatCommand::Undo => None,
        }
    }

    /// Ctrl/Meta shortcut letter.
    pub fn from_shortcut(ch: char) -> Option<Self> {
        match ch.to_ascii_lowercase() {
            'b' => Some(FormatCommand::Bold),
            'i' => Some(FormatCommand::Italic),
            'u' => Some(FormatCommand::Underline),
            'z' => Some(FormatCommand::Undo),
            _ => None,
        }
    }
}

/// Formats active at the current caret or selection. Derived, never stored
/// in the document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormatState {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub center: bool,
}

impl FormatState {
    /// Recomputes from the document.
    ///
    /// For a range, a flag is active when every selected char carries it.
    /// For a caret, `pending` (the typing style) wins over the style of the
    /// char before the caret. A caret on an image reports nothing active.
    pub fn compute(document: &Document, selection: Selection, pending: Option<InlineStyle>) -> Self {
        let anchor = document.clamp_position(selection.anchor);
        if selection.is_collapsed() && document.image_at(anchor).is_some() {
            return Self::default();
        }
        let center = document.alignment_at(anchor.block) == Some(Alignment::Center);
        if selection.is_collapsed() {
            let style = pending.unwrap_or_else(|| document.style_at(anchor));
            return Self {
                bold: style.bold,
                italic: style.italic,
                underline: style.underline,
                center,
            };
        }
        let (start, end) = (selection.start(), selection.end());
        Self {
            bold: document.range_has_inline(start, end, InlineFormat::Bold),
            italic: document.range_has_inline(start, end, InlineFormat::Italic),
            underline: document.range_has_inline(start, end, InlineFormat::Underline),
            center,
        }
    }

    pub fn is_active(&self, format: InlineFormat) -> bool {
        match format {
            InlineFormat::Bold => self.bold,
            InlineFormat::Italic => self.italic,
            InlineFormat::Underline => self.underline,
        }
    }
}
