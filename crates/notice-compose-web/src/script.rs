//! JSON notice scripts replayed through a [`Compositor`].
//!
//! ```json
//! {
//!   "background_preset": 2,
//!   "font_size": 20,
//!   "size_class": "small",
//!   "blocks": [
//!     { "text": "Opening hours", "bold": true, "center": true },
//!     { "image": "door.png" },
//!     { "text": "Mon-Fri 9-17" }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};

use notice_compose::{
    Background, BackgroundParseError, ComposeError, Compositor, FontSize, FormatCommand,
    ImageSource, InlineFormat, Key, KeyInput, Selection, SizeClass,
};
use serde::Deserialize;
use thiserror::Error;

/// Failure while loading or replaying a script.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("read script {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse script: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown size class `{0}` (expected small, medium or large)")]
    UnknownSizeClass(String),
    #[error(transparent)]
    Background(#[from] BackgroundParseError),
    #[error(transparent)]
    Compose(#[from] ComposeError),
}

/// Canvas settings plus the blocks to type, in order.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NoticeScript {
    /// CSS background (`#rrggbb` or `linear-gradient(...)`); wins over the
    /// preset.
    pub background: Option<String>,
    pub background_preset: Option<usize>,
    pub font_size: Option<u32>,
    /// Size class for every inserted image.
    pub size_class: Option<String>,
    pub blocks: Vec<ScriptBlock>,
}

/// One paragraph of text or one image.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ScriptBlock {
    Text(TextBlock),
    Image(ImageBlockSpec),
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct TextBlock {
    pub text: String,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub center: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ImageBlockSpec {
    /// Path relative to the script's directory.
    pub image: PathBuf,
}

impl NoticeScript {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ScriptError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, ScriptError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Replays the script on `compositor`. Image paths resolve against
    /// `base_dir`; images are settled once all blocks are in.
    pub fn apply(&self, compositor: &mut Compositor, base_dir: &Path) -> Result<(), ScriptError> {
        if let Some(css) = &self.background {
            compositor.set_background(Background::parse_css(css)?);
        } else if let Some(index) = self.background_preset {
            compositor.select_background_preset(index)?;
        }
        if let Some(px) = self.font_size {
            compositor.set_font_size(FontSize::new(px));
        }
        if let Some(key) = &self.size_class {
            let size = SizeClass::from_key(key)
                .ok_or_else(|| ScriptError::UnknownSizeClass(key.clone()))?;
            compositor.resize_images(size);
        }

        let mut previous_was_text = false;
        for block in &self.blocks {
            match block {
                ScriptBlock::Text(text) => {
                    if previous_was_text {
                        compositor.key_down(KeyInput::new(Key::Enter))?;
                    }
                    type_block(compositor, text)?;
                    previous_was_text = true;
                }
                ScriptBlock::Image(spec) => {
                    let source = ImageSource::from_path(base_dir.join(&spec.image))?;
                    compositor.insert_image(source)?;
                    // Layout height is only known once the header decodes.
                    compositor.settle();
                    previous_was_text = false;
                }
            }
        }
        log::debug!(
            "script applied: {} block(s), scroll height {:.0}px",
            compositor.document().block_count(),
            compositor.scroll_height()
        );
        Ok(())
    }
}

fn type_block(compositor: &mut Compositor, block: &TextBlock) -> Result<(), ComposeError> {
    let start = compositor.selection().focus;
    compositor.type_text(&block.text)?;
    let end = compositor.selection().focus;

    compositor.set_selection(Selection::range(start, end));
    for (wanted, format, command) in [
        (block.bold, InlineFormat::Bold, FormatCommand::Bold),
        (block.italic, InlineFormat::Italic, FormatCommand::Italic),
        (block.underline, InlineFormat::Underline, FormatCommand::Underline),
    ] {
        if wanted && start != end && !compositor.format_state().is_active(format) {
            compositor.apply_format(command)?;
        }
    }
    if block.center != compositor.format_state().center {
        compositor.apply_format(FormatCommand::ToggleCenter)?;
    }
    compositor.set_caret(end);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_parse_by_shape() {
        let script = NoticeScript::parse(
            r#"{"font_size":20,"blocks":[{"text":"Hi","bold":true},{"image":"a.png"}]}"#,
        )
        .expect("script");
        assert_eq!(script.font_size, Some(20));
        assert_eq!(
            script.blocks[0],
            ScriptBlock::Text(TextBlock {
                text: "Hi".to_string(),
                bold: true,
                ..TextBlock::default()
            })
        );
        assert_eq!(
            script.blocks[1],
            ScriptBlock::Image(ImageBlockSpec {
                image: PathBuf::from("a.png")
            })
        );
    }

    #[test]
    fn empty_object_is_a_blank_script() {
        let script = NoticeScript::parse("{}").expect("script");
        assert_eq!(script, NoticeScript::default());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            NoticeScript::parse("{\"blocks\": 3}"),
            Err(ScriptError::Parse(_))
        ));
    }
}
