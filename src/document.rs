//! Typed document tree edited by the compositor.
//!
//! A [`Document`] is an ordered list of [`Block`]s. Paragraph offsets are
//! counted in `char`s; an image block is an atom of length one, so a caret
//! inside an image block sits either before (`offset == 0`) or after
//! (`offset == 1`) the image.

use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use image::ImageFormat;
use serde::{Deserialize, Serialize};

use crate::error::ComposeError;

/// Inline character formatting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InlineStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

/// One inline formatting flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InlineFormat {
    Bold,
    Italic,
    Underline,
}

impl InlineStyle {
    pub fn has(&self, format: InlineFormat) -> bool {
        match format {
            InlineFormat::Bold => self.bold,
            InlineFormat::Italic => self.italic,
            InlineFormat::Underline => self.underline,
        }
    }

    pub fn set(&mut self, format: InlineFormat, on: bool) {
        match format {
            InlineFormat::Bold => self.bold = on,
            InlineFormat::Italic => self.italic = on,
            InlineFormat::Underline => self.underline = on,
        }
    }

    /// Builder-style variant of [`InlineStyle::set`].
    pub fn with(mut self, format: InlineFormat, on: bool) -> Self {
        self.set(format, on);
        self
    }
}

/// Paragraph alignment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
}

/// Text with a single inline style.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextRun {
    pub text: String,
    pub style: InlineStyle,
}

impl TextRun {
    fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Block of styled text runs.
///
/// Runs are kept normalized: no empty runs, and no two adjacent runs share a
/// style.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Paragraph {
    runs: Vec<TextRun>,
    pub align: Alignment,
}

impl Paragraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_text(text: &str, style: InlineStyle) -> Self {
        let mut paragraph = Self::new();
        paragraph.insert_text(0, text, style);
        paragraph
    }

    pub fn with_align(mut self, align: Alignment) -> Self {
        self.align = align;
        self
    }

    pub fn runs(&self) -> &[TextRun] {
        &self.runs
    }

    pub fn char_len(&self) -> usize {
        self.runs.iter().map(TextRun::char_len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }

    pub fn insert_text(&mut self, offset: usize, text: &str, style: InlineStyle) {
        if text.is_empty() {
            return;
        }
        let offset = offset.min(self.char_len());
        let idx = self.split_run_at(offset);
        self.runs.insert(
            idx,
            TextRun {
                text: text.to_string(),
                style,
            },
        );
        self.normalize();
    }

    /// Removes chars in `start..end` and returns how many were removed.
    pub fn delete_range(&mut self, start: usize, end: usize) -> usize {
        let end = end.min(self.char_len());
        let start = start.min(end);
        if start == end {
            return 0;
        }
        let first = self.split_run_at(start);
        let last = self.split_run_at(end);
        self.runs.drain(first..last);
        self.normalize();
        end - start
    }

    /// Applies `edit` to the style of every char in `start..end`.
    pub fn apply_style<F>(&mut self, start: usize, end: usize, edit: F)
    where
        F: Fn(&mut InlineStyle),
    {
        let end = end.min(self.char_len());
        let start = start.min(end);
        if start == end {
            return;
        }
        let first = self.split_run_at(start);
        let last = self.split_run_at(end);
        for run in &mut self.runs[first..last] {
            edit(&mut run.style);
        }
        self.normalize();
    }

    /// Splits at `offset`, keeping the head and returning the tail.
    pub fn split_off(&mut self, offset: usize) -> Paragraph {
        let offset = offset.min(self.char_len());
        let idx = self.split_run_at(offset);
        let tail = self.runs.split_off(idx);
        self.normalize();
        let mut tail = Paragraph {
            runs: tail,
            align: self.align,
        };
        tail.normalize();
        tail
    }

    pub fn append(&mut self, other: Paragraph) {
        self.runs.extend(other.runs);
        self.normalize();
    }

    /// Style of the char before `offset`, or of the first char at offset 0.
    pub fn style_before(&self, offset: usize) -> Option<InlineStyle> {
        let target = offset.saturating_sub(1);
        let mut acc = 0usize;
        for run in &self.runs {
            let len = run.char_len();
            if target < acc + len {
                return Some(run.style);
            }
            acc += len;
        }
        self.runs.last().map(|run| run.style)
    }

    /// `Some(true)` when every char in `start..end` satisfies `pred`,
    /// `None` when the range holds no chars.
    pub fn range_all<P>(&self, start: usize, end: usize, pred: P) -> Option<bool>
    where
        P: Fn(&InlineStyle) -> bool,
    {
        let mut pos = 0usize;
        let mut seen = false;
        for run in &self.runs {
            let run_start = pos;
            let run_end = pos + run.char_len();
            pos = run_end;
            if run_end <= start || run_start >= end {
                continue;
            }
            seen = true;
            if !pred(&run.style) {
                return Some(false);
            }
        }
        seen.then_some(true)
    }

    /// Splits the run containing `offset` so a run boundary lands there and
    /// returns the index of the first run at or after `offset`.
    fn split_run_at(&mut self, offset: usize) -> usize {
        let mut start = 0usize;
        for idx in 0..self.runs.len() {
            let len = self.runs[idx].char_len();
            if offset == start {
                return idx;
            }
            if offset < start + len {
                let byte = byte_offset(&self.runs[idx].text, offset - start);
                let tail = self.runs[idx].text.split_off(byte);
                let style = self.runs[idx].style;
                self.runs.insert(idx + 1, TextRun { text: tail, style });
                return idx + 1;
            }
            start += len;
        }
        self.runs.len()
    }

    fn normalize(&mut self) {
        let mut merged: Vec<TextRun> = Vec::with_capacity(self.runs.len());
        for run in self.runs.drain(..) {
            if run.text.is_empty() {
                continue;
            }
            match merged.last_mut() {
                Some(last) if last.style == run.style => last.text.push_str(&run.text),
                _ => merged.push(run),
            }
        }
        self.runs = merged;
    }
}

fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}

/// Transient image identity, unique within one document session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageHandle(u64);

impl ImageHandle {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "img-{}", self.0)
    }
}

/// Locally loaded image bytes with their sniffed format.
///
/// Cloning shares the bytes, so document snapshots never copy pixel data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageSource {
    bytes: Arc<[u8]>,
    format: ImageFormat,
}

impl ImageSource {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self, ComposeError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(ComposeError::EmptyImage);
        }
        let format = image::guess_format(&bytes).map_err(|_| ComposeError::UnsupportedImage)?;
        Ok(Self {
            bytes: Arc::from(bytes),
            format,
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ComposeError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|err| ComposeError::ReadImage {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        Self::from_bytes(bytes)
    }

    /// Non-blocking variant of [`ImageSource::from_path`].
    #[cfg(feature = "async")]
    pub async fn from_path_async(path: impl AsRef<Path>) -> Result<Self, ComposeError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| ComposeError::ReadImage {
                path: path.display().to_string(),
                message: err.to_string(),
            })?;
        Self::from_bytes(bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    /// Reads the natural pixel size from the image header.
    pub fn decode_dimensions(&self) -> Result<(u32, u32), String> {
        image::ImageReader::with_format(Cursor::new(&self.bytes[..]), self.format)
            .into_dimensions()
            .map_err(|err| err.to_string())
    }
}

/// Image width policy relative to the container content width.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    Small,
    #[default]
    Medium,
    Large,
}

impl SizeClass {
    pub const ALL: [SizeClass; 3] = [SizeClass::Small, SizeClass::Medium, SizeClass::Large];

    pub fn width_percent(self) -> u32 {
        match self {
            SizeClass::Small => 40,
            SizeClass::Medium => 70,
            SizeClass::Large => 90,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SizeClass::Small => "small",
            SizeClass::Medium => "medium",
            SizeClass::Large => "large",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|size| size.as_str() == key)
    }
}

/// Decode progress of an image block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ImageLoad {
    /// Inserted but not yet settled; contributes no height.
    #[default]
    Pending,
    Loaded {
        width: u32,
        height: u32,
    },
    /// Header could not be decoded; contributes no height.
    Failed,
}

/// Block holding one image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageBlock {
    handle: ImageHandle,
    source: ImageSource,
    size: SizeClass,
    sequence: u64,
    load: ImageLoad,
    removable: bool,
}

impl ImageBlock {
    pub fn handle(&self) -> ImageHandle {
        self.handle
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    pub fn size(&self) -> SizeClass {
        self.size
    }

    /// Monotonic insertion order within the document.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn load(&self) -> ImageLoad {
        self.load
    }

    /// Natural pixel size once loaded.
    pub fn natural_size(&self) -> Option<(u32, u32)> {
        match self.load {
            ImageLoad::Loaded { width, height } => Some((width, height)),
            ImageLoad::Pending | ImageLoad::Failed => None,
        }
    }

    /// Whether the removal affordance has been attached.
    pub fn is_removable(&self) -> bool {
        self.removable
    }
}

/// Block-level node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Block {
    Paragraph(Paragraph),
    Image(ImageBlock),
}

impl Block {
    /// Caret extent: chars for paragraphs, one for images.
    pub fn len(&self) -> usize {
        match self {
            Block::Paragraph(paragraph) => paragraph.char_len(),
            Block::Image(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_paragraph(&self) -> Option<&Paragraph> {
        match self {
            Block::Paragraph(paragraph) => Some(paragraph),
            Block::Image(_) => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageBlock> {
        match self {
            Block::Image(image) => Some(image),
            Block::Paragraph(_) => None,
        }
    }
}

/// Caret location.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub block: usize,
    pub offset: usize,
}

impl Position {
    pub fn new(block: usize, offset: usize) -> Self {
        Self { block, offset }
    }
}

/// Anchor/focus selection; collapsed when both are equal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Selection {
    pub anchor: Position,
    pub focus: Position,
}

impl Selection {
    pub fn caret(position: Position) -> Self {
        Self {
            anchor: position,
            focus: position,
        }
    }

    pub fn range(anchor: Position, focus: Position) -> Self {
        Self { anchor, focus }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn start(&self) -> Position {
        self.anchor.min(self.focus)
    }

    pub fn end(&self) -> Position {
        self.anchor.max(self.focus)
    }
}

/// Editable content tree. Never empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    blocks: Vec<Block>,
    next_handle: u64,
    next_sequence: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::Paragraph(Paragraph::new())],
            next_handle: 1,
            next_sequence: 0,
        }
    }

    pub fn from_paragraphs<I>(paragraphs: I) -> Self
    where
        I: IntoIterator<Item = Paragraph>,
    {
        let mut doc = Self::new();
        doc.blocks = paragraphs.into_iter().map(Block::Paragraph).collect();
        doc.ensure_not_empty();
        doc
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Single empty paragraph.
    pub fn is_blank(&self) -> bool {
        matches!(self.blocks.as_slice(), [Block::Paragraph(p)] if p.is_empty())
    }

    pub fn char_count(&self) -> usize {
        self.blocks
            .iter()
            .filter_map(Block::as_paragraph)
            .map(Paragraph::char_len)
            .sum()
    }

    /// Edit-distance size: chars, images and block boundaries.
    ///
    /// Every successful deletion strictly decreases this value.
    pub fn size(&self) -> usize {
        self.blocks.iter().map(Block::len).sum::<usize>() + self.blocks.len() - 1
    }

    /// Paragraph texts joined by `\n`, images as U+FFFC.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for (idx, block) in self.blocks.iter().enumerate() {
            if idx > 0 {
                out.push('\n');
            }
            match block {
                Block::Paragraph(paragraph) => out.push_str(&paragraph.text()),
                Block::Image(_) => out.push('\u{FFFC}'),
            }
        }
        out
    }

    pub fn clamp_position(&self, pos: Position) -> Position {
        let block = pos.block.min(self.blocks.len().saturating_sub(1));
        let len = self.blocks.get(block).map(Block::len).unwrap_or(0);
        Position {
            block,
            offset: pos.offset.min(len),
        }
    }

    pub fn end_position(&self) -> Position {
        let block = self.blocks.len().saturating_sub(1);
        let offset = self.blocks.get(block).map(Block::len).unwrap_or(0);
        Position { block, offset }
    }

    pub fn block_len(&self, block: usize) -> usize {
        self.blocks.get(block).map(Block::len).unwrap_or(0)
    }

    pub fn images(&self) -> impl Iterator<Item = &ImageBlock> {
        self.blocks.iter().filter_map(Block::as_image)
    }

    pub fn image(&self, handle: ImageHandle) -> Option<&ImageBlock> {
        self.images().find(|image| image.handle == handle)
    }

    pub fn image_index(&self, handle: ImageHandle) -> Option<usize> {
        self.blocks
            .iter()
            .position(|block| matches!(block, Block::Image(image) if image.handle == handle))
    }

    /// Image block the position lies in, if any.
    pub fn image_at(&self, pos: Position) -> Option<&ImageBlock> {
        self.blocks.get(pos.block).and_then(Block::as_image)
    }

    /// Image with the highest insertion sequence.
    pub fn last_inserted_image(&self) -> Option<&ImageBlock> {
        self.images().max_by_key(|image| image.sequence)
    }

    pub fn pending_images(&self) -> Vec<ImageHandle> {
        self.images()
            .filter(|image| image.load == ImageLoad::Pending)
            .map(|image| image.handle)
            .collect()
    }

    /// Inserts newline-free `text` and returns the caret after it.
    pub fn insert_text(&mut self, pos: Position, text: &str, style: InlineStyle) -> Position {
        let pos = self.ensure_paragraph_at(pos);
        let inserted = text.chars().count();
        if let Block::Paragraph(paragraph) = &mut self.blocks[pos.block] {
            paragraph.insert_text(pos.offset, text, style);
        }
        Position {
            block: pos.block,
            offset: pos.offset + inserted,
        }
    }

    /// Splits the paragraph at `pos` and returns the start of the new one.
    pub fn split_paragraph(&mut self, pos: Position) -> Position {
        let pos = self.ensure_paragraph_at(pos);
        if let Block::Paragraph(paragraph) = &mut self.blocks[pos.block] {
            let tail = paragraph.split_off(pos.offset);
            self.blocks.insert(pos.block + 1, Block::Paragraph(tail));
        }
        Position {
            block: pos.block + 1,
            offset: 0,
        }
    }

    /// Inserts an image at `pos` followed by a line-break paragraph.
    ///
    /// An empty head paragraph is replaced by the image. Returns the new
    /// handle and the caret at the start of the trailing paragraph.
    pub fn insert_image(
        &mut self,
        pos: Position,
        source: ImageSource,
        size: SizeClass,
    ) -> (ImageHandle, Position) {
        let pos = self.ensure_paragraph_at(pos);
        let handle = ImageHandle(self.next_handle);
        self.next_handle += 1;
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let image = Block::Image(ImageBlock {
            handle,
            source,
            size,
            sequence,
            load: ImageLoad::Pending,
            removable: false,
        });

        let (tail, head_empty) = match &mut self.blocks[pos.block] {
            Block::Paragraph(paragraph) => {
                let tail = paragraph.split_off(pos.offset);
                (tail, paragraph.is_empty())
            }
            Block::Image(_) => (Paragraph::new(), false),
        };
        let image_index = if head_empty {
            self.blocks[pos.block] = image;
            pos.block
        } else {
            self.blocks.insert(pos.block + 1, image);
            pos.block + 1
        };
        self.blocks.insert(image_index + 1, Block::Paragraph(tail));
        (
            handle,
            Position {
                block: image_index + 1,
                offset: 0,
            },
        )
    }

    pub fn remove_image(&mut self, handle: ImageHandle) -> Option<(usize, ImageBlock)> {
        let idx = self.image_index(handle)?;
        let removed = self.blocks.remove(idx);
        self.ensure_not_empty();
        match removed {
            Block::Image(image) => Some((idx, image)),
            Block::Paragraph(_) => None,
        }
    }

    /// Deletes everything between `start` and `end` and returns the caret.
    ///
    /// The surviving ends of the first and last paragraph are merged.
    pub fn delete_range(&mut self, start: Position, end: Position) -> Position {
        let (start, end) = (self.clamp_position(start), self.clamp_position(end));
        let (start, end) = (start.min(end), start.max(end));
        if start == end {
            return start;
        }

        if start.block == end.block {
            if let Block::Paragraph(paragraph) = &mut self.blocks[start.block] {
                paragraph.delete_range(start.offset, end.offset);
                return start;
            }
            self.blocks.remove(start.block);
            self.ensure_not_empty();
            return self.caret_after_removal(start.block);
        }

        let end_removed = matches!(self.blocks[end.block], Block::Image(_)) && end.offset >= 1;
        if let Block::Paragraph(paragraph) = &mut self.blocks[end.block] {
            paragraph.delete_range(0, end.offset);
        }
        let start_removed = match &mut self.blocks[start.block] {
            Block::Paragraph(paragraph) => {
                let len = paragraph.char_len();
                paragraph.delete_range(start.offset, len);
                false
            }
            Block::Image(_) => start.offset == 0,
        };

        if end_removed {
            self.blocks.remove(end.block);
        }
        self.blocks.drain(start.block + 1..end.block);

        let caret = if start_removed {
            self.blocks.remove(start.block);
            self.ensure_not_empty();
            self.caret_after_removal(start.block)
        } else {
            if !end_removed {
                self.merge_following_paragraph(start.block);
            }
            start
        };
        self.clamp_position(caret)
    }

    /// Backspace at `pos`. Returns `None` when there is nothing to delete.
    pub fn delete_backward(&mut self, pos: Position) -> Option<Position> {
        let pos = self.clamp_position(pos);
        let is_image = matches!(self.blocks[pos.block], Block::Image(_));
        if is_image && pos.offset == 1 {
            self.blocks.remove(pos.block);
            self.ensure_not_empty();
            return Some(self.caret_after_removal(pos.block));
        }
        if !is_image && pos.offset > 0 {
            if let Block::Paragraph(paragraph) = &mut self.blocks[pos.block] {
                paragraph.delete_range(pos.offset - 1, pos.offset);
            }
            return Some(Position::new(pos.block, pos.offset - 1));
        }
        self.delete_block_boundary_backward(pos.block)
    }

    /// Forward delete at `pos`. Returns `None` when there is nothing to delete.
    pub fn delete_forward(&mut self, pos: Position) -> Option<Position> {
        let pos = self.clamp_position(pos);
        let is_image = matches!(self.blocks[pos.block], Block::Image(_));
        if is_image && pos.offset == 0 {
            self.blocks.remove(pos.block);
            self.ensure_not_empty();
            return Some(self.caret_after_removal(pos.block));
        }
        if !is_image && pos.offset < self.blocks[pos.block].len() {
            if let Block::Paragraph(paragraph) = &mut self.blocks[pos.block] {
                paragraph.delete_range(pos.offset, pos.offset + 1);
            }
            return Some(pos);
        }
        self.delete_block_boundary_forward(pos)
    }

    /// Sets or clears `format` on every char between `start` and `end`.
    pub fn apply_inline(&mut self, start: Position, end: Position, format: InlineFormat, on: bool) {
        let (start, end) = (self.clamp_position(start), self.clamp_position(end));
        let (start, end) = (start.min(end), start.max(end));
        for block in start.block..=end.block {
            if let Block::Paragraph(paragraph) = &mut self.blocks[block] {
                let from = if block == start.block { start.offset } else { 0 };
                let to = if block == end.block {
                    end.offset
                } else {
                    paragraph.char_len()
                };
                paragraph.apply_style(from, to, |style| style.set(format, on));
            }
        }
    }

    /// True when the range holds at least one char and every char carries
    /// `format`.
    pub fn range_has_inline(&self, start: Position, end: Position, format: InlineFormat) -> bool {
        let (start, end) = (self.clamp_position(start), self.clamp_position(end));
        let (start, end) = (start.min(end), start.max(end));
        let mut seen = false;
        for block in start.block..=end.block {
            if let Block::Paragraph(paragraph) = &self.blocks[block] {
                let from = if block == start.block { start.offset } else { 0 };
                let to = if block == end.block {
                    end.offset
                } else {
                    paragraph.char_len()
                };
                match paragraph.range_all(from, to, |style| style.has(format)) {
                    Some(false) => return false,
                    Some(true) => seen = true,
                    None => {}
                }
            }
        }
        seen
    }

    /// Style a char typed at `pos` would inherit.
    pub fn style_at(&self, pos: Position) -> InlineStyle {
        let pos = self.clamp_position(pos);
        self.blocks
            .get(pos.block)
            .and_then(Block::as_paragraph)
            .and_then(|paragraph| paragraph.style_before(pos.offset))
            .unwrap_or_default()
    }

    pub fn set_alignment(&mut self, first_block: usize, last_block: usize, align: Alignment) {
        let last = last_block.min(self.blocks.len().saturating_sub(1));
        for block in first_block..=last {
            if let Some(Block::Paragraph(paragraph)) = self.blocks.get_mut(block) {
                paragraph.align = align;
            }
        }
    }

    /// Alignment of a paragraph block; `None` for images.
    pub fn alignment_at(&self, block: usize) -> Option<Alignment> {
        self.blocks
            .get(block)
            .and_then(Block::as_paragraph)
            .map(|paragraph| paragraph.align)
    }

    pub fn set_image_size(&mut self, handle: ImageHandle, size: SizeClass) -> bool {
        self.image_mut(handle)
            .map(|image| image.size = size)
            .is_some()
    }

    pub fn mark_image_loaded(&mut self, handle: ImageHandle, width: u32, height: u32) -> bool {
        self.image_mut(handle)
            .map(|image| {
                image.load = ImageLoad::Loaded { width, height };
                image.removable = true;
            })
            .is_some()
    }

    pub fn mark_image_failed(&mut self, handle: ImageHandle) -> bool {
        self.image_mut(handle)
            .map(|image| {
                image.load = ImageLoad::Failed;
                image.removable = true;
            })
            .is_some()
    }

    fn image_mut(&mut self, handle: ImageHandle) -> Option<&mut ImageBlock> {
        self.blocks.iter_mut().find_map(|block| match block {
            Block::Image(image) if image.handle == handle => Some(image),
            _ => None,
        })
    }

    /// Resolves a position to a paragraph position, creating an empty
    /// paragraph next to an image when needed.
    fn ensure_paragraph_at(&mut self, pos: Position) -> Position {
        let pos = self.clamp_position(pos);
        if matches!(self.blocks[pos.block], Block::Paragraph(_)) {
            return pos;
        }
        if pos.offset == 0 {
            self.blocks
                .insert(pos.block, Block::Paragraph(Paragraph::new()));
            return Position::new(pos.block, 0);
        }
        let next = pos.block + 1;
        if !matches!(self.blocks.get(next), Some(Block::Paragraph(_))) {
            self.blocks.insert(next, Block::Paragraph(Paragraph::new()));
        }
        Position::new(next, 0)
    }

    /// Caret after the block at `idx` was removed: start of whatever now
    /// occupies `idx`, or the end of the document.
    fn caret_after_removal(&self, idx: usize) -> Position {
        if idx < self.blocks.len() {
            Position::new(idx, 0)
        } else {
            self.end_position()
        }
    }

    fn merge_following_paragraph(&mut self, idx: usize) {
        let mergeable = matches!(self.blocks.get(idx), Some(Block::Paragraph(_)))
            && matches!(self.blocks.get(idx + 1), Some(Block::Paragraph(_)));
        if !mergeable {
            return;
        }
        if let Block::Paragraph(tail) = self.blocks.remove(idx + 1) {
            if let Block::Paragraph(head) = &mut self.blocks[idx] {
                head.append(tail);
            }
        }
    }

    /// Backspace at the start of block `idx`.
    fn delete_block_boundary_backward(&mut self, idx: usize) -> Option<Position> {
        if idx == 0 {
            return None;
        }
        let prev = idx - 1;
        let current_is_paragraph = matches!(self.blocks[idx], Block::Paragraph(_));
        let current_empty = self.blocks[idx].is_empty();
        let prev_len = self.blocks[prev].as_paragraph().map(Paragraph::char_len);
        match prev_len {
            Some(len) if current_is_paragraph => {
                self.merge_following_paragraph(prev);
                Some(Position::new(prev, len))
            }
            // Caret before an image: eat the previous paragraph's last char,
            // or the paragraph itself when it is empty.
            Some(0) => {
                self.blocks.remove(prev);
                Some(Position::new(prev, 0))
            }
            Some(len) => {
                if let Block::Paragraph(head) = &mut self.blocks[prev] {
                    head.delete_range(len - 1, len);
                }
                Some(Position::new(prev, len - 1))
            }
            None if current_empty => {
                self.blocks.remove(idx);
                Some(Position::new(prev, 1))
            }
            None => {
                self.blocks.remove(prev);
                Some(Position::new(prev, 0))
            }
        }
    }

    /// Forward delete at the end of the block at `pos`.
    fn delete_block_boundary_forward(&mut self, pos: Position) -> Option<Position> {
        let next = pos.block + 1;
        if next >= self.blocks.len() {
            return None;
        }
        let current_is_paragraph = matches!(self.blocks[pos.block], Block::Paragraph(_));
        let current_empty = self.blocks[pos.block].is_empty();
        let next_len = self.blocks[next].as_paragraph().map(Paragraph::char_len);
        match next_len {
            Some(_) if current_is_paragraph => {
                self.merge_following_paragraph(pos.block);
                Some(pos)
            }
            Some(0) => {
                self.blocks.remove(next);
                Some(pos)
            }
            Some(_) => {
                if let Block::Paragraph(tail) = &mut self.blocks[next] {
                    tail.delete_range(0, 1);
                }
                Some(pos)
            }
            None if current_is_paragraph && current_empty => {
                self.blocks.remove(pos.block);
                Some(Position::new(pos.block, 0))
            }
            None => {
                self.blocks.remove(next);
                Some(pos)
            }
        }
    }

    fn ensure_not_empty(&mut self) {
        if self.blocks.is_empty() {
            self.blocks.push(Block::Paragraph(Paragraph::new()));
        }
    }
}
