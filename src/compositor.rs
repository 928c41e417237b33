//! Compositor engine: owns the document and every piece of editing state.
//!
//! All mutation goes through this type. Each content-adding operation first
//! consults the overflow guard; deletions and navigation never do.

use std::collections::VecDeque;

use crate::canvas::{Background, CanvasConfig, FontSize};
use crate::document::{
    Alignment, Document, ImageHandle, ImageSource, InlineStyle, Position, Selection, SizeClass,
};
use crate::error::{ComposeError, ExportError};
use crate::export::{
    notice_file_name, DocumentSnapshot, ExportJob, ExportReport, ExportState, ImageOutput,
    Rasterizer, UploadSink,
};
use crate::format::{FormatCommand, FormatState};
use crate::input::{Key, KeyInput};
use crate::overflow::{
    BlockedReason, ContentMeasure, OverflowGuard, OverflowTransition, OVERFLOW_BANNER,
};

/// Undo snapshots kept before the oldest is dropped.
pub const HISTORY_LIMIT: usize = 100;

const ALERT_PREFIX: &str = "Failed to create image: ";

/// What a handled key press did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyOutcome {
    Inserted,
    Deleted,
    Moved,
    Formatted,
    Ignored,
}

#[derive(Clone, Debug)]
struct HistoryEntry {
    document: Document,
    selection: Selection,
}

/// Editing session over one notice.
pub struct Compositor {
    document: Document,
    selection: Selection,
    canvas: CanvasConfig,
    measure: Box<dyn ContentMeasure>,
    /// Size class given to newly inserted images.
    default_size: SizeClass,
    /// Typing style toggled on a collapsed caret.
    pending_style: Option<InlineStyle>,
    format_state: FormatState,
    overflow: OverflowGuard,
    banner: Option<&'static str>,
    alert: Option<String>,
    history: VecDeque<HistoryEntry>,
    pending_loads: Vec<ImageHandle>,
    export_state: ExportState,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("blocks", &self.document.block_count())
            .field("selection", &self.selection)
            .field("format_state", &self.format_state)
            .field("overflowed", &self.overflow.is_overflowed())
            .field("export_state", &self.export_state)
            .finish_non_exhaustive()
    }
}

impl Compositor {
    pub fn new<M>(measure: M) -> Self
    where
        M: ContentMeasure + 'static,
    {
        Self::with_canvas(CanvasConfig::portrait(), measure)
    }

    pub fn with_canvas<M>(canvas: CanvasConfig, measure: M) -> Self
    where
        M: ContentMeasure + 'static,
    {
        let mut compositor = Self {
            document: Document::new(),
            selection: Selection::default(),
            canvas,
            measure: Box::new(measure),
            default_size: SizeClass::default(),
            pending_style: None,
            format_state: FormatState::default(),
            overflow: OverflowGuard::new(),
            banner: None,
            alert: None,
            history: VecDeque::new(),
            pending_loads: Vec::new(),
            export_state: ExportState::Idle,
        };
        compositor.after_mutation();
        compositor
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn canvas(&self) -> &CanvasConfig {
        &self.canvas
    }

    pub fn format_state(&self) -> FormatState {
        self.format_state
    }

    pub fn is_overflowed(&self) -> bool {
        self.overflow.is_overflowed()
    }

    /// Last measured scroll extent.
    pub fn scroll_height(&self) -> f32 {
        self.overflow.last_scroll_height()
    }

    /// Persistent banner text, if any.
    pub fn banner(&self) -> Option<&'static str> {
        self.banner
    }

    /// Blocking alert raised by a failed export; cleared once taken.
    pub fn take_alert(&mut self) -> Option<String> {
        self.alert.take()
    }

    pub fn export_state(&self) -> ExportState {
        self.export_state
    }

    pub fn default_size_class(&self) -> SizeClass {
        self.default_size
    }

    /// Submit is enabled: not overflowed and nothing in flight.
    pub fn can_submit(&self) -> bool {
        !self.overflow.is_overflowed() && self.export_state == ExportState::Idle
    }

    pub fn has_pending_loads(&self) -> bool {
        !self.pending_loads.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.history.len()
    }

    /// Programmatic selection change.
    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = Selection::range(
            self.document.clamp_position(selection.anchor),
            self.document.clamp_position(selection.focus),
        );
        self.pending_style = None;
        self.refresh_format_state();
    }

    pub fn set_caret(&mut self, position: Position) {
        self.set_selection(Selection::caret(position));
    }

    pub fn select_all(&mut self) {
        self.set_selection(Selection::range(
            Position::default(),
            self.document.end_position(),
        ));
    }

    pub fn key_up(&mut self) {
        self.refresh_format_state();
    }

    pub fn mouse_up(&mut self) {
        self.refresh_format_state();
    }

    pub fn key_down(&mut self, input: KeyInput) -> Result<KeyOutcome, ComposeError> {
        if self.overflow.is_overflowed() && !input.permitted_while_overflowed() {
            return Err(self.block(BlockedReason::Typing));
        }
        if input.is_command() {
            return match input.key {
                Key::Char(ch) => match FormatCommand::from_shortcut(ch) {
                    Some(command) => self
                        .apply_format(command)
                        .map(|_| KeyOutcome::Formatted),
                    None => Ok(KeyOutcome::Ignored),
                },
                _ => Ok(KeyOutcome::Ignored),
            };
        }
        let outcome = match input.key {
            Key::Char(ch) => {
                let mut buf = [0u8; 4];
                self.insert_at_selection(ch.encode_utf8(&mut buf));
                KeyOutcome::Inserted
            }
            Key::Enter => {
                self.insert_at_selection("\n");
                KeyOutcome::Inserted
            }
            Key::Backspace => self.deletion_outcome(Self::delete_backward),
            Key::Delete => self.deletion_outcome(Self::delete_forward),
            key if key.is_navigation() => {
                self.move_caret(key, input.shift);
                KeyOutcome::Moved
            }
            _ => KeyOutcome::Ignored,
        };
        Ok(outcome)
    }

    /// Types `text` at the selection; `\n` splits paragraphs.
    pub fn type_text(&mut self, text: &str) -> Result<(), ComposeError> {
        if self.overflow.is_overflowed() {
            return Err(self.block(BlockedReason::Typing));
        }
        self.insert_at_selection(text);
        Ok(())
    }

    /// Pastes plain text; newlines split paragraphs.
    pub fn paste(&mut self, text: &str) -> Result<(), ComposeError> {
        if self.overflow.is_overflowed() {
            return Err(self.block(BlockedReason::Paste));
        }
        self.insert_at_selection(text);
        Ok(())
    }

    /// Applies a formatting command.
    ///
    /// While overflowed only an Undo that strictly shrinks the measured
    /// extent is accepted.
    pub fn apply_format(&mut self, command: FormatCommand) -> Result<FormatState, ComposeError> {
        if self.overflow.is_overflowed()
            && !(command == FormatCommand::Undo && self.undo_shrinks_content())
        {
            return Err(self.block(BlockedReason::Format));
        }
        let (start, end) = (self.selection.start(), self.selection.end());
        match command {
            FormatCommand::Undo => self.undo(),
            FormatCommand::ToggleCenter => {
                let align = if self.format_state.center {
                    Alignment::Left
                } else {
                    Alignment::Center
                };
                self.push_history();
                self.document.set_alignment(start.block, end.block, align);
                self.after_mutation();
            }
            FormatCommand::Bold | FormatCommand::Italic | FormatCommand::Underline => {
                let Some(format) = command.inline_format() else {
                    return Ok(self.format_state);
                };
                if self.selection.is_collapsed() {
                    let mut style = self
                        .pending_style
                        .unwrap_or_else(|| self.document.style_at(start));
                    style.set(format, !style.has(format));
                    self.pending_style = Some(style);
                    self.refresh_format_state();
                } else {
                    let on = !self.document.range_has_inline(start, end, format);
                    self.push_history();
                    self.document.apply_inline(start, end, format, on);
                    self.after_mutation();
                }
            }
        }
        Ok(self.format_state)
    }

    /// Inserts an image at the caret, followed by a line break.
    ///
    /// The block stays pending until [`Compositor::settle`] runs.
    pub fn insert_image(&mut self, source: ImageSource) -> Result<ImageHandle, ComposeError> {
        if self.overflow.is_overflowed() {
            return Err(self.block(BlockedReason::InsertImage));
        }
        self.push_history();
        let caret = self.collapse_selection();
        let (handle, caret) = self
            .document
            .insert_image(caret, source, self.default_size);
        self.pending_loads.push(handle);
        self.selection = Selection::caret(caret);
        self.pending_style = None;
        self.after_mutation();
        Ok(handle)
    }

    /// Completes pending image loads and re-checks overflow.
    ///
    /// Returns how many images decoded successfully.
    pub fn settle(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending_loads);
        let mut loaded = 0usize;
        for handle in pending {
            let Some(image) = self.document.image(handle) else {
                continue;
            };
            match image.source().decode_dimensions() {
                Ok((width, height)) => {
                    self.document.mark_image_loaded(handle, width, height);
                    loaded += 1;
                }
                Err(err) => {
                    log::warn!("image {handle} failed to load: {err}");
                    self.document.mark_image_failed(handle);
                }
            }
        }
        self.after_mutation();
        loaded
    }

    /// Sets the default size class and resizes the image under the caret,
    /// or else the most recently inserted image.
    pub fn resize_images(&mut self, size: SizeClass) -> Option<ImageHandle> {
        self.default_size = size;
        let target = self
            .document
            .image_at(self.selection.focus)
            .or_else(|| self.document.image_at(self.selection.anchor))
            .or_else(|| self.document.last_inserted_image())
            .map(|image| image.handle());
        if let Some(handle) = target {
            if self.document.image(handle).map(|image| image.size()) != Some(size) {
                self.push_history();
                self.document.set_image_size(handle, size);
            }
        }
        self.after_mutation();
        target
    }

    /// Removes an image. Always permitted.
    pub fn remove_image(&mut self, handle: ImageHandle) -> Result<(), ComposeError> {
        if self.document.image(handle).is_none() {
            return Err(ComposeError::UnknownImage(handle));
        }
        self.push_history();
        if let Some((idx, _)) = self.document.remove_image(handle) {
            let shift = |pos: Position| {
                if pos.block > idx {
                    Position::new(pos.block - 1, pos.offset)
                } else if pos.block == idx {
                    Position::new(idx, 0)
                } else {
                    pos
                }
            };
            self.selection = Selection::range(
                self.document.clamp_position(shift(self.selection.anchor)),
                self.document.clamp_position(shift(self.selection.focus)),
            );
        }
        self.pending_loads.retain(|pending| *pending != handle);
        self.after_mutation();
        Ok(())
    }

    /// Backspace. Always permitted; returns whether anything was deleted.
    pub fn delete_backward(&mut self) -> bool {
        if !self.selection.is_collapsed() {
            return self.delete_selection();
        }
        let before = self.document.clone();
        match self.document.delete_backward(self.selection.focus) {
            Some(caret) => self.commit_deletion(before, caret),
            None => false,
        }
    }

    /// Forward delete. Always permitted; returns whether anything was deleted.
    pub fn delete_forward(&mut self) -> bool {
        if !self.selection.is_collapsed() {
            return self.delete_selection();
        }
        let before = self.document.clone();
        match self.document.delete_forward(self.selection.focus) {
            Some(caret) => self.commit_deletion(before, caret),
            None => false,
        }
    }

    /// Deletes the selected range. Always permitted.
    pub fn delete_selection(&mut self) -> bool {
        if self.selection.is_collapsed() {
            return false;
        }
        let before = self.document.clone();
        let caret = self
            .document
            .delete_range(self.selection.start(), self.selection.end());
        self.commit_deletion(before, caret)
    }

    pub fn set_font_size(&mut self, size: FontSize) {
        self.canvas.font_size = size;
        self.after_mutation();
    }

    pub fn increase_font_size(&mut self) -> FontSize {
        self.set_font_size(self.canvas.font_size.increase());
        self.canvas.font_size
    }

    pub fn decrease_font_size(&mut self) -> FontSize {
        self.set_font_size(self.canvas.font_size.decrease());
        self.canvas.font_size
    }

    pub fn set_background(&mut self, background: Background) {
        self.canvas.background = background;
        self.after_mutation();
    }

    pub fn select_background_preset(&mut self, index: usize) -> Result<(), ComposeError> {
        let background =
            Background::preset(index).ok_or(ComposeError::PresetOutOfRange(index))?;
        self.set_background(background);
        Ok(())
    }

    /// Discards the document and editing history; canvas settings persist.
    pub fn reset(&mut self) {
        self.document = Document::new();
        self.selection = Selection::default();
        self.pending_style = None;
        self.history.clear();
        self.pending_loads.clear();
        self.banner = None;
        self.after_mutation();
    }

    /// Measures again, e.g. after the viewport or fonts changed.
    pub fn recheck_overflow(&mut self) -> bool {
        match self
            .overflow
            .recheck(&*self.measure, &self.document, &self.canvas)
        {
            OverflowTransition::Cleared => self.banner = None,
            OverflowTransition::Entered | OverflowTransition::Unchanged => {
                if self.overflow.is_overflowed() {
                    self.banner = Some(OVERFLOW_BANNER);
                }
            }
        }
        self.overflow.is_overflowed()
    }

    /// Enters `Rendering` and snapshots the document for export.
    pub fn begin_export(&mut self) -> Result<ExportJob, ComposeError> {
        self.begin_export_at(chrono::Utc::now().timestamp_millis())
    }

    /// [`Compositor::begin_export`] with an explicit timestamp for the file
    /// name.
    pub fn begin_export_at(&mut self, unix_millis: i64) -> Result<ExportJob, ComposeError> {
        if self.export_state == ExportState::Rendering {
            log::debug!("submit ignored: export already in flight");
            return Err(ComposeError::ExportInFlight);
        }
        if self.has_pending_loads() {
            self.settle();
        }
        if self.overflow.is_overflowed() {
            return Err(ComposeError::ExportBlockedByOverflow);
        }
        self.export_state = ExportState::Rendering;
        log::debug!("export state: Idle -> Rendering");
        let snapshot = DocumentSnapshot::capture(&self.document, &self.canvas);
        Ok(ExportJob::new(snapshot, notice_file_name(unix_millis)))
    }

    /// Returns to `Idle`; a render failure raises the alert.
    pub fn finish_export(
        &mut self,
        result: Result<ExportReport, ExportError>,
    ) -> Result<ExportReport, ExportError> {
        self.export_state = ExportState::Idle;
        log::debug!("export state: Rendering -> Idle");
        if let Err(err) = &result {
            log::error!("export aborted: {err}");
            self.alert = Some(format!("{ALERT_PREFIX}{err}"));
        }
        result
    }

    /// Snapshot, rasterize, upload, and hand the result to `on_image`.
    pub fn submit<R, U, F>(
        &mut self,
        rasterizer: &R,
        uploader: &U,
        on_image: F,
    ) -> Result<ExportReport, ComposeError>
    where
        R: Rasterizer + ?Sized,
        U: UploadSink + ?Sized,
        F: FnOnce(&ImageOutput),
    {
        let job = self.begin_export()?;
        let result = job.run(rasterizer, uploader);
        let report = self.finish_export(result)?;
        on_image(&report.output);
        Ok(report)
    }

    fn block(&mut self, reason: BlockedReason) -> ComposeError {
        log::debug!("rejected while overflowed: {reason:?}");
        self.banner = Some(reason.message());
        ComposeError::BlockedByOverflow(reason)
    }

    fn insert_at_selection(&mut self, text: &str) {
        self.push_history();
        let mut caret = self.collapse_selection();
        let style = self
            .pending_style
            .unwrap_or_else(|| self.document.style_at(caret));
        for (idx, line) in text.split('\n').enumerate() {
            if idx > 0 {
                caret = self.document.split_paragraph(caret);
            }
            let line = line.trim_end_matches('\r');
            if !line.is_empty() {
                caret = self.document.insert_text(caret, line, style);
            }
        }
        self.selection = Selection::caret(caret);
        self.pending_style = (self.document.style_at(caret) != style).then_some(style);
        self.after_mutation();
    }

    /// Deletes a non-collapsed selection and returns the caret.
    fn collapse_selection(&mut self) -> Position {
        if self.selection.is_collapsed() {
            return self.document.clamp_position(self.selection.focus);
        }
        self.document
            .delete_range(self.selection.start(), self.selection.end())
    }

    fn deletion_outcome(&mut self, delete: fn(&mut Self) -> bool) -> KeyOutcome {
        if delete(self) {
            KeyOutcome::Deleted
        } else {
            KeyOutcome::Ignored
        }
    }

    fn commit_deletion(&mut self, before: Document, caret: Position) -> bool {
        self.record_history(HistoryEntry {
            document: before,
            selection: self.selection,
        });
        self.selection = Selection::caret(caret);
        self.pending_style = None;
        self.after_mutation();
        true
    }

    fn move_caret(&mut self, key: Key, extend: bool) {
        let focus = self.document.clamp_position(self.selection.focus);
        let len = |block: usize| self.document.block_len(block);
        let last_block = self.document.block_count().saturating_sub(1);
        let next = match key {
            Key::ArrowLeft if focus.offset > 0 => Position::new(focus.block, focus.offset - 1),
            Key::ArrowLeft if focus.block > 0 => Position::new(focus.block - 1, len(focus.block - 1)),
            Key::ArrowRight if focus.offset < len(focus.block) => {
                Position::new(focus.block, focus.offset + 1)
            }
            Key::ArrowRight if focus.block < last_block => Position::new(focus.block + 1, 0),
            Key::ArrowUp if focus.block > 0 => {
                Position::new(focus.block - 1, focus.offset.min(len(focus.block - 1)))
            }
            Key::ArrowUp => Position::new(0, 0),
            Key::ArrowDown if focus.block < last_block => {
                Position::new(focus.block + 1, focus.offset.min(len(focus.block + 1)))
            }
            Key::ArrowDown => self.document.end_position(),
            Key::Home => Position::new(focus.block, 0),
            Key::End => Position::new(focus.block, len(focus.block)),
            _ => focus,
        };
        let selection = if extend {
            Selection::range(self.selection.anchor, next)
        } else {
            Selection::caret(next)
        };
        self.set_selection(selection);
    }

    fn undo_shrinks_content(&self) -> bool {
        self.history.back().is_some_and(|entry| {
            self.measure.scroll_height_px(&entry.document, &self.canvas)
                < self.overflow.last_scroll_height()
        })
    }

    fn undo(&mut self) {
        let Some(entry) = self.history.pop_back() else {
            return;
        };
        self.document = entry.document;
        self.selection = Selection::range(
            self.document.clamp_position(entry.selection.anchor),
            self.document.clamp_position(entry.selection.focus),
        );
        self.pending_style = None;
        self.pending_loads = self.document.pending_images();
        self.after_mutation();
    }

    fn push_history(&mut self) {
        self.record_history(HistoryEntry {
            document: self.document.clone(),
            selection: self.selection,
        });
    }

    fn record_history(&mut self, entry: HistoryEntry) {
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(entry);
    }

    fn after_mutation(&mut self) {
        self.recheck_overflow();
        self.refresh_format_state();
    }

    fn refresh_format_state(&mut self) {
        self.format_state = FormatState::compute(&self.document, self.selection, self.pending_style);
    }
}
