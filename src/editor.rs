use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::doc::{
    block_mut, caret_resolves, to_markdown, Block, Caret, Document, PathStep, Selection,
};

mod context;
mod escape;
mod palette;
mod shortcuts;
mod structure;

pub use context::{cursor_context, find_list_ancestor, CursorContext};
pub use palette::{
    catalog, filter, group_entries, CommandAction, CommandEntry, CommandMenu, NavDirection,
    TRIGGER,
};
pub use shortcuts::ChordEffect;

use structure::{insert_char_at, remove_char_before, split_leaf};

/// Host-side callbacks of the editing subsystem. Dialog capabilities cover the
/// commands that need a second input (a URL, an upload) a keystroke cannot
/// supply.
pub trait EditorHost {
    /// Fired on every settled document change with the serialized markdown.
    fn content_changed(&mut self, markdown: &str);
    /// Fired on the save chord and when the auto-save slot comes due.
    fn save_requested(&mut self);
    fn link_dialog_requested(&mut self) {}
    fn image_dialog_requested(&mut self) {}
}

pub const AUTOSAVE_DELAY: Duration = Duration::from_secs(2);

/// The auto-save debounce: a single scheduled-task slot that
/// cancels-and-reschedules on every input event. The owning event loop polls
/// `take_due` on its tick; there are no hidden timer handles.
#[derive(Debug)]
pub struct SaveSlot {
    delay: Duration,
    deadline: Option<Instant>,
}

impl SaveSlot {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Reschedule the deadline `delay` after `now`, replacing any pending one.
    pub fn bump(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_scheduled(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }

    /// Clears and reports the deadline if it has expired.
    pub fn take_due(&mut self, now: Instant) -> bool {
        if self.due(now) {
            self.deadline = None;
            true
        } else {
            false
        }
    }
}

/// One editing session: the document, the caret, the menu and save state, and
/// the host handle, threaded explicitly through every operation.
pub struct EditorSession<H: EditorHost> {
    document: Document,
    caret: Caret,
    selection_anchor: Option<Caret>,
    menu: CommandMenu,
    trigger_start: Option<Caret>,
    save_slot: SaveSlot,
    host: H,
    dirty: bool,
}

impl<H: EditorHost> EditorSession<H> {
    pub fn new(mut document: Document, host: H) -> Self {
        document.ensure_initialized();
        Self {
            document,
            caret: Caret::default(),
            selection_anchor: None,
            menu: CommandMenu::default(),
            trigger_start: None,
            save_slot: SaveSlot::new(AUTOSAVE_DELAY),
            host,
            dirty: false,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn caret(&self) -> &Caret {
        &self.caret
    }

    pub fn menu(&self) -> &CommandMenu {
        &self.menu
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn markdown(&self) -> String {
        to_markdown(&self.document)
    }

    /// Place the caret, rejecting positions that do not resolve in the tree.
    pub fn set_caret(&mut self, caret: Caret) -> bool {
        if !caret_resolves(&self.document, &caret) {
            return false;
        }
        self.caret = caret;
        self.selection_anchor = None;
        true
    }

    pub fn select(&mut self, anchor: Caret, head: Caret) -> bool {
        if !caret_resolves(&self.document, &anchor) || !caret_resolves(&self.document, &head) {
            return false;
        }
        self.selection_anchor = Some(anchor);
        self.caret = head;
        true
    }

    pub fn selection(&self) -> Option<Selection> {
        let anchor = self.selection_anchor.clone()?;
        Some(Selection::range(anchor, self.caret.clone()))
    }

    /// Route one key event. Returns whether the event was consumed; an
    /// unconsumed event falls through to the host's default handling.
    pub fn handle_key(&mut self, key: &KeyEvent) -> bool {
        if key.kind == KeyEventKind::Release {
            return false;
        }

        if self.menu.is_open() {
            return self.handle_menu_key(key);
        }

        if escape::dispatch(&mut self.document, &mut self.caret, key) {
            self.selection_anchor = None;
            self.note_change();
            return true;
        }

        let selection = self.selection();
        match shortcuts::dispatch(&mut self.document, &mut self.caret, selection.as_ref(), key) {
            ChordEffect::Edited => {
                self.selection_anchor = None;
                self.note_change();
                true
            }
            ChordEffect::SaveRequested => {
                self.save_now();
                true
            }
            ChordEffect::LinkDialogRequested => {
                self.host.link_dialog_requested();
                true
            }
            ChordEffect::Suppressed => true,
            ChordEffect::NotHandled => self.handle_text_key(key),
        }
    }

    fn handle_text_key(&mut self, key: &KeyEvent) -> bool {
        match key.code {
            KeyCode::Char(ch)
                if !key.modifiers.contains(KeyModifiers::CONTROL)
                    && !key.modifiers.contains(KeyModifiers::ALT) =>
            {
                if ch == TRIGGER && self.caret_in_text_block() {
                    let trigger_start = self.caret.clone();
                    if !self.insert_char(ch) {
                        return false;
                    }
                    self.trigger_start = Some(trigger_start);
                    self.menu.open();
                    self.note_change();
                    return true;
                }
                if self.insert_char(ch) {
                    self.note_change();
                    true
                } else {
                    false
                }
            }
            KeyCode::Enter if key.modifiers.is_empty() => {
                if self.insert_break() {
                    self.note_change();
                    true
                } else {
                    false
                }
            }
            KeyCode::Backspace if key.modifiers.is_empty() => {
                if self.backspace() {
                    self.note_change();
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    // ========================================================================
    // Command menu wiring
    // ========================================================================

    fn handle_menu_key(&mut self, key: &KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc => {
                self.dismiss_menu();
                true
            }
            KeyCode::Up => {
                self.menu.navigate(NavDirection::Up);
                true
            }
            KeyCode::Down => {
                self.menu.navigate(NavDirection::Down);
                true
            }
            KeyCode::Enter => {
                let Some(entry) = self.menu.selected_entry() else {
                    self.dismiss_menu();
                    return true;
                };
                let action = entry.action;
                self.remove_trigger_text();
                self.dismiss_menu();
                let _ = self.run_command(action);
                // The trigger text is gone from the document even when the
                // command only opened a dialog.
                self.note_change();
                true
            }
            KeyCode::Backspace => {
                if self.menu.pop_query_char() {
                    if self.backspace() {
                        self.note_change();
                    }
                } else {
                    // The trigger character itself is being deleted.
                    self.dismiss_menu();
                    if self.backspace() {
                        self.note_change();
                    }
                }
                true
            }
            KeyCode::Char(' ') => {
                // A space ends the trigger sequence.
                self.dismiss_menu();
                if self.insert_char(' ') {
                    self.note_change();
                }
                true
            }
            KeyCode::Char(ch)
                if !key.modifiers.contains(KeyModifiers::CONTROL)
                    && !key.modifiers.contains(KeyModifiers::ALT) =>
            {
                if self.insert_char(ch) {
                    self.menu.push_query_char(ch);
                    self.note_change();
                }
                true
            }
            _ => {
                self.dismiss_menu();
                false
            }
        }
    }

    /// Menu closed by a click outside of it.
    pub fn focus_lost(&mut self) {
        self.dismiss_menu();
    }

    fn dismiss_menu(&mut self) {
        self.menu.close();
        self.trigger_start = None;
    }

    /// Selecting an entry deletes the trigger character and the typed query
    /// from the document before the command runs.
    fn remove_trigger_text(&mut self) {
        let Some(start) = self.trigger_start.take() else {
            return;
        };
        let remove = 1 + self.menu.query().chars().count();
        let Some(block) = block_mut(&mut self.document, &start.path) else {
            return;
        };
        let Some(content) = block.content_mut() else {
            return;
        };
        let Some(span) = content.get_mut(start.span) else {
            return;
        };
        for _ in 0..remove {
            if !remove_char_before(&mut span.text, start.offset + 1) {
                break;
            }
        }
        self.caret = start;
    }

    fn run_command(&mut self, action: CommandAction) -> bool {
        match action {
            CommandAction::Heading(level) => {
                structure::toggle_heading(&mut self.document, &mut self.caret, level)
            }
            CommandAction::Quote => structure::wrap_in_quote(&mut self.document, &mut self.caret),
            CommandAction::CodeBlock => {
                structure::set_code_block(&mut self.document, &mut self.caret, None)
            }
            CommandAction::BulletList => {
                structure::toggle_list(&mut self.document, &mut self.caret, crate::doc::ListKind::Bullet)
            }
            CommandAction::OrderedList => {
                structure::toggle_list(&mut self.document, &mut self.caret, crate::doc::ListKind::Ordered)
            }
            CommandAction::Image => {
                self.host.image_dialog_requested();
                false
            }
            CommandAction::Link => {
                self.host.link_dialog_requested();
                false
            }
        }
    }

    // ========================================================================
    // Plain text editing
    // ========================================================================

    fn caret_in_text_block(&self) -> bool {
        matches!(
            crate::doc::block_ref(&self.document, &self.caret.path),
            Some(Block::Paragraph { .. }) | Some(Block::Heading { .. })
        )
    }

    fn insert_char(&mut self, ch: char) -> bool {
        let Some(block) = block_mut(&mut self.document, &self.caret.path) else {
            return false;
        };
        match block {
            Block::Paragraph { content } | Block::Heading { content, .. } => {
                let Some(span) = content.get_mut(self.caret.span) else {
                    return false;
                };
                insert_char_at(&mut span.text, self.caret.offset, ch);
                self.caret.offset += 1;
                true
            }
            Block::CodeBlock { code, .. } => {
                insert_char_at(code, self.caret.offset, ch);
                self.caret.offset += 1;
                true
            }
            _ => false,
        }
    }

    fn insert_break(&mut self) -> bool {
        let Some(block) = block_mut(&mut self.document, &self.caret.path) else {
            return false;
        };
        if let Block::CodeBlock { code, .. } = block {
            insert_char_at(code, self.caret.offset, '\n');
            self.caret.offset += 1;
            return true;
        }
        match split_leaf(&mut self.document, &self.caret) {
            Some(caret) => {
                self.caret = caret;
                true
            }
            None => false,
        }
    }

    fn backspace(&mut self) -> bool {
        let Some(block) = block_mut(&mut self.document, &self.caret.path) else {
            return false;
        };
        match block {
            Block::Paragraph { content } | Block::Heading { content, .. } => {
                if self.caret.offset > 0 {
                    let Some(span) = content.get_mut(self.caret.span) else {
                        return false;
                    };
                    if remove_char_before(&mut span.text, self.caret.offset) {
                        self.caret.offset -= 1;
                        return true;
                    }
                    return false;
                }
                if self.caret.span > 0 {
                    let previous = self.caret.span - 1;
                    let Some(span) = content.get_mut(previous) else {
                        return false;
                    };
                    let len = span.text.chars().count();
                    if len == 0 {
                        return false;
                    }
                    remove_char_before(&mut span.text, len);
                    self.caret.span = previous;
                    self.caret.offset = len - 1;
                    true
                } else {
                    false
                }
            }
            Block::CodeBlock { code, .. } => {
                if self.caret.offset == 0 {
                    return false;
                }
                if remove_char_before(code, self.caret.offset) {
                    self.caret.offset -= 1;
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    // ========================================================================
    // Media and saving
    // ========================================================================

    /// Insert an uploaded image after the top-level block the caret is in.
    /// Called by the host once its upload capability resolves.
    pub fn insert_media(&mut self, url: &str, alt: &str) {
        let root_index = match self.caret.path.steps().first() {
            Some(PathStep::Root(index)) => (*index).min(self.document.blocks.len().saturating_sub(1)),
            _ => self.document.blocks.len().saturating_sub(1),
        };
        let image = Block::Image {
            url: url.to_string(),
            alt: alt.to_string(),
        };
        self.document.blocks.insert(root_index + 1, image);
        self.caret = Caret::at(crate::doc::BlockPath::root(root_index + 1));
        self.selection_anchor = None;
        self.note_change();
    }

    pub fn save_now(&mut self) {
        self.save_slot.cancel();
        self.dirty = false;
        self.host.save_requested();
    }

    pub fn cancel_pending_save(&mut self) {
        self.save_slot.cancel();
    }

    pub fn save_pending(&self) -> bool {
        self.save_slot.is_scheduled()
    }

    /// Host event-loop tick: fires the auto-save when the slot is due.
    pub fn tick(&mut self, now: Instant) {
        if self.save_slot.take_due(now) {
            self.save_now();
        }
    }

    fn note_change(&mut self) {
        self.dirty = true;
        self.save_slot.bump(Instant::now());
        let markdown = to_markdown(&self.document);
        self.host.content_changed(&markdown);
    }
}

#[cfg(test)]
#[path = "editor_tests.rs"]
mod editor_tests;

#[cfg(test)]
#[path = "editor/escape_tests.rs"]
mod escape_tests;
