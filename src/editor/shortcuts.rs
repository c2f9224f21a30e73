//! Chord dispatch: a fixed set of modifier+key combinations mapped onto
//! document transforms. Application chords use the double modifier
//! CONTROL+ALT so they cannot collide with host- or OS-reserved
//! single-modifier shortcuts; the only single-modifier chords intercepted are
//! save and the suppressed host-native print.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::doc::{Caret, Document, ListKind, Mark, Selection};

use super::structure::{set_code_block, toggle_heading, toggle_list, toggle_mark, wrap_in_quote};

/// What a chord did. `NotHandled` means the event must fall through to the
/// host's default handling — including when a matched command failed its
/// precondition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChordEffect {
    NotHandled,
    Edited,
    SaveRequested,
    LinkDialogRequested,
    Suppressed,
}

pub(crate) fn dispatch(
    document: &mut Document,
    caret: &mut Caret,
    selection: Option<&Selection>,
    key: &KeyEvent,
) -> ChordEffect {
    if key.modifiers == KeyModifiers::CONTROL {
        match key.code {
            KeyCode::Char('s') => return ChordEffect::SaveRequested,
            KeyCode::Char('p') => return ChordEffect::Suppressed,
            _ => return ChordEffect::NotHandled,
        }
    }

    if !key
        .modifiers
        .contains(KeyModifiers::CONTROL | KeyModifiers::ALT)
    {
        return ChordEffect::NotHandled;
    }

    let handled = match key.code {
        KeyCode::Char('b') => mark_chord(document, caret, selection, Mark::Bold),
        KeyCode::Char('i') => mark_chord(document, caret, selection, Mark::Italic),
        KeyCode::Char('x') => mark_chord(document, caret, selection, Mark::Strike),
        KeyCode::Char('e') => mark_chord(document, caret, selection, Mark::Code),
        // A link needs a URL, which a chord cannot supply; hand off to the
        // host's dialog instead of toggling anything here.
        KeyCode::Char('k') => return ChordEffect::LinkDialogRequested,
        KeyCode::Char('1') => toggle_heading(document, caret, 1),
        KeyCode::Char('2') => toggle_heading(document, caret, 2),
        KeyCode::Char('3') => toggle_heading(document, caret, 3),
        KeyCode::Char('8') => toggle_list(document, caret, ListKind::Bullet),
        KeyCode::Char('7') => toggle_list(document, caret, ListKind::Ordered),
        KeyCode::Char('q') => wrap_in_quote(document, caret),
        KeyCode::Char('c') => set_code_block(document, caret, None),
        _ => false,
    };

    if handled {
        ChordEffect::Edited
    } else {
        ChordEffect::NotHandled
    }
}

fn mark_chord(
    document: &mut Document,
    caret: &mut Caret,
    selection: Option<&Selection>,
    mark: Mark,
) -> bool {
    let Some(selection) = selection else {
        return false;
    };
    toggle_mark(document, caret, selection, &mark)
}
