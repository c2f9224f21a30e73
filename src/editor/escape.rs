//! Block-escape behavior: the key sequences that let the caret leave a
//! container block without a menu action. Every handler returns `true` only
//! when it consumed the key; a missed precondition is not an error, the host
//! editor's default handling applies.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::doc::{block_mut, block_ref, spans_are_empty, Block, BlockPath, Caret, Document};

use super::context::{cursor_context, CursorContext};
use super::structure::{
    caret_to_end, caret_to_start, insert_block_after, insert_block_before, remove_block,
    replace_block, sibling_count,
};

pub(crate) fn dispatch(document: &mut Document, caret: &mut Caret, key: &KeyEvent) -> bool {
    let Some(context) = cursor_context(document, caret) else {
        return false;
    };
    match context {
        CursorContext::InQuote {
            quote_path,
            child_index,
            child_count,
        } => match key.code {
            KeyCode::Enter if key.modifiers.is_empty() => {
                exit_quote_on_enter(document, caret, &quote_path, child_count)
            }
            KeyCode::Backspace if key.modifiers.is_empty() => {
                exit_quote_on_backspace(document, caret, &quote_path, child_index, child_count)
            }
            _ => false,
        },
        CursorContext::InCodeBlock { path } => code_block_key(document, caret, &path, key),
        CursorContext::InList {
            list_path,
            entry_index,
            entry_count,
            block_index,
            entry_len,
            ..
        } => match key.code {
            KeyCode::Enter if key.modifiers.is_empty() => exit_list_on_enter(
                document, caret, &list_path, entry_index, entry_count, block_index, entry_len,
            ),
            _ => false,
        },
        CursorContext::TopLevel { .. } => false,
    }
}

fn is_empty_paragraph(document: &Document, path: &BlockPath) -> bool {
    matches!(
        block_ref(document, path),
        Some(Block::Paragraph { content }) if spans_are_empty(content)
    )
}

// ============================================================================
// Quote escapes
// ============================================================================

fn exit_quote_on_enter(
    document: &mut Document,
    caret: &mut Caret,
    quote_path: &BlockPath,
    child_count: usize,
) -> bool {
    if !is_empty_paragraph(document, &caret.path) {
        return false;
    }
    if child_count <= 1 {
        // Sole child: the quote itself collapses into an empty paragraph.
        if !replace_block(document, quote_path, Block::empty_paragraph()) {
            return false;
        }
        *caret = Caret::at(quote_path.clone());
        return true;
    }
    if remove_block(document, &caret.path).is_none() {
        return false;
    }
    let Some(new_path) = insert_block_after(document, quote_path, Block::empty_paragraph()) else {
        return false;
    };
    *caret = Caret::at(new_path);
    true
}

fn exit_quote_on_backspace(
    document: &mut Document,
    caret: &mut Caret,
    quote_path: &BlockPath,
    child_index: usize,
    child_count: usize,
) -> bool {
    if caret.offset != 0 || caret.span != 0 || !is_empty_paragraph(document, &caret.path) {
        return false;
    }
    if child_count <= 1 {
        if !replace_block(document, quote_path, Block::empty_paragraph()) {
            return false;
        }
        *caret = Caret::at(quote_path.clone());
        return true;
    }
    if child_index == 0 {
        // Escaping before the container; at the document front this inserts
        // at position 0 instead of failing.
        if remove_block(document, &caret.path).is_none() {
            return false;
        }
        let Some(new_path) = insert_block_before(document, quote_path, Block::empty_paragraph())
        else {
            return false;
        };
        *caret = Caret::at(new_path);
        return true;
    }
    // Backward delete into the preceding sibling.
    if remove_block(document, &caret.path).is_none() {
        return false;
    }
    let previous = quote_path.child(child_index - 1);
    match caret_to_end(document, &previous) {
        Some(position) => {
            *caret = position;
            true
        }
        None => {
            *caret = Caret::at(quote_path.clone());
            true
        }
    }
}

// ============================================================================
// List escape
// ============================================================================

fn exit_list_on_enter(
    document: &mut Document,
    caret: &mut Caret,
    list_path: &BlockPath,
    entry_index: usize,
    entry_count: usize,
    block_index: usize,
    entry_len: usize,
) -> bool {
    // Only the sole empty block of the trailing entry escapes.
    if entry_index + 1 != entry_count || block_index != 0 || entry_len != 1 {
        return false;
    }
    if !is_empty_paragraph(document, &caret.path) {
        return false;
    }
    let Some(list) = block_mut(document, list_path) else {
        return false;
    };
    let Some(entries) = list.list_entries_mut() else {
        return false;
    };
    entries.pop();
    if entries.is_empty() {
        if !replace_block(document, list_path, Block::empty_paragraph()) {
            return false;
        }
        *caret = Caret::at(list_path.clone());
        return true;
    }
    let Some(new_path) = insert_block_after(document, list_path, Block::empty_paragraph()) else {
        return false;
    };
    *caret = Caret::at(new_path);
    true
}

// ============================================================================
// Code block escapes
// ============================================================================

fn code_block_key(
    document: &mut Document,
    caret: &mut Caret,
    path: &BlockPath,
    key: &KeyEvent,
) -> bool {
    let Some(Block::CodeBlock { code, .. }) = block_ref(document, path) else {
        return false;
    };
    let len = code.chars().count();
    let blank = code.trim().is_empty();
    let trailing_blank_line = code.ends_with('\n');

    match key.code {
        KeyCode::Backspace if key.modifiers.is_empty() && blank => {
            delete_empty_code_block(document, caret, path)
        }
        KeyCode::Up if key.modifiers.is_empty() && caret.offset == 0 => {
            exit_up(document, caret, path)
        }
        KeyCode::Down if key.modifiers.is_empty() && caret.offset >= len => {
            exit_down(document, caret, path)
        }
        KeyCode::Enter if key.modifiers.is_empty() && caret.offset >= len && trailing_blank_line => {
            exit_on_double_enter(document, caret, path)
        }
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::CONTROL) => {
            exit_down(document, caret, path)
        }
        _ => false,
    }
}

fn delete_empty_code_block(document: &mut Document, caret: &mut Caret, path: &BlockPath) -> bool {
    if !replace_block(document, path, Block::empty_paragraph()) {
        return false;
    }
    *caret = Caret::at(path.clone());
    true
}

fn exit_up(document: &mut Document, caret: &mut Caret, path: &BlockPath) -> bool {
    let index = match path.last_index() {
        Some(index) => index,
        None => return false,
    };
    if index == 0 {
        let Some(new_path) = insert_block_before(document, path, Block::empty_paragraph()) else {
            return false;
        };
        *caret = Caret::at(new_path);
        return true;
    }
    let previous = path.with_last_index(index - 1);
    match caret_to_end(document, &previous) {
        Some(position) => {
            *caret = position;
            true
        }
        None => false,
    }
}

fn exit_down(document: &mut Document, caret: &mut Caret, path: &BlockPath) -> bool {
    let (Some(index), Some(count)) = (path.last_index(), sibling_count(document, path)) else {
        return false;
    };
    if index + 1 < count {
        let next = path.with_last_index(index + 1);
        match caret_to_start(document, &next) {
            Some(position) => {
                *caret = position;
                return true;
            }
            None => return false,
        }
    }
    let Some(new_path) = insert_block_after(document, path, Block::empty_paragraph()) else {
        return false;
    };
    *caret = Caret::at(new_path);
    true
}

fn exit_on_double_enter(document: &mut Document, caret: &mut Caret, path: &BlockPath) -> bool {
    let Some(Block::CodeBlock { code, .. }) = block_mut(document, path) else {
        return false;
    };
    // Strip the blank line the first Enter produced.
    code.pop();
    let Some(new_path) = insert_block_after(document, path, Block::empty_paragraph()) else {
        return false;
    };
    *caret = Caret::at(new_path);
    true
}
