//! The cursor context: which container the caret currently sits in, computed
//! once per keystroke from the caret's path. Escape and chord handlers
//! dispatch on this tag instead of re-walking the tree themselves.

use crate::doc::{block_ref, Block, BlockPath, Caret, Document, ListKind, PathStep};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CursorContext {
    /// Caret in a block directly under the document root.
    TopLevel { index: usize },
    /// Caret in a direct child of a quote.
    InQuote {
        quote_path: BlockPath,
        child_index: usize,
        child_count: usize,
    },
    /// Caret in a block of a list entry.
    InList {
        list_path: BlockPath,
        kind: ListKind,
        entry_index: usize,
        entry_count: usize,
        block_index: usize,
        entry_len: usize,
    },
    /// Caret inside a code block's text.
    InCodeBlock { path: BlockPath },
}

pub fn cursor_context(document: &Document, caret: &Caret) -> Option<CursorContext> {
    let block = block_ref(document, &caret.path)?;
    if matches!(block, Block::CodeBlock { .. }) {
        return Some(CursorContext::InCodeBlock {
            path: caret.path.clone(),
        });
    }

    match caret.path.last()? {
        PathStep::Root(index) => Some(CursorContext::TopLevel { index: *index }),
        PathStep::Child(child_index) => {
            let quote_path = caret.path.parent()?;
            let Block::Quote { children } = block_ref(document, &quote_path)? else {
                return None;
            };
            Some(CursorContext::InQuote {
                quote_path,
                child_index: *child_index,
                child_count: children.len(),
            })
        }
        PathStep::Entry { entry, block: block_index } => {
            let list_path = caret.path.parent()?;
            let list = block_ref(document, &list_path)?;
            let kind = list.list_kind()?;
            let entries = list.list_entries()?;
            Some(CursorContext::InList {
                list_path,
                kind,
                entry_index: *entry,
                entry_count: entries.len(),
                block_index: *block_index,
                entry_len: entries.get(*entry)?.len(),
            })
        }
    }
}

/// Nearest list ancestor of the caret, regardless of depth. Used by the list
/// chords, which toggle on the list kind rather than the immediate container.
pub fn find_list_ancestor(
    document: &Document,
    path: &BlockPath,
) -> Option<(BlockPath, ListKind)> {
    let mut current = path.clone();
    while let Some(parent) = current.parent() {
        if let Some(block) = block_ref(document, &parent) {
            if let Some(kind) = block.list_kind() {
                return Some((parent, kind));
            }
        }
        current = parent;
    }
    None
}
