//! Read-only queries over the document tree.

use super::{Block, BlockPath, Caret, Document, PathStep, Span};

pub fn block_ref<'a>(document: &'a Document, path: &BlockPath) -> Option<&'a Block> {
    let mut iter = path.steps().iter();
    let first = iter.next()?;
    let PathStep::Root(index) = first else {
        return None;
    };
    let mut block = document.blocks.get(*index)?;
    for step in iter {
        block = match step {
            PathStep::Child(index) => {
                let Block::Quote { children } = block else {
                    return None;
                };
                children.get(*index)?
            }
            PathStep::Entry { entry, block: inner } => {
                let entries = block.list_entries()?;
                entries.get(*entry)?.get(*inner)?
            }
            PathStep::Root(_) => return None,
        };
    }
    Some(block)
}

pub fn block_mut<'a>(document: &'a mut Document, path: &BlockPath) -> Option<&'a mut Block> {
    let mut iter = path.steps().iter();
    let first = iter.next()?;
    let PathStep::Root(index) = first else {
        return None;
    };
    let mut block = document.blocks.get_mut(*index)?;
    for step in iter {
        block = match step {
            PathStep::Child(index) => {
                let Block::Quote { children } = block else {
                    return None;
                };
                children.get_mut(*index)?
            }
            PathStep::Entry { entry, block: inner } => {
                let entries = block.list_entries_mut()?;
                entries.get_mut(*entry)?.get_mut(*inner)?
            }
            PathStep::Root(_) => return None,
        };
    }
    Some(block)
}

pub fn spans_are_empty(spans: &[Span]) -> bool {
    spans.iter().all(Span::is_empty)
}

pub fn block_is_empty(block: &Block) -> bool {
    match block {
        Block::Paragraph { content } | Block::Heading { content, .. } => spans_are_empty(content),
        Block::CodeBlock { code, .. } => code.trim().is_empty(),
        Block::Quote { children } => children.iter().all(block_is_empty),
        Block::BulletList { entries } | Block::OrderedList { entries } => entries
            .iter()
            .all(|entry| entry.iter().all(block_is_empty)),
        Block::Image { .. } => false,
    }
}

/// Character length of the span (or code text) a caret at `span` would index.
pub fn leaf_char_len(block: &Block, span: usize) -> Option<usize> {
    match block {
        Block::Paragraph { content } | Block::Heading { content, .. } => {
            content.get(span).map(|s| s.text.chars().count())
        }
        Block::CodeBlock { code, .. } if span == 0 => Some(code.chars().count()),
        _ => None,
    }
}

/// Whether a caret points at an existing position in the tree. Every transform
/// must leave the active caret in a state where this holds.
pub fn caret_resolves(document: &Document, caret: &Caret) -> bool {
    let Some(block) = block_ref(document, &caret.path) else {
        return false;
    };
    match leaf_char_len(block, caret.span) {
        Some(len) => caret.offset <= len,
        None => matches!(block, Block::Image { .. }) && caret.span == 0 && caret.offset == 0,
    }
}
