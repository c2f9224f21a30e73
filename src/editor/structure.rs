//! Tree mutation helpers shared by the escape engine, the chord dispatcher and
//! the command palette. Everything here keeps the tree valid: a transform that
//! would leave a container without children substitutes an empty paragraph.

use crate::doc::{
    block_mut, block_ref, Block, BlockPath, Caret, Document, ListKind, Mark, PathStep, Selection,
    Span,
};

// ============================================================================
// Text helpers
// ============================================================================

fn byte_index(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map(|(index, _)| index)
        .unwrap_or(text.len())
}

pub(crate) fn insert_char_at(text: &mut String, char_offset: usize, ch: char) {
    let index = byte_index(text, char_offset);
    text.insert(index, ch);
}

pub(crate) fn remove_char_before(text: &mut String, char_offset: usize) -> bool {
    if char_offset == 0 {
        return false;
    }
    let start = byte_index(text, char_offset - 1);
    let end = byte_index(text, char_offset);
    if start >= end {
        return false;
    }
    text.replace_range(start..end, "");
    true
}

pub(crate) fn split_at_char(text: &str, char_offset: usize) -> (String, String) {
    let index = byte_index(text, char_offset);
    (text[..index].to_string(), text[index..].to_string())
}

pub(crate) fn plain_text(spans: &[Span]) -> String {
    spans.iter().map(|span| span.text.as_str()).collect()
}

// ============================================================================
// Sibling sequence access
// ============================================================================

/// Run `f` against the sibling sequence containing the block at `path`, along
/// with the block's index in it. This is the one place that knows how each
/// path step maps onto a parent's child vector.
pub(crate) fn with_siblings<R>(
    document: &mut Document,
    path: &BlockPath,
    f: impl FnOnce(&mut Vec<Block>, usize) -> R,
) -> Option<R> {
    let last = path.last()?.clone();
    match last {
        PathStep::Root(index) => {
            if index > document.blocks.len() {
                return None;
            }
            Some(f(&mut document.blocks, index))
        }
        PathStep::Child(index) => {
            let parent = path.parent()?;
            let Block::Quote { children } = block_mut(document, &parent)? else {
                return None;
            };
            Some(f(children, index))
        }
        PathStep::Entry { entry, block } => {
            let parent = path.parent()?;
            let entries = block_mut(document, &parent)?.list_entries_mut()?;
            let sequence = entries.get_mut(entry)?;
            Some(f(sequence, block))
        }
    }
}

pub(crate) fn sibling_count(document: &mut Document, path: &BlockPath) -> Option<usize> {
    with_siblings(document, path, |siblings, _| siblings.len())
}

pub(crate) fn replace_block(document: &mut Document, path: &BlockPath, block: Block) -> bool {
    with_siblings(document, path, |siblings, index| {
        if index < siblings.len() {
            siblings[index] = block;
            true
        } else {
            false
        }
    })
    .unwrap_or(false)
}

pub(crate) fn remove_block(document: &mut Document, path: &BlockPath) -> Option<Block> {
    with_siblings(document, path, |siblings, index| {
        if index < siblings.len() {
            Some(siblings.remove(index))
        } else {
            None
        }
    })
    .flatten()
}

/// Insert a block right after the one at `path`; returns the new block's path.
pub(crate) fn insert_block_after(
    document: &mut Document,
    path: &BlockPath,
    block: Block,
) -> Option<BlockPath> {
    let inserted = with_siblings(document, path, |siblings, index| {
        if index >= siblings.len() {
            return false;
        }
        siblings.insert(index + 1, block);
        true
    })?;
    if !inserted {
        return None;
    }
    Some(path.with_last_index(path.last_index()? + 1))
}

/// Insert a block right before the one at `path`; returns the new block's path.
/// At the very front of a sequence this is what makes "escape before the first
/// block of the document" land at position 0.
pub(crate) fn insert_block_before(
    document: &mut Document,
    path: &BlockPath,
    block: Block,
) -> Option<BlockPath> {
    with_siblings(document, path, |siblings, index| {
        let index = index.min(siblings.len());
        siblings.insert(index, block);
    })?;
    Some(path.clone())
}

// ============================================================================
// Caret placement
// ============================================================================

/// Caret at the very start of the block at `path`, descending into containers.
pub(crate) fn caret_to_start(document: &Document, path: &BlockPath) -> Option<Caret> {
    let block = block_ref(document, path)?;
    match block {
        Block::Paragraph { .. } | Block::Heading { .. } | Block::CodeBlock { .. } | Block::Image { .. } => {
            Some(Caret::at(path.clone()))
        }
        Block::Quote { children } => {
            if children.is_empty() {
                return None;
            }
            caret_to_start(document, &path.child(0))
        }
        Block::BulletList { entries } | Block::OrderedList { entries } => {
            if entries.is_empty() || entries[0].is_empty() {
                return None;
            }
            caret_to_start(document, &path.entry(0, 0))
        }
    }
}

/// Caret at the very end of the block at `path`, descending into containers.
pub(crate) fn caret_to_end(document: &Document, path: &BlockPath) -> Option<Caret> {
    let block = block_ref(document, path)?;
    match block {
        Block::Paragraph { content } | Block::Heading { content, .. } => {
            let span = content.len().saturating_sub(1);
            let offset = content
                .last()
                .map(|s| s.text.chars().count())
                .unwrap_or(0);
            Some(Caret::at_offset(path.clone(), span, offset))
        }
        Block::CodeBlock { code, .. } => {
            Some(Caret::at_offset(path.clone(), 0, code.chars().count()))
        }
        Block::Image { .. } => Some(Caret::at(path.clone())),
        Block::Quote { children } => {
            if children.is_empty() {
                return None;
            }
            caret_to_end(document, &path.child(children.len() - 1))
        }
        Block::BulletList { entries } | Block::OrderedList { entries } => {
            let entry = entries.len().checked_sub(1)?;
            let block_index = entries[entry].len().checked_sub(1)?;
            caret_to_end(document, &path.entry(entry, block_index))
        }
    }
}

// ============================================================================
// Block-level transforms
// ============================================================================

/// Heading chord semantics: an exact-level heading reverts to a paragraph, any
/// other leaf becomes a heading of that level.
pub(crate) fn toggle_heading(document: &mut Document, caret: &mut Caret, level: u8) -> bool {
    let Some(block) = block_mut(document, &caret.path) else {
        return false;
    };
    match block {
        Block::Heading { level: current, content } if *current == level => {
            let content = std::mem::take(content);
            *block = Block::Paragraph { content };
        }
        Block::Heading { content, .. } | Block::Paragraph { content } => {
            let content = std::mem::take(content);
            *block = Block::Heading { level, content };
        }
        _ => return false,
    }
    clamp_caret_to_leaf(document, caret);
    true
}

/// Wrap the block at the caret in a new quote.
pub(crate) fn wrap_in_quote(document: &mut Document, caret: &mut Caret) -> bool {
    let wrapped = with_siblings(document, &caret.path, |siblings, index| {
        if index >= siblings.len() {
            return false;
        }
        let block = siblings.remove(index);
        siblings.insert(index, Block::Quote { children: vec![block] });
        true
    })
    .unwrap_or(false);
    if wrapped {
        caret.path.push_child(0);
    }
    wrapped
}

/// Convert the leaf at the caret to a code block; its text flattens to code.
pub(crate) fn set_code_block(
    document: &mut Document,
    caret: &mut Caret,
    language: Option<&str>,
) -> bool {
    let Some(block) = block_mut(document, &caret.path) else {
        return false;
    };
    let code = match block {
        Block::Paragraph { content } | Block::Heading { content, .. } => plain_text(content),
        _ => return false,
    };
    let len = code.chars().count();
    *block = Block::CodeBlock {
        language: language.map(str::to_string),
        code,
    };
    caret.span = 0;
    caret.offset = caret.offset.min(len);
    true
}

/// List chord semantics: inside a list of the requested kind the current entry
/// is lifted out; inside a list of the other kind the list is retyped; outside
/// any list the current block is wrapped into a fresh single-entry list.
pub(crate) fn toggle_list(document: &mut Document, caret: &mut Caret, kind: ListKind) -> bool {
    if let Some((list_path, current_kind)) =
        super::context::find_list_ancestor(document, &caret.path)
    {
        if current_kind == kind {
            return lift_entry_out_of_list(document, caret, &list_path);
        }
        return retype_list(document, &list_path, kind);
    }

    let wrapped = with_siblings(document, &caret.path, |siblings, index| {
        if index >= siblings.len() {
            return false;
        }
        let block = siblings.remove(index);
        siblings.insert(index, Block::list(kind, vec![vec![block]]));
        true
    })
    .unwrap_or(false);
    if wrapped {
        caret.path.push_entry(0, 0);
    }
    wrapped
}

fn retype_list(document: &mut Document, list_path: &BlockPath, kind: ListKind) -> bool {
    let Some(block) = block_mut(document, list_path) else {
        return false;
    };
    let Some(entries) = block.list_entries_mut() else {
        return false;
    };
    let entries = std::mem::take(entries);
    *block = Block::list(kind, entries);
    true
}

/// Remove the caret's entry from the list and reinsert its blocks as siblings
/// of the list. An emptied list is removed entirely.
pub(crate) fn lift_entry_out_of_list(
    document: &mut Document,
    caret: &mut Caret,
    list_path: &BlockPath,
) -> bool {
    let depth = list_path.steps().len();
    let Some(PathStep::Entry { entry, block }) = caret.path.steps().get(depth).cloned() else {
        return false;
    };
    let caret_in_entry_root = caret.path.steps().len() == depth + 1;

    let Some(list_block) = block_mut(document, list_path) else {
        return false;
    };
    let Some(entries) = list_block.list_entries_mut() else {
        return false;
    };
    if entry >= entries.len() {
        return false;
    }
    let lifted = entries.remove(entry);
    let list_emptied = entries.is_empty();

    let first_path = if list_emptied {
        let mut iter = lifted.into_iter();
        let first = iter.next().unwrap_or_else(Block::empty_paragraph);
        if !replace_block(document, list_path, first) {
            return false;
        }
        let mut insert_after = list_path.clone();
        for extra in iter {
            match insert_block_after(document, &insert_after, extra) {
                Some(path) => insert_after = path,
                None => break,
            }
        }
        list_path.clone()
    } else {
        let mut insert_after = list_path.clone();
        let mut first_path = None;
        for extra in lifted {
            match insert_block_after(document, &insert_after, extra) {
                Some(path) => {
                    if first_path.is_none() {
                        first_path = Some(path.clone());
                    }
                    insert_after = path;
                }
                None => break,
            }
        }
        match first_path {
            Some(path) => path,
            None => return false,
        }
    };

    if caret_in_entry_root {
        caret.path = first_path.with_last_index(first_path.last_index().unwrap_or(0) + block);
        clamp_caret_to_leaf(document, caret);
    } else {
        *caret = caret_to_start(document, &first_path)
            .unwrap_or_else(|| Caret::at(first_path));
    }
    true
}

fn clamp_caret_to_leaf(document: &Document, caret: &mut Caret) {
    let Some(block) = block_ref(document, &caret.path) else {
        *caret = Caret::default();
        return;
    };
    match block {
        Block::Paragraph { content } | Block::Heading { content, .. } => {
            caret.span = caret.span.min(content.len().saturating_sub(1));
            let len = content
                .get(caret.span)
                .map(|s| s.text.chars().count())
                .unwrap_or(0);
            caret.offset = caret.offset.min(len);
        }
        Block::CodeBlock { code, .. } => {
            caret.span = 0;
            caret.offset = caret.offset.min(code.chars().count());
        }
        _ => {
            caret.span = 0;
            caret.offset = 0;
        }
    }
}

/// Split the leaf at the caret into two blocks at the caret position. The
/// tail always becomes a paragraph, also when splitting a heading.
pub(crate) fn split_leaf(document: &mut Document, caret: &Caret) -> Option<Caret> {
    let block = block_mut(document, &caret.path)?;
    let content = block.content_mut()?;
    if content.is_empty() {
        content.push(Span::new_text(""));
    }
    let span_index = caret.span.min(content.len() - 1);

    let mut tail: Vec<Span> = content.split_off(span_index + 1);
    let boundary = content.last_mut()?;
    let (before, after) = split_at_char(&boundary.text, caret.offset);
    let carried_marks = boundary.marks.clone();
    boundary.text = before;
    if !after.is_empty() || tail.is_empty() {
        tail.insert(0, Span::with_marks(after, carried_marks));
    }
    prune_and_merge_spans(content);
    prune_and_merge_spans(&mut tail);

    let new_path = insert_block_after(document, &caret.path, Block::Paragraph { content: tail })?;
    Some(Caret::at(new_path))
}

// ============================================================================
// Inline marks
// ============================================================================

/// Merge neighbouring spans with identical marks and drop empty ones, keeping
/// at least one span so the leaf stays selectable.
pub(crate) fn prune_and_merge_spans(spans: &mut Vec<Span>) {
    spans.retain(|span| !span.text.is_empty());
    let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans.drain(..) {
        match merged.last_mut() {
            Some(last) if last.marks == span.marks => last.text.push_str(&span.text),
            _ => merged.push(span),
        }
    }
    if merged.is_empty() {
        merged.push(Span::new_text(""));
    }
    *spans = merged;
}

fn ordered_endpoints(selection: &Selection) -> Option<(Caret, Caret)> {
    if selection.anchor.path != selection.head.path {
        return None;
    }
    let a = (&selection.anchor.span, &selection.anchor.offset);
    let b = (&selection.head.span, &selection.head.offset);
    if a <= b {
        Some((selection.anchor.clone(), selection.head.clone()))
    } else {
        Some((selection.head.clone(), selection.anchor.clone()))
    }
}

/// Whether every non-empty selected portion already carries the mark.
/// `None` when the selection does not cover text in a single leaf block.
pub(crate) fn selection_fully_marked(
    document: &Document,
    selection: &Selection,
    mark: &Mark,
) -> Option<bool> {
    if selection.is_collapsed() {
        return None;
    }
    let (start, end) = ordered_endpoints(selection)?;
    let block = block_ref(document, &start.path)?;
    let content = match block {
        Block::Paragraph { content } | Block::Heading { content, .. } => content,
        _ => return None,
    };
    let mut covered_any = false;
    for (index, span) in content.iter().enumerate() {
        if index < start.span || index > end.span {
            continue;
        }
        let len = span.text.chars().count();
        let from = if index == start.span { start.offset.min(len) } else { 0 };
        let to = if index == end.span { end.offset.min(len) } else { len };
        if from >= to {
            continue;
        }
        covered_any = true;
        if !span.has_mark(mark) {
            return Some(false);
        }
    }
    covered_any.then_some(true)
}

/// Toggle `mark` across the selection: remove it when the whole selection
/// already carries it, add it otherwise. The caret lands at the start of the
/// affected block, which is always resolvable after the span rewrite.
pub(crate) fn toggle_mark(
    document: &mut Document,
    caret: &mut Caret,
    selection: &Selection,
    mark: &Mark,
) -> bool {
    let Some(fully_marked) = selection_fully_marked(document, selection, mark) else {
        return false;
    };
    let add = !fully_marked;
    let Some((start, end)) = ordered_endpoints(selection) else {
        return false;
    };
    let Some(block) = block_mut(document, &start.path) else {
        return false;
    };
    let Some(content) = block.content_mut() else {
        return false;
    };

    let mut rebuilt: Vec<Span> = Vec::with_capacity(content.len() + 2);
    for (index, span) in content.drain(..).enumerate() {
        if index < start.span || index > end.span {
            rebuilt.push(span);
            continue;
        }
        let len = span.text.chars().count();
        let from = if index == start.span { start.offset.min(len) } else { 0 };
        let to = if index == end.span { end.offset.min(len) } else { len };
        if from >= to {
            rebuilt.push(span);
            continue;
        }
        let (before, middle_and_after) = split_at_char(&span.text, from);
        let (middle, after) = split_at_char(&middle_and_after, to - from);
        if !before.is_empty() {
            rebuilt.push(Span::with_marks(before, span.marks.clone()));
        }
        let mut marks = span.marks.clone();
        if add {
            if !marks.contains(mark) {
                marks.push(mark.clone());
            }
        } else {
            marks.retain(|m| m != mark);
        }
        rebuilt.push(Span::with_marks(middle, marks));
        if !after.is_empty() {
            rebuilt.push(Span::with_marks(after, span.marks.clone()));
        }
    }
    prune_and_merge_spans(&mut rebuilt);
    *content = rebuilt;

    *caret = Caret::at(start.path);
    true
}
