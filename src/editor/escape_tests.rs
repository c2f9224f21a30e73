use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::escape;
use crate::doc::{block_ref, caret_resolves, Block, BlockPath, Caret, Document, ListKind};

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

fn ctrl(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::CONTROL)
}

fn caret_in_quote_child(root: usize, child: usize) -> Caret {
    Caret::at(BlockPath::root(root).child(child))
}

/// No container may survive a transform with zero children, and no leaf with
/// zero spans.
fn tree_valid(document: &Document) -> bool {
    fn block_valid(block: &Block) -> bool {
        match block {
            Block::Paragraph { content } | Block::Heading { content, .. } => !content.is_empty(),
            Block::Quote { children } => {
                !children.is_empty() && children.iter().all(block_valid)
            }
            Block::BulletList { entries } | Block::OrderedList { entries } => {
                !entries.is_empty()
                    && entries
                        .iter()
                        .all(|entry| !entry.is_empty() && entry.iter().all(block_valid))
            }
            Block::CodeBlock { .. } | Block::Image { .. } => true,
        }
    }
    !document.blocks.is_empty() && document.blocks.iter().all(block_valid)
}

fn assert_settled(document: &Document, caret: &Caret) {
    assert!(tree_valid(document), "transform left an invalid tree");
    assert!(caret_resolves(document, caret), "caret does not resolve");
}

// ============================================================================
// Quote escapes
// ============================================================================

#[test]
fn enter_in_sole_empty_quote_child_unwraps_the_quote() {
    let mut document = Document::from_blocks(vec![
        Block::paragraph("before"),
        Block::quote(vec![Block::empty_paragraph()]),
    ]);
    let mut caret = caret_in_quote_child(1, 0);

    assert!(escape::dispatch(&mut document, &mut caret, &key(KeyCode::Enter)));
    assert_eq!(document.blocks[1], Block::empty_paragraph());
    assert_eq!(caret, Caret::at(BlockPath::root(1)));
    assert_settled(&document, &caret);
}

#[test]
fn enter_in_trailing_empty_quote_child_extracts_a_paragraph() {
    let mut document = Document::from_blocks(vec![Block::quote(vec![
        Block::paragraph("kept"),
        Block::empty_paragraph(),
    ])]);
    let mut caret = caret_in_quote_child(0, 1);

    assert!(escape::dispatch(&mut document, &mut caret, &key(KeyCode::Enter)));
    let Block::Quote { children } = &document.blocks[0] else {
        panic!("quote disappeared");
    };
    assert_eq!(children.len(), 1);
    assert_eq!(document.blocks[1], Block::empty_paragraph());
    assert_eq!(caret, Caret::at(BlockPath::root(1)));
    assert_settled(&document, &caret);
}

#[test]
fn enter_on_non_empty_quote_child_is_not_consumed() {
    let mut document = Document::from_blocks(vec![Block::quote(vec![Block::paragraph("text")])]);
    let mut caret = caret_in_quote_child(0, 0);
    assert!(!escape::dispatch(&mut document, &mut caret, &key(KeyCode::Enter)));
}

#[test]
fn enter_with_modifier_held_is_not_a_quote_escape() {
    let mut document = Document::from_blocks(vec![Block::quote(vec![Block::empty_paragraph()])]);
    let mut caret = caret_in_quote_child(0, 0);
    assert!(!escape::dispatch(&mut document, &mut caret, &ctrl(KeyCode::Char('m'))));
}

#[test]
fn backspace_in_sole_empty_quote_child_unwraps() {
    let mut document = Document::from_blocks(vec![Block::quote(vec![Block::empty_paragraph()])]);
    let mut caret = caret_in_quote_child(0, 0);

    assert!(escape::dispatch(&mut document, &mut caret, &key(KeyCode::Backspace)));
    assert_eq!(document.blocks[0], Block::empty_paragraph());
    assert_settled(&document, &caret);
}

#[test]
fn backspace_on_first_of_several_children_escapes_before_the_quote() {
    let mut document = Document::from_blocks(vec![Block::quote(vec![
        Block::empty_paragraph(),
        Block::paragraph("kept"),
    ])]);
    let mut caret = caret_in_quote_child(0, 0);

    assert!(escape::dispatch(&mut document, &mut caret, &key(KeyCode::Backspace)));
    // The escape inserts at document position 0 instead of failing.
    assert_eq!(document.blocks[0], Block::empty_paragraph());
    let Block::Quote { children } = &document.blocks[1] else {
        panic!("quote disappeared");
    };
    assert_eq!(children.len(), 1);
    assert_eq!(caret, Caret::at(BlockPath::root(0)));
    assert_settled(&document, &caret);
}

#[test]
fn backspace_on_later_empty_child_lands_at_end_of_preceding_sibling() {
    let mut document = Document::from_blocks(vec![Block::quote(vec![
        Block::paragraph("kept"),
        Block::empty_paragraph(),
    ])]);
    let mut caret = caret_in_quote_child(0, 1);

    assert!(escape::dispatch(&mut document, &mut caret, &key(KeyCode::Backspace)));
    let Block::Quote { children } = &document.blocks[0] else {
        panic!("quote disappeared");
    };
    assert_eq!(children.len(), 1);
    assert_eq!(caret.path, BlockPath::root(0).child(0));
    assert_eq!(caret.offset, 4);
    assert_settled(&document, &caret);
}

#[test]
fn backspace_at_nonzero_offset_is_not_an_escape() {
    let mut document = Document::from_blocks(vec![Block::quote(vec![Block::empty_paragraph()])]);
    let mut caret = Caret::at_offset(BlockPath::root(0).child(0), 0, 0);
    caret.offset = 1;
    assert!(!escape::dispatch(&mut document, &mut caret, &key(KeyCode::Backspace)));
}

// ============================================================================
// List escape
// ============================================================================

#[test]
fn enter_on_trailing_empty_entry_leaves_the_list() {
    let mut document = Document::from_blocks(vec![Block::list(
        ListKind::Bullet,
        vec![
            vec![Block::paragraph("one")],
            vec![Block::empty_paragraph()],
        ],
    )]);
    let mut caret = Caret::at(BlockPath::root(0).entry(1, 0));

    assert!(escape::dispatch(&mut document, &mut caret, &key(KeyCode::Enter)));
    let entries = document.blocks[0].list_entries().expect("list survives");
    assert_eq!(entries.len(), 1);
    assert_eq!(document.blocks[1], Block::empty_paragraph());
    assert_eq!(caret, Caret::at(BlockPath::root(1)));
    assert_settled(&document, &caret);
}

#[test]
fn enter_on_sole_empty_entry_replaces_the_list() {
    let mut document = Document::from_blocks(vec![Block::list(
        ListKind::Ordered,
        vec![vec![Block::empty_paragraph()]],
    )]);
    let mut caret = Caret::at(BlockPath::root(0).entry(0, 0));

    assert!(escape::dispatch(&mut document, &mut caret, &key(KeyCode::Enter)));
    assert_eq!(document.blocks, vec![Block::empty_paragraph()]);
    assert_settled(&document, &caret);
}

#[test]
fn enter_mid_list_is_not_an_escape() {
    let mut document = Document::from_blocks(vec![Block::list(
        ListKind::Bullet,
        vec![
            vec![Block::empty_paragraph()],
            vec![Block::paragraph("after")],
        ],
    )]);
    let mut caret = Caret::at(BlockPath::root(0).entry(0, 0));
    assert!(!escape::dispatch(&mut document, &mut caret, &key(KeyCode::Enter)));
}

// ============================================================================
// Code block escapes
// ============================================================================

#[test]
fn backspace_in_blank_code_block_replaces_it_with_a_paragraph() {
    let mut document = Document::from_blocks(vec![Block::code_block(Some("rust"), "  \n ")]);
    let mut caret = Caret::at(BlockPath::root(0));

    assert!(escape::dispatch(&mut document, &mut caret, &key(KeyCode::Backspace)));
    assert_eq!(document.blocks[0], Block::empty_paragraph());
    assert_eq!(caret, Caret::at(BlockPath::root(0)));
    assert_settled(&document, &caret);
}

#[test]
fn backspace_in_non_blank_code_block_is_not_an_escape() {
    let mut document = Document::from_blocks(vec![Block::code_block(None, "code")]);
    let mut caret = Caret::at_offset(BlockPath::root(0), 0, 4);
    assert!(!escape::dispatch(&mut document, &mut caret, &key(KeyCode::Backspace)));
}

#[test]
fn arrow_up_at_start_creates_a_paragraph_at_the_document_front() {
    let mut document = Document::from_blocks(vec![Block::code_block(None, "code")]);
    let mut caret = Caret::at(BlockPath::root(0));

    assert!(escape::dispatch(&mut document, &mut caret, &key(KeyCode::Up)));
    assert_eq!(document.blocks[0], Block::empty_paragraph());
    assert!(matches!(document.blocks[1], Block::CodeBlock { .. }));
    assert_eq!(caret, Caret::at(BlockPath::root(0)));
    assert_settled(&document, &caret);
}

#[test]
fn arrow_up_at_start_moves_to_existing_previous_sibling() {
    let mut document = Document::from_blocks(vec![
        Block::paragraph("above"),
        Block::code_block(None, "code"),
    ]);
    let mut caret = Caret::at(BlockPath::root(1));

    assert!(escape::dispatch(&mut document, &mut caret, &key(KeyCode::Up)));
    assert_eq!(document.blocks.len(), 2);
    assert_eq!(caret.path, BlockPath::root(0));
    assert_eq!(caret.offset, 5);
    assert_settled(&document, &caret);
}

#[test]
fn arrow_up_mid_text_is_not_an_escape() {
    let mut document = Document::from_blocks(vec![Block::code_block(None, "code")]);
    let mut caret = Caret::at_offset(BlockPath::root(0), 0, 2);
    assert!(!escape::dispatch(&mut document, &mut caret, &key(KeyCode::Up)));
}

#[test]
fn arrow_down_at_end_creates_a_paragraph_after() {
    let mut document = Document::from_blocks(vec![Block::code_block(None, "code")]);
    let mut caret = Caret::at_offset(BlockPath::root(0), 0, 4);

    assert!(escape::dispatch(&mut document, &mut caret, &key(KeyCode::Down)));
    assert_eq!(document.blocks[1], Block::empty_paragraph());
    assert_eq!(caret, Caret::at(BlockPath::root(1)));
    assert_settled(&document, &caret);
}

#[test]
fn arrow_down_at_end_moves_to_existing_next_sibling() {
    let mut document = Document::from_blocks(vec![
        Block::code_block(None, "code"),
        Block::paragraph("below"),
    ]);
    let mut caret = Caret::at_offset(BlockPath::root(0), 0, 4);

    assert!(escape::dispatch(&mut document, &mut caret, &key(KeyCode::Down)));
    assert_eq!(document.blocks.len(), 2);
    assert_eq!(caret, Caret::at(BlockPath::root(1)));
    assert_settled(&document, &caret);
}

#[test]
fn double_enter_strips_trailing_blank_line_and_exits() {
    let code = "let x = 1;\n";
    let mut document = Document::from_blocks(vec![Block::code_block(Some("rust"), code)]);
    let mut caret = Caret::at_offset(BlockPath::root(0), 0, code.chars().count());

    assert!(escape::dispatch(&mut document, &mut caret, &key(KeyCode::Enter)));
    let Block::CodeBlock { code, .. } = &document.blocks[0] else {
        panic!("code block disappeared");
    };
    assert_eq!(code, "let x = 1;");
    assert_eq!(document.blocks[1], Block::empty_paragraph());
    assert_eq!(caret, Caret::at(BlockPath::root(1)));
    assert_settled(&document, &caret);
}

#[test]
fn single_enter_without_trailing_blank_line_stays_inside() {
    let mut document = Document::from_blocks(vec![Block::code_block(None, "let x = 1;")]);
    let mut caret = Caret::at_offset(BlockPath::root(0), 0, 10);
    assert!(!escape::dispatch(&mut document, &mut caret, &key(KeyCode::Enter)));
}

#[test]
fn forced_exit_works_from_any_offset() {
    let mut document = Document::from_blocks(vec![Block::code_block(None, "let x = 1;")]);
    let mut caret = Caret::at_offset(BlockPath::root(0), 0, 3);

    assert!(escape::dispatch(&mut document, &mut caret, &ctrl(KeyCode::Enter)));
    assert_eq!(document.blocks[1], Block::empty_paragraph());
    assert_eq!(caret, Caret::at(BlockPath::root(1)));
    assert_settled(&document, &caret);
}

#[test]
fn nested_quote_escape_keeps_outer_structure() {
    // A quote inside a list entry: escaping the quote must stay inside the entry.
    let mut document = Document::from_blocks(vec![Block::list(
        ListKind::Bullet,
        vec![vec![
            Block::paragraph("intro"),
            Block::quote(vec![Block::empty_paragraph()]),
        ]],
    )]);
    let mut caret = Caret::at(BlockPath::root(0).entry(0, 1).child(0));

    assert!(escape::dispatch(&mut document, &mut caret, &key(KeyCode::Enter)));
    let entries = document.blocks[0].list_entries().expect("list survives");
    assert_eq!(entries[0][1], Block::empty_paragraph());
    assert!(block_ref(&document, &caret.path).is_some());
    assert_settled(&document, &caret);
}
