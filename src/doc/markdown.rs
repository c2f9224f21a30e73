//! Markdown serialization of the document tree. This is the payload handed to
//! the host on content changes and the shape the post body is persisted in.

use super::{Block, Document, Mark, Span};

pub fn to_markdown(document: &Document) -> String {
    let rendered: Vec<String> = document.blocks.iter().map(render_block).collect();
    let mut out = rendered.join("\n\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

fn render_block(block: &Block) -> String {
    match block {
        Block::Paragraph { content } => render_spans(content),
        Block::Heading { level, content } => {
            format!("{} {}", "#".repeat(*level as usize), render_spans(content))
        }
        Block::Quote { children } => {
            let inner: Vec<String> = children.iter().map(render_block).collect();
            prefix_lines(&inner.join("\n\n"), "> ", "> ")
        }
        Block::CodeBlock { language, code } => {
            let lang = language.as_deref().unwrap_or("");
            let mut body = code.as_str();
            // A single trailing newline is part of the fence, not the content.
            if let Some(stripped) = body.strip_suffix('\n') {
                body = stripped;
            }
            format!("```{lang}\n{body}\n```")
        }
        Block::BulletList { entries } => render_list(entries, |_| "- ".to_string()),
        Block::OrderedList { entries } => render_list(entries, |i| format!("{}. ", i + 1)),
        Block::Image { url, alt } => format!("![{alt}]({url})"),
    }
}

fn render_list(entries: &[Vec<Block>], marker: impl Fn(usize) -> String) -> String {
    let mut items = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        let marker = marker(index);
        let continuation = " ".repeat(marker.chars().count());
        let inner: Vec<String> = entry.iter().map(render_block).collect();
        items.push(prefix_lines(&inner.join("\n\n"), &marker, &continuation));
    }
    items.join("\n")
}

fn prefix_lines(text: &str, first: &str, rest: &str) -> String {
    let mut out = String::new();
    for (index, line) in text.lines().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        let prefix = if index == 0 { first } else { rest };
        if line.is_empty() {
            out.push_str(prefix.trim_end());
        } else {
            out.push_str(prefix);
            out.push_str(line);
        }
    }
    if out.is_empty() {
        out.push_str(first.trim_end());
    }
    out
}

fn render_spans(spans: &[Span]) -> String {
    spans.iter().map(render_span).collect()
}

fn render_span(span: &Span) -> String {
    if span.text.is_empty() {
        return String::new();
    }
    let mut text = span.text.clone();
    if span.has_mark(&Mark::Code) {
        text = format!("`{text}`");
    }
    if span.has_mark(&Mark::Strike) {
        text = format!("~~{text}~~");
    }
    if span.has_mark(&Mark::Italic) {
        text = format!("*{text}*");
    }
    if span.has_mark(&Mark::Bold) {
        text = format!("**{text}**");
    }
    if let Some(url) = span.marks.iter().find_map(|mark| match mark {
        Mark::Link(url) => Some(url),
        _ => None,
    }) {
        text = format!("[{text}]({url})");
    }
    text
}
