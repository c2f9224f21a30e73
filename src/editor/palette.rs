//! The slash-command menu: a static catalog of block commands, narrowed by a
//! typed query. Filtering is a stable substring match over label and keywords;
//! the catalog order is never re-ranked.

/// Character that opens the menu when typed into a text block.
pub const TRIGGER: char = '/';

/// The document transform a catalog entry stands for. Invoked with the current
/// editing session; the menu itself never touches the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandAction {
    Heading(u8),
    Quote,
    CodeBlock,
    BulletList,
    OrderedList,
    Image,
    Link,
}

#[derive(Clone, Copy, Debug)]
pub struct CommandEntry {
    pub id: &'static str,
    pub label: &'static str,
    pub group: &'static str,
    pub keywords: &'static [&'static str],
    pub action: CommandAction,
}

const CATALOG: &[CommandEntry] = &[
    CommandEntry {
        id: "heading-1",
        label: "Heading 1",
        group: "Headings",
        keywords: &["h1", "title", "big"],
        action: CommandAction::Heading(1),
    },
    CommandEntry {
        id: "heading-2",
        label: "Heading 2",
        group: "Headings",
        keywords: &["h2", "subtitle"],
        action: CommandAction::Heading(2),
    },
    CommandEntry {
        id: "heading-3",
        label: "Heading 3",
        group: "Headings",
        keywords: &["h3", "subheading"],
        action: CommandAction::Heading(3),
    },
    CommandEntry {
        id: "bullet-list",
        label: "Bullet List",
        group: "Blocks",
        keywords: &["ul", "unordered", "list"],
        action: CommandAction::BulletList,
    },
    CommandEntry {
        id: "ordered-list",
        label: "Numbered List",
        group: "Blocks",
        keywords: &["ol", "ordered", "list", "numbers"],
        action: CommandAction::OrderedList,
    },
    CommandEntry {
        id: "quote",
        label: "Quote",
        group: "Blocks",
        keywords: &["blockquote", "cite"],
        action: CommandAction::Quote,
    },
    CommandEntry {
        id: "code-block",
        label: "Code Block",
        group: "Blocks",
        keywords: &["code", "fence", "snippet"],
        action: CommandAction::CodeBlock,
    },
    CommandEntry {
        id: "image",
        label: "Image",
        group: "Media",
        keywords: &["picture", "photo", "upload"],
        action: CommandAction::Image,
    },
    CommandEntry {
        id: "link",
        label: "Link",
        group: "Media",
        keywords: &["url", "href", "anchor"],
        action: CommandAction::Link,
    },
];

pub fn catalog() -> &'static [CommandEntry] {
    CATALOG
}

/// Case-insensitive substring filter over label and keywords. Catalog order is
/// preserved; an empty query returns the whole catalog.
pub fn filter<'a>(catalog: &'a [CommandEntry], query: &str) -> Vec<&'a CommandEntry> {
    if query.is_empty() {
        return catalog.iter().collect();
    }
    let needle = query.to_lowercase();
    catalog
        .iter()
        .filter(|entry| {
            entry.label.to_lowercase().contains(&needle)
                || entry
                    .keywords
                    .iter()
                    .any(|keyword| keyword.to_lowercase().contains(&needle))
        })
        .collect()
}

/// Bucket entries by group, groups in first-seen order, entry order untouched.
pub fn group_entries<'a>(
    entries: &[&'a CommandEntry],
) -> Vec<(&'static str, Vec<&'a CommandEntry>)> {
    let mut groups: Vec<(&'static str, Vec<&'a CommandEntry>)> = Vec::new();
    for entry in entries {
        match groups.iter_mut().find(|(name, _)| *name == entry.group) {
            Some((_, bucket)) => bucket.push(entry),
            None => groups.push((entry.group, vec![entry])),
        }
    }
    groups
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavDirection {
    Up,
    Down,
}

/// Menu state: visibility, the typed query, and one selected index over the
/// flattened filtered list. Group boundaries are invisible to navigation.
#[derive(Debug, Default)]
pub struct CommandMenu {
    visible: bool,
    query: String,
    selected: usize,
}

impl CommandMenu {
    pub fn open(&mut self) {
        self.visible = true;
        self.query.clear();
        self.selected = 0;
    }

    pub fn close(&mut self) {
        self.visible = false;
        self.query.clear();
        self.selected = 0;
    }

    pub fn is_open(&self) -> bool {
        self.visible
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn push_query_char(&mut self, ch: char) {
        self.query.push(ch);
        self.selected = 0;
    }

    /// Returns `false` when the query was already empty, which means the
    /// trigger character itself is being deleted and the menu should close.
    pub fn pop_query_char(&mut self) -> bool {
        if self.query.pop().is_none() {
            return false;
        }
        self.selected = 0;
        true
    }

    pub fn filtered(&self) -> Vec<&'static CommandEntry> {
        filter(CATALOG, &self.query)
    }

    pub fn selected_entry(&self) -> Option<&'static CommandEntry> {
        self.filtered().get(self.selected).copied()
    }

    /// Move the selection with wraparound; a no-op over an empty result list.
    pub fn navigate(&mut self, direction: NavDirection) {
        let count = self.filtered().len();
        if count == 0 {
            return;
        }
        self.selected = match direction {
            NavDirection::Down => (self.selected + 1) % count,
            NavDirection::Up => (self.selected + count - 1) % count,
        };
    }
}
