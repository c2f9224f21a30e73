/// One step of a block path, resolving from the document root downwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathStep {
    /// Index into `Document::blocks`.
    Root(usize),
    /// Index into a quote's children.
    Child(usize),
    /// Entry index and block index within a list.
    Entry { entry: usize, block: usize },
}

/// Address of a block in the tree. The steps double as the block's ancestor
/// chain: every prefix of a path addresses an ancestor, so "nearest container
/// of kind X" is a walk over the steps, not over live parent pointers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockPath {
    steps: Vec<PathStep>,
}

impl BlockPath {
    pub fn root(index: usize) -> Self {
        Self {
            steps: vec![PathStep::Root(index)],
        }
    }

    pub fn from_steps(steps: Vec<PathStep>) -> Self {
        Self { steps }
    }

    pub fn push_child(&mut self, index: usize) {
        self.steps.push(PathStep::Child(index));
    }

    pub fn push_entry(&mut self, entry: usize, block: usize) {
        self.steps.push(PathStep::Entry { entry, block });
    }

    pub fn child(&self, index: usize) -> Self {
        let mut path = self.clone();
        path.push_child(index);
        path
    }

    pub fn entry(&self, entry: usize, block: usize) -> Self {
        let mut path = self.clone();
        path.push_entry(entry, block);
        path
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn last(&self) -> Option<&PathStep> {
        self.steps.last()
    }

    /// Path of the enclosing container, or `None` at the document root.
    pub fn parent(&self) -> Option<Self> {
        if self.steps.len() < 2 {
            return None;
        }
        Some(Self {
            steps: self.steps[..self.steps.len() - 1].to_vec(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The same position shifted sideways within its sibling sequence.
    pub fn with_last_index(&self, index: usize) -> Self {
        let mut steps = self.steps.clone();
        match steps.last_mut() {
            Some(PathStep::Root(i)) | Some(PathStep::Child(i)) => *i = index,
            Some(PathStep::Entry { block, .. }) => *block = index,
            None => {}
        }
        Self { steps }
    }

    /// Index of the block within its immediate sibling sequence.
    pub fn last_index(&self) -> Option<usize> {
        match self.steps.last() {
            Some(PathStep::Root(i)) | Some(PathStep::Child(i)) => Some(*i),
            Some(PathStep::Entry { block, .. }) => Some(*block),
            None => None,
        }
    }
}

impl Default for BlockPath {
    fn default() -> Self {
        BlockPath::root(0)
    }
}

/// Cursor position: a block path plus a span index and a character offset
/// within that span. Inside a code block `span` is always 0 and `offset`
/// indexes the code text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Caret {
    pub path: BlockPath,
    pub span: usize,
    pub offset: usize,
}

impl Caret {
    pub fn at(path: BlockPath) -> Self {
        Self {
            path,
            span: 0,
            offset: 0,
        }
    }

    pub fn at_offset(path: BlockPath, span: usize, offset: usize) -> Self {
        Self { path, span, offset }
    }
}

/// An anchor/head pair. Collapsed selections have both ends equal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub anchor: Caret,
    pub head: Caret,
}

impl Selection {
    pub fn caret(position: Caret) -> Self {
        Self {
            anchor: position.clone(),
            head: position,
        }
    }

    pub fn range(anchor: Caret, head: Caret) -> Self {
        Self { anchor, head }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.head
    }
}
