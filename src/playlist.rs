use std::collections::HashMap;

/// Directive line + attribute lines of one entry, kept verbatim.
/// Empty for a plain entry (bare locator).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    lines: Vec<String>,
}

impl Block {
    pub fn new(directive: &str) -> Self {
        Block {
            lines: vec![directive.to_string()],
        }
    }

    pub fn plain() -> Self {
        Block::default()
    }

    pub fn push(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_plain(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Insertion-ordered mapping from locator to block. The first insert of a
/// locator wins; later inserts of the same locator are rejected.
///
/// Used both for a single source's entries and for the merged playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMap {
    index: HashMap<String, usize>,
    entries: Vec<(String, Block)>,
}

impl EntryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `block` under `locator` unless the locator is already present.
    /// Returns whether the entry was added.
    pub fn insert_first(&mut self, locator: &str, block: Block) -> bool {
        if self.index.contains_key(locator) {
            return false;
        }
        self.index.insert(locator.to_string(), self.entries.len());
        self.entries.push((locator.to_string(), block));
        true
    }

    pub fn contains(&self, locator: &str) -> bool {
        self.index.contains_key(locator)
    }

    #[cfg(test)]
    pub fn get(&self, locator: &str) -> Option<&Block> {
        self.index.get(locator).map(|&i| &self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Block)> {
        self.entries.iter().map(|(url, block)| (url.as_str(), block))
    }
}
