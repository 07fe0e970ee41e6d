use serde::Serialize;
use tracing::{debug, info};

use crate::playlist::Block;

/// Why a block was dropped before reaching the source mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    Group,
    Language,
}

/// Hook invoked by the parser and merger. Every method defaults to a no-op,
/// so `()` observes nothing.
pub trait ParseObserver {
    fn excluded(&mut self, _reason: Exclusion, _directive: &str) {}
    fn added(&mut self, _locator: &str, _block: &Block) {}
    fn duplicate(&mut self, _locator: &str) {}
    /// A block ran out before a locator appeared and was dropped.
    fn orphaned(&mut self, _directive: &str) {}
    fn source_merged(&mut self, _label: &str, _offered: usize, _added: usize) {}
}

impl ParseObserver for () {}

impl<T: ParseObserver + ?Sized> ParseObserver for &mut T {
    fn excluded(&mut self, reason: Exclusion, directive: &str) {
        (**self).excluded(reason, directive)
    }
    fn added(&mut self, locator: &str, block: &Block) {
        (**self).added(locator, block)
    }
    fn duplicate(&mut self, locator: &str) {
        (**self).duplicate(locator)
    }
    fn orphaned(&mut self, directive: &str) {
        (**self).orphaned(directive)
    }
    fn source_merged(&mut self, label: &str, offered: usize, added: usize) {
        (**self).source_merged(label, offered, added)
    }
}

impl<A: ParseObserver, B: ParseObserver> ParseObserver for (A, B) {
    fn excluded(&mut self, reason: Exclusion, directive: &str) {
        self.0.excluded(reason, directive);
        self.1.excluded(reason, directive);
    }
    fn added(&mut self, locator: &str, block: &Block) {
        self.0.added(locator, block);
        self.1.added(locator, block);
    }
    fn duplicate(&mut self, locator: &str) {
        self.0.duplicate(locator);
        self.1.duplicate(locator);
    }
    fn orphaned(&mut self, directive: &str) {
        self.0.orphaned(directive);
        self.1.orphaned(directive);
    }
    fn source_merged(&mut self, label: &str, offered: usize, added: usize) {
        self.0.source_merged(label, offered, added);
        self.1.source_merged(label, offered, added);
    }
}

/// Per-source parse counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParseStats {
    pub blocks: usize,
    pub plain: usize,
    pub excluded_group: usize,
    pub excluded_language: usize,
    pub duplicates: usize,
    pub orphaned: usize,
}

impl ParseStats {
    pub fn entries(&self) -> usize {
        self.blocks + self.plain
    }
}

impl ParseObserver for ParseStats {
    fn excluded(&mut self, reason: Exclusion, _directive: &str) {
        match reason {
            Exclusion::Group => self.excluded_group += 1,
            Exclusion::Language => self.excluded_language += 1,
        }
    }

    fn added(&mut self, _locator: &str, block: &Block) {
        if block.is_plain() {
            self.plain += 1;
        } else {
            self.blocks += 1;
        }
    }

    fn duplicate(&mut self, _locator: &str) {
        self.duplicates += 1;
    }

    fn orphaned(&mut self, _directive: &str) {
        self.orphaned += 1;
    }
}

/// Per-source merge counters, in merge order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub sources: Vec<MergedSource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedSource {
    pub label: String,
    pub offered: usize,
    pub added: usize,
}

impl ParseObserver for MergeStats {
    fn source_merged(&mut self, label: &str, offered: usize, added: usize) {
        self.sources.push(MergedSource {
            label: label.to_string(),
            offered,
            added,
        });
    }
}

/// Logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceObserver;

impl ParseObserver for TraceObserver {
    fn excluded(&mut self, reason: Exclusion, directive: &str) {
        debug!(?reason, "Excluded block: {}", truncate(directive, 60));
    }

    fn added(&mut self, locator: &str, block: &Block) {
        if block.is_plain() {
            debug!("Parsed plain URL: {}", truncate(locator, 50));
        } else {
            debug!(
                "Parsed full block ({} lines) -> {}",
                block.len(),
                truncate(locator, 50)
            );
        }
    }

    fn duplicate(&mut self, locator: &str) {
        debug!("Duplicate URL ignored: {}", truncate(locator, 50));
    }

    fn orphaned(&mut self, directive: &str) {
        debug!("Block without URL dropped: {}", truncate(directive, 60));
    }

    fn source_merged(&mut self, label: &str, offered: usize, added: usize) {
        info!("Merged {}: {} of {} entries added", label, added, offered);
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}
