use crate::metrics::ParseObserver;
use crate::playlist::EntryMap;

/// Fold per-source mappings, highest priority first, into one playlist.
/// A locator already taken by an earlier source is never replaced.
pub fn merge<O: ParseObserver>(sources: &[(String, EntryMap)], mut observer: O) -> EntryMap {
    let mut merged = EntryMap::new();

    for (label, entries) in sources {
        let mut added = 0;
        for (url, block) in entries.iter() {
            if merged.insert_first(url, block.clone()) {
                added += 1;
            }
        }
        observer.source_merged(label, entries.len(), added);
    }

    merged
}
