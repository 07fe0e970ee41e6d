pub mod directive;
pub mod lines;

use crate::metrics::ParseObserver;
use crate::playlist::{Block, EntryMap};
use lines::Line;

pub use directive::Filters;

/// Parse one playlist document into its ordered locator -> block mapping.
///
/// Excluded blocks are skipped with their attributes and locator. Within the
/// document the first block for a locator wins. A kept block whose attribute
/// run is not directly followed by a locator is dropped.
pub fn parse_source<O: ParseObserver>(
    document: &str,
    filters: &Filters,
    mut observer: O,
) -> EntryMap {
    let lines = lines::classify_lines(document);
    let mut entries = EntryMap::new();
    let mut i = 0;

    while i < lines.len() {
        match lines[i] {
            Line::Directive(directive) => {
                i += 1;

                if let Some(reason) = filters.check(directive) {
                    observer.excluded(reason, directive);
                    i = skip_attributes(&lines, i);
                    if let Some(Line::Locator(_)) = lines.get(i) {
                        i += 1;
                    }
                    continue;
                }

                let mut block = Block::new(directive);
                while let Some(Line::Attribute(attr)) = lines.get(i) {
                    block.push(attr);
                    i += 1;
                }

                match lines.get(i) {
                    Some(Line::Locator(url)) => {
                        insert(&mut entries, url, block, &mut observer);
                        i += 1;
                    }
                    // Leave a following directive or locator for the next iteration.
                    _ => observer.orphaned(directive),
                }
            }
            Line::Locator(url) => {
                insert(&mut entries, url, Block::plain(), &mut observer);
                i += 1;
            }
            Line::Attribute(_) | Line::Blank => i += 1,
        }
    }

    entries
}

/// Step over the attribute and blank lines of an excluded block.
/// Returns the index of the first directive or locator, or the end.
fn skip_attributes(lines: &[Line<'_>], mut i: usize) -> usize {
    while let Some(Line::Attribute(_) | Line::Blank) = lines.get(i) {
        i += 1;
    }
    i
}

fn insert<O: ParseObserver>(entries: &mut EntryMap, url: &str, block: Block, observer: &mut O) {
    if entries.contains(url) {
        observer.duplicate(url);
        return;
    }
    observer.added(url, &block);
    entries.insert_first(url, block);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ParseStats;

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.m3u", name)).unwrap()
    }

    fn default_filters() -> Filters {
        Filters::new(
            ["devotional", "music", "educational"],
            [
                "tamil", "telugu", "oriya", "gujarati", "kannada", "malayalam", "bhojpuri",
                "punjabi", "marathi",
            ],
        )
    }

    #[test]
    fn source_a_keeps_only_espn() {
        let mut stats = ParseStats::default();
        let entries = parse_source(&fixture("source_a"), &default_filters(), &mut stats);

        assert!(!entries.contains("http://x/a"));
        assert!(!entries.contains("http://x/b"));
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries.get("http://x/c").unwrap().lines(),
            [
                r#"#EXTINF:-1 tvg-id="espn" group-title="Sports",ESPN"#,
                "#KODIPROP:inputstream.adaptive.license_type=clearkey",
                "#KODIPROP:inputstream.adaptive.license_key=0a1b2c3d:4e5f6a7b",
            ]
        );
        assert_eq!(stats.excluded_group, 1);
        assert_eq!(stats.excluded_language, 1);
        assert_eq!(stats.blocks, 1);
    }

    #[test]
    fn jtv_fixture() {
        let mut stats = ParseStats::default();
        let entries = parse_source(&fixture("jtv"), &default_filters(), &mut stats);

        let order: Vec<&str> = entries.iter().map(|(url, _)| url).collect();
        assert_eq!(
            order,
            [
                "https://example.org/live/144/index.mpd",
                "https://example.org/live/202/index.mpd",
                "https://example.org/live/405/index.mpd",
                "https://example.org/live/plain/1.m3u8",
            ]
        );
        assert_eq!(
            stats,
            ParseStats {
                blocks: 3,
                plain: 1,
                excluded_group: 2,
                excluded_language: 1,
                duplicates: 2,
                orphaned: 1,
            }
        );

        // First occurrence of 405 wins over the "Backup" block.
        let aaj_tak = entries.get("https://example.org/live/405/index.mpd").unwrap();
        assert_eq!(
            aaj_tak.lines(),
            [
                r#"#EXTINF:-1 tvg-id="405" group-title="News",Aaj Tak, HD"#,
                "#EXTVLCOPT:http-referrer=https://example.org/",
            ]
        );
        // A later plain occurrence does not replace the full block.
        assert_eq!(entries.get("https://example.org/live/144/index.mpd").unwrap().len(), 4);
        assert!(entries.get("https://example.org/live/plain/1.m3u8").unwrap().is_plain());
    }

    #[test]
    fn parsing_is_idempotent() {
        let doc = fixture("jtv");
        let filters = default_filters();
        assert_eq!(parse_source(&doc, &filters, ()), parse_source(&doc, &filters, ()));
    }

    #[test]
    fn no_filters_keeps_everything() {
        let entries = parse_source(&fixture("source_a"), &Filters::default(), ());
        let order: Vec<&str> = entries.iter().map(|(url, _)| url).collect();
        assert_eq!(order, ["http://x/a", "http://x/b", "http://x/c"]);
        assert_eq!(entries.get("http://x/a").unwrap().len(), 2);
    }

    #[test]
    fn excluded_block_does_not_swallow_next_directive() {
        let doc = "#EXTINF:-1 group-title=\"Music\",MTV\n#EXTINF:-1,News\nhttp://x/news\n";
        let mut stats = ParseStats::default();
        let entries = parse_source(doc, &default_filters(), &mut stats);
        assert_eq!(stats.excluded_group, 1);
        assert_eq!(entries.get("http://x/news").unwrap().lines(), ["#EXTINF:-1,News"]);
    }

    #[test]
    fn block_without_locator_does_not_swallow_next_directive() {
        let doc = "#EXTINF:-1,Lost\n#KODIPROP:k=v\n#EXTINF:-1,Found\nhttp://x/found\n";
        let mut stats = ParseStats::default();
        let entries = parse_source(doc, &Filters::default(), &mut stats);
        assert_eq!(stats.orphaned, 1);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries.get("http://x/found").unwrap().lines(), ["#EXTINF:-1,Found"]);
    }

    #[test]
    fn excluded_locator_does_not_leak_as_plain_entry() {
        let doc = "#EXTINF:-1,Tamil Movies\n\n#KODIPROP:k=v\n\nhttp://x/t\nhttp://x/next\n";
        let entries = parse_source(doc, &default_filters(), ());
        let order: Vec<&str> = entries.iter().map(|(url, _)| url).collect();
        assert_eq!(order, ["http://x/next"]);
    }

    #[test]
    fn blank_line_ends_kept_block() {
        let mut stats = ParseStats::default();
        let entries = parse_source("#EXTINF:-1,News\n\nhttp://x/n\n", &Filters::default(), &mut stats);
        assert_eq!(stats.orphaned, 1);
        assert_eq!(stats.plain, 1);
        assert_eq!(entries.len(), 1);
        assert!(entries.get("http://x/n").unwrap().is_plain());
    }

    #[test]
    fn whitespace_only_line_is_a_locator() {
        let doc = "#EXTINF:-1,News\n   \nhttp://x/n\n  \n";
        let entries = parse_source(doc, &Filters::default(), ());
        let order: Vec<&str> = entries.iter().map(|(url, _)| url).collect();
        assert_eq!(order, ["   ", "http://x/n", "  "]);
        assert_eq!(entries.get("   ").unwrap().lines(), ["#EXTINF:-1,News"]);
        assert!(entries.get("http://x/n").unwrap().is_plain());
        assert!(entries.get("  ").unwrap().is_plain());
    }

    #[test]
    fn crlf_document_preserves_line_content() {
        let doc = "#EXTM3U\r\n#EXTINF:-1 group-title=\"News\",NDTV\r\n#KODIPROP:k=v\r\nhttp://x/ndtv\r\n";
        let entries = parse_source(doc, &default_filters(), ());
        assert_eq!(
            entries.get("http://x/ndtv").unwrap().lines(),
            ["#EXTINF:-1 group-title=\"News\",NDTV", "#KODIPROP:k=v"]
        );
    }

    #[test]
    fn malformed_directive_degrades() {
        let doc = "#EXTINF:no comma and group-title=\"broken\nhttp://x/m\n";
        let entries = parse_source(doc, &default_filters(), ());
        assert_eq!(entries.get("http://x/m").unwrap().len(), 1);
    }

    #[test]
    fn empty_document() {
        assert!(parse_source("", &default_filters(), ()).is_empty());
        assert!(parse_source("#EXTM3U\n\n", &default_filters(), ()).is_empty());
    }
}
