/// Prefix of the line that opens an entry.
pub const DIRECTIVE_PREFIX: &str = "#EXTINF:";
/// Prefix shared by every tag line (header, directive, attributes).
pub const MARKER: char = '#';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// `#EXTINF:` line carrying the title and group.
    Directive(&'a str),
    /// Any other `#` line: `#KODIPROP:`, `#EXTVLCOPT:`, the `#EXTM3U` header...
    Attribute(&'a str),
    /// Non-blank line without the marker.
    Locator(&'a str),
    Blank,
}

pub fn classify(line: &str) -> Line<'_> {
    if line.is_empty() {
        Line::Blank
    } else if line.starts_with(DIRECTIVE_PREFIX) {
        Line::Directive(line)
    } else if line.starts_with(MARKER) {
        Line::Attribute(line)
    } else {
        Line::Locator(line)
    }
}

/// Split a document into classified lines. LF and CRLF terminators are both
/// accepted and are not part of the line content.
pub fn classify_lines(document: &str) -> Vec<Line<'_>> {
    document.lines().map(classify).collect()
}
