use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::playlist::EntryMap;

/// Header line of the merged playlist, pointing players at the EPG.
pub fn header(epg_url: &str) -> String {
    format!("#EXTM3U url-tvg=\"{}\"", epg_url)
}

/// Render the playlist: header, then each block verbatim followed by its URL.
pub fn render(entries: &EntryMap, epg_url: &str) -> String {
    let mut out = header(epg_url);
    out.push('\n');
    for (url, block) in entries.iter() {
        for line in block.lines() {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(url);
        out.push('\n');
    }
    out
}

/// Write the rendered playlist in one go. The text lands in a sibling temp
/// file first and is renamed over `path`.
pub fn write_document(path: &Path, text: &str) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {:?}", dir))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, text).with_context(|| format!("Failed to write {:?}", tmp))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to move output into {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::Block;

    #[test]
    fn renders_blocks_verbatim() {
        let mut entries = EntryMap::new();
        let mut block = Block::new(r#"#EXTINF:-1 tvg-id="espn"  group-title="Sports",ESPN  "#);
        block.push("#KODIPROP:inputstream.adaptive.license_type=ClearKey");
        entries.insert_first("http://x/c", block);
        entries.insert_first("http://x/d", Block::plain());

        let text = render(&entries, "https://example.org/epg.xml.gz");
        assert_eq!(
            text,
            "#EXTM3U url-tvg=\"https://example.org/epg.xml.gz\"\n\
             #EXTINF:-1 tvg-id=\"espn\"  group-title=\"Sports\",ESPN  \n\
             #KODIPROP:inputstream.adaptive.license_type=ClearKey\n\
             http://x/c\n\
             http://x/d\n"
        );
    }

    #[test]
    fn empty_playlist_is_header_only() {
        assert_eq!(render(&EntryMap::new(), "e"), "#EXTM3U url-tvg=\"e\"\n");
    }

    #[test]
    fn write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/nested/merged.m3u");
        write_document(&path, "#EXTM3U\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "#EXTM3U\n");
        assert!(!dir.path().join("out/nested/merged.m3u.tmp").exists());
    }

    #[test]
    fn write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merged.m3u");
        fs::write(&path, "old").unwrap();
        write_document(&path, "new").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }
}
