use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::parser::Filters;

pub const DEFAULT_CONFIG_FILE: &str = "m3u_merge.toml";
const ENV_PREFIX: &str = "M3U_MERGE";

const DEFAULT_SOURCES: &[&str] = &[
    "https://raw.githubusercontent.com/Jitendra-unatti/fancode/refs/heads/main/data/fancode.m3u",
    "https://raw.githubusercontent.com/alex8875/m3u/refs/heads/main/jtv.m3u",
    "https://raw.githubusercontent.com/alex8875/m3u/refs/heads/main/z5.m3u",
];
const DEFAULT_EXCLUDED_GROUPS: &[&str] = &["devotional", "music", "educational"];
const DEFAULT_EXCLUDED_LANGUAGES: &[&str] = &[
    "tamil", "telugu", "oriya", "gujarati", "kannada", "malayalam", "bhojpuri", "punjabi",
    "marathi",
];
const DEFAULT_EPG_URL: &str = "https://raw.githubusercontent.com/ibyb007/myepg/main/epg.xml.gz";

/// One playlist to pull. Position in `Settings::sources` is its priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl SourceConfig {
    pub fn new(url: &str) -> Self {
        SourceConfig {
            url: url.to_string(),
            name: None,
        }
    }

    /// `Source <n> (<stem>)`, where `n` is the 1-based priority.
    pub fn label(&self, position: usize) -> String {
        let stem = match &self.name {
            Some(name) => name.clone(),
            None => url_stem(&self.url).unwrap_or("Unknown").to_string(),
        };
        format!("Source {} ({})", position, stem)
    }
}

/// Last path segment up to its first `.`; `None` when the URL has no `.` at all.
fn url_stem(url: &str) -> Option<&str> {
    if !url.contains('.') {
        return None;
    }
    let last = url.rsplit('/').next().unwrap_or(url);
    last.split('.').next()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            timeout_secs: 30,
            max_retries: 3,
            backoff_ms: 2000,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub sources: Vec<SourceConfig>,
    pub excluded_groups: Vec<String>,
    pub excluded_languages: Vec<String>,
    pub epg_url: String,
    pub output: PathBuf,
    pub history_db: Option<PathBuf>,
    pub fetch: FetchConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            sources: DEFAULT_SOURCES.iter().map(|u| SourceConfig::new(u)).collect(),
            excluded_groups: to_strings(DEFAULT_EXCLUDED_GROUPS),
            excluded_languages: to_strings(DEFAULT_EXCLUDED_LANGUAGES),
            epg_url: DEFAULT_EPG_URL.to_string(),
            output: PathBuf::from("merged.m3u"),
            history_db: Some(PathBuf::from("data/m3u_merge.sqlite")),
            fetch: FetchConfig::default(),
        }
    }
}

impl Settings {
    /// Defaults, then the config file (if present), then `M3U_MERGE_*` env vars.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (file, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        let defaults = ::config::Config::try_from(&Settings::default())?;
        let settings: Settings = ::config::Config::builder()
            .add_source(defaults)
            .add_source(::config::File::from(file.as_path()).required(required))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to load configuration from {:?}", file))?
            .try_deserialize()
            .context("Invalid configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            bail!("No sources configured");
        }
        if let Some(s) = self.sources.iter().find(|s| s.url.trim().is_empty()) {
            bail!("Source with empty url: {:?}", s);
        }
        Ok(())
    }

    pub fn filters(&self) -> Filters {
        Filters::new(&self.excluded_groups, &self.excluded_languages)
    }

    /// Sources paired with their display labels, in priority order.
    pub fn labeled_sources(&self) -> Vec<(String, &SourceConfig)> {
        self.sources
            .iter()
            .enumerate()
            .map(|(i, s)| (s.label(i + 1), s))
            .collect()
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_url_stem() {
        let s = Settings::default();
        let labels: Vec<String> = s.labeled_sources().into_iter().map(|(l, _)| l).collect();
        assert_eq!(
            labels,
            ["Source 1 (fancode)", "Source 2 (jtv)", "Source 3 (z5)"]
        );
    }

    #[test]
    fn label_fallbacks() {
        assert_eq!(SourceConfig::new("localhost/playlist").label(2), "Source 2 (Unknown)");
        let named = SourceConfig {
            url: "https://x/y.m3u".into(),
            name: Some("sports".into()),
        };
        assert_eq!(named.label(1), "Source 1 (sports)");
    }

    #[test]
    fn default_filters_match_defaults() {
        let f = Settings::default().filters();
        assert!(f.is_excluded_group("educational"));
        assert!(f.is_excluded_language("Zee Marathi HD"));
        assert!(!f.is_excluded_language("Zee Cinema HD"));
    }

    #[test]
    fn load_from_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merge.toml");
        std::fs::write(
            &path,
            r#"
epg_url = "https://example.org/epg.xml"
excluded_languages = ["hindi"]

[[sources]]
url = "https://example.org/a.m3u"

[[sources]]
url = "local/b.m3u"
name = "backup"

[fetch]
max_retries = 1
"#,
        )
        .unwrap();

        let s = Settings::load(Some(path.as_path())).unwrap();
        assert_eq!(s.sources.len(), 2);
        assert_eq!(s.sources[1].name.as_deref(), Some("backup"));
        assert_eq!(s.epg_url, "https://example.org/epg.xml");
        assert_eq!(s.excluded_languages, ["hindi"]);
        assert_eq!(s.excluded_groups, to_strings(DEFAULT_EXCLUDED_GROUPS));
        assert_eq!(s.fetch.max_retries, 1);
        assert_eq!(s.fetch.backoff_ms, 2000);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(Some(dir.path().join("nope.toml").as_path())).is_err());
    }

    #[test]
    fn empty_sources_rejected() {
        let s = Settings {
            sources: vec![],
            ..Default::default()
        };
        assert!(s.validate().is_err());
    }
}
