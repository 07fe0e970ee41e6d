use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Settings;
use crate::fetch::Fetch;
use crate::merge;
use crate::metrics::{MergeStats, ParseStats, TraceObserver};
use crate::parser;
use crate::playlist::EntryMap;
use crate::render;

/// Outcome of fetching and parsing one source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub label: String,
    pub url: String,
    pub latency_ms: i64,
    pub error: Option<String>,
    pub stats: ParseStats,
}

impl SourceReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
    pub merge: MergeStats,
    pub entries: usize,
    /// Set once the document has been written.
    pub output: Option<PathBuf>,
}

impl RunReport {
    pub fn loaded(&self) -> usize {
        self.sources.iter().filter(|s| s.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.sources.len() - self.loaded()
    }
}

pub struct RunOutcome {
    pub report: RunReport,
    /// `None` when no source could be loaded.
    pub document: Option<String>,
}

/// Fetch and parse every configured source in priority order. Failed sources
/// are reported and contribute nothing.
pub async fn collect<F: Fetch>(
    settings: &Settings,
    fetcher: &F,
    progress: &ProgressBar,
) -> (Vec<SourceReport>, Vec<(String, EntryMap)>) {
    let filters = settings.filters();
    let mut reports = Vec::with_capacity(settings.sources.len());
    let mut loaded = Vec::new();

    for (label, source) in settings.labeled_sources() {
        progress.set_message(label.clone());
        let start = Instant::now();
        let fetched = fetcher.fetch(&source.url).await;
        let latency_ms = start.elapsed().as_millis() as i64;

        let report = match fetched {
            Ok(text) => {
                let mut stats = ParseStats::default();
                let entries =
                    parser::parse_source(&text, &filters, (&mut stats, TraceObserver));
                info!(
                    "{}: parsed {} entries (excluded {} group-based, {} language-based)",
                    label,
                    entries.len(),
                    stats.excluded_group,
                    stats.excluded_language
                );
                loaded.push((label.clone(), entries));
                SourceReport {
                    label,
                    url: source.url.clone(),
                    latency_ms,
                    error: None,
                    stats,
                }
            }
            Err(e) => {
                warn!("{}: skipped ({})", label, e);
                SourceReport {
                    label,
                    url: source.url.clone(),
                    latency_ms,
                    error: Some(e.to_string()),
                    stats: ParseStats::default(),
                }
            }
        };
        reports.push(report);
        progress.inc(1);
    }

    (reports, loaded)
}

/// Collect, merge and render. Nothing is rendered when every source failed.
pub async fn run<F: Fetch>(settings: &Settings, fetcher: &F, progress: &ProgressBar) -> RunOutcome {
    let started_at = Utc::now();
    let (sources, loaded) = collect(settings, fetcher, progress).await;

    let mut merge_stats = MergeStats::default();
    let (entries, document) = if loaded.is_empty() {
        warn!("No sources loaded");
        (0, None)
    } else {
        let merged = merge::merge(&loaded, (&mut merge_stats, TraceObserver));
        info!("Total unique entries merged: {}", merged.len());
        (merged.len(), Some(render::render(&merged, &settings.epg_url)))
    };

    RunOutcome {
        report: RunReport {
            started_at,
            finished_at: Utc::now(),
            sources,
            merge: merge_stats,
            entries,
            output: None,
        },
        document,
    }
}
