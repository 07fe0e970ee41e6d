mod config;
mod db;
mod fetch;
mod merge;
mod metrics;
mod parser;
mod pipeline;
mod playlist;
mod render;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Settings;
use crate::fetch::{Fetch, SourceFetcher};
use crate::metrics::{ParseStats, TraceObserver};

#[derive(Parser)]
#[command(name = "m3u_merge", about = "Merge IPTV playlists with group and language filtering")]
struct Cli {
    /// Config file (default: m3u_merge.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch all sources, merge them and write the playlist
    Run {
        /// Output playlist path
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// EPG URL embedded in the header
        #[arg(long)]
        epg_url: Option<String>,
        /// Don't record this run in the history database
        #[arg(long)]
        no_history: bool,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fetch and parse a single source with the configured filters
    Inspect {
        /// URL or file path
        source: String,
        /// Print the filtered playlist instead of counts
        #[arg(long)]
        render: bool,
    },
    /// List configured sources in priority order
    Sources,
    /// Show recent runs from the history database
    Stats {
        /// Number of runs to show
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Run {
            output,
            epg_url,
            no_history,
            json,
        } => {
            if let Some(output) = output {
                settings.output = output;
            }
            if let Some(epg_url) = epg_url {
                settings.epg_url = epg_url;
            }
            if no_history {
                settings.history_db = None;
            }
            run(&settings, json).await
        }
        Commands::Inspect { source, render } => inspect(&settings, &source, render).await,
        Commands::Sources => {
            for (label, source) in settings.labeled_sources() {
                println!("{:<24} {}", label, source.url);
            }
            Ok(())
        }
        Commands::Stats { limit } => stats(&settings, limit),
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn run(settings: &Settings, json: bool) -> Result<()> {
    let fetcher = SourceFetcher::new(&settings.fetch)?;

    let pb = ProgressBar::new(settings.sources.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    let outcome = pipeline::run(settings, &fetcher, &pb).await;
    pb.finish_and_clear();

    let mut report = outcome.report;
    match &outcome.document {
        Some(text) => {
            render::write_document(&settings.output, text)?;
            report.output = Some(settings.output.clone());
        }
        None => println!("No sources loaded. Nothing written."),
    }

    if let Some(path) = &settings.history_db {
        let conn = db::connect(path)?;
        db::record_run(&conn, &report)?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for s in &report.sources {
        match &s.error {
            Some(e) => println!("{}: skipped ({})", s.label, e),
            None => println!(
                "{}: {} entries, excluded {} group-based, {} language-based",
                s.label,
                s.stats.entries(),
                s.stats.excluded_group,
                s.stats.excluded_language
            ),
        }
    }
    println!(
        "Sources: {} loaded, {} failed",
        report.loaded(),
        report.failed()
    );
    if let Some(path) = &report.output {
        println!("Saved {} entries to {}", report.entries, path.display());
    }
    Ok(())
}

async fn inspect(settings: &Settings, source: &str, as_playlist: bool) -> Result<()> {
    let fetcher = SourceFetcher::new(&settings.fetch)?;
    let text = fetcher
        .fetch(source)
        .await
        .with_context(|| format!("Failed to fetch {}", source))?;

    let mut stats = ParseStats::default();
    let entries = parser::parse_source(&text, &settings.filters(), (&mut stats, TraceObserver));

    if as_playlist {
        print!("{}", render::render(&entries, &settings.epg_url));
        return Ok(());
    }

    if entries.is_empty() {
        println!("No entries left after filtering.");
    }
    println!("Entries:            {}", entries.len());
    println!("  with metadata:    {}", stats.blocks);
    println!("  plain URLs:       {}", stats.plain);
    println!("Excluded (group):   {}", stats.excluded_group);
    println!("Excluded (lang):    {}", stats.excluded_language);
    println!("Duplicate URLs:     {}", stats.duplicates);
    println!("Blocks without URL: {}", stats.orphaned);
    Ok(())
}

fn stats(settings: &Settings, limit: usize) -> Result<()> {
    let Some(path) = &settings.history_db else {
        println!("History is disabled (no history_db configured).");
        return Ok(());
    };
    let conn = db::connect(path)?;
    let runs = db::fetch_recent_runs(&conn, limit)?;
    let Some(latest) = runs.first() else {
        println!("No runs recorded yet. Run 'run' first.");
        return Ok(());
    };

    println!(
        "{:>4} | {:<25} | {:>7} | {:>2} | {:>6} | {}",
        "#", "Started", "Entries", "OK", "Failed", "Output"
    );
    println!("{}", "-".repeat(72));
    for r in &runs {
        println!(
            "{:>4} | {:<25} | {:>7} | {:>2} | {:>6} | {}",
            r.id,
            r.started_at,
            r.entries,
            r.sources_ok,
            r.sources_failed,
            r.output.as_deref().unwrap_or("-")
        );
    }

    println!("\n--- Run {} (finished {}) ---", latest.id, latest.finished_at);
    for f in db::fetch_source_rows(&conn, latest.id)? {
        let latency = f
            .latency_ms
            .map(|ms| format!("{}ms", ms))
            .unwrap_or_else(|| "-".into());
        match f.error {
            Some(e) => println!("  {:<24} {:>7}  error: {}", f.label, latency, e),
            None => println!(
                "  {:<24} {:>7}  {} parsed, {} merged, {} excluded, {} dup  {}",
                f.label,
                latency,
                f.entries,
                f.merged,
                f.excluded_group + f.excluded_language,
                f.duplicates,
                metrics::truncate(&f.url, 50)
            ),
        }
    }
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
