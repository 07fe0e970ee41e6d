use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::pipeline::RunReport;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create history directory {:?}", dir))?;
    }
    let conn =
        Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS runs (
            id          INTEGER PRIMARY KEY,
            started_at  TEXT NOT NULL,
            finished_at TEXT NOT NULL,
            entries     INTEGER NOT NULL,
            output      TEXT
        );

        CREATE TABLE IF NOT EXISTS source_fetches (
            id                INTEGER PRIMARY KEY,
            run_id            INTEGER NOT NULL REFERENCES runs(id),
            position          INTEGER NOT NULL,
            label             TEXT NOT NULL,
            url               TEXT NOT NULL,
            error             TEXT,
            latency_ms        INTEGER,
            entries           INTEGER NOT NULL DEFAULT 0,
            plain             INTEGER NOT NULL DEFAULT 0,
            excluded_group    INTEGER NOT NULL DEFAULT 0,
            excluded_language INTEGER NOT NULL DEFAULT 0,
            duplicates        INTEGER NOT NULL DEFAULT 0,
            orphaned          INTEGER NOT NULL DEFAULT 0,
            merged            INTEGER NOT NULL DEFAULT 0,
            UNIQUE(run_id, position)
        );
        CREATE INDEX IF NOT EXISTS idx_fetches_run ON source_fetches(run_id);
        ",
    )?;
    Ok(())
}

/// Store a run and one row per source. Returns the run id.
pub fn record_run(conn: &Connection, report: &RunReport) -> Result<i64> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO runs (started_at, finished_at, entries, output) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            report.started_at.to_rfc3339(),
            report.finished_at.to_rfc3339(),
            report.entries as i64,
            report.output.as_ref().map(|p| p.display().to_string()),
        ],
    )?;
    let run_id = tx.last_insert_rowid();

    {
        let mut stmt = tx.prepare(
            "INSERT INTO source_fetches
                (run_id, position, label, url, error, latency_ms, entries, plain,
                 excluded_group, excluded_language, duplicates, orphaned, merged)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )?;
        for (i, source) in report.sources.iter().enumerate() {
            let merged = report
                .merge
                .sources
                .iter()
                .find(|m| m.label == source.label)
                .map_or(0, |m| m.added);
            let s = &source.stats;
            stmt.execute(rusqlite::params![
                run_id,
                (i + 1) as i64,
                source.label,
                source.url,
                source.error,
                source.latency_ms,
                s.entries() as i64,
                s.plain as i64,
                s.excluded_group as i64,
                s.excluded_language as i64,
                s.duplicates as i64,
                s.orphaned as i64,
                merged as i64,
            ])?;
        }
    }
    tx.commit()?;
    Ok(run_id)
}

pub struct RunRow {
    pub id: i64,
    pub started_at: String,
    pub finished_at: String,
    pub entries: i64,
    pub output: Option<String>,
    pub sources_ok: i64,
    pub sources_failed: i64,
}

pub fn fetch_recent_runs(conn: &Connection, limit: usize) -> Result<Vec<RunRow>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.started_at, r.finished_at, r.entries, r.output,
                COALESCE(SUM(f.id IS NOT NULL AND f.error IS NULL), 0),
                COALESCE(SUM(f.error IS NOT NULL), 0)
         FROM runs r
         LEFT JOIN source_fetches f ON f.run_id = r.id
         GROUP BY r.id
         ORDER BY r.id DESC
         LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit as i64], |row| {
            Ok(RunRow {
                id: row.get(0)?,
                started_at: row.get(1)?,
                finished_at: row.get(2)?,
                entries: row.get(3)?,
                output: row.get(4)?,
                sources_ok: row.get(5)?,
                sources_failed: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct FetchRow {
    pub label: String,
    pub url: String,
    pub error: Option<String>,
    pub latency_ms: Option<i64>,
    pub entries: i64,
    pub excluded_group: i64,
    pub excluded_language: i64,
    pub duplicates: i64,
    pub merged: i64,
}

pub fn fetch_source_rows(conn: &Connection, run_id: i64) -> Result<Vec<FetchRow>> {
    let mut stmt = conn.prepare(
        "SELECT label, url, error, latency_ms, entries, excluded_group,
                excluded_language, duplicates, merged
         FROM source_fetches WHERE run_id = ?1 ORDER BY position",
    )?;
    let rows = stmt
        .query_map([run_id], |row| {
            Ok(FetchRow {
                label: row.get(0)?,
                url: row.get(1)?,
                error: row.get(2)?,
                latency_ms: row.get(3)?,
                entries: row.get(4)?,
                excluded_group: row.get(5)?,
                excluded_language: row.get(6)?,
                duplicates: row.get(7)?,
                merged: row.get(8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
