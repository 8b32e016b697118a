use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

const LOG_FILE: &str = "format_log.jsonl";
const MAX_ENTRIES: usize = 500;

#[derive(Debug, Serialize)]
pub struct RunLogEntry<'a> {
    pub timestamp: &'a str,
    pub command: &'a str,
    pub path: &'a Path,
    pub status: &'a str,
    pub stderr_lines: usize,
}

pub fn record_run(
    app_dir: &Path,
    command: &str,
    path: &Path,
    status: &str,
    stderr_lines: usize,
) -> Result<()> {
    let log_path = ensure_log_file(app_dir)?;
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".into());
    let entry = RunLogEntry {
        timestamp: &timestamp,
        command,
        path,
        status,
        stderr_lines,
    };
    let json = serde_json::to_string(&entry)?;
    let mut file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(&log_path)
        .with_context(|| format!("opening {log_path:?}"))?;
    writeln!(file, "{json}")?;
    truncate_log(&log_path, MAX_ENTRIES)?;
    Ok(())
}

fn ensure_log_file(app_dir: &Path) -> Result<PathBuf> {
    if !app_dir.exists() {
        fs::create_dir_all(app_dir).with_context(|| format!("creating {app_dir:?}"))?;
    }
    Ok(app_dir.join(LOG_FILE))
}

fn truncate_log(path: &Path, max_entries: usize) -> Result<()> {
    let file = OpenOptions::new()
        .read(true)
        .open(path)
        .with_context(|| format!("reading {path:?}"))?;
    let reader = BufReader::new(file);
    let lines: Vec<_> = reader.lines().collect::<Result<_, _>>()?;
    if lines.len() <= max_entries {
        return Ok(());
    }
    let keep = &lines[lines.len() - max_entries..];
    fs::write(path, keep.join("\n") + "\n")?;
    Ok(())
}
