use std::cmp::Reverse;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Result, anyhow};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::{DirEntry, WalkDir};

use crate::error::UnifmtError;

#[derive(Debug, Clone)]
pub struct FileEntry {
    pub path: PathBuf,
    pub modified: SystemTime,
}

impl FileEntry {
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("")
    }
}

/// Walks `root` and returns every file with the given extension, most
/// recently modified first. The result is a snapshot; callers rebuild it
/// wholesale rather than patching entries in.
pub fn build(
    root: &Path,
    ext: &str,
    include_hidden: bool,
    exclude: Option<&GlobSet>,
) -> Result<Vec<FileEntry>, UnifmtError> {
    let metadata = fs::metadata(root).map_err(|source| UnifmtError::Discovery {
        path: root.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(UnifmtError::Discovery {
            path: root.to_path_buf(),
            source: io::Error::other("not a directory"),
        });
    }

    let root = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let ext = ext.trim_start_matches('.');

    let walker = WalkDir::new(&root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || include_hidden || !is_hidden(entry));

    let mut entries = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|err| UnifmtError::Discovery {
            path: root.clone(),
            source: err.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if !has_extension(entry.path(), ext) {
            continue;
        }
        if let Some(set) = exclude {
            if set.is_match(normalize_slashes(entry.path())) {
                continue;
            }
        }

        let modified = entry
            .metadata()
            .map_err(|err| UnifmtError::Discovery {
                path: root.clone(),
                source: err.into(),
            })?
            .modified()
            .unwrap_or(SystemTime::UNIX_EPOCH);

        entries.push(FileEntry {
            path: entry.into_path(),
            modified,
        });
    }

    sort_by_recency(&mut entries);
    Ok(entries)
}

/// Newest first; ties fall back to the path so repeated builds over an
/// unchanged tree come out in the same order.
pub fn sort_by_recency(entries: &mut [FileEntry]) {
    entries.sort_by(|a, b| {
        (Reverse(a.modified), &a.path).cmp(&(Reverse(b.modified), &b.path))
    });
}

pub fn build_exclude_globs(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob =
            Glob::new(pattern).map_err(|err| anyhow!("invalid exclude glob '{pattern}': {err}"))?;
        builder.add(glob);
    }

    builder
        .build()
        .map(Some)
        .map_err(|err| anyhow!("unable to build exclude globs: {err}"))
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == ext)
        .unwrap_or(false)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn normalize_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
