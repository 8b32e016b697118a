use std::path::Path;

use crate::catalog::FileEntry;

/// Snapshot of the active filters. The front end owns the current value and
/// hands a fresh copy in on every pass; filtering never mutates the catalog.
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    pub mask_enabled: bool,
    pub mask: String,
    pub search: String,
}

impl FilterCriteria {
    pub fn matches(&self, path: &Path) -> bool {
        self.mask_passes(path) && self.search_passes(path)
    }

    // Directory mask: only the containing directory is inspected, and only
    // when the mask is enabled and non-empty.
    fn mask_passes(&self, path: &Path) -> bool {
        if !self.mask_enabled || self.mask.is_empty() {
            return true;
        }
        path.parent()
            .map(|dir| dir.to_string_lossy().contains(&self.mask))
            .unwrap_or(false)
    }

    // Search applies to the file name, not the full path.
    fn search_passes(&self, path: &Path) -> bool {
        if self.search.is_empty() {
            return true;
        }
        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.contains(&self.search))
            .unwrap_or(false)
    }
}

/// Stable filter: keeps the catalog's order, never re-sorts.
pub fn apply(catalog: &[FileEntry], criteria: &FilterCriteria) -> Vec<FileEntry> {
    catalog
        .iter()
        .filter(|entry| criteria.matches(&entry.path))
        .cloned()
        .collect()
}
