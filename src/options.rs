use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::error::UnifmtError;

pub const OPTIONS_FILE: &str = "csfmt.txt";

// Passed to astyle verbatim; unifmt never parses these directives.
const DEFAULT_OPTIONS: &str = "\
# astyle options used by unifmt format runs.
# One directive per line; see http://astyle.sourceforge.net/astyle.html
style=java
indent=tab
indent-switches
indent-cases
indent-namespaces
pad-header
pad-oper
unpad-paren
add-braces
align-pointer=name
keep-one-line-blocks
suffix=none
";

pub fn default_path(app_dir: &Path) -> PathBuf {
    app_dir.join(OPTIONS_FILE)
}

/// Every format action checks this before touching any file.
pub fn require(path: &Path) -> Result<(), UnifmtError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(UnifmtError::ConfigMissing {
            path: path.to_path_buf(),
        })
    }
}

/// Writes the stock directives unless the file already exists. Returns
/// whether anything was written, so provisioning stays idempotent.
pub fn write_default(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_OPTIONS)
        .with_context(|| format!("writing default options {}", path.display()))?;
    Ok(true)
}
