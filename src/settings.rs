use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub const APP_DIR: &str = ".unifmt";
pub const SETTINGS_FILE: &str = "settings.json";

pub const ASTYLE_PATH_KEY: &str = "unifmt.astyle_path";
pub const REFRESH_COMMAND_KEY: &str = "unifmt.refresh_command";
pub const DEFAULT_ASTYLE: &str = "astyle";

pub fn app_dir(root: &Path) -> PathBuf {
    root.join(APP_DIR)
}

/// Key-value preference store persisted across sessions. The core only ever
/// calls this seam; tests swap in an in-memory store.
pub trait SettingsStore {
    fn get(&self, key: &str, default: &str) -> String;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    pub fn open(app_dir: &Path) -> Result<Self> {
        let path = app_dir.join(SETTINGS_FILE);
        let values = if path.exists() {
            let data =
                fs::read(&path).with_context(|| format!("reading settings {}", path.display()))?;
            serde_json::from_slice(&data)
                .with_context(|| format!("parsing settings {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, values })
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, json + "\n")
            .with_context(|| format!("writing settings {}", self.path.display()))?;
        Ok(())
    }
}

impl SettingsStore for JsonFileStore {
    fn get(&self, key: &str, default: &str) -> String {
        self.values
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        self.save()
    }
}
