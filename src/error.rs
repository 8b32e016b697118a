use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UnifmtError {
    #[error("cannot build file catalog under {path}: {source}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path}: no such options file (run `unifmt setup` to create it)")]
    ConfigMissing { path: PathBuf },

    #[error("failed to launch `{command}`: {source}")]
    ProcessLaunch {
        command: String,
        #[source]
        source: io::Error,
    },
}
