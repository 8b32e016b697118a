use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::options;
use crate::runner::CommandExecutor;

const ARCHIVE_FILE: &str = "astyle.tar.gz";
const UNPACK_DIR: &str = "astyle";

/// What the provisioning pass actually did, so the caller can report it.
#[derive(Debug, Default)]
pub struct SetupReport {
    pub options_path: PathBuf,
    pub options_created: bool,
    pub archive_path: Option<PathBuf>,
    pub archive_fetched: bool,
    pub unpack_dir: Option<PathBuf>,
    pub unpacked: bool,
}

/// Bootstrap glue: no retry, no checksum, no version negotiation. Every step
/// is skipped when its result already exists on disk.
pub fn run(
    app_dir: &Path,
    options_path: &Path,
    download: Option<&str>,
    executor: &dyn CommandExecutor,
) -> Result<SetupReport> {
    fs::create_dir_all(app_dir).with_context(|| format!("creating {}", app_dir.display()))?;

    let mut report = SetupReport {
        options_path: options_path.to_path_buf(),
        options_created: options::write_default(options_path)?,
        ..SetupReport::default()
    };

    let Some(url) = download else {
        return Ok(report);
    };

    let archive = app_dir.join(ARCHIVE_FILE);
    if !archive.exists() {
        let command = format!("curl -L -o {} {}", archive.display(), url);
        let result = executor
            .execute(&command)
            .with_context(|| format!("fetching {url}"))?;
        if !result.stderr.is_empty() {
            eprint!("{}", result.stderr);
        }
        report.archive_fetched = true;
    }
    report.archive_path = Some(archive.clone());

    let unpack_dir = app_dir.join(UNPACK_DIR);
    if !unpack_dir.exists() {
        fs::create_dir_all(&unpack_dir)
            .with_context(|| format!("creating {}", unpack_dir.display()))?;
        let command = format!("tar -xzf {} -C {}", archive.display(), unpack_dir.display());
        let result = executor
            .execute(&command)
            .with_context(|| format!("unpacking {}", archive.display()))?;
        if !result.stderr.is_empty() {
            eprint!("{}", result.stderr);
        }
        report.unpacked = true;
    }
    report.unpack_dir = Some(unpack_dir);

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::CommandResult;
    use std::cell::RefCell;
    use std::io;
    use tempfile::tempdir;

    struct RecordingExecutor {
        commands: RefCell<Vec<String>>,
    }

    impl RecordingExecutor {
        fn new() -> Self {
            Self {
                commands: RefCell::new(Vec::new()),
            }
        }
    }

    impl CommandExecutor for RecordingExecutor {
        fn execute(&self, command: &str) -> io::Result<CommandResult> {
            self.commands.borrow_mut().push(command.to_string());
            Ok(CommandResult {
                stdout: String::new(),
                stderr: String::new(),
                success: true,
            })
        }
    }

    #[test]
    fn setup_without_download_only_provisions_options() {
        let temp = tempdir().expect("temp dir");
        let app_dir = temp.path().join(".unifmt");
        let options_path = options::default_path(&app_dir);
        let executor = RecordingExecutor::new();

        let report = run(&app_dir, &options_path, None, &executor).expect("setup");
        assert!(report.options_created);
        assert!(options_path.is_file());
        assert!(executor.commands.borrow().is_empty());

        // second pass is a no-op
        let report = run(&app_dir, &options_path, None, &executor).expect("setup");
        assert!(!report.options_created);
    }

    #[test]
    fn download_runs_curl_then_tar() {
        let temp = tempdir().expect("temp dir");
        let app_dir = temp.path().join(".unifmt");
        let options_path = options::default_path(&app_dir);
        let executor = RecordingExecutor::new();

        let report = run(
            &app_dir,
            &options_path,
            Some("https://example.com/astyle.tar.gz"),
            &executor,
        )
        .expect("setup");

        assert!(report.archive_fetched);
        let commands = executor.commands.borrow();
        assert_eq!(commands.len(), 2);
        assert!(commands[0].starts_with("curl -L -o "));
        assert!(commands[0].ends_with("https://example.com/astyle.tar.gz"));
        assert!(commands[1].starts_with("tar -xzf "));
    }

    #[test]
    fn cached_archive_is_not_fetched_again() {
        let temp = tempdir().expect("temp dir");
        let app_dir = temp.path().join(".unifmt");
        fs::create_dir_all(&app_dir).expect("app dir");
        fs::write(app_dir.join(ARCHIVE_FILE), b"cached").expect("seed archive");
        let options_path = options::default_path(&app_dir);
        let executor = RecordingExecutor::new();

        let report = run(
            &app_dir,
            &options_path,
            Some("https://example.com/astyle.tar.gz"),
            &executor,
        )
        .expect("setup");

        assert!(!report.archive_fetched);
        assert!(report.unpacked);
        let commands = executor.commands.borrow();
        assert_eq!(commands.len(), 1);
        assert!(commands[0].starts_with("tar -xzf "));
    }
}
