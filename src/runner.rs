use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::UnifmtError;

/// One formatter invocation, built fresh per file.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub options_file: PathBuf,
    pub target: PathBuf,
}

impl CommandSpec {
    /// Renders the exact `<program> --options=<file> <target>` line handed to
    /// the shell. Nothing is quoted, so paths containing spaces or shell
    /// metacharacters will not survive the round trip.
    pub fn render(&self) -> String {
        format!(
            "{} --options={} {}",
            self.program,
            self.options_file.display(),
            self.target.display()
        )
    }
}

#[derive(Debug)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    // recorded for the log, never used to fail a batch
    pub success: bool,
}

/// Seam for the platform shell. Tests substitute a recording fake.
pub trait CommandExecutor {
    fn execute(&self, command: &str) -> io::Result<CommandResult>;
}

pub struct ShellExecutor;

#[cfg(unix)]
impl CommandExecutor for ShellExecutor {
    fn execute(&self, command: &str) -> io::Result<CommandResult> {
        let output = Command::new("sh").arg("-c").arg(command).output()?;
        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            success: output.status.success(),
        })
    }
}

#[cfg(windows)]
impl CommandExecutor for ShellExecutor {
    fn execute(&self, command: &str) -> io::Result<CommandResult> {
        let shell = std::env::var("ComSpec").unwrap_or_else(|_| "cmd.exe".to_string());
        let output = Command::new(shell).arg("/C").arg(command).output()?;
        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            success: output.status.success(),
        })
    }
}

/// Asked to reconcile externally-changed files once per batch. Implementations
/// own their reporting; a refresh must never abort a finished batch.
pub trait Refresher {
    fn refresh(&self);
}

pub struct NullRefresher;

impl Refresher for NullRefresher {
    fn refresh(&self) {
        println!("no refresh command configured; skipping refresh.");
    }
}

pub struct CommandRefresher<'a> {
    command: String,
    executor: &'a dyn CommandExecutor,
}

impl<'a> CommandRefresher<'a> {
    pub fn new(command: String, executor: &'a dyn CommandExecutor) -> Self {
        Self { command, executor }
    }
}

impl Refresher for CommandRefresher<'_> {
    fn refresh(&self) {
        match self.executor.execute(&self.command) {
            Ok(result) => {
                if !result.stdout.is_empty() {
                    print!("{}", result.stdout);
                }
                if !result.stderr.is_empty() {
                    eprint!("{}", result.stderr);
                }
            }
            Err(err) => eprintln!("refresh command `{}` failed: {err}", self.command),
        }
    }
}

#[derive(Debug)]
pub struct RunOutcome {
    pub target: PathBuf,
    pub command: String,
    pub result: Result<CommandResult, UnifmtError>,
}

pub fn run_one(executor: &dyn CommandExecutor, spec: &CommandSpec) -> RunOutcome {
    let command = spec.render();
    let result = executor
        .execute(&command)
        .map_err(|source| UnifmtError::ProcessLaunch {
            command: command.clone(),
            source,
        });
    RunOutcome {
        target: spec.target.clone(),
        command,
        result,
    }
}

/// Strictly sequential: one process is spawned, drained and reaped before the
/// next starts. Formatters rewrite files in place, so overlapping runs are
/// not safe without per-file locking. A launch failure is recorded and the
/// batch moves on; the refresher fires exactly once after the last file.
pub fn run_batch(
    executor: &dyn CommandExecutor,
    refresher: &dyn Refresher,
    program: &str,
    options_file: &Path,
    targets: &[PathBuf],
) -> Vec<RunOutcome> {
    let mut outcomes = Vec::with_capacity(targets.len());
    for target in targets {
        let spec = CommandSpec {
            program: program.to_string(),
            options_file: options_file.to_path_buf(),
            target: target.clone(),
        };
        outcomes.push(run_one(executor, &spec));
    }
    refresher.refresh();
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    struct FakeExecutor {
        commands: RefCell<Vec<String>>,
        fail_on: Option<usize>,
    }

    impl FakeExecutor {
        fn new() -> Self {
            Self {
                commands: RefCell::new(Vec::new()),
                fail_on: None,
            }
        }

        fn failing_on(index: usize) -> Self {
            Self {
                commands: RefCell::new(Vec::new()),
                fail_on: Some(index),
            }
        }
    }

    impl CommandExecutor for FakeExecutor {
        fn execute(&self, command: &str) -> io::Result<CommandResult> {
            let index = self.commands.borrow().len();
            self.commands.borrow_mut().push(command.to_string());
            if self.fail_on == Some(index) {
                return Err(io::Error::new(io::ErrorKind::NotFound, "no such program"));
            }
            Ok(CommandResult {
                stdout: format!("Formatted  {command}\n"),
                stderr: String::new(),
                success: true,
            })
        }
    }

    struct CountingRefresher {
        calls: Cell<usize>,
    }

    impl CountingRefresher {
        fn new() -> Self {
            Self { calls: Cell::new(0) }
        }
    }

    impl Refresher for CountingRefresher {
        fn refresh(&self) {
            self.calls.set(self.calls.get() + 1);
        }
    }

    fn targets(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|name| PathBuf::from(*name)).collect()
    }

    #[test]
    fn render_builds_the_expected_command_line() {
        let spec = CommandSpec {
            program: "astyle".to_string(),
            options_file: PathBuf::from("/proj/.unifmt/csfmt.txt"),
            target: PathBuf::from("/proj/Foo.cs"),
        };
        assert_eq!(
            spec.render(),
            "astyle --options=/proj/.unifmt/csfmt.txt /proj/Foo.cs"
        );
    }

    #[test]
    fn batch_runs_every_target_in_input_order() {
        let executor = FakeExecutor::new();
        let refresher = CountingRefresher::new();
        let files = targets(&["/p/A.cs", "/p/C.cs", "/p/B.cs"]);

        let outcomes = run_batch(
            &executor,
            &refresher,
            "astyle",
            Path::new("/p/csfmt.txt"),
            &files,
        );

        assert_eq!(outcomes.len(), 3);
        let commands = executor.commands.borrow();
        assert_eq!(
            commands.as_slice(),
            &[
                "astyle --options=/p/csfmt.txt /p/A.cs",
                "astyle --options=/p/csfmt.txt /p/C.cs",
                "astyle --options=/p/csfmt.txt /p/B.cs",
            ]
        );
    }

    #[test]
    fn launch_failure_does_not_stop_the_batch() {
        let executor = FakeExecutor::failing_on(1);
        let refresher = CountingRefresher::new();
        let files = targets(&["/p/A.cs", "/p/B.cs", "/p/C.cs"]);

        let outcomes = run_batch(
            &executor,
            &refresher,
            "astyle",
            Path::new("/p/csfmt.txt"),
            &files,
        );

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].result.is_ok());
        assert!(matches!(
            outcomes[1].result,
            Err(UnifmtError::ProcessLaunch { .. })
        ));
        assert!(outcomes[2].result.is_ok());
        assert_eq!(executor.commands.borrow().len(), 3);
    }

    #[test]
    fn refresher_fires_exactly_once_per_batch() {
        let executor = FakeExecutor::new();
        let refresher = CountingRefresher::new();
        let files = targets(&["/p/A.cs", "/p/B.cs", "/p/C.cs"]);

        run_batch(
            &executor,
            &refresher,
            "astyle",
            Path::new("/p/csfmt.txt"),
            &files,
        );
        assert_eq!(refresher.calls.get(), 1);
    }

    #[test]
    fn refresher_fires_even_for_an_empty_batch() {
        let executor = FakeExecutor::new();
        let refresher = CountingRefresher::new();

        let outcomes = run_batch(
            &executor,
            &refresher,
            "astyle",
            Path::new("/p/csfmt.txt"),
            &[],
        );
        assert!(outcomes.is_empty());
        assert_eq!(refresher.calls.get(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn shell_executor_captures_both_streams() {
        let result = ShellExecutor
            .execute("echo out; echo err 1>&2")
            .expect("shell");
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
        assert!(result.success);
    }

    #[cfg(unix)]
    #[test]
    fn shell_executor_reports_nonzero_exit_without_erroring() {
        let result = ShellExecutor.execute("exit 3").expect("shell");
        assert!(!result.success);
    }
}
