use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use is_terminal::IsTerminal;

mod catalog;
mod error;
mod filter;
mod logging;
mod options;
mod runner;
mod settings;
mod setup;

use catalog::FileEntry;
use filter::FilterCriteria;
use runner::{CommandExecutor, CommandRefresher, NullRefresher, Refresher, ShellExecutor, run_batch};
use settings::{
    ASTYLE_PATH_KEY, DEFAULT_ASTYLE, JsonFileStore, REFRESH_COMMAND_KEY, SettingsStore,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::List(cmd) => handle_list(cmd)?,
        Command::Format(cmd) => handle_format(cmd)?,
        Command::Config(cmd) => handle_config(cmd)?,
        Command::Setup(cmd) => handle_setup(cmd)?,
    }

    Ok(())
}

fn handle_list(cmd: ListCommand) -> Result<()> {
    let entries = build_catalog(&cmd.common)?;
    let criteria = build_criteria(cmd.mask.as_deref(), cmd.search.as_deref());
    let filtered = filter::apply(&entries, &criteria);

    for entry in &filtered {
        println!("{}", entry.path.display());
    }
    println!(
        "{} of {} files listed (most recently modified first).",
        filtered.len(),
        entries.len()
    );
    Ok(())
}

fn handle_format(cmd: FormatCommand) -> Result<()> {
    let interactive = io::stdin().is_terminal();
    run_format(&cmd, &ShellExecutor, &mut io::stdin().lock(), interactive)
}

fn run_format(
    cmd: &FormatCommand,
    executor: &dyn CommandExecutor,
    confirm_input: &mut dyn BufRead,
    interactive: bool,
) -> Result<()> {
    let app_dir = settings::app_dir(&cmd.common.root);
    let mut store = JsonFileStore::open(&app_dir)?;
    let astyle = cmd
        .astyle
        .clone()
        .unwrap_or_else(|| store.get(ASTYLE_PATH_KEY, DEFAULT_ASTYLE));

    let options_path = cmd.common.options_path();
    options::require(&options_path)?;

    let targets = resolve_targets(cmd)?;
    if targets.is_empty() {
        println!("no files to format.");
        return Ok(());
    }

    let message = match &cmd.file {
        Some(path) => format!("format {}?", path.display()),
        None => format!(
            "format {} files under {}?",
            targets.len(),
            cmd.common.root.display()
        ),
    };
    if !confirm(confirm_input, &message, cmd.yes, interactive)? {
        println!("aborted; nothing was formatted.");
        return Ok(());
    }

    // A declined run must leave no trace, so the edited path is only
    // persisted once the batch is confirmed.
    if let Some(path) = &cmd.astyle {
        store.set(ASTYLE_PATH_KEY, path)?;
    }

    let refresh_command = cmd
        .refresh_cmd
        .clone()
        .unwrap_or_else(|| store.get(REFRESH_COMMAND_KEY, ""));
    let refresher: Box<dyn Refresher + '_> = if refresh_command.is_empty() {
        Box::new(NullRefresher)
    } else {
        Box::new(CommandRefresher::new(refresh_command, executor))
    };

    let outcomes = run_batch(executor, refresher.as_ref(), &astyle, &options_path, &targets);

    let mut stats = RunStats::default();
    for outcome in &outcomes {
        println!("{}", outcome.command);
        let status = match &outcome.result {
            Ok(result) => {
                if !result.stdout.is_empty() {
                    print!("{}", result.stdout);
                }
                if !result.stderr.is_empty() {
                    eprint!("{}", result.stderr);
                    stats.with_errors += 1;
                }
                stats.completed += 1;
                "completed"
            }
            Err(err) => {
                eprintln!("{err}");
                stats.launch_failed += 1;
                "launch-failed"
            }
        };
        let stderr_lines = match &outcome.result {
            Ok(result) => result.stderr.lines().count(),
            Err(_) => 0,
        };
        if let Err(err) =
            logging::record_run(&app_dir, &outcome.command, &outcome.target, status, stderr_lines)
        {
            eprintln!("warning: could not record run log: {err}");
        }
    }
    stats.print();
    Ok(())
}

fn handle_config(cmd: ConfigCommand) -> Result<()> {
    let app_dir = settings::app_dir(&cmd.root);
    match cmd.action {
        ConfigAction::Get { key } => {
            let store = JsonFileStore::open(&app_dir)?;
            println!("{}", store.get(key.key(), key.default_value()));
        }
        ConfigAction::Set { key, value } => {
            let mut store = JsonFileStore::open(&app_dir)?;
            store.set(key.key(), &value)?;
            println!("{} = {value}", key.key());
        }
    }
    Ok(())
}

fn handle_setup(cmd: SetupCommand) -> Result<()> {
    let app_dir = settings::app_dir(&cmd.common.root);
    let options_path = cmd.common.options_path();
    let report = setup::run(&app_dir, &options_path, cmd.download.as_deref(), &ShellExecutor)?;

    if report.options_created {
        println!("wrote default options to {}", report.options_path.display());
    } else {
        println!(
            "options file already present at {}",
            report.options_path.display()
        );
    }
    if let Some(archive) = &report.archive_path {
        if report.archive_fetched {
            println!("fetched formatter archive to {}", archive.display());
        } else {
            println!("formatter archive already cached at {}", archive.display());
        }
    }
    if let Some(dir) = &report.unpack_dir {
        if report.unpacked {
            println!("unpacked formatter into {}", dir.display());
        }
        println!(
            "point unifmt at the binary with: unifmt config set astyle-path {}/astyle",
            dir.display()
        );
    }
    Ok(())
}

fn build_catalog(common: &CommonArgs) -> Result<Vec<FileEntry>> {
    let exclude = catalog::build_exclude_globs(&common.exclude)?;
    let entries = catalog::build(
        &common.root,
        &common.ext,
        common.include_hidden,
        exclude.as_ref(),
    )?;
    Ok(entries)
}

fn build_criteria(mask: Option<&str>, search: Option<&str>) -> FilterCriteria {
    FilterCriteria {
        mask_enabled: mask.is_some(),
        mask: mask.unwrap_or_default().to_string(),
        search: search.unwrap_or_default().to_string(),
    }
}

fn resolve_targets(cmd: &FormatCommand) -> Result<Vec<PathBuf>> {
    if let Some(file) = &cmd.file {
        let path = fs::canonicalize(file)
            .with_context(|| format!("no such file: {}", file.display()))?;
        if !path.is_file() {
            bail!("{} is not a file", path.display());
        }
        return Ok(vec![path]);
    }

    let entries = build_catalog(&cmd.common)?;
    let criteria = build_criteria(cmd.mask.as_deref(), cmd.search.as_deref());
    Ok(filter::apply(&entries, &criteria)
        .into_iter()
        .map(|entry| entry.path)
        .collect())
}

fn confirm(
    input: &mut dyn BufRead,
    message: &str,
    assume_yes: bool,
    interactive: bool,
) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    if !interactive {
        bail!("refusing to format without confirmation; rerun with --yes");
    }
    loop {
        print!("{message} [y/n]: ");
        io::stdout().flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            bail!("confirmation input closed; rerun with --yes");
        }
        match parse_confirmation(&line) {
            Some(answer) => return Ok(answer),
            None => println!("Please enter y or n."),
        }
    }
}

fn parse_confirmation(input: &str) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

#[derive(Default)]
struct RunStats {
    completed: usize,
    launch_failed: usize,
    with_errors: usize,
}

impl RunStats {
    fn print(&self) {
        println!(
            "format summary: completed={}, launch-failed={}, with-stderr={}",
            self.completed, self.launch_failed, self.with_errors
        );
    }
}

#[derive(Debug, Parser)]
#[command(name = "unifmt", version, about = "Batch source formatting via astyle")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rebuild the file catalog and print it, filters applied
    List(ListCommand),
    /// Run astyle over the catalog, a filtered subset, or one file
    Format(FormatCommand),
    /// Read or write persisted preferences
    Config(ConfigCommand),
    /// Provision the options file and, optionally, the formatter itself
    Setup(SetupCommand),
}

#[derive(Debug, Clone, Args)]
struct CommonArgs {
    #[arg(long = "root", value_name = "DIR", default_value = ".", value_hint = ValueHint::DirPath)]
    root: PathBuf,
    #[arg(long = "ext", value_name = "EXT", default_value = "cs")]
    ext: String,
    #[arg(long = "include-hidden", action = ArgAction::SetTrue)]
    include_hidden: bool,
    #[arg(long = "exclude", value_name = "GLOB")]
    exclude: Vec<String>,
    #[arg(long = "options", value_name = "FILE", value_hint = ValueHint::FilePath)]
    options: Option<PathBuf>,
}

impl CommonArgs {
    fn options_path(&self) -> PathBuf {
        self.options
            .clone()
            .unwrap_or_else(|| options::default_path(&settings::app_dir(&self.root)))
    }
}

#[derive(Debug, Args)]
struct ListCommand {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long, value_name = "TEXT")]
    search: Option<String>,
    #[arg(long, value_name = "TEXT")]
    mask: Option<String>,
}

#[derive(Debug, Args)]
struct FormatCommand {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long, value_name = "TEXT")]
    search: Option<String>,
    #[arg(long, value_name = "TEXT")]
    mask: Option<String>,
    #[arg(
        long = "file",
        value_name = "PATH",
        value_hint = ValueHint::FilePath,
        conflicts_with_all = ["search", "mask"]
    )]
    file: Option<PathBuf>,
    #[arg(long = "yes", action = ArgAction::SetTrue)]
    yes: bool,
    #[arg(long = "astyle", value_name = "PATH")]
    astyle: Option<String>,
    #[arg(long = "refresh-cmd", value_name = "CMD")]
    refresh_cmd: Option<String>,
}

#[derive(Debug, Args)]
struct ConfigCommand {
    #[arg(long = "root", value_name = "DIR", default_value = ".", value_hint = ValueHint::DirPath)]
    root: PathBuf,
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Print a preference (or its default when unset)
    Get {
        #[arg(value_enum)]
        key: SettingKey,
    },
    /// Persist a preference
    Set {
        #[arg(value_enum)]
        key: SettingKey,
        value: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SettingKey {
    AstylePath,
    RefreshCommand,
}

impl SettingKey {
    fn key(self) -> &'static str {
        match self {
            SettingKey::AstylePath => ASTYLE_PATH_KEY,
            SettingKey::RefreshCommand => REFRESH_COMMAND_KEY,
        }
    }

    fn default_value(self) -> &'static str {
        match self {
            SettingKey::AstylePath => DEFAULT_ASTYLE,
            SettingKey::RefreshCommand => "",
        }
    }
}

#[derive(Debug, Args)]
struct SetupCommand {
    #[command(flatten)]
    common: CommonArgs,
    /// Fetch and unpack an astyle archive from this URL
    #[arg(long = "download", value_name = "URL")]
    download: Option<String>,
}
