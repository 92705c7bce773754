//! Top-level CLI definition and dispatch.

use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use instance_medic::core::config::{Config, SourceKind};
use instance_medic::core::errors::MedicError;
use instance_medic::diagnosis::snapshot::DiagnosticSnapshot;
use instance_medic::diagnosis::{Aggregator, Culprit, classify_with};
use instance_medic::logger::ActivityLogger;
use instance_medic::report::{
    self, NO_CULPRIT_MESSAGE, RenderOptions, WrittenReport, render_terminal, terminal,
};
use instance_medic::source::kubectl::KubectlSource;
use instance_medic::source::{MetricsSource, Target};

/// Instance medic: diagnose why a workflow-automation instance is crashing.
#[derive(Debug, Parser)]
#[command(
    name = "medic",
    author,
    version,
    about = "Instance Medic - crash and memory-exhaustion diagnosis",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Echo probe failures to stderr.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Probe a target instance, classify culprits, and print the diagnosis.
    Investigate(InvestigateArgs),
    /// Re-render a saved snapshot without contacting the instance.
    Report(ReportArgs),
    /// Re-classify a saved snapshot with the current thresholds.
    Classify(ClassifyArgs),
    /// Inspect configuration.
    Config(ConfigArgs),
    /// Show version and optional build metadata.
    Version(VersionArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SourceArg {
    Kubectl,
    Sqlite,
}

#[derive(Debug, Clone, Args)]
struct InvestigateArgs {
    /// Target instance (namespace for the kubectl source).
    #[arg(value_name = "TARGET")]
    target: String,
    /// Pod name; resolved from the namespace when omitted.
    #[arg(long, value_name = "POD")]
    pod: Option<String>,
    /// Metrics source; defaults to `source.kind` from config.
    #[arg(long, value_enum)]
    source: Option<SourceArg>,
    /// Local database file for the sqlite source.
    #[arg(long, value_name = "PATH")]
    database: Option<PathBuf>,
    /// Also write the Markdown report.
    #[arg(long)]
    report: bool,
    /// Directory for the Markdown report (default: `report.output_dir`).
    #[arg(long, value_name = "DIR")]
    report_dir: Option<PathBuf>,
    /// Save the snapshot as JSON for later `report`/`classify` runs.
    #[arg(long, value_name = "PATH")]
    save_snapshot: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct ReportArgs {
    /// Snapshot JSON written by `investigate --save-snapshot`.
    #[arg(long, value_name = "PATH")]
    snapshot: PathBuf,
    /// Write the Markdown report instead of printing the terminal view.
    #[arg(long)]
    write: bool,
    /// Directory for the Markdown report (default: `report.output_dir`).
    #[arg(long, value_name = "DIR", requires = "write")]
    report_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct ClassifyArgs {
    /// Snapshot JSON written by `investigate --save-snapshot`.
    #[arg(long, value_name = "PATH")]
    snapshot: PathBuf,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print the config file path.
    Path,
    /// Print the effective configuration.
    Show,
    /// Validate the configuration.
    Validate,
    /// Print the default configuration as TOML.
    Default,
}

#[derive(Debug, Clone, Args)]
struct VersionArgs {
    /// Include build metadata.
    #[arg(long)]
    verbose: bool,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input or configuration.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
        }
    }
}

impl From<MedicError> for CliError {
    fn from(error: MedicError) -> Self {
        match error {
            MedicError::InvalidConfig { .. }
            | MedicError::MissingConfig { .. }
            | MedicError::ConfigParse { .. } => Self::User(error.to_string()),
            MedicError::RenderInputInvalid { .. } => Self::Internal(error.to_string()),
            _ => Self::Runtime(error.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color || !io::stdout().is_terminal() {
        control::set_override(false);
    }

    match &cli.command {
        Command::Investigate(args) => run_investigate(cli, args),
        Command::Report(args) => run_report(cli, args),
        Command::Classify(args) => run_classify(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Version(args) => emit_version(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// investigate
// ---------------------------------------------------------------------------

fn open_source(config: &Config, args: &InvestigateArgs) -> Result<Box<dyn MetricsSource>, CliError> {
    let kind = match args.source {
        Some(SourceArg::Kubectl) => SourceKind::Kubectl,
        Some(SourceArg::Sqlite) => SourceKind::Sqlite,
        None => config.source.kind,
    };
    match kind {
        SourceKind::Kubectl => Ok(Box::new(KubectlSource::new(config.source.clone()))),
        SourceKind::Sqlite => open_sqlite(config, args),
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(config: &Config, args: &InvestigateArgs) -> Result<Box<dyn MetricsSource>, CliError> {
    use instance_medic::source::sqlite::SqliteSource;

    let path = args
        .database
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.source.database_path));
    let source = SqliteSource::open(&path).map_err(|e| match e {
        MedicError::Io { .. } => CliError::User(e.to_string()),
        other => CliError::from(other),
    })?;
    Ok(Box::new(source))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_config: &Config, _args: &InvestigateArgs) -> Result<Box<dyn MetricsSource>, CliError> {
    Err(CliError::User(
        "the sqlite source requires a build with the `sqlite` feature".to_string(),
    ))
}

fn run_investigate(cli: &Cli, args: &InvestigateArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let mut logger = ActivityLogger::open(&config.paths.activity_log);
    let source = open_source(&config, args)?;

    let mut target = Target::new(&args.target);
    if let Some(pod) = &args.pod {
        target = target.with_pod(pod);
    }

    let started = Instant::now();
    logger.investigation_start(&target.id, source.name(), config.stable_hash().ok());

    let snapshot = Aggregator::new(source.as_ref(), config.source.database_path.clone())
        .aggregate(&target);
    let culprits = classify_with(&snapshot, &config.thresholds);

    logger.probe_failures(&snapshot);
    logger.investigation_complete(&snapshot, &culprits, started.elapsed());

    if cli.verbose {
        for (probe, failure) in &snapshot.failures {
            eprintln!("medic: probe {probe} failed: {failure}");
        }
    }

    let saved = match &args.save_snapshot {
        Some(path) => {
            save_snapshot(path, &snapshot)?;
            logger.snapshot_saved(&snapshot.target_id, path);
            Some(path.clone())
        }
        None => None,
    };

    let opts = RenderOptions::from_config(&config);
    let written = if args.report {
        let dir = args
            .report_dir
            .clone()
            .unwrap_or_else(|| config.report.output_dir.clone());
        let written = report::write_report(&dir, &snapshot, &culprits, &opts, Utc::now())
            .inspect_err(|e| logger.error(e.code(), &e.to_string()))?;
        logger.report_written(&snapshot.target_id, &written.path, &written.digest);
        Some(written)
    } else {
        None
    };
    logger.flush();

    match output_mode(cli) {
        OutputMode::Human => {
            if !cli.quiet {
                print_terminal(&snapshot, &culprits, &opts)?;
            }
            if let Some(path) = &saved {
                println!("Snapshot saved: {}", path.display());
            }
            if let Some(written) = &written {
                print_written(written);
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "investigate",
                "snapshot": snapshot,
                "culprits": culprits,
                "snapshot_path": saved.map(|p| p.to_string_lossy().into_owned()),
                "report": written.map(|w| json!({
                    "path": w.path.to_string_lossy(),
                    "sha256": w.digest,
                })),
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn save_snapshot(path: &Path, snapshot: &DiagnosticSnapshot) -> Result<(), CliError> {
    let body = serde_json::to_string_pretty(snapshot)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| CliError::from(MedicError::io(parent, e)))?;
    }
    fs::write(path, body).map_err(|e| CliError::from(MedicError::io(path, e)))
}

fn load_snapshot(path: &Path) -> Result<DiagnosticSnapshot, CliError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| CliError::User(format!("cannot read snapshot {}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| CliError::User(format!("invalid snapshot {}: {e}", path.display())))
}

fn print_terminal(
    snapshot: &DiagnosticSnapshot,
    culprits: &[Culprit],
    opts: &RenderOptions,
) -> Result<(), CliError> {
    let text = render_terminal(snapshot, culprits, opts)?;
    let mut stdout = io::stdout().lock();
    for line in text.lines() {
        if terminal::SECTIONS.contains(&line) {
            writeln!(stdout, "{}", line.bold().cyan())?;
        } else if line.trim() == NO_CULPRIT_MESSAGE {
            writeln!(stdout, "{}", line.green())?;
        } else {
            writeln!(stdout, "{line}")?;
        }
    }
    Ok(())
}

fn print_written(written: &WrittenReport) {
    println!("Report written: {}", written.path.display());
    println!("  sha256: {}", written.digest);
}

// ---------------------------------------------------------------------------
// report / classify (replay)
// ---------------------------------------------------------------------------

fn run_report(cli: &Cli, args: &ReportArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let snapshot = load_snapshot(&args.snapshot)?;
    let culprits = classify_with(&snapshot, &config.thresholds);
    let opts = RenderOptions::from_config(&config);

    if args.write {
        let dir = args
            .report_dir
            .clone()
            .unwrap_or_else(|| config.report.output_dir.clone());
        let written = report::write_report(&dir, &snapshot, &culprits, &opts, Utc::now())?;
        let mut logger = ActivityLogger::open(&config.paths.activity_log);
        logger.report_written(&snapshot.target_id, &written.path, &written.digest);
        logger.flush();

        match output_mode(cli) {
            OutputMode::Human => print_written(&written),
            OutputMode::Json => write_json_line(&json!({
                "command": "report",
                "path": written.path.to_string_lossy(),
                "sha256": written.digest,
            }))?,
        }
        return Ok(());
    }

    match output_mode(cli) {
        OutputMode::Human => print_terminal(&snapshot, &culprits, &opts),
        OutputMode::Json => {
            report::validate_inputs(&snapshot, &culprits)?;
            write_json_line(&json!({
                "command": "report",
                "snapshot": snapshot,
                "culprits": culprits,
            }))
        }
    }
}

fn run_classify(cli: &Cli, args: &ClassifyArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let snapshot = load_snapshot(&args.snapshot)?;
    let culprits = classify_with(&snapshot, &config.thresholds);

    match output_mode(cli) {
        OutputMode::Human => {
            if culprits.is_empty() {
                println!("{}", NO_CULPRIT_MESSAGE.green());
            }
            for (idx, culprit) in culprits.iter().enumerate() {
                println!("{}. {}", idx + 1, culprit.title.bold());
                println!("   {}", culprit.description);
                println!("   -> {}", culprit.recommendation);
            }
        }
        OutputMode::Json => {
            write_json_line(&json!({
                "command": "classify",
                "target": snapshot.target_id,
                "culprits": culprits,
            }))?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// config / version
// ---------------------------------------------------------------------------

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    write_json_line(&json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    }))?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = Config::load(cli.config.as_deref())?;
            print_config(cli, "config show", &config)
        }
        Some(ConfigCommand::Default) => print_config(cli, "config default", &Config::default()),
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;
                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        write_json_line(&json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                        }))?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                if output_mode(cli) == OutputMode::Json {
                    write_json_line(&json!({
                        "command": "config validate",
                        "valid": false,
                        "code": e.code(),
                        "error": e.to_string(),
                    }))?;
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

fn print_config(cli: &Cli, command: &str, config: &Config) -> Result<(), CliError> {
    match output_mode(cli) {
        OutputMode::Human => {
            let toml_str = toml::to_string_pretty(config)
                .map_err(|e| CliError::Runtime(format!("serialize config: {e}")))?;
            println!("{toml_str}");
        }
        OutputMode::Json => {
            write_json_line(&json!({
                "command": command,
                "config": serde_json::to_value(config)?,
            }))?;
        }
    }
    Ok(())
}

fn emit_version(cli: &Cli, args: &VersionArgs) -> Result<(), CliError> {
    let version = env!("CARGO_PKG_VERSION");
    let package = env!("CARGO_PKG_NAME");
    let target = option_env!("TARGET").unwrap_or("unknown");
    let profile = option_env!("PROFILE").unwrap_or("unknown");
    let git_sha = option_env!("GIT_SHA").unwrap_or("unknown");

    match output_mode(cli) {
        OutputMode::Human => {
            println!("medic {version}");
            if args.verbose {
                println!("package: {package}");
                println!("target: {target}");
                println!("profile: {profile}");
                println!("git_sha: {git_sha}");
            }
        }
        OutputMode::Json => {
            write_json_line(&json!({
                "binary": "medic",
                "version": version,
                "package": package,
                "build": {
                    "target": target,
                    "profile": profile,
                    "git_sha": git_sha,
                }
            }))?;
        }
    }
    Ok(())
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("MEDIC_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
