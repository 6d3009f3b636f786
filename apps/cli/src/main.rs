//! fixkeeper CLI
//!
//! Command-line front end over the fix lifecycle: browse the catalog, install
//! a fix into a game folder, keep installed fixes current, remove them again.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use fixkeeper::{
    ConsoleProgressReporter, FixError, FixKeeperConfig, FixProject, FixKeeperConfigBuilder, FixManager, GameLibrary,
    InstallOutcome, IntoProgressCallback, SortOrder, SteamLibrary, UninstallOutcome,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortArg {
    /// By game title
    Alpha,
    /// Most recently updated first
    Updated,
}

impl From<SortArg> for SortOrder {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Alpha => SortOrder::Alphabetical,
            SortArg::Updated => SortOrder::LastUpdated,
        }
    }
}

#[derive(Parser)]
#[command(name = "fixkeeper", version)]
#[command(about = "Install and update community game fixes", long_about = None)]
struct Args {
    /// State file recording installed fixes
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,

    /// Catalog API root
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Debug logging and per-file output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List available fix projects
    List {
        #[arg(long, value_enum, default_value = "alpha")]
        sort: SortArg,
    },
    /// List installed fixes
    Installed,
    /// Install the latest release of a fix
    Install {
        project: String,
        /// Game folder to install into
        #[arg(long, conflicts_with = "game")]
        path: Option<PathBuf>,
        /// Installed Steam game to install into (see `games`)
        #[arg(long)]
        game: Option<String>,
    },
    /// Update an installed fix in place
    Update { project: String },
    /// Remove every file an installed fix wrote
    Uninstall { project: String },
    /// Update every installed fix whose game folder still exists
    Check,
    /// List installed Steam games
    Games,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "fixkeeper=debug" } else { "fixkeeper=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> anyhow::Result<FixKeeperConfig> {
    let config = FixKeeperConfig::from_env().context("reading FIXKEEPER_* settings")?;
    let mut builder = FixKeeperConfigBuilder::from_config(config);
    if let Some(state_file) = &args.state_file {
        builder = builder.state_file(state_file);
    }
    if let Some(api_base) = &args.api_base {
        builder = builder.api_base(api_base.trim_end_matches('/'));
    }
    Ok(builder.build())
}

fn print_outcome(project: &str, outcome: &InstallOutcome) {
    println!("{}: {}", project, outcome);
    if let Some(hint) = outcome.override_hint() {
        println!("  Set the game's launch options to: {}", hint.launch_option());
    }
}

/// One `list` line, marking projects that are already installed
fn catalog_row(project: &FixProject, installed_tag: Option<&str>) -> String {
    let status = installed_tag.map(|tag| format!("installed {}", tag)).unwrap_or_default();
    format!(
        "{:<32} {:<40} {:<10} {}",
        project.id,
        project.display_title,
        project.last_updated.format("%Y-%m-%d"),
        status
    )
    .trim_end()
    .to_string()
}

async fn run(args: Args) -> anyhow::Result<bool> {
    let config = load_config(&args)?;
    debug!("Using state file {}", config.state_file.display());

    let manager = FixManager::new(&config)?
        .with_progress_callback(ConsoleProgressReporter::new(args.verbose).into_callback());

    match args.command {
        Command::List { sort } => {
            let installed: HashMap<String, String> = manager
                .list_installed()?
                .into_iter()
                .map(|fix| (fix.project_id, fix.installed_tag))
                .collect();

            for project in manager.list_available(sort.into()).await? {
                let tag = installed.get(&project.id).map(String::as_str);
                println!("{}", catalog_row(&project, tag));
            }
        }
        Command::Installed => {
            let installed = manager.list_installed()?;
            if installed.is_empty() {
                println!("No fixes installed");
            }
            for fix in installed {
                println!(
                    "{:<32} {:<12} {} ({})",
                    fix.project_id,
                    fix.installed_tag,
                    fix.display_name,
                    fix.install_path.display()
                );
            }
        }
        Command::Install { project, path, game } => {
            let (display_name, destination) = match (path, game) {
                (Some(path), _) => {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| project.clone());
                    (name, path)
                }
                (None, Some(game)) => {
                    let games = SteamLibrary::from_config(&config).discover();
                    let path = games
                        .get(&game)
                        .cloned()
                        .with_context(|| format!("'{}' is not an installed Steam game; see `fixkeeper games`", game))?;
                    (game, path)
                }
                (None, None) => match manager.installed(&project)? {
                    Some(entry) => (entry.display_name, entry.install_path),
                    None => bail!("'{}' is not installed yet; pass --path or --game", project),
                },
            };

            let outcome = manager.install(&project, &display_name, &destination).await?;
            print_outcome(&project, &outcome);
        }
        Command::Update { project } => {
            let Some(entry) = manager.installed(&project)? else {
                bail!("'{}' is not installed", project);
            };
            let outcome = manager
                .install(&project, &entry.display_name, &entry.install_path)
                .await?;
            print_outcome(&project, &outcome);
        }
        Command::Uninstall { project } => match manager.uninstall(&project).await? {
            UninstallOutcome::NotInstalled => println!("{}: not installed", project),
            UninstallOutcome::Removed { report, .. } => {
                println!("{}: uninstalled ({})", project, report);
                for (file, reason) in report.failures() {
                    eprintln!("  could not remove {}: {}", file, reason);
                }
            }
        },
        Command::Check => {
            let reports = manager.check_all_installed().await?;
            if reports.is_empty() {
                println!("No fixes installed");
            }

            let mut failed = false;
            for report in reports {
                match report.result {
                    Ok(outcome) => print_outcome(&report.project_id, &outcome),
                    Err(FixError::PathMissing { path }) => {
                        println!("{}: skipped, {} no longer exists", report.project_id, path.display());
                    }
                    Err(e) => {
                        failed = true;
                        eprintln!("{}: {}", report.project_id, e);
                    }
                }
            }
            return Ok(!failed);
        }
        Command::Games => {
            let games = SteamLibrary::from_config(&config).discover();
            if games.is_empty() {
                println!("No Steam games found");
            }
            for (name, path) in games {
                println!("{:<40} {}", name, path.display());
            }
        }
    }

    Ok(true)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if let Some(suggestion) = e.downcast_ref::<FixError>().and_then(FixError::suggestion) {
                eprintln!("  {}", suggestion);
            }
            ExitCode::FAILURE
        }
    }
}
