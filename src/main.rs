//! Retro Board command line client

mod board;
mod console;
mod export;
mod notice;
mod render;
mod sync;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::board::{BoardSession, SyncState};
use crate::console::Outcome;
use crate::export::ExportFormat;
use crate::sync::LiveSync;
use retro_store_lib::commands;
use retro_store_lib::{AppConfig, BackendConfig, CounterStrategy, DomainError, ProjectRepository};

#[derive(Parser, Debug)]
#[command(name = "retro-board", version, about = "Team retrospective boards", propagate_version = true)]
struct Cli {
    /// Holds config.json, the default database and logs
    #[arg(long, global = true, env = "RETRO_BOARD_DATA_DIR", default_value = ".retro-board")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List projects, newest first
    #[command(alias = "ls")]
    Projects,
    /// Create an empty project
    Create { name: String },
    /// Print a project's board
    Show { project: String },
    /// Add a card: category is whatWentWell, toImprove or actionItems
    Add {
        project: String,
        category: String,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    Like { card: String },
    Dislike { card: String },
    Rename { project: String, name: String },
    /// Delete a project and all of its cards
    Delete { project: String },
    Export {
        project: String,
        #[arg(long, value_enum, default_value_t = ExportFormat::Markdown)]
        format: ExportFormat,
        /// Directory to write into
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Import projects from a JSON snapshot
    Import { file: PathBuf },
    /// Show a board and keep it current until Ctrl-C; reads add, like,
    /// dislike, reload, status and quit lines from stdin
    Watch { project: String },
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    Show,
    /// Store projects in a SQLite file
    UseSqlite { path: PathBuf },
    /// Store projects in a hosted PostgREST table API
    UseRemote {
        url: String,
        api_key: String,
        #[arg(long, default_value_t = 3000)]
        poll_ms: u64,
    },
    /// How like/dislike increments reach the store
    Counters { strategy: CounterArg },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CounterArg {
    Atomic,
    ReadModifyWrite,
}

impl From<CounterArg> for CounterStrategy {
    fn from(arg: CounterArg) -> Self {
        match arg {
            CounterArg::Atomic => CounterStrategy::Atomic,
            CounterArg::ReadModifyWrite => CounterStrategy::ReadModifyWrite,
        }
    }
}

fn init_logging(data_dir: &Path) {
    if let Err(e) = rolling_logger::init_logger(data_dir.join("logs"), "retro-board") {
        eprintln!("warning: file logging disabled: {}", e);
    }
}

fn open_repository(data_dir: &Path) -> Result<ProjectRepository> {
    let config = AppConfig::load(data_dir).context("loading config")?;
    Ok(config.open_repository()?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.data_dir);

    match cli.command {
        Command::Config(command) => run_config(&cli.data_dir, command),
        command => run(open_repository(&cli.data_dir)?, command).await,
    }
}

async fn run(repo: ProjectRepository, command: Command) -> Result<()> {
    match command {
        Command::Projects => {
            print!("{}", render::project_list(&commands::list_projects(&repo).await?));
        }
        Command::Create { name } => {
            let project = commands::create_project(&repo, &name).await?;
            println!("{}", project.id);
        }
        Command::Show { project } => {
            print!("{}", render::board(&commands::get_project(&repo, &project).await?));
        }
        Command::Add { project, category, text } => {
            let (category, card) = commands::add_card(&repo, &project, &category, &text.join(" ")).await?;
            println!("{} (added to {})", card.id, category.label());
        }
        Command::Like { card } => {
            println!("{}", commands::like_card(&repo, &card).await?);
        }
        Command::Dislike { card } => {
            println!("{}", commands::dislike_card(&repo, &card).await?);
        }
        Command::Rename { project, name } => {
            let project = commands::rename_project(&repo, &project, &name).await?;
            println!("{}", project.name);
        }
        Command::Delete { project } => {
            commands::delete_project(&repo, &project).await?;
        }
        Command::Export { project, format, out } => {
            let project = commands::get_project(&repo, &project).await?;
            let path = export::write_export(&project, format, &out).map_err(DomainError::from)?;
            println!("{}", path.display());
        }
        Command::Import { file } => {
            let json = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let report = commands::import_projects(&repo, &json).await?;
            println!(
                "{} created, {} updated, {} cards ({} blank cards skipped)",
                report.created, report.updated, report.cards, report.skipped_cards
            );
        }
        Command::Watch { project } => watch(repo, &project).await?,
        Command::Config(_) => bail!("config commands do not open the store"),
    }
    Ok(())
}

fn run_config(data_dir: &Path, command: ConfigCommand) -> Result<()> {
    let mut config = AppConfig::load(data_dir)?;
    match command {
        ConfigCommand::Show => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            if let Some(log) = rolling_logger::log_file() {
                eprintln!("logging to {}", log.display());
            }
            return Ok(());
        }
        ConfigCommand::UseSqlite { path } => {
            config.backend = BackendConfig::Sqlite { path };
        }
        ConfigCommand::UseRemote { url, api_key, poll_ms } => {
            config.backend = BackendConfig::Remote {
                url,
                api_key,
                poll_interval_ms: poll_ms,
            };
        }
        ConfigCommand::Counters { strategy } => {
            config.counter_strategy = strategy.into();
        }
    }
    let path = config.save(data_dir)?;
    println!("saved {}", path.display());
    Ok(())
}

async fn watch(repo: ProjectRepository, project_id: &str) -> Result<()> {
    let (tx, mut notices) = notice::channel();
    let board = BoardSession::open(repo, project_id, tx).await?;
    let sync = LiveSync::start(board.clone()).await?;
    let mut view = board.watch();

    let mut shown = board.project();
    if let Some(project) = &shown {
        print!("{}", render::board(project));
    }

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;

    loop {
        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = view.borrow_and_update().clone();
                if snapshot.gone {
                    break;
                }
                match snapshot.state {
                    SyncState::Ready if snapshot.project != shown => {
                        if let Some(project) = &snapshot.project {
                            println!();
                            print!("{}", render::board(project));
                        }
                        shown = snapshot.project;
                    }
                    SyncState::Error(_) => {
                        eprintln!("[{}]", render::sync_state(&snapshot.state));
                    }
                    _ => {}
                }
            }
            line = input.next_line(), if input_open => match line {
                Ok(Some(line)) => match console::parse(&line) {
                    Ok(Some(action)) => match console::apply(&board, action, sync.is_running()).await {
                        Outcome::Quit => break,
                        Outcome::Continue(Some(output)) => println!("{}", output),
                        Outcome::Continue(None) => {}
                    },
                    Ok(None) => {}
                    Err(message) => eprintln!("{}", message),
                },
                // Piped input ran out; keep watching
                Ok(None) => input_open = false,
                Err(e) => {
                    log::warn!("stdin closed: {}", e);
                    input_open = false;
                }
            },
            Some(notice) = notices.recv() => eprintln!("{}", notice),
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    sync.stop();
    while let Ok(notice) = notices.try_recv() {
        eprintln!("{}", notice);
    }
    if board.is_gone() {
        bail!("project {} no longer exists", project_id);
    }
    Ok(())
}
