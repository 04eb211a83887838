use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use taskboard_core::storage::dir::DirStore;
use taskboard_core::storage::keys::{data_key, parse_stamp};
use taskboard_core::{
    BackupManager, BoardService, BoardSet, KanbanError, KeyValueStore, Migrator, Notifier,
    RecoveryOrchestrator, Resilience, StorageError,
};

use crate::config::{default_config_path, load_config};
use crate::console::ConsoleFeedback;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] KanbanError),

    #[error("Could not open store: {0}")]
    Store(#[from] StorageError),

    #[error("Could not access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid timestamp {0:?}: expected RFC 3339 or yyyyMMdd_HHmmss")]
    InvalidTimestamp(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(about = "Kanban boards kept in a local store, with backups and recovery.")]
pub struct Cli {
    /// Config file (default: <config dir>/taskboard/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Directory of the board store
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
    /// Board context to work on
    #[arg(long, global = true, default_value = "default")]
    pub context: String,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the boards and cards of the context
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Add, remove, move or rename boards
    #[command(subcommand)]
    Board(BoardCommand),
    /// Add, remove, move or edit cards
    #[command(subcommand)]
    Card(CardCommand),
    /// Backup snapshots of the context
    #[command(subcommand)]
    Backup(BackupCommand),
    /// Write every context into one snapshot
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Load every context of a snapshot, or none of them
    Import { input: PathBuf },
    /// Recover the context from primary data, backups or defaults
    Recover,
    /// Upgrade stored data to the current shape
    Migrate {
        /// Migrate every known context
        #[arg(long)]
        all: bool,
    },
    /// Create the context's boards if it has none
    Init { titles: Vec<String> },
    /// Check (and show the repair of) a data file or the stored data
    Validate { input: Option<PathBuf> },
}

#[derive(Subcommand)]
pub enum BoardCommand {
    Add {
        title: String,
    },
    Rm {
        board_id: String,
    },
    Mv {
        board_id: String,
        #[arg(allow_negative_numbers = true)]
        order: i64,
    },
    Rename {
        board_id: String,
        title: String,
    },
}

#[derive(Subcommand)]
pub enum CardCommand {
    Add {
        board_id: String,
        title: String,
    },
    Rm {
        card_id: String,
    },
    Mv {
        card_id: String,
        board_id: String,
        #[arg(allow_negative_numbers = true)]
        order: i64,
    },
    Rename {
        card_id: String,
        title: String,
    },
    Describe {
        card_id: String,
        description: String,
    },
}

#[derive(Subcommand)]
pub enum BackupCommand {
    /// Print (or write) a backup snapshot
    Create {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace the context's data with a snapshot file
    Restore { input: PathBuf },
    /// Keep a snapshot inside the store
    Store,
    /// List stored backups, newest first
    List,
    /// Restore the stored backup closest to a point in time
    RestoreAt { at: String },
    /// Delete stored backups older than the retention period
    Cleanup {
        #[arg(long)]
        keep_days: Option<u32>,
    },
}

struct App {
    service: Arc<BoardService>,
    backups: BackupManager,
    migrator: Migrator,
    recovery: RecoveryOrchestrator,
    resilience: Resilience,
}

impl App {
    async fn open(cli: &Cli) -> Result<Self, CliError> {
        let config_path = cli.config.clone().unwrap_or_else(default_config_path);
        let config = load_config(&config_path);
        let data_dir = config.resolve_data_dir(cli.data_dir.as_deref());
        log::debug!(target: "taskboard.cli", "Using store at {}", data_dir.display());

        let store: Arc<dyn KeyValueStore> = Arc::new(DirStore::open(data_dir).await?);
        let notifier = Notifier::new(Arc::new(ConsoleFeedback));
        let service = Arc::new(BoardService::new(store, config.core.clone()));
        Ok(Self {
            backups: BackupManager::new(service.clone()),
            migrator: Migrator::new(service.clone()),
            recovery: RecoveryOrchestrator::new(service.clone(), notifier.clone()),
            resilience: Resilience::new(&config.core, notifier),
            service,
        })
    }

    /// Load the context, falling back to recovery when the data is unusable.
    async fn load(&self, context: &str) -> Result<BoardSet, KanbanError> {
        let load = self.resilience.execute_with_fallback(
            "load_data",
            || self.service.load_data(context),
            || self.recovery.recover(context),
        );
        self.resilience.performance().measure("load_data", load).await
    }
}

pub async fn run(cli: Cli) -> Result<(), CliError> {
    let app = App::open(&cli).await?;
    let ctx = cli.context.as_str();

    match cli.command {
        Command::Show { json } => {
            let set = app.load(ctx).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&set)?);
            } else {
                print_set(&set);
            }
        }
        Command::Board(command) => board_command(&app, ctx, command).await?,
        Command::Card(command) => card_command(&app, ctx, command).await?,
        Command::Backup(command) => backup_command(&app, ctx, command).await?,
        Command::Export { output } => {
            let snapshot = app
                .resilience
                .execute_with_retry("export_all", || app.backups.export_all())
                .await?;
            write_output(output.as_deref(), &snapshot)?;
        }
        Command::Import { input } => {
            let snapshot = read_file(&input)?;
            let imported = app.backups.import_all(&snapshot).await?;
            println!("Imported {} context(s): {}", imported.len(), imported.join(", "));
        }
        Command::Recover => {
            let set = app.recovery.recover(ctx).await?;
            print_set(&set);
        }
        Command::Migrate { all } => {
            let contexts = if all {
                app.service.known_contexts().await?
            } else {
                vec![ctx.to_string()]
            };
            for context in contexts {
                let changed = app.migrator.migrate_context(&context).await?;
                println!(
                    "{}: {}",
                    context,
                    if changed { "migrated" } else { "up to date" }
                );
            }
        }
        Command::Init { titles } => {
            let custom = (!titles.is_empty()).then_some(titles.as_slice());
            if app.migrator.initialize_context(ctx, custom).await? {
                println!("Initialized '{}'", ctx);
            } else {
                println!("'{}' already has data", ctx);
            }
        }
        Command::Validate { input } => {
            println!("{}", validate_report(&app, ctx, input.as_deref()).await?);
        }
    }

    for metrics in app.resilience.performance().all() {
        log::debug!(
            target: "taskboard.cli",
            "{}: {} call(s), avg {:?}",
            metrics.operation,
            metrics.count,
            metrics.average()
        );
    }
    Ok(())
}

async fn board_command(app: &App, ctx: &str, command: BoardCommand) -> Result<(), CliError> {
    app.load(ctx).await?;
    let service = &app.service;
    let retry = &app.resilience;
    match command {
        BoardCommand::Add { title } => {
            let board = retry
                .execute_with_retry("create_board", || service.create_board(ctx, &title))
                .await?;
            println!("{}", board.id);
        }
        BoardCommand::Rm { board_id } => {
            retry
                .execute_with_retry("delete_board", || service.delete_board(ctx, &board_id))
                .await?;
        }
        BoardCommand::Mv { board_id, order } => {
            let board = retry
                .execute_with_retry("move_board", || service.move_board(ctx, &board_id, order))
                .await?;
            println!("{} -> {}", board.id, board.order);
        }
        BoardCommand::Rename { board_id, title } => {
            retry
                .execute_with_retry("update_board_title", || {
                    service.update_board_title(ctx, &board_id, &title)
                })
                .await?;
        }
    }
    Ok(())
}

async fn card_command(app: &App, ctx: &str, command: CardCommand) -> Result<(), CliError> {
    app.load(ctx).await?;
    let service = &app.service;
    let retry = &app.resilience;
    match command {
        CardCommand::Add { board_id, title } => {
            let card = retry
                .execute_with_retry("create_card", || service.create_card(ctx, &board_id, &title))
                .await?;
            println!("{}", card.id);
        }
        CardCommand::Rm { card_id } => {
            retry
                .execute_with_retry("delete_card", || service.delete_card(ctx, &card_id))
                .await?;
        }
        CardCommand::Mv {
            card_id,
            board_id,
            order,
        } => {
            let card = retry
                .execute_with_retry("move_card", || {
                    service.move_card(ctx, &card_id, &board_id, order)
                })
                .await?;
            println!("{} -> {}[{}]", card.id, card.board_id, card.order);
        }
        CardCommand::Rename { card_id, title } => {
            retry
                .execute_with_retry("update_card_title", || {
                    service.update_card_title(ctx, &card_id, &title)
                })
                .await?;
        }
        CardCommand::Describe {
            card_id,
            description,
        } => {
            retry
                .execute_with_retry("update_card_description", || {
                    service.update_card_description(ctx, &card_id, &description)
                })
                .await?;
        }
    }
    Ok(())
}

async fn backup_command(app: &App, ctx: &str, command: BackupCommand) -> Result<(), CliError> {
    match command {
        BackupCommand::Create { output } => {
            let snapshot = app.backups.create_backup(ctx).await?;
            write_output(output.as_deref(), &snapshot)?;
        }
        BackupCommand::Restore { input } => {
            let snapshot = read_file(&input)?;
            let set = app.backups.restore_backup(ctx, &snapshot).await?;
            print_set(&set);
        }
        BackupCommand::Store => {
            let key = app
                .resilience
                .execute_with_retry("store_backup", || app.backups.store_backup(ctx))
                .await?;
            println!("{}", key);
        }
        BackupCommand::List => {
            for entry in app.recovery.available_backups(ctx).await? {
                println!(
                    "{}  {:<10}  {}  {} board(s), {} card(s)  {}",
                    entry.taken_at.format("%Y-%m-%d %H:%M:%S"),
                    format!("{:?}", entry.kind),
                    &entry.digest[..12],
                    entry.data.boards.len(),
                    entry.data.card_count(),
                    entry.key
                );
            }
        }
        BackupCommand::RestoreAt { at } => {
            let at = parse_time(&at)?;
            let set = app.recovery.restore_from_backup(ctx, at).await?;
            print_set(&set);
        }
        BackupCommand::Cleanup { keep_days } => {
            let removed = app.recovery.cleanup_old_backups(ctx, keep_days).await?;
            println!("Removed {} backup(s)", removed);
        }
    }
    Ok(())
}

/// Check a data file, or the context's stored data, and describe the outcome.
async fn validate_report(app: &App, ctx: &str, input: Option<&Path>) -> Result<String, CliError> {
    let text = match input {
        Some(path) => read_file(path)?,
        None => {
            let stored = app
                .service
                .store()
                .get(&data_key(ctx))
                .await
                .map_err(|e| KanbanError::StorageFailure {
                    operation: "validate",
                    context: ctx.to_string(),
                    source: e,
                })?;
            match stored.filter(|text| !text.trim().is_empty()) {
                Some(text) => text,
                None => return Ok(format!("no data stored for '{}'", ctx)),
            }
        }
    };
    let ingested = app.recovery.validate_and_repair(ctx, &text)?;
    Ok(match ingested.repair {
        None => "valid".to_string(),
        Some(report) => format!(
            "repaired: {:?}\n{}",
            report,
            serde_json::to_string_pretty(&ingested.set)?
        ),
    })
}

fn parse_time(text: &str) -> Result<DateTime<Utc>, CliError> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| parse_stamp(text))
        .ok_or_else(|| CliError::InvalidTimestamp(text.to_string()))
}

fn read_file(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_output(path: Option<&Path>, content: &str) -> Result<(), CliError> {
    match path {
        Some(path) => fs::write(path, content).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        }),
        None => {
            println!("{}", content);
            Ok(())
        }
    }
}

fn print_set(set: &BoardSet) {
    println!(
        "{} ({} board(s), {} card(s))",
        set.context,
        set.boards.len(),
        set.card_count()
    );
    for board in &set.boards {
        println!("[{}] {}  ({})", board.order, board.title, board.id);
        for card in &board.cards {
            println!("    [{}] {}  ({})", card.order, card.title, card.id);
            if !card.description.is_empty() {
                println!("        {}", card.description);
            }
        }
    }
}
