use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use guestlist_core::{ConfirmationStatus, GuestField, GuestId};
use guestlist_engine::{
    BoardConfig, CommitOutcome, FrameworkFilter, GuestBoard, GuestDraft, ListFilter, OverlapPolicy,
    ReseedPolicy, StatusFilter,
};
use guestlist_storage::{ImportOptions, SqliteStore, import_guests, parse_guest_csv};
use tracing::info;

#[derive(Parser)]
#[command(name = "guestlist", about = "Guest list RSVP tracking")]
struct Args {
    /// SQLite database holding the guests collection.
    #[arg(long, env = "GUESTLIST_DB", default_value = "guestlist.db")]
    db: PathBuf,

    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[arg(long, env = "JSON_LOGS", default_value_t = false)]
    json_logs: bool,

    /// `always` or `preserve_focused`.
    #[arg(long, env = "GUESTLIST_RESEED", default_value = "always")]
    reseed: ReseedPolicy,

    /// `latest_wins` or `reject`.
    #[arg(long, env = "GUESTLIST_OVERLAP", default_value = "latest_wins")]
    overlap: OverlapPolicy,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import guests from a sheet export (CSV).
    Import {
        file: PathBuf,
        #[arg(long, default_value_t = guestlist_storage::import::DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
    /// Clear the spoke flag and status of every guest.
    Reset,
    /// Print the sorted, filtered list.
    List {
        #[arg(long, default_value = "")]
        search: String,
        /// Status key or label, or "all".
        #[arg(long, default_value = "all")]
        status: String,
        #[arg(long, default_value = "all")]
        framework: String,
        /// Print counts instead of rows.
        #[arg(long)]
        stats: bool,
    },
    Add {
        #[arg(long)]
        name: String,
        /// Defaults to the next free row number.
        #[arg(long)]
        row: Option<i64>,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        age: String,
        #[arg(long, default_value = "")]
        gender: String,
        #[arg(long, default_value = "")]
        framework: String,
        #[arg(long, default_value = "")]
        responsibility: String,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Change one text field of a guest.
    Edit {
        id: GuestId,
        /// Document key, e.g. `name` or `handledBy`.
        field: String,
        value: String,
    },
    Status {
        id: GuestId,
        status: String,
    },
    Spoke {
        id: GuestId,
        #[arg(action = clap::ArgAction::Set)]
        value: bool,
    },
    Remove {
        id: GuestId,
    },
}

fn init_logging(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.json_logs);

    let db = args.db.to_str().context("database path is not valid UTF-8")?;
    let mut store =
        SqliteStore::open(db).with_context(|| format!("failed to open {}", args.db.display()))?;

    match args.command {
        Command::Import { file, batch_size } => import(&mut store, &file, batch_size),
        command => {
            let config = BoardConfig {
                reseed: args.reseed,
                overlap: args.overlap,
                ..BoardConfig::default()
            };
            run(&mut store, config, command)
        }
    }
}

fn import(store: &mut SqliteStore, file: &Path, batch_size: usize) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let parsed = parse_guest_csv(&content);
    let report = import_guests(store, &parsed.guests, &ImportOptions { batch_size })
        .context("import failed")?;
    info!(skipped = parsed.skipped, "import finished");
    println!(
        "imported {} guests in {} batches ({} lines skipped)",
        report.imported, report.batches, parsed.skipped
    );
    Ok(())
}

/// Commands that go through a live board attached to the store.
fn run(store: &mut SqliteStore, config: BoardConfig, command: Command) -> Result<()> {
    let mut board = GuestBoard::new(config);
    board.attach(store).context("failed to subscribe")?;
    board.pump(0);

    match command {
        Command::Import { .. } => bail!("import does not use the board"),
        Command::Reset => {
            let count = board.reset_all(store).context("reset failed")?;
            println!("reset {count} guests");
        }
        Command::List {
            search,
            status,
            framework,
            stats,
        } => {
            board.set_filter(ListFilter {
                search,
                status: StatusFilter::parse(&status)?,
                framework: FrameworkFilter::parse(&framework),
            });
            if stats {
                print_stats(&board);
            } else {
                print_rows(&board);
            }
        }
        Command::Add {
            name,
            row,
            phone,
            age,
            gender,
            framework,
            responsibility,
            notes,
        } => {
            let draft = GuestDraft {
                row_number: row,
                name,
                phone,
                age,
                gender,
                framework,
                responsibility,
                notes,
            };
            let id = board.add_guest(store, &draft)?;
            println!("{id}");
        }
        Command::Edit { id, field, value } => {
            let field = GuestField::from_key(&field)?;
            board.edit(id, field, value)?;
            let outcome = board.blur(store, id, field, 0)?;
            report(&board, id, outcome)?;
        }
        Command::Status { id, status } => {
            let status = ConfirmationStatus::parse(&status)?;
            let outcome = board.set_status(store, id, status, 0)?;
            report(&board, id, outcome)?;
        }
        Command::Spoke { id, value } => {
            let outcome = board.set_already_spoke(store, id, value, 0)?;
            report(&board, id, outcome)?;
        }
        Command::Remove { id } => {
            board.delete_guest(store, id)?;
            println!("removed {id}");
        }
    }

    board.detach(store);
    Ok(())
}

fn report(board: &GuestBoard, id: GuestId, outcome: CommitOutcome) -> Result<()> {
    match outcome {
        CommitOutcome::Skipped => println!("unchanged"),
        CommitOutcome::Saved => println!("saved"),
        CommitOutcome::Failed | CommitOutcome::Detached => {
            let state = board.row(id).map(|row| row.save_state());
            bail!("write for {id} did not go through (state: {state:?})");
        }
    }
    Ok(())
}

fn print_rows(board: &GuestBoard) {
    for record in board.view().visible_records() {
        println!(
            "{:>4}  {:<24} {:<12} {:<10} {:<12} {:<1} {}",
            record.row_number,
            record.name,
            record.phone,
            record.framework,
            record.confirmation_status.label(),
            if record.already_spoke { "*" } else { "" },
            record.id,
        );
    }
    println!("{} of {} guests", board.view().shown(), board.view().total());
}

fn print_stats(board: &GuestBoard) {
    let stats = board.stats();
    println!("total: {}", stats.total);
    for status in ConfirmationStatus::ALL {
        println!("{}: {}", status.label(), stats.by_status(status));
    }
    println!("spoke: {}", stats.spoke);
}
