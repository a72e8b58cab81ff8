// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;

// Use library instead of local modules
use tracker_catalog::config::{Config, DEFAULT_CONFIG_PATH};
use tracker_catalog::{
    approval, collision_report, db, import, logging, setup_database, stats, ExodusClient,
    ReconciliationEngine, TrackerExport, User,
};

#[derive(Parser)]
#[command(name = "tracker-catalog", version, about = "Curate a catalogue of mobile app trackers")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH, env = "CATALOG_CONFIG")]
    config: PathBuf,

    /// Catalog database, overrides the configuration file
    #[arg(long, global = true, env = "CATALOG_DATABASE")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compare published trackers with the Exodus dataset
    CompareWithExodus {
        /// Exodus instance to query
        #[arg(short = 'e', long)]
        exodus_hostname: Option<String>,

        /// Do not print field differences
        #[arg(short, long)]
        quiet: bool,

        /// Field left out of the comparison
        #[arg(short, long)]
        ignore_field: Option<String>,
    },

    /// Fill an empty catalog from an Exodus document (URL or file)
    ImportTrackers {
        #[arg(default_value = import::DEFAULT_SOURCE)]
        source: String,
    },

    /// Create the default categories
    ImportCategories,

    /// Print the public export document
    Export,

    /// Print catalog statistics
    Stats,

    /// List trackers whose signatures match other trackers
    Collisions,

    /// Approve a tracker
    Approve {
        id: String,
        #[arg(long = "as")]
        user: String,
    },

    /// Withdraw an approval
    Revoke {
        id: String,
        #[arg(long = "as")]
        user: String,
    },

    /// Publish a tracker to Exodus
    Ship {
        id: String,
        #[arg(long = "as")]
        user: String,
    },

    /// Register a user
    AddUser {
        username: String,
        #[arg(long)]
        superuser: bool,
    },

    /// Browse the catalog in the terminal
    Browse,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    logging::init(&config.logging.filter);

    let db_path = cli.database.unwrap_or_else(|| config.database.path.clone());
    let conn = Connection::open(&db_path)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
    setup_database(&conn)?;

    match cli.command {
        Command::CompareWithExodus {
            exodus_hostname,
            quiet,
            ignore_field,
        } => {
            let hostname = exodus_hostname.unwrap_or(config.exodus.hostname);
            run_compare(&conn, &hostname, quiet, ignore_field)
        }
        Command::ImportTrackers { source } => run_import_trackers(&conn, &source),
        Command::ImportCategories => {
            import::import_categories(&conn, &mut io::stdout().lock())?;
            Ok(())
        }
        Command::Export => {
            let export = TrackerExport::from_trackers(&db::get_all_trackers(&conn)?);
            println!("{}", serde_json::to_string_pretty(&export)?);
            Ok(())
        }
        Command::Stats => {
            println!("{}", serde_json::to_string_pretty(&stats::stats_json(&conn)?)?);
            Ok(())
        }
        Command::Collisions => run_collisions(&conn),
        Command::Approve { id, user } => {
            let user = registered_user(&conn, &user)?;
            approval::record_approval(&conn, &id, &user)?;
            println!("✓ Approved by {} ({})", user.username, approval::classify(&conn, &id)?.as_str());
            Ok(())
        }
        Command::Revoke { id, user } => {
            let user = registered_user(&conn, &user)?;
            approval::revoke_approval(&conn, &id, &user)?;
            println!("✓ Approval revoked ({})", approval::classify(&conn, &id)?.as_str());
            Ok(())
        }
        Command::Ship { id, user } => {
            let user = registered_user(&conn, &user)?;
            approval::ship(&conn, &id, Some(&user))?;
            println!("✓ Tracker {} shipped to Exodus", id);
            Ok(())
        }
        Command::AddUser { username, superuser } => {
            let user = if superuser {
                User::superuser(&username)
            } else {
                User::new(&username)
            };
            db::insert_user(&conn, &user)?;
            println!("✓ User {} added", user.username);
            Ok(())
        }
        Command::Browse => run_ui_mode(&conn),
    }
}

fn registered_user(conn: &Connection, username: &str) -> Result<User> {
    match db::get_user_by_username(conn, username)? {
        Some(user) => Ok(user),
        None => bail!("Unknown user: {}", username),
    }
}

fn run_compare(
    conn: &Connection,
    hostname: &str,
    quiet: bool,
    ignore_field: Option<String>,
) -> Result<()> {
    let client = ExodusClient::new(hostname);
    info!(url = client.url(), "comparing with Exodus");

    let engine = ReconciliationEngine::new()
        .quiet(quiet)
        .ignore_field(ignore_field);

    let runtime = tokio::runtime::Runtime::new()?;
    let mut out = io::stdout().lock();
    runtime.block_on(engine.reconcile(&client, conn, &mut out))?;
    out.flush()?;

    Ok(())
}

fn run_import_trackers(conn: &Connection, source: &str) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    let dataset = runtime
        .block_on(import::load_dataset(source))
        .with_context(|| format!("Failed to load trackers from {}", source))?;

    let imported = import::import_trackers(conn, &dataset, &mut io::stdout().lock())?;
    println!("✓ Imported {} of {} trackers", imported, dataset.len());

    Ok(())
}

fn run_collisions(conn: &Connection) -> Result<()> {
    let report = collision_report(&db::get_trackers_by_name(conn)?);

    if report.is_empty() {
        println!("No signature collisions");
        return Ok(());
    }

    for entry in &report {
        println!("{}", entry.tracker_name);
        for other in &entry.collisions {
            println!("   {:?} → {}", other.kind, other.name);
        }
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(conn: &Connection) -> Result<()> {
    let trackers = db::get_trackers_by_name(conn)?;

    let mut entries = Vec::with_capacity(trackers.len());
    for tracker in &trackers {
        entries.push(ui::BrowseEntry {
            review: approval::classify(conn, &tracker.id)?,
            approvers: approval::approver_names(conn, &tracker.id)?,
            collides: tracker_catalog::collision::has_any_signature_collision(tracker, &trackers),
            tracker: tracker.clone(),
        });
    }

    let mut app = ui::App::new(entries, collision_report(&trackers));
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_conn: &Connection) -> Result<()> {
    bail!("TUI mode not available; rebuild with: cargo build --features tui")
}
