//! kvtrace CLI - drive an instrumented cache over a SQLite file.
//!
//! Every command except `demo` and `reset` attaches to the database without
//! flushing it, so history accumulates across invocations.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use kvtrace::{
    config::default_db_path, replay, BackendHandle, Cache, KeyspaceConfig, SqliteBackend,
    SqliteBackendConfig, StoredValue,
};
use std::path::PathBuf;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "kvtrace")]
#[command(about = "Instrumented key-value cache with call history replay")]
struct Args {
    /// SQLite database file (defaults to the user data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reset the database, store three sample values, and replay
    Demo,
    /// Store a value and print its key
    Store {
        value: String,
        /// How to interpret the value
        #[arg(long, value_enum, default_value_t = ValueKind::Text)]
        kind: ValueKind,
    },
    /// Print the value stored under a key
    Get {
        key: String,
        /// How to decode the stored value
        #[arg(long = "as", value_enum, default_value_t = Decoding::Text)]
        decoding: Decoding,
    },
    /// Print the recorded call history of the store operation
    Replay,
    /// Print the call history as text or JSON
    History {
        #[arg(long)]
        json: bool,
    },
    /// Flush every key from the database
    Reset,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ValueKind {
    Text,
    Int,
    Float,
    Bytes,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Decoding {
    Raw,
    Text,
    Int,
    Float,
}

fn parse_value(raw: &str, kind: ValueKind) -> Result<StoredValue> {
    Ok(match kind {
        ValueKind::Text => StoredValue::from(raw),
        ValueKind::Bytes => StoredValue::from(raw.as_bytes()),
        ValueKind::Int => StoredValue::from(
            raw.parse::<i64>()
                .with_context(|| format!("'{}' is not an integer", raw))?,
        ),
        ValueKind::Float => StoredValue::from(
            raw.parse::<f64>()
                .with_context(|| format!("'{}' is not a number", raw))?,
        ),
    })
}

fn open_backend(db: Option<PathBuf>) -> Result<BackendHandle> {
    let path = db.unwrap_or_else(default_db_path);
    info!("Database: {}", path.display());

    let backend = SqliteBackend::open(SqliteBackendConfig::at(&path))
        .with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(BackendHandle::connected(backend))
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let backend = open_backend(args.db)?;

    match args.command {
        Command::Demo => {
            let cache = Cache::new(backend)?;
            for value in [
                StoredValue::from("Hello"),
                StoredValue::from(98),
                StoredValue::from(b"bytes"),
            ] {
                let key = cache.store(value)?;
                println!("{}", key);
            }
            replay(Some(&cache.store_operation()));
        }
        Command::Store { value, kind } => {
            let cache = Cache::attach(backend);
            let key = cache.store(parse_value(&value, kind)?)?;
            debug!("Stored {:?} value", kind);
            println!("{}", key);
        }
        Command::Get { key, decoding } => {
            let cache = Cache::attach(backend);
            match decoding {
                Decoding::Raw => match cache.retrieve(&key)? {
                    Some(raw) => println!("{:?}", raw),
                    None => anyhow::bail!("No value stored at {}", key),
                },
                Decoding::Text => println!("{}", cache.retrieve_as_text(&key)?),
                Decoding::Int => println!("{}", cache.retrieve_as_integer(&key)?),
                Decoding::Float => println!("{}", cache.retrieve_as_float(&key)?),
            }
        }
        Command::Replay => {
            let cache = Cache::attach(backend);
            replay(Some(&cache.store_operation()));
        }
        Command::History { json } => {
            let cache = Cache::attach(backend);
            let history = cache.call_history(KeyspaceConfig::STORE_OPERATION)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&history)?);
            } else {
                print!("{}", history);
                if history.unmatched_inputs() > 0 {
                    println!("({} call(s) without recorded output)", history.unmatched_inputs());
                }
            }
        }
        Command::Reset => {
            Cache::attach(backend).reset()?;
            info!("Database reset");
        }
    }

    Ok(())
}
