use std::io::Write;

use clap::{Arg, Command};
use kvconf::{load_file, Lookup, Store};
use tokio::time::{timeout, Duration};
use tracing::{debug, error};

fn parse_level(level: &str) -> tracing::Level {
    match level.to_uppercase().as_str() {
        "DEBUG" => tracing::Level::DEBUG,
        "INFO" => tracing::Level::INFO,
        "WARN" => tracing::Level::WARN,
        "ERROR" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

// Loading is blocking file I/O; with a deadline it runs on the blocking pool
// and the result is discarded if the deadline passes first.
async fn load(path: String, limit: Option<u64>) -> Result<Store, Box<dyn std::error::Error>> {
    let Some(secs) = limit else {
        return Ok(load_file(&path)?);
    };
    let task = tokio::task::spawn_blocking(move || load_file(&path));
    match timeout(Duration::from_secs(secs), task).await {
        Ok(joined) => Ok(joined??),
        Err(_) => Err(format!("Loading config timed out after {} seconds", secs).into()),
    }
}

fn dump(store: &Store, out: &mut impl Write) -> std::io::Result<()> {
    for entry in store {
        out.write_all(entry.name)?;
        if let Some(value) = entry.value {
            out.write_all(b"=")?;
            out.write_all(value)?;
        }
        out.write_all(b"\n")?;
    }
    Ok(())
}

// Returns how many keys were not found.
fn print_keys<'k>(
    store: &Store,
    keys: impl Iterator<Item = &'k String>,
    out: &mut impl Write,
) -> std::io::Result<usize> {
    let mut missing = 0;
    for key in keys {
        match store.get(key) {
            Lookup::Found(value) => {
                out.write_all(value)?;
                out.write_all(b"\n")?;
            }
            Lookup::NoValue => out.write_all(b"\n")?,
            Lookup::NotFound => {
                eprintln!("ERROR key not found: {}", key);
                missing += 1;
            }
        }
    }
    Ok(missing)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = Command::new("kvconf-get")
        .about("Look up values in a name=value config file")
        .arg(
            Arg::new("config")
                .help("Path to config file")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("keys")
                .help("Names to look up")
                .num_args(0..)
                .index(2),
        )
        .arg(
            Arg::new("dump")
                .long("dump")
                .help("Print every entry in file order")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("timeout-secs")
                .long("timeout-secs")
                .help("Give up if loading takes longer than this")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .help("DEBUG, INFO, WARN or ERROR")
                .default_value("WARN"),
        )
        .get_matches();

    let log_level = matches
        .get_one::<String>("log-level")
        .map_or("WARN", |s| s.as_str());
    tracing_subscriber::fmt()
        .with_max_level(parse_level(log_level))
        .with_writer(std::io::stderr)
        .init();

    let Some(config_path) = matches.get_one::<String>("config").cloned() else {
        eprintln!("Usage: kvconf-get <config_file> [KEY ...]");
        std::process::exit(1);
    };
    let limit = matches.get_one::<u64>("timeout-secs").copied();

    let store = match load(config_path.clone(), limit).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to load {}: {}", config_path, e);
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };
    debug!("Loaded {} entries from {}", store.len(), config_path);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if matches.get_flag("dump") {
        dump(&store, &mut out)?;
    }
    let keys = matches.get_many::<String>("keys").into_iter().flatten();
    let missing = print_keys(&store, keys, &mut out)?;
    out.flush()?;
    drop(out);
    store.close();

    if missing > 0 {
        std::process::exit(1);
    }
    Ok(())
}
