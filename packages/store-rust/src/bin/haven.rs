//! haven: inspect, export and import the data of a Haven installation.
//!
//! # Usage
//!
//! ```text
//! haven --data-dir ~/.local/share/haven export --output backup.json
//! haven --data-dir ~/.local/share/haven list moodLogs
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use haven_core::{Collection, ExportSnapshot, RecordKey};
use haven_store::{
    export_snapshot, import_snapshot, RecordStore, Settings, StorageBackend, StoreConfig,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "haven", about = "Haven local data tool")]
struct Cli {
    /// Directory holding the record database and settings file.
    #[arg(long, global = true, env = "HAVEN_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Use empty, throwaway storage instead of a data directory. Wins over
    /// `--data-dir` and `HAVEN_DATA_DIR`.
    #[arg(long, global = true)]
    in_memory: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write every record and settings list as one JSON document.
    Export {
        /// Output file. Defaults to stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Load an export document, replacing records with the same keys.
    Import { file: PathBuf },
    /// Print every key of a collection.
    Keys { collection: Collection },
    /// Print every record of a collection.
    List { collection: Collection },
    /// Print one record.
    Get { collection: Collection, key: String },
    /// Delete one record.
    Delete { collection: Collection, key: String },
}

impl Cli {
    fn store_config(&self) -> StoreConfig {
        let mut config = StoreConfig::from_env();
        if self.in_memory {
            config.backend = StorageBackend::InMemory;
        } else if let Some(dir) = &self.data_dir {
            config.backend = StorageBackend::Directory(dir.clone());
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,haven=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.store_config();
    match &config.backend {
        StorageBackend::InMemory => info!("using in-memory storage"),
        StorageBackend::Directory(dir) => info!(data_dir = %dir.display(), "using data directory"),
    }

    let store = RecordStore::new(&config);
    let settings = Settings::open(&config)?;

    match cli.command {
        Command::Export { output } => {
            let snapshot = export_snapshot(&store, &settings).await?;
            let json = serde_json::to_string_pretty(&snapshot)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("writing {}", path.display()))?;
                    info!(path = %path.display(), records = snapshot.record_count(), "export written");
                }
                None => println!("{json}"),
            }
        }
        Command::Import { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let snapshot: ExportSnapshot =
                serde_json::from_str(&raw).context("parsing export document")?;
            let summary = import_snapshot(&store, &settings, &snapshot).await?;
            println!("imported {} records", summary.records);
        }
        Command::Keys { collection } => {
            let mut keys = store.get_all_keys_raw(collection).await?;
            keys.sort();
            for key in keys {
                println!("{key}");
            }
        }
        Command::List { collection } => {
            let records = store.get_all_raw(collection).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Command::Get { collection, key } => {
            let key = parse_key(collection, &key)?;
            match store.get_raw(collection, &key).await? {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => bail!("no {collection} record under `{key}`"),
            }
        }
        Command::Delete { collection, key } => {
            let key = parse_key(collection, &key)?;
            if store.delete_raw(collection, &key).await? {
                println!("deleted {collection}/{key}");
            } else {
                println!("{collection}/{key} was not present");
            }
        }
    }
    Ok(())
}

fn parse_key(collection: Collection, raw: &str) -> anyhow::Result<RecordKey> {
    match RecordKey::parse_for(collection, raw) {
        Some(key) => Ok(key),
        None => bail!("`{raw}` is not a valid {} key", collection.key_field()),
    }
}
