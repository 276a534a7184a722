use clap::Parser;
use miette::{IntoDiagnostic, Result};
use splitledger::application::ledger::LedgerService;
use splitledger::domain::money::Scale;
use splitledger::infrastructure::in_memory::{
    InMemoryExpenseStore, InMemoryLedgerStore, InMemoryUserDirectory,
};
use splitledger::interfaces::csv::balance_writer::BalanceWriter;
use splitledger::interfaces::csv::command_reader::CommandReader;
use splitledger::interfaces::csv::command_runner::CommandRunner;
use splitledger::telemetry::{self, LogFormat};
use std::fs::File;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input commands CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Number of decimal places of the currency
    #[arg(long, env = "SPLITLEDGER_SCALE", default_value_t = 2)]
    scale: u32,

    /// Log output format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn in_memory_service() -> LedgerService {
    LedgerService::new(
        Box::new(InMemoryLedgerStore::new()),
        Box::new(InMemoryExpenseStore::new()),
        Box::new(InMemoryUserDirectory::new()),
    )
}

#[cfg(feature = "storage-rocksdb")]
fn build_service(db_path: Option<PathBuf>) -> Result<LedgerService> {
    use splitledger::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => {
            let store = RocksDBStore::open(path).into_diagnostic()?;
            Ok(LedgerService::new(
                Box::new(store.clone()),
                Box::new(store.clone()),
                Box::new(store),
            ))
        }
        None => Ok(in_memory_service()),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn build_service(db_path: Option<PathBuf>) -> Result<LedgerService> {
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(in_memory_service())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.log_format);

    let scale = Scale::new(cli.scale).into_diagnostic()?;
    let mut runner = CommandRunner::new(build_service(cli.db_path)?, scale);

    let file = File::open(cli.input).into_diagnostic()?;
    for command in CommandReader::new(file).commands() {
        match command {
            Ok(command) => {
                if let Err(e) = runner.apply(command).await {
                    eprintln!("Error processing command: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }

    let balances = runner.into_balances().await.into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = BalanceWriter::new(stdout.lock(), scale);
    writer.write_balances(balances).into_diagnostic()?;

    Ok(())
}
