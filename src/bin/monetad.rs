use std::{fs::OpenOptions, sync::Arc};

use clap::Parser;
use rusqlite::Connection;
use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use moneta::{
    DueTransactionProcessor, LogNotifier, Scheduler, SchedulerConfig, SystemClock,
    stores::sqlite::create_stores, wait_for_shutdown_signal,
};

/// The recurring-transaction scheduling daemon for moneta.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The canonical timezone (e.g. "Pacific/Auckland") job times are
    /// expressed in.
    #[arg(long, default_value = "UTC")]
    timezone: String,
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    let conn = Connection::open(&args.db_path).expect("Could not open the application database");
    let (recurring_store, ledger_store, _category_store) =
        create_stores(conn).expect("Could not initialize the application database");

    let notifier = LogNotifier;
    let clock = SystemClock;
    let processor =
        DueTransactionProcessor::new(recurring_store, ledger_store, notifier, clock);

    let config = SchedulerConfig {
        timezone: args.timezone,
        ..Default::default()
    };
    let scheduler = Scheduler::new(processor, notifier, clock, config)
        .expect("Could not create the scheduler");

    scheduler.start();
    tracing::info!("scheduler started, press ctrl+c to stop");

    wait_for_shutdown_signal().await;

    scheduler.stop();
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .expect("Could not create log file");

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
        .init();
}
