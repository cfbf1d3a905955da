//! Moneta is the scheduling engine of a personal finance backend: it keeps
//! track of recurring transactions (wages, rent, subscriptions), materializes
//! ledger entries when they come due, and runs the report jobs that notify
//! the owner.
//!
//! The engine is built around four pieces:
//!
//! - [models] and [stores]: the domain types and their SQLite backed stores.
//! - [schedule]: pure calendar arithmetic for computing due dates.
//! - [DueTransactionProcessor]: materializes ledger entries for due
//!   recurring transactions and advances their schedules.
//! - [Scheduler]: runs the processor and the report jobs on their
//!   configured timetables.

#![warn(missing_docs)]

mod clock;
mod error;
mod notify;
mod processor;
mod scheduler;
mod timezone;

pub mod db;
pub mod models;
pub mod schedule;
pub mod stores;

pub use clock::{Clock, SystemClock};
pub use error::Error;
pub use notify::{LogNotifier, NotificationKind, Notifier};
pub use processor::{
    DueTransactionProcessor, ProcessedOccurrence, ProcessingSummary, RECURRING_DESCRIPTION_SUFFIX,
};
pub use scheduler::{
    JobName, JobSchedule, JobStatus, Scheduler, SchedulerConfig, SchedulerStatus,
};
pub use timezone::local_offset;

use tokio::signal;

/// An async task that waits for either the ctrl+c or terminate signal,
/// whichever comes first.
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
        },
    }
}
