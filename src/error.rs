//! Defines the crate-level error type shared by the stores, the
//! due-transaction processor, and the scheduler.

use time::Date;

use crate::models::DatabaseID;

/// The errors that may occur in the recurring-transaction engine.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A zero, negative, or non-finite amount was used to create a
    /// transaction.
    #[error("{0} is not a valid amount, amounts must be positive")]
    InvalidAmount(f64),

    /// An empty string was used as a transaction description.
    #[error("transaction descriptions must not be empty")]
    EmptyDescription,

    /// A day-of-month anchor outside 1-31 was given.
    #[error("{0} is not a valid day of the month, expected a value in 1-31")]
    InvalidDayOfMonth(u8),

    /// A day-of-week anchor outside 0-6 was given (0 is Sunday).
    #[error("{0} is not a valid day of the week, expected a value in 0-6")]
    InvalidDayOfWeek(u8),

    /// A month-of-year anchor outside 1-12 was given.
    #[error("{0} is not a valid month, expected a value in 1-12")]
    InvalidMonthOfYear(u8),

    /// An end date on or before the start date was used to create or update a
    /// recurring transaction.
    #[error("the end date {end} is not after the start date {start}")]
    EndDateNotAfterStart {
        /// The start date of the recurring transaction.
        start: Date,
        /// The offending end date.
        end: Date,
    },

    /// An integer column held a value that is not a known frequency code.
    #[error("{0} is not a valid frequency code")]
    InvalidFrequency(i64),

    /// An integer column held a value that is not a known transaction kind
    /// code.
    #[error("{0} is not a valid transaction kind code")]
    InvalidTransactionKind(i64),

    /// The category ID attached to a transaction did not refer to a valid
    /// category.
    #[error("the category ID does not refer to a valid category")]
    InvalidCategory,

    /// The requested row could not be found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// A schedule advance raced another processing run: the row's
    /// `next_due_date` no longer matches the value the run started from.
    ///
    /// The row is left unchanged and will be picked up again on the next run.
    #[error("recurring transaction {0} was modified by a concurrent run")]
    ScheduleConflict(DatabaseID),

    /// A ledger entry for this (recurring transaction, occurrence) pair
    /// already exists.
    ///
    /// The unique origin index rejects duplicate materializations of the same
    /// occurrence, e.g. from two overlapping processing runs.
    #[error("a ledger entry for this recurring occurrence already exists")]
    DuplicateOccurrence,

    /// A timezone name could not be resolved to a canonical timezone.
    #[error("invalid timezone {0}")]
    InvalidTimezone(String),

    /// The downstream notification sink rejected a notification.
    ///
    /// Notification delivery is fire-and-forget: callers log this error and
    /// carry on, it never rolls back ledger or recurring-transaction state.
    #[error("could not deliver notification: {0}")]
    NotificationFailure(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 787 occurs when a FOREIGN KEY constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(_))
                if sql_error.extended_code == 787 =>
            {
                Error::InvalidCategory
            }
            // Code 2067 occurs when a UNIQUE constraint failed. The only
            // unique index in the schema is the ledger entry origin key.
            rusqlite::Error::SqliteFailure(sql_error, Some(_))
                if sql_error.extended_code == 2067 =>
            {
                Error::DuplicateOccurrence
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}
