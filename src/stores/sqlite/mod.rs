//! Contains the SQLite backed implementations of the store traits.

pub mod category;
pub mod ledger;
pub mod recurring_transaction;

pub use category::SQLiteCategoryStore;
pub use ledger::SQLiteLedgerStore;
pub use recurring_transaction::SQLiteRecurringTransactionStore;

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{Error, db::initialize};

/// Creates the SQLite backed stores sharing `db_connection`.
///
/// This function will modify the database by adding the tables for the domain
/// models to the database if they do not exist yet.
pub fn create_stores(
    db_connection: Connection,
) -> Result<
    (
        SQLiteRecurringTransactionStore,
        SQLiteLedgerStore,
        SQLiteCategoryStore,
    ),
    Error,
> {
    initialize(&db_connection)?;

    let connection = Arc::new(Mutex::new(db_connection));

    Ok((
        SQLiteRecurringTransactionStore::new(connection.clone()),
        SQLiteLedgerStore::new(connection.clone()),
        SQLiteCategoryStore::new(connection),
    ))
}
