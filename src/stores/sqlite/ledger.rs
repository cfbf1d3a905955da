//! Implements a SQLite backed ledger store.

use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OptionalExtension, Row};

use crate::{
    Error,
    db::{CreateTable, MapRow},
    models::{DatabaseID, LedgerEntry, LedgerEntryBuilder, UserID},
    stores::LedgerStore,
};

/// Stores ledger entries in a SQLite database.
///
/// Note that because a ledger entry depends on the
/// [Category](crate::models::Category) and
/// [RecurringTransaction](crate::models::RecurringTransaction) models, these
/// models must be set up in the database.
#[derive(Debug, Clone)]
pub struct SQLiteLedgerStore {
    connection: Arc<Mutex<Connection>>,
}

impl SQLiteLedgerStore {
    /// Create a new store for the SQLite `connection`.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }
}

const LEDGER_ENTRY_COLUMNS: &str = "id, user_id, kind, amount, date, description, category_id, \
     recurring_transaction_id, occurrence";

impl LedgerStore for SQLiteLedgerStore {
    /// Create a new ledger entry in the database.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::InvalidCategory] if the builder's category does not refer to
    ///   a valid category,
    /// - [Error::DuplicateOccurrence] if an entry with the builder's origin
    ///   key already exists,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn create(&mut self, builder: LedgerEntryBuilder) -> Result<LedgerEntry, Error> {
        let entry = self
            .connection
            .lock()
            .unwrap()
            .prepare(&format!(
                "INSERT INTO ledger_entry (user_id, kind, amount, date, description, category_id, \
                 recurring_transaction_id, occurrence)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 RETURNING {LEDGER_ENTRY_COLUMNS}"
            ))?
            .query_row(
                (
                    builder.user_id.as_i64(),
                    builder.kind,
                    builder.amount,
                    builder.date,
                    builder.description,
                    builder.category_id,
                    builder.origin.map(|(recurring_id, _)| recurring_id),
                    builder.origin.map(|(_, occurrence)| occurrence),
                ),
                Self::map_row,
            )?;

        Ok(entry)
    }

    /// Retrieve a ledger entry in the database by its `id`.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if `id` does not refer to a valid ledger entry,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn get(&self, id: DatabaseID) -> Result<LedgerEntry, Error> {
        let entry = self
            .connection
            .lock()
            .unwrap()
            .prepare(&format!(
                "SELECT {LEDGER_ENTRY_COLUMNS} FROM ledger_entry WHERE id = :id"
            ))?
            .query_row(&[(":id", &id)], Self::map_row)?;

        Ok(entry)
    }

    /// Retrieve the ledger entries owned by `user_id`, most recent first.
    ///
    /// # Errors
    /// This function will return an [Error::SqlError] if there is an SQL
    /// error.
    fn get_by_user(&self, user_id: UserID) -> Result<Vec<LedgerEntry>, Error> {
        self.connection
            .lock()
            .unwrap()
            .prepare(&format!(
                "SELECT {LEDGER_ENTRY_COLUMNS} FROM ledger_entry
                 WHERE user_id = :user_id
                 ORDER BY date DESC, id DESC"
            ))?
            .query_map(&[(":user_id", &user_id.as_i64())], Self::map_row)?
            .map(|maybe_entry| maybe_entry.map_err(Error::from))
            .collect()
    }

    /// Retrieve the entry materialized from `occurrence` of the recurring
    /// transaction `recurring_transaction_id`, if one exists.
    ///
    /// # Errors
    /// This function will return an [Error::SqlError] if there is an SQL
    /// error.
    fn get_by_origin(
        &self,
        recurring_transaction_id: DatabaseID,
        occurrence: u32,
    ) -> Result<Option<LedgerEntry>, Error> {
        let entry = self
            .connection
            .lock()
            .unwrap()
            .prepare(&format!(
                "SELECT {LEDGER_ENTRY_COLUMNS} FROM ledger_entry
                 WHERE recurring_transaction_id = ?1 AND occurrence = ?2"
            ))?
            .query_row((recurring_transaction_id, occurrence), Self::map_row)
            .optional()?;

        Ok(entry)
    }

    /// Delete a ledger entry in the database by its `id`.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if `id` does not refer to a valid ledger entry,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn delete(&mut self, id: DatabaseID) -> Result<(), Error> {
        let rows_deleted = self
            .connection
            .lock()
            .unwrap()
            .execute("DELETE FROM ledger_entry WHERE id = ?1", (id,))?;

        if rows_deleted == 0 {
            return Err(Error::NotFound);
        }

        Ok(())
    }
}

impl CreateTable for SQLiteLedgerStore {
    fn create_table(connection: &Connection) -> Result<(), rusqlite::Error> {
        connection.execute(
            "CREATE TABLE IF NOT EXISTS ledger_entry (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL,
                    kind INTEGER NOT NULL,
                    amount REAL NOT NULL,
                    date TEXT NOT NULL,
                    description TEXT NOT NULL,
                    category_id INTEGER,
                    recurring_transaction_id INTEGER,
                    occurrence INTEGER,
                    FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE SET NULL,
                    FOREIGN KEY(recurring_transaction_id) REFERENCES recurring_transaction(id) ON UPDATE CASCADE ON DELETE SET NULL,
                    UNIQUE(recurring_transaction_id, occurrence)
                    )",
            (),
        )?;

        Ok(())
    }
}

impl MapRow for SQLiteLedgerStore {
    type ReturnType = LedgerEntry;

    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self::ReturnType, rusqlite::Error> {
        let raw_user_id: i64 = row.get(offset + 1)?;

        Ok(LedgerEntry {
            id: row.get(offset)?,
            user_id: UserID::new(raw_user_id),
            kind: row.get(offset + 2)?,
            amount: row.get(offset + 3)?,
            date: row.get(offset + 4)?,
            description: row.get(offset + 5)?,
            category_id: row.get(offset + 6)?,
            recurring_transaction_id: row.get(offset + 7)?,
            occurrence: row.get(offset + 8)?,
        })
    }
}
