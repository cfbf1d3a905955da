//! Implements a SQLite backed recurring transaction store.

use std::sync::{Arc, Mutex};

use rusqlite::{Connection, Row};
use time::Date;

use crate::{
    Error,
    db::{CreateTable, MapRow},
    models::{
        DatabaseID, RecurringTransaction, RecurringTransactionBuilder, UserID, check_amount,
        check_day_of_month, check_day_of_week, check_month_of_year,
    },
    schedule,
    stores::{RecurringTransactionStore, RecurringTransactionUpdate, ScheduleAdvance},
};

/// Stores recurring transactions in a SQLite database.
///
/// Note that because a recurring transaction depends on the
/// [Category](crate::models::Category) model, that model must be set up in
/// the database.
#[derive(Debug, Clone)]
pub struct SQLiteRecurringTransactionStore {
    connection: Arc<Mutex<Connection>>,
}

impl SQLiteRecurringTransactionStore {
    /// Create a new store for the SQLite `connection`.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }

    fn get_with_connection(
        connection: &Connection,
        id: DatabaseID,
    ) -> Result<RecurringTransaction, Error> {
        let transaction = connection
            .prepare(&format!(
                "SELECT {RECURRING_TRANSACTION_COLUMNS} FROM recurring_transaction WHERE id = :id"
            ))?
            .query_row(&[(":id", &id)], Self::map_row)?;

        Ok(transaction)
    }
}

const RECURRING_TRANSACTION_COLUMNS: &str =
    "id, user_id, kind, amount, description, category_id, frequency, day_of_month, day_of_week, \
     month_of_year, start_date, end_date, next_due_date, total_occurrences, \
     current_occurrences, is_active, last_processed";

impl RecurringTransactionStore for SQLiteRecurringTransactionStore {
    /// Create a new recurring transaction in the database.
    ///
    /// The stored `next_due_date` is set to the builder's start date so the
    /// first occurrence lands exactly on the start date.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::InvalidCategory] if the builder's category does not refer to
    ///   a valid category,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn create(
        &mut self,
        builder: RecurringTransactionBuilder,
    ) -> Result<RecurringTransaction, Error> {
        let transaction = self
            .connection
            .lock()
            .unwrap()
            .prepare(&format!(
                "INSERT INTO recurring_transaction (user_id, kind, amount, description, \
                 category_id, frequency, day_of_month, day_of_week, month_of_year, start_date, \
                 end_date, next_due_date, total_occurrences)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 RETURNING {RECURRING_TRANSACTION_COLUMNS}"
            ))?
            .query_row(
                (
                    builder.user_id.as_i64(),
                    builder.kind,
                    builder.amount,
                    builder.description,
                    builder.category_id,
                    builder.frequency,
                    builder.day_of_month,
                    builder.day_of_week,
                    builder.month_of_year,
                    builder.start_date,
                    builder.end_date,
                    // The schedule cursor starts on the start date.
                    builder.start_date,
                    builder.total_occurrences,
                ),
                Self::map_row,
            )?;

        Ok(transaction)
    }

    /// Retrieve a recurring transaction in the database by its `id`.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if `id` does not refer to a valid recurring
    ///   transaction,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn get(&self, id: DatabaseID) -> Result<RecurringTransaction, Error> {
        Self::get_with_connection(&self.connection.lock().unwrap(), id)
    }

    /// Retrieve the recurring transactions owned by `user_id`.
    ///
    /// # Errors
    /// This function will return an [Error::SqlError] if there is an SQL
    /// error.
    fn get_by_user(&self, user_id: UserID) -> Result<Vec<RecurringTransaction>, Error> {
        self.connection
            .lock()
            .unwrap()
            .prepare(&format!(
                "SELECT {RECURRING_TRANSACTION_COLUMNS} FROM recurring_transaction
                 WHERE user_id = :user_id"
            ))?
            .query_map(&[(":user_id", &user_id.as_i64())], Self::map_row)?
            .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
            .collect()
    }

    /// Retrieve the active recurring transactions due on or before `as_of`,
    /// most overdue first.
    ///
    /// Dates are stored as ISO 8601 text, so the comparison and ordering are
    /// chronological.
    ///
    /// # Errors
    /// This function will return an [Error::SqlError] if there is an SQL
    /// error.
    fn get_due(&self, as_of: Date) -> Result<Vec<RecurringTransaction>, Error> {
        self.connection
            .lock()
            .unwrap()
            .prepare(&format!(
                "SELECT {RECURRING_TRANSACTION_COLUMNS} FROM recurring_transaction
                 WHERE is_active = 1 AND next_due_date <= :as_of
                 ORDER BY next_due_date ASC"
            ))?
            .query_map(&[(":as_of", &as_of)], Self::map_row)?
            .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
            .collect()
    }

    /// Apply `update` to the recurring transaction `id`.
    ///
    /// When the update changes a scheduling anchor of an active row, the
    /// stored `next_due_date` is recomputed from the current one under the
    /// new schedule. Inactive rows keep their due date as-is.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if `id` does not refer to a valid recurring
    ///   transaction,
    /// - [Error::InvalidAmount], [Error::InvalidDayOfMonth],
    ///   [Error::InvalidDayOfWeek], [Error::InvalidMonthOfYear], or
    ///   [Error::EndDateNotAfterStart] if a field fails validation,
    /// - [Error::InvalidCategory] if the new category does not refer to a
    ///   valid category,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn update(
        &mut self,
        id: DatabaseID,
        update: RecurringTransactionUpdate,
    ) -> Result<RecurringTransaction, Error> {
        let connection = self.connection.lock().unwrap();

        let mut transaction = Self::get_with_connection(&connection, id)?;

        if let Some(amount) = update.amount {
            transaction.amount = check_amount(amount)?;
        }

        if let Some(description) = &update.description {
            if description.is_empty() {
                return Err(Error::EmptyDescription);
            }

            transaction.description = description.clone();
        }

        if let Some(frequency) = update.frequency {
            transaction.frequency = frequency;
        }

        if let Some(category_id) = update.category_id {
            transaction.category_id = category_id;
        }

        if let Some(day_of_month) = update.day_of_month {
            transaction.day_of_month = day_of_month.map(check_day_of_month).transpose()?;
        }

        if let Some(day_of_week) = update.day_of_week {
            transaction.day_of_week = day_of_week.map(check_day_of_week).transpose()?;
        }

        if let Some(month_of_year) = update.month_of_year {
            transaction.month_of_year = month_of_year.map(check_month_of_year).transpose()?;
        }

        if let Some(end_date) = update.end_date {
            if let Some(date) = end_date
                && date <= transaction.start_date
            {
                return Err(Error::EndDateNotAfterStart {
                    start: transaction.start_date,
                    end: date,
                });
            }

            transaction.end_date = end_date;
        }

        if let Some(total_occurrences) = update.total_occurrences {
            transaction.total_occurrences = total_occurrences;
        }

        // Changing a scheduling anchor re-anchors the cursor of an active
        // row; inactive rows keep their due date frozen.
        if update.changes_schedule() && transaction.is_active {
            transaction.next_due_date = schedule::next_due_date(
                transaction.frequency,
                transaction.next_due_date,
                transaction.day_of_month,
                transaction.day_of_week,
                transaction.month_of_year,
            );
        }

        connection.execute(
            "UPDATE recurring_transaction
             SET amount = ?2, description = ?3, frequency = ?4, category_id = ?5,
                 day_of_month = ?6, day_of_week = ?7, month_of_year = ?8, end_date = ?9,
                 total_occurrences = ?10, next_due_date = ?11
             WHERE id = ?1",
            (
                id,
                transaction.amount,
                &transaction.description,
                transaction.frequency,
                transaction.category_id,
                transaction.day_of_month,
                transaction.day_of_week,
                transaction.month_of_year,
                transaction.end_date,
                transaction.total_occurrences,
                transaction.next_due_date,
            ),
        )?;

        Ok(transaction)
    }

    /// Move the schedule cursor of a processed row forward.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if the advance's ID does not refer to a valid
    ///   recurring transaction,
    /// - [Error::ScheduleConflict] if the stored due date no longer matches
    ///   [ScheduleAdvance::expected_next_due_date] or the row has been
    ///   deactivated since it was read,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn advance_schedule(
        &mut self,
        advance: ScheduleAdvance,
    ) -> Result<RecurringTransaction, Error> {
        let connection = self.connection.lock().unwrap();

        let rows_updated = connection.execute(
            "UPDATE recurring_transaction
             SET next_due_date = ?3, last_processed = ?4,
                 current_occurrences = current_occurrences + 1
             WHERE id = ?1 AND next_due_date = ?2 AND is_active = 1",
            (
                advance.id,
                advance.expected_next_due_date,
                advance.next_due_date,
                advance.processed_at,
            ),
        )?;

        if rows_updated == 0 {
            // Distinguish a row changed by a concurrent run from one that
            // does not exist.
            return match Self::get_with_connection(&connection, advance.id) {
                Ok(_) => Err(Error::ScheduleConflict(advance.id)),
                Err(error) => Err(error),
            };
        }

        Self::get_with_connection(&connection, advance.id)
    }

    /// Mark a recurring transaction as no longer active.
    ///
    /// Deactivating an already inactive row is a no-op. The row's
    /// `next_due_date` is left untouched.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if `id` does not refer to a valid recurring
    ///   transaction,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn deactivate(&mut self, id: DatabaseID) -> Result<RecurringTransaction, Error> {
        let connection = self.connection.lock().unwrap();

        connection.execute(
            "UPDATE recurring_transaction SET is_active = 0 WHERE id = ?1",
            (id,),
        )?;

        Self::get_with_connection(&connection, id)
    }

    /// Delete a recurring transaction in the database by its `id`.
    ///
    /// Ledger entries materialized from the transaction are kept; their
    /// origin reference is cleared.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if `id` does not refer to a valid recurring
    ///   transaction,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn delete(&mut self, id: DatabaseID) -> Result<(), Error> {
        let rows_deleted = self
            .connection
            .lock()
            .unwrap()
            .execute("DELETE FROM recurring_transaction WHERE id = ?1", (id,))?;

        if rows_deleted == 0 {
            return Err(Error::NotFound);
        }

        Ok(())
    }
}

impl CreateTable for SQLiteRecurringTransactionStore {
    fn create_table(connection: &Connection) -> Result<(), rusqlite::Error> {
        connection.execute(
            "CREATE TABLE IF NOT EXISTS recurring_transaction (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL,
                    kind INTEGER NOT NULL,
                    amount REAL NOT NULL,
                    description TEXT NOT NULL,
                    category_id INTEGER,
                    frequency INTEGER NOT NULL,
                    day_of_month INTEGER,
                    day_of_week INTEGER,
                    month_of_year INTEGER,
                    start_date TEXT NOT NULL,
                    end_date TEXT,
                    next_due_date TEXT NOT NULL,
                    total_occurrences INTEGER,
                    current_occurrences INTEGER NOT NULL DEFAULT 0,
                    is_active INTEGER NOT NULL DEFAULT 1,
                    last_processed TEXT,
                    FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE SET NULL
                    )",
            (),
        )?;

        // The due query scans active rows by due date.
        connection.execute(
            "CREATE INDEX IF NOT EXISTS idx_recurring_transaction_due
                 ON recurring_transaction (is_active, next_due_date)",
            (),
        )?;

        Ok(())
    }
}

impl MapRow for SQLiteRecurringTransactionStore {
    type ReturnType = RecurringTransaction;

    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self::ReturnType, rusqlite::Error> {
        let raw_user_id: i64 = row.get(offset + 1)?;

        Ok(RecurringTransaction {
            id: row.get(offset)?,
            user_id: UserID::new(raw_user_id),
            kind: row.get(offset + 2)?,
            amount: row.get(offset + 3)?,
            description: row.get(offset + 4)?,
            category_id: row.get(offset + 5)?,
            frequency: row.get(offset + 6)?,
            day_of_month: row.get(offset + 7)?,
            day_of_week: row.get(offset + 8)?,
            month_of_year: row.get(offset + 9)?,
            start_date: row.get(offset + 10)?,
            end_date: row.get(offset + 11)?,
            next_due_date: row.get(offset + 12)?,
            total_occurrences: row.get(offset + 13)?,
            current_occurrences: row.get(offset + 14)?,
            is_active: row.get(offset + 15)?,
            last_processed: row.get(offset + 16)?,
        })
    }
}

#[cfg(test)]
mod sqlite_recurring_transaction_store_tests {
    use rusqlite::Connection;
    use time::{Date, Month, Time};

    use crate::{
        Error,
        models::{Frequency, RecurringTransaction, TransactionKind, UserID},
        stores::{
            RecurringTransactionStore, RecurringTransactionUpdate, ScheduleAdvance,
            sqlite::create_stores,
        },
    };

    use super::SQLiteRecurringTransactionStore;

    fn get_store() -> SQLiteRecurringTransactionStore {
        let conn = Connection::open_in_memory().unwrap();
        let (store, _, _) = create_stores(conn).unwrap();
        store
    }

    fn date(year: i32, month: Month, day: u8) -> Date {
        Date::from_calendar_date(year, month, day).unwrap()
    }

    fn monthly_bill(store: &mut SQLiteRecurringTransactionStore) -> RecurringTransaction {
        store
            .create(
                RecurringTransaction::build(
                    50.0,
                    "Phone bill",
                    TransactionKind::Expense,
                    Frequency::Monthly,
                    date(2024, Month::August, 7),
                    UserID::new(1),
                )
                .unwrap(),
            )
            .unwrap()
    }

    #[test]
    fn create_sets_cursor_to_start_date() {
        let mut store = get_store();

        let transaction = monthly_bill(&mut store);

        assert!(transaction.id() > 0);
        assert_eq!(transaction.next_due_date(), transaction.start_date());
        assert_eq!(transaction.current_occurrences(), 0);
        assert!(transaction.is_active());
        assert_eq!(transaction.last_processed(), None);
    }

    #[test]
    fn create_stores_anchors() {
        let mut store = get_store();

        let transaction = store
            .create(
                RecurringTransaction::build(
                    1200.0,
                    "Salary",
                    TransactionKind::Income,
                    Frequency::Monthly,
                    date(2024, Month::August, 31),
                    UserID::new(1),
                )
                .unwrap()
                .day_of_month(31)
                .unwrap()
                .total_occurrences(12),
            )
            .unwrap();

        assert_eq!(transaction.day_of_month(), Some(31));
        assert_eq!(transaction.total_occurrences(), Some(12));
    }

    #[test]
    fn create_fails_on_invalid_category_id() {
        let mut store = get_store();

        let result = store.create(
            RecurringTransaction::build(
                50.0,
                "Phone bill",
                TransactionKind::Expense,
                Frequency::Monthly,
                date(2024, Month::August, 7),
                UserID::new(1),
            )
            .unwrap()
            .category(Some(999)),
        );

        assert_eq!(result, Err(Error::InvalidCategory));
    }

    #[test]
    fn get_succeeds() {
        let mut store = get_store();
        let inserted = monthly_bill(&mut store);

        let selected = store.get(inserted.id()).unwrap();

        assert_eq!(inserted, selected);
    }

    #[test]
    fn get_fails_on_invalid_id() {
        let store = get_store();

        assert_eq!(store.get(1337), Err(Error::NotFound));
    }

    #[test]
    fn get_by_user_filters_by_owner() {
        let mut store = get_store();
        let mine = monthly_bill(&mut store);
        store
            .create(
                RecurringTransaction::build(
                    9.99,
                    "Streaming",
                    TransactionKind::Expense,
                    Frequency::Monthly,
                    date(2024, Month::August, 7),
                    UserID::new(2),
                )
                .unwrap(),
            )
            .unwrap();

        let got = store.get_by_user(UserID::new(1)).unwrap();

        assert_eq!(got, vec![mine]);
    }

    #[test]
    fn get_due_returns_most_overdue_first() {
        let mut store = get_store();

        let overdue = store
            .create(
                RecurringTransaction::build(
                    10.0,
                    "Overdue",
                    TransactionKind::Expense,
                    Frequency::Daily,
                    date(2024, Month::August, 1),
                    UserID::new(1),
                )
                .unwrap(),
            )
            .unwrap();
        let due_today = store
            .create(
                RecurringTransaction::build(
                    20.0,
                    "Due today",
                    TransactionKind::Expense,
                    Frequency::Daily,
                    date(2024, Month::August, 7),
                    UserID::new(1),
                )
                .unwrap(),
            )
            .unwrap();
        // Not yet due, must be excluded.
        store
            .create(
                RecurringTransaction::build(
                    30.0,
                    "Future",
                    TransactionKind::Expense,
                    Frequency::Daily,
                    date(2024, Month::August, 8),
                    UserID::new(1),
                )
                .unwrap(),
            )
            .unwrap();

        let got = store.get_due(date(2024, Month::August, 7)).unwrap();

        assert_eq!(got, vec![overdue, due_today]);
    }

    #[test]
    fn get_due_excludes_inactive_rows() {
        let mut store = get_store();
        let transaction = monthly_bill(&mut store);

        store.deactivate(transaction.id()).unwrap();

        let got = store.get_due(date(2030, Month::January, 1)).unwrap();

        assert_eq!(got, vec![]);
    }

    #[test]
    fn update_replaces_fields() {
        let mut store = get_store();
        let transaction = monthly_bill(&mut store);

        let updated = store
            .update(
                transaction.id(),
                RecurringTransactionUpdate {
                    amount: Some(55.0),
                    description: Some("Phone bill (new plan)".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.amount(), 55.0);
        assert_eq!(updated.description(), "Phone bill (new plan)");
        // A non-scheduling update must not move the cursor.
        assert_eq!(updated.next_due_date(), transaction.next_due_date());

        let got = store.get(transaction.id()).unwrap();
        assert_eq!(got, updated);
    }

    #[test]
    fn update_fails_on_invalid_amount() {
        let mut store = get_store();
        let transaction = monthly_bill(&mut store);

        let result = store.update(
            transaction.id(),
            RecurringTransactionUpdate {
                amount: Some(-1.0),
                ..Default::default()
            },
        );

        assert_eq!(result, Err(Error::InvalidAmount(-1.0)));
    }

    #[test]
    fn update_fails_on_end_date_before_start() {
        let mut store = get_store();
        let transaction = monthly_bill(&mut store);

        let result = store.update(
            transaction.id(),
            RecurringTransactionUpdate {
                end_date: Some(Some(date(2024, Month::January, 1))),
                ..Default::default()
            },
        );

        assert_eq!(
            result,
            Err(Error::EndDateNotAfterStart {
                start: transaction.start_date(),
                end: date(2024, Month::January, 1),
            })
        );
    }

    #[test]
    fn update_schedule_change_reanchors_cursor() {
        let mut store = get_store();
        let transaction = monthly_bill(&mut store);

        let updated = store
            .update(
                transaction.id(),
                RecurringTransactionUpdate {
                    day_of_month: Some(Some(31)),
                    ..Default::default()
                },
            )
            .unwrap();

        // The cursor moves one period forward from 2024-08-07 under the new
        // day-31 anchor.
        assert_eq!(updated.next_due_date(), date(2024, Month::September, 30));
    }

    #[test]
    fn update_frequency_change_reanchors_cursor() {
        let mut store = get_store();
        let transaction = monthly_bill(&mut store);

        let updated = store
            .update(
                transaction.id(),
                RecurringTransactionUpdate {
                    frequency: Some(Frequency::Weekly),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.frequency(), Frequency::Weekly);
        assert_eq!(updated.next_due_date(), date(2024, Month::August, 14));
    }

    #[test]
    fn update_schedule_change_leaves_inactive_cursor_frozen() {
        let mut store = get_store();
        let transaction = monthly_bill(&mut store);
        store.deactivate(transaction.id()).unwrap();

        let updated = store
            .update(
                transaction.id(),
                RecurringTransactionUpdate {
                    day_of_month: Some(Some(31)),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.next_due_date(), transaction.next_due_date());
    }

    #[test]
    fn update_fails_on_invalid_id() {
        let mut store = get_store();

        let result = store.update(1337, RecurringTransactionUpdate::default());

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn advance_schedule_moves_cursor() {
        let mut store = get_store();
        let transaction = monthly_bill(&mut store);
        let processed_at = date(2024, Month::August, 7)
            .with_time(Time::from_hms(0, 5, 0).unwrap())
            .assume_utc();

        let advanced = store
            .advance_schedule(ScheduleAdvance {
                id: transaction.id(),
                expected_next_due_date: transaction.next_due_date(),
                next_due_date: date(2024, Month::September, 7),
                processed_at,
            })
            .unwrap();

        assert_eq!(advanced.next_due_date(), date(2024, Month::September, 7));
        assert_eq!(advanced.current_occurrences(), 1);
        assert_eq!(advanced.last_processed(), Some(processed_at));
    }

    #[test]
    fn advance_schedule_fails_on_stale_cursor() {
        let mut store = get_store();
        let transaction = monthly_bill(&mut store);
        let processed_at = date(2024, Month::August, 7)
            .with_time(Time::MIDNIGHT)
            .assume_utc();

        let result = store.advance_schedule(ScheduleAdvance {
            id: transaction.id(),
            // A concurrent run already moved the cursor past this date.
            expected_next_due_date: date(2024, Month::July, 7),
            next_due_date: date(2024, Month::September, 7),
            processed_at,
        });

        assert_eq!(result, Err(Error::ScheduleConflict(transaction.id())));

        // The row must be left unchanged.
        let got = store.get(transaction.id()).unwrap();
        assert_eq!(got, transaction);
    }

    #[test]
    fn advance_schedule_fails_on_invalid_id() {
        let mut store = get_store();
        let processed_at = date(2024, Month::August, 7)
            .with_time(Time::MIDNIGHT)
            .assume_utc();

        let result = store.advance_schedule(ScheduleAdvance {
            id: 1337,
            expected_next_due_date: date(2024, Month::August, 7),
            next_due_date: date(2024, Month::September, 7),
            processed_at,
        });

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn deactivate_is_idempotent() {
        let mut store = get_store();
        let transaction = monthly_bill(&mut store);

        let first = store.deactivate(transaction.id()).unwrap();
        let second = store.deactivate(transaction.id()).unwrap();

        assert!(!first.is_active());
        assert_eq!(first, second);
        // Deactivation freezes the cursor rather than clearing it.
        assert_eq!(first.next_due_date(), transaction.next_due_date());
    }

    #[test]
    fn delete_succeeds() {
        let mut store = get_store();
        let transaction = monthly_bill(&mut store);

        store.delete(transaction.id()).unwrap();

        assert_eq!(store.get(transaction.id()), Err(Error::NotFound));
    }

    #[test]
    fn delete_fails_on_invalid_id() {
        let mut store = get_store();

        assert_eq!(store.delete(1337), Err(Error::NotFound));
    }
}
