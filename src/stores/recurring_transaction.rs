//! Defines the recurring transaction store trait and its update types.

use time::{Date, OffsetDateTime};

use crate::{
    Error,
    models::{DatabaseID, Frequency, RecurringTransaction, RecurringTransactionBuilder, UserID},
};

/// Handles the creation, retrieval and scheduling state of recurring
/// transactions.
pub trait RecurringTransactionStore {
    /// Create a new recurring transaction in the store.
    fn create(&mut self, builder: RecurringTransactionBuilder)
    -> Result<RecurringTransaction, Error>;

    /// Retrieve a recurring transaction from the store.
    fn get(&self, id: DatabaseID) -> Result<RecurringTransaction, Error>;

    /// Retrieve all recurring transactions owned by `user_id`.
    fn get_by_user(&self, user_id: UserID) -> Result<Vec<RecurringTransaction>, Error>;

    /// Retrieve the active recurring transactions whose next due date is on
    /// or before `as_of`, ordered by due date with the most overdue first.
    fn get_due(&self, as_of: Date) -> Result<Vec<RecurringTransaction>, Error>;

    /// Apply `update` to the recurring transaction `id` and return the
    /// updated row.
    ///
    /// When the update changes a scheduling field of an active row, the next
    /// due date is recomputed from the current one under the new schedule.
    /// Inactive rows keep their due date as-is.
    fn update(
        &mut self,
        id: DatabaseID,
        update: RecurringTransactionUpdate,
    ) -> Result<RecurringTransaction, Error>;

    /// Move the schedule cursor of a processed row forward.
    ///
    /// The update only applies while the row is still active and its due
    /// date still equals [ScheduleAdvance::expected_next_due_date]; a row
    /// changed since it was read yields [Error::ScheduleConflict] so the
    /// caller can skip it rather than double-process.
    fn advance_schedule(&mut self, advance: ScheduleAdvance)
    -> Result<RecurringTransaction, Error>;

    /// Mark a recurring transaction as no longer active.
    ///
    /// Deactivating an already inactive row is a no-op.
    fn deactivate(&mut self, id: DatabaseID) -> Result<RecurringTransaction, Error>;

    /// Delete a recurring transaction from the store.
    fn delete(&mut self, id: DatabaseID) -> Result<(), Error>;
}

/// A partial update to a recurring transaction.
///
/// `None` fields are left unchanged. The double-optional fields distinguish
/// "leave as-is" (`None`) from "clear the value" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecurringTransactionUpdate {
    /// Replace the amount of money spent or earned per occurrence.
    pub amount: Option<f64>,
    /// Replace the text description.
    pub description: Option<String>,
    /// Replace the frequency.
    pub frequency: Option<Frequency>,
    /// Replace or clear the category.
    pub category_id: Option<Option<DatabaseID>>,
    /// Replace or clear the day-of-month anchor (1-31).
    pub day_of_month: Option<Option<u8>>,
    /// Replace or clear the day-of-week anchor (0-6, 0 is Sunday).
    pub day_of_week: Option<Option<u8>>,
    /// Replace or clear the month-of-year anchor (1-12).
    pub month_of_year: Option<Option<u8>>,
    /// Replace or clear the end date.
    pub end_date: Option<Option<Date>>,
    /// Replace or clear the occurrence cap.
    pub total_occurrences: Option<Option<u32>>,
}

impl RecurringTransactionUpdate {
    /// Whether applying this update changes how due dates are computed.
    pub fn changes_schedule(&self) -> bool {
        self.frequency.is_some()
            || self.day_of_month.is_some()
            || self.day_of_week.is_some()
            || self.month_of_year.is_some()
    }
}

/// The data for moving a recurring transaction's schedule cursor forward
/// after one of its occurrences has been materialized.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleAdvance {
    /// The recurring transaction to advance.
    pub id: DatabaseID,
    /// The due date the caller read before materializing. The advance is
    /// rejected when the stored due date no longer matches.
    pub expected_next_due_date: Date,
    /// The new due date to store.
    pub next_due_date: Date,
    /// When the occurrence was processed.
    pub processed_at: OffsetDateTime,
}
