//! Defines `RecurringTransaction`, the user-defined template from which
//! ledger entries are periodically materialized.

use rusqlite::{
    ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    models::{DatabaseID, UserID},
    schedule,
};

/// Whether a transaction adds money to or removes money from the owner's
/// ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Money earned, e.g. wages.
    Income,
    /// Money spent, e.g. a phone bill.
    Expense,
}

impl TransactionKind {
    /// The integer code the kind is stored as in the database.
    pub fn as_i64(self) -> i64 {
        match self {
            TransactionKind::Income => 0,
            TransactionKind::Expense => 1,
        }
    }
}

impl TryFrom<i64> for TransactionKind {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TransactionKind::Income),
            1 => Ok(TransactionKind::Expense),
            _ => Err(Error::InvalidTransactionKind(value)),
        }
    }
}

impl ToSql for TransactionKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_i64().into())
    }
}

impl FromSql for TransactionKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        TransactionKind::try_from(value.as_i64()?)
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// How often a recurring transaction happens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    /// Every day.
    Daily,
    /// Every seven days, optionally snapped to a day of the week.
    Weekly,
    /// A calendar month of variable length.
    Monthly,
    /// A calendar quarter, i.e. three calendar months.
    Quarterly,
    /// A calendar year.
    Yearly,
}

impl Frequency {
    /// The integer code the frequency is stored as in the database.
    pub fn as_i64(self) -> i64 {
        match self {
            Frequency::Daily => 0,
            Frequency::Weekly => 1,
            Frequency::Monthly => 2,
            Frequency::Quarterly => 3,
            Frequency::Yearly => 4,
        }
    }
}

impl TryFrom<i64> for Frequency {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Frequency::Daily),
            1 => Ok(Frequency::Weekly),
            2 => Ok(Frequency::Monthly),
            3 => Ok(Frequency::Quarterly),
            4 => Ok(Frequency::Yearly),
            _ => Err(Error::InvalidFrequency(value)),
        }
    }
}

impl ToSql for Frequency {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_i64().into())
    }
}

impl FromSql for Frequency {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Frequency::try_from(value.as_i64()?).map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// A transaction (income or expense) that repeats on a regular schedule,
/// e.g. wages or a phone bill.
///
/// The recurring transaction does not record money movement by itself: the
/// due-transaction processor materializes one
/// [LedgerEntry](crate::models::LedgerEntry) per due occurrence and advances
/// `next_due_date`.
///
/// To create a new `RecurringTransaction`, use [RecurringTransaction::build]
/// and pass the builder to
/// [RecurringTransactionStore::create](crate::stores::RecurringTransactionStore::create).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringTransaction {
    pub(crate) id: DatabaseID,
    pub(crate) user_id: UserID,
    pub(crate) kind: TransactionKind,
    pub(crate) amount: f64,
    pub(crate) description: String,
    pub(crate) category_id: Option<DatabaseID>,
    pub(crate) frequency: Frequency,
    pub(crate) day_of_month: Option<u8>,
    pub(crate) day_of_week: Option<u8>,
    pub(crate) month_of_year: Option<u8>,
    pub(crate) start_date: Date,
    pub(crate) end_date: Option<Date>,
    pub(crate) next_due_date: Date,
    pub(crate) total_occurrences: Option<u32>,
    pub(crate) current_occurrences: u32,
    pub(crate) is_active: bool,
    pub(crate) last_processed: Option<OffsetDateTime>,
}

impl RecurringTransaction {
    /// Create a new recurring transaction.
    ///
    /// Shortcut for [RecurringTransactionBuilder::new] for discoverability.
    ///
    /// # Errors
    /// This function will return an [Error::InvalidAmount] if `amount` is not
    /// a positive, finite number, or an [Error::EmptyDescription] if
    /// `description` is empty.
    pub fn build(
        amount: f64,
        description: &str,
        kind: TransactionKind,
        frequency: Frequency,
        start_date: Date,
        user_id: UserID,
    ) -> Result<RecurringTransactionBuilder, Error> {
        RecurringTransactionBuilder::new(amount, description, kind, frequency, start_date, user_id)
    }

    /// The ID of the recurring transaction.
    pub fn id(&self) -> DatabaseID {
        self.id
    }

    /// The ID of the user that owns this recurring transaction.
    pub fn user_id(&self) -> UserID {
        self.user_id
    }

    /// Whether the materialized transactions are income or expenses.
    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    /// The amount of money each materialized transaction moves.
    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// A text description of what the recurring transaction is for.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The category copied onto materialized ledger entries.
    pub fn category_id(&self) -> Option<DatabaseID> {
        self.category_id
    }

    /// How often the transaction repeats.
    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// The day of the month (1-31, clamped to the month's length) the
    /// schedule is anchored to.
    pub fn day_of_month(&self) -> Option<u8> {
        self.day_of_month
    }

    /// The day of the week (0-6, 0 is Sunday) a weekly schedule is anchored
    /// to.
    pub fn day_of_week(&self) -> Option<u8> {
        self.day_of_week
    }

    /// The month (1-12) a yearly schedule is anchored to.
    pub fn month_of_year(&self) -> Option<u8> {
        self.month_of_year
    }

    /// The first date the transaction is due.
    pub fn start_date(&self) -> Date {
        self.start_date
    }

    /// The date after which the transaction stops recurring, or `None` to
    /// recur indefinitely.
    pub fn end_date(&self) -> Option<Date> {
        self.end_date
    }

    /// When the transaction is next due to be materialized.
    ///
    /// This is the single source of truth for scheduling: it equals
    /// `start_date` on creation and is advanced by the due-transaction
    /// processor on each materialization.
    pub fn next_due_date(&self) -> Date {
        self.next_due_date
    }

    /// The maximum number of times the transaction may materialize, or
    /// `None` for no cap.
    pub fn total_occurrences(&self) -> Option<u32> {
        self.total_occurrences
    }

    /// How many times the transaction has materialized so far.
    pub fn current_occurrences(&self) -> u32 {
        self.current_occurrences
    }

    /// Whether the transaction is still being processed.
    ///
    /// Once false (occurrence cap reached, end date passed, or deactivated by
    /// the owner), the row is excluded from processing and its
    /// `next_due_date` is frozen.
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// When the transaction was last materialized, or `None` if it never has
    /// been.
    pub fn last_processed(&self) -> Option<OffsetDateTime> {
        self.last_processed
    }

    /// The due date that follows `next_due_date` under this schedule.
    pub fn next_occurrence(&self) -> Date {
        schedule::next_due_date(
            self.frequency,
            self.next_due_date,
            self.day_of_month,
            self.day_of_week,
            self.month_of_year,
        )
    }
}

/// Builder for creating a new [RecurringTransaction].
///
/// Finalize the builder with
/// [RecurringTransactionStore::create](crate::stores::RecurringTransactionStore::create),
/// which assigns the ID and sets `next_due_date` to the start date so the
/// first occurrence lands exactly on the start date.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurringTransactionBuilder {
    pub(crate) user_id: UserID,
    pub(crate) kind: TransactionKind,
    pub(crate) amount: f64,
    pub(crate) description: String,
    pub(crate) category_id: Option<DatabaseID>,
    pub(crate) frequency: Frequency,
    pub(crate) day_of_month: Option<u8>,
    pub(crate) day_of_week: Option<u8>,
    pub(crate) month_of_year: Option<u8>,
    pub(crate) start_date: Date,
    pub(crate) end_date: Option<Date>,
    pub(crate) total_occurrences: Option<u32>,
}

impl RecurringTransactionBuilder {
    /// Create a builder for a new recurring transaction.
    ///
    /// # Errors
    /// This function will return an [Error::InvalidAmount] if `amount` is not
    /// a positive, finite number, or an [Error::EmptyDescription] if
    /// `description` is empty.
    pub fn new(
        amount: f64,
        description: &str,
        kind: TransactionKind,
        frequency: Frequency,
        start_date: Date,
        user_id: UserID,
    ) -> Result<Self, Error> {
        let amount = check_amount(amount)?;

        if description.is_empty() {
            return Err(Error::EmptyDescription);
        }

        Ok(Self {
            user_id,
            kind,
            amount,
            description: description.to_owned(),
            category_id: None,
            frequency,
            day_of_month: None,
            day_of_week: None,
            month_of_year: None,
            start_date,
            end_date: None,
            total_occurrences: None,
        })
    }

    /// Set the category copied onto materialized ledger entries.
    pub fn category(mut self, category_id: Option<DatabaseID>) -> Self {
        self.category_id = category_id;
        self
    }

    /// Anchor monthly, quarterly, or yearly schedules to a day of the month.
    ///
    /// Days past the end of a month are clamped to the month's last day,
    /// so day 31 is "the last day of the month".
    ///
    /// # Errors
    /// This function will return an [Error::InvalidDayOfMonth] if `day` is
    /// outside 1-31.
    pub fn day_of_month(mut self, day: u8) -> Result<Self, Error> {
        self.day_of_month = Some(check_day_of_month(day)?);
        Ok(self)
    }

    /// Anchor a weekly schedule to a day of the week (0-6, 0 is Sunday).
    ///
    /// # Errors
    /// This function will return an [Error::InvalidDayOfWeek] if `day` is
    /// outside 0-6.
    pub fn day_of_week(mut self, day: u8) -> Result<Self, Error> {
        self.day_of_week = Some(check_day_of_week(day)?);
        Ok(self)
    }

    /// Anchor a yearly schedule to a month (1-12).
    ///
    /// # Errors
    /// This function will return an [Error::InvalidMonthOfYear] if `month` is
    /// outside 1-12.
    pub fn month_of_year(mut self, month: u8) -> Result<Self, Error> {
        self.month_of_year = Some(check_month_of_year(month)?);
        Ok(self)
    }

    /// Set the date after which the transaction stops recurring.
    ///
    /// # Errors
    /// This function will return an [Error::EndDateNotAfterStart] if `date`
    /// is on or before the start date.
    pub fn end_date(mut self, date: Date) -> Result<Self, Error> {
        if date <= self.start_date {
            return Err(Error::EndDateNotAfterStart {
                start: self.start_date,
                end: date,
            });
        }

        self.end_date = Some(date);
        Ok(self)
    }

    /// Cap the number of times the transaction may materialize before it is
    /// automatically deactivated.
    pub fn total_occurrences(mut self, cap: u32) -> Self {
        self.total_occurrences = Some(cap);
        self
    }
}

pub(crate) fn check_amount(amount: f64) -> Result<f64, Error> {
    if amount.is_finite() && amount > 0.0 {
        Ok(amount)
    } else {
        Err(Error::InvalidAmount(amount))
    }
}

pub(crate) fn check_day_of_month(day: u8) -> Result<u8, Error> {
    if (1..=31).contains(&day) {
        Ok(day)
    } else {
        Err(Error::InvalidDayOfMonth(day))
    }
}

pub(crate) fn check_day_of_week(day: u8) -> Result<u8, Error> {
    if day <= 6 {
        Ok(day)
    } else {
        Err(Error::InvalidDayOfWeek(day))
    }
}

pub(crate) fn check_month_of_year(month: u8) -> Result<u8, Error> {
    if (1..=12).contains(&month) {
        Ok(month)
    } else {
        Err(Error::InvalidMonthOfYear(month))
    }
}

#[cfg(test)]
mod recurring_transaction_builder_tests {
    use time::{Date, Month};

    use crate::{
        Error,
        models::{Frequency, RecurringTransaction, TransactionKind, UserID},
    };

    fn start_date() -> Date {
        Date::from_calendar_date(2024, Month::August, 7).unwrap()
    }

    fn build_valid() -> crate::models::RecurringTransactionBuilder {
        RecurringTransaction::build(
            50.0,
            "Phone bill",
            TransactionKind::Expense,
            Frequency::Monthly,
            start_date(),
            UserID::new(1),
        )
        .unwrap()
    }

    #[test]
    fn new_fails_on_zero_amount() {
        let result = RecurringTransaction::build(
            0.0,
            "Phone bill",
            TransactionKind::Expense,
            Frequency::Monthly,
            start_date(),
            UserID::new(1),
        );

        assert_eq!(result, Err(Error::InvalidAmount(0.0)));
    }

    #[test]
    fn new_fails_on_negative_amount() {
        let result = RecurringTransaction::build(
            -12.5,
            "Phone bill",
            TransactionKind::Expense,
            Frequency::Monthly,
            start_date(),
            UserID::new(1),
        );

        assert_eq!(result, Err(Error::InvalidAmount(-12.5)));
    }

    #[test]
    fn new_fails_on_empty_description() {
        let result = RecurringTransaction::build(
            50.0,
            "",
            TransactionKind::Expense,
            Frequency::Monthly,
            start_date(),
            UserID::new(1),
        );

        assert_eq!(result, Err(Error::EmptyDescription));
    }

    #[test]
    fn day_of_month_fails_outside_range() {
        assert_eq!(
            build_valid().day_of_month(0),
            Err(Error::InvalidDayOfMonth(0))
        );
        assert_eq!(
            build_valid().day_of_month(32),
            Err(Error::InvalidDayOfMonth(32))
        );
    }

    #[test]
    fn day_of_week_fails_outside_range() {
        assert_eq!(
            build_valid().day_of_week(7),
            Err(Error::InvalidDayOfWeek(7))
        );
    }

    #[test]
    fn month_of_year_fails_outside_range() {
        assert_eq!(
            build_valid().month_of_year(0),
            Err(Error::InvalidMonthOfYear(0))
        );
        assert_eq!(
            build_valid().month_of_year(13),
            Err(Error::InvalidMonthOfYear(13))
        );
    }

    #[test]
    fn end_date_fails_on_start_date() {
        let result = build_valid().end_date(start_date());

        assert_eq!(
            result,
            Err(Error::EndDateNotAfterStart {
                start: start_date(),
                end: start_date(),
            })
        );
    }

    #[test]
    fn end_date_succeeds_after_start_date() {
        let end = Date::from_calendar_date(2025, Month::August, 7).unwrap();

        let builder = build_valid().end_date(end).unwrap();

        assert_eq!(builder.end_date, Some(end));
    }
}
