//! Defines `LedgerEntry`, a concrete expense or income on a user's ledger.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    models::{DatabaseID, TransactionKind, UserID, recurring_transaction::check_amount},
};

/// An expense or income, i.e. an event where money was either spent or
/// earned.
///
/// Ledger entries are created either directly by the owner or by the
/// due-transaction processor, which materializes one entry per due occurrence
/// of a recurring transaction. Materialized entries carry an origin key
/// (`recurring_transaction_id`, `occurrence`) so a given occurrence produces
/// at most one entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub(crate) id: DatabaseID,
    pub(crate) user_id: UserID,
    pub(crate) kind: TransactionKind,
    pub(crate) amount: f64,
    pub(crate) date: Date,
    pub(crate) description: String,
    pub(crate) category_id: Option<DatabaseID>,
    pub(crate) recurring_transaction_id: Option<DatabaseID>,
    pub(crate) occurrence: Option<u32>,
}

impl LedgerEntry {
    /// Create a new ledger entry.
    ///
    /// Shortcut for [LedgerEntryBuilder::new] for discoverability.
    ///
    /// # Errors
    /// This function will return an [Error::InvalidAmount] if `amount` is not
    /// a positive, finite number.
    pub fn build(
        amount: f64,
        user_id: UserID,
        kind: TransactionKind,
    ) -> Result<LedgerEntryBuilder, Error> {
        LedgerEntryBuilder::new(amount, user_id, kind)
    }

    /// The ID of the ledger entry.
    pub fn id(&self) -> DatabaseID {
        self.id
    }

    /// The ID of the user that owns this entry.
    pub fn user_id(&self) -> UserID {
        self.user_id
    }

    /// Whether the entry is income or an expense.
    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    /// The amount of money spent or earned.
    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// When the entry was recorded.
    ///
    /// For entries materialized from a recurring transaction this is the
    /// processing date, not the due date.
    pub fn date(&self) -> Date {
        self.date
    }

    /// A text description of what the entry was for.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The category of the entry.
    pub fn category_id(&self) -> Option<DatabaseID> {
        self.category_id
    }

    /// The recurring transaction this entry was materialized from, if any.
    pub fn recurring_transaction_id(&self) -> Option<DatabaseID> {
        self.recurring_transaction_id
    }

    /// Which occurrence of the recurring transaction this entry records,
    /// counted from zero.
    pub fn occurrence(&self) -> Option<u32> {
        self.occurrence
    }
}

/// Builder for creating a new [LedgerEntry].
///
/// Finalize the builder with
/// [LedgerStore::create](crate::stores::LedgerStore::create).
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntryBuilder {
    pub(crate) user_id: UserID,
    pub(crate) kind: TransactionKind,
    pub(crate) amount: f64,
    pub(crate) date: Date,
    pub(crate) description: String,
    pub(crate) category_id: Option<DatabaseID>,
    pub(crate) origin: Option<(DatabaseID, u32)>,
}

impl LedgerEntryBuilder {
    /// Create a builder for a new ledger entry dated today.
    ///
    /// # Errors
    /// This function will return an [Error::InvalidAmount] if `amount` is not
    /// a positive, finite number.
    pub fn new(amount: f64, user_id: UserID, kind: TransactionKind) -> Result<Self, Error> {
        let amount = check_amount(amount)?;

        Ok(Self {
            user_id,
            kind,
            amount,
            date: OffsetDateTime::now_utc().date(),
            description: String::new(),
            category_id: None,
            origin: None,
        })
    }

    /// Set the date of the entry.
    pub fn date(mut self, date: Date) -> Self {
        self.date = date;
        self
    }

    /// Set the description of the entry.
    pub fn description(mut self, description: String) -> Self {
        self.description = description;
        self
    }

    /// Set the category of the entry.
    pub fn category(mut self, category_id: Option<DatabaseID>) -> Self {
        self.category_id = category_id;
        self
    }

    /// Mark the entry as materialized from `occurrence` (counted from zero)
    /// of the recurring transaction `recurring_transaction_id`.
    pub fn origin(mut self, recurring_transaction_id: DatabaseID, occurrence: u32) -> Self {
        self.origin = Some((recurring_transaction_id, occurrence));
        self
    }
}
