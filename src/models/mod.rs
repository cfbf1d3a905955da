//! This module defines the domain data types.

use serde::{Deserialize, Serialize};

pub use category::{Category, NewCategory};
pub use ledger_entry::{LedgerEntry, LedgerEntryBuilder};
pub use recurring_transaction::{
    Frequency, RecurringTransaction, RecurringTransactionBuilder, TransactionKind,
};
pub(crate) use recurring_transaction::{
    check_amount, check_day_of_month, check_day_of_week, check_month_of_year,
};

mod category;
mod ledger_entry;
mod recurring_transaction;

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseID = i64;

/// The ID of a user.
///
/// User accounts are managed by an external collaborator; this engine only
/// scopes rows by their owner's ID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// The underlying integer ID.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}
