//! Contains traits and implementations for objects that store the domain [models](crate::models).

mod category;
mod ledger;
mod recurring_transaction;

pub mod sqlite;

pub use category::CategoryStore;
pub use ledger::LedgerStore;
pub use recurring_transaction::{
    RecurringTransactionStore, RecurringTransactionUpdate, ScheduleAdvance,
};
