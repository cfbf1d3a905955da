//! Defines the ledger store trait.

use crate::{
    Error,
    models::{DatabaseID, LedgerEntry, LedgerEntryBuilder, UserID},
};

/// Handles the creation and retrieval of ledger entries.
pub trait LedgerStore {
    /// Create a new ledger entry in the store.
    fn create(&mut self, builder: LedgerEntryBuilder) -> Result<LedgerEntry, Error>;

    /// Retrieve a ledger entry from the store.
    fn get(&self, id: DatabaseID) -> Result<LedgerEntry, Error>;

    /// Retrieve all ledger entries owned by `user_id`, most recent first.
    fn get_by_user(&self, user_id: UserID) -> Result<Vec<LedgerEntry>, Error>;

    /// Retrieve the entry materialized from `occurrence` of the recurring
    /// transaction `recurring_transaction_id`, if one exists.
    ///
    /// At most one such entry can exist per origin key.
    fn get_by_origin(
        &self,
        recurring_transaction_id: DatabaseID,
        occurrence: u32,
    ) -> Result<Option<LedgerEntry>, Error>;

    /// Delete a ledger entry from the store.
    fn delete(&mut self, id: DatabaseID) -> Result<(), Error>;
}
