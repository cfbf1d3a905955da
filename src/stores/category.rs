//! Defines the category store trait.

use crate::{
    Error,
    models::{Category, DatabaseID, NewCategory},
};

/// Handles the creation and retrieval of categories.
pub trait CategoryStore {
    /// Create a new category in the store.
    fn create(&mut self, new_category: NewCategory) -> Result<Category, Error>;

    /// Retrieve a category from the store.
    fn get(&self, id: DatabaseID) -> Result<Category, Error>;
}
