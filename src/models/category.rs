//! Defines the category model used to label transactions.
//!
//! Category management (names, budgets, merging) belongs to an external
//! collaborator; this engine only needs to look categories up and copy their
//! reference onto materialized ledger entries.

use serde::{Deserialize, Serialize};

use crate::models::{DatabaseID, UserID};

/// A user-defined label for grouping transactions, e.g. "Groceries".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub(crate) id: DatabaseID,
    pub(crate) name: String,
    pub(crate) user_id: Option<UserID>,
}

impl Category {
    /// The ID of the category.
    pub fn id(&self) -> DatabaseID {
        self.id
    }

    /// The display name of the category.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The user that owns the category, or `None` for a shared default
    /// category available to all users.
    pub fn user_id(&self) -> Option<UserID> {
        self.user_id
    }
}

/// The data for creating a new [Category].
#[derive(Debug, Clone, PartialEq)]
pub struct NewCategory {
    /// The display name of the category.
    pub name: String,
    /// The owning user, or `None` for a shared default category.
    pub user_id: Option<UserID>,
}
