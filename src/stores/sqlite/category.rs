//! Implements a SQLite backed category store.

use std::sync::{Arc, Mutex};

use rusqlite::{Connection, Row};

use crate::{
    Error,
    db::{CreateTable, MapRow},
    models::{Category, DatabaseID, NewCategory, UserID},
    stores::CategoryStore,
};

/// Stores categories in a SQLite database.
#[derive(Debug, Clone)]
pub struct SQLiteCategoryStore {
    connection: Arc<Mutex<Connection>>,
}

impl SQLiteCategoryStore {
    /// Create a new store for the SQLite `connection`.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }
}

impl CategoryStore for SQLiteCategoryStore {
    /// Create a new category in the database.
    ///
    /// # Errors
    /// This function will return an [Error::SqlError] if there is an SQL
    /// error.
    fn create(&mut self, new_category: NewCategory) -> Result<Category, Error> {
        let category = self
            .connection
            .lock()
            .unwrap()
            .prepare(
                "INSERT INTO category (name, user_id) VALUES (?1, ?2)
                 RETURNING id, name, user_id",
            )?
            .query_row(
                (
                    &new_category.name,
                    new_category.user_id.map(|user_id| user_id.as_i64()),
                ),
                Self::map_row,
            )?;

        Ok(category)
    }

    /// Retrieve a category in the database by its `id`.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if `id` does not refer to a valid category,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn get(&self, id: DatabaseID) -> Result<Category, Error> {
        let category = self
            .connection
            .lock()
            .unwrap()
            .prepare("SELECT id, name, user_id FROM category WHERE id = :id")?
            .query_row(&[(":id", &id)], Self::map_row)?;

        Ok(category)
    }
}

impl CreateTable for SQLiteCategoryStore {
    fn create_table(connection: &Connection) -> Result<(), rusqlite::Error> {
        connection.execute(
            "CREATE TABLE IF NOT EXISTS category (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    user_id INTEGER
                    )",
            (),
        )?;

        Ok(())
    }
}

impl MapRow for SQLiteCategoryStore {
    type ReturnType = Category;

    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self::ReturnType, rusqlite::Error> {
        let id = row.get(offset)?;
        let name = row.get(offset + 1)?;
        let raw_user_id: Option<i64> = row.get(offset + 2)?;

        Ok(Category {
            id,
            name,
            user_id: raw_user_id.map(UserID::new),
        })
    }
}

#[cfg(test)]
mod sqlite_category_store_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        models::{NewCategory, UserID},
        stores::{CategoryStore, sqlite::create_stores},
    };

    use super::SQLiteCategoryStore;

    fn get_store() -> SQLiteCategoryStore {
        let conn = Connection::open_in_memory().unwrap();
        let (_, _, category_store) = create_stores(conn).unwrap();
        category_store
    }

    #[test]
    fn create_succeeds() {
        let mut store = get_store();

        let category = store
            .create(NewCategory {
                name: "Groceries".to_string(),
                user_id: Some(UserID::new(1)),
            })
            .unwrap();

        assert!(category.id() > 0);
        assert_eq!(category.name(), "Groceries");
        assert_eq!(category.user_id(), Some(UserID::new(1)));
    }

    #[test]
    fn create_shared_category_has_no_owner() {
        let mut store = get_store();

        let category = store
            .create(NewCategory {
                name: "Uncategorized".to_string(),
                user_id: None,
            })
            .unwrap();

        assert_eq!(category.user_id(), None);
    }

    #[test]
    fn get_succeeds() {
        let mut store = get_store();
        let inserted = store
            .create(NewCategory {
                name: "Rent".to_string(),
                user_id: Some(UserID::new(2)),
            })
            .unwrap();

        let selected = store.get(inserted.id()).unwrap();

        assert_eq!(inserted, selected);
    }

    #[test]
    fn get_fails_on_invalid_id() {
        let store = get_store();

        let selected = store.get(1337);

        assert_eq!(selected, Err(Error::NotFound));
    }
}
