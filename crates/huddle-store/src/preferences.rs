//! Key-value persistence for client settings.
//!
//! The current-user store remembers the chosen display name and avatar across
//! restarts through a [`Preferences`] backend. Values are plain strings and
//! absent keys mean "use the default".

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::Result;

/// A string key-value store.
pub trait Preferences: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Volatile preferences, used by tests and headless sessions.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(entries: &[(&str, &str)]) -> Self {
        let values = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            values: Mutex::new(values),
        }
    }

    fn values(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Preferences for MemoryPreferences {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values().remove(key);
        Ok(())
    }
}

/// Preferences stored in the `preferences` table of a [`Database`].
pub struct SqlitePreferences {
    db: Mutex<Database>,
}

impl SqlitePreferences {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Open the database at `path` (creating it if needed).
    pub fn open_at(path: &Path) -> Result<Self> {
        Ok(Self::new(Database::open_at(path)?))
    }

    fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Preferences for SqlitePreferences {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .db()
            .conn()
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.db().conn().execute(
            "INSERT INTO preferences (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        tracing::debug!(key, "preference saved");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.db()
            .conn()
            .execute("DELETE FROM preferences WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_set_get_remove() {
        let prefs = MemoryPreferences::new();
        assert_eq!(prefs.get("username").unwrap(), None);

        prefs.set("username", "Fred").unwrap();
        assert_eq!(prefs.get("username").unwrap().as_deref(), Some("Fred"));

        prefs.remove("username").unwrap();
        assert_eq!(prefs.get("username").unwrap(), None);
    }

    #[test]
    fn sqlite_overwrites_existing_key() {
        let prefs = SqlitePreferences::new(Database::open_in_memory().unwrap());
        prefs.set("avatar", "a.png").unwrap();
        prefs.set("avatar", "b.png").unwrap();
        assert_eq!(prefs.get("avatar").unwrap().as_deref(), Some("b.png"));
    }

    #[test]
    fn sqlite_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.db");

        {
            let prefs = SqlitePreferences::open_at(&path).unwrap();
            prefs.set("username", "Sofia").unwrap();
        }

        let prefs = SqlitePreferences::open_at(&path).unwrap();
        assert_eq!(prefs.get("username").unwrap().as_deref(), Some("Sofia"));
        prefs.remove("username").unwrap();
        assert_eq!(prefs.get("username").unwrap(), None);
    }
}
