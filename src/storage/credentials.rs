use rusqlite::{OptionalExtension, params};
use std::fs;
use std::path::Path;

use super::database::Database;
use crate::common::UserProfile;
use crate::error::Result;

const ACCESS_TOKEN_KEY: &str = "access_token";
const REFRESH_TOKEN_KEY: &str = "refresh_token";
const PROFILE_KEY: &str = "user_profile";

/// Local key/value storage for the bearer credentials and the cached
/// profile. Reads always hit the database; nothing is cached in memory.
pub struct CredentialStore {
    db: Database,
}

impl CredentialStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let store = Self {
            db: Database::open(path)?,
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let store = Self {
            db: Database::in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.db.connection().execute(
            "CREATE TABLE IF NOT EXISTS local_storage (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            )",
            [],
        )?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .db
            .connection()
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.db.connection().execute(
            "INSERT OR REPLACE INTO local_storage (key, value, updated_at)
             VALUES (?1, ?2, strftime('%s', 'now'))",
            params![key, value],
        )?;
        Ok(())
    }

    /// Access token, or `None` when signed out. Blank values count as absent.
    pub fn access_token(&self) -> Result<Option<String>> {
        Ok(self
            .get(ACCESS_TOKEN_KEY)?
            .filter(|token| !token.trim().is_empty()))
    }

    pub fn refresh_token(&self) -> Result<Option<String>> {
        self.get(REFRESH_TOKEN_KEY)
    }

    /// Stores a new access token. A `None` refresh token keeps the old one.
    pub fn save_tokens(&self, access_token: &str, refresh_token: Option<&str>) -> Result<()> {
        self.set(ACCESS_TOKEN_KEY, access_token)?;
        if let Some(refresh_token) = refresh_token {
            self.set(REFRESH_TOKEN_KEY, refresh_token)?;
        }
        Ok(())
    }

    pub fn profile(&self) -> Result<Option<UserProfile>> {
        let Some(raw) = self.get(PROFILE_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(profile) => Ok(Some(profile)),
            Err(err) => {
                log::warn!("Ignoring unreadable stored profile: {err}");
                Ok(None)
            }
        }
    }

    pub fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        self.set(PROFILE_KEY, &serde_json::to_string(profile)?)
    }

    pub fn clear(&self) -> Result<()> {
        self.db
            .connection()
            .execute("DELETE FROM local_storage", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Role;

    #[test]
    fn empty_store_is_signed_out() {
        let store = CredentialStore::in_memory().unwrap();
        assert_eq!(store.access_token().unwrap(), None);
        assert_eq!(store.refresh_token().unwrap(), None);
        assert_eq!(store.profile().unwrap(), None);
    }

    #[test]
    fn rotating_access_token_keeps_refresh_token() {
        let store = CredentialStore::in_memory().unwrap();
        store.save_tokens("a1", Some("r1")).unwrap();
        store.save_tokens("a2", None).unwrap();

        assert_eq!(store.access_token().unwrap().as_deref(), Some("a2"));
        assert_eq!(store.refresh_token().unwrap().as_deref(), Some("r1"));
    }

    #[test]
    fn blank_token_counts_as_signed_out() {
        let store = CredentialStore::in_memory().unwrap();
        store.save_tokens("  ", None).unwrap();
        assert_eq!(store.access_token().unwrap(), None);
    }

    #[test]
    fn clear_forgets_everything() {
        let store = CredentialStore::in_memory().unwrap();
        store.save_tokens("a1", Some("r1")).unwrap();
        store
            .save_profile(&UserProfile {
                id: "u1".into(),
                email: "lan@example.com".into(),
                display_name: "Lan".into(),
                role: Some(Role::Customer),
            })
            .unwrap();

        store.clear().unwrap();

        assert_eq!(store.access_token().unwrap(), None);
        assert_eq!(store.refresh_token().unwrap(), None);
        assert_eq!(store.profile().unwrap(), None);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("client.db");

        CredentialStore::open(&path)
            .unwrap()
            .save_tokens("a1", Some("r1"))
            .unwrap();

        let reopened = CredentialStore::open(&path).unwrap();
        assert_eq!(reopened.access_token().unwrap().as_deref(), Some("a1"));
    }

    #[test]
    fn unreadable_profile_is_ignored() {
        let store = CredentialStore::in_memory().unwrap();
        store.set(PROFILE_KEY, "{not json").unwrap();
        assert_eq!(store.profile().unwrap(), None);
    }
}
