//! Persistance SQLite du store des épisodes en attente
//!
//! Une base, deux tables : `pending` (les épisodes différés, ordre
//! d'insertion par identifiant croissant) et `processed` (le registre de
//! dédup, `INSERT OR IGNORE` pour l'idempotence).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pmomodel::{Episode, PendingEntry, PendingReason};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use crate::store::{PendingPage, PendingStore};
use crate::{Error, Result};

/// Store SQLite (une connexion protégée par mutex, comme pour les playlists)
pub struct SqlitePendingStore {
    conn: Mutex<Connection>,
}

impl SqlitePendingStore {
    /// Initialise la base et crée les tables si nécessaire
    pub fn new(db_path: &Path) -> Result<Self> {
        // Créer le répertoire parent si nécessaire
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::PersistenceError(format!("Failed to create directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| Error::PersistenceError(format!("Failed to open database: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS pending (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                episode_id TEXT NOT NULL UNIQUE,
                episode_json TEXT NOT NULL,
                queued_at TEXT NOT NULL,
                reason TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS processed (
                episode_id TEXT PRIMARY KEY,
                processed_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_pending_episode ON pending(episode_id)",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn row_to_entry(
        episode_json: String,
        queued_at: String,
        reason: String,
    ) -> Result<PendingEntry> {
        let episode: Episode = serde_json::from_str(&episode_json)?;
        let queued_at = DateTime::parse_from_rfc3339(&queued_at)
            .map_err(|e| Error::PersistenceError(format!("Invalid queued_at: {}", e)))?
            .with_timezone(&Utc);
        let reason: PendingReason = reason
            .parse()
            .map_err(|e: String| Error::PersistenceError(e))?;
        Ok(PendingEntry {
            episode,
            queued_at,
            reason,
        })
    }
}

#[async_trait]
impl PendingStore for SqlitePendingStore {
    async fn add_pending(&self, entry: PendingEntry) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let episode_json = serde_json::to_string(&entry.episode)?;
        conn.execute(
            "INSERT OR IGNORE INTO pending (episode_id, episode_json, queued_at, reason)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.episode.id,
                episode_json,
                entry.queued_at.to_rfc3339(),
                entry.reason.to_string(),
            ],
        )?;
        Ok(())
    }

    async fn list_pending(&self) -> Result<Vec<PendingEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT episode_json, queued_at, reason FROM pending ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (episode_json, queued_at, reason) = row?;
            entries.push(Self::row_to_entry(episode_json, queued_at, reason)?);
        }
        Ok(entries)
    }

    async fn pending_page(&self, after: Option<i64>, limit: usize) -> Result<PendingPage> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, episode_json, queued_at, reason FROM pending
             WHERE id > ?1 ORDER BY id ASC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![after.unwrap_or(0), limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut page = Vec::new();
        for row in rows {
            let (id, episode_json, queued_at, reason) = row?;
            page.push((id, Self::row_to_entry(episode_json, queued_at, reason)?));
        }
        Ok(page)
    }

    async fn remove_pending(&self, episode_id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute(
            "DELETE FROM pending WHERE episode_id = ?1",
            params![episode_id],
        )?;
        Ok(removed > 0)
    }

    async fn mark_processed(&self, episode_id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO processed (episode_id, processed_at) VALUES (?1, ?2)",
            params![episode_id, Utc::now().to_rfc3339()],
        )?;
        Ok(inserted > 0)
    }

    async fn is_processed(&self, episode_id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let found: Option<String> = conn
            .query_row(
                "SELECT episode_id FROM processed WHERE episode_id = ?1",
                params![episode_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    async fn pending_count(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM pending", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    async fn processed_count(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM processed", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    async fn reset_processed(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let cleared = conn.execute("DELETE FROM processed", [])?;
        Ok(cleared)
    }
}
