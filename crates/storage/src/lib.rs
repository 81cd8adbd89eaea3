//! Local persistence: the rolling "recently shown" title list and the
//! completion history. Both are capped, most-recent-first, backed by
//! SQLite.

use std::{fs, path::Path, str::FromStr};

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};

use shared::protocol::{CompletionRecord, HistoryEntry};

/// De-duplicated rolling window of titles the user has already seen.
pub const RECENT_SHOWN_CAP: u32 = 30;
/// Completion records kept before the oldest fall off.
pub const HISTORY_CAP: u32 = 200;

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn in_memory() -> Result<Self> {
        Self::new("sqlite::memory:").await
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Moves `title` to the front of the recently-shown window, dropping
    /// any older occurrence and anything past the cap.
    pub async fn record_shown(&self, title: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM recent_shown WHERE title = ?1")
            .bind(title)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO recent_shown (title, shown_at_ms) VALUES (?1, ?2)")
            .bind(title)
            .bind(Utc::now().timestamp_millis())
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "DELETE FROM recent_shown WHERE id NOT IN \
             (SELECT id FROM recent_shown ORDER BY id DESC LIMIT ?1)",
        )
        .bind(RECENT_SHOWN_CAP)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn recent_titles(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT title FROM recent_shown ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|row| row.get("title")).collect())
    }

    pub async fn clear_recent(&self) -> Result<()> {
        sqlx::query("DELETE FROM recent_shown")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn record_completion(&self, record: &CompletionRecord) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "INSERT INTO history (title, category, mood, energy, ts_ms, recorded_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&record.title)
        .bind(record.category.map(|category| category.as_str()))
        .bind(record.mood)
        .bind(record.energy)
        .bind(record.ts)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "DELETE FROM history WHERE id NOT IN \
             (SELECT id FROM history ORDER BY id DESC LIMIT ?1)",
        )
        .bind(HISTORY_CAP)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn history(&self, limit: u32) -> Result<Vec<HistoryEntry>> {
        let limit = limit.min(HISTORY_CAP);
        let rows = sqlx::query(
            "SELECT id, title, category, mood, energy, ts_ms FROM history \
             ORDER BY id DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| HistoryEntry {
                id: row.get("id"),
                title: row.get("title"),
                ts: row.get("ts_ms"),
                mood: row.get("mood"),
                energy: row.get("energy"),
                category: row
                    .get::<Option<String>, _>("category")
                    .as_deref()
                    .and_then(parse_category),
            })
            .collect())
    }

    pub async fn clear_history(&self) -> Result<()> {
        sqlx::query("DELETE FROM history")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn parse_category(raw: &str) -> Option<shared::domain::TaskCategory> {
    use shared::domain::TaskCategory;
    match raw {
        "body" => Some(TaskCategory::Body),
        "care" => Some(TaskCategory::Care),
        "focus" => Some(TaskCategory::Focus),
        _ => None,
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return Ok(());
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();
    if path.is_empty() {
        return Ok(());
    }

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!(
                    "failed to create parent directory '{}' for database url '{database_url}'",
                    parent.display()
                )
            })?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests;
