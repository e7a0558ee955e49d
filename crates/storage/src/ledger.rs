use crate::models::LedgerEntry;
use crate::{connect, migrate, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashSet;
use tracing::debug;

/// Persistent processing state of extracted documents.
///
/// Mutations are expected to be serialized by the caller that owns the
/// index writer; implementations only guarantee that each call is atomic.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<LedgerEntry>>;

    /// Entries whose text was extracted but that are not in the index yet.
    async fn unindexed(&self) -> Result<Vec<LedgerEntry>>;

    async fn known_pdf_paths(&self) -> Result<HashSet<String>>;

    /// Upserts entries with `indexed = 0`.
    async fn register(&self, entries: &[LedgerEntry]) -> Result<()>;

    /// Flips `indexed` to 1 for all `names` in a single transaction.
    async fn mark_indexed(&self, names: &[String]) -> Result<()>;

    /// Flips every row back to `indexed = 0`, returning the number of rows touched.
    async fn reset_indexed(&self) -> Result<u64>;
}

#[derive(Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and applies pending migrations.
    pub async fn open(database_url: &str) -> Result<Self> {
        let pool = connect(database_url).await?;
        migrate(&pool).await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn get(&self, name: &str) -> Result<Option<LedgerEntry>> {
        let entry = sqlx::query_as::<_, LedgerEntry>(
            "SELECT name, pdf_path, txt_path, indexed FROM ledger WHERE name = ?1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }

    async fn unindexed(&self) -> Result<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            "SELECT name, pdf_path, txt_path, indexed FROM ledger WHERE indexed = 0 ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn known_pdf_paths(&self) -> Result<HashSet<String>> {
        let paths: Vec<String> = sqlx::query_scalar("SELECT pdf_path FROM ledger")
            .fetch_all(&self.pool)
            .await?;
        Ok(paths.into_iter().collect())
    }

    async fn register(&self, entries: &[LedgerEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO ledger (name, pdf_path, txt_path, indexed, updated_at)
                VALUES (?1, ?2, ?3, 0, strftime('%s','now'))
                ON CONFLICT(name) DO UPDATE SET
                    pdf_path = excluded.pdf_path,
                    txt_path = excluded.txt_path,
                    indexed = 0,
                    updated_at = strftime('%s','now')
                "#,
            )
            .bind(&entry.name)
            .bind(&entry.pdf_path)
            .bind(&entry.txt_path)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!(count = entries.len(), "registered ledger entries");
        Ok(())
    }

    async fn mark_indexed(&self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for name in names {
            sqlx::query(
                "UPDATE ledger SET indexed = 1, updated_at = strftime('%s','now') WHERE name = ?1",
            )
            .bind(name)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!(count = names.len(), "marked ledger entries as indexed");
        Ok(())
    }

    async fn reset_indexed(&self) -> Result<u64> {
        let res = sqlx::query(
            "UPDATE ledger SET indexed = 0, updated_at = strftime('%s','now') WHERE indexed != 0",
        )
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }
}
