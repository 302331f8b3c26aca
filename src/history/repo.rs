use anyhow::Context;
use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::history::repo_types::{HistoryEntry, HistoryRow, PredictionKind};

/// Append-only log of predictions per user.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn insert(
        &self,
        user_id: Uuid,
        kind: PredictionKind,
        input_summary: &str,
        result_summary: &str,
        created_at: OffsetDateTime,
    ) -> anyhow::Result<HistoryEntry>;

    /// Newest first.
    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<HistoryEntry>>;
}

#[derive(Clone)]
pub struct PgHistoryStore {
    db: PgPool,
}

impl PgHistoryStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn insert(
        &self,
        user_id: Uuid,
        kind: PredictionKind,
        input_summary: &str,
        result_summary: &str,
        created_at: OffsetDateTime,
    ) -> anyhow::Result<HistoryEntry> {
        let row = sqlx::query_as::<_, HistoryRow>(
            r#"
            INSERT INTO prediction_history (user_id, kind, input_summary, result_summary, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, kind, input_summary, result_summary, created_at
            "#,
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(input_summary)
        .bind(result_summary)
        .bind(created_at)
        .fetch_one(&self.db)
        .await
        .context("insert prediction history")?;
        row.try_into()
    }

    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<HistoryEntry>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT id, user_id, kind, input_summary, result_summary, created_at
            FROM prediction_history
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list prediction history")?;
        rows.into_iter().map(HistoryEntry::try_from).collect()
    }
}

#[derive(Default)]
struct MemoryLog {
    next_id: i64,
    entries: Vec<HistoryEntry>,
}

#[derive(Default)]
pub struct MemoryHistoryStore {
    log: RwLock<MemoryLog>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn insert(
        &self,
        user_id: Uuid,
        kind: PredictionKind,
        input_summary: &str,
        result_summary: &str,
        created_at: OffsetDateTime,
    ) -> anyhow::Result<HistoryEntry> {
        let mut log = self.log.write();
        log.next_id += 1;
        let entry = HistoryEntry {
            id: log.next_id,
            user_id,
            kind,
            input_summary: input_summary.to_string(),
            result_summary: result_summary.to_string(),
            created_at,
        };
        log.entries.push(entry.clone());
        Ok(entry)
    }

    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<HistoryEntry>> {
        let mut entries: Vec<HistoryEntry> = self
            .log
            .read()
            .entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(entries)
    }
}
