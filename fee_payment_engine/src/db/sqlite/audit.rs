use chrono::{DateTime, Utc};
use log::trace;
use serde_json::Value;
use sqlx::{types::Json, SqliteConnection};

use crate::{db_types::AuditLogEntry, fpe_api::errors::FeeEngineError};

#[derive(Debug, Clone)]
pub struct NewAuditEntry<'a> {
    pub entity_type: &'static str,
    pub entity_id: &'a str,
    pub action: &'static str,
    pub actor_id: &'a str,
    pub detail: Value,
    pub created_at: DateTime<Utc>,
}

pub async fn append(entry: NewAuditEntry<'_>, conn: &mut SqliteConnection) -> Result<(), FeeEngineError> {
    trace!("🗃️ audit: {} {} {} by {}", entry.entity_type, entry.entity_id, entry.action, entry.actor_id);
    sqlx::query(
        r#"
            INSERT INTO audit_log (entity_type, entity_id, action, actor_id, detail, created_at)
            VALUES ($1, $2, $3, $4, $5, $6);
        "#,
    )
    .bind(entry.entity_type)
    .bind(entry.entity_id)
    .bind(entry.action)
    .bind(entry.actor_id)
    .bind(Json(&entry.detail))
    .bind(entry.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_for_entity(
    entity_type: &str,
    entity_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<AuditLogEntry>, FeeEngineError> {
    let entries = sqlx::query_as::<_, AuditLogEntry>(
        "SELECT * FROM audit_log WHERE entity_type = $1 AND entity_id = $2 ORDER BY id ASC",
    )
    .bind(entity_type)
    .bind(entity_id)
    .fetch_all(conn)
    .await?;
    Ok(entries)
}
