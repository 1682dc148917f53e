//! Repository for backend server entries

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::api::models::ServerCredential;
use crate::api::resolver::ServerDirectory;

/// One row of the `servers` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ServerRecord {
    pub id: String,
    pub name: String,
    pub url: String,
    pub username: String,
    pub password: String,
    pub is_default: bool,
    pub is_active: bool,
}

impl ServerRecord {
    pub fn credential(&self) -> ServerCredential {
        ServerCredential::new(self.url.clone(), self.username.clone(), self.password.clone())
    }
}

const SELECT_COLUMNS: &str = "SELECT id, name, url, username, password, is_default, is_active FROM servers";

/// Insert or update a server
pub async fn upsert(pool: &SqlitePool, record: &ServerRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO servers (id, name, url, username, password, is_default, is_active, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            url = excluded.url,
            username = excluded.username,
            password = excluded.password,
            is_default = excluded.is_default,
            is_active = excluded.is_active,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&record.id)
    .bind(&record.name)
    .bind(&record.url)
    .bind(&record.username)
    .bind(&record.password)
    .bind(record.is_default)
    .bind(record.is_active)
    .execute(pool)
    .await
    .with_context(|| format!("Failed to save server '{}'", record.id))?;

    if record.is_default {
        set_default(pool, &record.id).await?;
    }

    log::info!("Saved server: {}", record.id);
    Ok(())
}

/// Get server by id
pub async fn get(pool: &SqlitePool, id: &str) -> Result<Option<ServerRecord>> {
    sqlx::query_as(&format!("{} WHERE id = ?", SELECT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get server '{}'", id))
}

/// Get the server flagged both default and active
pub async fn get_default_active(pool: &SqlitePool) -> Result<Option<ServerRecord>> {
    sqlx::query_as(&format!(
        "{} WHERE is_default = 1 AND is_active = 1 ORDER BY updated_at DESC LIMIT 1",
        SELECT_COLUMNS
    ))
    .fetch_optional(pool)
    .await
    .context("Failed to get default server")
}

/// List all servers
pub async fn list(pool: &SqlitePool) -> Result<Vec<ServerRecord>> {
    sqlx::query_as(&format!("{} ORDER BY id", SELECT_COLUMNS))
        .fetch_all(pool)
        .await
        .context("Failed to list servers")
}

/// Delete server by id
pub async fn delete(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM servers WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to delete server '{}'", id))?;

    if result.rows_affected() == 0 {
        anyhow::bail!("Server '{}' not found", id);
    }

    log::info!("Deleted server: {}", id);
    Ok(())
}

/// Make `id` the only default server
pub async fn set_default(pool: &SqlitePool, id: &str) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to start transaction")?;

    let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM servers WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to check if server exists")?;

    if exists == 0 {
        anyhow::bail!("Server '{}' not found", id);
    }

    sqlx::query("UPDATE servers SET is_default = CASE WHEN id = ? THEN 1 ELSE 0 END")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to update default server")?;

    tx.commit().await.context("Failed to commit transaction")?;

    log::info!("Set default server: {}", id);
    Ok(())
}

/// [`ServerDirectory`] backed by the `servers` table
#[derive(Debug, Clone)]
pub struct SqliteDirectory {
    pool: SqlitePool,
}

impl SqliteDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ServerDirectory for SqliteDirectory {
    async fn find_by_id(&self, id: &str) -> Result<Option<ServerCredential>> {
        Ok(get(&self.pool, id).await?.map(|record| record.credential()))
    }

    async fn find_default_active(&self) -> Result<Option<ServerCredential>> {
        Ok(get_default_active(&self.pool).await?.map(|record| record.credential()))
    }
}
