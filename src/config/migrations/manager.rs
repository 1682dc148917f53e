//! Migration manager for running pending migrations

use anyhow::{Context, Result};
use log::{debug, info};
use sqlx::SqlitePool;

use super::{Migration, calculate_checksum, get_pending_migrations, init_migration_table, validate_migrations};

pub struct MigrationManager<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MigrationManager<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Run all pending migrations
    pub async fn migrate_up(&self) -> Result<()> {
        debug!("Initializing migration system");
        init_migration_table(self.pool).await?;
        validate_migrations(self.pool).await?;

        let pending = get_pending_migrations(self.pool).await?;
        if pending.is_empty() {
            debug!("No pending migrations");
            return Ok(());
        }

        info!("Running {} pending migrations", pending.len());
        for migration in pending {
            self.apply(&migration).await?;
        }

        Ok(())
    }

    async fn apply(&self, migration: &Migration) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to start transaction")?;

        sqlx::raw_sql(&migration.up_sql)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to apply migration {} '{}'", migration.version, migration.name))?;

        sqlx::query("INSERT INTO schema_migrations (version, name, checksum) VALUES (?, ?, ?)")
            .bind(migration.version)
            .bind(&migration.name)
            .bind(calculate_checksum(&migration.up_sql))
            .execute(&mut *tx)
            .await
            .context("Failed to record migration")?;

        tx.commit().await.context("Failed to commit migration")?;

        info!("Applied migration {} '{}'", migration.version, migration.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::db;
    use crate::config::migrations::get_applied_migrations;

    #[tokio::test]
    async fn test_migrate_up_is_idempotent() {
        let pool = db::connect_memory().await.unwrap();
        let manager = MigrationManager::new(&pool);

        manager.migrate_up().await.unwrap();
        manager.migrate_up().await.unwrap();

        let applied = get_applied_migrations(&pool).await.unwrap();
        assert_eq!(applied.len(), 2);
        assert_eq!(applied[0].name, "servers");
    }
}
