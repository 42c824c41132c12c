//! Schema migrations.
//!
//! Applied migrations are recorded in the `schema_migration` table keyed by
//! `{module}_{id}`, so re-running is a no-op.

use anyhow::Context;
use serde::Serialize;

use crate::client::Database;
use crate::clock;
use crate::error::StoreResult;

const LEDGER_TABLE: &str = "schema_migration";

/// A SurrealQL migration contributed by a module.
#[derive(Debug, Clone)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
}

#[derive(Serialize)]
struct LedgerEntry {
    module: String,
    migration: String,
    applied_at: String,
}

impl Database {
    /// Apply `(module, migration)` pairs in order, skipping those already
    /// recorded. Returns how many were applied.
    pub async fn apply_migrations(&self, migrations: &[(String, Migration)]) -> StoreResult<usize> {
        let mut applied = 0;

        for (module, migration) in migrations {
            let key = format!("{module}_{}", migration.id);
            if self.migration_recorded(&key).await? {
                tracing::debug!(target: "folio-db", %key, "migration already applied");
                continue;
            }

            tracing::info!(target: "folio-db", module = %module, migration = migration.id, "applying migration");

            self.client()
                .query(migration.up)
                .await
                .and_then(|response| response.check())
                .with_context(|| format!("migration '{key}' failed"))?;

            let entry = LedgerEntry {
                module: module.clone(),
                migration: migration.id.to_string(),
                applied_at: clock::now_iso8601(),
            };
            self.client()
                .query("CREATE type::thing($table, $key) CONTENT $entry RETURN NONE")
                .bind(("table", LEDGER_TABLE))
                .bind(("key", key.clone()))
                .bind(("entry", entry))
                .await
                .and_then(|response| response.check())
                .with_context(|| format!("failed to record migration '{key}'"))?;

            applied += 1;
        }

        Ok(applied)
    }

    async fn migration_recorded(&self, key: &str) -> StoreResult<bool> {
        let mut response = self
            .client()
            .query("SELECT VALUE migration FROM type::thing($table, $key)")
            .bind(("table", LEDGER_TABLE))
            .bind(("key", key.to_string()))
            .await
            .and_then(|response| response.check())
            .context("failed to read migration ledger")?;
        let rows: Vec<String> = response
            .take(0)
            .context("failed to decode migration ledger")?;
        Ok(!rows.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ConnectOptions;

    fn migrations() -> Vec<(String, Migration)> {
        vec![(
            "catalogue".to_string(),
            Migration {
                id: "001_init",
                up: "DEFINE TABLE IF NOT EXISTS shelf SCHEMALESS;",
            },
        )]
    }

    #[tokio::test]
    async fn migrations_apply_once() {
        let db = Database::connect(&ConnectOptions::in_memory()).await.unwrap();

        assert_eq!(db.apply_migrations(&migrations()).await.unwrap(), 1);
        assert_eq!(db.apply_migrations(&migrations()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failing_migration_is_reported() {
        let db = Database::connect(&ConnectOptions::in_memory()).await.unwrap();
        let broken = vec![(
            "catalogue".to_string(),
            Migration {
                id: "002_broken",
                up: "DEFINE NONSENSE;",
            },
        )];

        let err = db.apply_migrations(&broken).await.unwrap_err();
        assert!(err.to_string().contains("002_broken"));
    }
}
