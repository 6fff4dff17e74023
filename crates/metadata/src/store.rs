//! Metadata store trait and SQLite implementation.

use crate::error::{MetadataError, MetadataResult, map_unique_violation};
use crate::repos::{GrantRepo, RecipientRepo, ServiceAccountRepo, ShareRepo, TokenRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore:
    RecipientRepo + TokenRepo + ShareRepo + GrantRepo + ServiceAccountRepo + Send + Sync
{
    /// Apply the schema.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // A single connection serializes writers, which the rotation and
            // grant replacement transactions rely on.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// Implement all the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use sharegate_core::GrantOptions;
    use time::OffsetDateTime;
    use uuid::Uuid;

    const TABLE_ENTRY_SELECT: &str = r#"
        SELECT t.table_id AS table_id, s.share_id AS share_id, s.name AS share_name,
               sc.name AS schema_name, t.name AS table_name, t.location AS location
        FROM share_tables t
        JOIN share_schemas sc ON sc.schema_id = t.schema_id
        JOIN shares s ON s.share_id = sc.share_id
    "#;

    #[async_trait]
    impl RecipientRepo for SqliteStore {
        async fn create_recipient(&self, recipient: &RecipientRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO recipients (recipient_id, name, description, is_system, created_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(recipient.recipient_id)
            .bind(&recipient.name)
            .bind(&recipient.description)
            .bind(recipient.is_system)
            .bind(recipient.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                map_unique_violation(e, || format!("recipient '{}'", recipient.name))
            })?;
            Ok(())
        }

        async fn get_recipient(&self, recipient_id: Uuid) -> MetadataResult<Option<RecipientRow>> {
            let row = sqlx::query_as::<_, RecipientRow>(
                "SELECT * FROM recipients WHERE recipient_id = ?",
            )
            .bind(recipient_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn get_recipient_by_name(&self, name: &str) -> MetadataResult<Option<RecipientRow>> {
            let row = sqlx::query_as::<_, RecipientRow>("SELECT * FROM recipients WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn list_recipients(&self) -> MetadataResult<Vec<RecipientRow>> {
            let rows = sqlx::query_as::<_, RecipientRow>("SELECT * FROM recipients ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
            Ok(rows)
        }

        async fn delete_recipient(&self, recipient_id: Uuid) -> MetadataResult<bool> {
            let result = sqlx::query("DELETE FROM recipients WHERE recipient_id = ?")
                .bind(recipient_id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        }
    }

    #[async_trait]
    impl TokenRepo for SqliteStore {
        async fn create_token(&self, token: &RecipientTokenRow) -> MetadataResult<()> {
            insert_token(&mut *self.pool.acquire().await?, token).await
        }

        async fn get_token(&self, token_id: Uuid) -> MetadataResult<Option<RecipientTokenRow>> {
            let row = sqlx::query_as::<_, RecipientTokenRow>(
                "SELECT * FROM recipient_tokens WHERE token_id = ?",
            )
            .bind(token_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn list_active_tokens(&self) -> MetadataResult<Vec<RecipientTokenRow>> {
            let rows = sqlx::query_as::<_, RecipientTokenRow>(
                "SELECT * FROM recipient_tokens WHERE active = 1 ORDER BY created_at DESC",
            )
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn list_tokens_for_recipient(
            &self,
            recipient_id: Uuid,
        ) -> MetadataResult<Vec<RecipientTokenRow>> {
            let rows = sqlx::query_as::<_, RecipientTokenRow>(
                "SELECT * FROM recipient_tokens WHERE recipient_id = ? ORDER BY created_at DESC",
            )
            .bind(recipient_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn rotate_token(&self, token: &RecipientTokenRow) -> MetadataResult<u64> {
            let mut tx = self.pool.begin().await?;

            let deactivated = sqlx::query(
                "UPDATE recipient_tokens SET active = 0 WHERE recipient_id = ? AND active = 1",
            )
            .bind(token.recipient_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            insert_token(&mut tx, token).await?;

            tx.commit().await?;
            Ok(deactivated)
        }

        async fn deactivate_token(&self, token_id: Uuid) -> MetadataResult<()> {
            sqlx::query("UPDATE recipient_tokens SET active = 0 WHERE token_id = ?")
                .bind(token_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }

        async fn touch_token(&self, token_id: Uuid, used_at: OffsetDateTime) -> MetadataResult<()> {
            sqlx::query("UPDATE recipient_tokens SET last_used_at = ? WHERE token_id = ?")
                .bind(used_at)
                .bind(token_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }
    }

    async fn insert_token(
        conn: &mut sqlx::SqliteConnection,
        token: &RecipientTokenRow,
    ) -> MetadataResult<()> {
        sqlx::query(
            r#"
            INSERT INTO recipient_tokens (
                token_id, recipient_id, token_hash, token_hint, created_at,
                expires_at, active, last_used_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(token.token_id)
        .bind(token.recipient_id)
        .bind(&token.token_hash)
        .bind(&token.token_hint)
        .bind(token.created_at)
        .bind(token.expires_at)
        .bind(token.active)
        .bind(token.last_used_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_unique_violation(e, || format!("token {}", token.token_id)))?;
        Ok(())
    }

    #[async_trait]
    impl ShareRepo for SqliteStore {
        async fn create_share(&self, share: &ShareRow) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO shares (share_id, name, description, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(share.share_id)
            .bind(&share.name)
            .bind(&share.description)
            .bind(share.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, || format!("share '{}'", share.name)))?;
            Ok(())
        }

        async fn get_share(&self, share_id: Uuid) -> MetadataResult<Option<ShareRow>> {
            let row = sqlx::query_as::<_, ShareRow>("SELECT * FROM shares WHERE share_id = ?")
                .bind(share_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_share_by_name(&self, name: &str) -> MetadataResult<Option<ShareRow>> {
            let row = sqlx::query_as::<_, ShareRow>("SELECT * FROM shares WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn list_shares(&self) -> MetadataResult<Vec<ShareRow>> {
            let rows = sqlx::query_as::<_, ShareRow>("SELECT * FROM shares ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
            Ok(rows)
        }

        async fn create_schema(&self, schema: &SchemaRow) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO share_schemas (schema_id, share_id, name, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(schema.schema_id)
            .bind(schema.share_id)
            .bind(&schema.name)
            .bind(schema.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, || format!("schema '{}'", schema.name)))?;
            Ok(())
        }

        async fn get_schema(
            &self,
            share_id: Uuid,
            name: &str,
        ) -> MetadataResult<Option<SchemaRow>> {
            let row = sqlx::query_as::<_, SchemaRow>(
                "SELECT * FROM share_schemas WHERE share_id = ? AND name = ?",
            )
            .bind(share_id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn list_schemas(&self, share_id: Uuid) -> MetadataResult<Vec<SchemaRow>> {
            let rows = sqlx::query_as::<_, SchemaRow>(
                "SELECT * FROM share_schemas WHERE share_id = ? ORDER BY name",
            )
            .bind(share_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn create_table(&self, table: &TableRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO share_tables (table_id, schema_id, name, location, created_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(table.table_id)
            .bind(table.schema_id)
            .bind(&table.name)
            .bind(&table.location)
            .bind(table.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, || format!("table '{}'", table.name)))?;
            Ok(())
        }

        async fn list_tables(
            &self,
            share_id: Uuid,
            schema: Option<&str>,
        ) -> MetadataResult<Vec<TableEntryRow>> {
            let rows = match schema {
                Some(schema) => {
                    sqlx::query_as::<_, TableEntryRow>(&format!(
                        "{TABLE_ENTRY_SELECT} WHERE s.share_id = ? AND sc.name = ? ORDER BY t.name"
                    ))
                    .bind(share_id)
                    .bind(schema)
                    .fetch_all(&self.pool)
                    .await?
                }
                None => {
                    sqlx::query_as::<_, TableEntryRow>(&format!(
                        "{TABLE_ENTRY_SELECT} WHERE s.share_id = ? ORDER BY sc.name, t.name"
                    ))
                    .bind(share_id)
                    .fetch_all(&self.pool)
                    .await?
                }
            };
            Ok(rows)
        }

        async fn resolve_table(
            &self,
            share_id: Uuid,
            schema: &str,
            table: &str,
        ) -> MetadataResult<Option<TableEntryRow>> {
            let row = sqlx::query_as::<_, TableEntryRow>(&format!(
                "{TABLE_ENTRY_SELECT} WHERE s.share_id = ? AND sc.name = ? AND t.name = ?"
            ))
            .bind(share_id)
            .bind(schema)
            .bind(table)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }
    }

    #[async_trait]
    impl GrantRepo for SqliteStore {
        async fn upsert_grant(
            &self,
            recipient_id: Uuid,
            share_id: Uuid,
            options: &GrantOptions,
            now: OffsetDateTime,
        ) -> MetadataResult<AccessGrantRow> {
            let mut tx = self.pool.begin().await?;

            let existing = fetch_grant(&mut tx, recipient_id, share_id).await?;
            let row = match existing {
                Some(current) => {
                    let settings = options.apply_to(current.settings());
                    write_grant_settings(&mut tx, &current, &settings, now).await?
                }
                None => {
                    let settings = options.resolve_new();
                    let row = AccessGrantRow {
                        grant_id: Uuid::new_v4(),
                        recipient_id,
                        share_id,
                        granted_by: settings.granted_by,
                        granted_at: now,
                        expires_at: settings.expires_at,
                        can_download: settings.can_download,
                        can_query: settings.can_query,
                        max_rows_per_query: settings.max_rows_per_query,
                        updated_at: now,
                    };
                    insert_grant(&mut tx, &row).await?;
                    row
                }
            };

            tx.commit().await?;
            Ok(row)
        }

        async fn update_grant(
            &self,
            recipient_id: Uuid,
            share_id: Uuid,
            options: &GrantOptions,
            now: OffsetDateTime,
        ) -> MetadataResult<Option<AccessGrantRow>> {
            let mut tx = self.pool.begin().await?;

            let Some(current) = fetch_grant(&mut tx, recipient_id, share_id).await? else {
                return Ok(None);
            };
            let settings = options.apply_to(current.settings());
            let row = write_grant_settings(&mut tx, &current, &settings, now).await?;

            tx.commit().await?;
            Ok(Some(row))
        }

        async fn delete_grant(&self, recipient_id: Uuid, share_id: Uuid) -> MetadataResult<bool> {
            let result =
                sqlx::query("DELETE FROM access_grants WHERE recipient_id = ? AND share_id = ?")
                    .bind(recipient_id)
                    .bind(share_id)
                    .execute(&self.pool)
                    .await?;
            Ok(result.rows_affected() > 0)
        }

        async fn replace_grants(
            &self,
            recipient_id: Uuid,
            share_ids: &[Uuid],
            granted_by: Option<&str>,
            now: OffsetDateTime,
        ) -> MetadataResult<u64> {
            let mut tx = self.pool.begin().await?;

            sqlx::query("DELETE FROM access_grants WHERE recipient_id = ?")
                .bind(recipient_id)
                .execute(&mut *tx)
                .await?;

            let mut seen = std::collections::HashSet::new();
            let mut inserted = 0u64;
            for &share_id in share_ids {
                if !seen.insert(share_id) {
                    continue;
                }
                let defaults = GrantOptions::default().resolve_new();
                let row = AccessGrantRow {
                    grant_id: Uuid::new_v4(),
                    recipient_id,
                    share_id,
                    granted_by: granted_by.map(str::to_string),
                    granted_at: now,
                    expires_at: defaults.expires_at,
                    can_download: defaults.can_download,
                    can_query: defaults.can_query,
                    max_rows_per_query: defaults.max_rows_per_query,
                    updated_at: now,
                };
                // An error drops `tx` uncommitted, which rolls back the delete.
                insert_grant(&mut tx, &row).await?;
                inserted += 1;
            }

            tx.commit().await?;
            Ok(inserted)
        }

        async fn get_grant(
            &self,
            recipient_id: Uuid,
            share_id: Uuid,
        ) -> MetadataResult<Option<AccessGrantRow>> {
            fetch_grant(&mut *self.pool.acquire().await?, recipient_id, share_id).await
        }

        async fn list_grants_for_recipient(
            &self,
            recipient_id: Uuid,
        ) -> MetadataResult<Vec<AccessGrantRow>> {
            let rows = sqlx::query_as::<_, AccessGrantRow>(
                "SELECT * FROM access_grants WHERE recipient_id = ? ORDER BY granted_at",
            )
            .bind(recipient_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }

    async fn fetch_grant(
        conn: &mut sqlx::SqliteConnection,
        recipient_id: Uuid,
        share_id: Uuid,
    ) -> MetadataResult<Option<AccessGrantRow>> {
        let row = sqlx::query_as::<_, AccessGrantRow>(
            "SELECT * FROM access_grants WHERE recipient_id = ? AND share_id = ?",
        )
        .bind(recipient_id)
        .bind(share_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row)
    }

    async fn insert_grant(
        conn: &mut sqlx::SqliteConnection,
        row: &AccessGrantRow,
    ) -> MetadataResult<()> {
        sqlx::query(
            r#"
            INSERT INTO access_grants (
                grant_id, recipient_id, share_id, granted_by, granted_at, expires_at,
                can_download, can_query, max_rows_per_query, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.grant_id)
        .bind(row.recipient_id)
        .bind(row.share_id)
        .bind(&row.granted_by)
        .bind(row.granted_at)
        .bind(row.expires_at)
        .bind(row.can_download)
        .bind(row.can_query)
        .bind(row.max_rows_per_query)
        .bind(row.updated_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            map_unique_violation(e, || {
                format!(
                    "grant for recipient {} on share {}",
                    row.recipient_id, row.share_id
                )
            })
        })?;
        Ok(())
    }

    async fn write_grant_settings(
        conn: &mut sqlx::SqliteConnection,
        current: &AccessGrantRow,
        settings: &sharegate_core::GrantSettings,
        now: OffsetDateTime,
    ) -> MetadataResult<AccessGrantRow> {
        sqlx::query(
            r#"
            UPDATE access_grants
            SET granted_by = ?, expires_at = ?, can_download = ?, can_query = ?,
                max_rows_per_query = ?, updated_at = ?
            WHERE grant_id = ?
            "#,
        )
        .bind(&settings.granted_by)
        .bind(settings.expires_at)
        .bind(settings.can_download)
        .bind(settings.can_query)
        .bind(settings.max_rows_per_query)
        .bind(now)
        .bind(current.grant_id)
        .execute(&mut *conn)
        .await?;

        Ok(AccessGrantRow {
            granted_by: settings.granted_by.clone(),
            expires_at: settings.expires_at,
            can_download: settings.can_download,
            can_query: settings.can_query,
            max_rows_per_query: settings.max_rows_per_query,
            updated_at: now,
            ..current.clone()
        })
    }

    #[async_trait]
    impl ServiceAccountRepo for SqliteStore {
        async fn get_service_account(&self) -> MetadataResult<Option<ServiceAccountRow>> {
            let row = sqlx::query_as::<_, ServiceAccountRow>(
                "SELECT * FROM service_account WHERE account_key = ?",
            )
            .bind(SERVICE_ACCOUNT_KEY)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn put_service_account(&self, row: &ServiceAccountRow) -> MetadataResult<()> {
            if row.account_key != SERVICE_ACCOUNT_KEY {
                return Err(MetadataError::Constraint(format!(
                    "service account key must be '{SERVICE_ACCOUNT_KEY}'"
                )));
            }
            sqlx::query(
                r#"
                INSERT INTO service_account (account_key, ciphertext, recipient_id, updated_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(account_key) DO UPDATE SET
                    ciphertext = excluded.ciphertext,
                    recipient_id = excluded.recipient_id,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&row.account_key)
            .bind(&row.ciphertext)
            .bind(row.recipient_id)
            .bind(row.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }
    }
}

/// SQL schema for SQLite.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS recipients (
    recipient_id BLOB PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    is_system INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS recipient_tokens (
    token_id BLOB PRIMARY KEY,
    recipient_id BLOB NOT NULL REFERENCES recipients(recipient_id) ON DELETE CASCADE,
    token_hash TEXT NOT NULL,
    token_hint TEXT NOT NULL,
    created_at TEXT NOT NULL,
    expires_at TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    last_used_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_recipient_tokens_recipient ON recipient_tokens(recipient_id);
CREATE INDEX IF NOT EXISTS idx_recipient_tokens_active ON recipient_tokens(active, token_hint);

CREATE TABLE IF NOT EXISTS shares (
    share_id BLOB PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS share_schemas (
    schema_id BLOB PRIMARY KEY,
    share_id BLOB NOT NULL REFERENCES shares(share_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(share_id, name)
);

CREATE TABLE IF NOT EXISTS share_tables (
    table_id BLOB PRIMARY KEY,
    schema_id BLOB NOT NULL REFERENCES share_schemas(schema_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    location TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(schema_id, name)
);

CREATE TABLE IF NOT EXISTS access_grants (
    grant_id BLOB PRIMARY KEY,
    recipient_id BLOB NOT NULL REFERENCES recipients(recipient_id) ON DELETE CASCADE,
    share_id BLOB NOT NULL REFERENCES shares(share_id) ON DELETE CASCADE,
    granted_by TEXT,
    granted_at TEXT NOT NULL,
    expires_at TEXT,
    can_download INTEGER NOT NULL DEFAULT 1,
    can_query INTEGER NOT NULL DEFAULT 1,
    max_rows_per_query INTEGER CHECK (max_rows_per_query IS NULL OR max_rows_per_query > 0),
    updated_at TEXT NOT NULL,
    UNIQUE(recipient_id, share_id)
);
CREATE INDEX IF NOT EXISTS idx_access_grants_share ON access_grants(share_id);

CREATE TABLE IF NOT EXISTS service_account (
    account_key TEXT PRIMARY KEY CHECK (account_key = 'system'),
    ciphertext TEXT NOT NULL,
    recipient_id BLOB NOT NULL REFERENCES recipients(recipient_id) ON DELETE CASCADE,
    updated_at TEXT NOT NULL
);
"#;
