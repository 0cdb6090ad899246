//! PostgreSQL snapshot store for production use.
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
//! - `DB_MIN_CONNECTIONS`: Minimum idle connections (default: 2)
//! - `DB_CONNECT_TIMEOUT_SECS`: Connection timeout (default: 10)
//! - `DB_IDLE_TIMEOUT_SECS`: Idle connection timeout (default: 300)
//! - `DB_MAX_LIFETIME_SECS`: Max connection lifetime (default: 1800)
//!
//! ## Schema
//!
//! See [`SNAPSHOT_SCHEMA`]. Items cascade with their snapshot. Author id 0
//! stands for an anonymous change.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use super::SnapshotStore;
use crate::types::snapshot::is_well_formed_hash;
use crate::types::{
    DraftError, ItemSource, Origin, RecordId, RecordRef, Snapshot, SnapshotDraft, SnapshotEvent,
    SnapshotId, SnapshotItem,
};

/// DDL statements creating the snapshot tables, in execution order.
pub const SNAPSHOT_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS snapshot_event (
        id BIGSERIAL PRIMARY KEY,
        title VARCHAR(255) NOT NULL,
        created TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS versioned_snapshot (
        id BIGSERIAL PRIMARY KEY,
        origin_hash VARCHAR(64) NOT NULL,
        message VARCHAR(255) NOT NULL DEFAULT '',
        origin_class VARCHAR(255) NOT NULL,
        origin_id BIGINT NOT NULL,
        author_id BIGINT NOT NULL DEFAULT 0,
        created TIMESTAMPTZ NOT NULL,
        last_edited TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_versioned_snapshot_origin_hash
        ON versioned_snapshot (origin_hash)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_versioned_snapshot_origin_recent
        ON versioned_snapshot (origin_class, origin_id, last_edited DESC, id DESC)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS versioned_snapshot_item (
        id BIGSERIAL PRIMARY KEY,
        snapshot_id BIGINT NOT NULL REFERENCES versioned_snapshot (id) ON DELETE CASCADE,
        object_hash VARCHAR(64) NOT NULL,
        object_class VARCHAR(255) NOT NULL,
        object_id BIGINT NOT NULL,
        version INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_versioned_snapshot_item_snapshot
        ON versioned_snapshot_item (snapshot_id, id)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_versioned_snapshot_item_object_hash
        ON versioned_snapshot_item (object_hash)
    "#,
];

const SNAPSHOT_COLUMNS: &str =
    "id, origin_hash, message, origin_class, origin_id, author_id, created, last_edited";

/// Configuration for PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum connections in pool (default: 10).
    pub max_connections: u32,
    /// Minimum idle connections to keep warm (default: 2).
    pub min_connections: u32,
    /// Connection acquire timeout in seconds (default: 10).
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds (default: 300 = 5 min).
    pub idle_timeout_secs: u64,
    /// Maximum connection lifetime in seconds (default: 1800 = 30 min).
    pub max_lifetime_secs: u64,
}

impl PostgresConfig {
    /// Load configuration from environment variables with production defaults.
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/snapshots".to_string()),
            max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            min_connections: env_or("DB_MIN_CONNECTIONS", 2),
            connect_timeout_secs: env_or("DB_CONNECT_TIMEOUT_SECS", 10),
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT_SECS", 300),
            max_lifetime_secs: env_or("DB_MAX_LIFETIME_SECS", 1800),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Error type for PostgreSQL store.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Draft rejected before the transaction started.
    #[error("Validation failed: {0}")]
    Validation(#[from] DraftError),
    /// Value does not fit the column it is written to or read from.
    #[error("Value {value} out of range for column {column}")]
    OutOfRange {
        /// Column name.
        column: &'static str,
        /// Offending value.
        value: i128,
    },
    /// Stored row holds a value no snapshot could have written.
    #[error("Corrupt {column} in row {id}: {value:?}")]
    CorruptRow {
        /// Column name.
        column: &'static str,
        /// Row id.
        id: i64,
        /// Stored value.
        value: String,
    },
}

/// Convert between Rust and column integer types without wrapping.
fn fit_column<T, U>(column: &'static str, value: T) -> Result<U, PostgresError>
where
    T: Copy + Into<i128>,
    U: TryFrom<T>,
{
    U::try_from(value).map_err(|_| PostgresError::OutOfRange {
        column,
        value: value.into(),
    })
}

fn checked_hash(column: &'static str, id: i64, hash: String) -> Result<String, PostgresError> {
    if is_well_formed_hash(&hash) {
        Ok(hash)
    } else {
        Err(PostgresError::CorruptRow {
            column,
            id,
            value: hash,
        })
    }
}

/// PostgreSQL snapshot store.
pub struct PostgresSnapshotStore {
    pool: PgPool,
}

impl PostgresSnapshotStore {
    /// Create a new store with the given configuration.
    pub async fn new(config: PostgresConfig) -> Result<Self, sqlx::Error> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            connect_timeout_secs = config.connect_timeout_secs,
            "Initializing PostgreSQL connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a store from environment variables.
    pub async fn from_env() -> Result<Self, sqlx::Error> {
        Self::new(PostgresConfig::from_env()).await
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the snapshot tables if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), PostgresError> {
        for statement in SNAPSHOT_SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Check if the database is reachable.
    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    /// Parse a snapshot header row. Items are attached separately.
    fn parse_snapshot_row(row: &PgRow) -> Result<Snapshot, PostgresError> {
        let id: i64 = row.try_get("id")?;
        let origin_class: String = row.try_get("origin_class")?;
        let origin_id: i64 = row.try_get("origin_id")?;
        let author_id: i64 = row.try_get("author_id")?;
        let created: DateTime<Utc> = row.try_get("created")?;
        let last_edited: DateTime<Utc> = row.try_get("last_edited")?;
        let origin_hash = checked_hash("origin_hash", id, row.try_get("origin_hash")?)?;

        Ok(Snapshot {
            id: fit_column("id", id)?,
            origin: RecordRef::new(origin_class, fit_column("origin_id", origin_id)?),
            origin_hash,
            message: row.try_get("message")?,
            author_id: match author_id {
                0 => None,
                author => Some(fit_column("author_id", author)?),
            },
            items: Vec::new(),
            created,
            last_edited,
        })
    }

    fn parse_item_row(row: &PgRow) -> Result<SnapshotItem, PostgresError> {
        let id: i64 = row.try_get("id")?;
        let snapshot_id: i64 = row.try_get("snapshot_id")?;
        let object_class: String = row.try_get("object_class")?;
        let object_id: i64 = row.try_get("object_id")?;
        let version: i32 = row.try_get("version")?;
        let object_hash = checked_hash("object_hash", id, row.try_get("object_hash")?)?;

        Ok(SnapshotItem {
            id: fit_column("id", id)?,
            snapshot_id: fit_column("snapshot_id", snapshot_id)?,
            object: RecordRef::new(object_class, fit_column("object_id", object_id)?),
            version: fit_column("version", version)?,
            object_hash,
        })
    }

    /// Load items for a set of snapshots, preserving insertion order.
    async fn attach_items(&self, snapshots: &mut [Snapshot]) -> Result<(), PostgresError> {
        if snapshots.is_empty() {
            return Ok(());
        }

        let ids = snapshots
            .iter()
            .map(|s| fit_column::<_, i64>("snapshot_id", s.id))
            .collect::<Result<Vec<_>, _>>()?;
        let rows = sqlx::query(
            r#"
            SELECT id, snapshot_id, object_hash, object_class, object_id, version
            FROM versioned_snapshot_item
            WHERE snapshot_id = ANY($1)
            ORDER BY snapshot_id ASC, id ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_snapshot: BTreeMap<SnapshotId, Vec<SnapshotItem>> = BTreeMap::new();
        for row in &rows {
            let item = Self::parse_item_row(row)?;
            by_snapshot.entry(item.snapshot_id).or_default().push(item);
        }

        for snapshot in snapshots.iter_mut() {
            snapshot.items = by_snapshot.remove(&snapshot.id).unwrap_or_default();
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for PostgresSnapshotStore {
    type Error = PostgresError;

    async fn latest_snapshot_for_origin(
        &self,
        origin: &RecordRef,
    ) -> Result<Option<Snapshot>, Self::Error> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM versioned_snapshot
            WHERE origin_class = $1 AND origin_id = $2
            ORDER BY last_edited DESC, id DESC
            LIMIT 1
            "#,
            SNAPSHOT_COLUMNS
        ))
        .bind(&origin.record_type)
        .bind(fit_column::<_, i64>("origin_id", origin.id)?)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut snapshots = [Self::parse_snapshot_row(&row)?];
        self.attach_items(&mut snapshots).await?;
        let [snapshot] = snapshots;
        Ok(Some(snapshot))
    }

    async fn commit_snapshot(&self, draft: SnapshotDraft) -> Result<Snapshot, Self::Error> {
        draft.validate()?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let (origin, event_ref) = match draft.origin {
            Origin::Record(record) => (record, None),
            Origin::SyntheticEvent { title } => {
                let row = sqlx::query(
                    "INSERT INTO snapshot_event (title, created) VALUES ($1, $2) RETURNING id",
                )
                .bind(&title)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?;
                let event_id: i64 = row.try_get("id")?;
                let event_ref =
                    RecordRef::new(SnapshotEvent::RECORD_TYPE, fit_column("id", event_id)?);
                (event_ref.clone(), Some(event_ref))
            }
        };

        let mut snapshot = Snapshot {
            id: 0,
            origin,
            origin_hash: String::new(),
            message: draft.message,
            author_id: draft.author_id,
            items: Vec::with_capacity(draft.items.len()),
            created: now,
            last_edited: now,
        };
        snapshot.refresh_origin_hash();

        let row = sqlx::query(
            r#"
            INSERT INTO versioned_snapshot
                (origin_hash, message, origin_class, origin_id, author_id, created, last_edited)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&snapshot.origin_hash)
        .bind(&snapshot.message)
        .bind(&snapshot.origin.record_type)
        .bind(fit_column::<_, i64>("origin_id", snapshot.origin.id)?)
        .bind(fit_column::<_, i64>("author_id", snapshot.author_id.unwrap_or(0))?)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        let snapshot_id: i64 = row.try_get("id")?;
        snapshot.id = fit_column("id", snapshot_id)?;

        for source in draft.items {
            let (record, version) = match source {
                ItemSource::Record { record, version } => (record, version),
                ItemSource::OriginEvent => match &event_ref {
                    Some(event) => (event.clone(), SnapshotEvent::VERSION),
                    None => continue,
                },
            };

            let mut item = SnapshotItem::hydrate(0, snapshot.id, record, version);
            let row = sqlx::query(
                r#"
                INSERT INTO versioned_snapshot_item
                    (snapshot_id, object_hash, object_class, object_id, version)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id
                "#,
            )
            .bind(snapshot_id)
            .bind(&item.object_hash)
            .bind(&item.object.record_type)
            .bind(fit_column::<_, i64>("object_id", item.object.id)?)
            .bind(fit_column::<_, i32>("version", item.version)?)
            .fetch_one(&mut *tx)
            .await?;
            let item_id: i64 = row.try_get("id")?;
            item.id = fit_column("id", item_id)?;
            snapshot.items.push(item);
        }

        tx.commit().await?;

        tracing::debug!(
            snapshot_id = snapshot.id,
            items = snapshot.items.len(),
            "Snapshot committed"
        );
        Ok(snapshot)
    }

    async fn get_snapshot(&self, id: SnapshotId) -> Result<Option<Snapshot>, Self::Error> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM versioned_snapshot WHERE id = $1",
            SNAPSHOT_COLUMNS
        ))
        .bind(fit_column::<_, i64>("id", id)?)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut snapshots = [Self::parse_snapshot_row(&row)?];
        self.attach_items(&mut snapshots).await?;
        let [snapshot] = snapshots;
        Ok(Some(snapshot))
    }

    async fn snapshots_for_origin(&self, origin: &RecordRef) -> Result<Vec<Snapshot>, Self::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM versioned_snapshot WHERE origin_hash = $1 ORDER BY id ASC",
            SNAPSHOT_COLUMNS
        ))
        .bind(origin.fingerprint())
        .fetch_all(&self.pool)
        .await?;

        let mut snapshots = rows
            .iter()
            .map(Self::parse_snapshot_row)
            .collect::<Result<Vec<_>, _>>()?;
        self.attach_items(&mut snapshots).await?;
        Ok(snapshots)
    }

    async fn delete_snapshot(&self, id: SnapshotId) -> Result<bool, Self::Error> {
        let result = sqlx::query("DELETE FROM versioned_snapshot WHERE id = $1")
            .bind(fit_column::<_, i64>("id", id)?)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_event(&self, id: RecordId) -> Result<Option<SnapshotEvent>, Self::Error> {
        let row = sqlx::query("SELECT id, title, created FROM snapshot_event WHERE id = $1")
            .bind(fit_column::<_, i64>("id", id)?)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let event_id: i64 = row.try_get("id")?;
                Ok(Some(SnapshotEvent {
                    id: fit_column("id", event_id)?,
                    title: row.try_get("title")?,
                    created: row.try_get("created")?,
                }))
            }
            None => Ok(None),
        }
    }
}
