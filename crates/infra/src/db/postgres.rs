//! Postgres-backed durable log.
//!
//! ## Tables
//!
//! - `tmvh_transaction_logs`: one row per processed payload, keyed by a text UUID
//! - `client_services`: partner routing, looked up by `shortcode` + `telcoid`
//!
//! `telcoid` is compared as text; the routing code is bound in its string form.
//! `id` and `postback_counter` may be any integer width.
//!
//! ## Error Mapping
//!
//! | SQLx Error | DurableLogError |
//! |------------|-----------------|
//! | Database (any code) during insert | `Insert` |
//! | Database (any code) during lookup | `Query` |
//! | PoolClosed / PoolTimedOut / Io / Tls | `Connection` |
//! | ColumnDecode / ColumnNotFound / Decode | `RowDecode` |
//! | Other | `Query` |

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use txworker_core::{LogEntry, PartnerRouting, RoutingCode};

use super::durable_log::{DurableLog, DurableLogError};

/// Connection pool sizing.
#[derive(Debug, Clone)]
pub struct PostgresPoolConfig {
    pub max_connections: u32,
    pub max_lifetime: Duration,
}

impl Default for PostgresPoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 100,
            max_lifetime: Duration::from_secs(5 * 60),
        }
    }
}

/// Postgres durable log, safe to share across concurrent record processors.
#[derive(Debug, Clone)]
pub struct PostgresDurableLog {
    pool: Arc<PgPool>,
}

impl PostgresDurableLog {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool and verify connectivity.
    pub async fn connect(
        database_url: &str,
        config: &PostgresPoolConfig,
    ) -> Result<Self, DurableLogError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .max_lifetime(config.max_lifetime)
            .connect(database_url)
            .await
            .map_err(|e| DurableLogError::Connection(e.to_string()))?;

        Ok(Self::new(pool))
    }
}

/// Integer columns are widened to `bigint` so `int2`/`int4`/`int8` schemas all
/// decode into the same row.
const FIND_PARTNER_ROUTING: &str = r#"
    SELECT
        id::bigint AS id,
        dn_url,
        postback_url,
        postback_counter::bigint AS postback_counter
    FROM client_services
    WHERE shortcode = $1 AND telcoid = $2
    ORDER BY id ASC
    LIMIT 1
"#;

struct PartnerRoutingRow {
    id: i64,
    dn_url: Option<String>,
    postback_url: Option<String>,
    postback_counter: Option<i64>,
}

impl<'r> FromRow<'r, PgRow> for PartnerRoutingRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            dn_url: row.try_get("dn_url")?,
            postback_url: row.try_get("postback_url")?,
            postback_counter: row.try_get("postback_counter")?,
        })
    }
}

impl From<PartnerRoutingRow> for PartnerRouting {
    fn from(row: PartnerRoutingRow) -> Self {
        Self {
            id: row.id,
            notification_url: row.dn_url.unwrap_or_default(),
            postback_url: row.postback_url.unwrap_or_default(),
            postback_counter: row.postback_counter.unwrap_or_default(),
        }
    }
}

#[async_trait::async_trait]
impl DurableLog for PostgresDurableLog {
    #[instrument(
        skip(self, entry),
        fields(log_id = %entry.id, tran_ref = %entry.tran_ref),
        err
    )]
    async fn insert_log_entry(&self, entry: &LogEntry) -> Result<(), DurableLogError> {
        sqlx::query(
            r#"
            INSERT INTO tmvh_transaction_logs (
                id,
                code,
                description,
                msisdn,
                operator,
                short_code,
                tran_ref,
                timestamp,
                cyberus_return
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(&entry.code)
        .bind(&entry.description)
        .bind(&entry.subscriber_id)
        .bind(&entry.operator)
        .bind(&entry.short_code)
        .bind(&entry.tran_ref)
        .bind(entry.timestamp)
        .bind(&entry.return_status)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_log_entry", e))?;

        Ok(())
    }

    #[instrument(skip(self, routing_code), fields(routing_code = %routing_code), err)]
    async fn find_partner_routing(
        &self,
        short_code: &str,
        routing_code: RoutingCode,
    ) -> Result<Option<PartnerRouting>, DurableLogError> {
        let row = sqlx::query(FIND_PARTNER_ROUTING)
        .bind(short_code)
        .bind(routing_code.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_partner_routing", e))?;

        match row {
            Some(row) => {
                let routing = PartnerRoutingRow::from_row(&row)
                    .map_err(|e| map_sqlx_error("find_partner_routing", e))?;
                Ok(Some(routing.into()))
            }
            None => Ok(None),
        }
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> DurableLogError {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
            let msg = format!(
                "database error in {} (code {}): {}",
                operation,
                code,
                db_err.message()
            );
            if operation.starts_with("insert") {
                DurableLogError::Insert(msg)
            } else {
                DurableLogError::Query(msg)
            }
        }
        sqlx::Error::PoolClosed => {
            DurableLogError::Connection(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::PoolTimedOut => {
            DurableLogError::Connection(format!("connection pool timed out in {}", operation))
        }
        sqlx::Error::Io(e) => DurableLogError::Connection(format!("io error in {}: {}", operation, e)),
        sqlx::Error::Tls(e) => DurableLogError::Connection(format!("tls error in {}: {}", operation, e)),
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_) => {
            DurableLogError::RowDecode(format!("{} in {}", err, operation))
        }
        _ => DurableLogError::Query(format!("sqlx error in {}: {}", operation, err)),
    }
}
