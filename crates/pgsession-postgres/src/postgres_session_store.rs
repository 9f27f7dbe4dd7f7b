//! PostgresSessionStore - SessionStore trait implementation for PostgreSQL
//!
//! Sessions live in a single table whose name comes from `StoreConfig`. Every
//! operation is one statement against the shared pool, so the store can be
//! cloned and used from any number of tasks without extra locking.

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::PgPool;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::codec::{SessionParams, decode_session};
use crate::config::{StoreConfig, TableName};
use crate::metrics::SessionStoreMetrics;
use crate::queries::Queries;
use crate::sweeper::{ExpiredDeletion, SweepErrors, Sweeper, SweeperState, error_channel};
use pgsession_core::{Error, Result, Session, SessionStore};

/// PostgreSQL-backed session store
///
/// Creating the store makes sure the session table and its `expires_at`
/// index exist, and starts the expiration sweeper unless the configured
/// interval is zero. Sweep failures are reported through the returned
/// [`SweepErrors`], which the host must keep draining.
#[derive(Clone)]
pub struct PostgresSessionStore {
    /// PostgreSQL connection pool
    pool: Arc<PgPool>,
    config: Arc<StoreConfig>,
    queries: Arc<Queries>,
    expired: Arc<ExpiredSessions>,
    /// Dropped with the last clone, which also ends the sweep loop
    sweeper: Arc<Sweeper>,
    metrics: Option<SessionStoreMetrics>,
}

impl PostgresSessionStore {
    /// Create a session store on an existing pool
    ///
    /// # Arguments
    /// * `pool` - PostgreSQL connection pool, shared with the sweeper
    /// * `config` - Table name, sweep interval and operation timeout
    ///
    /// # Errors
    /// - `Error::Config` if the configuration is invalid
    /// - `Error::Schema` if the table or index cannot be created
    ///
    /// # Example
    /// ```no_run
    /// # use pgsession_postgres::{PostgresSessionStore, StoreConfig};
    /// # async fn example(pool: sqlx::PgPool) -> pgsession_core::Result<()> {
    /// let (store, mut sweep_errors) = PostgresSessionStore::new(pool, StoreConfig::default()).await?;
    ///
    /// tokio::spawn(async move {
    ///     while let Some(e) = sweep_errors.recv().await {
    ///         eprintln!("session sweep failed: {}", e);
    ///     }
    /// });
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(pool: PgPool, config: StoreConfig) -> Result<(Self, SweepErrors)> {
        Self::build(pool, config, None).await
    }

    /// Create a session store that records Prometheus metrics
    pub async fn new_with_metrics(
        pool: PgPool,
        config: StoreConfig,
        metrics: SessionStoreMetrics,
    ) -> Result<(Self, SweepErrors)> {
        Self::build(pool, config, Some(metrics)).await
    }

    /// Connect to PostgreSQL and create a session store
    ///
    /// # Errors
    /// - `Error::Database` if the connection fails
    /// - see [`PostgresSessionStore::new`]
    pub async fn connect(database_url: &str, config: StoreConfig) -> Result<(Self, SweepErrors)> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| Error::Database(format!("Failed to connect to PostgreSQL: {}", e)))?;

        Self::new(pool, config).await
    }

    async fn build(
        pool: PgPool,
        config: StoreConfig,
        metrics: Option<SessionStoreMetrics>,
    ) -> Result<(Self, SweepErrors)> {
        config.validate()?;

        let queries = Arc::new(Queries::new(&config.table_name));
        create_schema(&pool, &queries, &config.table_name).await?;

        let expired = Arc::new(ExpiredSessions {
            pool: pool.clone(),
            queries: queries.clone(),
            metrics: metrics.clone(),
        });

        let (errors_tx, errors) = error_channel();
        let interval = config.sweep_interval();
        let sweeper = if interval.is_zero() {
            Sweeper::idle()
        } else {
            Sweeper::spawn(expired.clone(), interval, errors_tx)
        };

        let store = Self {
            pool: Arc::new(pool),
            config: Arc::new(config),
            queries,
            expired,
            sweeper: Arc::new(sweeper),
            metrics,
        };

        Ok((store, errors))
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn table_name(&self) -> &TableName {
        &self.config.table_name
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Delete every expired session now, returning how many were removed
    ///
    /// This is the statement the sweeper runs on each tick; hosts that disable
    /// the sweeper can call it from their own scheduler.
    ///
    /// Recorded as a `delete_expired` operation, not as a sweep.
    pub async fn delete_expired(&self) -> Result<u64> {
        self.run("delete_expired", self.expired.delete()).await
    }

    /// Stop the expiration sweeper
    ///
    /// Does nothing if the sweeper is not running. A stopped sweeper cannot
    /// be restarted.
    pub fn stop_sweeper(&self) {
        if self.sweeper.state() == SweeperState::Running {
            tracing::info!(table = %self.config.table_name, "Stopping session sweeper");
        }
        self.sweeper.stop();
    }

    pub fn sweeper_state(&self) -> SweeperState {
        self.sweeper.state()
    }

    /// Apply the configured timeout and record metrics around one operation
    async fn run<T, F>(&self, operation: &'static str, op: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let start = Instant::now();

        let result = match self.config.operation_timeout() {
            Some(limit) => tokio::time::timeout(limit, op)
                .await
                .unwrap_or_else(|_| Err(Error::Timeout(limit))),
            None => op.await,
        };

        if let Some(metrics) = &self.metrics {
            let status = match &result {
                Ok(_) => "success",
                Err(Error::DuplicateId(_)) => "duplicate",
                Err(Error::Timeout(_)) => "timeout",
                Err(_) => "error",
            };
            metrics.record_operation(operation, status, start.elapsed().as_secs_f64());
        }

        result
    }
}

/// Create the session table and its expiration index if missing
async fn create_schema(pool: &PgPool, queries: &Queries, table: &TableName) -> Result<()> {
    sqlx::query(&queries.create_table)
        .execute(pool)
        .await
        .map_err(|e| Error::Schema(format!("Failed to create {} table: {}", table, e)))?;

    sqlx::query(&queries.create_expires_index)
        .execute(pool)
        .await
        .map_err(|e| Error::Schema(format!("Failed to create {} index: {}", table, e)))?;

    tracing::info!(table = %table, "Session table ready");
    Ok(())
}

/// The delete-expired statement, shared by the store and its sweep task.
///
/// Kept apart from the store so the sweep task does not keep the store alive.
struct ExpiredSessions {
    pool: PgPool,
    queries: Arc<Queries>,
    metrics: Option<SessionStoreMetrics>,
}

impl ExpiredSessions {
    async fn delete(&self) -> Result<u64> {
        sqlx::query(&self.queries.delete_expired)
            .execute(&self.pool)
            .await
            .map(|done| done.rows_affected())
            .map_err(|e| Error::Database(format!("Failed to delete expired sessions: {}", e)))
    }
}

/// Only the sweep task goes through this impl, so sweep metrics count
/// background sweeps alone.
#[async_trait]
impl ExpiredDeletion for ExpiredSessions {
    async fn delete_expired(&self) -> Result<u64> {
        let result = self.delete().await;

        if let Some(metrics) = &self.metrics {
            metrics.record_sweep(result.as_ref().ok().copied());
        }

        result
    }
}

/// Whether an insert failure is a collision on the session ID.
///
/// A reported constraint name must be the primary key, so violations of
/// other unique constraints stay database errors. Without a name the
/// driver's unique-violation classification decides.
fn is_duplicate_id(unique_violation: bool, constraint: Option<&str>, primary_key: &str) -> bool {
    match constraint {
        Some(name) => name == primary_key,
        None => unique_violation,
    }
}

fn insert_error(e: sqlx::Error, session: &Session, table: &TableName) -> Error {
    if let sqlx::Error::Database(db_err) = &e
        && is_duplicate_id(
            db_err.is_unique_violation(),
            db_err.constraint(),
            &table.primary_key_constraint(),
        )
    {
        return Error::DuplicateId(session.id.clone());
    }

    Error::Database(format!("Failed to insert session: {}", e))
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    async fn create(&self, session: &Session) -> Result<()> {
        self.run("create", async {
            SessionParams::encode(session)
                .bind(sqlx::query(&self.queries.insert))
                .execute(&*self.pool)
                .await
                .map_err(|e| insert_error(e, session, &self.config.table_name))?;
            Ok(())
        })
        .await
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<Session>> {
        self.run("fetch_by_id", async {
            let row = sqlx::query(&self.queries.select_active_by_id)
                .bind(id)
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| Error::Database(format!("Failed to fetch session: {}", e)))?;

            row.as_ref()
                .map(decode_session)
                .transpose()
                .map_err(|e| Error::Database(format!("Failed to decode session: {}", e)))
        })
        .await
    }

    async fn fetch_by_user_key(&self, user_key: &str) -> Result<Vec<Session>> {
        self.run("fetch_by_user_key", async {
            let mut rows = sqlx::query(&self.queries.select_by_user_key)
                .bind(user_key)
                .fetch(&*self.pool);

            let mut sessions = Vec::new();
            loop {
                match rows.try_next().await {
                    Ok(Some(row)) => sessions.push(decode_session(&row).map_err(|e| {
                        Error::Database(format!("Failed to decode session: {}", e))
                    })?),
                    Ok(None) => break,
                    // Treated like an empty result set
                    Err(sqlx::Error::RowNotFound) => return Ok(Vec::new()),
                    Err(e) => {
                        return Err(Error::Database(format!(
                            "Failed to fetch sessions by user key: {}",
                            e
                        )));
                    }
                }
            }

            Ok(sessions)
        })
        .await
    }

    async fn delete_by_id(&self, id: &str) -> Result<()> {
        self.run("delete_by_id", async {
            sqlx::query(&self.queries.delete_by_id)
                .bind(id)
                .execute(&*self.pool)
                .await
                .map_err(|e| Error::Database(format!("Failed to delete session: {}", e)))?;
            Ok(())
        })
        .await
    }

    async fn delete_by_user_key(&self, user_key: &str, except: &[String]) -> Result<()> {
        self.run("delete_by_user_key", async {
            let query = if except.is_empty() {
                sqlx::query(&self.queries.delete_by_user_key).bind(user_key)
            } else {
                sqlx::query(&self.queries.delete_by_user_key_except)
                    .bind(user_key)
                    .bind(except)
            };

            query.execute(&*self.pool).await.map_err(|e| {
                Error::Database(format!("Failed to delete sessions by user key: {}", e))
            })?;
            Ok(())
        })
        .await
    }
}
