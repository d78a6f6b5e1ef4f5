//! The migrator: session state shared by catalog reads, DDL and
//! reconciliation.

use tracing::warn;

use crate::config::MigratorConfig;
use crate::error::{MigrateResult, MigrationError};
use crate::executor::{QueryOutput, SqlExecutor, SqlValue, Statement};
use crate::name::QualifiedName;
use crate::sql::queries;

/// SQL Server migrator over an executor.
///
/// Every operation takes `&mut self` and awaits one statement at a time.
/// Nothing read from the catalog is cached between calls.
pub struct Migrator<E> {
    executor: E,
    config: MigratorConfig,
    planned: Vec<Statement>,
}

impl<E: SqlExecutor> Migrator<E> {
    /// Create a migrator with the default configuration.
    pub fn new(executor: E) -> Self {
        Self::with_config(executor, MigratorConfig::default())
    }

    /// Create a migrator with a configuration.
    pub fn with_config(executor: E, config: MigratorConfig) -> Self {
        Self {
            executor,
            config,
            planned: Vec::new(),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    /// DDL recorded instead of executed in dry-run mode.
    pub fn planned_statements(&self) -> &[Statement] {
        &self.planned
    }

    /// Drain the recorded dry-run statements.
    pub fn take_planned(&mut self) -> Vec<Statement> {
        std::mem::take(&mut self.planned)
    }

    /// Borrow the executor.
    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.executor
    }

    /// Give back the executor.
    pub fn into_inner(self) -> E {
        self.executor
    }

    pub(crate) async fn query(
        &mut self,
        sql: &str,
        params: Vec<SqlValue>,
    ) -> MigrateResult<QueryOutput> {
        self.executor.query(sql, &params).await
    }

    pub(crate) async fn count(&mut self, sql: &str, params: Vec<SqlValue>) -> MigrateResult<i64> {
        Ok(self.query(sql, params).await?.scalar_count())
    }

    /// Run one DDL statement, or record it in dry-run mode.
    pub(crate) async fn exec(&mut self, sql: String, params: Vec<SqlValue>) -> MigrateResult<()> {
        if self.config.dry_run {
            warn!(sql = %sql, "Dry run, statement not executed");
            self.planned.push(Statement { sql, params });
            return Ok(());
        }
        self.executor.execute(&sql, &params).await?;
        Ok(())
    }

    async fn scalar_string(&mut self, sql: &str) -> MigrateResult<String> {
        self.query(sql, Vec::new())
            .await?
            .first()
            .ok_or_else(|| MigrationError::row(format!("no row returned by: {}", sql)))?
            .try_string(0)
    }

    /// Name of the session's current database.
    pub async fn current_database(&mut self) -> MigrateResult<String> {
        self.scalar_string(queries::CURRENT_DATABASE).await
    }

    /// The session's default schema.
    pub async fn default_schema(&mut self) -> MigrateResult<String> {
        self.scalar_string(queries::DEFAULT_SCHEMA).await
    }

    /// The explicit schema of a name, or the session default.
    pub(crate) async fn schema_name_for(&mut self, name: &QualifiedName) -> MigrateResult<String> {
        match name.schema() {
            Some(schema) => Ok(schema.to_string()),
            None => self.default_schema().await,
        }
    }

    /// The explicit catalog of a name, or the current database.
    pub(crate) async fn catalog_for(&mut self, name: &QualifiedName) -> MigrateResult<String> {
        match name.catalog() {
            Some(catalog) => Ok(catalog.to_string()),
            None => self.current_database().await,
        }
    }
}
