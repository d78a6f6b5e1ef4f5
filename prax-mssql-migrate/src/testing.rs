//! Scripted executor for unit tests.

use async_trait::async_trait;

use crate::error::{MigrateResult, MigrationError};
use crate::executor::{ColumnHandle, QueryOutput, SqlExecutor, SqlRow, SqlValue, Statement};

#[derive(Debug)]
enum Reply {
    Rows(QueryOutput),
    Fail { code: u32, message: String },
}

#[derive(Debug)]
struct Script {
    pattern: String,
    reply: Reply,
    once: bool,
}

/// An executor that answers by SQL substring and records everything sent.
///
/// Scripts are tried in registration order. One-shot scripts are removed
/// after their first match. Unmatched queries return an empty result and
/// unmatched statements succeed.
#[derive(Debug, Default)]
pub struct MockExecutor {
    scripts: Vec<Script>,
    queries: Vec<Statement>,
    executed: Vec<Statement>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `DB_NAME()` and `SCHEMA_NAME()`.
    pub fn with_session(self, database: &str, schema: &str) -> Self {
        self.respond("DB_NAME()", vec![vec![SqlValue::from(database)]])
            .respond("SCHEMA_NAME()", vec![vec![SqlValue::from(schema)]])
    }

    pub fn respond(mut self, pattern: &str, rows: Vec<Vec<SqlValue>>) -> Self {
        self.push(pattern, Reply::Rows(output(rows)), false);
        self
    }

    pub fn respond_once(mut self, pattern: &str, rows: Vec<Vec<SqlValue>>) -> Self {
        self.push(pattern, Reply::Rows(output(rows)), true);
        self
    }

    pub fn respond_with_columns(
        mut self,
        pattern: &str,
        columns: Vec<ColumnHandle>,
        rows: Vec<Vec<SqlValue>>,
    ) -> Self {
        let mut out = output(rows);
        out.columns = columns;
        self.push(pattern, Reply::Rows(out), false);
        self
    }

    /// Answer `count(*)` queries matching `pattern`.
    pub fn count(self, pattern: &str, count: i64) -> Self {
        self.respond(pattern, vec![vec![SqlValue::Int(count)]])
    }

    pub fn fail(mut self, pattern: &str, code: u32, message: &str) -> Self {
        self.push(
            pattern,
            Reply::Fail {
                code,
                message: message.to_string(),
            },
            false,
        );
        self
    }

    fn push(&mut self, pattern: &str, reply: Reply, once: bool) {
        self.scripts.push(Script {
            pattern: pattern.to_string(),
            reply,
            once,
        });
    }

    fn answer(&mut self, sql: &str) -> MigrateResult<QueryOutput> {
        let Some(idx) = self.scripts.iter().position(|s| sql.contains(&s.pattern)) else {
            return Ok(QueryOutput::default());
        };
        let reply = if self.scripts[idx].once {
            self.scripts.remove(idx).reply
        } else {
            match &self.scripts[idx].reply {
                Reply::Rows(out) => Reply::Rows(out.clone()),
                Reply::Fail { code, message } => Reply::Fail {
                    code: *code,
                    message: message.clone(),
                },
            }
        };
        match reply {
            Reply::Rows(out) => Ok(out),
            Reply::Fail { code, message } => Err(MigrationError::Server { code, message }),
        }
    }

    /// Queries sent, in order.
    pub fn queries(&self) -> &[Statement] {
        &self.queries
    }

    /// Statements executed, in order.
    pub fn executed(&self) -> &[Statement] {
        &self.executed
    }

    /// SQL text of executed statements.
    pub fn executed_sql(&self) -> Vec<&str> {
        self.executed.iter().map(|s| s.sql.as_str()).collect()
    }
}

fn output(rows: Vec<Vec<SqlValue>>) -> QueryOutput {
    QueryOutput {
        columns: Vec::new(),
        rows: rows.into_iter().map(SqlRow::new).collect(),
    }
}

#[async_trait]
impl SqlExecutor for MockExecutor {
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<QueryOutput> {
        self.queries.push(Statement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        self.answer(sql)
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<u64> {
        self.executed.push(Statement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        self.answer(sql).map(|_| 0)
    }
}
