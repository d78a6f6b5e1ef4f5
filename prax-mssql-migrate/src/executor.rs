//! The statement execution boundary.
//!
//! The migrator never talks to a driver directly. It sends SQL text and
//! positional parameters through [`SqlExecutor`] and reads back
//! driver-neutral rows.

use async_trait::async_trait;

use crate::error::{MigrateResult, MigrationError};

/// A bound parameter or a value read from a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,
    /// `bit`.
    Bool(bool),
    /// Any integer type.
    Int(i64),
    /// `real` / `float`.
    Float(f64),
    /// Character data (and anything rendered as text).
    String(String),
}

impl SqlValue {
    /// Borrow as text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Read as an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Read as a boolean; integers are true when non-zero.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Check if this is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&String> for SqlValue {
    fn from(s: &String) -> Self {
        Self::String(s.clone())
    }
}

impl From<i64> for SqlValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for SqlValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// One result row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlRow {
    values: Vec<SqlValue>,
}

impl SqlRow {
    /// Create a row from its values.
    pub fn new(values: Vec<SqlValue>) -> Self {
        Self { values }
    }

    /// Value at a column position.
    pub fn get(&self, idx: usize) -> Option<&SqlValue> {
        self.values.get(idx)
    }

    /// Text at a column position; NULL and missing columns are `None`.
    pub fn get_str(&self, idx: usize) -> Option<&str> {
        self.get(idx).and_then(SqlValue::as_str)
    }

    /// Text at a column position, failing on NULL.
    pub fn try_string(&self, idx: usize) -> MigrateResult<String> {
        self.get_str(idx)
            .map(ToString::to_string)
            .ok_or_else(|| MigrationError::row(format!("expected text in column {}", idx)))
    }

    /// Integer at a column position.
    pub fn get_i64(&self, idx: usize) -> Option<i64> {
        self.get(idx).and_then(SqlValue::as_i64)
    }

    /// Boolean at a column position.
    pub fn get_bool(&self, idx: usize) -> Option<bool> {
        self.get(idx).and_then(SqlValue::as_bool)
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row has no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Driver-level metadata of a result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnHandle {
    /// Column name.
    pub name: String,
    /// Native type name reported by the driver, e.g. `nvarchar`.
    pub type_name: String,
}

impl ColumnHandle {
    /// Create a handle.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// The first result set of a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    /// Column metadata.
    pub columns: Vec<ColumnHandle>,
    /// Rows in server order.
    pub rows: Vec<SqlRow>,
}

impl QueryOutput {
    /// The first row, if any.
    pub fn first(&self) -> Option<&SqlRow> {
        self.rows.first()
    }

    /// `count(*)` style scalar from the first row, zero when empty.
    pub fn scalar_count(&self) -> i64 {
        self.first().and_then(|row| row.get_i64(0)).unwrap_or(0)
    }
}

/// A statement as sent (or, in dry-run mode, as it would have been sent).
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text.
    pub sql: String,
    /// Positional parameters bound to `@P1..@Pn`.
    pub params: Vec<SqlValue>,
}

/// Something that runs SQL against a SQL Server session.
#[async_trait]
pub trait SqlExecutor: Send {
    /// Run a query and return its first result set.
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<QueryOutput>;

    /// Run a statement and return the number of affected rows.
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<u64>;
}

#[async_trait]
impl<E: SqlExecutor + ?Sized> SqlExecutor for &mut E {
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<QueryOutput> {
        (**self).query(sql, params).await
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<u64> {
        (**self).execute(sql, params).await
    }
}

#[async_trait]
impl<E: SqlExecutor + ?Sized> SqlExecutor for Box<E> {
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<QueryOutput> {
        (**self).query(sql, params).await
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<u64> {
        (**self).execute(sql, params).await
    }
}
