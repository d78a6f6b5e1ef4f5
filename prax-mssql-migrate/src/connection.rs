//! SQL Server session over tiberius.

use async_trait::async_trait;
use tiberius::{Client, Column, ColumnData, ColumnType, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

use crate::config::MssqlConfig;
use crate::error::{MigrateResult, MigrationError};
use crate::executor::{ColumnHandle, QueryOutput, SqlExecutor, SqlRow, SqlValue};

/// A single SQL Server session.
pub struct MssqlConnection {
    client: Client<Compat<TcpStream>>,
}

impl MssqlConnection {
    /// Connect using parsed settings.
    pub async fn connect(config: &MssqlConfig) -> MigrateResult<Self> {
        let tiberius_config = config.to_tiberius_config()?;
        let addr = config.addr();

        debug!(addr = %addr, database = %config.database, "Connecting to SQL Server");

        let tcp = tokio::time::timeout(config.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| MigrationError::driver(format!("timed out connecting to {}", addr)))??;
        tcp.set_nodelay(true)?;

        let client = Client::connect(tiberius_config, tcp.compat_write()).await?;
        Ok(Self { client })
    }

    /// Connect using a URL or ADO.NET connection string.
    pub async fn connect_str(conn_str: &str) -> MigrateResult<Self> {
        Self::connect(&MssqlConfig::from_connection_string(conn_str)?).await
    }

    /// Get the underlying client.
    pub fn inner(&mut self) -> &mut Client<Compat<TcpStream>> {
        &mut self.client
    }
}

fn to_sql(value: &SqlValue) -> Box<dyn ToSql> {
    match value {
        SqlValue::Null => Box::new(Option::<String>::None),
        SqlValue::Bool(b) => Box::new(*b),
        SqlValue::Int(i) => Box::new(*i),
        SqlValue::Float(f) => Box::new(*f),
        SqlValue::String(s) => Box::new(s.clone()),
    }
}

fn from_column_data(data: ColumnData<'static>) -> SqlValue {
    match data {
        ColumnData::U8(v) => v.map_or(SqlValue::Null, |v| SqlValue::Int(i64::from(v))),
        ColumnData::I16(v) => v.map_or(SqlValue::Null, |v| SqlValue::Int(i64::from(v))),
        ColumnData::I32(v) => v.map_or(SqlValue::Null, |v| SqlValue::Int(i64::from(v))),
        ColumnData::I64(v) => v.map_or(SqlValue::Null, SqlValue::Int),
        ColumnData::F32(v) => v.map_or(SqlValue::Null, |v| SqlValue::Float(f64::from(v))),
        ColumnData::F64(v) => v.map_or(SqlValue::Null, SqlValue::Float),
        ColumnData::Bit(v) => v.map_or(SqlValue::Null, SqlValue::Bool),
        ColumnData::String(v) => v.map_or(SqlValue::Null, |s| SqlValue::String(s.into_owned())),
        ColumnData::Guid(v) => v.map_or(SqlValue::Null, |g| SqlValue::String(g.to_string())),
        ColumnData::Numeric(v) => v.map_or(SqlValue::Null, |n| SqlValue::String(n.to_string())),
        // Catalog queries never select binary, XML or temporal values.
        _ => SqlValue::Null,
    }
}

/// Native type name of a result column.
pub fn native_type_name(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Null => "null",
        ColumnType::Bit | ColumnType::Bitn => "bit",
        ColumnType::Int1 => "tinyint",
        ColumnType::Int2 => "smallint",
        ColumnType::Int4 => "int",
        ColumnType::Int8 => "bigint",
        ColumnType::Intn => "int",
        ColumnType::Float4 => "real",
        ColumnType::Float8 | ColumnType::Floatn => "float",
        ColumnType::Money | ColumnType::Money4 => "money",
        ColumnType::Datetime4 => "smalldatetime",
        ColumnType::Datetime | ColumnType::Datetimen => "datetime",
        ColumnType::Datetime2 => "datetime2",
        ColumnType::DatetimeOffsetn => "datetimeoffset",
        ColumnType::Daten => "date",
        ColumnType::Timen => "time",
        ColumnType::Guid => "uniqueidentifier",
        ColumnType::Decimaln => "decimal",
        ColumnType::Numericn => "numeric",
        ColumnType::BigVarBin => "varbinary",
        ColumnType::BigBinary => "binary",
        ColumnType::BigVarChar => "varchar",
        ColumnType::BigChar => "char",
        ColumnType::NVarchar => "nvarchar",
        ColumnType::NChar => "nchar",
        ColumnType::Xml => "xml",
        ColumnType::Text => "text",
        ColumnType::NText => "ntext",
        ColumnType::Image => "image",
        ColumnType::Udt => "udt",
        ColumnType::SSVariant => "sql_variant",
    }
}

fn column_handle(column: &Column) -> ColumnHandle {
    ColumnHandle::new(column.name(), native_type_name(column.column_type()))
}

#[async_trait]
impl SqlExecutor for MssqlConnection {
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<QueryOutput> {
        debug!(sql = %sql, params = params.len(), "Executing query");

        let boxed: Vec<Box<dyn ToSql>> = params.iter().map(to_sql).collect();
        let refs: Vec<&dyn ToSql> = boxed.iter().map(|b| b.as_ref()).collect();

        let mut stream = self.client.query(sql, &refs).await?;
        let columns = stream
            .columns()
            .await?
            .map(|cols| cols.iter().map(column_handle).collect())
            .unwrap_or_default();
        let rows = stream
            .into_first_result()
            .await?
            .into_iter()
            .map(|row| SqlRow::new(row.into_iter().map(from_column_data).collect()))
            .collect();

        Ok(QueryOutput { columns, rows })
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<u64> {
        debug!(sql = %sql, params = params.len(), "Executing statement");

        let boxed: Vec<Box<dyn ToSql>> = params.iter().map(to_sql).collect();
        let refs: Vec<&dyn ToSql> = boxed.iter().map(|b| b.as_ref()).collect();

        let result = self.client.execute(sql, &refs).await?;
        Ok(result.total())
    }
}
