//! Catalog reads: tables, columns, indexes, constraints and comments.

use indexmap::IndexMap;
use tracing::debug;

use crate::descriptor::{ColumnDefault, ColumnDescriptor, ConstraintRef, IndexDescriptor};
use crate::error::{MigrateResult, ResultExt};
use crate::executor::{SqlExecutor, SqlValue};
use crate::migrator::Migrator;
use crate::model::EntityModel;
use crate::name::QualifiedName;
use crate::sql::{self, queries};

impl<E: SqlExecutor> Migrator<E> {
    /// Names of all tables in the current database.
    pub async fn get_tables(&mut self) -> MigrateResult<Vec<String>> {
        let database = self.current_database().await?;
        self.query(queries::GET_TABLES, vec![database.into()])
            .await?
            .rows
            .iter()
            .map(|row| row.try_string(0))
            .collect()
    }

    /// Whether the model's table exists.
    ///
    /// Without an explicit schema any schema matches.
    pub async fn has_table(&mut self, model: &EntityModel) -> MigrateResult<bool> {
        let name = model.qualified_name()?;
        let database = self.catalog_for(&name).await?;
        let count = self
            .count(
                queries::HAS_TABLE,
                vec![
                    name.table.as_str().into(),
                    database.into(),
                    name.schema_pattern().into(),
                    sql::BASE_TABLE.into(),
                ],
            )
            .await?;
        Ok(count > 0)
    }

    /// Whether the table has a column. `field` may be a declared or
    /// storage name.
    pub async fn has_column(&mut self, model: &EntityModel, field: &str) -> MigrateResult<bool> {
        let name = model.qualified_name()?;
        let column = model.storage_name_of(field);
        let database = self.catalog_for(&name).await?;
        let count = self
            .count(
                queries::HAS_COLUMN,
                vec![
                    database.into(),
                    name.table.as_str().into(),
                    column.into(),
                    name.schema_pattern().into(),
                ],
            )
            .await?;
        Ok(count > 0)
    }

    /// Live column descriptors in catalog order.
    ///
    /// Reads driver type handles with a one-row probe, the column catalog,
    /// key membership and column comments, and merges them by name.
    pub async fn column_types(&mut self, model: &EntityModel) -> MigrateResult<Vec<ColumnDescriptor>> {
        let name = model.qualified_name()?;
        let object = name.to_string();

        let handles = self
            .query(&sql::probe_query(&name), Vec::new())
            .await
            .on_object(&object)?
            .columns;

        let database = self.catalog_for(&name).await?;
        let mut params: Vec<SqlValue> = vec![database.clone().into(), name.table.as_str().into()];
        if let Some(schema) = name.schema() {
            params.push(schema.into());
        }

        let output = self
            .query(&sql::columns_query(name.schema().is_some()), params.clone())
            .await
            .on_object(&object)?;

        let mut columns = Vec::with_capacity(output.rows.len());
        for row in &output.rows {
            let column_name = row.try_string(0)?;
            columns.push(ColumnDescriptor {
                native_type: handles
                    .iter()
                    .find(|h| h.name == column_name)
                    .map(|h| h.type_name.clone()),
                name: column_name,
                data_type: row.try_string(1)?,
                default: ColumnDefault::from_catalog(row.get_str(2)),
                nullable: row.get_str(3).map(|v| v.eq_ignore_ascii_case("YES")),
                length: row.get_i64(4),
                precision: row.get_i64(5),
                radix: row.get_i64(6),
                scale: row.get_i64(7),
                datetime_precision: row.get_i64(8),
                primary_key: false,
                unique: false,
                comment: None,
            });
        }

        let keys = self
            .query(&sql::key_columns_query(name.schema().is_some()), params)
            .await
            .on_object(&object)?;
        for row in &keys.rows {
            let (Some(column_name), Some(kind)) = (row.get_str(0), row.get_str(1)) else {
                continue;
            };
            if let Some(column) = columns.iter_mut().find(|c| c.name == column_name) {
                match kind {
                    "PRIMARY KEY" => column.primary_key = true,
                    "UNIQUE" => column.unique = true,
                    _ => {}
                }
            }
        }

        let schema = self.schema_name_for(&name).await?;
        let comments = self
            .query(
                &sql::table_comments_query(&database),
                vec![schema.into(), name.table.as_str().into()],
            )
            .await
            .on_object(&object)?;
        for row in &comments.rows {
            let (Some(column_name), Some(text)) = (row.get_str(0), row.get_str(1)) else {
                continue;
            };
            if let Some(column) = columns.iter_mut().find(|c| c.name == column_name) {
                column.comment = Some(text.to_string());
            }
        }

        debug!(table = %object, columns = columns.len(), "Read column types");
        Ok(columns)
    }

    /// Live indexes of the table, grouped by index name.
    ///
    /// Columns appear in catalog row order.
    pub async fn get_indexes(&mut self, model: &EntityModel) -> MigrateResult<Vec<IndexDescriptor>> {
        let name = model.qualified_name()?;
        let object = name.to_string();
        let output = self
            .query(queries::INDEXES, vec![name.quoted().into()])
            .await
            .on_object(&object)?;

        let mut grouped: IndexMap<String, IndexDescriptor> = IndexMap::new();
        for row in &output.rows {
            let index_name = row.try_string(0)?;
            let index = grouped
                .entry(index_name.clone())
                .or_insert_with(|| IndexDescriptor {
                    name: index_name,
                    table: model.table.clone(),
                    columns: Vec::new(),
                    unique: row.get_bool(1).unwrap_or(false),
                    primary_key: row.get_bool(2).unwrap_or(false),
                });
            if let Some(column) = row.get_str(3) {
                index.columns.push(column.to_string());
            }
        }

        Ok(grouped.into_values().collect())
    }

    /// Whether the table has an index. `name` may be an index name or a
    /// field covered by a declared index.
    pub async fn has_index(&mut self, model: &EntityModel, name: &str) -> MigrateResult<bool> {
        let table = model.qualified_name()?;
        let index = model.index_name_of(name);
        let count = self
            .count(queries::HAS_INDEX, vec![index.into(), table.quoted().into()])
            .await?;
        Ok(count > 0)
    }

    /// Whether the table has a foreign key or check constraint.
    ///
    /// The catalog part of the table name wins over the current database.
    pub async fn has_constraint(&mut self, model: &EntityModel, name: &str) -> MigrateResult<bool> {
        let table = model.qualified_name()?;
        let constraint = model
            .lookup_constraint(name)
            .map(|c| c.name().to_string())
            .unwrap_or_else(|| name.to_string());
        let catalog = self.catalog_for(&table).await?;
        let count = self
            .count(
                queries::HAS_CONSTRAINT,
                vec![
                    constraint.into(),
                    table.table.as_str().into(),
                    table.schema_pattern().into(),
                    catalog.into(),
                ],
            )
            .await?;
        Ok(count > 0)
    }

    /// The `MS_Description` of a column, `None` when no property exists.
    ///
    /// Runs even in dry-run mode.
    pub async fn get_column_comment(
        &mut self,
        model: &EntityModel,
        field: &str,
    ) -> MigrateResult<Option<String>> {
        let name = model.qualified_name()?;
        let column = model.storage_name_of(field);
        let database = self.catalog_for(&name).await?;
        let schema = self.schema_name_for(&name).await?;
        let output = self
            .query(
                &sql::column_comment_query(&database),
                vec![schema.into(), name.table.as_str().into(), column.into()],
            )
            .await?;
        Ok(output
            .first()
            .and_then(|row| row.get_str(0))
            .map(ToString::to_string))
    }

    /// Name of the default constraint bound to a column, if any.
    pub async fn default_constraint(
        &mut self,
        model: &EntityModel,
        field: &str,
    ) -> MigrateResult<Option<String>> {
        let name = model.qualified_name()?;
        let column = model.storage_name_of(field);
        let output = self
            .query(
                queries::DEFAULT_CONSTRAINT,
                vec![name.quoted().into(), column.into()],
            )
            .await
            .on_object(name.to_string())?;
        Ok(output
            .first()
            .and_then(|row| row.get_str(0))
            .map(ToString::to_string))
    }

    /// Foreign keys on any table that reference this one.
    pub async fn referencing_foreign_keys(
        &mut self,
        model: &EntityModel,
    ) -> MigrateResult<Vec<ConstraintRef>> {
        let name = model.qualified_name()?;
        let output = self
            .query(
                queries::REFERENCING_FOREIGN_KEYS,
                vec![name.quoted().into()],
            )
            .await?;

        output
            .rows
            .iter()
            .map(|row| {
                Ok(ConstraintRef {
                    name: row.try_string(0)?,
                    parent: QualifiedName {
                        catalog: String::new(),
                        schema: row.get_str(1).unwrap_or_default().to_string(),
                        table: row.try_string(2)?,
                    },
                })
            })
            .collect()
    }
}
