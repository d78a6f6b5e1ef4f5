//! SQL text for catalog queries and DDL.
//!
//! Catalog queries are constants with positional `@Pn` parameters. DDL is
//! built from the entity model with every identifier bracket-quoted.

use crate::model::{CheckModel, ConstraintModel, EntityModel, FieldModel, ForeignKeyModel, IndexModel};
use crate::name::QualifiedName;

/// Quote an identifier for SQL Server.
pub fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// `TABLE_TYPE` of ordinary tables in `INFORMATION_SCHEMA.TABLES`.
pub const BASE_TABLE: &str = "BASE TABLE";

/// Catalog queries.
pub mod queries {
    /// Current database of the session.
    pub const CURRENT_DATABASE: &str = "SELECT DB_NAME() AS [Current Database]";

    /// Default schema of the session.
    pub const DEFAULT_SCHEMA: &str = "SELECT SCHEMA_NAME() AS [Default Schema]";

    /// Tables in a catalog. `@P1` catalog.
    pub const GET_TABLES: &str =
        "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_CATALOG = @P1";

    /// Table existence. `@P1` table, `@P2` catalog, `@P3` schema pattern,
    /// `@P4` table type.
    pub const HAS_TABLE: &str = "SELECT count(*) FROM INFORMATION_SCHEMA.TABLES \
         WHERE TABLE_NAME = @P1 AND TABLE_CATALOG = @P2 AND TABLE_SCHEMA LIKE @P3 AND TABLE_TYPE = @P4";

    /// Column existence. `@P1` catalog, `@P2` table, `@P3` column,
    /// `@P4` schema pattern.
    pub const HAS_COLUMN: &str = "SELECT count(*) FROM INFORMATION_SCHEMA.COLUMNS \
         WHERE TABLE_CATALOG = @P1 AND TABLE_NAME = @P2 AND COLUMN_NAME = @P3 AND TABLE_SCHEMA LIKE @P4";

    /// Foreign keys referencing a table. `@P1` qualified table.
    pub const REFERENCING_FOREIGN_KEYS: &str = "SELECT f.name, \
         OBJECT_SCHEMA_NAME(f.parent_object_id) AS parent_schema, \
         OBJECT_NAME(f.parent_object_id) AS parent \
         FROM sys.foreign_keys f WHERE f.referenced_object_id = OBJECT_ID(@P1)";

    /// Index existence. `@P1` index name, `@P2` qualified table.
    pub const HAS_INDEX: &str =
        "SELECT count(*) FROM sys.indexes WHERE name = @P1 AND object_id = OBJECT_ID(@P2)";

    /// Index membership, one row per indexed column. `@P1` qualified table.
    pub const INDEXES: &str = "SELECT i.name AS index_name, i.is_unique, i.is_primary_key, \
         col.name AS column_name \
         FROM sys.indexes i \
         LEFT JOIN sys.index_columns ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id \
         LEFT JOIN sys.all_columns col ON col.column_id = ic.column_id AND col.object_id = ic.object_id \
         WHERE i.name IS NOT NULL AND i.is_unique_constraint = 0 AND i.object_id = OBJECT_ID(@P1) \
         ORDER BY i.index_id, ic.key_ordinal";

    /// Name of a column's default constraint. `@P1` qualified table,
    /// `@P2` column.
    pub const DEFAULT_CONSTRAINT: &str = "SELECT dc.name FROM sys.default_constraints dc \
         JOIN sys.columns c ON c.object_id = dc.parent_object_id AND c.column_id = dc.parent_column_id \
         WHERE dc.parent_object_id = OBJECT_ID(@P1) AND c.name = @P2";

    /// Foreign key or check constraint existence. `@P1` constraint,
    /// `@P2` table, `@P3` schema pattern, `@P4` catalog.
    pub const HAS_CONSTRAINT: &str = "SELECT count(*) FROM ( \
         SELECT F.name, F.parent_object_id FROM sys.foreign_keys AS F \
         UNION ALL \
         SELECT C.name, C.parent_object_id FROM sys.check_constraints AS C \
         ) AS K \
         INNER JOIN sys.tables AS T ON K.parent_object_id = T.object_id \
         INNER JOIN INFORMATION_SCHEMA.TABLES AS I \
         ON I.TABLE_NAME = T.name AND I.TABLE_SCHEMA = SCHEMA_NAME(T.schema_id) \
         WHERE K.name = @P1 AND I.TABLE_NAME = @P2 AND I.TABLE_SCHEMA LIKE @P3 AND I.TABLE_CATALOG = @P4";

    /// Add a column comment. `@P1` text, `@P2` schema, `@P3` table, `@P4` column.
    pub const ADD_COLUMN_COMMENT: &str = "EXEC sp_addextendedproperty @name = N'MS_Description', \
         @value = @P1, @level0type = N'SCHEMA', @level0name = @P2, \
         @level1type = N'TABLE', @level1name = @P3, @level2type = N'COLUMN', @level2name = @P4";

    /// Update a column comment. Same parameters as [`ADD_COLUMN_COMMENT`].
    pub const UPDATE_COLUMN_COMMENT: &str = "EXEC sp_updateextendedproperty @name = N'MS_Description', \
         @value = @P1, @level0type = N'SCHEMA', @level0name = @P2, \
         @level1type = N'TABLE', @level1name = @P3, @level2type = N'COLUMN', @level2name = @P4";

    /// Rename a table. `@P1` quoted old name, `@P2` new table name.
    pub const RENAME_TABLE: &str = "EXEC sp_rename @objname = @P1, @newname = @P2";

    /// Rename a column. `@P1` quoted `table.column`, `@P2` new column name.
    pub const RENAME_COLUMN: &str =
        "EXEC sp_rename @objname = @P1, @newname = @P2, @objtype = N'COLUMN'";

    /// Rename an index. `@P1` quoted `table.index`, `@P2` new index name.
    pub const RENAME_INDEX: &str =
        "EXEC sp_rename @objname = @P1, @newname = @P2, @objtype = N'INDEX'";
}

/// Column metadata for a table. `@P1` catalog, `@P2` table, `@P3` schema
/// when `with_schema` is set.
pub fn columns_query(with_schema: bool) -> String {
    let mut sql = String::from(
        "SELECT COLUMN_NAME, DATA_TYPE, COLUMN_DEFAULT, IS_NULLABLE, CHARACTER_MAXIMUM_LENGTH, \
         NUMERIC_PRECISION, NUMERIC_PRECISION_RADIX, NUMERIC_SCALE, DATETIME_PRECISION \
         FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_CATALOG = @P1 AND TABLE_NAME = @P2",
    );
    if with_schema {
        sql.push_str(" AND TABLE_SCHEMA = @P3");
    }
    sql.push_str(" ORDER BY ORDINAL_POSITION");
    sql
}

/// Primary key and unique membership per column. Parameters as in
/// [`columns_query`].
pub fn key_columns_query(with_schema: bool) -> String {
    let mut sql = String::from(
        "SELECT c.COLUMN_NAME, t.CONSTRAINT_TYPE \
         FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS t \
         JOIN INFORMATION_SCHEMA.CONSTRAINT_COLUMN_USAGE c \
         ON c.CONSTRAINT_NAME = t.CONSTRAINT_NAME AND c.CONSTRAINT_SCHEMA = t.CONSTRAINT_SCHEMA \
         WHERE t.CONSTRAINT_TYPE IN ('PRIMARY KEY', 'UNIQUE') \
         AND c.TABLE_CATALOG = @P1 AND c.TABLE_NAME = @P2",
    );
    if with_schema {
        sql.push_str(" AND c.TABLE_SCHEMA = @P3");
    }
    sql
}

/// Single row probe that exposes the driver's column type handles.
pub fn probe_query(table: &QualifiedName) -> String {
    format!("SELECT TOP 1 * FROM {}", table.quoted())
}

/// Comment of one column. `@P1` schema, `@P2` table, `@P3` column.
pub fn column_comment_query(database: &str) -> String {
    format!(
        "SELECT CAST(value AS NVARCHAR(MAX)) AS value FROM {}.sys.fn_listextendedproperty(\
         N'MS_Description', N'SCHEMA', @P1, N'TABLE', @P2, N'COLUMN', @P3)",
        quote_ident(database)
    )
}

/// Comments of every column of a table. `@P1` schema, `@P2` table.
pub fn table_comments_query(database: &str) -> String {
    format!(
        "SELECT CAST(objname AS NVARCHAR(128)) AS column_name, CAST(value AS NVARCHAR(MAX)) AS value \
         FROM {}.sys.fn_listextendedproperty(\
         N'MS_Description', N'SCHEMA', @P1, N'TABLE', @P2, N'COLUMN', NULL)",
        quote_ident(database)
    )
}

/// Column type expression without nullability.
fn column_type(field: &FieldModel) -> String {
    if field.auto_increment {
        format!("{} IDENTITY(1,1)", field.data_type)
    } else {
        field.data_type.clone()
    }
}

/// Full column definition for `CREATE TABLE` and `ADD`.
pub fn column_definition(field: &FieldModel) -> String {
    let mut def = format!("{} {}", quote_ident(&field.column), column_type(field));

    if !field.nullable {
        def.push_str(" NOT NULL");
    }
    if field.unique && !field.primary_key {
        def.push_str(" UNIQUE");
    }
    if let Some(default) = field.default_text() {
        def.push_str(" DEFAULT ");
        def.push_str(default);
    }

    def
}

fn column_list(columns: impl IntoIterator<Item = String>) -> String {
    columns
        .into_iter()
        .map(|c| quote_ident(&c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `CONSTRAINT [fk] FOREIGN KEY (...) REFERENCES t (...) [ON DELETE ..] [ON UPDATE ..]`.
pub fn foreign_key_clause(model: &EntityModel, fk: &ForeignKeyModel) -> String {
    let mut sql = format!(
        "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        quote_ident(&fk.name),
        column_list(fk.columns.iter().map(|c| model.storage_name_of(c))),
        QualifiedName::split(&fk.references).quoted(),
        column_list(fk.referenced_columns.iter().cloned()),
    );
    if let Some(ref action) = fk.on_delete {
        sql.push_str(" ON DELETE ");
        sql.push_str(action);
    }
    if let Some(ref action) = fk.on_update {
        sql.push_str(" ON UPDATE ");
        sql.push_str(action);
    }
    sql
}

/// `CONSTRAINT [chk] CHECK (...)`.
pub fn check_clause(check: &CheckModel) -> String {
    format!(
        "CONSTRAINT {} CHECK ({})",
        quote_ident(&check.name),
        check.expression
    )
}

fn constraint_clause(model: &EntityModel, constraint: &ConstraintModel) -> String {
    match constraint {
        ConstraintModel::ForeignKey(fk) => foreign_key_clause(model, fk),
        ConstraintModel::Check(check) => check_clause(check),
    }
}

/// `CREATE TABLE` for a model.
///
/// Indexes are not included; they are created separately.
pub fn create_table_sql(
    model: &EntityModel,
    table: &QualifiedName,
    include_foreign_keys: bool,
) -> String {
    let mut parts: Vec<String> = model.fields.iter().map(column_definition).collect();

    let primary_key: Vec<String> = model.primary_key().map(|f| f.column.clone()).collect();
    if !primary_key.is_empty() {
        parts.push(format!("PRIMARY KEY ({})", column_list(primary_key)));
    }

    for constraint in &model.constraints {
        if matches!(constraint, ConstraintModel::ForeignKey(_)) && !include_foreign_keys {
            continue;
        }
        parts.push(constraint_clause(model, constraint));
    }

    format!("CREATE TABLE {} ({})", table.quoted(), parts.join(", "))
}

/// `DROP TABLE IF EXISTS`.
pub fn drop_table_sql(table: &QualifiedName) -> String {
    format!("DROP TABLE IF EXISTS {}", table.quoted())
}

/// `ALTER TABLE .. ADD` a column.
pub fn add_column_sql(table: &QualifiedName, field: &FieldModel) -> String {
    format!("ALTER TABLE {} ADD {}", table.quoted(), column_definition(field))
}

/// `ALTER TABLE .. ALTER COLUMN` with explicit nullability.
pub fn alter_column_sql(table: &QualifiedName, field: &FieldModel) -> String {
    format!(
        "ALTER TABLE {} ALTER COLUMN {} {} {}",
        table.quoted(),
        quote_ident(&field.column),
        field.data_type,
        if field.nullable { "NULL" } else { "NOT NULL" }
    )
}

/// `ALTER TABLE .. ADD DEFAULT .. FOR` a column.
pub fn add_default_sql(table: &QualifiedName, column: &str, default: &str) -> String {
    format!(
        "ALTER TABLE {} ADD DEFAULT {} FOR {}",
        table.quoted(),
        default,
        quote_ident(column)
    )
}

/// `ALTER TABLE .. DROP COLUMN`.
pub fn drop_column_sql(table: &QualifiedName, column: &str) -> String {
    format!(
        "ALTER TABLE {} DROP COLUMN {}",
        table.quoted(),
        quote_ident(column)
    )
}

/// `CREATE [class] INDEX name ON table (columns) [WHERE ..] [options]`.
pub fn create_index_sql(model: &EntityModel, table: &QualifiedName, index: &IndexModel) -> String {
    let columns = index
        .columns
        .iter()
        .map(|c| {
            let column = quote_ident(&model.storage_name_of(&c.field));
            match c.sort {
                Some(sort) => format!("{} {}", column, sort.as_sql()),
                None => column,
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = String::from("CREATE ");
    if let Some(class) = index.class.as_deref().filter(|c| !c.is_empty()) {
        sql.push_str(class);
        sql.push(' ');
    }
    sql.push_str(&format!(
        "INDEX {} ON {} ({})",
        quote_ident(&index.name),
        table.quoted(),
        columns
    ));
    if let Some(predicate) = index.where_clause.as_deref().filter(|w| !w.is_empty()) {
        sql.push_str(" WHERE ");
        sql.push_str(predicate);
    }
    if let Some(option) = index.option.as_deref().filter(|o| !o.is_empty()) {
        sql.push(' ');
        sql.push_str(option);
    }
    sql
}

/// `DROP INDEX name ON table`.
pub fn drop_index_sql(table: &QualifiedName, index: &str) -> String {
    format!("DROP INDEX {} ON {}", quote_ident(index), table.quoted())
}

/// `ALTER TABLE .. ADD CONSTRAINT`.
pub fn add_constraint_sql(
    model: &EntityModel,
    table: &QualifiedName,
    constraint: &ConstraintModel,
) -> String {
    format!(
        "ALTER TABLE {} ADD {}",
        table.quoted(),
        constraint_clause(model, constraint)
    )
}

/// `ALTER TABLE .. DROP CONSTRAINT`.
pub fn drop_constraint_sql(table: &QualifiedName, constraint: &str) -> String {
    format!(
        "ALTER TABLE {} DROP CONSTRAINT {}",
        table.quoted(),
        quote_ident(constraint)
    )
}
