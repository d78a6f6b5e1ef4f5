//! Structural changes: tables, columns, indexes, constraints and comments.

use tracing::info;

use crate::error::{MigrateResult, MigrationError, ResultExt};
use crate::executor::SqlExecutor;
use crate::migrator::Migrator;
use crate::model::{reorder_models, ConstraintModel, EntityModel, FieldModel};
use crate::name::QualifiedName;
use crate::sql::{self, queries};

/// Which extended property procedure sets a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentMode {
    /// `sp_addextendedproperty`; no description exists yet.
    Add,
    /// `sp_updateextendedproperty`; a description exists.
    Update,
}

impl<E: SqlExecutor> Migrator<E> {
    /// Create tables for the models, referenced tables first.
    ///
    /// Each table is followed by its declared indexes and the comments of
    /// its commented fields.
    pub async fn create_table(&mut self, models: &[EntityModel]) -> MigrateResult<()> {
        for model in reorder_models(models) {
            self.create_one(model).await?;
        }
        Ok(())
    }

    /// Create one table; returns the number of indexes created with it.
    pub(crate) async fn create_one(&mut self, model: &EntityModel) -> MigrateResult<usize> {
        let name = model.qualified_name()?;
        let object = name.to_string();
        let include_fks = !self.config().disable_foreign_key_constraints;

        self.exec(sql::create_table_sql(model, &name, include_fks), Vec::new())
            .await
            .on_object(&object)?;
        info!(table = %object, "Created table");

        let mut indexes = 0;
        for index in &model.indexes {
            self.exec(sql::create_index_sql(model, &name, index), Vec::new())
                .await
                .on_object(&object)?;
            indexes += 1;
        }
        for field in model.fields.iter().filter(|f| f.comment_text().is_some()) {
            self.write_comment(&name, field, CommentMode::Add).await?;
        }
        Ok(indexes)
    }

    /// Drop tables for the models, dependents first.
    ///
    /// Foreign keys on any table that reference a dropped table are removed
    /// before it. Statements already run are not undone when a later one
    /// fails.
    pub async fn drop_table(&mut self, models: &[EntityModel]) -> MigrateResult<()> {
        for model in reorder_models(models).into_iter().rev() {
            let name = model.qualified_name()?;
            let object = name.to_string();

            for fk in self.referencing_foreign_keys(model).await.on_object(&object)? {
                self.exec(sql::drop_constraint_sql(&fk.parent, &fk.name), Vec::new())
                    .await
                    .on_object(fk.parent.to_string())?;
                info!(table = %fk.parent, constraint = %fk.name, "Dropped referencing foreign key");
            }

            self.exec(sql::drop_table_sql(&name), Vec::new())
                .await
                .on_object(&object)?;
            info!(table = %object, "Dropped table");
        }
        Ok(())
    }

    /// Rename a table. `new_name` may be qualified; only its table part is
    /// used since a rename never moves a table between schemas.
    pub async fn rename_table(&mut self, old_name: &str, new_name: &str) -> MigrateResult<()> {
        let old = QualifiedName::resolve(old_name)?;
        let new = QualifiedName::resolve(new_name)?;
        self.exec(
            queries::RENAME_TABLE.to_string(),
            vec![old.quoted().into(), new.table.into()],
        )
        .await
        .on_object(old.to_string())
    }

    /// Add a column for a field, then its comment if one is declared.
    pub async fn add_column(&mut self, model: &EntityModel, field: &str) -> MigrateResult<()> {
        let name = model.qualified_name()?;
        let field = lookup_field(model, field)?;
        self.exec(sql::add_column_sql(&name, field), Vec::new())
            .await
            .on_object(name.to_string())?;
        info!(table = %name, column = %field.column, "Added column");

        if field.comment_text().is_some() {
            self.write_comment(&name, field, CommentMode::Add).await?;
        }
        Ok(())
    }

    /// Drop a column.
    pub async fn drop_column(&mut self, model: &EntityModel, field: &str) -> MigrateResult<()> {
        let name = model.qualified_name()?;
        let column = model.storage_name_of(field);
        self.exec(sql::drop_column_sql(&name, &column), Vec::new())
            .await
            .on_object(name.to_string())
    }

    /// Rewrite a column's type and nullability from its field.
    pub async fn alter_column(&mut self, model: &EntityModel, field: &str) -> MigrateResult<()> {
        let name = model.qualified_name()?;
        let field = lookup_field(model, field)?;
        self.exec(sql::alter_column_sql(&name, field), Vec::new())
            .await
            .on_object(name.to_string())?;
        info!(table = %name, column = %field.column, data_type = %field.data_type, "Altered column");
        Ok(())
    }

    /// Replace a column's default with the field's declared default.
    ///
    /// The bound default constraint, if any, is dropped first. A field
    /// without a default leaves the column without one.
    pub async fn set_column_default(&mut self, model: &EntityModel, field: &str) -> MigrateResult<()> {
        self.drop_column_default(model, field).await?;
        self.add_column_default(model, field).await
    }

    /// Drop the default constraint bound to a column, if any.
    pub async fn drop_column_default(&mut self, model: &EntityModel, field: &str) -> MigrateResult<()> {
        let Some(constraint) = self.default_constraint(model, field).await? else {
            return Ok(());
        };
        let name = model.qualified_name()?;
        self.exec(sql::drop_constraint_sql(&name, &constraint), Vec::new())
            .await
            .on_object(name.to_string())?;
        info!(table = %name, constraint = %constraint, "Dropped column default");
        Ok(())
    }

    /// Bind the field's declared default, if it has one.
    pub(crate) async fn add_column_default(&mut self, model: &EntityModel, field: &str) -> MigrateResult<()> {
        let name = model.qualified_name()?;
        let field = lookup_field(model, field)?;
        let Some(default) = field.default_text() else {
            return Ok(());
        };
        self.exec(sql::add_default_sql(&name, &field.column, default), Vec::new())
            .await
            .on_object(name.to_string())?;
        info!(table = %name, column = %field.column, default = %default, "Set column default");
        Ok(())
    }

    /// Rename a column. Both names may be declared or storage names.
    pub async fn rename_column(
        &mut self,
        model: &EntityModel,
        old_name: &str,
        new_name: &str,
    ) -> MigrateResult<()> {
        let name = model.qualified_name()?;
        let old = model.storage_name_of(old_name);
        let new = model.storage_name_of(new_name);
        self.exec(
            queries::RENAME_COLUMN.to_string(),
            vec![name.quoted_member(&old).into(), new.into()],
        )
        .await
        .on_object(name.to_string())
    }

    /// Create a declared index by name (or by the field it covers).
    pub async fn create_index(&mut self, model: &EntityModel, index: &str) -> MigrateResult<()> {
        let name = model.qualified_name()?;
        let definition = model
            .lookup_index(index)
            .ok_or_else(|| MigrationError::index_not_found(&model.table, index))?;
        self.exec(sql::create_index_sql(model, &name, definition), Vec::new())
            .await
            .on_object(name.to_string())?;
        info!(table = %name, index = %definition.name, "Created index");
        Ok(())
    }

    /// Drop an index.
    pub async fn drop_index(&mut self, model: &EntityModel, index: &str) -> MigrateResult<()> {
        let name = model.qualified_name()?;
        let index = model.index_name_of(index);
        self.exec(sql::drop_index_sql(&name, &index), Vec::new())
            .await
            .on_object(name.to_string())
    }

    /// Rename an index. Both names are resolved against the model's indexes.
    pub async fn rename_index(
        &mut self,
        model: &EntityModel,
        old_name: &str,
        new_name: &str,
    ) -> MigrateResult<()> {
        let name = model.qualified_name()?;
        let old = model.index_name_of(old_name);
        let new = model.index_name_of(new_name);
        self.exec(
            queries::RENAME_INDEX.to_string(),
            vec![name.quoted_member(&old).into(), new.into()],
        )
        .await
        .on_object(name.to_string())
    }

    /// Add a declared foreign key or check constraint.
    pub async fn create_constraint(&mut self, model: &EntityModel, constraint: &str) -> MigrateResult<()> {
        let name = model.qualified_name()?;
        let definition = model
            .lookup_constraint(constraint)
            .ok_or_else(|| MigrationError::constraint_not_found(&model.table, constraint))?;
        self.exec(sql::add_constraint_sql(model, &name, definition), Vec::new())
            .await
            .on_object(name.to_string())?;
        info!(table = %name, constraint = %definition.name(), "Created constraint");
        Ok(())
    }

    /// Drop a constraint by name.
    pub async fn drop_constraint(&mut self, model: &EntityModel, constraint: &str) -> MigrateResult<()> {
        let name = model.qualified_name()?;
        let constraint = model
            .lookup_constraint(constraint)
            .map(ConstraintModel::name)
            .unwrap_or(constraint);
        self.exec(sql::drop_constraint_sql(&name, constraint), Vec::new())
            .await
            .on_object(name.to_string())
    }

    /// Write a field's comment as the column's `MS_Description`.
    ///
    /// A missing comment is written as the empty string.
    pub async fn set_column_comment(
        &mut self,
        model: &EntityModel,
        field: &str,
        mode: CommentMode,
    ) -> MigrateResult<()> {
        let name = model.qualified_name()?;
        let field = lookup_field(model, field)?;
        self.write_comment(&name, field, mode).await
    }

    async fn write_comment(
        &mut self,
        name: &QualifiedName,
        field: &FieldModel,
        mode: CommentMode,
    ) -> MigrateResult<()> {
        let schema = self.schema_name_for(name).await?;
        let sql = match mode {
            CommentMode::Add => queries::ADD_COLUMN_COMMENT,
            CommentMode::Update => queries::UPDATE_COLUMN_COMMENT,
        };
        self.exec(
            sql.to_string(),
            vec![
                field.comment.clone().unwrap_or_default().into(),
                schema.into(),
                name.table.as_str().into(),
                field.column.as_str().into(),
            ],
        )
        .await
        .on_object(name.quoted_member(&field.column))?;
        info!(table = %name, column = %field.column, mode = ?mode, "Set column comment");
        Ok(())
    }
}

fn lookup_field<'m>(model: &'m EntityModel, field: &str) -> MigrateResult<&'m FieldModel> {
    model
        .lookup_field(field)
        .ok_or_else(|| MigrationError::field_not_found(&model.table, field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MigratorConfig;
    use crate::executor::SqlValue;
    use crate::model::{CheckModel, ForeignKeyModel, IndexModel};
    use crate::testing::MockExecutor;
    use pretty_assertions::assert_eq;

    fn s(v: &str) -> SqlValue {
        SqlValue::from(v)
    }

    fn users() -> EntityModel {
        EntityModel::new("User", "users")
            .with_field(FieldModel::new("ID", "id", "bigint").primary_key().auto_increment())
            .with_field(
                FieldModel::new("Name", "name", "nvarchar(100)")
                    .not_null()
                    .comment("display name"),
            )
            .with_field(FieldModel::new("Age", "age", "int"))
            .with_index(IndexModel::new("idx_users_name").column("Name"))
            .with_constraint(CheckModel::new("chk_users_age", "age >= 0"))
    }

    fn posts() -> EntityModel {
        EntityModel::new("Post", "blog.posts")
            .with_field(FieldModel::new("ID", "id", "bigint").primary_key())
            .with_field(FieldModel::new("AuthorID", "author_id", "bigint"))
            .with_constraint(ForeignKeyModel::new(
                "fk_posts_author",
                &["AuthorID"],
                "users",
                &["id"],
            ))
    }

    #[tokio::test]
    async fn test_create_table_orders_and_extras() {
        let mut migrator = Migrator::new(MockExecutor::new().with_session("app", "dbo"));
        migrator.create_table(&[posts(), users()]).await.unwrap();

        let exec = migrator.into_inner();
        let sql = exec.executed_sql();
        assert_eq!(sql.len(), 4);
        assert!(sql[0].starts_with("CREATE TABLE [users] ("));
        assert_eq!(sql[1], "CREATE INDEX [idx_users_name] ON [users] ([name])");
        assert!(sql[2].starts_with("EXEC sp_addextendedproperty"));
        assert!(sql[3].starts_with("CREATE TABLE [blog].[posts] ("));
        assert!(sql[3].contains("FOREIGN KEY ([author_id]) REFERENCES [users] ([id])"));

        assert_eq!(
            exec.executed()[2].params,
            vec![s("display name"), s("dbo"), s("users"), s("name")]
        );
    }

    #[tokio::test]
    async fn test_create_table_without_foreign_keys() {
        let config = MigratorConfig::new().disable_foreign_key_constraints(true);
        let mut migrator = Migrator::with_config(MockExecutor::new(), config);
        migrator.create_table(&[posts()]).await.unwrap();
        let exec = migrator.into_inner();
        assert!(!exec.executed_sql()[0].contains("FOREIGN KEY"));
    }

    #[tokio::test]
    async fn test_drop_table_removes_incoming_foreign_keys_first() {
        let exec = MockExecutor::new().respond(
            "FROM sys.foreign_keys f",
            vec![vec![s("fk_posts_author"), s("blog"), s("posts")]],
        );
        let mut migrator = Migrator::new(exec);
        migrator.drop_table(&[users()]).await.unwrap();

        let exec = migrator.into_inner();
        assert_eq!(
            exec.executed_sql(),
            vec![
                "ALTER TABLE [blog].[posts] DROP CONSTRAINT [fk_posts_author]",
                "DROP TABLE IF EXISTS [users]",
            ]
        );
    }

    #[tokio::test]
    async fn test_drop_table_reverse_dependency_order() {
        let mut migrator = Migrator::new(MockExecutor::new());
        migrator.drop_table(&[users(), posts()]).await.unwrap();
        let exec = migrator.into_inner();
        assert_eq!(
            exec.executed_sql(),
            vec!["DROP TABLE IF EXISTS [blog].[posts]", "DROP TABLE IF EXISTS [users]"]
        );
    }

    #[tokio::test]
    async fn test_drop_table_first_error_wins() {
        let exec = MockExecutor::new()
            .respond(
                "FROM sys.foreign_keys f",
                vec![vec![s("fk_posts_author"), s("blog"), s("posts")]],
            )
            .fail("DROP TABLE", 3726, "Could not drop object");
        let mut migrator = Migrator::new(exec);
        let err = migrator.drop_table(&[users()]).await.unwrap_err();
        assert_eq!(err.server_code(), Some(3726));
        assert!(err.to_string().starts_with("users: "));

        // The constraint drop already ran and stays applied.
        assert_eq!(migrator.into_inner().executed().len(), 2);
    }

    #[tokio::test]
    async fn test_rename_table() {
        let mut migrator = Migrator::new(MockExecutor::new());
        migrator
            .rename_table("hr.people", "hr.persons")
            .await
            .unwrap();
        let exec = migrator.into_inner();
        let stmt = &exec.executed()[0];
        assert_eq!(stmt.sql, "EXEC sp_rename @objname = @P1, @newname = @P2");
        assert_eq!(stmt.params, vec![s("[hr].[people]"), s("persons")]);
    }

    #[tokio::test]
    async fn test_add_column_with_comment() {
        let mut migrator = Migrator::new(MockExecutor::new().with_session("app", "dbo"));
        migrator.add_column(&users(), "Name").await.unwrap();
        migrator.add_column(&users(), "age").await.unwrap();

        let exec = migrator.into_inner();
        assert_eq!(
            exec.executed_sql(),
            vec![
                "ALTER TABLE [users] ADD [name] nvarchar(100) NOT NULL",
                queries::ADD_COLUMN_COMMENT,
                "ALTER TABLE [users] ADD [age] int",
            ]
        );
    }

    #[tokio::test]
    async fn test_alter_column_unknown_field() {
        let mut migrator = Migrator::new(MockExecutor::new());
        let err = migrator.alter_column(&users(), "Missing").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to look up field with name: Missing (model 'users')"
        );
        assert!(migrator.into_inner().executed().is_empty());
    }

    #[tokio::test]
    async fn test_alter_column() {
        let mut migrator = Migrator::new(MockExecutor::new());
        migrator.alter_column(&users(), "Name").await.unwrap();
        let exec = migrator.into_inner();
        assert_eq!(
            exec.executed_sql(),
            vec!["ALTER TABLE [users] ALTER COLUMN [name] nvarchar(100) NOT NULL"]
        );
    }

    #[tokio::test]
    async fn test_set_column_default_replaces_bound_constraint() {
        let exec = MockExecutor::new().respond(
            "FROM sys.default_constraints",
            vec![vec![s("DF__users__age__5EBF139D")]],
        );
        let mut migrator = Migrator::new(exec);
        let model = EntityModel::new("User", "users")
            .with_field(FieldModel::new("Age", "age", "int").default_value("18"));

        migrator.set_column_default(&model, "Age").await.unwrap();
        let exec = migrator.into_inner();
        assert_eq!(
            exec.executed_sql(),
            vec![
                "ALTER TABLE [users] DROP CONSTRAINT [DF__users__age__5EBF139D]",
                "ALTER TABLE [users] ADD DEFAULT 18 FOR [age]",
            ]
        );
    }

    #[tokio::test]
    async fn test_set_column_default_without_declared_default() {
        let mut migrator = Migrator::new(MockExecutor::new());
        migrator.set_column_default(&users(), "Name").await.unwrap();
        let exec = migrator.into_inner();
        assert_eq!(exec.queries().len(), 1);
        assert!(exec.executed().is_empty());
    }

    #[tokio::test]
    async fn test_rename_column_resolves_declared_names() {
        let mut migrator = Migrator::new(MockExecutor::new());
        migrator
            .rename_column(&users(), "Name", "full_name")
            .await
            .unwrap();
        let exec = migrator.into_inner();
        let stmt = &exec.executed()[0];
        assert_eq!(stmt.sql, queries::RENAME_COLUMN);
        assert_eq!(stmt.params, vec![s("[users].[name]"), s("full_name")]);
    }

    #[tokio::test]
    async fn test_index_operations() {
        let mut migrator = Migrator::new(MockExecutor::new());
        migrator.create_index(&users(), "Name").await.unwrap();
        migrator.drop_index(&users(), "idx_users_name").await.unwrap();
        migrator
            .rename_index(&users(), "idx_users_name", "idx_users_display")
            .await
            .unwrap();

        let err = migrator.create_index(&users(), "idx_missing").await.unwrap_err();
        assert!(matches!(err, MigrationError::IndexNotFound { .. }));

        let exec = migrator.into_inner();
        assert_eq!(exec.executed().len(), 3);
        assert_eq!(exec.executed()[1].sql, "DROP INDEX [idx_users_name] ON [users]");
        assert_eq!(
            exec.executed()[2].params,
            vec![s("[users].[idx_users_name]"), s("idx_users_display")]
        );
    }

    #[tokio::test]
    async fn test_constraint_operations() {
        let mut migrator = Migrator::new(MockExecutor::new());
        migrator.create_constraint(&users(), "chk_users_age").await.unwrap();
        migrator.drop_constraint(&users(), "chk_users_age").await.unwrap();
        let err = migrator
            .create_constraint(&users(), "fk_missing")
            .await
            .unwrap_err();
        assert!(err.is_lookup_error());

        let exec = migrator.into_inner();
        assert_eq!(
            exec.executed_sql(),
            vec![
                "ALTER TABLE [users] ADD CONSTRAINT [chk_users_age] CHECK (age >= 0)",
                "ALTER TABLE [users] DROP CONSTRAINT [chk_users_age]",
            ]
        );
    }

    #[tokio::test]
    async fn test_set_column_comment_update_explicit_schema() {
        let mut migrator = Migrator::new(MockExecutor::new());
        let model = EntityModel::new("Person", "hr.people")
            .with_field(FieldModel::new("Name", "name", "nvarchar(50)").comment("legal name"));
        migrator
            .set_column_comment(&model, "Name", CommentMode::Update)
            .await
            .unwrap();

        let exec = migrator.into_inner();
        // Explicit schema: no SCHEMA_NAME() round trip.
        assert!(exec.queries().is_empty());
        let stmt = &exec.executed()[0];
        assert_eq!(stmt.sql, queries::UPDATE_COLUMN_COMMENT);
        assert_eq!(stmt.params, vec![s("legal name"), s("hr"), s("people"), s("name")]);
    }

    #[tokio::test]
    async fn test_dry_run_create_table() {
        let config = MigratorConfig::new().dry_run(true);
        let mut migrator =
            Migrator::with_config(MockExecutor::new().with_session("app", "dbo"), config);
        migrator.create_table(&[users()]).await.unwrap();

        assert_eq!(migrator.planned_statements().len(), 3);
        assert!(migrator.into_inner().executed().is_empty());
    }
}
