//! Reconciliation of the live schema with entity models.
//!
//! Per entity: an absent table is created with its indexes and comments; a
//! present table gets missing columns added, differing columns altered,
//! defaults and comments synced, and missing constraints and indexes
//! created. Tables, columns and indexes are never dropped here.

use std::fmt;

use tracing::info;

use crate::descriptor::{trim_default, ColumnDefault, ColumnDescriptor};
use crate::ddl::CommentMode;
use crate::error::{MigrateResult, MigrationError};
use crate::executor::SqlExecutor;
use crate::migrator::Migrator;
use crate::model::{reorder_models, ConstraintModel, EntityModel, FieldModel};
use crate::types::DeclaredType;

/// What a reconciliation run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Tables created.
    pub tables_created: Vec<String>,
    /// Columns added, as `table.column`.
    pub columns_added: Vec<String>,
    /// Columns altered, as `table.column`.
    pub columns_altered: Vec<String>,
    /// Column defaults replaced or removed, as `table.column`.
    pub defaults_changed: Vec<String>,
    /// Column comments added or updated, as `table.column`.
    pub comments_set: Vec<String>,
    /// Indexes created.
    pub indexes_created: usize,
    /// Constraints created.
    pub constraints_created: usize,
}

impl MigrationReport {
    /// Check if anything changed.
    pub fn has_changes(&self) -> bool {
        !self.tables_created.is_empty()
            || !self.columns_added.is_empty()
            || !self.columns_altered.is_empty()
            || !self.defaults_changed.is_empty()
            || !self.comments_set.is_empty()
            || self.indexes_created > 0
            || self.constraints_created > 0
    }

    /// One line description of the changes.
    pub fn summary(&self) -> String {
        let counts = [
            (self.tables_created.len(), "table created", "tables created"),
            (self.columns_added.len(), "column added", "columns added"),
            (self.columns_altered.len(), "column altered", "columns altered"),
            (self.defaults_changed.len(), "default changed", "defaults changed"),
            (self.comments_set.len(), "comment set", "comments set"),
            (self.indexes_created, "index created", "indexes created"),
            (self.constraints_created, "constraint created", "constraints created"),
        ];
        let parts: Vec<String> = counts
            .iter()
            .filter(|(n, _, _)| *n > 0)
            .map(|(n, one, many)| format!("{} {}", n, if *n == 1 { one } else { many }))
            .collect();

        if parts.is_empty() {
            "Schema is up to date".to_string()
        } else {
            parts.join(", ")
        }
    }
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Differences between a field and its live column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnDiff {
    /// Base type or size attributes differ.
    pub type_changed: bool,
    /// NULL / NOT NULL differs.
    pub nullability_changed: bool,
    /// Default presence or value differs.
    pub default_changed: bool,
}

impl ColumnDiff {
    /// Compare a field with a live column.
    ///
    /// Primary key columns only compare their type.
    pub fn between(field: &FieldModel, live: &ColumnDescriptor) -> Self {
        let type_changed = !DeclaredType::parse(&field.data_type).matches(live);
        if field.primary_key || live.primary_key {
            return Self {
                type_changed,
                ..Self::default()
            };
        }

        let nullability_changed = live.nullable.is_some_and(|n| n != field.nullable);
        let default_changed = match (&live.default, field.default_text()) {
            (ColumnDefault::Unknown, _) => false,
            (ColumnDefault::Absent, desired) => desired.is_some(),
            (ColumnDefault::Value(_), None) => true,
            (ColumnDefault::Value(have), Some(want)) => !default_matches(want, have),
        };

        Self {
            type_changed,
            nullability_changed,
            default_changed,
        }
    }

    /// Whether an `ALTER COLUMN` is required.
    ///
    /// Defaults live in their own constraint and never need one.
    pub fn needs_alter(&self) -> bool {
        self.type_changed || self.nullability_changed
    }
}

/// Bring a declared default into the shape the catalog reports after
/// trimming: `'abc'` becomes `abc`, `(0)` becomes `0`.
fn normalize_default(declared: &str) -> String {
    trim_default(&format!("({})", declared.trim()))
}

/// Compare a declared default with a trimmed catalog default.
///
/// A plain string literal loses its quotes when trimmed and is compared
/// exactly. Otherwise case is ignored outside quoted literals.
fn default_matches(declared: &str, live: &str) -> bool {
    let want = normalize_default(declared);
    if declared.trim().starts_with('\'') {
        return want == live;
    }
    fold_case_outside_literals(&want) == fold_case_outside_literals(live)
}

fn fold_case_outside_literals(expr: &str) -> String {
    let mut quoted = false;
    expr.chars()
        .map(|c| {
            if c == '\'' {
                quoted = !quoted;
                c
            } else if quoted {
                c
            } else {
                c.to_ascii_lowercase()
            }
        })
        .collect()
}

/// Decide how to sync a column comment.
///
/// Absent and empty comments are equal. With no property on the column the
/// comment is added; an existing property is updated, even to empty.
pub fn comment_action(desired: Option<&str>, live: Option<&str>) -> Option<CommentMode> {
    if desired.unwrap_or_default() == live.unwrap_or_default() {
        return None;
    }
    match live {
        None => Some(CommentMode::Add),
        Some(_) => Some(CommentMode::Update),
    }
}

impl<E: SqlExecutor> Migrator<E> {
    /// Reconcile the live schema with the models, referenced tables first.
    pub async fn auto_migrate(&mut self, models: &[EntityModel]) -> MigrateResult<MigrationReport> {
        let mut report = MigrationReport::default();

        for model in reorder_models(models) {
            if !self.has_table(model).await? {
                let indexes = self.create_one(model).await?;
                report.tables_created.push(model.fully_qualified());
                report.indexes_created += indexes;
                report.comments_set.extend(
                    model
                        .fields
                        .iter()
                        .filter(|f| f.comment_text().is_some())
                        .map(|f| member(model, f)),
                );
                continue;
            }

            let live = self.column_types(model).await?;
            for field in &model.fields {
                match live.iter().find(|c| c.name.eq_ignore_ascii_case(&field.column)) {
                    None => {
                        self.add_column(model, &field.name).await?;
                        report.columns_added.push(member(model, field));
                        if field.comment_text().is_some() {
                            report.comments_set.push(member(model, field));
                        }
                    }
                    Some(column) => {
                        self.migrate_column_into(model, field, column, &mut report)
                            .await?;
                    }
                }
            }

            for constraint in &model.constraints {
                if matches!(constraint, ConstraintModel::ForeignKey(_))
                    && self.config().disable_foreign_key_constraints
                {
                    continue;
                }
                if !self.has_constraint(model, constraint.name()).await? {
                    self.create_constraint(model, constraint.name()).await?;
                    report.constraints_created += 1;
                }
            }

            for index in &model.indexes {
                if !self.has_index(model, &index.name).await? {
                    self.create_index(model, &index.name).await?;
                    report.indexes_created += 1;
                }
            }
        }

        info!(summary = %report.summary(), "Auto migration finished");
        Ok(report)
    }

    /// Alter a present column when it differs from its field, then sync its
    /// comment.
    pub async fn migrate_column(
        &mut self,
        model: &EntityModel,
        field: &str,
        live: &ColumnDescriptor,
    ) -> MigrateResult<MigrationReport> {
        let field = model
            .lookup_field(field)
            .ok_or_else(|| MigrationError::field_not_found(&model.table, field))?;
        let mut report = MigrationReport::default();
        self.migrate_column_into(model, field, live, &mut report)
            .await?;
        Ok(report)
    }

    async fn migrate_column_into(
        &mut self,
        model: &EntityModel,
        field: &FieldModel,
        live: &ColumnDescriptor,
        report: &mut MigrationReport,
    ) -> MigrateResult<()> {
        let diff = ColumnDiff::between(field, live);
        if diff.needs_alter() || diff.default_changed {
            info!(
                table = %model.table,
                column = %field.column,
                diff = ?diff,
                "Column differs from model"
            );
        }

        // ALTER COLUMN of the type fails while a default is bound.
        let rebind_default = diff.default_changed
            || (diff.type_changed && live.default != ColumnDefault::Absent);
        if rebind_default {
            self.drop_column_default(model, &field.name).await?;
        }
        if diff.needs_alter() {
            self.alter_column(model, &field.name).await?;
            report.columns_altered.push(member(model, field));
        }
        if rebind_default {
            self.add_column_default(model, &field.name).await?;
        }
        if diff.default_changed {
            report.defaults_changed.push(member(model, field));
        }

        let current = self.get_column_comment(model, &field.column).await?;
        if let Some(mode) = comment_action(field.comment.as_deref(), current.as_deref()) {
            self.set_column_comment(model, &field.name, mode).await?;
            report.comments_set.push(member(model, field));
        }
        Ok(())
    }
}

fn member(model: &EntityModel, field: &FieldModel) -> String {
    format!("{}.{}", model.fully_qualified(), field.column)
}
