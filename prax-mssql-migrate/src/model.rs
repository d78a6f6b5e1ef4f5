//! The logical entity model that migrations are driven from.
//!
//! These types are what the ORM's model layer hands to the migrator: a table
//! name (possibly `schema.table`), fields with declared and storage names,
//! index definitions and constraints. The migrator never mutates them.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::MigrateResult;
use crate::name::QualifiedName;

/// A model (entity) mapped to one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityModel {
    /// Model name as declared in code.
    pub name: String,
    /// Table name, optionally qualified as `schema.table` or
    /// `catalog.schema.table`.
    pub table: String,
    /// Fields in declaration order.
    pub fields: Vec<FieldModel>,
    /// Declared indexes.
    pub indexes: Vec<IndexModel>,
    /// Declared foreign key and check constraints.
    pub constraints: Vec<ConstraintModel>,
}

impl EntityModel {
    /// Create a model for a table.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            ..Self::default()
        }
    }

    /// A model that only carries a table name.
    ///
    /// Name lookups against it fall through to the raw names given.
    pub fn named(table: impl Into<String>) -> Self {
        let table = table.into();
        Self::new(table.clone(), table)
    }

    /// Add a field.
    pub fn with_field(mut self, field: FieldModel) -> Self {
        self.fields.push(field);
        self
    }

    /// Add an index.
    pub fn with_index(mut self, index: IndexModel) -> Self {
        self.indexes.push(index);
        self
    }

    /// Add a constraint.
    pub fn with_constraint(mut self, constraint: impl Into<ConstraintModel>) -> Self {
        self.constraints.push(constraint.into());
        self
    }

    /// Resolve the table name into its parts.
    pub fn qualified_name(&self) -> MigrateResult<QualifiedName> {
        QualifiedName::resolve(&self.table)
    }

    /// The schema named explicitly in the table name, if any.
    pub fn schema_of(&self) -> Option<String> {
        if !self.table.contains('.') {
            return None;
        }
        QualifiedName::split(&self.table)
            .schema()
            .map(ToString::to_string)
    }

    /// `schema.table` when a schema is given, otherwise the bare table.
    pub fn fully_qualified(&self) -> String {
        QualifiedName::split(&self.table).fully_qualified()
    }

    /// Find a field by storage name or declared name.
    pub fn lookup_field(&self, name: &str) -> Option<&FieldModel> {
        self.fields
            .iter()
            .find(|f| f.column == name)
            .or_else(|| self.fields.iter().find(|f| f.name == name))
    }

    /// Storage (column) name for a declared name.
    pub fn storage_name_of(&self, declared: &str) -> String {
        storage_name_of(self, declared)
    }

    /// Find an index by name, or the first index covering a field.
    pub fn lookup_index(&self, name: &str) -> Option<&IndexModel> {
        if let Some(index) = self.indexes.iter().find(|i| i.name == name) {
            return Some(index);
        }
        let field = self.lookup_field(name)?;
        self.indexes.iter().find(|index| {
            index
                .columns
                .iter()
                .any(|c| c.field == field.name || c.field == field.column)
        })
    }

    /// Backend index name for a declared index or field name.
    pub fn index_name_of(&self, declared: &str) -> String {
        self.lookup_index(declared)
            .map(|index| index.name.clone())
            .unwrap_or_else(|| declared.to_string())
    }

    /// Find a constraint by name.
    pub fn lookup_constraint(&self, name: &str) -> Option<&ConstraintModel> {
        self.constraints.iter().find(|c| c.name() == name)
    }

    /// Fields that are part of the primary key.
    pub fn primary_key(&self) -> impl Iterator<Item = &FieldModel> {
        self.fields.iter().filter(|f| f.primary_key)
    }

    /// Tables referenced by this model's foreign keys.
    pub fn referenced_tables(&self) -> impl Iterator<Item = &str> {
        self.constraints.iter().filter_map(|c| match c {
            ConstraintModel::ForeignKey(fk) => Some(fk.references.as_str()),
            ConstraintModel::Check(_) => None,
        })
    }
}

/// Resolve a declared field name to the column name stored in the backend.
///
/// Names that do not match a field are returned unchanged, so raw column
/// names can be passed straight through.
pub fn storage_name_of(model: &EntityModel, declared: &str) -> String {
    model
        .lookup_field(declared)
        .map(|field| field.column.clone())
        .unwrap_or_else(|| declared.to_string())
}

/// A field mapped to a column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldModel {
    /// Field name as declared in code.
    pub name: String,
    /// Column name in the database.
    pub column: String,
    /// SQL Server type, e.g. `bigint` or `nvarchar(256)`.
    pub data_type: String,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Whether this field is part of the primary key.
    pub primary_key: bool,
    /// Whether the column is an identity column.
    pub auto_increment: bool,
    /// Whether the column carries a unique constraint.
    pub unique: bool,
    /// Default value expression.
    pub default: Option<String>,
    /// Column comment.
    pub comment: Option<String>,
}

impl FieldModel {
    /// Create a nullable field.
    pub fn new(
        name: impl Into<String>,
        column: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
            data_type: data_type.into(),
            nullable: true,
            ..Self::default()
        }
    }

    /// Mark the field NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Mark the field as (part of) the primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Mark the field as an identity column.
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Mark the field unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Set the default value expression.
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Set the column comment.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// The comment, when one is declared and not empty.
    pub fn comment_text(&self) -> Option<&str> {
        self.comment.as_deref().filter(|c| !c.is_empty())
    }

    /// The declared default, treating `NULL` as no default.
    pub fn default_text(&self) -> Option<&str> {
        self.default
            .as_deref()
            .filter(|d| !d.trim().eq_ignore_ascii_case("null"))
    }
}

/// Sort direction of an index column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

impl SortOrder {
    /// SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// A column reference inside an index definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexColumn {
    /// Declared field name (or column name).
    pub field: String,
    /// Optional sort direction.
    pub sort: Option<SortOrder>,
}

/// A declared index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexModel {
    /// Index name.
    pub name: String,
    /// Indexed columns in declaration order.
    pub columns: Vec<IndexColumn>,
    /// Index class, e.g. `UNIQUE`, `CLUSTERED` or `UNIQUE NONCLUSTERED`.
    pub class: Option<String>,
    /// Filter predicate (`WHERE ...`).
    pub where_clause: Option<String>,
    /// Trailing options, e.g. `WITH (ONLINE = ON)`.
    pub option: Option<String>,
}

impl IndexModel {
    /// Create an index definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a column.
    pub fn column(mut self, field: impl Into<String>) -> Self {
        self.columns.push(IndexColumn {
            field: field.into(),
            sort: None,
        });
        self
    }

    /// Add a column with a sort direction.
    pub fn column_sorted(mut self, field: impl Into<String>, sort: SortOrder) -> Self {
        self.columns.push(IndexColumn {
            field: field.into(),
            sort: Some(sort),
        });
        self
    }

    /// Set the index class.
    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    /// Set the filter predicate.
    pub fn filter(mut self, predicate: impl Into<String>) -> Self {
        self.where_clause = Some(predicate.into());
        self
    }

    /// Set trailing index options.
    pub fn option(mut self, option: impl Into<String>) -> Self {
        self.option = Some(option.into());
        self
    }

    /// Whether the class makes this a unique index.
    pub fn is_unique(&self) -> bool {
        self.class
            .as_deref()
            .is_some_and(|c| c.split_whitespace().any(|w| w.eq_ignore_ascii_case("UNIQUE")))
    }
}

/// A declared constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstraintModel {
    /// Foreign key.
    ForeignKey(ForeignKeyModel),
    /// Check constraint.
    Check(CheckModel),
}

impl ConstraintModel {
    /// Constraint name.
    pub fn name(&self) -> &str {
        match self {
            Self::ForeignKey(fk) => &fk.name,
            Self::Check(check) => &check.name,
        }
    }
}

impl From<ForeignKeyModel> for ConstraintModel {
    fn from(fk: ForeignKeyModel) -> Self {
        Self::ForeignKey(fk)
    }
}

impl From<CheckModel> for ConstraintModel {
    fn from(check: CheckModel) -> Self {
        Self::Check(check)
    }
}

/// A foreign key from this model's columns to another table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyModel {
    /// Constraint name.
    pub name: String,
    /// Local fields (declared or column names).
    pub columns: Vec<String>,
    /// Referenced table, optionally qualified.
    pub references: String,
    /// Referenced columns.
    pub referenced_columns: Vec<String>,
    /// `ON DELETE` action.
    pub on_delete: Option<String>,
    /// `ON UPDATE` action.
    pub on_update: Option<String>,
}

impl ForeignKeyModel {
    /// Create a foreign key definition.
    pub fn new(
        name: impl Into<String>,
        columns: &[&str],
        references: impl Into<String>,
        referenced_columns: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            references: references.into(),
            referenced_columns: referenced_columns.iter().map(|c| c.to_string()).collect(),
            on_delete: None,
            on_update: None,
        }
    }

    /// Set the `ON DELETE` action.
    pub fn on_delete(mut self, action: impl Into<String>) -> Self {
        self.on_delete = Some(action.into());
        self
    }

    /// Set the `ON UPDATE` action.
    pub fn on_update(mut self, action: impl Into<String>) -> Self {
        self.on_update = Some(action.into());
        self
    }
}

/// A check constraint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckModel {
    /// Constraint name.
    pub name: String,
    /// Boolean expression.
    pub expression: String,
}

impl CheckModel {
    /// Create a check constraint.
    pub fn new(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
        }
    }
}

/// Order models so that referenced tables come before their dependents.
///
/// Input order is kept wherever dependencies allow it. References to tables
/// outside the list, self references and cycles are ignored.
pub fn reorder_models(models: &[EntityModel]) -> Vec<&EntityModel> {
    let mut ordered: IndexSet<usize> = IndexSet::with_capacity(models.len());
    let mut visiting = vec![false; models.len()];

    for i in 0..models.len() {
        visit(models, i, &mut visiting, &mut ordered);
    }

    ordered.into_iter().map(|i| &models[i]).collect()
}

fn visit(models: &[EntityModel], i: usize, visiting: &mut [bool], ordered: &mut IndexSet<usize>) {
    if ordered.contains(&i) || visiting[i] {
        return;
    }
    visiting[i] = true;

    for reference in models[i].referenced_tables() {
        if let Some(j) = models
            .iter()
            .position(|m| refers_to(reference, &m.table))
            .filter(|j| *j != i)
        {
            visit(models, j, visiting, ordered);
        }
    }

    visiting[i] = false;
    ordered.insert(i);
}

/// Whether a foreign key reference names the given table.
///
/// An unqualified reference matches the table part only.
fn refers_to(reference: &str, table: &str) -> bool {
    let reference = QualifiedName::split(reference);
    let table = QualifiedName::split(table);
    if !reference.table.eq_ignore_ascii_case(&table.table) {
        return false;
    }
    match (reference.schema(), table.schema()) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => true,
    }
}
