//! Three-part object names (`catalog.schema.table`).
//!
//! Resolution is purely textual; nothing here talks to the server. An empty
//! schema means "not given" and is matched against any schema by catalog
//! lookups, it is never replaced eagerly by the session's default schema.

use std::fmt;

use crate::error::{MigrateResult, MigrationError};
use crate::sql::quote_ident;

/// Wildcard used in `LIKE` filters when no schema was given.
pub const ANY_SCHEMA: &str = "%";

/// A possibly qualified object name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    /// Catalog (database) part, empty unless given.
    pub catalog: String,
    /// Schema part, empty unless given.
    pub schema: String,
    /// Table part.
    pub table: String,
}

impl QualifiedName {
    /// Split a dotted name into its parts.
    ///
    /// One part is a table, two are `schema.table`, three are
    /// `catalog.schema.table`. Any other arity yields an all-empty name,
    /// which [`QualifiedName::is_empty`] reports.
    pub fn split(name: &str) -> Self {
        let parts: Vec<&str> = name.split('.').collect();
        match parts.as_slice() {
            [table] => Self {
                table: (*table).to_string(),
                ..Self::default()
            },
            [schema, table] => Self {
                schema: (*schema).to_string(),
                table: (*table).to_string(),
                ..Self::default()
            },
            [catalog, schema, table] => Self {
                catalog: (*catalog).to_string(),
                schema: (*schema).to_string(),
                table: (*table).to_string(),
            },
            _ => Self::default(),
        }
    }

    /// Split a dotted name, failing when it cannot be resolved.
    pub fn resolve(name: &str) -> MigrateResult<Self> {
        let resolved = Self::split(name);
        if resolved.table.is_empty() {
            return Err(MigrationError::resolution(name));
        }
        Ok(resolved)
    }

    /// Whether this is the failure sentinel.
    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty() && self.schema.is_empty() && self.table.is_empty()
    }

    /// The explicit schema, if one was given.
    pub fn schema(&self) -> Option<&str> {
        if self.schema.is_empty() {
            None
        } else {
            Some(&self.schema)
        }
    }

    /// The explicit catalog, if one was given.
    pub fn catalog(&self) -> Option<&str> {
        if self.catalog.is_empty() {
            None
        } else {
            Some(&self.catalog)
        }
    }

    /// Schema value for `LIKE` filters: the schema, or `%` when absent.
    pub fn schema_pattern(&self) -> &str {
        self.schema().unwrap_or(ANY_SCHEMA)
    }

    /// `schema.table` when a schema was given, otherwise the bare table.
    pub fn fully_qualified(&self) -> String {
        match self.schema() {
            Some(schema) => format!("{}.{}", schema, self.table),
            None => self.table.clone(),
        }
    }

    /// Bracket-quoted reference for use in SQL text.
    ///
    /// The catalog is only included together with a schema.
    pub fn quoted(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        if let Some(schema) = self.schema() {
            if let Some(catalog) = self.catalog() {
                parts.push(quote_ident(catalog));
            }
            parts.push(quote_ident(schema));
        }
        parts.push(quote_ident(&self.table));
        parts.join(".")
    }

    /// Quoted reference to a member (column or index) of this table.
    pub fn quoted_member(&self, member: &str) -> String {
        format!("{}.{}", self.quoted(), quote_ident(member))
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(catalog) = self.catalog() {
            write!(f, "{}.", catalog)?;
        }
        f.write_str(&self.fully_qualified())
    }
}
