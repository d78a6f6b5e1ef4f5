//! Live schema descriptors read from the catalog.
//!
//! Descriptors are built fresh for every introspection call and handed to the
//! caller by value.

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::name::QualifiedName;

static DEFAULT_WRAPPING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\('?([^']*)'?\)$").expect("valid default trim regex"));

/// Strip `(...)` and `('...')` wrapping from a catalog default expression.
///
/// SQL Server stores `DEFAULT 0` as `((0))` and `DEFAULT 'x'` as `('x')`.
/// Trimming repeats until the value stops changing, so it is idempotent.
pub fn trim_default(raw: &str) -> String {
    let mut value = raw.to_string();
    while let Some(inner) = DEFAULT_WRAPPING
        .captures(&value)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
    {
        if inner == value {
            break;
        }
        value = inner;
    }
    value
}

/// Default value of a live column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ColumnDefault {
    /// Not read from the catalog; default comparison is skipped.
    #[default]
    Unknown,
    /// The column has no default constraint.
    Absent,
    /// The column has a default, already trimmed. May be the empty string.
    Value(String),
}

impl ColumnDefault {
    /// Build from a nullable `COLUMN_DEFAULT` value.
    pub fn from_catalog(raw: Option<&str>) -> Self {
        match raw {
            Some(raw) => Self::Value(trim_default(raw)),
            None => Self::Absent,
        }
    }

    /// The default value, if one exists.
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// A live column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,
    /// `DATA_TYPE`, e.g. `nvarchar`.
    pub data_type: String,
    /// Type name reported by the driver for the probe query.
    pub native_type: Option<String>,
    /// Default value.
    pub default: ColumnDefault,
    /// Whether NULL is allowed; `None` when the catalog did not say.
    pub nullable: Option<bool>,
    /// `CHARACTER_MAXIMUM_LENGTH`; `-1` for `max`.
    pub length: Option<i64>,
    /// `NUMERIC_PRECISION`.
    pub precision: Option<i64>,
    /// `NUMERIC_PRECISION_RADIX`.
    pub radix: Option<i64>,
    /// `NUMERIC_SCALE`.
    pub scale: Option<i64>,
    /// `DATETIME_PRECISION`.
    pub datetime_precision: Option<i64>,
    /// Member of the primary key.
    pub primary_key: bool,
    /// Member of a unique constraint.
    pub unique: bool,
    /// `MS_Description` extended property.
    pub comment: Option<String>,
}

impl ColumnDescriptor {
    /// Datetime precision when present, numeric precision otherwise.
    pub fn decimal_size(&self) -> Option<i64> {
        self.datetime_precision.or(self.precision)
    }
}

/// A live index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexDescriptor {
    /// Index name.
    pub name: String,
    /// Owning table as given by the caller.
    pub table: String,
    /// Columns in catalog row order.
    pub columns: Vec<String>,
    /// Unique index.
    pub unique: bool,
    /// Backs the primary key.
    pub primary_key: bool,
}

/// A foreign key found on some table, used for cascading drops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintRef {
    /// Constraint name.
    pub name: String,
    /// Table the constraint is declared on.
    pub parent: QualifiedName,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_default() {
        assert_eq!(trim_default("('0')"), "0");
        assert_eq!(trim_default("((0))"), "0");
        assert_eq!(trim_default("(N'abc')"), "(N'abc')");
        assert_eq!(trim_default("('')"), "");
        assert_eq!(trim_default("(getdate())"), "getdate()");
        assert_eq!(trim_default("0"), "0");
    }

    #[test]
    fn test_trim_default_idempotent() {
        for raw in ["('0')", "((1))", "('hello')", "(getdate())", "plain"] {
            let once = trim_default(raw);
            assert_eq!(trim_default(&once), once);
        }
    }

    #[test]
    fn test_default_tristate() {
        assert_eq!(ColumnDefault::from_catalog(None), ColumnDefault::Absent);
        assert_eq!(
            ColumnDefault::from_catalog(Some("('')")),
            ColumnDefault::Value(String::new())
        );
        assert_ne!(
            ColumnDefault::from_catalog(None),
            ColumnDefault::from_catalog(Some("('')"))
        );
        assert_eq!(ColumnDefault::Unknown.value(), None);
    }

    #[test]
    fn test_decimal_size() {
        let column = ColumnDescriptor {
            precision: Some(18),
            ..Default::default()
        };
        assert_eq!(column.decimal_size(), Some(18));

        let column = ColumnDescriptor {
            precision: Some(18),
            datetime_precision: Some(7),
            ..Default::default()
        };
        assert_eq!(column.decimal_size(), Some(7));
    }
}
