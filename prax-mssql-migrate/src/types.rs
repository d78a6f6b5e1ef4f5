//! Comparison of declared column types with live catalog types.

use crate::descriptor::ColumnDescriptor;

/// Types whose catalog entry carries `CHARACTER_MAXIMUM_LENGTH`.
const SIZED_TYPES: &[&str] = &["char", "varchar", "nchar", "nvarchar", "binary", "varbinary"];

/// Types whose catalog entry carries numeric precision and scale.
const EXACT_NUMERIC_TYPES: &[&str] = &["decimal", "numeric"];

/// Types whose catalog entry carries fractional seconds precision.
const FRACTIONAL_TIME_TYPES: &[&str] = &["datetime2", "time", "datetimeoffset"];

/// Spellings that the catalog reports under another name.
const ALIASES: &[(&str, &str)] = &[
    ("integer", "int"),
    ("dec", "decimal"),
    ("double precision", "float"),
    ("rowversion", "timestamp"),
    ("character", "char"),
    ("national character varying", "nvarchar"),
    ("national character", "nchar"),
];

/// A parsed type expression such as `nvarchar(256)` or `decimal(10, 2)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredType {
    /// Lowercase base name with aliases resolved.
    pub base: String,
    /// Lowercase arguments in order.
    pub args: Vec<String>,
}

impl DeclaredType {
    /// Parse a type expression.
    pub fn parse(expr: &str) -> Self {
        let expr = expr.trim().to_lowercase();
        let (base, args) = match expr.split_once('(') {
            Some((base, rest)) => {
                let inner = rest.trim_end().trim_end_matches(')');
                let args = inner
                    .split(',')
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty())
                    .collect();
                (base.trim().to_string(), args)
            }
            None => (expr, Vec::new()),
        };

        let base = ALIASES
            .iter()
            .find(|(alias, _)| *alias == base)
            .map(|(_, canonical)| canonical.to_string())
            .unwrap_or(base);

        Self { base, args }.normalize_float()
    }

    /// `float(1..=24)` is stored as `real`, `float(25..=53)` as `float`.
    fn normalize_float(mut self) -> Self {
        if self.base != "float" {
            return self;
        }
        if let Some(bits) = self.args.first().and_then(|a| a.parse::<u32>().ok()) {
            if (1..=24).contains(&bits) {
                self.base = "real".to_string();
            }
            self.args.clear();
        }
        self
    }

    fn int_arg(&self, idx: usize) -> Option<i64> {
        let arg = self.args.get(idx)?;
        if arg == "max" {
            return Some(-1);
        }
        arg.parse().ok()
    }

    /// Declared length of a sized type; `-1` for `max`, 1 when omitted.
    pub fn length(&self) -> Option<i64> {
        if !SIZED_TYPES.contains(&self.base.as_str()) {
            return None;
        }
        Some(self.int_arg(0).unwrap_or(1))
    }

    /// Declared precision and scale of an exact numeric type.
    pub fn precision_scale(&self) -> Option<(i64, i64)> {
        if !EXACT_NUMERIC_TYPES.contains(&self.base.as_str()) {
            return None;
        }
        Some((self.int_arg(0).unwrap_or(18), self.int_arg(1).unwrap_or(0)))
    }

    /// Declared fractional seconds precision; 7 when omitted.
    pub fn fractional_precision(&self) -> Option<i64> {
        if !FRACTIONAL_TIME_TYPES.contains(&self.base.as_str()) {
            return None;
        }
        Some(self.int_arg(0).unwrap_or(7))
    }

    /// Whether a live column already has this type.
    ///
    /// Size attributes the catalog did not report are not compared.
    pub fn matches(&self, column: &ColumnDescriptor) -> bool {
        if Self::parse(&column.data_type).base != self.base {
            return false;
        }

        if let (Some(want), Some(have)) = (self.length(), column.length) {
            if want != have {
                return false;
            }
        }

        if let Some((precision, scale)) = self.precision_scale() {
            if column.precision.is_some_and(|p| p != precision)
                || column.scale.is_some_and(|s| s != scale)
            {
                return false;
            }
        }

        if let (Some(want), Some(have)) = (self.fractional_precision(), column.datetime_precision)
        {
            if want != have {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(data_type: &str) -> ColumnDescriptor {
        ColumnDescriptor {
            name: "c".to_string(),
            data_type: data_type.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse() {
        let ty = DeclaredType::parse("NVARCHAR(256)");
        assert_eq!(ty.base, "nvarchar");
        assert_eq!(ty.args, vec!["256"]);

        let ty = DeclaredType::parse("decimal( 10 , 2 )");
        assert_eq!(ty.base, "decimal");
        assert_eq!(ty.precision_scale(), Some((10, 2)));

        assert_eq!(DeclaredType::parse("integer").base, "int");
        assert_eq!(DeclaredType::parse("varbinary(MAX)").length(), Some(-1));
        assert_eq!(DeclaredType::parse("nchar").length(), Some(1));
        assert_eq!(DeclaredType::parse("datetime2").fractional_precision(), Some(7));
        assert_eq!(DeclaredType::parse("bigint").length(), None);
    }

    #[test]
    fn test_matches_base_type() {
        assert!(DeclaredType::parse("bigint").matches(&column("bigint")));
        assert!(DeclaredType::parse("INT").matches(&column("int")));
        assert!(!DeclaredType::parse("bigint").matches(&column("int")));
    }

    #[test]
    fn test_float_bits_resolve_to_stored_type() {
        let single = DeclaredType::parse("float(24)");
        assert_eq!(single.base, "real");
        assert!(single.args.is_empty());
        assert!(single.matches(&column("real")));
        assert!(!single.matches(&column("float")));

        let double = DeclaredType::parse("FLOAT(53)");
        assert_eq!(double.base, "float");
        assert!(double.args.is_empty());
        assert!(double.matches(&column("float")));

        assert!(DeclaredType::parse("float(1)").matches(&column("real")));
        assert!(DeclaredType::parse("float(25)").matches(&column("float")));
        assert!(DeclaredType::parse("float").matches(&column("float")));
    }

    #[test]
    fn test_matches_length() {
        let mut live = column("nvarchar");
        live.length = Some(256);
        assert!(DeclaredType::parse("nvarchar(256)").matches(&live));
        assert!(!DeclaredType::parse("nvarchar(100)").matches(&live));

        live.length = Some(-1);
        assert!(DeclaredType::parse("nvarchar(max)").matches(&live));
    }

    #[test]
    fn test_matches_precision_and_scale() {
        let mut live = column("decimal");
        live.precision = Some(10);
        live.scale = Some(2);
        assert!(DeclaredType::parse("decimal(10,2)").matches(&live));
        assert!(!DeclaredType::parse("decimal(12,2)").matches(&live));
        assert!(!DeclaredType::parse("decimal(10,4)").matches(&live));
    }

    #[test]
    fn test_matches_fractional_precision() {
        let mut live = column("datetime2");
        live.datetime_precision = Some(7);
        assert!(DeclaredType::parse("datetime2").matches(&live));
        assert!(!DeclaredType::parse("datetime2(3)").matches(&live));
    }

    #[test]
    fn test_unreported_sizes_are_ignored() {
        assert!(DeclaredType::parse("nvarchar(50)").matches(&column("nvarchar")));
    }
}
