//! Translation of SQL Server error numbers into semantic errors.
//!
//! Error numbers are listed in the "Database engine events and errors"
//! reference for SQL Server.

use crate::error::MigrationError;

/// Semantic outcome for a recognized server error number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unique constraint or unique index violation.
    DuplicatedKey,
    /// Foreign key (or other reference constraint) violation.
    ForeignKeyViolated,
}

const ERROR_CODES: &[(u32, ErrorKind)] = &[
    (2627, ErrorKind::DuplicatedKey),
    (2601, ErrorKind::DuplicatedKey),
    (547, ErrorKind::ForeignKeyViolated),
];

/// Look up the semantic kind for a server error number.
pub fn kind_of(code: u32) -> Option<ErrorKind> {
    ERROR_CODES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, kind)| *kind)
}

/// Translate a server error into its semantic counterpart.
///
/// Errors without a recognized number are returned unchanged. Object context
/// is preserved around the translated error.
pub fn translate(err: MigrationError) -> MigrationError {
    match err {
        MigrationError::Server { code, message } => match kind_of(code) {
            Some(ErrorKind::DuplicatedKey) => MigrationError::DuplicatedKey(message),
            Some(ErrorKind::ForeignKeyViolated) => MigrationError::ForeignKeyViolated(message),
            None => MigrationError::Server { code, message },
        },
        MigrationError::Object { object, source } => MigrationError::Object {
            object,
            source: Box::new(translate(*source)),
        },
        other => other,
    }
}
