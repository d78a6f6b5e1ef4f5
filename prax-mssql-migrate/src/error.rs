//! Error types for SQL Server introspection and migration.

use thiserror::Error;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur while reading the catalog or emitting DDL.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A qualified name could not be split into catalog, schema and table.
    #[error("cannot resolve object name '{0}'")]
    Resolution(String),

    /// The server rejected a statement.
    #[error("sql server error {code}: {message}")]
    Server {
        /// SQL Server error number.
        code: u32,
        /// Server supplied message.
        message: String,
    },

    /// Driver or transport failure that did not come from the server.
    #[error("driver error: {0}")]
    Driver(String),

    /// A unique constraint or unique index was violated.
    #[error("duplicated key: {0}")]
    DuplicatedKey(String),

    /// A foreign key constraint was violated.
    #[error("foreign key violated: {0}")]
    ForeignKeyViolated(String),

    /// The model has no field with the requested name.
    #[error("failed to look up field with name: {field} (model '{model}')")]
    FieldNotFound {
        /// Model or table the lookup ran against.
        model: String,
        /// Requested field name.
        field: String,
    },

    /// The model has no index with the requested name.
    #[error("failed to create index with name {index} (model '{model}')")]
    IndexNotFound {
        /// Model or table the lookup ran against.
        model: String,
        /// Requested index name.
        index: String,
    },

    /// The model has no constraint with the requested name.
    #[error("failed to look up constraint with name {constraint} (model '{model}')")]
    ConstraintNotFound {
        /// Model or table the lookup ran against.
        model: String,
        /// Requested constraint name.
        constraint: String,
    },

    /// A catalog row did not have the expected shape.
    #[error("unexpected catalog row: {0}")]
    Row(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error while connecting.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error raised while operating on a specific object.
    #[error("{object}: {source}")]
    Object {
        /// Qualified object name.
        object: String,
        /// Underlying error.
        #[source]
        source: Box<MigrationError>,
    },
}

impl MigrationError {
    /// Create a resolution error.
    pub fn resolution(name: impl Into<String>) -> Self {
        Self::Resolution(name.into())
    }

    /// Create a driver error.
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver(message.into())
    }

    /// Create a row shape error.
    pub fn row(message: impl Into<String>) -> Self {
        Self::Row(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a field lookup error.
    pub fn field_not_found(model: impl Into<String>, field: impl Into<String>) -> Self {
        Self::FieldNotFound {
            model: model.into(),
            field: field.into(),
        }
    }

    /// Create an index lookup error.
    pub fn index_not_found(model: impl Into<String>, index: impl Into<String>) -> Self {
        Self::IndexNotFound {
            model: model.into(),
            index: index.into(),
        }
    }

    /// Create a constraint lookup error.
    pub fn constraint_not_found(model: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self::ConstraintNotFound {
            model: model.into(),
            constraint: constraint.into(),
        }
    }

    /// Attach the name of the object being operated on.
    pub fn on_object(self, object: impl Into<String>) -> Self {
        Self::Object {
            object: object.into(),
            source: Box::new(self),
        }
    }

    /// The SQL Server error number, looking through object context.
    pub fn server_code(&self) -> Option<u32> {
        match self {
            Self::Server { code, .. } => Some(*code),
            Self::Object { source, .. } => source.server_code(),
            _ => None,
        }
    }

    /// The error without any object context.
    pub fn root(&self) -> &MigrationError {
        match self {
            Self::Object { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if this is a model lookup failure.
    pub fn is_lookup_error(&self) -> bool {
        matches!(
            self.root(),
            Self::FieldNotFound { .. } | Self::IndexNotFound { .. } | Self::ConstraintNotFound { .. }
        )
    }
}

impl From<tiberius::error::Error> for MigrationError {
    fn from(err: tiberius::error::Error) -> Self {
        match err {
            tiberius::error::Error::Server(token) => MigrationError::Server {
                code: token.code(),
                message: token.message().to_string(),
            },
            other => MigrationError::Driver(other.to_string()),
        }
    }
}

/// Extension for attaching object context to results.
pub trait ResultExt<T> {
    /// Wrap the error with the name of the object being operated on.
    fn on_object(self, object: impl Into<String>) -> MigrateResult<T>;
}

impl<T> ResultExt<T> for MigrateResult<T> {
    fn on_object(self, object: impl Into<String>) -> MigrateResult<T> {
        self.map_err(|e| e.on_object(object))
    }
}
