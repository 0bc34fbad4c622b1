//! Error types for sitewarden

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// A single field-level validation failure, carrying the offending value.
#[derive(Debug, Clone, Serialize)]
pub struct FieldViolation {
    pub field: &'static str,
    pub value: String,
    pub message: String,
}

/// Aggregated validation failures for one write.
///
/// Alias writes collect every violation before reporting, so callers see
/// the full set at once instead of fixing one field per round trip.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationErrors {
    violations: Vec<FieldViolation>,
}

impl ValidationErrors {
    pub fn push(&mut self, field: &'static str, value: impl Into<String>, message: impl Into<String>) {
        self.violations.push(FieldViolation {
            field,
            value: value.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }

    /// Ok if no violations were recorded, otherwise the aggregated error.
    pub fn into_result(self) -> Result<(), AliasError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AliasError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for v in &self.violations {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}: {} ({:?})", v.field, v.message, v.value)?;
            first = false;
        }
        Ok(())
    }
}

/// Errors produced by the alias resolution and synchronization core.
#[derive(Debug, Error)]
pub enum AliasError {
    /// Malformed or empty host given to hostname expansion.
    #[error("invalid host: {0:?}")]
    InvalidHost(String),

    /// One or more field-level violations on an alias write.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// The synchronizer found a site in a state it cannot safely resolve.
    #[error("inconsistent state: {0}")]
    InconsistentState(String),

    /// A store-level uniqueness constraint fired, typically from a racing
    /// concurrent write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Site context used without a configured default.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for AliasError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            // PostgreSQL unique violation: surfaced as a conflict so racing
            // canonical writes are never silently merged.
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                AliasError::Conflict(db_err.message().to_string())
            }
            _ => AliasError::Database(err.to_string()),
        }
    }
}
