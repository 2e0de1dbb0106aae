use sea_orm::error::DbErr;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Crate-wide error type for ledger operations.
///
/// Persistence failures keep the failing call site as `context` and the
/// underlying [`DbErr`] as source, so a caller sees both what the ledger was
/// doing and why the store refused.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Read failure: {context}")]
    ReadFailure {
        context: String,
        #[source]
        source: DbErr,
    },

    #[error("Decode failure: {context}")]
    DecodeFailure {
        context: String,
        #[source]
        source: DbErr,
    },

    #[error("Write failure: {context}")]
    WriteFailure {
        context: String,
        #[source]
        source: DbErr,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    /// Map a read-path [`DbErr`] with call-site context. Deserialization
    /// problems surface as `DecodeFailure`, everything else as
    /// `ReadFailure`.
    pub fn read(context: impl Into<String>) -> impl FnOnce(DbErr) -> Self {
        let context = context.into();
        move |source| match source {
            DbErr::Type(_) | DbErr::Json(_) | DbErr::TryIntoErr { .. } => {
                ServiceError::DecodeFailure { context, source }
            }
            _ => ServiceError::ReadFailure { context, source },
        }
    }

    /// Map a write-path [`DbErr`] with call-site context.
    pub fn write(context: impl Into<String>) -> impl FnOnce(DbErr) -> Self {
        let context = context.into();
        move |source| ServiceError::WriteFailure { context, source }
    }

    pub fn product_not_found(product_id: Uuid) -> Self {
        ServiceError::NotFound(format!("Product {} not found", product_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn read_helper_classifies_decode_errors() {
        let decode = ServiceError::read("load entry")(DbErr::Type("bad column".into()));
        assert_matches!(decode, ServiceError::DecodeFailure { .. });

        let read = ServiceError::read("load entry")(DbErr::Custom("connection reset".into()));
        assert_matches!(read, ServiceError::ReadFailure { .. });
    }

    #[test]
    fn errors_render_their_context() {
        let err = ServiceError::write("insert stock history entry")(DbErr::Custom("boom".into()));
        assert_eq!(
            err.to_string(),
            "Write failure: insert stock history entry"
        );
    }
}
