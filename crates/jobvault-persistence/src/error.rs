//! Errores de persistencia.
//! Mapea errores de Diesel / conexión a variantes semánticas y de ahí a
//! `StoreError`, que es lo único que ve el core.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use jobvault_core::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("unique violation: {0}")]
    UniqueViolation(String),
    #[error("check violation: {0}")]
    CheckViolation(String),
    #[error("not found")]
    NotFound,
    #[error("serialization conflict (retryable)")]
    SerializationConflict,
    #[error("transient IO / connection pool error: {0}")]
    TransientIo(String),
    #[error("document (de)serialization: {0}")]
    Document(String),
    #[error("configuration: {0}")]
    Config(String),
    #[error("unknown database error: {0}")]
    Unknown(String),
}

impl From<DieselError> for PersistenceError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => Self::NotFound,
            DieselError::DatabaseError(kind, info) => match kind {
                DatabaseErrorKind::UniqueViolation => Self::UniqueViolation(info.message().to_string()),
                DatabaseErrorKind::CheckViolation => Self::CheckViolation(info.message().to_string()),
                DatabaseErrorKind::SerializationFailure => Self::SerializationConflict,
                DatabaseErrorKind::ClosedConnection => Self::TransientIo(info.message().to_string()),
                other => Self::Unknown(format!("db error kind {:?}: {}", other, info.message())),
            },
            DieselError::DeserializationError(e) => Self::Document(format!("deser: {e}")),
            DieselError::SerializationError(e) => Self::Document(format!("ser: {e}")),
            DieselError::BrokenTransactionManager => Self::TransientIo("broken transaction manager".into()),
            DieselError::QueryBuilderError(e) => Self::Unknown(format!("query builder: {e}")),
            other => Self::Unknown(format!("unhandled diesel error: {other:?}")),
        }
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Document(err.to_string())
    }
}

impl From<PersistenceError> for StoreError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::UniqueViolation(m) => StoreError::UniqueViolation(m),
            PersistenceError::SerializationConflict => StoreError::Unavailable("serialization conflict".into()),
            PersistenceError::TransientIo(m) => StoreError::Unavailable(m),
            PersistenceError::Document(m) => StoreError::Serialization(m),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_to_store_error_kinds() {
        assert!(matches!(StoreError::from(PersistenceError::UniqueViolation("uk".into())),
                         StoreError::UniqueViolation(_)));
        assert!(matches!(StoreError::from(PersistenceError::TransientIo("pool".into())),
                         StoreError::Unavailable(_)));
        assert!(matches!(StoreError::from(PersistenceError::SerializationConflict), StoreError::Unavailable(_)));
        assert!(matches!(StoreError::from(PersistenceError::Config("DATABASE_URL".into())), StoreError::Backend(_)));
        assert_eq!(PersistenceError::from(DieselError::NotFound).to_string(), "not found");
    }
}
