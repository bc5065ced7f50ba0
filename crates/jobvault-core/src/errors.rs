//! Errores del repositorio de ejecuciones.
//!
//! Tres niveles:
//! - `StoreError`: lo que reporta un backend (memoria o Postgres).
//! - `CodecError`: fallos al (de)serializar el blob de contexto.
//! - `RepositoryError`: contrato observable por quien llama al
//!   `ExecutionStore`/`HistoryReader`. Cada variante lleva el contexto
//!   necesario (executionId, jobName, jobKey, version) para ser accionable en
//!   logs.

use thiserror::Error;

/// Error reportado por una colección de documentos.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unique index violation: {0}")]
    UniqueViolation(String),
    #[error("store unavailable (retryable): {0}")]
    Unavailable(String),
    #[error("document serialization: {0}")]
    Serialization(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Fallo del codec del contexto de ejecución. Conserva la causa de IO.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("execution context codec failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Clasificación gruesa para que el llamador decida (reintentar, abortar,
/// alertar).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    Conflict,
    OptimisticLock,
    Fatal,
    Transient,
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("missing required field `{field}` ({context})")]
    MissingField { field: &'static str, context: String },
    #[error("step execution already saved with id={step_execution_id}")]
    StepAlreadySaved { step_execution_id: i64 },
    #[error("step execution id={step_execution_id} not found in job execution id={execution_id}")]
    UnknownStep { execution_id: i64, step_execution_id: i64 },
    #[error("invalid execution context: {0}")]
    Codec(#[source] CodecError),
    #[error("job execution id={0} not found")]
    NoSuchExecution(i64),
    #[error("identifying parameters do not match job instance: job_name={job_name} instance_key={expected} params_key={actual}")]
    JobKeyMismatch { job_name: String, expected: String, actual: String },

    #[error("job execution already running: job_name={job_name} job_key={job_key} execution_id={execution_id}")]
    AlreadyRunning { job_name: String, job_key: String, execution_id: i64 },
    #[error("job instance already complete: job_name={job_name} job_key={job_key} instance_id={instance_id}; change identifying parameters to start a new instance")]
    AlreadyComplete { job_name: String, job_key: String, instance_id: i64 },
    #[error("cannot restart job execution in status UNKNOWN: job_name={job_name} execution_id={execution_id}")]
    RestartUnknown { job_name: String, execution_id: i64 },
    #[error("job instance already exists: job_name={job_name} job_key={job_key}")]
    InstanceAlreadyExists { job_name: String, job_key: String },
    #[error("no job instances found for job_name={0}")]
    NoSuchJob(String),

    #[error("optimistic lock failure: execution_id={execution_id} expected version={version}")]
    OptimisticLock { execution_id: i64, version: i64 },

    #[error("job instance has no executions: job_name={job_name} job_key={job_key}")]
    InstanceWithoutExecutions { job_name: String, job_key: String },
    #[error("sequence counter document missing: {0}")]
    CounterMissing(String),
    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RepositoryError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MissingField { .. } | Self::StepAlreadySaved { .. } | Self::UnknownStep { .. }
            | Self::Codec(_)
            | Self::NoSuchExecution(_)
            | Self::JobKeyMismatch { .. } => {
                ErrorClass::Validation
            }
            Self::AlreadyRunning { .. }
            | Self::AlreadyComplete { .. }
            | Self::RestartUnknown { .. }
            | Self::InstanceAlreadyExists { .. }
            | Self::NoSuchJob(_) => ErrorClass::Conflict,
            Self::OptimisticLock { .. } => ErrorClass::OptimisticLock,
            Self::InstanceWithoutExecutions { .. } | Self::CounterMissing(_) | Self::CorruptRecord(_) => ErrorClass::Fatal,
            Self::Store(StoreError::Unavailable(_)) => ErrorClass::Transient,
            // Una violación de índice único al reclamar una ejecución equivale a
            // perder la carrera: el llamador puede reintentar la creación.
            Self::Store(StoreError::UniqueViolation(_)) => ErrorClass::Conflict,
            Self::Store(_) => ErrorClass::Fatal,
        }
    }

    /// `true` cuando repetir la operación completa (releyendo estado) puede
    /// tener éxito.
    pub fn is_retryable(&self) -> bool {
        matches!(self.class(), ErrorClass::OptimisticLock | ErrorClass::Transient)
            || matches!(self, Self::Store(StoreError::UniqueViolation(_)))
    }

    pub(crate) fn missing(field: &'static str, context: impl Into<String>) -> Self {
        Self::MissingField { field, context: context.into() }
    }
}

impl From<CodecError> for RepositoryError {
    fn from(e: CodecError) -> Self {
        Self::Codec(e)
    }
}
