//! jobvault-core: historial de ejecuciones batch sobre un document store.
//!
//! Capas:
//! - `model`: instancias, ejecuciones, steps, parámetros y contexto.
//! - `record`: forma almacenada y `RecordCodec`.
//! - `store`: traits de colección (primitivas atómicas) y backend en memoria.
//! - `sequence`: ids monotónicos compartidos entre procesos.
//! - `repo`: `ExecutionStore` (escritura, reglas de reinicio, bloqueo
//!   optimista) y `HistoryReader` (consultas).
pub mod config;
pub mod constants;
pub mod errors;
pub mod hashing;
pub mod model;
pub mod record;
pub mod repo;
pub mod sequence;
pub mod store;

pub use config::SequenceNames;
pub use errors::{CodecError, ErrorClass, RepositoryError, StoreError};
pub use model::{BatchStatus, ExecutionContext, ExitStatus, JobExecution, JobInstance, JobParameter, JobParameters,
                JobParametersBuilder, ParamValue, StepExecution};
pub use record::{ContextCodec, ContextSerializer, JsonContextCodec, RecordCodec};
pub use repo::{ExecutionStore, HistoryReader};
pub use sequence::SequenceCounter;
pub use store::{CounterCollection, ExecutionCollection, InMemoryCounterCollection, InMemoryExecutionCollection};

/// Store completamente en memoria.
pub type InMemoryExecutionStore = ExecutionStore<InMemoryExecutionCollection, InMemoryCounterCollection>;

/// Atajo: store en memoria con nombres de secuencia por defecto.
pub fn in_memory_store() -> Result<InMemoryExecutionStore, RepositoryError> {
    ExecutionStore::new(std::sync::Arc::new(InMemoryExecutionCollection::new()),
                        std::sync::Arc::new(InMemoryCounterCollection::new()))
}
