//! Primitivas de almacenamiento.
//!
//! El repositorio sólo necesita operaciones atómicas sobre un documento:
//! incremento-y-lectura, escritura condicional (por versión o por ausencia de
//! `executionId`), append a un arreglo y reemplazo posicional de un elemento.
//! Cada método de estos traits debe ejecutarse como UNA operación atómica del
//! backend; ninguno requiere transacciones multi-documento.
//!
//! Implementaciones:
//! - `memory`: backend en memoria (tests, prototipos).
//! - `jobvault-persistence`: Postgres JSONB.

pub mod memory;
pub mod query;

use serde_json::Value;

use crate::errors::StoreError;
use crate::record::{ExecutionDocument, ExecutionPatch, InstanceRow, Revision, StepDocument};

pub use memory::{InMemoryCounterCollection, InMemoryExecutionCollection};
pub use query::{InstanceQuery, NameMatch, NamePattern, RecordFilter, RecordQuery};

/// Colección de contadores `{counterName, value}`.
pub trait CounterCollection: Send + Sync {
    /// Provisiona el índice único sobre `counterName` (idempotente).
    fn ensure_indexes(&self) -> Result<(), StoreError>;

    /// Crea el contador en 0 sólo si no existe (idempotente).
    fn init_counter(&self, name: &str) -> Result<(), StoreError>;

    /// Incrementa y devuelve el nuevo valor. `None` si el documento no existe.
    fn increment(&self, name: &str) -> Result<Option<i64>, StoreError>;
}

/// Colección única de placeholders de instancia y ejecuciones.
pub trait ExecutionCollection: Send + Sync {
    /// Provisiona `constants::RECORD_INDEXES` (idempotente).
    fn ensure_indexes(&self) -> Result<(), StoreError>;

    /// Inserta un placeholder de instancia. Viola el índice único si ya
    /// existe otro registro sin ejecución para la misma identidad.
    fn insert_placeholder(&self, doc: &ExecutionDocument) -> Result<(), StoreError>;

    /// Reclamo atómico: reemplaza el registro que coincide con
    /// (jobName, jobKey, executionId ausente) o inserta `doc` si no hay.
    fn claim(&self, doc: &ExecutionDocument) -> Result<(), StoreError>;

    fn find(&self, query: &RecordQuery) -> Result<Vec<ExecutionDocument>, StoreError>;

    /// Versión y estado almacenados de una ejecución.
    fn read_revision(&self, execution_id: i64) -> Result<Option<Revision>, StoreError>;

    /// Actualización condicionada a (executionId, version == expected).
    /// Aplica `patch` e incrementa la versión. `false` si no hubo coincidencia.
    fn update_if_version(&self, execution_id: i64, expected_version: i64, patch: &ExecutionPatch)
                         -> Result<bool, StoreError>;

    /// Reemplaza el elemento de `steps` con el mismo `stepExecutionId`,
    /// condicionado a la versión del documento padre, e incrementa esa
    /// versión compartida.
    fn update_step_if_version(&self, execution_id: i64, expected_version: i64, step: &StepDocument)
                              -> Result<bool, StoreError>;

    /// Append atómico al arreglo `steps` (sin chequeo de versión).
    fn push_steps(&self, execution_id: i64, steps: &[StepDocument]) -> Result<bool, StoreError>;

    /// Escritura incondicional del contexto de la ejecución.
    fn set_execution_context(&self, execution_id: i64, context: &Value) -> Result<bool, StoreError>;

    /// Escritura incondicional del contexto de un step embebido.
    fn set_step_execution_context(&self, execution_id: i64, step_execution_id: i64, context: &Value)
                                  -> Result<bool, StoreError>;

    /// Nombres de job distintos, ordenados.
    fn job_names(&self) -> Result<Vec<String>, StoreError>;

    /// Instancias agrupadas por `instanceId` descendente, paginadas.
    fn instances(&self, query: &InstanceQuery) -> Result<Vec<InstanceRow>, StoreError>;

    /// Cantidad de instancias distintas cuyo nombre coincide.
    fn count_instances(&self, name: &NameMatch) -> Result<u64, StoreError>;
}
