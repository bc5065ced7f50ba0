//! Constantes del esquema almacenado.
//!
//! Los nombres de índice son parte del contrato operativo: otras herramientas
//! pueden referenciarlos, por lo que no deben cambiar entre versiones.

/// Definición neutral de un índice sobre campos de documento.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: &'static str,
    pub fields: &'static [&'static str],
    pub unique: bool,
}

pub const JOB_INSTANCE_EXECUTION_UK: IndexSpec = IndexSpec { name: "job_instance_execution_uk",
                                                             fields: &["jobName", "jobKey", "executionId"],
                                                             unique: true };
pub const JOB_EXECUTION_ID_UK: IndexSpec = IndexSpec { name: "job_execution_id_uk",
                                                       fields: &["executionId"],
                                                       unique: true };
pub const JOB_INSTANCE_ID_IDX: IndexSpec = IndexSpec { name: "job_instance_id_idx",
                                                       fields: &["instanceId"],
                                                       unique: false };
pub const JOB_NAME_INSTANCE_IDX: IndexSpec = IndexSpec { name: "job_name_instance_idx",
                                                         fields: &["jobName", "instanceId"],
                                                         unique: false };

/// Índices de la colección de registros, en orden de creación.
pub const RECORD_INDEXES: [IndexSpec; 4] =
    [JOB_INSTANCE_EXECUTION_UK, JOB_EXECUTION_ID_UK, JOB_INSTANCE_ID_IDX, JOB_NAME_INSTANCE_IDX];

/// Índice único de la colección de contadores.
pub const COUNTER_NAME_UK: IndexSpec = IndexSpec { name: "counter_name_uk",
                                                   fields: &["counterName"],
                                                   unique: true };

pub const DEFAULT_INSTANCE_SEQUENCE: &str = "jobInstanceId";
pub const DEFAULT_EXECUTION_SEQUENCE: &str = "jobExecutionId";
pub const DEFAULT_STEP_SEQUENCE: &str = "stepExecutionId";
