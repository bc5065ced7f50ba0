//! Entidades del historial: instancia, ejecución de job y ejecución de step.
//!
//! Ciclo de vida:
//! - `JobInstance` se crea una vez y es inmutable.
//! - `JobExecution` se crea en el `ExecutionStore` con `version = 0` y muta
//!   in situ (estado, timestamps, versión, lista de steps append-only) hasta
//!   alcanzar un estado terminal.
//! - `StepExecution` pertenece a su `JobExecution`; nunca se almacena por
//!   separado.

use chrono::{DateTime, Utc};

use super::{BatchStatus, ExecutionContext, ExitStatus, JobParameters};

/// Identidad de un par (nombre de job, parámetros identificadores).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobInstance {
    pub id: i64,
    pub job_name: String,
    pub job_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobExecution {
    /// `None` hasta que el repositorio la persiste.
    pub id: Option<i64>,
    pub job_instance: JobInstance,
    pub parameters: JobParameters,
    pub version: i64,
    pub status: BatchStatus,
    pub create_time: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
    pub exit_status: ExitStatus,
    pub execution_context: ExecutionContext,
    pub step_executions: Vec<StepExecution>,
    pub job_configuration_name: Option<String>,
}

impl JobExecution {
    /// Ejecución nueva, aún sin id, para la instancia indicada.
    pub fn new(job_instance: JobInstance, parameters: JobParameters) -> Self {
        Self { id: None,
               job_instance,
               parameters,
               version: 0,
               status: BatchStatus::Unstarted,
               create_time: Utc::now(),
               start_time: None,
               end_time: None,
               last_updated: None,
               exit_status: ExitStatus::unknown(),
               execution_context: ExecutionContext::new(),
               step_executions: Vec::new(),
               job_configuration_name: None }
    }

    pub fn job_name(&self) -> &str {
        &self.job_instance.job_name
    }

    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    pub fn is_stopping(&self) -> bool {
        self.status == BatchStatus::Stopping
    }

    pub fn step(&self, step_execution_id: i64) -> Option<&StepExecution> {
        self.step_executions.iter().find(|s| s.id == Some(step_execution_id))
    }

    pub fn step_mut(&mut self, step_execution_id: i64) -> Option<&mut StepExecution> {
        self.step_executions.iter_mut().find(|s| s.id == Some(step_execution_id))
    }

    /// Crea un `StepExecution` sin id enlazado a esta ejecución. Se persiste
    /// con `ExecutionStore::add_step_execution`.
    pub fn new_step(&self, step_name: impl Into<String>) -> StepExecution {
        StepExecution::new(step_name, self.id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepExecution {
    pub id: Option<i64>,
    /// Referencia al padre; se restaura desde el documento contenedor.
    pub job_execution_id: Option<i64>,
    pub step_name: String,
    pub status: BatchStatus,
    pub read_count: u64,
    pub write_count: u64,
    pub commit_count: u64,
    pub rollback_count: u64,
    pub read_skip_count: u64,
    pub process_skip_count: u64,
    pub write_skip_count: u64,
    pub filter_count: u64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
    pub exit_status: ExitStatus,
    pub execution_context: ExecutionContext,
    /// Señal transitoria (no se almacena): el job padre pidió detenerse.
    pub terminate_only: bool,
}

impl StepExecution {
    pub fn new(step_name: impl Into<String>, job_execution_id: Option<i64>) -> Self {
        Self { id: None,
               job_execution_id,
               step_name: step_name.into(),
               status: BatchStatus::Unstarted,
               read_count: 0,
               write_count: 0,
               commit_count: 0,
               rollback_count: 0,
               read_skip_count: 0,
               process_skip_count: 0,
               write_skip_count: 0,
               filter_count: 0,
               start_time: None,
               end_time: None,
               last_updated: None,
               exit_status: ExitStatus::executing(),
               execution_context: ExecutionContext::new(),
               terminate_only: false }
    }

    /// Total de items omitidos (lectura + proceso + escritura).
    pub fn skip_count(&self) -> u64 {
        self.read_skip_count + self.process_skip_count + self.write_skip_count
    }
}
