//! Modelo de dominio del historial de ejecuciones.

mod context;
mod execution;
mod params;
mod status;

pub use context::ExecutionContext;
pub use execution::{JobExecution, JobInstance, StepExecution};
pub use params::{JobParameter, JobParameters, JobParametersBuilder, ParamValue};
pub use status::{BatchStatus, ExitStatus};
