//! Mapeo bidireccional entidad ↔ documento.
//!
//! Reglas:
//! - Parámetros: `{nombre: {TAG: valor, identifying?: false}}`; la marca
//!   `identifying` sólo se escribe cuando es `false` (ausencia = identificador).
//! - Decodificación tolerante: contadores ausentes → 0, estado ausente o no
//!   reconocido → `UNKNOWN`. La ausencia de `instanceId` es un error.
//! - Codificación estricta: campos obligatorios ausentes fallan de inmediato.

use log::warn;
use serde_json::{Map, Value};

use crate::errors::RepositoryError;
use crate::model::{BatchStatus, ExecutionContext, ExitStatus, JobExecution, JobInstance, JobParameter, JobParameters,
                   ParamValue, StepExecution};

use super::context_codec::ContextSerializer;
use super::document::{ExecutionDocument, ExecutionPatch, StepDocument};

const IDENTIFYING: &str = "identifying";

#[derive(Debug, Clone, Default)]
pub struct RecordCodec {
    context_serializer: ContextSerializer,
}

impl RecordCodec {
    /// `context_serializer` sólo se usa al decodificar contextos almacenados
    /// en forma de string plano.
    pub fn new(context_serializer: ContextSerializer) -> Self {
        Self { context_serializer }
    }

    pub fn context_serializer(&self) -> &ContextSerializer {
        &self.context_serializer
    }

    // ---------------------------------------------------------------- params

    pub fn encode_parameters(&self, params: &JobParameters) -> Map<String, Value> {
        params.iter()
              .map(|(name, p)| {
                  let mut entry = Map::new();
                  entry.insert(p.value.type_tag().to_string(), p.value.to_json());
                  if !p.identifying {
                      entry.insert(IDENTIFYING.to_string(), Value::Bool(false));
                  }
                  (name.clone(), Value::Object(entry))
              })
              .collect()
    }

    pub fn decode_parameters(&self, stored: &Map<String, Value>) -> Result<JobParameters, RepositoryError> {
        let mut params = JobParameters::new();
        for (name, raw) in stored {
            let entry = raw.as_object()
                           .ok_or_else(|| RepositoryError::CorruptRecord(format!("parameter `{name}` is not a document")))?;
            let identifying = entry.get(IDENTIFYING).and_then(Value::as_bool).unwrap_or(true);
            let value = entry.iter()
                             .filter(|(k, _)| k.as_str() != IDENTIFYING)
                             .find_map(|(tag, v)| ParamValue::from_tagged(tag, v))
                             .ok_or_else(|| RepositoryError::CorruptRecord(format!("parameter `{name}` has no valid typed value")))?;
            params.insert(name.clone(), JobParameter { value, identifying });
        }
        Ok(params)
    }

    // --------------------------------------------------------------- context

    pub fn encode_context(&self, context: &ExecutionContext) -> Value {
        context.to_value()
    }

    /// Acepta la forma anidada (objeto) y la forma serializada (string).
    pub fn decode_context(&self, stored: Option<&Value>) -> Result<ExecutionContext, RepositoryError> {
        match stored {
            None | Some(Value::Null) => Ok(ExecutionContext::new()),
            Some(Value::Object(map)) => Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
            Some(Value::String(text)) => Ok(self.context_serializer.deserialize(Some(text))?),
            Some(other) => Err(RepositoryError::CorruptRecord(format!("execution context has unexpected shape: {other}"))),
        }
    }

    // ----------------------------------------------------------------- steps

    pub fn encode_step(&self, step: &StepExecution) -> Result<StepDocument, RepositoryError> {
        let id = step.id
                     .ok_or_else(|| RepositoryError::missing("stepExecutionId", format!("step_name={}", step.step_name)))?;
        if step.step_name.trim().is_empty() {
            return Err(RepositoryError::missing("stepName", format!("step_execution_id={id}")));
        }
        if step.exit_status.exit_code.trim().is_empty() {
            return Err(RepositoryError::missing("exitCode", format!("step_execution_id={id}")));
        }
        Ok(StepDocument { step_execution_id: Some(id),
                          step_name: step.step_name.clone(),
                          status: Some(step.status.as_str().to_string()),
                          read_count: Some(step.read_count),
                          write_count: Some(step.write_count),
                          commit_count: Some(step.commit_count),
                          rollback_count: Some(step.rollback_count),
                          read_skip_count: Some(step.read_skip_count),
                          process_skip_count: Some(step.process_skip_count),
                          write_skip_count: Some(step.write_skip_count),
                          filter_count: Some(step.filter_count),
                          start_time: step.start_time,
                          end_time: step.end_time,
                          last_updated: step.last_updated,
                          exit_code: Some(step.exit_status.exit_code.clone()),
                          exit_description: Some(step.exit_status.exit_description.clone()),
                          execution_context: Some(self.encode_context(&step.execution_context)) })
    }

    pub fn decode_step(&self, doc: &StepDocument, job_execution_id: i64) -> Result<StepExecution, RepositoryError> {
        Ok(StepExecution { id: doc.step_execution_id,
                           job_execution_id: Some(job_execution_id),
                           step_name: doc.step_name.clone(),
                           status: decode_status(doc.status.as_deref()),
                           read_count: doc.read_count.unwrap_or(0),
                           write_count: doc.write_count.unwrap_or(0),
                           commit_count: doc.commit_count.unwrap_or(0),
                           rollback_count: doc.rollback_count.unwrap_or(0),
                           read_skip_count: doc.read_skip_count.unwrap_or(0),
                           process_skip_count: doc.process_skip_count.unwrap_or(0),
                           write_skip_count: doc.write_skip_count.unwrap_or(0),
                           filter_count: doc.filter_count.unwrap_or(0),
                           start_time: doc.start_time,
                           end_time: doc.end_time,
                           last_updated: doc.last_updated,
                           exit_status: decode_exit(doc.exit_code.as_deref(), doc.exit_description.as_deref()),
                           execution_context: self.decode_context(doc.execution_context.as_ref())?,
                           terminate_only: false })
    }

    // ------------------------------------------------------------ executions

    pub fn encode_execution(&self, execution: &JobExecution) -> Result<ExecutionDocument, RepositoryError> {
        let instance = &execution.job_instance;
        let context = format!("job_name={} job_key={}", instance.job_name, instance.job_key);
        let execution_id = execution.id.ok_or_else(|| RepositoryError::missing("executionId", context.clone()))?;
        if instance.job_name.trim().is_empty() {
            return Err(RepositoryError::missing("jobName", format!("execution_id={execution_id}")));
        }
        if execution.exit_status.exit_code.trim().is_empty() {
            return Err(RepositoryError::missing("exitCode", format!("execution_id={execution_id}")));
        }
        let steps = execution.step_executions
                             .iter()
                             .map(|s| self.encode_step(s))
                             .collect::<Result<Vec<_>, _>>()?;
        Ok(ExecutionDocument { instance_id: Some(instance.id),
                               job_name: instance.job_name.clone(),
                               job_key: instance.job_key.clone(),
                               execution_id: Some(execution_id),
                               version: Some(execution.version),
                               status: Some(execution.status.as_str().to_string()),
                               parameters: self.encode_parameters(&execution.parameters),
                               steps,
                               start_time: execution.start_time,
                               create_time: Some(execution.create_time),
                               end_time: execution.end_time,
                               last_updated: execution.last_updated,
                               exit_code: Some(execution.exit_status.exit_code.clone()),
                               exit_description: Some(execution.exit_status.exit_description.clone()),
                               execution_context: Some(self.encode_context(&execution.execution_context)),
                               job_configuration_name: execution.job_configuration_name.clone() })
    }

    pub fn decode_instance(&self, doc: &ExecutionDocument) -> Result<JobInstance, RepositoryError> {
        let id = doc.instance_id.ok_or_else(|| {
                                    RepositoryError::missing("instanceId",
                                                             format!("job_name={} job_key={} execution_id={:?}",
                                                                     doc.job_name, doc.job_key, doc.execution_id))
                                })?;
        Ok(JobInstance { id,
                         job_name: doc.job_name.clone(),
                         job_key: doc.job_key.clone() })
    }

    pub fn decode_execution(&self, doc: &ExecutionDocument) -> Result<JobExecution, RepositoryError> {
        let job_instance = self.decode_instance(doc)?;
        let execution_id = doc.execution_id.ok_or_else(|| {
                                               RepositoryError::missing("executionId",
                                                                        format!("instance_id={} (placeholder record)",
                                                                                job_instance.id))
                                           })?;
        let step_executions = doc.steps
                                 .iter()
                                 .map(|s| self.decode_step(s, execution_id))
                                 .collect::<Result<Vec<_>, _>>()?;
        // Registros antiguos sin createTime: se usa la mejor aproximación.
        let create_time = match doc.create_time {
            Some(t) => t,
            None => {
                let fallback = doc.start_time
                                  .or(doc.last_updated)
                                  .unwrap_or(chrono::DateTime::<chrono::Utc>::UNIX_EPOCH);
                warn!("decode_execution: missing createTime execution_id={execution_id}, using {fallback}");
                fallback
            }
        };
        Ok(JobExecution { id: Some(execution_id),
                          job_instance,
                          parameters: self.decode_parameters(&doc.parameters)?,
                          version: doc.version.unwrap_or(0),
                          status: decode_status(doc.status.as_deref()),
                          create_time,
                          start_time: doc.start_time,
                          end_time: doc.end_time,
                          last_updated: doc.last_updated,
                          exit_status: decode_exit(doc.exit_code.as_deref(), doc.exit_description.as_deref()),
                          execution_context: self.decode_context(doc.execution_context.as_ref())?,
                          step_executions,
                          job_configuration_name: doc.job_configuration_name.clone() })
    }

    /// Campos de la actualización completa (`update_job_execution`).
    pub fn patch_for(&self, execution: &JobExecution) -> Result<ExecutionPatch, RepositoryError> {
        let execution_id = execution.id
                                    .ok_or_else(|| RepositoryError::missing("executionId", format!("job_name={}", execution.job_name())))?;
        if execution.exit_status.exit_code.trim().is_empty() {
            return Err(RepositoryError::missing("exitCode", format!("execution_id={execution_id}")));
        }
        Ok(ExecutionPatch { status: execution.status.as_str().to_string(),
                            create_time: Some(execution.create_time),
                            start_time: execution.start_time,
                            end_time: execution.end_time,
                            last_updated: execution.last_updated,
                            exit_code: execution.exit_status.exit_code.clone(),
                            exit_description: execution.exit_status.exit_description.clone(),
                            job_configuration_name: execution.job_configuration_name.clone() })
    }
}

/// Estado almacenado → enum. Ausente o desconocido → `Unknown`.
pub fn decode_status(stored: Option<&str>) -> BatchStatus {
    match stored {
        None => BatchStatus::Unknown,
        Some(s) => BatchStatus::parse(s).unwrap_or_else(|| {
                                           warn!("decode_status: unrecognised status={s}, using UNKNOWN");
                                           BatchStatus::Unknown
                                       }),
    }
}

fn decode_exit(code: Option<&str>, description: Option<&str>) -> ExitStatus {
    ExitStatus { exit_code: code.unwrap_or(ExitStatus::UNKNOWN).to_string(),
                 exit_description: description.unwrap_or_default().to_string() }
}
