//! Ciclo de vida de instancias y ejecuciones.
//!
//! Ninguna operación usa transacciones: cada escritura es una única
//! operación atómica sobre un documento (reclamo condicional, actualización
//! condicionada por versión, append o reemplazo de contexto). La versión del
//! documento es compartida por la ejecución y todos sus steps, así que
//! cualquier actualización concurrente sobre la misma ejecución se serializa
//! a través de ella.
//!
//! La carrera entre "consultar" y "reclamar" en `create_job_execution` no se
//! reintenta aquí: el perdedor recibe una violación de índice único
//! (reintentable) y decide el llamador.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, warn};

use crate::config::SequenceNames;
use crate::errors::{RepositoryError, StoreError};
use crate::model::{BatchStatus, ExecutionContext, JobExecution, JobInstance, JobParameters, StepExecution};
use crate::record::{decode_status, ExecutionDocument, RecordCodec};
use crate::sequence::SequenceCounter;
use crate::store::{CounterCollection, ExecutionCollection, RecordFilter, RecordQuery};

use super::HistoryReader;

#[derive(Debug)]
pub struct ExecutionStore<C, K>
    where C: ExecutionCollection,
          K: CounterCollection
{
    records: Arc<C>,
    instance_ids: SequenceCounter<K>,
    execution_ids: SequenceCounter<K>,
    step_ids: SequenceCounter<K>,
    codec: RecordCodec,
}

impl<C, K> ExecutionStore<C, K>
    where C: ExecutionCollection,
          K: CounterCollection
{
    /// Store con los nombres de secuencia por defecto.
    pub fn new(records: Arc<C>, counters: Arc<K>) -> Result<Self, RepositoryError> {
        Self::with_options(records, counters, SequenceNames::default(), RecordCodec::default())
    }

    /// Provisiona los índices de ambas colecciones e inicializa las tres
    /// secuencias (ambas operaciones son idempotentes).
    pub fn with_options(records: Arc<C>,
                        counters: Arc<K>,
                        names: SequenceNames,
                        codec: RecordCodec)
                        -> Result<Self, RepositoryError> {
        records.ensure_indexes()?;
        let instance_ids = SequenceCounter::new(counters.clone(), names.instance)?;
        let execution_ids = SequenceCounter::new(counters.clone(), names.execution)?;
        let step_ids = SequenceCounter::new(counters, names.step)?;
        debug!("execution_store:init instance_seq={} execution_seq={} step_seq={}",
               instance_ids.name(),
               execution_ids.name(),
               step_ids.name());
        Ok(Self { records,
                  instance_ids,
                  execution_ids,
                  step_ids,
                  codec })
    }

    pub fn records(&self) -> &Arc<C> {
        &self.records
    }

    pub fn codec(&self) -> &RecordCodec {
        &self.codec
    }

    /// Lector de historial sobre el mismo backend.
    pub fn history(&self) -> HistoryReader<C> {
        HistoryReader::with_codec(self.records.clone(), self.codec.clone())
    }

    // ------------------------------------------------------------- creation

    /// Crea una ejecución nueva para (job_name, parámetros), creando la
    /// instancia si no existe y aplicando las reglas de reinicio si existe.
    pub fn create_job_execution(&self,
                                job_name: &str,
                                params: &JobParameters,
                                configuration_name: Option<&str>)
                                -> Result<JobExecution, RepositoryError> {
        let job_key = params.job_key();
        debug!("create_execution:start job_name={job_name} job_key={job_key}");
        let records = self.records.find(&RecordQuery::new(RecordFilter::JobKey { job_name: job_name.to_string(),
                                                                                 job_key: job_key.clone() }))?;

        if records.is_empty() {
            let instance = JobInstance { id: self.instance_ids.next_value()?,
                                         job_name: job_name.to_string(),
                                         job_key };
            let execution = self.claim_new_execution(instance, params, configuration_name, ExecutionContext::new())?;
            debug!("create_execution:new_instance job_name={job_name} instance_id={} execution_id={:?}",
                   execution.job_instance.id,
                   execution.id);
            return Ok(execution);
        }

        let executions: Vec<&ExecutionDocument> = records.iter().filter(|d| !d.is_placeholder()).collect();
        let Some(latest) = executions.first() else {
            error!("create_execution:inconsistent job_name={job_name} job_key={job_key} (instance without executions)");
            return Err(RepositoryError::InstanceWithoutExecutions { job_name: job_name.to_string(),
                                                                    job_key });
        };
        self.check_restartable(job_name, &job_key, &executions, params)?;

        let instance = self.codec.decode_instance(latest)?;
        let context = self.codec.decode_context(latest.execution_context.as_ref())?;
        let execution = self.claim_new_execution(instance, params, configuration_name, context)?;
        debug!("create_execution:restart job_name={job_name} instance_id={} execution_id={:?} previous_execution_id={:?}",
               execution.job_instance.id,
               execution.id,
               latest.execution_id);
        Ok(execution)
    }

    /// Crea sólo la instancia (placeholder sin ejecución).
    pub fn create_job_instance(&self, job_name: &str, params: &JobParameters) -> Result<JobInstance, RepositoryError> {
        let job_key = params.job_key();
        if self.is_job_instance_exists(job_name, params)? {
            return Err(RepositoryError::InstanceAlreadyExists { job_name: job_name.to_string(),
                                                                job_key });
        }
        let instance = JobInstance { id: self.instance_ids.next_value()?,
                                     job_name: job_name.to_string(),
                                     job_key };
        let placeholder = ExecutionDocument::placeholder(instance.id,
                                                         &instance.job_name,
                                                         &instance.job_key,
                                                         self.codec.encode_parameters(params));
        match self.records.insert_placeholder(&placeholder) {
            Ok(()) => {}
            Err(StoreError::UniqueViolation(detail)) => {
                warn!("create_instance:lost_race job_name={job_name} job_key={} detail={detail}", instance.job_key);
                return Err(RepositoryError::InstanceAlreadyExists { job_name: instance.job_name,
                                                                    job_key: instance.job_key });
            }
            Err(e) => return Err(e.into()),
        }
        debug!("create_instance:ok job_name={job_name} instance_id={}", instance.id);
        Ok(instance)
    }

    /// Primera ejecución de una instancia creada con `create_job_instance`:
    /// el reclamo ocupa el lugar del placeholder.
    ///
    /// Los parámetros identificadores deben producir la clave de la instancia.
    /// Si la instancia ya tiene ejecuciones se aplican las reglas de reinicio
    /// y, si ninguna rechaza, `InstanceAlreadyExists`: reiniciar es tarea de
    /// `create_job_execution`.
    pub fn create_job_execution_for_instance(&self,
                                             instance: &JobInstance,
                                             params: &JobParameters,
                                             configuration_name: Option<&str>)
                                             -> Result<JobExecution, RepositoryError> {
        let job_key = params.job_key();
        if job_key != instance.job_key {
            return Err(RepositoryError::JobKeyMismatch { job_name: instance.job_name.clone(),
                                                         expected: instance.job_key.clone(),
                                                         actual: job_key });
        }
        let records = self.records.find(&RecordQuery::new(RecordFilter::JobKey { job_name: instance.job_name.clone(),
                                                                                 job_key: job_key.clone() }))?;
        let executions: Vec<&ExecutionDocument> = records.iter().filter(|d| !d.is_placeholder()).collect();
        if !executions.is_empty() {
            self.check_restartable(&instance.job_name, &job_key, &executions, params)?;
            return Err(RepositoryError::InstanceAlreadyExists { job_name: instance.job_name.clone(),
                                                                job_key });
        }
        let Some(placeholder) = records.first() else {
            return Err(RepositoryError::NoSuchJob(instance.job_name.clone()));
        };
        let stored = self.codec.decode_instance(placeholder)?;
        if stored.id != instance.id {
            warn!("create_execution_for_instance:instance_mismatch job_name={} held_id={} stored_id={}",
                  instance.job_name,
                  instance.id,
                  stored.id);
            return Err(RepositoryError::InstanceAlreadyExists { job_name: instance.job_name.clone(),
                                                                job_key });
        }
        let execution = self.claim_new_execution(stored, params, configuration_name, ExecutionContext::new())?;
        debug!("create_execution_for_instance:ok job_name={} instance_id={} execution_id={:?}",
               instance.job_name,
               instance.id,
               execution.id);
        Ok(execution)
    }

    /// Reglas de reinicio sobre las ejecuciones existentes de una identidad:
    /// en curso, estado desconocido o completa con parámetros identificadores.
    fn check_restartable(&self,
                         job_name: &str,
                         job_key: &str,
                         executions: &[&ExecutionDocument],
                         params: &JobParameters)
                         -> Result<(), RepositoryError> {
        for doc in executions {
            let Some(execution_id) = doc.execution_id else {
                continue;
            };
            let status = decode_status(doc.status.as_deref());
            if status.is_running() {
                return Err(RepositoryError::AlreadyRunning { job_name: job_name.to_string(),
                                                             job_key: job_key.to_string(),
                                                             execution_id });
            }
            if status == BatchStatus::Unknown {
                return Err(RepositoryError::RestartUnknown { job_name: job_name.to_string(),
                                                             execution_id });
            }
            if status.is_complete() && params.has_identifying() {
                let instance_id = self.codec.decode_instance(doc)?.id;
                return Err(RepositoryError::AlreadyComplete { job_name: job_name.to_string(),
                                                              job_key: job_key.to_string(),
                                                              instance_id });
            }
        }
        Ok(())
    }

    pub fn is_job_instance_exists(&self, job_name: &str, params: &JobParameters) -> Result<bool, RepositoryError> {
        let query = RecordQuery::new(RecordFilter::JobKey { job_name: job_name.to_string(),
                                                            job_key: params.job_key() }).limit(1);
        Ok(!self.records.find(&query)?.is_empty())
    }

    fn claim_new_execution(&self,
                           instance: JobInstance,
                           params: &JobParameters,
                           configuration_name: Option<&str>,
                           context: ExecutionContext)
                           -> Result<JobExecution, RepositoryError> {
        let mut execution = JobExecution::new(instance, params.clone());
        execution.id = Some(self.execution_ids.next_value()?);
        execution.last_updated = Some(execution.create_time);
        execution.execution_context = context;
        execution.job_configuration_name = configuration_name.map(str::to_string);
        let doc = self.codec.encode_execution(&execution)?;
        if let Err(e) = self.records.claim(&doc) {
            warn!("create_execution:claim_failed job_name={} job_key={} execution_id={:?} err={e}",
                  doc.job_name,
                  doc.job_key,
                  doc.execution_id);
            return Err(e.into());
        }
        Ok(execution)
    }

    // -------------------------------------------------------------- updates

    /// Actualización completa de la ejecución, condicionada a la versión.
    ///
    /// Si la versión almacenada difiere de la que se tiene en memoria, primero
    /// se adoptan el estado y la versión almacenados. Tras el éxito la versión
    /// en memoria queda incrementada.
    pub fn update_job_execution(&self, execution: &mut JobExecution) -> Result<(), RepositoryError> {
        let execution_id = require_id(execution)?;
        debug!("update_execution:start execution_id={execution_id} version={} status={}",
               execution.version,
               execution.status);
        self.synchronize(execution, execution_id)?;
        execution.last_updated = Some(Utc::now());
        let patch = self.codec.patch_for(execution)?;
        if !self.records.update_if_version(execution_id, execution.version, &patch)? {
            warn!("update_execution:lost execution_id={execution_id} version={}", execution.version);
            return Err(RepositoryError::OptimisticLock { execution_id,
                                                         version: execution.version });
        }
        execution.version += 1;
        debug!("update_execution:ok execution_id={execution_id} version={}", execution.version);
        Ok(())
    }

    /// Reemplaza un step persistido dentro del arreglo de su ejecución. Usa
    /// la misma versión que `update_job_execution`.
    pub fn update_step_execution(&self, execution: &mut JobExecution, step_execution_id: i64)
                                 -> Result<(), RepositoryError> {
        let execution_id = require_id(execution)?;
        if execution.step(step_execution_id).is_none() {
            return Err(RepositoryError::UnknownStep { execution_id,
                                                      step_execution_id });
        }
        debug!("update_step:start execution_id={execution_id} step_execution_id={step_execution_id} version={}",
               execution.version);
        self.synchronize(execution, execution_id)?;
        let stopping = execution.is_stopping();
        let doc = {
            let Some(step) = execution.step_mut(step_execution_id) else {
                return Err(RepositoryError::UnknownStep { execution_id,
                                                          step_execution_id });
            };
            step.last_updated = Some(Utc::now());
            if stopping {
                step.terminate_only = true;
            }
            self.codec.encode_step(step)?
        };
        if !self.records.update_step_if_version(execution_id, execution.version, &doc)? {
            // Distinguir "step nunca agregado" de una versión perdida.
            let stored = self.records.find(&RecordQuery::new(RecordFilter::ExecutionId(execution_id)).limit(1))?;
            if let Some(parent) = stored.first() {
                if parent.step(step_execution_id).is_none() {
                    return Err(RepositoryError::UnknownStep { execution_id,
                                                              step_execution_id });
                }
            } else {
                return Err(RepositoryError::NoSuchExecution(execution_id));
            }
            warn!("update_step:lost execution_id={execution_id} step_execution_id={step_execution_id} version={}",
                  execution.version);
            return Err(RepositoryError::OptimisticLock { execution_id,
                                                         version: execution.version });
        }
        execution.version += 1;
        debug!("update_step:ok execution_id={execution_id} step_execution_id={step_execution_id} version={}",
               execution.version);
        Ok(())
    }

    /// Adopta versión y estado almacenados si la versión difiere.
    fn synchronize(&self, execution: &mut JobExecution, execution_id: i64) -> Result<(), RepositoryError> {
        let Some(stored) = self.records.read_revision(execution_id)? else {
            return Err(RepositoryError::NoSuchExecution(execution_id));
        };
        if stored.version != execution.version {
            let status = decode_status(stored.status.as_deref());
            warn!("sync:catch_up execution_id={execution_id} held_version={} stored_version={} held_status={} stored_status={status}",
                  execution.version,
                  stored.version,
                  execution.status);
            execution.version = stored.version;
            execution.status = status;
        }
        Ok(())
    }

    // ---------------------------------------------------------------- steps

    /// Persiste un step nuevo: asigna id, sella `last_updated` y lo agrega al
    /// arreglo del padre. No está condicionado por versión.
    pub fn add_step_execution(&self, execution: &mut JobExecution, step: StepExecution)
                              -> Result<i64, RepositoryError> {
        let ids = self.add_step_executions(execution, vec![step])?;
        ids.first().copied().ok_or_else(|| RepositoryError::missing("stepExecutionId", "no step id allocated"))
    }

    /// Variante por lotes: un solo append atómico para todos los steps.
    pub fn add_step_executions(&self, execution: &mut JobExecution, steps: Vec<StepExecution>)
                               -> Result<Vec<i64>, RepositoryError> {
        let execution_id = require_id(execution)?;
        if steps.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(step_execution_id) = steps.iter().find_map(|s| s.id) {
            return Err(RepositoryError::StepAlreadySaved { step_execution_id });
        }
        let now = Utc::now();
        let mut prepared = Vec::with_capacity(steps.len());
        for mut step in steps {
            step.id = Some(self.step_ids.next_value()?);
            step.job_execution_id = Some(execution_id);
            step.last_updated = Some(now);
            prepared.push(step);
        }
        let docs = prepared.iter().map(|s| self.codec.encode_step(s)).collect::<Result<Vec<_>, _>>()?;
        if !self.records.push_steps(execution_id, &docs)? {
            return Err(RepositoryError::NoSuchExecution(execution_id));
        }
        let ids: Vec<i64> = prepared.iter().filter_map(|s| s.id).collect();
        debug!("add_steps:ok execution_id={execution_id} step_execution_ids={ids:?}");
        execution.step_executions.extend(prepared);
        Ok(ids)
    }

    // -------------------------------------------------------------- context

    /// Escritura incondicional; gana la última.
    pub fn update_execution_context(&self, execution: &JobExecution) -> Result<(), RepositoryError> {
        let execution_id = require_id(execution)?;
        let context = self.codec.encode_context(&execution.execution_context);
        if !self.records.set_execution_context(execution_id, &context)? {
            return Err(RepositoryError::NoSuchExecution(execution_id));
        }
        debug!("update_context:ok execution_id={execution_id} entries={}", execution.execution_context.len());
        Ok(())
    }

    pub fn update_step_execution_context(&self, execution: &JobExecution, step_execution_id: i64)
                                         -> Result<(), RepositoryError> {
        let execution_id = require_id(execution)?;
        let step = execution.step(step_execution_id)
                            .ok_or(RepositoryError::UnknownStep { execution_id,
                                                                  step_execution_id })?;
        let context = self.codec.encode_context(&step.execution_context);
        if !self.records.set_step_execution_context(execution_id, step_execution_id, &context)? {
            return Err(RepositoryError::UnknownStep { execution_id,
                                                      step_execution_id });
        }
        debug!("update_step_context:ok execution_id={execution_id} step_execution_id={step_execution_id}");
        Ok(())
    }
}

fn require_id(execution: &JobExecution) -> Result<i64, RepositoryError> {
    execution.id
             .ok_or_else(|| RepositoryError::missing("executionId", format!("job_name={}", execution.job_name())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExitStatus;
    use crate::store::{InMemoryCounterCollection, InMemoryExecutionCollection};
    use serde_json::json;

    type MemStore = ExecutionStore<InMemoryExecutionCollection, InMemoryCounterCollection>;

    fn store() -> MemStore {
        ExecutionStore::new(Arc::new(InMemoryExecutionCollection::new()), Arc::new(InMemoryCounterCollection::new()))
            .unwrap()
    }

    fn params(run: i64) -> JobParameters {
        JobParameters::builder().add_long("run", run).build()
    }

    #[test]
    fn first_execution_creates_instance() {
        let s = store();
        let exec = s.create_job_execution("job", &params(1), Some("job.xml")).unwrap();
        assert_eq!(exec.job_instance.id, 1);
        assert_eq!(exec.id, Some(1));
        assert_eq!(exec.version, 0);
        assert_eq!(exec.status, BatchStatus::Unstarted);
        assert_eq!(exec.job_configuration_name.as_deref(), Some("job.xml"));
        assert!(s.is_job_instance_exists("job", &params(1)).unwrap());
        assert!(!s.is_job_instance_exists("job", &params(2)).unwrap());
    }

    #[test]
    fn indexes_are_provisioned_on_construction() {
        let s = store();
        assert_eq!(s.records().index_names().unwrap(),
                   vec!["job_execution_id_uk", "job_instance_execution_uk", "job_instance_id_idx", "job_name_instance_idx"]);
    }

    #[test]
    fn update_bumps_version() {
        let s = store();
        let mut exec = s.create_job_execution("job", &params(1), None).unwrap();
        exec.status = BatchStatus::Running;
        exec.start_time = Some(Utc::now());
        s.update_job_execution(&mut exec).unwrap();
        assert_eq!(exec.version, 1);
        let stored = s.history().get_job_execution(exec.id.unwrap()).unwrap().unwrap();
        assert_eq!(stored.status, BatchStatus::Running);
        assert_eq!(stored.version, 1);
    }

    #[test]
    fn unsaved_execution_is_rejected() {
        let s = store();
        let mut exec = JobExecution::new(JobInstance { id: 1,
                                                       job_name: "job".into(),
                                                       job_key: "k".into() },
                                         params(1));
        let err = s.update_job_execution(&mut exec).unwrap_err();
        assert!(matches!(err, RepositoryError::MissingField { field: "executionId", .. }));

        exec.id = Some(99);
        assert!(matches!(s.update_job_execution(&mut exec), Err(RepositoryError::NoSuchExecution(99))));
    }

    #[test]
    fn steps_are_appended_with_ids() {
        let s = store();
        let mut exec = s.create_job_execution("job", &params(1), None).unwrap();
        let a = exec.new_step("a");
        let b = exec.new_step("b");
        let ids = s.add_step_executions(&mut exec, vec![a, b]).unwrap();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(exec.step_executions.len(), 2);
        assert!(exec.step_executions.iter().all(|st| st.last_updated.is_some()));
        // El append no consume versión.
        assert_eq!(exec.version, 0);

        let again = exec.step_executions[0].clone();
        let err = s.add_step_execution(&mut exec, again).unwrap_err();
        assert!(matches!(err, RepositoryError::StepAlreadySaved { step_execution_id: 1 }));
    }

    #[test]
    fn step_update_shares_version() {
        let s = store();
        let mut exec = s.create_job_execution("job", &params(1), None).unwrap();
        let step = exec.new_step("load");
        let id = s.add_step_execution(&mut exec, step).unwrap();
        exec.step_mut(id).unwrap().read_count = 42;
        exec.step_mut(id).unwrap().exit_status = ExitStatus::completed();
        s.update_step_execution(&mut exec, id).unwrap();
        assert_eq!(exec.version, 1);

        exec.status = BatchStatus::Completed;
        s.update_job_execution(&mut exec).unwrap();
        assert_eq!(exec.version, 2);

        let step = s.history().get_step_execution(exec.id.unwrap(), id).unwrap().unwrap();
        assert_eq!(step.read_count, 42);
        assert_eq!(step.exit_status.exit_code, ExitStatus::COMPLETED);
    }

    #[test]
    fn stopping_parent_marks_step_terminate_only() {
        let s = store();
        let mut exec = s.create_job_execution("job", &params(1), None).unwrap();
        let step = exec.new_step("load");
        let id = s.add_step_execution(&mut exec, step).unwrap();
        exec.status = BatchStatus::Stopping;
        s.update_job_execution(&mut exec).unwrap();
        s.update_step_execution(&mut exec, id).unwrap();
        assert!(exec.step(id).unwrap().terminate_only);
    }

    #[test]
    fn unknown_step_is_rejected() {
        let s = store();
        let mut exec = s.create_job_execution("job", &params(1), None).unwrap();
        assert!(matches!(s.update_step_execution(&mut exec, 7),
                         Err(RepositoryError::UnknownStep { step_execution_id: 7, .. })));

        // Presente en memoria pero nunca persistido.
        let mut ghost = exec.new_step("ghost");
        ghost.id = Some(50);
        exec.step_executions.push(ghost);
        assert!(matches!(s.update_step_execution(&mut exec, 50),
                         Err(RepositoryError::UnknownStep { step_execution_id: 50, .. })));
        assert!(matches!(s.update_step_execution_context(&exec, 50), Err(RepositoryError::UnknownStep { .. })));
    }

    #[test]
    fn contexts_are_written_without_version() {
        let s = store();
        let mut exec = s.create_job_execution("job", &params(1), None).unwrap();
        let step = exec.new_step("load");
        let id = s.add_step_execution(&mut exec, step).unwrap();
        exec.execution_context.put("cursor", json!(10));
        exec.step_mut(id).unwrap().execution_context.put("line", json!(3));
        s.update_execution_context(&exec).unwrap();
        s.update_step_execution_context(&exec, id).unwrap();
        assert_eq!(exec.version, 0);

        let stored = s.history().get_job_execution(exec.id.unwrap()).unwrap().unwrap();
        assert_eq!(stored.execution_context.get_long("cursor"), Some(10));
        assert_eq!(stored.step(id).unwrap().execution_context.get_long("line"), Some(3));
    }

    #[test]
    fn placeholder_instance_then_first_execution() {
        let s = store();
        let instance = s.create_job_instance("job", &params(1)).unwrap();
        assert!(matches!(s.create_job_instance("job", &params(1)),
                         Err(RepositoryError::InstanceAlreadyExists { .. })));
        // Sólo hay placeholder: la creación genérica no puede decidir.
        assert!(matches!(s.create_job_execution("job", &params(1), None),
                         Err(RepositoryError::InstanceWithoutExecutions { .. })));

        let exec = s.create_job_execution_for_instance(&instance, &params(1), None).unwrap();
        assert_eq!(exec.job_instance, instance);
        let docs = s.records().snapshot().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].execution_id, exec.id);
    }

    #[test]
    fn first_execution_for_instance_rejects_foreign_params() {
        let s = store();
        let instance = s.create_job_instance("job", &params(1)).unwrap();
        match s.create_job_execution_for_instance(&instance, &params(99), None) {
            Err(RepositoryError::JobKeyMismatch { expected, actual, .. }) => {
                assert_eq!(expected, instance.job_key);
                assert_eq!(actual, params(99).job_key());
            }
            other => panic!("esperaba JobKeyMismatch, obtuve {other:?}"),
        }
        assert!(s.records().snapshot().unwrap()[0].is_placeholder());
    }

    #[test]
    fn first_execution_for_instance_only_once() {
        let s = store();
        let instance = s.create_job_instance("job", &params(1)).unwrap();
        let mut exec = s.create_job_execution_for_instance(&instance, &params(1), None).unwrap();
        exec.status = BatchStatus::Running;
        s.update_job_execution(&mut exec).unwrap();
        assert!(matches!(s.create_job_execution_for_instance(&instance, &params(1), None),
                         Err(RepositoryError::AlreadyRunning { .. })));

        exec.status = BatchStatus::Failed;
        s.update_job_execution(&mut exec).unwrap();
        assert!(matches!(s.create_job_execution_for_instance(&instance, &params(1), None),
                         Err(RepositoryError::InstanceAlreadyExists { .. })));
        assert_eq!(s.history().get_job_executions(&instance).unwrap().len(), 1);
    }

    #[test]
    fn first_execution_for_unknown_instance_is_rejected() {
        let s = store();
        let instance = JobInstance { id: 42,
                                     job_name: "job".into(),
                                     job_key: params(1).job_key() };
        assert!(matches!(s.create_job_execution_for_instance(&instance, &params(1), None),
                         Err(RepositoryError::NoSuchJob(_))));
        assert!(s.records().snapshot().unwrap().is_empty());
    }

    #[test]
    fn already_complete_reports_stored_instance_id() {
        let s = store();
        let _ = s.create_job_execution("other", &params(7), None).unwrap();
        let mut exec = s.create_job_execution("job", &params(1), None).unwrap();
        exec.status = BatchStatus::Completed;
        exec.exit_status = ExitStatus::completed();
        s.update_job_execution(&mut exec).unwrap();
        match s.create_job_execution("job", &params(1), None) {
            Err(RepositoryError::AlreadyComplete { instance_id, .. }) => assert_eq!(instance_id, 2),
            other => panic!("esperaba AlreadyComplete, obtuve {other:?}"),
        }
    }

    #[test]
    fn record_without_instance_id_is_not_reported_as_instance_zero() {
        let s = store();
        let mut exec = s.create_job_execution("job", &params(1), None).unwrap();
        exec.status = BatchStatus::Completed;
        s.update_job_execution(&mut exec).unwrap();
        let mut doc = s.records().snapshot().unwrap().remove(0);
        doc.instance_id = None;
        assert!(s.records().overwrite(doc).unwrap());
        assert!(matches!(s.create_job_execution("job", &params(1), None),
                         Err(RepositoryError::MissingField { field: "instanceId", .. })));
    }
}
