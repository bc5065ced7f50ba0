//! Consultas de sólo lectura sobre el historial.

use std::sync::Arc;

use log::debug;

use crate::errors::RepositoryError;
use crate::model::{JobExecution, JobInstance, JobParameters, StepExecution};
use crate::record::{ExecutionDocument, RecordCodec};
use crate::store::{ExecutionCollection, InstanceQuery, NameMatch, RecordFilter, RecordQuery};

#[derive(Debug)]
pub struct HistoryReader<C>
    where C: ExecutionCollection
{
    records: Arc<C>,
    codec: RecordCodec,
}

impl<C> Clone for HistoryReader<C> where C: ExecutionCollection
{
    fn clone(&self) -> Self {
        Self { records: self.records.clone(),
               codec: self.codec.clone() }
    }
}

impl<C> HistoryReader<C> where C: ExecutionCollection
{
    pub fn new(records: Arc<C>) -> Self {
        Self::with_codec(records, RecordCodec::default())
    }

    pub fn with_codec(records: Arc<C>, codec: RecordCodec) -> Self {
        Self { records, codec }
    }

    pub fn get_job_instance(&self, instance_id: i64) -> Result<Option<JobInstance>, RepositoryError> {
        let found = self.find_first(RecordFilter::InstanceId(instance_id))?;
        found.as_ref().map(|doc| self.codec.decode_instance(doc)).transpose()
    }

    pub fn get_job_execution(&self, execution_id: i64) -> Result<Option<JobExecution>, RepositoryError> {
        let found = self.find_first(RecordFilter::ExecutionId(execution_id))?;
        found.as_ref().map(|doc| self.codec.decode_execution(doc)).transpose()
    }

    /// Nombres distintos, ordenados.
    pub fn get_job_names(&self) -> Result<Vec<String>, RepositoryError> {
        Ok(self.records.job_names()?)
    }

    /// `NoSuchJob` si no hay ninguna instancia con ese nombre.
    pub fn get_job_instance_count(&self, job_name: &str) -> Result<u64, RepositoryError> {
        let count = self.records.count_instances(&NameMatch::Exact(job_name.to_string()))?;
        if count == 0 {
            return Err(RepositoryError::NoSuchJob(job_name.to_string()));
        }
        Ok(count)
    }

    /// Página de instancias ordenadas por id descendente.
    pub fn get_job_instances(&self, job_name: &str, start: usize, count: usize)
                             -> Result<Vec<JobInstance>, RepositoryError> {
        self.instances(NameMatch::Exact(job_name.to_string()), start, count)
    }

    /// Como `get_job_instances` pero con patrón: `*` y `%` son comodines y
    /// la coincidencia es por subcadena. Sin comodines se exige nombre exacto.
    pub fn find_job_instances_by_name(&self, pattern: &str, start: usize, count: usize)
                                      -> Result<Vec<JobInstance>, RepositoryError> {
        self.instances(NameMatch::from_glob(pattern), start, count)
    }

    pub fn get_last_job_instance(&self, job_name: &str) -> Result<Option<JobInstance>, RepositoryError> {
        Ok(self.get_job_instances(job_name, 0, 1)?.into_iter().next())
    }

    /// Ejecución más reciente de la instancia (mayor `executionId`).
    pub fn get_last_job_execution(&self, instance: &JobInstance) -> Result<Option<JobExecution>, RepositoryError> {
        let found = self.find_first(RecordFilter::InstanceId(instance.id))?;
        self.decode_if_execution(found)
    }

    /// Ejecuciones de la instancia, más reciente primero.
    pub fn get_job_executions(&self, instance: &JobInstance) -> Result<Vec<JobExecution>, RepositoryError> {
        let docs = self.records.find(&RecordQuery::new(RecordFilter::InstanceId(instance.id)))?;
        docs.iter()
            .filter(|d| !d.is_placeholder())
            .map(|d| self.codec.decode_execution(d))
            .collect()
    }

    /// Ejecuciones iniciadas y no terminadas.
    pub fn find_running_job_executions(&self, job_name: &str) -> Result<Vec<JobExecution>, RepositoryError> {
        let docs = self.records.find(&RecordQuery::new(RecordFilter::Running { job_name: job_name.to_string() }))?;
        debug!("find_running:ok job_name={job_name} count={}", docs.len());
        docs.iter().map(|d| self.codec.decode_execution(d)).collect()
    }

    /// Hidrata la ejecución completa y busca el step en su arreglo.
    pub fn get_step_execution(&self, execution_id: i64, step_execution_id: i64)
                              -> Result<Option<StepExecution>, RepositoryError> {
        let Some(execution) = self.get_job_execution(execution_id)? else {
            return Ok(None);
        };
        Ok(execution.step_executions.into_iter().find(|s| s.id == Some(step_execution_id)))
    }

    pub fn get_job_instance_by_params(&self, job_name: &str, params: &JobParameters)
                                      -> Result<Option<JobInstance>, RepositoryError> {
        let found = self.find_first(job_key_filter(job_name, params))?;
        found.as_ref().map(|doc| self.codec.decode_instance(doc)).transpose()
    }

    pub fn get_last_job_execution_for(&self, job_name: &str, params: &JobParameters)
                                      -> Result<Option<JobExecution>, RepositoryError> {
        let found = self.find_first(job_key_filter(job_name, params))?;
        self.decode_if_execution(found)
    }

    /// Último step con ese nombre en cualquier ejecución de la instancia:
    /// mayor `start_time`, desempate por id.
    pub fn get_last_step_execution(&self, instance: &JobInstance, step_name: &str)
                                   -> Result<Option<StepExecution>, RepositoryError> {
        let executions = self.get_job_executions(instance)?;
        Ok(executions.into_iter()
                     .flat_map(|e| e.step_executions)
                     .filter(|s| s.step_name == step_name)
                     .max_by_key(|s| (s.start_time, s.id)))
    }

    pub fn get_step_execution_count(&self, instance: &JobInstance, step_name: &str) -> Result<u64, RepositoryError> {
        let docs = self.records.find(&RecordQuery::new(RecordFilter::InstanceId(instance.id)))?;
        Ok(docs.iter()
               .flat_map(|d| d.steps.iter())
               .filter(|s| s.step_name == step_name)
               .count() as u64)
    }

    fn instances(&self, name: NameMatch, start: usize, count: usize) -> Result<Vec<JobInstance>, RepositoryError> {
        let rows = self.records.instances(&InstanceQuery { name,
                                                           start,
                                                           count: Some(count) })?;
        Ok(rows.into_iter()
               .map(|r| JobInstance { id: r.instance_id,
                                      job_name: r.job_name,
                                      job_key: r.job_key })
               .collect())
    }

    fn find_first(&self, filter: RecordFilter) -> Result<Option<ExecutionDocument>, RepositoryError> {
        Ok(self.records.find(&RecordQuery::new(filter).limit(1))?.into_iter().next())
    }

    /// Los placeholders ordenan al final, así que un primer resultado sin
    /// `executionId` significa que no hay ejecuciones.
    fn decode_if_execution(&self, found: Option<ExecutionDocument>) -> Result<Option<JobExecution>, RepositoryError> {
        match found {
            Some(doc) if !doc.is_placeholder() => self.codec.decode_execution(&doc).map(Some),
            _ => Ok(None),
        }
    }
}

fn job_key_filter(job_name: &str, params: &JobParameters) -> RecordFilter {
    RecordFilter::JobKey { job_name: job_name.to_string(),
                           job_key: params.job_key() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryExecutionCollection;
    use serde_json::Map;

    #[test]
    fn empty_backend_reads() {
        let reader = HistoryReader::new(Arc::new(InMemoryExecutionCollection::new()));
        assert!(reader.get_job_names().unwrap().is_empty());
        assert!(reader.get_job_instance(1).unwrap().is_none());
        assert!(reader.get_job_execution(1).unwrap().is_none());
        assert!(reader.get_step_execution(1, 1).unwrap().is_none());
        assert!(matches!(reader.get_job_instance_count("nope"), Err(RepositoryError::NoSuchJob(_))));
    }

    #[test]
    fn placeholder_instance_has_no_last_execution() {
        let coll = Arc::new(InMemoryExecutionCollection::new());
        coll.insert_placeholder(&ExecutionDocument::placeholder(4, "job", "k", Map::new())).unwrap();
        let reader = HistoryReader::new(coll);
        let instance = reader.get_job_instance(4).unwrap().unwrap();
        assert_eq!(instance.job_key, "k");
        assert!(reader.get_last_job_execution(&instance).unwrap().is_none());
        assert!(reader.get_job_executions(&instance).unwrap().is_empty());
        assert_eq!(reader.get_job_instance_count("job").unwrap(), 1);
    }
}
