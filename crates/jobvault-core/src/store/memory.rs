//! Backend en memoria.
//!
//! Emula las garantías de un document store: cada método toma el lock una
//! sola vez, de modo que cada operación es atómica respecto a las demás. Los
//! índices únicos se aplican una vez provisionados (`ensure_indexes`), igual
//! que en un backend real.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use dashmap::DashMap;
use serde_json::Value;

use crate::constants::{RECORD_INDEXES, JOB_EXECUTION_ID_UK, JOB_INSTANCE_EXECUTION_UK};
use crate::errors::StoreError;
use crate::record::{CounterDocument, ExecutionDocument, ExecutionPatch, InstanceRow, Revision, StepDocument};

use super::{CounterCollection, ExecutionCollection, InstanceQuery, NameMatch, RecordFilter, RecordQuery};

#[derive(Debug, Default)]
pub struct InMemoryCounterCollection {
    counters: DashMap<String, CounterDocument>,
}

impl InMemoryCounterCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Valor actual sin incrementar.
    pub fn current(&self, name: &str) -> Option<i64> {
        self.counters.get(name).map(|c| c.value)
    }

    /// Elimina un contador por fuera del protocolo (simula borrado manual).
    pub fn remove_counter(&self, name: &str) -> Option<CounterDocument> {
        self.counters.remove(name).map(|(_, doc)| doc)
    }
}

impl CounterCollection for InMemoryCounterCollection {
    fn ensure_indexes(&self) -> Result<(), StoreError> {
        // La clave del mapa ya es única por nombre.
        Ok(())
    }

    fn init_counter(&self, name: &str) -> Result<(), StoreError> {
        self.counters
            .entry(name.to_string())
            .or_insert_with(|| CounterDocument { counter_name: name.to_string(),
                                                 value: 0 });
        Ok(())
    }

    fn increment(&self, name: &str) -> Result<Option<i64>, StoreError> {
        // `get_mut` retiene el lock del shard durante el read-modify-write.
        Ok(self.counters.get_mut(name).map(|mut c| {
                                          c.value += 1;
                                          c.value
                                      }))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryExecutionCollection {
    docs: RwLock<Vec<ExecutionDocument>>,
    indexes: RwLock<BTreeSet<&'static str>>,
}

impl InMemoryExecutionCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nombres de índices provisionados.
    pub fn index_names(&self) -> Result<Vec<&'static str>, StoreError> {
        Ok(self.indexes.read().map_err(poisoned)?.iter().copied().collect())
    }

    /// Copia de todos los documentos (orden de inserción).
    pub fn snapshot(&self) -> Result<Vec<ExecutionDocument>, StoreError> {
        Ok(self.read()?.clone())
    }

    /// Reemplaza un documento por fuera del protocolo (simula escritura de
    /// otro proceso que no respeta las reglas).
    pub fn overwrite(&self, doc: ExecutionDocument) -> Result<bool, StoreError> {
        let mut docs = self.write()?;
        match docs.iter_mut().find(|d| d.execution_id.is_some() && d.execution_id == doc.execution_id) {
            Some(slot) => {
                *slot = doc;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<ExecutionDocument>>, StoreError> {
        self.docs.read().map_err(poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<ExecutionDocument>>, StoreError> {
        self.docs.write().map_err(poisoned)
    }

    /// Verifica índices únicos para `candidate`, ignorando la posición `skip`
    /// (el documento que se reemplaza).
    fn check_unique(&self, docs: &[ExecutionDocument], candidate: &ExecutionDocument, skip: Option<usize>)
                    -> Result<(), StoreError> {
        let indexes = self.indexes.read().map_err(poisoned)?;
        let others = docs.iter().enumerate().filter(|(i, _)| Some(*i) != skip).map(|(_, d)| d);
        for other in others {
            if indexes.contains(JOB_INSTANCE_EXECUTION_UK.name)
               && other.job_name == candidate.job_name
               && other.job_key == candidate.job_key
               && other.execution_id == candidate.execution_id
            {
                return Err(StoreError::UniqueViolation(format!("{}: job_name={} job_key={} execution_id={:?}",
                                                               JOB_INSTANCE_EXECUTION_UK.name,
                                                               candidate.job_name,
                                                               candidate.job_key,
                                                               candidate.execution_id)));
            }
            if indexes.contains(JOB_EXECUTION_ID_UK.name)
               && candidate.execution_id.is_some()
               && other.execution_id == candidate.execution_id
            {
                return Err(StoreError::UniqueViolation(format!("{}: execution_id={:?}",
                                                               JOB_EXECUTION_ID_UK.name, candidate.execution_id)));
            }
        }
        Ok(())
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("in-memory collection lock poisoned".into())
}

fn matches_filter(doc: &ExecutionDocument, filter: &RecordFilter) -> bool {
    match filter {
        RecordFilter::JobKey { job_name, job_key } => &doc.job_name == job_name && &doc.job_key == job_key,
        RecordFilter::ExecutionId(id) => doc.execution_id == Some(*id),
        RecordFilter::InstanceId(id) => doc.instance_id == Some(*id),
        RecordFilter::Running { job_name } => {
            &doc.job_name == job_name && doc.execution_id.is_some() && doc.start_time.is_some() && doc.end_time.is_none()
        }
    }
}

fn find_execution_mut(docs: &mut [ExecutionDocument], execution_id: i64) -> Option<&mut ExecutionDocument> {
    docs.iter_mut().find(|d| d.execution_id == Some(execution_id))
}

impl ExecutionCollection for InMemoryExecutionCollection {
    fn ensure_indexes(&self) -> Result<(), StoreError> {
        let mut indexes = self.indexes.write().map_err(poisoned)?;
        indexes.extend(RECORD_INDEXES.iter().map(|i| i.name));
        Ok(())
    }

    fn insert_placeholder(&self, doc: &ExecutionDocument) -> Result<(), StoreError> {
        let mut docs = self.write()?;
        self.check_unique(&docs, doc, None)?;
        docs.push(doc.clone());
        Ok(())
    }

    fn claim(&self, doc: &ExecutionDocument) -> Result<(), StoreError> {
        let mut docs = self.write()?;
        let slot = docs.iter()
                       .position(|d| d.job_name == doc.job_name && d.job_key == doc.job_key && d.execution_id.is_none());
        self.check_unique(&docs, doc, slot)?;
        match slot {
            Some(pos) => docs[pos] = doc.clone(),
            None => docs.push(doc.clone()),
        }
        Ok(())
    }

    fn find(&self, query: &RecordQuery) -> Result<Vec<ExecutionDocument>, StoreError> {
        let docs = self.read()?;
        let mut found: Vec<ExecutionDocument> = docs.iter().filter(|d| matches_filter(d, &query.filter)).cloned().collect();
        // Option: None < Some, así que el orden inverso deja placeholders al final.
        found.sort_by(|a, b| b.execution_id.cmp(&a.execution_id));
        if let Some(limit) = query.limit {
            found.truncate(limit);
        }
        Ok(found)
    }

    fn read_revision(&self, execution_id: i64) -> Result<Option<Revision>, StoreError> {
        let docs = self.read()?;
        Ok(docs.iter()
               .find(|d| d.execution_id == Some(execution_id))
               .map(|d| Revision { version: d.version.unwrap_or(0),
                                   status: d.status.clone() }))
    }

    fn update_if_version(&self, execution_id: i64, expected_version: i64, patch: &ExecutionPatch)
                         -> Result<bool, StoreError> {
        let mut docs = self.write()?;
        match find_execution_mut(&mut docs, execution_id) {
            Some(doc) if doc.version.unwrap_or(0) == expected_version => {
                doc.apply_patch(patch);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn update_step_if_version(&self, execution_id: i64, expected_version: i64, step: &StepDocument)
                              -> Result<bool, StoreError> {
        let mut docs = self.write()?;
        let Some(doc) = find_execution_mut(&mut docs, execution_id) else {
            return Ok(false);
        };
        if doc.version.unwrap_or(0) != expected_version {
            return Ok(false);
        }
        let Some(slot) = doc.steps.iter_mut().find(|s| s.step_execution_id == step.step_execution_id) else {
            return Ok(false);
        };
        *slot = step.clone();
        doc.version = Some(expected_version + 1);
        Ok(true)
    }

    fn push_steps(&self, execution_id: i64, steps: &[StepDocument]) -> Result<bool, StoreError> {
        let mut docs = self.write()?;
        match find_execution_mut(&mut docs, execution_id) {
            Some(doc) => {
                doc.steps.extend_from_slice(steps);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn set_execution_context(&self, execution_id: i64, context: &Value) -> Result<bool, StoreError> {
        let mut docs = self.write()?;
        match find_execution_mut(&mut docs, execution_id) {
            Some(doc) => {
                doc.execution_context = Some(context.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn set_step_execution_context(&self, execution_id: i64, step_execution_id: i64, context: &Value)
                                  -> Result<bool, StoreError> {
        let mut docs = self.write()?;
        let step = find_execution_mut(&mut docs, execution_id).and_then(|doc| {
                                                                  doc.steps
                                                                     .iter_mut()
                                                                     .find(|s| s.step_execution_id == Some(step_execution_id))
                                                              });
        match step {
            Some(step) => {
                step.execution_context = Some(context.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn job_names(&self) -> Result<Vec<String>, StoreError> {
        let docs = self.read()?;
        let names: BTreeSet<&String> = docs.iter().map(|d| &d.job_name).collect();
        Ok(names.into_iter().cloned().collect())
    }

    fn instances(&self, query: &InstanceQuery) -> Result<Vec<InstanceRow>, StoreError> {
        let docs = self.read()?;
        let mut grouped: BTreeMap<i64, InstanceRow> = BTreeMap::new();
        for doc in docs.iter().filter(|d| query.name.matches(&d.job_name)) {
            if let Some(instance_id) = doc.instance_id {
                grouped.entry(instance_id).or_insert_with(|| InstanceRow { instance_id,
                                                                           job_name: doc.job_name.clone(),
                                                                           job_key: doc.job_key.clone() });
            }
        }
        let page = grouped.into_values().rev().skip(query.start);
        Ok(match query.count {
            Some(count) => page.take(count).collect(),
            None => page.collect(),
        })
    }

    fn count_instances(&self, name: &NameMatch) -> Result<u64, StoreError> {
        let docs = self.read()?;
        let ids: BTreeSet<i64> = docs.iter().filter(|d| name.matches(&d.job_name)).filter_map(|d| d.instance_id).collect();
        Ok(ids.len() as u64)
    }
}
