use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::sql_types::{BigInt, Jsonb, Nullable, Text};
use jobvault_core::constants::RECORD_INDEXES;
use jobvault_core::record::{ExecutionDocument, ExecutionPatch, InstanceRow, Revision, StepDocument};
use jobvault_core::store::{ExecutionCollection, InstanceQuery, NameMatch, RecordFilter, RecordQuery};
use jobvault_core::StoreError;
use log::debug;
use serde_json::Value;

use super::{ensure_indexes, with_retry, ConnectionProvider, RECORDS_TABLE};
use crate::error::PersistenceError;

type Boxed = BoxedSqlQuery<'static, Pg, SqlQuery>;

#[derive(QueryableByName, Debug)]
struct DocRow {
    #[diesel(sql_type = Jsonb)]
    doc: Value,
}

#[derive(QueryableByName, Debug)]
struct RevisionRow {
    #[diesel(sql_type = BigInt)]
    version: i64,
    #[diesel(sql_type = Nullable<Text>)]
    status: Option<String>,
}

#[derive(QueryableByName, Debug)]
struct NameRow {
    #[diesel(sql_type = Text)]
    job_name: String,
}

#[derive(QueryableByName, Debug)]
struct CountRow {
    #[diesel(sql_type = BigInt)]
    count: i64,
}

#[derive(QueryableByName, Debug)]
struct InstanceSqlRow {
    #[diesel(sql_type = BigInt)]
    instance_id: i64,
    #[diesel(sql_type = Text)]
    job_name: String,
    #[diesel(sql_type = Text)]
    job_key: String,
}

fn boxed(sql: impl Into<String>) -> Boxed {
    diesel::sql_query(sql).into_boxed()
}

const ORDER_NEWEST_FIRST: &str = "ORDER BY ((doc->>'executionId')::bigint) DESC NULLS LAST";

const UPDATE_IF_VERSION: &str = "UPDATE batch_job_records \
     SET doc = doc || $3 || jsonb_build_object('version', COALESCE((doc->>'version')::bigint, 0) + 1) \
     WHERE ((doc->>'executionId')::bigint) = $1 AND COALESCE((doc->>'version')::bigint, 0) = $2";

// El subquery ubica la posición del step dentro del arreglo; el WHERE
// externo re-chequea la versión sobre la fila bloqueada.
const UPDATE_STEP_IF_VERSION: &str = "UPDATE batch_job_records AS r \
     SET doc = jsonb_set(r.doc, ARRAY['steps', s.idx::text], $3) \
               || jsonb_build_object('version', COALESCE((r.doc->>'version')::bigint, 0) + 1) \
     FROM (SELECT e.id, t.ord - 1 AS idx \
           FROM batch_job_records AS e, \
                jsonb_array_elements(e.doc->'steps') WITH ORDINALITY AS t(step, ord) \
           WHERE ((e.doc->>'executionId')::bigint) = $1 \
             AND (t.step->>'stepExecutionId')::bigint = $4) AS s \
     WHERE r.id = s.id AND COALESCE((r.doc->>'version')::bigint, 0) = $2";

const SET_STEP_CONTEXT: &str = "UPDATE batch_job_records AS r \
     SET doc = jsonb_set(r.doc, ARRAY['steps', s.idx::text, 'executionContext'], $3) \
     FROM (SELECT e.id, t.ord - 1 AS idx \
           FROM batch_job_records AS e, \
                jsonb_array_elements(e.doc->'steps') WITH ORDINALITY AS t(step, ord) \
           WHERE ((e.doc->>'executionId')::bigint) = $1 \
             AND (t.step->>'stepExecutionId')::bigint = $2) AS s \
     WHERE r.id = s.id";

// Reemplaza el registro sin executionId de la identidad o, si no hay,
// inserta. Una sola sentencia: el CTE de escritura y el INSERT ven el mismo
// snapshot.
const CLAIM: &str = "WITH claimed AS ( \
         UPDATE batch_job_records SET doc = $3 \
         WHERE doc->>'jobName' = $1 AND doc->>'jobKey' = $2 AND doc->>'executionId' IS NULL \
         RETURNING id) \
     INSERT INTO batch_job_records (doc) SELECT $3 WHERE NOT EXISTS (SELECT 1 FROM claimed)";

/// Registros de instancias y ejecuciones en `batch_job_records`.
#[derive(Debug, Clone)]
pub struct PgExecutionCollection<P: ConnectionProvider> {
    provider: P,
}

impl<P: ConnectionProvider> PgExecutionCollection<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    fn load_docs(&self, op: &str, build: impl Fn() -> Boxed) -> Result<Vec<ExecutionDocument>, StoreError> {
        let rows: Vec<DocRow> = with_retry(op, || {
            let mut conn = self.provider.connection()?;
            build().load(&mut conn).map_err(PersistenceError::from)
        })?;
        let docs = rows.into_iter()
                       .map(|r| serde_json::from_value(r.doc).map_err(PersistenceError::from))
                       .collect::<Result<Vec<ExecutionDocument>, _>>()?;
        Ok(docs)
    }

    fn execute(&self, build: impl FnOnce() -> Boxed) -> Result<usize, StoreError> {
        let mut conn = self.provider.connection()?;
        Ok(build().execute(&mut conn).map_err(PersistenceError::from)?)
    }
}

fn select_docs(filter: &RecordFilter, limit: Option<usize>) -> Boxed {
    let limit = limit.map(|l| format!(" LIMIT {l}")).unwrap_or_default();
    let sql = |cond: &str| format!("SELECT doc FROM batch_job_records WHERE {cond} {ORDER_NEWEST_FIRST}{limit}");
    match filter {
        RecordFilter::JobKey { job_name, job_key } => {
            boxed(sql("doc->>'jobName' = $1 AND doc->>'jobKey' = $2")).bind::<Text, _>(job_name.clone())
                                                                      .bind::<Text, _>(job_key.clone())
        }
        RecordFilter::ExecutionId(id) => {
            boxed(sql("((doc->>'executionId')::bigint) = $1")).bind::<BigInt, _>(*id)
        }
        RecordFilter::InstanceId(id) => {
            boxed(sql("((doc->>'instanceId')::bigint) = $1")).bind::<BigInt, _>(*id)
        }
        RecordFilter::Running { job_name } => {
            boxed(sql("doc->>'jobName' = $1 AND doc->>'executionId' IS NOT NULL \
                       AND doc->>'startTime' IS NOT NULL AND doc->>'endTime' IS NULL"))
                .bind::<Text, _>(job_name.clone())
        }
    }
}

/// Condición sobre `jobName` (siempre `$1`) y su valor.
fn name_condition(name: &NameMatch) -> (&'static str, String) {
    match name {
        NameMatch::Exact(n) => ("doc->>'jobName' = $1", n.clone()),
        NameMatch::Pattern(p) => ("doc->>'jobName' LIKE $1 ESCAPE '\\'", p.to_like()),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, StoreError> {
    Ok(serde_json::to_value(value).map_err(PersistenceError::from)?)
}

impl<P: ConnectionProvider> ExecutionCollection for PgExecutionCollection<P> {
    fn ensure_indexes(&self) -> Result<(), StoreError> {
        Ok(ensure_indexes(&self.provider, RECORDS_TABLE, &RECORD_INDEXES)?)
    }

    fn insert_placeholder(&self, doc: &ExecutionDocument) -> Result<(), StoreError> {
        let doc = to_json(doc)?;
        self.execute(|| {
                boxed("INSERT INTO batch_job_records (doc) VALUES ($1)").bind::<Jsonb, _>(doc)
            })?;
        Ok(())
    }

    fn claim(&self, doc: &ExecutionDocument) -> Result<(), StoreError> {
        let value = to_json(doc)?;
        let job_name = doc.job_name.clone();
        let job_key = doc.job_key.clone();
        self.execute(|| {
                boxed(CLAIM).bind::<Text, _>(job_name)
                            .bind::<Text, _>(job_key)
                            .bind::<Jsonb, _>(value)
            })?;
        debug!("claim:ok job_name={} execution_id={:?}", doc.job_name, doc.execution_id);
        Ok(())
    }

    fn find(&self, query: &RecordQuery) -> Result<Vec<ExecutionDocument>, StoreError> {
        self.load_docs("find", || select_docs(&query.filter, query.limit))
    }

    fn read_revision(&self, execution_id: i64) -> Result<Option<Revision>, StoreError> {
        let rows: Vec<RevisionRow> = with_retry("read_revision", || {
            let mut conn = self.provider.connection()?;
            diesel::sql_query("SELECT COALESCE((doc->>'version')::bigint, 0) AS version, doc->>'status' AS status \
                               FROM batch_job_records WHERE ((doc->>'executionId')::bigint) = $1")
                .bind::<BigInt, _>(execution_id)
                .load(&mut conn)
                .map_err(PersistenceError::from)
        })?;
        Ok(rows.into_iter().next().map(|r| Revision { version: r.version,
                                                      status: r.status }))
    }

    fn update_if_version(&self, execution_id: i64, expected_version: i64, patch: &ExecutionPatch)
                         -> Result<bool, StoreError> {
        let patch = to_json(patch)?;
        let n = self.execute(|| {
                        boxed(UPDATE_IF_VERSION).bind::<BigInt, _>(execution_id)
                                                .bind::<BigInt, _>(expected_version)
                                                .bind::<Jsonb, _>(patch)
                    })?;
        Ok(n > 0)
    }

    fn update_step_if_version(&self, execution_id: i64, expected_version: i64, step: &StepDocument)
                              -> Result<bool, StoreError> {
        let Some(step_execution_id) = step.step_execution_id else {
            return Ok(false);
        };
        let value = to_json(step)?;
        let n = self.execute(|| {
                        boxed(UPDATE_STEP_IF_VERSION).bind::<BigInt, _>(execution_id)
                                                     .bind::<BigInt, _>(expected_version)
                                                     .bind::<Jsonb, _>(value)
                                                     .bind::<BigInt, _>(step_execution_id)
                    })?;
        Ok(n > 0)
    }

    fn push_steps(&self, execution_id: i64, steps: &[StepDocument]) -> Result<bool, StoreError> {
        let value = to_json(&steps)?;
        let n = self.execute(|| {
                        boxed("UPDATE batch_job_records \
                               SET doc = jsonb_set(doc, '{steps}', COALESCE(doc->'steps', '[]'::jsonb) || $2) \
                               WHERE ((doc->>'executionId')::bigint) = $1").bind::<BigInt, _>(execution_id)
                            .bind::<Jsonb, _>(value)
                    })?;
        Ok(n > 0)
    }

    fn set_execution_context(&self, execution_id: i64, context: &Value) -> Result<bool, StoreError> {
        let n = with_retry("set_execution_context", || {
            let mut conn = self.provider.connection()?;
            diesel::sql_query("UPDATE batch_job_records SET doc = jsonb_set(doc, '{executionContext}', $2) \
                               WHERE ((doc->>'executionId')::bigint) = $1")
                .bind::<BigInt, _>(execution_id)
                .bind::<Jsonb, _>(context)
                .execute(&mut conn)
                .map_err(PersistenceError::from)
        })?;
        Ok(n > 0)
    }

    fn set_step_execution_context(&self, execution_id: i64, step_execution_id: i64, context: &Value)
                                  -> Result<bool, StoreError> {
        let n = with_retry("set_step_execution_context", || {
            let mut conn = self.provider.connection()?;
            diesel::sql_query(SET_STEP_CONTEXT).bind::<BigInt, _>(execution_id)
                                               .bind::<BigInt, _>(step_execution_id)
                                               .bind::<Jsonb, _>(context)
                                               .execute(&mut conn)
                                               .map_err(PersistenceError::from)
        })?;
        Ok(n > 0)
    }

    fn job_names(&self) -> Result<Vec<String>, StoreError> {
        let rows: Vec<NameRow> = with_retry("job_names", || {
            let mut conn = self.provider.connection()?;
            diesel::sql_query("SELECT DISTINCT doc->>'jobName' AS job_name FROM batch_job_records ORDER BY job_name")
                .load(&mut conn)
                .map_err(PersistenceError::from)
        })?;
        Ok(rows.into_iter().map(|r| r.job_name).collect())
    }

    fn instances(&self, query: &InstanceQuery) -> Result<Vec<InstanceRow>, StoreError> {
        let (cond, bind) = name_condition(&query.name);
        let limit = query.count.map(|c| format!(" LIMIT {c}")).unwrap_or_default();
        let sql = format!("SELECT ((doc->>'instanceId')::bigint) AS instance_id, \
                                  MIN(doc->>'jobName') AS job_name, MIN(doc->>'jobKey') AS job_key \
                           FROM batch_job_records \
                           WHERE {cond} AND doc->>'instanceId' IS NOT NULL \
                           GROUP BY ((doc->>'instanceId')::bigint) \
                           ORDER BY instance_id DESC OFFSET {}{limit}",
                          query.start);
        let rows: Vec<InstanceSqlRow> = with_retry("instances", || {
            let mut conn = self.provider.connection()?;
            diesel::sql_query(sql.as_str()).bind::<Text, _>(bind.as_str())
                                           .load(&mut conn)
                                           .map_err(PersistenceError::from)
        })?;
        Ok(rows.into_iter()
               .map(|r| InstanceRow { instance_id: r.instance_id,
                                      job_name: r.job_name,
                                      job_key: r.job_key })
               .collect())
    }

    fn count_instances(&self, name: &NameMatch) -> Result<u64, StoreError> {
        let (cond, bind) = name_condition(name);
        let sql = format!("SELECT COUNT(DISTINCT ((doc->>'instanceId')::bigint)) AS count \
                           FROM batch_job_records WHERE {cond}");
        let rows: Vec<CountRow> = with_retry("count_instances", || {
            let mut conn = self.provider.connection()?;
            diesel::sql_query(sql.as_str()).bind::<Text, _>(bind.as_str())
                                           .load(&mut conn)
                                           .map_err(PersistenceError::from)
        })?;
        Ok(rows.first().map(|r| r.count.max(0) as u64).unwrap_or(0))
    }
}
