use diesel::prelude::*;
use diesel::sql_types::{BigInt, Jsonb, Text};
use jobvault_core::constants::COUNTER_NAME_UK;
use jobvault_core::record::CounterDocument;
use jobvault_core::store::CounterCollection;
use jobvault_core::StoreError;
use log::debug;

use super::{ensure_indexes, with_retry, ConnectionProvider, SEQUENCES_TABLE};
use crate::error::PersistenceError;

#[derive(QueryableByName, Debug)]
struct ValueRow {
    #[diesel(sql_type = BigInt)]
    value: i64,
}

/// Contadores `{counterName, value}` en `batch_sequences`.
#[derive(Debug, Clone)]
pub struct PgCounterCollection<P: ConnectionProvider> {
    provider: P,
}

impl<P: ConnectionProvider> PgCounterCollection<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Borra un contador. Sólo para mantenimiento: un contador borrado hace
    /// fallar a todo `SequenceCounter` que lo use.
    pub fn delete_counter(&self, name: &str) -> Result<bool, StoreError> {
        let mut conn = self.provider.connection()?;
        let n = diesel::sql_query("DELETE FROM batch_sequences WHERE doc->>'counterName' = $1")
            .bind::<Text, _>(name)
            .execute(&mut conn)
            .map_err(PersistenceError::from)?;
        Ok(n > 0)
    }
}

impl<P: ConnectionProvider> CounterCollection for PgCounterCollection<P> {
    fn ensure_indexes(&self) -> Result<(), StoreError> {
        Ok(ensure_indexes(&self.provider, SEQUENCES_TABLE, &[COUNTER_NAME_UK])?)
    }

    fn init_counter(&self, name: &str) -> Result<(), StoreError> {
        let doc = serde_json::to_value(CounterDocument { counter_name: name.to_string(),
                                                         value: 0 }).map_err(PersistenceError::from)?;
        let inserted = with_retry("init_counter", || {
            let mut conn = self.provider.connection()?;
            diesel::sql_query("INSERT INTO batch_sequences (doc) VALUES ($1) \
                               ON CONFLICT ((doc->>'counterName')) DO NOTHING")
                .bind::<Jsonb, _>(&doc)
                .execute(&mut conn)
                .map_err(PersistenceError::from)
        })?;
        debug!("init_counter:ok name={name} created={}", inserted > 0);
        Ok(())
    }

    fn increment(&self, name: &str) -> Result<Option<i64>, StoreError> {
        let mut conn = self.provider.connection()?;
        let rows: Vec<ValueRow> =
            diesel::sql_query("UPDATE batch_sequences \
                               SET doc = jsonb_set(doc, '{value}', to_jsonb((doc->>'value')::bigint + 1)) \
                               WHERE doc->>'counterName' = $1 \
                               RETURNING (doc->>'value')::bigint AS value")
                .bind::<Text, _>(name)
                .load(&mut conn)
                .map_err(PersistenceError::from)?;
        Ok(rows.first().map(|r| r.value))
    }
}
