//! jobvault-persistence
//!
//! Backend Postgres (Diesel + r2d2) para `jobvault-core`. Las colecciones de
//! documentos se modelan como tablas con una única columna JSONB.
//!
//! Módulos:
//! - `pg`: colecciones de registros y contadores, pool y reintentos.
//! - `migrations`: runner embebido de migraciones Diesel.
//! - `config`: carga de configuración desde .env.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;

use std::sync::Arc;

use jobvault_core::{ExecutionStore, HistoryReader, RecordCodec, RepositoryError, SequenceNames};

pub use config::{init_dotenv, DbConfig};
pub use error::PersistenceError;
pub use pg::{build_dev_pool_from_env, build_pool, ConnectionProvider, PgCounterCollection, PgExecutionCollection, PgPool,
             PoolProvider};

pub type PgExecutionStore = ExecutionStore<PgExecutionCollection<PoolProvider>, PgCounterCollection<PoolProvider>>;

/// `ExecutionStore` sobre un pool ya migrado. Provisiona índices y
/// contadores (idempotente).
pub fn pg_execution_store(pool: PgPool, names: SequenceNames) -> Result<PgExecutionStore, RepositoryError> {
    let provider = PoolProvider { pool };
    ExecutionStore::with_options(Arc::new(PgExecutionCollection::new(provider.clone())),
                                 Arc::new(PgCounterCollection::new(provider)),
                                 names,
                                 RecordCodec::default())
}

/// Lector de historial sobre un pool (sin provisionar nada).
pub fn pg_history_reader(pool: PgPool) -> HistoryReader<PgExecutionCollection<PoolProvider>> {
    HistoryReader::new(Arc::new(PgExecutionCollection::new(PoolProvider { pool })))
}
