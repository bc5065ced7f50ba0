//! Backend Postgres de las colecciones del core.
//!
//! Cada colección es una tabla `(id BIGSERIAL, doc JSONB)` y cada operación
//! del trait se traduce a UNA sentencia SQL, de modo que la atomicidad por
//! documento la da el propio `UPDATE`/`INSERT` (bloqueo de fila y re-chequeo
//! del `WHERE` bajo READ COMMITTED). No se abren transacciones explícitas.
//!
//! Reintentos: sólo lecturas y escrituras idempotentes pasan por
//! `with_retry`. Incrementos, reclamos, appends y updates condicionales no se
//! reintentan aquí porque una repetición tras un fallo ambiguo podría
//! aplicarse dos veces.

mod counter;
mod records;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use jobvault_core::constants::IndexSpec;
use log::{debug, warn};

use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;

pub use counter::PgCounterCollection;
pub use records::PgExecutionCollection;

pub const RECORDS_TABLE: &str = "batch_job_records";
pub const SEQUENCES_TABLE: &str = "batch_sequences";

/// Alias de tipo para el pool r2d2 de conexiones Postgres.
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;
pub type PgPooledConnection = r2d2::PooledConnection<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones.
///
/// Contrato:
/// - Debe devolver una conexión válida o `PersistenceError::TransientIo`.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<PgPooledConnection, PersistenceError>;
}

/// Implementación concreta de `ConnectionProvider` respaldada por un `PgPool`.
#[derive(Clone, Debug)]
pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<PgPooledConnection, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Determina si un error es transitorio (recomendado reintentar con backoff).
///
/// Cubre conflictos de serialización, errores de pool/conexión y mensajes
/// comunes de desconexión detectados por texto (best-effort).
pub(crate) fn is_retryable(e: &PersistenceError) -> bool {
    match e {
        PersistenceError::SerializationConflict => true,
        PersistenceError::TransientIo(_) => true,
        PersistenceError::Unknown(msg) => {
            let m = msg.to_lowercase();
            m.contains("deadlock detected")
            || m.contains("could not serialize access due to concurrent update")
            || m.contains("terminating connection due to administrator command")
            || m.contains("connection closed")
            || m.contains("connection refused")
            || m.contains("timeout")
        }
        _ => false,
    }
}

/// Retry simple con backoff lineal (hasta 3 reintentos: 15ms, 30ms, 45ms).
/// Sólo para unidades de trabajo que pueden repetirse sin cambiar el
/// resultado.
pub(crate) fn with_retry<F, T>(op: &str, mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retryable(&e) && attempts < 3 => {
                let delay_ms = 15 * ((attempts + 1) as u64);
                warn!("{op}:retry attempt={} err={:?} sleep_ms={}", attempts + 1, e, delay_ms);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

/// Expresión SQL de un campo del documento. Los ids se comparan como
/// `bigint`; el resto como texto.
pub(crate) fn field_expr(field: &str) -> String {
    match field {
        "executionId" | "instanceId" | "stepExecutionId" | "version" => format!("((doc->>'{field}')::bigint)"),
        _ => format!("(doc->>'{field}')"),
    }
}

/// DDL de un índice sobre expresiones JSONB. Los índices únicos compuestos
/// tratan los nulos como iguales (un campo ausente cuenta como un valor), que
/// es la semántica de un document store sobre campos faltantes.
pub(crate) fn index_ddl(table: &str, spec: &IndexSpec) -> String {
    let exprs = spec.fields.iter().map(|f| field_expr(f)).collect::<Vec<_>>().join(", ");
    let unique = if spec.unique { "UNIQUE " } else { "" };
    let nulls = if spec.unique && spec.fields.len() > 1 { " NULLS NOT DISTINCT" } else { "" };
    format!("CREATE {unique}INDEX IF NOT EXISTS {} ON {table} ({exprs}){nulls}", spec.name)
}

/// Crea los índices (idempotente). Dos procesos creando el mismo índice a la
/// vez pueden chocar en el catálogo; el perdedor lo encuentra ya creado.
pub(crate) fn ensure_indexes<P: ConnectionProvider>(provider: &P,
                                                     table: &str,
                                                     specs: &[IndexSpec])
                                                     -> Result<(), PersistenceError> {
    for spec in specs {
        let ddl = index_ddl(table, spec);
        let result = with_retry("ensure_index", || {
            let mut conn = provider.connection()?;
            conn.batch_execute(&ddl).map_err(PersistenceError::from)
        });
        match result {
            Ok(()) => debug!("ensure_index:ok table={table} name={}", spec.name),
            Err(PersistenceError::UniqueViolation(m)) => {
                warn!("ensure_index:concurrent_create table={table} name={} detail={m}", spec.name)
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Construye el pool y corre migraciones pendientes.
///
/// - Tamaños 0 se ajustan a 1; si `min_size > max_size` se usa `min = max`.
/// - Devuelve `PersistenceError::TransientIo` ante errores del pool/manager.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let validated_min = min_size.max(1);
    let validated_max = max_size.max(1);
    if validated_min > validated_max {
        warn!("build_pool: min_size > max_size ({validated_min} > {validated_max}), ajustando min=max");
    }
    let final_min = validated_min.min(validated_max);
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(final_min))
                                    .max_size(validated_max)
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    {
        let mut conn = pool.get()
                           .map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    debug!("build_pool:ok min={final_min} max={validated_max}");
    Ok(pool)
}

/// Carga `.env`, lee `DbConfig` y construye un pool ya migrado.
pub fn build_dev_pool_from_env() -> Result<PgPool, PersistenceError> {
    let cfg = crate::config::DbConfig::from_env()?;
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}
