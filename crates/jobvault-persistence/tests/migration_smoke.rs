use diesel::prelude::*;
use diesel::sql_types::Text;
use jobvault_core::constants::{COUNTER_NAME_UK, RECORD_INDEXES};
use jobvault_core::SequenceNames;
use jobvault_persistence::{pg_execution_store, PersistenceError};
use test_support::with_pool;

#[derive(QueryableByName)]
struct IndexRow {
    #[diesel(sql_type = Text)]
    indexname: String,
}

#[test]
fn store_construction_provisions_indexes() {
    with_pool(|pool| {
        pg_execution_store(pool.clone(), SequenceNames::default()).expect("store");
        // Segunda construcción: índices y contadores ya existen.
        pg_execution_store(pool.clone(), SequenceNames::default()).expect("store again");

        let mut conn = pool.get().expect("conn");
        let rows: Vec<IndexRow> =
            diesel::sql_query("SELECT indexname::text AS indexname FROM pg_indexes \
                               WHERE tablename IN ('batch_job_records', 'batch_sequences')")
                .load(&mut conn)
                .expect("pg_indexes");
        let names: Vec<String> = rows.into_iter().map(|r| r.indexname).collect();
        for spec in RECORD_INDEXES.iter().chain(std::iter::once(&COUNTER_NAME_UK)) {
            assert!(names.iter().any(|n| n == spec.name), "falta índice {}", spec.name);
        }
    });
}

#[test]
fn non_object_documents_are_rejected() {
    with_pool(|pool| {
        let mut conn = pool.get().expect("conn");
        let err = diesel::sql_query("INSERT INTO batch_job_records (doc) VALUES ('[1, 2]'::jsonb)")
            .execute(&mut conn)
            .map_err(PersistenceError::from)
            .expect_err("CHECK debe rechazar arrays");
        assert!(matches!(err, PersistenceError::CheckViolation(_)), "obtuve {err:?}");
    });
}
