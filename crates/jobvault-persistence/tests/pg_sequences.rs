use std::collections::BTreeSet;
use std::sync::Arc;

use jobvault_core::{RepositoryError, SequenceCounter};
use jobvault_persistence::pg::{PgCounterCollection, PoolProvider};
use rayon::prelude::*;
use test_support::{unique_job, with_pool};

#[test]
fn concurrent_next_value_is_gap_free() {
    with_pool(|pool| {
        let counters = Arc::new(PgCounterCollection::new(PoolProvider { pool: pool.clone() }));
        let name = unique_job("seq");
        let seq = SequenceCounter::new(counters, &name).expect("counter");

        let values: Vec<i64> = (0..64).into_par_iter()
                                      .map(|_| seq.next_value().expect("next_value"))
                                      .collect();
        let distinct: BTreeSet<i64> = values.iter().copied().collect();
        assert_eq!(distinct.len(), 64, "valores repetidos");
        assert_eq!(distinct.first().copied(), Some(1));
        assert_eq!(distinct.last().copied(), Some(64), "la secuencia debe ser contigua");
    });
}

#[test]
fn second_handle_does_not_reset_counter() {
    with_pool(|pool| {
        let counters = Arc::new(PgCounterCollection::new(PoolProvider { pool: pool.clone() }));
        let name = unique_job("seq");
        let a = SequenceCounter::new(counters.clone(), &name).expect("a");
        assert_eq!(a.next_value().expect("1"), 1);
        assert_eq!(a.next_value().expect("2"), 2);
        let b = SequenceCounter::new(counters, &name).expect("b");
        assert_eq!(b.next_value().expect("3"), 3);
    });
}

#[test]
fn deleted_counter_reports_missing() {
    with_pool(|pool| {
        let counters = Arc::new(PgCounterCollection::new(PoolProvider { pool: pool.clone() }));
        let name = unique_job("seq");
        let seq = SequenceCounter::new(counters.clone(), &name).expect("counter");
        assert_eq!(seq.next_value().expect("first"), 1);
        assert!(counters.delete_counter(&name).expect("delete"));
        match seq.next_value() {
            Err(RepositoryError::CounterMissing(n)) => assert_eq!(n, name),
            other => panic!("esperaba CounterMissing, obtuve {other:?}"),
        }
    });
}
