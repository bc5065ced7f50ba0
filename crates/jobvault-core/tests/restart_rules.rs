use chrono::{TimeZone, Utc};
use jobvault_core::{in_memory_store, BatchStatus, ErrorClass, ExitStatus, InMemoryExecutionStore, JobExecution,
                    JobParameters, RepositoryError};
use serde_json::json;

fn report_params(day: u32) -> JobParameters {
    JobParameters::builder().add_date("date", Utc.with_ymd_and_hms(2022, 2, day, 0, 0, 0).unwrap())
                            .add_long_non_identifying("attempt", 1)
                            .build()
}

fn run_to(store: &InMemoryExecutionStore, exec: &mut JobExecution, status: BatchStatus) {
    exec.status = BatchStatus::Running;
    exec.start_time = Some(Utc::now());
    store.update_job_execution(exec).expect("start");
    if status != BatchStatus::Running {
        exec.status = status;
        exec.end_time = Some(Utc::now());
        exec.exit_status = match status {
            BatchStatus::Completed => ExitStatus::completed(),
            BatchStatus::Failed => ExitStatus::failed(),
            _ => ExitStatus::unknown(),
        };
        store.update_job_execution(exec).expect("finish");
    }
}

#[test]
fn report_job_example() {
    let store = in_memory_store().expect("store");
    let mut first = store.create_job_execution("ReportJob", &report_params(19), None)
                         .expect("first run");
    run_to(&store, &mut first, BatchStatus::Completed);

    let err = store.create_job_execution("ReportJob", &report_params(19), None)
                   .expect_err("same identifying params after completion");
    assert!(matches!(err, RepositoryError::AlreadyComplete { instance_id, .. } if instance_id == first.job_instance.id));
    assert_eq!(err.class(), ErrorClass::Conflict);

    let next_day = store.create_job_execution("ReportJob", &report_params(20), None)
                        .expect("new identifying params");
    assert_ne!(next_day.job_instance.id, first.job_instance.id);
    assert_ne!(next_day.job_instance.job_key, first.job_instance.job_key);
}

#[test]
fn non_identifying_changes_share_instance() {
    let a = report_params(19);
    let b = JobParameters::builder().add_date("date", Utc.with_ymd_and_hms(2022, 2, 19, 0, 0, 0).unwrap())
                                    .add_long_non_identifying("attempt", 7)
                                    .build();
    assert_eq!(a.job_key(), b.job_key());

    let store = in_memory_store().expect("store");
    let mut first = store.create_job_execution("ReportJob", &a, None).expect("first");
    run_to(&store, &mut first, BatchStatus::Completed);
    assert!(matches!(store.create_job_execution("ReportJob", &b, None),
                     Err(RepositoryError::AlreadyComplete { .. })));
}

#[test]
fn running_execution_blocks_second_creation() {
    let store = in_memory_store().expect("store");
    let mut first = store.create_job_execution("ReportJob", &report_params(19), None)
                         .expect("first");
    run_to(&store, &mut first, BatchStatus::Running);

    let err = store.create_job_execution("ReportJob", &report_params(19), None)
                   .expect_err("second while running");
    assert!(matches!(err, RepositoryError::AlreadyRunning { execution_id, .. } if Some(execution_id) == first.id));

    first.status = BatchStatus::Stopping;
    store.update_job_execution(&mut first).expect("stopping");
    assert!(matches!(store.create_job_execution("ReportJob", &report_params(19), None),
                     Err(RepositoryError::AlreadyRunning { .. })));
}

#[test]
fn failed_execution_restarts_under_same_instance() {
    let store = in_memory_store().expect("store");
    let mut first = store.create_job_execution("ReportJob", &report_params(19), Some("report.xml"))
                         .expect("first");
    first.execution_context.put("cursor", json!({"page": 4}));
    store.update_execution_context(&first).expect("context");
    run_to(&store, &mut first, BatchStatus::Failed);

    let second = store.create_job_execution("ReportJob", &report_params(19), Some("report.xml"))
                      .expect("restart");
    assert_eq!(second.job_instance.id, first.job_instance.id);
    assert_ne!(second.id, first.id);
    assert_eq!(second.version, 0);
    assert_eq!(second.execution_context.get("cursor"), Some(&json!({"page": 4})));

    let executions = store.history()
                          .get_job_executions(&first.job_instance)
                          .expect("executions");
    assert_eq!(executions.iter().map(|e| e.id).collect::<Vec<_>>(), vec![second.id, first.id]);
}

#[test]
fn unknown_status_cannot_restart() {
    let store = in_memory_store().expect("store");
    let mut first = store.create_job_execution("ReportJob", &report_params(19), None)
                         .expect("first");
    run_to(&store, &mut first, BatchStatus::Unknown);

    let err = store.create_job_execution("ReportJob", &report_params(19), None)
                   .expect_err("unknown");
    assert!(matches!(err, RepositoryError::RestartUnknown { .. }));
}

#[test]
fn completed_without_identifying_params_may_rerun() {
    let params = JobParameters::builder().add_string_non_identifying("run.note", "nightly")
                                         .build();
    let store = in_memory_store().expect("store");
    let mut first = store.create_job_execution("CleanupJob", &params, None).expect("first");
    run_to(&store, &mut first, BatchStatus::Completed);

    let second = store.create_job_execution("CleanupJob", &params, None)
                      .expect("rerun allowed");
    assert_eq!(second.job_instance.id, first.job_instance.id);

    // Sin parámetros en absoluto ocurre lo mismo.
    let empty = JobParameters::new();
    let mut a = store.create_job_execution("EmptyJob", &empty, None).expect("a");
    run_to(&store, &mut a, BatchStatus::Completed);
    assert!(store.create_job_execution("EmptyJob", &empty, None).is_ok());
}

#[test]
fn abandoned_counts_as_complete() {
    let store = in_memory_store().expect("store");
    let mut first = store.create_job_execution("ReportJob", &report_params(19), None)
                         .expect("first");
    run_to(&store, &mut first, BatchStatus::Abandoned);
    assert!(matches!(store.create_job_execution("ReportJob", &report_params(19), None),
                     Err(RepositoryError::AlreadyComplete { .. })));
}

#[test]
fn non_finite_ratios_are_separate_readable_instances() {
    let store = in_memory_store().expect("store");
    let ratio = |x: f64| JobParameters::builder().add_double("ratio", x).build();
    let nan = store.create_job_execution("ratioJob", &ratio(f64::NAN), None).expect("nan");
    let inf = store.create_job_execution("ratioJob", &ratio(f64::INFINITY), None).expect("inf");
    let neg = store.create_job_execution("ratioJob", &ratio(f64::NEG_INFINITY), None).expect("-inf");
    assert_ne!(nan.job_instance.id, inf.job_instance.id);
    assert_ne!(inf.job_instance.id, neg.job_instance.id);
    assert_ne!(nan.job_instance.id, neg.job_instance.id);

    let history = store.history();
    let stored = history.get_job_execution(inf.id.expect("id")).expect("decodable").expect("exists");
    assert_eq!(stored.parameters, ratio(f64::INFINITY));
    let stored_nan = history.get_job_execution(nan.id.expect("id")).expect("decodable").expect("exists");
    assert_eq!(stored_nan.job_instance, nan.job_instance);
}
