//! Demo del historial de ejecuciones: ciclo de vida completo de `ReportJob`
//! en memoria y, opcionalmente, contra Postgres.

use chrono::{TimeZone, Utc};
use jobvault::{in_memory_store, BatchStatus, CounterCollection, ExecutionCollection, ExecutionStore, ExitStatus,
               JobParameters, RepositoryError, SequenceNames};
use serde_json::json;

fn report_params(day: u32) -> Result<JobParameters, Box<dyn std::error::Error>> {
    let date = Utc.with_ymd_and_hms(2022, 2, day, 0, 0, 0)
                  .single()
                  .ok_or("fecha inválida")?;
    Ok(JobParameters::builder().add_date("date", date).build())
}

/// Corre el escenario sobre cualquier backend.
fn run_report_job<C, K>(store: &ExecutionStore<C, K>, job_name: &str) -> Result<(), Box<dyn std::error::Error>>
    where C: ExecutionCollection,
          K: CounterCollection
{
    let params = report_params(19)?;
    let mut exec = store.create_job_execution(job_name, &params, None)?;
    println!("[demo] creada ejecución id={:?} instancia={} key={}",
             exec.id,
             exec.job_instance.id,
             exec.job_instance.job_key);

    exec.status = BatchStatus::Running;
    exec.start_time = Some(Utc::now());
    store.update_job_execution(&mut exec)?;

    let step = exec.new_step("generateReport");
    let step_id = store.add_step_execution(&mut exec, step)?;
    if let Some(step) = exec.step_mut(step_id) {
        step.read_count = 120;
        step.write_count = 118;
        step.write_skip_count = 2;
        step.status = BatchStatus::Completed;
        step.exit_status = ExitStatus::completed();
        step.execution_context.put("lastLine", json!(120));
    }
    store.update_step_execution(&mut exec, step_id)?;

    exec.status = BatchStatus::Completed;
    exec.end_time = Some(Utc::now());
    exec.exit_status = ExitStatus::completed();
    store.update_job_execution(&mut exec)?;
    println!("[demo] completada version={} status={}", exec.version, exec.status);

    match store.create_job_execution(job_name, &params, None) {
        Err(RepositoryError::AlreadyComplete { instance_id, .. }) => {
            println!("[demo] reintento rechazado: instancia {instance_id} ya completa")
        }
        other => return Err(format!("se esperaba AlreadyComplete, obtuve {other:?}").into()),
    }

    let next_day = store.create_job_execution(job_name, &report_params(20)?, None)?;
    let history = store.history();
    println!("[demo] instancias de {job_name}: {} (nueva id={})",
             history.get_job_instance_count(job_name)?,
             next_day.job_instance.id);
    if let Some(last) = history.get_last_step_execution(&exec.job_instance, "generateReport")? {
        println!("[demo] último step: read={} write={} skips={}",
                 last.read_count,
                 last.write_count,
                 last.skip_count());
    }
    Ok(())
}

fn maybe_run_pg_demo() {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("[PG DEMO] DATABASE_URL no definido; omitiendo demo PG");
        return;
    }
    let pool = match jobvault::pg::build_dev_pool_from_env() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("[PG DEMO] Error construyendo pool: {e}");
            return;
        }
    };
    let store = match jobvault::pg::pg_execution_store(pool, SequenceNames::default()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("[PG DEMO] Error creando store: {e}");
            return;
        }
    };
    let job_name = format!("ReportJob-{}", Utc::now().timestamp_millis());
    if let Err(e) = run_report_job(&store, &job_name) {
        eprintln!("[PG DEMO] Error: {e}");
    }
}

fn main() {
    jobvault::pg::init_dotenv();

    println!("--- ReportJob en memoria ---");
    let outcome = in_memory_store().map_err(Box::<dyn std::error::Error>::from)
                                   .and_then(|store| run_report_job(&store, "ReportJob"));
    if let Err(e) = outcome {
        eprintln!("[demo] error: {e}");
        std::process::exit(1);
    }

    if std::env::var("JOBVAULT_RUN_PG_DEMO").ok().as_deref() == Some("1") {
        println!("--- ReportJob en Postgres ---");
        maybe_run_pg_demo();
    } else {
        eprintln!("[PG DEMO] Omitido (JOBVAULT_RUN_PG_DEMO=1 para habilitar)");
    }
}
