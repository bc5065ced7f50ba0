//! jobvault
//!
//! Fachada del workspace:
//! - Reexporta el core (`jobvault_core`): modelo, codec, store e historial.
//! - `pg` reexporta el backend Postgres (`jobvault_persistence`).
//!
//! Uso típico en memoria:
//!
//! ```
//! use jobvault::{in_memory_store, JobParameters};
//!
//! let store = in_memory_store().unwrap();
//! let params = JobParameters::builder().add_long("run.id", 1).build();
//! let exec = store.create_job_execution("ReportJob", &params, None).unwrap();
//! assert_eq!(exec.version, 0);
//! ```

pub use jobvault_core::*;

pub mod pg {
    pub use jobvault_persistence::*;
}
