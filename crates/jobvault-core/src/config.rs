//! Configuración del repositorio.
//!
//! Sólo los nombres de las secuencias son configurables; el resto del esquema
//! es fijo. Los valores se pueden sobreescribir por entorno:
//! `JOBVAULT_INSTANCE_SEQUENCE`, `JOBVAULT_EXECUTION_SEQUENCE`,
//! `JOBVAULT_STEP_SEQUENCE`.

use std::env;

use crate::constants::{DEFAULT_EXECUTION_SEQUENCE, DEFAULT_INSTANCE_SEQUENCE, DEFAULT_STEP_SEQUENCE};

/// Nombres de los tres contadores independientes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceNames {
    pub instance: String,
    pub execution: String,
    pub step: String,
}

impl Default for SequenceNames {
    fn default() -> Self {
        Self { instance: DEFAULT_INSTANCE_SEQUENCE.to_string(),
               execution: DEFAULT_EXECUTION_SEQUENCE.to_string(),
               step: DEFAULT_STEP_SEQUENCE.to_string() }
    }
}

impl SequenceNames {
    /// Lee los overrides del entorno; variables ausentes o vacías conservan el
    /// default.
    pub fn from_env() -> Self {
        let pick = |var: &str, default: &str| {
            env::var(var).ok()
                         .map(|v| v.trim().to_string())
                         .filter(|v| !v.is_empty())
                         .unwrap_or_else(|| default.to_string())
        };
        Self { instance: pick("JOBVAULT_INSTANCE_SEQUENCE", DEFAULT_INSTANCE_SEQUENCE),
               execution: pick("JOBVAULT_EXECUTION_SEQUENCE", DEFAULT_EXECUTION_SEQUENCE),
               step: pick("JOBVAULT_STEP_SEQUENCE", DEFAULT_STEP_SEQUENCE) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_distinct_counters() {
        let names = SequenceNames::default();
        assert_eq!(names.instance, "jobInstanceId");
        assert_ne!(names.instance, names.execution);
        assert_ne!(names.execution, names.step);
    }
}
