use serde::{Deserialize, Serialize};

/// Estado de una ejecución (de job o de step).
///
/// Transiciones habituales:
/// - `Unstarted` -> `Running`
/// - `Running` -> `Stopping` | `Completed` | `Failed`
/// - `Stopping` -> `Failed` | `Abandoned`
///
/// `Unknown` indica que no se pudo registrar el resultado real (p.ej. un fallo
/// que no se pudo revertir); una ejecución en ese estado no es reiniciable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BatchStatus {
    Unstarted,
    Running,
    Stopping,
    Completed,
    Failed,
    Abandoned,
    Unknown,
}

impl BatchStatus {
    /// Forma almacenada (mayúsculas).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unstarted => "UNSTARTED",
            Self::Running => "RUNNING",
            Self::Stopping => "STOPPING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Abandoned => "ABANDONED",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Interpreta la forma almacenada. Devuelve `None` si el texto no
    /// corresponde a ninguna variante.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "UNSTARTED" => Some(Self::Unstarted),
            "RUNNING" => Some(Self::Running),
            "STOPPING" => Some(Self::Stopping),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            "ABANDONED" => Some(Self::Abandoned),
            "UNKNOWN" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Ejecución en curso (bloquea la creación de otra para la misma instancia).
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running | Self::Stopping)
    }

    /// Estado final que impide reiniciar la instancia con los mismos
    /// parámetros identificadores.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned)
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Código y descripción de salida.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitStatus {
    pub exit_code: String,
    pub exit_description: String,
}

impl ExitStatus {
    pub const UNKNOWN: &'static str = "UNKNOWN";
    pub const EXECUTING: &'static str = "EXECUTING";
    pub const COMPLETED: &'static str = "COMPLETED";
    pub const NOOP: &'static str = "NOOP";
    pub const FAILED: &'static str = "FAILED";
    pub const STOPPED: &'static str = "STOPPED";

    pub fn new(exit_code: impl Into<String>) -> Self {
        Self { exit_code: exit_code.into(),
               exit_description: String::new() }
    }

    pub fn unknown() -> Self {
        Self::new(Self::UNKNOWN)
    }
    pub fn executing() -> Self {
        Self::new(Self::EXECUTING)
    }
    pub fn completed() -> Self {
        Self::new(Self::COMPLETED)
    }
    pub fn failed() -> Self {
        Self::new(Self::FAILED)
    }
    pub fn stopped() -> Self {
        Self::new(Self::STOPPED)
    }

    /// Agrega texto a la descripción (separado por `; `).
    pub fn and_description(mut self, description: impl AsRef<str>) -> Self {
        let description = description.as_ref().trim();
        if description.is_empty() {
            return self;
        }
        if self.exit_description.is_empty() {
            self.exit_description = description.to_string();
        } else {
            self.exit_description = format!("{}; {}", self.exit_description, description);
        }
        self
    }
}

impl Default for ExitStatus {
    fn default() -> Self {
        Self::unknown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_form_is_stable() {
        for status in [BatchStatus::Unstarted,
                       BatchStatus::Running,
                       BatchStatus::Stopping,
                       BatchStatus::Completed,
                       BatchStatus::Failed,
                       BatchStatus::Abandoned,
                       BatchStatus::Unknown]
        {
            assert_eq!(BatchStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BatchStatus::parse("STARTED"), None);
    }

    #[test]
    fn running_and_complete_groups() {
        assert!(BatchStatus::Stopping.is_running());
        assert!(!BatchStatus::Failed.is_running());
        assert!(BatchStatus::Abandoned.is_complete());
        assert!(!BatchStatus::Failed.is_complete());
    }

    #[test]
    fn descriptions_accumulate() {
        let exit = ExitStatus::failed().and_description("timeout").and_description("  ").and_description("retry later");
        assert_eq!(exit.exit_description, "timeout; retry later");
    }
}
