//! Carga de configuración de conexión desde variables de entorno.
//! Usa convención `DATABASE_URL` y parámetros opcionales de pool.

use std::env;

use dotenvy::dotenv;
use once_cell::sync::Lazy;

use crate::error::PersistenceError;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

pub const DEFAULT_MIN_CONNECTIONS: u32 = 2;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 16;

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
}

impl DbConfig {
    pub fn from_env() -> Result<Self, PersistenceError> {
        init_dotenv();
        Self::from_env_with(|k| env::var(k).ok())
    }

    /// Igual que `from_env` pero con un lookup inyectable (tests, config
    /// embebida en otra aplicación).
    pub fn from_env_with<F>(lookup: F) -> Result<Self, PersistenceError>
        where F: Fn(&str) -> Option<String>
    {
        let url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty())
                                        .ok_or_else(|| PersistenceError::Config("DATABASE_URL no definido".into()))?;
        let parse_or = |var: &str, default: u32| lookup(var).and_then(|v| v.parse().ok()).unwrap_or(default);
        Ok(Self { url,
                  min_connections: parse_or("DATABASE_MIN_CONNECTIONS", DEFAULT_MIN_CONNECTIONS),
                  max_connections: parse_or("DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS) })
    }
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_url_is_config_error() {
        assert!(matches!(DbConfig::from_env_with(|_| None), Err(PersistenceError::Config(_))));
        let blank = DbConfig::from_env_with(|k| (k == "DATABASE_URL").then(|| "  ".to_string()));
        assert!(matches!(blank, Err(PersistenceError::Config(_))));
    }

    #[test]
    fn pool_sizes_fall_back_to_defaults() {
        let cfg = DbConfig::from_env_with(|k| match k {
                      "DATABASE_URL" => Some("postgres://localhost/jobs".into()),
                      "DATABASE_MAX_CONNECTIONS" => Some("abc".into()),
                      "DATABASE_MIN_CONNECTIONS" => Some("4".into()),
                      _ => None,
                  }).unwrap();
        assert_eq!(cfg.min_connections, 4);
        assert_eq!(cfg.max_connections, DEFAULT_MAX_CONNECTIONS);
    }
}
