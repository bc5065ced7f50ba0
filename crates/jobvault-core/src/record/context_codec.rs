//! Codificación del contexto de ejecución como texto plano.
//!
//! Internamente el contexto se almacena como objeto anidado. Algunos
//! consumidores externos (adaptadores de marshalling) requieren un string
//! plano: para ellos existe `ContextSerializer`, que delega en un
//! `ContextCodec` intercambiable y usa UTF-8 como juego de caracteres.

use std::io::{self, Read, Write};
use std::sync::Arc;

use serde_json::Value;

use crate::errors::CodecError;
use crate::model::ExecutionContext;

/// Codec orientado a bytes. Implementaciones deben ser puras y sin estado
/// compartido mutable.
pub trait ContextCodec: Send + Sync {
    fn encode(&self, context: &ExecutionContext, out: &mut dyn Write) -> io::Result<()>;
    fn decode(&self, input: &mut dyn Read) -> io::Result<ExecutionContext>;
}

/// Codec por defecto: objeto JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonContextCodec;

impl ContextCodec for JsonContextCodec {
    fn encode(&self, context: &ExecutionContext, out: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(out, &context.to_value()).map_err(io::Error::from)
    }

    fn decode(&self, input: &mut dyn Read) -> io::Result<ExecutionContext> {
        let value: Value = serde_json::from_reader(input).map_err(io::Error::from)?;
        match value {
            Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(io::Error::new(io::ErrorKind::InvalidData,
                                        format!("execution context must be a JSON object, got {other}"))),
        }
    }
}

/// Adaptador string ↔ contexto para colaboradores externos.
#[derive(Clone)]
pub struct ContextSerializer {
    codec: Arc<dyn ContextCodec>,
}

impl Default for ContextSerializer {
    fn default() -> Self {
        Self::new(Arc::new(JsonContextCodec))
    }
}

impl std::fmt::Debug for ContextSerializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextSerializer").finish_non_exhaustive()
    }
}

impl ContextSerializer {
    pub fn new(codec: Arc<dyn ContextCodec>) -> Self {
        Self { codec }
    }

    /// `None` produce string vacío.
    pub fn serialize(&self, context: Option<&ExecutionContext>) -> Result<String, CodecError> {
        let Some(context) = context else {
            return Ok(String::new());
        };
        let mut buf = Vec::new();
        self.codec.encode(context, &mut buf)?;
        String::from_utf8(buf).map_err(|e| CodecError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    /// `None` o texto en blanco producen un contexto vacío.
    pub fn deserialize(&self, input: Option<&str>) -> Result<ExecutionContext, CodecError> {
        match input {
            Some(text) if !text.trim().is_empty() => Ok(self.codec.decode(&mut text.as_bytes())?),
            _ => Ok(ExecutionContext::new()),
        }
    }
}
