//! Esquema almacenado y codecs.
//!
//! - `document`: structs serde con la forma exacta del documento.
//! - `codec`: `RecordCodec`, transformaciones puras entidad ↔ documento.
//! - `context_codec`: forma string del contexto para colaboradores externos.

pub mod codec;
pub mod context_codec;
pub mod document;

pub use codec::{decode_status, RecordCodec};
pub use context_codec::{ContextCodec, ContextSerializer, JsonContextCodec};
pub use document::{CounterDocument, ExecutionDocument, ExecutionPatch, InstanceRow, Revision, StepDocument};
