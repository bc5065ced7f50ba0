//! Canonicalización JSON y digest para el cálculo de `jobKey`.

pub mod canonical_json;

pub use canonical_json::{canonical_digest, to_canonical_json};
