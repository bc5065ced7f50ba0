//! Secuencias de ids respaldadas por un documento contador.

use std::sync::Arc;

use log::{debug, error};

use crate::errors::RepositoryError;
use crate::store::CounterCollection;

/// Contador monotónico con nombre. Cada `next_value` es un único
/// incremento-y-lectura atómico en el backend, por lo que varias instancias
/// (en uno o varios procesos) pueden compartir el mismo contador.
#[derive(Debug)]
pub struct SequenceCounter<K>
    where K: CounterCollection
{
    name: String,
    collection: Arc<K>,
}

impl<K> SequenceCounter<K> where K: CounterCollection
{
    /// Provisiona el índice único y crea el contador en 0 sólo si no existe.
    pub fn new(collection: Arc<K>, name: impl Into<String>) -> Result<Self, RepositoryError> {
        let name = name.into();
        collection.ensure_indexes()?;
        collection.init_counter(&name)?;
        debug!("sequence:init name={name}");
        Ok(Self { name, collection })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Siguiente valor. Si el documento fue borrado por fuera no se recrea:
    /// reiniciar en 0 duplicaría ids ya emitidos.
    pub fn next_value(&self) -> Result<i64, RepositoryError> {
        match self.collection.increment(&self.name)? {
            Some(value) => Ok(value),
            None => {
                error!("sequence:missing name={} (counter document removed out-of-band)", self.name);
                Err(RepositoryError::CounterMissing(self.name.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryCounterCollection;

    #[test]
    fn construction_does_not_reset_existing_counter() {
        let coll = Arc::new(InMemoryCounterCollection::new());
        let a = SequenceCounter::new(coll.clone(), "jobExecutionId").unwrap();
        assert_eq!(a.next_value().unwrap(), 1);
        assert_eq!(a.next_value().unwrap(), 2);
        let b = SequenceCounter::new(coll, "jobExecutionId").unwrap();
        assert_eq!(b.next_value().unwrap(), 3);
    }

    #[test]
    fn independent_names() {
        let coll = Arc::new(InMemoryCounterCollection::new());
        let a = SequenceCounter::new(coll.clone(), "a").unwrap();
        let b = SequenceCounter::new(coll, "b").unwrap();
        assert_eq!(a.next_value().unwrap(), 1);
        assert_eq!(a.next_value().unwrap(), 2);
        assert_eq!(b.next_value().unwrap(), 1);
    }

    #[test]
    fn removed_counter_is_fatal() {
        let coll = Arc::new(InMemoryCounterCollection::new());
        let seq = SequenceCounter::new(coll.clone(), "stepExecutionId").unwrap();
        seq.next_value().unwrap();
        coll.remove_counter("stepExecutionId");
        let err = seq.next_value().unwrap_err();
        assert!(matches!(err, RepositoryError::CounterMissing(ref n) if n == "stepExecutionId"));
        assert!(!err.is_retryable());
    }
}
