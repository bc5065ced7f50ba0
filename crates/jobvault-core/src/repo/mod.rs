//! Repositorio de ejecuciones: escritura (`ExecutionStore`) y lectura
//! (`HistoryReader`) sobre un mismo backend.

pub mod execution_store;
pub mod history;

pub use execution_store::ExecutionStore;
pub use history::HistoryReader;
