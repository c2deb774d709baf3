use thiserror::Error;

/// Errors surfaced to producers by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The operation referenced a task id the registry has never seen,
    /// or one that was already removed by a clear.
    #[error("task not found: {id}")]
    NotFound { id: String },
}
