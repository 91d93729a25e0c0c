use thiserror::Error;

/// Engine error taxonomy.
///
/// `Persistence` failures are best-effort by contract: callers log them and
/// keep the in-memory counters. `Io` is fatal only for the first instance of
/// a given (client, worker) pair, where it aborts worker creation.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("configuration: {0}")]
    Configuration(String),

    #[error("persist i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker record persistence: {0}")]
    Persistence(String),
}
