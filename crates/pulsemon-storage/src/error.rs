/// Errors produced by the storage layer.
///
/// Handlers rely on the variants to pick status codes: [`NotFound`] maps to
/// 404, [`MissingPayload`] to 400, everything else to 500.
///
/// [`NotFound`]: StorageError::NotFound
/// [`MissingPayload`]: StorageError::MissingPayload
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Lookup against a metric that was never written.
    #[error("metric {0:?} not found")]
    NotFound(String),

    /// A batch entry declared one kind but carried the other payload field
    /// (or none at all).
    #[error("metric {id:?} is missing its {field} payload")]
    MissingPayload { id: String, field: &'static str },

    /// Non-retriable database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A connection-class database error survived every retry attempt.
    #[error("database unavailable after retries: {0}")]
    RetriesExhausted(#[source] sqlx::Error),

    /// Startup migrations failed.
    #[error("migrations failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// File persistence failure.
    #[error("file persistence error: {0}")]
    Io(#[from] std::io::Error),

    /// A persistence record could not be encoded.
    #[error("persistence encoding error: {0}")]
    Json(#[from] serde_json::Error),

    /// Liveness probing is a database-backend capability.
    #[error("ping is only available on the database backend")]
    PingUnsupported,
}
