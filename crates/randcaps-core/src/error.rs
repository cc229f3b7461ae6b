use thiserror::Error;

#[derive(Error, Debug)]
pub enum RandCapsError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Corpus query failed: {0}")]
    StoreQueryFailed(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Sync failed: {0}")]
    Sync(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RandCapsError {
    /// Fatal errors end the session loop; everything else is contained to
    /// the event or sync round that raised it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RandCapsError::Config(_) | RandCapsError::Authentication(_)
        )
    }
}
