#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A required insert field was empty or absent.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("database file setup failed: {0}")]
    Io(std::io::Error),
}
