#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to open database at {path}: {source}")]
    Open {
        path: std::path::PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("invalid stored value for column {column}: {detail}")]
    Decode { column: &'static str, detail: String },

    #[error("unique constraint violated: {0}")]
    Conflict(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
