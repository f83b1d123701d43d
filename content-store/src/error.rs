use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Database(_) | Self::Serialization(_) => "persistence",
            Self::NotFound { .. } => "not_found",
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Database(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
