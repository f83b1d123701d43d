use bridge_traits::BridgeError;
use catalog_client::CatalogError;
use content_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("An import run is already in progress")]
    RunInProgress,

    #[error("Invalid run state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("ID collection failed: {0}")]
    Collection(String),

    #[error("Record data error: {0}")]
    Data(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Bridge failure: {0}")]
    Bridge(#[from] BridgeError),
}

impl SyncError {
    /// Machine-readable error kind for the operational surface.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RunInProgress | Self::InvalidTransition { .. } => "conflict",
            Self::Collection(_) => "protocol",
            Self::Data(_) => "data",
            Self::Catalog(e) => e.kind(),
            Self::Store(e) => e.kind(),
            Self::Bridge(e) if e.is_transport() => "connectivity",
            Self::Bridge(BridgeError::Storage(_)) => "persistence",
            Self::Bridge(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
