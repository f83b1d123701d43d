use crate::validator::ValidationPhase;
use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("API credentials are not configured")]
    MissingCredentials,

    #[error("API credentials are empty")]
    EmptyCredentials,

    #[error("Transport failure after {attempts} attempt(s): {source}")]
    Transport { attempts: u32, source: BridgeError },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Malformed API response: {0}")]
    Malformed(String),

    #[error("Query rejected by the API: {0}")]
    Query(String),

    #[error("Listing {0} not found in the remote catalog")]
    ListingNotFound(String),

    #[error("Validation failed at the {phase} phase: {message}")]
    Validation {
        phase: ValidationPhase,
        message: String,
    },

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl CatalogError {
    /// Machine-readable error kind, stable across message wording changes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredentials | Self::EmptyCredentials => "config",
            Self::Transport { .. } => "connectivity",
            Self::Http { .. } | Self::Malformed(_) | Self::Query(_) => "protocol",
            Self::ListingNotFound(_) => "not_found",
            Self::Validation { phase, .. } => match phase {
                ValidationPhase::Credentials => "config",
                ValidationPhase::Endpoint => "connectivity",
                ValidationPhase::FunctionalQuery => "protocol",
            },
            Self::Bridge(e) if e.is_transport() => "connectivity",
            Self::Bridge(_) => "protocol",
        }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
