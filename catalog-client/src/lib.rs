//! # Vehicle Catalog Client
//!
//! HTTP client layer for the remote vehicle catalog's GraphQL API.
//!
//! ## Components
//!
//! - **Query documents** (`queries`): GraphQL builders for the total count,
//!   lightweight id pages, and full single-listing detail
//! - **Wire types** (`types`): serde structs for the response shapes
//! - **Query client** (`client`): Basic auth, fixed timeout, bounded retry
//!   with exponential backoff
//! - **Connection validator** (`validator`): three-phase preflight check run
//!   before any import
//! - **Vehicle mapper** (`mapper`): the `RecordMapper` implementation that
//!   reduces a raw listing to a `CanonicalRecord`
//!
//! The actual HTTP transport is injected via `bridge_traits::HttpClient`,
//! so every component here is testable against a scripted transport.

pub mod client;
pub mod error;
pub mod mapper;
pub mod queries;
pub mod types;
pub mod validator;

pub use client::{ApiCredentials, ClientConfig, QueryClient};
pub use error::{CatalogError, Result};
pub use mapper::VehicleMapper;
pub use types::{ListingSummary, ListingsPage, PageMetadata};
pub use validator::{ConnectionValidator, ValidationPhase, ValidationReport};
