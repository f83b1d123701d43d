//! # Host Bridge Traits
//!
//! Abstraction traits for every external collaborator the sync engine
//! depends on. Each trait represents a capability the core requires but
//! that hosts provide differently (a CMS-embedded deployment, a standalone
//! daemon, an in-memory test harness).
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP execution with TLS and
//!   transport-cause error classification
//!
//! ### Durable State
//! - [`KvStore`](kv::KvStore) - Key-value persistence with TTL; backs all
//!   cross-tick sync state
//!
//! ### Scheduling
//! - [`Scheduler`](schedule::Scheduler) - One-shot deferred job dispatch
//!   used for tick self-continuation
//!
//! ### Mapping
//! - [`RecordMapper`](catalog::RecordMapper) - Pluggable remote-record to
//!   [`CanonicalRecord`](catalog::CanonicalRecord) mapping
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Transport
//! failures are split by cause (timeout / connect / DNS / TLS) because the
//! connection validator reports them distinctly.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent
//! usage across async tasks.

pub mod catalog;
pub mod error;
pub mod http;
pub mod kv;
pub mod schedule;

pub use error::BridgeError;

// Re-export commonly used types
pub use catalog::{
    CanonicalRecord, MediaCandidate, MediaFormatUrls, RecordMapper, TaxonomyAssignment,
    VolatilityField,
};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use kv::{KvStore, KvStoreExt, MemoryKvStore};
pub use schedule::{ScheduledJob, Scheduler};
