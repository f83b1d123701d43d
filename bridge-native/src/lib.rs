//! # Native Host Bridges
//!
//! Concrete bridge implementations for hosts running the sync engine in a
//! long-lived native process:
//!
//! - [`ReqwestHttpClient`](http::ReqwestHttpClient) - `HttpClient` over
//!   reqwest with transport-cause classification
//! - [`TokioScheduler`](scheduler::TokioScheduler) - in-process one-shot
//!   job scheduler delivering due jobs onto a channel
//! - [`init_logging`](logging::init_logging) - tracing-subscriber setup
//!
//! The durable `KvStore` implementation lives in `content-store` next to
//! the rest of the SQLite persistence.

pub mod http;
pub mod logging;
pub mod scheduler;

pub use http::ReqwestHttpClient;
pub use logging::init_logging;
pub use scheduler::TokioScheduler;
