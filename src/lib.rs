//! Pageview counter
//!
//! Mirrors per-path pageview statistics from a rate-limited, paginated
//! analytics API into SQLite, and answers "how many views does this path
//! have?" for any spelling of a page: aliases, redirects, language
//! prefixes and front-page equivalents all count as one unit.

pub mod config;
pub mod counter;
pub mod error;
pub mod hashing;
pub mod resolve;
pub mod service;
pub mod status;
pub mod store;
pub mod sync;

pub use config::CounterConfig;
pub use counter::PageviewCounter;
pub use error::{CounterError, CounterResult};
pub use service::{reset_sync_state, run_scheduler, CounterService, CycleReport};
pub use status::StatusReport;
pub use store::SqliteStore;
