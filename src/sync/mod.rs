//! Remote data synchronization
//!
//! - `quota` - daily call budget
//! - `cursor` - resumable chunk position
//! - `source` - remote analytics interface
//! - `ga_client` - HTTP implementation of the source
//! - `engine` - one page per cycle into `pageviews`
//! - `mirror` - one chunk of items per cycle into `node_counts`

pub mod cursor;
pub mod engine;
pub mod ga_client;
pub mod mirror;
pub mod quota;
pub mod source;

pub use cursor::Cursor;
pub use engine::{PaginatedSyncEngine, SyncOutcome};
pub use ga_client::GaReportingClient;
pub use mirror::{MirrorOutcome, NodeCounterMirror};
pub use quota::{QuotaTracker, QuotaWindow};
pub use source::{AnalyticsSource, Lookback, RemoteError, ReportPage, ReportRequest};
