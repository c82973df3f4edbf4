//! Path resolution and aggregation
//!
//! - `matchers` - pure path-shape detection
//! - `resolver` - raw request path → canonical path + language prefix
//! - `aggregate` - variant-set sums with TTL caching

pub mod aggregate;
pub mod matchers;
pub mod resolver;

pub use aggregate::{AggregationCache, CacheMode, ALL_PATHS};
pub use resolver::{PathResolver, ResolvedPath};
