//! Utility modules: usage aggregation, timeouts.

pub mod timeout;
pub mod usage;

pub use timeout::{with_optional_timeout, with_timeout};
pub use usage::{AgentUsage, UsageAggregator};
