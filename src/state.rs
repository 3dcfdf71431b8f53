use std::sync::Arc;

use crate::aggregator::CommitAggregator;
use crate::monitor::EndpointMonitor;

/// Components shared between the background loops and the HTTP handlers
pub struct AppState {
    pub monitor: Arc<EndpointMonitor>,
    /// Absent when no repositories are configured
    pub aggregator: Option<Arc<CommitAggregator>>,
}
