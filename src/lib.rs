//! Status board
//!
//! Periodically probes a fixed set of HTTP endpoints for availability and
//! aggregates repository commit history into a day-of-week by hour-of-day
//! matrix, both exposed through a small read-only HTTP API.

pub mod aggregator;
pub mod api;
pub mod clock;
pub mod config;
pub mod dashboard;
pub mod errors;
pub mod http;
pub mod monitor;
pub mod scheduler;
pub mod server;
pub mod state;
pub mod token;

pub use aggregator::{CommitAggregator, CommitMatrix};
pub use api::{ApiClient, Commit, CommitSource, Page};
pub use config::{Config, EndpointConfig};
pub use dashboard::Dashboard;
pub use errors::{Result, StatusError};
pub use monitor::{EndpointMonitor, MonitoredEndpoint};
pub use token::TokenManager;
