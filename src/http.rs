//! Shared outbound HTTP client

use crate::errors::{Result, StatusError};
use reqwest::{Client, redirect};
use std::time::Duration;

/// Build the client used for token exchanges, API calls and probes.
///
/// Redirects are never followed: a probe must observe the status the
/// endpoint itself answered with.
pub fn build_client(connect_timeout: Duration, read_timeout: Duration) -> Result<Client> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .read_timeout(read_timeout)
        .redirect(redirect::Policy::none())
        .user_agent(format!("status_board/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(StatusError::Http)
}
