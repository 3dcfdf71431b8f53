//! Liveness probing of a fixed list of HTTP endpoints

use crate::clock::Clock;
use crate::config::EndpointConfig;
use crate::errors::Result;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// Latest observation of one endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitoredEndpoint {
    pub url: String,
    pub title: String,
    pub description: String,
    pub expected_status: u16,
    pub checked: Option<DateTime<Utc>>,
    pub online: bool,
    /// Empty when online, otherwise why the endpoint is considered offline
    pub status: String,
}

impl From<EndpointConfig> for MonitoredEndpoint {
    fn from(config: EndpointConfig) -> Self {
        Self {
            url: config.url,
            title: config.title,
            description: config.description,
            expected_status: config.expected_status,
            checked: None,
            online: false,
            status: String::new(),
        }
    }
}

/// What the dashboard shows for an endpoint
#[derive(Debug, Clone, Serialize)]
pub struct EndpointView {
    pub title: String,
    pub description: String,
    pub online: bool,
    pub status: String,
    pub checked: Option<DateTime<Utc>>,
    pub checked_pretty: String,
}

pub struct EndpointMonitor {
    client: Client,
    clock: Arc<dyn Clock>,
    endpoints: RwLock<Vec<MonitoredEndpoint>>,
}

impl EndpointMonitor {
    pub fn new(client: Client, clock: Arc<dyn Clock>, endpoints: Vec<EndpointConfig>) -> Self {
        Self {
            client,
            clock,
            endpoints: RwLock::new(endpoints.into_iter().map(MonitoredEndpoint::from).collect()),
        }
    }

    /// Probe every endpoint once and record the outcome
    #[instrument(skip(self))]
    pub async fn check_all(&self) {
        let targets: Vec<(String, u16)> = {
            let endpoints = self.endpoints.read().await;
            endpoints
                .iter()
                .map(|e| (e.url.clone(), e.expected_status))
                .collect()
        };

        let mut online_count = 0;
        for (index, (url, expected)) in targets.iter().enumerate() {
            let (online, status) = match self.probe(url).await {
                Ok(code) if code == *expected => (true, String::new()),
                Ok(code) => (false, format!("unexpected status {} (expected {})", code, expected)),
                Err(e) => (false, e.to_string()),
            };

            if online {
                online_count += 1;
            } else {
                warn!("Endpoint {} is offline: {}", url, status);
            }

            let checked = self.clock.now();
            let mut endpoints = self.endpoints.write().await;
            if let Some(endpoint) = endpoints.get_mut(index) {
                endpoint.online = online;
                endpoint.status = status;
                endpoint.checked = Some(checked);
            }
        }

        info!("Checked {} endpoints, {} online", targets.len(), online_count);
    }

    async fn probe(&self, url: &str) -> Result<u16> {
        let response = self.client.get(url).send().await?;
        let code = response.status().as_u16();
        debug!("Checking {} > {}", url, code);
        Ok(code)
    }

    /// Snapshot of the latest observations
    pub async fn endpoints(&self) -> Vec<MonitoredEndpoint> {
        self.endpoints.read().await.clone()
    }

    pub async fn views(&self) -> Vec<EndpointView> {
        let now = self.clock.now();
        self.endpoints
            .read()
            .await
            .iter()
            .map(|e| EndpointView {
                title: e.title.clone(),
                description: e.description.clone(),
                online: e.online,
                status: e.status.clone(),
                checked: e.checked,
                checked_pretty: relative_time(e.checked, now),
            })
            .collect()
    }
}

/// Human readable distance from `checked` to `now`
pub fn relative_time(checked: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(checked) = checked else {
        return "never".to_string();
    };

    let elapsed = now - checked;
    let (amount, unit) = if elapsed.num_minutes() < 1 {
        return "just now".to_string();
    } else if elapsed.num_hours() < 1 {
        (elapsed.num_minutes(), "minute")
    } else if elapsed.num_days() < 1 {
        (elapsed.num_hours(), "hour")
    } else {
        (elapsed.num_days(), "day")
    };

    if amount == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", amount, unit)
    }
}
