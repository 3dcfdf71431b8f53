//! Wires the monitor, the commit aggregator and the HTTP surface together

use crate::aggregator::CommitAggregator;
use crate::api::ApiClient;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::errors::Result;
use crate::http::build_client;
use crate::monitor::EndpointMonitor;
use crate::scheduler::ScheduledTask;
use crate::server;
use crate::state::AppState;
use crate::token::TokenManager;

use actix_web::{App, HttpServer, web};
use std::sync::Arc;
use tracing::{error, info, instrument};

pub struct Dashboard {
    config: Config,
    state: web::Data<AppState>,
}

impl Dashboard {
    /// Build every component from a validated configuration
    pub fn new(config: Config) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        config.ensure_valid()?;

        let client = build_client(config.connect_timeout, config.read_timeout)?;

        let monitor = Arc::new(EndpointMonitor::new(
            client.clone(),
            clock.clone(),
            config.endpoints.clone(),
        ));

        let aggregator = if config.repositories.is_empty() {
            info!("No repositories configured, commit aggregation disabled");
            None
        } else {
            let tokens = Arc::new(TokenManager::new(
                client.clone(),
                config.token_url.clone(),
                config.consumer_key.clone(),
                config.consumer_secret.clone(),
                clock,
            ));
            let api = ApiClient::new(
                client,
                config.api_base_url.clone(),
                config.account.clone(),
                tokens,
            );
            Some(Arc::new(CommitAggregator::new(
                Arc::new(api),
                config.repositories.clone(),
                config.repository_pause,
            )))
        };

        Ok(Self {
            config,
            state: web::Data::new(AppState { monitor, aggregator }),
        })
    }

    pub fn state(&self) -> web::Data<AppState> {
        self.state.clone()
    }

    /// Start both polling loops
    pub fn start_tasks(&self) -> Vec<ScheduledTask> {
        let mut tasks = Vec::new();

        let monitor = self.state.monitor.clone();
        tasks.push(ScheduledTask::start(
            "endpoint-monitor",
            self.config.monitor_interval,
            move || {
                let monitor = monitor.clone();
                async move { monitor.check_all().await }
            },
        ));

        if let Some(aggregator) = self.state.aggregator.clone() {
            tasks.push(ScheduledTask::start(
                "commit-aggregator",
                self.config.commit_poll_interval,
                move || {
                    let aggregator = aggregator.clone();
                    async move {
                        if let Err(e) = aggregator.run_cycle().await {
                            error!("Commit aggregation cycle failed: {}", e);
                        }
                    }
                },
            ));
        }

        tasks
    }

    /// Serve until the server exits, then stop the polling loops
    #[instrument(skip(self))]
    pub async fn run(&self, bind_address: &str) -> Result<()> {
        let tasks = self.start_tasks();
        let state = self.state.clone();

        info!("Serving status board on http://{}", bind_address);
        let served = match HttpServer::new(move || {
            App::new().app_data(state.clone()).configure(server::configure)
        })
        .bind(bind_address)
        {
            Ok(server) => server.run().await,
            Err(e) => Err(e),
        };

        info!("Shutting down status board");
        for task in tasks {
            task.stop().await;
        }

        served.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::EndpointConfig;
    use crate::errors::StatusError;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = Config::default();
        config.repositories = vec!["core".to_string()];

        assert!(matches!(Dashboard::new(config), Err(StatusError::Config(_))));
    }

    #[tokio::test]
    async fn test_without_repositories_only_monitor_runs() {
        let mut config = Config::default();
        config.endpoints = vec![EndpointConfig::new("Down", "http://127.0.0.1:1/", "", 200)];

        let dashboard = Dashboard::new(config).unwrap();
        assert!(dashboard.state().aggregator.is_none());

        let tasks = dashboard.start_tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name(), "endpoint-monitor");
        for task in tasks {
            task.stop().await;
        }
    }

    #[tokio::test]
    async fn test_loops_populate_shared_state() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "abc",
                "expires_in": 3600,
                "refresh_token": "r"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/2.0/repositories/iungo/core/commits"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pagelen": 1,
                "values": [{"hash": "h1", "date": "2024-03-04T09:00:00+00:00", "message": "m", "type": "commit"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/up"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut config = Config::default();
        config.account = "iungo".to_string();
        config.consumer_key = "key".to_string();
        config.consumer_secret = "secret".to_string();
        config.repositories = vec!["core".to_string()];
        config.token_url = format!("{}/token", server.uri());
        config.api_base_url = format!("{}/2.0", server.uri());
        config.repository_pause = Duration::ZERO;
        config.endpoints = vec![EndpointConfig::new("Up", &format!("{}/up", server.uri()), "", 200)];

        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap());
        let dashboard = Dashboard::with_clock(config, Arc::new(clock)).unwrap();
        let state = dashboard.state();
        let tasks = dashboard.start_tasks();

        let aggregator = state.aggregator.clone().unwrap();
        let mut ready = false;
        for _ in 0..100 {
            let online = state.monitor.endpoints().await[0].online;
            if online && aggregator.matrix().await.is_some() {
                ready = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        for task in tasks {
            task.stop().await;
        }

        assert!(ready);
        assert_eq!(aggregator.matrix().await.unwrap().total(), 1);
    }
}
