//! Grid operator wind generation forecast feed
//!
//! Elexon BMRS publishes its national wind forecast as the WINDFOR dataset.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Deserialize;
use tracing::debug;

use crate::config::ComparatorConfig;
use crate::domain::ExternalForecastPoint;
use crate::error::{PipelineError, PipelineResult};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExternalForecastFeed: Send + Sync {
    /// Points published within `[publish_from, publish_to]`
    async fn fetch(
        &self,
        publish_from: DateTime<Utc>,
        publish_to: DateTime<Utc>,
    ) -> PipelineResult<Vec<ExternalForecastPoint>>;
}

#[derive(Debug, Deserialize)]
struct WindForResponse {
    #[serde(default)]
    data: Vec<WindForRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WindForRow {
    publish_time: DateTime<Utc>,
    start_time: DateTime<Utc>,
    generation: f64,
}

impl From<WindForRow> for ExternalForecastPoint {
    fn from(row: WindForRow) -> Self {
        Self {
            publish_time: row.publish_time,
            start_time: row.start_time,
            generation_mw: row.generation,
        }
    }
}

/// Elexon BMRS WINDFOR client with retry on transient failures
#[derive(Clone)]
pub struct ElexonWindForecastFeed {
    base_url: String,
    client: ClientWithMiddleware,
}

impl ElexonWindForecastFeed {
    pub fn new(cfg: &ComparatorConfig) -> PipelineResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("gb-wind-forecaster/0.2"));
        let inner = reqwest::Client::builder()
            .timeout(cfg.http_timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| PipelineError::Config(format!("http client: {}", e)))?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(cfg.max_retries);
        let client = ClientBuilder::new(inner)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, publish_from: DateTime<Utc>, publish_to: DateTime<Utc>) -> String {
        format!(
            "{}/datasets/WINDFOR?publishDateTimeFrom={}&publishDateTimeTo={}&format=json",
            self.base_url,
            publish_from.to_rfc3339_opts(SecondsFormat::Secs, true),
            publish_to.to_rfc3339_opts(SecondsFormat::Secs, true),
        )
    }
}

#[async_trait]
impl ExternalForecastFeed for ElexonWindForecastFeed {
    async fn fetch(
        &self,
        publish_from: DateTime<Utc>,
        publish_to: DateTime<Utc>,
    ) -> PipelineResult<Vec<ExternalForecastPoint>> {
        let url = self.url(publish_from, publish_to);
        debug!(%url, "fetching WINDFOR");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PipelineError::TransientFetch(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(PipelineError::ExternalFeedUnavailable(format!(
                "WINDFOR returned HTTP {}",
                resp.status()
            )));
        }

        let body: WindForResponse = resp.json().await.map_err(|e| {
            PipelineError::ExternalFeedUnavailable(format!("invalid WINDFOR payload: {}", e))
        })?;

        Ok(body.data.into_iter().map(ExternalForecastPoint::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn feed(server: &MockServer) -> ElexonWindForecastFeed {
        let cfg = ComparatorConfig {
            base_url: server.uri(),
            max_retries: 0,
            ..ComparatorConfig::default()
        };
        ElexonWindForecastFeed::new(&cfg).unwrap()
    }

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2025, 11, 5, 6, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 11, 5, 12, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_fetch_parses_points() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/datasets/WINDFOR"))
            .and(query_param("publishDateTimeFrom", "2025-11-05T06:00:00Z"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"publishTime": "2025-11-05T10:30:00Z", "startTime": "2025-11-05T12:00:00Z", "generation": 8400},
                    {"publishTime": "2025-11-05T10:30:00Z", "startTime": "2025-11-05T13:00:00Z", "generation": 8650.5}
                ]
            })))
            .mount(&server)
            .await;

        let (from, to) = window();
        let points = feed(&server).fetch(from, to).await.unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].generation_mw, 8400.0);
        assert_eq!(
            points[1].start_time,
            Utc.with_ymd_and_hms(2025, 11, 5, 13, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let (from, to) = window();
        let err = feed(&server).fetch(from, to).await.unwrap_err();
        assert_eq!(err.kind(), "ExternalFeedUnavailable");
    }

    #[tokio::test]
    async fn test_garbage_payload_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let (from, to) = window();
        let err = feed(&server).fetch(from, to).await.unwrap_err();
        assert_eq!(err.kind(), "ExternalFeedUnavailable");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transient() {
        let cfg = ComparatorConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            max_retries: 0,
            http_timeout_seconds: 2,
            ..ComparatorConfig::default()
        };
        let (from, to) = window();
        let err = ElexonWindForecastFeed::new(&cfg)
            .unwrap()
            .fetch(from, to)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "TransientFetch");
    }
}
