//! Readiness-gated answer generation.
//!
//! The generation backend indexes the staged corpus asynchronously, so a
//! generation request is only issued after its statistics endpoint reports
//! healthy. The wait is bounded: probes run on a fixed interval up to a
//! wall-clock ceiling, after which generation fails terminally without being
//! attempted. Exactly one generation request is issued per query run.

use std::time::Instant;

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, instrument};

use tdocgraph_shared::{GenerationConfig, Result, TdocGraphError};

/// User-Agent string for backend requests.
const USER_AGENT: &str = concat!("tdocgraph/", env!("CARGO_PKG_VERSION"));

/// Generation request body.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    query: &'a str,
    max_tokens: u32,
    num_docs: u32,
}

/// Client for the answer-generation backend.
pub struct GenerationClient {
    client: Client,
    config: GenerationConfig,
}

impl GenerationClient {
    /// Create a new client from the generation config.
    pub fn new(config: GenerationConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TdocGraphError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Probe the readiness endpoint once.
    pub async fn probe(&self) -> bool {
        match self
            .client
            .get(&self.config.stats_url)
            .timeout(self.config.probe_timeout())
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                debug!(status = %resp.status(), "backend not ready");
                false
            }
            Err(e) => {
                debug!(error = %e, "readiness probe failed");
                false
            }
        }
    }

    /// Poll the readiness endpoint until it reports success or the wait
    /// ceiling elapses.
    ///
    /// Probe transport errors are retried, not propagated; only the ceiling
    /// produces an error, at or shortly after the configured timeout.
    #[instrument(skip_all, fields(stats_url = %self.config.stats_url))]
    pub async fn await_ready(&self) -> Result<()> {
        let start = Instant::now();
        let ceiling = self.config.readiness_timeout();

        loop {
            if self.probe().await {
                info!(
                    waited_ms = start.elapsed().as_millis(),
                    "generation backend ready"
                );
                return Ok(());
            }

            if start.elapsed() >= ceiling {
                return Err(TdocGraphError::ServiceNotReady {
                    waited_secs: start.elapsed().as_secs(),
                });
            }

            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }

    /// Issue one generation request over the staged corpus.
    ///
    /// Returns the backend's JSON answer payload. Non-success responses and
    /// transport failures become [`TdocGraphError::Generation`]; callers
    /// surface the message instead of propagating it upward.
    #[instrument(skip_all, fields(generate_url = %self.config.generate_url))]
    pub async fn generate(&self, query: &str) -> Result<serde_json::Value> {
        let body = GenerateRequest {
            query,
            max_tokens: self.config.max_tokens,
            num_docs: self.config.num_docs,
        };

        let response = self
            .client
            .post(&self.config.generate_url)
            .timeout(self.config.request_timeout())
            .json(&body)
            .send()
            .await
            .map_err(|e| TdocGraphError::Generation(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TdocGraphError::Generation(format!("HTTP {status}")));
        }

        let payload = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| TdocGraphError::Generation(format!("invalid answer payload: {e}")))?;

        info!("answer generated");
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    fn test_config(server_uri: &str) -> GenerationConfig {
        GenerationConfig {
            generate_url: format!("{server_uri}/generate"),
            stats_url: format!("{server_uri}/v1/statistics"),
            max_tokens: 5000,
            num_docs: 10,
            poll_interval_secs: 0,
            readiness_timeout_secs: 0,
            probe_timeout_secs: 2,
            request_timeout_secs: 5,
        }
    }

    async fn mock_stats(server: &wiremock::MockServer, status: u16) {
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/v1/statistics"))
            .respond_with(wiremock::ResponseTemplate::new(status))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn probe_reports_backend_state() {
        let server = wiremock::MockServer::start().await;
        mock_stats(&server, 200).await;

        let client = GenerationClient::new(test_config(&server.uri())).unwrap();
        assert!(client.probe().await);
    }

    #[tokio::test]
    async fn probe_treats_non_success_as_not_ready() {
        let server = wiremock::MockServer::start().await;
        mock_stats(&server, 503).await;

        let client = GenerationClient::new(test_config(&server.uri())).unwrap();
        assert!(!client.probe().await);
    }

    #[tokio::test]
    async fn await_ready_times_out_at_the_ceiling() {
        let server = wiremock::MockServer::start().await;
        mock_stats(&server, 500).await;

        // Zero-second ceiling: the first failed probe trips the deadline.
        let client = GenerationClient::new(test_config(&server.uri())).unwrap();
        let started = Instant::now();
        let err = client.await_ready().await.unwrap_err();

        assert!(matches!(err, TdocGraphError::ServiceNotReady { .. }));
        // Bounded slack: no extra poll interval is slept after the deadline.
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn await_ready_never_fails_before_the_ceiling() {
        let server = wiremock::MockServer::start().await;
        mock_stats(&server, 500).await;

        let mut config = test_config(&server.uri());
        config.readiness_timeout_secs = 1;

        let client = GenerationClient::new(config).unwrap();
        let started = Instant::now();
        let err = client.await_ready().await.unwrap_err();

        assert!(matches!(err, TdocGraphError::ServiceNotReady { .. }));
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn await_ready_recovers_when_backend_comes_up() {
        let server = wiremock::MockServer::start().await;

        // First two probes fail, then the backend reports healthy.
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/v1/statistics"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        mock_stats(&server, 200).await;

        let mut config = test_config(&server.uri());
        config.readiness_timeout_secs = 30;

        let client = GenerationClient::new(config).unwrap();
        client.await_ready().await.unwrap();
    }

    #[tokio::test]
    async fn generate_posts_query_and_parameters_once() {
        let server = wiremock::MockServer::start().await;
        let answer = serde_json::json!({"answer": "CSI enhancements were agreed."});

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/generate"))
            .and(wiremock::matchers::body_json(serde_json::json!({
                "query": "CSI enhancement",
                "max_tokens": 5000,
                "num_docs": 10,
            })))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(answer.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let client = GenerationClient::new(test_config(&server.uri())).unwrap();
        let payload = client.generate("CSI enhancement").await.unwrap();
        assert_eq!(payload, answer);
    }

    #[tokio::test]
    async fn generation_failure_is_surfaced_not_raised() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/generate"))
            .respond_with(wiremock::ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = GenerationClient::new(test_config(&server.uri())).unwrap();
        let err = client.generate("anything").await.unwrap_err();
        assert!(matches!(err, TdocGraphError::Generation(_)));
        assert!(err.to_string().contains("500"));
    }
}
