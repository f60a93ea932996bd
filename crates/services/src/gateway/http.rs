use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use tracing::{debug, instrument};

use assess_core::model::RemoteTopicStat;

use super::StatsGateway;
use crate::config::GatewayConfig;
use crate::error::GatewayError;

/// `StatsGateway` over HTTP + JSON.
#[derive(Clone)]
pub struct HttpStatsGateway {
    client: Client,
    base_url: String,
}

impl HttpStatsGateway {
    /// Build a client for the configured service.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Transport` if the HTTP client cannot be built.
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url().as_str().trim_end_matches('/').to_owned(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

#[derive(Debug, Serialize)]
struct ScoreSubmission<'a> {
    topic: &'a str,
    score: u32,
}

fn transport(err: reqwest::Error) -> GatewayError {
    GatewayError::Transport(err.to_string())
}

async fn check_status(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return Err(GatewayError::Auth(format!("{status}: {body}")));
    }
    Err(GatewayError::HttpStatus {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl StatsGateway for HttpStatsGateway {
    #[instrument(skip_all)]
    async fn fetch_stats(&self, token: &str) -> Result<Vec<RemoteTopicStat>, GatewayError> {
        let response = self
            .client
            .get(self.url("stats"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport)?;
        let response = check_status(response).await?;
        let records: Vec<RemoteTopicStat> = response
            .json()
            .await
            .map_err(|err| GatewayError::Decode(err.to_string()))?;
        debug!(records = records.len(), "fetched remote stats");
        Ok(records)
    }

    #[instrument(skip(self, token))]
    async fn submit_score(&self, token: &str, topic: &str, score: u32) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(self.url("scores"))
            .bearer_auth(token)
            .json(&ScoreSubmission { topic, score })
            .send()
            .await
            .map_err(transport)?;
        check_status(response).await?;
        Ok(())
    }
}
