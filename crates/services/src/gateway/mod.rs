//! Remote stats service contract.

mod http;

use async_trait::async_trait;

use assess_core::model::RemoteTopicStat;

use crate::error::GatewayError;

pub use http::HttpStatsGateway;

/// Authoritative source of per-topic stats.
#[async_trait]
pub trait StatsGateway: Send + Sync {
    /// Fetch every stats record the remote side holds for the user.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` on transport, auth, status or decoding failures.
    async fn fetch_stats(&self, token: &str) -> Result<Vec<RemoteTopicStat>, GatewayError>;

    /// Submit a finished attempt's score under the remote topic name.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` if the submission is not acknowledged.
    async fn submit_score(&self, token: &str, topic: &str, score: u32) -> Result<(), GatewayError>;
}
