#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod connectivity;
pub mod content;
pub mod error;
pub mod gateway;
pub mod reconcile;
pub mod sessions;
pub mod stats_sync;

pub use assess_core::Clock;
pub use sessions as session;

pub use app_services::AppServices;
pub use config::{GatewayConfig, SyncConfig};
pub use connectivity::{ConnectivityProbe, StaticProbe, TcpConnectivityProbe};
pub use content::{ContentCatalog, StaticContentCatalog};
pub use error::{
    AppServicesError, ConfigError, GatewayError, SessionError, SubmissionError, SyncError,
};
pub use gateway::{HttpStatsGateway, StatsGateway};
pub use reconcile::ScoreReconciler;
pub use sessions::{AssessmentSession, SessionLoopService, SessionProgress, SessionState};
pub use stats_sync::StatsSynchronizer;
