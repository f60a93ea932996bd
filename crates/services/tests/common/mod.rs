#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;
use tokio::sync::Semaphore;

use assess_core::model::{AssessmentResult, RemoteTopicStat, TopicKey, TopicStat, default_catalog};
use assess_core::time::fixed_now;
use services::{
    Clock, GatewayError, SessionLoopService, StaticContentCatalog, StaticProbe, StatsGateway,
    StatsSynchronizer, SyncConfig,
};
use storage::repository::{KeyValueStore, Storage, keys};
use storage::stats_cache::StatsCacheStore;

#[derive(Debug, Clone)]
pub enum FetchReply {
    Records(Vec<RemoteTopicStat>),
    Transport,
    Auth,
}

/// Scriptable gateway that records every call.
pub struct FakeGateway {
    fetch_reply: Mutex<FetchReply>,
    fail_submit: Mutex<Option<FetchReply>>,
    fetch_calls: AtomicUsize,
    submit_calls: AtomicUsize,
    tokens: Mutex<Vec<String>>,
    submitted: Mutex<Vec<(String, u32)>>,
    hold_fetch: AtomicBool,
    hold_submit: AtomicBool,
    fetch_gate: Semaphore,
    submit_gate: Semaphore,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            fetch_reply: Mutex::new(FetchReply::Records(Vec::new())),
            fail_submit: Mutex::new(None),
            fetch_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            tokens: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            hold_fetch: AtomicBool::new(false),
            hold_submit: AtomicBool::new(false),
            fetch_gate: Semaphore::new(0),
            submit_gate: Semaphore::new(0),
        }
    }
}

impl FakeGateway {
    pub fn reply_with(&self, reply: FetchReply) {
        *self.fetch_reply.lock().unwrap() = reply;
    }

    pub fn fail_submissions(&self, failure: Option<FetchReply>) {
        *self.fail_submit.lock().unwrap() = failure;
    }

    pub fn hold_fetches(&self) {
        self.hold_fetch.store(true, Ordering::SeqCst);
    }

    pub fn release_fetches(&self) {
        self.fetch_gate.add_permits(1);
    }

    pub fn hold_submissions(&self) {
        self.hold_submit.store(true, Ordering::SeqCst);
    }

    pub fn release_submissions(&self) {
        self.submit_gate.add_permits(1);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }

    pub fn submitted(&self) -> Vec<(String, u32)> {
        self.submitted.lock().unwrap().clone()
    }
}

fn to_error(reply: FetchReply) -> GatewayError {
    match reply {
        FetchReply::Auth => GatewayError::Auth("401 Unauthorized".into()),
        _ => GatewayError::Transport("connection reset".into()),
    }
}

#[async_trait]
impl StatsGateway for FakeGateway {
    async fn fetch_stats(&self, token: &str) -> Result<Vec<RemoteTopicStat>, GatewayError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.tokens.lock().unwrap().push(token.to_owned());
        if self.hold_fetch.load(Ordering::SeqCst) {
            let permit = self.fetch_gate.acquire().await.unwrap();
            permit.forget();
        }
        let reply = self.fetch_reply.lock().unwrap().clone();
        match reply {
            FetchReply::Records(records) => Ok(records),
            other => Err(to_error(other)),
        }
    }

    async fn submit_score(&self, token: &str, topic: &str, score: u32) -> Result<(), GatewayError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.tokens.lock().unwrap().push(token.to_owned());
        if self.hold_submit.load(Ordering::SeqCst) {
            let permit = self.submit_gate.acquire().await.unwrap();
            permit.forget();
        }
        let failure = self.fail_submit.lock().unwrap().clone();
        if let Some(failure) = failure {
            return Err(to_error(failure));
        }
        self.submitted.lock().unwrap().push((topic.to_owned(), score));
        Ok(())
    }
}

/// Synchronizer and session loop over in-memory collaborators.
pub struct Harness {
    pub storage: Storage,
    pub cache: StatsCacheStore,
    pub gateway: Arc<FakeGateway>,
    pub probe: Arc<StaticProbe>,
    pub clock: Clock,
    pub sync: StatsSynchronizer,
    pub sessions: SessionLoopService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_catalog(StaticContentCatalog::new())
    }

    pub fn with_catalog(catalog: StaticContentCatalog) -> Self {
        let storage = Storage::in_memory();
        let cache = StatsCacheStore::new(Arc::clone(&storage.kv));
        let gateway = Arc::new(FakeGateway::default());
        let probe = Arc::new(StaticProbe::new(true));
        let clock = Clock::manual(fixed_now());
        let sync = StatsSynchronizer::new(
            clock.clone(),
            SyncConfig::default(),
            cache.clone(),
            Arc::clone(&storage.kv),
            gateway.clone(),
            probe.clone(),
        );
        let sessions = SessionLoopService::new(
            clock.clone(),
            Arc::new(catalog),
            Arc::clone(&storage.kv),
            cache.clone(),
            gateway.clone(),
            sync.clone(),
        );
        Self {
            storage,
            cache,
            gateway,
            probe,
            clock,
            sync,
            sessions,
        }
    }

    pub fn advance_clock(&self, delta: Duration) {
        let mut clock = self.clock.clone();
        clock.advance(delta);
    }

    /// Write `stats` as if cached `age` ago.
    pub async fn seed_cache(&self, stats: &[TopicStat], age: Duration) {
        self.cache.write(stats, self.clock.now() - age).await.unwrap();
    }

    pub async fn set_token(&self, token: &str) {
        self.storage.kv.set_string(keys::AUTH_TOKEN, token).await.unwrap();
    }

    pub async fn cached_high_score(&self, topic: TopicKey) -> Option<u32> {
        let record = self.cache.read().await.unwrap().expect("cache present");
        record
            .stats
            .into_iter()
            .find(|stat| stat.topic_key == topic)
            .and_then(|stat| stat.highest_score)
    }
}

/// Catalog where every topic already has `score` as highest score and accuracy.
pub fn catalog_with_scores(score: u32) -> Vec<TopicStat> {
    default_catalog()
        .into_iter()
        .map(|stat| stat.with_scores(Some(score), Some(score)))
        .collect()
}

/// Result with the given percentage over 100 questions.
pub fn result_with_score(topic: TopicKey, score: u32) -> AssessmentResult {
    AssessmentResult::new(topic, score, 100, Duration::seconds(90))
}
