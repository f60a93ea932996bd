mod common;

use chrono::Duration;

use assess_core::model::{SubmissionState, TopicKey};
use common::{FetchReply, Harness, catalog_with_scores, result_with_score};
use services::SubmissionError;

async fn seeded(score: u32) -> Harness {
    let h = Harness::new();
    h.set_token("tok-1").await;
    h.seed_cache(&catalog_with_scores(score), Duration::minutes(1)).await;
    assert!(h.sync.load().await.is_none());
    h
}

#[tokio::test]
async fn regression_keeps_cached_high_score() {
    let h = seeded(90).await;
    let r = h.sessions.reconciler(result_with_score(TopicKey::Monophthongs, 75));
    assert_eq!(r.previous_high_score(), 90);
    assert_eq!(r.improvement(), -15);
    assert!(!r.is_improvement());

    assert_eq!(r.submit().await.unwrap(), SubmissionState::Success);
    assert_eq!(h.gateway.submitted(), vec![("Monophthongs".to_owned(), 75)]);
    assert_eq!(h.cached_high_score(TopicKey::Monophthongs).await, Some(90));
    assert_eq!(
        h.sync.snapshot().topic(TopicKey::Monophthongs).unwrap().highest_score,
        Some(90)
    );
}

#[tokio::test]
async fn improvement_raises_cache_and_snapshot() {
    let h = seeded(60).await;
    let r = h.sessions.reconciler(result_with_score(TopicKey::WordStress, 85));
    assert_eq!(r.improvement(), 25);

    assert_eq!(r.submit().await.unwrap(), SubmissionState::Success);
    assert_eq!(h.gateway.submitted(), vec![("Word Stress".to_owned(), 85)]);
    assert_eq!(h.cached_high_score(TopicKey::WordStress).await, Some(85));
    assert_eq!(h.cached_high_score(TopicKey::Intonation).await, Some(60));
    let snap = h.sync.snapshot();
    assert_eq!(snap.topic(TopicKey::WordStress).unwrap().highest_score, Some(85));
    assert_eq!(snap.last_updated_at, Some(h.clock.now()));
}

#[tokio::test]
async fn cached_high_score_is_monotonic() {
    let h = seeded(50).await;
    let mut best = 50;
    for score in [40, 70, 65, 90, 20, 90] {
        let r = h.sessions.reconciler(result_with_score(TopicKey::Consonants, score));
        assert_eq!(r.submit().await.unwrap(), SubmissionState::Success);
        best = best.max(score);
        assert_eq!(h.cached_high_score(TopicKey::Consonants).await, Some(best));
    }
    assert_eq!(h.gateway.submit_calls(), 6);
}

#[tokio::test]
async fn concurrent_submits_reach_gateway_once() {
    let h = seeded(50).await;
    h.gateway.hold_submissions();
    let r = h.sessions.reconciler(result_with_score(TopicKey::Triphthongs, 70));

    let first = tokio::spawn({
        let r = r.clone();
        async move { r.submit().await }
    });
    r.subscribe()
        .wait_for(|state| *state == SubmissionState::Submitting)
        .await
        .unwrap();
    assert_eq!(r.submit().await.unwrap(), SubmissionState::Submitting);

    h.gateway.release_submissions();
    assert_eq!(first.await.unwrap().unwrap(), SubmissionState::Success);
    assert_eq!(h.gateway.submit_calls(), 1);

    assert_eq!(r.submit().await.unwrap(), SubmissionState::Success);
    assert_eq!(r.retry().await.unwrap(), SubmissionState::Success);
    assert_eq!(h.gateway.submit_calls(), 1);
}

#[tokio::test]
async fn missing_token_fails_without_contacting_gateway() {
    let h = Harness::new();
    h.seed_cache(&catalog_with_scores(10), Duration::minutes(1)).await;
    let r = h.sessions.reconciler(result_with_score(TopicKey::Intonation, 80));

    let err = r.submit().await.unwrap_err();
    assert!(matches!(err, SubmissionError::MissingToken));
    assert!(err.requires_reauth());
    assert_eq!(r.state(), SubmissionState::Error);
    assert_eq!(h.gateway.submit_calls(), 0);
    assert_eq!(h.cached_high_score(TopicKey::Intonation).await, Some(10));
}

#[tokio::test]
async fn blank_token_counts_as_missing() {
    let h = seeded(10).await;
    h.set_token("   ").await;
    let r = h.sessions.reconciler(result_with_score(TopicKey::Intonation, 80));
    assert!(matches!(r.submit().await, Err(SubmissionError::MissingToken)));
}

#[tokio::test]
async fn rejected_token_requires_reauth() {
    let h = seeded(10).await;
    h.gateway.fail_submissions(Some(FetchReply::Auth));
    let r = h.sessions.reconciler(result_with_score(TopicKey::Diphthongs, 80));

    let err = r.submit().await.unwrap_err();
    assert!(err.requires_reauth());
    assert_eq!(r.state(), SubmissionState::Error);
}

#[tokio::test]
async fn failed_submission_leaves_cache_and_can_be_retried() {
    let h = seeded(40).await;
    h.gateway.fail_submissions(Some(FetchReply::Transport));
    let r = h.sessions.reconciler(result_with_score(TopicKey::SentenceStress, 95));

    let err = r.submit().await.unwrap_err();
    assert!(!err.requires_reauth());
    assert_eq!(r.state(), SubmissionState::Error);
    assert_eq!(h.cached_high_score(TopicKey::SentenceStress).await, Some(40));

    // A plain submit does not leave Error.
    assert_eq!(r.submit().await.unwrap(), SubmissionState::Error);
    assert_eq!(h.gateway.submit_calls(), 1);

    h.gateway.fail_submissions(None);
    assert_eq!(r.retry().await.unwrap(), SubmissionState::Success);
    assert_eq!(h.gateway.submit_calls(), 2);
    assert_eq!(h.cached_high_score(TopicKey::SentenceStress).await, Some(95));
}

#[tokio::test]
async fn retry_from_idle_does_nothing() {
    let h = seeded(40).await;
    let r = h.sessions.reconciler(result_with_score(TopicKey::SentenceStress, 95));
    assert_eq!(r.retry().await.unwrap(), SubmissionState::Idle);
    assert_eq!(h.gateway.submit_calls(), 0);
}

#[tokio::test]
async fn success_without_cache_skips_local_update() {
    let h = Harness::new();
    h.set_token("tok-1").await;
    let r = h.sessions.reconciler(result_with_score(TopicKey::Monophthongs, 70));
    assert_eq!(r.previous_high_score(), 0);

    assert_eq!(r.submit().await.unwrap(), SubmissionState::Success);
    assert!(h.cache.read().await.unwrap().is_none());
    assert_eq!(h.sync.snapshot().data, Vec::new());
}

#[tokio::test]
async fn background_submission_finishes_before_drain_returns() {
    let h = seeded(20).await;
    h.gateway.hold_submissions();
    let r = h.sessions.submit_result(result_with_score(TopicKey::Monophthongs, 65));
    drop(r.clone());

    h.gateway.release_submissions();
    h.sessions.drain().await;
    assert_eq!(r.state(), SubmissionState::Success);
    assert_eq!(r.wait_finished().await, SubmissionState::Success);
    assert_eq!(h.cached_high_score(TopicKey::Monophthongs).await, Some(65));
}
