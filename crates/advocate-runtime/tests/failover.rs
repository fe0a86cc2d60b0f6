//! Failover, cooldown and caching behaviour of the orchestrator.

mod common;

use std::time::Duration;

use advocate_core::{Priority, TalkingPointCategory};
use advocate_runtime::{FailureClass, RuntimeConfig, RuntimeError};
use common::*;

#[tokio::test(start_paused = true)]
async fn test_rate_limited_backend_is_skipped_and_result_cached() {
    let primary = ScriptedProvider::new("primary", Step::Fail { status: 429, message: "Rate limit reached" });
    let secondary = ScriptedProvider::new("secondary", Step::Reply(QUESTIONS_JSON));

    // Registered out of preference order on purpose
    let orchestrator = orchestrator(vec![
        ScriptedFactory::new("gemini", secondary.clone()),
        ScriptedFactory::new("openai", primary.clone()),
    ]);

    let questions = orchestrator
        .generate_questions("fatigue", "general", "")
        .await
        .unwrap();

    assert_eq!(questions.len(), 2);
    assert_eq!(questions[0].priority, Priority::High);
    assert_eq!(primary.calls(), 1);
    assert_eq!(secondary.calls(), 1);

    let status = orchestrator.status();
    assert_eq!(status.order, vec!["openai", "gemini"]);
    let openai = &status.backends[0];
    assert!(!openai.available);
    assert_eq!(openai.consecutive_failures, 1);
    assert_eq!(openai.last_failure_class, Some(FailureClass::RateLimited));
    assert!(openai.cooldown_until.unwrap() > chrono::Utc::now() + chrono::Duration::minutes(59));
    assert!(status.backends[1].available);

    // Identical request: served from cache
    let again = orchestrator
        .generate_questions("fatigue", "general", "")
        .await
        .unwrap();
    assert_eq!(again, questions);
    assert_eq!(primary.calls(), 1);
    assert_eq!(secondary.calls(), 1);
    assert_eq!(orchestrator.cached_entries().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_excludes_backend_until_cooldown_elapses() {
    let primary = ScriptedProvider::new("primary", Step::Reply(QUESTIONS_JSON)).then(Step::RateLimited);
    let secondary = ScriptedProvider::new("secondary", Step::Reply(QUESTIONS_JSON));

    let orchestrator = orchestrator(vec![
        ScriptedFactory::new("openai", primary.clone()),
        ScriptedFactory::new("gemini", secondary.clone()),
    ]);

    orchestrator.generate_questions("headache", "", "").await.unwrap();
    assert_eq!((primary.calls(), secondary.calls()), (1, 1));

    // Distinct requests keep skipping the rate-limited backend
    tokio::time::advance(Duration::from_secs(30 * 60)).await;
    orchestrator.generate_questions("nausea", "", "").await.unwrap();
    assert_eq!((primary.calls(), secondary.calls()), (1, 2));

    tokio::time::advance(Duration::from_secs(30 * 60)).await;
    orchestrator.generate_questions("dizziness", "", "").await.unwrap();
    assert_eq!((primary.calls(), secondary.calls()), (2, 2));

    let status = orchestrator.status();
    assert!(status.backends[0].available);
    assert_eq!(status.backends[0].consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_fails_over_within_the_same_call() {
    const SECONDARY_POINTS_JSON: &str = r#"{"talkingPoints":[
        {"point":"Please note my concern in the chart.","category":"Preventing Dismissal",
         "context":"Keeps a record","whenToUse":"If the doctor dismisses it"}
    ]}"#;

    let primary = ScriptedProvider::new("primary", Step::Reply(TALKING_POINTS_JSON))
        .then(Step::Fail { status: 500, message: "internal error" });
    let secondary = ScriptedProvider::new("secondary", Step::Reply(SECONDARY_POINTS_JSON));

    let orchestrator = orchestrator(vec![
        ScriptedFactory::new("openai", primary.clone()),
        ScriptedFactory::new("gemini", secondary.clone()),
    ]);

    let points = orchestrator
        .generate_talking_points("chest pain", "being dismissed")
        .await
        .unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].point, "Please note my concern in the chart.");
    assert_eq!(points[0].category, TalkingPointCategory::PreventingDismissal);
    assert_eq!(points[0].when_to_use, "If the doctor dismisses it");
    assert_eq!((primary.calls(), secondary.calls()), (1, 1));

    let status = orchestrator.status();
    let openai = &status.backends[0];
    assert_eq!(openai.last_failure_class, Some(FailureClass::Transient));
    assert!(openai.last_error.as_deref().unwrap().contains("internal error"));
    assert!(openai.last_error_at.is_some());

    // Five minutes later the primary is back in front
    tokio::time::advance(Duration::from_secs(5 * 60)).await;
    let points = orchestrator
        .generate_talking_points("back pain", "")
        .await
        .unwrap();
    assert_eq!(points[0].category, TalkingPointCategory::SymptomDocumentation);
    assert_eq!(points[0].when_to_use, "At the start");
    assert_eq!(primary.calls(), 2);
    assert_eq!(secondary.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_then_unavailable() {
    let a = ScriptedProvider::new("a", Step::Fail { status: 502, message: "bad gateway" });
    let b = ScriptedProvider::new("b", Step::Fail { status: 503, message: "overloaded" });

    let orchestrator = orchestrator(vec![
        ScriptedFactory::new("openai", a.clone()),
        ScriptedFactory::new("gemini", b.clone()),
    ]);

    match orchestrator.analyze_note("BP 150/95").await {
        Err(RuntimeError::AllBackendsFailed { attempts, last_error }) => {
            assert_eq!(attempts, 2);
            assert_eq!(last_error.status_code(), Some(503));
        }
        other => panic!("Expected AllBackendsFailed, got {:?}", other),
    }

    // Both cooling down: no backend is called at all
    let result = orchestrator.analyze_note("BP 150/95").await;
    assert!(matches!(result, Err(RuntimeError::AllBackendsUnavailable)));
    assert_eq!((a.calls(), b.calls()), (1, 1));
    assert_eq!(orchestrator.cached_entries().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_counts_as_transient_failure() {
    let slow = ScriptedProvider::new("slow", Step::Hang);
    let fast = ScriptedProvider::new("fast", Step::Reply(ANALYSIS_JSON));

    let mut config = RuntimeConfig::default();
    config.backend_timeout = Duration::from_secs(5);

    let orchestrator = orchestrator_with(
        config,
        vec![
            ScriptedFactory::new("openai", slow.clone()),
            ScriptedFactory::new("gemini", fast.clone()),
        ],
    );

    let analysis = orchestrator.analyze_note("BP 150/95").await.unwrap();
    assert_eq!(analysis.summary, "Blood pressure was high.");

    let openai = &orchestrator.status().backends[0];
    assert_eq!(openai.last_failure_class, Some(FailureClass::Transient));
    assert!(openai.last_error.as_deref().unwrap().contains("Timeout"));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_call_caches_nothing() {
    let slow = ScriptedProvider::new("slow", Step::Hang);
    let fallback = ScriptedProvider::new("fallback", Step::Reply(QUESTIONS_JSON));

    let orchestrator = orchestrator(vec![
        ScriptedFactory::new("openai", slow.clone()),
        ScriptedFactory::new("gemini", fallback.clone()),
    ]);

    let cancelled = tokio::time::timeout(
        Duration::from_secs(1),
        orchestrator.generate_questions("fatigue", "general", ""),
    )
    .await;
    assert!(cancelled.is_err());

    assert_eq!(slow.calls(), 1);
    assert_eq!(fallback.calls(), 0);
    assert_eq!(orchestrator.cached_entries().await, 0);
    assert_eq!(orchestrator.status().backends[0].consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_unusable_output_is_an_empty_success() {
    let chatty = ScriptedProvider::new("chatty", Step::Reply("I'm sorry, I can't help with that."));
    let orchestrator = orchestrator(vec![ScriptedFactory::new("openai", chatty.clone())]);

    let analysis = orchestrator.analyze_note("note").await.unwrap();
    assert!(analysis.concerns.is_empty());
    assert_eq!(analysis.summary, advocate_core::DEFAULT_SUMMARY);

    let status = orchestrator.status();
    assert!(status.backends[0].available);
}

#[tokio::test(start_paused = true)]
async fn test_cache_expires_after_ttl() {
    let provider = ScriptedProvider::new("p", Step::Reply(QUESTIONS_JSON));
    let orchestrator = orchestrator(vec![ScriptedFactory::new("openai", provider.clone())]);

    orchestrator.generate_questions("fatigue", "", "").await.unwrap();
    tokio::time::advance(Duration::from_secs(59 * 60)).await;
    orchestrator.generate_questions("fatigue", "", "").await.unwrap();
    assert_eq!(provider.calls(), 1);

    tokio::time::advance(Duration::from_secs(2 * 60)).await;
    orchestrator.generate_questions("fatigue", "", "").await.unwrap();
    assert_eq!(provider.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_clear_cache_forces_a_fresh_call() {
    let provider = ScriptedProvider::new("p", Step::Reply(ANALYSIS_JSON));
    let orchestrator = orchestrator(vec![ScriptedFactory::new("openai", provider.clone())]);

    orchestrator.analyze_note("note").await.unwrap();
    orchestrator.clear_cache();
    orchestrator.analyze_note("note").await.unwrap();

    assert_eq!(provider.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_purge_expired_sweeps_old_entries() {
    let provider = ScriptedProvider::new("p", Step::Reply(QUESTIONS_JSON));
    let orchestrator = orchestrator(vec![ScriptedFactory::new("openai", provider)]);

    orchestrator.generate_questions("a", "", "").await.unwrap();
    orchestrator.analyze_note("note").await.unwrap();

    // Questions live for one hour, analyses for two
    tokio::time::advance(Duration::from_secs(90 * 60)).await;
    assert_eq!(orchestrator.purge_expired().await, 1);
    assert_eq!(orchestrator.cached_entries().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_explicit_order_wins() {
    let openai = ScriptedProvider::new("openai", Step::Reply(QUESTIONS_JSON));
    let anthropic = ScriptedProvider::new("anthropic", Step::Reply(QUESTIONS_JSON));

    let mut config = RuntimeConfig::default();
    config.set_order_from_list("anthropic, openai");

    let orchestrator = orchestrator_with(
        config,
        vec![
            ScriptedFactory::new("openai", openai.clone()),
            ScriptedFactory::new("anthropic", anthropic.clone()),
        ],
    );

    orchestrator.generate_questions("fatigue", "", "").await.unwrap();
    assert_eq!(orchestrator.status().order, vec!["anthropic", "openai"]);
    assert_eq!((anthropic.calls(), openai.calls()), (1, 0));
}
