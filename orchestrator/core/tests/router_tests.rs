// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

mod common;

use aegis_router_core::application::{RouteRequest, RouterError, RouterOutput, StreamEvent};
use aegis_router_core::domain::events::{EventType, InvocationId};
use aegis_router_core::domain::llm::{LLMError, Message, StreamChunk, TaskType};
use aegis_router_core::domain::routing::{ProviderRoute, TaskRouting};
use aegis_router_core::infrastructure::event_bus::is_lifecycle;
use common::{reply, route, router_with, router_with_routing, ScriptedProvider, Step};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn hi() -> Vec<Message> {
    vec![Message::user("hi")]
}

fn network(msg: &str) -> LLMError {
    LLMError::Network(msg.to_string())
}

#[tokio::test]
async fn test_primary_provider_serves_without_fallback() {
    let a = ScriptedProvider::always(reply("from a"));
    let b = ScriptedProvider::always(reply("from b"));
    let (_, router) = router_with(&[("a", a.clone()), ("b", b.clone())]);

    let response = router.complete(TaskType::SimpleText, hi()).await.unwrap();

    assert_eq!(response.provider, "a");
    assert_eq!(response.content, "from a");
    assert!(!response.fallback_used);
    assert_eq!(response.task_type, TaskType::SimpleText);
    assert_eq!(b.calls(), 0);
    assert_eq!(router.provider_status("a").unwrap().total_requests, 1);
    assert!(router.provider_status("b").is_none());
}

#[tokio::test]
async fn test_falls_back_to_second_candidate() {
    let a = ScriptedProvider::always(Step::Fail(network("connection refused")));
    let b = ScriptedProvider::always(reply("from b"));
    let (_, router) = router_with(&[("a", a.clone()), ("b", b.clone())]);

    let response = router.complete(TaskType::SimpleText, hi()).await.unwrap();

    assert_eq!(response.provider, "b");
    assert!(response.fallback_used);

    let a_status = router.provider_status("a").unwrap();
    assert_eq!(a_status.failed_requests, 1);
    assert_eq!(a_status.success_rate, 0.0);
    assert_eq!(a_status.last_error.as_deref(), Some("Network error: connection refused"));
    assert_eq!(router.provider_status("b").unwrap().successful_requests, 1);
}

#[tokio::test]
async fn test_exhausted_chain_reports_every_failure() {
    let a = ScriptedProvider::always(Step::Fail(LLMError::Timeout("60s".into())));
    let b = ScriptedProvider::always(Step::Fail(LLMError::Http {
        status: 502,
        body: "bad gateway".into(),
    }));
    let (_, router) = router_with(&[("a", a), ("b", b)]);
    let mut events = router.events().subscribe();

    let err = router.complete(TaskType::SimpleText, hi()).await.unwrap_err();

    match err {
        RouterError::NoProviderAvailable {
            task_type,
            failures,
        } => {
            assert_eq!(task_type, TaskType::SimpleText);
            let providers: Vec<_> = failures.iter().map(|f| f.provider.as_str()).collect();
            assert_eq!(providers, vec!["a", "b"]);
            assert_eq!(failures[0].error, LLMError::Timeout("60s".into()));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let events = events.drain();
    let failed: Vec<_> = events
        .iter()
        .filter(|e| e.event_type == EventType::CommandFailed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].get_str("reason"), Some("no_provider_available"));
    assert_eq!(failed[0].data["failures"].as_array().unwrap().len(), 2);
    assert!(events.iter().any(|e| e.event_type == EventType::SystemAlert));
    assert_eq!(events.iter().filter(|e| e.event_type == EventType::MetricsUpdate).count(), 2);
    assert!(!events.iter().any(|e| e.event_type == EventType::CommandCompleted));
}

#[tokio::test]
async fn test_success_rate_matches_attempt_history() {
    let a = ScriptedProvider::new(vec![
        reply("1"),
        Step::Fail(network("x")),
        reply("3"),
        reply("4"),
        Step::Fail(network("y")),
    ]);
    let (_, router) = router_with(&[("a", a)]);
    let router = router.with_failure_threshold(0);

    assert!(router.provider_status("a").is_none());
    for _ in 0..5 {
        let _ = router.complete(TaskType::SimpleText, hi()).await;
    }

    let status = router.provider_status("a").unwrap();
    assert_eq!(status.total_requests, 5);
    assert_eq!(status.successful_requests, 3);
    assert_eq!(status.failed_requests, 2);
    assert_eq!(status.success_rate, 3.0 / 5.0);
    assert!(status.available);
}

#[tokio::test]
async fn test_cancellation_leaves_counters_unchanged() {
    let a = ScriptedProvider::new(vec![reply("warm up"), Step::Hang]);
    let (_, router) = router_with(&[("a", a.clone())]);
    let router = Arc::new(router);

    router.complete(TaskType::SimpleText, hi()).await.unwrap();
    let before = router.provider_status("a").unwrap();
    let mut events = router.events().subscribe();

    let cancel = CancellationToken::new();
    let task = {
        let router = router.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            router
                .complete_cancellable(TaskType::SimpleText, hi(), cancel)
                .await
        })
    };

    // Let the attempt reach the provider before cancelling
    while a.calls() < 2 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cancel.cancel();

    let result = task.await.unwrap();
    assert_eq!(result.unwrap_err(), RouterError::Cancelled);

    let after = router.provider_status("a").unwrap();
    assert_eq!(after.total_requests, before.total_requests);
    assert_eq!(after.successful_requests, before.successful_requests);
    assert_eq!(after.failed_requests, before.failed_requests);

    let failed: Vec<_> = events
        .drain()
        .into_iter()
        .filter(|e| e.event_type == EventType::CommandFailed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].get_str("reason"), Some("cancelled"));
}

#[tokio::test]
async fn test_unavailable_primary_is_skipped_and_secondary_serves() {
    let a = ScriptedProvider::always(reply("from a"));
    let b = ScriptedProvider::always(Step::ReplyAfter(Duration::from_millis(50), "hello".into()));
    let (_, router) = router_with(&[("A", a.clone()), ("B", b)]);

    router.set_availability("A", false);
    let b_before = router.provider_status("B").map(|s| s.total_requests).unwrap_or(0);

    let output = router.invoke(TaskType::SimpleText, hi(), false).await.unwrap();
    let response = output.into_response().unwrap();

    assert_eq!(response.provider, "B");
    assert_eq!(response.content, "hello");
    assert!(response.fallback_used);
    assert_eq!(response.task_type, TaskType::SimpleText);
    assert!(response.latency_ms >= 50);

    assert_eq!(router.provider_status("B").unwrap().total_requests, b_before + 1);
    assert_eq!(a.calls(), 0);
    assert_eq!(router.provider_status("A").unwrap().total_requests, 0);
}

#[tokio::test]
async fn test_consecutive_failures_mark_provider_unavailable() {
    let a = ScriptedProvider::always(Step::Fail(LLMError::RateLimit));
    let b = ScriptedProvider::always(reply("from b"));
    let (_, router) = router_with(&[("a", a.clone()), ("b", b)]);
    let router = router.with_failure_threshold(2);
    let mut events = router.events().subscribe();

    router.complete(TaskType::SimpleText, hi()).await.unwrap();
    assert!(router.provider_status("a").unwrap().available);
    router.complete(TaskType::SimpleText, hi()).await.unwrap();
    assert!(!router.provider_status("a").unwrap().available);

    let response = router.complete(TaskType::SimpleText, hi()).await.unwrap();
    assert_eq!(response.provider, "b");
    assert!(response.fallback_used);
    assert_eq!(a.calls(), 2);

    let changes: Vec<_> = events
        .drain()
        .into_iter()
        .filter(|e| e.event_type == EventType::ServiceStatusChanged)
        .collect();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].get_str("provider"), Some("a"));
    assert_eq!(changes[0].data["available"], false);
}

#[tokio::test]
async fn test_all_unavailable_tries_full_chain() {
    let a = ScriptedProvider::always(reply("from a"));
    let b = ScriptedProvider::always(reply("from b"));
    let (_, router) = router_with(&[("a", a), ("b", b)]);
    router.set_availability("a", false);
    router.set_availability("b", false);

    let response = router.complete(TaskType::SimpleText, hi()).await.unwrap();

    assert_eq!(response.provider, "a");
    assert!(!response.fallback_used);
    assert!(router.provider_status("a").unwrap().available);
}

#[tokio::test]
async fn test_route_without_candidates() {
    let (_, router) = router_with(&[("a", ScriptedProvider::always(reply("x")))]);
    let err = router.complete(TaskType::ImageGeneration, hi()).await.unwrap_err();
    assert_eq!(err, RouterError::UnknownTaskRoute(TaskType::ImageGeneration));
}

#[tokio::test]
async fn test_unregistered_primary_makes_registered_candidate_a_fallback() {
    let b = ScriptedProvider::always(reply("from b"));
    let routing = TaskRouting::new().route(TaskType::SimpleText, route(&["ghost", "b"]));
    let (_, router) = router_with_routing(&[("b", b)], routing);

    let response = router.complete(TaskType::SimpleText, hi()).await.unwrap();
    assert_eq!(response.provider, "b");
    assert!(response.fallback_used);
}

#[tokio::test]
async fn test_configuration_error_is_fatal_and_not_counted() {
    let a = ScriptedProvider::always(Step::Fail(LLMError::Configuration("missing api key".into())));
    let b = ScriptedProvider::always(reply("from b"));
    let (_, router) = router_with(&[("a", a), ("b", b.clone())]);

    let err = router.complete(TaskType::SimpleText, hi()).await.unwrap_err();

    assert!(matches!(err, RouterError::Configuration(msg) if msg.contains("missing api key")));
    assert!(router.provider_status("a").is_none());
    assert_eq!(b.calls(), 0);
}

#[tokio::test]
async fn test_route_model_override_reaches_provider() {
    let a = ScriptedProvider::always(reply("ok"));
    let routing = TaskRouting::new().route(
        TaskType::CodeGeneration,
        vec![ProviderRoute::new("a").with_model("coder-large")],
    );
    let (_, router) = router_with_routing(&[("a", a)], routing);

    let response = router.complete(TaskType::CodeGeneration, hi()).await.unwrap();
    assert_eq!(response.model.as_deref(), Some("coder-large"));
    assert_eq!(response.task_type, TaskType::CodeGeneration);
}

#[tokio::test]
async fn test_second_model_of_same_provider_is_fallback() {
    let a = ScriptedProvider::new(vec![Step::Fail(network("model overloaded")), reply("ok")]);
    let routing = TaskRouting::new().route(
        TaskType::ComplexReasoning,
        vec![
            ProviderRoute::new("a").with_model("large"),
            ProviderRoute::new("a").with_model("small"),
        ],
    );
    let (_, router) = router_with_routing(&[("a", a.clone())], routing);

    let response = router.complete(TaskType::ComplexReasoning, hi()).await.unwrap();
    assert_eq!(response.provider, "a");
    assert_eq!(response.model.as_deref(), Some("small"));
    assert!(response.fallback_used);
    assert_eq!(a.calls(), 2);
}

#[tokio::test]
async fn test_concurrent_invocations_keep_counters_consistent() {
    let a = ScriptedProvider::new(vec![
        Step::ReplyAfter(Duration::from_millis(2), "a".into()),
        Step::Fail(network("flaky")),
    ]);
    let b = ScriptedProvider::always(Step::ReplyAfter(Duration::from_millis(1), "b".into()));
    let (_, router) = router_with(&[("a", a.clone()), ("b", b.clone())]);
    let router = Arc::new(router.with_failure_threshold(0));

    let tasks: Vec<_> = (0..64)
        .map(|_| {
            let router = router.clone();
            tokio::spawn(async move { router.complete(TaskType::SimpleText, hi()).await })
        })
        .collect();
    for task in futures::future::join_all(tasks).await {
        task.unwrap().unwrap();
    }

    let a_status = router.provider_status("a").unwrap();
    let b_status = router.provider_status("b").unwrap();
    assert_eq!(a_status.total_requests, 64);
    assert_eq!(a_status.total_requests, a_status.successful_requests + a_status.failed_requests);
    assert_eq!(a_status.successful_requests, 1);
    assert_eq!(b_status.total_requests, 63);
    assert_eq!(a.calls() + b.calls(), 64 + 63);
}

#[tokio::test]
async fn test_streaming_lifecycle_is_ordered() {
    let a = ScriptedProvider::always(Step::Chunks(vec![
        Ok(StreamChunk::Delta("Hel".into())),
        Ok(StreamChunk::Delta("lo".into())),
        Ok(StreamChunk::Done),
    ]));
    let (_, router) = router_with(&[("a", a)]);

    let invocation_id = InvocationId::new();
    let mut lifecycle = router.events().subscribe_invocation(invocation_id);

    let request = RouteRequest::new(TaskType::SimpleText, hi())
        .streaming(true)
        .with_invocation_id(invocation_id);
    let stream = match router.route(request).await.unwrap() {
        RouterOutput::Stream(stream) => stream,
        other => panic!("expected a stream, got {other:?}"),
    };
    let items: Vec<_> = stream.collect().await;

    assert_eq!(items.len(), 3);
    assert_eq!(items[0], Ok(StreamEvent::Fragment("Hel".into())));
    assert_eq!(items[1], Ok(StreamEvent::Fragment("lo".into())));
    match &items[2] {
        Ok(StreamEvent::Done(summary)) => {
            assert_eq!(summary.provider, "a");
            assert_eq!(summary.fragments, 2);
            assert!(!summary.fallback_used);
        }
        other => panic!("expected end marker, got {other:?}"),
    }

    let events = lifecycle.until_terminal().await.unwrap();
    let kinds: Vec<_> = events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        kinds,
        vec![
            EventType::CommandStarted,
            EventType::CommandOutput,
            EventType::CommandOutput,
            EventType::CommandCompleted,
        ]
    );
    assert!(events.iter().all(is_lifecycle));
    assert_eq!(events[1].get_str("fragment"), Some("Hel"));
}

#[tokio::test]
async fn test_stream_falls_back_before_first_fragment() {
    let a = ScriptedProvider::always(Step::Fail(network("reset")));
    let b = ScriptedProvider::always(Step::Chunks(vec![]));
    let c = ScriptedProvider::always(reply("from c"));
    let (_, router) = router_with(&[("a", a), ("b", b), ("c", c)]);

    let items: Vec<_> = router.stream(TaskType::SimpleText, hi()).await.unwrap().collect().await;

    assert_eq!(items[0], Ok(StreamEvent::Fragment("from c".into())));
    match &items[1] {
        Ok(StreamEvent::Done(summary)) => {
            assert_eq!(summary.provider, "c");
            assert!(summary.fallback_used);
        }
        other => panic!("expected end marker, got {other:?}"),
    }
    // b closed its stream without an end marker
    assert_eq!(router.provider_status("b").unwrap().failed_requests, 1);
    assert_eq!(router.provider_status("a").unwrap().failed_requests, 1);
}

#[tokio::test]
async fn test_mid_stream_failure_is_terminal() {
    let a = ScriptedProvider::always(Step::Chunks(vec![
        Ok(StreamChunk::Delta("par".into())),
        Err(network("connection reset")),
    ]));
    let b = ScriptedProvider::always(reply("from b"));
    let (_, router) = router_with(&[("a", a), ("b", b.clone())]);
    let mut events = router.events().subscribe();

    let items: Vec<_> = router.stream(TaskType::SimpleText, hi()).await.unwrap().collect().await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0], Ok(StreamEvent::Fragment("par".into())));
    match &items[1] {
        Err(RouterError::MidStreamFailure {
            provider,
            fragments,
            error,
        }) => {
            assert_eq!(provider, "a");
            assert_eq!(*fragments, 1);
            assert_eq!(*error, network("connection reset"));
        }
        other => panic!("expected mid-stream failure, got {other:?}"),
    }
    assert_eq!(b.calls(), 0);
    assert_eq!(router.provider_status("a").unwrap().failed_requests, 1);

    let reasons: Vec<_> = events
        .drain()
        .into_iter()
        .filter(|e| e.event_type.is_terminal())
        .map(|e| e.get_str("reason").map(str::to_string))
        .collect();
    assert_eq!(reasons, vec![Some("mid_stream_failure".to_string())]);
}

#[tokio::test]
async fn test_dropping_stream_cancels_without_health_update() {
    let a = ScriptedProvider::always(Step::ChunksThenHang(vec![StreamChunk::Delta("x".into())]));
    let (_, router) = router_with(&[("a", a)]);
    let mut events = router.events().subscribe();

    let mut stream = router.stream(TaskType::SimpleText, hi()).await.unwrap();
    assert_eq!(stream.next().await, Some(Ok(StreamEvent::Fragment("x".into()))));
    drop(stream);

    assert!(router.provider_status("a").is_none());
    let failed: Vec<_> = events
        .drain()
        .into_iter()
        .filter(|e| e.event_type == EventType::CommandFailed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].get_str("reason"), Some("cancelled"));
}

#[tokio::test]
async fn test_cancelling_token_ends_open_stream() {
    let a = ScriptedProvider::always(Step::ChunksThenHang(vec![StreamChunk::Delta("x".into())]));
    let (_, router) = router_with(&[("a", a)]);
    let cancel = CancellationToken::new();

    let mut stream = router
        .stream_cancellable(TaskType::SimpleText, hi(), cancel.clone())
        .await
        .unwrap();
    assert!(matches!(stream.next().await, Some(Ok(StreamEvent::Fragment(_)))));

    cancel.cancel();
    assert_eq!(stream.next().await, Some(Err(RouterError::Cancelled)));
    assert_eq!(stream.next().await, None);
    assert!(router.provider_status("a").is_none());
}

#[tokio::test]
async fn test_health_check_all_updates_availability_only() {
    let a = ScriptedProvider::unhealthy(reply("x"), network("unreachable"));
    let b = ScriptedProvider::always(reply("y"));
    let (_, router) = router_with(&[("a", a), ("b", b)]);
    router.set_availability("b", false);

    let results = router.health_check_all().await;

    let names: Vec<_> = results.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert!(results[0].1.is_err());

    let a_status = router.provider_status("a").unwrap();
    assert!(!a_status.available);
    assert_eq!(a_status.total_requests, 0);
    assert!(router.provider_status("b").unwrap().available);
}
