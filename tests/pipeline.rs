mod common;

use common::RecordingChannel;
use url_shortener::error::ShortenerError;
use url_shortener::infrastructure::resilience::CircuitState;
use url_shortener::utils::code_generator::derive_code;

// ─── CREATE / RESOLVE ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_then_resolve() {
    let app = common::test_app();
    let long_url = "https://example.com/a";

    let outcome = app.shortener().create(long_url, None).await.unwrap();

    assert!(outcome.created);
    assert_eq!(outcome.short_code, derive_code(long_url));
    assert_eq!(app.cache.get(&outcome.short_code).as_deref(), Some(long_url));

    let resolved = app
        .shortener()
        .resolve(&outcome.short_code, None)
        .await
        .unwrap();
    assert_eq!(resolved.as_deref(), Some(long_url));
}

#[tokio::test]
async fn test_repeat_create_returns_existing_code() {
    let app = common::test_app();
    let long_url = "https://example.com/repeat";

    let first = app.shortener().create(long_url, None).await.unwrap();
    let second = app.shortener().create(long_url, None).await.unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.short_code, second.short_code);
    assert_eq!(app.repository.len(), 1);

    app.drain().await;
    assert_eq!(app.channel.sent_events().len(), 1);
}

#[tokio::test]
async fn test_invalid_url_is_rejected_without_side_effects() {
    let app = common::test_app();

    let result = app.shortener().create("ftp://example.com/file", None).await;

    assert!(matches!(result, Err(ShortenerError::InvalidUrl(_))));
    assert_eq!(app.repository.len(), 0);

    app.drain().await;
    assert_eq!(app.channel.attempts(), 0);
}

#[tokio::test]
async fn test_resolve_unknown_code() {
    let app = common::test_app();

    let resolved = app.shortener().resolve("zzzzzzz", None).await.unwrap();

    assert!(resolved.is_none());
}

#[tokio::test]
async fn test_resolve_falls_back_to_store_and_refills_cache() {
    let app = common::test_app();
    let long_url = "https://example.com/store-only";
    let code = derive_code(long_url);

    use url_shortener::domain::repositories::UrlRepository;
    app.repository.insert_if_absent(&code, long_url).await.unwrap();

    let resolved = app.shortener().resolve(&code, None).await.unwrap();
    assert_eq!(resolved.as_deref(), Some(long_url));

    // The refill runs on its own task.
    for _ in 0..10 {
        if app.cache.get(&code).is_some() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(app.cache.get(&code).as_deref(), Some(long_url));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_insert_once() {
    let app = common::test_app();
    let long_url = "https://example.com/race";

    let mut handles = Vec::new();
    for _ in 0..16 {
        let shortener = app.shortener().clone();
        handles.push(tokio::spawn(async move {
            shortener.create(long_url, None).await
        }));
    }

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap().unwrap());
    }

    let created = outcomes.iter().filter(|o| o.created).count();
    assert_eq!(created, 1);
    assert!(outcomes.iter().all(|o| o.short_code == derive_code(long_url)));
    assert_eq!(app.repository.len(), 1);

    app.drain().await;
    assert_eq!(app.channel.sent_events().len(), 1);
}

#[tokio::test]
async fn test_seed_guard_loads_stored_urls() {
    let app = common::test_app();

    use url_shortener::domain::repositories::UrlRepository;
    for i in 0..5 {
        let url = format!("https://example.com/seed/{i}");
        app.repository
            .insert_if_absent(&derive_code(&url), &url)
            .await
            .unwrap();
    }

    let seeded = app.shortener().seed_guard().await.unwrap();
    assert_eq!(seeded, 5);

    let outcome = app
        .shortener()
        .create("https://example.com/seed/3", None)
        .await
        .unwrap();
    assert!(!outcome.created);
}

#[tokio::test]
async fn test_store_failure_is_reported() {
    let app = common::test_app();
    app.repository.set_down(true);

    let result = app.shortener().create("https://example.com/down", None).await;

    assert!(matches!(result, Err(ShortenerError::Storage(_))));
}

// ─── PUBLICATION ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_created_event_carries_correlation_id() {
    let app = common::test_app();

    let outcome = app
        .shortener()
        .create("https://example.com/event", Some("req-42"))
        .await
        .unwrap();
    app.drain().await;

    let events = app.channel.sent_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["event"], "URL_CREATED");
    assert_eq!(events[0]["short_code"], outcome.short_code);
    assert_eq!(events[0]["long_url"], "https://example.com/event");
    assert_eq!(events[0]["correlation_id"], "req-42");
}

#[tokio::test(start_paused = true)]
async fn test_transient_send_failures_are_retried() {
    let app = common::test_app_with_channel(RecordingChannel::failing_times(2));

    app.shortener()
        .create("https://example.com/flaky", None)
        .await
        .unwrap();
    app.drain().await;

    assert_eq!(app.channel.attempts(), 3);
    assert_eq!(app.channel.sent_events().len(), 1);
    assert!(app.dead_letters.entries().is_empty());
    assert_eq!(app.breaker.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_channel_dead_letters_the_event() {
    let app = common::test_app_with_channel(RecordingChannel::failing());

    let outcome = app
        .shortener()
        .create("https://example.com/lost", None)
        .await
        .unwrap();
    app.drain().await;

    // The mapping is stored regardless of the publish outcome.
    assert!(outcome.created);
    assert_eq!(app.repository.len(), 1);

    assert_eq!(app.channel.attempts(), 3);
    let entries = app.dead_letters.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].topic, common::TOPIC);
    assert!(entries[0].payload.contains(&outcome.short_code));
    assert_eq!(app.breaker.consecutive_failures(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_open_breaker_skips_channel() {
    let app = common::test_app_with_channel(RecordingChannel::failing());

    for i in 0..3 {
        app.shortener()
            .create(&format!("https://example.com/fail/{i}"), None)
            .await
            .unwrap();
    }
    app.drain().await;

    assert_eq!(app.breaker.state(), CircuitState::Open);
    assert_eq!(app.channel.attempts(), 9);

    app.shortener()
        .create("https://example.com/fail/3", None)
        .await
        .unwrap();
    app.drain().await;

    assert_eq!(app.channel.attempts(), 9);
    assert_eq!(app.dead_letters.entries().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_parks_pending_publish() {
    let app = common::test_app_with_channel(RecordingChannel::failing());

    let outcome = app
        .shortener()
        .create("https://example.com/bye", None)
        .await
        .unwrap();
    app.shutdown.cancel();
    app.drain().await;

    assert_eq!(app.channel.attempts(), 0);
    assert!(app.channel.sent_events().is_empty());

    let entries = app.dead_letters.entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].payload.contains(&outcome.short_code));
    assert!(entries[0].reason.contains("abandoned"));
}
