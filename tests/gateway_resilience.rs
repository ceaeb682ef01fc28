//! Gateway behaviour against a real HTTP upstream: status classification,
//! transport retries and the circuit breaker.

mod common;

use std::time::Duration;

use serde_json::json;
use stats_gateway::resilience::{CircuitBreaker, CircuitState, RetryPolicy};
use stats_gateway::upstream::UpstreamError;

use common::{gateway, quick_retry, start_programmable_upstream, Reply, TEST_API_KEY};

#[tokio::test]
async fn test_success_returns_payload_and_sends_credential() {
    let upstream = start_programmable_upstream(|_, _| async { Reply::ok(json!({"puuid": "p1"})) }).await;
    let client = gateway(&upstream.base_url(), CircuitBreaker::default(), RetryPolicy::none());

    let payload = client
        .get("europe", "/riot/account/v1/accounts/by-puuid/p1", &[])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payload["puuid"], "p1");

    let seen = upstream.requests();
    assert_eq!(seen[0].path, "/riot/account/v1/accounts/by-puuid/p1");
    let head = seen[0].head.to_ascii_lowercase();
    assert!(head.contains(&format!("x-riot-token: {TEST_API_KEY}")));
    assert!(head.contains("accept: application/json"));
}

#[tokio::test]
async fn test_params_are_sent_as_query_string() {
    let upstream = start_programmable_upstream(|_, _| async { Reply::ok(json!(["EUW1_1"])) }).await;
    let client = gateway(&upstream.base_url(), CircuitBreaker::default(), RetryPolicy::none());

    client
        .get(
            "europe",
            "/lol/match/v5/matches/by-puuid/p1/ids",
            &[("start", "0".to_string()), ("count", "20".to_string())],
        )
        .await
        .unwrap();

    assert_eq!(upstream.requests()[0].query.as_deref(), Some("start=0&count=20"));
}

#[tokio::test]
async fn test_not_found_is_a_soft_miss() {
    let upstream = start_programmable_upstream(|_, _| async { Reply::status(404) }).await;
    let client = gateway(&upstream.base_url(), CircuitBreaker::default(), quick_retry(3));

    let result = client.get("euw1", "/lol/summoner/v4/summoners/by-puuid/nobody", &[]).await;
    assert!(matches!(result, Ok(None)));
    assert_eq!(upstream.hits(), 1);
}

#[tokio::test]
async fn test_throttled_is_a_soft_miss_without_retry() {
    let upstream = start_programmable_upstream(|_, _| async { Reply::Throttled { retry_after_secs: 7 } }).await;
    let client = gateway(&upstream.base_url(), CircuitBreaker::default(), quick_retry(3));

    let result = client.get("euw1", "/lol/league/v4/entries/by-puuid/p1", &[]).await;
    assert!(matches!(result, Ok(None)));
    assert_eq!(upstream.hits(), 1);
}

#[tokio::test]
async fn test_forbidden_raises_auth_error() {
    let upstream = start_programmable_upstream(|_, _| async { Reply::status(403) }).await;
    let client = gateway(&upstream.base_url(), CircuitBreaker::default(), quick_retry(3));

    let result = client.get("euw1", "/lol/league/v4/entries/by-puuid/p1", &[]).await;
    assert!(matches!(result, Err(UpstreamError::Auth)));
    assert_eq!(upstream.hits(), 1);
}

#[tokio::test]
async fn test_server_error_raises_without_retry() {
    let upstream = start_programmable_upstream(|_, _| async { Reply::status(503) }).await;
    let client = gateway(&upstream.base_url(), CircuitBreaker::default(), quick_retry(3));

    let result = client.get("euw1", "/lol/league/v4/entries/by-puuid/p1", &[]).await;
    assert!(matches!(result, Err(UpstreamError::Server { status: 503 })));
    assert_eq!(upstream.hits(), 1);
}

#[tokio::test]
async fn test_unexpected_status_raises() {
    let upstream = start_programmable_upstream(|_, _| async { Reply::status(418) }).await;
    let client = gateway(&upstream.base_url(), CircuitBreaker::default(), RetryPolicy::none());

    let result = client.get("euw1", "/lol/league/v4/entries/by-puuid/p1", &[]).await;
    assert!(matches!(result, Err(UpstreamError::UnexpectedStatus { status: 418 })));
}

#[tokio::test]
async fn test_dropped_connections_retry_then_raise() {
    let upstream = start_programmable_upstream(|_, _| async { Reply::Drop }).await;
    let client = gateway(&upstream.base_url(), CircuitBreaker::default(), quick_retry(3));

    let result = client.get("euw1", "/lol/league/v4/entries/by-puuid/p1", &[]).await;
    assert!(matches!(result, Err(UpstreamError::Transport(_))));
    assert_eq!(upstream.hits(), 3);
}

#[tokio::test]
async fn test_dropped_connection_recovers_on_retry() {
    let upstream = start_programmable_upstream(|_, served| async move {
        if served == 0 {
            Reply::Drop
        } else {
            Reply::ok(json!([]))
        }
    })
    .await;
    let client = gateway(&upstream.base_url(), CircuitBreaker::default(), quick_retry(3));

    let result = client.get("euw1", "/lol/league/v4/entries/by-puuid/p1", &[]).await;
    assert_eq!(result.unwrap(), Some(json!([])));
    assert_eq!(upstream.hits(), 2);
    assert_eq!(client.breaker().failure_count(), 0);
}

#[tokio::test]
async fn test_breaker_opens_and_skips_transport() {
    let upstream = start_programmable_upstream(|_, _| async { Reply::Drop }).await;
    let client = gateway(
        &upstream.base_url(),
        CircuitBreaker::new(5, Duration::from_secs(60)),
        RetryPolicy::none(),
    );

    for _ in 0..5 {
        let result = client.get("euw1", "/lol/status/v4/platform-data", &[]).await;
        assert!(matches!(result, Err(UpstreamError::Transport(_))));
    }
    assert_eq!(client.breaker().state(), CircuitState::Open);

    let result = client.get("euw1", "/lol/status/v4/platform-data", &[]).await;
    assert!(matches!(result, Err(UpstreamError::CircuitOpen)));
    assert_eq!(upstream.hits(), 5);
}

#[tokio::test]
async fn test_breaker_closes_after_successful_trial() {
    let upstream = start_programmable_upstream(|_, served| async move {
        if served < 2 {
            Reply::Drop
        } else {
            Reply::ok(json!({"ok": true}))
        }
    })
    .await;
    let client = gateway(
        &upstream.base_url(),
        CircuitBreaker::new(2, Duration::from_millis(200)),
        RetryPolicy::none(),
    );

    for _ in 0..2 {
        assert!(client.get("euw1", "/status", &[]).await.is_err());
    }
    assert_eq!(client.breaker().state(), CircuitState::Open);

    tokio::time::sleep(Duration::from_millis(300)).await;

    let result = client.get("euw1", "/status", &[]).await.unwrap();
    assert_eq!(result, Some(json!({"ok": true})));
    assert_eq!(client.breaker().state(), CircuitState::Closed);
    assert_eq!(upstream.hits(), 3);
}

#[tokio::test]
async fn test_unknown_region_fails_before_any_request() {
    let upstream = start_programmable_upstream(|_, _| async { Reply::ok(json!({})) }).await;
    let client = gateway(&upstream.base_url(), CircuitBreaker::default(), quick_retry(3));

    let result = client.get("atlantis", "/status", &[]).await;
    assert!(matches!(result, Err(UpstreamError::UnknownRegion(_))));
    assert_eq!(upstream.hits(), 0);
}

#[tokio::test]
async fn test_region_token_resolves_to_platform() {
    let upstream = start_programmable_upstream(|_, _| async { Reply::ok(json!({})) }).await;
    let client = gateway(&upstream.base_url(), CircuitBreaker::default(), RetryPolicy::none());

    assert!(client.get("euw", "/status", &[]).await.unwrap().is_some());
    assert_eq!(upstream.hits(), 1);
}
