use std::sync::Arc;
use std::time::Duration;

use llm_stream_engine::breaker::{BreakerRegistry, CircuitBreakerConfig, CircuitState, EndpointKey};
use llm_stream_engine::error::TransportFault;
use llm_stream_engine::retry::{ErrorKind, JITTER_CEILING, RetryConfig, retry_delay, should_retry};

fn breaker_config(failures: u32, open: Duration, successes: u32) -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold: failures,
        open_duration: open,
        success_threshold: successes,
    }
}

#[tokio::test(start_paused = true)]
async fn test_breaker_scenario_three_failures_then_recovery() {
    // failureThreshold=3: three recorded failures block requests, the
    // cooldown elapsing half-opens, two successes close.
    let registry = BreakerRegistry::new(breaker_config(3, Duration::from_secs(30), 2));
    let key = EndpointKey::new("https", "api.example", 443, "messages");
    let breaker = registry.breaker(&key);

    for _ in 0..3 {
        assert!(breaker.should_allow_request());
        breaker.record_failure();
    }
    assert!(!breaker.should_allow_request());

    tokio::time::advance(Duration::from_secs(29)).await;
    assert!(!breaker.should_allow_request(), "cooldown not yet elapsed");

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(breaker.should_allow_request(), "should be half-open now");
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    breaker.record_success();
    breaker.record_success();
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_breaker_immediate_block_after_threshold() {
    let registry = BreakerRegistry::new(breaker_config(3, Duration::from_secs(60), 2));
    let key = EndpointKey::new("https", "api.example", 443, "chat");
    let breaker = registry.breaker(&key);

    breaker.record_failure();
    breaker.record_failure();
    assert!(breaker.should_allow_request(), "below threshold");
    breaker.record_failure();
    // No time needs to pass: the block is immediate.
    assert!(!breaker.should_allow_request());
}

#[tokio::test(start_paused = true)]
async fn test_registry_concurrent_access() {
    let registry = Arc::new(BreakerRegistry::new(breaker_config(
        2,
        Duration::from_secs(30),
        1,
    )));

    let mut handles = Vec::new();
    for i in 0..8 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            let key = EndpointKey::new("https", format!("host-{}.example", i % 4), 443, "x");
            let breaker = registry.breaker(&key);
            breaker.record_failure();
            breaker.should_allow_request()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Four distinct endpoints, two failures each: all open.
    assert_eq!(registry.len(), 4);
    for i in 0..4 {
        let key = EndpointKey::new("https", format!("host-{i}.example"), 443, "x");
        assert!(!registry.breaker(&key).should_allow_request());
    }
}

#[test]
fn test_partial_data_overrides_everything() {
    let config = RetryConfig {
        max_retries: 10,
        ..Default::default()
    };
    let kinds = [
        ErrorKind::Transport(TransportFault::Timeout),
        ErrorKind::Transport(TransportFault::ConnectionReset),
        ErrorKind::Http(429),
        ErrorKind::Http(503),
    ];
    for kind in kinds {
        assert!(should_retry(kind, 0, false, &config));
        assert!(!should_retry(kind, 0, true, &config));
    }
}

#[test]
fn test_backoff_bounds_per_attempt() {
    let config = RetryConfig {
        max_retries: 8,
        initial_delay: Duration::from_millis(250),
        max_delay: Duration::from_secs(4),
    };
    for attempt in 0..8 {
        let base = Duration::from_millis(250 * (1u64 << attempt)).min(config.max_delay);
        let delay = retry_delay(attempt, None, &config);
        assert!(
            delay >= base && delay < base + JITTER_CEILING,
            "attempt {attempt}: {delay:?} outside [{base:?}, {base:?} + jitter)"
        );
    }
}

#[test]
fn test_server_hint_respected_and_capped() {
    let config = RetryConfig::default();
    assert_eq!(
        retry_delay(3, Some(Duration::from_millis(1500)), &config),
        Duration::from_millis(1500)
    );
    assert_eq!(
        retry_delay(0, Some(Duration::from_secs(600)), &config),
        Duration::from_secs(60)
    );
}
