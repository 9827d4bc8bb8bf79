//! Rate limiting integration tests.
//!
//! Tests verify:
//! - Denied callers get 429 before any cache or origin work
//! - Callers are keyed by their peer address, or by their forwarded address
//!   only when the router trusts `X-Forwarded-For`
//! - Callers without an address share one bucket

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::http::StatusCode;

use image_gateway::KeyedRateLimiter;

use super::test_utils::{
    body_json, cache_status, get, get_from, get_via_peer, photo_store, DenyAll, TestGateway,
};

fn burst_limiter(burst: u32) -> Arc<KeyedRateLimiter> {
    Arc::new(KeyedRateLimiter::new(
        NonZeroU32::new(1).unwrap(),
        NonZeroU32::new(burst).unwrap(),
    ))
}

#[tokio::test]
async fn test_denied_request_short_circuits() {
    let limiter = DenyAll::default();
    let test = TestGateway::new(photo_store()).with_limiter(Arc::new(limiter.clone()));

    let response = get_from(test.router(), "/cdn/photo.png?w=100", "203.0.113.7").await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(cache_status(&response), "RATE-LIMITED");

    let json = body_json(response).await;
    assert_eq!(json["error"], "rate_limited");
    assert_eq!(json["message"], "Too many requests");

    assert_eq!(limiter.call_count(), 1);
    assert_eq!(test.kv.get_count(), 0);
    assert_eq!(test.kv.put_count(), 0);
    assert_eq!(test.origin.get_count(), 0);
}

#[tokio::test]
async fn test_missing_asset_checked_before_admission() {
    let limiter = DenyAll::default();
    let test = TestGateway::new(photo_store()).with_limiter(Arc::new(limiter.clone()));

    let response = get(test.router(), "/cdn/").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(limiter.call_count(), 0);
}

#[tokio::test]
async fn test_burst_exhaustion() {
    let test = TestGateway::new(photo_store())
        .with_limiter(burst_limiter(2))
        .trusting_forwarded_for();

    let first = get_from(test.router(), "/cdn/photo.png", "198.51.100.1").await;
    let second = get_from(test.router(), "/cdn/photo.png", "198.51.100.1").await;
    let third = get_from(test.router(), "/cdn/photo.png", "198.51.100.1").await;

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(cache_status(&first), "MISS");
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(cache_status(&second), "HIT");
    assert_eq!(third.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(cache_status(&third), "RATE-LIMITED");
}

#[tokio::test]
async fn test_clients_limited_independently() {
    let test = TestGateway::new(photo_store())
        .with_limiter(burst_limiter(1))
        .trusting_forwarded_for();

    let a1 = get_from(test.router(), "/cdn/photo.png", "198.51.100.1").await;
    let a2 = get_from(test.router(), "/cdn/photo.png", "198.51.100.1").await;
    let b1 = get_from(test.router(), "/cdn/photo.png", "198.51.100.2").await;

    assert_eq!(a1.status(), StatusCode::OK);
    assert_eq!(a2.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(b1.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_first_forwarded_address_is_the_key() {
    let test = TestGateway::new(photo_store())
        .with_limiter(burst_limiter(1))
        .trusting_forwarded_for();

    let first = get_from(test.router(), "/cdn/photo.png", "198.51.100.9, 10.0.0.1").await;
    let second = get_from(test.router(), "/cdn/photo.png", "198.51.100.9, 10.0.0.2").await;

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_anonymous_callers_share_a_bucket() {
    let test = TestGateway::new(photo_store()).with_limiter(burst_limiter(1));

    let first = get(test.router(), "/cdn/photo.png").await;
    let second = get(test.router(), "/cdn/photo.jpg").await;

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_forwarded_for_ignored_by_default() {
    let limiter = burst_limiter(1);
    let test = TestGateway::new(photo_store()).with_limiter(limiter.clone());
    let peer = SocketAddr::from(([192, 0, 2, 10], 40000));

    let mut admitted = 0;
    for i in 0..20 {
        let forwarded = format!("198.51.100.{}", i);
        let response = get_via_peer(test.router(), "/cdn/photo.png", peer, Some(&forwarded)).await;
        if response.status() == StatusCode::OK {
            admitted += 1;
        }
    }

    assert_eq!(admitted, 1);
    assert_eq!(limiter.len(), 1);
}

#[tokio::test]
async fn test_peers_limited_independently() {
    let test = TestGateway::new(photo_store()).with_limiter(burst_limiter(1));
    let a = SocketAddr::from(([192, 0, 2, 10], 40000));
    let b = SocketAddr::from(([192, 0, 2, 11], 40000));

    let a1 = get_via_peer(test.router(), "/cdn/photo.png", a, None).await;
    let a2 = get_via_peer(test.router(), "/cdn/photo.png", a, None).await;
    let b1 = get_via_peer(test.router(), "/cdn/photo.png", b, None).await;

    assert_eq!(a1.status(), StatusCode::OK);
    assert_eq!(a2.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(b1.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_trusted_forwarded_for_overrides_peer() {
    let test = TestGateway::new(photo_store())
        .with_limiter(burst_limiter(1))
        .trusting_forwarded_for();
    let proxy = SocketAddr::from(([10, 0, 0, 1], 40000));

    let first = get_via_peer(test.router(), "/cdn/photo.png", proxy, Some("198.51.100.1")).await;
    let second = get_via_peer(test.router(), "/cdn/photo.png", proxy, Some("198.51.100.2")).await;

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);
}
