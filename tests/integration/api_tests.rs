//! API integration tests for asset delivery and error handling.
//!
//! Tests verify:
//! - Original and transformed responses
//! - Transform failure fallback
//! - Error cases (missing asset id, absent asset, origin failure)
//! - HTTP response codes and headers

use std::sync::Arc;

use axum::http::StatusCode;

use image_gateway::MemoryOriginStore;

use super::test_utils::{
    body_bytes, body_json, cache_status, content_type, create_png, dimensions, get, is_jpeg,
    is_png, is_webp, photo_store, FailingTransformer, TestGateway, UnreachableOriginStore,
};

// =============================================================================
// Original Delivery
// =============================================================================

#[tokio::test]
async fn test_original_served_on_miss() {
    let original = create_png(400, 300);
    let test = TestGateway::new(MemoryOriginStore::new().with_object(
        "photo.png",
        original.clone(),
        "image/png",
    ));

    let response = get(test.router(), "/cdn/photo.png").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(cache_status(&response), "MISS");
    assert_eq!(content_type(&response), "image/png");
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "public, max-age=86400"
    );
    assert!(response.headers().contains_key("etag"));

    let body = body_bytes(response).await;
    assert_eq!(body.as_ref(), original.as_slice());
}

#[tokio::test]
async fn test_invalid_params_serve_original() {
    let test = TestGateway::new(photo_store());

    let response = get(test.router(), "/cdn/photo.png?w=abc&f=tiff&q=high&fit=stretch").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(cache_status(&response), "MISS");
    assert!(test.kv.contains("photo.png").await);
}

#[tokio::test]
async fn test_nested_asset_path() {
    let test = TestGateway::new(MemoryOriginStore::new().with_object(
        "products/2024/shoe.png",
        create_png(10, 10),
        "image/png",
    ));

    let response = get(test.router(), "/cdn/products/2024/shoe.png").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(test.kv.contains("products/2024/shoe.png").await);
}

// =============================================================================
// Transformed Delivery
// =============================================================================

#[tokio::test]
async fn test_resize_and_convert() {
    let test = TestGateway::new(photo_store());

    let response = get(test.router(), "/cdn/photo.png?w=200&f=webp").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(cache_status(&response), "MISS-TRANSFORMED");
    assert_eq!(content_type(&response), "image/webp");

    let body = body_bytes(response).await;
    assert!(is_webp(&body));
    assert_eq!(dimensions(&body), (200, 150));

    assert!(test.kv.contains("photo.png_w200_fwebp").await);
}

#[tokio::test]
async fn test_long_aliases() {
    let test = TestGateway::new(photo_store());

    let response = get(test.router(), "/cdn/photo.jpg?width=100&format=png").await;

    assert_eq!(cache_status(&response), "MISS-TRANSFORMED");
    assert_eq!(content_type(&response), "image/png");
    assert!(test.kv.contains("photo.jpg_w100_fpng").await);

    let body = body_bytes(response).await;
    assert!(is_png(&body));
    assert_eq!(dimensions(&body).0, 100);
}

#[tokio::test]
async fn test_quality_only_keeps_source_format() {
    let test = TestGateway::new(photo_store());

    let response = get(test.router(), "/cdn/photo.jpg?q=40").await;

    assert_eq!(cache_status(&response), "MISS-TRANSFORMED");
    assert_eq!(content_type(&response), "image/jpeg");
    assert!(is_jpeg(&body_bytes(response).await));
    assert!(test.kv.contains("photo.jpg_q40").await);
}

#[tokio::test]
async fn test_pad_fit_fills_box() {
    let test = TestGateway::new(photo_store());

    let response = get(test.router(), "/cdn/photo.png?w=200&h=200&fit=pad").await;

    assert_eq!(cache_status(&response), "MISS-TRANSFORMED");
    assert_eq!(dimensions(&body_bytes(response).await), (200, 200));
}

#[tokio::test]
async fn test_pad_canvas_stays_within_source() {
    let test = TestGateway::new(MemoryOriginStore::new().with_object(
        "tiny.png",
        create_png(4, 4),
        "image/png",
    ));

    let response = get(test.router(), "/cdn/tiny.png?w=8192&h=8192&fit=pad").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(cache_status(&response), "MISS-TRANSFORMED");

    let body = body_bytes(response).await;
    assert_eq!(dimensions(&body), (4, 4));
    assert!(body.len() < 4096);
}

#[tokio::test]
async fn test_no_upscale() {
    let test = TestGateway::new(photo_store());

    let response = get(test.router(), "/cdn/photo.png?w=1000").await;

    assert_eq!(cache_status(&response), "MISS-TRANSFORMED");
    assert_eq!(dimensions(&body_bytes(response).await), (400, 300));
}

// =============================================================================
// Transform Failure
// =============================================================================

#[tokio::test]
async fn test_transform_failure_serves_original() {
    let original = create_png(400, 300);
    let test = TestGateway::new(MemoryOriginStore::new().with_object(
        "photo.png",
        original.clone(),
        "image/png",
    ))
    .with_transformer(Arc::new(FailingTransformer));

    let response = get(test.router(), "/cdn/photo.png?w=200").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(cache_status(&response), "MISS-TRANSFORM-FAILED");
    assert_eq!(content_type(&response), "image/png");
    assert_eq!(body_bytes(response).await.as_ref(), original.as_slice());

    // Nothing is cached for the derivative or the original
    assert_eq!(test.kv.put_count(), 0);
    assert!(!test.kv.contains("photo.png_w200").await);
}

#[tokio::test]
async fn test_undecodable_origin_falls_back() {
    let test = TestGateway::new(MemoryOriginStore::new().with_object(
        "broken.png",
        b"not really a png".to_vec(),
        "image/png",
    ));

    let response = get(test.router(), "/cdn/broken.png?w=50").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(cache_status(&response), "MISS-TRANSFORM-FAILED");
    assert_eq!(body_bytes(response).await.as_ref(), b"not really a png");
}

#[tokio::test]
async fn test_transform_failure_retried_next_request() {
    let test = TestGateway::new(photo_store()).with_transformer(Arc::new(FailingTransformer));

    let first = get(test.router(), "/cdn/photo.png?w=200").await;
    let second = get(test.router(), "/cdn/photo.png?w=200").await;

    assert_eq!(cache_status(&first), "MISS-TRANSFORM-FAILED");
    assert_eq!(cache_status(&second), "MISS-TRANSFORM-FAILED");
    assert_eq!(test.origin.get_count(), 2);
}

// =============================================================================
// Error Cases
// =============================================================================

#[tokio::test]
async fn test_asset_not_found() {
    let test = TestGateway::new(photo_store());

    let response = get(test.router(), "/cdn/missing.png").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(cache_status(&response), "NOT-FOUND");

    let json = body_json(response).await;
    assert_eq!(json["error"], "not_found");
    assert_eq!(json["status"], 404);
    assert_eq!(test.kv.put_count(), 0);
}

#[tokio::test]
async fn test_not_found_regardless_of_params() {
    let test = TestGateway::new(photo_store());

    let response = get(test.router(), "/cdn/missing.png?w=100&f=webp").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(cache_status(&response), "NOT-FOUND");
}

#[tokio::test]
async fn test_missing_asset_id() {
    let test = TestGateway::new(photo_store());

    for uri in ["/cdn", "/cdn/", "/cdn/?w=100"] {
        let response = get(test.router(), uri).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri: {}", uri);
        assert_eq!(cache_status(&response), "BAD-REQUEST");

        let json = body_json(response).await;
        assert_eq!(json["error"], "missing_asset");
        assert_eq!(json["message"], "Image name parameter is missing");
    }

    assert_eq!(test.origin.get_count(), 0);
    assert_eq!(test.kv.get_count(), 0);
}

#[tokio::test]
async fn test_origin_failure() {
    let test = TestGateway::new(MemoryOriginStore::new())
        .with_origin(Arc::new(UnreachableOriginStore));

    let response = get(test.router(), "/cdn/photo.png").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(cache_status(&response), "ERROR");

    let json = body_json(response).await;
    assert_eq!(json["error"], "storage_error");
    assert_eq!(json["message"], "Server error fetching image photo.png");
    assert!(!json["message"].as_str().unwrap().contains("refused"));
}

#[tokio::test]
async fn test_unknown_route() {
    let test = TestGateway::new(photo_store());

    let response = get(test.router(), "/images/photo.png").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().get("x-cache-status").is_none());
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let test = TestGateway::new(photo_store());

    let response = get(test.router(), "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["version"].is_string());
}
