//! HTTP surface tests driving the admin router in-process.

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;
use vitrine_admin::models::NewProduct;
use vitrine_admin::testing::{new_product, new_variant};
use vitrine_admin::webhooks::SIGNATURE_HEADER;
use vitrine_admin::webhooks::signature::sign;
use vitrine_core::ErpId;
use vitrine_integration_tests::{
    TRIGGER_TOKEN, TestContext, WEBHOOK_SECRET, brl, seed_laura_listing,
};

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    serde_json::from_slice(&bytes).expect("JSON body")
}

fn sync_request(token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::post("/sync").header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

fn webhook_request(signature: Option<String>, body: Vec<u8>) -> Request<Body> {
    let mut builder =
        Request::post("/webhooks/erp").header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(body)).expect("valid request")
}

fn signed(body: &[u8]) -> String {
    let secret = SecretString::from(WEBHOOK_SECRET.to_string());
    format!("sha256={}", sign(&secret, body).expect("signable"))
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health() {
    let ctx = TestContext::new();

    let response = ctx
        .app()
        .oneshot(Request::get("/health").body(Body::empty()).expect("valid request"))
        .await
        .expect("infallible");

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    assert_eq!(bytes.as_ref(), b"ok");
}

#[tokio::test]
async fn test_readiness() {
    let ctx = TestContext::new();

    let response = ctx
        .app()
        .oneshot(
            Request::get("/health/ready")
                .body(Body::empty())
                .expect("valid request"),
        )
        .await
        .expect("infallible");

    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// POST /sync
// ============================================================================

#[tokio::test]
async fn test_sync_requires_bearer_token() {
    let ctx = TestContext::new();
    let body = json!({ "action": "sync_products" });

    let response = ctx
        .app()
        .oneshot(sync_request(None, &body))
        .await
        .expect("infallible");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = ctx
        .app()
        .oneshot(sync_request(Some("not-the-token"), &body))
        .await
        .expect("infallible");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(ctx.source.detail_calls().is_empty());
}

#[tokio::test]
async fn test_sync_returns_summary() {
    let ctx = TestContext::new();
    seed_laura_listing(&ctx.source);

    let response = ctx
        .app()
        .oneshot(sync_request(
            Some(TRIGGER_TOKEN),
            &json!({ "action": "sync_products", "limit": 1 }),
        ))
        .await
        .expect("infallible");

    assert_eq!(response.status(), StatusCode::OK);
    let summary = body_json(response).await;
    assert_eq!(summary["action"], "sync_products");
    assert_eq!(summary["totalGroups"], 2);
    assert_eq!(summary["processed"], 1);
    assert_eq!(summary["imported"], 1);
    assert_eq!(summary["nextOffset"], 1);
    assert_eq!(summary["log"][0]["status"], "imported");
}

#[tokio::test]
async fn test_repeated_first_import_conflicts() {
    let ctx = TestContext::new();
    seed_laura_listing(&ctx.source);
    let body = json!({ "action": "first_import" });

    let response = ctx
        .app()
        .oneshot(sync_request(Some(TRIGGER_TOKEN), &body))
        .await
        .expect("infallible");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["firstImportCompleted"], true);

    let response = ctx
        .app()
        .oneshot(sync_request(Some(TRIGGER_TOKEN), &body))
        .await
        .expect("infallible");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(body_json(response).await["error"].is_string());
}

#[tokio::test]
async fn test_debug_product_needs_external_id() {
    let ctx = TestContext::new();

    let response = ctx
        .app()
        .oneshot(sync_request(
            Some(TRIGGER_TOKEN),
            &json!({ "action": "debug_product" }),
        ))
        .await
        .expect("infallible");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_action_rejected() {
    let ctx = TestContext::new();

    let response = ctx
        .app()
        .oneshot(sync_request(
            Some(TRIGGER_TOKEN),
            &json!({ "action": "drop_everything" }),
        ))
        .await
        .expect("infallible");

    assert!(response.status().is_client_error());
}

// ============================================================================
// POST /webhooks/erp
// ============================================================================

#[tokio::test]
async fn test_signed_webhook_applies_stock() {
    let ctx = TestContext::new();
    let product = ctx.store.seed_product(&NewProduct {
        external_product_id: Some(ErpId::new(2000)),
        ..new_product("Tênis Max", "tenis-max", brl(29990))
    });
    let unico = ctx.store.seed_variant(&new_variant(product.id, "Único"));
    let body = serde_json::to_vec(&json!({
        "event": "stock.updated",
        "eventId": "evt-http-1",
        "data": { "id": 2000, "saldoVirtualTotal": 8 }
    }))
    .expect("serializable body");

    let response = ctx
        .app()
        .oneshot(webhook_request(Some(signed(&body)), body))
        .await
        .expect("infallible");

    assert_eq!(response.status(), StatusCode::OK);
    let ack = body_json(response).await;
    assert_eq!(ack["received"], 1);
    assert_eq!(ack["processed"], 1);
    assert_eq!(ack["results"][0]["eventId"], "evt-http-1");
    assert_eq!(ctx.store.variant(unico.id).map(|v| v.stock_quantity), Some(8));
}

#[tokio::test]
async fn test_unsigned_webhook_unauthorized() {
    let ctx = TestContext::new();
    let body = br#"{"event":"stock.updated","eventId":"e","data":{"id":1,"saldo":1}}"#.to_vec();

    let response = ctx
        .app()
        .oneshot(webhook_request(None, body))
        .await
        .expect("infallible");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(ctx.store.webhook_events().is_empty());
}

#[tokio::test]
async fn test_malformed_webhook_body_bad_request() {
    let ctx = TestContext::new();
    let body = b"not json at all".to_vec();

    let response = ctx
        .app()
        .oneshot(webhook_request(Some(signed(&body)), body))
        .await
        .expect("infallible");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
