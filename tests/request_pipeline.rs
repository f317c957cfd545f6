//! End-to-end tests over a real TCP listener.

use reqwest::StatusCode;
use serde_json::{json, Value};

use timevault_guard::config::loader::parse_config;

mod common;

#[tokio::test]
async fn test_calculator_query_is_accepted_with_headers() {
    let gateway = common::start_default_gateway().await;

    let res = gateway
        .client
        .get(gateway.url("/api/calculator?amount=0.5&currency=ETH&metal=silver&years=10"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let headers = res.headers().clone();
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert!(headers["content-security-policy"]
        .to_str()
        .unwrap()
        .contains("connect-src 'self' https://api.coingecko.com"));

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["endpoint"], "calculator");
    assert_eq!(body["data"]["amount"], json!(0.5));
    assert_eq!(body["data"]["years"], json!(10));

    gateway.stop().await;
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let gateway = common::start_default_gateway().await;

    let res = gateway
        .client
        .get(gateway.url("/health"))
        .header("x-request-id", "trace-abc-123")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "trace-abc-123");

    gateway.stop().await;
}

#[tokio::test]
async fn test_contact_rate_limit_per_client() {
    let gateway = common::start_default_gateway().await;
    let url = gateway.url("/api/contact");
    let body = json!({"name": "Ada", "email": "ada@example.com", "message": "Tell me about gold bars."});

    for _ in 0..3 {
        let res = gateway.client.post(&url).json(&body).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let limited = gateway.client.post(&url).json(&body).send().await.unwrap();
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.headers().contains_key("retry-after"));
    let error: Value = limited.json().await.unwrap();
    assert_eq!(error["error"], "Request validation failed");
    assert_eq!(error["details"], json!(["Too many requests"]));

    // a different client has its own window
    let other = gateway
        .client
        .post(&url)
        .header("x-forwarded-for", "203.0.113.50")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(other.status(), StatusCode::OK);

    gateway.stop().await;
}

#[tokio::test]
async fn test_hostile_payload_is_rejected() {
    let gateway = common::start_default_gateway().await;

    let res = gateway
        .client
        .post(gateway.url("/api/contact"))
        .json(&json!({
            "name": "<script>alert(1)</script>",
            "email": "x@example.com",
            "message": "click <img src=x onerror=alert(1)>"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    let details: Vec<String> = serde_json::from_value(body["details"].clone()).unwrap();
    assert!(details.contains(&"Potential XSS attack detected".to_string()));
    // the payload itself is never echoed
    assert!(!body.to_string().contains("alert(1)"));

    gateway.stop().await;
}

#[tokio::test]
async fn test_affiliate_form_submission() {
    let gateway = common::start_default_gateway().await;

    let res = gateway
        .client
        .post(gateway.url("/api/affiliate"))
        .form(&[
            ("name", "Grace Hopper"),
            ("email", "Grace@Example.com"),
            ("website", "https://www.timevault.app/partners"),
            ("platforms", "youtube"),
            ("platforms", "newsletter"),
        ])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["email"], "grace@example.com");
    assert_eq!(body["data"]["platforms"], json!(["youtube", "newsletter"]));

    gateway.stop().await;
}

#[tokio::test]
async fn test_unsupported_body_and_unknown_path() {
    let gateway = common::start_default_gateway().await;

    let res = gateway
        .client
        .post(gateway.url("/api/payment"))
        .header("content-type", "text/plain")
        .body("priceId=price_12345678")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["details"], json!(["Invalid request format"]));

    let missing = gateway.client.get(gateway.url("/api/unknown")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(missing.headers()["x-frame-options"], "DENY");

    gateway.stop().await;
}

#[tokio::test]
async fn test_endpoints_from_config_file() {
    let config = parse_config(
        r#"
        [listener]
        bind_address = "127.0.0.1:0"

        [security.hsts]
        enabled = false

        [endpoints.quote]
        methods = ["GET"]

        [endpoints.quote.rate_limit]
        window_ms = 60000
        max_requests = 1
        message = "Quote limit reached"

        [[endpoints.quote.rules]]
        field = "symbol"
        type = "string"
        required = true
        pattern = "^[A-Z]{3}$"
        "#,
    )
    .unwrap();
    let gateway = common::start_gateway(config).await;

    let res = gateway.client.get(gateway.url("/api/quote?symbol=XAU")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(!res.headers().contains_key("strict-transport-security"));

    let limited = gateway.client.get(gateway.url("/api/quote?symbol=XAU")).send().await.unwrap();
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = limited.json().await.unwrap();
    assert_eq!(body["details"], json!(["Quote limit reached"]));

    // presets are replaced by the configured endpoints
    let calculator = gateway.client.get(gateway.url("/api/calculator")).send().await.unwrap();
    assert_eq!(calculator.status(), StatusCode::NOT_FOUND);

    gateway.stop().await;
}
