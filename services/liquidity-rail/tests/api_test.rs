// HTTP surface tests: routing, envelopes and API credentials

use actix_web::dev::Service;
use actix_web::{http::StatusCode, test, web, App};
use liquidity_rail::config::{AuthConfig, QuoteConfig};
use liquidity_rail::handlers;
use liquidity_rail::rates::RateEngine;
use liquidity_rail::security_middleware::ApiKeyAuth;
use liquidity_rail::services::QuoteService;
use liquidity_rail::store::{InMemoryQuoteStore, InMemoryTransactionStore};
use serde_json::{json, Value};
use std::sync::Arc;

fn quote_service() -> web::Data<Arc<QuoteService>> {
    web::Data::new(Arc::new(QuoteService::new(
        Arc::new(InMemoryQuoteStore::new()),
        Arc::new(InMemoryTransactionStore::new()),
        RateEngine::default(),
        QuoteConfig::default(),
    )))
}

macro_rules! rail_app {
    () => {
        test::init_service(
            App::new()
                .app_data(quote_service())
                .configure(handlers::configure_routes)
                .default_service(web::to(handlers::not_found)),
        )
        .await
    };
}

macro_rules! post_json {
    ($app:expr, $uri:expr, $body:expr $(,)?) => {{
        let req = test::TestRequest::post()
            .uri($uri)
            .set_json($body)
            .to_request();
        let resp = test::call_service($app, req).await;
        let status = resp.status();
        let body: Value = test::read_body_json(resp).await;
        (status, body)
    }};
}

#[actix_web::test]
async fn test_health() {
    let app = rail_app!();
    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], 200);
    assert_eq!(body["message"], "Liquidity Rail Provider API is running");
    assert!(body["data"]["timestamp"].is_string());
}

#[actix_web::test]
async fn test_generate_confirm_and_fetch() {
    let app = rail_app!();

    let (status, quote) = post_json!(
        &app,
        "/api/generate-lr-quote",
        json!({ "amount": 100, "currency": "UGX", "asset_code": "USDC", "service_id": 1000 }),
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quote["status"], 200);
    assert_eq!(quote["message"], "Quote generated successfully");
    assert_eq!(quote["data"]["rate"], json!(3557.62));
    assert_eq!(quote["data"]["fee"], json!(1778.81));
    assert_eq!(quote["data"]["service_code"], "1000");

    let quote_id = quote["data"]["quote_id"].as_str().unwrap().to_string();

    let (status, confirmed) = post_json!(
        &app,
        "/api/confirm-lr-quote",
        json!({
            "quote_id": quote_id,
            "reference_id": "ref-9",
            "payment_method_id": "pm-9",
            "sending_address": "0x2222222222222222222222222222222222222222",
            "source": "exchange",
            "company_id": 42,
            "payment_method": {
                "type": "bank",
                "bank_name": "Stanbic",
                "account_number": "9030001234",
                "account_name": "Acme Ltd"
            }
        }),
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["message"], "Quote confirmed successfully");
    assert_eq!(confirmed["data"]["status"], "PENDING");

    let transaction_id = confirmed["data"]["transaction_id"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, fetched) = post_json!(
        &app,
        "/api/get-lr-transaction",
        json!({ "transaction_id": transaction_id }),
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["message"], "Transaction found");
    assert_eq!(fetched["data"]["provider_id"], "42");
    assert_eq!(fetched["data"]["details"]["kind"], "composite");
    assert_eq!(
        fetched["data"]["details"]["payout"]["payment_method"]["type"],
        "bank"
    );

    let (status, listed) = post_json!(
        &app,
        "/api/get-lr-transactions",
        json!({ "provider_id": "42" }),
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);

    let (status, updated) = post_json!(
        &app,
        "/api/auto-transaction-status",
        json!({ "transaction_id": transaction_id, "status": "SUCCESS" }),
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["message"], "Transaction status updated successfully");
    assert_eq!(updated["data"]["status"], "SUCCESS");

    let (status, rejected) = post_json!(
        &app,
        "/api/auto-transaction-status",
        json!({ "transaction_id": transaction_id, "status": "PENDING" }),
    );
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(rejected["status"], 409);
    assert!(rejected["data"].is_null());
}

#[actix_web::test]
async fn test_refresh_over_http() {
    let app = rail_app!();

    let (_, quote) = post_json!(
        &app,
        "/api/generate-lr-quote",
        json!({ "amount": 25, "currency": "ZAR", "asset_code": "USDT" }),
    );
    let quote_id = quote["data"]["quote_id"].as_str().unwrap().to_string();

    let (status, refreshed) = post_json!(
        &app,
        "/api/refresh-lr-quote",
        json!({ "quote_id": quote_id }),
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refreshed["message"], "Quote refreshed successfully");
    assert_eq!(refreshed["data"]["quote_id"], quote_id.as_str());
    assert!(refreshed["data"]["new_rate"].is_number());
}

#[actix_web::test]
async fn test_not_found_envelopes() {
    let app = rail_app!();

    let (status, body) = post_json!(
        &app,
        "/api/get-lr-transaction",
        json!({ "transaction_id": "txunknown" }),
    );
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "status": 404, "message": "Transaction not found", "data": null }));

    let (status, body) = post_json!(
        &app,
        "/api/confirm-lr-quote",
        json!({ "quote_id": "qunknown" }),
    );
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Quote not found");

    let (status, body) = post_json!(&app, "/api/no-such-route", json!({}));
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Endpoint not found");
}

#[actix_web::test]
async fn test_malformed_body_is_bad_request() {
    let app = rail_app!();

    let req = test::TestRequest::post()
        .uri("/api/generate-lr-quote")
        .insert_header(("content-type", "application/json"))
        .set_payload("{\"amount\": ")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], 400);
    assert!(body["data"].is_null());

    let (status, body) = post_json!(
        &app,
        "/api/generate-lr-quote",
        json!({ "amount": 0, "currency": "UGX", "asset_code": "USDC" }),
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[actix_web::test]
async fn test_oversized_amount_is_bad_request() {
    let app = rail_app!();

    let (status, body) = post_json!(
        &app,
        "/api/generate-lr-quote",
        json!({ "amount": 1e26, "currency": "UGX", "asset_code": "USDC" }),
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({ "status": 400, "message": "Validation error: amount: too large", "data": null })
    );
}

#[actix_web::test]
async fn test_api_credentials_enforced_when_configured() {
    let app = test::init_service(
        App::new()
            .app_data(quote_service())
            .wrap(ApiKeyAuth::new(AuthConfig {
                api_key: "key-1".to_string(),
                api_secret: "secret-1".to_string(),
            }))
            .configure(handlers::configure_routes)
            .default_service(web::to(handlers::not_found)),
    )
    .await;

    let body = json!({ "amount": 1, "currency": "UGX", "asset_code": "USDT" });

    let req = test::TestRequest::post()
        .uri("/api/generate-lr-quote")
        .set_json(&body)
        .to_request();
    let err = app
        .call(req)
        .await
        .err()
        .expect("missing credentials must be rejected");
    assert_eq!(err.error_response().status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/generate-lr-quote")
        .insert_header(("x-api-key", "key-1"))
        .insert_header(("x-api-secret", "wrong"))
        .set_json(&body)
        .to_request();
    assert!(app.call(req).await.is_err());

    let req = test::TestRequest::post()
        .uri("/api/generate-lr-quote")
        .insert_header(("x-api-key", "key-1"))
        .insert_header(("x-api-secret", "secret-1"))
        .set_json(&body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_open_when_no_credentials_configured() {
    let app = test::init_service(
        App::new()
            .app_data(quote_service())
            .wrap(ApiKeyAuth::new(AuthConfig::default()))
            .configure(handlers::configure_routes)
            .default_service(web::to(handlers::not_found)),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/get-lr-transactions")
        .set_json(json!({ "provider_id": 1 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"], json!([]));
}
