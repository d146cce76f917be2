use crate::errors::RailError;
use crate::metrics;
use crate::models::{
    ApiResponse, ConfirmQuoteRequest, GenerateQuoteRequest, GetTransactionRequest,
    GetTransactionsRequest, RefreshQuoteRequest, Transaction, UpdateTransactionStatusRequest,
};
use crate::services::QuoteService;
use crate::webhook::WebhookNotifier;
use actix_web::{error::JsonPayloadError, http::StatusCode, web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::error;

/// Health check endpoint
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": 200,
        "message": "Liquidity Rail Provider API is running",
        "data": {
            "timestamp": Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}

/// Generate quote endpoint
pub async fn generate_quote(
    service: web::Data<Arc<QuoteService>>,
    request: web::Json<GenerateQuoteRequest>,
) -> Result<HttpResponse, RailError> {
    let quote = service.generate_quote(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("Quote generated successfully", quote)))
}

/// Confirm quote endpoint
pub async fn confirm_quote(
    service: web::Data<Arc<QuoteService>>,
    notifier: Option<web::Data<Arc<WebhookNotifier>>>,
    request: web::Json<ConfirmQuoteRequest>,
) -> Result<HttpResponse, RailError> {
    let confirmation = service.confirm_quote(request.into_inner()).await?;

    if let Some(notifier) = notifier {
        if let Ok(transaction) = service.get_transaction(&confirmation.transaction_id).await {
            dispatch_transaction_event(notifier.get_ref().clone(), transaction);
        }
    }

    Ok(HttpResponse::Ok().json(ApiResponse::success(
        "Quote confirmed successfully",
        confirmation,
    )))
}

/// Refresh quote endpoint
pub async fn refresh_quote(
    service: web::Data<Arc<QuoteService>>,
    request: web::Json<RefreshQuoteRequest>,
) -> Result<HttpResponse, RailError> {
    let refreshed = service.refresh_quote(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(
        "Quote refreshed successfully",
        refreshed,
    )))
}

/// Get transaction endpoint
pub async fn get_transaction(
    service: web::Data<Arc<QuoteService>>,
    request: web::Json<GetTransactionRequest>,
) -> Result<HttpResponse, RailError> {
    let transaction = service.get_transaction(&request.transaction_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("Transaction found", transaction)))
}

/// List transactions for a provider
pub async fn get_transactions(
    service: web::Data<Arc<QuoteService>>,
    request: web::Json<GetTransactionsRequest>,
) -> Result<HttpResponse, RailError> {
    let transactions = service.get_transactions(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(
        "Transactions retrieved successfully",
        transactions,
    )))
}

/// Apply a settlement outcome to a transaction
pub async fn update_transaction_status(
    service: web::Data<Arc<QuoteService>>,
    notifier: Option<web::Data<Arc<WebhookNotifier>>>,
    request: web::Json<UpdateTransactionStatusRequest>,
) -> Result<HttpResponse, RailError> {
    let transaction = service
        .update_transaction_status(request.into_inner())
        .await?;

    if let Some(notifier) = notifier {
        dispatch_transaction_event(notifier.get_ref().clone(), transaction.clone());
    }

    Ok(HttpResponse::Ok().json(ApiResponse::success(
        "Transaction status updated successfully",
        transaction,
    )))
}

/// Fire-and-forget: delivery failures are logged, never surfaced to the caller
fn dispatch_transaction_event(notifier: Arc<WebhookNotifier>, transaction: Transaction) {
    tokio::spawn(async move {
        if let Err(e) = notifier.notify_transaction(&transaction).await {
            error!(
                transaction_id = %transaction.transaction_id,
                "Failed to deliver transaction webhook: {}", e
            );
        }
    });
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint() -> HttpResponse {
    match metrics::metrics_handler() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => HttpResponse::InternalServerError().json(ApiResponse::<()>::failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to gather metrics: {}", e),
        )),
    }
}

/// Fallback for unmatched routes
pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ApiResponse::<()>::failure(
        StatusCode::NOT_FOUND,
        "Endpoint not found",
    ))
}

fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    RailError::Validation(err.to_string()).into()
}

/// Configure routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .route("/health", web::get().to(health_check))
        .route("/metrics", web::get().to(metrics_endpoint))
        .service(
            web::scope("/api")
                .route("/generate-lr-quote", web::post().to(generate_quote))
                .route("/confirm-lr-quote", web::post().to(confirm_quote))
                .route("/refresh-lr-quote", web::post().to(refresh_quote))
                .route("/get-lr-transaction", web::post().to(get_transaction))
                .route("/get-lr-transactions", web::post().to(get_transactions))
                .route(
                    "/auto-transaction-status",
                    web::post().to(update_transaction_status),
                ),
        );
}
