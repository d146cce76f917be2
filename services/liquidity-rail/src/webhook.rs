// Outbound webhook delivery to the configured receiver.
// Authenticates with a cached bearer token, posts typed payment events, never retries.

use crate::config::WebhookConfig;
use crate::metrics;
use crate::models::{Transaction, TransactionStatus};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Webhook endpoints are not configured")]
    NotConfigured,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Webhook delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<validator::ValidationErrors> for WebhookError {
    fn from(err: validator::ValidationErrors) -> Self {
        WebhookError::InvalidPayload(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    CryptoReceived,
    CryptoSent,
    CryptoFailed,
    FiatSent,
    FiatFailed,
    FiatPending,
    TransactionCreated,
    TransactionUpdated,
    TransactionCompleted,
    TransactionFailed,
}

impl WebhookEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEventType::CryptoReceived => "crypto_received",
            WebhookEventType::CryptoSent => "crypto_sent",
            WebhookEventType::CryptoFailed => "crypto_failed",
            WebhookEventType::FiatSent => "fiat_sent",
            WebhookEventType::FiatFailed => "fiat_failed",
            WebhookEventType::FiatPending => "fiat_pending",
            WebhookEventType::TransactionCreated => "transaction_created",
            WebhookEventType::TransactionUpdated => "transaction_updated",
            WebhookEventType::TransactionCompleted => "transaction_completed",
            WebhookEventType::TransactionFailed => "transaction_failed",
        }
    }
}

impl fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoEvent {
    Received,
    Sent,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiatEvent {
    Sent,
    Failed,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionEvent {
    Created,
    Updated,
    Completed,
    Failed,
}

impl From<CryptoEvent> for WebhookEventType {
    fn from(event: CryptoEvent) -> Self {
        match event {
            CryptoEvent::Received => WebhookEventType::CryptoReceived,
            CryptoEvent::Sent => WebhookEventType::CryptoSent,
            CryptoEvent::Failed => WebhookEventType::CryptoFailed,
        }
    }
}

impl From<FiatEvent> for WebhookEventType {
    fn from(event: FiatEvent) -> Self {
        match event {
            FiatEvent::Sent => WebhookEventType::FiatSent,
            FiatEvent::Failed => WebhookEventType::FiatFailed,
            FiatEvent::Pending => WebhookEventType::FiatPending,
        }
    }
}

impl From<TransactionEvent> for WebhookEventType {
    fn from(event: TransactionEvent) -> Self {
        match event {
            TransactionEvent::Created => WebhookEventType::TransactionCreated,
            TransactionEvent::Updated => WebhookEventType::TransactionUpdated,
            TransactionEvent::Completed => WebhookEventType::TransactionCompleted,
            TransactionEvent::Failed => WebhookEventType::TransactionFailed,
        }
    }
}

impl TransactionEvent {
    /// Event reported when a transaction reaches `status`.
    pub fn for_status(status: TransactionStatus) -> Self {
        match status {
            TransactionStatus::Pending => TransactionEvent::Created,
            TransactionStatus::Success => TransactionEvent::Updated,
            TransactionStatus::Completed => TransactionEvent::Completed,
            TransactionStatus::Failed => TransactionEvent::Failed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, validator::Validate)]
pub struct CryptoWebhookData {
    #[validate(length(min = 1))]
    pub amount: String,
    #[validate(length(min = 1))]
    pub chain: String,
    #[validate(length(min = 1))]
    pub hash: String,
    #[validate(length(min = 1))]
    pub from_address: String,
    #[validate(length(min = 1))]
    pub to_address: String,
    #[validate(length(min = 1))]
    pub asset_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
    pub fee: String,
    #[validate(length(min = 1))]
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, validator::Validate)]
pub struct FiatWebhookData {
    #[validate(length(min = 1))]
    pub amount: String,
    pub amount_delivered: Decimal,
    #[validate(length(min = 3, max = 4))]
    pub currency: String,
    #[validate(length(min = 1))]
    pub reference_id: String,
    #[validate(length(min = 1))]
    pub account_number: String,
    pub payment_type: String,
    pub payment_method: String,
    pub network: String,
    pub country: String,
    pub receiver_name: String,
    pub fee: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WebhookPayload {
    Crypto(CryptoWebhookData),
    Fiat(FiatWebhookData),
    Transaction(serde_json::Value),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "eventType")]
    pub event_type: WebhookEventType,
    pub provider_id: String,
    pub quote_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub data: WebhookPayload,
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    secret_key: &'a str,
    api_key: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    status: u16,
    #[serde(default)]
    message: String,
    data: Option<AuthTokenData>,
}

#[derive(Debug, Deserialize)]
struct AuthTokenData {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    /// Already shortened by the safety margin.
    expires_at: DateTime<Utc>,
}

pub struct WebhookNotifier {
    config: WebhookConfig,
    http_client: Client,
    // Held across the auth round-trip so concurrent sends share one fetch
    token: Mutex<Option<CachedToken>>,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> Result<Self, WebhookError> {
        if !config.is_configured() {
            return Err(WebhookError::NotConfigured);
        }

        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            config,
            http_client,
            token: Mutex::new(None),
        })
    }

    /// Return a valid bearer token, fetching a new one only when the cached
    /// token is missing or past its (margin-adjusted) expiry.
    pub async fn authenticate(&self) -> Result<String, WebhookError> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if Utc::now() < token.expires_at {
                return Ok(token.access_token.clone());
            }
            debug!("Cached webhook token expired, refreshing");
        }

        let fresh = self.fetch_token().await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);

        Ok(access_token)
    }

    async fn fetch_token(&self) -> Result<CachedToken, WebhookError> {
        metrics::AUTH_TOKEN_FETCHES.inc();

        let response = self
            .http_client
            .post(&self.config.auth_url)
            .json(&AuthRequest {
                secret_key: &self.config.secret_key,
                api_key: &self.config.api_key,
            })
            .send()
            .await
            .map_err(|e| WebhookError::AuthenticationFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(WebhookError::AuthenticationFailed(format!(
                "auth endpoint returned {}",
                response.status()
            )));
        }

        let body: AuthResponse = response
            .json()
            .await
            .map_err(|e| WebhookError::AuthenticationFailed(e.to_string()))?;

        if body.status != 200 {
            return Err(WebhookError::AuthenticationFailed(body.message));
        }

        let data = body.data.ok_or_else(|| {
            WebhookError::AuthenticationFailed("auth response carried no token".to_string())
        })?;

        let expires_at = Duration::try_seconds(data.expires_in)
            .zip(Duration::try_seconds(self.config.token_margin_seconds))
            .and_then(|(lifetime, margin)| {
                Utc::now()
                    .checked_add_signed(lifetime)?
                    .checked_sub_signed(margin)
            })
            .ok_or_else(|| {
                WebhookError::AuthenticationFailed(format!(
                    "token lifetime out of range: {}s",
                    data.expires_in
                ))
            })?;

        info!("Obtained webhook auth token valid until {}", expires_at);

        Ok(CachedToken {
            access_token: data.access_token,
            expires_at,
        })
    }

    /// Deliver one event. Failures are returned to the caller as-is.
    pub async fn send(&self, event: &WebhookEvent) -> Result<(), WebhookError> {
        let access_token = self.authenticate().await?;
        let event_type = event.event_type.as_str();

        let result = self
            .http_client
            .post(&self.config.webhook_url)
            .bearer_auth(access_token)
            .json(event)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                metrics::WEBHOOKS_SENT
                    .with_label_values(&[event_type, "timeout"])
                    .inc();
                warn!("Webhook {} timed out for quote {}", event_type, event.quote_id);
                return Err(WebhookError::DeliveryFailed(format!(
                    "timed out after {}s",
                    self.config.timeout_seconds
                )));
            }
            Err(e) => {
                metrics::WEBHOOKS_SENT
                    .with_label_values(&[event_type, "error"])
                    .inc();
                return Err(WebhookError::Http(e));
            }
        };

        if !response.status().is_success() {
            metrics::WEBHOOKS_SENT
                .with_label_values(&[event_type, "rejected"])
                .inc();
            warn!(
                "Webhook {} rejected with {} for quote {}",
                event_type,
                response.status(),
                event.quote_id
            );
            return Err(WebhookError::DeliveryFailed(format!(
                "receiver returned {}",
                response.status()
            )));
        }

        metrics::WEBHOOKS_SENT
            .with_label_values(&[event_type, "delivered"])
            .inc();
        info!("Delivered webhook {} for quote {}", event_type, event.quote_id);

        Ok(())
    }

    pub async fn send_crypto_webhook(
        &self,
        provider_id: &str,
        quote_id: &str,
        event: CryptoEvent,
        data: CryptoWebhookData,
    ) -> Result<(), WebhookError> {
        validator::Validate::validate(&data)?;

        self.send(&WebhookEvent {
            event_type: event.into(),
            provider_id: provider_id.to_string(),
            quote_id: quote_id.to_string(),
            status: None,
            data: WebhookPayload::Crypto(data),
        })
        .await
    }

    /// Fiat events always carry an explicit outcome in `status`.
    pub async fn send_fiat_webhook(
        &self,
        provider_id: &str,
        quote_id: &str,
        event: FiatEvent,
        status: &str,
        data: FiatWebhookData,
    ) -> Result<(), WebhookError> {
        if status.is_empty() {
            return Err(WebhookError::InvalidPayload(
                "fiat events require a status".to_string(),
            ));
        }
        validator::Validate::validate(&data)?;

        self.send(&WebhookEvent {
            event_type: event.into(),
            provider_id: provider_id.to_string(),
            quote_id: quote_id.to_string(),
            status: Some(status.to_string()),
            data: WebhookPayload::Fiat(data),
        })
        .await
    }

    pub async fn send_transaction_webhook(
        &self,
        provider_id: &str,
        quote_id: &str,
        event: TransactionEvent,
        data: serde_json::Value,
    ) -> Result<(), WebhookError> {
        if !data.is_object() {
            return Err(WebhookError::InvalidPayload(
                "transaction data must be a JSON object".to_string(),
            ));
        }

        self.send(&WebhookEvent {
            event_type: event.into(),
            provider_id: provider_id.to_string(),
            quote_id: quote_id.to_string(),
            status: None,
            data: WebhookPayload::Transaction(data),
        })
        .await
    }

    pub async fn notify_crypto_received(
        &self,
        provider_id: &str,
        quote_id: &str,
        data: CryptoWebhookData,
    ) -> Result<(), WebhookError> {
        self.send_crypto_webhook(provider_id, quote_id, CryptoEvent::Received, data)
            .await
    }

    pub async fn notify_fiat_sent(
        &self,
        provider_id: &str,
        quote_id: &str,
        data: FiatWebhookData,
    ) -> Result<(), WebhookError> {
        self.send_fiat_webhook(provider_id, quote_id, FiatEvent::Sent, "SUCCESS", data)
            .await
    }

    /// Report a transaction's current state as the matching lifecycle event
    pub async fn notify_transaction(&self, transaction: &Transaction) -> Result<(), WebhookError> {
        let data = serde_json::to_value(transaction)
            .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;

        self.send_transaction_webhook(
            &transaction.provider_id,
            &transaction.quote_id,
            TransactionEvent::for_status(transaction.status),
            data,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn crypto_data() -> CryptoWebhookData {
        CryptoWebhookData {
            amount: "10".to_string(),
            chain: "CELO".to_string(),
            hash: "0xdeadbeef".to_string(),
            from_address: "0xfrom".to_string(),
            to_address: "0xto".to_string(),
            asset_code: "CUSD".to_string(),
            contract_address: None,
            fee: "0.01".to_string(),
            currency: "UGX".to_string(),
            memo: None,
        }
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = WebhookEvent {
            event_type: CryptoEvent::Received.into(),
            provider_id: "1000".to_string(),
            quote_id: "qabc".to_string(),
            status: None,
            data: WebhookPayload::Crypto(crypto_data()),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["eventType"], "crypto_received");
        assert!(value.get("status").is_none());
        assert!(value["data"].get("contract_address").is_none());
        assert!(value["data"].get("memo").is_none());
        assert_eq!(value["data"]["hash"], json!("0xdeadbeef"));
    }

    #[test]
    fn test_event_family_mapping() {
        assert_eq!(WebhookEventType::from(FiatEvent::Pending).as_str(), "fiat_pending");
        assert_eq!(
            WebhookEventType::from(TransactionEvent::for_status(TransactionStatus::Completed)),
            WebhookEventType::TransactionCompleted
        );
        assert_eq!(
            TransactionEvent::for_status(TransactionStatus::Pending),
            TransactionEvent::Created
        );
    }

    #[test]
    fn test_notifier_requires_endpoints() {
        assert!(matches!(
            WebhookNotifier::new(WebhookConfig::default()),
            Err(WebhookError::NotConfigured)
        ));
    }

    #[test]
    fn test_crypto_payload_validation() {
        let mut data = crypto_data();
        assert!(validator::Validate::validate(&data).is_ok());
        data.hash.clear();
        assert!(validator::Validate::validate(&data).is_err());
    }
}
