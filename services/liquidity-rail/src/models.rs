use actix_web::http::StatusCode;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Response envelope shared by every endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        ApiResponse {
            status: StatusCode::OK.as_u16(),
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn failure(status: StatusCode, message: impl Into<String>) -> Self {
        ApiResponse {
            status: status.as_u16(),
            message: message.into(),
            data: None,
        }
    }
}

/// Transaction status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
    Completed,
}

impl TransactionStatus {
    /// PENDING settles to any outcome, SUCCESS may still complete,
    /// FAILED and COMPLETED are terminal.
    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;

        matches!(
            (self, next),
            (Pending, Success) | (Pending, Failed) | (Pending, Completed) | (Success, Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TransactionStatus::Failed | TransactionStatus::Completed)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Success => "SUCCESS",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Completed => "COMPLETED",
        };
        f.write_str(s)
    }
}

/// Priced, time-limited conversion offer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub quote_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub asset_code: String,
    pub rate: Decimal,
    pub fee: Decimal,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl Quote {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Committed execution of a confirmed quote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub quote_id: String,
    pub provider_id: String,
    pub status: TransactionStatus,
    pub reference_id: String,
    pub payment_method_id: String,
    pub source: String,
    pub details: TransactionDetails,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionDetails {
    Composite {
        pay_in: CryptoLeg,
        payout: FiatLeg,
    },
    /// Legacy single-record layout. Only read back, never produced.
    Flat {
        send_asset: String,
        send_amount: Decimal,
        receive_currency: String,
        receive_amount: Decimal,
        ex_rate: Decimal,
        account_number: String,
    },
}

/// Crypto deposit side of an offramp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoLeg {
    pub asset_code: String,
    pub amount: Decimal,
    pub sending_address: String,
    pub destination_address: String,
    pub memo: String,
}

/// Fiat disbursement side of an offramp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiatLeg {
    pub currency: String,
    pub amount: Decimal,
    pub rate: Decimal,
    pub fee: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentMethod {
    Bank {
        bank_name: String,
        account_number: String,
        account_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        branch_code: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        swift_code: Option<String>,
    },
    MobileMoney {
        phone_number: String,
        network: String,
        account_name: String,
    },
}

/// Quote generation request
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct GenerateQuoteRequest {
    pub amount: Decimal,
    #[validate(length(min = 3, max = 4))]
    pub currency: String,
    #[validate(length(min = 1, max = 12))]
    pub asset_code: String,
    #[serde(default, alias = "service_id", deserialize_with = "opt_string_or_number")]
    pub service_code: Option<String>,
}

/// Quote confirmation request
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct ConfirmQuoteRequest {
    #[validate(length(min = 1))]
    pub quote_id: String,
    #[serde(default)]
    pub reference_id: String,
    #[serde(default)]
    pub payment_method_id: String,
    #[serde(default)]
    pub sending_address: String,
    #[serde(default)]
    pub source: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub company_id: Option<String>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct RefreshQuoteRequest {
    #[validate(length(min = 1))]
    pub quote_id: String,
}

#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct GetTransactionRequest {
    #[validate(length(min = 1))]
    pub transaction_id: String,
}

/// Provider-scoped listing with optional status filter and pagination
#[derive(Debug, Deserialize, Serialize)]
pub struct GetTransactionsRequest {
    #[serde(deserialize_with = "string_or_number")]
    pub provider_id: String,
    #[serde(default)]
    pub status: Option<TransactionStatus>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct UpdateTransactionStatusRequest {
    #[validate(length(min = 1))]
    pub transaction_id: String,
    pub status: TransactionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationData {
    pub transaction_id: String,
    pub status: TransactionStatus,
    pub destination_address: String,
    pub memo: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResult {
    pub quote_id: String,
    pub new_rate: Decimal,
    pub fee: Decimal,
    pub total_amount: Decimal,
    pub expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Integer(i64),
    Float(f64),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Integer(n) => n.to_string(),
            StringOrNumber::Float(n) => n.to_string(),
        }
    }
}

/// Identifiers arrive as JSON strings from some callers and numbers from others.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    StringOrNumber::deserialize(deserializer).map(String::from)
}

fn opt_string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<StringOrNumber>::deserialize(deserializer).map(|v| v.map(String::from))
}
