use crate::config::QuoteConfig;
use crate::errors::{RailError, Result, StoreError};
use crate::metrics;
use crate::models::{
    ConfirmQuoteRequest, ConfirmationData, CryptoLeg, FiatLeg, GenerateQuoteRequest,
    GetTransactionsRequest, Quote, RefreshQuoteRequest, RefreshResult, Transaction,
    TransactionDetails, TransactionStatus, UpdateTransactionStatusRequest,
};
use crate::rates::RateEngine;
use crate::store::{QuoteStore, TransactionStore};
use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const DEFAULT_PAGE_LIMIT: usize = 10;

/// Quote and transaction lifecycle over injected stores
pub struct QuoteService {
    quotes: Arc<dyn QuoteStore>,
    transactions: Arc<dyn TransactionStore>,
    rates: RateEngine,
    config: QuoteConfig,
}

impl QuoteService {
    pub fn new(
        quotes: Arc<dyn QuoteStore>,
        transactions: Arc<dyn TransactionStore>,
        rates: RateEngine,
        config: QuoteConfig,
    ) -> Self {
        QuoteService {
            quotes,
            transactions,
            rates,
            config,
        }
    }

    fn ttl(&self) -> Duration {
        Duration::seconds(self.config.ttl_seconds)
    }

    /// Price a conversion and store the quote
    pub async fn generate_quote(&self, request: GenerateQuoteRequest) -> Result<Quote> {
        validator::Validate::validate(&request)?;
        if request.amount <= Decimal::ZERO {
            return Err(RailError::Validation(
                "amount: must be greater than zero".to_string(),
            ));
        }

        let rate = self.rates.rate(&request.currency, &request.asset_code);
        let (fee, total_amount) = self
            .rates
            .price(request.amount, rate)
            .ok_or_else(amount_too_large)?;
        let created_at = Utc::now();

        let quote = Quote {
            quote_id: new_id("q"),
            amount: request.amount,
            currency: request.currency.to_uppercase(),
            asset_code: request.asset_code.to_uppercase(),
            rate,
            fee,
            total_amount,
            created_at,
            expires_at: created_at + self.ttl(),
            service_code: request.service_code,
            confirmed_at: None,
        };

        self.quotes
            .insert(quote.clone())
            .await
            .map_err(|e| internal("Error generating quote", e))?;

        metrics::QUOTES_GENERATED.inc();
        info!(
            quote_id = %quote.quote_id,
            "Generated quote: {} {} -> {} at {} (fee {})",
            quote.amount, quote.asset_code, quote.currency, quote.rate, quote.fee
        );

        Ok(quote)
    }

    /// Turn a quote into a PENDING transaction
    pub async fn confirm_quote(&self, request: ConfirmQuoteRequest) -> Result<ConfirmationData> {
        validator::Validate::validate(&request)?;

        let mut quote = self
            .quotes
            .get(&request.quote_id)
            .await
            .map_err(|e| internal("Error confirming quote", e))?
            .ok_or_else(|| RailError::QuoteNotFound(request.quote_id.clone()))?;

        let now = Utc::now();
        self.check_confirmable(&quote, now)?;

        let payout_amount = quote
            .amount
            .checked_mul(quote.rate)
            .ok_or_else(amount_too_large)?;

        let transaction_id = new_id("tx");
        let destination_address = destination_address();
        let memo = memo();
        let provider_id = request
            .company_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.config.default_provider_id.clone());

        let transaction = Transaction {
            transaction_id: transaction_id.clone(),
            quote_id: quote.quote_id.clone(),
            provider_id,
            status: TransactionStatus::Pending,
            reference_id: request.reference_id,
            payment_method_id: request.payment_method_id,
            source: request.source,
            details: TransactionDetails::Composite {
                pay_in: CryptoLeg {
                    asset_code: quote.asset_code.clone(),
                    amount: quote.amount,
                    sending_address: request.sending_address,
                    destination_address: destination_address.clone(),
                    memo: memo.clone(),
                },
                payout: FiatLeg {
                    currency: quote.currency.clone(),
                    amount: payout_amount,
                    rate: quote.rate,
                    fee: quote.fee,
                    payment_method: request.payment_method,
                },
            },
            created_on: now,
            updated_on: now,
        };

        self.transactions
            .insert(transaction)
            .await
            .map_err(|e| internal("Error confirming quote", e))?;

        if quote.confirmed_at.is_none() {
            quote.confirmed_at = Some(now);
            self.quotes
                .update(quote.clone())
                .await
                .map_err(|e| internal("Error confirming quote", e))?;
        }

        metrics::QUOTES_CONFIRMED.inc();
        info!(
            quote_id = %quote.quote_id,
            transaction_id = %transaction_id,
            "Confirmed quote into transaction"
        );

        Ok(ConfirmationData {
            transaction_id,
            status: TransactionStatus::Pending,
            destination_address,
            memo,
            amount: quote.amount,
        })
    }

    fn check_confirmable(&self, quote: &Quote, now: DateTime<Utc>) -> Result<()> {
        if self.config.reject_expired && quote.is_expired_at(now) {
            warn!(quote_id = %quote.quote_id, "Rejected confirmation of expired quote");
            return Err(RailError::QuoteExpired(quote.quote_id.clone()));
        }

        if self.config.single_use && quote.confirmed_at.is_some() {
            warn!(quote_id = %quote.quote_id, "Rejected repeated confirmation of quote");
            return Err(RailError::QuoteAlreadyConfirmed(quote.quote_id.clone()));
        }

        Ok(())
    }

    /// Re-price a quote with bounded market drift and extend its expiry
    pub async fn refresh_quote(&self, request: RefreshQuoteRequest) -> Result<RefreshResult> {
        validator::Validate::validate(&request)?;

        let quote = self
            .quotes
            .get(&request.quote_id)
            .await
            .map_err(|e| internal("Error refreshing quote", e))?
            .ok_or_else(|| RailError::QuoteNotFound(request.quote_id.clone()))?;

        let drift = self.sample_drift();
        let refreshed = reprice(&quote, drift, &self.rates, Utc::now() + self.ttl())
            .ok_or_else(amount_too_large)?;

        self.quotes
            .update(refreshed.clone())
            .await
            .map_err(|e| internal("Error refreshing quote", e))?;

        metrics::QUOTES_REFRESHED.inc();
        info!(
            quote_id = %refreshed.quote_id,
            "Refreshed quote: rate {} -> {}",
            quote.rate, refreshed.rate
        );

        Ok(RefreshResult {
            quote_id: refreshed.quote_id,
            new_rate: refreshed.rate,
            fee: refreshed.fee,
            total_amount: refreshed.total_amount,
            expires_at: refreshed.expires_at,
        })
    }

    /// Uniform in [-max_rate_drift, max_rate_drift]
    fn sample_drift(&self) -> Decimal {
        let unit: f64 = rand::thread_rng().gen_range(-1.0..=1.0);
        let unit = Decimal::from_f64(unit)
            .unwrap_or_default()
            .round_dp(6)
            .clamp(-Decimal::ONE, Decimal::ONE);
        unit * self.config.max_rate_drift
    }

    pub async fn get_transaction(&self, transaction_id: &str) -> Result<Transaction> {
        if transaction_id.is_empty() {
            return Err(RailError::Validation(
                "transaction_id: must not be empty".to_string(),
            ));
        }

        self.transactions
            .get(transaction_id)
            .await
            .map_err(|e| internal("Error getting transaction", e))?
            .ok_or_else(|| RailError::TransactionNotFound(transaction_id.to_string()))
    }

    pub async fn get_transactions(&self, request: GetTransactionsRequest) -> Result<Vec<Transaction>> {
        let offset = request.offset.unwrap_or(0);
        // Zero means "no preference", same as an absent limit
        let limit = request
            .limit
            .filter(|limit| *limit > 0)
            .unwrap_or(DEFAULT_PAGE_LIMIT);

        self.transactions
            .list_by_provider(&request.provider_id, request.status, offset, limit)
            .await
            .map_err(|e| internal("Error getting transactions", e))
    }

    /// Apply a settlement outcome reported for a transaction
    pub async fn update_transaction_status(
        &self,
        request: UpdateTransactionStatusRequest,
    ) -> Result<Transaction> {
        let current = self.get_transaction(&request.transaction_id).await?;

        if current.status == request.status {
            return Ok(current);
        }

        if current.status.is_terminal() || !current.status.can_transition_to(request.status) {
            return Err(RailError::InvalidStatusTransition {
                from: current.status,
                to: request.status,
            });
        }

        let updated = self
            .transactions
            .set_status(&request.transaction_id, request.status, Utc::now())
            .await
            .map_err(|e| internal("Error updating transaction status", e))?;

        metrics::TRANSACTION_STATUS_UPDATES
            .with_label_values(&[updated.status.to_string().as_str()])
            .inc();
        info!(
            transaction_id = %updated.transaction_id,
            "Transaction status {} -> {}",
            current.status, updated.status
        );

        Ok(updated)
    }
}

/// Recompute rate, fee and total from the principal implied by the stored
/// quote. The principal is recovered as total / rate, which includes the
/// previous fee. `None` when the repriced figures overflow.
pub fn reprice(
    quote: &Quote,
    drift: Decimal,
    rates: &RateEngine,
    expires_at: DateTime<Utc>,
) -> Option<Quote> {
    let principal = quote.total_amount.checked_div(quote.rate)?;
    let new_rate = quote.rate.checked_mul(Decimal::ONE.checked_add(drift)?)?;
    let (new_fee, new_total) = rates.price(principal, new_rate)?;

    Some(Quote {
        rate: new_rate,
        fee: new_fee,
        total_amount: new_total,
        expires_at,
        ..quote.clone()
    })
}

fn amount_too_large() -> RailError {
    RailError::Validation("amount: too large".to_string())
}

fn internal(message: &str, err: StoreError) -> RailError {
    error!("{}: {}", message, err);
    RailError::Internal(message.to_string())
}

fn new_id(prefix: &str) -> String {
    format!("{}{}", prefix, Uuid::new_v4().simple())
}

fn destination_address() -> String {
    let bytes: [u8; 20] = rand::thread_rng().gen();
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!("0x{}", hex)
}

fn memo() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();
    format!("memo{}", suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_quote() -> Quote {
        let now = Utc::now();
        Quote {
            quote_id: "qabc".to_string(),
            amount: dec!(100),
            currency: "UGX".to_string(),
            asset_code: "USDC".to_string(),
            rate: dec!(3557.62),
            fee: dec!(1778.81),
            total_amount: dec!(357540.81),
            created_at: now,
            expires_at: now + Duration::minutes(5),
            service_code: None,
            confirmed_at: None,
        }
    }

    #[test]
    fn test_reprice_without_drift_uses_implied_principal() {
        let rates = RateEngine::default();
        let quote = sample_quote();
        let expires_at = Utc::now() + Duration::minutes(5);

        let refreshed = reprice(&quote, Decimal::ZERO, &rates, expires_at).unwrap();

        // principal = 357540.81 / 3557.62 = 100.5
        assert_eq!(refreshed.rate, dec!(3557.62));
        assert_eq!(refreshed.fee, dec!(100.5) * dec!(3557.62) * dec!(0.005));
        assert_eq!(
            refreshed.total_amount,
            dec!(100.5) * dec!(3557.62) + refreshed.fee
        );
        assert_eq!(refreshed.quote_id, quote.quote_id);
        assert_eq!(refreshed.expires_at, expires_at);
    }

    #[test]
    fn test_reprice_with_drift() {
        let rates = RateEngine::default();
        let quote = sample_quote();

        let refreshed = reprice(&quote, dec!(0.01), &rates, quote.expires_at).unwrap();
        assert_eq!(refreshed.rate, dec!(3557.62) * dec!(1.01));
        assert_eq!(refreshed.amount, quote.amount);
    }

    #[test]
    fn test_reprice_overflow_is_none() {
        let rates = RateEngine::default();
        let mut quote = sample_quote();
        quote.rate = Decimal::ONE;
        quote.total_amount = Decimal::MAX;

        assert!(reprice(&quote, dec!(0.01), &rates, quote.expires_at).is_none());
    }

    #[test]
    fn test_identifier_shapes() {
        let q = new_id("q");
        let tx = new_id("tx");
        assert!(q.starts_with('q') && q.len() == 33);
        assert!(tx.starts_with("tx") && tx.len() == 34);
        assert!(q.chars().skip(1).all(|c| c.is_ascii_hexdigit()));

        let address = destination_address();
        assert_eq!(address.len(), 42);
        assert!(address.starts_with("0x"));

        let m = memo();
        assert_eq!(m.len(), 10);
        assert!(m.starts_with("memo"));
        assert!(m[4..].chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}
