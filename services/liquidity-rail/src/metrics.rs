use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    // Quote lifecycle
    pub static ref QUOTES_GENERATED: IntCounter = register_int_counter!(
        "lr_quotes_generated_total",
        "Total quotes generated"
    ).expect("metric can be created");

    pub static ref QUOTES_CONFIRMED: IntCounter = register_int_counter!(
        "lr_quotes_confirmed_total",
        "Total quotes confirmed into transactions"
    ).expect("metric can be created");

    pub static ref QUOTES_REFRESHED: IntCounter = register_int_counter!(
        "lr_quotes_refreshed_total",
        "Total quote refreshes"
    ).expect("metric can be created");

    pub static ref TRANSACTION_STATUS_UPDATES: IntCounterVec = register_int_counter_vec!(
        "lr_transaction_status_updates_total",
        "Transaction status transitions by target status",
        &["status"]
    ).expect("metric can be created");

    // Webhook delivery
    pub static ref WEBHOOKS_SENT: IntCounterVec = register_int_counter_vec!(
        "lr_webhooks_sent_total",
        "Webhook deliveries by event type and outcome",
        &["event_type", "outcome"]
    ).expect("metric can be created");

    pub static ref AUTH_TOKEN_FETCHES: IntCounter = register_int_counter!(
        "lr_webhook_auth_token_fetches_total",
        "Bearer token fetches against the webhook auth endpoint"
    ).expect("metric can be created");
}

/// Generate metrics output in Prometheus text format
pub fn metrics_handler() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_handler() {
        QUOTES_GENERATED.inc();
        WEBHOOKS_SENT.with_label_values(&["crypto_received", "delivered"]).inc();

        let output = metrics_handler().unwrap();
        assert!(output.contains("lr_quotes_generated_total"));
        assert!(output.contains("lr_webhooks_sent_total"));
    }
}
