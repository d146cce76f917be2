use crate::config::RatesConfig;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Static rate tables: quoted rate = asset base rate * currency rate.
/// Unknown codes fall back to a multiplier of one.
#[derive(Debug, Clone)]
pub struct RateEngine {
    asset_rates: HashMap<String, Decimal>,
    currency_rates: HashMap<String, Decimal>,
    fee_ratio: Decimal,
}

impl RateEngine {
    pub fn new(config: &RatesConfig) -> Self {
        // Config keys come back lowercased from the config crate
        let normalize = |table: &HashMap<String, Decimal>| {
            table
                .iter()
                .map(|(code, rate)| (code.to_uppercase(), *rate))
                .collect()
        };

        RateEngine {
            asset_rates: normalize(&config.asset_rates),
            currency_rates: normalize(&config.currency_rates),
            fee_ratio: config.fee_ratio,
        }
    }

    pub fn rate(&self, currency: &str, asset_code: &str) -> Decimal {
        let base = self
            .asset_rates
            .get(&asset_code.to_uppercase())
            .copied()
            .unwrap_or(Decimal::ONE);
        let fiat = self
            .currency_rates
            .get(&currency.to_uppercase())
            .copied()
            .unwrap_or(Decimal::ONE);

        base * fiat
    }

    /// Fee and fee-inclusive total for converting `amount` at `rate`. The fee
    /// is a flat ratio of the converted value. `None` when either figure does
    /// not fit in a `Decimal`.
    pub fn price(&self, amount: Decimal, rate: Decimal) -> Option<(Decimal, Decimal)> {
        let converted = amount.checked_mul(rate)?;
        let fee = converted.checked_mul(self.fee_ratio)?;
        Some((fee, converted.checked_add(fee)?))
    }
}

impl Default for RateEngine {
    fn default() -> Self {
        RateEngine::new(&RatesConfig::default())
    }
}
