use std::sync::Arc;

use chrono::{ DateTime, Datelike, Duration, TimeZone, Timelike, Utc, Weekday };
use serde::Serialize;

use crate::enums::{ Chain, ChainFamily, FeeLevel };
use crate::fees::{ FeeQuote, FeeQuoter };
use crate::services::price_service::PriceService;

/// UTC window where fees are historically lowest.
const CHEAP_WINDOW_START_HOUR: u32 = 2;
const CHEAP_WINDOW_END_HOUR: u32 = 6;

/// Waiting is only recommended when it saves real money.
const MIN_SAVINGS_USD: f64 = 0.5;
const MIN_SAVINGS_PCT: f64 = 5.0;

/// Reference vsize of a simple Bitcoin payment.
const BTC_TRANSFER_VBYTES: f64 = 140.0;
/// Gas used by a plain native transfer on any EVM chain.
const EVM_TRANSFER_GAS: f64 = 21_000.0;

#[derive(Debug, Clone, Serialize)]
pub struct FeeComparison {
    pub chain: Chain,
    pub current_fee_rate: f64,
    pub fee_unit: &'static str,
    pub level: FeeLevel,
    pub current_fee_usd: f64,
    pub predicted_fee_usd: f64,
    pub predicted_savings_usd: f64,
    pub savings_percentage: f64,
    pub worth_waiting: bool,
    pub suggested_time: DateTime<Utc>,
    pub reason: String,
}

/// Compares sending now against deferring to the overnight low-fee
/// window. The prediction is a fixed discount model over observed
/// congestion, so the same inputs always produce the same advice.
pub struct ComparisonService {
    fees: Arc<dyn FeeQuoter>,
    prices: Arc<PriceService>,
}

impl ComparisonService {
    pub fn new(fees: Arc<dyn FeeQuoter>, prices: Arc<PriceService>) -> Self {
        Self { fees, prices }
    }

    pub async fn compare(&self, chain: Chain) -> FeeComparison {
        let quote = self.fees.quote(chain).await;
        let spot = self.prices.spot_usd(chain).await;
        Self::compare_at(&quote, spot, Utc::now())
    }

    /// Pure comparison core over a quote, a spot price and a clock
    /// reading.
    pub fn compare_at(quote: &FeeQuote, spot_usd: f64, now: DateTime<Utc>) -> FeeComparison {
        let level = quote.level();
        let current_fee_usd = Self::transfer_fee_usd(quote.chain, quote.standard, spot_usd);

        let suggested_time = Self::next_cheap_window(now);

        let mut factor = if level >= FeeLevel::High { 0.65 } else { 0.75 };
        if Self::is_weekend(suggested_time) {
            factor *= 0.9;
        }

        let predicted_fee_usd = current_fee_usd * factor;
        let predicted_savings_usd = current_fee_usd - predicted_fee_usd;
        let savings_percentage = if current_fee_usd > 0.0 {
            predicted_savings_usd / current_fee_usd * 100.0
        } else {
            0.0
        };

        let worth_waiting =
            predicted_savings_usd > MIN_SAVINGS_USD && savings_percentage >= MIN_SAVINGS_PCT;

        let reason = if worth_waiting {
            format!(
                "fees are {} right now; the 02:00-06:00 UTC window typically runs {:.0}% cheaper",
                level.as_str().replace('_', " "),
                (1.0 - factor) * 100.0
            )
        } else {
            "current fees are already close to the expected low".to_string()
        };

        FeeComparison {
            chain: quote.chain,
            current_fee_rate: quote.standard,
            fee_unit: quote.unit,
            level,
            current_fee_usd,
            predicted_fee_usd,
            predicted_savings_usd,
            savings_percentage,
            worth_waiting,
            suggested_time,
            reason,
        }
    }

    /// USD cost of a plain native transfer at the given rate.
    pub fn transfer_fee_usd(chain: Chain, rate: f64, spot_usd: f64) -> f64 {
        match chain.family() {
            // gwei * gas / 1e9 = native units
            ChainFamily::Evm => (rate * EVM_TRANSFER_GAS) / 1e9 * spot_usd,
            // lamports / 1e9 = SOL
            ChainFamily::Solana => rate / 1e9 * spot_usd,
            // sat/vB * vsize / 1e8 = BTC
            ChainFamily::Utxo => (rate * BTC_TRANSFER_VBYTES) / 1e8 * spot_usd,
        }
    }

    /// Start of the next overnight window; if we are already inside one,
    /// now is the suggestion.
    pub fn next_cheap_window(now: DateTime<Utc>) -> DateTime<Utc> {
        let hour = now.hour();
        if (CHEAP_WINDOW_START_HOUR..CHEAP_WINDOW_END_HOUR).contains(&hour) {
            return now;
        }

        let today_start = Utc
            .with_ymd_and_hms(now.year(), now.month(), now.day(), CHEAP_WINDOW_START_HOUR, 0, 0)
            .single()
            .unwrap_or(now);

        if now < today_start {
            today_start
        } else {
            today_start + Duration::days(1)
        }
    }

    fn is_weekend(at: DateTime<Utc>) -> bool {
        matches!(at.weekday(), Weekday::Sat | Weekday::Sun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::FeeSource;
    use crate::fees::FeeOracle;

    fn quote_with_standard(chain: Chain, standard: f64) -> FeeQuote {
        FeeQuote {
            chain,
            slow: standard * 0.8,
            standard,
            fast: standard * 1.25,
            unit: chain.fee_unit(),
            source: FeeSource::Api,
            fetched_at: Utc::now(),
        }
    }

    fn weekday_morning() -> DateTime<Utc> {
        // Wednesday 10:00 UTC
        Utc.with_ymd_and_hms(2025, 6, 11, 10, 0, 0).unwrap()
    }

    #[test]
    fn high_fees_use_deeper_discount() {
        // 2x typical rate buckets as very high
        let quote = quote_with_standard(Chain::Eth, Chain::Eth.typical_fee_rate() * 2.0);
        let cmp = ComparisonService::compare_at(&quote, 3000.0, weekday_morning());
        assert_eq!(cmp.level, FeeLevel::VeryHigh);
        assert!((cmp.predicted_fee_usd - cmp.current_fee_usd * 0.65).abs() < 1e-9);
    }

    #[test]
    fn normal_fees_use_shallow_discount() {
        let quote = quote_with_standard(Chain::Eth, Chain::Eth.typical_fee_rate());
        let cmp = ComparisonService::compare_at(&quote, 3000.0, weekday_morning());
        assert_eq!(cmp.level, FeeLevel::Medium);
        assert!((cmp.predicted_fee_usd - cmp.current_fee_usd * 0.75).abs() < 1e-9);
    }

    #[test]
    fn weekend_window_discounts_further() {
        // Friday 23:00 UTC, so the suggested window lands on Saturday
        let friday_night = Utc.with_ymd_and_hms(2025, 6, 13, 23, 0, 0).unwrap();
        let quote = quote_with_standard(Chain::Eth, Chain::Eth.typical_fee_rate());
        let cmp = ComparisonService::compare_at(&quote, 3000.0, friday_night);
        assert_eq!(cmp.suggested_time.weekday(), Weekday::Sat);
        assert!((cmp.predicted_fee_usd - cmp.current_fee_usd * 0.75 * 0.9).abs() < 1e-9);
    }

    #[test]
    fn inside_window_suggests_now() {
        let at = Utc.with_ymd_and_hms(2025, 6, 11, 3, 30, 0).unwrap();
        assert_eq!(ComparisonService::next_cheap_window(at), at);
    }

    #[test]
    fn before_window_suggests_same_day() {
        let at = Utc.with_ymd_and_hms(2025, 6, 11, 1, 0, 0).unwrap();
        let suggested = ComparisonService::next_cheap_window(at);
        assert_eq!(suggested, Utc.with_ymd_and_hms(2025, 6, 11, 2, 0, 0).unwrap());
    }

    #[test]
    fn after_window_rolls_to_next_day() {
        let at = Utc.with_ymd_and_hms(2025, 6, 11, 14, 0, 0).unwrap();
        let suggested = ComparisonService::next_cheap_window(at);
        assert_eq!(suggested, Utc.with_ymd_and_hms(2025, 6, 12, 2, 0, 0).unwrap());
    }

    #[test]
    fn tiny_absolute_savings_not_worth_waiting() {
        // Cheap chain: big percentage saving but cents in absolute terms
        let quote = quote_with_standard(Chain::Polygon, Chain::Polygon.typical_fee_rate() * 2.0);
        let cmp = ComparisonService::compare_at(&quote, 0.5, weekday_morning());
        assert!(cmp.savings_percentage >= MIN_SAVINGS_PCT);
        assert!(cmp.predicted_savings_usd < MIN_SAVINGS_USD);
        assert!(!cmp.worth_waiting);
    }

    #[test]
    fn expensive_congestion_is_worth_waiting() {
        let quote = quote_with_standard(Chain::Eth, Chain::Eth.typical_fee_rate() * 3.0);
        let cmp = ComparisonService::compare_at(&quote, 3000.0, weekday_morning());
        assert!(cmp.worth_waiting);
    }

    #[test]
    fn fallback_quote_compares_cleanly() {
        let quote = FeeOracle::fallback_quote(Chain::Solana);
        let cmp = ComparisonService::compare_at(&quote, 150.0, weekday_morning());
        assert!(cmp.current_fee_usd > 0.0);
        assert!(!cmp.worth_waiting);
    }
}
