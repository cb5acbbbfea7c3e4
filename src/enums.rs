use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

// ─── Chain ───────────────────────────────────────────────────────────

/// Supported blockchain networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Eth,
    Bsc,
    Polygon,
    Avalanche,
    Arbitrum,
    Optimism,
    Base,
    Solana,
    Btc,
}

/// Signing/transaction model a chain belongs to. Dispatch adapters are
/// selected per family, not per chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainFamily {
    Evm,
    Solana,
    Utxo,
}

impl Chain {
    pub fn all() -> &'static [Chain] {
        &[
            Chain::Eth,
            Chain::Bsc,
            Chain::Polygon,
            Chain::Avalanche,
            Chain::Arbitrum,
            Chain::Optimism,
            Chain::Base,
            Chain::Solana,
            Chain::Btc,
        ]
    }

    /// Canonical string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Eth => "ETH",
            Chain::Bsc => "BSC",
            Chain::Polygon => "POLYGON",
            Chain::Avalanche => "AVALANCHE",
            Chain::Arbitrum => "ARBITRUM",
            Chain::Optimism => "OPTIMISM",
            Chain::Base => "BASE",
            Chain::Solana => "SOLANA",
            Chain::Btc => "BTC",
        }
    }

    pub fn family(&self) -> ChainFamily {
        match self {
            Chain::Solana => ChainFamily::Solana,
            Chain::Btc => ChainFamily::Utxo,
            _ => ChainFamily::Evm,
        }
    }

    /// Native token symbol for the chain.
    pub fn native_symbol(&self) -> &'static str {
        match self {
            Chain::Eth => "ETH",
            Chain::Bsc => "BNB",
            Chain::Polygon => "POL",
            Chain::Avalanche => "AVAX",
            Chain::Arbitrum => "ETH",
            Chain::Optimism => "ETH",
            Chain::Base => "ETH",
            Chain::Solana => "SOL",
            Chain::Btc => "BTC",
        }
    }

    /// EVM chain ID. Returns None for non-EVM chains.
    pub fn chain_id(&self) -> Option<u64> {
        match self {
            Chain::Eth => Some(1),
            Chain::Bsc => Some(56),
            Chain::Polygon => Some(137),
            Chain::Avalanche => Some(43114),
            Chain::Arbitrum => Some(42161),
            Chain::Optimism => Some(10),
            Chain::Base => Some(8453),
            Chain::Solana | Chain::Btc => None,
        }
    }

    /// Etherscan-family gas oracle endpoint, where one exists.
    pub fn gas_oracle_url(&self) -> Option<&'static str> {
        match self {
            Chain::Eth => Some("https://api.etherscan.io/api"),
            Chain::Bsc => Some("https://api.bscscan.com/api"),
            Chain::Polygon => Some("https://api.polygonscan.com/api"),
            Chain::Avalanche => Some("https://api.snowtrace.io/api"),
            Chain::Arbitrum => Some("https://api.arbiscan.io/api"),
            Chain::Optimism => Some("https://api-optimistic.etherscan.io/api"),
            Chain::Base => Some("https://api.basescan.org/api"),
            Chain::Solana | Chain::Btc => None,
        }
    }

    /// Typical standard-tier fee rate for the chain, used to bucket live
    /// quotes into coarse levels and as the last-resort fallback value.
    /// EVM chains are in gwei, Bitcoin in sat/vB, Solana in lamports.
    pub fn typical_fee_rate(&self) -> f64 {
        match self {
            Chain::Eth => 30.0,
            Chain::Bsc => 3.0,
            Chain::Polygon => 40.0,
            Chain::Avalanche => 25.0,
            Chain::Arbitrum => 0.1,
            Chain::Optimism => 0.1,
            Chain::Base => 0.1,
            Chain::Solana => 5000.0,
            Chain::Btc => 5.0,
        }
    }

    /// Unit the fee rate is denominated in, for display and logs.
    pub fn fee_unit(&self) -> &'static str {
        match self {
            Chain::Solana => "lamports",
            Chain::Btc => "sat/vB",
            _ => "gwei",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ETH" | "ETHEREUM" => Ok(Chain::Eth),
            "BSC" | "BNB" => Ok(Chain::Bsc),
            "POLYGON" | "MATIC" => Ok(Chain::Polygon),
            "AVALANCHE" | "AVAX" => Ok(Chain::Avalanche),
            "ARBITRUM" => Ok(Chain::Arbitrum),
            "OPTIMISM" => Ok(Chain::Optimism),
            "BASE" => Ok(Chain::Base),
            "SOLANA" | "SOL" => Ok(Chain::Solana),
            "BTC" | "BITCOIN" => Ok(Chain::Btc),
            _ => Err(AppError::InvalidInput(format!("Unsupported chain: {}", s))),
        }
    }
}

// ─── ScheduleStatus ─────────────────────────────────────────────────

/// Lifecycle state of a scheduled transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Pending,
    Executing,
    Completed,
    Failed,
    Expired,
    Cancelled,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Pending => "pending",
            ScheduleStatus::Executing => "executing",
            ScheduleStatus::Completed => "completed",
            ScheduleStatus::Failed => "failed",
            ScheduleStatus::Expired => "expired",
            ScheduleStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal states admit no further transition and must never retain
    /// a readable credential.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScheduleStatus::Completed
                | ScheduleStatus::Failed
                | ScheduleStatus::Expired
                | ScheduleStatus::Cancelled
        )
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ScheduleStatus::Pending),
            "executing" => Ok(ScheduleStatus::Executing),
            "completed" => Ok(ScheduleStatus::Completed),
            "failed" => Ok(ScheduleStatus::Failed),
            "expired" => Ok(ScheduleStatus::Expired),
            "cancelled" => Ok(ScheduleStatus::Cancelled),
            _ => Err(AppError::InvalidInput(format!(
                "Invalid schedule status: {}",
                s
            ))),
        }
    }
}

// ─── FeeLevel ───────────────────────────────────────────────────────

/// Coarse bucket summarizing current network congestion cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeLevel {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl FeeLevel {
    /// Bucket a standard-tier rate against the chain's typical rate.
    pub fn from_rate(standard: f64, typical: f64) -> Self {
        if typical <= 0.0 {
            return FeeLevel::Medium;
        }
        let ratio = standard / typical;
        if ratio < 0.7 {
            FeeLevel::VeryLow
        } else if ratio < 0.9 {
            FeeLevel::Low
        } else if ratio < 1.1 {
            FeeLevel::Medium
        } else if ratio < 1.3 {
            FeeLevel::High
        } else {
            FeeLevel::VeryHigh
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeeLevel::VeryLow => "very_low",
            FeeLevel::Low => "low",
            FeeLevel::Medium => "medium",
            FeeLevel::High => "high",
            FeeLevel::VeryHigh => "very_high",
        }
    }
}

impl fmt::Display for FeeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── FeeSource ──────────────────────────────────────────────────────

/// Where a fee quote came from. `Fallback` marks the conservative static
/// value used when every live source failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeSource {
    Api,
    Rpc,
    Fallback,
}

impl FeeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeeSource::Api => "api",
            FeeSource::Rpc => "rpc",
            FeeSource::Fallback => "fallback",
        }
    }
}

// ─── Frequency ──────────────────────────────────────────────────────

/// Recurrence cadence for recurring rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Biweekly => "biweekly",
            Frequency::Monthly => "monthly",
        }
    }

    /// Next cadence boundary after `from`.
    pub fn next_boundary(
        &self,
        from: chrono::DateTime<chrono::Utc>,
    ) -> chrono::DateTime<chrono::Utc> {
        use chrono::{Duration, Months};
        match self {
            Frequency::Daily => from + Duration::days(1),
            Frequency::Weekly => from + Duration::weeks(1),
            Frequency::Biweekly => from + Duration::weeks(2),
            Frequency::Monthly => from
                .checked_add_months(Months::new(1))
                .unwrap_or(from + Duration::days(30)),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "biweekly" => Ok(Frequency::Biweekly),
            "monthly" => Ok(Frequency::Monthly),
            _ => Err(AppError::InvalidInput(format!(
                "Invalid frequency: {}. Supported: daily, weekly, biweekly, monthly",
                s
            ))),
        }
    }
}

// ─── RuleStatus ─────────────────────────────────────────────────────

/// Lifecycle state of a recurring rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatus {
    Active,
    Completed,
    Cancelled,
}

impl RuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleStatus::Active => "active",
            RuleStatus::Completed => "completed",
            RuleStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(RuleStatus::Active),
            "completed" => Ok(RuleStatus::Completed),
            "cancelled" => Ok(RuleStatus::Cancelled),
            _ => Err(AppError::InvalidInput(format!("Invalid rule status: {}", s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_family_routing() {
        assert_eq!(Chain::Eth.family(), ChainFamily::Evm);
        assert_eq!(Chain::Base.family(), ChainFamily::Evm);
        assert_eq!(Chain::Solana.family(), ChainFamily::Solana);
        assert_eq!(Chain::Btc.family(), ChainFamily::Utxo);
    }

    #[test]
    fn test_fee_level_buckets() {
        assert_eq!(FeeLevel::from_rate(15.0, 30.0), FeeLevel::VeryLow);
        assert_eq!(FeeLevel::from_rate(25.0, 30.0), FeeLevel::Low);
        assert_eq!(FeeLevel::from_rate(30.0, 30.0), FeeLevel::Medium);
        assert_eq!(FeeLevel::from_rate(36.0, 30.0), FeeLevel::High);
        assert_eq!(FeeLevel::from_rate(60.0, 30.0), FeeLevel::VeryHigh);
    }

    #[test]
    fn test_terminal_states() {
        assert!(ScheduleStatus::Completed.is_terminal());
        assert!(ScheduleStatus::Failed.is_terminal());
        assert!(ScheduleStatus::Expired.is_terminal());
        assert!(ScheduleStatus::Cancelled.is_terminal());
        assert!(!ScheduleStatus::Pending.is_terminal());
        assert!(!ScheduleStatus::Executing.is_terminal());
    }

    #[test]
    fn test_frequency_boundaries() {
        use chrono::{TimeZone, Utc};
        let jan1 = Utc.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap();
        assert_eq!(
            Frequency::Weekly.next_boundary(jan1),
            Utc.with_ymd_and_hms(2024, 1, 8, 2, 0, 0).unwrap()
        );
        assert_eq!(
            Frequency::Biweekly.next_boundary(jan1),
            Utc.with_ymd_and_hms(2024, 1, 15, 2, 0, 0).unwrap()
        );
        assert_eq!(
            Frequency::Monthly.next_boundary(jan1),
            Utc.with_ymd_and_hms(2024, 2, 1, 2, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_chain_round_trip() {
        for &chain in Chain::all() {
            assert_eq!(chain.as_str().parse::<Chain>().unwrap(), chain);
        }
    }
}
