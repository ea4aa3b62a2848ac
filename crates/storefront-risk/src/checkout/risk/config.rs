use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

pub const DEFAULT_HIGH_VALUE_THRESHOLD: i64 = 5000;
pub const DEFAULT_MAX_DAILY_ORDERS: u32 = 3;
pub const DEFAULT_FLAG_THRESHOLD: u32 = 30;
pub const DEFAULT_BLOCK_THRESHOLD: u32 = 70;
pub const DEFAULT_NEW_USER_PENALTY: u32 = 10;
pub const DEFAULT_CANCELLATION_RATE_THRESHOLD: f64 = 0.5;
pub const DEFAULT_BLOCKLIST_FLAG_PENALTY: u32 = 30;

/// Keys understood by the rule store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKey {
    HighValueThreshold,
    MaxDailyOrders,
    RiskThresholdFlag,
    RiskThresholdBlock,
    NewUserPenalty,
    CancellationRateThreshold,
    BlocklistFlagPenalty,
}

impl RuleKey {
    pub const ALL: [RuleKey; 7] = [
        RuleKey::HighValueThreshold,
        RuleKey::MaxDailyOrders,
        RuleKey::RiskThresholdFlag,
        RuleKey::RiskThresholdBlock,
        RuleKey::NewUserPenalty,
        RuleKey::CancellationRateThreshold,
        RuleKey::BlocklistFlagPenalty,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            RuleKey::HighValueThreshold => "high_value_threshold",
            RuleKey::MaxDailyOrders => "max_daily_orders",
            RuleKey::RiskThresholdFlag => "risk_threshold_flag",
            RuleKey::RiskThresholdBlock => "risk_threshold_block",
            RuleKey::NewUserPenalty => "new_user_penalty",
            RuleKey::CancellationRateThreshold => "cancellation_rate_threshold",
            RuleKey::BlocklistFlagPenalty => "blocklist_flag_penalty",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(raw.trim()))
    }

    fn expected(self) -> &'static str {
        match self {
            RuleKey::HighValueThreshold => "a non-negative decimal",
            RuleKey::CancellationRateThreshold => "a fraction between 0 and 1",
            _ => "a non-negative integer",
        }
    }
}

/// Rejection raised when an administrator writes a rule value the engine cannot use.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RuleValueError {
    #[error("unknown risk rule '{0}'")]
    UnknownKey(String),
    #[error("rule '{key}' expects {expected}")]
    InvalidValue {
        key: &'static str,
        expected: &'static str,
    },
    #[error("risk_threshold_flag ({flag}) must be above zero and at most risk_threshold_block ({block})")]
    ThresholdsOutOfOrder { flag: u32, block: u32 },
}

/// Typed snapshot of the rule store, resolved once per checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRules {
    pub high_value_threshold: Decimal,
    pub max_daily_orders: u32,
    pub risk_threshold_flag: u32,
    pub risk_threshold_block: u32,
    pub new_user_penalty: u32,
    pub cancellation_rate_threshold: f64,
    pub blocklist_flag_penalty: u32,
}

impl Default for RiskRules {
    fn default() -> Self {
        Self {
            high_value_threshold: Decimal::from(DEFAULT_HIGH_VALUE_THRESHOLD),
            max_daily_orders: DEFAULT_MAX_DAILY_ORDERS,
            risk_threshold_flag: DEFAULT_FLAG_THRESHOLD,
            risk_threshold_block: DEFAULT_BLOCK_THRESHOLD,
            new_user_penalty: DEFAULT_NEW_USER_PENALTY,
            cancellation_rate_threshold: DEFAULT_CANCELLATION_RATE_THRESHOLD,
            blocklist_flag_penalty: DEFAULT_BLOCKLIST_FLAG_PENALTY,
        }
    }
}

impl RiskRules {
    /// Resolve the loosely typed rule rows into a snapshot.
    ///
    /// Missing keys keep their defaults. Values of the wrong shape are logged and ignored,
    /// and a threshold pair that would not partition the score range falls back to both
    /// defaults.
    pub fn from_entries(entries: &BTreeMap<String, Value>) -> Self {
        let mut rules = Self::resolve(entries);

        if rules.check_thresholds().is_err() {
            warn!(
                flag = rules.risk_threshold_flag,
                block = rules.risk_threshold_block,
                "risk thresholds out of order; using defaults"
            );
            rules.risk_threshold_flag = DEFAULT_FLAG_THRESHOLD;
            rules.risk_threshold_block = DEFAULT_BLOCK_THRESHOLD;
        }

        rules
    }

    /// Check that `value` is usable for `key` without touching any snapshot.
    pub fn validate_entry(key: &str, value: &Value) -> Result<RuleKey, RuleValueError> {
        let parsed = RuleKey::parse(key).ok_or_else(|| RuleValueError::UnknownKey(key.to_string()))?;
        Self::default().apply(parsed, value)?;
        Ok(parsed)
    }

    /// Validate a write of `value` to `key` against the rows already stored, so that the
    /// resulting threshold pair still partitions the score range.
    pub fn validate_update(
        entries: &BTreeMap<String, Value>,
        key: &str,
        value: &Value,
    ) -> Result<RuleKey, RuleValueError> {
        let parsed = Self::validate_entry(key, value)?;

        let mut candidate: BTreeMap<String, Value> = entries
            .iter()
            .filter(|(raw_key, _)| RuleKey::parse(raw_key) != Some(parsed))
            .map(|(raw_key, stored)| (raw_key.clone(), stored.clone()))
            .collect();
        candidate.insert(parsed.as_str().to_string(), value.clone());
        Self::resolve(&candidate).check_thresholds()?;

        Ok(parsed)
    }

    fn resolve(entries: &BTreeMap<String, Value>) -> Self {
        let mut rules = Self::default();

        for (raw_key, value) in entries {
            let Some(key) = RuleKey::parse(raw_key) else {
                continue;
            };
            if let Err(err) = rules.apply(key, value) {
                warn!(rule = key.as_str(), %value, error = %err, "ignoring malformed risk rule");
            }
        }

        rules
    }

    fn check_thresholds(&self) -> Result<(), RuleValueError> {
        if self.risk_threshold_flag == 0 || self.risk_threshold_flag > self.risk_threshold_block {
            return Err(RuleValueError::ThresholdsOutOfOrder {
                flag: self.risk_threshold_flag,
                block: self.risk_threshold_block,
            });
        }
        Ok(())
    }

    /// Rule rows equivalent to this snapshot, for admin display.
    pub fn to_entries(&self) -> BTreeMap<String, Value> {
        let mut entries = BTreeMap::new();
        for key in RuleKey::ALL {
            let value = match key {
                RuleKey::HighValueThreshold => Value::String(self.high_value_threshold.to_string()),
                RuleKey::MaxDailyOrders => Value::from(self.max_daily_orders),
                RuleKey::RiskThresholdFlag => Value::from(self.risk_threshold_flag),
                RuleKey::RiskThresholdBlock => Value::from(self.risk_threshold_block),
                RuleKey::NewUserPenalty => Value::from(self.new_user_penalty),
                RuleKey::CancellationRateThreshold => Value::from(self.cancellation_rate_threshold),
                RuleKey::BlocklistFlagPenalty => Value::from(self.blocklist_flag_penalty),
            };
            entries.insert(key.as_str().to_string(), value);
        }
        entries
    }

    fn apply(&mut self, key: RuleKey, value: &Value) -> Result<(), RuleValueError> {
        let invalid = || RuleValueError::InvalidValue {
            key: key.as_str(),
            expected: key.expected(),
        };

        match key {
            RuleKey::HighValueThreshold => {
                self.high_value_threshold = decimal_value(value)
                    .filter(|amount| !amount.is_sign_negative())
                    .ok_or_else(invalid)?;
            }
            RuleKey::CancellationRateThreshold => {
                self.cancellation_rate_threshold = decimal_value(value)
                    .and_then(|fraction| fraction.to_f64())
                    .filter(|fraction| (0.0..=1.0).contains(fraction))
                    .ok_or_else(invalid)?;
            }
            RuleKey::MaxDailyOrders => self.max_daily_orders = count_value(value).ok_or_else(invalid)?,
            RuleKey::RiskThresholdFlag => {
                self.risk_threshold_flag = count_value(value).ok_or_else(invalid)?
            }
            RuleKey::RiskThresholdBlock => {
                self.risk_threshold_block = count_value(value).ok_or_else(invalid)?
            }
            RuleKey::NewUserPenalty => self.new_user_penalty = count_value(value).ok_or_else(invalid)?,
            RuleKey::BlocklistFlagPenalty => {
                self.blocklist_flag_penalty = count_value(value).ok_or_else(invalid)?
            }
        }

        Ok(())
    }
}

fn decimal_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => Decimal::from_str(&number.to_string())
            .or_else(|_| Decimal::from_scientific(&number.to_string()))
            .ok(),
        Value::String(raw) => Decimal::from_str(raw.trim()).ok(),
        _ => None,
    }
}

fn count_value(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|count| u32::try_from(count).ok()),
        Value::String(raw) => raw.trim().parse::<u32>().ok(),
        _ => None,
    }
}
