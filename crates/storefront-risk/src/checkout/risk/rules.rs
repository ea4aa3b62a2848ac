use chrono::Duration;

use super::blocklist::BlocklistSeverity;
use super::config::RiskRules;
use super::{RiskInputs, RiskSignal};

pub(crate) const HIGH_VALUE_POINTS: u32 = 20;
pub(crate) const VELOCITY_ELEVATED_ORDERS: u32 = 2;
pub(crate) const VELOCITY_ELEVATED_POINTS: u32 = 10;
pub(crate) const VELOCITY_SEVERE_ORDERS: u32 = 3;
pub(crate) const VELOCITY_SEVERE_POINTS: u32 = 40;
pub(crate) const HARD_BLOCK_POINTS: u32 = 100;
pub(crate) const REFUSAL_RATE_POINTS: u32 = 25;
pub(crate) const REFUSAL_RATE_MIN_ORDERS: u32 = 3;

pub(crate) fn new_account_window() -> Duration {
    Duration::hours(24)
}

pub(crate) fn velocity_window() -> Duration {
    Duration::hours(24)
}

/// Every triggered signal, in audit order.
pub(crate) fn collect_signals(inputs: &RiskInputs<'_>, rules: &RiskRules) -> Vec<RiskSignal> {
    [
        new_account(inputs, rules),
        high_value(inputs, rules),
        velocity(inputs),
        blocklist(inputs, rules),
        refusal_rate(inputs, rules),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn new_account(inputs: &RiskInputs<'_>, rules: &RiskRules) -> Option<RiskSignal> {
    let customer = inputs.customer?;
    let age = inputs.now.signed_duration_since(customer.account_created_at);
    (age < new_account_window() && rules.new_user_penalty > 0)
        .then(|| RiskSignal::new("New Account (<24h)", rules.new_user_penalty))
}

fn high_value(inputs: &RiskInputs<'_>, rules: &RiskRules) -> Option<RiskSignal> {
    (inputs.total_amount > rules.high_value_threshold)
        .then(|| RiskSignal::new("High Value Order", HIGH_VALUE_POINTS))
}

fn velocity(inputs: &RiskInputs<'_>) -> Option<RiskSignal> {
    let count = inputs.recent_live_orders;
    let points = if count >= VELOCITY_SEVERE_ORDERS {
        VELOCITY_SEVERE_POINTS
    } else if count >= VELOCITY_ELEVATED_ORDERS {
        VELOCITY_ELEVATED_POINTS
    } else {
        return None;
    };

    Some(RiskSignal::new(
        format!("High Velocity ({count} live orders in 24h)"),
        points,
    ))
}

/// A hard block dominates; flag-only entries count once however many match.
fn blocklist(inputs: &RiskInputs<'_>, rules: &RiskRules) -> Option<RiskSignal> {
    let active: Vec<_> = inputs
        .blocklist_matches
        .iter()
        .filter(|entry| entry.is_active(inputs.now))
        .collect();

    if let Some(entry) = active
        .iter()
        .find(|entry| entry.severity == BlocklistSeverity::HardBlock)
    {
        return Some(RiskSignal::new(entry.factor_name(), HARD_BLOCK_POINTS));
    }

    active
        .first()
        .filter(|_| rules.blocklist_flag_penalty > 0)
        .map(|entry| RiskSignal::new(entry.factor_name(), rules.blocklist_flag_penalty))
}

fn refusal_rate(inputs: &RiskInputs<'_>, rules: &RiskRules) -> Option<RiskSignal> {
    let customer = inputs.customer?;
    if customer.total_orders < REFUSAL_RATE_MIN_ORDERS {
        return None;
    }

    let failed = customer.refused_orders + customer.returned_orders;
    let rate = f64::from(failed) / f64::from(customer.total_orders);
    (rate > rules.cancellation_rate_threshold).then(|| {
        RiskSignal::new(
            format!("High Refusal Rate ({:.0}%)", rate * 100.0),
            REFUSAL_RATE_POINTS,
        )
    })
}
