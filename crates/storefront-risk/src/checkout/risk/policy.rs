use serde::{Deserialize, Serialize};

use super::config::RiskRules;
use super::RiskAssessment;
use crate::checkout::domain::OrderStatus;

/// Gate applied to a checkout attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskDecision {
    Approve,
    Flag,
    Block,
}

impl RiskDecision {
    pub const fn label(self) -> &'static str {
        match self {
            RiskDecision::Approve => "approve",
            RiskDecision::Flag => "flag",
            RiskDecision::Block => "block",
        }
    }

    /// Status an accepted order starts in, `None` when the order must not be persisted.
    pub const fn initial_status(self) -> Option<OrderStatus> {
        match self {
            RiskDecision::Approve => Some(OrderStatus::Pending),
            RiskDecision::Flag => Some(OrderStatus::PendingConfirmation),
            RiskDecision::Block => None,
        }
    }
}

/// A hard-block match blocks whatever the configured thresholds are.
pub(crate) fn decide(score: u32, hard_blocked: bool, rules: &RiskRules) -> RiskDecision {
    if hard_blocked || score >= rules.risk_threshold_block {
        RiskDecision::Block
    } else if score >= rules.risk_threshold_flag {
        RiskDecision::Flag
    } else {
        RiskDecision::Approve
    }
}

/// Admin annotation for flagged orders, e.g. `Flagged (score: 45): New Account (<24h), High Value Order`.
pub fn admin_note(assessment: &RiskAssessment) -> Option<String> {
    if assessment.decision != RiskDecision::Flag {
        return None;
    }

    let factors = assessment
        .signals
        .iter()
        .map(|signal| signal.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    Some(format!("Flagged (score: {}): {}", assessment.score, factors))
}
