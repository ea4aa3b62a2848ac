//! Rule-based order risk assessment run synchronously during checkout.
//!
//! `assess` is a pure function of the gathered inputs and the rule snapshot. The
//! `RiskEvaluator` gathers those inputs from the blocklist and order-history collaborators
//! and never fails: an unreachable collaborator contributes no points and is recorded in
//! `RiskAssessment::degraded_sources`.

pub mod blocklist;
mod config;
mod policy;
mod rules;

pub use blocklist::{
    parse_blocklist_csv, BlocklistEntry, BlocklistEntryId, BlocklistImportError, BlocklistKind,
    BlocklistProbe, BlocklistSeverity, NewBlocklistEntry,
};
pub use config::{RiskRules, RuleKey, RuleValueError};
pub use policy::{admin_note, RiskDecision};

use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{CustomerId, CustomerProfile, OrderStatus, ShippingAddress};
use super::repository::{BlocklistRepository, OrderHistory};
use crate::telemetry::redact_phone;

/// One named, point-valued contributor to a score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSignal {
    pub name: String,
    pub points: u32,
}

impl RiskSignal {
    pub fn new(name: impl Into<String>, points: u32) -> Self {
        Self {
            name: name.into(),
            points,
        }
    }
}

/// Collaborator whose data could not be read during an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Blocklist,
    OrderHistory,
    CustomerProfile,
    RuleStore,
}

/// Outcome of a single evaluation. Persisted 1:1 with the order it gated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: u32,
    pub decision: RiskDecision,
    pub signals: Vec<RiskSignal>,
    pub evaluated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded_sources: Vec<SignalSource>,
}

impl RiskAssessment {
    pub fn note_degraded(&mut self, source: SignalSource) {
        if !self.degraded_sources.contains(&source) {
            self.degraded_sources.push(source);
        }
    }

    pub fn admin_note(&self) -> Option<String> {
        admin_note(self)
    }
}

/// Everything the scoring rules look at, already fetched.
#[derive(Debug, Clone)]
pub struct RiskInputs<'a> {
    pub customer: Option<&'a CustomerProfile>,
    pub total_amount: Decimal,
    /// Orders for the phone in the trailing 24 hours that are neither cancelled nor delivered.
    pub recent_live_orders: u32,
    pub blocklist_matches: &'a [BlocklistEntry],
    pub now: DateTime<Utc>,
}

/// Score `inputs` against `rules`. Deterministic for identical arguments.
pub fn assess(inputs: &RiskInputs<'_>, rules: &RiskRules) -> RiskAssessment {
    let signals = rules::collect_signals(inputs, rules);
    let score = signals
        .iter()
        .fold(0u32, |total, signal| total.saturating_add(signal.points));
    let hard_blocked = inputs
        .blocklist_matches
        .iter()
        .any(|entry| entry.severity == BlocklistSeverity::HardBlock);
    let decision = policy::decide(score, hard_blocked, rules);

    RiskAssessment {
        score,
        decision,
        signals,
        evaluated_at: inputs.now,
        degraded_sources: Vec::new(),
    }
}

/// Candidate order as seen by the evaluator.
#[derive(Debug, Clone, Copy)]
pub struct RiskRequest<'a> {
    pub customer: Option<&'a CustomerProfile>,
    pub customer_id: Option<&'a CustomerId>,
    pub phone: &'a str,
    pub total_amount: Decimal,
    pub shipping_address: &'a ShippingAddress,
    pub client_ip: Option<IpAddr>,
}

impl<'a> RiskRequest<'a> {
    pub fn new(
        customer: Option<&'a CustomerProfile>,
        phone: &'a str,
        total_amount: Decimal,
        shipping_address: &'a ShippingAddress,
    ) -> Self {
        Self {
            customer,
            customer_id: customer.map(|profile| &profile.customer_id),
            phone,
            total_amount,
            shipping_address,
            client_ip: None,
        }
    }

    pub fn with_customer_id(mut self, customer_id: &'a CustomerId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn with_client_ip(mut self, client_ip: Option<IpAddr>) -> Self {
        self.client_ip = client_ip;
        self
    }

    fn probe(&self) -> BlocklistProbe<'a> {
        BlocklistProbe {
            phone: self.phone,
            customer_id: self.customer_id,
            client_ip: self.client_ip,
            shipping_address: Some(self.shipping_address),
        }
    }
}

/// Gathers signal data from the collaborators and scores it.
#[derive(Clone)]
pub struct RiskEvaluator {
    blocklist: Arc<dyn BlocklistRepository>,
    history: Arc<dyn OrderHistory>,
}

impl RiskEvaluator {
    pub fn new(blocklist: Arc<dyn BlocklistRepository>, history: Arc<dyn OrderHistory>) -> Self {
        Self { blocklist, history }
    }

    pub fn evaluate(&self, request: &RiskRequest<'_>, rules: &RiskRules) -> RiskAssessment {
        self.evaluate_at(request, rules, Utc::now())
    }

    pub fn evaluate_at(
        &self,
        request: &RiskRequest<'_>,
        rules: &RiskRules,
        now: DateTime<Utc>,
    ) -> RiskAssessment {
        let mut degraded = Vec::new();

        let total_amount = if request.total_amount.is_sign_negative() {
            warn!(amount = %request.total_amount, "negative order amount clamped to zero");
            Decimal::ZERO
        } else {
            request.total_amount
        };

        let since = now - rules::velocity_window();
        let recent_live_orders = match self.history.count_recent_orders(
            request.phone,
            since,
            &OrderStatus::VELOCITY_EXCLUDED,
        ) {
            Ok(count) => count,
            Err(err) => {
                warn!(phone = %redact_phone(request.phone), error = %err, "order history unavailable; velocity signal skipped");
                degraded.push(SignalSource::OrderHistory);
                0
            }
        };

        let blocklist_matches = match self.blocklist.find_active(&request.probe(), None, now) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(phone = %redact_phone(request.phone), error = %err, "blocklist unavailable; blocklist signal skipped");
                degraded.push(SignalSource::Blocklist);
                Vec::new()
            }
        };

        let inputs = RiskInputs {
            customer: request.customer,
            total_amount,
            recent_live_orders,
            blocklist_matches: &blocklist_matches,
            now,
        };

        let mut assessment = assess(&inputs, rules);
        for source in degraded {
            assessment.note_degraded(source);
        }
        assessment
    }
}
