use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info, warn};

use super::domain::{
    CartLine, CheckoutRequest, OrderId, OrderItem, OrderRecord, StatusHistoryEntry,
};
use super::repository::{
    BlocklistRepository, CartRepository, CustomerRepository, InventoryRepository, OrderHistory,
    OrderRepository, RepositoryError, RuleRepository,
};
use super::risk::{
    BlocklistProbe, BlocklistSeverity, RiskAssessment, RiskDecision, RiskEvaluator, RiskRequest,
    RiskRules, SignalSource,
};
use crate::config::CheckoutConfig;
use crate::telemetry::redact_phone;

/// Trait-object handles to every collaborator the checkout path touches.
#[derive(Clone)]
pub struct CheckoutStores {
    pub blocklist: Arc<dyn BlocklistRepository>,
    pub rules: Arc<dyn RuleRepository>,
    pub customers: Arc<dyn CustomerRepository>,
    pub history: Arc<dyn OrderHistory>,
    pub orders: Arc<dyn OrderRepository>,
    pub carts: Arc<dyn CartRepository>,
    pub inventory: Arc<dyn InventoryRepository>,
}

/// Orchestrates one checkout attempt: fast-fail checks, risk gate, then persistence.
pub struct CheckoutService {
    stores: CheckoutStores,
    evaluator: RiskEvaluator,
    config: CheckoutConfig,
}

static ORDER_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_order_id() -> OrderId {
    let id = ORDER_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    OrderId(format!("ord-{id:06}"))
}

/// Shown to the customer for every risk rejection, whatever triggered it.
pub const GENERIC_REJECTION: &str =
    "We could not place this order. Please contact customer support for assistance.";

/// Error raised by the checkout service.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("{}", GENERIC_REJECTION)]
    Rejected,
    #[error("you have reached the limit of {limit} orders for today; please try again tomorrow")]
    DailyLimitReached { limit: u32 },
    #[error("cart is empty")]
    EmptyCart,
    #[error("order total is too large to process")]
    AmountOverflow,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Accepted order together with the assessment that gated it.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: OrderRecord,
    pub items: Vec<OrderItem>,
    pub assessment: RiskAssessment,
}

impl PlacedOrder {
    /// Customer-facing confirmation. Flagged and approved orders look the same.
    pub fn receipt(&self) -> CheckoutReceipt {
        CheckoutReceipt {
            order_id: self.order.order_id.clone(),
            total: self.order.total_amount,
            status: "placed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutReceipt {
    pub order_id: OrderId,
    pub total: Decimal,
    pub status: &'static str,
}

impl CheckoutService {
    pub fn new(stores: CheckoutStores, config: CheckoutConfig) -> Self {
        let evaluator = RiskEvaluator::new(stores.blocklist.clone(), stores.history.clone());
        Self {
            stores,
            evaluator,
            config,
        }
    }

    pub fn stores(&self) -> &CheckoutStores {
        &self.stores
    }

    pub fn checkout(&self, request: CheckoutRequest) -> Result<PlacedOrder, CheckoutError> {
        self.checkout_at(request, Utc::now())
    }

    pub fn checkout_at(
        &self,
        request: CheckoutRequest,
        now: DateTime<Utc>,
    ) -> Result<PlacedOrder, CheckoutError> {
        let phone = redact_phone(&request.phone);

        self.reject_hard_blocked(&request, now)?;
        let rules = self.load_rules();
        self.enforce_daily_limit(&request, &rules, now)?;

        let cart = self.stores.carts.load_cart(&request.customer_id)?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let subtotal = cart
            .iter()
            .try_fold(Decimal::ZERO, |sum, line| {
                line.line_total().and_then(|line_total| sum.checked_add(line_total))
            })
            .ok_or(CheckoutError::AmountOverflow)?;
        let total_amount = subtotal
            .checked_add(self.config.delivery_fee)
            .ok_or(CheckoutError::AmountOverflow)?;

        let assessment = self.assess(&request, total_amount, &rules, now);

        let Some(status) = assessment.decision.initial_status() else {
            warn!(
                customer = %request.customer_id.0,
                %phone,
                score = assessment.score,
                "checkout blocked by risk assessment"
            );
            return Err(CheckoutError::Rejected);
        };

        let order = OrderRecord {
            order_id: next_order_id(),
            customer_id: request.customer_id.clone(),
            phone: request.phone.clone(),
            shipping_address: request.shipping_address.clone(),
            subtotal,
            delivery_fee: self.config.delivery_fee,
            total_amount,
            status,
            customer_note: request.customer_note.clone(),
            admin_notes: assessment.admin_note(),
            created_at: now,
        };
        let order = self.stores.orders.insert_order(order)?;
        let items = self.persist_items(&order, &cart)?;

        self.record_side_effects(&order, &items, &assessment, now);

        info!(
            order = %order.order_id.0,
            customer = %order.customer_id.0,
            score = assessment.score,
            decision = assessment.decision.label(),
            status = order.status.label(),
            "order placed"
        );

        Ok(PlacedOrder {
            order,
            items,
            assessment,
        })
    }

    /// Dry-run the risk gate for a would-be order without persisting anything.
    pub fn preview_at(
        &self,
        request: &CheckoutRequest,
        total_amount: Decimal,
        now: DateTime<Utc>,
    ) -> RiskAssessment {
        let rules = self.load_rules();
        self.assess(request, total_amount, &rules, now)
    }

    /// Scores the request, recording profile and rule-store outages as degraded sources.
    fn assess(
        &self,
        request: &CheckoutRequest,
        total_amount: Decimal,
        rules: &ResolvedRules,
        now: DateTime<Utc>,
    ) -> RiskAssessment {
        let (profile, profile_degraded) = match self.stores.customers.fetch_profile(&request.customer_id) {
            Ok(profile) => (profile, false),
            Err(err) => {
                warn!(customer = %request.customer_id.0, error = %err, "customer profile unavailable; scoring without it");
                (None, true)
            }
        };

        let risk_request = RiskRequest::new(
            profile.as_ref(),
            &request.phone,
            total_amount,
            &request.shipping_address,
        )
        .with_customer_id(&request.customer_id)
        .with_client_ip(request.client_ip);

        let mut assessment = self
            .evaluator
            .evaluate_at(&risk_request, &rules.rules, now);
        if profile_degraded {
            assessment.note_degraded(SignalSource::CustomerProfile);
        }
        if rules.degraded {
            assessment.note_degraded(SignalSource::RuleStore);
        }
        assessment
    }

    /// Hard-block entries on the phone or account stop checkout before anything else runs.
    /// A blocklist outage here aborts the attempt.
    fn reject_hard_blocked(
        &self,
        request: &CheckoutRequest,
        now: DateTime<Utc>,
    ) -> Result<(), CheckoutError> {
        let probe = BlocklistProbe {
            phone: &request.phone,
            customer_id: Some(&request.customer_id),
            client_ip: None,
            shipping_address: None,
        };
        let hits = self
            .stores
            .blocklist
            .find_active(&probe, Some(BlocklistSeverity::HardBlock), now)?;

        if let Some(entry) = hits.first() {
            warn!(
                customer = %request.customer_id.0,
                phone = %redact_phone(&request.phone),
                entry = %entry.id.0,
                "checkout rejected by hard blocklist entry"
            );
            return Err(CheckoutError::Rejected);
        }

        Ok(())
    }

    fn enforce_daily_limit(
        &self,
        request: &CheckoutRequest,
        rules: &ResolvedRules,
        now: DateTime<Utc>,
    ) -> Result<(), CheckoutError> {
        let limit = rules.rules.max_daily_orders;
        let since = start_of_local_day(now, self.config.store_offset);
        let placed_today = self
            .stores
            .history
            .count_customer_orders_since(&request.customer_id, since)?;

        if placed_today >= limit {
            info!(customer = %request.customer_id.0, placed_today, limit, "daily order limit reached");
            return Err(CheckoutError::DailyLimitReached { limit });
        }

        Ok(())
    }

    fn load_rules(&self) -> ResolvedRules {
        match self.stores.rules.load() {
            Ok(entries) => ResolvedRules {
                rules: RiskRules::from_entries(&entries),
                degraded: false,
            },
            Err(err) => {
                warn!(error = %err, "risk rule store unavailable; using default rules");
                ResolvedRules {
                    rules: RiskRules::default(),
                    degraded: true,
                }
            }
        }
    }

    /// Items go in after the order row; on failure the row is removed again.
    fn persist_items(
        &self,
        order: &OrderRecord,
        cart: &[CartLine],
    ) -> Result<Vec<OrderItem>, CheckoutError> {
        let items: Vec<OrderItem> = cart
            .iter()
            .map(|line| OrderItem {
                order_id: order.order_id.clone(),
                product_id: line.product_id.clone(),
                product_name: line.product_name.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
            })
            .collect();

        if let Err(err) = self.stores.orders.insert_items(&items) {
            error!(order = %order.order_id.0, error = %err, "order items not stored; rolling back order");
            if let Err(rollback) = self.stores.orders.delete_order(&order.order_id) {
                error!(order = %order.order_id.0, error = %rollback, "order rollback failed");
            }
            return Err(err.into());
        }

        Ok(items)
    }

    /// Best-effort writes after the order is accepted. Failures are logged, never undone.
    fn record_side_effects(
        &self,
        order: &OrderRecord,
        items: &[OrderItem],
        assessment: &RiskAssessment,
        now: DateTime<Utc>,
    ) {
        let order_id = &order.order_id;

        if assessment.score > 0 {
            if let Err(err) = self.stores.orders.save_assessment(order_id, assessment) {
                error!(order = %order_id.0, error = %err, "risk assessment not stored");
            }
        }

        for item in items {
            if let Err(err) = self
                .stores
                .inventory
                .decrement_stock(&item.product_id, item.quantity)
            {
                error!(
                    order = %order_id.0,
                    product = %item.product_id.0,
                    quantity = item.quantity,
                    error = %err,
                    "inventory decrement failed"
                );
            }
        }

        let note = match assessment.decision {
            RiskDecision::Flag => Some("order placed; awaiting manual confirmation".to_string()),
            _ => Some("order placed".to_string()),
        };
        let entry = StatusHistoryEntry {
            order_id: order_id.clone(),
            status: order.status,
            note,
            recorded_at: now,
        };
        if let Err(err) = self.stores.orders.append_status_history(entry) {
            error!(order = %order_id.0, error = %err, "status history not recorded");
        }

        if let Err(err) = self.stores.customers.record_order_placed(&order.customer_id) {
            error!(customer = %order.customer_id.0, error = %err, "customer statistics not updated");
        }

        if let Err(err) = self.stores.carts.clear_cart(&order.customer_id) {
            error!(customer = %order.customer_id.0, error = %err, "cart not cleared");
        }
    }
}

struct ResolvedRules {
    rules: RiskRules,
    degraded: bool,
}

/// Midnight of the store's local day containing `now`, expressed in UTC.
pub fn start_of_local_day(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    let local_midnight = now
        .with_timezone(&offset)
        .date_naive()
        .and_time(NaiveTime::MIN);
    let utc_naive = local_midnight - Duration::seconds(i64::from(offset.local_minus_utc()));
    Utc.from_utc_datetime(&utc_naive)
}
