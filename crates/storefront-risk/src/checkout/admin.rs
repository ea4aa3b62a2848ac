use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{error, info};

use super::domain::{OrderId, OrderRecord, OrderStatus, StatusHistoryEntry};
use super::repository::RepositoryError;
use super::risk::{
    BlocklistEntry, BlocklistEntryId, NewBlocklistEntry, RiskAssessment, RiskRules,
    RuleValueError,
};
use super::service::CheckoutStores;

/// Error raised by back-office operations.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("order {0} not found")]
    OrderNotFound(String),
    #[error("blocklist entry {0} not found")]
    BlocklistEntryNotFound(String),
    #[error("order cannot move from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
    #[error(transparent)]
    Rule(#[from] RuleValueError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Back-office operations over orders, the blocklist and risk rules.
pub struct AdminService {
    stores: CheckoutStores,
}

impl AdminService {
    pub fn new(stores: CheckoutStores) -> Self {
        Self { stores }
    }

    /// Persisted assessment for an order; `None` for orders that scored zero.
    pub fn order_assessment(&self, order_id: &OrderId) -> Result<Option<RiskAssessment>, AdminError> {
        self.require_order(order_id)?;
        Ok(self.stores.orders.fetch_assessment(order_id)?)
    }

    pub fn transition_order(
        &self,
        order_id: &OrderId,
        next: OrderStatus,
        note: Option<String>,
    ) -> Result<OrderRecord, AdminError> {
        self.transition_order_at(order_id, next, note, Utc::now())
    }

    /// Move an order along its lifecycle. The status change is the only write that must
    /// succeed; history and customer statistics are best effort.
    pub fn transition_order_at(
        &self,
        order_id: &OrderId,
        next: OrderStatus,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<OrderRecord, AdminError> {
        let mut order = self.require_order(order_id)?;
        if !order.status.can_transition_to(next) {
            return Err(AdminError::InvalidTransition {
                from: order.status.label(),
                to: next.label(),
            });
        }

        self.stores.orders.update_status(order_id, next)?;
        let previous = order.status;
        order.status = next;

        let entry = StatusHistoryEntry {
            order_id: order_id.clone(),
            status: next,
            note,
            recorded_at: now,
        };
        if let Err(err) = self.stores.orders.append_status_history(entry) {
            error!(order = %order_id.0, error = %err, "status history not recorded");
        }

        if matches!(
            next,
            OrderStatus::Delivered | OrderStatus::Refused | OrderStatus::Returned
        ) {
            if let Err(err) = self.stores.customers.record_outcome(&order.customer_id, next) {
                error!(customer = %order.customer_id.0, error = %err, "customer statistics not updated");
            }
        }

        info!(
            order = %order_id.0,
            from = previous.label(),
            to = next.label(),
            "order status changed"
        );
        Ok(order)
    }

    pub fn status_history(&self, order_id: &OrderId) -> Result<Vec<StatusHistoryEntry>, AdminError> {
        self.require_order(order_id)?;
        Ok(self.stores.orders.status_history(order_id)?)
    }

    pub fn blocklist(&self) -> Result<Vec<BlocklistEntry>, AdminError> {
        Ok(self.stores.blocklist.list()?)
    }

    pub fn add_blocklist_entry(&self, entry: NewBlocklistEntry) -> Result<BlocklistEntry, AdminError> {
        let stored = self.stores.blocklist.insert(entry)?;
        info!(
            entry = %stored.id.0,
            kind = ?stored.kind,
            severity = stored.severity.label(),
            "blocklist entry added"
        );
        Ok(stored)
    }

    /// Insert every entry, skipping ones already on the list. Returns how many were added.
    pub fn import_blocklist(&self, entries: Vec<NewBlocklistEntry>) -> Result<usize, AdminError> {
        let mut added = 0;
        for entry in entries {
            match self.stores.blocklist.insert(entry) {
                Ok(_) => added += 1,
                Err(RepositoryError::Conflict) => {}
                Err(err) => return Err(err.into()),
            }
        }
        info!(added, "blocklist import finished");
        Ok(added)
    }

    pub fn remove_blocklist_entry(&self, id: &BlocklistEntryId) -> Result<(), AdminError> {
        match self.stores.blocklist.remove(id) {
            Ok(()) => {
                info!(entry = %id.0, "blocklist entry removed");
                Ok(())
            }
            Err(RepositoryError::NotFound) => Err(AdminError::BlocklistEntryNotFound(id.0.clone())),
            Err(err) => Err(err.into()),
        }
    }

    /// Typed rule snapshot as the next checkout would see it.
    pub fn risk_rules(&self) -> Result<RiskRules, AdminError> {
        let entries = self.stores.rules.load()?;
        Ok(RiskRules::from_entries(&entries))
    }

    pub fn set_risk_rule(&self, key: &str, value: Value) -> Result<RiskRules, AdminError> {
        let stored = self.stores.rules.load()?;
        let rule = RiskRules::validate_update(&stored, key, &value)?;
        self.stores.rules.set(rule.as_str(), value)?;
        info!(rule = rule.as_str(), "risk rule updated");
        self.risk_rules()
    }

    fn require_order(&self, order_id: &OrderId) -> Result<OrderRecord, AdminError> {
        self.stores
            .orders
            .fetch_order(order_id)?
            .ok_or_else(|| AdminError::OrderNotFound(order_id.0.clone()))
    }
}
