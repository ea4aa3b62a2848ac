//! Checkout gate for cash-on-delivery orders.
//!
//! A checkout attempt runs the hard-blocklist and daily-limit fast-fail checks, scores the
//! candidate order with the risk engine, and only then persists the order, its items and the
//! assessment. Persistence after the order row is best effort; see `service` for which
//! failures roll back and which are only logged.

pub mod admin;
pub mod domain;
pub mod memory;
pub mod repository;
pub mod risk;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use admin::{AdminError, AdminService};
pub use domain::{
    CartLine, CheckoutRequest, CustomerId, CustomerProfile, OrderId, OrderItem, OrderRecord,
    OrderStatus, ProductId, ShippingAddress, StatusHistoryEntry,
};
pub use memory::{MemoryStorefront, StoreOperation};
pub use repository::{
    BlocklistRepository, CartRepository, CustomerRepository, InventoryRepository, OrderHistory,
    OrderRepository, RepositoryError, RuleRepository,
};
pub use risk::{
    RiskAssessment, RiskDecision, RiskEvaluator, RiskRequest, RiskRules, RiskSignal, SignalSource,
};
pub use router::{checkout_router, StorefrontState};
pub use service::{
    CheckoutError, CheckoutReceipt, CheckoutService, CheckoutStores, PlacedOrder,
    GENERIC_REJECTION,
};
