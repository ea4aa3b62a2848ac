use crate::infra::{build_storefront, read_blocklist_file};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::net::IpAddr;
use std::path::PathBuf;
use storefront_risk::checkout::risk::{BlocklistKind, BlocklistProbe, BlocklistSeverity, NewBlocklistEntry};
use storefront_risk::checkout::{
    BlocklistRepository, CartLine, CheckoutError, CheckoutRequest, CustomerId, CustomerProfile,
    MemoryStorefront, OrderId, OrderRecord, OrderRepository, OrderStatus, ProductId,
    RiskAssessment, ShippingAddress,
};
use storefront_risk::config::CheckoutConfig;
use storefront_risk::error::AppError;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Evaluation instant (RFC 3339 or YYYY-MM-DD). Defaults to now.
    #[arg(long, value_parser = crate::infra::parse_instant)]
    pub(crate) at: Option<DateTime<Utc>>,
    /// Print each assessment as JSON instead of a summary line.
    #[arg(long)]
    pub(crate) json: bool,
    /// Skip placing the flagged and blocked sample orders.
    #[arg(long)]
    pub(crate) skip_checkout: bool,
}

#[derive(Args, Debug)]
pub(crate) struct BlocklistCheckArgs {
    /// Blocklist CSV export (kind,value,severity,reason,expires_at)
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// Phone number used at checkout
    #[arg(long)]
    pub(crate) phone: String,
    /// Account identifier, when the shopper is signed in
    #[arg(long)]
    pub(crate) customer: Option<String>,
    /// Client IP address of the checkout request
    #[arg(long)]
    pub(crate) ip: Option<IpAddr>,
    /// Free-text shipping address
    #[arg(long)]
    pub(crate) address: Option<String>,
    /// Instant to check expiry against (RFC 3339 or YYYY-MM-DD). Defaults to now.
    #[arg(long, value_parser = crate::infra::parse_instant)]
    pub(crate) at: Option<DateTime<Utc>>,
}

/// One reference checkout: who orders, how much, and what the phone has been up to.
struct Scenario {
    label: &'static str,
    phone: &'static str,
    account_age: Duration,
    total: Decimal,
    live_orders: usize,
    hard_blocked: bool,
}

pub(crate) struct ScenarioOutcome {
    pub(crate) label: &'static str,
    pub(crate) assessment: RiskAssessment,
}

fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            label: "new account, modest basket",
            phone: "01710000001",
            account_age: Duration::hours(1),
            total: dec!(1000),
            live_orders: 0,
            hard_blocked: false,
        },
        Scenario {
            label: "established account, large basket",
            phone: "01710000002",
            account_age: Duration::days(180),
            total: dec!(6000),
            live_orders: 0,
            hard_blocked: false,
        },
        Scenario {
            label: "three open orders on the phone",
            phone: "01710000003",
            account_age: Duration::days(180),
            total: dec!(1000),
            live_orders: 3,
            hard_blocked: false,
        },
        Scenario {
            label: "new account, large basket, two open orders",
            phone: "01710000004",
            account_age: Duration::hours(1),
            total: dec!(6000),
            live_orders: 2,
            hard_blocked: false,
        },
        Scenario {
            label: "hard-blocked phone",
            phone: "01710000005",
            account_age: Duration::days(180),
            total: dec!(500),
            live_orders: 0,
            hard_blocked: true,
        },
        Scenario {
            label: "clean established account",
            phone: "01710000006",
            account_age: Duration::days(180),
            total: dec!(100),
            live_orders: 0,
            hard_blocked: false,
        },
    ]
}

fn demo_address() -> ShippingAddress {
    ShippingAddress {
        address: "House 21, Road 11".to_string(),
        area: Some("Banani".to_string()),
        city: Some("Dhaka".to_string()),
        ..ShippingAddress::default()
    }
}

fn demo_request(customer: &CustomerId, phone: &str) -> CheckoutRequest {
    CheckoutRequest {
        customer_id: customer.clone(),
        phone: phone.to_string(),
        shipping_address: demo_address(),
        client_ip: None,
        customer_note: None,
    }
}

fn seed_scenario(
    store: &MemoryStorefront,
    index: usize,
    scenario: &Scenario,
    now: DateTime<Utc>,
) -> Result<CustomerId, AppError> {
    let customer = CustomerId(format!("demo-{}", index + 1));
    store.add_customer(CustomerProfile::new(
        customer.clone(),
        now - scenario.account_age,
    ));

    for order in 0..scenario.live_orders {
        store
            .insert_order(OrderRecord {
                order_id: OrderId(format!("demo-{}-open-{order}", index + 1)),
                customer_id: CustomerId(format!("demo-household-{order}")),
                phone: scenario.phone.to_string(),
                shipping_address: demo_address(),
                subtotal: dec!(800),
                delivery_fee: dec!(60),
                total_amount: dec!(860),
                status: OrderStatus::Pending,
                customer_note: None,
                admin_notes: None,
                created_at: now - Duration::hours(2),
            })?;
    }

    if scenario.hard_blocked {
        store
            .insert(NewBlocklistEntry {
                kind: BlocklistKind::Phone,
                value: scenario.phone.to_string(),
                severity: BlocklistSeverity::HardBlock,
                expires_at: None,
                reason: "Refused three deliveries".to_string(),
            })?;
    }

    Ok(customer)
}

pub(crate) fn scenario_outcomes(now: DateTime<Utc>) -> Result<Vec<ScenarioOutcome>, AppError> {
    let storefront = build_storefront(CheckoutConfig::default());
    let mut outcomes = Vec::new();

    for (index, scenario) in scenarios().iter().enumerate() {
        let customer = seed_scenario(&storefront.store, index, scenario, now)?;
        let request = demo_request(&customer, scenario.phone);
        let assessment = storefront
            .checkout
            .preview_at(&request, scenario.total, now);
        outcomes.push(ScenarioOutcome {
            label: scenario.label,
            assessment,
        });
    }

    Ok(outcomes)
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let now = args.at.unwrap_or_else(Utc::now);

    println!("Checkout risk scenarios (evaluated at {})", now.to_rfc3339());
    for outcome in scenario_outcomes(now)? {
        let assessment = &outcome.assessment;
        if args.json {
            match serde_json::to_string_pretty(assessment) {
                Ok(json) => println!("- {}:\n{}", outcome.label, json),
                Err(err) => println!("- {}: assessment unavailable ({})", outcome.label, err),
            }
            continue;
        }

        let signals: Vec<String> = assessment
            .signals
            .iter()
            .map(|signal| format!("{} (+{})", signal.name, signal.points))
            .collect();
        println!(
            "- {:<45} score {:>3} -> {:<7} {}",
            outcome.label,
            assessment.score,
            assessment.decision.label(),
            if signals.is_empty() {
                "no signals".to_string()
            } else {
                signals.join(", ")
            }
        );
    }

    if args.skip_checkout {
        return Ok(());
    }

    println!("\nPlacing sample orders");
    let storefront = build_storefront(CheckoutConfig::default());
    let scenarios = scenarios();
    for (index, scenario) in scenarios.iter().enumerate().skip(3).take(2) {
        let customer = seed_scenario(&storefront.store, index, scenario, now)?;
        let product = ProductId(format!("demo-sku-{}", index + 1));
        storefront.store.set_stock(&product, 20);
        storefront.store.set_cart(
            &customer,
            vec![CartLine {
                product_id: product,
                product_name: "Demo basket".to_string(),
                unit_price: scenario.total,
                quantity: 1,
            }],
        );

        match storefront
            .checkout
            .checkout_at(demo_request(&customer, scenario.phone), now)
        {
            Ok(placed) => {
                let receipt = placed.receipt();
                println!(
                    "- {}: order {} placed, total {}, status {}",
                    scenario.label,
                    receipt.order_id.0,
                    receipt.total,
                    placed.order.status.label()
                );
                if let Some(note) = placed.order.admin_notes {
                    println!("  Admin note: {note}");
                }
            }
            Err(err @ CheckoutError::Rejected) => {
                println!("- {}: customer sees \"{}\"", scenario.label, err);
            }
            Err(err) => println!("- {}: checkout failed ({})", scenario.label, err),
        }
    }

    Ok(())
}

pub(crate) fn run_blocklist_check(args: BlocklistCheckArgs) -> Result<(), AppError> {
    let BlocklistCheckArgs {
        csv,
        phone,
        customer,
        ip,
        address,
        at,
    } = args;

    let now = at.unwrap_or_else(Utc::now);
    let entries = read_blocklist_file(&csv)?;
    let parsed = entries.len();
    let storefront = build_storefront(CheckoutConfig::default());
    let added = storefront.admin.import_blocklist(entries)?;

    let customer_id = customer.map(CustomerId);
    let shipping = address.map(|address| ShippingAddress {
        address,
        ..ShippingAddress::default()
    });
    let probe = BlocklistProbe {
        phone: phone.trim(),
        customer_id: customer_id.as_ref(),
        client_ip: ip,
        shipping_address: shipping.as_ref(),
    };
    let matches = storefront
        .store
        .find_active(&probe, None, now)?;

    println!(
        "Loaded {} entries from {} ({} duplicates skipped)",
        added,
        csv.display(),
        parsed - added
    );
    if matches.is_empty() {
        println!("No active entries match this checkout.");
        return Ok(());
    }

    println!("Active matches:");
    for entry in matches {
        let expiry = entry
            .expires_at
            .map(|expires_at| format!("until {}", expires_at.to_rfc3339()))
            .unwrap_or_else(|| "no expiry".to_string());
        println!(
            "- {} {:?} '{}' ({}, {})",
            entry.severity.label(),
            entry.kind,
            entry.value,
            entry.factor_name(),
            expiry
        );
    }

    Ok(())
}
