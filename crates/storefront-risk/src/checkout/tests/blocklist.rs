use chrono::Duration;

use super::common::*;
use crate::checkout::domain::ShippingAddress;
use crate::checkout::risk::{
    parse_blocklist_csv, BlocklistEntryId, BlocklistImportError, BlocklistKind, BlocklistProbe,
    BlocklistSeverity,
};

fn entry(kind: BlocklistKind, value: &str, reason: &str) -> crate::checkout::risk::BlocklistEntry {
    blocklist_entry(kind, value, BlocklistSeverity::FlagOnly, reason)
        .into_entry(BlocklistEntryId("blk-test".to_string()))
}

#[test]
fn phone_and_account_entries_match_exactly() {
    let customer = customer_id("match");
    let probe = BlocklistProbe {
        phone: PHONE,
        customer_id: Some(&customer),
        client_ip: None,
        shipping_address: None,
    };

    assert!(entry(BlocklistKind::Phone, " 01712345678 ", "").matches(&probe));
    assert!(!entry(BlocklistKind::Phone, "0171234567", "").matches(&probe));
    assert!(entry(BlocklistKind::UserId, "cust-match", "").matches(&probe));
    assert!(!entry(BlocklistKind::UserId, "cust-other", "").matches(&probe));
    assert!(!entry(BlocklistKind::AddressKeyword, "dhaka", "").matches(&probe));
}

#[test]
fn address_keywords_match_case_insensitively_across_fields() {
    let shipping = address();
    let probe = BlocklistProbe {
        phone: PHONE,
        customer_id: None,
        client_ip: None,
        shipping_address: Some(&shipping),
    };

    assert!(entry(BlocklistKind::AddressKeyword, "ROAD 4", "").matches(&probe));
    assert!(entry(BlocklistKind::AddressKeyword, "dhanmondi", "").matches(&probe));
    assert!(!entry(BlocklistKind::AddressKeyword, "gulshan", "").matches(&probe));
    assert!(!entry(BlocklistKind::AddressKeyword, "   ", "").matches(&probe));

    let bare = ShippingAddress {
        address: "Mirpur 10".to_string(),
        ..ShippingAddress::default()
    };
    let bare_probe = BlocklistProbe {
        shipping_address: Some(&bare),
        ..probe
    };
    assert!(!entry(BlocklistKind::AddressKeyword, "dhanmondi", "").matches(&bare_probe));
}

#[test]
fn ip_entries_compare_parsed_addresses() {
    let probe = BlocklistProbe {
        phone: PHONE,
        customer_id: None,
        client_ip: "2001:db8::1".parse().ok(),
        shipping_address: None,
    };

    assert!(entry(BlocklistKind::Ip, "2001:0db8:0000::0001", "").matches(&probe));
    assert!(!entry(BlocklistKind::Ip, "not-an-ip", "").matches(&probe));
}

#[test]
fn expiry_is_exclusive() {
    let mut expiring = entry(BlocklistKind::Phone, PHONE, "");
    assert!(expiring.is_active(now()));

    expiring.expires_at = Some(now());
    assert!(!expiring.is_active(now()));

    expiring.expires_at = Some(now() + Duration::seconds(1));
    assert!(expiring.is_active(now()));
}

#[test]
fn factor_name_prefers_reason() {
    assert_eq!(
        entry(BlocklistKind::Phone, PHONE, "Fake orders").factor_name(),
        "Fake orders"
    );
    assert_eq!(
        entry(BlocklistKind::AddressKeyword, "road", " ").factor_name(),
        "Blocklisted address"
    );
    assert_eq!(
        entry(BlocklistKind::Ip, "203.0.113.9", "").factor_name(),
        "Blocklisted IP address"
    );
}

#[test]
fn csv_import_reads_rows_and_expiries() {
    let data = "kind,value,severity,reason,expires_at\n\
                phone,01799999999,hard_block,Refused three parcels,\n\
                address_keyword,Road 9,flag_only,,2025-07-01\n\
                ip,203.0.113.9,hard_block,Card testing,2025-07-01T06:00:00+06:00\n";

    let entries = parse_blocklist_csv(data.as_bytes()).expect("csv parses");

    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].kind, BlocklistKind::Phone);
    assert_eq!(entries[0].severity, BlocklistSeverity::HardBlock);
    assert_eq!(entries[0].reason, "Refused three parcels");
    assert_eq!(entries[0].expires_at, None);
    assert_eq!(entries[1].reason, "");
    assert_eq!(
        entries[1].expires_at.map(|at| at.to_rfc3339()),
        Some("2025-07-01T00:00:00+00:00".to_string())
    );
    assert_eq!(
        entries[2].expires_at.map(|at| at.to_rfc3339()),
        Some("2025-07-01T00:00:00+00:00".to_string())
    );
}

#[test]
fn csv_import_rejects_bad_rows() {
    let empty_value = "kind,value,severity,reason,expires_at\nphone,,hard_block,,\n";
    assert!(matches!(
        parse_blocklist_csv(empty_value.as_bytes()),
        Err(BlocklistImportError::InvalidRow { row: 1, .. })
    ));

    let bad_ip = "kind,value,severity,reason,expires_at\n\
                  phone,01711111111,flag_only,,\n\
                  ip,999.1.1.1,hard_block,,\n";
    assert!(matches!(
        parse_blocklist_csv(bad_ip.as_bytes()),
        Err(BlocklistImportError::InvalidRow { row: 2, .. })
    ));

    let bad_expiry = "kind,value,severity,reason,expires_at\nphone,0171,flag_only,,next week\n";
    assert!(matches!(
        parse_blocklist_csv(bad_expiry.as_bytes()),
        Err(BlocklistImportError::InvalidRow { row: 1, .. })
    ));

    let bad_kind = "kind,value,severity,reason,expires_at\nemail,a@b.c,flag_only,,\n";
    assert!(matches!(
        parse_blocklist_csv(bad_kind.as_bytes()),
        Err(BlocklistImportError::Csv(_))
    ));
}
