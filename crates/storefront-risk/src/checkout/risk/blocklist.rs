use std::io::Read;
use std::net::IpAddr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::checkout::domain::{CustomerId, ShippingAddress};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlocklistEntryId(pub String);

/// Identifier family a blocklist entry is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlocklistKind {
    Phone,
    UserId,
    AddressKeyword,
    Ip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlocklistSeverity {
    HardBlock,
    FlagOnly,
}

impl BlocklistSeverity {
    pub const fn label(self) -> &'static str {
        match self {
            BlocklistSeverity::HardBlock => "hard_block",
            BlocklistSeverity::FlagOnly => "flag_only",
        }
    }
}

/// Administrator-maintained entry; read-only to the risk engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlocklistEntry {
    pub id: BlocklistEntryId,
    pub kind: BlocklistKind,
    pub value: String,
    pub severity: BlocklistSeverity,
    pub expires_at: Option<DateTime<Utc>>,
    pub reason: String,
}

/// Entry as submitted by an administrator, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBlocklistEntry {
    pub kind: BlocklistKind,
    pub value: String,
    pub severity: BlocklistSeverity,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reason: String,
}

impl NewBlocklistEntry {
    pub fn into_entry(self, id: BlocklistEntryId) -> BlocklistEntry {
        BlocklistEntry {
            id,
            kind: self.kind,
            value: self.value.trim().to_string(),
            severity: self.severity,
            expires_at: self.expires_at,
            reason: self.reason,
        }
    }
}

/// Identifiers of one checkout attempt, matched against the blocklist.
#[derive(Debug, Clone, Copy)]
pub struct BlocklistProbe<'a> {
    pub phone: &'a str,
    pub customer_id: Option<&'a CustomerId>,
    pub client_ip: Option<IpAddr>,
    pub shipping_address: Option<&'a ShippingAddress>,
}

impl BlocklistEntry {
    /// Entries without an expiry never lapse.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expires_at| expires_at > now)
    }

    pub fn matches(&self, probe: &BlocklistProbe<'_>) -> bool {
        let value = self.value.trim();
        if value.is_empty() {
            return false;
        }

        match self.kind {
            BlocklistKind::Phone => probe.phone.trim() == value,
            BlocklistKind::UserId => probe.customer_id.is_some_and(|id| id.0 == value),
            BlocklistKind::Ip => probe
                .client_ip
                .is_some_and(|ip| value.parse::<IpAddr>().is_ok_and(|blocked| blocked == ip)),
            BlocklistKind::AddressKeyword => probe.shipping_address.is_some_and(|address| {
                address
                    .screening_text()
                    .contains(value.to_lowercase().as_str())
            }),
        }
    }

    /// Factor label recorded on the assessment when this entry fires.
    pub fn factor_name(&self) -> String {
        let reason = self.reason.trim();
        if reason.is_empty() {
            format!("Blocklisted {}", kind_label(self.kind))
        } else {
            reason.to_string()
        }
    }
}

fn kind_label(kind: BlocklistKind) -> &'static str {
    match kind {
        BlocklistKind::Phone => "phone",
        BlocklistKind::UserId => "account",
        BlocklistKind::AddressKeyword => "address",
        BlocklistKind::Ip => "IP address",
    }
}

/// Failures while reading a blocklist CSV export.
#[derive(Debug, thiserror::Error)]
pub enum BlocklistImportError {
    #[error("failed to read blocklist export: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid blocklist CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("blocklist row {row}: {message}")]
    InvalidRow { row: usize, message: String },
}

/// Parse `kind,value,severity,reason,expires_at` rows.
pub fn parse_blocklist_csv<R: Read>(reader: R) -> Result<Vec<NewBlocklistEntry>, BlocklistImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut entries = Vec::new();

    for (index, record) in csv_reader.deserialize::<BlocklistRow>().enumerate() {
        let row = record?;
        let row_number = index + 1;
        if row.value.trim().is_empty() {
            return Err(BlocklistImportError::InvalidRow {
                row: row_number,
                message: "value is empty".to_string(),
            });
        }
        if row.kind == BlocklistKind::Ip && row.value.parse::<IpAddr>().is_err() {
            return Err(BlocklistImportError::InvalidRow {
                row: row_number,
                message: format!("'{}' is not an IP address", row.value),
            });
        }

        let expires_at = match row.expires_at.as_deref() {
            Some(raw) => Some(parse_expiry(raw).ok_or_else(|| BlocklistImportError::InvalidRow {
                row: row_number,
                message: format!("unrecognised expiry '{raw}'"),
            })?),
            None => None,
        };

        entries.push(NewBlocklistEntry {
            kind: row.kind,
            value: row.value,
            severity: row.severity,
            expires_at,
            reason: row.reason.unwrap_or_default(),
        });
    }

    Ok(entries)
}

#[derive(Debug, Deserialize)]
struct BlocklistRow {
    kind: BlocklistKind,
    value: String,
    severity: BlocklistSeverity,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    reason: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    expires_at: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn parse_expiry(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
