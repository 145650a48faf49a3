//! Shared identifiers and the canonical transaction model for banktap.
//!
//! Every site plugin normalizes its payload into [`TransactionRecord`]; the
//! capture pipeline and the storage bridge exchange nothing else.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Browser tab identifier as reported by the extension host.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TabId(pub i64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Network request identifier, scoped to one debugging session.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Money-flow direction. The amount on a record is always non-negative; the
/// sign lives here and nowhere else.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxnKind {
    Withdrawal,
    Deposit,
}

/// Downstream posting lifecycle. Never set by the capture pipeline itself.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxnStatus {
    Pending,
    Checking,
    Posting,
    Success,
    Error,
    Duplicate,
}

/// Canonical normalized transaction produced by every site plugin.
///
/// `date` is a [`NaiveDate`], so it serializes as `YYYY-MM-DD` regardless of
/// what format the upstream API used.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(rename = "type")]
    pub kind: TxnKind,
    pub description: String,
    pub category_name: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    /// Source-system unique id; empty when the source has none.
    pub external_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_name: Option<String>,
    /// Pre-edit category, kept so a user edit can be reverted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_category_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TxnStatus>,
}

impl TransactionRecord {
    pub fn new(
        kind: TxnKind,
        description: impl Into<String>,
        amount: Decimal,
        date: NaiveDate,
        external_id: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            description: description.into(),
            category_name: String::new(),
            amount,
            date,
            external_id: external_id.into(),
            notes: None,
            source_name: None,
            destination_name: None,
            original_category_name: None,
            status: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category_name = category.into();
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    /// Set the configured account display name on the side the money moved
    /// from or to, depending on direction.
    pub fn with_account(mut self, account: &str) -> Self {
        match self.kind {
            TxnKind::Withdrawal => self.source_name = Some(account.to_string()),
            TxnKind::Deposit => self.destination_name = Some(account.to_string()),
        }
        self
    }
}

/// Registration-time plugin metadata. Created once at startup, immutable
/// thereafter; read by the registry on every navigation and request event.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub display_name: String,
    pub icon_url: String,
    pub account_display_name: String,
    pub base_url_pattern: String,
    pub api_url_pattern: String,
}

impl PluginDescriptor {
    /// Storage key for the plugin/account pairing this descriptor names.
    pub fn account_key(&self) -> String {
        format!("{}::{}", self.display_name, self.account_display_name)
    }
}
