//! RBC online banking plugin.
//!
//! Matches the transaction-presentation-service endpoint and flattens its
//! `transactionList`. The payload carries a top-level `hasError` flag; when
//! set, the whole response is rejected as malformed.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use banktap_core_types::{PluginDescriptor, TransactionRecord, TxnKind};
use plugin_registry::{ParseError, SitePlugin};

use crate::{amounts, dates};

static BASE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"royalbank\.com").expect("valid pattern"));
static API_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"royalbank\.com.*transaction-presentation-service").expect("valid pattern")
});

pub struct Rbc {
    account_display_name: String,
}

impl Rbc {
    pub fn new(account_display_name: impl Into<String>) -> Self {
        Self {
            account_display_name: account_display_name.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RbcResponse {
    #[serde(default)]
    has_error: bool,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    transaction_list: Vec<RbcTransaction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RbcTransaction {
    id: String,
    #[serde(default)]
    description: Vec<String>,
    booking_date: String,
    amount: f64,
    credit_debit_indicator: String,
    #[serde(default)]
    merchant_name: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

impl SitePlugin for Rbc {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor {
            display_name: "RBC".into(),
            icon_url: "icons/rbc.png".into(),
            account_display_name: self.account_display_name.clone(),
            base_url_pattern: BASE_URL.as_str().into(),
            api_url_pattern: API_URL.as_str().into(),
        }
    }

    fn base_url_pattern(&self) -> &Regex {
        &BASE_URL
    }

    fn api_url_pattern(&self) -> &Regex {
        &API_URL
    }

    fn parse(&self, body: &Value) -> Result<Vec<TransactionRecord>, ParseError> {
        let response: RbcResponse = serde_json::from_value(body.clone())
            .map_err(|err| ParseError::MalformedResponse(format!("rbc payload: {err}")))?;

        if response.has_error {
            let reason = response
                .error_description
                .unwrap_or_else(|| "rbc response reported hasError".into());
            return Err(ParseError::MalformedResponse(reason));
        }

        let mut records = Vec::with_capacity(response.transaction_list.len());
        for txn in response.transaction_list {
            let Some(date) = dates::parse_flexible(&txn.booking_date) else {
                debug!(
                    target: "site-plugins",
                    id = %txn.id,
                    raw = %txn.booking_date,
                    "rbc transaction with unparseable bookingDate; skipping"
                );
                continue;
            };

            let kind = if txn.credit_debit_indicator.eq_ignore_ascii_case("DEBIT") {
                TxnKind::Withdrawal
            } else {
                TxnKind::Deposit
            };

            let category = txn.description.first().cloned().unwrap_or_default();
            let mut description = txn.description.get(1).cloned().unwrap_or_default();
            if let Some(merchant) = txn.merchant_name.as_deref() {
                if description.is_empty() {
                    description = merchant.to_string();
                } else {
                    description = format!("{description} {merchant}");
                }
            }

            records.push(
                TransactionRecord::new(
                    kind,
                    description,
                    amounts::abs_from_f64(txn.amount),
                    date,
                    txn.id,
                )
                .with_category(category)
                .with_notes(txn.notes)
                .with_account(&self.account_display_name),
            );
        }
        Ok(records)
    }
}
