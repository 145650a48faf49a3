//! Scotiabank plugins.
//!
//! Both accounts go through the same transaction-history service; the
//! `accountType` query parameter tells the credit (Scene+) and chequing
//! variants apart. Credit responses nest settled transactions under
//! `data.settled`, chequing responses carry `data` as a flat list.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use banktap_core_types::{PluginDescriptor, TransactionRecord, TxnKind};
use plugin_registry::{ParseError, SitePlugin};

use crate::{amounts, dates};

static BASE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"secure\.scotiabank\.com").expect("valid pattern"));
static CREDIT_API_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"transaction-history.*accountType=CREDITCARD").expect("valid pattern")
});
static CHEQUING_API_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"transaction-history.*accountType=DAYTODAY").expect("valid pattern")
});

#[derive(Debug, Deserialize)]
struct ScotiaAmount {
    amount: f64,
}

#[derive(Debug, Deserialize)]
struct ScotiaCategory {
    description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScotiaTransaction {
    key: String,
    clean_description: String,
    transaction_date: String,
    transaction_amount: ScotiaAmount,
    transaction_type: String,
    #[serde(default)]
    category: Option<ScotiaCategory>,
    #[serde(default)]
    user_input_tag: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreditData {
    settled: Vec<ScotiaTransaction>,
}

#[derive(Debug, Deserialize)]
struct CreditResponse {
    data: CreditData,
}

#[derive(Debug, Deserialize)]
struct ChequingResponse {
    data: Vec<ScotiaTransaction>,
}

fn record_from(txn: ScotiaTransaction, account: &str) -> Option<TransactionRecord> {
    let Some(date) = dates::parse_flexible(&txn.transaction_date) else {
        debug!(
            target: "site-plugins",
            key = %txn.key,
            raw = %txn.transaction_date,
            "scotiabank transaction with unparseable transactionDate; skipping"
        );
        return None;
    };

    let kind = if txn.transaction_type.eq_ignore_ascii_case("DEBIT") {
        TxnKind::Withdrawal
    } else {
        TxnKind::Deposit
    };
    let category = txn.category.map(|c| c.description).unwrap_or_default();

    Some(
        TransactionRecord::new(
            kind,
            txn.clean_description,
            amounts::abs_from_f64(txn.transaction_amount.amount),
            date,
            txn.key,
        )
        .with_category(category)
        .with_notes(txn.user_input_tag)
        .with_account(account),
    )
}

/// Scene+ credit card: settled transactions only. Pending entries are not
/// stable yet and would churn external ids on every scrape.
pub struct ScotiabankCredit {
    account_display_name: String,
}

impl ScotiabankCredit {
    pub fn new(account_display_name: impl Into<String>) -> Self {
        Self {
            account_display_name: account_display_name.into(),
        }
    }
}

impl SitePlugin for ScotiabankCredit {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor {
            display_name: "Scotiabank Scene+".into(),
            icon_url: "icons/scotiabank.png".into(),
            account_display_name: self.account_display_name.clone(),
            base_url_pattern: BASE_URL.as_str().into(),
            api_url_pattern: CREDIT_API_URL.as_str().into(),
        }
    }

    fn base_url_pattern(&self) -> &Regex {
        &BASE_URL
    }

    fn api_url_pattern(&self) -> &Regex {
        &CREDIT_API_URL
    }

    fn parse(&self, body: &Value) -> Result<Vec<TransactionRecord>, ParseError> {
        let response: CreditResponse = serde_json::from_value(body.clone())
            .map_err(|err| ParseError::MalformedResponse(format!("scotiabank credit payload: {err}")))?;
        Ok(response
            .data
            .settled
            .into_iter()
            .filter_map(|txn| record_from(txn, &self.account_display_name))
            .collect())
    }
}

pub struct ScotiabankChequing {
    account_display_name: String,
}

impl ScotiabankChequing {
    pub fn new(account_display_name: impl Into<String>) -> Self {
        Self {
            account_display_name: account_display_name.into(),
        }
    }
}

impl SitePlugin for ScotiabankChequing {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor {
            display_name: "Scotiabank Chequing".into(),
            icon_url: "icons/scotiabank.png".into(),
            account_display_name: self.account_display_name.clone(),
            base_url_pattern: BASE_URL.as_str().into(),
            api_url_pattern: CHEQUING_API_URL.as_str().into(),
        }
    }

    fn base_url_pattern(&self) -> &Regex {
        &BASE_URL
    }

    fn api_url_pattern(&self) -> &Regex {
        &CHEQUING_API_URL
    }

    fn parse(&self, body: &Value) -> Result<Vec<TransactionRecord>, ParseError> {
        let response: ChequingResponse = serde_json::from_value(body.clone()).map_err(|err| {
            ParseError::MalformedResponse(format!("scotiabank chequing payload: {err}"))
        })?;
        Ok(response
            .data
            .into_iter()
            .filter_map(|txn| record_from(txn, &self.account_display_name))
            .collect())
    }
}
