//! Rogers Bank credit card plugin.
//!
//! The activity endpoint reports amounts as signed strings and classifies
//! each activity as PURCHASE or PAYMENT. Only APPROVED activities are kept;
//! declined and pending ones have unstable reference numbers.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use banktap_core_types::{PluginDescriptor, TransactionRecord, TxnKind};
use plugin_registry::{ParseError, SitePlugin};

use crate::{amounts, dates};

static BASE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"rogersbank\.com").expect("valid pattern"));
static API_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"rogersbank\.com.*/activities").expect("valid pattern"));

pub struct RogersBank {
    account_display_name: String,
}

impl RogersBank {
    pub fn new(account_display_name: impl Into<String>) -> Self {
        Self {
            account_display_name: account_display_name.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RogersResponse {
    status_code: String,
    activity_summary: ActivitySummary,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivitySummary {
    #[serde(default)]
    activities: Vec<Activity>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Activity {
    reference_number: String,
    amount: ActivityAmount,
    activity_status: String,
    #[serde(default)]
    activity_classification: Option<String>,
    #[serde(default)]
    merchant: Option<Merchant>,
    date: String,
}

#[derive(Debug, Deserialize)]
struct ActivityAmount {
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Merchant {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    category_description: Option<String>,
}

impl SitePlugin for RogersBank {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor {
            display_name: "Rogers Bank".into(),
            icon_url: "icons/rogersbank.png".into(),
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
        let response: RogersResponse = serde_json::from_value(body.clone())
            .map_err(|err| ParseError::MalformedResponse(format!("rogers payload: {err}")))?;

        if response.status_code != "200" {
            return Err(ParseError::MalformedResponse(format!(
                "rogers response statusCode {}",
                response.status_code
            )));
        }

        let mut records = Vec::new();
        for activity in response.activity_summary.activities {
            if !activity.activity_status.eq_ignore_ascii_case("APPROVED") {
                debug!(
                    target: "site-plugins",
                    reference = %activity.reference_number,
                    status = %activity.activity_status,
                    "rogers activity not approved; skipping"
                );
                continue;
            }

            let Some(date) = dates::parse_flexible(&activity.date) else {
                debug!(
                    target: "site-plugins",
                    reference = %activity.reference_number,
                    raw = %activity.date,
                    "rogers activity with unparseable date; skipping"
                );
                continue;
            };

            // Classification wins when present; otherwise the amount sign
            // decides (negative means withdrawal).
            let Some((amount, signed_kind)) = amounts::parse_signed(&activity.amount.value) else {
                debug!(
                    target: "site-plugins",
                    reference = %activity.reference_number,
                    raw = %activity.amount.value,
                    "rogers activity with unparseable amount; skipping"
                );
                continue;
            };
            let kind = match activity.activity_classification.as_deref() {
                Some("PAYMENT") => TxnKind::Deposit,
                Some("PURCHASE") => TxnKind::Withdrawal,
                _ => signed_kind,
            };

            let merchant = activity.merchant.unwrap_or(Merchant {
                name: None,
                category: None,
                category_description: None,
            });

            records.push(
                TransactionRecord::new(
                    kind,
                    merchant.name.unwrap_or_default(),
                    amount,
                    date,
                    activity.reference_number,
                )
                .with_category(merchant.category.unwrap_or_default())
                .with_notes(merchant.category_description)
                .with_account(&self.account_display_name),
            );
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plugin() -> RogersBank {
        RogersBank::new("Rogers Red Mastercard")
    }

    fn activity(reference: &str, value: &str, classification: Option<&str>) -> Value {
        json!({
            "referenceNumber": reference,
            "amount": { "value": value, "currency": "CAD" },
            "activityStatus": "APPROVED",
            "activityClassification": classification,
            "merchant": {
                "name": "HARDWARE STORE",
                "category": "Home",
                "categoryDescription": "Home improvement"
            },
            "date": "Nov 3, 2025"
        })
    }

    fn body_with(activities: Vec<Value>) -> Value {
        json!({
            "statusCode": "200",
            "activitySummary": { "id": 1, "activities": activities }
        })
    }

    #[test]
    fn signed_string_amount_without_flag_normalizes_sign() {
        let body = body_with(vec![activity("r1", "-42.50", None)]);
        let records = plugin().parse(&body).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, TxnKind::Withdrawal);
        assert_eq!(records[0].amount.to_string(), "42.50");
        assert_eq!(records[0].date.to_string(), "2025-11-03");
    }

    #[test]
    fn classification_beats_the_amount_sign() {
        let body = body_with(vec![
            activity("r1", "120.00", Some("PURCHASE")),
            activity("r2", "-300.00", Some("PAYMENT")),
        ]);
        let records = plugin().parse(&body).unwrap();
        assert_eq!(records[0].kind, TxnKind::Withdrawal);
        assert_eq!(records[1].kind, TxnKind::Deposit);
        assert_eq!(records[1].amount.to_string(), "300.00");
        assert_eq!(
            records[1].destination_name.as_deref(),
            Some("Rogers Red Mastercard")
        );
    }

    #[test]
    fn non_approved_activities_are_skipped() {
        let mut declined = activity("r1", "10.00", Some("PURCHASE"));
        declined["activityStatus"] = json!("DECLINED");
        let body = body_with(vec![declined, activity("r2", "20.00", Some("PURCHASE"))]);
        let records = plugin().parse(&body).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].external_id, "r2");
    }

    #[test]
    fn non_200_status_code_is_malformed() {
        let body = json!({
            "statusCode": "500",
            "activitySummary": { "activities": [] }
        });
        assert!(matches!(
            plugin().parse(&body),
            Err(ParseError::MalformedResponse(_))
        ));
    }
}
