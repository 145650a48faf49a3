//! Replay a small recorded session end to end and export the result.

use serde_json::json;

use banktap::config::Settings;
use banktap::export;
use banktap::replay::{run_capture, CaptureBody, CaptureEvent, CaptureFile, CaptureTab};

fn rogers_capture() -> CaptureFile {
    let body = json!({
        "statusCode": "200",
        "activitySummary": {
            "activities": [
                {
                    "referenceNumber": "ref-1",
                    "amount": { "value": "-42.50", "currency": "CAD" },
                    "activityStatus": "APPROVED",
                    "activityClassification": "PURCHASE",
                    "merchant": {
                        "name": "HARDWARE STORE",
                        "category": "Home",
                        "categoryDescription": "Home improvement"
                    },
                    "date": "Nov 3, 2025"
                },
                {
                    "referenceNumber": "ref-2",
                    "amount": { "value": "300.00", "currency": "CAD" },
                    "activityStatus": "APPROVED",
                    "activityClassification": "PAYMENT",
                    "date": "2025-11-05"
                }
            ]
        }
    });

    CaptureFile {
        tabs: vec![CaptureTab {
            id: 1,
            url: "https://www.rogersbank.com/account".into(),
        }],
        events: vec![
            CaptureEvent {
                tab: 1,
                method: "Network.responseReceived".into(),
                params: json!({
                    "requestId": "r1",
                    "response": { "url": "https://www.rogersbank.com/api/v1/activities?cycle=current" }
                }),
            },
            // Unrelated request interleaved between the two halves.
            CaptureEvent {
                tab: 1,
                method: "Network.responseReceived".into(),
                params: json!({
                    "requestId": "r2",
                    "response": { "url": "https://www.rogersbank.com/assets/app.js" }
                }),
            },
            CaptureEvent {
                tab: 1,
                method: "Network.loadingFailed".into(),
                params: json!({ "requestId": "r2" }),
            },
            CaptureEvent {
                tab: 1,
                method: "Network.loadingFinished".into(),
                params: json!({ "requestId": "r1" }),
            },
        ],
        bodies: vec![CaptureBody {
            tab: 1,
            request: "r1".into(),
            body: body.to_string(),
            base64_encoded: false,
        }],
    }
}

#[tokio::test]
async fn recorded_session_produces_normalized_transactions() {
    let settings = Settings::default();
    let store = run_capture(&rogers_capture(), &settings).await.unwrap();

    let key = format!("Rogers Bank::{}", settings.accounts.rogers_bank);
    let stored = store.transactions_for(&key);
    assert_eq!(stored.len(), 2);

    assert_eq!(stored[0].external_id, "ref-1");
    assert_eq!(stored[0].amount.to_string(), "42.50");
    assert_eq!(stored[0].date.to_string(), "2025-11-03");
    assert_eq!(
        stored[0].source_name.as_deref(),
        Some(settings.accounts.rogers_bank.as_str())
    );

    assert_eq!(stored[1].external_id, "ref-2");
    assert_eq!(
        stored[1].destination_name.as_deref(),
        Some(settings.accounts.rogers_bank.as_str())
    );

    // Registered plugins and the active-plugin indicator are published too.
    assert_eq!(store.registered_plugins().len(), 4);
    assert_eq!(
        store.active_plugin().map(|d| d.display_name),
        Some("Rogers Bank".to_string())
    );
}

#[tokio::test]
async fn replayed_batches_export_to_csv() {
    let settings = Settings::default();
    let store = run_capture(&rogers_capture(), &settings).await.unwrap();
    let mut batches = store.all_transactions();
    batches.sort_by(|a, b| a.0.cmp(&b.0));

    let mut out = Vec::new();
    export::write_csv(&mut out, &batches).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert_eq!(text.lines().count(), 3);
    assert!(text.contains("withdrawal"));
    assert!(text.contains("ref-2"));
}
