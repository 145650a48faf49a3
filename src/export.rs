//! Export normalized transactions as JSON or CSV.

use std::io::Write;

use serde::Serialize;
use thiserror::Error;

use banktap_core_types::{TransactionRecord, TxnKind};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv write failure: {0}")]
    Csv(#[from] csv::Error),
    #[error("json write failure: {0}")]
    Json(#[from] serde_json::Error),
}

/// One flattened output row: the account key plus the record fields.
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    account: &'a str,
    #[serde(rename = "type")]
    kind: TxnKind,
    date: String,
    amount: String,
    description: &'a str,
    category: &'a str,
    external_id: &'a str,
    notes: &'a str,
}

fn rows<'a>(batches: &'a [(String, Vec<TransactionRecord>)]) -> Vec<ExportRow<'a>> {
    batches
        .iter()
        .flat_map(|(account, records)| {
            records.iter().map(move |record| ExportRow {
                account,
                kind: record.kind,
                date: record.date.to_string(),
                amount: record.amount.to_string(),
                description: &record.description,
                category: &record.category_name,
                external_id: &record.external_id,
                notes: record.notes.as_deref().unwrap_or(""),
            })
        })
        .collect()
}

pub fn write_json<W: Write>(
    out: W,
    batches: &[(String, Vec<TransactionRecord>)],
) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(out, &rows(batches))?;
    Ok(())
}

pub fn write_csv<W: Write>(
    out: W,
    batches: &[(String, Vec<TransactionRecord>)],
) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_writer(out);
    for row in rows(batches) {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn batch() -> Vec<(String, Vec<TransactionRecord>)> {
        let record = TransactionRecord::new(
            TxnKind::Withdrawal,
            "COFFEE SHOP",
            Decimal::new(450, 2),
            NaiveDate::from_ymd_opt(2025, 11, 3).unwrap(),
            "t1",
        )
        .with_category("Dining");
        vec![("RBC::RBC Chequing".to_string(), vec![record])]
    }

    #[test]
    fn csv_has_a_header_and_one_row_per_record() {
        let mut out = Vec::new();
        write_csv(&mut out, &batch()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "account,type,date,amount,description,category,external_id,notes"
        );
        assert_eq!(
            lines.next().unwrap(),
            "RBC::RBC Chequing,withdrawal,2025-11-03,4.50,COFFEE SHOP,Dining,t1,"
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn json_rows_carry_the_account_key() {
        let mut out = Vec::new();
        write_json(&mut out, &batch()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value[0]["account"], "RBC::RBC Chequing");
        assert_eq!(value[0]["type"], "withdrawal");
        assert_eq!(value[0]["amount"], "4.50");
    }
}
