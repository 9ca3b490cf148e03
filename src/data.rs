//! Transaction records and the training-side cleaning stage

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

use crate::error::{Error, Result};

/// Marker in `invoice_no` that identifies a cancellation (credit note)
pub const CANCELLATION_MARKER: char = 'C';

/// A transaction row as stored in the warehouse table. One row is one line
/// item on one invoice. `customer_id` may be null for anonymous sales.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawTransaction {
    pub customer_id: Option<i64>,
    pub invoice_no: String,
    #[serde(with = "date_format")]
    pub invoice_date: NaiveDateTime,
    pub quantity: f64,
    pub unit_price: f64,
}

/// A validated transaction row: customer id present, ready for feature
/// computation. Inference request rows deserialize directly into this type.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Transaction {
    pub customer_id: i64,
    pub invoice_no: String,
    #[serde(with = "date_format")]
    pub invoice_date: NaiveDateTime,
    pub quantity: f64,
    pub unit_price: f64,
}

impl Transaction {
    /// Line-item total for this row
    pub fn total(&self) -> f64 {
        self.quantity * self.unit_price
    }
}

/// Parse an invoice/reference date in the formats the upstream data carries:
/// RFC 3339, `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD HH:MM:SS`, or a bare date.
pub fn parse_datetime(value: &str) -> Result<NaiveDateTime> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(value) {
        return Ok(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(dt);
        }
    }
    if let Ok(d) = chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(d.and_hms_opt(0, 0, 0).unwrap());
    }
    Err(Error::invalid_input(format!("Invalid date value: {value}")))
}

/// Serde adapter so dates round-trip as strings in CSV and JSON
pub mod date_format {
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub fn serialize<S: Serializer>(date: &NaiveDateTime, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(de)?;
        super::parse_datetime(&raw).map_err(serde::de::Error::custom)
    }
}

/// Clean raw warehouse rows for training.
///
/// In order: drop rows with a null customer id, drop cancellation invoices,
/// drop rows with non-positive quantity or unit price, drop exact duplicates,
/// then remove IQR outliers independently on quantity and unit price.
/// Duplicate and outlier removal run after the positivity filters.
pub fn clean_transactions(raw: Vec<RawTransaction>) -> Vec<Transaction> {
    info!("Cleaning data: {} raw rows", raw.len());

    let rows: Vec<Transaction> = raw
        .into_iter()
        .filter_map(|r| {
            let customer_id = r.customer_id?;
            Some(Transaction {
                customer_id,
                invoice_no: r.invoice_no,
                invoice_date: r.invoice_date,
                quantity: r.quantity,
                unit_price: r.unit_price,
            })
        })
        .filter(|t| !t.invoice_no.contains(CANCELLATION_MARKER))
        .filter(|t| t.quantity > 0.0)
        .filter(|t| t.unit_price > 0.0)
        .collect();

    let rows = drop_duplicates(rows);
    let rows = remove_outliers(rows, "quantity", |t| t.quantity);
    let rows = remove_outliers(rows, "unit_price", |t| t.unit_price);

    info!("Cleaning done: {} rows remain", rows.len());
    rows
}

/// Drop exact-duplicate rows, keeping the first occurrence
fn drop_duplicates(rows: Vec<Transaction>) -> Vec<Transaction> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|t| {
            seen.insert((
                t.customer_id,
                t.invoice_no.clone(),
                t.invoice_date,
                t.quantity.to_bits(),
                t.unit_price.to_bits(),
            ))
        })
        .collect()
}

/// Remove rows whose `value` falls outside [Q1 - 1.5*IQR, Q3 + 1.5*IQR],
/// with bounds computed over the rows as they stand before this pass.
fn remove_outliers<F>(rows: Vec<Transaction>, column: &str, value: F) -> Vec<Transaction>
where
    F: Fn(&Transaction) -> f64,
{
    if rows.is_empty() {
        return rows;
    }
    info!("Removing outliers from column: {column}");

    let mut sorted: Vec<f64> = rows.iter().map(&value).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let q1 = quantile(&sorted, 0.25);
    let q3 = quantile(&sorted, 0.75);
    let iqr = q3 - q1;
    let lower = q1 - 1.5 * iqr;
    let upper = q3 + 1.5 * iqr;

    rows.into_iter()
        .filter(|t| {
            let v = value(t);
            v >= lower && v <= upper
        })
        .collect()
}

/// Quantile of a sorted, non-empty slice using linear interpolation
/// between the two nearest ranks.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = q * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}
