//! RFMT feature engine shared by training and inference
//!
//! One row of features per customer: Recency, Frequency, Monetary, Tenure,
//! and Interpurchase_Time. The model input vector is the fixed column order
//! in [`FEATURE_COLUMNS`]; both pipelines go through this module so the
//! scaler sees identical column semantics at fit time and at transform time.

use chrono::NaiveDateTime;
use ndarray::Array2;
use std::collections::{BTreeMap, HashSet};

use crate::data::Transaction;
use crate::error::{Error, Result};

/// Model input columns, in the exact order fed to the scaler and the
/// clustering model. Tenure is reported but enters the vector only through
/// Interpurchase_Time.
pub const FEATURE_COLUMNS: [&str; 4] = ["Recency", "Frequency", "Monetary", "Interpurchase_Time"];

/// RFMT features for one customer
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerFeatures {
    pub customer_id: i64,
    /// Days since the customer's last purchase, relative to the reference date
    pub recency: f64,
    /// Number of distinct invoices
    pub frequency: u64,
    /// Total spend: sum of quantity * unit_price
    pub monetary: f64,
    /// Days between the customer's first and last purchase
    pub tenure: f64,
    /// Tenure / Frequency; 0 for single-invoice customers
    pub interpurchase_time: f64,
}

impl CustomerFeatures {
    /// Feature vector in [`FEATURE_COLUMNS`] order
    pub fn vector(&self) -> [f64; 4] {
        [
            self.recency,
            self.frequency as f64,
            self.monetary,
            self.interpurchase_time,
        ]
    }
}

/// Compute RFMT features, one row per distinct customer id, ordered by
/// ascending customer id so repeated runs over the same input are identical.
///
/// Recency is measured against `reference_date`: training passes the maximum
/// invoice date seen in the cleaned data, inference passes the caller's
/// `latest_date`. Every customer group has at least one row by construction;
/// a group that somehow carries no invoices is a computation error rather
/// than a divide-by-zero.
pub fn compute_rfmt_features(
    transactions: &[Transaction],
    reference_date: NaiveDateTime,
) -> Result<Vec<CustomerFeatures>> {
    let mut groups: BTreeMap<i64, Vec<&Transaction>> = BTreeMap::new();
    for t in transactions {
        groups.entry(t.customer_id).or_default().push(t);
    }

    let mut features = Vec::with_capacity(groups.len());
    for (customer_id, rows) in groups {
        let first = rows
            .iter()
            .map(|t| t.invoice_date)
            .min()
            .ok_or_else(|| Error::Computation(format!("customer {customer_id} has no rows")))?;
        let last = rows.iter().map(|t| t.invoice_date).max().unwrap_or(first);

        let frequency = rows
            .iter()
            .map(|t| t.invoice_no.as_str())
            .collect::<HashSet<_>>()
            .len() as u64;
        if frequency == 0 {
            return Err(Error::Computation(format!(
                "customer {customer_id} has zero invoices"
            )));
        }

        let monetary: f64 = rows.iter().map(|t| t.total()).sum();
        let recency = reference_date.signed_duration_since(last).num_days() as f64;
        let tenure = last.signed_duration_since(first).num_days() as f64;

        features.push(CustomerFeatures {
            customer_id,
            recency,
            frequency,
            monetary,
            tenure,
            interpurchase_time: tenure / frequency as f64,
        });
    }

    Ok(features)
}

/// Stack feature rows into an `(n_customers, 4)` matrix in
/// [`FEATURE_COLUMNS`] order.
pub fn feature_matrix(features: &[CustomerFeatures]) -> Array2<f64> {
    let mut data = Vec::with_capacity(features.len() * FEATURE_COLUMNS.len());
    for f in features {
        data.extend_from_slice(&f.vector());
    }
    Array2::from_shape_vec((features.len(), FEATURE_COLUMNS.len()), data)
        .expect("row-major feature data matches (n, 4) shape")
}
