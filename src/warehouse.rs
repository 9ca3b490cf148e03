//! Warehouse and object-store access
//!
//! The upstream system reads transactions from a cloud warehouse and pushes
//! artifacts to an object-store bucket. Those backends are external
//! collaborators; this module is the thin local stand-in that keeps the same
//! surface: tables addressed by dataset/table id, an upload step for the
//! model artifact, and a write-back of the RFMT feature table.

use csv::{ReaderBuilder, WriterBuilder};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{StorageConfig, WarehouseConfig};
use crate::data::{date_format, RawTransaction};
use crate::error::{Error, Result};
use crate::features::CustomerFeatures;

/// CSV-backed table store addressed like the cloud warehouse
#[derive(Debug, Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
}

/// One row of the persisted RFMT feature table, cluster assignment included
#[derive(Debug, Serialize)]
struct FeatureRecord {
    customer_id: i64,
    recency: f64,
    frequency: u64,
    monetary: f64,
    tenure: f64,
    interpurchase_time: f64,
    cluster: usize,
}

impl Warehouse {
    pub fn new(config: WarehouseConfig) -> Self {
        if let Some(creds) = &config.credentials_file {
            info!("Warehouse credentials file: {}", creds.display());
        }
        Warehouse { config }
    }

    fn dataset_dir(&self) -> PathBuf {
        self.config.root.join(&self.config.dataset_id)
    }

    /// Path of the transactions table
    pub fn transactions_path(&self) -> PathBuf {
        self.dataset_dir().join(format!("{}.csv", self.config.table_id))
    }

    /// Path of the derived RFMT feature table
    pub fn features_path(&self) -> PathBuf {
        self.dataset_dir().join("rfmt_table.csv")
    }

    /// Read the full transactions table
    pub fn load_transactions(&self) -> Result<Vec<RawTransaction>> {
        let path = self.transactions_path();
        info!(
            "Loading data from {}.{}.{} ({})",
            self.config.project_id,
            self.config.dataset_id,
            self.config.table_id,
            path.display()
        );

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(&path)
            .map_err(|e| {
                Error::Config(format!("failed to open table {}: {e}", path.display()))
            })?;

        let mut rows = Vec::new();
        for record in reader.deserialize() {
            let row: RawTransaction = record?;
            rows.push(row);
        }
        info!("Loaded {} transaction rows", rows.len());
        Ok(rows)
    }

    /// Replace the RFMT feature table with this training run's output
    pub fn store_features(
        &self,
        features: &[CustomerFeatures],
        clusters: &[usize],
    ) -> Result<()> {
        let path = self.features_path();
        info!("Storing RFMT feature table to {}", path.display());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = WriterBuilder::new().has_headers(true).from_path(&path)?;
        for (f, &cluster) in features.iter().zip(clusters.iter()) {
            writer.serialize(FeatureRecord {
                customer_id: f.customer_id,
                recency: f.recency,
                frequency: f.frequency,
                monetary: f.monetary,
                tenure: f.tenure,
                interpurchase_time: f.interpurchase_time,
                cluster,
            })?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Copy the persisted model artifact to the object-store bucket
pub fn upload_model(storage: &StorageConfig, model_path: &Path) -> Result<()> {
    let dest = storage.bucket.join(&storage.model_object);
    info!(
        "Uploading model {} to {}",
        model_path.display(),
        dest.display()
    );
    std::fs::create_dir_all(&storage.bucket)?;
    std::fs::copy(model_path, &dest)?;
    info!("File {} uploaded to {}", model_path.display(), storage.bucket.display());
    Ok(())
}

/// Write a transactions table under the warehouse layout. Used by tooling
/// and tests to seed a local warehouse.
pub fn write_transactions(config: &WarehouseConfig, rows: &[RawTransaction]) -> Result<()> {
    let warehouse = Warehouse::new(config.clone());
    let path = warehouse.transactions_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    #[derive(Serialize)]
    struct Record<'a> {
        customer_id: Option<i64>,
        invoice_no: &'a str,
        #[serde(with = "date_format")]
        invoice_date: chrono::NaiveDateTime,
        quantity: f64,
        unit_price: f64,
    }

    let mut writer = WriterBuilder::new().has_headers(true).from_path(&path)?;
    for row in rows {
        writer.serialize(Record {
            customer_id: row.customer_id,
            invoice_no: &row.invoice_no,
            invoice_date: row.invoice_date,
            quantity: row.quantity,
            unit_price: row.unit_price,
        })?;
    }
    writer.flush()?;
    Ok(())
}
