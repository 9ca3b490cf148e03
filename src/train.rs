//! Offline training pipeline
//!
//! Single-pass batch job: load transactions, clean them, compute RFMT
//! features, fit the scaler and the clustering model, persist both artifacts,
//! upload the model to the object store, and write the feature table (with
//! cluster assignments) back to the warehouse. Warehouse or persistence
//! failures abort the run.

use tracing::info;

use crate::config::Config;
use crate::data::clean_transactions;
use crate::error::{Error, Result};
use crate::features::{compute_rfmt_features, feature_matrix};
use crate::model::{self, fit_kmeans};
use crate::scaler::StandardScaler;
use crate::warehouse::{self, Warehouse};

/// Summary of a completed training run
#[derive(Debug)]
pub struct TrainReport {
    pub n_raw_rows: usize,
    pub n_clean_rows: usize,
    pub n_customers: usize,
    pub inertia: f64,
    pub silhouette: f64,
    pub cluster_sizes: Vec<usize>,
}

/// Run the full training pipeline as configured
pub fn run_training(config: &Config) -> Result<TrainReport> {
    let warehouse = Warehouse::new(config.warehouse.clone());

    let raw = warehouse.load_transactions()?;
    let n_raw_rows = raw.len();

    let cleaned = clean_transactions(raw);
    let n_clean_rows = cleaned.len();
    if cleaned.is_empty() {
        return Err(Error::Computation(
            "no valid transactions remain after cleaning".to_string(),
        ));
    }

    // At training time the reference date is the newest invoice in the data;
    // inference uses the caller-supplied latest_date instead.
    let reference_date = cleaned
        .iter()
        .map(|t| t.invoice_date)
        .max()
        .ok_or_else(|| Error::Computation("no invoice dates in cleaned data".to_string()))?;

    info!("Creating RFMT features (reference date {reference_date})");
    let features = compute_rfmt_features(&cleaned, reference_date)?;
    let n_customers = features.len();
    info!("Computed features for {n_customers} customers");

    let rfmt = feature_matrix(&features);

    info!("Scaling RFMT data");
    let scaler = StandardScaler::fit(&rfmt)?;
    std::fs::create_dir_all(&config.artifacts.dir)?;
    scaler.save(&config.artifacts.scaler_path())?;
    info!("Scaler saved to {}", config.artifacts.scaler_path().display());

    let rfmt_scaled = scaler.transform(&rfmt)?;

    info!(
        "Training clustering model (k={}, seed={})",
        config.training.clusters, config.training.seed
    );
    let (kmeans, labels) = fit_kmeans(
        &rfmt_scaled,
        config.training.clusters,
        config.training.max_iters,
        config.training.tolerance,
        config.training.seed,
    )?;

    // Observability only; a poor score never blocks persistence
    let silhouette = model::silhouette_score(&rfmt_scaled, &labels, kmeans.n_clusters);
    info!("Silhouette score: {silhouette:.4}");

    let sizes = model::cluster_sizes(&labels, kmeans.n_clusters);
    for (i, size) in sizes.iter().enumerate() {
        info!("Cluster {i}: {size} customers");
    }

    kmeans.save(&config.artifacts.model_path())?;
    info!("Model saved to {}", config.artifacts.model_path().display());

    warehouse::upload_model(&config.storage, &config.artifacts.model_path())?;

    let assignments: Vec<usize> = labels.to_vec();
    warehouse.store_features(&features, &assignments)?;

    Ok(TrainReport {
        n_raw_rows,
        n_clean_rows,
        n_customers,
        inertia: kmeans.inertia,
        silhouette,
        cluster_sizes: sizes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ArtifactsConfig, StorageConfig, WarehouseConfig};
    use crate::data::{parse_datetime, RawTransaction};
    use std::path::Path;

    fn tx(customer_id: i64, invoice_no: &str, date: &str, quantity: f64, unit_price: f64) -> RawTransaction {
        RawTransaction {
            customer_id: Some(customer_id),
            invoice_no: invoice_no.to_string(),
            invoice_date: parse_datetime(date).unwrap(),
            quantity,
            unit_price,
        }
    }

    /// Six customers with tame quantities/prices so IQR removal keeps them
    fn seed_rows() -> Vec<RawTransaction> {
        let mut rows = Vec::new();
        for i in 0..6i64 {
            let id = 10_000 + i;
            let day = i + 1;
            rows.push(tx(id, &format!("54{i}00"), &format!("2011-01-0{day}T09:00:00"), 2.0, 2.5));
            rows.push(tx(id, &format!("54{i}01"), &format!("2011-06-0{day}T09:00:00"), 3.0, 3.0));
            rows.push(tx(id, &format!("54{i}02"), &format!("2011-11-0{day}T09:00:00"), 4.0, 2.0));
        }
        rows
    }

    fn test_config(root: &Path) -> Config {
        Config {
            warehouse: WarehouseConfig {
                root: root.join("data"),
                project_id: "test".to_string(),
                dataset_id: "retail".to_string(),
                table_id: "transactions".to_string(),
                credentials_file: None,
            },
            storage: StorageConfig {
                bucket: root.join("bucket"),
                model_object: "model.json".to_string(),
            },
            artifacts: ArtifactsConfig {
                dir: root.join("models"),
            },
            training: crate::config::TrainingConfig {
                clusters: 3,
                seed: 42,
                max_iters: 100,
                tolerance: 1e-4,
            },
            server: Default::default(),
        }
    }

    #[test]
    fn test_run_training_produces_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        warehouse::write_transactions(&config.warehouse, &seed_rows()).unwrap();

        let report = run_training(&config).unwrap();
        assert_eq!(report.n_raw_rows, 18);
        assert_eq!(report.n_customers, 6);
        assert_eq!(report.cluster_sizes.iter().sum::<usize>(), 6);
        assert!(report.inertia.is_finite());

        assert!(config.artifacts.scaler_path().exists());
        assert!(config.artifacts.model_path().exists());
        assert!(config.storage.bucket.join("model.json").exists());
        assert!(config
            .warehouse
            .root
            .join("retail")
            .join("rfmt_table.csv")
            .exists());
    }

    #[test]
    fn test_training_fails_without_table() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        assert!(run_training(&config).is_err());
    }

    #[test]
    fn test_training_fails_when_everything_is_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let rows = vec![tx(1, "C100", "2011-01-01T09:00:00", 2.0, 2.0)];
        warehouse::write_transactions(&config.warehouse, &rows).unwrap();
        assert!(matches!(
            run_training(&config),
            Err(Error::Computation(_))
        ));
    }
}
