//! End-to-end tests: train from a seeded warehouse, then predict with the
//! persisted artifacts the way the service does.

use segmint::config::{ArtifactsConfig, Config, StorageConfig, TrainingConfig, WarehouseConfig};
use segmint::data::{parse_datetime, RawTransaction};
use segmint::server::{predict_batch, Artifacts, PredictRequest};
use segmint::train::run_training;
use segmint::warehouse;
use serde_json::json;
use std::path::Path;

fn tx(
    customer_id: Option<i64>,
    invoice_no: &str,
    date: &str,
    quantity: f64,
    unit_price: f64,
) -> RawTransaction {
    RawTransaction {
        customer_id,
        invoice_no: invoice_no.to_string(),
        invoice_date: parse_datetime(date).unwrap(),
        quantity,
        unit_price,
    }
}

/// Transactions for six customers with distinct purchase habits, plus noise
/// rows the cleaning stage must drop. Quantities and prices stay in a narrow
/// band so IQR outlier removal keeps every legitimate row.
fn seed_rows() -> Vec<RawTransaction> {
    let mut rows = vec![
        // dropped: anonymous, cancellation, non-positive amounts
        tx(None, "536300", "2011-01-05T09:00:00", 2.0, 2.0),
        tx(Some(10001), "C536301", "2011-01-05T09:00:00", 2.0, 2.0),
        tx(Some(10001), "536302", "2011-01-05T09:00:00", -2.0, 2.0),
        tx(Some(10001), "536303", "2011-01-05T09:00:00", 2.0, 0.0),
    ];
    for i in 0..6i64 {
        let id = 10_001 + i;
        let day = i + 1;
        rows.push(tx(Some(id), &format!("60{i}00"), &format!("2011-02-0{day}T10:00:00"), 2.0, 2.5));
        rows.push(tx(Some(id), &format!("60{i}01"), &format!("2011-07-0{day}T10:00:00"), 3.0, 3.0));
        rows.push(tx(Some(id), &format!("60{i}02"), &format!("2011-11-0{day}T10:00:00"), 4.0, 2.0));
    }
    rows
}

fn test_config(root: &Path, clusters: usize) -> Config {
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
        training: TrainingConfig {
            clusters,
            seed: 42,
            max_iters: 100,
            tolerance: 1e-4,
        },
        server: Default::default(),
    }
}

#[test]
fn test_end_to_end_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), 3);
    warehouse::write_transactions(&config.warehouse, &seed_rows()).unwrap();

    let report = run_training(&config).unwrap();

    // 22 seeded rows, 4 of them invalid
    assert_eq!(report.n_raw_rows, 22);
    assert_eq!(report.n_clean_rows, 18);
    assert_eq!(report.n_customers, 6);
    assert_eq!(report.cluster_sizes.len(), 3);
    assert_eq!(report.cluster_sizes.iter().sum::<usize>(), 6);
    assert!((-1.0..=1.0).contains(&report.silhouette));
    assert!(report.inertia >= 0.0 && report.inertia.is_finite());

    // both artifacts persisted, model uploaded, feature table written back
    assert!(config.artifacts.scaler_path().exists());
    assert!(config.artifacts.model_path().exists());
    assert!(config.storage.bucket.join("model.json").exists());
    let feature_table = std::fs::read_to_string(
        config.warehouse.root.join("retail").join("rfmt_table.csv"),
    )
    .unwrap();
    assert_eq!(feature_table.lines().count(), 7); // header + 6 customers
}

#[test]
fn test_training_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), 3);
    warehouse::write_transactions(&config.warehouse, &seed_rows()).unwrap();

    let first = run_training(&config).unwrap();
    let first_model = std::fs::read_to_string(config.artifacts.model_path()).unwrap();
    let second = run_training(&config).unwrap();
    let second_model = std::fs::read_to_string(config.artifacts.model_path()).unwrap();

    assert_eq!(first.cluster_sizes, second.cluster_sizes);
    assert_eq!(first_model, second_model);
}

#[test]
fn test_trained_artifacts_serve_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), 3);
    warehouse::write_transactions(&config.warehouse, &seed_rows()).unwrap();
    run_training(&config).unwrap();

    let artifacts = Artifacts::load(&config.artifacts).unwrap();

    let request = PredictRequest {
        latest_date: Some("2011-12-09T00:00:00".to_string()),
        transactions: Some(vec![
            json!({
                "customer_id": 10001,
                "invoice_no": "60100",
                "invoice_date": "2011-02-01T10:00:00",
                "quantity": 2.0,
                "unit_price": 2.5
            }),
            json!({
                "customer_id": 10001,
                "invoice_no": "60102",
                "invoice_date": "2011-11-01T10:00:00",
                "quantity": 4.0,
                "unit_price": 2.0
            }),
        ]),
    };

    let cluster = predict_batch(&artifacts, &request).unwrap();
    assert!(cluster < 3);

    // same batch, same artifacts, same answer
    assert_eq!(predict_batch(&artifacts, &request).unwrap(), cluster);
}

#[test]
fn test_single_invoice_batch_predicts_without_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), 3);
    warehouse::write_transactions(&config.warehouse, &seed_rows()).unwrap();
    run_training(&config).unwrap();

    let artifacts = Artifacts::load(&config.artifacts).unwrap();
    let request = PredictRequest {
        latest_date: Some("2011-12-09T00:00:00".to_string()),
        transactions: Some(vec![json!({
            "customer_id": 99999,
            "invoice_no": "70000",
            "invoice_date": "2011-12-01T10:00:00",
            "quantity": 3.0,
            "unit_price": 2.0
        })]),
    };

    // Tenure 0 and Interpurchase_Time 0, not a division error
    let cluster = predict_batch(&artifacts, &request).unwrap();
    assert!(cluster < 3);
}

#[test]
fn test_serving_refuses_to_start_without_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), 3);
    assert!(Artifacts::load(&config.artifacts).is_err());
}
