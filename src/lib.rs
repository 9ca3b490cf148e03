//! Segmint: customer segmentation from transaction logs
//!
//! This library computes RFMT (Recency, Frequency, Monetary, Tenure) features
//! per customer, fits a K-Means clustering model over the standardized
//! features, and serves cluster predictions for new transaction batches over
//! HTTP. Training and inference share one feature engine so the numeric
//! features stay consistent between the two.

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod model;
pub mod scaler;
pub mod server;
pub mod train;
pub mod warehouse;

// Re-export public items for easier access
pub use cli::{Cli, Command};
pub use config::Config;
pub use data::{clean_transactions, RawTransaction, Transaction};
pub use error::{Error, Result};
pub use features::{compute_rfmt_features, feature_matrix, CustomerFeatures, FEATURE_COLUMNS};
pub use model::{fit_kmeans, KMeansModel};
pub use scaler::StandardScaler;
pub use server::{build_router, AppState, Artifacts};
