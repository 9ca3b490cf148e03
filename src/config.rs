//! Service and pipeline configuration
//!
//! Loaded from a TOML file; every field has a default so a missing file or a
//! partial file still yields a usable configuration for local runs.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub warehouse: WarehouseConfig,
    pub storage: StorageConfig,
    pub artifacts: ArtifactsConfig,
    pub training: TrainingConfig,
    pub server: ServerConfig,
}

/// Transaction warehouse identifiers. The warehouse is addressed by
/// project/dataset/table the same way the upstream system addresses its
/// tables; the local backend maps them onto CSV files under `root`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    pub root: PathBuf,
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
    /// Credential file handed to the warehouse client; unused by the local
    /// CSV backend but carried so deployments can supply it.
    pub credentials_file: Option<PathBuf>,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        WarehouseConfig {
            root: PathBuf::from("data"),
            project_id: "local".to_string(),
            dataset_id: "retail".to_string(),
            table_id: "transactions".to_string(),
            credentials_file: None,
        }
    }
}

/// Object-store destination for the trained model artifact
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub bucket: PathBuf,
    pub model_object: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            bucket: PathBuf::from("kmeans_model_bucket"),
            model_object: "model.json".to_string(),
        }
    }
}

/// Where the scaler and model artifacts live on disk
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    pub dir: PathBuf,
}

impl ArtifactsConfig {
    pub fn scaler_path(&self) -> PathBuf {
        self.dir.join("scaler.json")
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join("model.json")
    }
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        ArtifactsConfig {
            dir: PathBuf::from("models/kmeans"),
        }
    }
}

/// Training hyperparameters. k is fixed at 5 for the production
/// segmentation; the seed makes fits reproducible.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub clusters: usize,
    pub seed: u64,
    pub max_iters: u64,
    pub tolerance: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            clusters: 5,
            seed: 42,
            max_iters: 300,
            tolerance: 1e-4,
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "127.0.0.1:5000".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read config {}: {e}", path.display()))
        })?;
        toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("failed to parse config {}: {e}", path.display())))
    }

    /// Load from `path` if given, otherwise fall back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Config::default()),
        }
    }
}
