//! K-Means clustering over standardized RFMT features
//!
//! Training fits with linfa's K-Means; the persisted artifact keeps only the
//! centroids, so inference is plain nearest-centroid assignment with no
//! dependence on the fitted linfa object.

use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Persisted clustering model: fitted centroids in scaled feature space.
/// Immutable after training; inference reads it concurrently without locks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeansModel {
    /// Number of clusters
    pub n_clusters: usize,
    /// Centroids, shape `(n_clusters, n_features)`, in scaled space
    pub centroids: Array2<f64>,
    /// Within-cluster sum of squares on the training data
    pub inertia: f64,
}

impl KMeansModel {
    /// Assign a scaled feature vector to its nearest centroid
    pub fn predict(&self, features: ArrayView1<'_, f64>) -> Result<usize> {
        if features.len() != self.centroids.ncols() {
            return Err(Error::Computation(format!(
                "feature vector has {} dimensions, model expects {}",
                features.len(),
                self.centroids.ncols()
            )));
        }

        let mut min_distance = f64::INFINITY;
        let mut closest_cluster = 0;
        for (cluster_idx, centroid) in self.centroids.outer_iter().enumerate() {
            let distance = euclidean_distance(&features, &centroid);
            if distance < min_distance {
                min_distance = distance;
                closest_cluster = cluster_idx;
            }
        }
        Ok(closest_cluster)
    }

    /// Persist centroids and metadata as JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a persisted model. Failure here is fatal for the service.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Artifact(format!("failed to read model {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Artifact(format!("failed to parse model {}: {e}", path.display())))
    }
}

/// Fit K-Means on scaled features with a seeded RNG so fits are
/// deterministic for a given seed.
///
/// Returns the model plus the training-data cluster labels (the labels are
/// training-run observability, not part of the artifact).
pub fn fit_kmeans(
    scaled: &Array2<f64>,
    n_clusters: usize,
    max_iters: u64,
    tolerance: f64,
    seed: u64,
) -> Result<(KMeansModel, Array1<usize>)> {
    if n_clusters == 0 {
        return Err(Error::Computation("n_clusters must be at least 1".to_string()));
    }
    if scaled.nrows() < n_clusters {
        return Err(Error::Computation(format!(
            "number of data points ({}) must be at least the number of clusters ({})",
            scaled.nrows(),
            n_clusters
        )));
    }

    let dataset = DatasetBase::from(scaled.clone());
    let rng = StdRng::seed_from_u64(seed);
    let fitted = KMeans::params_with(n_clusters, rng, L2Dist)
        .max_n_iterations(max_iters)
        .tolerance(tolerance)
        .fit(&dataset)
        .map_err(|e| Error::Computation(format!("k-means fit failed: {e}")))?;

    let labels = fitted.predict(scaled);
    let centroids = fitted.centroids().clone();
    let inertia = compute_inertia(scaled, &labels, &centroids);

    Ok((
        KMeansModel {
            n_clusters,
            centroids,
            inertia,
        },
        labels,
    ))
}

/// Number of training points per cluster
pub fn cluster_sizes(labels: &Array1<usize>, n_clusters: usize) -> Vec<usize> {
    let mut sizes = vec![0; n_clusters];
    for &label in labels.iter() {
        if label < n_clusters {
            sizes[label] += 1;
        }
    }
    sizes
}

/// Mean silhouette coefficient over all points.
///
/// Observability signal only: training persists the model regardless of the
/// score. O(n^2), fine for the batch sizes this pipeline handles.
pub fn silhouette_score(features: &Array2<f64>, labels: &Array1<usize>, n_clusters: usize) -> f64 {
    let n_samples = features.nrows();
    if n_samples < 2 {
        return 0.0;
    }

    let mut silhouette_sum = 0.0;
    for i in 0..n_samples {
        let point = features.row(i);
        let cluster_label = labels[i];

        let mut same_cluster_distances = Vec::new();
        let mut other_cluster_distances: Vec<Vec<f64>> = vec![Vec::new(); n_clusters];

        for j in 0..n_samples {
            if i == j {
                continue;
            }
            let distance = euclidean_distance(&point, &features.row(j));
            let other_label = labels[j];
            if other_label == cluster_label {
                same_cluster_distances.push(distance);
            } else if other_label < n_clusters {
                other_cluster_distances[other_label].push(distance);
            }
        }

        let a_i = if same_cluster_distances.is_empty() {
            0.0
        } else {
            same_cluster_distances.iter().sum::<f64>() / same_cluster_distances.len() as f64
        };

        let b_i = other_cluster_distances
            .iter()
            .filter(|distances| !distances.is_empty())
            .map(|distances| distances.iter().sum::<f64>() / distances.len() as f64)
            .fold(f64::INFINITY, f64::min);

        let silhouette_i = if b_i.is_infinite() || (a_i == 0.0 && b_i == 0.0) {
            0.0
        } else {
            (b_i - a_i) / a_i.max(b_i)
        };
        silhouette_sum += silhouette_i;
    }

    silhouette_sum / n_samples as f64
}

/// Within-cluster sum of squares (inertia)
fn compute_inertia(features: &Array2<f64>, labels: &Array1<usize>, centroids: &Array2<f64>) -> f64 {
    let mut inertia = 0.0;
    for (i, &cluster) in labels.iter().enumerate() {
        if cluster < centroids.nrows() {
            let point = features.row(i);
            let centroid = centroids.row(cluster);
            inertia += point
                .iter()
                .zip(centroid.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>();
        }
    }
    inertia
}

/// Euclidean distance between two points
fn euclidean_distance(point1: &ArrayView1<'_, f64>, point2: &ArrayView1<'_, f64>) -> f64 {
    point1
        .iter()
        .zip(point2.iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn two_blobs() -> Array2<f64> {
        array![
            [-1.0, -1.0, -1.0, -1.0],
            [-1.1, -0.9, -1.0, -1.2],
            [-0.9, -1.1, -0.8, -1.0],
            [1.0, 1.0, 1.0, 1.0],
            [1.1, 0.9, 1.2, 1.0],
            [0.9, 1.1, 1.0, 0.8],
        ]
    }

    #[test]
    fn test_fit_kmeans_shapes() {
        let (model, labels) = fit_kmeans(&two_blobs(), 2, 100, 1e-4, 42).unwrap();
        assert_eq!(model.n_clusters, 2);
        assert_eq!(model.centroids.shape(), &[2, 4]);
        assert_eq!(labels.len(), 6);
        assert!(labels.iter().all(|&l| l < 2));
        assert!(model.inertia >= 0.0 && model.inertia.is_finite());
    }

    #[test]
    fn test_fit_is_deterministic_for_a_seed() {
        let data = two_blobs();
        let (a, _) = fit_kmeans(&data, 2, 100, 1e-4, 42).unwrap();
        let (b, _) = fit_kmeans(&data, 2, 100, 1e-4, 42).unwrap();
        assert_eq!(a.centroids, b.centroids);
    }

    #[test]
    fn test_separated_blobs_land_in_different_clusters() {
        let data = two_blobs();
        let (model, labels) = fit_kmeans(&data, 2, 100, 1e-4, 42).unwrap();
        assert_ne!(labels[0], labels[3]);

        let near_first = model.predict(array![-1.0, -1.0, -1.0, -1.0].view()).unwrap();
        let near_second = model.predict(array![1.0, 1.0, 1.0, 1.0].view()).unwrap();
        assert_eq!(near_first, labels[0]);
        assert_eq!(near_second, labels[3]);
    }

    #[test]
    fn test_predict_rejects_wrong_dimension() {
        let (model, _) = fit_kmeans(&two_blobs(), 2, 100, 1e-4, 42).unwrap();
        let err = model.predict(array![1.0, 2.0].view()).unwrap_err();
        assert!(matches!(err, Error::Computation(_)));
    }

    #[test]
    fn test_too_few_points_rejected() {
        let data = array![[1.0, 1.0, 1.0, 1.0]];
        assert!(fit_kmeans(&data, 2, 100, 1e-4, 42).is_err());
    }

    #[test]
    fn test_cluster_sizes_sum_to_samples() {
        let (model, labels) = fit_kmeans(&two_blobs(), 2, 100, 1e-4, 42).unwrap();
        let sizes = cluster_sizes(&labels, model.n_clusters);
        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes.iter().sum::<usize>(), 6);
    }

    #[test]
    fn test_silhouette_in_range_and_high_for_clean_blobs() {
        let data = two_blobs();
        let (model, labels) = fit_kmeans(&data, 2, 100, 1e-4, 42).unwrap();
        let score = silhouette_score(&data, &labels, model.n_clusters);
        assert!((-1.0..=1.0).contains(&score));
        assert!(score > 0.5, "well-separated blobs scored {score}");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let (model, _) = fit_kmeans(&two_blobs(), 2, 100, 1e-4, 42).unwrap();
        model.save(&path).unwrap();

        let loaded = KMeansModel::load(&path).unwrap();
        assert_eq!(loaded.n_clusters, model.n_clusters);
        assert_eq!(loaded.centroids, model.centroids);
    }

    #[test]
    fn test_load_missing_file_is_artifact_error() {
        let err = KMeansModel::load(Path::new("/nonexistent/model.json")).unwrap_err();
        assert!(matches!(err, Error::Artifact(_)));
    }
}
