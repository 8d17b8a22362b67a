//! K-means clustering and elbow-based cluster-count selection

use ndarray::{Array2, ArrayView1};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::ClusterConfig;
use crate::error::{PipelineError, Result};
use crate::pipeline::knee::find_knee;

/// A converged k-means solution
#[derive(Debug, Clone)]
pub struct KMeansFit {
    pub centroids: Array2<f64>,
    pub labels: Vec<usize>,
    /// Sum of squared distances to the nearest centroid
    pub inertia: f64,
}

/// K-means with k-means++ seeding and Lloyd iterations
#[derive(Debug, Clone)]
pub struct KMeans {
    pub n_clusters: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub random_state: u64,
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            max_iter: 300,
            tol: 1e-4,
            random_state: 42,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit from a fresh k-means++ initialization
    pub fn fit(&self, x: &Array2<f64>) -> Result<KMeansFit> {
        self.check_input(x)?;
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let init = kmeans_pp_init(x, self.n_clusters, &mut rng);
        Ok(self.lloyd(x, init, &mut rng))
    }

    /// Fit starting from an existing set of centroids extended by k-means++
    /// draws up to `n_clusters`.
    ///
    /// The result never has a higher inertia than `previous` evaluated on `x`.
    pub fn fit_warm(&self, x: &Array2<f64>, previous: &Array2<f64>) -> Result<KMeansFit> {
        self.check_input(x)?;
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut init = previous.clone();
        while init.nrows() < self.n_clusters {
            init = extend_kmeans_pp(x, &init, &mut rng);
        }
        Ok(self.lloyd(x, init, &mut rng))
    }

    fn check_input(&self, x: &Array2<f64>) -> Result<()> {
        if self.n_clusters == 0 {
            return Err(PipelineError::data("k-means needs at least one cluster"));
        }
        if x.nrows() < self.n_clusters {
            return Err(PipelineError::data(format!(
                "n_samples ({}) < n_clusters ({})",
                x.nrows(),
                self.n_clusters
            )));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::data("k-means input contains non-finite values"));
        }
        Ok(())
    }

    /// Lloyd iterations keeping the lowest-inertia state seen, so the result is
    /// never worse than the initialization.
    fn lloyd(&self, x: &Array2<f64>, mut centroids: Array2<f64>, rng: &mut ChaCha8Rng) -> KMeansFit {
        let n_samples = x.nrows();
        let k = centroids.nrows();
        let mut best: Option<KMeansFit> = None;

        for iter in 0..=self.max_iter {
            let (labels, inertia) = assign(x, &centroids);
            if best.as_ref().map_or(true, |b| inertia < b.inertia) {
                best = Some(KMeansFit {
                    centroids: centroids.clone(),
                    labels: labels.clone(),
                    inertia,
                });
            }
            if iter == self.max_iter {
                break;
            }

            // Update step: recompute centroids
            let mut new_centroids = Array2::zeros(centroids.dim());
            let mut counts = vec![0usize; k];
            for (i, &c) in labels.iter().enumerate() {
                counts[c] += 1;
                let mut row = new_centroids.row_mut(c);
                row += &x.row(i);
            }
            for c in 0..k {
                if counts[c] > 0 {
                    new_centroids.row_mut(c).mapv_inplace(|v| v / counts[c] as f64);
                } else {
                    // Empty cluster - reinitialize on a random sample
                    let idx = (rng.next_u64() as usize) % n_samples;
                    new_centroids.row_mut(c).assign(&x.row(idx));
                }
            }

            let shift: f64 = centroids
                .iter()
                .zip(new_centroids.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();
            centroids = new_centroids;

            if shift < self.tol {
                let (labels, inertia) = assign(x, &centroids);
                if best.as_ref().map_or(true, |b| inertia < b.inertia) {
                    best = Some(KMeansFit {
                        centroids: centroids.clone(),
                        labels,
                        inertia,
                    });
                }
                break;
            }
        }

        // The loop body always records at least one state
        best.unwrap_or_else(|| {
            let (labels, inertia) = assign(x, &centroids);
            KMeansFit {
                centroids,
                labels,
                inertia,
            }
        })
    }
}

fn euclidean_sq(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Index and squared distance of the nearest centroid; ties go to the lower index
fn nearest(row: &ArrayView1<f64>, centroids: &Array2<f64>) -> (usize, f64) {
    let mut best_c = 0;
    let mut best_dist = f64::MAX;
    for c in 0..centroids.nrows() {
        let d = euclidean_sq(row, &centroids.row(c));
        if d < best_dist {
            best_dist = d;
            best_c = c;
        }
    }
    (best_c, best_dist)
}

/// Nearest-centroid labels and the resulting inertia
fn assign(x: &Array2<f64>, centroids: &Array2<f64>) -> (Vec<usize>, f64) {
    let assigned: Vec<(usize, f64)> = (0..x.nrows())
        .into_par_iter()
        .map(|i| nearest(&x.row(i), centroids))
        .collect();
    let inertia = assigned.iter().map(|(_, d)| d).sum();
    (assigned.into_iter().map(|(c, _)| c).collect(), inertia)
}

/// K-means++ initialization: pick centroids spread apart
fn kmeans_pp_init(x: &Array2<f64>, k: usize, rng: &mut ChaCha8Rng) -> Array2<f64> {
    let n_samples = x.nrows();
    let first = (rng.next_u64() as usize) % n_samples;
    let mut centroids = x.row(first).to_owned().insert_axis(ndarray::Axis(0));
    while centroids.nrows() < k {
        centroids = extend_kmeans_pp(x, &centroids, rng);
    }
    centroids
}

/// Append one centroid drawn with probability proportional to D²
fn extend_kmeans_pp(x: &Array2<f64>, centroids: &Array2<f64>, rng: &mut ChaCha8Rng) -> Array2<f64> {
    let n_samples = x.nrows();
    let dists: Vec<f64> = (0..n_samples)
        .map(|i| nearest(&x.row(i), centroids).1)
        .collect();

    let total: f64 = dists.iter().sum();
    let chosen = if total <= 0.0 {
        (rng.next_u64() as usize) % n_samples
    } else {
        let r = (rng.next_u64() as f64 / u64::MAX as f64) * total;
        let mut cumulative = 0.0;
        let mut chosen = n_samples - 1;
        for (i, &d) in dists.iter().enumerate() {
            cumulative += d;
            if cumulative >= r && d > 0.0 {
                chosen = i;
                break;
            }
        }
        chosen
    };

    let mut extended = Array2::zeros((centroids.nrows() + 1, x.ncols()));
    extended
        .slice_mut(ndarray::s![..centroids.nrows(), ..])
        .assign(centroids);
    extended.row_mut(centroids.nrows()).assign(&x.row(chosen));
    extended
}

/// Fitted cluster assignment for one target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterModel {
    pub target: String,
    /// Scaled feature columns the centroids live in
    pub columns: Vec<String>,
    pub k: usize,
    pub centroids: Array2<f64>,
    /// Inertia for k = 1, 2, ... as used for the elbow
    pub inertia_curve: Vec<f64>,
}

impl ClusterModel {
    /// Nearest-centroid label for every row; ties go to the lowest cluster id
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        if x.ncols() != self.centroids.ncols() {
            return Err(PipelineError::data(format!(
                "Cluster model for '{}' expects {} columns, got {}",
                self.target,
                self.centroids.ncols(),
                x.ncols()
            )));
        }
        Ok((0..x.nrows())
            .into_par_iter()
            .map(|i| nearest(&x.row(i), &self.centroids).0)
            .collect())
    }
}

/// Cluster-count selection result
#[derive(Debug, Clone)]
pub struct ClusterSelection {
    pub model: ClusterModel,
    pub labels: Vec<usize>,
}

/// Inertia for k = 1..=max_k (capped at the row count).
///
/// Each k keeps the best of a warm start from the k-1 solution and `n_init`
/// fresh seeded runs. The warm start guarantees a non-increasing curve.
pub fn elbow_curve(x: &Array2<f64>, config: &ClusterConfig, seed: u64) -> Result<Vec<KMeansFit>> {
    let max_k = config.max_k.min(x.nrows());
    let mut fits: Vec<KMeansFit> = Vec::with_capacity(max_k);

    for k in 1..=max_k {
        let base = seed.wrapping_add((k as u64).wrapping_mul(1_000_003));
        let kmeans = |offset: u64| {
            KMeans::new(k)
                .with_max_iter(config.max_iter)
                .with_tol(config.tol)
                .with_random_state(base.wrapping_add(offset))
        };

        let mut candidates: Vec<KMeansFit> = Vec::with_capacity(config.n_init + 1);
        if let Some(previous) = fits.last() {
            candidates.push(kmeans(0).fit_warm(x, &previous.centroids)?);
        }
        let fresh: Vec<KMeansFit> = (1..=config.n_init as u64)
            .into_par_iter()
            .map(|offset| kmeans(offset).fit(x))
            .collect::<Result<_>>()?;
        candidates.extend(fresh);

        let best = candidates
            .into_iter()
            .reduce(|best, candidate| {
                if candidate.inertia < best.inertia {
                    candidate
                } else {
                    best
                }
            })
            .ok_or_else(|| PipelineError::data("k-means produced no candidate"))?;

        tracing::debug!(k, inertia = best.inertia, "k-means fit");
        fits.push(best);
    }

    Ok(fits)
}

/// Choose k at the elbow of the inertia curve and label every row.
pub fn select_clusters(
    x: &Array2<f64>,
    columns: &[String],
    target: &str,
    config: &ClusterConfig,
    seed: u64,
) -> Result<ClusterSelection> {
    let fits = elbow_curve(x, config, seed)?;
    let inertia: Vec<f64> = fits.iter().map(|f| f.inertia).collect();
    let ks: Vec<f64> = (1..=inertia.len()).map(|k| k as f64).collect();

    let knee = find_knee(&ks, &inertia, config.sensitivity).ok_or_else(|| {
        PipelineError::NoKneeFound {
            target: target.to_string(),
            inertia: inertia.clone(),
        }
    })?;
    let k = knee.round() as usize;

    let chosen = fits
        .into_iter()
        .nth(k - 1)
        .ok_or_else(|| PipelineError::data(format!("No k-means fit for k = {}", k)))?;

    tracing::info!(target_name = target, k, inertia = chosen.inertia, "cluster count selected");

    Ok(ClusterSelection {
        model: ClusterModel {
            target: target.to_string(),
            columns: columns.to_vec(),
            k,
            centroids: chosen.centroids,
            inertia_curve: inertia,
        },
        labels: chosen.labels,
    })
}
