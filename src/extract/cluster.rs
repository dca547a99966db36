//! Grouping critical points by the hidden neuron that produced them.
//!
//! The gradient jump at a unit's boundary is parallel to that unit's weight
//! row regardless of where on the hyperplane it was observed, so points of
//! the same neuron share a jump direction up to sign.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::config::ExtractionConfig;
use super::types::{CriticalPoint, NeuronCluster};

/// Similarities closer than this count as a tie.
const TIE_EPSILON: f64 = 1e-12;

/// Result of clustering one set of critical points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterOutcome {
    /// Surviving clusters, in order of first member
    pub clusters: Vec<NeuronCluster>,
    /// Points evicted after merging or left in clusters smaller than
    /// `min_cluster_size`
    pub discarded: usize,
    /// Points with a zero or non-finite jump
    pub skipped: usize,
}

impl ClusterOutcome {
    /// Number of surviving clusters.
    pub fn count(&self) -> usize {
        self.clusters.len()
    }
}

/// Greedy incremental clustering by |cos| of the unit jump directions.
///
/// Points are visited in order. Each joins the most similar existing cluster
/// when the similarity reaches `cos(angular_tolerance)` (ties go to the
/// larger cluster), otherwise it seeds a new one. Clusters whose
/// representatives drifted within the threshold of each other are merged
/// afterwards. Members left outside the threshold of their final
/// representative are evicted, and clusters under `min_cluster_size` are
/// dropped; both count as discarded.
pub fn cluster(points: &[CriticalPoint], config: &ExtractionConfig) -> ClusterOutcome {
    let threshold = config.merge_cosine();
    let mut clusters: Vec<NeuronCluster> = Vec::new();
    let mut skipped = 0;

    for (index, point) in points.iter().enumerate() {
        let Some(u) = point.unit_jump() else {
            skipped += 1;
            continue;
        };
        let mut best: Option<(usize, f64)> = None;
        for (ci, c) in clusters.iter().enumerate() {
            let sim = c.similarity(u.view());
            if sim < threshold {
                continue;
            }
            best = match best {
                None => Some((ci, sim)),
                Some((_, bs)) if sim > bs + TIE_EPSILON => Some((ci, sim)),
                Some((bi, bs)) if (sim - bs).abs() <= TIE_EPSILON && c.len() > clusters[bi].len() => {
                    Some((ci, sim))
                }
                keep => keep,
            };
        }
        match best {
            Some((ci, _)) => clusters[ci].absorb(index, u.view()),
            None => clusters.push(NeuronCluster::seed(index, u.view())),
        }
    }

    merge_collinear(&mut clusters, threshold);
    let mut discarded = evict_outliers(&mut clusters, points, threshold);

    clusters.retain(|c| {
        let keep = c.len() >= config.min_cluster_size;
        if !keep {
            trace!(members = c.len(), "discarding undersized cluster");
            discarded += c.len();
        }
        keep
    });

    ClusterOutcome { clusters, discarded, skipped }
}

/// Merge clusters whose representatives are within the threshold of each
/// other until no such pair remains.
///
/// Merging moves the representative, so members are not re-checked here;
/// [`cluster`] evicts the ones that end up outside the threshold.
pub fn merge_collinear(clusters: &mut Vec<NeuronCluster>, threshold: f64) {
    'outer: loop {
        for i in 0..clusters.len() {
            for j in (i + 1)..clusters.len() {
                if clusters[i].similarity(clusters[j].representative.view()) >= threshold {
                    let other = clusters.remove(j);
                    clusters[i].merge(other);
                    continue 'outer;
                }
            }
        }
        break;
    }
}

/// Drop members whose |cos| with their cluster's representative is below
/// `threshold`, rebuilding the cluster from the survivors until it is
/// stable. Emptied clusters are removed. Returns the number evicted.
fn evict_outliers(clusters: &mut Vec<NeuronCluster>, points: &[CriticalPoint], threshold: f64) -> usize {
    let unit_of = |i: usize| points.get(i).and_then(CriticalPoint::unit_jump);
    let mut evicted = 0;
    for c in clusters.iter_mut() {
        loop {
            let (kept, outliers): (Vec<usize>, Vec<usize>) = c
                .members
                .iter()
                .copied()
                .partition(|&i| unit_of(i).is_some_and(|u| c.similarity(u.view()) >= threshold));
            if outliers.is_empty() {
                break;
            }
            trace!(outliers = outliers.len(), kept = kept.len(), "evicting drifted members");
            evicted += outliers.len();
            let mut survivors = kept.into_iter().filter_map(|i| unit_of(i).map(|u| (i, u)));
            let Some((first, u)) = survivors.next() else {
                c.members.clear();
                break;
            };
            let mut rebuilt = NeuronCluster::seed(first, u.view());
            for (i, u) in survivors {
                rebuilt.absorb(i, u.view());
            }
            *c = rebuilt;
        }
    }
    clusters.retain(|c| !c.is_empty());
    evicted
}
