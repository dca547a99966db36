//! Property tests for extraction invariants
//!
//! - Every accepted critical point lies on a victim hyperplane
//! - Clusters satisfy the angular invariant
//! - Recovered weight rows are unit norm with the victim's sign
//! - Validation is a pure function

use extraer::extract::{
    cluster, compare_models, find, gaussian_pool, scan_line, validate, ExtractionConfig, Extractor,
    SearchFailure,
};
use extraer::oracle::ReluNetwork;
use ndarray::Array1;
use proptest::prelude::*;

// =============================================================================
// Strategy Helpers
// =============================================================================

/// (input_dim, hidden, outputs, seed) for small victims
fn small_network() -> impl Strategy<Value = (usize, usize, usize, u64)> {
    (3usize..7, 1usize..4, 2usize..4, any::<u64>())
}

fn distance_to_nearest_hyperplane(net: &ReluNetwork, x: &Array1<f64>) -> f64 {
    net.w0
        .rows()
        .into_iter()
        .zip(net.b0.iter())
        .map(|(w, &b)| (w.dot(x) + b).abs() / w.dot(&w).sqrt())
        .fold(f64::INFINITY, f64::min)
}

// =============================================================================
// Finder & Clusterer Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_critical_points_lie_on_hyperplanes(
        (n, k, m, seed) in small_network(),
        line_seed in any::<u64>(),
    ) {
        let net = ReluNetwork::random(n, k, m, seed);
        let config = ExtractionConfig::default();
        let origin = gaussian_pool(1, n, line_seed).row(0).mapv(|v| v * 3.0);
        let direction = gaussian_pool(1, n, line_seed.wrapping_add(1)).row(0).to_owned();

        let scan = scan_line(&net, origin.view(), direction.view(), 20.0, &config).unwrap();
        for point in &scan.points {
            prop_assert!(distance_to_nearest_hyperplane(&net, &point.location) < 1e-6);
            prop_assert!(point.jump_rank_ratio <= config.rank_tolerance);
            prop_assert!(point.jump_norm() > config.noise_floor);
            let expected = &point.origin + &(&point.direction * point.offset);
            for (a, b) in expected.iter().zip(point.location.iter()) {
                prop_assert!((a - b).abs() < 1e-12);
            }
        }
        for pair in scan.points.windows(2) {
            prop_assert!(pair[0].offset < pair[1].offset);
        }

        match find(&net, origin.view(), direction.view(), 20.0, &config) {
            Ok(first) => prop_assert_eq!(Some(&first), scan.points.first()),
            Err(SearchFailure::NotFound) => prop_assert!(scan.points.is_empty() && scan.ambiguous.is_empty()),
            Err(SearchFailure::Ambiguous { .. }) => prop_assert!(!scan.ambiguous.is_empty()),
            Err(SearchFailure::Oracle(e)) => prop_assert!(false, "oracle error {}", e),
        }
    }

    #[test]
    fn prop_cluster_members_within_angular_tolerance(
        (n, k, m, seed) in small_network(),
        pool_seed in any::<u64>(),
    ) {
        let net = ReluNetwork::random(n, k, m, seed);
        let config = ExtractionConfig::default();
        let pool = gaussian_pool(12, n, pool_seed);
        let directions = gaussian_pool(12, n, pool_seed.wrapping_add(7));

        let mut points = Vec::new();
        for (row, dir) in pool.rows().into_iter().zip(directions.rows()) {
            let origin = &row - &(&dir * 5.0);
            points.extend(scan_line(&net, origin.view(), dir, 20.0, &config).unwrap().points);
        }

        let outcome = cluster(&points, &config);
        prop_assert!(outcome.count() <= k);
        let threshold = config.merge_cosine();
        let mut seen = vec![false; points.len()];
        for c in &outcome.clusters {
            prop_assert!(c.len() >= config.min_cluster_size);
            for &i in &c.members {
                prop_assert!(!seen[i]);
                seen[i] = true;
                let u = points[i].unit_jump().unwrap();
                prop_assert!(c.similarity(u.view()) >= threshold - 1e-12);
            }
        }
    }
}

// =============================================================================
// End-to-End Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_extraction_recovers_unit_rows_with_true_sign(
        hidden in 1usize..4,
        seed in any::<u64>(),
    ) {
        let net = ReluNetwork::random(5, hidden, 3, seed);
        let pool = gaussian_pool(48, 5, seed.wrapping_mul(31));
        let result = Extractor::new(&net, hidden, pool, ExtractionConfig::default())
            .unwrap()
            .run();
        // Rare draws put a hyperplane out of reach of the pool; those may
        // fail, but never with a wrong model.
        if let Ok(report) = result {
            for row in report.model.w0.rows() {
                prop_assert!((row.dot(&row).sqrt() - 1.0).abs() < 1e-9);
            }
            let comparison = compare_models(&report.model, &net);
            prop_assert!(comparison.signs_agree);
            prop_assert!(comparison.within(1e-5), "{:?}", comparison);
        }
    }

    #[test]
    fn prop_validation_is_idempotent(
        (n, k, m, seed) in small_network(),
        other_seed in any::<u64>(),
        points_seed in any::<u64>(),
    ) {
        let a = ReluNetwork::random(n, k, m, seed);
        let b = ReluNetwork::random(n, k, m, other_seed);
        let points = gaussian_pool(16, n, points_seed);
        let first = validate(&a, &b, points.view(), 1e-3).unwrap();
        let second = validate(&a, &b, points.view(), 1e-3).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.passed, first.failed == 0);
        prop_assert!(first.max_error >= first.mean_error);
    }
}
