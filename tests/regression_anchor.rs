//! Regression anchor: a 784-16-10 classifier, MNIST-shaped.
//!
//! The victim is built from closed-form weights so its parameters are known
//! to the digit. Recovery must match them to 4 decimals in the unit-norm
//! convention, and critical point 784 must sit exactly where its own line
//! meets a victim hyperplane, identically across runs.

use approx::assert_abs_diff_eq;
use extraer::extract::{
    compare_models, gaussian_pool, match_neurons, CriticalPoint, ExtractionConfig, ExtractionReport,
    Extractor,
};
use extraer::oracle::ReluNetwork;
use ndarray::{Array1, Array2, ArrayView1};

const INPUTS: usize = 784;
const HIDDEN: usize = 16;
const CLASSES: usize = 10;
const ANCHOR_INDEX: usize = 784;

/// `b0[i] / ‖W0[i]‖` of the victim.
const NORMALISED_B0: [f64; HIDDEN] = [
    0.039332, 0.097357, 0.081701, 0.004192, -0.076517, -0.099209, -0.046902, 0.040922, 0.097647,
    0.080667, 0.002503, -0.077547, -0.098907, -0.045420, 0.042456, 0.098208,
];

const B1: [f64; CLASSES] = [
    0.098007, 0.062161, -0.002920, -0.066628, -0.098999, -0.084810, -0.030733, 0.037798, 0.088552,
    0.097659,
];

/// Row `i` of W0 is a sinusoid whose frequency steps by the golden ratio,
/// which keeps every pair of rows close to orthogonal.
fn victim() -> ReluNetwork {
    let golden = 0.618_033_988_749_894_9_f64;
    let w0 = Array2::from_shape_fn((HIDDEN, INPUTS), |(i, j)| {
        let frequency = std::f64::consts::TAU * ((i + 1) as f64 * golden).fract();
        (frequency * (j + 1) as f64 + 0.25 * i as f64).cos()
    });
    let b0 = Array1::from_shape_fn(HIDDEN, |i| 2.0 * (0.9 * i as f64 + 0.4).sin());
    let w1 = Array2::from_shape_fn((CLASSES, HIDDEN), |(c, i)| {
        (0.8 * c as f64 + 1.9 * i as f64 + 0.3).sin()
    });
    let b1 = Array1::from_shape_fn(CLASSES, |c| 0.1 * (0.7 * c as f64 + 0.2).cos());
    ReluNetwork::new(w0, b0, w1, b1).unwrap()
}

fn run(net: &ReluNetwork) -> ExtractionReport {
    let pool: Array2<f64> = gaussian_pool(32, INPUTS, 7);
    let config = ExtractionConfig::default()
        .with_search_bound(200.0)
        .with_points_per_neuron(50)
        .with_max_batches_per_round(32);
    Extractor::new(net, HIDDEN, pool, config).unwrap().run().unwrap()
}

fn anchor_point(report: &ExtractionReport) -> &CriticalPoint {
    let points = &report.diagnostics.critical_points;
    assert!(points.len() > ANCHOR_INDEX, "only {} critical points", points.len());
    &points[ANCHOR_INDEX]
}

#[test]
fn test_victim_literals_match_construction() {
    let net = victim();
    for (i, expected) in NORMALISED_B0.iter().enumerate() {
        let scale = net.w0.row(i).dot(&net.w0.row(i)).sqrt();
        assert_abs_diff_eq!(net.b0[i] / scale, *expected, epsilon = 1e-6);
    }
    for (got, expected) in net.b1.iter().zip(B1.iter()) {
        assert_abs_diff_eq!(got, expected, epsilon = 1e-6);
    }
}

#[test]
fn test_mnist_shaped_network_recovered_to_four_decimals() {
    let net = victim();
    let report = run(&net);
    let model = &report.model;
    assert_eq!(model.w0.shape(), &[HIDDEN, INPUTS]);
    assert_eq!(model.w1.shape(), &[CLASSES, HIDDEN]);

    let matches = match_neurons(model.w0.view(), net.w0.view());
    assert_eq!(matches.len(), HIDDEN);
    for m in &matches {
        assert_abs_diff_eq!(model.b0[m.recovered], NORMALISED_B0[m.reference], epsilon = 1e-4);
    }
    for (got, expected) in model.b1.iter().zip(B1.iter()) {
        assert_abs_diff_eq!(got, expected, epsilon = 1e-4);
    }
    assert!(compare_models(model, &net).within(1e-4));
}

#[test]
fn test_anchor_critical_point_is_exact_line_crossing() {
    let net = victim();
    let first = run(&net);
    let point = anchor_point(&first);

    // The hyperplane the point sits on, and where the line really meets it.
    let (w, b) = net
        .w0
        .rows()
        .into_iter()
        .zip(net.b0.iter())
        .min_by(|a, b| {
            let distance = |plane: &(ArrayView1<'_, f64>, &f64)| {
                (plane.0.dot(&point.location) + *plane.1).abs() / plane.0.dot(&plane.0).sqrt()
            };
            distance(a).total_cmp(&distance(b))
        })
        .unwrap();
    let offset = -(w.dot(&point.origin) + *b) / w.dot(&point.direction);
    assert_abs_diff_eq!(point.offset, offset, epsilon = 1e-6);
    let expected = &point.origin + &(&point.direction * offset);
    for (got, want) in point.location.iter().zip(expected.iter()) {
        assert_abs_diff_eq!(got, want, epsilon = 1e-6);
    }

    let second = run(&net);
    assert_eq!(anchor_point(&second), point);
}
