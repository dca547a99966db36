//! Tests for the oracle adapters.

#![allow(clippy::module_inception)]
#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, arr2, Array1};

    use crate::oracle::{
        CountingOracle, FiniteDifferenceOracle, Oracle, OracleError, QueryCounts, ReluNetwork,
    };

    fn tiny_network() -> ReluNetwork {
        // h0 = relu(x0 - x1), h1 = relu(x1 + 0.5)
        ReluNetwork::new(
            arr2(&[[1.0, -1.0], [0.0, 1.0]]),
            arr1(&[0.0, 0.5]),
            arr2(&[[2.0, 0.0], [-1.0, 3.0]]),
            arr1(&[0.1, -0.2]),
        )
        .unwrap()
    }

    // -------------------------------------------------------------------------
    // ReluNetwork Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_network_forward_matches_hand_computation() {
        let net = tiny_network();
        let out = net.output(arr1(&[2.0, 1.0]).view()).unwrap();
        // h = [1.0, 1.5]
        assert_abs_diff_eq!(out[0], 2.1, epsilon = 1e-12);
        assert_abs_diff_eq!(out[1], 3.3, epsilon = 1e-12);
    }

    #[test]
    fn test_network_jacobian_gates_inactive_units() {
        let net = tiny_network();
        // x0 - x1 < 0: first unit inactive
        let jac = net.jacobian(arr1(&[0.0, 1.0]).view()).unwrap();
        assert_eq!(jac.shape(), &[2, 2]);
        assert_abs_diff_eq!(jac[[0, 0]], 0.0);
        assert_abs_diff_eq!(jac[[0, 1]], 0.0);
        assert_abs_diff_eq!(jac[[1, 0]], 0.0);
        assert_abs_diff_eq!(jac[[1, 1]], 3.0);
    }

    #[test]
    fn test_network_jacobian_constant_within_region() {
        let net = ReluNetwork::random(5, 4, 3, 11);
        let x = arr1(&[0.1, 0.2, -0.3, 0.05, 0.0]);
        let nudged = &x + 1e-12;
        let pattern = |v: &Array1<f64>| net.hidden(v.view()).mapv(|h| h > 0.0);
        assert_eq!(pattern(&x), pattern(&nudged));
        assert_eq!(net.jacobian(x.view()).unwrap(), net.jacobian(nudged.view()).unwrap());
    }

    #[test]
    fn test_network_rejects_wrong_input_dim() {
        let net = tiny_network();
        let err = net.output(arr1(&[1.0, 2.0, 3.0]).view()).unwrap_err();
        assert_eq!(err, OracleError::DimensionMismatch { expected: 2, got: 3 });
    }

    #[test]
    fn test_network_new_rejects_bad_shapes() {
        let err = ReluNetwork::new(
            arr2(&[[1.0, 0.0]]),
            arr1(&[0.0, 0.0]),
            arr2(&[[1.0]]),
            arr1(&[0.0]),
        )
        .unwrap_err();
        assert!(matches!(err, OracleError::ShapeMismatch { what: "b0", .. }));

        let err = ReluNetwork::new(
            arr2(&[[1.0, 0.0]]),
            arr1(&[0.0]),
            arr2(&[[1.0, 2.0]]),
            arr1(&[0.0]),
        )
        .unwrap_err();
        assert!(matches!(err, OracleError::ShapeMismatch { what: "w1", .. }));
    }

    #[test]
    fn test_random_network_is_seeded() {
        assert_eq!(ReluNetwork::random(6, 4, 3, 5), ReluNetwork::random(6, 4, 3, 5));
        assert_ne!(ReluNetwork::random(6, 4, 3, 5), ReluNetwork::random(6, 4, 3, 6));
    }

    #[test]
    fn test_class_gradient_and_prediction() {
        let net = tiny_network();
        let x = arr1(&[2.0, 1.0]);
        let grad = net.class_gradient(x.view(), 1).unwrap();
        assert_eq!(grad, net.jacobian(x.view()).unwrap().row(1).to_owned());
        assert_eq!(net.predict_class(x.view()).unwrap(), 1);

        let err = net.class_gradient(x.view(), 2).unwrap_err();
        assert_eq!(err, OracleError::ClassOutOfRange { index: 2, classes: 2 });
    }

    // -------------------------------------------------------------------------
    // CountingOracle Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_counting_oracle_tracks_queries() {
        let counting = CountingOracle::new(tiny_network());
        let x = arr1(&[0.5, 0.5]);
        counting.output(x.view()).unwrap();
        counting.jacobian(x.view()).unwrap();
        counting.jacobian(x.view()).unwrap();
        assert_eq!(counting.counts(), QueryCounts { outputs: 1, jacobians: 2 });
        assert_eq!(counting.counts().total(), 3);

        counting.reset();
        assert_eq!(counting.counts(), QueryCounts::default());
    }

    #[test]
    fn test_counting_oracle_through_reference() {
        let net = tiny_network();
        let counting = CountingOracle::new(&net);
        counting.predict_class(arr1(&[1.0, 0.0]).view()).unwrap();
        assert_eq!(counting.counts().outputs, 1);
    }

    // -------------------------------------------------------------------------
    // FiniteDifferenceOracle Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_finite_difference_matches_analytic_away_from_boundaries() {
        let net = ReluNetwork::random(4, 3, 2, 3);
        let fd = FiniteDifferenceOracle::new(net.clone(), 1e-6).unwrap();
        let x = arr1(&[0.3, -0.7, 1.1, 0.2]);
        let analytic = net.jacobian(x.view()).unwrap();
        let estimated = fd.jacobian(x.view()).unwrap();
        for (a, e) in analytic.iter().zip(estimated.iter()) {
            assert_abs_diff_eq!(a, e, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_finite_difference_rejects_bad_step() {
        assert!(FiniteDifferenceOracle::new(tiny_network(), 0.0).is_err());
        assert!(FiniteDifferenceOracle::new(tiny_network(), f64::NAN).is_err());
        assert_eq!(FiniteDifferenceOracle::new(tiny_network(), 1e-5).unwrap().step(), 1e-5);
    }
}
