use approx::assert_relative_eq;
use itcfit_rs::uncertainty::{probability_to_sigma, ValueWithError};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn random_value(rng: &mut ChaCha8Rng) -> ValueWithError {
    let value = rng.gen_range(0.5..50.0) * if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
    let sd = rng.gen_range(0.0..2.0);
    ValueWithError::new(value, sd)
}

#[test]
fn test_sum_and_difference_add_in_quadrature() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    for _ in 0..200 {
        let a = random_value(&mut rng);
        let b = random_value(&mut rng);

        let sum = &a + &b;
        let diff = &a - &b;
        let expected = a.sd().hypot(b.sd());

        assert_relative_eq!(sum.value(), a.value() + b.value(), epsilon = 1e-12);
        assert_relative_eq!(sum.sd(), expected, epsilon = 1e-12);
        assert_relative_eq!(diff.value(), a.value() - b.value(), epsilon = 1e-12);
        assert_relative_eq!(diff.sd(), expected, epsilon = 1e-12);
    }
}

#[test]
fn test_product_and_quotient_add_fractional_errors() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    for _ in 0..200 {
        let a = ValueWithError::new(rng.gen_range(1.0..10.0), rng.gen_range(0.01..1.0));
        let b = ValueWithError::new(rng.gen_range(1.0..10.0), rng.gen_range(0.01..1.0));
        let fractional = a.fractional_sd().hypot(b.fractional_sd());

        let product = &a * &b;
        assert_relative_eq!(product.sd(), product.value().abs() * fractional, max_relative = 1e-12);

        let quotient = &a / &b;
        assert_relative_eq!(quotient.sd(), quotient.value().abs() * fractional, max_relative = 1e-12);
    }
}

#[test]
fn test_exact_operand_scales_error() {
    let a = ValueWithError::new(4.0, 0.2);
    let b = ValueWithError::exact(-3.0);

    let product = &a * &b;
    assert_relative_eq!(product.value(), -12.0);
    assert_relative_eq!(product.sd(), 0.6, epsilon = 1e-12);

    let quotient = &a / &b;
    assert_relative_eq!(quotient.sd(), 0.2 / 3.0, epsilon = 1e-12);

    let scaled = 2.0 * a.clone();
    assert_relative_eq!(scaled.sd(), 0.4, epsilon = 1e-12);
}

#[test]
fn test_negative_sd_is_stored_as_magnitude() {
    let v = ValueWithError::new(1.0, -0.25);
    assert_eq!(v.sd(), 0.25);
    assert_eq!((-v).sd(), 0.25);
}

#[test]
fn test_from_samples_mean_and_unbiased_sd() {
    let v = ValueWithError::from_samples(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
    assert_eq!(v.value(), 3.0);
    assert_relative_eq!(v.sd(), 2.5f64.sqrt(), epsilon = 1e-12);
    assert_relative_eq!(v.sd(), 1.5811, epsilon = 1e-4);
}

#[test]
fn test_from_samples_ignores_non_finite_values() {
    let v = ValueWithError::from_samples(&[1.0, f64::NAN, 3.0, f64::INFINITY]).unwrap();
    assert_eq!(v.value(), 2.0);
    assert_relative_eq!(v.sd(), 2f64.sqrt(), epsilon = 1e-12);

    assert!(ValueWithError::from_samples(&[]).is_err());
    assert!(ValueWithError::from_samples(&[f64::NAN]).is_err());
}

#[test]
fn test_override_mean_keeps_sample_spread() {
    let v = ValueWithError::from_samples_with_mean(&[1.0, 2.0, 3.0, 4.0, 5.0], 10.0);
    assert_eq!(v.value(), 10.0);
    assert_relative_eq!(v.sd(), 2.5f64.sqrt(), epsilon = 1e-12);

    let empty = ValueWithError::from_samples_with_mean(&[], 10.0);
    assert_eq!(empty, ValueWithError::exact(10.0));
}

#[test]
fn test_percentile_intervals_from_sample() {
    let samples: Vec<f64> = (1..=1000).map(f64::from).collect();
    let v = ValueWithError::from_samples(&samples).unwrap();
    let distribution = v.distribution().unwrap();

    let full = distribution.interval_100();
    assert_eq!(full.lower, 1.0);
    assert_eq!(full.upper, 1000.0);

    // 25 elements cut from each end
    let ci = distribution.interval_95();
    assert_eq!(ci.lower, 26.0);
    assert_eq!(ci.upper, 975.0);
    assert_eq!(ci.lower - full.lower, full.upper - ci.upper);
    assert!(ci.contains(500.0));
}

#[test]
fn test_normal_interval_without_sample() {
    let v = ValueWithError::new(100.0, 5.0);
    let ci = v.confidence_interval(0.95);
    let z = probability_to_sigma(0.95);

    assert_relative_eq!(z, 1.96, epsilon = 1e-2);
    assert_relative_eq!(ci.lower, 100.0 - z * 5.0, epsilon = 1e-12);
    assert_relative_eq!(ci.upper, 100.0 + z * 5.0, epsilon = 1e-12);
}

#[test]
fn test_has_error_threshold() {
    assert!(!ValueWithError::exact(3.0).has_error());
    assert!(ValueWithError::new(3.0, 0.3).has_error());
    assert!(ValueWithError::new(0.0, 0.1).has_error());
}

#[test]
fn test_mean_of_values() {
    let values = [
        ValueWithError::new(1.0, 0.3),
        ValueWithError::new(2.0, 0.4),
    ];
    let mean = ValueWithError::mean_of(&values).unwrap();
    assert_relative_eq!(mean.value(), 1.5);
    assert_relative_eq!(mean.sd(), 0.25, epsilon = 1e-12);
    assert!(ValueWithError::mean_of(&[]).is_err());
}
