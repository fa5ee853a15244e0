//! Numeric helpers shared by the layers and the services.

/// Sigmoid activation function: σ(x) = 1 / (1 + e^(-x))
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Rectified linear unit: max(0, x)
pub fn relu(x: f64) -> f64 {
    x.max(0.0)
}

/// Rounds `value` to `places` decimals, half away from zero.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-10);
        assert!(sigmoid(1000.0) > 0.99);
        assert!(sigmoid(-1000.0) < 0.01);
    }

    #[test]
    fn test_relu() {
        assert_eq!(relu(-3.5), 0.0);
        assert_eq!(relu(2.25), 2.25);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(12.3456, 2), 12.35);
        assert_eq!(round_to(0.123449, 4), 0.1234);
        assert_eq!(round_to(-1.005, 0), -1.0);
    }
}
