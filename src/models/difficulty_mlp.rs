use ndarray::Array2;
use rand::Rng;

use crate::error::ArtifactError;
use crate::layers::dense::{forward_stack, validate_stack, Activation, DenseLayer};

/// Feed-forward regressor for hike difficulty and walking time.
///
/// Output 0 is the difficulty score, output 1 the estimated time in hours.
#[derive(Clone, Debug)]
pub struct DifficultyMlp {
    layers: Vec<DenseLayer>,
    pub input_size: usize,
}

impl DifficultyMlp {
    pub const OUTPUTS: usize = 2;

    /// Random network with ReLU hidden layers of the given widths
    pub fn new_using<R: Rng + ?Sized>(input_size: usize, hidden: &[usize], rng: &mut R) -> Self {
        let mut layers = Vec::with_capacity(hidden.len() + 1);
        let mut width = input_size;
        for &units in hidden {
            layers.push(DenseLayer::new_using(width, units, Activation::Relu, rng));
            width = units;
        }
        layers.push(DenseLayer::new_using(width, Self::OUTPUTS, Activation::Linear, rng));

        Self { layers, input_size }
    }

    pub fn from_layers(layers: Vec<DenseLayer>) -> Result<Self, ArtifactError> {
        let input_size = layers
            .first()
            .map(|layer| layer.input_size)
            .ok_or_else(|| ArtifactError::Inconsistent("difficulty network has no layers".to_string()))?;
        validate_stack(&layers, input_size, Self::OUTPUTS)?;
        Ok(Self { layers, input_size })
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    /// Returns `(difficulty, hours)` for one scaled feature row
    pub fn forward(&self, features: &[f64]) -> Option<(f64, f64)> {
        if features.len() != self.input_size {
            return None;
        }
        let input = Array2::from_shape_vec((self.input_size, 1), features.to_vec()).ok()?;
        let output = forward_stack(&self.layers, input);
        Some((output[[0, 0]], output[[1, 0]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_forward_known_weights() {
        let layer = DenseLayer::from_weights(
            arr2(&[[1.0, 0.0, 0.0], [0.0, 2.0, 1.0]]),
            arr2(&[[0.5], [0.0]]),
            Activation::Linear,
        )
        .unwrap();
        let mlp = DifficultyMlp::from_layers(vec![layer]).unwrap();

        assert_eq!(mlp.forward(&[1.0, 2.0, 3.0]), Some((1.5, 7.0)));
        assert_eq!(mlp.forward(&[1.0, 2.0]), None);
    }

    #[test]
    fn test_requires_two_outputs() {
        let layer = DenseLayer::new(3, 3, Activation::Linear);
        assert!(DifficultyMlp::from_layers(vec![layer]).is_err());
        assert!(DifficultyMlp::from_layers(Vec::new()).is_err());
    }

    #[test]
    fn test_random_network_shape() {
        let mlp = DifficultyMlp::new_using(7, &[16, 8], &mut StdRng::seed_from_u64(5));
        assert_eq!(mlp.layers().len(), 3);
        assert!(mlp.forward(&[0.5; 7]).is_some());
    }
}
