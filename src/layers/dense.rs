use ndarray::Array2;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ArtifactError;
use crate::utils::{relu, sigmoid};

/// Element-wise activation applied after the affine transform
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Linear,
    Relu,
    Sigmoid,
    Tanh,
}

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Linear => x,
            Activation::Relu => relu(x),
            Activation::Sigmoid => sigmoid(x),
            Activation::Tanh => x.tanh(),
        }
    }
}

/// A fully connected (dense) layer
///
/// Performs the transformation: output = activation(weight · input + bias)
/// where weight has shape (output_size, input_size) and bias has shape (output_size, 1)
#[derive(Clone, Debug)]
pub struct DenseLayer {
    pub weight: Array2<f64>,
    pub bias: Array2<f64>,
    pub activation: Activation,
    pub input_size: usize,
    pub output_size: usize,
}

impl DenseLayer {
    /// Create a new dense layer with Xavier/Glorot uniform initialization
    pub fn new(input_size: usize, output_size: usize, activation: Activation) -> Self {
        Self::new_using(input_size, output_size, activation, &mut rand::thread_rng())
    }

    pub fn new_using<R: Rng + ?Sized>(
        input_size: usize,
        output_size: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Self {
        let scale = (2.0 / (input_size + output_size) as f64).sqrt();
        let weight = Array2::random_using((output_size, input_size), Uniform::new(-scale, scale), rng);

        Self {
            weight,
            bias: Array2::zeros((output_size, 1)),
            activation,
            input_size,
            output_size,
        }
    }

    /// Create a layer from trained weights
    pub fn from_weights(weight: Array2<f64>, bias: Array2<f64>, activation: Activation) -> Result<Self, ArtifactError> {
        let (output_size, input_size) = weight.dim();
        if bias.dim() != (output_size, 1) {
            return Err(ArtifactError::Shape(format!(
                "dense bias expected {:?}, got {:?}",
                (output_size, 1),
                bias.dim()
            )));
        }

        Ok(Self { weight, bias, activation, input_size, output_size })
    }

    /// Forward pass; `input` is `(input_size, batch_size)`
    pub fn forward(&self, input: &Array2<f64>) -> Array2<f64> {
        debug_assert_eq!(input.nrows(), self.input_size, "dense input size mismatch");
        let activation = self.activation;
        (&self.weight.dot(input) + &self.bias).mapv(|x| activation.apply(x))
    }

    pub fn num_parameters(&self) -> usize {
        self.weight.len() + self.bias.len()
    }
}

/// Runs `input` through `layers` in order
pub fn forward_stack(layers: &[DenseLayer], input: Array2<f64>) -> Array2<f64> {
    layers.iter().fold(input, |x, layer| layer.forward(&x))
}

/// Checks that consecutive layers chain and that the stack maps `input_size`
/// to `output_size`.
pub fn validate_stack(layers: &[DenseLayer], input_size: usize, output_size: usize) -> Result<(), ArtifactError> {
    let mut expected = input_size;
    for (i, layer) in layers.iter().enumerate() {
        if layer.input_size != expected {
            return Err(ArtifactError::Shape(format!(
                "dense layer {} expects {} inputs, previous layer yields {}",
                i, layer.input_size, expected
            )));
        }
        expected = layer.output_size;
    }
    if expected != output_size {
        return Err(ArtifactError::Inconsistent(format!(
            "dense stack yields {} outputs, expected {}",
            expected, output_size
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_dense_layer_creation() {
        let layer = DenseLayer::new(10, 5, Activation::Relu);
        assert_eq!(layer.weight.shape(), &[5, 10]);
        assert_eq!(layer.bias.shape(), &[5, 1]);
        assert_eq!(layer.num_parameters(), 55);
    }

    #[test]
    fn test_dense_forward_with_activation() {
        let weight = arr2(&[[1.0, -1.0], [2.0, 0.0]]);
        let bias = arr2(&[[0.0], [-5.0]]);
        let layer = DenseLayer::from_weights(weight, bias, Activation::Relu).unwrap();

        let output = layer.forward(&arr2(&[[1.0], [3.0]]));
        // [1 - 3, 2 - 5] -> relu -> [0, 0]
        assert_eq!(output, arr2(&[[0.0], [0.0]]));

        let output = layer.forward(&arr2(&[[4.0], [1.0]]));
        assert_eq!(output, arr2(&[[3.0], [3.0]]));
    }

    #[test]
    fn test_from_weights_rejects_bias_shape() {
        let result = DenseLayer::from_weights(Array2::zeros((2, 3)), Array2::zeros((3, 1)), Activation::Linear);
        assert!(matches!(result, Err(ArtifactError::Shape(_))));
    }

    #[test]
    fn test_stack_validation() {
        let layers = vec![
            DenseLayer::new(4, 8, Activation::Relu),
            DenseLayer::new(8, 2, Activation::Linear),
        ];
        assert!(validate_stack(&layers, 4, 2).is_ok());
        assert!(validate_stack(&layers, 3, 2).is_err());
        assert!(validate_stack(&layers, 4, 3).is_err());

        let out = forward_stack(&layers, Array2::ones((4, 1)));
        assert_eq!(out.shape(), &[2, 1]);
    }
}
