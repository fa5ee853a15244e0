use ndarray::{s, Array2};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;

use crate::error::ArtifactError;
use crate::utils::sigmoid;

/// Inference-only LSTM cell
///
/// Implements the standard LSTM equations:
/// - i_t = σ(W_xi * x_t + W_hi * h_t-1 + b_i)
/// - f_t = σ(W_xf * x_t + W_hf * h_t-1 + b_f)
/// - g_t = tanh(W_xg * x_t + W_hg * h_t-1 + b_g)
/// - o_t = σ(W_xo * x_t + W_ho * h_t-1 + b_o)
/// - c_t = f_t ⊙ c_t-1 + i_t ⊙ g_t
/// - h_t = o_t ⊙ tanh(c_t)
///
/// Gate blocks are stacked in the order input, forget, cell, output, which is
/// also the kernel layout Keras exports.
#[derive(Clone, Debug)]
pub struct LstmCell {
    pub w_ih: Array2<f64>,  // input-to-hidden weights (4*hidden_size, input_size)
    pub w_hh: Array2<f64>,  // hidden-to-hidden weights (4*hidden_size, hidden_size)
    pub b_ih: Array2<f64>,  // input-to-hidden bias (4*hidden_size, 1)
    pub b_hh: Array2<f64>,  // hidden-to-hidden bias (4*hidden_size, 1)
    pub input_size: usize,
    pub hidden_size: usize,
}

impl LstmCell {
    /// Creates a randomly initialised cell (uniform in [-0.1, 0.1])
    pub fn new(input_size: usize, hidden_size: usize) -> Self {
        Self::new_using(input_size, hidden_size, &mut rand::thread_rng())
    }

    /// Same as [`LstmCell::new`] but draws from the given generator, so
    /// seeded fixtures stay reproducible.
    pub fn new_using<R: Rng + ?Sized>(input_size: usize, hidden_size: usize, rng: &mut R) -> Self {
        let dist = Uniform::new(-0.1, 0.1);

        LstmCell {
            w_ih: Array2::random_using((4 * hidden_size, input_size), dist, rng),
            w_hh: Array2::random_using((4 * hidden_size, hidden_size), dist, rng),
            b_ih: Array2::zeros((4 * hidden_size, 1)),
            b_hh: Array2::zeros((4 * hidden_size, 1)),
            input_size,
            hidden_size,
        }
    }

    /// Builds a cell from trained weights, checking that all four blocks agree.
    pub fn from_weights(
        w_ih: Array2<f64>,
        w_hh: Array2<f64>,
        b_ih: Array2<f64>,
        b_hh: Array2<f64>,
    ) -> Result<Self, ArtifactError> {
        let (gate_rows, input_size) = w_ih.dim();
        if gate_rows == 0 || gate_rows % 4 != 0 {
            return Err(ArtifactError::Shape(format!(
                "LSTM w_ih must have 4*hidden_size rows, got {}",
                gate_rows
            )));
        }
        let hidden_size = gate_rows / 4;

        if w_hh.dim() != (gate_rows, hidden_size) {
            return Err(ArtifactError::Shape(format!(
                "LSTM w_hh expected {:?}, got {:?}",
                (gate_rows, hidden_size),
                w_hh.dim()
            )));
        }
        for (name, bias) in [("b_ih", &b_ih), ("b_hh", &b_hh)] {
            if bias.dim() != (gate_rows, 1) {
                return Err(ArtifactError::Shape(format!(
                    "LSTM {} expected {:?}, got {:?}",
                    name,
                    (gate_rows, 1),
                    bias.dim()
                )));
            }
        }

        Ok(LstmCell { w_ih, w_hh, b_ih, b_hh, input_size, hidden_size })
    }

    /// One time step. `input` is `(input_size, 1)`, states are `(hidden_size, 1)`.
    pub fn forward(&self, input: &Array2<f64>, hx: &Array2<f64>, cx: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
        let h = self.hidden_size;

        // Compute all gates at once: [input_gate, forget_gate, cell_gate, output_gate]
        let gates = &self.w_ih.dot(input) + &self.b_ih + &self.w_hh.dot(hx) + &self.b_hh;

        let input_gate = gates.slice(s![0..h, ..]).map(|&x| sigmoid(x));
        let forget_gate = gates.slice(s![h..2 * h, ..]).map(|&x| sigmoid(x));
        let cell_gate = gates.slice(s![2 * h..3 * h, ..]).map(|&x| x.tanh());
        let output_gate = gates.slice(s![3 * h..4 * h, ..]).map(|&x| sigmoid(x));

        let cy = &forget_gate * cx + &input_gate * &cell_gate;
        let hy = &output_gate * &cy.map(|&x| x.tanh());

        (hy, cy)
    }

    pub fn num_parameters(&self) -> usize {
        self.w_ih.len() + self.w_hh.len() + self.b_ih.len() + self.b_hh.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_lstm_cell_forward() {
        let input_size = 3;
        let hidden_size = 2;
        let cell = LstmCell::new(input_size, hidden_size);

        let input = arr2(&[[0.5], [0.1], [-0.3]]);
        let hx = arr2(&[[0.0], [0.0]]);
        let cx = arr2(&[[0.0], [0.0]]);

        let (hy, cy) = cell.forward(&input, &hx, &cx);

        assert_eq!(hy.shape(), &[hidden_size, 1]);
        assert_eq!(cy.shape(), &[hidden_size, 1]);
        // |h| is bounded by |o ⊙ tanh(c)| < 1
        assert!(hy.iter().all(|v| v.abs() < 1.0));
    }

    #[test]
    fn test_zero_weights_give_half_cell_gate() {
        let cell = LstmCell::from_weights(
            Array2::zeros((8, 3)),
            Array2::zeros((8, 2)),
            Array2::zeros((8, 1)),
            Array2::zeros((8, 1)),
        )
        .unwrap();

        let input = arr2(&[[1.0], [2.0], [3.0]]);
        let hx = Array2::zeros((2, 1));
        let cx = arr2(&[[1.0], [-1.0]]);
        let (hy, cy) = cell.forward(&input, &hx, &cx);

        // all gates are σ(0) = 0.5 and tanh(0) = 0, so c = 0.5 * c_prev
        assert!((cy[[0, 0]] - 0.5).abs() < 1e-12);
        assert!((cy[[1, 0]] + 0.5).abs() < 1e-12);
        assert!((hy[[0, 0]] - 0.5 * 0.5f64.tanh()).abs() < 1e-12);
    }

    #[test]
    fn test_seeded_cells_are_identical() {
        let a = LstmCell::new_using(4, 3, &mut StdRng::seed_from_u64(7));
        let b = LstmCell::new_using(4, 3, &mut StdRng::seed_from_u64(7));
        assert_eq!(a.w_ih, b.w_ih);
        assert_eq!(a.w_hh, b.w_hh);
        assert_eq!(a.num_parameters(), 4 * 3 * 4 + 4 * 3 * 3 + 2 * 12);
    }

    #[test]
    fn test_from_weights_rejects_bad_shapes() {
        let result = LstmCell::from_weights(
            Array2::zeros((8, 3)),
            Array2::zeros((8, 3)),
            Array2::zeros((8, 1)),
            Array2::zeros((8, 1)),
        );
        assert!(matches!(result, Err(ArtifactError::Shape(_))));

        let result = LstmCell::from_weights(
            Array2::zeros((6, 3)),
            Array2::zeros((6, 1)),
            Array2::zeros((6, 1)),
            Array2::zeros((6, 1)),
        );
        assert!(result.is_err());
    }
}
