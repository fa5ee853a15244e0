use ndarray::{concatenate, Array2, Axis};
use rand::Rng;

use crate::error::ArtifactError;
use crate::layers::dense::{forward_stack, validate_stack, Activation, DenseLayer};
use crate::layers::embedding::Embedding;
use crate::layers::lstm_cell::LstmCell;

/// Multi-step weather network: a stacked LSTM over the feature window,
/// joined with a per-entity embedding, followed by a dense head.
///
/// ```text
/// window (T × F) ──► LSTM × num_layers ──► h_T ─┐
///                                               ├─► concat ─► dense head ─► targets
/// entity code ──────► embedding ────────────────┘
/// ```
///
/// Each layer keeps its own hidden/cell state across the window; the input of
/// layer i+1 at step t is the hidden output of layer i at step t.
#[derive(Clone, Debug)]
pub struct WeatherLstm {
    cells: Vec<LstmCell>,
    embedding: Embedding,
    head: Vec<DenseLayer>,
    pub input_size: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub output_size: usize,
}

impl WeatherLstm {
    /// Creates a randomly initialised network.
    ///
    /// The head is one ReLU layer of `hidden_size` units followed by a linear
    /// projection to `output_size`.
    pub fn new(
        input_size: usize,
        hidden_size: usize,
        num_layers: usize,
        num_entities: usize,
        embedding_dim: usize,
        output_size: usize,
    ) -> Self {
        Self::new_using(
            input_size,
            hidden_size,
            num_layers,
            num_entities,
            embedding_dim,
            output_size,
            &mut rand::thread_rng(),
        )
    }

    pub fn new_using<R: Rng + ?Sized>(
        input_size: usize,
        hidden_size: usize,
        num_layers: usize,
        num_entities: usize,
        embedding_dim: usize,
        output_size: usize,
        rng: &mut R,
    ) -> Self {
        let mut cells = Vec::with_capacity(num_layers);
        for i in 0..num_layers {
            let layer_input_size = if i == 0 { input_size } else { hidden_size };
            cells.push(LstmCell::new_using(layer_input_size, hidden_size, rng));
        }

        let embedding = Embedding::new_using(num_entities, embedding_dim, rng);
        let head = vec![
            DenseLayer::new_using(hidden_size + embedding_dim, hidden_size, Activation::Relu, rng),
            DenseLayer::new_using(hidden_size, output_size, Activation::Linear, rng),
        ];

        WeatherLstm {
            cells,
            embedding,
            head,
            input_size,
            hidden_size,
            num_layers,
            output_size,
        }
    }

    /// Assembles a network from loaded parts (used for deserialization)
    pub fn from_parts(cells: Vec<LstmCell>, embedding: Embedding, head: Vec<DenseLayer>) -> Result<Self, ArtifactError> {
        let first = cells
            .first()
            .ok_or_else(|| ArtifactError::Inconsistent("weather network has no LSTM layers".to_string()))?;
        let input_size = first.input_size;
        let hidden_size = first.hidden_size;

        for (i, cell) in cells.iter().enumerate().skip(1) {
            if cell.input_size != hidden_size || cell.hidden_size != hidden_size {
                return Err(ArtifactError::Shape(format!(
                    "LSTM layer {} is {}→{}, expected {}→{}",
                    i, cell.input_size, cell.hidden_size, hidden_size, hidden_size
                )));
            }
        }

        let output_size = head
            .last()
            .map(|layer| layer.output_size)
            .ok_or_else(|| ArtifactError::Inconsistent("weather network has no dense head".to_string()))?;
        validate_stack(&head, hidden_size + embedding.embedding_dim(), output_size)?;

        Ok(WeatherLstm {
            num_layers: cells.len(),
            cells,
            embedding,
            head,
            input_size,
            hidden_size,
            output_size,
        })
    }

    pub fn get_cells(&self) -> &[LstmCell] {
        &self.cells
    }

    pub fn embedding(&self) -> &Embedding {
        &self.embedding
    }

    pub fn head(&self) -> &[DenseLayer] {
        &self.head
    }

    pub fn num_entities(&self) -> usize {
        self.embedding.num_embeddings()
    }

    /// Runs the window through the LSTM stack and returns the last hidden
    /// state of the top layer, shape `(hidden_size, 1)`.
    pub fn encode_window(&self, window: &Array2<f64>) -> Array2<f64> {
        let mut states: Vec<(Array2<f64>, Array2<f64>)> = self
            .cells
            .iter()
            .map(|cell| (Array2::zeros((cell.hidden_size, 1)), Array2::zeros((cell.hidden_size, 1))))
            .collect();

        for step in window.axis_iter(Axis(0)) {
            let mut layer_input = step.to_owned().insert_axis(Axis(1));
            for (cell, (hx, cx)) in self.cells.iter().zip(states.iter_mut()) {
                let (hy, cy) = cell.forward(&layer_input, hx, cx);
                layer_input = hy.clone();
                *hx = hy;
                *cx = cy;
            }
        }

        states
            .pop()
            .map(|(hx, _)| hx)
            .unwrap_or_else(|| Array2::zeros((self.hidden_size, 1)))
    }

    /// Predicts the next step's targets from a `(T, input_size)` window.
    ///
    /// Returns `None` when the window width or the entity code does not fit
    /// the network.
    pub fn forward(&self, window: &Array2<f64>, entity_code: usize) -> Option<Vec<f64>> {
        if window.ncols() != self.input_size || window.nrows() == 0 {
            return None;
        }
        let entity_vector = self.embedding.lookup(entity_code)?;
        let encoded = self.encode_window(window);

        let joined = concatenate(Axis(0), &[encoded.view(), entity_vector.view()]).ok()?;
        let output = forward_stack(&self.head, joined);
        Some(output.iter().copied().collect())
    }
}
