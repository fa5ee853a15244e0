/// Inference LSTM cell.
pub mod lstm_cell;

/// Fully connected layers with activations.
pub mod dense;

/// Categorical embedding tables.
pub mod embedding;
