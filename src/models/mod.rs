/// Stacked LSTM step predictor for daily weather.
pub mod weather_lstm;

/// Dense regressor for hike difficulty and time.
pub mod difficulty_mlp;
