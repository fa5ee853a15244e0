use ndarray::{Array2, Dimension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::ArtifactError;
use crate::layers::dense::{Activation, DenseLayer};
use crate::layers::embedding::Embedding;
use crate::layers::lstm_cell::LstmCell;
use crate::models::difficulty_mlp::DifficultyMlp;
use crate::models::weather_lstm::WeatherLstm;

/// Serializable version of Array2<f64> for persistence
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SerializableArray2 {
    data: Vec<f64>,
    shape: (usize, usize),
}

impl From<&Array2<f64>> for SerializableArray2 {
    fn from(array: &Array2<f64>) -> Self {
        Self {
            data: array.iter().cloned().collect(),
            shape: array.raw_dim().into_pattern(),
        }
    }
}

impl SerializableArray2 {
    pub fn into_array(self) -> Result<Array2<f64>, ArtifactError> {
        let shape = self.shape;
        Array2::from_shape_vec(shape, self.data)
            .map_err(|e| ArtifactError::Shape(format!("cannot rebuild {:?} array: {}", shape, e)))
    }
}

/// Serializable LSTM cell parameters
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SerializableLstmCell {
    w_ih: SerializableArray2,
    w_hh: SerializableArray2,
    b_ih: SerializableArray2,
    b_hh: SerializableArray2,
}

impl From<&LstmCell> for SerializableLstmCell {
    fn from(cell: &LstmCell) -> Self {
        Self {
            w_ih: (&cell.w_ih).into(),
            w_hh: (&cell.w_hh).into(),
            b_ih: (&cell.b_ih).into(),
            b_hh: (&cell.b_hh).into(),
        }
    }
}

impl SerializableLstmCell {
    pub fn into_cell(self) -> Result<LstmCell, ArtifactError> {
        LstmCell::from_weights(
            self.w_ih.into_array()?,
            self.w_hh.into_array()?,
            self.b_ih.into_array()?,
            self.b_hh.into_array()?,
        )
    }
}

/// Serializable dense layer
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SerializableDenseLayer {
    weight: SerializableArray2,
    bias: SerializableArray2,
    activation: Activation,
}

impl From<&DenseLayer> for SerializableDenseLayer {
    fn from(layer: &DenseLayer) -> Self {
        Self {
            weight: (&layer.weight).into(),
            bias: (&layer.bias).into(),
            activation: layer.activation,
        }
    }
}

impl SerializableDenseLayer {
    pub fn into_layer(self) -> Result<DenseLayer, ArtifactError> {
        DenseLayer::from_weights(self.weight.into_array()?, self.bias.into_array()?, self.activation)
    }
}

fn into_layers(layers: Vec<SerializableDenseLayer>) -> Result<Vec<DenseLayer>, ArtifactError> {
    layers.into_iter().map(SerializableDenseLayer::into_layer).collect()
}

/// Serializable weather network
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SerializableWeatherLstm {
    cells: Vec<SerializableLstmCell>,
    embedding: SerializableArray2,
    head: Vec<SerializableDenseLayer>,
}

impl From<&WeatherLstm> for SerializableWeatherLstm {
    fn from(network: &WeatherLstm) -> Self {
        Self {
            cells: network.get_cells().iter().map(|cell| cell.into()).collect(),
            embedding: (&network.embedding().weights).into(),
            head: network.head().iter().map(|layer| layer.into()).collect(),
        }
    }
}

impl SerializableWeatherLstm {
    pub fn into_network(self) -> Result<WeatherLstm, ArtifactError> {
        let cells = self
            .cells
            .into_iter()
            .map(SerializableLstmCell::into_cell)
            .collect::<Result<Vec<_>, _>>()?;
        let embedding = Embedding::from_weights(self.embedding.into_array()?);
        WeatherLstm::from_parts(cells, embedding, into_layers(self.head)?)
    }
}

/// Serializable difficulty network
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SerializableDifficultyMlp {
    layers: Vec<SerializableDenseLayer>,
}

impl From<&DifficultyMlp> for SerializableDifficultyMlp {
    fn from(network: &DifficultyMlp) -> Self {
        Self {
            layers: network.layers().iter().map(|layer| layer.into()).collect(),
        }
    }
}

impl SerializableDifficultyMlp {
    pub fn into_network(self) -> Result<DifficultyMlp, ArtifactError> {
        DifficultyMlp::from_layers(into_layers(self.layers)?)
    }
}

/// Metadata stored next to every artifact payload
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ArtifactMetadata {
    pub name: String,
    pub version: String,
    pub created_at: String,
    pub description: Option<String>,
}

impl ArtifactMetadata {
    /// Metadata stamped with the crate version and the current time
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            description,
        }
    }
}

/// Complete artifact file: metadata plus payload
#[derive(Serialize, Deserialize)]
pub struct SavedArtifact<T> {
    pub metadata: ArtifactMetadata,
    pub payload: T,
}

#[derive(Serialize)]
struct SavedArtifactRef<'a, T> {
    metadata: &'a ArtifactMetadata,
    payload: &'a T,
}

/// On-disk encodings, chosen by file extension
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArtifactFormat {
    Json,
    Binary,
}

impl ArtifactFormat {
    /// `.json` is JSON; `.bin`, `.model` and anything else is bincode
    pub fn from_path(path: &Path) -> ArtifactFormat {
        match path.extension().and_then(|s| s.to_str()) {
            Some("json") => ArtifactFormat::Json,
            _ => ArtifactFormat::Binary,
        }
    }
}

/// Artifact IO in both formats
pub struct ArtifactPersistence;

impl ArtifactPersistence {
    /// Save to JSON format (human-readable)
    pub fn save_to_json<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<(), ArtifactError> {
        let json = serde_json::to_string_pretty(value)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    pub fn load_from_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T, ArtifactError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Save to binary format (compact and fast)
    pub fn save_to_binary<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<(), ArtifactError> {
        let encoded = bincode::serialize(value)?;
        let mut file = File::create(path)?;
        file.write_all(&encoded)?;
        Ok(())
    }

    pub fn load_from_binary<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T, ArtifactError> {
        let mut file = File::open(path)?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;
        Ok(bincode::deserialize(&contents)?)
    }
}

/// Save/load an artifact payload with its metadata (format by file extension)
pub trait PersistentArtifact: Serialize + DeserializeOwned {
    fn save<P: AsRef<Path>>(&self, path: P, metadata: &ArtifactMetadata) -> Result<(), ArtifactError> {
        let saved = SavedArtifactRef { metadata, payload: self };
        match ArtifactFormat::from_path(path.as_ref()) {
            ArtifactFormat::Json => ArtifactPersistence::save_to_json(&saved, path),
            ArtifactFormat::Binary => ArtifactPersistence::save_to_binary(&saved, path),
        }
    }

    fn load<P: AsRef<Path>>(path: P) -> Result<(Self, ArtifactMetadata), ArtifactError> {
        let saved: SavedArtifact<Self> = match ArtifactFormat::from_path(path.as_ref()) {
            ArtifactFormat::Json => ArtifactPersistence::load_from_json(path)?,
            ArtifactFormat::Binary => ArtifactPersistence::load_from_binary(path)?,
        };
        Ok((saved.payload, saved.metadata))
    }
}
