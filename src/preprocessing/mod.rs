//! Transforms fitted at training time and replayed at inference time.

pub mod encoder;
pub mod scaler;
pub mod vectorizer;

pub use encoder::LabelEncoder;
pub use scaler::MinMaxScaler;
pub use vectorizer::TfidfVectorizer;
