use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::ArtifactError;

/// TF-IDF vectorizer over word tokens
///
/// Tokens are runs of alphanumeric characters (or `_`) at least two
/// characters long, lowercased. Term counts are weighted by `idf` and the
/// resulting vector is L2-normalised.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
}

pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_lowercase)
        .collect()
}

impl TfidfVectorizer {
    pub fn new(vocabulary: BTreeMap<String, usize>, idf: Vec<f64>) -> Result<Self, ArtifactError> {
        let vectorizer = Self { vocabulary, idf };
        vectorizer.validate()?;
        Ok(vectorizer)
    }

    /// Fits vocabulary and smoothed idf, `ln((1 + n) / (1 + df)) + 1`
    pub fn fit<S: AsRef<str>>(documents: &[S]) -> Self {
        let mut document_frequency: BTreeMap<String, usize> = BTreeMap::new();
        for document in documents {
            let terms: BTreeSet<String> = tokenize(document.as_ref()).into_iter().collect();
            for term in terms {
                *document_frequency.entry(term).or_default() += 1;
            }
        }

        let n = documents.len() as f64;
        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::with_capacity(document_frequency.len());
        for (index, (term, df)) in document_frequency.into_iter().enumerate() {
            vocabulary.insert(term, index);
            idf.push(((1.0 + n) / (1.0 + df as f64)).ln() + 1.0);
        }

        Self { vocabulary, idf }
    }

    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.vocabulary.len() != self.idf.len() {
            return Err(ArtifactError::Shape(format!(
                "vocabulary has {} terms but idf has {} weights",
                self.vocabulary.len(),
                self.idf.len()
            )));
        }
        let indices: BTreeSet<usize> = self.vocabulary.values().copied().collect();
        if indices.len() != self.idf.len() || indices.iter().any(|&i| i >= self.idf.len()) {
            return Err(ArtifactError::Inconsistent(
                "vocabulary indices must be a permutation of 0..n".to_string(),
            ));
        }
        Ok(())
    }

    pub fn n_features(&self) -> usize {
        self.idf.len()
    }

    pub fn transform(&self, text: &str) -> Vec<f64> {
        let mut vector = vec![0.0; self.n_features()];
        for token in tokenize(text) {
            if let Some(&index) = self.vocabulary.get(&token) {
                vector[index] += self.idf[index];
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("Jawa Barat, a/Bogor"), vec!["jawa", "barat", "bogor"]);
        assert!(tokenize("x y").is_empty());
    }

    #[test]
    fn test_fit_transform_is_unit_length() {
        let vectorizer = TfidfVectorizer::fit(&["jawa barat", "jawa timur", "sumatera utara"]);
        assert_eq!(vectorizer.n_features(), 5);

        let vector = vectorizer.transform("Jawa Barat");
        let norm: f64 = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-12);

        // "barat" is rarer than "jawa" so it carries more weight
        let jawa = vectorizer.vocabulary["jawa"];
        let barat = vectorizer.vocabulary["barat"];
        assert!(vector[barat] > vector[jawa]);
    }

    #[test]
    fn test_unknown_terms_give_zero_vector() {
        let vectorizer = TfidfVectorizer::fit(&["jawa barat"]);
        assert!(vectorizer.transform("bali").iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_validate_rejects_bad_indices() {
        let mut vocabulary = BTreeMap::new();
        vocabulary.insert("a".to_string(), 0);
        vocabulary.insert("b".to_string(), 5);
        assert!(TfidfVectorizer::new(vocabulary, vec![1.0, 1.0]).is_err());
    }
}
