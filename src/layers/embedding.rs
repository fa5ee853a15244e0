use ndarray::{Array2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;

/// Lookup table mapping a categorical code to a dense vector
///
/// `weights` has shape (num_embeddings, embedding_dim); row `i` is the vector
/// for code `i`.
#[derive(Clone, Debug)]
pub struct Embedding {
    pub weights: Array2<f64>,
}

impl Embedding {
    pub fn new(num_embeddings: usize, embedding_dim: usize) -> Self {
        Self::new_using(num_embeddings, embedding_dim, &mut rand::thread_rng())
    }

    pub fn new_using<R: Rng + ?Sized>(num_embeddings: usize, embedding_dim: usize, rng: &mut R) -> Self {
        Self {
            weights: Array2::random_using((num_embeddings, embedding_dim), Uniform::new(-0.05, 0.05), rng),
        }
    }

    pub fn from_weights(weights: Array2<f64>) -> Self {
        Self { weights }
    }

    pub fn num_embeddings(&self) -> usize {
        self.weights.nrows()
    }

    pub fn embedding_dim(&self) -> usize {
        self.weights.ncols()
    }

    /// Column vector `(embedding_dim, 1)` for `code`, or `None` when out of range
    pub fn lookup(&self, code: usize) -> Option<Array2<f64>> {
        if code >= self.num_embeddings() {
            return None;
        }
        Some(self.weights.row(code).to_owned().insert_axis(Axis(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_lookup_returns_column() {
        let embedding = Embedding::from_weights(arr2(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]));
        assert_eq!(embedding.num_embeddings(), 3);
        assert_eq!(embedding.embedding_dim(), 2);
        assert_eq!(embedding.lookup(1), Some(arr2(&[[3.0], [4.0]])));
        assert_eq!(embedding.lookup(3), None);
    }
}
