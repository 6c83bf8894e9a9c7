
use itertools::Itertools;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IndexError {
    #[error("Vector {position} has dimension {found}, expected {expected}")]
    DimensionMismatch {
        position: usize,
        expected: usize,
        found: usize,
    },

    #[error("Vector {0} is empty")]
    EmptyVector(usize),
}

/// One search result: a position in the indexed set and its cosine similarity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub index: usize,
    pub score: f32,
}

/// Exact nearest-neighbour index over L2-normalized vectors.
///
/// Scores are cosine similarities in `[-1, 1]`. The index is immutable; a
/// rebuild produces a new value.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    dimension: Option<usize>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build an index from vectors that all share one dimension.
    /// An empty input gives an empty index.
    #[inline]
    pub fn build(vectors: Vec<Vec<f32>>) -> Result<Self, IndexError> {
        let Some(dimension) = vectors.first().map(Vec::len) else {
            return Ok(Self::empty());
        };

        let mut normalized = Vec::with_capacity(vectors.len());
        for (position, vector) in vectors.into_iter().enumerate() {
            if vector.is_empty() {
                return Err(IndexError::EmptyVector(position));
            }
            if vector.len() != dimension {
                return Err(IndexError::DimensionMismatch {
                    position,
                    expected: dimension,
                    found: vector.len(),
                });
            }
            normalized.push(normalize(vector));
        }

        Ok(Self {
            dimension: Some(dimension),
            vectors: normalized,
        })
    }

    /// The `k` most similar vectors, best first. Ties keep insertion order.
    ///
    /// A query of the wrong dimension matches nothing.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        if k == 0 || self.dimension != Some(query.len()) {
            return Vec::new();
        }

        let query = normalize(query.to_vec());

        self.vectors
            .iter()
            .enumerate()
            .map(|(index, vector)| SearchHit {
                index,
                score: dot(&query, vector),
            })
            .k_smallest_by(k, |a, b| {
                b.score
                    .total_cmp(&a.score)
                    .then_with(|| a.index.cmp(&b.index))
            })
            .collect()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Scale to unit length. Zero vectors stay zero and score 0 against everything.
fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = dot(&vector, &vector).sqrt();
    if norm > f32::EPSILON {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}
