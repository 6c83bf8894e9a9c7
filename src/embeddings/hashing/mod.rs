
use std::hash::{Hash, Hasher};

use twox_hash::XxHash64;

use crate::embeddings::Embedder;

/// Width of hashed vectors unless configured otherwise
pub const DEFAULT_HASHING_DIMENSION: usize = 1024;

/// Bigrams count for less than single words so exact phrase overlap breaks ties
const BIGRAM_WEIGHT: f32 = 0.5;

/// Offline embedder based on signed feature hashing of word unigrams and bigrams.
///
/// Captures lexical overlap only. Useful when no embedding server is available
/// and for deterministic tests.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    #[inline]
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Embed a single text into a unit vector, or a zero vector if it has no words
    #[inline]
    #[must_use]
    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        let tokens = tokenize(text);

        for token in &tokens {
            self.accumulate(&mut vector, &[token.as_str()], 1.0);
        }
        for pair in tokens.windows(2) {
            if let [first, second] = pair {
                self.accumulate(&mut vector, &[first.as_str(), second.as_str()], BIGRAM_WEIGHT);
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }

        vector
    }

    fn accumulate(&self, vector: &mut [f32], feature: &[&str], weight: f32) {
        let mut hasher = XxHash64::with_seed(0);
        feature.hash(&mut hasher);
        let hash = hasher.finish();

        let slot = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };

        if let Some(value) = vector.get_mut(slot) {
            *value += sign * weight;
        }
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.vectorize(text)).collect())
    }
}
