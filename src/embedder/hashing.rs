/// Lexical feature-hashing embedder.
///
/// Splits text into lowercase alphanumeric words, hashes each word into one
/// of `dimensions` buckets and L2-normalizes the term counts. Texts that
/// share words get a positive cosine similarity, which is enough for
/// offline runs and deterministic tests without model files.
use super::{Embedder, EmbedderError, l2_normalize};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// A deterministic embedder built on the hashing trick.
pub struct HashingEmbedder {
    dimensions: usize,
    max_tokens: usize,
    name: String,
}

impl HashingEmbedder {
    /// Create a new `HashingEmbedder` with the given dimensionality and
    /// word-token limit.
    #[must_use]
    pub fn new(dimensions: usize, max_tokens: usize) -> Self {
        Self {
            dimensions,
            max_tokens,
            name: format!("hashing-fnv1a-{dimensions}"),
        }
    }

    fn bucket(&self, token: &str) -> usize {
        let h = fnv1a(token.as_bytes());
        let folded = (h ^ (h >> 32)) as u32;
        folded as usize % self.dimensions
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(384, 256)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |h, &b| {
        (h ^ u64::from(b)).wrapping_mul(FNV_PRIME)
    })
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        if self.dimensions == 0 {
            return Err(EmbedderError::InferenceFailed(
                "hashing embedder has no dimensions".to_string(),
            ));
        }

        let words: Vec<String> = tokens(text).collect();
        if words.len() > self.max_tokens {
            return Err(EmbedderError::InputTooLong {
                tokens: words.len(),
                max: self.max_tokens,
            });
        }

        let mut embedding = vec![0.0f32; self.dimensions];
        for word in &words {
            embedding[self.bucket(word)] += 1.0;
        }

        l2_normalize(&mut embedding);
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.name
    }
}
