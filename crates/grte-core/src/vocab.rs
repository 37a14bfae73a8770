//! # Vocabulary
//!
//! Word <-> id mapping for word-level models. Ids 0 and 1 are reserved for
//! padding and unknown words; the rest are ordered by descending frequency.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use candle_core::{Device, Tensor};
use tracing::{info, warn};

use crate::error::{GrteError, Result};

pub const PAD_TOKEN: &str = "**PAD**";
pub const UNK_TOKEN: &str = "**UNK**";
pub const PAD_ID: u32 = 0;
pub const UNK_ID: u32 = 1;

/// A frequency-ordered word vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocab {
    id2word: Vec<String>,
    word2id: HashMap<String, u32>,
}

impl Vocab {
    /// Build a vocabulary from word counts.
    ///
    /// With `threshold > 1`, words seen fewer than `threshold` times are
    /// dropped. Equal counts are ordered alphabetically.
    pub fn from_counter(counter: &HashMap<String, usize>, threshold: usize) -> Self {
        let mut words: Vec<(&String, usize)> = counter
            .iter()
            .filter(|(_, count)| threshold <= 1 || **count >= threshold)
            .map(|(word, count)| (word, *count))
            .collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let id2word = [PAD_TOKEN.to_string(), UNK_TOKEN.to_string()]
            .into_iter()
            .chain(
                words
                    .into_iter()
                    .map(|(w, _)| w.clone())
                    .filter(|w| w != PAD_TOKEN && w != UNK_TOKEN),
            )
            .collect();

        let vocab = Self::from_words(id2word);
        info!(size = vocab.len(), threshold, "created vocabulary");
        vocab
    }

    /// Build from an id-ordered word list.
    pub fn from_words(id2word: Vec<String>) -> Self {
        let word2id = id2word
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i as u32))
            .collect();
        Self { id2word, word2id }
    }

    /// Load a vocabulary saved with [`Vocab::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let id2word: Vec<String> = serde_json::from_str(&content)?;
        let vocab = Self::from_words(id2word);
        info!(size = vocab.len(), path = %path.as_ref().display(), "loaded vocabulary");
        Ok(vocab)
    }

    /// Save the word list as JSON, replacing any existing file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if path.exists() {
            warn!(path = %path.display(), "overwriting old vocab file");
        }
        fs::write(path, serde_json::to_string(&self.id2word)?)?;
        info!(size = self.len(), path = %path.display(), "saved vocabulary");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.id2word.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id2word.is_empty()
    }

    /// Id of `word`, if present.
    pub fn id(&self, word: &str) -> Option<u32> {
        self.word2id.get(word).copied()
    }

    /// Map words to ids; unknown words map to [`UNK_ID`].
    pub fn map<S: AsRef<str>>(&self, words: &[S]) -> Vec<u32> {
        words
            .iter()
            .map(|w| self.id(w.as_ref()).unwrap_or(UNK_ID))
            .collect()
    }

    /// Map ids back to words; ids outside the vocabulary map to [`UNK_TOKEN`].
    pub fn unmap(&self, ids: &[u32]) -> Vec<&str> {
        ids.iter()
            .map(|&id| {
                self.id2word
                    .get(id as usize)
                    .map(String::as_str)
                    .unwrap_or(UNK_TOKEN)
            })
            .collect()
    }

    /// Build a `(len, dim)` embedding matrix.
    ///
    /// Rows for words found in `word_vectors` copy the vector, all other rows
    /// are zero.
    pub fn embeddings(
        &self,
        word_vectors: Option<&HashMap<String, Vec<f32>>>,
        dim: usize,
        device: &Device,
    ) -> Result<Tensor> {
        let mut data = vec![0f32; self.len() * dim];

        if let Some(vectors) = word_vectors {
            if let Some(v) = vectors.values().next() {
                if v.len() != dim {
                    return Err(GrteError::ShapeMismatch(format!(
                        "word vectors have dimension {}, expected {dim}",
                        v.len()
                    )));
                }
            }
            for (idx, word) in self.id2word.iter().enumerate() {
                if let Some(vector) = vectors.get(word) {
                    if vector.len() != dim {
                        return Err(GrteError::ShapeMismatch(format!(
                            "vector for {word:?} has dimension {}, expected {dim}",
                            vector.len()
                        )));
                    }
                    data[idx * dim..(idx + 1) * dim].copy_from_slice(vector);
                }
            }
        }

        Ok(Tensor::from_vec(data, (self.len(), dim), device)?)
    }
}
