//! Character trigram similarity.
//!
//! Deterministic and offline: text is lowercased, split into Unicode words,
//! stop words are dropped, and each remaining word contributes its padded
//! character trigrams plus one whole-word feature. Cosine similarity over
//! those sparse counts is used both to rank corpus passages and to detect
//! near-duplicate sentences.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;
use unicode_segmentation::UnicodeSegmentation;

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "do", "does", "you", "your", "we", "our", "i", "me",
    "my",
];

fn stop_words() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

/// Sparse trigram feature vector for one piece of text.
#[derive(Debug, Clone, Default)]
pub struct TrigramProfile {
    features: HashMap<String, f32>,
    norm: f32,
}

impl TrigramProfile {
    /// Build the profile of `text`.
    pub fn new(text: &str) -> Self {
        let lower = text.to_lowercase();
        let mut features: HashMap<String, f32> = HashMap::new();

        for word in lower
            .unicode_words()
            .filter(|w| !stop_words().contains(w))
        {
            // Pad so short words still yield at least one trigram
            let padded: Vec<char> = format!(" {} ", word).chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                *features.entry(trigram).or_insert(0.0) += 1.0;
            }
            *features.entry(format!("w:{}", word)).or_insert(0.0) += 1.0;
        }

        let norm = features.values().map(|v| v * v).sum::<f32>().sqrt();
        Self { features, norm }
    }

    /// True when the text had no informative words.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Cosine similarity in `[0, 1]`; zero when either side is empty.
    pub fn cosine(&self, other: &TrigramProfile) -> f32 {
        if self.norm == 0.0 || other.norm == 0.0 {
            return 0.0;
        }

        let (small, large) = if self.features.len() <= other.features.len() {
            (&self.features, &other.features)
        } else {
            (&other.features, &self.features)
        };

        let dot: f32 = small
            .iter()
            .filter_map(|(k, v)| large.get(k).map(|w| v * w))
            .sum();

        (dot / (self.norm * other.norm)).clamp(0.0, 1.0)
    }
}
