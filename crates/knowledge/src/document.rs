//! Document evidence: a fixed corpus of policy text ranked per question.

use crate::similarity::TrigramProfile;
use async_trait::async_trait;
use concierge_core::{AppError, AppResult};
use std::fs;
use std::path::Path;
use text_splitter::TextSplitter;
use walkdir::WalkDir;

/// Semantic lookup over a document corpus.
///
/// `lookup` never fails: it returns the concatenated relevant passages, an
/// empty string when nothing is relevant, or an explanatory string when the
/// source itself is broken.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn lookup(&self, question: &str) -> String;
}

/// One ranked unit of the corpus.
#[derive(Debug, Clone)]
pub struct Passage {
    /// File (or caller-supplied name) the passage came from.
    pub source: String,
    pub text: String,
    profile: TrigramProfile,
}

impl Passage {
    fn new(source: &str, text: &str) -> Self {
        Self {
            source: source.to_string(),
            text: text.trim().to_string(),
            profile: TrigramProfile::new(text),
        }
    }
}

/// In-memory corpus loaded from `.txt`/`.md` files.
#[derive(Debug, Clone)]
pub struct CorpusSource {
    passages: Vec<Passage>,
    top_k: usize,
    min_relevance: f32,
}

impl CorpusSource {
    /// Load and chunk every text or markdown file under `dir`.
    ///
    /// A missing directory yields an empty corpus so the pipeline can still
    /// answer from tabular data alone.
    pub fn load(dir: &Path, chunk_size: usize, top_k: usize, min_relevance: f32) -> AppResult<Self> {
        if !dir.exists() {
            tracing::warn!("Documents directory {:?} not found, corpus is empty", dir);
            return Ok(Self::from_texts(
                Vec::<(String, String)>::new(),
                chunk_size,
                top_k,
                min_relevance,
            ));
        }

        let mut documents = Vec::new();
        for entry in WalkDir::new(dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || !is_document(path) {
                continue;
            }

            let raw = fs::read_to_string(path)
                .map_err(|e| AppError::Adapter(format!("Failed to read {:?}: {}", path, e)))?;
            let text = if is_markdown(path) {
                clean_markdown(&raw)
            } else {
                raw
            };

            let name = path
                .strip_prefix(dir)
                .unwrap_or(path)
                .to_string_lossy()
                .to_string();
            documents.push((name, text));
        }

        let corpus = Self::from_texts(documents, chunk_size, top_k, min_relevance);
        tracing::info!(
            "Loaded document corpus from {:?}: {} passages",
            dir,
            corpus.passages.len()
        );
        Ok(corpus)
    }

    /// Build a corpus from `(name, text)` pairs.
    pub fn from_texts<I, N, T>(documents: I, chunk_size: usize, top_k: usize, min_relevance: f32) -> Self
    where
        I: IntoIterator<Item = (N, T)>,
        N: AsRef<str>,
        T: AsRef<str>,
    {
        let splitter = TextSplitter::new(chunk_size.max(1));
        let passages = documents
            .into_iter()
            .flat_map(|(name, text)| {
                splitter
                    .chunks(text.as_ref())
                    .filter(|chunk| !chunk.trim().is_empty())
                    .map(|chunk| Passage::new(name.as_ref(), chunk))
                    .collect::<Vec<_>>()
            })
            .collect();

        Self {
            passages,
            top_k: top_k.max(1),
            min_relevance,
        }
    }

    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    /// Passages scoring at least the relevance floor, best first, at most `top_k`.
    pub fn rank(&self, question: &str) -> Vec<(&Passage, f32)> {
        let query = TrigramProfile::new(question);
        if query.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(&Passage, f32)> = self
            .passages
            .iter()
            .map(|p| (p, query.cosine(&p.profile)))
            .filter(|(_, score)| *score >= self.min_relevance)
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(self.top_k);
        scored
    }
}

#[async_trait]
impl DocumentSource for CorpusSource {
    fn name(&self) -> &str {
        "corpus"
    }

    async fn lookup(&self, question: &str) -> String {
        let ranked = self.rank(question);

        if ranked.is_empty() {
            tracing::debug!(
                "No passages above {:.2} relevance for question",
                self.min_relevance
            );
            return String::new();
        }

        tracing::debug!(
            "Document lookup returned {} passages (top score {:.3})",
            ranked.len(),
            ranked[0].1
        );

        ranked
            .iter()
            .map(|(passage, _)| passage.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn is_document(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("txt") | Some("md") | Some("markdown")
    )
}

fn is_markdown(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("md") | Some("markdown")
    )
}

/// Strip header markers, rules and code fences.
fn clean_markdown(text: &str) -> String {
    text.lines()
        .map(|line| line.trim_start_matches('#').trim())
        .filter(|line| {
            !(line.starts_with("---") || line.starts_with("```") || line.starts_with("~~~"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
