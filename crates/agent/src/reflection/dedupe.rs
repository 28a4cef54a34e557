//! Near-duplicate sentence removal.
//!
//! Sentences end after a run of `.`, `!` or `?` followed by whitespace, or at
//! a newline. Survivors are rejoined with a space after terminal punctuation
//! and a newline otherwise, so splitting the output again yields the same
//! sentences and the filter is idempotent.

use concierge_knowledge::TrigramProfile;

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn push_trimmed<'a>(text: &'a str, from: usize, to: usize, out: &mut Vec<&'a str>) {
    let sentence = text[from..to].trim();
    if !sentence.is_empty() {
        out.push(sentence);
    }
}

/// Split `text` into trimmed, non-empty sentences.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        let (idx, c) = chars[i];

        if c == '\n' {
            push_trimmed(text, start, idx, &mut sentences);
            start = idx + 1;
            i += 1;
            continue;
        }

        if is_terminal(c) {
            let mut last = i;
            while last + 1 < chars.len() && is_terminal(chars[last + 1].1) {
                last += 1;
            }
            let followed_by_space = chars
                .get(last + 1)
                .map(|(_, next)| next.is_whitespace())
                .unwrap_or(false);
            if followed_by_space {
                let (end_idx, end_char) = chars[last];
                let end = end_idx + end_char.len_utf8();
                push_trimmed(text, start, end, &mut sentences);
                start = end;
            }
            i = last + 1;
            continue;
        }

        i += 1;
    }

    push_trimmed(text, start, text.len(), &mut sentences);
    sentences
}

/// Drop sentences whose similarity to an earlier kept sentence exceeds
/// `threshold`. Sentences shorter than `min_chars` are always kept.
pub fn dedupe_sentences(text: &str, threshold: f32, min_chars: usize) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut profiles: Vec<TrigramProfile> = Vec::new();
    let mut dropped = 0;

    for sentence in split_sentences(text) {
        if sentence.chars().count() < min_chars {
            kept.push(sentence);
            continue;
        }

        let profile = TrigramProfile::new(sentence);
        if profiles.iter().any(|earlier| profile.cosine(earlier) > threshold) {
            dropped += 1;
            continue;
        }

        profiles.push(profile);
        kept.push(sentence);
    }

    if dropped > 0 {
        tracing::debug!("De-duplication dropped {} sentences", dropped);
    }

    let mut out = String::new();
    for sentence in kept {
        if let Some(prev) = out.chars().last() {
            out.push(if is_terminal(prev) { ' ' } else { '\n' });
        }
        out.push_str(sentence);
    }
    out
}
