//! Rolling conversation context.

use serde::Serialize;
use std::collections::VecDeque;

/// One question and the answer given to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
}

impl Exchange {
    fn render(&self) -> String {
        format!("User: {}\nAssistant: {}", self.question, self.answer)
    }
}

/// Append-only log of exchanges bounded by a character budget.
///
/// Each exchange renders as exactly two lines, so trimming whole exchanges
/// from the front never leaves half of one behind.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    exchanges: VecDeque<Exchange>,
    budget_chars: usize,
}

impl ConversationContext {
    pub fn new(budget_chars: usize) -> Self {
        Self {
            exchanges: VecDeque::new(),
            budget_chars,
        }
    }

    /// Record an exchange and trim the oldest ones back under budget.
    pub fn push(&mut self, question: &str, answer: &str) {
        self.exchanges.push_back(Exchange {
            question: single_line(question),
            answer: single_line(answer),
        });
        self.trim();
    }

    fn trim(&mut self) {
        let mut dropped = 0;
        while !self.exchanges.is_empty() && self.char_count() > self.budget_chars {
            self.exchanges.pop_front();
            dropped += 1;
        }
        if dropped > 0 {
            tracing::debug!(
                "Trimmed {} exchanges from context ({} chars remain)",
                dropped,
                self.char_count()
            );
        }
    }

    /// Serialized context, oldest exchange first.
    pub fn render(&self) -> String {
        self.exchanges
            .iter()
            .map(Exchange::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Length of [`render`](Self::render) in characters.
    pub fn char_count(&self) -> usize {
        let lines: usize = self
            .exchanges
            .iter()
            .map(|e| e.render().chars().count())
            .sum();
        lines + self.exchanges.len().saturating_sub(1)
    }

    pub fn exchanges(&self) -> impl Iterator<Item = &Exchange> {
        self.exchanges.iter()
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn clear(&mut self) {
        self.exchanges.clear();
    }
}

/// Collapse all whitespace runs, newlines included, into single spaces.
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
