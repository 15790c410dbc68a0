// Punctuation-run sentence splitting with a dense DFA compiled once per run.
// Borrowed API: units slice into the source text, normalization allocates
// only when a caller asks for it.

use anyhow::Result;
use regex_automata::{
    dfa::{dense::DFA, Automaton},
    Input,
};
use tracing::debug;

/// A sentence unit cut from a larger text.
///
/// `raw` borrows from the source text and keeps the terminal punctuation
/// run; interior line breaks are preserved until [`SentenceUnit::normalize`]
/// is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceUnit<'a> {
    pub index: usize,
    raw: &'a str,
}

impl<'a> SentenceUnit<'a> {
    pub fn raw(&self) -> &'a str {
        self.raw
    }

    /// Collapse interior line breaks and whitespace runs to single spaces
    /// and trim the ends.
    pub fn normalize(&self) -> String {
        normalize_text(self.raw)
    }
}

/// Collapse all whitespace runs (including `\r\n` line breaks) to single
/// spaces, trimming leading and trailing whitespace.
pub fn normalize_text(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    for word in text.split_whitespace() {
        if !normalized.is_empty() {
            normalized.push(' ');
        }
        normalized.push_str(word);
    }
    normalized
}

/// Splits text into sentence units after each terminal punctuation run.
pub struct SentenceSplitter {
    /// Dense DFA matching a run of sentence-ending punctuation.
    dfa: DFA<Vec<u32>>,
}

impl SentenceSplitter {
    /// Compile the boundary DFA. Done once per run; `split` is then called
    /// per acquired text.
    pub fn new() -> Result<Self> {
        let pattern = r"[.!?]+";
        let dfa = DFA::new(pattern)?;
        debug!(pattern, "compiled sentence boundary DFA");
        Ok(Self { dfa })
    }

    /// Cut `text` into sentence units.
    ///
    /// A unit ends with its punctuation run; whitespace between units is
    /// consumed. A trailing fragment without terminal punctuation is kept as
    /// a final unit, and units that are whitespace-only are dropped.
    pub fn split<'a>(&self, text: &'a str) -> Vec<SentenceUnit<'a>> {
        let bytes = text.as_bytes();
        let mut units = Vec::new();
        let mut start = 0;

        let mut pos = 0;
        while pos < bytes.len() {
            let input = Input::new(&bytes[pos..]);
            // The boundary pattern has no quit bytes, so a search error is
            // equivalent to "no further boundary".
            let half = match self.dfa.try_search_fwd(&input) {
                Ok(Some(half)) => half,
                Ok(None) | Err(_) => break,
            };

            // Punctuation is ASCII, so the match end is a char boundary.
            let end = pos + half.offset();
            self.push_unit(&mut units, &text[start..end]);

            let mut next = end;
            while next < bytes.len() && bytes[next].is_ascii_whitespace() {
                next += 1;
            }
            start = next;
            pos = next;
        }

        if start < bytes.len() {
            self.push_unit(&mut units, &text[start..]);
        }

        debug!(units = units.len(), "split text into sentence units");
        units
    }

    fn push_unit<'a>(&self, units: &mut Vec<SentenceUnit<'a>>, raw: &'a str) {
        if raw.trim().is_empty() {
            return;
        }
        units.push(SentenceUnit {
            index: units.len(),
            raw,
        });
    }
}
