// Multi-pattern matching over a fixed keyword set: build once, scan many.
// Offsets are character offsets so callers can index sentences the way
// operators typed them, independent of UTF-8 byte widths.

use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

const ROOT: usize = 0;

/// One trie state. `fail` and child links are indices into the owning
/// automaton's node arena, never owning pointers.
#[derive(Debug, Default)]
struct TrieNode {
    children: HashMap<char, usize>,
    /// Keyword ids recognized on arrival at this state, including every
    /// keyword reachable through the failure chain (merged at build time).
    output: Vec<usize>,
    fail: usize,
}

/// Aho-Corasick automaton over a keyword set.
///
/// Immutable after [`PatternAutomaton::build`]; a single automaton is meant
/// to be built per run and reused for every text unit scanned.
pub struct PatternAutomaton {
    nodes: Vec<TrieNode>,
    keywords: Vec<String>,
}

impl PatternAutomaton {
    /// Build the automaton from a keyword set.
    ///
    /// Any finite set of strings is valid input: an empty set yields an
    /// automaton that matches nothing, and duplicate keywords collapse to a
    /// single entry.
    pub fn build<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut automaton = Self {
            nodes: vec![TrieNode::default()],
            keywords: Vec::new(),
        };

        let mut seen = HashSet::new();
        for keyword in keywords {
            let keyword = keyword.into();
            if seen.insert(keyword.clone()) {
                automaton.insert_keyword(keyword);
            }
        }
        automaton.link_failures();

        debug!(
            keywords = automaton.keywords.len(),
            states = automaton.nodes.len(),
            "compiled pattern automaton"
        );
        automaton
    }

    /// Scan `text` once and report every occurrence of every keyword.
    ///
    /// Returns one entry per known keyword mapping to the ascending sequence
    /// of character offsets where it starts. Every reported offset `o` for
    /// keyword `k` satisfies `text[o .. o + len(k))  == k` in characters, and
    /// every occurrence is reported exactly once.
    pub fn search(&self, text: &str) -> HashMap<String, Vec<usize>> {
        let mut offsets: Vec<Vec<usize>> = vec![Vec::new(); self.keywords.len()];

        let mut state = ROOT;
        for (i, ch) in text.chars().enumerate() {
            state = self.step(state, ch);
            if state == ROOT {
                // No pattern prefix is active at this position.
                continue;
            }
            for &id in &self.nodes[state].output {
                // The match ends at position i; it started len - 1 earlier.
                let len = self.keyword_char_len(id);
                offsets[id].push(i + 1 - len);
            }
        }

        self.keywords
            .iter()
            .cloned()
            .zip(offsets)
            .collect()
    }

    /// Scan `text` and stop at the first keyword occurrence.
    pub fn has_match(&self, text: &str) -> bool {
        let mut state = ROOT;
        for ch in text.chars() {
            state = self.step(state, ch);
            if state != ROOT && !self.nodes[state].output.is_empty() {
                return true;
            }
        }
        false
    }

    /// The deduplicated keywords this automaton recognizes.
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    fn insert_keyword(&mut self, keyword: String) {
        let mut state = ROOT;
        for ch in keyword.chars() {
            state = match self.nodes[state].children.get(&ch) {
                Some(&child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(TrieNode::default());
                    self.nodes[state].children.insert(ch, child);
                    child
                }
            };
        }
        let id = self.keywords.len();
        self.nodes[state].output.push(id);
        self.keywords.push(keyword);
    }

    /// Breadth-first failure-link pass. Root's direct children fail to the
    /// root; every deeper node fails to the longest proper suffix of its
    /// path that is also a path from the root. Output sets are merged along
    /// the link as each node is settled, so `search` never has to chase the
    /// chain at scan time.
    fn link_failures(&mut self) {
        let mut queue = VecDeque::new();

        let depth_one: Vec<usize> = self.nodes[ROOT].children.values().copied().collect();
        for child in depth_one {
            self.nodes[child].fail = ROOT;
            queue.push_back(child);
        }

        while let Some(current) = queue.pop_front() {
            let edges: Vec<(char, usize)> = self.nodes[current]
                .children
                .iter()
                .map(|(&ch, &child)| (ch, child))
                .collect();

            for (ch, child) in edges {
                let target = self.step(self.nodes[current].fail, ch);
                self.nodes[child].fail = target;

                let inherited = self.nodes[target].output.clone();
                self.nodes[child].output.extend(inherited);

                queue.push_back(child);
            }
        }
    }

    /// Advance one character: follow the edge if present, otherwise walk the
    /// failure chain; land on the root when no suffix has the edge either.
    fn step(&self, mut state: usize, ch: char) -> usize {
        loop {
            if let Some(&next) = self.nodes[state].children.get(&ch) {
                return next;
            }
            if state == ROOT {
                return ROOT;
            }
            state = self.nodes[state].fail;
        }
    }

    fn keyword_char_len(&self, id: usize) -> usize {
        self.keywords[id].chars().count()
    }
}
