//! Recursive character splitting for embedding-sized chunks.
//!
//! Documents are split on the coarsest separator that appears in the text
//! (paragraph, then line, then sentence, then word, then single characters),
//! and the resulting fragments are merged back into chunks that never exceed
//! [`SplitterConfig::max_chars`]. Consecutive chunks from the same document
//! carry up to [`SplitterConfig::overlap`] characters of shared tail so that
//! sentences cut at a boundary stay retrievable from both sides.
//!
//! Lengths are counted in Unicode scalar values, never bytes.

use std::collections::VecDeque;

/// Chunking parameters.
///
/// `overlap` should be smaller than `max_chars`; the merge step treats it as
/// a budget for how much tail to carry into the next chunk.
#[derive(Clone, Debug)]
pub struct SplitterConfig {
    /// Upper bound on chunk length, in characters.
    pub max_chars: usize,
    /// Overlap budget between consecutive chunks, in characters.
    pub overlap: usize,
    /// Separators tried coarsest-first. An empty string means
    /// character-by-character splitting and should come last.
    pub separators: Vec<String>,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            max_chars: 1000,
            overlap: 200,
            separators: vec![
                "\n\n".to_string(),
                "\n".to_string(),
                ". ".to_string(),
                " ".to_string(),
                String::new(),
            ],
        }
    }
}

impl SplitterConfig {
    /// Config with custom bounds and the default separator ladder.
    pub fn new(max_chars: usize, overlap: usize) -> Self {
        Self {
            max_chars,
            overlap,
            ..Self::default()
        }
    }
}

/// Splits document text into bounded, overlapping chunks.
#[derive(Clone, Debug)]
pub struct RecursiveCharacterSplitter {
    config: SplitterConfig,
}

impl RecursiveCharacterSplitter {
    pub fn new(config: SplitterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// Splits `text` into chunks of at most `max_chars` characters.
    ///
    /// Non-empty text that already fits yields exactly one chunk identical to
    /// the input. Empty or whitespace-only text yields no chunks. Chunk order
    /// follows left-to-right text order.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        if char_len(text) <= self.config.max_chars {
            return vec![text.to_string()];
        }
        self.split_with(text, &self.config.separators)
    }

    fn split_with(&self, text: &str, separators: &[String]) -> Vec<String> {
        let (separator, finer) = pick_separator(text, separators);
        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator).map(str::to_string).collect()
        };

        let mut chunks = Vec::new();
        let mut window: Vec<String> = Vec::new();
        for piece in pieces {
            if char_len(&piece) <= self.config.max_chars {
                window.push(piece);
                continue;
            }
            if !window.is_empty() {
                chunks.extend(self.merge(&window, separator));
                window.clear();
            }
            if finer.is_empty() {
                // Nothing finer to recurse into; emit the oversized piece.
                chunks.push(piece);
            } else {
                chunks.extend(self.split_with(&piece, finer));
            }
        }
        if !window.is_empty() {
            chunks.extend(self.merge(&window, separator));
        }
        chunks
    }

    /// Greedily packs same-level fragments into chunks, retaining a tail of
    /// at most `overlap` characters when a chunk boundary is emitted.
    fn merge(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let max = self.config.max_chars;
        let overlap = self.config.overlap;
        let sep_len = char_len(separator);

        let mut chunks = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let piece_len = char_len(piece);
            let joined_cost = piece_len + if current.is_empty() { 0 } else { sep_len };

            if total + joined_cost > max && !current.is_empty() {
                if let Some(chunk) = join_pieces(&current, separator) {
                    chunks.push(chunk);
                }
                // Shrink the window until it fits the overlap budget and
                // leaves room for the incoming piece.
                while total > overlap
                    || (total + piece_len + if current.is_empty() { 0 } else { sep_len } > max
                        && total > 0)
                {
                    let Some(front) = current.pop_front() else {
                        break;
                    };
                    total -= char_len(front) + if current.is_empty() { 0 } else { sep_len };
                }
            }

            total += piece_len + if current.is_empty() { 0 } else { sep_len };
            current.push_back(piece.as_str());
        }

        if let Some(chunk) = join_pieces(&current, separator) {
            chunks.push(chunk);
        }
        chunks
    }
}

/// Coarsest separator that actually occurs in `text`, plus the finer ones
/// remaining after it. The empty separator matches unconditionally.
fn pick_separator<'a>(text: &str, separators: &'a [String]) -> (&'a str, &'a [String]) {
    for (idx, separator) in separators.iter().enumerate() {
        if separator.is_empty() || text.contains(separator.as_str()) {
            return (separator.as_str(), &separators[idx + 1..]);
        }
    }
    ("", &[])
}

fn join_pieces(pieces: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = pieces
        .iter()
        .copied()
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
