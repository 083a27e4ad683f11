use super::ChunkerError;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::{debug, warn};

const RECURSIVE_DEFAULT_SIZE: usize = 500;
const RECURSIVE_DEFAULT_OVERLAP: usize = 20;
const RECURSIVE_DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Splits text on a list of separators, trying them in order.
///
/// The first separator found in the text is used to split it into pieces. Each separator
/// stays attached to the start of the piece following it. Consecutive pieces shorter than
/// `size` are merged into chunks of at most `size` characters, carrying up to `overlap`
/// characters of the previous chunk into the next one. Pieces that are too large are split
/// again with the remaining separators. The empty separator splits on every character and
/// therefore always terminates the recursion.
///
/// Chunks are trimmed of surrounding whitespace and empty chunks are omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecursiveSplitter {
    pub size: usize,
    pub overlap: usize,
    pub separators: Vec<String>,
}

impl RecursiveSplitter {
    /// Create a splitter with the default separators (paragraphs, lines, words, characters).
    /// Errors if `size` is 0 or `overlap` is not less than `size`.
    pub fn new(size: usize, overlap: usize) -> Result<Self, ChunkerError> {
        super::check_bounds(size, overlap)?;
        Ok(Self {
            size,
            overlap,
            separators: default_separators(),
        })
    }

    /// Replace the separators. An empty list behaves as `[""]`.
    pub fn with_separators(mut self, separators: Vec<String>) -> Self {
        self.separators = separators;
        self
    }

    pub fn chunk<'a>(&self, input: &'a str) -> Result<Vec<&'a str>, ChunkerError> {
        super::check_bounds(self.size, self.overlap)?;

        let mut chunks = vec![];

        if input.trim().is_empty() {
            return Ok(chunks);
        }

        self.split(input, 0..input.len(), &self.separators, &mut chunks);

        debug!(
            "Chunked {} chunks, avg chunk size: {}",
            chunks.len(),
            chunks.iter().fold(0, |acc, el| acc + el.len()) / chunks.len().max(1)
        );

        Ok(chunks)
    }

    fn split<'a>(
        &self,
        input: &'a str,
        span: Range<usize>,
        separators: &[String],
        out: &mut Vec<&'a str>,
    ) {
        let text = &input[span.clone()];

        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];

        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut fitting: Vec<Piece> = vec![];

        for piece in split_keep_separator(text, separator, span.start) {
            if piece.len < self.size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                self.merge(input, &fitting, out);
                fitting.clear();
            }

            if remaining.is_empty() {
                push_trimmed(input, piece.range, out);
            } else {
                self.split(input, piece.range, remaining, out);
            }
        }

        if !fitting.is_empty() {
            self.merge(input, &fitting, out);
        }
    }

    /// Merge contiguous pieces into chunks. The pieces are adjacent spans of the input
    /// so a run of them is itself a single span.
    fn merge<'a>(&self, input: &'a str, pieces: &[Piece], out: &mut Vec<&'a str>) {
        let mut first = 0;
        let mut total = 0;

        for (i, piece) in pieces.iter().enumerate() {
            if total + piece.len > self.size {
                if total > self.size {
                    warn!(
                        "Created a chunk of size {total}, which is longer than the specified {}",
                        self.size
                    );
                }

                if i > first {
                    push_trimmed(input, pieces[first].range.start..pieces[i - 1].range.end, out);

                    while total > self.overlap || (total + piece.len > self.size && total > 0) {
                        total -= pieces[first].len;
                        first += 1;
                    }
                }
            }

            total += piece.len;
        }

        if first < pieces.len() {
            let last = &pieces[pieces.len() - 1];
            push_trimmed(input, pieces[first].range.start..last.range.end, out);
        }
    }
}

impl Default for RecursiveSplitter {
    fn default() -> Self {
        Self {
            size: RECURSIVE_DEFAULT_SIZE,
            overlap: RECURSIVE_DEFAULT_OVERLAP,
            separators: default_separators(),
        }
    }
}

fn default_separators() -> Vec<String> {
    RECURSIVE_DEFAULT_SEPARATORS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// A span of the input with its length in chars.
#[derive(Debug, Clone)]
struct Piece {
    range: Range<usize>,
    len: usize,
}

/// Split `text` on `separator`, keeping each separator at the start of the piece after it.
/// Ranges are offset by `base` so they index into the original input.
/// The empty separator yields one piece per char. Empty pieces are dropped.
fn split_keep_separator(text: &str, separator: &str, base: usize) -> Vec<Piece> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| Piece {
                range: base + i..base + i + c.len_utf8(),
                len: 1,
            })
            .collect();
    }

    let mut bounds = vec![0];
    bounds.extend(text.match_indices(separator).map(|(i, _)| i));
    bounds.push(text.len());

    bounds
        .windows(2)
        .filter(|w| w[0] < w[1])
        .map(|w| Piece {
            range: base + w[0]..base + w[1],
            len: text[w[0]..w[1]].chars().count(),
        })
        .collect()
}

fn push_trimmed<'a>(input: &'a str, range: Range<usize>, out: &mut Vec<&'a str>) {
    let chunk = input[range].trim();
    if !chunk.is_empty() {
        out.push(chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_words_up_to_size() {
        let splitter = RecursiveSplitter::new(9, 0).unwrap();
        let chunks = splitter.chunk("aaaa bbbb cccc dddd").unwrap();

        assert_eq!(vec!["aaaa bbbb", "cccc", "dddd"], chunks);
    }

    #[test]
    fn carries_overlap_into_next_chunk() {
        let splitter = RecursiveSplitter::new(10, 5).unwrap();
        let chunks = splitter.chunk("aaaa bbbb cccc dddd").unwrap();

        assert_eq!(vec!["aaaa bbbb", "bbbb cccc", "cccc dddd"], chunks);
    }

    #[test]
    fn prefers_paragraphs() {
        let splitter = RecursiveSplitter::new(15, 0).unwrap();
        let chunks = splitter.chunk("First para.\n\nSecond para.").unwrap();

        assert_eq!(vec!["First para.", "Second para."], chunks);
    }

    #[test]
    fn falls_back_to_characters() {
        let splitter = RecursiveSplitter::new(4, 0).unwrap();
        let chunks = splitter.chunk("abcdefghij").unwrap();

        assert_eq!(vec!["abcd", "efgh", "ij"], chunks);
    }

    #[test]
    fn recurses_into_large_paragraphs() {
        let splitter = RecursiveSplitter::new(12, 0).unwrap();
        let input = "short\n\nthis paragraph is long";
        let chunks = splitter.chunk(input).unwrap();

        assert_eq!("short", chunks[0]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 12));
        assert_eq!(
            "this paragraph is long",
            chunks[1..].join(" ").replace("  ", " ")
        );
    }

    #[test]
    fn whole_input_fits() {
        let splitter = RecursiveSplitter::default();
        let input = "  Hypertension is persistently elevated arterial blood pressure.  ";
        let chunks = splitter.chunk(input).unwrap();

        assert_eq!(vec![input.trim()], chunks);
    }

    #[test]
    fn counts_chars_not_bytes() {
        let splitter = RecursiveSplitter::new(4, 0).unwrap();
        let chunks = splitter.chunk("ččč ććć").unwrap();

        assert_eq!(vec!["ččč", "ććć"], chunks);
    }

    #[test]
    fn empty_input() {
        let splitter = RecursiveSplitter::default();
        assert!(splitter.chunk("").unwrap().is_empty());
        assert!(splitter.chunk("\n\n  \n").unwrap().is_empty());
    }

    #[test]
    fn chunks_never_exceed_size() {
        let splitter = RecursiveSplitter::new(50, 10).unwrap();
        let input = "Anemia is a condition in which the blood lacks healthy red blood cells.\n\
                     Symptoms include fatigue, weakness and pale skin.\n\n\
                     Treatment depends on the cause and may include supplements, \
                     medication or transfusions.";
        let chunks = splitter.chunk(input).unwrap();

        assert!(chunks.len() > 1);
        for chunk in chunks {
            assert!(chunk.chars().count() <= 50, "chunk too large: {chunk}");
        }
    }
}
