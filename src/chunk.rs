//! Header-aware Markdown chunker.
//!
//! Splitting happens in two passes:
//!
//! 1. [`split_by_headers`] cuts the body at ATX headings of levels 1–3
//!    (`#`, `##`, `###`). Heading lines stay in the text of the section they
//!    open, and every section records the heading path leading to it.
//! 2. [`RecursiveSplitter`] cuts each section down to `chunk_size`
//!    characters, preferring paragraph breaks, then line breaks, then word
//!    breaks, and finally individual characters. Up to `chunk_overlap`
//!    characters of trailing context are repeated at the start of the next
//!    chunk.
//!
//! Sizes are measured in `char`s, not bytes. Output is deterministic for a
//! given input and configuration.

use std::collections::VecDeque;

use tracing::warn;

use crate::error::ParseError;
use crate::models::{Chunk, HeadingContext};

/// Heading markers, longest first so `###` is not taken for `#`.
const HEADINGS: [(&str, usize, &str); 3] = [
    ("###", 3, "Header 3"),
    ("##", 2, "Header 2"),
    ("#", 1, "Header 1"),
];

/// Separators tried in order; the empty separator splits into characters.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// A run of body text under one heading path.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub content: String,
    pub heading_context: HeadingContext,
}

/// Split a Markdown body into sections at level 1–3 headings.
///
/// Blank lines end a paragraph; consecutive paragraphs with the same heading
/// path are joined with `"\n\n"`. A section made only of heading lines is
/// folded into the deeper section that immediately follows it. Lines inside
/// fenced code blocks are never treated as headings.
pub fn split_by_headers(body: &str) -> Vec<Section> {
    let mut paragraphs: Vec<Section> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut stack: Vec<(usize, &'static str)> = Vec::new();
    let mut context = HeadingContext::new();
    let mut fence: Option<&'static str> = None;

    for raw in body.lines() {
        let line = raw.trim();

        match fence {
            None => {
                if line.starts_with("```") && line.matches("```").count() == 1 {
                    fence = Some("```");
                } else if line.starts_with("~~~") {
                    fence = Some("~~~");
                }
            }
            Some(marker) => {
                if line.starts_with(marker) {
                    fence = None;
                }
            }
        }
        if fence.is_some() {
            current.push(raw.trim_end());
            continue;
        }

        if let Some((level, name, text)) = parse_heading(line) {
            flush(&mut current, &mut paragraphs, &context);
            while let Some(&(top, top_name)) = stack.last() {
                if top < level {
                    break;
                }
                stack.pop();
                context.remove(top_name);
            }
            stack.push((level, name));
            context.insert(name.to_string(), text.to_string());
            current.push(line);
        } else if !line.is_empty() {
            current.push(raw.trim_end());
        } else {
            flush(&mut current, &mut paragraphs, &context);
        }
    }
    flush(&mut current, &mut paragraphs, &context);

    aggregate(paragraphs)
}

fn flush(current: &mut Vec<&str>, paragraphs: &mut Vec<Section>, context: &HeadingContext) {
    if !current.is_empty() {
        paragraphs.push(Section {
            content: current.join("\n"),
            heading_context: context.clone(),
        });
        current.clear();
    }
}

/// Match a level 1–3 heading line, returning `(level, label, text)`.
fn parse_heading(line: &str) -> Option<(usize, &'static str, &str)> {
    for (marker, level, name) in HEADINGS {
        if let Some(rest) = line.strip_prefix(marker) {
            if rest.is_empty() || rest.starts_with(' ') {
                return Some((level, name, rest.trim()));
            }
        }
    }
    None
}

fn aggregate(paragraphs: Vec<Section>) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    for para in paragraphs {
        if let Some(last) = sections.last_mut() {
            if last.heading_context == para.heading_context {
                last.content.push_str("\n\n");
                last.content.push_str(&para.content);
                continue;
            }
            let heading_only = last
                .content
                .lines()
                .last()
                .map(|l| l.trim_start().starts_with('#'))
                .unwrap_or(false);
            if heading_only && last.heading_context.len() < para.heading_context.len() {
                last.content.push_str("\n\n");
                last.content.push_str(&para.content);
                last.heading_context = para.heading_context;
                continue;
            }
        }
        sections.push(para);
    }
    sections
}

/// Character-budget splitter that recurses through coarser-to-finer separators.
#[derive(Debug, Clone, Copy)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveSplitter {
    /// # Errors
    ///
    /// [`ParseError::InvalidChunking`] when `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ParseError> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(ParseError::InvalidChunking {
                size: chunk_size,
                overlap: chunk_overlap,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Split `text` into trimmed, non-empty chunks of at most `chunk_size` chars.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &SEPARATORS)
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = "";
        let mut finer: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                break;
            }
            if text.contains(sep) {
                separator = *sep;
                finer = &separators[i + 1..];
                break;
            }
        }

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|p| !p.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting, separator));
                fitting.clear();
            }
            if finer.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_with(piece, finer));
            }
        }
        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting, separator));
        }
        chunks
    }

    /// Greedily pack pieces into chunks, keeping a tail of at most
    /// `chunk_overlap` chars as the head of the next chunk.
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            let joined = |window: &VecDeque<&str>, total: usize| {
                total + len + if window.is_empty() { 0 } else { sep_len }
            };

            if joined(&window, total) > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total, self.chunk_size
                    );
                }
                if !window.is_empty() {
                    if let Some(chunk) = join(&window, separator) {
                        chunks.push(chunk);
                    }
                    while total > self.chunk_overlap
                        || (total > 0 && joined(&window, total) > self.chunk_size)
                    {
                        let had_more = window.len() > 1;
                        let Some(first) = window.pop_front() else {
                            break;
                        };
                        let removed = char_len(first) + if had_more { sep_len } else { 0 };
                        total = total.saturating_sub(removed);
                    }
                }
            }

            window.push_back(piece);
            total += len + if window.len() > 1 { sep_len } else { 0 };
        }

        if let Some(chunk) = join(&window, separator) {
            chunks.push(chunk);
        }
        chunks
    }
}

fn join(window: &VecDeque<&str>, separator: &str) -> Option<String> {
    let text = window
        .iter()
        .copied()
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split a document body into numbered chunks.
///
/// Sequence numbers start at 1 and run across the whole document, not per
/// section.
pub fn chunk_document(
    body: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<Chunk>, ParseError> {
    let splitter = RecursiveSplitter::new(chunk_size, chunk_overlap)?;

    let mut chunks = Vec::new();
    for section in split_by_headers(body) {
        for content in splitter.split(&section.content) {
            chunks.push(Chunk {
                content,
                heading_context: section.heading_context.clone(),
                sequence_number: chunks.len() + 1,
            });
        }
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(pairs: &[(&str, &str)]) -> HeadingContext {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn paragraph(seed: &str, chars: usize) -> String {
        let mut text = String::new();
        while text.chars().count() < chars {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(seed);
        }
        text.chars().take(chars).collect::<String>().trim_end().to_string()
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_document("Hello, world!", 1000, 0).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].sequence_number, 1);
        assert_eq!(chunks[0].content, "Hello, world!");
        assert!(chunks[0].heading_context.is_empty());
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_document("", 1000, 0).unwrap().is_empty());
        assert!(chunk_document("\n\n  \n", 1000, 0).unwrap().is_empty());
    }

    #[test]
    fn test_headings_are_kept_and_tracked() {
        let body = "# Intro\n\nWelcome.\n\n## Details\n\nSome details.\n\n### Deeper\n\nDeep text.\n\n## Other\n\nOther text.";
        let sections = split_by_headers(body);
        assert_eq!(sections.len(), 4);

        assert_eq!(sections[0].content, "# Intro\n\nWelcome.");
        assert_eq!(sections[0].heading_context, ctx(&[("Header 1", "Intro")]));

        assert_eq!(sections[1].content, "## Details\n\nSome details.");
        assert_eq!(
            sections[1].heading_context,
            ctx(&[("Header 1", "Intro"), ("Header 2", "Details")])
        );

        assert_eq!(
            sections[2].heading_context,
            ctx(&[
                ("Header 1", "Intro"),
                ("Header 2", "Details"),
                ("Header 3", "Deeper")
            ])
        );

        // A sibling heading clears the deeper level.
        assert_eq!(
            sections[3].heading_context,
            ctx(&[("Header 1", "Intro"), ("Header 2", "Other")])
        );
    }

    #[test]
    fn test_heading_only_section_folds_into_child() {
        let sections = split_by_headers("# Guide\n## Setup\nInstall it.");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].content, "# Guide\n\n## Setup\nInstall it.");
        assert_eq!(
            sections[0].heading_context,
            ctx(&[("Header 1", "Guide"), ("Header 2", "Setup")])
        );
    }

    #[test]
    fn test_no_headings_single_section() {
        let sections = split_by_headers("First.\n\nSecond.\nStill second.");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].content, "First.\n\nSecond.\nStill second.");
        assert!(sections[0].heading_context.is_empty());
    }

    #[test]
    fn test_level_four_and_hashtags_are_content() {
        let sections = split_by_headers("# Top\n\n#### Minor\n\n#hashtag line");
        assert_eq!(sections.len(), 1);
        assert!(sections[0].content.contains("#### Minor"));
        assert!(sections[0].content.contains("#hashtag line"));
    }

    #[test]
    fn test_code_fence_hides_headings() {
        let body = "# Build\n\n```sh\n# not a heading\n\nmake all\n```\n\nDone.";
        let sections = split_by_headers(body);
        assert_eq!(sections.len(), 1);
        assert!(sections[0].content.contains("# not a heading\n\nmake all"));
        assert_eq!(sections[0].heading_context, ctx(&[("Header 1", "Build")]));
    }

    #[test]
    fn test_single_heading_2500_chars_gives_three_chunks() {
        let paras: Vec<String> = (0..5).map(|i| paragraph(&format!("word{}", i), 490)).collect();
        let body = format!("# Intro\n\n{}", paras.join("\n\n"));
        assert!(body.chars().count() > 2400);

        let chunks = chunk_document(&body, 1000, 0).unwrap();
        assert_eq!(chunks.len(), 3);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.sequence_number, i + 1);
            assert!(c.content.chars().count() <= 1000);
            assert_eq!(c.heading_context, ctx(&[("Header 1", "Intro")]));
        }
        assert!(chunks[0].content.starts_with("# Intro"));
    }

    #[test]
    fn test_numbering_runs_across_sections() {
        let body = format!(
            "# One\n\n{}\n\n# Two\n\n{}",
            paragraph("alpha", 150),
            paragraph("beta", 150)
        );
        let chunks = chunk_document(&body, 60, 0).unwrap();
        assert!(chunks.len() > 4);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.sequence_number, i + 1, "Index mismatch at position {}", i);
            assert!(c.content.chars().count() <= 60);
        }
        assert_eq!(
            chunks.last().unwrap().heading_context,
            ctx(&[("Header 1", "Two")])
        );
    }

    #[test]
    fn test_overlap_repeats_trailing_words() {
        let splitter = RecursiveSplitter::new(10, 5).unwrap();
        assert_eq!(
            splitter.split("aaaa bbbb cccc dddd"),
            vec!["aaaa bbbb", "bbbb cccc", "cccc dddd"]
        );
    }

    #[test]
    fn test_zero_overlap_has_no_repeats() {
        let splitter = RecursiveSplitter::new(10, 0).unwrap();
        assert_eq!(
            splitter.split("aaaa bbbb cccc dddd"),
            vec!["aaaa bbbb", "cccc dddd"]
        );
    }

    #[test]
    fn test_long_word_falls_back_to_characters() {
        let splitter = RecursiveSplitter::new(4, 0).unwrap();
        assert_eq!(splitter.split("abcdefghij"), vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_sizes_count_chars_not_bytes() {
        let splitter = RecursiveSplitter::new(3, 0).unwrap();
        let chunks = splitter.split("äöüßéèà");
        assert_eq!(chunks, vec!["äöü", "ßéè", "à"]);
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        assert!(matches!(
            RecursiveSplitter::new(0, 0),
            Err(ParseError::InvalidChunking { size: 0, overlap: 0 })
        ));
        assert!(matches!(
            RecursiveSplitter::new(100, 100),
            Err(ParseError::InvalidChunking { .. })
        ));
        assert!(chunk_document("text", 10, 20).is_err());
    }

    #[test]
    fn test_deterministic() {
        let body = format!("# A\n\n{}\n\n## B\n\n{}", paragraph("x", 300), paragraph("y", 300));
        let c1 = chunk_document(&body, 80, 10).unwrap();
        let c2 = chunk_document(&body, 80, 10).unwrap();
        assert_eq!(c1, c2);
    }
}
