//! Source ingestion for plain and literate card programs.
//!
//! A `.md` input contributes only the lines inside fenced blocks tagged
//! `cards`; any other file is taken whole. Every extracted line keeps its
//! line number in the original file.

use std::path::Path;

/// Fence tag that marks a literate code block.
pub const LITERATE_TAG: &str = "cards";

/// A line of extracted source with its original location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// The source text (without trailing newline).
    pub text: String,
    /// 1-indexed line number in the original file.
    pub original_line: usize,
}

/// Extracted source content from an input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceContent {
    /// All extracted source lines in document order.
    pub lines: Vec<SourceLine>,
    /// The file path (for error reporting).
    pub file_path: String,
}

/// Extracts card source from `content`, read from `file_path`.
#[must_use]
pub fn extract_source(file_path: &Path, content: &str) -> SourceContent {
    let lines = if is_literate_file(file_path) {
        extract_literate_source(content)
    } else {
        numbered(content.lines().enumerate())
    };

    SourceContent {
        lines,
        file_path: file_path.to_string_lossy().to_string(),
    }
}

fn is_literate_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
}

fn numbered<'a>(lines: impl Iterator<Item = (usize, &'a str)>) -> Vec<SourceLine> {
    lines
        .map(|(idx, line)| SourceLine {
            text: line.to_string(),
            original_line: idx + 1,
        })
        .collect()
}

fn extract_literate_source(content: &str) -> Vec<SourceLine> {
    let mut kept = Vec::new();
    // length of the fence that opened the current `cards` block
    let mut open: Option<usize> = None;

    for (idx, line) in content.lines().enumerate() {
        match (fence_length(line), open) {
            (Some(len), Some(opened)) if len >= opened => open = None,
            (Some(len), None) => {
                let info = line.trim_start()[len..].trim();
                if info.split_whitespace().next() == Some(LITERATE_TAG) {
                    open = Some(len);
                }
            }
            (_, Some(_)) => kept.push((idx, line)),
            (None, None) => {}
        }
    }

    numbered(kept.into_iter())
}

/// Number of backticks when `line` is a fence (three or more).
fn fence_length(line: &str) -> Option<usize> {
    let count = line
        .trim_start()
        .chars()
        .take_while(|&c| c == '`')
        .count();
    (count >= 3).then_some(count)
}
