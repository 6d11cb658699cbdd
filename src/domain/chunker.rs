/// A raw line-spanned slice of a file, before metadata extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    pub content: String,
    pub start_line: u32,
    pub end_line: u32,
}

/// Chunking configuration (spec §4.D).
#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    /// Target window size in characters, default 4000.
    pub target_chars: usize,
    /// Overlap fraction of the window, default 0.15.
    pub overlap_fraction: f64,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            target_chars: 4000,
            overlap_fraction: 0.15,
        }
    }
}

/// Line-aware chunking (primary strategy): accumulates whole lines until the
/// next would exceed the target window, never splitting a line.
pub fn chunk_lines(text: &str, config: &ChunkerConfig) -> Vec<RawChunk> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start_idx = 0usize;

    while start_idx < lines.len() {
        let mut end_idx = start_idx;
        let mut size = 0usize;

        loop {
            let next_len = lines[end_idx].len() + 1;
            if end_idx > start_idx && size + next_len > config.target_chars {
                break;
            }
            size += next_len;
            end_idx += 1;
            if end_idx >= lines.len() {
                break;
            }
        }
        let end_idx = end_idx.max(start_idx + 1);

        let slice = &lines[start_idx..end_idx];
        let content = slice.join("\n").trim_end().to_string();
        if !content.is_empty() {
            chunks.push(RawChunk {
                content,
                start_line: (start_idx + 1) as u32,
                end_line: end_idx as u32,
            });
        }

        if end_idx >= lines.len() {
            break;
        }

        let window_lines = end_idx - start_idx;
        let overlap = (1usize).max((config.overlap_fraction * window_lines as f64).floor() as usize);
        start_idx = end_idx.saturating_sub(overlap).max(start_idx + 1);
    }

    chunks
}

/// Character-window chunking (fallback strategy) for content whose line
/// structure isn't meaningful (binary-adjacent text, minified content, etc).
pub fn chunk_chars(text: &str, config: &ChunkerConfig) -> Vec<RawChunk> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let overlap = ((config.overlap_fraction * config.target_chars as f64).floor() as usize).max(1);
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let end = (start + config.target_chars).min(chars.len());
        let slice: String = chars[start..end].iter().collect();
        let trimmed = slice.trim_end().to_string();
        if !trimmed.is_empty() {
            let start_line = 1 + chars[..start].iter().filter(|c| **c == '\n').count() as u32;
            let end_line = 1 + chars[..end].iter().filter(|c| **c == '\n').count() as u32;
            chunks.push(RawChunk {
                content: trimmed,
                start_line,
                end_line,
            });
        }
        if end >= chars.len() {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_aware_chunking_covers_every_line_without_splitting() {
        let text = (1..=50).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let config = ChunkerConfig {
            target_chars: 80,
            overlap_fraction: 0.15,
        };
        let chunks = chunk_lines(&text, &config);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.start_line <= chunk.end_line);
            assert!(!chunk.content.is_empty());
        }
        assert_eq!(chunks.last().unwrap().end_line, 50);
    }

    #[test]
    fn consecutive_chunks_overlap_or_abut() {
        let text = (1..=30).map(|i| format!("line number {i}")).collect::<Vec<_>>().join("\n");
        let config = ChunkerConfig {
            target_chars: 60,
            overlap_fraction: 0.2,
        };
        let chunks = chunk_lines(&text, &config);
        for window in chunks.windows(2) {
            assert!(window[1].start_line <= window[0].end_line + 1);
        }
    }

    #[test]
    fn char_window_chunking_respects_target_and_overlap() {
        let text = "x".repeat(10_000);
        let config = ChunkerConfig {
            target_chars: 4000,
            overlap_fraction: 0.15,
        };
        let chunks = chunk_chars(&text, &config);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.content.len() <= config.target_chars);
        }
    }

    #[test]
    fn empty_input_produces_no_chunks() {
        assert!(chunk_lines("", &ChunkerConfig::default()).is_empty());
        assert!(chunk_chars("", &ChunkerConfig::default()).is_empty());
    }
}
