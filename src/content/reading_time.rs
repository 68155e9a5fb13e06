//! Reading-time estimation

use super::ContentBlock;

/// Assumed reading rate
pub const WORDS_PER_MINUTE: usize = 200;

/// Count whitespace-separated words
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Minutes needed to read `words` words, rounded up
pub fn estimate_minutes(words: usize) -> u32 {
    words.div_ceil(WORDS_PER_MINUTE) as u32
}

/// Words of all paragraphs plus each heading that is present
pub fn total_words(blocks: &[ContentBlock]) -> usize {
    blocks
        .iter()
        .map(|block| {
            let heading = block.heading.as_deref().map(count_words).unwrap_or(0);
            let body: usize = block.paragraphs.iter().map(|p| count_words(p)).sum();
            heading + body
        })
        .sum()
}

/// Reading time of a post body in minutes
pub fn reading_time(blocks: &[ContentBlock]) -> u32 {
    estimate_minutes(total_words(blocks))
}
