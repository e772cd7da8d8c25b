//! Bounded excerpts around the first matched search term.

/// Default snippet length in characters.
pub const DEFAULT_SNIPPET_LENGTH: usize = 200;

const ELLIPSIS: &str = "...";

/// Builds short body excerpts for result lists.
#[derive(Debug, Clone, Copy)]
pub struct SnippetGenerator {
    max_length: usize,
}

impl Default for SnippetGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SNIPPET_LENGTH)
    }
}

impl SnippetGenerator {
    /// `max_length` bounds the excerpt in characters, excluding ellipses.
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length: max_length.max(1),
        }
    }

    /// Excerpt of `body` around the first case-insensitive occurrence of any
    /// word in `terms`, or the leading prefix if nothing matches.
    pub fn generate(&self, body: Option<&str>, terms: Option<&str>) -> Option<String> {
        let text = collapse_whitespace(body?);
        let words = split_terms(terms.unwrap_or(""));

        let hit = words
            .iter()
            .filter_map(|w| find_case_insensitive(&text, w))
            .min();

        Some(match hit {
            Some(char_pos) => self.window(&text, char_pos),
            None => self.prefix(&text),
        })
    }

    fn prefix(&self, text: &str) -> String {
        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= self.max_length {
            return text.to_string();
        }
        let mut out: String = chars[..self.max_length].iter().collect();
        out.push_str(ELLIPSIS);
        out
    }

    /// Window of `max_length` chars starting a third of the way before `pos`.
    fn window(&self, text: &str, pos: usize) -> String {
        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= self.max_length {
            return text.to_string();
        }
        let lead = self.max_length / 3;
        let start = pos
            .saturating_sub(lead)
            .min(chars.len() - self.max_length);
        let end = start + self.max_length;

        let mut out = String::new();
        if start > 0 {
            out.push_str(ELLIPSIS);
        }
        out.extend(&chars[start..end]);
        if end < chars.len() {
            out.push_str(ELLIPSIS);
        }
        out
    }
}

/// Search words with quotes and a trailing prefix `*` removed.
fn split_terms(terms: &str) -> Vec<Vec<char>> {
    terms
        .split_whitespace()
        .map(|w| w.trim_matches('"').trim_end_matches('*'))
        .filter(|w| !w.is_empty())
        .map(|w| w.chars().flat_map(char::to_lowercase).collect())
        .collect()
}

/// Character index of the first case-insensitive occurrence of `needle`.
fn find_case_insensitive(haystack: &str, needle: &[char]) -> Option<usize> {
    let hay: Vec<char> = haystack.chars().collect();
    if needle.is_empty() || needle.len() > hay.len() {
        return None;
    }
    (0..=hay.len() - needle.len()).find(|&i| {
        hay[i..i + needle.len()]
            .iter()
            .zip(needle)
            .all(|(h, n)| h.to_lowercase().eq(std::iter::once(*n)))
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
