//! Sentence segmentation
//!
//! Whitespace is collapsed first, then the text is cut after sentence
//! terminators that are followed by a space and a sentence-initial
//! character. Common French abbreviations and single-letter initials do
//! not end a sentence.

/// Abbreviations whose trailing period is not a sentence end
const ABBREVIATIONS: &[&str] = &[
    "M", "MM", "Mme", "Mmes", "Mlle", "Dr", "Pr", "Me", "St", "Ste", "cf", "Cf", "p", "art",
    "env", "vol", "n°", "No",
];

/// Configuration for segmentation
#[derive(Debug, Clone)]
pub struct SegmentConfig {
    /// Sentences with fewer characters are dropped
    pub min_chars: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self { min_chars: 3 }
    }
}

/// Rule-based sentence segmenter
#[derive(Debug, Clone, Default)]
pub struct SentenceSegmenter {
    config: SegmentConfig,
}

impl SentenceSegmenter {
    pub fn new(config: SegmentConfig) -> Self {
        Self { config }
    }

    /// Cut text into ordered, trimmed, non-empty sentences
    pub fn segment(&self, text: &str) -> Vec<String> {
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");

        split_sentences(&normalized)
            .into_iter()
            .filter(|s| s.chars().count() >= self.config.min_chars)
            .map(str::to_string)
            .collect()
    }
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '…')
}

fn is_closer(c: char) -> bool {
    matches!(c, '"' | '»' | ')' | '’' | '”' | '\'')
}

fn starts_sentence(c: char) -> bool {
    c.is_uppercase() || c.is_ascii_digit() || matches!(c, '«' | '"' | '“' | '(' | '-' | '—')
}

fn is_abbreviation(before: &str) -> bool {
    let word = before
        .rsplit(' ')
        .next()
        .unwrap_or(before)
        .trim_start_matches(|c: char| !c.is_alphanumeric());

    if ABBREVIATIONS.contains(&word) {
        return true;
    }

    let mut chars = word.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_uppercase())
}

fn split_sentences(text: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        if !is_terminator(c) {
            i += 1;
            continue;
        }

        let mut j = i + 1;
        while j < chars.len() && (is_terminator(chars[j].1) || is_closer(chars[j].1)) {
            j += 1;
        }

        let end = chars.get(j).map(|(p, _)| *p).unwrap_or(text.len());
        let boundary = j >= chars.len()
            || (chars[j].1 == ' '
                && chars
                    .get(j + 1)
                    .is_some_and(|(_, next)| starts_sentence(*next)));

        if boundary && !(c == '.' && is_abbreviation(&text[start..pos])) {
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }

        i = j;
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }

    sentences
}
