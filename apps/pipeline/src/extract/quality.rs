//! Quality scoring for directly extracted PDF text.
//!
//! Decides whether the text layer is trustworthy or whether the page must
//! be rasterized and OCR'd. The score is a weighted sum of four signals;
//! the length signal carries enough weight that any sub-100-char extraction
//! falls below the threshold on its own.

/// Minimum score for direct extraction to be accepted. No combination of
/// signals that excludes the length signal can reach it, so short text
/// always falls through to OCR.
pub const QUALITY_THRESHOLD: f32 = 0.7;

const MIN_USEFUL_CHARS: usize = 100;
const MIN_LETTER_RATIO: f32 = 0.3;
/// Fraction of single-char tokens above which text counts as fragmented
/// (a typical artifact of broken text layers, e.g. "R e s u m e").
const MAX_FRAGMENT_RATIO: f32 = 0.5;

const W_LENGTH: f32 = 0.4;
const W_CHARSET: f32 = 0.25;
const W_PUNCTUATION: f32 = 0.15;
const W_DENSITY: f32 = 0.2;

/// Scores extracted text in `[0, 1]`.
pub fn score_text(text: &str) -> f32 {
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }

    let mut score = 0.0;
    if text.chars().count() >= MIN_USEFUL_CHARS {
        score += W_LENGTH;
    }
    if letter_ratio(text) >= MIN_LETTER_RATIO {
        score += W_CHARSET;
    }
    if has_sentence_punctuation(text) {
        score += W_PUNCTUATION;
    }
    if fragment_ratio(text) < MAX_FRAGMENT_RATIO {
        score += W_DENSITY;
    }
    score
}

/// True for CJK ideographs, kana and fullwidth forms.
pub fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'   // CJK Unified Ideographs
        | '\u{3400}'..='\u{4DBF}' // Extension A
        | '\u{3040}'..='\u{30FF}' // Hiragana + Katakana
        | '\u{F900}'..='\u{FAFF}' // Compatibility Ideographs
        | '\u{FF00}'..='\u{FFEF}' // Fullwidth forms
    )
}

pub fn is_cjk_punctuation(c: char) -> bool {
    matches!(c, '\u{3000}'..='\u{303F}' | '，' | '。' | '！' | '？' | '；' | '：')
}

/// Ratio of alphanumeric-or-CJK characters over all non-whitespace chars.
fn letter_ratio(text: &str) -> f32 {
    let mut letters = 0usize;
    let mut total = 0usize;
    for c in text.chars() {
        if c.is_whitespace() {
            continue;
        }
        total += 1;
        if c.is_alphanumeric() || is_cjk(c) {
            letters += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    letters as f32 / total as f32
}

fn has_sentence_punctuation(text: &str) -> bool {
    text.chars()
        .any(|c| matches!(c, '.' | '!' | '?' | ';' | ',' | '。' | '！' | '？' | '；' | '，' | '、'))
}

fn fragment_ratio(text: &str) -> f32 {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return 1.0;
    }
    let single = tokens.iter().filter(|t| t.chars().count() == 1).count();
    single as f32 / tokens.len() as f32
}
