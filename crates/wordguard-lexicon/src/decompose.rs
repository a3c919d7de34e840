//! Phonetic decomposition of Hangul text
//!
//! Obfuscated spellings (spaced-out syllables, bare jamo) are caught by
//! matching against a jamo-level expansion of both the lexicon and the
//! message.

const HANGUL_BASE: u32 = 0xAC00;
const HANGUL_LAST: u32 = 0xD7A3;
const JUNG_COUNT: u32 = 21;
const JONG_COUNT: u32 = 28;

const CHO: [char; 19] = [
    'ㄱ', 'ㄲ', 'ㄴ', 'ㄷ', 'ㄸ', 'ㄹ', 'ㅁ', 'ㅂ', 'ㅃ', 'ㅅ', 'ㅆ', 'ㅇ', 'ㅈ', 'ㅉ', 'ㅊ', 'ㅋ',
    'ㅌ', 'ㅍ', 'ㅎ',
];

const JUNG: [char; 21] = [
    'ㅏ', 'ㅐ', 'ㅑ', 'ㅒ', 'ㅓ', 'ㅔ', 'ㅕ', 'ㅖ', 'ㅗ', 'ㅘ', 'ㅙ', 'ㅚ', 'ㅛ', 'ㅜ', 'ㅝ', 'ㅞ',
    'ㅟ', 'ㅠ', 'ㅡ', 'ㅢ', 'ㅣ',
];

// Index 0 means "no final consonant".
const JONG: [Option<char>; 28] = [
    None,
    Some('ㄱ'),
    Some('ㄲ'),
    Some('ㄳ'),
    Some('ㄴ'),
    Some('ㄵ'),
    Some('ㄶ'),
    Some('ㄷ'),
    Some('ㄹ'),
    Some('ㄺ'),
    Some('ㄻ'),
    Some('ㄼ'),
    Some('ㄽ'),
    Some('ㄾ'),
    Some('ㄿ'),
    Some('ㅀ'),
    Some('ㅁ'),
    Some('ㅂ'),
    Some('ㅄ'),
    Some('ㅅ'),
    Some('ㅆ'),
    Some('ㅇ'),
    Some('ㅈ'),
    Some('ㅊ'),
    Some('ㅋ'),
    Some('ㅌ'),
    Some('ㅍ'),
    Some('ㅎ'),
];

/// Text → phonetic form used for obfuscation-resistant matching
pub trait PhoneticDecomposer: Send + Sync {
    /// Decompose `text`; the result carries no syllable markers
    fn decompose(&self, text: &str) -> String;

    /// Decompose and drop whitespace and ASCII punctuation separators
    fn decompose_compact(&self, text: &str) -> String {
        self.decompose(text)
            .chars()
            .filter(|&c| !is_separator(c))
            .collect()
    }
}

/// Characters used to space out an obfuscated word (`바 보`, `바.보`)
pub fn is_separator(c: char) -> bool {
    c.is_whitespace() || c.is_ascii_punctuation()
}

/// Splits precomposed Hangul syllables into compatibility jamo.
///
/// Compound vowels and compound finals stay single jamo (`ㅘ`, `ㄳ`).
/// Everything outside the syllable block passes through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct HangulDecomposer;

impl HangulDecomposer {
    pub fn new() -> Self {
        Self
    }

    /// Split one syllable into (initial, medial, final)
    pub fn decompose_syllable(c: char) -> Option<(char, char, Option<char>)> {
        let code = c as u32;
        if !(HANGUL_BASE..=HANGUL_LAST).contains(&code) {
            return None;
        }

        let offset = code - HANGUL_BASE;
        let cho = offset / (JUNG_COUNT * JONG_COUNT);
        let jung = (offset % (JUNG_COUNT * JONG_COUNT)) / JONG_COUNT;
        let jong = offset % JONG_COUNT;

        Some((
            CHO[cho as usize],
            JUNG[jung as usize],
            JONG[jong as usize],
        ))
    }
}

impl PhoneticDecomposer for HangulDecomposer {
    fn decompose(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() * 3);
        for c in text.chars() {
            match Self::decompose_syllable(c) {
                Some((cho, jung, jong)) => {
                    out.push(cho);
                    out.push(jung);
                    if let Some(jong) = jong {
                        out.push(jong);
                    }
                }
                None => out.push(c),
            }
        }
        out
    }
}
