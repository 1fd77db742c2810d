// ============================================================
// Layer 4 — Text Preprocessor
// ============================================================
// Cleans raw corpus sentences before they reach a vocabulary.
//
// Cleaning steps (applied in order):
//   1. Replace Unicode whitespace variants with plain space
//   2. Lowercase
//   3. Expand English contractions ("i'm" → "i am"), or, when
//      expansion is off, split on the apostrophe ("i m")
//   4. Surround sentence punctuation . ! ? , with spaces so it
//      becomes its own token
//   5. Drop every other non-alphanumeric character
//   6. Collapse runs of spaces and trim
//
// Letters outside ASCII (ä, ö, ü, ß, é…) are alphanumeric and
// survive step 5, so German and French text is preserved.
//
// Also home to the pair-level length filter.
//
// Reference: Rust Book §8 (Strings in Rust)

use crate::domain::sentence_pair::SentencePair;

/// Whole-word contractions that suffix rules would get wrong.
const IRREGULAR: &[(&str, &str)] = &[
    ("can't", "can not"),
    ("won't", "will not"),
    ("shan't", "shall not"),
    ("ain't", "is not"),
    ("let's", "let us"),
];

/// Suffix rules, tried in order.
const SUFFIXES: &[(&str, &str)] = &[
    ("n't", " not"),
    ("'re", " are"),
    ("'ll", " will"),
    ("'ve", " have"),
    ("'m", " am"),
    ("'d", " would"),
];

/// Words whose "'s" means "is" rather than a possessive.
const IS_CONTRACTED: &[&str] = &[
    "he", "she", "it", "that", "what", "there", "here", "who", "where", "how",
];

#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    expand_contractions: bool,
}

impl Preprocessor {
    pub fn new(expand_contractions: bool) -> Self {
        Self { expand_contractions }
    }

    pub fn clean(&self, text: &str) -> String {

        // ── Step 1 + 2: Normalise characters and case ────────────────────────
        let step1: String = text
            .chars()
            .map(|c| match c {
                '\u{00A0}' | '\u{200B}' | '\u{FEFF}' | '\u{202F}' => ' ',
                '\u{2019}' | '\u{2018}' | '`' => '\'',
                c if c.is_whitespace() || c.is_control() => ' ',
                c => c,
            })
            .flat_map(char::to_lowercase)
            .collect();

        // ── Step 3: Contractions ──────────────────────────────────────────────
        let step2: Vec<String> = step1
            .split_whitespace()
            .map(|word| {
                if self.expand_contractions {
                    expand_word(word)
                } else {
                    word.replace('\'', " ")
                }
            })
            .collect();

        // ── Step 4 + 5: Punctuation ───────────────────────────────────────────
        let mut out = String::with_capacity(step1.len() + 8);
        for c in step2.join(" ").chars() {
            match c {
                '.' | '!' | '?' | ',' => {
                    out.push(' ');
                    out.push(c);
                    out.push(' ');
                }
                c if c.is_alphanumeric() || c == ' ' => out.push(c),
                _ => out.push(' '),
            }
        }

        // ── Step 6: Collapse whitespace ───────────────────────────────────────
        out.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    pub fn clean_pair(&self, pair: &SentencePair) -> SentencePair {
        SentencePair::new(self.clean(&pair.source), self.clean(&pair.target))
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Expand one lowercased word; trailing punctuation stays put.
fn expand_word(word: &str) -> String {
    let core = word.trim_end_matches(|c: char| !c.is_alphanumeric() && c != '\'');
    let tail = &word[core.len()..];

    if let Some((_, full)) = IRREGULAR.iter().find(|(short, _)| *short == core) {
        return format!("{full}{tail}");
    }
    for (suffix, full) in SUFFIXES {
        if let Some(stem) = core.strip_suffix(suffix) {
            if !stem.is_empty() {
                return format!("{stem}{full}{tail}");
            }
        }
    }
    if let Some(stem) = core.strip_suffix("'s") {
        if IS_CONTRACTED.contains(&stem) {
            return format!("{stem} is{tail}");
        }
    }
    word.replace('\'', " ")
}

// ─── Pair filtering ───────────────────────────────────────────────────────────

/// Keep pairs whose source has between `min_len` and `max_len`
/// tokens, both ends inclusive.
pub fn filter_pairs(pairs: Vec<SentencePair>, min_len: usize, max_len: usize) -> Vec<SentencePair> {
    let before = pairs.len();
    let kept: Vec<SentencePair> = pairs
        .into_iter()
        .filter(|p| (min_len..=max_len).contains(&p.source_len()))
        .collect();
    tracing::debug!("Length filter kept {} / {} pairs", kept.len(), before);
    kept
}
