// ============================================================
// Layer 3 — Sequence Encoder
// ============================================================
// Converts a sentence into the index sequence the network
// consumes, and an index sequence back into words.
//
//   "i am happy"  →  [SOS, 4, 5, 6, EOS]  →  [1, 4, 5, 6, 2]
//
// Unknown words become UNK (index 3). Encoding never fails.

use crate::domain::vocabulary::{Vocabulary, EOS_IDX, PAD_IDX, SOS_IDX};

/// `[SOS] + index-or-UNK for each whitespace token + [EOS]`
pub fn encode(vocab: &Vocabulary, sentence: &str) -> Vec<usize> {
    let mut indices = Vec::with_capacity(sentence.len() / 4 + 2);
    indices.push(SOS_IDX);
    indices.extend(sentence.split_whitespace().map(|t| vocab.index_of(t)));
    indices.push(EOS_IDX);
    indices
}

/// Map indices back to tokens.
///
/// SOS and PAD are skipped, decoding stops at the first EOS,
/// and out-of-range indices come back as `<UNK>`.
pub fn decode(vocab: &Vocabulary, indices: &[usize]) -> Vec<String> {
    indices
        .iter()
        .copied()
        .take_while(|&i| i != EOS_IDX)
        .filter(|&i| i != SOS_IDX && i != PAD_IDX)
        .map(|i| vocab.token_of(i).to_string())
        .collect()
}

pub fn decode_to_sentence(vocab: &Vocabulary, indices: &[usize]) -> String {
    decode(vocab, indices).join(" ")
}

/// Number of whitespace tokens before SOS/EOS framing.
pub fn token_count(sentence: &str) -> usize {
    sentence.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vocabulary::{UNK_IDX, UNK_TOKEN};

    fn vocab() -> Vocabulary {
        Vocabulary::from_sentences(["i am happy", "i am sad"], "eng")
    }

    #[test]
    fn test_encode_frames_with_sos_eos() {
        assert_eq!(encode(&vocab(), "i am happy"), vec![1, 4, 5, 6, 2]);
    }

    #[test]
    fn test_encode_unknown_word() {
        assert_eq!(encode(&vocab(), "i am tired"), vec![1, 4, 5, UNK_IDX, 2]);
    }

    #[test]
    fn test_encode_empty_sentence() {
        assert_eq!(encode(&vocab(), ""), vec![SOS_IDX, EOS_IDX]);
    }

    #[test]
    fn test_roundtrip_known_words() {
        let v = vocab();
        for sentence in ["i am happy", "sad i am", "am  i   happy "] {
            let normalised = sentence.split_whitespace().collect::<Vec<_>>().join(" ");
            assert_eq!(decode_to_sentence(&v, &encode(&v, sentence)), normalised);
        }
    }

    #[test]
    fn test_decode_stops_at_eos_and_skips_padding() {
        let v = vocab();
        assert_eq!(decode(&v, &[1, 4, 0, 5, 2, 6, 7]), vec!["i", "am"]);
    }

    #[test]
    fn test_decode_out_of_range_is_unk() {
        assert_eq!(decode(&vocab(), &[4, 1000]), vec!["i", UNK_TOKEN]);
    }
}
