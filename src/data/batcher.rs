// ============================================================
// Layer 4 — Seq2Seq Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<SentencePair>
// into padded, time-major tensors for the recurrent network.
//
// How batching works here:
//
//   1. Sort pairs by descending source token count
//   2. Encode both sides: [SOS, ids.., EOS]
//   3. Record each sequence's true length (framing included)
//   4. Right-pad every sequence to the batch maximum with PAD
//   5. Transpose to [max_len, batch] — the recurrent layers
//      walk the leading (time) dimension step by step
//
// Example, sources "a b c" and "a b c d e":
//
//       col 0  col 1
//   t0   SOS    SOS
//   t1    a      a
//   t2    b      b
//   t3    c      c
//   t4    d     EOS
//   t5    e     PAD
//   t6   EOS    PAD        → shape [7, 2], lengths [7, 5]
//
// The target side is padded the same way but NOT re-sorted by
// its own length: only the encoder needs length-sorted input.
// Both target variants are produced, lengths for token-count
// normalisation and a boolean mask for per-step losses.
//
// Reference: Burn Book §4 (Batcher)

use std::sync::Arc;

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};

use crate::domain::{
    sentence_pair::SentencePair,
    sequence::encode,
    vocabulary::{Vocabulary, PAD_IDX},
};

// ─── EncodedBatch ─────────────────────────────────────────────────────────────
/// Host-side form of a batch: plain index rows, already padded
/// and transposed. Kept separate from the tensors so the padding
/// logic can be checked without a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedBatch {
    /// [max_src_len][batch], sorted by descending source length
    pub sources:        Vec<Vec<usize>>,
    pub source_lengths: Vec<usize>,
    /// [max_trg_len][batch], same column order as `sources`
    pub targets:        Vec<Vec<usize>>,
    pub target_lengths: Vec<usize>,
    /// [max_trg_len][batch], true where `targets` is not padding
    pub target_mask:    Vec<Vec<bool>>,
    pub max_target_len: usize,
}

/// Sort, encode, pad and transpose one group of pairs.
///
/// Panics on an empty group: a zero-size batch has no shape.
pub fn encode_batch(
    src_vocab: &Vocabulary,
    trg_vocab: &Vocabulary,
    mut pairs: Vec<SentencePair>,
) -> EncodedBatch {
    assert!(!pairs.is_empty(), "cannot build a batch from zero sentence pairs");

    // Stable sort keeps corpus order among equal lengths.
    pairs.sort_by(|a, b| b.source_len().cmp(&a.source_len()));

    let (src_seqs, trg_seqs): (Vec<Vec<usize>>, Vec<Vec<usize>>) = pairs
        .iter()
        .map(|p| (encode(src_vocab, &p.source), encode(trg_vocab, &p.target)))
        .unzip();

    let source_lengths: Vec<usize> = src_seqs.iter().map(Vec::len).collect();
    let target_lengths: Vec<usize> = trg_seqs.iter().map(Vec::len).collect();

    let sources = pad_sequences(&src_seqs, PAD_IDX);
    let targets = pad_sequences(&trg_seqs, PAD_IDX);
    let target_mask = padding_mask(&targets);
    let max_target_len = targets.len();

    EncodedBatch {
        sources,
        source_lengths,
        targets,
        target_lengths,
        target_mask,
        max_target_len,
    }
}

/// Right-pad `seqs` to the longest one and transpose, so row `t`
/// holds the t-th token of every sequence.
pub fn pad_sequences(seqs: &[Vec<usize>], fill: usize) -> Vec<Vec<usize>> {
    let max_len = seqs.iter().map(Vec::len).max().unwrap_or(0);
    (0..max_len)
        .map(|t| seqs.iter().map(|s| s.get(t).copied().unwrap_or(fill)).collect())
        .collect()
}

/// True wherever the padded, time-major `rows` hold a real token.
pub fn padding_mask(rows: &[Vec<usize>]) -> Vec<Vec<bool>> {
    rows.iter()
        .map(|row| row.iter().map(|&i| i != PAD_IDX).collect())
        .collect()
}

// ─── Seq2SeqBatch ─────────────────────────────────────────────────────────────
/// A batch ready for the encoder/decoder forward pass.
/// Sequence tensors are time-major: [max_len, batch_size].
#[derive(Debug, Clone)]
pub struct Seq2SeqBatch<B: Backend> {
    /// Source indices — shape [max_src_len, batch_size]
    pub sources: Tensor<B, 2, Int>,

    /// Unpadded source lengths — shape [batch_size], descending
    pub source_lengths: Tensor<B, 1, Int>,

    /// Target indices — shape [max_trg_len, batch_size]
    pub targets: Tensor<B, 2, Int>,

    /// Unpadded target lengths, SOS and EOS included. Kept on the
    /// host: loss normalisation needs only their sum.
    pub target_lengths: Vec<usize>,

    /// true = real token, false = padding — shape [max_trg_len, batch_size]
    pub target_mask: Tensor<B, 2, Bool>,

    pub max_target_len: usize,
}

// ─── BatchBuilder ─────────────────────────────────────────────────────────────
/// Holds the target device and immutable vocabulary snapshots,
/// so DataLoader workers can build batches independently.
#[derive(Clone, Debug)]
pub struct BatchBuilder<B: Backend> {
    pub device: B::Device,
    src_vocab:  Arc<Vocabulary>,
    trg_vocab:  Arc<Vocabulary>,
}

impl<B: Backend> BatchBuilder<B> {
    pub fn new(device: B::Device, src_vocab: Arc<Vocabulary>, trg_vocab: Arc<Vocabulary>) -> Self {
        Self { device, src_vocab, trg_vocab }
    }

    /// Build a batch. Panics on an empty list.
    pub fn build(&self, pairs: Vec<SentencePair>) -> Seq2SeqBatch<B> {
        let encoded = encode_batch(&self.src_vocab, &self.trg_vocab, pairs);
        self.to_tensors(&encoded)
    }

    /// Upload an encoded batch. Every tensor, the mask included,
    /// is created on this builder's device.
    pub fn to_tensors(&self, encoded: &EncodedBatch) -> Seq2SeqBatch<B> {
        let sources = self.index_matrix(&encoded.sources);
        let targets = self.index_matrix(&encoded.targets);

        let target_mask = self.bool_matrix(&encoded.target_mask);

        Seq2SeqBatch {
            sources,
            source_lengths: self.index_vector(&encoded.source_lengths),
            targets,
            target_lengths: encoded.target_lengths.clone(),
            target_mask,
            max_target_len: encoded.max_target_len,
        }
    }

    fn index_matrix(&self, rows: &[Vec<usize>]) -> Tensor<B, 2, Int> {
        let height = rows.len();
        let width  = rows.first().map(Vec::len).unwrap_or(0);
        let flat: Vec<i64> = rows
            .iter()
            .flat_map(|row| row.iter().map(|&i| i as i64))
            .collect();
        Tensor::from_data(TensorData::new(flat, [height, width]), &self.device)
    }

    fn bool_matrix(&self, rows: &[Vec<bool>]) -> Tensor<B, 2, Bool> {
        let height = rows.len();
        let width  = rows.first().map(Vec::len).unwrap_or(0);
        let flat: Vec<bool> = rows.iter().flatten().copied().collect();
        Tensor::from_data(TensorData::new(flat, [height, width]), &self.device)
    }

    fn index_vector(&self, values: &[usize]) -> Tensor<B, 1, Int> {
        let data: Vec<i64> = values.iter().map(|&v| v as i64).collect();
        Tensor::from_data(TensorData::new(data, [values.len()]), &self.device)
    }
}

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
// The DataLoader never hands out an empty item list.
impl<B: Backend> Batcher<SentencePair, Seq2SeqBatch<B>> for BatchBuilder<B> {
    fn batch(&self, items: Vec<SentencePair>) -> Seq2SeqBatch<B> {
        self.build(items)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn vocabs() -> (Vocabulary, Vocabulary) {
        let src = Vocabulary::from_sentences(["a b c d e", "i am cold"], "eng");
        let trg = Vocabulary::from_sentences(["x y", "mir ist sehr kalt"], "deu");
        (src, trg)
    }

    #[test]
    fn test_two_pairs_shape_and_padding() {
        let (src, trg) = vocabs();
        let pairs = vec![
            SentencePair::new("i am cold", "mir ist sehr kalt"),
            SentencePair::new("a b c d e", "x y"),
        ];
        let b = encode_batch(&src, &trg, pairs);

        assert_eq!(b.sources.len(), 7);
        assert_eq!(b.source_lengths.len(), 2);
        // Longer source moved to column 0
        assert_eq!(b.source_lengths, vec![7, 5]);
        assert_eq!(b.sources[1][0], src.index_of("a"));
        assert_eq!(b.sources[5][1], PAD_IDX);
        assert_eq!(b.sources[6][1], PAD_IDX);
        assert_eq!(b.sources[4][1], 2);
        // Targets follow the source order
        assert_eq!(b.target_lengths, vec![4, 6]);
        assert_eq!(b.max_target_len, 6);
    }

    #[test]
    fn test_rows_equal_width_and_mask_matches_lengths() {
        let (src, trg) = vocabs();
        let pairs = vec![
            SentencePair::new("a", "x"),
            SentencePair::new("a b c d e", "mir ist sehr kalt"),
            SentencePair::new("i am", "x y"),
        ];
        let b = encode_batch(&src, &trg, pairs);
        for row in b.sources.iter().chain(b.targets.iter()) {
            assert_eq!(row.len(), 3);
        }
        for (t, row) in b.target_mask.iter().enumerate() {
            for (i, &valid) in row.iter().enumerate() {
                assert_eq!(valid, t < b.target_lengths[i]);
            }
        }
    }

    #[test]
    fn test_single_pair_has_no_padding() {
        let (src, trg) = vocabs();
        let b = encode_batch(&src, &trg, vec![SentencePair::new("i am cold", "mir ist kalt")]);
        assert_eq!(b.sources.len(), 5);
        assert_eq!(b.source_lengths, vec![5]);
        assert!(b.sources.iter().all(|row| row[0] != PAD_IDX));
        assert!(b.target_mask.iter().all(|row| row[0]));
    }

    #[test]
    fn test_equal_lengths_keep_input_order() {
        let (src, trg) = vocabs();
        let pairs = vec![SentencePair::new("a b", "x"), SentencePair::new("c d", "y")];
        let b = encode_batch(&src, &trg, pairs);
        assert_eq!(b.sources[1], vec![src.index_of("a"), src.index_of("c")]);
    }

    #[test]
    #[should_panic]
    fn test_empty_batch_panics() {
        let (src, trg) = vocabs();
        encode_batch(&src, &trg, Vec::new());
    }

    #[test]
    fn test_pad_sequences_transposes() {
        let padded = pad_sequences(&[vec![1, 2, 3], vec![4]], 0);
        assert_eq!(padded, vec![vec![1, 4], vec![2, 0], vec![3, 0]]);
    }

    #[test]
    fn test_tensors_match_encoded_batch() {
        let (src, trg) = vocabs();
        let builder = BatchBuilder::<TestBackend>::new(Default::default(), Arc::new(src), Arc::new(trg));
        let pairs = vec![
            SentencePair::new("i am cold", "x y"),
            SentencePair::new("a b c d e", "mir ist sehr kalt"),
        ];
        let batch = builder.build(pairs);

        assert_eq!(batch.sources.dims(), [7, 2]);
        assert_eq!(batch.targets.dims(), [6, 2]);
        assert_eq!(batch.target_mask.dims(), [6, 2]);
        assert_eq!(batch.max_target_len, 6);

        let valid: i64 = batch.target_mask.clone().int().sum().into_scalar().elem();
        assert_eq!(valid as usize, batch.target_lengths.iter().sum::<usize>());
        assert_eq!(valid, 10);

        // Padding positions are exactly the masked-out ones.
        let pads: i64 = batch.targets.clone().equal_elem(PAD_IDX as i64).int().sum().into_scalar().elem();
        assert_eq!(pads, 12 - valid);
    }
}
