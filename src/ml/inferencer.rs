// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Greedy decoding with a trained encoder/decoder pair.
//
//   sentence ─clean→ tokens ─encode→ [SOS, w1 … wn, EOS]
//            ─encoder→ hidden
//            ─decoder, argmax, repeat→ y1 y2 … (until EOS / max_length)
//            ─decode→ target sentence
//
// EOS ends decoding and is never part of the output.

use anyhow::{bail, Result};
use burn::{prelude::*, tensor::TensorData};

use crate::data::preprocessor::Preprocessor;
use crate::domain::{
    sequence::{decode_to_sentence, encode},
    traits::Translate,
    vocabulary::{Vocabulary, EOS_IDX, SOS_IDX},
};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::{Decoder, Encoder, Seq2SeqConfig};

pub struct GreedyDecoder<B: Backend> {
    encoder: Encoder<B>,
    decoder: Decoder<B>,
    device:  B::Device,
}

impl<B: Backend> GreedyDecoder<B> {
    pub fn new(encoder: Encoder<B>, decoder: Decoder<B>, device: B::Device) -> Self {
        Self { encoder, decoder, device }
    }

    /// Decode one encoded source sentence. Returns at most
    /// `max_length` target indices, without EOS.
    pub fn decode(&self, source: &[usize], max_length: usize) -> Vec<usize> {
        if source.is_empty() || max_length == 0 {
            return Vec::new();
        }

        let len = source.len();
        let ids: Vec<i64> = source.iter().map(|&i| i as i64).collect();
        let sources = Tensor::<B, 2, Int>::from_data(TensorData::new(ids, [len, 1]), &self.device);
        let lengths = Tensor::<B, 1, Int>::from_data(TensorData::new(vec![len as i64], [1]), &self.device);

        let mut hidden = self.encoder.forward(sources, lengths);
        let mut input  = Tensor::<B, 1, Int>::from_data(TensorData::new(vec![SOS_IDX as i64], [1]), &self.device);
        let mut output = Vec::with_capacity(max_length);

        while output.len() < max_length {
            let (logits, next) = self.decoder.step(input, hidden);
            hidden = next;

            let token = logits.argmax(1).reshape([1]);
            let index = token.clone().into_scalar().elem::<i64>() as usize;
            if index == EOS_IDX {
                break;
            }
            output.push(index);
            input = token;
        }

        tracing::debug!("Greedy decode: {} source → {} target tokens", len, output.len());
        output
    }
}

/// Sentence-level translation: cleaning, vocabulary lookup and
/// greedy decoding.
pub struct Translator<B: Backend> {
    preprocessor: Preprocessor,
    src_vocab:    Vocabulary,
    trg_vocab:    Vocabulary,
    greedy:       GreedyDecoder<B>,
    max_length:   usize,
}

impl<B: Backend> Translator<B> {
    pub fn new(
        preprocessor: Preprocessor,
        src_vocab:    Vocabulary,
        trg_vocab:    Vocabulary,
        greedy:       GreedyDecoder<B>,
        max_length:   usize,
    ) -> Self {
        Self { preprocessor, src_vocab, trg_vocab, greedy, max_length }
    }

    /// Rebuild the newest checkpoint of a run for inference.
    /// `max_length` overrides the decode limit stored with the run.
    pub fn from_checkpoint(
        ckpt:       &CheckpointManager,
        device:     B::Device,
        max_length: Option<usize>,
    ) -> Result<Self> {
        let cfg       = ckpt.load_config()?;
        let iteration = ckpt.require_latest_iteration()?;
        let (src_vocab, trg_vocab) = ckpt.load_vocabularies(iteration, None)?;

        let model_cfg = Seq2SeqConfig::new(src_vocab.len(), trg_vocab.len())
            .with_embedding_dim(cfg.embedding_dim)
            .with_hidden_size(cfg.hidden_size)
            .with_n_layers(cfg.n_layers)
            .with_dropout(0.0);
        let (encoder, decoder) = ckpt.load_models(
            iteration,
            model_cfg.init_encoder::<B>(&device),
            model_cfg.init_decoder::<B>(&device),
            &device,
        )?;
        tracing::info!(
            "Model loaded from checkpoint {} ({} → {})",
            iteration, src_vocab.lang(), trg_vocab.lang(),
        );

        Ok(Self::new(
            Preprocessor::new(cfg.expand_contractions),
            src_vocab,
            trg_vocab,
            GreedyDecoder::new(encoder, decoder, device),
            max_length.unwrap_or(cfg.max_decode_len),
        ))
    }
}

impl<B: Backend> Translate for Translator<B> {
    fn translate(&self, sentence: &str) -> Result<String> {
        let cleaned = self.preprocessor.clean(sentence);
        if cleaned.is_empty() {
            bail!("Nothing to translate in {:?}", sentence);
        }

        // Unknown words become UNK inside encode.
        let source = encode(&self.src_vocab, &cleaned);
        let output = self.greedy.decode(&source, self.max_length);
        Ok(decode_to_sentence(&self.trg_vocab, &output))
    }
}
