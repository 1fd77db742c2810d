use burn::{
    nn::{
        gru::{Gru, GruConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        Linear, LinearConfig,
    },
    prelude::*,
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct Seq2SeqConfig {
    pub src_vocab_size: usize,
    pub trg_vocab_size: usize,
    #[config(default = 256)]
    pub embedding_dim:  usize,
    #[config(default = 256)]
    pub hidden_size:    usize,
    #[config(default = 2)]
    pub n_layers:       usize,
    #[config(default = 0.1)]
    pub dropout:        f64,
}

impl Seq2SeqConfig {
    pub fn init_encoder<B: Backend>(&self, device: &B::Device) -> Encoder<B> {
        let embedding = EmbeddingConfig::new(self.src_vocab_size, self.embedding_dim).init(device);
        Encoder {
            embedding,
            layers:      self.build_layers(device),
            dropout:     DropoutConfig::new(self.dropout).init(),
            hidden_size: self.hidden_size,
        }
    }

    pub fn init_decoder<B: Backend>(&self, device: &B::Device) -> Decoder<B> {
        let embedding = EmbeddingConfig::new(self.trg_vocab_size, self.embedding_dim).init(device);
        Decoder {
            embedding,
            layers:      self.build_layers(device),
            output:      LinearConfig::new(self.hidden_size, self.trg_vocab_size).init(device),
            dropout:     DropoutConfig::new(self.dropout).init(),
            hidden_size: self.hidden_size,
        }
    }

    fn build_layers<B: Backend>(&self, device: &B::Device) -> Vec<Gru<B>> {
        (0..self.n_layers.max(1))
            .map(|layer| {
                let d_input = if layer == 0 { self.embedding_dim } else { self.hidden_size };
                GruConfig::new(d_input, self.hidden_size, true).init(device)
            })
            .collect()
    }
}

// ─── Encoder ──────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    pub embedding:   Embedding<B>,
    pub layers:      Vec<Gru<B>>,
    pub dropout:     Dropout,
    pub hidden_size: usize,
}

impl<B: Backend> Encoder<B> {
    /// sources: [max_src_len, batch] (time-major), lengths: [batch]
    /// → final state of each layer, bottom first: n_layers × [batch, hidden]
    ///
    /// The layers are stepped one position at a time. A column's
    /// state stops changing once its own length is reached, so
    /// trailing padding never reaches the decoder.
    pub fn forward(&self, sources: Tensor<B, 2, Int>, lengths: Tensor<B, 1, Int>) -> Vec<Tensor<B, 2>> {
        let [max_len, batch_size] = sources.dims();
        let device = sources.device();

        // [batch, max_src_len, embedding_dim]
        let embedded = self.dropout.forward(self.embedding.forward(sources.swap_dims(0, 1)));
        let [_, _, embedding_dim] = embedded.dims();

        let n_layers   = self.layers.len();
        let mut hidden: Vec<Tensor<B, 2>> = (0..n_layers)
            .map(|_| Tensor::zeros([batch_size, self.hidden_size], &device))
            .collect();

        for t in 0..max_len {
            // 1.0 while t is inside the sentence, 0.0 on padding
            let live = lengths
                .clone()
                .greater_elem(t as i64)
                .float()
                .reshape([batch_size, 1]);
            let frozen = live.clone().neg().add_scalar(1.0);

            let mut x = embedded
                .clone()
                .slice([0..batch_size, t..t + 1, 0..embedding_dim]);

            for (i, gru) in self.layers.iter().enumerate() {
                let stepped = gru_step(gru, x, hidden[i].clone());
                let state   = stepped.clone() * live.clone() + hidden[i].clone() * frozen.clone();
                hidden[i]   = state;

                let out = stepped.reshape([batch_size, 1, self.hidden_size]);
                x = if i + 1 < n_layers { self.dropout.forward(out) } else { out };
            }
        }

        hidden
    }

    /// Height of the embedding table.
    pub fn vocab_size(&self) -> usize {
        self.embedding.weight.val().dims()[0]
    }

    /// Width of the embedding table.
    pub fn embedding_dim(&self) -> usize {
        self.embedding.weight.val().dims()[1]
    }

    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }
}

// ─── Decoder ──────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Decoder<B: Backend> {
    pub embedding:   Embedding<B>,
    pub layers:      Vec<Gru<B>>,
    pub output:      Linear<B>,
    pub dropout:     Dropout,
    pub hidden_size: usize,
}

impl<B: Backend> Decoder<B> {
    /// One decoding step.
    /// input: [batch] token ids, hidden: n_layers × [batch, hidden]
    /// → logits [batch, trg_vocab], next hidden
    pub fn step(&self, input: Tensor<B, 1, Int>, hidden: Vec<Tensor<B, 2>>) -> (Tensor<B, 2>, Vec<Tensor<B, 2>>) {
        let [batch_size] = input.dims();

        let mut x    = self.dropout.forward(self.embedding.forward(input.reshape([batch_size, 1])));
        let mut next = Vec::with_capacity(hidden.len());

        for (gru, state) in self.layers.iter().zip(hidden) {
            let state = gru_step(gru, x, state);
            next.push(state.clone());
            x = self.dropout.forward(state.reshape([batch_size, 1, self.hidden_size]));
        }

        let logits = self.output.forward(x.reshape([batch_size, self.hidden_size]));
        (logits, next)
    }

    pub fn vocab_size(&self) -> usize {
        self.embedding.weight.val().dims()[0]
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding.weight.val().dims()[1]
    }

    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }
}

/// Advance one GRU layer by a single position.
/// x: [batch, 1, input], state: [batch, hidden] → [batch, hidden]
fn gru_step<B: Backend>(gru: &Gru<B>, x: Tensor<B, 3>, state: Tensor<B, 2>) -> Tensor<B, 2> {
    let [batch_size, hidden_size] = state.dims();
    gru.forward(x, Some(state.reshape([batch_size, 1, hidden_size])))
        .reshape([batch_size, hidden_size])
}
