// ============================================================
// Layer 5 — Transformer Stance Classifier (Burn)
// ============================================================
// A BERT-style sentence-pair classifier:
//
//   token emb + position emb + segment emb
//       │
//       ▼
//   N × EncoderBlock (self-attention with padding mask, GELU FFN)
//       │
//       ▼
//   first position ([CLS]) → tanh pooler → linear head
//       │
//       ▼
//   logits [batch, num_labels]
//
// Weights are never trained here; the model is rebuilt from its
// config and filled from a saved record (see infra::model_store).
//
// Reference: Burn Book §3 (Building Blocks)
//            Devlin et al. (2019) BERT

use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation,
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct StanceModelConfig {
    pub vocab_size:   usize,
    pub max_position: usize,
    pub d_model:      usize,
    pub num_heads:    usize,
    pub num_layers:   usize,
    pub d_ff:         usize,
    pub num_labels:   usize,
    #[config(default = 2)]
    pub type_vocab_size: usize,
    #[config(default = 0.0)]
    pub dropout: f64,
}

impl StanceModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TransformerStanceModel<B> {
        let token_embedding    = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_position, self.d_model).init(device);
        let segment_embedding  = EmbeddingConfig::new(self.type_vocab_size, self.d_model).init(device);
        let embedding_norm     = LayerNormConfig::new(self.d_model).init(device);
        let layers: Vec<EncoderBlock<B>> = (0..self.num_layers)
            .map(|_| self.build_encoder_block(device))
            .collect();
        let pooler     = LinearConfig::new(self.d_model, self.d_model).init(device);
        let classifier = LinearConfig::new(self.d_model, self.num_labels).init(device);
        let dropout    = DropoutConfig::new(self.dropout).init();
        TransformerStanceModel {
            token_embedding, position_embedding, segment_embedding, embedding_norm,
            layers, pooler, classifier, dropout,
        }
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let self_attn   = MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
            .with_dropout(self.dropout)
            .init(device);
        let ffn_linear1 = LinearConfig::new(self.d_model, self.d_ff).init(device);
        let ffn_linear2 = LinearConfig::new(self.d_ff, self.d_model).init(device);
        let norm1   = LayerNormConfig::new(self.d_model).init(device);
        let norm2   = LayerNormConfig::new(self.d_model).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        EncoderBlock { self_attn, ffn_linear1, ffn_linear2, norm1, norm2, dropout }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    /// `mask_pad` is true at padding positions.
    pub fn forward(&self, x: Tensor<B, 3>, mask_pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attn_input  = MhaInput::self_attn(x.clone()).mask_pad(mask_pad);
        let attn_output = self.self_attn.forward(attn_input).context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self.ffn_linear2.forward(
            activation::gelu(self.ffn_linear1.forward(x.clone()))
        );
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

#[derive(Module, Debug)]
pub struct TransformerStanceModel<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub segment_embedding:  Embedding<B>,
    pub embedding_norm:     LayerNorm<B>,
    pub layers:             Vec<EncoderBlock<B>>,
    pub pooler:             Linear<B>,
    pub classifier:         Linear<B>,
    pub dropout:            Dropout,
}

impl<B: Backend> TransformerStanceModel<B> {
    /// All inputs are [batch, seq_len]; returns logits [batch, num_labels].
    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        segment_ids:    Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        let [batch_size, seq_len] = input_ids.dims();
        let device = input_ids.device();

        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);

        let embedded = self.token_embedding.forward(input_ids)
            + self.position_embedding.forward(positions)
            + self.segment_embedding.forward(segment_ids);
        let mut x = self.dropout.forward(self.embedding_norm.forward(embedded));

        let mask_pad = attention_mask.equal_elem(0);
        for layer in &self.layers {
            x = layer.forward(x, mask_pad.clone());
        }

        let [_, _, d_model] = x.dims();
        let first  = x.slice([0..batch_size, 0..1, 0..d_model]).reshape([batch_size, d_model]);
        let pooled = activation::tanh(self.pooler.forward(first));
        self.classifier.forward(self.dropout.forward(pooled))
    }
}
