//! Message-level compression.
//!
//! A [`TextCodec`] tokenizes a message, maps tokens to symbols of its
//! [`Model`], arithmetic-codes the symbol stream and frames the result with a
//! sidecar for escaped tokens. The model is shared behind an `Arc`; refitting
//! builds a whole new model and swaps it in, so a vocabulary and the coder
//! built from it never drift apart.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::arith::ArithmeticCoder;
use crate::config::{CodecConfig, EscapePolicy};
use crate::container::{ensure_fits, Frame, MAX_FIELD, MAX_LITERAL_LEN};
use crate::error::{Error, Result};
use crate::tokenize::{join_tokens, Tokenizer, WordTokenizer};
use crate::vocab::{Vocabulary, ESCAPE};

/// A vocabulary paired with the coder built from its weights.
#[derive(Debug, Clone)]
pub struct Model {
    vocabulary: Vocabulary,
    coder: ArithmeticCoder,
}

impl Model {
    /// Build the coder for `vocabulary`.
    pub fn new(vocabulary: Vocabulary) -> Result<Self> {
        let coder = ArithmeticCoder::new(vocabulary.frequencies())?;
        Ok(Self { vocabulary, coder })
    }

    /// The symbol table.
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// The coder over the vocabulary's weights.
    pub fn coder(&self) -> &ArithmeticCoder {
        &self.coder
    }
}

/// Compresses and decompresses messages against a shared model.
#[derive(Debug, Clone)]
pub struct TextCodec<T = WordTokenizer> {
    model: Arc<Model>,
    tokenizer: T,
    config: CodecConfig,
}

impl TextCodec<WordTokenizer> {
    /// Train a vocabulary over `corpus` with the default tokenizer.
    pub fn train<I, S>(corpus: I, config: CodecConfig) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokenizer = WordTokenizer::new();
        let vocabulary = Vocabulary::train(corpus, &tokenizer, &config.vocab)?;
        Self::with_tokenizer(vocabulary, tokenizer, config)
    }

    /// Use an existing vocabulary with the default tokenizer.
    pub fn from_vocabulary(vocabulary: Vocabulary, config: CodecConfig) -> Result<Self> {
        Self::with_tokenizer(vocabulary, WordTokenizer::new(), config)
    }
}

impl<T: Tokenizer> TextCodec<T> {
    /// Use an existing vocabulary with a custom tokenizer.
    pub fn with_tokenizer(vocabulary: Vocabulary, tokenizer: T, config: CodecConfig) -> Result<Self> {
        config.vocab.validate()?;
        Ok(Self {
            model: Arc::new(Model::new(vocabulary)?),
            tokenizer,
            config,
        })
    }

    /// Current model. Clones of the `Arc` stay valid across refits.
    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// Current vocabulary.
    pub fn vocabulary(&self) -> &Vocabulary {
        self.model.vocabulary()
    }

    /// Active configuration.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Tokenize `text` the way `compress` does.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.tokenizer.tokenize(text)
    }

    /// Compress a message.
    ///
    /// # Errors
    /// Returns `Error::InputTooLarge` if the message does not fit the
    /// container, and `Error::UnknownToken` for an out-of-vocabulary token
    /// under [`EscapePolicy::Reject`].
    pub fn compress(&self, text: &str) -> Result<Vec<u8>> {
        let tokens = self.tokenizer.tokenize(text);
        self.compress_tokens(&tokens)
    }

    /// Compress an already tokenized message.
    pub fn compress_tokens<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Vec<u8>> {
        self.encode_with(&self.model, tokens)
    }

    fn encode_with<S: AsRef<str>>(&self, model: &Model, tokens: &[S]) -> Result<Vec<u8>> {
        ensure_fits("symbol count", tokens.len(), MAX_FIELD)?;

        let vocabulary = model.vocabulary();
        let mut symbols = Vec::with_capacity(tokens.len());
        let mut literals = Vec::new();
        for token in tokens {
            let token = token.as_ref();
            let symbol = vocabulary.symbol_for(token);
            if symbol == ESCAPE {
                if self.config.escape == EscapePolicy::Reject {
                    return Err(Error::UnknownToken(token.to_owned()));
                }
                ensure_fits("escaped token length", token.len(), MAX_LITERAL_LEN)?;
                literals.push(token.as_bytes());
            }
            symbols.push(symbol);
        }

        let escaped = literals.len();
        let payload = model.coder().encode(&symbols)?;
        let frame = Frame {
            symbol_count: symbols.len(),
            payload: &payload,
            literals,
        };
        let bytes = frame.to_bytes()?;
        debug!(
            symbols = symbols.len(),
            escaped,
            payload = payload.len(),
            total = bytes.len(),
            "compressed message"
        );
        Ok(bytes)
    }

    /// Decompress a message and rejoin its tokens.
    ///
    /// # Errors
    /// Returns `Error::MalformedPayload` if `bytes` is not a consistent
    /// container for this model.
    pub fn decompress(&self, bytes: &[u8]) -> Result<String> {
        let tokens = self.decompress_tokens(bytes)?;
        Ok(join_tokens(&tokens))
    }

    /// Decompress a message into its token sequence.
    pub fn decompress_tokens(&self, bytes: &[u8]) -> Result<Vec<String>> {
        let frame = Frame::parse(bytes)?;
        let symbols = self
            .model
            .coder()
            .decode(frame.payload, frame.symbol_count)?;

        let vocabulary = self.model.vocabulary();
        let mut literals = frame.literals.into_iter();
        let mut tokens = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            if symbol != ESCAPE {
                tokens.push(vocabulary.token_for(symbol).to_owned());
                continue;
            }
            let raw = literals
                .next()
                .ok_or_else(|| Error::malformed("escape symbol without a sidecar entry"))?;
            let token = std::str::from_utf8(raw)
                .map_err(|e| Error::malformed(format!("escaped token is not UTF-8: {e}")))?;
            tokens.push(token.to_owned());
        }

        let unused = literals.len();
        if unused > 0 {
            return Err(Error::malformed(format!("{unused} unused sidecar entries")));
        }
        debug!(tokens = tokens.len(), bytes = bytes.len(), "decompressed message");
        Ok(tokens)
    }

    /// Retrain the vocabulary with `texts` and swap in a fresh model.
    ///
    /// Payloads produced before the refit only decode with the previous
    /// model; keep a clone of [`TextCodec::model`] to read them.
    pub fn refit<I, S>(&mut self, texts: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let model = self.refitted(texts)?;
        self.swap(model);
        Ok(())
    }

    /// Compress `text`, refitting first if it has out-of-vocabulary tokens.
    ///
    /// Returns the compressed bytes and whether the model was replaced. The
    /// refitted model is only kept if it gives every token of `text` its own
    /// symbol and the message then compresses; otherwise the current model
    /// stays and codes the message as [`TextCodec::compress`] would.
    pub fn compress_refit(&mut self, text: &str) -> Result<(Vec<u8>, bool)> {
        let tokens = self.tokenizer.tokenize(text);
        ensure_fits("symbol count", tokens.len(), MAX_FIELD)?;
        if covers(self.vocabulary(), &tokens) {
            return Ok((self.compress_tokens(&tokens)?, false));
        }

        let model = self.refitted([text])?;
        if !covers(model.vocabulary(), &tokens) {
            debug!("refit cannot hold every token, keeping current model");
            return Ok((self.compress_tokens(&tokens)?, false));
        }
        let bytes = self.encode_with(&model, &tokens)?;
        self.swap(model);
        Ok((bytes, true))
    }

    /// Token coverage and ideal cost of `text` under the current model.
    ///
    /// Escaped tokens are charged their escape symbol plus 8 bits per raw
    /// byte. Nothing is logged or printed.
    pub fn analyze(&self, text: &str) -> Result<MessageStats> {
        let tokens = self.tokenizer.tokenize(text);
        let vocabulary = self.vocabulary();
        let symbols: Vec<_> = tokens.iter().map(|t| vocabulary.symbol_for(t)).collect();
        let mut unknown_tokens = 0;
        let mut escaped_bytes = 0;
        for (token, &symbol) in tokens.iter().zip(&symbols) {
            if symbol == ESCAPE {
                unknown_tokens += 1;
                escaped_bytes += token.len();
            }
        }

        Ok(MessageStats {
            original_bytes: text.len(),
            compressed_bytes: self.compress_tokens(&tokens)?.len(),
            token_count: tokens.len(),
            known_tokens: tokens.len() - unknown_tokens,
            unknown_tokens,
            theoretical_bits: self.model.coder().information_bits(&symbols)?
                + (escaped_bytes * 8) as f64,
        })
    }

    fn refitted<I, S>(&self, texts: I) -> Result<Model>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let vocabulary = self
            .vocabulary()
            .refit(texts, &self.tokenizer, &self.config.vocab)?;
        Model::new(vocabulary)
    }

    fn swap(&mut self, model: Model) {
        info!(
            vocab_size = model.vocabulary().len(),
            entropy = model.vocabulary().entropy(),
            "swapped in refitted model"
        );
        self.model = Arc::new(model);
    }
}

fn covers(vocabulary: &Vocabulary, tokens: &[String]) -> bool {
    tokens.iter().all(|token| vocabulary.contains(token))
}

/// Coverage and size figures for one message, see [`TextCodec::analyze`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageStats {
    /// UTF-8 length of the input text.
    pub original_bytes: usize,
    /// Length of the compressed container.
    pub compressed_bytes: usize,
    /// Tokens produced by the tokenizer.
    pub token_count: usize,
    /// Tokens with their own symbol.
    pub known_tokens: usize,
    /// Tokens that travel in the sidecar.
    pub unknown_tokens: usize,
    /// `sum(-log2(p))` over all symbols plus 8 bits per escaped byte.
    pub theoretical_bits: f64,
}

impl MessageStats {
    /// Percentage of tokens with their own symbol, 0 for an empty message.
    pub fn coverage(&self) -> f64 {
        if self.token_count == 0 {
            return 0.0;
        }
        self.known_tokens as f64 / self.token_count as f64 * 100.0
    }

    /// `original_bytes / compressed_bytes`.
    pub fn compression_ratio(&self) -> f64 {
        self.original_bytes as f64 / self.compressed_bytes as f64
    }
}
