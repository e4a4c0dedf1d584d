//! # Word-level Arithmetic Coding
//!
//! *Chat-sized messages compressed close to their entropy under a shared vocabulary.*
//!
//! ## Intuition First
//!
//! A general-purpose compressor has to learn the statistics of a message from
//! the message itself, which a twenty-word sentence is far too short for. If
//! sender and receiver already share a vocabulary trained on a large corpus,
//! each word can instead cost roughly `-log2(p(word))` bits: common words a
//! few bits, rare ones more, with no per-message model overhead.
//!
//! Arithmetic coding gets there by narrowing one interval per word. The
//! final interval identifies the whole message, and its width (the product
//! of all word probabilities) sets how many bits it takes to name a point
//! inside it.
//!
//! ## The Problem
//!
//! - **Prefix codes** (Huffman) round every word's cost up to whole bits.
//! - **Arithmetic coding** spends fractional bits per word, but must do its
//!   interval math exactly: encoder and decoder have to agree on every
//!   floor division and every renormalization decision.
//! - **Open vocabularies** never fit a fixed table, so some words must escape
//!   the model and travel verbatim.
//!
//! ## Layout
//!
//! ```text
//! corpus -> Vocabulary::train -> weights -> ArithmeticCoder
//!                                                 |
//! text -> Tokenizer -> symbols (+ escaped bytes) -> Frame -> bytes
//! ```
//!
//! - [`vocab`]: token <-> symbol table, symbol `0` reserved for escapes.
//! - [`arith`]: 32-bit integer arithmetic coder with E1/E2/E3 renormalization.
//! - [`container`]: `[count:3][len:3][payload][(len:1, utf8)*]` framing.
//! - [`codec`]: message-level compress/decompress and explicit refits.
//!
//! ## Failure Modes
//!
//! 1. **Model drift**: a payload only decodes under the exact vocabulary that
//!    produced it. Retraining reassigns every symbol.
//! 2. **Whitespace**: the default tokenizer drops it; decompressed text is
//!    rejoined by a spacing policy and matches the input at token level.
//!
//! ## References
//!
//! - Witten, I. H., Neal, R. M., Cleary, J. G. (1987). "Arithmetic Coding for Data Compression."
//! - Moffat, A., Neal, R. M., Witten, I. H. (1998). "Arithmetic Coding Revisited."

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arith;
pub mod codec;
pub mod config;
pub mod container;
pub mod error;
pub mod tokenize;
pub mod vocab;

pub use arith::{ArithmeticCoder, Symbol};
pub use codec::{MessageStats, Model, TextCodec};
pub use config::{CodecConfig, EscapePolicy, VocabConfig};
pub use container::Frame;
pub use error::{Error, Result};
pub use tokenize::{join_tokens, Tokenizer, WordTokenizer};
pub use vocab::{Vocabulary, VocabularySnapshot, ESCAPE, UNKNOWN_TOKEN};
