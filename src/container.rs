//! Binary framing of a compressed message.
//!
//! ```text
//! [count: 3B BE][enc_len: 3B BE][payload: enc_len bytes][(len: 1B, bytes: len)*]
//! ```
//!
//! `count` is the number of coded symbols, `payload` the arithmetic-coded
//! stream, and the trailing sidecar holds the raw UTF-8 of every escaped token
//! in coding order.

use crate::error::{Error, Result};

/// Size of the fixed header.
pub const HEADER_LEN: usize = 6;

/// Largest value a 3-byte length field holds.
pub const MAX_FIELD: usize = (1 << 24) - 1;

/// Longest escaped token the sidecar can carry.
pub const MAX_LITERAL_LEN: usize = u8::MAX as usize;

/// Fail with `Error::InputTooLarge` if `len` exceeds `max`.
pub(crate) fn ensure_fits(what: &'static str, len: usize, max: usize) -> Result<()> {
    if len > max {
        return Err(Error::InputTooLarge { what, len, max });
    }
    Ok(())
}

fn put_u24(out: &mut Vec<u8>, value: usize) {
    out.extend_from_slice(&(value as u32).to_be_bytes()[1..]);
}

fn get_u24(bytes: &[u8]) -> usize {
    (usize::from(bytes[0]) << 16) | (usize::from(bytes[1]) << 8) | usize::from(bytes[2])
}

/// A parsed or to-be-written container, borrowing its byte regions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Number of symbols coded in `payload`.
    pub symbol_count: usize,
    /// Arithmetic-coded symbol stream.
    pub payload: &'a [u8],
    /// Raw bytes of each escaped token, in order.
    pub literals: Vec<&'a [u8]>,
}

impl<'a> Frame<'a> {
    /// Serialize the frame.
    ///
    /// # Errors
    /// Returns `Error::InputTooLarge` if a field does not fit its width.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        ensure_fits("symbol count", self.symbol_count, MAX_FIELD)?;
        ensure_fits("payload length", self.payload.len(), MAX_FIELD)?;
        for literal in &self.literals {
            ensure_fits("escaped token length", literal.len(), MAX_LITERAL_LEN)?;
        }

        let sidecar: usize = self.literals.iter().map(|l| l.len() + 1).sum();
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len() + sidecar);
        put_u24(&mut out, self.symbol_count);
        put_u24(&mut out, self.payload.len());
        out.extend_from_slice(self.payload);
        for literal in &self.literals {
            out.push(literal.len() as u8);
            out.extend_from_slice(literal);
        }
        Ok(out)
    }

    /// Split `bytes` into header fields, payload and sidecar entries.
    ///
    /// # Errors
    /// Returns `Error::MalformedPayload` if the input is shorter than its
    /// header says or a sidecar entry is cut off.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::malformed(format!(
                "{} bytes is shorter than the {HEADER_LEN}-byte header",
                bytes.len()
            )));
        }
        let symbol_count = get_u24(&bytes[0..3]);
        let payload_len = get_u24(&bytes[3..6]);
        let body = &bytes[HEADER_LEN..];
        if payload_len > body.len() {
            return Err(Error::malformed(format!(
                "header declares {payload_len} payload bytes, {} present",
                body.len()
            )));
        }
        let (payload, mut sidecar) = body.split_at(payload_len);

        let mut literals = Vec::new();
        while let Some((&len, rest)) = sidecar.split_first() {
            let len = usize::from(len);
            if len > rest.len() {
                return Err(Error::malformed(format!(
                    "escaped token declares {len} bytes, {} remain",
                    rest.len()
                )));
            }
            let (literal, tail) = rest.split_at(len);
            literals.push(literal);
            sidecar = tail;
        }

        Ok(Self {
            symbol_count,
            payload,
            literals,
        })
    }
}
