//! Binary arithmetic coding over a static frequency table.
//!
//! The coder keeps a working interval `[low, high]` inside a 32-bit code
//! space. Each symbol narrows the interval in proportion to its share of the
//! table's total weight, and renormalization shifts settled leading bits out
//! of the interval so it never collapses:
//!
//! ```text
//! E1  high <  HALF                     emit 0, then pending 1s
//! E2  low  >= HALF                     emit 1, then pending 0s
//! E3  QUARTER <= low, high < 3*QUARTER defer one bit (pending += 1)
//! ```
//!
//! All scaling is integer floor division on `u64` registers, so encoder and
//! decoder make identical decisions bit for bit.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Identifier of one alphabet entry.
pub type Symbol = u32;

/// Width of the code space in bits.
pub const PRECISION: u32 = 32;

const FULL: u64 = (1 << PRECISION) - 1;

/// Midpoint of the code space.
pub const HALF: u64 = 1 << (PRECISION - 1);

/// First quarter point of the code space.
pub const QUARTER: u64 = 1 << (PRECISION - 2);

/// Third quarter point of the code space.
pub const THREE_QUARTERS: u64 = HALF + QUARTER;

/// Largest total weight a table may have.
///
/// After renormalization the interval is always wider than `QUARTER`, so a
/// total no larger than that leaves every symbol a non-empty sub-interval.
pub const MAX_TOTAL_FREQ: u64 = QUARTER;

/// One renormalization step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scale {
    /// E1: interval lies in the lower half.
    Lower,
    /// E2: interval lies in the upper half.
    Upper,
    /// E3: interval straddles the midpoint inside the middle half.
    Middle,
}

impl Scale {
    fn select(low: u64, high: u64) -> Option<Self> {
        if high < HALF {
            Some(Scale::Lower)
        } else if low >= HALF {
            Some(Scale::Upper)
        } else if low >= QUARTER && high < THREE_QUARTERS {
            Some(Scale::Middle)
        } else {
            None
        }
    }

    fn offset(self) -> u64 {
        match self {
            Scale::Lower => 0,
            Scale::Upper => HALF,
            Scale::Middle => QUARTER,
        }
    }
}

fn narrow(low: u64, high: u64, sym_low: u64, sym_high: u64, total: u64) -> (u64, u64) {
    let range = high - low + 1;
    let new_high = low + (range * sym_high) / total - 1;
    let new_low = low + (range * sym_low) / total;
    (new_low, new_high)
}

/// MSB-first bit sink, zero-padded to a byte boundary on finish.
struct BitWriter {
    bytes: Vec<u8>,
    current: u8,
    filled: u32,
}

impl BitWriter {
    fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes),
            current: 0,
            filled: 0,
        }
    }

    fn push(&mut self, bit: bool) {
        self.current = (self.current << 1) | bit as u8;
        self.filled += 1;
        if self.filled == 8 {
            self.bytes.push(self.current);
            self.current = 0;
            self.filled = 0;
        }
    }

    /// Emit `bit` followed by the deferred opposite bits.
    fn push_settled(&mut self, bit: bool, pending: &mut u64) {
        self.push(bit);
        for _ in 0..*pending {
            self.push(!bit);
        }
        *pending = 0;
    }

    fn finish(mut self) -> Vec<u8> {
        if self.filled > 0 {
            self.bytes.push(self.current << (8 - self.filled));
        }
        self.bytes
    }
}

/// MSB-first bit source that reads zeros past the end of its input.
///
/// The decoder looks `PRECISION` bits ahead of what it has resolved while the
/// encoder's flush only settles two bits, so a well-formed stream is read past
/// its end by fewer than `PRECISION` bits. Anything further means the input
/// was cut short.
struct BitReader<'a> {
    data: &'a [u8],
    pos: u64,
    limit: u64,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            limit: data.len() as u64 * 8 + u64::from(PRECISION),
        }
    }

    fn next_bit(&mut self) -> Result<u64> {
        if self.pos >= self.limit {
            return Err(Error::malformed(format!(
                "arithmetic payload exhausted after {} bytes",
                self.data.len()
            )));
        }
        let bit = match self.data.get((self.pos / 8) as usize) {
            Some(&byte) => (byte >> (7 - self.pos % 8)) & 1,
            None => 0,
        };
        self.pos += 1;
        Ok(u64::from(bit))
    }
}

/// Arithmetic coder for a fixed frequency table.
///
/// The cumulative table lays symbols out in ascending ID order; each symbol
/// owns the half-open interval `[start, start + weight)` and the intervals
/// tile `[0, total_freq)`. Zero-weight entries get no interval. The coder is
/// immutable once built, so one instance can serve any number of threads.
#[derive(Debug, Clone)]
pub struct ArithmeticCoder {
    /// Symbols with non-zero weight, ascending.
    symbols: Vec<Symbol>,
    /// Interval starts, with the total weight appended as a sentinel.
    starts: Vec<u64>,
}

impl ArithmeticCoder {
    /// Build a coder from a symbol -> weight table.
    ///
    /// # Errors
    /// Returns `Error::EmptyModel` if the table carries no weight, and
    /// `Error::FrequencyOverflow` if its total exceeds [`MAX_TOTAL_FREQ`].
    pub fn new(frequencies: &BTreeMap<Symbol, u64>) -> Result<Self> {
        let mut symbols = Vec::with_capacity(frequencies.len());
        let mut starts = Vec::with_capacity(frequencies.len() + 1);
        let mut cumulative = 0u64;

        for (&symbol, &freq) in frequencies {
            if freq == 0 {
                continue;
            }
            symbols.push(symbol);
            starts.push(cumulative);
            cumulative = cumulative.saturating_add(freq);
        }

        if cumulative == 0 {
            return Err(Error::EmptyModel);
        }
        if cumulative > MAX_TOTAL_FREQ {
            return Err(Error::FrequencyOverflow {
                total: cumulative,
                max: MAX_TOTAL_FREQ,
            });
        }
        starts.push(cumulative);

        Ok(Self { symbols, starts })
    }

    /// Sum of all weights.
    pub fn total_freq(&self) -> u64 {
        self.starts[self.symbols.len()]
    }

    /// Number of symbols with an interval.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Always false: construction rejects empty tables.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Cumulative interval `[low, high)` of `symbol`, if it has one.
    pub fn interval(&self, symbol: Symbol) -> Option<(u64, u64)> {
        let idx = self.symbols.binary_search(&symbol).ok()?;
        Some((self.starts[idx], self.starts[idx + 1]))
    }

    /// All `(symbol, low, high)` intervals in table order.
    pub fn intervals(&self) -> impl Iterator<Item = (Symbol, u64, u64)> + '_ {
        self.symbols
            .iter()
            .zip(self.starts.windows(2))
            .map(|(&symbol, bounds)| (symbol, bounds[0], bounds[1]))
    }

    /// Ideal cost of `symbols` under this table: `sum(-log2(p))` in bits.
    ///
    /// # Errors
    /// Returns `Error::UnknownSymbol` for a symbol without an interval.
    pub fn information_bits(&self, symbols: &[Symbol]) -> Result<f64> {
        let total = self.total_freq() as f64;
        symbols.iter().try_fold(0.0, |bits, &symbol| -> Result<f64> {
            let (low, high) = self.interval(symbol).ok_or(Error::UnknownSymbol(symbol))?;
            Ok(bits + (total / (high - low) as f64).log2())
        })
    }

    /// Encode a symbol sequence into a byte stream.
    ///
    /// # Errors
    /// Returns `Error::UnknownSymbol` if a symbol has no interval; nothing is
    /// emitted in that case.
    pub fn encode(&self, symbols: &[Symbol]) -> Result<Vec<u8>> {
        let total = self.total_freq();
        let mut low = 0u64;
        let mut high = FULL;
        let mut pending = 0u64;
        let mut out = BitWriter::with_capacity(symbols.len() + 1);

        for &symbol in symbols {
            let (sym_low, sym_high) = self.interval(symbol).ok_or(Error::UnknownSymbol(symbol))?;
            (low, high) = narrow(low, high, sym_low, sym_high, total);

            while let Some(scale) = Scale::select(low, high) {
                match scale {
                    Scale::Lower => out.push_settled(false, &mut pending),
                    Scale::Upper => out.push_settled(true, &mut pending),
                    Scale::Middle => pending += 1,
                }
                low = (low - scale.offset()) << 1;
                high = ((high - scale.offset()) << 1) | 1;
            }
        }

        // Two more bits pin a point inside the final interval.
        pending += 1;
        out.push_settled(low >= QUARTER, &mut pending);

        Ok(out.finish())
    }

    /// Decode exactly `num_symbols` symbols from `data`.
    ///
    /// # Errors
    /// Returns `Error::MalformedPayload` if `data` runs out before
    /// `num_symbols` symbols are resolved.
    pub fn decode(&self, data: &[u8], num_symbols: usize) -> Result<Vec<Symbol>> {
        // The count comes from an untrusted header; let the vector grow past this.
        let mut out = Vec::with_capacity(num_symbols.min(data.len() * 8 + PRECISION as usize));
        if num_symbols == 0 {
            return Ok(out);
        }

        let total = self.total_freq();
        let mut reader = BitReader::new(data);
        let mut value = 0u64;
        for _ in 0..PRECISION {
            value = (value << 1) | reader.next_bit()?;
        }
        let mut low = 0u64;
        let mut high = FULL;

        for _ in 0..num_symbols {
            if value < low || value > high {
                return Err(Error::malformed("code value left the working interval"));
            }
            let range = high - low + 1;
            let scaled = ((value - low + 1) * total - 1) / range;
            let idx = self
                .lookup(scaled)
                .ok_or_else(|| Error::malformed(format!("no symbol covers {scaled}")))?;
            out.push(self.symbols[idx]);

            (low, high) = narrow(low, high, self.starts[idx], self.starts[idx + 1], total);

            while let Some(scale) = Scale::select(low, high) {
                let offset = scale.offset();
                low = (low - offset) << 1;
                high = ((high - offset) << 1) | 1;
                value = ((value - offset) << 1) | reader.next_bit()?;
            }
        }

        Ok(out)
    }

    /// Index of the interval containing `scaled`.
    fn lookup(&self, scaled: u64) -> Option<usize> {
        if scaled >= self.total_freq() {
            return None;
        }
        // starts[0] == 0 <= scaled, so the partition point is at least 1.
        Some(self.starts.partition_point(|&start| start <= scaled) - 1)
    }
}
