//! Corpus-trained vocabulary: token <-> symbol mapping and symbol weights.
//!
//! Symbol `0` is reserved for the escape symbol, which stands for any token
//! outside the vocabulary. Kept tokens get dense IDs `1..=N` in descending
//! corpus frequency. The escape symbol's weight is a damped share of the
//! excluded tokens' mass, so unknown words stay codable without crowding out
//! the real vocabulary.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::arith::{Symbol, MAX_TOTAL_FREQ};
use crate::config::VocabConfig;
use crate::error::{Error, Result};
use crate::tokenize::Tokenizer;

/// The escape symbol.
pub const ESCAPE: Symbol = 0;

/// Display form of the escape symbol.
pub const UNKNOWN_TOKEN: &str = "<UNK>";

/// Excluded mass is divided by this before it becomes the escape weight.
const ESCAPE_DAMPING: u64 = 10;

/// Token occurrence counts, remembering first-seen order for tie breaks.
#[derive(Debug, Default)]
struct TokenCounts {
    entries: HashMap<String, (u64, usize)>,
    total: u64,
}

impl TokenCounts {
    fn add(&mut self, token: String, count: u64) {
        let next = self.entries.len();
        self.entries.entry(token).or_insert((0, next)).0 += count;
        self.total += count;
    }

    /// Tokens by descending count, earlier first sighting winning ties.
    fn ranked(self) -> Vec<(String, u64)> {
        let mut ranked: Vec<_> = self.entries.into_iter().collect();
        ranked.sort_unstable_by(|(_, (ca, fa)), (_, (cb, fb))| cb.cmp(ca).then(fa.cmp(fb)));
        ranked
            .into_iter()
            .map(|(token, (count, _))| (token, count))
            .collect()
    }
}

/// A trained symbol table.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    token_to_id: HashMap<String, Symbol>,
    /// Indexed by symbol; slot 0 holds [`UNKNOWN_TOKEN`].
    id_to_token: Vec<String>,
    frequencies: BTreeMap<Symbol, u64>,
    entropy: f64,
}

impl Vocabulary {
    /// Train a vocabulary over `corpus`.
    ///
    /// # Errors
    /// Returns `Error::InvalidCorpus` if the corpus yields no tokens, and
    /// `Error::InvalidConfig` for unusable parameters.
    pub fn train<I, S, T>(corpus: I, tokenizer: &T, config: &VocabConfig) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        T: Tokenizer + ?Sized,
    {
        config.validate()?;
        let mut counts = TokenCounts::default();
        for text in corpus {
            for token in tokenizer.tokenize(text.as_ref()) {
                counts.add(token, 1);
            }
        }
        Self::from_counts(counts, config)
    }

    /// Retrain over this vocabulary's weighted tokens plus `texts`.
    ///
    /// Every previous token re-enters the counts with its stored weight, and
    /// the threshold drops to one occurrence so the new tokens become codable.
    /// IDs are reassigned; anything built from `self` must be rebuilt.
    pub fn refit<I, S, T>(&self, texts: I, tokenizer: &T, config: &VocabConfig) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        T: Tokenizer + ?Sized,
    {
        config.validate()?;
        let mut counts = TokenCounts::default();
        for (id, token) in self.id_to_token.iter().enumerate().skip(1) {
            let weight = self.frequencies.get(&(id as Symbol)).copied().unwrap_or(1);
            counts.add(token.clone(), weight);
        }
        let prior = counts.total;
        for text in texts {
            for token in tokenizer.tokenize(text.as_ref()) {
                counts.add(token, 1);
            }
        }
        debug!(prior, added = counts.total - prior, "refitting vocabulary");

        let refit_config = VocabConfig {
            min_frequency: 1,
            ..*config
        };
        Self::from_counts(counts, &refit_config)
    }

    fn from_counts(counts: TokenCounts, config: &VocabConfig) -> Result<Self> {
        let total_tokens = counts.total;
        if total_tokens == 0 {
            return Err(Error::InvalidCorpus);
        }

        let capacity = config.max_size - 1;
        let mut kept = Vec::new();
        let mut excluded = 0u64;
        for (token, count) in counts.ranked() {
            if count >= config.min_frequency && kept.len() < capacity {
                kept.push((token, count));
            } else {
                excluded += count;
            }
        }

        let mut token_to_id = HashMap::with_capacity(kept.len());
        let mut id_to_token = Vec::with_capacity(kept.len() + 1);
        let mut frequencies = BTreeMap::new();
        id_to_token.push(UNKNOWN_TOKEN.to_owned());
        frequencies.insert(ESCAPE, (excluded / ESCAPE_DAMPING).max(1));

        for (idx, (token, count)) in kept.into_iter().enumerate() {
            let id = Symbol::try_from(idx + 1)
                .map_err(|_| Error::InvalidConfig("vocabulary exceeds symbol range".into()))?;
            token_to_id.insert(token.clone(), id);
            id_to_token.push(token);
            frequencies.insert(id, count);
        }

        fit_precision(&mut frequencies);
        let entropy = entropy_bits(&frequencies);
        let coverage = (total_tokens - excluded) as f64 / total_tokens as f64 * 100.0;
        info!(
            vocab_size = token_to_id.len(),
            entropy,
            coverage,
            "trained vocabulary"
        );

        Ok(Self {
            token_to_id,
            id_to_token,
            frequencies,
            entropy,
        })
    }

    /// Symbol for `token`, or [`ESCAPE`] if it is not in the vocabulary.
    pub fn symbol_for(&self, token: &str) -> Symbol {
        self.token_to_id.get(token).copied().unwrap_or(ESCAPE)
    }

    /// Token for `id`, or [`UNKNOWN_TOKEN`] for the escape symbol and unmapped IDs.
    pub fn token_for(&self, id: Symbol) -> &str {
        self.id_to_token
            .get(id as usize)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_TOKEN)
    }

    /// Whether `token` has its own symbol.
    pub fn contains(&self, token: &str) -> bool {
        self.token_to_id.contains_key(token)
    }

    /// Number of vocabulary tokens, escape excluded.
    pub fn len(&self) -> usize {
        self.token_to_id.len()
    }

    /// True if only the escape symbol exists.
    pub fn is_empty(&self) -> bool {
        self.token_to_id.is_empty()
    }

    /// Symbol weights, escape included.
    pub fn frequencies(&self) -> &BTreeMap<Symbol, u64> {
        &self.frequencies
    }

    /// Sum of all symbol weights.
    pub fn total_freq(&self) -> u64 {
        self.frequencies.values().sum()
    }

    /// Shannon entropy of the symbol weights, in bits per symbol.
    pub fn entropy(&self) -> f64 {
        self.entropy
    }

    /// Capture the mapping, weights and entropy for persistence.
    pub fn snapshot(&self) -> VocabularySnapshot {
        VocabularySnapshot {
            token_to_id: self
                .token_to_id
                .iter()
                .map(|(token, &id)| (token.clone(), id))
                .collect(),
            frequencies: self.frequencies.clone(),
            entropy: self.entropy,
        }
    }

    /// Rebuild a vocabulary from a snapshot.
    ///
    /// # Errors
    /// Returns `Error::InvalidSnapshot` unless IDs are exactly `1..=N`, every
    /// symbol (escape included) has a positive weight, and no other weights
    /// are present.
    pub fn restore(snapshot: VocabularySnapshot) -> Result<Self> {
        let VocabularySnapshot {
            token_to_id,
            frequencies,
            entropy,
        } = snapshot;

        let n = token_to_id.len();
        let mut slots: Vec<Option<String>> = vec![None; n + 1];
        for (token, &id) in &token_to_id {
            let slot = slots
                .get_mut(id as usize)
                .filter(|_| id != ESCAPE)
                .ok_or_else(|| Error::InvalidSnapshot(format!("token {token:?} has id {id}")))?;
            if slot.replace(token.clone()).is_some() {
                return Err(Error::InvalidSnapshot(format!("id {id} assigned twice")));
            }
        }

        if frequencies.len() != n + 1 {
            return Err(Error::InvalidSnapshot(format!(
                "{} weights for {} symbols",
                frequencies.len(),
                n + 1
            )));
        }
        for id in 0..=n {
            match frequencies.get(&(id as Symbol)) {
                Some(&w) if w > 0 => {}
                _ => {
                    return Err(Error::InvalidSnapshot(format!(
                        "symbol {id} has no positive weight"
                    )))
                }
            }
        }

        let mut id_to_token = Vec::with_capacity(n + 1);
        id_to_token.push(UNKNOWN_TOKEN.to_owned());
        // Every slot above 0 was filled: n distinct ids in 1..=n.
        id_to_token.extend(slots.into_iter().skip(1).flatten());

        Ok(Self {
            token_to_id: token_to_id.into_iter().collect(),
            id_to_token,
            frequencies,
            entropy,
        })
    }
}

/// Halve weights until their total fits the coder's precision.
fn fit_precision(frequencies: &mut BTreeMap<Symbol, u64>) {
    let mut total: u64 = frequencies.values().sum();
    if total <= MAX_TOTAL_FREQ {
        return;
    }
    warn!(total, max = MAX_TOTAL_FREQ, "rescaling symbol weights");
    while total > MAX_TOTAL_FREQ && total > frequencies.len() as u64 {
        total = 0;
        for weight in frequencies.values_mut() {
            *weight = (*weight + 1) / 2;
            total += *weight;
        }
    }
}

fn entropy_bits(frequencies: &BTreeMap<Symbol, u64>) -> f64 {
    let total: u64 = frequencies.values().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    frequencies
        .values()
        .filter(|&&f| f > 0)
        .map(|&f| {
            let p = f as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Serializable form of a [`Vocabulary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularySnapshot {
    /// Token -> symbol, escape excluded.
    pub token_to_id: BTreeMap<String, Symbol>,
    /// Symbol -> weight, escape included.
    pub frequencies: BTreeMap<Symbol, u64>,
    /// Entropy at training time.
    #[serde(default)]
    pub entropy: f64,
}

impl VocabularySnapshot {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenize::WordTokenizer;

    const CORPUS: [&str; 3] = ["the cat sat", "the cat ran", "the dog"];

    fn trained() -> Vocabulary {
        Vocabulary::train(CORPUS, &WordTokenizer::new(), &VocabConfig::default()).unwrap()
    }

    #[test]
    fn test_train_assigns_ids_by_frequency() {
        let vocab = trained();
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.symbol_for("the"), 1);
        assert_eq!(vocab.symbol_for("cat"), 2);
        assert_eq!(vocab.symbol_for("dog"), ESCAPE);
        // sat + ran + dog = 3 excluded occurrences, damped to the floor of 1.
        let expected: BTreeMap<Symbol, u64> = [(0, 1), (1, 3), (2, 2)].into_iter().collect();
        assert_eq!(vocab.frequencies(), &expected);
        assert_eq!(vocab.total_freq(), 6);
        assert!((vocab.entropy() - 1.459_148).abs() < 1e-5);
    }

    #[test]
    fn test_ties_follow_first_occurrence() {
        let config = VocabConfig {
            min_frequency: 1,
            max_size: 16,
        };
        let vocab = Vocabulary::train(["b a c", "c a b"], &WordTokenizer::new(), &config).unwrap();
        assert_eq!(vocab.symbol_for("b"), 1);
        assert_eq!(vocab.symbol_for("a"), 2);
        assert_eq!(vocab.symbol_for("c"), 3);
    }

    #[test]
    fn test_max_size_reserves_escape_slot() {
        let corpus: Vec<String> = (0..40).map(|i| format!("w{} w{} common", i % 20, i % 5)).collect();
        let config = VocabConfig {
            min_frequency: 1,
            max_size: 4,
        };
        let vocab = Vocabulary::train(&corpus, &WordTokenizer::new(), &config).unwrap();
        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab.frequencies().len(), 4);
        assert_eq!(vocab.symbol_for("common"), 1);
        // Excluded mass: 120 occurrences minus the three kept tokens.
        let kept: u64 = (1..=3).map(|id| vocab.frequencies()[&id]).sum();
        assert_eq!(vocab.frequencies()[&ESCAPE], (120 - kept) / 10);
    }

    #[test]
    fn test_empty_corpus_rejected() {
        let tok = WordTokenizer::new();
        let config = VocabConfig::default();
        assert!(matches!(
            Vocabulary::train(Vec::<String>::new(), &tok, &config),
            Err(Error::InvalidCorpus)
        ));
        assert!(matches!(
            Vocabulary::train(["  ", "\n"], &tok, &config),
            Err(Error::InvalidCorpus)
        ));
    }

    #[test]
    fn test_all_tokens_below_threshold() {
        let vocab = Vocabulary::train(["one two three"], &WordTokenizer::new(), &VocabConfig::default())
            .unwrap();
        assert!(vocab.is_empty());
        assert_eq!(vocab.frequencies().len(), 1);
        assert_eq!(vocab.frequencies()[&ESCAPE], 1);
        assert_eq!(vocab.entropy(), 0.0);
    }

    #[test]
    fn test_lookups_are_total() {
        let vocab = trained();
        assert_eq!(vocab.token_for(0), UNKNOWN_TOKEN);
        assert_eq!(vocab.token_for(1), "the");
        assert_eq!(vocab.token_for(999), UNKNOWN_TOKEN);
        assert_eq!(vocab.symbol_for(""), ESCAPE);
        assert!(vocab.contains("cat"));
        assert!(!vocab.contains("<UNK>"));
    }

    #[test]
    fn test_snapshot_json_restore() {
        let vocab = trained();
        let json = vocab.snapshot().to_json().unwrap();
        let restored = Vocabulary::restore(VocabularySnapshot::from_json(&json).unwrap()).unwrap();

        assert_eq!(restored.frequencies(), vocab.frequencies());
        assert!((restored.entropy() - vocab.entropy()).abs() < 1e-12);
        for id in 0..=2 {
            assert_eq!(restored.token_for(id), vocab.token_for(id));
            assert_eq!(restored.symbol_for(vocab.token_for(id)), vocab.symbol_for(vocab.token_for(id)));
        }
        assert_eq!(restored.snapshot().token_to_id, vocab.snapshot().token_to_id);
    }

    #[test]
    fn test_restore_rejects_inconsistent_snapshots() {
        let good = trained().snapshot();

        let mut gap = good.clone();
        gap.token_to_id.insert("cat".into(), 5);
        assert!(matches!(Vocabulary::restore(gap), Err(Error::InvalidSnapshot(_))));

        let mut dup = good.clone();
        dup.token_to_id.insert("cat".into(), 1);
        assert!(matches!(Vocabulary::restore(dup), Err(Error::InvalidSnapshot(_))));

        let mut on_escape = good.clone();
        on_escape.token_to_id.insert("cat".into(), ESCAPE);
        assert!(matches!(Vocabulary::restore(on_escape), Err(Error::InvalidSnapshot(_))));

        let mut no_escape = good.clone();
        no_escape.frequencies.remove(&ESCAPE);
        assert!(matches!(Vocabulary::restore(no_escape), Err(Error::InvalidSnapshot(_))));

        let mut zero = good;
        zero.frequencies.insert(2, 0);
        assert!(matches!(Vocabulary::restore(zero), Err(Error::InvalidSnapshot(_))));
    }

    #[test]
    fn test_refit_learns_new_tokens() {
        let vocab = trained();
        let refit = vocab
            .refit(["the zebra"], &WordTokenizer::new(), &VocabConfig::default())
            .unwrap();
        assert_eq!(refit.symbol_for("the"), 1);
        assert_eq!(refit.frequencies()[&1], 4);
        assert_eq!(refit.symbol_for("cat"), 2);
        assert_eq!(refit.symbol_for("zebra"), 3);
        // Unchanged original.
        assert_eq!(vocab.symbol_for("zebra"), ESCAPE);
    }

    #[test]
    fn test_huge_counts_are_rescaled() {
        let mut counts = TokenCounts::default();
        counts.add("a".into(), 3 * MAX_TOTAL_FREQ);
        counts.add("b".into(), 5);
        counts.add("c".into(), 1);
        let config = VocabConfig {
            min_frequency: 2,
            max_size: 8,
        };
        let vocab = Vocabulary::from_counts(counts, &config).unwrap();
        assert!(vocab.total_freq() <= MAX_TOTAL_FREQ);
        assert!(vocab.frequencies().values().all(|&w| w >= 1));
        assert!(vocab.frequencies()[&1] > vocab.frequencies()[&2]);
    }
}
