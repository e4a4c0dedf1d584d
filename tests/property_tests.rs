use std::collections::BTreeMap;

use proptest::prelude::*;
use wordarith::{ArithmeticCoder, CodecConfig, Error, Frame, TextCodec, Tokenizer, Vocabulary};

const WORDS: [&str; 16] = [
    "hello", "how", "are", "you", "doing", "today", "the", "weather", "is", "nice", "can", "help",
    "me", "with", "this", "problem",
];
const PUNCT: [&str; 4] = [",", ".", "?", "!"];

fn corpus() -> Vec<String> {
    (0..64)
        .map(|i| {
            let words: Vec<&str> = (0..6).map(|j| WORDS[(i * 5 + j * 3) % WORDS.len()]).collect();
            format!("{}{}", words.join(" "), PUNCT[i % PUNCT.len()])
        })
        .collect()
}

fn sentence() -> impl Strategy<Value = String> {
    let word = prop_oneof![
        4 => prop::sample::select(WORDS.to_vec()).prop_map(str::to_owned),
        1 => "[a-zà-öø-ÿ]{1,12}",
    ];
    let punct = prop::option::of(prop::sample::select(PUNCT.to_vec()));
    prop::collection::vec((word, punct), 1..24).prop_map(|parts| {
        parts
            .into_iter()
            .map(|(word, punct)| format!("{word}{}", punct.unwrap_or("")))
            .collect::<Vec<_>>()
            .join(" ")
    })
}

proptest! {
    #[test]
    fn test_text_roundtrip(text in sentence()) {
        let codec = TextCodec::train(corpus(), CodecConfig::default()).unwrap();

        let compressed = codec.compress(&text).unwrap();
        prop_assert_eq!(&compressed, &codec.compress(&text).unwrap());

        let restored = codec.decompress(&compressed).unwrap();
        prop_assert_eq!(codec.tokenize(&restored), codec.tokenize(&text));
    }

    #[test]
    fn test_escaped_bytes_survive(tokens in prop::collection::vec("\\PC{0,40}", 1..16)) {
        let split = |text: &str| -> Vec<String> { text.split(' ').map(str::to_owned).collect() };
        let vocabulary = Vocabulary::train(corpus(), &split, &Default::default()).unwrap();
        let codec = TextCodec::with_tokenizer(vocabulary, split, CodecConfig::default()).unwrap();

        let fitting: Vec<&String> = tokens.iter().filter(|t| t.len() <= 255).collect();
        prop_assume!(!fitting.is_empty());
        let compressed = codec.compress_tokens(&fitting).unwrap();
        let restored = codec.decompress_tokens(&compressed).unwrap();
        prop_assert_eq!(restored.iter().collect::<Vec<_>>(), fitting);
    }

    #[test]
    fn test_tiling_of_trained_model(
        min_frequency in 1u64..4,
        max_size in 1usize..40,
    ) {
        let config = CodecConfig {
            vocab: wordarith::VocabConfig { min_frequency, max_size },
            ..Default::default()
        };
        let codec = TextCodec::train(corpus(), config).unwrap();
        let coder = codec.model().coder();

        let mut next = 0;
        for (symbol, low, high) in coder.intervals() {
            prop_assert_eq!(low, next);
            prop_assert!(high > low);
            prop_assert_eq!(high - low, codec.vocabulary().frequencies()[&symbol]);
            next = high;
        }
        prop_assert_eq!(next, codec.vocabulary().total_freq());
        prop_assert_eq!(coder.len(), codec.vocabulary().len() + 1);
    }

    #[test]
    fn test_garbage_never_panics(data in prop::collection::vec(any::<u8>(), 0..96)) {
        let codec = TextCodec::train(corpus(), CodecConfig::default()).unwrap();
        match codec.decompress(&data) {
            Ok(_) | Err(Error::MalformedPayload(_)) => {}
            Err(other) => prop_assert!(false, "unexpected error {other}"),
        }
    }
}

#[test]
fn test_word_tokenizer_matches_codec() {
    let codec = TextCodec::train(corpus(), CodecConfig::default()).unwrap();
    let text = "How are you? Help me, please!";
    assert_eq!(codec.tokenize(text), wordarith::WordTokenizer::new().tokenize(text));
}

#[test]
fn test_truncated_frame_payload() {
    let codec = TextCodec::train(corpus(), CodecConfig::default()).unwrap();
    let text = corpus().join(" ");
    let compressed = codec.compress(&text).unwrap();
    let frame = Frame::parse(&compressed).unwrap();

    // Keep the header's symbol count but hand the coder a fraction of its bits.
    let short = Frame {
        payload: &frame.payload[..frame.payload.len() / 4],
        ..frame.clone()
    }
    .to_bytes()
    .unwrap();
    assert!(matches!(
        codec.decompress(&short),
        Err(Error::MalformedPayload(_))
    ));
}

/// Slow in debug builds: run with `cargo test --release -- --ignored`.
#[test]
#[ignore]
fn test_symbol_count_limit() {
    let freqs: BTreeMap<u32, u64> = [(0, 1), (1, 3), (2, 2), (3, 9)].into_iter().collect();
    let coder = ArithmeticCoder::new(&freqs).unwrap();
    let max = wordarith::container::MAX_FIELD;
    let input: Vec<u32> = (0..max).map(|i| (i % 7 % 4) as u32).collect();

    let payload = coder.encode(&input).unwrap();
    let bytes = Frame {
        symbol_count: input.len(),
        payload: &payload,
        literals: Vec::new(),
    }
    .to_bytes()
    .unwrap();
    let frame = Frame::parse(&bytes).unwrap();
    assert_eq!(coder.decode(frame.payload, frame.symbol_count).unwrap(), input);

    let split = |text: &str| -> Vec<String> { text.split(' ').map(str::to_owned).collect() };
    let vocabulary = Vocabulary::train(["a a b"], &split, &Default::default()).unwrap();
    let codec = TextCodec::with_tokenizer(vocabulary, split, CodecConfig::default()).unwrap();
    let over = vec!["a"; max + 1];
    assert!(matches!(
        codec.compress_tokens(&over),
        Err(Error::InputTooLarge { .. })
    ));
}
