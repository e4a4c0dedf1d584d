#![no_main]
use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;
use wordarith::{CodecConfig, Error, TextCodec};

fn codec() -> &'static TextCodec {
    static CODEC: OnceLock<TextCodec> = OnceLock::new();
    CODEC.get_or_init(|| {
        let corpus = [
            "hello how are you doing today",
            "the weather is nice, thank you.",
            "can you help me with this problem?",
            "hello! you are very kind.",
        ];
        TextCodec::train(corpus, CodecConfig::default()).unwrap()
    })
}

fuzz_target!(|data: (String, Vec<u8>)| {
    let (text, garbage) = data;
    let codec = codec();

    // Arbitrary bytes decode or fail cleanly.
    match codec.decompress(&garbage) {
        Ok(_) | Err(Error::MalformedPayload(_)) => {}
        Err(other) => panic!("unexpected error: {other}"),
    }

    let compressed = match codec.compress(&text) {
        Ok(bytes) => bytes,
        Err(Error::InputTooLarge { .. }) => return,
        Err(other) => panic!("unexpected error: {other}"),
    };
    let restored = codec.decompress_tokens(&compressed).unwrap();
    assert_eq!(restored, codec.tokenize(&text));
});
