use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wordarith::{CodecConfig, TextCodec};

const CORPUS: [&str; 8] = [
    "Hello, how are you doing today?",
    "I am doing well, thank you.",
    "How about you? Are you well?",
    "The weather is beautiful this morning.",
    "Can you help me with this problem?",
    "Sure, I can help you with that.",
    "Thank you, that is very kind of you.",
    "Hello! The morning is beautiful.",
];

fn main() -> wordarith::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wordarith=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = match std::env::var("ARITH_FLAME_CONFIG") {
        Ok(json) => CodecConfig::from_json(&json)?,
        Err(_) => CodecConfig::default(),
    };
    let codec = TextCodec::train(CORPUS, config)?;

    let mut compressed_bytes = 0usize;
    for _ in 0..10_000 {
        for text in CORPUS {
            let compressed = codec.compress(text)?;
            compressed_bytes += compressed.len();
            codec.decompress(&compressed)?;
        }
    }

    let original_bytes: usize = CORPUS.iter().map(|t| t.len()).sum::<usize>() * 10_000;
    info!(original_bytes, compressed_bytes, "profiling run finished");
    Ok(())
}
