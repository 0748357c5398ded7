//! Properties every encoding must have, checked against arbitrary text.
use instoken::{Encoding, EncodingResolver, EncodingType};
use once_cell::sync::Lazy;
use proptest::prelude::*;

static RESOLVER: Lazy<EncodingResolver> = Lazy::new(EncodingResolver::new);

fn all_encodings() -> Vec<Encoding> {
    EncodingType::all().map(|typ| RESOLVER.encoding(typ)).collect()
}

proptest! {
    #[test]
    fn encode_ordinary_round_trips(text in "\\PC*") {
        for encoding in all_encodings() {
            let tokens = encoding.encode_ordinary(&text);
            prop_assert_eq!(&text, &encoding.decode_tokens_to_string(&tokens).unwrap(), "{}", encoding.name());
        }
    }

    #[test]
    fn encode_round_trips_around_special_tokens(
        before in "\\PC{0,20}",
        after in "\\PC{0,20}",
    ) {
        for encoding in all_encodings() {
            let text = format!("{before}<|endoftext|>{after}");
            let tokens = encoding.encode(&text);

            prop_assert!(tokens.len() >= 1);
            prop_assert_eq!(&text, &encoding.decode_tokens_to_string(&tokens).unwrap(), "{}", encoding.name());
        }
    }

    #[test]
    fn encoding_is_deterministic(text in "\\PC*") {
        for encoding in all_encodings() {
            prop_assert_eq!(encoding.encode_ordinary(&text), encoding.encode_ordinary(&text));
        }
    }

    #[test]
    fn token_count_never_exceeds_byte_count(text in "\\PC*") {
        for encoding in all_encodings() {
            prop_assert!(encoding.encode_ordinary(&text).len() <= text.len());
        }
    }
}

#[test]
fn empty_input_is_empty_for_every_encoding() {
    for encoding in all_encodings() {
        assert!(encoding.encode_ordinary("").is_empty(), "{}", encoding.name());
    }
}

#[test]
fn purr_sentence_compresses_on_the_baseline() {
    let text = "Purr Purrs Meow Purr purr purrs meow";
    let encoding = RESOLVER.resolve(None).into_encoding();
    let tokens = encoding.encode_ordinary(text);
    let count = tokens.len();

    assert_eq!(EncodingType::BASELINE, encoding.typ());
    assert_eq!(
        vec![47, 8186, 14874, 5544, 2206, 363, 393, 8186, 4087, 81, 4087, 5544, 757, 363],
        tokens
    );
    assert!(count > 0);
    assert!(count < text.chars().count());
}

#[test]
fn nonsense_hint_gets_the_baseline_encoding() {
    let resolution = RESOLVER.resolve(Some("not-a-real-model-xyz"));

    assert!(resolution.is_fallback());
    assert_eq!("cl100k_base", resolution.encoding().name());
}

#[test]
fn multilingual_text_round_trips() {
    let text = "naïve café, Grüße, こんにちは世界, Привет, 🐱🐾\r\n\ttabs\u{2028}and separators";

    for encoding in all_encodings() {
        let tokens = encoding.encode_ordinary(text);
        assert_eq!(
            text.as_bytes(),
            encoding.decode_tokens_to_bytes(&tokens).unwrap(),
            "{}",
            encoding.name()
        );
    }
}
