//! Contains the implementation of the bulk of the tokenization logic, implemented as a Rust
//! [`Iterator`].

use crate::{bpe, BpeEncoderParams, TokenInt};
use std::collections::VecDeque;

/// Applies the encoding's regex to get the next "word", as defined by the regex itself.
struct WordIterator<'a> {
    params: &'a BpeEncoderParams,

    /// The input text that is being split into words
    text: &'a str,

    /// The offset into `text` where the next iteration should start to process
    pos: usize,
}

impl<'a> WordIterator<'a> {
    fn new(params: &'a BpeEncoderParams, text: &'a str) -> Self {
        Self {
            params,
            text,
            pos: 0,
        }
    }
}

impl<'a> Iterator for WordIterator<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let text = self.text;

        self.params
            .regex
            .find_from_pos(text, self.pos)
            .expect("BUG: regex is not valid")
            .map(|m| {
                self.pos = m.end();

                &text[m.start()..m.end()]
            })
    }
}

/// The iterator which yields the tokens from a string of text encoded without regard for
/// special tokens.
///
/// See [`crate::Encoding::encode_ordinary_iter`]
pub struct EncodeOrdinaryIterator<'a> {
    params: &'a BpeEncoderParams,
    text: &'a str,
    words: WordIterator<'a>,

    /// Tokens from the current word that haven't been yielded yet, if the word itself didn't map
    /// directly to a token.  They're yielded from the front.
    pending: VecDeque<TokenInt>,
}

impl<'a> EncodeOrdinaryIterator<'a> {
    pub(crate) fn new(params: &'a BpeEncoderParams, text: &'a str) -> Self {
        Self {
            params,
            text,
            words: WordIterator::new(params, text),
            pending: VecDeque::new(),
        }
    }
}

impl<'a> Iterator for EncodeOrdinaryIterator<'a> {
    type Item = TokenInt;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(token) = self.pending.pop_front() {
            return Some(token);
        }

        // This is the next word in the input.  Either it is itself a token, in which case
        // we're done, or it's not and we need to break the word up into subword tokens with
        // the BPE algorithm
        let word = self.words.next()?;
        if let Some(token) = self.params.encode.token_for_bytes(word) {
            return Some(token);
        }

        self.pending
            .extend(bpe::byte_pair_encode(word.as_bytes(), &self.params.encode));
        debug_assert!(!self.pending.is_empty(), "BUG: words are never empty");

        self.pending.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        // No token is shorter than one byte, so the remaining bytes bound the remaining tokens.
        // For a useful capacity estimate see `BpeEncoderParams::estimate_num_tokens`.
        (
            self.pending.len(),
            Some(self.text.len() - self.words.pos + self.pending.len()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EncodingType;

    fn get_words<'a>(params: &'a BpeEncoderParams, text: &'a str) -> Vec<&'a str> {
        WordIterator::new(params, text).collect()
    }

    #[test]
    fn word_iterator_works() {
        let params = BpeEncoderParams::load(EncodingType::Cl100kBase, None);

        assert!(get_words(&params, "").is_empty());
        assert_eq!(&["foo"], get_words(&params, "foo").as_slice());
        assert_eq!(
            &["foo", " bar", " baz"],
            get_words(&params, "foo bar baz").as_slice()
        );
        assert_eq!(
            &[
                "let",
                " params",
                " =",
                " crate",
                "::",
                "BpeEncoderParams",
                "::",
                "load",
                "(EncodingType",
                "::",
                "Cl",
                "100",
                "kBase",
                ");"
            ],
            get_words(
                &params,
                r##"let params = crate::BpeEncoderParams::load(EncodingType::Cl100kBase);"##
            )
            .as_slice()
        );
    }

    #[test]
    fn gpt2_pattern_keeps_digit_runs_and_trailing_space() {
        let params = BpeEncoderParams::load(EncodingType::R50kBase, None);

        assert_eq!(
            &["I", "'ll", " pay", " 12345", " now", "  ", " ok"],
            get_words(&params, "I'll pay 12345 now   ok").as_slice()
        );
    }

    #[test]
    fn o200k_pattern_splits_case_changes() {
        let params = BpeEncoderParams::load(EncodingType::O200kBase, None);

        assert_eq!(
            &["Purr", " Purrs", " Meow", " purr"],
            get_words(&params, "Purr Purrs Meow purr").as_slice()
        );
        assert_eq!(&["camel", "Case"], get_words(&params, "camelCase").as_slice());
    }

    #[test]
    fn tokens_cover_the_text() {
        let params = BpeEncoderParams::load(EncodingType::Cl100kBase, None);
        let text = "Purr Purrs Meow Purr purr purrs meow";

        let bytes: Vec<u8> = EncodeOrdinaryIterator::new(&params, text)
            .flat_map(|token| params.decode.bytes_for_token(token).unwrap().clone())
            .collect();

        assert_eq!(text.as_bytes(), bytes.as_slice());
    }
}
