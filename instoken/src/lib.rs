use snafu::{OptionExt, ResultExt};
use std::fmt::Debug;
use std::sync::Arc;

mod bpe;
mod cache;
mod encoder;
mod error;
mod iterator;
mod resolve;
mod token;

pub use cache::*;
pub use encoder::*;
pub use error::*;
pub use iterator::*;
pub use resolve::*;
pub use token::*;

pub type Result<T> = std::result::Result<T, InstokenError>;

/// An implementation of a specific text encoding used by OpenAI models.
///
/// With this encoding, it's possible to tokenize input text into numeric tokens.  It's also
/// possible to decode integer tokens back into the bytes they came from.
///
/// Instances of `Encoding` are light weight and can be very cheaply cloned.  They are also thread
/// safe; a single instance can be used to encode or decode text in multiple threads
/// simultaneously, although with Rust ownership rules it's usually more convenient to make a clone
/// of the encoding for each thread.
///
/// Two encodings compare equal when they are the same named encoding, even if their tables were
/// loaded separately.
#[derive(Clone)]
pub struct Encoding {
    params: Arc<BpeEncoderParams>,
}

impl Encoding {
    /// Load a text encoding from the embedded vocabulary tables.
    ///
    /// Each call parses the table again.  Use an [`EncodingCache`] (or an [`EncodingResolver`])
    /// to load each encoding only once.
    pub fn new(typ: EncodingType) -> Self {
        Self::from_params(Arc::new(BpeEncoderParams::load(typ, None)))
    }

    pub(crate) fn from_params(params: Arc<BpeEncoderParams>) -> Self {
        Self { params }
    }

    pub fn typ(&self) -> EncodingType {
        self.params.typ
    }

    /// The name of this encoding, like `cl100k_base`
    pub fn name(&self) -> &'static str {
        self.params.typ.name()
    }

    /// Where the vocabulary table of this encoding was loaded from
    pub fn rank_source(&self) -> &RankSource {
        &self.params.source
    }

    /// Number of distinct tokens, ordinary and special, this encoding can produce
    pub fn vocab_size(&self) -> usize {
        self.params.encode.len() + self.params.special_tokens_encode.len()
    }

    /// True if both encodings use the very same loaded table, as opposed to separately loaded
    /// copies of it
    pub fn shares_table_with(&self, other: &Encoding) -> bool {
        Arc::ptr_eq(&self.params, &other.params)
    }

    /// The special token strings and their corresponding integer ranks, for this encoding
    pub fn special_tokens(&self) -> impl Iterator<Item = (&TokenString, TokenInt)> {
        self.params.special_tokens_encode.tokens()
    }

    /// Search the given input text for "special" tokens, returning an iterator that yields all
    /// special tokens in the input text.
    ///
    /// If you just need to know if there are any special tokens in the text, you can call
    /// [`Iterator::any`]
    pub fn find_special_tokens<'me, 'text>(
        &'me self,
        text: &'text str,
    ) -> impl Iterator<Item = &'text str> + 'text
    where
        'me: 'text,
    {
        self.params
            .special_tokens_finder
            .find_iter(text)
            .map(move |m| &text[m.start()..m.end()])
    }

    /// Make an educated guess as to the number of likely tokens in a given bit of text.
    ///
    /// This is not a precise calculation, but it's a good enough estimate for most purposes.  For
    /// example if you want to pre-allocate a Vec to hold the tokens for a string, this is a good
    /// choice for the target capacity.  It might be slightly off but it's definitely better than no
    /// pre-allocation at all.
    pub fn estimate_num_tokens(&self, text: impl AsRef<str>) -> usize {
        self.params.estimate_num_tokens(text.as_ref())
    }

    /// Lazily encode text into tokens, without any special handling for "special" tokens.
    ///
    /// See [`Self::encode_ordinary`].
    pub fn encode_ordinary_iter<'a>(&'a self, text: &'a str) -> EncodeOrdinaryIterator<'a> {
        EncodeOrdinaryIterator::new(&self.params, text)
    }

    /// Encode the specified text into a sequence of tokens, without any special handling for
    /// "special" tokens.  If `text` contains any special tokens, they will not be encoded with the
    /// corresponding `TokenInt` values for special tokens.  Rather, they will be treated like any
    /// other text, and broken up into subword tokens.
    ///
    /// This never fails, and the empty string encodes to no tokens at all.
    pub fn encode_ordinary(&self, text: impl AsRef<str>) -> Vec<TokenInt> {
        let text = text.as_ref();
        let mut tokens = Vec::with_capacity(self.estimate_num_tokens(text));

        tokens.extend(self.encode_ordinary_iter(text));

        tokens
    }

    /// Encode the specified text into a sequence of tokens, including encoding
    /// "special" tokens.  If `text` contains any special tokens, they will be encoded into the
    /// special `TokenInt` values assigned to the special tokens for this encoding.
    ///
    /// If you want to detect text that contains certain special tokens, to avoid abuse of the
    /// model or potentially unwanted behavior, use the [`Self::find_special_tokens`] function to
    /// scan input for special tokens, and take whatever action you need if any are found.
    ///
    /// If you don't require detecting special tokens, use the `ordinary` versions, as they are
    /// slightly faster and also simpler to use.
    pub fn encode(&self, text: impl AsRef<str>) -> Vec<TokenInt> {
        let text = text.as_ref();
        let mut tokens = Vec::with_capacity(self.estimate_num_tokens(text));

        // Text between special tokens goes through the ordinary encoder
        let mut start = 0;
        for m in self.params.special_tokens_finder.find_iter(text) {
            tokens.extend(self.encode_ordinary_iter(&text[start..m.start()]));
            tokens.push(
                self.params
                    .special_tokens_encode
                    .token_for_bytes(&text[m.start()..m.end()])
                    .expect("BUG: special token finder matched text that isn't a special token"),
            );
            start = m.end();
        }
        tokens.extend(self.encode_ordinary_iter(&text[start..]));

        tokens
    }

    /// Decode a set of tokens into the string that they came from.
    ///
    /// Note that encoders can sometimes take a valid UTF-8 string as input, and break it down into
    /// subword tokens such that some of those tokens are not actually valid UTF-8 code points.
    /// Therefore, decoding to a string is a fallible operation.  As long as the input `tokens`
    /// came from a UTF-8 string, and the sequence of tokens has not been modified or truncated,
    /// then this will succeed.
    ///
    /// If you need more robust decoding, use [`Self::decode_tokens_to_bytes`] which will always
    /// succeed unless you pass tokens that are not used by the encoding which is performing the
    /// decoding.
    pub fn decode_tokens_to_string(&self, tokens: &[TokenInt]) -> Result<String> {
        let bytes = self.decode_tokens_to_bytes(tokens)?;

        String::from_utf8(bytes).context(InvalidUtf8Snafu)
    }

    /// Decode a set of tokens into the bytes that they came from.
    ///
    /// This is fallible only in case the tokens passed in to `tokens` came from a different
    /// encoding, and thus the integer representation doesn't correspond to an actual token byte
    /// sequence.
    pub fn decode_tokens_to_bytes(&self, tokens: &[TokenInt]) -> Result<TokenString> {
        let mut bytes = Vec::with_capacity(tokens.len() * self.params.mean_token_len);

        for &token in tokens {
            let token_bytes = self
                .token_bytes(token)
                .context(UnknownTokenSnafu { token })?;
            bytes.extend_from_slice(token_bytes);
        }

        Ok(bytes)
    }

    /// Decode a single token into the byte sequence it corresponds to.
    ///
    /// If the token isn't one that is used by this encoding, this returns `None`.
    pub fn decode_token(&self, token: TokenInt) -> Option<TokenString> {
        self.token_bytes(token).cloned()
    }

    /// Given a token, return the length of the corresponding byte sequence in bytes.
    ///
    /// This works the same as [`Self::decode_token`], except it doesn't incur the heap allocation
    /// to return the bytes themselves.  It can fail with `None` under the same circumstances.
    pub fn token_len(&self, token: TokenInt) -> Option<usize> {
        self.params
            .decode
            .token_len(token)
            .or_else(|| self.params.special_tokens_decode.token_len(token))
    }

    fn token_bytes(&self, token: TokenInt) -> Option<&TokenString> {
        self.params
            .decode
            .bytes_for_token(token)
            .or_else(|| self.params.special_tokens_decode.bytes_for_token(token))
    }
}

impl PartialEq for Encoding {
    fn eq(&self, other: &Self) -> bool {
        self.typ() == other.typ()
    }
}

impl Eq for Encoding {}

impl Debug for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoding")
            .field("name", &self.name())
            .field("vocab_size", &self.vocab_size())
            .field("source", self.rank_source())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const PURR: &str = "Purr Purrs Meow Purr purr purrs meow";

    #[test]
    fn empty_text_has_no_tokens() {
        for typ in EncodingType::all() {
            let encoding = Encoding::new(typ);
            assert!(encoding.encode_ordinary("").is_empty());
            assert!(encoding.encode("").is_empty());
            assert_eq!(Some(0), encoding.encode_ordinary_iter("").size_hint().1);
        }
    }

    #[test]
    fn baseline_purr_count_is_fewer_than_chars() {
        let encoding = Encoding::new(EncodingType::BASELINE);
        let tokens = encoding.encode_ordinary(PURR);

        assert!(!tokens.is_empty());
        assert!(tokens.len() < PURR.chars().count());
        assert_eq!(PURR, encoding.decode_tokens_to_string(&tokens).unwrap());
    }

    #[test]
    fn known_token_ids() {
        let cl100k = Encoding::new(EncodingType::Cl100kBase);
        assert_eq!(vec![15339, 1917], cl100k.encode_ordinary("hello world"));
        assert_eq!(b"hello".to_vec(), cl100k.decode_token(15339).unwrap());
        assert_eq!(100_256 + 5, cl100k.vocab_size());

        let r50k = Encoding::new(EncodingType::R50kBase);
        assert_eq!(vec![31373, 995], r50k.encode_ordinary("hello world"));
        assert_eq!(50_257, r50k.vocab_size());

        let p50k = Encoding::new(EncodingType::P50kBase);
        assert_eq!(vec![31373, 995], p50k.encode_ordinary("hello world"));
        assert_eq!(50_281, p50k.vocab_size());

        let o200k = Encoding::new(EncodingType::O200kBase);
        assert_eq!(vec![24912, 2375], o200k.encode_ordinary("hello world"));
        assert_eq!(199_998 + 2, o200k.vocab_size());
    }

    #[test]
    fn iterator_matches_vec() {
        let encoding = Encoding::new(EncodingType::O200kBase);

        assert_eq!(
            encoding.encode_ordinary(PURR),
            encoding.encode_ordinary_iter(PURR).collect::<Vec<_>>()
        );
    }

    #[test]
    fn special_tokens_are_only_special_in_encode() {
        let encoding = Encoding::new(EncodingType::Cl100kBase);
        let text = "hello<|endoftext|>world";

        let special = encoding.encode(text);
        assert!(special.contains(&100257));
        assert_eq!(text, encoding.decode_tokens_to_string(&special).unwrap());

        let ordinary = encoding.encode_ordinary(text);
        assert!(!ordinary.contains(&100257));
        assert!(ordinary.len() > special.len());
        assert_eq!(text, encoding.decode_tokens_to_string(&ordinary).unwrap());
    }

    #[test]
    fn find_special_tokens_reports_each_occurrence() {
        let encoding = Encoding::new(EncodingType::P50kEdit);
        let text = "<|fim_prefix|>a<|fim_suffix|>b<|endoftext|><|endofprompt|>";

        assert_eq!(
            vec!["<|fim_prefix|>", "<|fim_suffix|>", "<|endoftext|>"],
            encoding.find_special_tokens(text).collect::<Vec<_>>()
        );
        assert!(!encoding.find_special_tokens("nothing special").any(|_| true));
    }

    #[test]
    fn special_tokens_use_published_ranks() {
        let encoding = Encoding::new(EncodingType::O200kBase);
        let mut specials: Vec<_> = encoding
            .special_tokens()
            .map(|(bytes, rank)| (String::from_utf8(bytes.clone()).unwrap(), rank))
            .collect();
        specials.sort_by_key(|(_, rank)| *rank);

        assert_eq!(
            vec![
                ("<|endoftext|>".to_string(), 199999),
                ("<|endofprompt|>".to_string(), 200018)
            ],
            specials
        );
        assert_eq!(Some(13), encoding.token_len(199999));
    }

    #[test]
    fn decoding_unknown_tokens_fails() {
        let encoding = Encoding::new(EncodingType::R50kBase);

        assert_matches!(
            encoding.decode_tokens_to_bytes(&[b'a' as usize, 999_999]),
            Err(InstokenError::UnknownToken { token: 999_999 })
        );
        assert_eq!(None, encoding.decode_token(999_999));
        assert_eq!(None, encoding.token_len(999_999));
    }

    #[test]
    fn decoding_partial_utf8_fails_as_string_only() {
        let encoding = Encoding::new(EncodingType::Cl100kBase);

        // The first byte of a multi-byte code point on its own
        let lead_byte = (0..256)
            .find(|token| encoding.decode_token(*token) == Some(vec![0xe2]))
            .unwrap();
        let tokens = vec![lead_byte];
        assert_eq!(vec![0xe2], encoding.decode_tokens_to_bytes(&tokens).unwrap());
        assert_matches!(
            encoding.decode_tokens_to_string(&tokens),
            Err(InstokenError::InvalidUtf8 { .. })
        );
    }

    #[test]
    fn estimate_is_in_the_right_ballpark() {
        let encoding = Encoding::new(EncodingType::Cl100kBase);
        let text = PURR.repeat(10);
        let estimate = encoding.estimate_num_tokens(&text);
        let actual = encoding.encode_ordinary(&text).len();

        assert!(estimate > 0);
        assert!(estimate <= text.len());
        assert!(actual <= text.len());
    }

    #[test]
    fn equality_is_by_encoding_name() {
        assert_eq!(
            Encoding::new(EncodingType::P50kBase),
            Encoding::new(EncodingType::P50kBase)
        );
        assert_ne!(
            Encoding::new(EncodingType::P50kBase),
            Encoding::new(EncodingType::P50kEdit)
        );
        assert!(format!("{:?}", Encoding::new(EncodingType::R50kBase)).contains("r50k_base"));
    }
}
