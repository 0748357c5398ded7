use crate::{TokenInt, TokenString};
use std::path::Path;
use strum::{EnumCount, EnumIter, EnumString, EnumVariantNames, IntoEnumIterator};
use tracing::*;

mod data;
mod hash;

pub use data::RankSource;
pub(crate) use hash::{TokenDecoder, TokenEncoder};

const ENDOFTEXT: &str = "<|endoftext|>";
const FIM_PREFIX: &str = "<|fim_prefix|>";
const FIM_MIDDLE: &str = "<|fim_middle|>";
const FIM_SUFFIX: &str = "<|fim_suffix|>";
const ENDOFPROMPT: &str = "<|endofprompt|>";

/// Word splitting pattern shared by GPT-2 and the GPT-3 era encodings
const GPT2_PATTERN: &str =
    r##"'s|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+"##;

const CL100K_PATTERN: &str = r##"(?i:'s|'t|'re|'ve|'m|'ll|'d)|[^\r\n\p{L}\p{N}]?\p{L}+|\p{N}{1,3}| ?[^\s\p{L}\p{N}]+[\r\n]*|\s*[\r\n]+|\s+(?!\S)|\s+"##;

const O200K_PATTERN: &str = concat!(
    r##"[^\r\n\p{L}\p{N}]?[\p{Lu}\p{Lt}\p{Lm}\p{Lo}\p{M}]*[\p{Ll}\p{Lm}\p{Lo}\p{M}]+(?i:'s|'t|'re|'ve|'m|'ll|'d)?"##,
    r##"|[^\r\n\p{L}\p{N}]?[\p{Lu}\p{Lt}\p{Lm}\p{Lo}\p{M}]+[\p{Ll}\p{Lm}\p{Lo}\p{M}]*(?i:'s|'t|'re|'ve|'m|'ll|'d)?"##,
    r##"|\p{N}{1,3}"##,
    r##"| ?[^\s\p{L}\p{N}]+[\r\n/]*"##,
    r##"|\s*[\r\n]+"##,
    r##"|\s+(?!\S)"##,
    r##"|\s+"##,
);

/// The tokenizer encoding to use to tokenize text.
///
/// Each of these uses a BPE subword tokenizing approach, but with different sets of
/// tokens and corresponding ranks, and with a different regex for breaking up text into
/// approximate word boundaries.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Hash,
    EnumString,
    EnumIter,
    EnumVariantNames,
    EnumCount,
    strum::Display,
    strum::IntoStaticStr,
)]
pub enum EncodingType {
    #[strum(serialize = "r50k_base")]
    R50kBase,
    #[strum(serialize = "p50k_base")]
    P50kBase,
    #[strum(serialize = "p50k_edit")]
    P50kEdit,
    #[strum(serialize = "cl100k_base")]
    Cl100kBase,
    #[strum(serialize = "o200k_base")]
    O200kBase,
}

impl EncodingType {
    /// The encoding used whenever a model name doesn't tell us which one to use
    pub const BASELINE: EncodingType = EncodingType::Cl100kBase;

    /// Every supported encoding, oldest first
    pub fn all() -> impl Iterator<Item = EncodingType> {
        Self::iter()
    }

    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Look up an encoding by its name, like `cl100k_base`
    pub fn from_name(name: &str) -> crate::Result<Self> {
        use std::str::FromStr;

        Self::from_str(name.trim()).map_err(|_| crate::InstokenError::UnknownEncoding {
            encoding: name.to_string(),
        })
    }

    /// Name of the rank table file this encoding reads its vocabulary from.
    pub fn rank_file_name(self) -> String {
        let table = match self {
            EncodingType::P50kEdit => EncodingType::P50kBase,
            other => other,
        };

        format!("{}.tiktoken", table.name())
    }

    /// The regex that breaks text into the "words" that BPE runs on
    pub fn pattern(self) -> &'static str {
        match self {
            EncodingType::R50kBase | EncodingType::P50kBase | EncodingType::P50kEdit => {
                GPT2_PATTERN
            }
            EncodingType::Cl100kBase => CL100K_PATTERN,
            EncodingType::O200kBase => O200K_PATTERN,
        }
    }

    /// The special tokens of this encoding, with the ranks OpenAI publishes for them
    pub fn special_tokens(self) -> &'static [(&'static str, TokenInt)] {
        match self {
            EncodingType::R50kBase | EncodingType::P50kBase => &[(ENDOFTEXT, 50256)],
            EncodingType::P50kEdit => &[
                (ENDOFTEXT, 50256),
                (FIM_PREFIX, 50281),
                (FIM_MIDDLE, 50282),
                (FIM_SUFFIX, 50283),
            ],
            EncodingType::Cl100kBase => &[
                (ENDOFTEXT, 100257),
                (FIM_PREFIX, 100258),
                (FIM_MIDDLE, 100259),
                (FIM_SUFFIX, 100260),
                (ENDOFPROMPT, 100276),
            ],
            EncodingType::O200kBase => &[(ENDOFTEXT, 199999), (ENDOFPROMPT, 200018)],
        }
    }
}

/// The description of a particular BPE encoding scheme, which is to say its vocabulary table plus
/// everything derived from it that the tokenizer needs.
pub struct BpeEncoderParams {
    pub(crate) typ: EncodingType,

    /// Where the ranks in `encode` were loaded from
    pub(crate) source: RankSource,

    /// Mapping of byte sequences to integer token ranks
    pub(crate) encode: TokenEncoder,

    /// Like [`encode`] but for "special" tokens.
    ///
    /// These should not be present in `encode`
    pub(crate) special_tokens_encode: TokenEncoder,

    /// Mapping of integer token ranks back to byte sequences
    pub(crate) decode: TokenDecoder,

    /// Like [`decode`] but for "special" tokens.
    pub(crate) special_tokens_decode: TokenDecoder,

    /// Regex used to break up text into approximate word boundaries
    ///
    /// The word separator regexes used by OpenAI's tokenizers use lookahead, which the regular
    /// rust `regex` crate doesn't support.  So this slower 'fancy' impl is needed
    pub(crate) regex: fancy_regex::Regex,

    /// A/C automaton for finding special tokens in text
    pub(crate) special_tokens_finder: aho_corasick::AhoCorasick,

    /// The mean length of a token in bytes.
    ///
    /// This is used when we need to estimate how many tokens are likely to be in a string.
    pub(crate) mean_token_len: usize,
}

impl BpeEncoderParams {
    /// Load the parameters for the given encoder type.
    ///
    /// If `vocab_dir` contains a rank table for this encoding it's used in place of the embedded
    /// one.  A table there that fails validation is logged and skipped, so this never fails.
    ///
    /// Loading parses the whole table, so callers should hold on to the result; see
    /// [`crate::EncodingCache`].
    pub fn load(typ: EncodingType, vocab_dir: Option<&Path>) -> Self {
        let override_path = vocab_dir
            .map(|dir| dir.join(typ.rank_file_name()))
            .filter(|path| path.is_file());

        let (tokens, source) = match override_path {
            Some(path) => match data::load_rank_file(&path) {
                Ok(tokens) => (tokens, RankSource::File(path)),
                Err(e) => {
                    warn!(encoding = %typ,
                        path = %path.display(),
                        err = %e,
                        "Vocabulary file is not usable; falling back to the embedded table");
                    (data::embedded_rank_data(typ), RankSource::Embedded)
                }
            },
            None => (data::embedded_rank_data(typ), RankSource::Embedded),
        };

        let params = Self::new(
            typ,
            source,
            tokens,
            typ.special_tokens().iter().copied(),
            typ.pattern(),
        );

        info!(encoding = %typ,
            vocab_size = params.encode.len(),
            source = %params.source,
            "Loaded encoding");

        params
    }

    /// Make an educated guess as to the number of likely tokens in a given bit of text.
    pub fn estimate_num_tokens(&self, text: &str) -> usize {
        // Use a dumb strategy: we know the mean length of a token in this encoding, and assume the
        // text is full of the mean tokens.
        (text.len() + self.mean_token_len - 1) / self.mean_token_len
    }

    fn new(
        typ: EncodingType,
        source: RankSource,
        tokens: impl IntoIterator<Item = (TokenString, TokenInt)>,
        special_tokens: impl Iterator<Item = (&'static str, TokenInt)>,
        regex: &'static str,
    ) -> Self {
        let encoder = TokenEncoder::new(tokens);
        let decoder = encoder.invert();

        // Calculate the average length of the tokens, never less than a byte
        let total_len = encoder
            .token_strings()
            .map(|bytes| bytes.len() as u64)
            .sum::<u64>();
        let mean_token_len = (total_len / encoder.len().max(1) as u64).max(1);

        let special_token_encoder = TokenEncoder::new(special_tokens);
        let special_token_decoder = special_token_encoder.invert();

        // Make an aho-corasick automaton that quickly finds any of the special tokens in text.
        // Leftmost-longest so that a special token that is a prefix of another can't shadow it.
        let special_tokens_finder = aho_corasick::AhoCorasickBuilder::new()
            .match_kind(aho_corasick::MatchKind::LeftmostLongest)
            .dfa(true)
            .build(special_token_encoder.token_strings());

        Self {
            typ,
            source,
            encode: encoder,
            special_tokens_encode: special_token_encoder,
            decode: decoder,
            special_tokens_decode: special_token_decoder,
            regex: fancy_regex::Regex::new(regex).expect("BUG: Invalid regex"),
            special_tokens_finder,
            mean_token_len: mean_token_len as usize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::str::FromStr;

    #[test]
    fn test_bpe_encoder() {
        for typ in EncodingType::all() {
            println!("Loading encoder {typ}");
            let encoder = BpeEncoderParams::load(typ, None);
            assert_eq!(encoder.typ, typ);
            assert_eq!(encoder.source, RankSource::Embedded);

            for byte in 0..=u8::MAX {
                assert!(encoder.encode.token_for_bytes([byte]).is_some());
            }

            // Special tokens must never collide with ordinary ones
            for (special, rank) in typ.special_tokens() {
                assert_eq!(None, encoder.encode.token_for_bytes(special));
                assert_eq!(None, encoder.decode.bytes_for_token(*rank));
            }
        }
    }

    #[test]
    fn names_round_trip() {
        for typ in EncodingType::all() {
            assert_eq!(typ, EncodingType::from_str(typ.name()).unwrap());
            assert_eq!(typ.to_string(), typ.name());
        }
        assert_eq!(EncodingType::all().count(), EncodingType::COUNT);
        assert!(EncodingType::from_str("gpt-4").is_err());

        assert_eq!(EncodingType::P50kEdit, EncodingType::from_name(" p50k_edit ").unwrap());
        assert_matches!(
            EncodingType::from_name("gpt-4"),
            Err(crate::InstokenError::UnknownEncoding { encoding }) if encoding == "gpt-4"
        );
    }

    #[test]
    fn p50k_edit_shares_p50k_base_table() {
        assert_eq!(
            EncodingType::P50kBase.rank_file_name(),
            EncodingType::P50kEdit.rank_file_name()
        );
        assert_eq!("cl100k_base.tiktoken", EncodingType::Cl100kBase.rank_file_name());
    }

    #[test]
    fn vocab_dir_overrides_embedded_table() {
        let dir = tempfile::tempdir().unwrap();
        let embedded = data::embedded_rank_data(EncodingType::R50kBase);

        // Keep only the single byte tokens, so the override is easy to tell apart
        let contents: String = embedded
            .iter()
            .filter(|(bytes, _)| bytes.len() == 1)
            .map(|(bytes, rank)| {
                use base64::Engine as _;
                format!(
                    "{} {rank}\n",
                    base64::engine::general_purpose::STANDARD.encode(bytes)
                )
            })
            .collect();
        let path = dir.path().join("r50k_base.tiktoken");
        std::fs::write(&path, contents).unwrap();

        let params = BpeEncoderParams::load(EncodingType::R50kBase, Some(dir.path()));
        assert_eq!(RankSource::File(path), params.source);
        assert_eq!(256, params.encode.len());

        // No file for this one in the directory, so the embedded table is used
        let params = BpeEncoderParams::load(EncodingType::Cl100kBase, Some(dir.path()));
        assert_eq!(RankSource::Embedded, params.source);
    }

    #[test]
    fn invalid_vocab_file_falls_back_to_embedded_table() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("o200k_base.tiktoken"), "this is not rank data\n").unwrap();

        let params = BpeEncoderParams::load(EncodingType::O200kBase, Some(dir.path()));

        assert_eq!(RankSource::Embedded, params.source);
        assert!(params.encode.len() > 256);
    }
}
