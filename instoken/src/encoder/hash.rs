//! The lookup tables mapping byte strings to token ranks and back again.
//!
//! The hash function matters a lot for encoding speed, since the BPE merge loop does a lookup for
//! every candidate pair.  It lives in this module so it can be swapped in one place.
use crate::token::{TokenInt, TokenString};

pub use rustc_hash::FxHashMap as HashMap;

/// Forward half of a vocabulary table: byte sequence to token rank.
#[derive(Clone, Debug)]
pub struct TokenEncoder(HashMap<TokenString, TokenInt>);

/// Reverse half of a vocabulary table: token rank to byte sequence.
#[derive(Clone, Debug)]
pub struct TokenDecoder(HashMap<TokenInt, TokenString>);

impl TokenEncoder {
    pub fn new<Iter, Bytes, Int>(items: Iter) -> Self
    where
        Iter: IntoIterator<Item = (Bytes, Int)>,
        Bytes: Into<TokenString>,
        Int: Into<TokenInt>,
    {
        Self(
            items
                .into_iter()
                .map(|(bytes, rank)| (bytes.into(), rank.into()))
                .collect(),
        )
    }

    pub fn token_for_bytes(&self, bytes: impl AsRef<[u8]>) -> Option<TokenInt> {
        self.0.get(bytes.as_ref()).copied()
    }

    /// Build the matching decoder by swapping keys and values
    pub fn invert(&self) -> TokenDecoder {
        TokenDecoder::new(self.0.iter().map(|(bytes, rank)| (bytes.clone(), *rank)))
    }

    /// All byte string/rank pairs in the table, in no particular order
    pub fn tokens(&self) -> impl Iterator<Item = (&TokenString, TokenInt)> {
        self.0.iter().map(|(s, i)| (s, *i))
    }

    pub fn token_strings(&self) -> impl Iterator<Item = &TokenString> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TokenDecoder {
    pub fn new<Iter, Bytes, Int>(items: Iter) -> Self
    where
        Iter: IntoIterator<Item = (Bytes, Int)>,
        Bytes: Into<TokenString>,
        Int: Into<TokenInt>,
    {
        Self(
            items
                .into_iter()
                .map(|(bytes, rank)| (rank.into(), bytes.into()))
                .collect(),
        )
    }

    pub fn bytes_for_token(&self, token: TokenInt) -> Option<&TokenString> {
        self.0.get(&token)
    }

    /// Length in bytes of the token's byte string, without copying it
    pub fn token_len(&self, token: TokenInt) -> Option<usize> {
        self.bytes_for_token(token).map(TokenString::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invert_swaps_keys_and_values() {
        let encoder = TokenEncoder::new(vec![(b"a".to_vec(), 0usize), (b"ab".to_vec(), 1)]);
        let decoder = encoder.invert();

        assert_eq!(Some(1), encoder.token_for_bytes(b"ab"));
        assert_eq!(None, encoder.token_for_bytes(b"b"));
        assert_eq!(Some(&b"ab".to_vec()), decoder.bytes_for_token(1));
        assert_eq!(Some(1), decoder.token_len(0));
        assert_eq!(None, decoder.token_len(7));
        assert_eq!(2, encoder.len());
    }
}
