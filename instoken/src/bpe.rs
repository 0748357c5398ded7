//! Implementation of BPE (byte pair encoding) as it relates to encoding text as tokens.
use crate::encoder::TokenEncoder;
use crate::TokenInt;
use std::ops::Range;

/// Using the BPE algorithm find the tokens in a word and return their integer form.
///
/// `word` is one piece of the input as produced by the encoding's word splitting regex.  An empty
/// word produces no tokens.
pub fn byte_pair_encode(word: &[u8], encoder: &TokenEncoder) -> Vec<TokenInt> {
    // It's assumed that all 256 possible single byte values are also tokens
    if word.len() == 1 {
        return vec![encoder
            .token_for_bytes(word)
            .expect("BUG: expect all possible u8 values to correspond to a token")];
    }

    byte_pair_merge(word, encoder)
        .into_iter()
        .map(|range| {
            encoder
                .token_for_bytes(&word[range])
                .expect("BUG: expect merged range to already be matched to a token")
        })
        .collect()
}

/// Merge bytes within a word together into progressively fewer, longer byte sequences that
/// correspond to tokens in the encoding vocabulary, and return the byte ranges of the final parts.
///
/// The token integer representation is assumed to also be the "rank" of that token.  That's
/// important since the algorithm works by taking the adjacent pair whose merged bytes have the
/// minimum rank, merging it, and repeating until no adjacent pair merges into a known token.
///
/// Based on the _byte_pair_merge function in the `tiktoken` source.
fn byte_pair_merge(word: &[u8], encoder: &TokenEncoder) -> Vec<Range<usize>> {
    if word.is_empty() {
        return Vec::new();
    }

    // This is a vector of (start, rank).
    // The rank is of the byte pair starting at position start.
    // The rank of the last item in the vector is not a valid value.
    let mut parts: Vec<(usize, usize)> = (0..word.len() + 1).map(|i| (i, usize::MAX)).collect();

    // Rank of the bytes spanning `parts[start_idx]` up to (not including) the part `skip + 2`
    // positions later, if those bytes are a token
    let get_rank = |parts: &Vec<(usize, usize)>, start_idx: usize, skip: usize| {
        if (start_idx + skip + 2) < parts.len() {
            encoder.token_for_bytes(&word[parts[start_idx].0..parts[start_idx + skip + 2].0])
        } else {
            None
        }
    };

    // We look up the ranks once in the beginning and iteratively update
    // them during each merge, which reduces the number of rank lookups.
    for i in 0..parts.len() - 2 {
        if let Some(rank) = get_rank(&parts, i, 0) {
            // usize::MAX is a sentinel value and cannot be a valid rank
            debug_assert!(rank != usize::MAX);
            parts[i].1 = rank;
        }
    }

    // If you have n parts and m merges, this does O(mn) work.  Words are short (the regex sees to
    // that) so the linear scan beats anything fancier with a heap.
    loop {
        if parts.len() == 1 {
            break;
        }

        // Lowest rank wins; on a tie the leftmost pair does
        let mut min_rank: (usize, usize) = (usize::MAX, 0);
        for (i, &(_, rank)) in parts[..parts.len() - 1].iter().enumerate() {
            if rank < min_rank.0 {
                min_rank = (rank, i);
            }
        }

        if min_rank.0 == usize::MAX {
            break;
        }

        let i = min_rank.1;

        // parts[i + 1] is about to go away.  Update the ranks of the pairs on either side of the
        // merge first, skipping over it.
        parts[i].1 = get_rank(&parts, i, 1).unwrap_or(usize::MAX);
        if i > 0 {
            parts[i - 1].1 = get_rank(&parts, i - 1, 1).unwrap_or(usize::MAX);
        }

        parts.remove(i + 1);
    }

    parts
        .windows(2)
        .map(|pair| pair[0].0..pair[1].0)
        .collect()
}
