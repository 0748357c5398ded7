/// A token output by the tokenizer, represented in its integer form.
///
/// The integer is also the token's rank in the vocabulary: lower ranks were merged earlier when
/// the vocabulary was built, and the BPE merge loop uses that rank as the merge priority.  So the
/// same number serves both as the identifier handed to a model and as the priority of the merge
/// that produced it.
pub type TokenInt = usize;

/// A token in its byte string form.
///
/// Callers almost always want [`TokenInt`], but the vocabulary is keyed on these byte strings, and
/// decoding produces them.
pub type TokenString = Vec<u8>;
