//! Lazily loaded, write-once storage for encodings.
use crate::{BpeEncoderParams, Encoding, EncodingType};
use once_cell::sync::OnceCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strum::EnumCount;

/// Holds every encoding loaded so far, so each one is parsed at most once for as long as the cache
/// lives.
///
/// There is one slot per [`EncodingType`].  A slot is filled the first time its encoding is
/// requested and never changes after that, so lookups after the first are a pointer clone.  Each
/// slot has its own initialization guard, which makes the cache safe to share between threads
/// without any further locking.
///
/// Typically one cache is created at startup (usually inside an [`crate::EncodingResolver`]) and
/// dropped at exit.
pub struct EncodingCache {
    /// Optional directory holding `.tiktoken` rank files that replace the embedded ones
    vocab_dir: Option<PathBuf>,

    slots: [OnceCell<Arc<BpeEncoderParams>>; EncodingType::COUNT],
}

impl EncodingCache {
    /// A cache that loads the vocabulary tables embedded in this crate.
    pub fn new() -> Self {
        Self {
            vocab_dir: None,
            slots: std::array::from_fn(|_| OnceCell::new()),
        }
    }

    /// A cache that prefers rank files found in `vocab_dir` over the embedded tables.
    pub fn with_vocab_dir(vocab_dir: impl Into<PathBuf>) -> Self {
        Self {
            vocab_dir: Some(vocab_dir.into()),
            ..Self::new()
        }
    }

    pub fn vocab_dir(&self) -> Option<&Path> {
        self.vocab_dir.as_deref()
    }

    /// Get an encoding, loading it first if this is the first time it's been asked for.
    pub fn get(&self, typ: EncodingType) -> Encoding {
        let params = self.slots[typ as usize]
            .get_or_init(|| Arc::new(BpeEncoderParams::load(typ, self.vocab_dir())));

        Encoding::from_params(params.clone())
    }

    /// Has this encoding been loaded yet?
    pub fn is_loaded(&self, typ: EncodingType) -> bool {
        self.slots[typ as usize].get().is_some()
    }

    /// The encodings loaded so far
    pub fn loaded(&self) -> impl Iterator<Item = EncodingType> + '_ {
        EncodingType::all().filter(|typ| self.is_loaded(*typ))
    }
}

impl Default for EncodingCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EncodingCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodingCache")
            .field("vocab_dir", &self.vocab_dir)
            .field("loaded", &self.loaded().collect::<Vec<_>>())
            .finish()
    }
}
