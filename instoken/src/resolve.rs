//! Choosing an encoding from whatever model name, if any, the caller has.
use crate::{Encoding, EncodingCache, EncodingType};
use std::path::PathBuf;
use tracing::*;

/// Model names that map to an encoding exactly.
const MODEL_TO_ENCODING: &[(&str, EncodingType)] = &[
    // reasoning and chat
    ("o1", EncodingType::O200kBase),
    ("o3", EncodingType::O200kBase),
    ("o4-mini", EncodingType::O200kBase),
    ("gpt-5", EncodingType::O200kBase),
    ("gpt-4.5", EncodingType::O200kBase),
    ("gpt-4.1", EncodingType::O200kBase),
    ("gpt-4o", EncodingType::O200kBase),
    ("chatgpt-4o-latest", EncodingType::O200kBase),
    ("gpt-4", EncodingType::Cl100kBase),
    ("gpt-3.5-turbo", EncodingType::Cl100kBase),
    ("gpt-3.5", EncodingType::Cl100kBase),
    ("gpt-35-turbo", EncodingType::Cl100kBase),
    // base
    ("davinci-002", EncodingType::Cl100kBase),
    ("babbage-002", EncodingType::Cl100kBase),
    // embeddings
    ("text-embedding-ada-002", EncodingType::Cl100kBase),
    ("text-embedding-3-small", EncodingType::Cl100kBase),
    ("text-embedding-3-large", EncodingType::Cl100kBase),
    // text and code
    ("text-davinci-003", EncodingType::P50kBase),
    ("text-davinci-002", EncodingType::P50kBase),
    ("text-davinci-001", EncodingType::R50kBase),
    ("text-curie-001", EncodingType::R50kBase),
    ("text-babbage-001", EncodingType::R50kBase),
    ("text-ada-001", EncodingType::R50kBase),
    ("davinci", EncodingType::R50kBase),
    ("curie", EncodingType::R50kBase),
    ("babbage", EncodingType::R50kBase),
    ("ada", EncodingType::R50kBase),
    ("code-davinci-002", EncodingType::P50kBase),
    ("code-davinci-001", EncodingType::P50kBase),
    ("code-cushman-002", EncodingType::P50kBase),
    ("code-cushman-001", EncodingType::P50kBase),
    ("davinci-codex", EncodingType::P50kBase),
    ("cushman-codex", EncodingType::P50kBase),
    // edit
    ("text-davinci-edit-001", EncodingType::P50kEdit),
    ("code-davinci-edit-001", EncodingType::P50kEdit),
    // old embeddings
    ("text-similarity-davinci-001", EncodingType::R50kBase),
    ("text-similarity-curie-001", EncodingType::R50kBase),
    ("text-similarity-babbage-001", EncodingType::R50kBase),
    ("text-similarity-ada-001", EncodingType::R50kBase),
    ("text-search-davinci-doc-001", EncodingType::R50kBase),
    ("text-search-curie-doc-001", EncodingType::R50kBase),
    ("text-search-babbage-doc-001", EncodingType::R50kBase),
    ("text-search-ada-doc-001", EncodingType::R50kBase),
    ("code-search-babbage-code-001", EncodingType::R50kBase),
    ("code-search-ada-code-001", EncodingType::R50kBase),
    // open source
    ("gpt2", EncodingType::R50kBase),
    ("gpt-2", EncodingType::R50kBase),
];

/// Model name prefixes, for dated snapshots and fine tunes.  The first match wins, so a prefix
/// must come before any shorter prefix of itself.
const MODEL_PREFIX_TO_ENCODING: &[(&str, EncodingType)] = &[
    ("o1-", EncodingType::O200kBase),
    ("o3-", EncodingType::O200kBase),
    ("o4-mini-", EncodingType::O200kBase),
    ("gpt-5-", EncodingType::O200kBase),
    ("gpt-4.5-", EncodingType::O200kBase),
    ("gpt-4.1-", EncodingType::O200kBase),
    ("chatgpt-4o-", EncodingType::O200kBase),
    ("gpt-4o-", EncodingType::O200kBase),
    ("gpt-4-", EncodingType::Cl100kBase),
    ("gpt-3.5-turbo-", EncodingType::Cl100kBase),
    ("gpt-35-turbo-", EncodingType::Cl100kBase),
    ("ft:gpt-4o", EncodingType::O200kBase),
    ("ft:gpt-4", EncodingType::Cl100kBase),
    ("ft:gpt-3.5-turbo", EncodingType::Cl100kBase),
    ("ft:davinci-002", EncodingType::Cl100kBase),
    ("ft:babbage-002", EncodingType::Cl100kBase),
];

impl EncodingType {
    /// The encoding a model uses, if the model is one we know about.
    ///
    /// Surrounding whitespace is ignored, but otherwise the name has to match exactly,
    /// including case.
    pub fn for_model(model: &str) -> Option<EncodingType> {
        let model = model.trim();

        MODEL_TO_ENCODING
            .iter()
            .find(|(name, _)| *name == model)
            .or_else(|| {
                MODEL_PREFIX_TO_ENCODING
                    .iter()
                    .find(|(prefix, _)| model.starts_with(prefix))
            })
            .map(|(_, typ)| *typ)
    }

    /// Every model name with a known encoding
    pub fn known_models() -> impl Iterator<Item = (&'static str, EncodingType)> {
        MODEL_TO_ENCODING.iter().copied()
    }

    /// Every model name prefix with a known encoding, in the order they're tried
    pub fn known_model_prefixes() -> impl Iterator<Item = (&'static str, EncodingType)> {
        MODEL_PREFIX_TO_ENCODING.iter().copied()
    }
}

/// The outcome of resolving a model hint to an encoding.
///
/// Either way there's an encoding to use; the variant records whether the hint actually picked it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// The hint named a model with a known encoding
    Resolved(Encoding),

    /// There was no hint, or it didn't match any known model, so the baseline encoding is used
    FellBackToBaseline(Encoding),
}

impl Resolution {
    pub fn encoding(&self) -> &Encoding {
        match self {
            Resolution::Resolved(encoding) | Resolution::FellBackToBaseline(encoding) => encoding,
        }
    }

    pub fn into_encoding(self) -> Encoding {
        match self {
            Resolution::Resolved(encoding) | Resolution::FellBackToBaseline(encoding) => encoding,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Resolution::FellBackToBaseline(_))
    }
}

/// Turns model hints into loaded encodings.
///
/// The resolver owns the [`EncodingCache`], so each encoding is loaded at most once no matter how
/// many hints resolve to it.
#[derive(Debug, Default)]
pub struct EncodingResolver {
    cache: EncodingCache,
}

impl EncodingResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// A resolver whose encodings prefer rank tables found in `vocab_dir`, if one is given.
    pub fn with_vocab_dir(vocab_dir: Option<PathBuf>) -> Self {
        Self {
            cache: vocab_dir.map_or_else(EncodingCache::new, EncodingCache::with_vocab_dir),
        }
    }

    pub fn cache(&self) -> &EncodingCache {
        &self.cache
    }

    /// Resolve an optional model hint to an encoding.
    ///
    /// This never fails.  A missing, blank, or unrecognized hint resolves to
    /// [`EncodingType::BASELINE`].
    pub fn resolve(&self, model_hint: Option<&str>) -> Resolution {
        let model_hint = model_hint.map(str::trim).filter(|hint| !hint.is_empty());

        match model_hint.and_then(EncodingType::for_model) {
            Some(typ) => Resolution::Resolved(self.cache.get(typ)),
            None => {
                debug!(model_hint,
                    encoding = %EncodingType::BASELINE,
                    "No encoding known for model hint; using the baseline encoding");
                Resolution::FellBackToBaseline(self.cache.get(EncodingType::BASELINE))
            }
        }
    }

    /// Get a specific encoding by type, from the cache.
    pub fn encoding(&self, typ: EncodingType) -> Encoding {
        self.cache.get(typ)
    }
}
