//! The interface to a text completion service, and the settings a completion request carries.
//!
//! No service is implemented here.  What's here is the request and response shape a service has
//! to accept and produce, how the request settings are derived from the environment, and how many
//! tokens a request's prompt costs.
use crate::config::{count_or_default, decimal_or_default, first_non_empty};
use anyhow::Result;
use instoken::EncodingResolver;
use serde::Serialize;
use std::fmt;
use std::ops::RangeInclusive;
use strum::{EnumIter, EnumString, EnumVariantNames, IntoEnumIterator};
use tracing::*;

/// Temperatures outside of this range are rejected by the service
pub const TEMPERATURE_RANGE: RangeInclusive<f64> = 0.0..=2.0;

/// Environment variables holding the temperature, highest precedence first
pub const TEMPERATURE_VARS: &[&str] = &["OAI_TEMP", "OAI_TEMPERATURE", "TEMP"];

pub const MODEL_VAR: &str = "OPENAI_MODEL";
pub const MAX_TOKENS_VAR: &str = "MAX_TOKENS";
pub const SAMPLE_COUNT_VAR: &str = "NAME_COUNT";
pub const BEST_OF_VAR: &str = "BEST_OF";

/// The kinds of completion request there are defaults for
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumString, EnumIter, EnumVariantNames, strum::Display,
)]
#[strum(serialize_all = "kebab-case")]
pub enum CompletionPreset {
    /// A short list of taglines, with a high temperature for variety
    Taglines,

    /// A single list of names, with a lower temperature for consistency
    Names,

    /// Several independent samples of names
    MultipleNames,

    /// Several samples generated by the service, of which only the best is returned
    BestOf,

    /// A longer completion, returned incrementally
    Stream,
}

impl CompletionPreset {
    pub fn all() -> impl Iterator<Item = CompletionPreset> {
        Self::iter()
    }

    pub fn defaults(self) -> CompletionDefaults {
        let base = CompletionDefaults::default();

        match self {
            CompletionPreset::Taglines => CompletionDefaults {
                temperature: 0.85,
                ..base
            },
            CompletionPreset::Names => CompletionDefaults {
                temperature: 0.5,
                max_output_tokens: 150,
                ..base
            },
            CompletionPreset::MultipleNames => CompletionDefaults {
                max_output_tokens: 60,
                sample_count: 5,
                ..base
            },
            CompletionPreset::BestOf => CompletionDefaults {
                model: "gpt-4o-mini",
                best_of: Some(5),
                ..base
            },
            CompletionPreset::Stream => CompletionDefaults {
                temperature: 0.8,
                max_output_tokens: 400,
                streaming: true,
                ..base
            },
        }
    }
}

/// The settings used when nothing in the environment overrides them
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompletionDefaults {
    pub model: &'static str,
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub sample_count: u32,
    pub best_of: Option<u32>,
    pub streaming: bool,
}

impl Default for CompletionDefaults {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo-instruct",
            temperature: 0.7,
            max_output_tokens: 120,
            sample_count: 1,
            best_of: None,
            streaming: false,
        }
    }
}

/// The settings of a completion request
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompletionConfig {
    pub model: String,
    pub temperature: f64,
    pub max_output_tokens: u32,

    /// How many independent completions to return
    pub sample_count: u32,

    /// How many completions the service generates to pick the best one from, if it should
    pub best_of: Option<u32>,

    pub streaming: bool,
}

impl CompletionConfig {
    /// Settings for a preset, with overrides from the process environment.
    pub fn from_env(preset: CompletionPreset) -> Self {
        Self::from_lookup(preset.defaults(), |name| std::env::var(name).ok())
    }

    /// Settings starting from `defaults`, with overrides from whatever `lookup` finds.
    ///
    /// Overrides that aren't valid numbers, or are out of range, are ignored.  An override of
    /// `BEST_OF` only applies if the defaults pick a best-of at all.
    pub fn from_lookup<F>(defaults: CompletionDefaults, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let model = lookup(MODEL_VAR)
            .map(|model| model.trim().to_string())
            .filter(|model| !model.is_empty())
            .unwrap_or_else(|| defaults.model.to_string());

        let temperature = match first_non_empty(&lookup, TEMPERATURE_VARS) {
            Some((name, raw)) => {
                decimal_or_default(name, Some(&raw), TEMPERATURE_RANGE, defaults.temperature)
            }
            None => defaults.temperature,
        };

        let count = |name: &str, default: u32| {
            count_or_default(name, lookup(name).as_deref(), 1, default)
        };

        let config = Self {
            model,
            temperature,
            max_output_tokens: count(MAX_TOKENS_VAR, defaults.max_output_tokens),
            sample_count: count(SAMPLE_COUNT_VAR, defaults.sample_count),
            best_of: defaults.best_of.map(|best_of| count(BEST_OF_VAR, best_of)),
            streaming: defaults.streaming,
        };
        debug!(?config, "Completion settings");

        config
    }
}

impl fmt::Display for CompletionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Model: {}  temperature={}  max_tokens={}  n={}",
            self.model, self.temperature, self.max_output_tokens, self.sample_count
        )?;
        if let Some(best_of) = self.best_of {
            write!(f, "  best_of={best_of}")?;
        }
        if self.streaming {
            write!(f, "  streaming")?;
        }

        Ok(())
    }
}

/// A prompt and the settings to complete it with
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub config: CompletionConfig,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, config: CompletionConfig) -> Self {
        Self {
            prompt: prompt.into(),
            config,
        }
    }

    /// How many tokens the prompt is, in the encoding of the request's model.
    ///
    /// If the model's encoding isn't known the baseline encoding is used, so this never fails.
    pub fn prompt_tokens(&self, resolver: &EncodingResolver) -> usize {
        resolver
            .resolve(Some(&self.config.model))
            .encoding()
            .encode_ordinary_iter(&self.prompt)
            .count()
    }
}

/// One step of an incrementally returned completion
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// The next piece of text
    Fragment(String),

    /// There's no more text
    End,
}

/// Incrementally returned completion text.
///
/// This is an `Iterator` rather than an async `Stream`.  A consumer that needs to do something else
/// while waiting should read it on its own thread.
pub type CompletionStream = Box<dyn Iterator<Item = Result<StreamEvent>> + Send>;

/// What a completion service returns
pub enum Completion {
    /// The one completion asked for
    Single(String),

    /// Several completions, in the order the service ranked or generated them
    Candidates(Vec<String>),

    /// A completion that is still being produced
    Stream(CompletionStream),
}

impl Completion {
    /// The text of each completion, waiting for a stream to finish if need be.
    ///
    /// A stream's fragments are joined into one text.  A stream that stops without an
    /// [`StreamEvent::End`] is treated as finished.
    pub fn into_texts(self) -> Result<Vec<String>> {
        match self {
            Completion::Single(text) => Ok(vec![text]),
            Completion::Candidates(texts) => Ok(texts),
            Completion::Stream(stream) => {
                let mut text = String::new();
                for event in stream {
                    match event? {
                        StreamEvent::Fragment(fragment) => text.push_str(&fragment),
                        StreamEvent::End => break,
                    }
                }

                Ok(vec![text])
            }
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completion::Single(text) => f.debug_tuple("Single").field(text).finish(),
            Completion::Candidates(texts) => f.debug_tuple("Candidates").field(texts).finish(),
            Completion::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Something that can complete a prompt.
///
/// Implementations should return [`Completion::Stream`] when the request asks for streaming,
/// [`Completion::Candidates`] when it asks for more than one sample, and [`Completion::Single`]
/// otherwise.
pub trait CompletionService: Send + Sync {
    fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
}
