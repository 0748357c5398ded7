//! Tokenization functions which process input entries into the token counts of a report
use crate::input::{InputEntry, InputSource};
use crate::report::{Report, ReportHeader, ReportRow};
use crate::Result;
use instoken::{Encoding, EncodingResolver, TokenInt};
use tracing::*;

/// How text that looks like a special token (`<|endoftext|>` and friends) is tokenized
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpecialTokens {
    /// Special token text is ordinary text, and is broken up into ordinary tokens
    #[default]
    Ordinary,

    /// Special token text becomes the special token
    Allowed,
}

/// Everything a counting run needs to know, other than where to find the encodings
#[derive(Clone, Debug, Default)]
pub struct RunConfig {
    pub source: InputSource,

    /// Name of the model the text is meant for, if known
    pub model_hint: Option<String>,

    pub special_tokens: SpecialTokens,
}

/// Tokenize a single piece of text
pub fn tokenize(encoding: &Encoding, text: &str, special_tokens: SpecialTokens) -> Vec<TokenInt> {
    match special_tokens {
        SpecialTokens::Ordinary => encoding.encode_ordinary(text),
        SpecialTokens::Allowed => encoding.encode(text),
    }
}

/// Tokenize one entry into its report row
pub fn tokenize_entry(
    encoding: &Encoding,
    entry: &InputEntry,
    special_tokens: SpecialTokens,
) -> ReportRow {
    let token_ids = tokenize(encoding, &entry.text, special_tokens);
    trace!(position = entry.position,
        token_count = token_ids.len(),
        "Tokenized entry");

    ReportRow::new(entry, token_ids)
}

/// Tokenize entries in the order they're produced
pub fn tokenize_entries(
    encoding: &Encoding,
    entries: impl IntoIterator<Item = InputEntry>,
    special_tokens: SpecialTokens,
) -> Vec<ReportRow> {
    entries
        .into_iter()
        .map(|entry| tokenize_entry(encoding, &entry, special_tokens))
        .collect()
}

/// Count the tokens of every entry of the configured input.
///
/// The input is opened before anything else happens, so if it can't be read the run fails without
/// producing any rows.  Resolving the encoding never fails.
pub fn run(resolver: &EncodingResolver, config: &RunConfig) -> Result<Report> {
    let entries = config.source.entries()?;

    let resolution = resolver.resolve(config.model_hint.as_deref());
    debug!(source = %config.source,
        encoding = resolution.encoding().name(),
        fell_back = resolution.is_fallback(),
        "Counting tokens");

    let header = ReportHeader::new(&resolution, config.model_hint.as_deref());
    let rows = tokenize_entries(resolution.encoding(), entries, config.special_tokens);

    Ok(Report::new(header, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::DEFAULT_SAMPLES;
    use crate::test_helpers::init_test_logging;
    use crate::TokcountError;
    use assert_matches::assert_matches;
    use instoken::EncodingType;

    #[test]
    fn default_run_counts_both_samples() {
        init_test_logging();
        let resolver = EncodingResolver::new();

        let report = run(&resolver, &RunConfig::default()).unwrap();

        assert_eq!("cl100k_base", report.header().encoding);
        assert_eq!(None, report.header().model_hint);
        assert!(!report.header().unrecognized_hint);
        assert_eq!(2, report.rows().len());
        for (row, sample) in report.rows().iter().zip(DEFAULT_SAMPLES) {
            assert!(row.token_count > 0);
            assert!(row.token_count < sample.chars().count());
        }
    }

    #[test]
    fn known_model_hint_picks_its_encoding() {
        init_test_logging();
        let resolver = EncodingResolver::new();
        let config = RunConfig {
            source: InputSource::Text("Purr Purrs Meow Purr purr purrs meow".to_string()),
            model_hint: Some("gpt-4o-mini".to_string()),
            ..Default::default()
        };

        let report = run(&resolver, &config).unwrap();

        assert_eq!("o200k_base", report.header().encoding);
        assert_eq!(
            resolver
                .encoding(EncodingType::O200kBase)
                .encode_ordinary("Purr Purrs Meow Purr purr purrs meow"),
            report.rows()[0].token_ids
        );
    }

    #[test]
    fn unknown_model_hint_is_flagged_not_fatal() {
        init_test_logging();
        let resolver = EncodingResolver::new();
        let config = RunConfig {
            source: InputSource::Text("hello".to_string()),
            model_hint: Some("not-a-real-model-xyz".to_string()),
            ..Default::default()
        };

        let report = run(&resolver, &config).unwrap();

        assert_eq!("cl100k_base", report.header().encoding);
        assert!(report.header().unrecognized_hint);
        assert_eq!(1, report.summary().total_entries);
    }

    #[test]
    fn missing_file_fails_the_run() {
        init_test_logging();
        let dir = tempfile::tempdir().unwrap();
        let resolver = EncodingResolver::new();
        let config = RunConfig {
            source: InputSource::File(dir.path().join("missing.txt")),
            ..Default::default()
        };

        assert_matches!(
            run(&resolver, &config),
            Err(TokcountError::SourceNotFound { .. })
        );

        // Nothing was resolved, so nothing was loaded
        assert_eq!(0, resolver.cache().loaded().count());
    }

    #[test]
    fn special_token_handling() {
        let encoding = Encoding::new(EncodingType::Cl100kBase);
        let text = "end<|endoftext|>";

        let ordinary = tokenize(&encoding, text, SpecialTokens::Ordinary);
        let allowed = tokenize(&encoding, text, SpecialTokens::Allowed);

        assert!(!ordinary.contains(&100257));
        assert_eq!(Some(&100257), allowed.last());
    }

    #[test]
    fn entries_keep_their_positions() {
        let encoding = Encoding::new(EncodingType::R50kBase);
        let entries = vec![
            InputEntry {
                position: 1,
                text: "one".to_string(),
            },
            InputEntry {
                position: 2,
                text: String::new(),
            },
        ];

        let rows = tokenize_entries(&encoding, entries, SpecialTokens::Ordinary);

        assert_eq!(vec![1, 2], rows.iter().map(|r| r.position).collect::<Vec<_>>());
        assert_eq!(0, rows[1].token_count);
    }
}
