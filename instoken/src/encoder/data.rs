//! Rank tables ("mergeable ranks" in tiktoken parlance) for each encoding.
//!
//! The tables OpenAI publishes are compiled into the binary with `rust-embed`.  In debug builds
//! `rust-embed` reads them from the crate's `tokens` directory instead, which keeps rebuilds fast.
//! The text format is one `<base64 token bytes> <rank>` pair per line.
//!
//! A vocabulary directory can hold replacement tables in the same format, named
//! `<table>.tiktoken`.  Those are read from disk and validated before use, since unlike the
//! embedded data there's no guarantee they're well formed.
use super::EncodingType;
use crate::error::*;
use crate::{Result, TokenInt, TokenString};
use base64::{engine::general_purpose, Engine as _};
use rust_embed::RustEmbed;
use rustc_hash::FxHashSet;
use snafu::{ensure, OptionExt, ResultExt};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(RustEmbed)]
#[folder = "tokens/cl100k_base"]
struct Cl100kBase;

#[derive(RustEmbed)]
#[folder = "tokens/o200k_base"]
struct O200kBase;

#[derive(RustEmbed)]
#[folder = "tokens/p50k_base"]
struct P50kBase; // NOTE: p50k_edit and p50k_base share the same tokens

#[derive(RustEmbed)]
#[folder = "tokens/r50k_base"]
struct R50kBase;

/// Where the rank table of a loaded encoding came from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RankSource {
    /// The published table compiled into this crate
    Embedded,

    /// A table read from a vocabulary directory
    File(PathBuf),
}

impl fmt::Display for RankSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankSource::Embedded => write!(f, "embedded"),
            RankSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Load the embedded rank table for an encoding.
///
/// These are compiled in to the crate so this operation should be infallible unless the embedded
/// data is somehow invalid.  In that case this code will panic.
pub(crate) fn embedded_rank_data(typ: EncodingType) -> Vec<(TokenString, TokenInt)> {
    let file_name = typ.rank_file_name();
    let file = match typ {
        EncodingType::Cl100kBase => Cl100kBase::get(&file_name),
        EncodingType::O200kBase => O200kBase::get(&file_name),
        EncodingType::P50kBase | EncodingType::P50kEdit => P50kBase::get(&file_name),
        EncodingType::R50kBase => R50kBase::get(&file_name),
    }
    .expect("BUG: Required embedded data is missing");

    parse_rank_data(file.data.as_ref())
        .unwrap_or_else(|e| panic!("BUG: Embedded rank data for {typ} is invalid: {e}"))
}

/// Read and validate a rank table from a file.
///
/// The whole file is read in one go and closed before parsing starts.
pub(crate) fn load_rank_file(path: &Path) -> Result<Vec<(TokenString, TokenInt)>> {
    let data = std::fs::read(path).context(FileIoSnafu { path })?;

    parse_rank_data(&data)
}

/// Parse rank data in the `.tiktoken` text format.
///
/// On top of the syntax, this checks the two properties the tokenizer relies on: no byte string
/// or rank appears twice, and each of the 256 single bytes has a token so any input can be
/// encoded.  Blank lines are ignored.
pub(crate) fn parse_rank_data(data: &[u8]) -> Result<Vec<(TokenString, TokenInt)>> {
    let text = String::from_utf8_lossy(data);

    let mut seen_tokens = FxHashSet::default();
    let mut seen_ranks = FxHashSet::default();
    let mut tokens = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line_number = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let (bytes, rank) = line
            .split_once(' ')
            .context(MalformedRankLineSnafu { line_number })?;
        let bytes = general_purpose::STANDARD
            .decode(bytes)
            .context(InvalidBase64Snafu { line_number })?;
        let rank = rank
            .trim()
            .parse::<TokenInt>()
            .context(InvalidRankSnafu { line_number })?;

        ensure!(seen_ranks.insert(rank), DuplicateRankSnafu { rank });
        ensure!(
            seen_tokens.insert(bytes.clone()),
            DuplicateTokenSnafu { line_number }
        );

        tokens.push((bytes, rank));
    }

    if let Some(byte) = (0..=u8::MAX).find(|byte| !seen_tokens.contains([*byte].as_slice())) {
        return MissingByteTokenSnafu { byte }.fail();
    }

    Ok(tokens)
}
