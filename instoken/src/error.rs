use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum InstokenError {
    #[snafu(display("The encoding '{encoding}' isn't one of the supported encodings"))]
    UnknownEncoding { encoding: String },

    #[snafu(display("File I/O error on file '{}'", path.display()))]
    FileIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Rank data line {line_number} is not of the form '<base64> <rank>'"))]
    MalformedRankLine { line_number: usize },

    #[snafu(display("Rank data line {line_number} has an invalid base64 token"))]
    InvalidBase64 {
        line_number: usize,
        source: base64::DecodeError,
    },

    #[snafu(display("Rank data line {line_number} has a non-integer rank"))]
    InvalidRank {
        line_number: usize,
        source: std::num::ParseIntError,
    },

    #[snafu(display("Rank data line {line_number} repeats a token that was already assigned a rank"))]
    DuplicateToken { line_number: usize },

    #[snafu(display("Rank {rank} is assigned to more than one token"))]
    DuplicateRank { rank: usize },

    #[snafu(display("Rank data has no token for the single byte {byte:#04x}"))]
    MissingByteToken { byte: u8 },

    #[snafu(display("Token {token} is not part of this encoding"))]
    UnknownToken { token: usize },

    #[snafu(display("Decoded tokens are not valid UTF-8"))]
    InvalidUtf8 { source: std::string::FromUtf8Error },
}
