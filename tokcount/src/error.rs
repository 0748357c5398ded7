use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TokcountError {
    #[snafu(display("Input file '{}' does not exist", path.display()))]
    SourceNotFound { path: PathBuf },

    #[snafu(display("File I/O error on file '{}'", path.display()))]
    FileIo {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Error types for the tokcount crate.
pub type Result<T, E = TokcountError> = std::result::Result<T, E>;
