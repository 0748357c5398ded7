//! Where the text to count comes from.
//!
//! Inputs are either an inline string, a file of prompts with one prompt per line, or (when
//! nothing is given) a couple of built-in samples.
use crate::error::*;
use itertools::Itertools;
use snafu::ResultExt;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::*;

/// Arguments that start with this are a path to a file of prompts rather than a prompt
pub const FILE_MARKER: &str = "file:";

/// Counted when no input is given at all
pub const DEFAULT_SAMPLES: [&str; 2] = [
    "Suggest three concise pet salon taglines emphasizing friendly personalized care.",
    "Purr Purrs Meow Purr purr purrs meow",
];

/// One piece of text to count, and where it falls in the run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputEntry {
    /// 1-based position among the entries of the run
    pub position: usize,

    pub text: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum InputSource {
    /// The built-in samples in [`DEFAULT_SAMPLES`]
    #[default]
    Defaults,

    /// A file of prompts, one per non-blank line
    File(PathBuf),

    /// A single prompt
    Text(String),
}

impl InputSource {
    /// Interpret command line arguments as an input source.
    ///
    /// The arguments are joined with single spaces.  If that starts with [`FILE_MARKER`], the rest
    /// is the path of a file of prompts; otherwise the joined text is the one and only prompt.
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let args: Vec<String> = args
            .into_iter()
            .map(|arg| arg.as_ref().to_string())
            .collect();
        if args.is_empty() {
            return InputSource::Defaults;
        }

        let joined = args.iter().join(" ");
        match joined.strip_prefix(FILE_MARKER) {
            Some(path) => InputSource::File(PathBuf::from(path)),
            None => InputSource::Text(joined),
        }
    }

    /// Start producing the entries of this source.
    ///
    /// A file source is read in full here, so a missing or unreadable file is reported before any
    /// entry is produced.  Each call starts over from the first entry.
    pub fn entries(&self) -> Result<Entries> {
        let texts: Box<dyn Iterator<Item = String> + Send> = match self {
            InputSource::Defaults => Box::new(DEFAULT_SAMPLES.into_iter().map(String::from)),
            InputSource::Text(text) => Box::new(std::iter::once(text.clone())),
            InputSource::File(path) => Box::new(NonBlankLines::new(read_text_file(path)?)),
        };

        Ok(Entries { texts, position: 0 })
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::Defaults => write!(f, "built-in samples"),
            InputSource::File(path) => write!(f, "{FILE_MARKER}{}", path.display()),
            InputSource::Text(_) => write!(f, "inline text"),
        }
    }
}

/// The entries of an [`InputSource`], produced lazily in order.
pub struct Entries {
    texts: Box<dyn Iterator<Item = String> + Send>,
    position: usize,
}

impl std::fmt::Debug for Entries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entries")
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

impl Iterator for Entries {
    type Item = InputEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let text = self.texts.next()?;
        self.position += 1;

        Some(InputEntry {
            position: self.position,
            text,
        })
    }
}

/// Read a whole file as text, replacing any invalid UTF-8.
fn read_text_file(path: &Path) -> Result<String> {
    let contents = match std::fs::read(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return SourceNotFoundSnafu { path }.fail();
        }
        Err(e) => return Err(e).context(FileIoSnafu { path }),
    };

    // The file might or might not be valid Unicode text.  If it contains some invalid Unicode code
    // points, rather than fail, just substitute them
    match String::from_utf8(contents) {
        Ok(text) => Ok(text),
        Err(e) => {
            warn!(path = %path.display(),
                "Input file did not decode as clean UTF-8.  \
                Invalid bytes have been replaced with a UTF-8 placeholder sequence, \
                so token counts will not exactly match the file");
            Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
        }
    }
}

/// The characters that end a line.  A `\r\n` pair ends just one.
fn is_line_boundary(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r'
            | '\x0b'
            | '\x0c'
            | '\x1c'
            | '\x1d'
            | '\x1e'
            | '\u{85}'
            | '\u{2028}'
            | '\u{2029}'
    )
}

/// Yields each line of some text with surrounding whitespace trimmed, skipping lines that are
/// empty after trimming.
struct NonBlankLines {
    text: String,

    /// Byte offset of the start of the next line
    offset: usize,
}

impl NonBlankLines {
    fn new(text: String) -> Self {
        Self { text, offset: 0 }
    }
}

impl Iterator for NonBlankLines {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        while self.offset < self.text.len() {
            let rest = &self.text[self.offset..];

            let (line, consumed) = match rest.char_indices().find(|(_, c)| is_line_boundary(*c)) {
                Some((end, c)) => {
                    let mut consumed = end + c.len_utf8();
                    if c == '\r' && rest[consumed..].starts_with('\n') {
                        consumed += 1;
                    }
                    (&rest[..end], consumed)
                }
                None => (rest, rest.len()),
            };
            self.offset += consumed;

            let line = line.trim();
            if !line.is_empty() {
                return Some(line.to_string());
            }
        }

        None
    }
}
