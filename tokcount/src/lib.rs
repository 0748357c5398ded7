pub mod completion;
pub mod config;
mod error;
pub mod input;
pub mod report;
pub mod tokenize;

pub use error::*;
pub use input::{Entries, InputEntry, InputSource};
pub use report::{Report, ReportHeader, ReportRow, RunSummary};
pub use tokenize::{run, RunConfig, SpecialTokens};
