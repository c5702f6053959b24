//! Format detection and row parsing.
//!
//! Everything in this module is a pure function over byte or line buffers; no
//! I/O happens here. The coordinator feeds it the byte ranges it downloaded and
//! receives structured records back, together with an account of every row it
//! could not use.
//!
//! Components:
//! - `delimiter`: semicolon/comma detection over a sample of lines.
//! - `timestamp`: ordered timestamp format cascade, normalized to UTC.
//! - `row_parser`: delimited data rows, header detection, partial-row layouts.
//! - `log_parser`: server log lines carrying connection and world event markers.
//! - `types`: shared row and outcome types.

pub mod delimiter;
pub mod log_parser;
pub mod row_parser;
pub mod timestamp;
pub mod types;

pub use delimiter::detect_delimiter;
pub use log_parser::parse_log_content;
pub use row_parser::{parse_content, parse_rows};
pub use timestamp::parse_timestamp;
pub use types::{Delimiter, KillRecord, LogMarker, LogRecord, ParseOutcome, RawRow, SkippedRow};
