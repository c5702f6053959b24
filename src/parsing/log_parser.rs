use log::{debug, trace};
use once_cell::sync::Lazy;
use regex::Regex;

use super::row_parser::{decode, is_degenerate};
use super::timestamp::parse_timestamp;
use super::types::{LogMarker, LogRecord, ParseOutcome, RawRow};
use crate::error_handling::types::ParseError;

/// `[2025.05.09-11.58.37:123][ 42]` line prefix.
static LINE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[(\d{4}\.\d{2}\.\d{2}-\d{2}\.\d{2}\.\d{2}):(\d{3})\]\[\s*\d+\]")
        .expect("line prefix pattern")
});

static MARKERS: Lazy<Vec<(LogMarker, Regex)>> = Lazy::new(|| {
    let patterns: [(LogMarker, &str); 9] = [
        (
            LogMarker::PlayerRegistered,
            r"LogOnline: Warning: Player \|([a-f0-9]+) successfully registered!",
        ),
        (
            LogMarker::PlayerUnregistered,
            r"LogOnline: Warning: Player \|([a-f0-9]+) successfully unregistered from the session",
        ),
        (
            LogMarker::PlayerLogin,
            r"LogSFPS: \[ASFPSGameSession::OnLogin\] Login = ([^,]+), ID = \|?([a-f0-9]+)",
        ),
        (
            LogMarker::PlayerKick,
            r"LogSFPS: Error: \[ASFPSGameSession::KickPlayer\] Login = ([^,]+), SteamId = ([^,]*), Msg = (.+)",
        ),
        (
            LogMarker::MissionState,
            r"LogSFPS: Mission ([^\s]+) switched to ([A-Z]+)",
        ),
        (LogMarker::Airdrop, r"LogSFPS: AirDrop switched to ([A-Za-z]+)"),
        (
            LogMarker::Helicrash,
            r"LogSFPS: GameplayEvent ([^\s]*HelicrashEvent[^\s]*) switched to ([A-Z]+)",
        ),
        (
            LogMarker::RoamingTrader,
            r"LogSFPS: GameplayEvent ([^\s]*RoamingTraderEvent[^\s]*) switched to ([A-Z]+)",
        ),
        (
            LogMarker::Convoy,
            r"LogSFPS: GameplayEvent ([^\s]*ConvoyEvent[^\s]*) switched to ([A-Z]+)",
        ),
    ];
    patterns
        .into_iter()
        .map(|(marker, pattern)| (marker, Regex::new(pattern).expect("log marker pattern")))
        .collect()
});

/// Extracts marker lines from a server log buffer.
///
/// Lines without the timestamp prefix or without a known marker are ignored
/// and not counted; a marker line whose timestamp cannot be parsed is counted
/// in `skipped`. `line_offset` keeps line numbers file-relative for
/// incremental reads.
pub fn parse_log_content(content: &[u8], file: &str, line_offset: usize) -> ParseOutcome<LogRecord> {
    let mut outcome = ParseOutcome::empty();
    if is_degenerate(content) {
        return outcome;
    }

    let text = decode(content);
    for (index, line) in text.lines().enumerate() {
        let line_number = line_offset + index + 1;
        let Some(row) = split_log_line(line.trim_end_matches('\r'), file, line_number) else {
            continue;
        };
        match map_log_row(&row) {
            Ok(record) => outcome.records.push(record),
            Err(e) => {
                trace!("Skipping log line {} of {}: {}", line_number, file, e);
                outcome.skip(line_number, e.to_string());
            }
        }
    }

    debug!(
        "Parsed {} log record(s) from {} ({} skipped)",
        outcome.records.len(),
        file,
        outcome.skipped
    );
    outcome
}

/// Turns a log line into a raw row `[timestamp, marker, captures...]`.
pub fn split_log_line(line: &str, file: &str, line_number: usize) -> Option<RawRow> {
    let prefix = LINE_PREFIX.captures(line)?;
    let whole = prefix.get(0)?;
    let rest = &line[whole.end()..];

    let (marker, captures) = MARKERS
        .iter()
        .find_map(|(marker, re)| re.captures(rest).map(|c| (*marker, c)))?;

    // "HH.MM.SS:mmm" becomes "HH.MM.SS.mmm" for the timestamp cascade.
    let mut fields = vec![
        format!("{}.{}", &prefix[1], &prefix[2]),
        marker.as_str().to_string(),
    ];
    fields.extend(
        captures
            .iter()
            .skip(1)
            .map(|m| m.map(|m| m.as_str().trim().to_string()).unwrap_or_default()),
    );

    Some(RawRow {
        fields,
        line_number,
        file: file.to_string(),
    })
}

/// Maps a raw log row onto a [`LogRecord`].
pub fn map_log_row(row: &RawRow) -> Result<LogRecord, ParseError> {
    if row.fields.len() < 2 {
        return Err(ParseError::TooFewFields {
            line: row.line_number,
            count: row.fields.len(),
        });
    }
    let timestamp = parse_timestamp(&row.fields[0])?;
    let marker = LogMarker::parse(&row.fields[1]).ok_or_else(|| ParseError::Malformed {
        line: row.line_number,
        reason: format!("unknown marker '{}'", row.fields[1]),
    })?;
    Ok(LogRecord {
        timestamp,
        marker,
        args: row.fields[2..].to_vec(),
        line_number: row.line_number,
        file: row.file.clone(),
    })
}
