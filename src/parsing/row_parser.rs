use std::borrow::Cow;

use log::{debug, trace};

use super::delimiter::{detect_delimiter, sample_lines};
use super::timestamp::parse_timestamp;
use super::types::{Delimiter, KillRecord, ParseOutcome, RawRow, RowField};
use crate::error_handling::types::ParseError;

/// Rows with fewer fields carry no usable identity.
pub const MIN_FIELDS: usize = 3;

/// Buffers with fewer non-whitespace bytes are treated as empty.
pub const MIN_CONTENT_BYTES: usize = 10;

/// Column names recognised in a header row. Two matches make a header.
const HEADER_NAMES: &[&str] = &[
    "timestamp",
    "time",
    "date",
    "datetime",
    "killer",
    "killer_name",
    "killername",
    "killer_id",
    "killerid",
    "victim",
    "victim_name",
    "victimname",
    "victim_id",
    "victimid",
    "weapon",
    "distance",
    "platform",
    "killer_console",
    "victim_console",
];

use RowField::*;

const LAYOUT_3: &[RowField] = &[ActorName, VictimName, Weapon];
const LAYOUT_4: &[RowField] = &[Timestamp, ActorName, VictimName, Weapon];
const LAYOUT_5: &[RowField] = &[Timestamp, ActorName, ActorId, VictimName, Weapon];
const LAYOUT_6: &[RowField] = &[Timestamp, ActorName, ActorId, VictimName, VictimId, Weapon];
const LAYOUT_7: &[RowField] = &[
    Timestamp, ActorName, ActorId, VictimName, VictimId, Weapon, Distance,
];
const LAYOUT_8: &[RowField] = &[
    Timestamp, ActorName, ActorId, VictimName, VictimId, Weapon, Distance, Platform,
];
const LAYOUT_9: &[RowField] = &[
    Timestamp,
    ActorName,
    ActorId,
    VictimName,
    VictimId,
    Weapon,
    Distance,
    Platform,
    VictimPlatform,
];

/// Field layout for a row of `field_count` fields. Rows wider than nine use
/// the nine-field layout and ignore the extras.
pub fn layout_for(field_count: usize) -> Option<&'static [RowField]> {
    match field_count {
        0..=2 => None,
        3 => Some(LAYOUT_3),
        4 => Some(LAYOUT_4),
        5 => Some(LAYOUT_5),
        6 => Some(LAYOUT_6),
        7 => Some(LAYOUT_7),
        8 => Some(LAYOUT_8),
        _ => Some(LAYOUT_9),
    }
}

/// True when the buffer holds fewer than [`MIN_CONTENT_BYTES`] non-whitespace
/// bytes.
pub fn is_degenerate(content: &[u8]) -> bool {
    content
        .iter()
        .filter(|b| !b.is_ascii_whitespace())
        .take(MIN_CONTENT_BYTES)
        .count()
        < MIN_CONTENT_BYTES
}

/// Decodes remote bytes as UTF-8, replacing invalid sequences and dropping a
/// leading byte-order mark.
pub fn decode(content: &[u8]) -> Cow<'_, str> {
    let content = content.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(content);
    String::from_utf8_lossy(content)
}

/// Detects the delimiter of a whole buffer and parses it, allowing a header on
/// its first row. Never fails: degenerate input yields an empty outcome and
/// unusable rows are counted in `skipped`.
pub fn parse_content(content: &[u8], file: &str) -> ParseOutcome<KillRecord> {
    if is_degenerate(content) {
        trace!("Skipping degenerate buffer from {}", file);
        return ParseOutcome::empty();
    }
    let text = decode(content);
    let delimiter = detect_delimiter(&sample_lines(&text));
    parse_rows(content, delimiter, file, 0, true)
}

/// Parses a buffer with a known delimiter.
///
/// Incremental reads pass the delimiter detected when the file was first seen
/// and `allow_header = false`. `line_offset` is the number of lines already
/// consumed from the file and keeps reported line numbers file-relative.
pub fn parse_rows(
    content: &[u8],
    delimiter: Delimiter,
    file: &str,
    line_offset: usize,
    allow_header: bool,
) -> ParseOutcome<KillRecord> {
    let mut outcome = ParseOutcome::empty();
    if content.iter().all(|b| b.is_ascii_whitespace()) {
        return outcome;
    }
    outcome.delimiter = Some(delimiter);

    let text = decode(content);
    let (rows, unreadable) = split_rows(&text, delimiter, file, line_offset);
    for line in unreadable {
        outcome.skip(line, "unreadable record");
    }

    let mut header_checked = !allow_header;
    for row in rows {
        if !header_checked {
            header_checked = true;
            if is_header(&row.fields) {
                debug!("Skipping header row in {}", file);
                continue;
            }
        }
        match map_row(&row) {
            Ok(record) => outcome.records.push(record),
            Err(e) => {
                trace!("Skipping row {} of {}: {}", row.line_number, file, e);
                outcome.skip(row.line_number, e.to_string());
            }
        }
    }

    debug!(
        "Parsed {} record(s) from {} ({} skipped)",
        outcome.records.len(),
        file,
        outcome.skipped
    );
    outcome
}

/// Splits text into raw rows, one line at a time so a stray quote cannot
/// swallow the lines after it. Blank lines are dropped; lines the reader
/// cannot decode are reported by line number.
pub fn split_rows(
    text: &str,
    delimiter: Delimiter,
    file: &str,
    line_offset: usize,
) -> (Vec<RawRow>, Vec<usize>) {
    let mut rows = Vec::new();
    let mut unreadable = Vec::new();
    for (index, line) in text.split('\n').enumerate() {
        let line_number = line_offset + index + 1;
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            continue;
        }
        match read_line(line, delimiter) {
            Ok(Some(fields)) if fields.iter().any(|f| !f.is_empty()) => rows.push(RawRow {
                fields,
                line_number,
                file: file.to_string(),
            }),
            Ok(_) => {}
            Err(e) => {
                debug!("Unreadable record at {}:{}: {}", file, line_number, e);
                unreadable.push(line_number);
            }
        }
    }
    (rows, unreadable)
}

/// Reads the fields of one line. A line with unbalanced quotes is read again
/// with quoting disabled and stray quotes trimmed from its fields.
fn read_line(line: &str, delimiter: Delimiter) -> Result<Option<Vec<String>>, csv::Error> {
    let balanced = line.matches('"').count() % 2 == 0;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter.as_byte())
        .has_headers(false)
        .flexible(true)
        .quoting(balanced)
        .trim(csv::Trim::All)
        .from_reader(line.as_bytes());

    let mut record = csv::StringRecord::new();
    if !reader.read_record(&mut record)? {
        return Ok(None);
    }
    let fields = record
        .iter()
        .map(|f| {
            if balanced {
                f.to_string()
            } else {
                f.trim_matches('"').trim().to_string()
            }
        })
        .collect();
    Ok(Some(fields))
}

fn is_header(fields: &[String]) -> bool {
    fields
        .iter()
        .filter(|f| {
            let lower = f.trim().to_lowercase();
            HEADER_NAMES.contains(&lower.as_str())
        })
        .count()
        >= 2
}

/// Maps a raw row onto semantic fields according to its width.
pub fn map_row(row: &RawRow) -> Result<KillRecord, ParseError> {
    let layout = layout_for(row.fields.len()).ok_or(ParseError::TooFewFields {
        line: row.line_number,
        count: row.fields.len(),
    })?;

    let mut record = KillRecord::empty(row.line_number, &row.file);
    for (field, value) in layout.iter().zip(row.fields.iter()) {
        let value = value.trim();
        match field {
            Timestamp => {
                if !value.is_empty() {
                    record.timestamp = Some(parse_timestamp(value)?);
                }
            }
            ActorName => record.actor_name = value.to_string(),
            ActorId => record.actor_id = non_empty(value),
            VictimName => record.victim_name = value.to_string(),
            VictimId => record.victim_id = non_empty(value),
            Weapon => record.weapon = value.to_string(),
            Distance => record.distance = value.parse::<f64>().ok().filter(|d| d.is_finite()),
            Platform => record.platform = non_empty(value),
            VictimPlatform => record.victim_platform = non_empty(value),
        }
    }

    if record.actor_name.is_empty() && record.victim_name.is_empty() {
        return Err(ParseError::Malformed {
            line: row.line_number,
            reason: "no actor or victim name".to_string(),
        });
    }
    Ok(record)
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
