use log::debug;

use super::types::Delimiter;

/// Number of non-empty lines inspected when detecting the delimiter.
pub const SAMPLE_LINES: usize = 10;

/// Upward weighting applied to semicolon counts. Semicolon-delimited files are
/// the common case and commas show up inside free-text fields.
pub const SEMICOLON_WEIGHT: usize = 3;

/// Returns the first [`SAMPLE_LINES`] non-empty lines of `text`.
pub fn sample_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty())
        .take(SAMPLE_LINES)
        .collect()
}

/// Picks the delimiter for a file from a sample of its lines.
///
/// Counts semicolons and commas outside double-quoted spans, weights the
/// semicolon count by [`SEMICOLON_WEIGHT`] and returns the higher scorer.
/// Ties, including a sample with neither character, go to semicolon.
pub fn detect_delimiter<S: AsRef<str>>(sample: &[S]) -> Delimiter {
    let mut semicolons = 0usize;
    let mut commas = 0usize;

    for line in sample {
        let (s, c) = count_unquoted(line.as_ref());
        semicolons += s;
        commas += c;
    }

    let semicolon_score = semicolons * SEMICOLON_WEIGHT;
    let delimiter = if commas > semicolon_score {
        Delimiter::Comma
    } else {
        Delimiter::Semicolon
    };

    debug!(
        "Detected delimiter '{}' (semicolons={} weighted={}, commas={})",
        delimiter.as_char(),
        semicolons,
        semicolon_score,
        commas
    );
    delimiter
}

/// Counts `;` and `,` that are not inside a double-quoted span. A doubled
/// quote inside a span toggles twice and leaves the span open.
fn count_unquoted(line: &str) -> (usize, usize) {
    let mut in_quotes = false;
    let mut semicolons = 0;
    let mut commas = 0;
    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => semicolons += 1,
            ',' if !in_quotes => commas += 1,
            _ => {}
        }
    }
    (semicolons, commas)
}
