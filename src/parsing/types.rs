//! Common data types used across the parsing subsystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Field delimiter of a data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Delimiter {
    Semicolon,
    Comma,
}

impl Delimiter {
    pub fn as_byte(self) -> u8 {
        match self {
            Delimiter::Semicolon => b';',
            Delimiter::Comma => b',',
        }
    }

    pub fn as_char(self) -> char {
        self.as_byte() as char
    }
}

/// One delimited line as read from a remote file, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub fields: Vec<String>,
    /// 1-based line number within the file.
    pub line_number: usize,
    pub file: String,
}

/// A row that was read but could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    pub line_number: usize,
    pub reason: String,
}

/// Semantic position of a field inside a data row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowField {
    Timestamp,
    ActorName,
    ActorId,
    VictimName,
    VictimId,
    Weapon,
    Distance,
    Platform,
    VictimPlatform,
}

/// A data row mapped onto its semantic fields.
///
/// `timestamp` is `None` when the row layout carries no timestamp; the
/// coordinator substitutes the ingestion time.
#[derive(Debug, Clone, PartialEq)]
pub struct KillRecord {
    pub timestamp: Option<DateTime<Utc>>,
    pub actor_name: String,
    pub actor_id: Option<String>,
    pub victim_name: String,
    pub victim_id: Option<String>,
    pub weapon: String,
    pub distance: Option<f64>,
    pub platform: Option<String>,
    pub victim_platform: Option<String>,
    pub line_number: usize,
    pub file: String,
}

impl KillRecord {
    pub(crate) fn empty(line_number: usize, file: &str) -> Self {
        Self {
            timestamp: None,
            actor_name: String::new(),
            actor_id: None,
            victim_name: String::new(),
            victim_id: None,
            weapon: String::new(),
            distance: None,
            platform: None,
            victim_platform: None,
            line_number,
            file: file.to_string(),
        }
    }
}

/// Event marker found in a server log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogMarker {
    PlayerRegistered,
    PlayerUnregistered,
    PlayerLogin,
    PlayerKick,
    MissionState,
    Airdrop,
    Helicrash,
    RoamingTrader,
    Convoy,
}

impl LogMarker {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogMarker::PlayerRegistered => "register",
            LogMarker::PlayerUnregistered => "unregister",
            LogMarker::PlayerLogin => "login",
            LogMarker::PlayerKick => "kick",
            LogMarker::MissionState => "mission",
            LogMarker::Airdrop => "airdrop",
            LogMarker::Helicrash => "helicrash",
            LogMarker::RoamingTrader => "trader",
            LogMarker::Convoy => "convoy",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "register" => Some(LogMarker::PlayerRegistered),
            "unregister" => Some(LogMarker::PlayerUnregistered),
            "login" => Some(LogMarker::PlayerLogin),
            "kick" => Some(LogMarker::PlayerKick),
            "mission" => Some(LogMarker::MissionState),
            "airdrop" => Some(LogMarker::Airdrop),
            "helicrash" => Some(LogMarker::Helicrash),
            "trader" => Some(LogMarker::RoamingTrader),
            "convoy" => Some(LogMarker::Convoy),
            _ => None,
        }
    }

    /// Player lifecycle markers, as opposed to world events.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            LogMarker::PlayerRegistered
                | LogMarker::PlayerUnregistered
                | LogMarker::PlayerLogin
                | LogMarker::PlayerKick
        )
    }
}

/// A server log line carrying a recognised marker.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub marker: LogMarker,
    /// Marker-specific captures, in pattern order.
    pub args: Vec<String>,
    pub line_number: usize,
    pub file: String,
}

/// Result of parsing one buffer: usable records plus an account of the rows
/// that were dropped.
#[derive(Debug, Clone)]
pub struct ParseOutcome<T> {
    pub records: Vec<T>,
    pub skipped: usize,
    pub skipped_rows: Vec<SkippedRow>,
    /// Delimiter applied to the buffer; `None` when nothing was parsed.
    pub delimiter: Option<Delimiter>,
}

impl<T> ParseOutcome<T> {
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            skipped: 0,
            skipped_rows: Vec::new(),
            delimiter: None,
        }
    }

    pub(crate) fn skip(&mut self, line_number: usize, reason: impl Into<String>) {
        self.skipped += 1;
        self.skipped_rows.push(SkippedRow {
            line_number,
            reason: reason.into(),
        });
    }
}
