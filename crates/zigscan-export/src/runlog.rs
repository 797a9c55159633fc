//! Run log rows.
//!
//! Every archived sample appends one CSV row recording the parameters
//! the path was generated with. The dialect uses `,` as delimiter and
//! `|` as quote character; a field is quoted only when it contains the
//! delimiter, the quote character, or a line break, and embedded quote
//! characters are doubled.
//!
//! This module only formats text. Opening and appending to the log file
//! is done by `zigscan-io`.

use std::fmt;
use std::fmt::Write;

use zigscan_pipeline::RunConfig;

/// First line of every run log file.
pub const RUN_LOG_HEADER: &str = "Sample Name,Timestamp,Spacing,Dilation,Background Threshold";

const DELIMITER: char = ',';
const QUOTE: char = '|';

/// One row of the run log.
#[derive(Debug, Clone)]
pub struct RunLogEntry<'a> {
    /// Operator-supplied sample name (also the archive file stem).
    pub sample: &'a str,
    /// When the sample was archived.
    pub timestamp: Timestamp,
    /// Scan line spacing (mm).
    pub spacing_mm: f64,
    /// Safety margin (mm).
    pub dilation_mm: f64,
    /// Foreground threshold.
    pub threshold: u8,
}

impl<'a> RunLogEntry<'a> {
    /// Build a row from the config a path was generated with.
    #[must_use]
    pub const fn new(sample: &'a str, timestamp: Timestamp, config: &RunConfig) -> Self {
        Self {
            sample,
            timestamp,
            spacing_mm: config.spacing_mm,
            dilation_mm: config.dilation_mm,
            threshold: config.threshold,
        }
    }
}

/// Format `entry` as one CSV line, including the trailing `\n`.
///
/// Numbers use their shortest round-trip form with at least one decimal
/// place for the millimeter fields (`20.0`, `12.5`).
///
/// # Examples
///
/// ```
/// use zigscan_export::{RunLogEntry, Timestamp, to_csv_row};
///
/// let row = to_csv_row(&RunLogEntry {
///     sample: "denim, blue",
///     timestamp: Timestamp::from_unix_seconds(0),
///     spacing_mm: 20.0,
///     dilation_mm: 10.0,
///     threshold: 50,
/// });
/// assert_eq!(row, "|denim, blue|,1970-01-01 00:00:00,20.0,10.0,50\n");
/// ```
#[must_use]
pub fn to_csv_row(entry: &RunLogEntry<'_>) -> String {
    let fields = [
        entry.sample.to_owned(),
        entry.timestamp.to_string(),
        format!("{:?}", entry.spacing_mm),
        format!("{:?}", entry.dilation_mm),
        entry.threshold.to_string(),
    ];
    let mut out = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(DELIMITER);
        }
        push_field(&mut out, field);
    }
    out.push('\n');
    out
}

fn push_field(out: &mut String, field: &str) {
    let needs_quotes = field
        .chars()
        .any(|c| c == DELIMITER || c == QUOTE || c == '\n' || c == '\r');
    if !needs_quotes {
        out.push_str(field);
        return;
    }
    out.push(QUOTE);
    for c in field.chars() {
        if c == QUOTE {
            out.push(QUOTE);
        }
        out.push(c);
    }
    out.push(QUOTE);
}

/// A UTC wall-clock time at one second resolution.
///
/// Displays as `YYYY-MM-DD HH:MM:SS`; [`Timestamp::file_stamp`] gives
/// the minute-resolution form used in log file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    pub year: i64,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Timestamp {
    /// Convert seconds since the Unix epoch to a calendar date and time.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub const fn from_unix_seconds(secs: u64) -> Self {
        let days = (secs / 86_400) as i64;
        let rem = secs % 86_400;
        let (year, month, day) = civil_from_days(days);
        Self {
            year,
            month,
            day,
            hour: (rem / 3600) as u8,
            minute: (rem % 3600 / 60) as u8,
            second: (rem % 60) as u8,
        }
    }

    /// `YYYY-MM-DD_HH-MM`, safe for file names on every platform.
    #[must_use]
    pub fn file_stamp(&self) -> String {
        let mut out = String::with_capacity(16);
        let _ = write!(
            out,
            "{:04}-{:02}-{:02}_{:02}-{:02}",
            self.year, self.month, self.day, self.hour, self.minute
        );
        out
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Proleptic Gregorian date for a day count relative to 1970-01-01
/// (Howard Hinnant's `civil_from_days`).
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn civil_from_days(days: i64) -> (i64, u8, u8) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };
    (year, month as u8, day as u8)
}
