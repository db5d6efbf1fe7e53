//! Rendering of the "due in" value: raw minutes or an absolute timestamp.

use chrono::{Local, NaiveDateTime, TimeDelta, Timelike, Utc};

/// How arrival times are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeMode {
    /// Minutes from now, passed through as sent by the service.
    #[default]
    Relative,
    /// Wall-clock timestamp of the arrival.
    Absolute,
}

impl TimeMode {
    pub fn from_relative_flag(is_relative: bool) -> Self {
        if is_relative {
            TimeMode::Relative
        } else {
            TimeMode::Absolute
        }
    }
}

/// Which wall clock absolute timestamps are computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Clock {
    #[default]
    Local,
    Utc,
}

impl Clock {
    pub fn from_utc_flag(is_utc: bool) -> Self {
        if is_utc { Clock::Utc } else { Clock::Local }
    }

    /// Current time on this clock, without offset information.
    pub fn now(self) -> NaiveDateTime {
        match self {
            Clock::Local => Local::now().naive_local(),
            Clock::Utc => Utc::now().naive_utc(),
        }
    }
}

/// The minute count could not be turned into a timestamp.
#[derive(Debug, thiserror::Error)]
pub enum DueInError {
    #[error("minutes '{0}' is not an integer")]
    NotInteger(String),

    #[error("minutes '{0}' overflows the calendar")]
    OutOfRange(String),
}

/// Renders `minutes` per `mode`. `now` is only consulted in absolute mode.
///
/// Absolute timestamps look like `2024-01-01T00:05:00`, with a
/// microsecond fraction only when the reference time has one.
///
/// # Errors
///
/// In absolute mode, fails if `minutes` is not a (whitespace-trimmed)
/// integer or the sum leaves chrono's supported range.
pub fn normalize(minutes: &str, mode: TimeMode, now: NaiveDateTime) -> Result<String, DueInError> {
    match mode {
        TimeMode::Relative => Ok(minutes.to_string()),
        TimeMode::Absolute => {
            let n: i64 = minutes
                .trim()
                .parse()
                .map_err(|_| DueInError::NotInteger(minutes.to_string()))?;
            let due = TimeDelta::try_minutes(n)
                .and_then(|delta| now.checked_add_signed(delta))
                .ok_or_else(|| DueInError::OutOfRange(minutes.to_string()))?;
            Ok(iso_format(due))
        }
    }
}

fn iso_format(t: NaiveDateTime) -> String {
    let micros = t.nanosecond() / 1_000;
    if micros == 0 {
        t.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        format!("{}.{:06}", t.format("%Y-%m-%dT%H:%M:%S"), micros)
    }
}
