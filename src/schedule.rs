//! Daily block window evaluation.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{BlockerError, Result};

const TIME_FORMAT: &str = "%H:%M";

/// A daily time-of-day interval during which blocking is active.
///
/// Times have minute resolution. `end` earlier than `start` is legal and
/// denotes a window that wraps past midnight.
///
/// # Example
///
/// ```
/// use chrono::NaiveTime;
/// use hosts_blocker::BlockWindow;
///
/// let night: BlockWindow = "22:00-06:00".parse().unwrap();
/// assert!(night.wraps_midnight());
/// assert!(night.contains(NaiveTime::from_hms_opt(23, 30, 0).unwrap()));
/// assert!(!night.contains(NaiveTime::from_hms_opt(12, 0, 0).unwrap()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WindowRepr", into = "WindowRepr")]
pub struct BlockWindow {
    start: NaiveTime,
    end: NaiveTime,
    wraps_midnight: bool,
}

impl BlockWindow {
    /// Creates a window, truncating both ends to whole minutes.
    #[must_use]
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        let start = truncate_to_minute(start);
        let end = truncate_to_minute(end);
        Self {
            start,
            end,
            wraps_midnight: end < start,
        }
    }

    /// Creates a window from hour/minute components.
    ///
    /// # Errors
    ///
    /// Returns [`BlockerError::InvalidConfig`] if an hour is outside 0–23 or
    /// a minute outside 0–59.
    pub fn from_hm(start_hour: u32, start_min: u32, end_hour: u32, end_min: u32) -> Result<Self> {
        Ok(Self::new(
            time_of_day(start_hour, start_min)?,
            time_of_day(end_hour, end_min)?,
        ))
    }

    /// Replaces both ends of the window and recomputes the wrap mode.
    pub fn update(&mut self, start: NaiveTime, end: NaiveTime) {
        *self = Self::new(start, end);
    }

    /// Start of the window.
    #[must_use]
    pub const fn start(&self) -> NaiveTime {
        self.start
    }

    /// End of the window.
    #[must_use]
    pub const fn end(&self) -> NaiveTime {
        self.end
    }

    /// Returns `true` if the window crosses midnight.
    #[must_use]
    pub const fn wraps_midnight(&self) -> bool {
        self.wraps_midnight
    }

    /// Returns `true` if `now` lies strictly inside the window.
    ///
    /// Both boundaries are exclusive: a time exactly equal to `start` or
    /// `end` is outside.
    #[must_use]
    pub fn contains(&self, now: NaiveTime) -> bool {
        if self.wraps_midnight {
            now > self.start || now < self.end
        } else {
            self.start < now && now < self.end
        }
    }
}

impl Default for BlockWindow {
    fn default() -> Self {
        let midnight = NaiveTime::default();
        Self::new(midnight, midnight + chrono::Duration::hours(1))
    }
}

impl fmt::Display for BlockWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format(TIME_FORMAT),
            self.end.format(TIME_FORMAT)
        )
    }
}

impl FromStr for BlockWindow {
    type Err = BlockerError;

    /// Parses `"HH:MM-HH:MM"`.
    fn from_str(s: &str) -> Result<Self> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| BlockerError::InvalidConfig(format!("expected HH:MM-HH:MM, got {s:?}")))?;
        Ok(Self::new(parse_time(start)?, parse_time(end)?))
    }
}

/// Parses a `"HH:MM"` time of day.
///
/// # Errors
///
/// Returns [`BlockerError::InvalidConfig`] if the value is not a valid
/// 24-hour time.
pub fn parse_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), TIME_FORMAT)
        .map_err(|e| BlockerError::InvalidConfig(format!("invalid time {s:?}: {e}")))
}

fn time_of_day(hour: u32, minute: u32) -> Result<NaiveTime> {
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| {
        BlockerError::InvalidConfig(format!("invalid time {hour:02}:{minute:02}"))
    })
}

fn truncate_to_minute(t: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(t.hour(), t.minute(), 0).unwrap_or(t)
}

#[derive(Serialize, Deserialize)]
struct WindowRepr {
    start: String,
    end: String,
}

impl TryFrom<WindowRepr> for BlockWindow {
    type Error = BlockerError;

    fn try_from(repr: WindowRepr) -> Result<Self> {
        Ok(Self::new(parse_time(&repr.start)?, parse_time(&repr.end)?))
    }
}

impl From<BlockWindow> for WindowRepr {
    fn from(window: BlockWindow) -> Self {
        Self {
            start: window.start.format(TIME_FORMAT).to_string(),
            end: window.end.format(TIME_FORMAT).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn daytime_window_is_exclusive() {
        let w = BlockWindow::from_hm(9, 0, 17, 0).unwrap();
        assert!(!w.wraps_midnight());
        assert!(w.contains(at(12, 0)));
        assert!(w.contains(at(9, 1)));
        assert!(!w.contains(at(9, 0)));
        assert!(!w.contains(at(17, 0)));
        assert!(!w.contains(at(20, 0)));
        assert!(!w.contains(at(3, 0)));
    }

    #[test]
    fn seconds_past_start_are_inside() {
        let w = BlockWindow::from_hm(9, 0, 17, 0).unwrap();
        assert!(w.contains(NaiveTime::from_hms_opt(9, 0, 30).unwrap()));
    }

    #[test]
    fn overnight_window_wraps() {
        let w = BlockWindow::from_hm(22, 0, 6, 0).unwrap();
        assert!(w.wraps_midnight());
        assert!(w.contains(at(23, 30)));
        assert!(w.contains(at(0, 0)));
        assert!(w.contains(at(5, 59)));
        assert!(!w.contains(at(12, 0)));
        assert!(!w.contains(at(22, 0)));
        assert!(!w.contains(at(6, 0)));
    }

    #[test]
    fn empty_window_contains_nothing() {
        let w = BlockWindow::from_hm(10, 0, 10, 0).unwrap();
        assert!(!w.wraps_midnight());
        assert!(!w.contains(at(10, 0)));
        assert!(!w.contains(at(22, 0)));
    }

    #[test]
    fn update_recomputes_wrap_mode() {
        let mut w = BlockWindow::from_hm(9, 0, 17, 0).unwrap();
        w.update(at(22, 0), at(6, 0));
        assert!(w.wraps_midnight());
        assert!(w.contains(at(23, 0)));

        w.update(at(8, 0), at(12, 0));
        assert!(!w.wraps_midnight());
        assert!(!w.contains(at(23, 0)));
    }

    #[test]
    fn rejects_out_of_range_components() {
        assert!(BlockWindow::from_hm(24, 0, 1, 0).is_err());
        assert!(BlockWindow::from_hm(1, 60, 2, 0).is_err());
        assert!(matches!(
            BlockWindow::from_hm(0, 0, 25, 0),
            Err(BlockerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn parses_and_displays() {
        let w: BlockWindow = "09:15-17:45".parse().unwrap();
        assert_eq!(w.start(), at(9, 15));
        assert_eq!(w.end(), at(17, 45));
        assert_eq!(w.to_string(), "09:15-17:45");

        assert!("09:15".parse::<BlockWindow>().is_err());
        assert!("25:00-01:00".parse::<BlockWindow>().is_err());
    }

    #[test]
    fn new_truncates_to_minutes() {
        let w = BlockWindow::new(
            NaiveTime::from_hms_opt(9, 0, 59).unwrap(),
            NaiveTime::from_hms_opt(17, 0, 1).unwrap(),
        );
        assert_eq!(w.start(), at(9, 0));
        assert_eq!(w.end(), at(17, 0));
    }

    #[test]
    fn default_is_first_hour() {
        let w = BlockWindow::default();
        assert_eq!(w.to_string(), "00:00-01:00");
    }
}
