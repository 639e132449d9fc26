//! Window and period descriptors together with the unit conversions and bin
//! arithmetic they rely on.

// used for event timestamps
use chrono::{DateTime, Utc};

use std::fmt;

use crate::datatype::Iri;
use crate::error::{Result, invalid};

pub const TEMPORAL_NAMESPACE: &str = "http://www.w3.org/2006/time#";

/// Time units a periodic window may be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Days,
    Hours,
    Minutes,
}

impl TimeUnit {
    /// Factors that take a duration in this unit to milliseconds, applied
    /// left to right. `1.1` hours is exact this way but not as `1.1 * 3_600_000`.
    fn steps(&self) -> &'static [f64] {
        match self {
            TimeUnit::Days => &[24.0, 60.0, 60.0, 1000.0],
            TimeUnit::Hours => &[60.0, 60.0, 1000.0],
            TimeUnit::Minutes => &[60.0, 1000.0],
        }
    }
    pub fn local_name(&self) -> &'static str {
        match self {
            TimeUnit::Days => "days",
            TimeUnit::Hours => "hours",
            TimeUnit::Minutes => "minutes",
        }
    }
    pub fn iri(&self) -> Iri {
        Iri::new(format!("{}{}", TEMPORAL_NAMESPACE, self.local_name()))
    }
    pub fn from_iri(iri: &Iri) -> Result<TimeUnit> {
        if iri.namespace() != TEMPORAL_NAMESPACE {
            return invalid(format!("{} is not in the time namespace", iri));
        }
        match iri.local_name() {
            "days" => Ok(TimeUnit::Days),
            "hours" => Ok(TimeUnit::Hours),
            "minutes" => Ok(TimeUnit::Minutes),
            _ => invalid(format!("invalid time unit {} for periodic function", iri)),
        }
    }
}

/// Converts a duration in `unit` into milliseconds. The duration must be
/// positive and the product must be a whole number of milliseconds.
pub fn convert_to_millis(duration: f64, unit: TimeUnit) -> Result<i64> {
    if duration.is_nan() || duration <= 0.0 || duration.is_infinite() {
        return invalid(format!("duration must be positive, got {}", duration));
    }
    let converted = unit.steps().iter().fold(duration, |acc, factor| acc * factor);
    if converted.fract() != 0.0 || converted >= i64::MAX as f64 {
        return invalid(format!(
            "{} {} has no exact millisecond representation",
            duration,
            unit.local_name()
        ));
    }
    Ok(converted as i64)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowDescriptor {
    window_millis: i64,
    period_millis: i64,
    temporal_variable: String,
}

impl WindowDescriptor {
    /// The period must divide the window evenly, at least twice.
    pub fn new(window_millis: i64, period_millis: i64, temporal_variable: impl Into<String>) -> Result<Self> {
        if window_millis <= 0 || period_millis <= 0 {
            return invalid("window and period must be positive");
        }
        if window_millis <= period_millis {
            return invalid(format!(
                "window of {}ms must be longer than period of {}ms",
                window_millis, period_millis
            ));
        }
        if window_millis % period_millis != 0 {
            return invalid("Period duration does not evenly divide window duration.");
        }
        Ok(Self {
            window_millis,
            period_millis,
            temporal_variable: temporal_variable.into(),
        })
    }
    pub fn from_durations(
        window: f64,
        period: f64,
        unit: TimeUnit,
        temporal_variable: impl Into<String>,
    ) -> Result<Self> {
        let window_millis = convert_to_millis(window, unit)?;
        let period_millis = convert_to_millis(period, unit)?;
        Self::new(window_millis, period_millis, temporal_variable)
    }
    pub fn window_millis(&self) -> i64 {
        self.window_millis
    }
    pub fn period_millis(&self) -> i64 {
        self.period_millis
    }
    pub fn temporal_variable(&self) -> &str {
        &self.temporal_variable
    }
    /// Number of bins every event contributes to.
    pub fn bins_per_window(&self) -> i64 {
        self.window_millis / self.period_millis
    }
    /// Bins are named by their closing boundary, a multiple of the period.
    /// Bin `b` holds events in `(b - window, b]`, so an event lands in
    /// `window / period` consecutive bins starting with the first boundary
    /// at or after it.
    pub fn bins_for(&self, event_time: DateTime<Utc>) -> Vec<i64> {
        let t = event_time.timestamp_millis();
        let first = t.div_euclid(self.period_millis) * self.period_millis
            + if t.rem_euclid(self.period_millis) == 0 { 0 } else { self.period_millis };
        (0..self.bins_per_window())
            .map(|i| first + i * self.period_millis)
            .collect()
    }
    /// The bin whose window closes last at or before `now`; every bin at or
    /// below it can no longer receive events and may be purged once reported.
    pub fn last_closed_bin(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp_millis().div_euclid(self.period_millis) * self.period_millis
    }
}
impl fmt::Display for WindowDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "window={}ms period={}ms on ?{}",
            self.window_millis, self.period_millis, self.temporal_variable
        )
    }
}
