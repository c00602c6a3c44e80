//! Time-series buckets of camp-tagged observations.
//!
//! Every observation is dropped into a bucket derived from its timestamp
//! and counted by camp. Buckets are cyclic: `day` is the day of the month,
//! `hour` the hour of the day, and `monthly_hour` splits each month into
//! Friday-anchored weeks.

use crate::models::{Camp, TimelineRow};
use chrono::{Datelike, NaiveDateTime, Timelike};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Weekday names indexed from Monday.
const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Index of Friday in [`WEEKDAYS`].
const FRIDAY: u32 = 4;

/// Granularity of the time series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    #[default]
    Day,
    Hour,
    Weekday,
    WeekdayHour,
    MonthlyHour,
}

impl TimeUnit {
    pub const ALL: [TimeUnit; 5] = [
        TimeUnit::Day,
        TimeUnit::Hour,
        TimeUnit::Weekday,
        TimeUnit::WeekdayHour,
        TimeUnit::MonthlyHour,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TimeUnit::Day => "day",
            TimeUnit::Hour => "hour",
            TimeUnit::Weekday => "weekday",
            TimeUnit::WeekdayHour => "weekday_hour",
            TimeUnit::MonthlyHour => "monthly_hour",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        TimeUnit::ALL
            .into_iter()
            .find(|unit| unit.as_str() == wanted)
            .ok_or_else(|| {
                let valid: Vec<&str> = TimeUnit::ALL.iter().map(|u| u.as_str()).collect();
                format!("unknown time unit {s:?}, expected one of: {}", valid.join(", "))
            })
    }
}

/// Bucket an observation falls into.
///
/// Weekdays are numbered from Monday (0) except in `MonthlyHour`, where
/// they are numbered from Friday (0) to Thursday (6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BucketKey {
    Day(u32),
    Hour(u32),
    Weekday(u32),
    WeekdayHour(u32, u32),
    MonthlyHour { week: u32, weekday: u32, hour: u32 },
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            BucketKey::Day(day) => write!(f, "{day}"),
            BucketKey::Hour(hour) => write!(f, "{hour:02}:00"),
            BucketKey::Weekday(wd) => f.write_str(weekday_name(wd)),
            BucketKey::WeekdayHour(wd, hour) => write!(f, "{} {hour:02}:00", weekday_name(wd)),
            BucketKey::MonthlyHour { week, weekday, hour } => write!(
                f,
                "{week} {} {hour:02}:00",
                weekday_name((weekday + FRIDAY) % 7)
            ),
        }
    }
}

fn weekday_name(index: u32) -> &'static str {
    WEEKDAYS[(index % 7) as usize]
}

/// Day of the month (1-based) of the first Friday in `ts`'s month.
pub fn first_friday(ts: NaiveDateTime) -> u32 {
    let day = ts.day();
    let weekday = ts.weekday().num_days_from_monday();
    let first_of_month = (weekday + 7 - (day - 1) % 7) % 7;
    (FRIDAY + 7 - first_of_month) % 7 + 1
}

/// Bucket for `ts` at granularity `unit`.
pub fn bucket(ts: NaiveDateTime, unit: TimeUnit) -> BucketKey {
    let weekday = ts.weekday().num_days_from_monday();
    match unit {
        TimeUnit::Day => BucketKey::Day(ts.day()),
        TimeUnit::Hour => BucketKey::Hour(ts.hour()),
        TimeUnit::Weekday => BucketKey::Weekday(weekday),
        TimeUnit::WeekdayHour => BucketKey::WeekdayHour(weekday, ts.hour()),
        TimeUnit::MonthlyHour => {
            let anchor = first_friday(ts);
            let week = if ts.day() < anchor {
                0
            } else {
                (ts.day() - anchor) / 7 + 1
            };
            BucketKey::MonthlyHour {
                week,
                weekday: (weekday + 7 - FRIDAY) % 7,
                hour: ts.hour(),
            }
        }
    }
}

/// Camp counts in one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketTally {
    pub big_loser: u64,
    pub big_winner: u64,
}

impl BucketTally {
    pub fn observations(&self) -> u64 {
        self.big_loser + self.big_winner
    }

    /// `big_loser / big_winner`. NaN or infinite when `big_winner` is zero.
    pub fn ratio(&self) -> f64 {
        self.big_loser as f64 / self.big_winner as f64
    }
}

/// Bucketed camp counts for a single time unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    unit: TimeUnit,
    buckets: BTreeMap<BucketKey, BucketTally>,
}

impl Timeline {
    pub fn new(unit: TimeUnit) -> Self {
        Self {
            unit,
            buckets: BTreeMap::new(),
        }
    }

    /// Count one observation. `Other` opens the bucket without counting.
    pub fn record(&mut self, ts: NaiveDateTime, camp: Camp) {
        let tally = self.buckets.entry(bucket(ts, self.unit)).or_default();
        match camp {
            Camp::BigLoser => tally.big_loser += 1,
            Camp::BigWinner => tally.big_winner += 1,
            Camp::Other => {}
        }
    }

    pub fn merge(mut self, other: Timeline) -> Self {
        debug_assert_eq!(self.unit, other.unit);
        for (key, tally) in other.buckets {
            let entry = self.buckets.entry(key).or_default();
            entry.big_loser += tally.big_loser;
            entry.big_winner += tally.big_winner;
        }
        self
    }

    #[cfg(test)]
    pub fn get(&self, key: &BucketKey) -> Option<&BucketTally> {
        self.buckets.get(key)
    }

    /// Buckets in key order, flattened for output.
    pub fn rows(&self) -> Vec<TimelineRow> {
        self.buckets
            .iter()
            .map(|(key, tally)| TimelineRow {
                bucket: key.to_string(),
                big_loser: tally.big_loser,
                big_winner: tally.big_winner,
                observations: tally.observations(),
                ratio: tally.ratio(),
            })
            .collect()
    }
}

/// Bucket a stream of camp-tagged timestamps, one partial timeline per
/// worker.
pub fn group(
    observations: impl IntoParallelIterator<Item = (NaiveDateTime, Camp)>,
    unit: TimeUnit,
) -> Timeline {
    observations
        .into_par_iter()
        .fold(
            || Timeline::new(unit),
            |mut timeline, (ts, camp)| {
                timeline.record(ts, camp);
                timeline
            },
        )
        .reduce(|| Timeline::new(unit), Timeline::merge)
}
