// Calendar buckets used as the grouping unit for aggregation.
//
// A Period is identified by its granularity and its first day. Weeks are ISO
// weeks (Monday start); months, quarters and years start on the 1st.

use crate::error::DashboardError;
use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl Granularity {
    pub const ALL: [Granularity; 5] = [
        Granularity::Day,
        Granularity::Week,
        Granularity::Month,
        Granularity::Quarter,
        Granularity::Year,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::Quarter => "quarter",
            Granularity::Year => "year",
        }
    }

    /// Next coarser granularity, wrapping around (used by the dashboard toggle)
    pub fn cycle(&self) -> Self {
        match self {
            Granularity::Day => Granularity::Week,
            Granularity::Week => Granularity::Month,
            Granularity::Month => Granularity::Quarter,
            Granularity::Quarter => Granularity::Year,
            Granularity::Year => Granularity::Day,
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" | "daily" | "d" => Ok(Granularity::Day),
            "week" | "weekly" | "w" => Ok(Granularity::Week),
            "month" | "monthly" | "m" => Ok(Granularity::Month),
            "quarter" | "quarterly" | "q" => Ok(Granularity::Quarter),
            "year" | "yearly" | "annual" | "y" => Ok(Granularity::Year),
            _ => Err(DashboardError::UnknownGranularity(s.to_string())),
        }
    }
}

// ============================================================================
// PERIOD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period {
    pub granularity: Granularity,
    pub start: NaiveDate,
}

impl Period {
    /// The bucket of the given granularity that contains `date`
    pub fn containing(granularity: Granularity, date: NaiveDate) -> Self {
        let start = match granularity {
            Granularity::Day => Some(date),
            // The week holding NaiveDate::MIN is truncated at MIN
            Granularity::Week => date
                .checked_sub_signed(Duration::days(date.weekday().num_days_from_monday() as i64))
                .or(Some(NaiveDate::MIN)),
            Granularity::Month => date.with_day(1),
            Granularity::Quarter => date
                .with_day(1)
                .and_then(|d| d.with_month(quarter_of(date) * 3 - 2)),
            Granularity::Year => date.with_ordinal(1),
        };
        Period {
            granularity,
            start: start.unwrap_or(date),
        }
    }

    /// Every bucket from the one containing `start` to the one containing
    /// `end`, inclusive. Empty when `end < start`; stops at the last
    /// representable bucket.
    pub fn span(granularity: Granularity, start: NaiveDate, end: NaiveDate) -> Vec<Period> {
        let mut periods = Vec::new();
        if end < start {
            return periods;
        }
        let mut current = Some(Period::containing(granularity, start));
        while let Some(period) = current.filter(|p| p.start <= end) {
            periods.push(period);
            current = period.next();
        }
        periods
    }

    /// Last day of the bucket
    pub fn end(&self) -> NaiveDate {
        self.next()
            .and_then(|n| n.start.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end()
    }

    /// `None` past the end of the calendar
    pub fn next(&self) -> Option<Self> {
        self.shifted(1)
    }

    /// `None` before the start of the calendar
    pub fn previous(&self) -> Option<Self> {
        self.shifted(-1)
    }

    /// The same-length bucket one year earlier. Weeks step back 52 weeks so
    /// the weekday alignment is kept; 29 February maps to 28 February.
    pub fn year_ago(&self) -> Option<Self> {
        let start = match self.granularity {
            Granularity::Day => {
                let (y, m, d) = (self.start.year(), self.start.month(), self.start.day());
                NaiveDate::from_ymd_opt(y - 1, m, d).or_else(|| NaiveDate::from_ymd_opt(y - 1, 2, 28))
            }
            Granularity::Week => self.start.checked_sub_signed(Duration::weeks(52)),
            Granularity::Month | Granularity::Quarter | Granularity::Year => {
                shift_months(self.start, -12)
            }
        }?;
        Some(Period {
            granularity: self.granularity,
            start,
        })
    }

    fn shifted(&self, steps: i32) -> Option<Self> {
        let start = match self.granularity {
            Granularity::Day => self.start.checked_add_signed(Duration::days(steps as i64)),
            Granularity::Week => self.start.checked_add_signed(Duration::weeks(steps as i64)),
            Granularity::Month => shift_months(self.start, steps),
            Granularity::Quarter => shift_months(self.start, steps * 3),
            Granularity::Year => shift_months(self.start, steps * 12),
        }?;
        Some(Period {
            granularity: self.granularity,
            start,
        })
    }

    pub fn label(&self) -> String {
        match self.granularity {
            Granularity::Day => self.start.format("%Y-%m-%d").to_string(),
            Granularity::Week => {
                let week = self.start.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
            Granularity::Month => self.start.format("%Y-%m").to_string(),
            Granularity::Quarter => {
                format!("{}-Q{}", self.start.year(), quarter_of(self.start))
            }
            Granularity::Year => self.start.year().to_string(),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Period", 4)?;
        state.serialize_field("granularity", &self.granularity)?;
        state.serialize_field("label", &self.label())?;
        state.serialize_field("start", &self.start)?;
        state.serialize_field("end", &self.end())?;
        state.end()
    }
}

fn quarter_of(date: NaiveDate) -> u32 {
    (date.month() - 1) / 3 + 1
}

/// Move a date by whole months, `None` outside the calendar
fn shift_months(start: NaiveDate, months: i32) -> Option<NaiveDate> {
    let delta = Months::new(months.unsigned_abs());
    if months >= 0 {
        start.checked_add_months(delta)
    } else {
        start.checked_sub_months(delta)
    }
}
