use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Date, Month, OffsetDateTime};

use crate::ValidationError;

/// Calendar month used as the time axis of every series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u8,
}

impl YearMonth {
    pub fn new(year: i32, month: u8) -> Result<Self, ValidationError> {
        if !(1..=12).contains(&month) || !(1..=9999).contains(&year) {
            return Err(ValidationError::InvalidMonth {
                value: format!("{year}-{month}"),
            });
        }
        Ok(Self { year, month })
    }

    /// Parse `YYYY-MM`, `YYYY-M`, `YYYY/MM` or a full `YYYY-MM-DD[...]` date.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidMonth {
            value: input.to_owned(),
        };

        let trimmed = input.trim();
        let mut parts = trimmed.split(['-', '/']);
        let year_part = parts.next().ok_or_else(invalid)?;
        let month_part = parts.next().ok_or_else(invalid)?;

        if year_part.len() != 4 || !year_part.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(invalid());
        }
        if month_part.is_empty()
            || month_part.len() > 2
            || !month_part.chars().all(|ch| ch.is_ascii_digit())
        {
            return Err(invalid());
        }

        if let Some(day_part) = parts.next() {
            let digits: String = day_part.chars().take_while(char::is_ascii_digit).collect();
            let day = digits.parse::<u8>().map_err(|_| invalid())?;
            if !(1..=31).contains(&day) {
                return Err(invalid());
            }
        }
        if parts.next().is_some() {
            return Err(invalid());
        }

        let year = year_part.parse::<i32>().map_err(|_| invalid())?;
        let month = month_part.parse::<u8>().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }

    pub fn from_date(date: Date) -> Self {
        Self {
            year: date.year(),
            month: u8::from(date.month()),
        }
    }

    pub fn current() -> Self {
        Self::from_date(OffsetDateTime::now_utc().date())
    }

    pub const fn year(self) -> i32 {
        self.year
    }

    pub const fn month(self) -> u8 {
        self.month
    }

    /// First day of the month.
    pub fn first_day(self) -> Option<Date> {
        let month = Month::try_from(self.month).ok()?;
        Date::from_calendar_date(self.year, month, 1).ok()
    }

    fn ordinal(self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }

    fn from_ordinal(ordinal: i64) -> Self {
        let year = ordinal.div_euclid(12);
        let month = ordinal.rem_euclid(12) + 1;
        Self {
            year: year.clamp(1, 9999) as i32,
            month: month as u8,
        }
    }

    /// Signed number of months from `self` to `other`.
    pub fn months_until(self, other: Self) -> i64 {
        other.ordinal() - self.ordinal()
    }

    pub fn add_months(self, months: i64) -> Self {
        Self::from_ordinal(self.ordinal() + months)
    }

    pub fn format(self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

impl Display for YearMonth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.format()
    }
}

/// Inclusive month range a series is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: YearMonth,
    pub end: YearMonth,
}

impl DateWindow {
    pub fn new(start: YearMonth, end: YearMonth) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvertedWindow {
                start: start.format(),
                end: end.format(),
            });
        }
        Ok(Self { start, end })
    }

    /// Window ending at `today` and starting `years` whole years earlier.
    pub fn trailing_years(years: u32, today: YearMonth) -> Result<Self, ValidationError> {
        Self::trailing_months(years.saturating_mul(12), today)
    }

    pub fn trailing_months(months: u32, today: YearMonth) -> Result<Self, ValidationError> {
        if months == 0 {
            return Err(ValidationError::EmptyWindow);
        }
        Self::new(today.add_months(-i64::from(months)), today)
    }

    /// Pull `end` back to `upper` so no month past the data horizon is requested.
    pub fn clamp_end(self, upper: YearMonth) -> Self {
        let end = self.end.min(upper);
        let start = self.start.min(end);
        Self { start, end }
    }

    /// Number of months spanned, counting both ends.
    pub fn len_months(self) -> usize {
        (self.start.months_until(self.end) + 1).max(1) as usize
    }

    pub fn months(self) -> Vec<YearMonth> {
        (0..self.len_months() as i64)
            .map(|offset| self.start.add_months(offset))
            .collect()
    }

    pub fn contains(self, month: YearMonth) -> bool {
        self.start <= month && month <= self.end
    }
}
