//! Calendar day that scopes a daily usage counter.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

const FORMAT: &str = "%Y-%m-%d";

/// A `YYYY-MM-DD` day on the engine's local clock.
///
/// Counters are keyed by `(user, day)`; a new day starts a fresh counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UsageDate(NaiveDate);

impl UsageDate {
    /// Today according to the local clock.
    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    pub fn from_naive(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn as_naive(&self) -> NaiveDate {
        self.0
    }

    /// The following calendar day.
    pub fn next(&self) -> Option<Self> {
        self.0.succ_opt().map(Self)
    }
}

impl fmt::Display for UsageDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(FORMAT))
    }
}

impl FromStr for UsageDate {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s, FORMAT)
            .map(Self)
            .map_err(|e| ValidationError::invalid_format("date", e.to_string()))
    }
}

impl TryFrom<String> for UsageDate {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<UsageDate> for String {
    fn from(date: UsageDate) -> Self {
        date.to_string()
    }
}
