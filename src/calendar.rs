//! Working calendar and monthly capacity.
//!
//! A working day is any day that is not the weekly rest day.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// Where slot assignment begins within the planning month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPolicy {
    /// First working day of the month.
    #[default]
    FirstWorkingDay,
    /// First Monday of the month, so every week starts on a Monday.
    FirstMonday,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkCalendar {
    pub rest_day: Weekday,
}

impl Default for WorkCalendar {
    fn default() -> Self {
        Self {
            rest_day: Weekday::Sun,
        }
    }
}

impl WorkCalendar {
    pub fn new(rest_day: Weekday) -> Self {
        Self { rest_day }
    }

    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        date.weekday() != self.rest_day
    }

    /// `date` itself if it is a working day, else the next one.
    pub fn working_day_on_or_after(&self, date: NaiveDate) -> Option<NaiveDate> {
        let mut current = date;
        while !self.is_working_day(current) {
            current = current.checked_add_days(Days::new(1))?;
        }
        Some(current)
    }

    /// The first working day strictly after `date`.
    pub fn next_working_day(&self, date: NaiveDate) -> Option<NaiveDate> {
        self.working_day_on_or_after(date.checked_add_days(Days::new(1))?)
    }

    pub fn working_days_in_month(&self, year: i32, month: u32) -> Result<u32, InputError> {
        let first = first_of_month(year, month)?;
        let days = days_in_month(year, month)?;
        Ok(first
            .iter_days()
            .take(days as usize)
            .filter(|day| self.is_working_day(*day))
            .count() as u32)
    }

    /// Normalize a requested start date to the first slot date of its month.
    pub fn plan_start(&self, requested: NaiveDate, policy: StartPolicy) -> Result<NaiveDate, InputError> {
        let invalid = InputError::InvalidCalendar {
            year: requested.year(),
            month: requested.month(),
        };
        let first = first_of_month(requested.year(), requested.month())?;
        let start = match policy {
            StartPolicy::FirstWorkingDay => self.working_day_on_or_after(first),
            StartPolicy::FirstMonday => {
                let offset = (7 - first.weekday().num_days_from_monday()) % 7;
                first
                    .checked_add_days(Days::new(u64::from(offset)))
                    .and_then(|monday| self.working_day_on_or_after(monday))
            }
        };
        start.ok_or(invalid)
    }
}

pub fn first_of_month(year: i32, month: u32) -> Result<NaiveDate, InputError> {
    NaiveDate::from_ymd_opt(year, month, 1).ok_or(InputError::InvalidCalendar { year, month })
}

pub fn days_in_month(year: i32, month: u32) -> Result<u32, InputError> {
    let first = first_of_month(year, month)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let next = next.ok_or(InputError::InvalidCalendar { year, month })?;
    Ok(next.signed_duration_since(first).num_days() as u32)
}

/// Total visit slots in the month: `agents × working days`.
pub fn monthly_capacity(
    year: i32,
    month: u32,
    agent_count: usize,
    calendar: &WorkCalendar,
) -> Result<usize, InputError> {
    let working_days = calendar.working_days_in_month(year, month)?;
    Ok(agent_count * working_days as usize)
}

/// Weekday index with Monday = 1 … Sunday = 7.
pub fn weekday_index(date: NaiveDate) -> u32 {
    date.weekday().number_from_monday()
}

pub fn iso_week(date: NaiveDate) -> u32 {
    date.iso_week().week()
}
