//! Calendar source for origination dates, due dates and delinquency checks.

use std::sync::Mutex;

use chrono::{Days, NaiveDate, Utc};

pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Current UTC date.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    today: Mutex<NaiveDate>,
}

impl FixedClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today: Mutex::new(today),
        }
    }

    pub fn set(&self, today: NaiveDate) {
        *self.today.lock().unwrap_or_else(|p| p.into_inner()) = today;
    }

    pub fn advance_weeks(&self, weeks: u64) {
        let mut today = self.today.lock().unwrap_or_else(|p| p.into_inner());
        *today = *today + Days::new(7 * weeks);
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.today.lock().unwrap_or_else(|p| p.into_inner())
    }
}
