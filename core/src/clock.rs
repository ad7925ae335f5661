//! Payroll clock: maps "weeks ago" selectors onto concrete work weeks.
//!
//! A work week runs Tuesday through the following Monday (UTC dates).
//! Stubs for a week are paid on the Thursday after it closes (end + 3
//! days), or a week later for companies on delayed settlement (end + 10).
//! `pay_date_from_window` and `window_from_pay_date` are exact inverses.

use crate::{
    error::{ScoreError, ScoreResult},
    records::PayStub,
};
use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One Tuesday-through-Monday work week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PayrollWindow {
    pub start: NaiveDate,
    pub end:   NaiveDate,
}

impl PayrollWindow {
    /// The work week containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        let since_tuesday = (date.weekday().num_days_from_monday() + 6) % 7;
        let start = date - Duration::days(since_tuesday as i64);
        Self { start, end: start + Duration::days(6) }
    }

    pub fn validate(&self) -> ScoreResult<()> {
        if self.start.weekday() != Weekday::Tue || self.end != self.start + Duration::days(6) {
            return Err(ScoreError::MalformedWindow { start: self.start, end: self.end });
        }
        Ok(())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// The window `weeks` later (negative = earlier).
    pub fn shifted(&self, weeks: i64) -> Self {
        let offset = Duration::weeks(weeks);
        Self { start: self.start + offset, end: self.end + offset }
    }
}

/// Settlement lag between a work week closing and its stubs being paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayDelay {
    /// Paid the Thursday after the week closes.
    Standard,
    /// Paid one week after that.
    OneWeek,
}

impl PayDelay {
    /// Accepts the dashboard's numeric delay setting (1 or 2).
    pub fn from_weeks(weeks: u8) -> ScoreResult<Self> {
        match weeks {
            1 => Ok(Self::Standard),
            2 => Ok(Self::OneWeek),
            other => Err(ScoreError::InvalidPayDelay(other)),
        }
    }

    fn days_after_close(&self) -> i64 {
        match self {
            Self::Standard => 3,
            Self::OneWeek  => 10,
        }
    }
}

pub fn pay_date_from_window(window: &PayrollWindow, delay: PayDelay) -> ScoreResult<NaiveDate> {
    window.validate()?;
    Ok(window.end + Duration::days(delay.days_after_close()))
}

/// Inverse of [`pay_date_from_window`]. Off-cycle pay dates snap to the
/// work week that closed on the Monday at or before `pay_date - lag`.
pub fn window_from_pay_date(pay_date: NaiveDate, delay: PayDelay) -> PayrollWindow {
    let close = pay_date - Duration::days(delay.days_after_close());
    let end = close - Duration::days(close.weekday().num_days_from_monday() as i64);
    PayrollWindow { start: end - Duration::days(6), end }
}

// ── Clock ────────────────────────────────────────────────────────────────────

/// Holds "today" so every recomputation pass sees the same reference date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollClock {
    pub today: NaiveDate,
}

impl PayrollClock {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today_utc() -> Self {
        Self::new(Utc::now().date_naive())
    }

    /// 0 is the live (current, unsettled) week.
    pub fn resolve_window(&self, weeks_ago: i64) -> ScoreResult<PayrollWindow> {
        if weeks_ago < 0 {
            return Err(ScoreError::NegativeWeeksAgo(weeks_ago));
        }
        Ok(PayrollWindow::containing(self.today).shifted(-weeks_ago))
    }

    pub fn live_window(&self) -> PayrollWindow {
        PayrollWindow::containing(self.today)
    }

    pub fn is_live(&self, window: &PayrollWindow) -> bool {
        *window == self.live_window()
    }
}

// ── Calendar ─────────────────────────────────────────────────────────────────

/// Assigns stubs to the work week they settle, honouring per-company
/// settlement delay.
#[derive(Debug, Clone, Default)]
pub struct PayrollCalendar {
    delayed_companies: BTreeSet<String>,
}

impl PayrollCalendar {
    pub fn new<I, S>(delayed_companies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            delayed_companies: delayed_companies.into_iter().map(Into::into).collect(),
        }
    }

    pub fn delay_for(&self, company: Option<&str>) -> PayDelay {
        match company {
            Some(c) if self.delayed_companies.contains(c) => PayDelay::OneWeek,
            _ => PayDelay::Standard,
        }
    }

    pub fn period_of(&self, stub: &PayStub) -> PayrollWindow {
        window_from_pay_date(stub.pay_date, self.delay_for(stub.company.as_deref()))
    }
}
