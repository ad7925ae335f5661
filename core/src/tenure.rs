//! Tenure calculator: point-in-time median tenure per dispatcher and
//! contract type.
//!
//! A driver's tenure with a dispatcher is the number of distinct pay
//! periods the driver settled under that dispatcher up to the cutoff.
//! Drivers with zero tenure are left out of the median.

use crate::{
    clock::PayrollWindow,
    retention::{LiveOwnership, StubHistory},
    stats::median,
    types::ContractType,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub enum TenurePoint<'a, 'b> {
    /// Settled period: roster is whoever settled under the dispatcher then.
    AsOf(PayrollWindow),
    /// Live week: every settled stub counts, and a driver already hauling
    /// for the dispatcher this week is credited the in-progress week.
    Live {
        live_period: PayrollWindow,
        ownership:   &'b LiveOwnership<'a>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MedianTenure {
    pub oo:  Option<f64>,
    pub loo: Option<f64>,
}

impl MedianTenure {
    pub fn for_contract(&self, contract: ContractType) -> Option<f64> {
        match contract {
            ContractType::OwnerOperator      => self.oo,
            ContractType::LeaseOwnerOperator => self.loo,
        }
    }
}

pub fn tenure_weeks(
    history: &StubHistory<'_>,
    driver: &str,
    dispatcher: &str,
    point: &TenurePoint<'_, '_>,
) -> usize {
    let cutoff = match point {
        TenurePoint::AsOf(period) => Some(*period),
        TenurePoint::Live { .. }  => None,
    };

    let periods: BTreeSet<PayrollWindow> = history
        .driver_stubs(driver)
        .iter()
        .filter(|(p, s)| s.is_dispatched_by(dispatcher) && cutoff.map_or(true, |c| *p <= c))
        .map(|(p, _)| *p)
        .collect();

    let mut weeks = periods.len();
    if let TenurePoint::Live { live_period, ownership } = point {
        let hauling_now = ownership.live_loads_owner(driver) == Some(dispatcher);
        let settled_live_week = history.driver_stubs(driver).iter().any(|(p, _)| p == live_period);
        if hauling_now && !settled_live_week {
            weeks += 1;
        }
    }
    weeks
}

/// Roster of `dispatcher` for `contract` at the given point.
fn roster<'a>(
    history: &StubHistory<'a>,
    dispatcher: &str,
    contract: ContractType,
    point: &TenurePoint<'a, '_>,
) -> BTreeSet<&'a str> {
    match point {
        TenurePoint::AsOf(period) => history
            .stubs_in(*period)
            .filter(|s| s.is_dispatched_by(dispatcher) && s.contract_type == contract)
            .map(|s| s.driver.as_str())
            .collect(),
        TenurePoint::Live { ownership, .. } => ownership
            .drivers_of(dispatcher)
            .into_iter()
            .filter(|d| ownership.contract_of(d) == contract)
            .collect(),
    }
}

/// Median non-zero tenure across the roster; `None` when nobody qualifies.
pub fn median_tenure(
    history: &StubHistory<'_>,
    dispatcher: &str,
    contract: ContractType,
    point: &TenurePoint<'_, '_>,
) -> Option<f64> {
    let counts = roster(history, dispatcher, contract, point)
        .into_iter()
        .map(|driver| tenure_weeks(history, driver, dispatcher, point))
        .filter(|weeks| *weeks > 0)
        .map(|weeks| weeks as f64);
    median(counts)
}

pub fn median_tenure_by_contract(
    history: &StubHistory<'_>,
    dispatcher: &str,
    point: &TenurePoint<'_, '_>,
) -> MedianTenure {
    MedianTenure {
        oo:  median_tenure(history, dispatcher, ContractType::OwnerOperator, point),
        loo: median_tenure(history, dispatcher, ContractType::LeaseOwnerOperator, point),
    }
}
