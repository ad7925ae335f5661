//! Retention attributor: who kept, lost or handed off each pooled driver.
//!
//! RULE: Ownership is always the dispatcher-of-record on the stub (or the
//! live signal) that was *last* in effect, never the driver's current
//! roster row when a stub says otherwise.
//!
//! Pool: distinct drivers with a stub in period P attributed to D whose
//! status is Active, Terminated or Start. Start is pooled so a driver who
//! started under D and moved on the same week still counts against D.
//!
//! Each pooled driver resolves to exactly one outcome, so
//! `retained + terminated + transferred == pool_size` always holds.

use crate::{
    clock::{PayrollCalendar, PayrollWindow},
    enrichment::{latest_stub_by_driver, live_dispatcher_map},
    records::{ContractStatusRecord, LiveLoad, PayStub, RosterEntry},
    types::{ContractFilter, ContractType, DispatcherId, DriverId, RetentionStatus},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RetentionOutcome {
    Retained,
    Terminated,
    Transferred { to: Option<DispatcherId> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolMember {
    pub driver:   DriverId,
    /// Contract on the pooling stub.
    pub contract: ContractType,
    #[serde(flatten)]
    pub outcome: RetentionOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetentionBreakdown {
    pub pool_size:   usize,
    pub retained:    usize,
    pub terminated:  usize,
    pub transferred: usize,
    pub members:     Vec<PoolMember>,
}

impl RetentionBreakdown {
    fn record(&mut self, member: PoolMember) {
        self.pool_size += 1;
        match member.outcome {
            RetentionOutcome::Retained           => self.retained += 1,
            RetentionOutcome::Terminated         => self.terminated += 1,
            RetentionOutcome::Transferred { .. } => self.transferred += 1,
        }
        self.members.push(member);
    }

    /// `None` for an empty pool: no data is not 0% retention.
    pub fn percent(&self) -> Option<f64> {
        (self.pool_size > 0).then(|| self.retained as f64 / self.pool_size as f64 * 100.0)
    }

    pub fn is_conserved(&self) -> bool {
        self.retained + self.terminated + self.transferred == self.pool_size
    }

    /// Pool several dispatchers' breakdowns into one team figure.
    pub fn combine<'a>(parts: impl IntoIterator<Item = &'a RetentionBreakdown>) -> Self {
        let mut total = Self::default();
        for part in parts {
            total.pool_size += part.pool_size;
            total.retained += part.retained;
            total.terminated += part.terminated;
            total.transferred += part.transferred;
            total.members.extend(part.members.iter().cloned());
        }
        total
    }

    /// Recount over the members whose pooling contract passes `filter`.
    pub fn restricted_to(&self, filter: ContractFilter) -> Self {
        let mut restricted = Self::default();
        for member in self.members.iter().filter(|m| filter.admits(m.contract)) {
            restricted.record(member.clone());
        }
        restricted
    }
}

/// Fleet-wide retention without dispatcher attribution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalRetention {
    pub active:     usize,
    pub terminated: usize,
}

impl GlobalRetention {
    pub fn percent(&self) -> Option<f64> {
        let pool = self.active + self.terminated;
        (pool > 0).then(|| self.active as f64 / pool as f64 * 100.0)
    }
}

// ── Stub history ─────────────────────────────────────────────────────────────

/// Enriched stubs indexed by driver and tagged with their pay period.
pub struct StubHistory<'a> {
    by_driver:      BTreeMap<&'a str, Vec<(PayrollWindow, &'a PayStub)>>,
    latest_settled: Option<PayrollWindow>,
}

impl<'a> StubHistory<'a> {
    /// `stubs` must already be enriched.
    pub fn new(calendar: &PayrollCalendar, stubs: &'a [PayStub]) -> Self {
        let mut by_driver: BTreeMap<&'a str, Vec<(PayrollWindow, &'a PayStub)>> = BTreeMap::new();
        let mut latest_settled = None;
        for stub in stubs {
            let period = calendar.period_of(stub);
            latest_settled = latest_settled.max(Some(period));
            by_driver.entry(stub.driver.as_str()).or_default().push((period, stub));
        }
        for history in by_driver.values_mut() {
            // Stable: same-day stubs keep input order, later input wins.
            history.sort_by_key(|(_, stub)| stub.pay_date);
        }
        Self { by_driver, latest_settled }
    }

    pub fn latest_settled(&self) -> Option<PayrollWindow> {
        self.latest_settled
    }

    pub fn driver_stubs(&self, driver: &str) -> &[(PayrollWindow, &'a PayStub)] {
        self.by_driver.get(driver).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn drivers(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.by_driver.keys().copied()
    }

    /// Every stub settled in `period`, in driver order.
    pub fn stubs_in(&self, period: PayrollWindow) -> impl Iterator<Item = &'a PayStub> + '_ {
        self.by_driver
            .values()
            .flat_map(move |h| h.iter().filter(move |(p, _)| *p == period).map(|(_, s)| *s))
    }

    /// The driver's most recent stub overall.
    pub fn most_recent(&self, driver: &str) -> Option<&'a PayStub> {
        self.driver_stubs(driver).last().map(|(_, s)| *s)
    }

    /// The driver's most recent stub with a period in `[from, through]`.
    pub fn most_recent_between(
        &self,
        driver: &str,
        from: PayrollWindow,
        through: PayrollWindow,
    ) -> Option<&'a PayStub> {
        self.driver_stubs(driver)
            .iter()
            .filter(|(p, _)| from <= *p && *p <= through)
            .map(|(_, s)| *s)
            .last()
    }

    /// Drivers pooled for `dispatcher` in `period`, with the contract on
    /// their pooling stub.
    pub fn pool(&self, dispatcher: &str, period: PayrollWindow) -> BTreeMap<&'a str, ContractType> {
        self.stubs_in(period)
            .filter(|s| s.is_dispatched_by(dispatcher) && s.status.is_poolable())
            .map(|s| (s.driver.as_str(), s.contract_type))
            .collect()
    }
}

// ── Live ownership ───────────────────────────────────────────────────────────

/// Current-week ownership signals: contract status, live loads and roster.
pub struct LiveOwnership<'a> {
    statuses:  BTreeMap<&'a str, &'a RetentionStatus>,
    by_loads:  BTreeMap<&'a str, &'a str>,
    roster:    BTreeMap<&'a str, &'a RosterEntry>,
    contracts: BTreeMap<&'a str, ContractType>,
}

impl<'a> LiveOwnership<'a> {
    /// `live_loads` must be limited to the live week.
    pub fn new(
        statuses: &'a [ContractStatusRecord],
        live_loads: impl IntoIterator<Item = &'a LiveLoad>,
        roster: &'a [RosterEntry],
    ) -> Self {
        let loads: Vec<&'a LiveLoad> = live_loads.into_iter().collect();
        let mut contracts: BTreeMap<&'a str, ContractType> = loads
            .iter()
            .map(|l| (l.driver.as_str(), l.contract_type))
            .collect();
        contracts.extend(roster.iter().map(|r| (r.driver.as_str(), r.contract_type)));

        Self {
            statuses: statuses.iter().map(|r| (r.driver.as_str(), &r.status)).collect(),
            by_loads: live_dispatcher_map(loads),
            roster:   roster.iter().map(|r| (r.driver.as_str(), r)).collect(),
            contracts,
        }
    }

    /// Current contract status, when the feed has a row for `driver`.
    pub fn status_of(&self, driver: &str) -> Option<&'a RetentionStatus> {
        self.statuses.get(driver).copied()
    }

    /// Live-load owner first, then the roster.
    pub fn current_dispatcher(&self, driver: &str) -> Option<&'a str> {
        self.by_loads
            .get(driver)
            .copied()
            .or_else(|| self.roster.get(driver).and_then(|r| r.dispatcher.as_deref()))
    }

    pub fn live_loads_owner(&self, driver: &str) -> Option<&'a str> {
        self.by_loads.get(driver).copied()
    }

    pub fn roster_entry(&self, driver: &str) -> Option<&'a RosterEntry> {
        self.roster.get(driver).copied()
    }

    /// Roster and live-load contract type; roster wins.
    pub fn contract_of(&self, driver: &str) -> ContractType {
        self.contracts.get(driver).copied().unwrap_or_default()
    }

    /// Drivers currently working for `dispatcher`.
    pub fn drivers_of(&self, dispatcher: &str) -> BTreeSet<&'a str> {
        self.by_loads
            .keys()
            .chain(self.roster.keys())
            .copied()
            .filter(|d| self.current_dispatcher(d) == Some(dispatcher))
            .collect()
    }
}

// ── Attribution ──────────────────────────────────────────────────────────────

pub enum RetentionMode<'a, 'b> {
    /// Resolve from stubs settled in the pool window.
    Historical { pool_weeks: u32 },
    /// Resolve from current contract status and live ownership.
    Live(&'b LiveOwnership<'a>),
}

pub fn attribute_retention(
    history: &StubHistory<'_>,
    dispatcher: &str,
    period: PayrollWindow,
    mode: &RetentionMode<'_, '_>,
) -> RetentionBreakdown {
    let mut breakdown = RetentionBreakdown::default();

    for (driver, contract) in history.pool(dispatcher, period) {
        let outcome = match mode {
            RetentionMode::Live(live) => resolve_live(history, live, driver, dispatcher),
            RetentionMode::Historical { pool_weeks } => {
                resolve_historical(history, driver, dispatcher, period, *pool_weeks)
            }
        };
        breakdown.record(PoolMember { driver: driver.to_string(), contract, outcome });
    }

    log::debug!(
        "retention {dispatcher} @ {}: pool={} retained={} terminated={} transferred={}",
        period.start,
        breakdown.pool_size,
        breakdown.retained,
        breakdown.terminated,
        breakdown.transferred,
    );
    breakdown
}

/// Terminated under someone else means the driver was handed off before
/// leaving: a transfer for `dispatcher`, a termination for the last owner.
fn termination_outcome(last_owner: Option<&str>, dispatcher: &str) -> RetentionOutcome {
    if last_owner == Some(dispatcher) {
        RetentionOutcome::Terminated
    } else {
        RetentionOutcome::Transferred { to: last_owner.map(str::to_string) }
    }
}

fn resolve_live(
    history: &StubHistory<'_>,
    live: &LiveOwnership<'_>,
    driver: &str,
    dispatcher: &str,
) -> RetentionOutcome {
    let last = history.most_recent(driver);
    let last_owner = last.and_then(|s| s.dispatcher.as_deref());
    // Without a contract-status row the latest stub's status stands.
    let terminated = match live.status_of(driver) {
        Some(status) => *status == RetentionStatus::Terminated,
        None => last.map_or(false, |s| s.status == RetentionStatus::Terminated),
    };
    if terminated {
        return termination_outcome(last_owner, dispatcher);
    }
    match live.current_dispatcher(driver) {
        Some(current) if current != dispatcher => RetentionOutcome::Transferred {
            to: Some(current.to_string()),
        },
        _ => RetentionOutcome::Retained,
    }
}

fn resolve_historical(
    history: &StubHistory<'_>,
    driver: &str,
    dispatcher: &str,
    period: PayrollWindow,
    pool_weeks: u32,
) -> RetentionOutcome {
    let through = period.shifted(pool_weeks.max(1) as i64 - 1);
    let Some(last) = history.most_recent_between(driver, period, through) else {
        return RetentionOutcome::Retained;
    };
    let owner = last.dispatcher.as_deref();

    if last.status == RetentionStatus::Terminated {
        termination_outcome(owner, dispatcher)
    } else if owner != Some(dispatcher) {
        RetentionOutcome::Transferred { to: owner.map(str::to_string) }
    } else {
        RetentionOutcome::Retained
    }
}

/// Active share of drivers settled Active or Terminated in `period`.
pub fn global_retention(history: &StubHistory<'_>, period: PayrollWindow) -> GlobalRetention {
    tally_global(history.stubs_in(period))
}

/// Global retention over an already-filtered set of stubs from one period.
/// A driver with several stubs counts once, by the latest.
pub fn tally_global<'a>(stubs: impl IntoIterator<Item = &'a PayStub>) -> GlobalRetention {
    let latest = latest_stub_by_driver(stubs);

    let mut result = GlobalRetention::default();
    for stub in latest.values() {
        match stub.status {
            RetentionStatus::Active     => result.active += 1,
            RetentionStatus::Terminated => result.terminated += 1,
            _ => {}
        }
    }
    result
}
