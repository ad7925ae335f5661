//! Per-window Driver and Dispatcher aggregates.
//!
//! RULES:
//!   - Everything is computed over the full snapshot for the window. Display
//!     filters are applied afterwards by the engine.
//!   - Historical windows take financial totals from the stubs settled for
//!     that work week. The live window has no settled stubs yet, so totals
//!     come from its loads.
//!   - Retention in the live window pools the latest settled period and
//!     resolves against live ownership signals.

use crate::{
    clock::{PayrollCalendar, PayrollWindow},
    compliance::{raw_metrics, score_pool, ComplianceScore, DispatcherMetrics},
    config::EngineConfig,
    enrichment::last_write_wins,
    event::DispatcherEvent,
    flags::{average_toll, evaluate_flags, DriverFlag, FlagContext, FlagInputs, PeerTollProfile},
    records::{Activity, LiveLoad, PayStub},
    retention::{attribute_retention, LiveOwnership, RetentionBreakdown, RetentionMode, StubHistory},
    risk::drop_risk_score,
    snapshot::FleetSnapshot,
    tenure::{median_tenure_by_contract, MedianTenure, TenurePoint},
    types::{ContractType, DispatcherId, DriverId},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ── Aggregates ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id:            DriverId,
    pub dispatcher:    Option<DispatcherId>,
    pub team:          Option<String>,
    pub company:       Option<String>,
    pub franchise:     Option<String>,
    pub contract_type: ContractType,
    pub flags:         Vec<DriverFlag>,
    pub drop_risk:     f64,
    pub gross:         f64,
    pub miles:         f64,
    pub margin:        f64,
    pub net_pay:       f64,
    pub tolls:         f64,
    /// `None` when no miles were run in the window.
    pub rpm:           Option<f64>,
    /// Balance + PO exposure on the latest visible stub.
    pub liability:     f64,
    pub loads:         usize,
    pub canceled_loads: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispatcher {
    pub id:            DispatcherId,
    pub team:          Option<String>,
    pub roster_oo:     usize,
    pub roster_loo:    usize,
    pub metrics:       DispatcherMetrics,
    pub retention:     RetentionBreakdown,
    pub retention_pct: Option<f64>,
    pub tenure:        MedianTenure,
    pub compliance:    ComplianceScore,
}

// ── Window context ───────────────────────────────────────────────────────────

/// Everything one window's pass shares: indexed history, the live
/// ownership signals and the fleet-wide toll profile.
pub struct WindowContext<'a> {
    pub config:    &'a EngineConfig,
    pub calendar:  PayrollCalendar,
    pub window:    PayrollWindow,
    pub live:      bool,
    pub history:   StubHistory<'a>,
    pub ownership: Option<LiveOwnership<'a>>,
    snapshot:         &'a FleetSnapshot,
    stubs_by_driver:  BTreeMap<&'a str, Vec<&'a PayStub>>,
    window_loads:     Vec<&'a LiveLoad>,
    window_events:    Vec<&'a DispatcherEvent>,
    loads_by_driver:  BTreeMap<&'a str, Vec<&'a LiveLoad>>,
    dispatcher_teams: BTreeMap<&'a str, &'a str>,
    peer_tolls:       PeerTollProfile,
}

impl<'a> WindowContext<'a> {
    /// `enriched` must be `enrich_stubs(&snapshot.stubs)`.
    pub fn new(
        config: &'a EngineConfig,
        snapshot: &'a FleetSnapshot,
        enriched: &'a [PayStub],
        window: PayrollWindow,
        live: bool,
    ) -> Self {
        let calendar = config.calendar();
        let history = StubHistory::new(&calendar, enriched);

        let mut stubs_by_driver: BTreeMap<&'a str, Vec<&'a PayStub>> = BTreeMap::new();
        for stub in enriched.iter().filter(|s| calendar.period_of(s) == window) {
            stubs_by_driver.entry(stub.driver.as_str()).or_default().push(stub);
        }

        let window_loads: Vec<&'a LiveLoad> = snapshot
            .loads
            .iter()
            .filter(|l| window.contains(l.pickup_date))
            .collect();
        let window_events: Vec<&'a DispatcherEvent> = snapshot
            .events
            .iter()
            .filter(|e| window.contains(e.date))
            .collect();

        let mut loads_by_driver: BTreeMap<&'a str, Vec<&'a LiveLoad>> = BTreeMap::new();
        for load in &snapshot.loads {
            loads_by_driver.entry(load.driver.as_str()).or_default().push(load);
        }

        let ownership = live.then(|| {
            LiveOwnership::new(
                &snapshot.contract_statuses,
                window_loads.iter().copied(),
                &snapshot.roster,
            )
        });

        let visible: Vec<Activity<'a>> = enriched
            .iter()
            .filter(|s| calendar.period_of(s) <= window)
            .map(Activity::Stub)
            .chain(window_loads.iter().copied().map(Activity::Load))
            .collect();
        let dispatcher_teams: BTreeMap<&'a str, &'a str> = last_write_wins(
            visible.iter(),
            |a: &Activity<'a>| a.team().and(a.dispatcher()),
            |a| a.date(),
        )
        .into_iter()
        .filter_map(|(dispatcher, activity)| Some((dispatcher, activity.team()?)))
        .collect();

        let rule = &config.flags.high_tolls;
        let peer_tolls = PeerTollProfile::from_averages(
            history
                .drivers()
                .filter_map(|driver| {
                    let stubs: Vec<&PayStub> =
                        history.driver_stubs(driver).iter().map(|(_, s)| *s).collect();
                    average_toll(&stubs, rule, &calendar, window)
                })
                .collect(),
        );

        log::debug!(
            "window {}..{} live={live}: {} stub drivers, {} loads, {} events, {} toll peers",
            window.start,
            window.end,
            stubs_by_driver.len(),
            window_loads.len(),
            window_events.len(),
            peer_tolls.len(),
        );

        Self {
            config,
            calendar,
            window,
            live,
            history,
            ownership,
            snapshot,
            stubs_by_driver,
            window_loads,
            window_events,
            loads_by_driver,
            dispatcher_teams,
            peer_tolls,
        }
    }

    /// Period whose drivers form the retention pool.
    pub fn retention_period(&self) -> Option<PayrollWindow> {
        if self.live {
            self.history.latest_settled()
        } else {
            Some(self.window)
        }
    }

    pub fn window_stubs(&self) -> impl Iterator<Item = &'a PayStub> + '_ {
        self.stubs_by_driver.values().flatten().copied()
    }

    pub fn window_loads(&self) -> &[&'a LiveLoad] {
        &self.window_loads
    }

    /// Stubs settled in the retention period.
    pub fn retention_stubs(&self) -> Vec<&'a PayStub> {
        match self.retention_period() {
            Some(period) => self.history.stubs_in(period).collect(),
            None => Vec::new(),
        }
    }

    /// Drivers with activity in the window (plus the live roster).
    pub fn drivers(&self) -> BTreeSet<&'a str> {
        let mut drivers: BTreeSet<&'a str> = self.stubs_by_driver.keys().copied().collect();
        drivers.extend(self.window_loads.iter().map(|l| l.driver.as_str()));
        if self.live {
            drivers.extend(
                self.snapshot
                    .roster
                    .iter()
                    .filter(|r| r.dispatcher.is_some())
                    .map(|r| r.driver.as_str()),
            );
        }
        drivers
    }

    /// Dispatchers with activity in the window or a retention pool to answer for.
    pub fn dispatchers(&self) -> BTreeSet<&'a str> {
        let mut dispatchers: BTreeSet<&'a str> = self
            .window_stubs()
            .filter_map(|s| s.dispatcher.as_deref())
            .collect();
        dispatchers.extend(self.window_loads.iter().filter_map(|l| l.dispatcher.as_deref()));
        dispatchers.extend(self.window_events.iter().map(|e| e.dispatcher.as_str()));
        dispatchers.extend(self.retention_stubs().into_iter().filter_map(|s| s.dispatcher.as_deref()));
        if self.live {
            dispatchers.extend(self.snapshot.roster.iter().filter_map(|r| r.dispatcher.as_deref()));
        }
        dispatchers
    }

    fn driver_stubs(&self, driver: &str) -> Vec<&'a PayStub> {
        self.history.driver_stubs(driver).iter().map(|(_, s)| *s).collect()
    }

    fn driver_loads(&self, driver: &str) -> &[&'a LiveLoad] {
        self.loads_by_driver.get(driver).map(Vec::as_slice).unwrap_or(&[])
    }
}

// ── Driver ───────────────────────────────────────────────────────────────────

pub fn compute_driver_aggregate(driver: &str, ctx: &WindowContext<'_>) -> Driver {
    let stubs = ctx.driver_stubs(driver);
    let loads = ctx.driver_loads(driver);
    let in_window_stubs: &[&PayStub] = ctx.stubs_by_driver.get(driver).map(Vec::as_slice).unwrap_or(&[]);
    let in_window_loads: Vec<&LiveLoad> = loads
        .iter()
        .copied()
        .filter(|l| ctx.window.contains(l.pickup_date))
        .collect();

    // Identity: latest activity in the window, else the latest visible stub,
    // else the live roster.
    let latest_activity = in_window_stubs
        .iter()
        .map(|s| Activity::Stub(*s))
        .chain(in_window_loads.iter().map(|l| Activity::Load(*l)))
        .max_by_key(|a| a.date())
        .or_else(|| {
            stubs
                .iter()
                .filter(|s| ctx.calendar.period_of(s) <= ctx.window)
                .last()
                .map(|s| Activity::Stub(*s))
        });
    let roster = ctx.ownership.as_ref().and_then(|o| o.roster_entry(driver));

    let (dispatcher, team, company, franchise, contract_type) = match (latest_activity, roster) {
        (Some(a), _) => (
            a.dispatcher().map(str::to_string),
            a.team().map(str::to_string),
            a.company().map(str::to_string),
            a.franchise().map(str::to_string),
            a.contract_type(),
        ),
        (None, Some(r)) => (
            r.dispatcher.clone(),
            r.team.clone(),
            r.company.clone(),
            r.franchise.clone(),
            r.contract_type,
        ),
        (None, None) => (None, None, None, None, ContractType::default()),
    };

    let flag_ctx = FlagContext {
        rules:         &ctx.config.flags,
        calendar:      &ctx.calendar,
        as_of:         ctx.window,
        loads_through: ctx.window.end,
        peer_tolls:    &ctx.peer_tolls,
    };
    let flags = evaluate_flags(
        &FlagInputs { contract: contract_type, stubs: &stubs, loads },
        &flag_ctx,
    );
    let drop_risk = drop_risk_score(&flags, &ctx.config.risk_weights);

    let carried: Vec<&LiveLoad> = in_window_loads
        .iter()
        .copied()
        .filter(|l| l.status.carried_freight())
        .collect();
    let canceled_loads = in_window_loads.len() - carried.len();

    let (gross, miles, margin, net_pay, tolls) = if ctx.live {
        let gross: f64 = carried.iter().map(|l| l.price).sum();
        let margin: f64 = carried.iter().map(|l| l.cut).sum();
        (gross, carried.iter().map(|l| l.total_miles()).sum(), margin, gross - margin, 0.0)
    } else {
        let sum = |f: fn(&PayStub) -> f64| in_window_stubs.iter().map(|s| f(*s)).sum::<f64>();
        (
            sum(|s: &PayStub| s.gross),
            sum(|s: &PayStub| s.total_miles),
            sum(|s: &PayStub| s.margin),
            sum(|s: &PayStub| s.net_pay),
            sum(|s: &PayStub| s.toll_estimate),
        )
    };

    let liability = stubs
        .iter()
        .filter(|s| ctx.calendar.period_of(s) <= ctx.window)
        .last()
        .map_or(0.0, |s| s.liability());

    Driver {
        id: driver.to_string(),
        dispatcher,
        team,
        company,
        franchise,
        contract_type,
        flags,
        drop_risk,
        gross,
        miles,
        margin,
        net_pay,
        tolls,
        rpm: (miles > 0.0).then(|| gross / miles),
        liability,
        loads: in_window_loads.len(),
        canceled_loads,
    }
}

// ── Dispatcher ───────────────────────────────────────────────────────────────

/// Unscored per-dispatcher figures; the raw material of the peer pool.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherBasis {
    pub team:       Option<String>,
    pub roster_oo:  usize,
    pub roster_loo: usize,
    pub metrics:    DispatcherMetrics,
    pub retention:  RetentionBreakdown,
    pub tenure:     MedianTenure,
}

pub fn dispatcher_basis(dispatcher: &str, ctx: &WindowContext<'_>) -> DispatcherBasis {
    let loads: Vec<&LiveLoad> = ctx
        .window_loads
        .iter()
        .copied()
        .filter(|l| l.is_dispatched_by(dispatcher))
        .collect();
    let events: Vec<&DispatcherEvent> = ctx
        .window_events
        .iter()
        .copied()
        .filter(|e| e.dispatcher == dispatcher)
        .collect();
    let mut metrics = raw_metrics(&loads, &events, &ctx.config.compliance.low_rpm);

    let retention = match (ctx.retention_period(), &ctx.ownership) {
        (None, _) => RetentionBreakdown::default(),
        (Some(period), Some(ownership)) => {
            attribute_retention(&ctx.history, dispatcher, period, &RetentionMode::Live(ownership))
        }
        (Some(period), None) => {
            let mode = RetentionMode::Historical { pool_weeks: ctx.config.retention.pool_weeks };
            attribute_retention(&ctx.history, dispatcher, period, &mode)
        }
    };

    let tenure = match &ctx.ownership {
        Some(ownership) => median_tenure_by_contract(
            &ctx.history,
            dispatcher,
            &TenurePoint::Live { live_period: ctx.window, ownership },
        ),
        None => median_tenure_by_contract(&ctx.history, dispatcher, &TenurePoint::AsOf(ctx.window)),
    };

    metrics.retention_pct = retention.percent();
    metrics.tenure_oo = tenure.oo;
    metrics.tenure_loo = tenure.loo;

    let roster: BTreeMap<&str, ContractType> = match &ctx.ownership {
        Some(ownership) => ownership
            .drivers_of(dispatcher)
            .into_iter()
            .map(|d| (d, ownership.contract_of(d)))
            .collect(),
        None => ctx
            .window_stubs()
            .filter(|s| s.is_dispatched_by(dispatcher))
            .map(|s| (s.driver.as_str(), s.contract_type))
            .collect(),
    };
    let roster_oo = roster.values().filter(|c| **c == ContractType::OwnerOperator).count();

    let team = ctx
        .dispatcher_teams
        .get(dispatcher)
        .map(|t| t.to_string())
        .or_else(|| {
            ctx.snapshot
                .roster
                .iter()
                .filter(|r| r.dispatcher.as_deref() == Some(dispatcher))
                .find_map(|r| r.team.clone())
        });

    DispatcherBasis {
        team,
        roster_oo,
        roster_loo: roster.len() - roster_oo,
        metrics,
        retention,
        tenure,
    }
}

/// Every dispatcher of the window with its basis and peer-relative score.
pub struct PeerPool {
    bases:  BTreeMap<DispatcherId, DispatcherBasis>,
    scores: BTreeMap<DispatcherId, ComplianceScore>,
}

impl PeerPool {
    pub fn build(ctx: &WindowContext<'_>) -> Self {
        let bases: BTreeMap<DispatcherId, DispatcherBasis> = ctx
            .dispatchers()
            .into_iter()
            .map(|d| (d.to_string(), dispatcher_basis(d, ctx)))
            .collect();
        let metrics: BTreeMap<DispatcherId, DispatcherMetrics> = bases
            .iter()
            .map(|(d, b)| (d.clone(), b.metrics.clone()))
            .collect();
        let scores = score_pool(&metrics, &ctx.config.compliance_weights);
        Self { bases, scores }
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    pub fn dispatchers(&self) -> impl Iterator<Item = &str> {
        self.bases.keys().map(String::as_str)
    }
}

/// `None` when `dispatcher` is not part of the window's pool.
pub fn compute_dispatcher_aggregate(dispatcher: &str, pool: &PeerPool) -> Option<Dispatcher> {
    let basis = pool.bases.get(dispatcher)?;
    Some(Dispatcher {
        id:            dispatcher.to_string(),
        team:          basis.team.clone(),
        roster_oo:     basis.roster_oo,
        roster_loo:    basis.roster_loo,
        metrics:       basis.metrics.clone(),
        retention_pct: basis.retention.percent(),
        retention:     basis.retention.clone(),
        tenure:        basis.tenure,
        compliance:    pool.scores.get(dispatcher).cloned().unwrap_or_default(),
    })
}
