//! The fleet engine. Owns the snapshot, the config and the view cache.
//!
//! PASS ORDER (fixed for every cache miss):
//!   1. Resolve the window selector to a work week
//!   2. Enrich stubs (once per snapshot, not per pass)
//!   3. Build the window context over the full snapshot
//!   4. Score every dispatcher against the full peer pool
//!   5. Aggregate every driver
//!   6. Apply the display filter and roll up KPIs
//!
//! RULES:
//!   - Scores never depend on the display filter. Filtering happens last.
//!   - Replacing the snapshot or editing the config invalidates the cache.
//!   - The engine does no I/O.

use crate::{
    aggregate::{compute_dispatcher_aggregate, compute_driver_aggregate, Dispatcher, Driver, PeerPool, WindowContext},
    cache::{AggregateCache, AggregateKey},
    clock::{PayrollClock, PayrollWindow},
    config::EngineConfig,
    enrichment::enrich_stubs,
    error::ScoreResult,
    kpi::{compute_team_kpis, KpiBundle, KpiInputs},
    records::{Activity, LiveLoad, PayStub},
    snapshot::FleetSnapshot,
    types::ContractFilter,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ── Filters ──────────────────────────────────────────────────────────────────

/// What the current viewer is allowed to see. The policy deciding this
/// lives with the caller; the engine only applies it to the output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum AccessScope {
    #[default]
    Unrestricted,
    Restricted {
        #[serde(default)]
        teams:       BTreeSet<String>,
        #[serde(default)]
        dispatchers: BTreeSet<String>,
        #[serde(default)]
        companies:   BTreeSet<String>,
    },
}

impl AccessScope {
    /// Visible when any one of team, dispatcher or company is granted.
    pub fn can_see(&self, team: Option<&str>, dispatcher: Option<&str>, company: Option<&str>) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Restricted { teams, dispatchers, companies } => {
                team.map_or(false, |t| teams.contains(t))
                    || dispatcher.map_or(false, |d| dispatchers.contains(d))
                    || company.map_or(false, |c| companies.contains(c))
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewFilter {
    /// 0 is the live week.
    pub weeks_ago: i64,
    pub team:      Option<String>,
    pub contract:  ContractFilter,
    pub company:   Option<String>,
    pub franchise: Option<String>,
    pub access:    AccessScope,
}

impl ViewFilter {
    pub fn weeks_ago(weeks_ago: i64) -> Self {
        Self { weeks_ago, ..Self::default() }
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    pub fn with_contract(mut self, contract: ContractFilter) -> Self {
        self.contract = contract;
        self
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    pub fn with_franchise(mut self, franchise: impl Into<String>) -> Self {
        self.franchise = Some(franchise.into());
        self
    }

    pub fn with_access(mut self, access: AccessScope) -> Self {
        self.access = access;
        self
    }
}

fn field_matches(wanted: &Option<String>, actual: Option<&str>) -> bool {
    wanted.as_deref().map_or(true, |w| actual == Some(w))
}

impl AggregateKey {
    fn admits_record(&self, record: Activity<'_>) -> bool {
        field_matches(&self.team, record.team())
            && field_matches(&self.company, record.company())
            && field_matches(&self.franchise, record.franchise())
            && self.contract.admits(record.contract_type())
            && self.access.can_see(record.team(), record.dispatcher(), record.company())
    }

    fn admits_driver(&self, driver: &Driver) -> bool {
        field_matches(&self.team, driver.team.as_deref())
            && field_matches(&self.company, driver.company.as_deref())
            && field_matches(&self.franchise, driver.franchise.as_deref())
            && self.contract.admits(driver.contract_type)
            && self.access.can_see(
                driver.team.as_deref(),
                driver.dispatcher.as_deref(),
                driver.company.as_deref(),
            )
    }

    /// Narrowing by company, franchise or contract keeps only dispatchers
    /// with at least one visible driver.
    fn admits_dispatcher(&self, dispatcher: &Dispatcher, drivers: &[Driver]) -> bool {
        let narrowed = self.company.is_some()
            || self.franchise.is_some()
            || self.contract != ContractFilter::All;
        field_matches(&self.team, dispatcher.team.as_deref())
            && self.access.can_see(dispatcher.team.as_deref(), Some(&dispatcher.id), None)
            && (!narrowed
                || drivers
                    .iter()
                    .any(|d| d.dispatcher.as_deref() == Some(dispatcher.id.as_str())))
    }
}

// ── View ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetView {
    pub window:      PayrollWindow,
    pub live:        bool,
    pub drivers:     Vec<Driver>,
    pub dispatchers: Vec<Dispatcher>,
    pub kpis:        KpiBundle,
}

fn build_view(
    config: &EngineConfig,
    snapshot: &FleetSnapshot,
    enriched: &[PayStub],
    live: bool,
    key: &AggregateKey,
) -> FleetView {
    let ctx = WindowContext::new(config, snapshot, enriched, key.window, live);
    let pool = PeerPool::build(&ctx);

    let drivers: Vec<Driver> = ctx
        .drivers()
        .into_iter()
        .map(|d| compute_driver_aggregate(d, &ctx))
        .filter(|d| key.admits_driver(d))
        .collect();
    let dispatchers: Vec<Dispatcher> = pool
        .dispatchers()
        .filter_map(|d| compute_dispatcher_aggregate(d, &pool))
        .filter(|d| key.admits_dispatcher(d, &drivers))
        .collect();

    let loads: Vec<&LiveLoad> = ctx
        .window_loads()
        .iter()
        .copied()
        .filter(|l| key.admits_record(Activity::Load(l)))
        .collect();
    let retention_stubs: Vec<&PayStub> = ctx
        .retention_stubs()
        .into_iter()
        .filter(|s| key.admits_record(Activity::Stub(s)))
        .collect();
    let driver_refs: Vec<&Driver> = drivers.iter().collect();
    let dispatcher_refs: Vec<&Dispatcher> = dispatchers.iter().collect();

    let kpis = compute_team_kpis(&KpiInputs {
        drivers:         &driver_refs,
        dispatchers:     &dispatcher_refs,
        loads:           &loads,
        retention_stubs: &retention_stubs,
        contract_filter: key.contract,
    });

    log::info!(
        "built view {}..{}: {} drivers, {} of {} dispatchers",
        key.window.start,
        key.window.end,
        drivers.len(),
        dispatchers.len(),
        pool.len(),
    );

    FleetView { window: key.window, live, drivers, dispatchers, kpis }
}

// ── Engine ───────────────────────────────────────────────────────────────────

pub struct FleetEngine {
    pub clock: PayrollClock,
    config:    EngineConfig,
    snapshot:  FleetSnapshot,
    enriched:  Vec<PayStub>,
    cache:     AggregateCache,
}

impl FleetEngine {
    pub fn new(clock: PayrollClock, config: EngineConfig, snapshot: FleetSnapshot) -> Self {
        let enriched = enrich_stubs(&snapshot.stubs);
        Self {
            clock,
            config,
            snapshot,
            enriched,
            cache: AggregateCache::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn snapshot(&self) -> &FleetSnapshot {
        &self.snapshot
    }

    pub fn cache(&self) -> &AggregateCache {
        &self.cache
    }

    /// Drivers, dispatchers and KPIs for `filter`, from cache when possible.
    pub fn view(&mut self, filter: &ViewFilter) -> ScoreResult<&FleetView> {
        let window = self.clock.resolve_window(filter.weeks_ago)?;
        window.validate()?;
        let live = self.clock.is_live(&window);

        let Self { config, snapshot, enriched, cache, .. } = self;
        Ok(cache.get_or_build(AggregateKey::new(window, filter), |key| {
            build_view(config, snapshot, enriched, live, key)
        }))
    }

    /// Swap in freshly loaded records.
    pub fn replace_snapshot(&mut self, snapshot: FleetSnapshot) {
        self.enriched = enrich_stubs(&snapshot.stubs);
        self.snapshot = snapshot;
        self.invalidate();
    }

    /// Read-modify-write edit of the active config.
    pub fn update_config(&mut self, edit: impl FnOnce(&mut EngineConfig)) {
        edit(&mut self.config);
        self.invalidate();
    }

    pub fn invalidate(&mut self) {
        self.cache.invalidate();
    }
}
