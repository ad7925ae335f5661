//! KPI aggregator: team roll-ups over a filtered view.

use chrono::NaiveDate;
use fleetscore_core::{
    aggregate::Driver,
    clock::{pay_date_from_window, PayDelay, PayrollClock, PayrollWindow},
    config::EngineConfig,
    engine::{FleetEngine, ViewFilter},
    kpi::{compute_team_kpis, KpiBundle, KpiInputs},
    records::{ContractStatusRecord, LiveLoad, LoadStatus, PayStub},
    snapshot::FleetSnapshot,
    types::{ContractFilter, ContractType, RetentionStatus},
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn clock() -> PayrollClock {
    PayrollClock::new(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap())
}

fn week(weeks_ago: i64) -> PayrollWindow {
    clock().resolve_window(weeks_ago).unwrap()
}

fn stub(driver: &str, weeks_ago: i64, dispatcher: &str, team: &str) -> PayStub {
    let pay_date = pay_date_from_window(&week(weeks_ago), PayDelay::Standard).unwrap();
    PayStub::new(driver, pay_date, dispatcher)
        .with_team(team)
        .with_status(RetentionStatus::Active)
}

/// X (OO, North, dispatcher A) and Y (LOO, South, dispatcher B), settled
/// for last week, with one load each and a live load for X. Y has since
/// been terminated.
fn two_team_fleet() -> FleetSnapshot {
    let mut snapshot = FleetSnapshot::default();
    snapshot.stubs.push(
        stub("X", 1, "A", "North")
            .with_contract(ContractType::OwnerOperator)
            .with_pay(2_000.0, 4_000.0, 1_500.0)
            .with_margin(400.0),
    );
    snapshot.stubs.push(
        stub("Y", 1, "B", "South")
            .with_status(RetentionStatus::Terminated)
            .with_pay(1_000.0, 3_000.0, 1_000.0)
            .with_margin(300.0),
    );
    snapshot.loads.push(
        LiveLoad::new("X", "A", week(1).start)
            .with_team("North")
            .with_contract(ContractType::OwnerOperator)
            .with_status(LoadStatus::Delivered)
            .with_trip(4_000.0, 1_900.0, 100.0),
    );
    snapshot.loads.push(
        LiveLoad::new("Y", "B", week(1).start)
            .with_team("South")
            .with_status(LoadStatus::Canceled),
    );
    snapshot.loads.push(
        LiveLoad::new("X", "A", week(0).start)
            .with_team("North")
            .with_contract(ContractType::OwnerOperator)
            .with_status(LoadStatus::InTransit)
            .with_trip(3_000.0, 900.0, 100.0)
            .with_cut(300.0),
    );
    snapshot.contract_statuses.push(ContractStatusRecord {
        driver: "Y".into(),
        status: RetentionStatus::Terminated,
        as_of:  None,
    });
    snapshot
}

fn engine() -> FleetEngine {
    FleetEngine::new(clock(), EngineConfig::default(), two_team_fleet())
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// ── Unit ─────────────────────────────────────────────────────────────────────

#[test]
fn empty_inputs_give_zeros_and_no_retention() {
    let kpis = compute_team_kpis(&KpiInputs {
        drivers:         &[],
        dispatchers:     &[],
        loads:           &[],
        retention_stubs: &[],
        contract_filter: ContractFilter::All,
    });
    assert_eq!(kpis, KpiBundle::default());
    assert_eq!(kpis.retention_pct, None, "no pool is not 0% retention");
}

/// Without any attributed pool the roll-up falls back to the fleet-wide
/// Active share of the period's stubs.
#[test]
fn retention_falls_back_to_global_share() {
    let stubs = [
        stub("A1", 1, "A", "North"),
        stub("A2", 1, "A", "North"),
        stub("A3", 1, "B", "North"),
        stub("T1", 1, "B", "North").with_status(RetentionStatus::Terminated),
    ];
    let stub_refs: Vec<&PayStub> = stubs.iter().collect();
    let kpis = compute_team_kpis(&KpiInputs {
        drivers:         &[],
        dispatchers:     &[],
        loads:           &[],
        retention_stubs: &stub_refs,
        contract_filter: ContractFilter::All,
    });
    assert_eq!(kpis.retention_pct, Some(75.0));
}

#[test]
fn active_trucks_counts_distinct_drivers() {
    let driver = |id: &str, gross: f64, miles: f64| Driver {
        id:             id.to_string(),
        dispatcher:     Some("A".into()),
        team:           None,
        company:        None,
        franchise:      None,
        contract_type:  ContractType::LeaseOwnerOperator,
        flags:          Vec::new(),
        drop_risk:      10.0,
        gross,
        miles,
        margin:         gross * 0.1,
        net_pay:        gross * 0.9,
        tolls:          0.0,
        rpm:            (miles > 0.0).then(|| gross / miles),
        liability:      250.0,
        loads:          1,
        canceled_loads: 0,
    };
    let drivers = [driver("X", 3_000.0, 1_000.0), driver("Y", 1_000.0, 1_000.0), driver("Z", 0.0, 0.0)];
    let refs: Vec<&Driver> = drivers.iter().collect();
    let kpis = compute_team_kpis(&KpiInputs {
        drivers:         &refs,
        dispatchers:     &[],
        loads:           &[],
        retention_stubs: &[],
        contract_filter: ContractFilter::All,
    });
    assert_eq!(kpis.active_trucks, 3);
    assert!(close(kpis.total_gross, 4_000.0));
    assert!(close(kpis.team_rpm, 2.0), "RPM is total gross over total miles");
    assert!(close(kpis.team_margin, 400.0));
    assert!(close(kpis.total_liability, 750.0));
    assert!(close(kpis.median_drop_risk, 10.0));
}

// ── Engine ───────────────────────────────────────────────────────────────────

#[test]
fn settled_week_rolls_up_from_stubs() {
    let mut engine = engine();
    let view = engine.view(&ViewFilter::weeks_ago(1)).unwrap();
    let k = &view.kpis;

    assert!(!view.live);
    assert_eq!(k.active_trucks, 2);
    assert!(close(k.total_gross, 7_000.0));
    assert!(close(k.team_rpm, 7_000.0 / 3_000.0));
    assert!(close(k.team_margin, 700.0));
    assert_eq!(k.canceled_loads, 1);
    assert_eq!((k.retention.retained, k.retention.terminated), (1, 1));
    assert_eq!(k.retention_pct, Some(50.0));
    assert!((0.0..=100.0).contains(&k.median_drop_risk));
    assert!((0.0..=100.0).contains(&k.median_compliance));
}

#[test]
fn team_filter_narrows_every_figure() {
    let mut engine = engine();
    let view = engine.view(&ViewFilter::weeks_ago(1).with_team("North")).unwrap();
    let k = &view.kpis;

    assert_eq!(k.active_trucks, 1);
    assert!(close(k.total_gross, 4_000.0));
    assert_eq!(k.canceled_loads, 0, "the canceled load is South's");
    assert_eq!(k.retention_pct, Some(100.0));
    assert_eq!(view.dispatchers.len(), 1);
    assert_eq!(view.dispatchers[0].id, "A");
}

#[test]
fn contract_filter_restricts_retention_to_matching_drivers() {
    let mut engine = engine();
    let view = engine
        .view(&ViewFilter::weeks_ago(1).with_contract(ContractFilter::LeaseOwnerOperator))
        .unwrap();
    let k = &view.kpis;

    assert_eq!(k.active_trucks, 1);
    assert_eq!(view.drivers[0].id, "Y");
    assert_eq!(k.retention.pool_size, 1);
    assert_eq!(k.retention_pct, Some(0.0));
    let ids: Vec<&str> = view.dispatchers.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["B"], "A has no LOO driver in view");
}

/// The live week has no stubs yet; money comes from its loads.
#[test]
fn live_week_totals_come_from_loads() {
    let mut engine = engine();
    let view = engine.view(&ViewFilter::weeks_ago(0)).unwrap();

    assert!(view.live);
    let x = view.drivers.iter().find(|d| d.id == "X").unwrap();
    assert!(close(x.gross, 3_000.0));
    assert!(close(x.margin, 300.0));
    assert!(close(x.net_pay, 2_700.0));
    assert!(close(x.miles, 1_000.0));
    assert_eq!(x.rpm, Some(3.0));
    assert!(close(view.kpis.total_gross, 3_000.0));
}

/// Live retention pools the latest settled week: X is still hauling for
/// A, and Y's last stub was a termination under B.
#[test]
fn live_week_retention_uses_latest_settled_pool() {
    let mut engine = engine();
    let view = engine.view(&ViewFilter::weeks_ago(0)).unwrap();
    let k = &view.kpis;

    assert_eq!(k.retention.pool_size, 2);
    assert_eq!(k.retention.retained, 1);
    assert_eq!(k.retention_pct, Some(50.0));
}
