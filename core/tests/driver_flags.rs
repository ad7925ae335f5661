//! Driver flag engine: each rule in isolation, then the rule toggles.

use chrono::NaiveDate;
use fleetscore_core::{
    clock::{pay_date_from_window, PayDelay, PayrollCalendar, PayrollClock, PayrollWindow},
    config::{EngineConfig, FlagRulesConfig},
    flags::{evaluate_flags, FlagContext, FlagInputs, FlagKind, PeerTollProfile},
    records::{LiveLoad, LoadStatus, PayStub},
    threshold::ThresholdConfig,
    types::ContractType,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn clock() -> PayrollClock {
    PayrollClock::new(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap())
}

fn week(weeks_ago: i64) -> PayrollWindow {
    clock().resolve_window(weeks_ago).unwrap()
}

fn pay(weeks_ago: i64) -> NaiveDate {
    pay_date_from_window(&week(weeks_ago), PayDelay::Standard).unwrap()
}

/// A worked week at 2.00/mile.
fn stub(weeks_ago: i64) -> PayStub {
    PayStub::new("D1", pay(weeks_ago), "Ann").with_pay(2_000.0, 4_000.0, 1_200.0)
}

fn loaded(weeks_ago: i64, weight: f64) -> LiveLoad {
    LiveLoad::new("D1", "Ann", week(weeks_ago).start)
        .with_status(LoadStatus::Delivered)
        .with_weight(weight)
}

/// Every rule switched off; tests enable the one they exercise.
fn all_disabled() -> FlagRulesConfig {
    let mut rules = EngineConfig::default().flags;
    rules.high_tolls.enabled = false;
    rules.heavy_loads.enabled = false;
    rules.dispatcher_hopper.enabled = false;
    rules.tenure.enabled = false;
    rules.negative_balance.enabled = false;
    rules.low_rpm.enabled = false;
    rules.low_gross.enabled = false;
    rules.low_net.enabled = false;
    rules
}

/// Evaluate as of last week's settled period.
fn kinds(
    rules: &FlagRulesConfig,
    contract: ContractType,
    stubs: &[PayStub],
    loads: &[LiveLoad],
    peers: &PeerTollProfile,
) -> Vec<FlagKind> {
    let calendar = PayrollCalendar::default();
    let stub_refs: Vec<&PayStub> = stubs.iter().collect();
    let load_refs: Vec<&LiveLoad> = loads.iter().collect();
    let ctx = FlagContext {
        rules,
        calendar: &calendar,
        as_of: week(1),
        loads_through: week(1).end,
        peer_tolls: peers,
    };
    let inputs = FlagInputs { contract, stubs: &stub_refs, loads: &load_refs };
    evaluate_flags(&inputs, &ctx).into_iter().map(|f| f.kind).collect()
}

fn no_peers() -> PeerTollProfile {
    PeerTollProfile::default()
}

// ── Tenure ───────────────────────────────────────────────────────────────────

#[test]
fn few_worked_weeks_is_a_new_hire() {
    let mut rules = all_disabled();
    rules.tenure.enabled = true;
    let stubs: Vec<PayStub> = (1..=3).map(stub).collect();

    let flags = kinds(&rules, ContractType::LeaseOwnerOperator, &stubs, &[], &no_peers());
    assert_eq!(flags, vec![FlagKind::NewHire]);
}

#[test]
fn long_history_is_a_veteran_not_a_new_hire() {
    let mut rules = all_disabled();
    rules.tenure.enabled = true;
    rules.tenure.veteran_at = ThresholdConfig::flat(10.0);
    let stubs: Vec<PayStub> = (1..=12).map(stub).collect();

    let flags = kinds(&rules, ContractType::LeaseOwnerOperator, &stubs, &[], &no_peers());
    assert_eq!(flags, vec![FlagKind::Veteran]);
}

/// Zero-mile stubs are not worked weeks.
#[test]
fn zero_mile_weeks_do_not_count_toward_tenure() {
    let mut rules = all_disabled();
    rules.tenure.enabled = true;
    rules.tenure.veteran_at = ThresholdConfig::flat(10.0);
    let mut stubs: Vec<PayStub> = (1..=3).map(stub).collect();
    stubs.extend((4..=14).map(|w| PayStub::new("D1", pay(w), "Ann")));

    let flags = kinds(&rules, ContractType::LeaseOwnerOperator, &stubs, &[], &no_peers());
    assert_eq!(flags, vec![FlagKind::NewHire], "only 3 weeks had miles");
}

/// Stubs settled after the evaluation window are invisible.
#[test]
fn future_stubs_are_ignored() {
    let mut rules = all_disabled();
    rules.tenure.enabled = true;
    rules.tenure.new_hire_below = ThresholdConfig::flat(2.0);
    let stubs = vec![stub(2), stub(0), stub(-1)];

    let flags = kinds(&rules, ContractType::LeaseOwnerOperator, &stubs, &[], &no_peers());
    assert_eq!(flags, vec![FlagKind::NewHire], "only one stub is at or before last week");
}

/// A re-issued stub for the same week is still one week.
#[test]
fn duplicate_stubs_in_a_week_count_once_toward_tenure() {
    let mut rules = all_disabled();
    rules.tenure.enabled = true;
    rules.tenure.new_hire_below = ThresholdConfig::flat(3.0);
    let stubs = vec![stub(1), stub(1).with_tolls(5.0), stub(2), stub(2).with_tolls(5.0)];

    let flags = kinds(&rules, ContractType::LeaseOwnerOperator, &stubs, &[], &no_peers());
    assert_eq!(flags, vec![FlagKind::NewHire], "4 stubs over 2 weeks is 2 weeks of tenure");
}

// ── High tolls ───────────────────────────────────────────────────────────────

#[test]
fn top_decile_toll_average_is_flagged() {
    let mut rules = all_disabled();
    rules.high_tolls.enabled = true;
    let peers = PeerTollProfile::from_averages((1..=10).map(|v| v as f64 * 10.0).collect());
    let stubs: Vec<PayStub> = (1..=4).map(|w| stub(w).with_tolls(100.0)).collect();

    let flags = kinds(&rules, ContractType::LeaseOwnerOperator, &stubs, &[], &peers);
    assert_eq!(flags, vec![FlagKind::HighTolls]);

    let modest: Vec<PayStub> = (1..=4).map(|w| stub(w).with_tolls(50.0)).collect();
    assert!(kinds(&rules, ContractType::LeaseOwnerOperator, &modest, &[], &peers).is_empty());
}

#[test]
fn zero_tolls_are_never_high() {
    let mut rules = all_disabled();
    rules.high_tolls.enabled = true;
    let peers = PeerTollProfile::from_averages(vec![0.0; 10]);
    let stubs: Vec<PayStub> = (1..=4).map(stub).collect();

    assert!(kinds(&rules, ContractType::LeaseOwnerOperator, &stubs, &[], &peers).is_empty());
}

#[test]
fn toll_rule_needs_its_minimum_stub_count() {
    let mut rules = all_disabled();
    rules.high_tolls.enabled = true;
    rules.high_tolls.min_stubs = 4;
    let peers = PeerTollProfile::from_averages(vec![10.0, 20.0]);
    let stubs: Vec<PayStub> = (1..=3).map(|w| stub(w).with_tolls(500.0)).collect();

    assert!(kinds(&rules, ContractType::LeaseOwnerOperator, &stubs, &[], &peers).is_empty());
}

/// The flagged share is a whole number of peers, not a float index.
#[test]
fn toll_cutoff_flags_exactly_the_requested_share() {
    let peers = PeerTollProfile::from_averages((1..=10).map(|v| v as f64).collect());
    let flagged = |pct: f64| {
        peers
            .cutoff(pct)
            .map_or(0, |cut| (1..=10).filter(|v| *v as f64 >= cut).count())
    };

    assert_eq!(peers.cutoff(70.0), Some(4.0));
    assert_eq!(flagged(70.0), 7, "top 70% of 10 peers is 7 drivers");
    assert_eq!(flagged(30.0), 3);
    assert_eq!(flagged(100.0), 10);
    assert_eq!(peers.cutoff(0.0), None, "top 0% flags nobody");
    assert_eq!(flagged(0.0), 0);
}

#[test]
fn zero_top_percent_disables_high_tolls() {
    let mut rules = all_disabled();
    rules.high_tolls.enabled = true;
    rules.high_tolls.top_percent = 0.0;
    let peers = PeerTollProfile::from_averages((1..=10).map(|v| v as f64 * 10.0).collect());
    let stubs: Vec<PayStub> = (1..=4).map(|w| stub(w).with_tolls(500.0)).collect();

    assert!(kinds(&rules, ContractType::LeaseOwnerOperator, &stubs, &[], &peers).is_empty());
}

// ── Heavy loads ──────────────────────────────────────────────────────────────

#[test]
fn heavy_average_weight_is_flagged_per_contract() {
    let mut rules = all_disabled();
    rules.heavy_loads.enabled = true;
    rules.heavy_loads.max_avg_weight = ThresholdConfig::flat(42_000.0)
        .with_override(ContractType::OwnerOperator, 46_000.0)
        .with_min_sample(3);
    let loads: Vec<LiveLoad> = (1..=3).map(|w| loaded(w, 45_000.0)).collect();

    let loo = kinds(&rules, ContractType::LeaseOwnerOperator, &[], &loads, &no_peers());
    assert_eq!(loo, vec![FlagKind::HeavyLoads]);
    let oo = kinds(&rules, ContractType::OwnerOperator, &[], &loads, &no_peers());
    assert!(oo.is_empty(), "OO limit is higher");
}

/// Canceled, TONU and layover entries carry no freight and no weight.
#[test]
fn non_freight_loads_are_excluded() {
    let mut rules = all_disabled();
    rules.heavy_loads.enabled = true;
    rules.heavy_loads.max_avg_weight = ThresholdConfig::flat(42_000.0).with_min_sample(3);
    let loads = vec![
        loaded(1, 30_000.0),
        loaded(2, 30_000.0),
        loaded(1, 80_000.0).with_status(LoadStatus::Canceled),
        loaded(2, 80_000.0).with_status(LoadStatus::Tonu),
        loaded(3, 80_000.0).with_status(LoadStatus::Layover),
    ];

    assert!(kinds(&rules, ContractType::LeaseOwnerOperator, &[], &loads, &no_peers()).is_empty());
}

// ── Dispatcher hopper ────────────────────────────────────────────────────────

#[test]
fn many_dispatchers_in_lookback_is_flagged() {
    let mut rules = all_disabled();
    rules.dispatcher_hopper.enabled = true;
    rules.dispatcher_hopper.max_dispatchers = ThresholdConfig::flat(3.0)
        .with_override(ContractType::OwnerOperator, 4.0)
        .with_lookback(12);
    let stubs: Vec<PayStub> = ["Ann", "Bo", "Cy", "Di"]
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let mut s = stub(i as i64 + 1);
            s.dispatcher = Some(d.to_string());
            s
        })
        .collect();

    let loo = kinds(&rules, ContractType::LeaseOwnerOperator, &stubs, &[], &no_peers());
    assert_eq!(loo, vec![FlagKind::DispatcherHopper]);
    let oo = kinds(&rules, ContractType::OwnerOperator, &stubs, &[], &no_peers());
    assert!(oo.is_empty(), "4 dispatchers does not exceed the OO limit of 4");
}

#[test]
fn old_dispatchers_fall_out_of_the_lookback() {
    let mut rules = all_disabled();
    rules.dispatcher_hopper.enabled = true;
    rules.dispatcher_hopper.max_dispatchers = ThresholdConfig::flat(1.0).with_lookback(4);
    let mut old = stub(10);
    old.dispatcher = Some("Zed".into());
    let stubs = vec![old, stub(3), stub(2), stub(1)];

    assert!(kinds(&rules, ContractType::LeaseOwnerOperator, &stubs, &[], &no_peers()).is_empty());
}

// ── Negative balance ─────────────────────────────────────────────────────────

#[test]
fn latest_stub_exposure_over_limit_is_flagged() {
    let mut rules = all_disabled();
    rules.negative_balance.enabled = true;
    rules.negative_balance.max_exposure = ThresholdConfig::flat(2_500.0).with_min_sample(1);
    // |-2000 + 0| + (800 - 0) = 2800
    let stubs = vec![
        stub(2),
        stub(1).with_balance(-2_000.0, 0.0).with_po(800.0, 0.0),
    ];

    let flags = kinds(&rules, ContractType::LeaseOwnerOperator, &stubs, &[], &no_peers());
    assert_eq!(flags, vec![FlagKind::NegativeBalance]);
}

/// Only the most recent stub counts; a settled-up driver is clean.
#[test]
fn old_exposure_is_forgiven_once_settled() {
    let mut rules = all_disabled();
    rules.negative_balance.enabled = true;
    rules.negative_balance.max_exposure = ThresholdConfig::flat(2_500.0).with_min_sample(1);
    let stubs = vec![
        stub(3).with_balance(-9_000.0, 0.0),
        stub(2).with_balance(-9_000.0, 8_900.0).with_po(500.0, 500.0),
    ];
    let flags = kinds(&rules, ContractType::LeaseOwnerOperator, &stubs, &[], &no_peers());
    assert!(flags.is_empty(), "latest exposure is 100");
}

// ── Low performance ──────────────────────────────────────────────────────────

#[test]
fn half_the_weeks_below_rpm_floor_is_flagged() {
    let mut rules = all_disabled();
    rules.low_rpm.enabled = true;
    rules.low_rpm.floor = ThresholdConfig::flat(1.80).with_lookback(8).with_min_sample(4);
    rules.low_rpm.min_pct = 50.0;
    let stubs = vec![
        stub(1).with_pay(2_000.0, 3_000.0, 900.0),
        stub(2).with_pay(2_000.0, 3_000.0, 900.0),
        stub(3),
        stub(4),
    ];

    let flags = kinds(&rules, ContractType::LeaseOwnerOperator, &stubs, &[], &no_peers());
    assert_eq!(flags, vec![FlagKind::LowRpm]);
    assert!(
        kinds(&rules, ContractType::LeaseOwnerOperator, &stubs[..3], &[], &no_peers()).is_empty(),
        "three stubs are below the minimum sample"
    );
}

#[test]
fn low_gross_and_low_net_use_their_own_floors() {
    let mut rules = all_disabled();
    rules.low_gross.enabled = true;
    rules.low_gross.floor = ThresholdConfig::flat(5_000.0).with_min_sample(2);
    rules.low_gross.min_pct = 100.0;
    rules.low_net.enabled = true;
    rules.low_net.floor = ThresholdConfig::flat(500.0).with_min_sample(2);
    rules.low_net.min_pct = 100.0;
    let stubs = vec![stub(1), stub(2)];

    let flags = kinds(&rules, ContractType::LeaseOwnerOperator, &stubs, &[], &no_peers());
    assert_eq!(flags, vec![FlagKind::LowGross], "gross 4000 < 5000, net 1200 >= 500");
}

// ── Toggles ──────────────────────────────────────────────────────────────────

#[test]
fn disabled_catalog_raises_nothing() {
    let stubs: Vec<PayStub> = (1..=3)
        .map(|w| stub(w).with_tolls(900.0).with_balance(-50_000.0, 0.0))
        .collect();
    let peers = PeerTollProfile::from_averages(vec![1.0]);
    assert!(kinds(&all_disabled(), ContractType::OwnerOperator, &stubs, &[], &peers).is_empty());
}

#[test]
fn flags_carry_label_color_and_detail() {
    let mut rules = all_disabled();
    rules.tenure.enabled = true;
    let stubs = vec![stub(1)];
    let calendar = PayrollCalendar::default();
    let stub_refs: Vec<&PayStub> = stubs.iter().collect();
    let peers = no_peers();
    let ctx = FlagContext {
        rules:         &rules,
        calendar:      &calendar,
        as_of:         week(1),
        loads_through: week(1).end,
        peer_tolls:    &peers,
    };
    let flags = evaluate_flags(
        &FlagInputs { contract: ContractType::OwnerOperator, stubs: &stub_refs, loads: &[] },
        &ctx,
    );
    assert_eq!(flags.len(), 1);
    assert_eq!(flags[0].label, "New Hire");
    assert_eq!(flags[0].color, FlagKind::NewHire.color());
    assert!(!flags[0].detail.is_empty());
}
