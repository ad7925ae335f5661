//! Drop-risk scorer: weighted flag membership on a 0–100 scale.

use fleetscore_core::{
    config::{EngineConfig, WeightConfig},
    flags::{DriverFlag, FlagKind},
    risk::drop_risk_score,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn flag(kind: FlagKind) -> DriverFlag {
    DriverFlag {
        kind,
        label:  kind.label().to_string(),
        color:  kind.color(),
        detail: String::new(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn single_flag_takes_its_share_of_total_weight() {
    let weights = WeightConfig::from_pairs([("highTolls", 50.0), ("tenure", 50.0)]);
    let score = drop_risk_score(&[flag(FlagKind::HighTolls)], &weights);
    assert!((score - 50.0).abs() < 1e-9, "expected 50, got {score}");
}

/// Weights need not sum to 100.
#[test]
fn score_is_normalized_by_configured_total() {
    let weights = WeightConfig::from_pairs([("lowRpm", 3.0), ("lowNet", 1.0)]);
    let score = drop_risk_score(&[flag(FlagKind::LowRpm)], &weights);
    assert!((score - 75.0).abs() < 1e-9, "expected 75, got {score}");
}

#[test]
fn every_negative_flag_scores_one_hundred() {
    let weights = EngineConfig::default().risk_weights;
    let flags: Vec<DriverFlag> = [
        FlagKind::HighTolls,
        FlagKind::HeavyLoads,
        FlagKind::DispatcherHopper,
        FlagKind::NewHire,
        FlagKind::NegativeBalance,
        FlagKind::LowRpm,
        FlagKind::LowGross,
        FlagKind::LowNet,
    ]
    .into_iter()
    .map(flag)
    .collect();
    let score = drop_risk_score(&flags, &weights);
    assert!((score - 100.0).abs() < 1e-9, "expected 100, got {score}");
}

#[test]
fn veteran_subtracts_and_floors_at_zero() {
    let weights = WeightConfig::from_pairs([("tenure", 40.0), ("lowGross", 20.0), ("lowNet", 40.0)]);

    let offset = drop_risk_score(&[flag(FlagKind::Veteran), flag(FlagKind::LowNet), flag(FlagKind::LowGross)], &weights);
    assert!((offset - 20.0).abs() < 1e-9, "60 - 40 of 100, got {offset}");

    let floored = drop_risk_score(&[flag(FlagKind::Veteran)], &weights);
    assert_eq!(floored, 0.0);
}

#[test]
fn unweighted_rules_contribute_nothing() {
    let weights = WeightConfig::from_pairs([("lowNet", 10.0)]);
    assert_eq!(drop_risk_score(&[flag(FlagKind::HighTolls)], &weights), 0.0);
    assert_eq!(drop_risk_score(&[], &weights), 0.0);
    assert_eq!(drop_risk_score(&[flag(FlagKind::LowNet)], &WeightConfig::default()), 0.0);
}
