//! Driver flag engine: evaluates the rule catalog against one driver.
//!
//! Every rule:
//!   1. Is toggled and configured independently (see `FlagRulesConfig`)
//!   2. Reads only worked stubs (miles > 0) settled at or before `as_of`
//!   3. Applies its own lookback: all time, or the last N pay periods
//!   4. Stays silent when its minimum sample is not met
//!
//! Rules return at most one flag each; Tenure yields New Hire or Veteran,
//! never both.

use crate::{
    clock::{PayrollCalendar, PayrollWindow},
    config::{FlagRulesConfig, HighTollsRule, LowPerformanceRule},
    records::{LiveLoad, PayStub},
    types::ContractType,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    HighTolls,
    HeavyLoads,
    DispatcherHopper,
    NewHire,
    Veteran,
    NegativeBalance,
    LowRpm,
    LowGross,
    LowNet,
}

impl FlagKind {
    /// Weight key of the rule that raises this flag.
    pub fn rule_id(&self) -> &'static str {
        match self {
            Self::HighTolls        => "highTolls",
            Self::HeavyLoads       => "heavyLoads",
            Self::DispatcherHopper => "dispatcherHopper",
            Self::NewHire          => "tenure",
            Self::Veteran          => "tenure",
            Self::NegativeBalance  => "negativeBalance",
            Self::LowRpm           => "lowRpm",
            Self::LowGross         => "lowGross",
            Self::LowNet           => "lowNet",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::HighTolls        => "High Tolls",
            Self::HeavyLoads       => "Heavy Loads",
            Self::DispatcherHopper => "Dispatcher Hopper",
            Self::NewHire          => "New Hire",
            Self::Veteran          => "Veteran",
            Self::NegativeBalance  => "Negative Balance/PO",
            Self::LowRpm           => "Low RPM",
            Self::LowGross         => "Low Gross",
            Self::LowNet           => "Low Net",
        }
    }

    /// Positive flags lower drop risk instead of raising it.
    pub fn is_positive(&self) -> bool {
        matches!(self, Self::Veteran)
    }

    pub fn color(&self) -> FlagColor {
        match self {
            Self::Veteran                                   => FlagColor::Green,
            Self::NewHire                                   => FlagColor::Blue,
            Self::NegativeBalance | Self::DispatcherHopper  => FlagColor::Red,
            Self::HighTolls | Self::HeavyLoads              => FlagColor::Orange,
            Self::LowRpm | Self::LowGross | Self::LowNet    => FlagColor::Amber,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagColor {
    Red,
    Orange,
    Amber,
    Blue,
    Green,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverFlag {
    pub kind:   FlagKind,
    pub label:  String,
    pub color:  FlagColor,
    pub detail: String,
}

impl DriverFlag {
    fn new(kind: FlagKind, detail: String) -> Self {
        Self {
            kind,
            label: kind.label().to_string(),
            color: kind.color(),
            detail,
        }
    }
}

/// One driver's records, already enriched.
#[derive(Debug, Clone, Copy)]
pub struct FlagInputs<'a> {
    pub contract: ContractType,
    pub stubs:    &'a [&'a PayStub],
    pub loads:    &'a [&'a LiveLoad],
}

/// Point in time and peer context shared by every driver in a pass.
#[derive(Debug, Clone, Copy)]
pub struct FlagContext<'a> {
    pub rules:         &'a FlagRulesConfig,
    pub calendar:      &'a PayrollCalendar,
    /// Last pay period whose stubs are visible.
    pub as_of:         PayrollWindow,
    /// Loads picked up after this date are ignored.
    pub loads_through: NaiveDate,
    pub peer_tolls:    &'a PeerTollProfile,
}

// ── Peer toll profile ────────────────────────────────────────────────────────

/// Sorted per-driver average toll estimates across the whole fleet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeerTollProfile {
    averages: Vec<f64>,
}

impl PeerTollProfile {
    pub fn from_averages(mut averages: Vec<f64>) -> Self {
        averages.retain(|v| v.is_finite());
        averages.sort_by(f64::total_cmp);
        Self { averages }
    }

    /// Smallest average that still sits in the top `top_percent` of peers.
    /// `None` when that share rounds to no driver at all.
    pub fn cutoff(&self, top_percent: f64) -> Option<f64> {
        let n = self.averages.len();
        let share = (top_percent / 100.0).clamp(0.0, 1.0);
        let flagged = ((n as f64) * share).round() as usize;
        if flagged == 0 {
            return None;
        }
        Some(self.averages[n - flagged.min(n)])
    }

    pub fn len(&self) -> usize {
        self.averages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.averages.is_empty()
    }
}

/// A driver's average toll over the High Tolls lookback, when the sample
/// is large enough.
pub fn average_toll(
    stubs: &[&PayStub],
    rule: &HighTollsRule,
    calendar: &PayrollCalendar,
    as_of: PayrollWindow,
) -> Option<f64> {
    let window = worked_stubs(stubs, calendar, as_of, rule.lookback_weeks);
    if window.is_empty() || window.len() < rule.min_stubs {
        return None;
    }
    Some(window.iter().map(|s| s.toll_estimate).sum::<f64>() / window.len() as f64)
}

// ── Evaluation ───────────────────────────────────────────────────────────────

pub fn evaluate_flags(inputs: &FlagInputs<'_>, ctx: &FlagContext<'_>) -> Vec<DriverFlag> {
    [
        high_tolls(inputs, ctx),
        heavy_loads(inputs, ctx),
        dispatcher_hopper(inputs, ctx),
        tenure(inputs, ctx),
        negative_balance(inputs, ctx),
        low_performance(inputs, ctx, FlagKind::LowRpm, &ctx.rules.low_rpm, |s| s.rpm()),
        low_performance(inputs, ctx, FlagKind::LowGross, &ctx.rules.low_gross, |s| Some(s.gross)),
        low_performance(inputs, ctx, FlagKind::LowNet, &ctx.rules.low_net, |s| Some(s.net_pay)),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Worked stubs settled at or before `as_of`, limited to the last
/// `lookback` periods when given.
fn worked_stubs<'a>(
    stubs: &[&'a PayStub],
    calendar: &PayrollCalendar,
    as_of: PayrollWindow,
    lookback: Option<u32>,
) -> Vec<&'a PayStub> {
    let earliest = lookback.map(|weeks| as_of.shifted(-(weeks.max(1) as i64 - 1)));
    stubs
        .iter()
        .copied()
        .filter(|s| s.is_worked())
        .filter(|s| {
            let period = calendar.period_of(s);
            period <= as_of && earliest.map_or(true, |e| period >= e)
        })
        .collect()
}

fn high_tolls(inputs: &FlagInputs<'_>, ctx: &FlagContext<'_>) -> Option<DriverFlag> {
    let rule = &ctx.rules.high_tolls;
    if !rule.enabled {
        return None;
    }
    let avg = average_toll(inputs.stubs, rule, ctx.calendar, ctx.as_of)?;
    let cutoff = ctx.peer_tolls.cutoff(rule.top_percent)?;
    (avg > 0.0 && avg >= cutoff).then(|| {
        DriverFlag::new(
            FlagKind::HighTolls,
            format!(
                "avg toll ${avg:.2}/wk, top {:.0}% of peers starts at ${cutoff:.2}",
                rule.top_percent
            ),
        )
    })
}

fn heavy_loads(inputs: &FlagInputs<'_>, ctx: &FlagContext<'_>) -> Option<DriverFlag> {
    let rule = &ctx.rules.heavy_loads;
    if !rule.enabled {
        return None;
    }
    let threshold = &rule.max_avg_weight;
    let earliest = threshold
        .lookback_weeks
        .map(|weeks| ctx.as_of.shifted(-(weeks.max(1) as i64 - 1)).start);

    let weights: Vec<f64> = inputs
        .loads
        .iter()
        .filter(|l| l.status.carried_freight())
        .filter(|l| l.pickup_date <= ctx.loads_through)
        .filter(|l| earliest.map_or(true, |e| l.pickup_date >= e))
        .map(|l| l.weight_lbs)
        .collect();

    if weights.is_empty() || weights.len() < threshold.min_sample_or(1) {
        return None;
    }
    let avg = weights.iter().sum::<f64>() / weights.len() as f64;
    let limit = threshold.resolve_for(inputs.contract);
    (avg > limit).then(|| {
        DriverFlag::new(
            FlagKind::HeavyLoads,
            format!("avg {avg:.0} lbs over {} loads (limit {limit:.0})", weights.len()),
        )
    })
}

fn dispatcher_hopper(inputs: &FlagInputs<'_>, ctx: &FlagContext<'_>) -> Option<DriverFlag> {
    let rule = &ctx.rules.dispatcher_hopper;
    if !rule.enabled {
        return None;
    }
    let threshold = &rule.max_dispatchers;
    let stubs = worked_stubs(inputs.stubs, ctx.calendar, ctx.as_of, threshold.lookback_weeks);
    if stubs.len() < threshold.min_sample_or(1) {
        return None;
    }
    let dispatchers: BTreeSet<&str> = stubs.iter().filter_map(|s| s.dispatcher.as_deref()).collect();
    let limit = threshold.resolve_for(inputs.contract);
    (dispatchers.len() as f64 > limit).then(|| {
        DriverFlag::new(
            FlagKind::DispatcherHopper,
            format!("{} dispatchers (limit {limit:.0})", dispatchers.len()),
        )
    })
}

fn tenure(inputs: &FlagInputs<'_>, ctx: &FlagContext<'_>) -> Option<DriverFlag> {
    let rule = &ctx.rules.tenure;
    if !rule.enabled {
        return None;
    }
    let weeks = worked_stubs(inputs.stubs, ctx.calendar, ctx.as_of, None)
        .into_iter()
        .map(|s| ctx.calendar.period_of(s))
        .collect::<BTreeSet<_>>()
        .len() as f64;
    let new_hire_below = rule.new_hire_below.resolve_for(inputs.contract);
    let veteran_at = rule.veteran_at.resolve_for(inputs.contract);

    if weeks < new_hire_below {
        Some(DriverFlag::new(
            FlagKind::NewHire,
            format!("{weeks:.0} worked weeks (new hire below {new_hire_below:.0})"),
        ))
    } else if weeks >= veteran_at {
        Some(DriverFlag::new(
            FlagKind::Veteran,
            format!("{weeks:.0} worked weeks (veteran from {veteran_at:.0})"),
        ))
    } else {
        None
    }
}

fn negative_balance(inputs: &FlagInputs<'_>, ctx: &FlagContext<'_>) -> Option<DriverFlag> {
    let rule = &ctx.rules.negative_balance;
    if !rule.enabled {
        return None;
    }
    let threshold = &rule.max_exposure;
    let stubs = worked_stubs(inputs.stubs, ctx.calendar, ctx.as_of, threshold.lookback_weeks);
    if stubs.is_empty() || stubs.len() < threshold.min_sample_or(1) {
        return None;
    }
    let latest = stubs.iter().max_by_key(|s| s.pay_date)?;
    let exposure = latest.liability();
    let limit = threshold.resolve_for(inputs.contract);
    (exposure > limit).then(|| {
        DriverFlag::new(
            FlagKind::NegativeBalance,
            format!(
                "balance+PO ${exposure:.2} on {} (limit ${limit:.2})",
                latest.pay_date
            ),
        )
    })
}

fn low_performance(
    inputs: &FlagInputs<'_>,
    ctx: &FlagContext<'_>,
    kind: FlagKind,
    rule: &LowPerformanceRule,
    value: impl Fn(&PayStub) -> Option<f64>,
) -> Option<DriverFlag> {
    if !rule.enabled {
        return None;
    }
    let stubs = worked_stubs(inputs.stubs, ctx.calendar, ctx.as_of, rule.floor.lookback_weeks);
    if stubs.is_empty() || stubs.len() < rule.floor.min_sample_or(1) {
        return None;
    }
    let floor = rule.floor.resolve_for(inputs.contract);
    let low = stubs
        .iter()
        .copied()
        .filter_map(|s| value(s))
        .filter(|v| *v < floor)
        .count();
    let pct = low as f64 / stubs.len() as f64 * 100.0;
    (pct >= rule.min_pct).then(|| {
        DriverFlag::new(
            kind,
            format!("{low} of {} weeks below {floor:.2} ({pct:.0}%)", stubs.len()),
        )
    })
}
