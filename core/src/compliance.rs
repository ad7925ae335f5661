//! Compliance scorer: peer-normalized weighted composite per dispatcher.
//!
//! RULES:
//!   - Scores are computed over the full peer pool for the period, never a
//!     display-filtered subset, so a dispatcher's score does not depend on
//!     what the viewer filtered.
//!   - A metric with no data (None) is excluded, never treated as 0.
//!   - The composite divides by the weights of the metrics the dispatcher
//!     actually has, so missing data never deflates a score.

use crate::{
    config::WeightConfig,
    event::{DispatcherEvent, EventFeed},
    records::{LiveLoad, WellnessOutcome},
    stats::mean,
    threshold::ThresholdConfig,
    types::DispatcherId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Metrics ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceMetric {
    Moves,
    HiddenMiles,
    LowRpm,
    Overdue,
    TuesdayOpen,
    Wellness,
    Retention,
    TenureOo,
    TenureLoo,
    TrailerDrops,
    TrailerRecoveries,
    Paperwork,
    Calculator,
    RcEntry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
    /// Already a 0–100 percentage.
    AsIs,
}

impl ComplianceMetric {
    pub const ALL: [ComplianceMetric; 14] = [
        Self::Moves,
        Self::HiddenMiles,
        Self::LowRpm,
        Self::Overdue,
        Self::TuesdayOpen,
        Self::Wellness,
        Self::Retention,
        Self::TenureOo,
        Self::TenureLoo,
        Self::TrailerDrops,
        Self::TrailerRecoveries,
        Self::Paperwork,
        Self::Calculator,
        Self::RcEntry,
    ];

    /// Weight key. Both tenure metrics share the "tenure" weight.
    pub fn weight_id(&self) -> &'static str {
        match self {
            Self::Moves             => "moves",
            Self::HiddenMiles       => "hiddenMiles",
            Self::LowRpm            => "lowRpm",
            Self::Overdue           => "overdue",
            Self::TuesdayOpen       => "tuesdayOpen",
            Self::Wellness          => "wellness",
            Self::Retention         => "retention",
            Self::TenureOo          => "tenure",
            Self::TenureLoo         => "tenure",
            Self::TrailerDrops      => "trailerDrops",
            Self::TrailerRecoveries => "trailerRecoveries",
            Self::Paperwork         => "paperwork",
            Self::Calculator        => "calculator",
            Self::RcEntry           => "rcEntry",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Self::Wellness => Direction::AsIs,
            Self::Retention
            | Self::TenureOo
            | Self::TenureLoo
            | Self::TrailerRecoveries
            | Self::Calculator => Direction::HigherIsBetter,
            Self::Moves
            | Self::HiddenMiles
            | Self::LowRpm
            | Self::Overdue
            | Self::TuesdayOpen
            | Self::TrailerDrops
            | Self::Paperwork
            | Self::RcEntry => Direction::LowerIsBetter,
        }
    }
}

/// Raw per-window values for one dispatcher. `None` means no data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatcherMetrics {
    pub moves:              Option<f64>,
    pub hidden_miles:       Option<f64>,
    pub low_rpm:            Option<f64>,
    pub overdue_days:       Option<f64>,
    pub tuesday_open:       Option<f64>,
    pub wellness_pct:       Option<f64>,
    pub retention_pct:      Option<f64>,
    pub tenure_oo:          Option<f64>,
    pub tenure_loo:         Option<f64>,
    pub trailer_drops:      Option<f64>,
    pub trailer_recoveries: Option<f64>,
    pub missing_paperwork:  Option<f64>,
    pub calculator_minutes: Option<f64>,
    pub rc_entry_minutes:   Option<f64>,
}

impl DispatcherMetrics {
    pub fn get(&self, metric: ComplianceMetric) -> Option<f64> {
        let value = match metric {
            ComplianceMetric::Moves             => self.moves,
            ComplianceMetric::HiddenMiles       => self.hidden_miles,
            ComplianceMetric::LowRpm            => self.low_rpm,
            ComplianceMetric::Overdue           => self.overdue_days,
            ComplianceMetric::TuesdayOpen       => self.tuesday_open,
            ComplianceMetric::Wellness          => self.wellness_pct,
            ComplianceMetric::Retention         => self.retention_pct,
            ComplianceMetric::TenureOo          => self.tenure_oo,
            ComplianceMetric::TenureLoo         => self.tenure_loo,
            ComplianceMetric::TrailerDrops      => self.trailer_drops,
            ComplianceMetric::TrailerRecoveries => self.trailer_recoveries,
            ComplianceMetric::Paperwork         => self.missing_paperwork,
            ComplianceMetric::Calculator        => self.calculator_minutes,
            ComplianceMetric::RcEntry           => self.rc_entry_minutes,
        };
        value.filter(|v| v.is_finite())
    }
}

/// Fill the load- and feed-derived metrics. Retention and tenure are left
/// for the aggregator.
pub fn raw_metrics(
    loads: &[&LiveLoad],
    events: &[&DispatcherEvent],
    low_rpm: &ThresholdConfig,
) -> DispatcherMetrics {
    let mut metrics = DispatcherMetrics::default();

    if !loads.is_empty() {
        let count = |pred: &dyn Fn(&LiveLoad) -> bool| loads.iter().filter(|l| pred(**l)).count() as f64;
        metrics.moves = Some(count(&|l| l.moved_load));
        metrics.hidden_miles = Some(count(&|l| l.hidden_miles));
        metrics.low_rpm = Some(count(&|l| {
            l.status.carried_freight()
                && l.rpm().map_or(false, |rpm| rpm < low_rpm.resolve_for(l.contract_type))
        }));

        let outcomes: Vec<WellnessOutcome> = loads.iter().filter_map(|l| l.wellness).collect();
        if !outcomes.is_empty() {
            let passed = outcomes.iter().filter(|o| **o == WellnessOutcome::Pass).count();
            metrics.wellness_pct = Some(passed as f64 / outcomes.len() as f64 * 100.0);
        }
    }

    let mut feeds: BTreeMap<EventFeed, Vec<f64>> = BTreeMap::new();
    for event in events {
        feeds.entry(event.kind.feed()).or_default().push(event.kind.amount());
    }
    let sum = |feed: EventFeed| feeds.get(&feed).map(|v| v.iter().sum::<f64>());

    metrics.overdue_days = sum(EventFeed::Overdue);
    metrics.tuesday_open = sum(EventFeed::TuesdayOpen);
    metrics.missing_paperwork = sum(EventFeed::Paperwork);
    metrics.trailer_drops = sum(EventFeed::TrailerDrops);
    metrics.trailer_recoveries = sum(EventFeed::TrailerRecoveries);
    metrics.calculator_minutes = sum(EventFeed::Calculator);
    metrics.rc_entry_minutes = feeds
        .get(&EventFeed::RcEntry)
        .and_then(|v| mean(v.iter().copied()));

    metrics
}

// ── Scoring ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceScore {
    /// Weighted composite in [0, 100].
    pub composite:      f64,
    /// Normalized 0–100 score per weight key that had data.
    pub components:     BTreeMap<String, f64>,
    /// Sum of the weights that actually applied.
    pub applied_weight: f64,
}

/// Normalize one value against the peer maximum for its metric.
pub fn normalize(value: f64, peer_max: f64, direction: Direction) -> f64 {
    let score = match direction {
        Direction::AsIs => value,
        Direction::HigherIsBetter if peer_max > 0.0 => value / peer_max * 100.0,
        Direction::HigherIsBetter => 0.0,
        Direction::LowerIsBetter if peer_max > 0.0 => (1.0 - value / peer_max) * 100.0,
        Direction::LowerIsBetter => 100.0,
    };
    score.clamp(0.0, 100.0)
}

/// Score every dispatcher in `pool` against the others.
pub fn score_pool(
    pool: &BTreeMap<DispatcherId, DispatcherMetrics>,
    weights: &WeightConfig,
) -> BTreeMap<DispatcherId, ComplianceScore> {
    let peer_max: BTreeMap<ComplianceMetric, f64> = ComplianceMetric::ALL
        .iter()
        .filter_map(|metric| {
            pool.values()
                .filter_map(|m| m.get(*metric))
                .reduce(f64::max)
                .map(|max| (*metric, max))
        })
        .collect();

    pool.iter()
        .map(|(dispatcher, metrics)| {
            (dispatcher.clone(), score_one(metrics, &peer_max, weights))
        })
        .collect()
}

fn score_one(
    metrics: &DispatcherMetrics,
    peer_max: &BTreeMap<ComplianceMetric, f64>,
    weights: &WeightConfig,
) -> ComplianceScore {
    let normalized = |metric: ComplianceMetric| -> Option<f64> {
        let value = metrics.get(metric)?;
        let max = peer_max.get(&metric).copied().unwrap_or(0.0);
        Some(normalize(value, max, metric.direction()))
    };

    // Weight key → normalized score, tenure folded into one component.
    let mut components: BTreeMap<String, f64> = BTreeMap::new();
    for metric in ComplianceMetric::ALL {
        if matches!(metric, ComplianceMetric::TenureOo | ComplianceMetric::TenureLoo) {
            continue;
        }
        if let Some(score) = normalized(metric) {
            components.insert(metric.weight_id().to_string(), score);
        }
    }
    let tenure = mean(
        [ComplianceMetric::TenureOo, ComplianceMetric::TenureLoo]
            .into_iter()
            .filter_map(normalized),
    );
    if let Some(score) = tenure {
        components.insert(ComplianceMetric::TenureOo.weight_id().to_string(), score);
    }

    let (weighted, applied_weight) = components.iter().fold((0.0, 0.0), |(sum, den), (id, score)| {
        let w = weights.get(id);
        (sum + w * score, den + w)
    });

    let composite = if applied_weight > 0.0 {
        (weighted / applied_weight).clamp(0.0, 100.0)
    } else {
        0.0
    };

    ComplianceScore { composite, components, applied_weight }
}
