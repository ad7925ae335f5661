//! KPI aggregator: team-level roll-up of one filtered view.
//!
//! Medians over nothing are 0 so the dashboard always has a figure to
//! show. Retention is the exception: an empty pool stays `None`.

use crate::{
    aggregate::{Dispatcher, Driver},
    records::{LiveLoad, LoadStatus, PayStub},
    retention::{tally_global, RetentionBreakdown},
    stats::median,
    types::ContractFilter,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The filtered slice of one window that a KPI bundle summarizes.
#[derive(Debug, Clone, Copy)]
pub struct KpiInputs<'a> {
    pub drivers:         &'a [&'a Driver],
    pub dispatchers:     &'a [&'a Dispatcher],
    pub loads:           &'a [&'a LiveLoad],
    /// Filtered stubs of the retention period, for the global fallback.
    pub retention_stubs: &'a [&'a PayStub],
    pub contract_filter: ContractFilter,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiBundle {
    pub total_gross:       f64,
    pub team_rpm:          f64,
    pub team_margin:       f64,
    pub active_trucks:     usize,
    pub median_drop_risk:  f64,
    pub total_liability:   f64,
    pub canceled_loads:    usize,
    pub median_wellness:   f64,
    pub median_compliance: f64,
    pub trailer_drops:     usize,
    pub retention_pct:     Option<f64>,
    pub retention:         RetentionBreakdown,
}

pub fn compute_team_kpis(inputs: &KpiInputs<'_>) -> KpiBundle {
    let drivers = inputs.drivers;
    let total_gross: f64 = drivers.iter().map(|d| d.gross).sum();
    let total_miles: f64 = drivers.iter().map(|d| d.miles).sum();
    let active: BTreeSet<&str> = drivers.iter().map(|d| d.id.as_str()).collect();

    let retention = RetentionBreakdown::combine(inputs.dispatchers.iter().map(|d| &d.retention))
        .restricted_to(inputs.contract_filter);
    let retention_pct = retention
        .percent()
        .or_else(|| tally_global(inputs.retention_stubs.iter().copied()).percent());

    KpiBundle {
        total_gross,
        team_rpm: if total_miles > 0.0 { total_gross / total_miles } else { 0.0 },
        team_margin: drivers.iter().map(|d| d.margin).sum(),
        active_trucks: active.len(),
        median_drop_risk: median(drivers.iter().map(|d| d.drop_risk)).unwrap_or(0.0),
        total_liability: drivers.iter().map(|d| d.liability).sum(),
        canceled_loads: inputs
            .loads
            .iter()
            .filter(|l| l.status == LoadStatus::Canceled)
            .count(),
        median_wellness: median(inputs.dispatchers.iter().filter_map(|d| d.metrics.wellness_pct))
            .unwrap_or(0.0),
        median_compliance: median(inputs.dispatchers.iter().map(|d| d.compliance.composite))
            .unwrap_or(0.0),
        trailer_drops: inputs
            .dispatchers
            .iter()
            .filter_map(|d| d.metrics.trailer_drops)
            .sum::<f64>() as usize,
        retention_pct,
        retention,
    }
}
