//! Per-contract threshold resolution.

use crate::types::ContractType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A metric threshold with optional per-contract overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub default: f64,
    #[serde(default)]
    pub by_contract: BTreeMap<String, f64>,
    /// Number of pay periods to look back; `None` means all time.
    #[serde(default)]
    pub lookback_weeks: Option<u32>,
    /// Records required before the metric is evaluated at all.
    #[serde(default)]
    pub min_sample: Option<usize>,
}

impl ThresholdConfig {
    pub fn flat(default: f64) -> Self {
        Self {
            default,
            by_contract: BTreeMap::new(),
            lookback_weeks: None,
            min_sample: None,
        }
    }

    pub fn with_override(mut self, contract: ContractType, value: f64) -> Self {
        self.by_contract.insert(contract.as_str().to_string(), value);
        self
    }

    pub fn with_lookback(mut self, weeks: u32) -> Self {
        self.lookback_weeks = Some(weeks);
        self
    }

    pub fn with_min_sample(mut self, min: usize) -> Self {
        self.min_sample = Some(min);
        self
    }

    /// Contract type is normalized first, so any value other than "OO"
    /// resolves as "LOO". Missing overrides fall back to `default`.
    pub fn resolve(&self, contract: &str) -> f64 {
        self.resolve_for(ContractType::normalize(contract))
    }

    pub fn resolve_for(&self, contract: ContractType) -> f64 {
        self.by_contract
            .get(contract.as_str())
            .copied()
            .unwrap_or(self.default)
    }

    pub fn min_sample_or(&self, fallback: usize) -> usize {
        self.min_sample.unwrap_or(fallback)
    }
}
