use crate::{clock::PayrollCalendar, threshold::ThresholdConfig, types::ContractType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Weights ────────────────────────────────────────────────────────

/// Metric id → weight. Weights need not sum to 100; every composite
/// normalizes by the weights that actually apply.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightConfig(pub BTreeMap<String, f64>);

impl WeightConfig {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        Self(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    /// Negative weights are treated as zero.
    pub fn get(&self, metric_id: &str) -> f64 {
        self.0.get(metric_id).copied().unwrap_or(0.0).max(0.0)
    }

    pub fn total(&self) -> f64 {
        self.0.values().map(|w| w.max(0.0)).sum()
    }

    pub fn set(&mut self, metric_id: &str, weight: f64) {
        self.0.insert(metric_id.to_string(), weight);
    }
}

// ── Driver flag rules ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighTollsRule {
    pub enabled: bool,
    #[serde(default)]
    pub lookback_weeks: Option<u32>,
    pub min_stubs: usize,
    /// Drivers whose average toll sits in this top share of their peers are flagged.
    pub top_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeavyLoadsRule {
    pub enabled: bool,
    /// Average load weight (lbs) above which the driver is flagged.
    pub max_avg_weight: ThresholdConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatcherHopperRule {
    pub enabled: bool,
    pub max_dispatchers: ThresholdConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenureRule {
    pub enabled: bool,
    /// Worked stubs below this count mark a new hire.
    pub new_hire_below: ThresholdConfig,
    /// Worked stubs at or above this count mark a veteran.
    pub veteran_at: ThresholdConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegativeBalanceRule {
    pub enabled: bool,
    pub max_exposure: ThresholdConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowPerformanceRule {
    pub enabled: bool,
    /// Stubs below this value count as low weeks.
    pub floor: ThresholdConfig,
    /// Share of low weeks (0–100) at which the driver is flagged.
    pub min_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagRulesConfig {
    pub high_tolls:        HighTollsRule,
    pub heavy_loads:       HeavyLoadsRule,
    pub dispatcher_hopper: DispatcherHopperRule,
    pub tenure:            TenureRule,
    pub negative_balance:  NegativeBalanceRule,
    pub low_rpm:           LowPerformanceRule,
    pub low_gross:         LowPerformanceRule,
    pub low_net:           LowPerformanceRule,
}

// ── Other sections ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PayrollConfig {
    /// Companies whose stubs settle one week late (end + 10 days).
    #[serde(default)]
    pub one_week_delay_companies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Pay periods, starting at the pool period, searched for a driver's
    /// last known owner.
    pub pool_weeks: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceConfig {
    /// Load RPM below this counts toward the dispatcher's low-RPM metric.
    pub low_rpm: ThresholdConfig,
}

// ── Engine config ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub payroll:            PayrollConfig,
    pub flags:              FlagRulesConfig,
    pub risk_weights:       WeightConfig,
    pub compliance_weights: WeightConfig,
    pub compliance:         ComplianceConfig,
    pub retention:          RetentionConfig,
}

impl EngineConfig {
    /// Load from `{data_dir}/engine_config.json`. Sections missing from
    /// the file keep their defaults.
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/engine_config.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: EngineConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        log::debug!(
            "loaded engine config from {path} ({} risk weights, {} compliance weights)",
            config.risk_weights.0.len(),
            config.compliance_weights.0.len(),
        );
        Ok(config)
    }

    pub fn calendar(&self) -> PayrollCalendar {
        PayrollCalendar::new(self.payroll.one_week_delay_companies.iter().cloned())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        use ContractType::OwnerOperator as OO;

        Self {
            payroll: PayrollConfig::default(),
            flags: FlagRulesConfig {
                high_tolls: HighTollsRule {
                    enabled: true,
                    lookback_weeks: Some(8),
                    min_stubs: 4,
                    top_percent: 10.0,
                },
                heavy_loads: HeavyLoadsRule {
                    enabled: true,
                    max_avg_weight: ThresholdConfig::flat(42_000.0)
                        .with_override(OO, 44_000.0)
                        .with_lookback(4)
                        .with_min_sample(3),
                },
                dispatcher_hopper: DispatcherHopperRule {
                    enabled: true,
                    max_dispatchers: ThresholdConfig::flat(3.0)
                        .with_override(OO, 4.0)
                        .with_lookback(12),
                },
                tenure: TenureRule {
                    enabled: true,
                    new_hire_below: ThresholdConfig::flat(8.0).with_override(OO, 6.0),
                    veteran_at: ThresholdConfig::flat(52.0),
                },
                negative_balance: NegativeBalanceRule {
                    enabled: true,
                    max_exposure: ThresholdConfig::flat(2_500.0)
                        .with_override(OO, 5_000.0)
                        .with_min_sample(1),
                },
                low_rpm: LowPerformanceRule {
                    enabled: true,
                    floor: ThresholdConfig::flat(1.80)
                        .with_override(OO, 2.00)
                        .with_lookback(8)
                        .with_min_sample(4),
                    min_pct: 50.0,
                },
                low_gross: LowPerformanceRule {
                    enabled: true,
                    floor: ThresholdConfig::flat(4_000.0)
                        .with_override(OO, 6_000.0)
                        .with_lookback(8)
                        .with_min_sample(4),
                    min_pct: 50.0,
                },
                low_net: LowPerformanceRule {
                    enabled: true,
                    floor: ThresholdConfig::flat(900.0)
                        .with_override(OO, 1_500.0)
                        .with_lookback(8)
                        .with_min_sample(4),
                    min_pct: 50.0,
                },
            },
            risk_weights: WeightConfig::from_pairs([
                ("highTolls", 10.0),
                ("heavyLoads", 10.0),
                ("dispatcherHopper", 20.0),
                ("tenure", 15.0),
                ("negativeBalance", 15.0),
                ("lowRpm", 10.0),
                ("lowGross", 10.0),
                ("lowNet", 10.0),
            ]),
            compliance_weights: WeightConfig::from_pairs([
                ("moves", 10.0),
                ("hiddenMiles", 10.0),
                ("lowRpm", 5.0),
                ("overdue", 10.0),
                ("tuesdayOpen", 5.0),
                ("wellness", 15.0),
                ("retention", 15.0),
                ("tenure", 10.0),
                ("trailerDrops", 5.0),
                ("trailerRecoveries", 5.0),
                ("paperwork", 5.0),
                ("calculator", 2.5),
                ("rcEntry", 2.5),
            ]),
            compliance: ComplianceConfig {
                low_rpm: ThresholdConfig::flat(1.80).with_override(OO, 2.00),
            },
            retention: RetentionConfig { pool_weeks: 4 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg: EngineConfig = serde_json::from_str(
            r#"{ "risk_weights": { "highTolls": 50, "tenure": 50 } }"#,
        )
        .expect("partial config parses");
        assert_eq!(cfg.risk_weights.total(), 100.0);
        assert_eq!(cfg.retention.pool_weeks, 4);
        assert!(cfg.flags.high_tolls.enabled);
    }

    #[test]
    fn negative_weights_count_as_zero() {
        let w = WeightConfig::from_pairs([("a", 10.0), ("b", -5.0)]);
        assert_eq!(w.get("b"), 0.0);
        assert_eq!(w.get("missing"), 0.0);
        assert_eq!(w.total(), 10.0);
    }
}
