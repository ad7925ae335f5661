//! Drop-risk scorer: one weighted 0–100 churn estimate per driver.

use crate::{config::WeightConfig, flags::DriverFlag};

/// `100 × max(0, Σ signed flag weights) / Σ configured weights`, clamped
/// to [0, 100]. Positive flags subtract their rule's weight. With no
/// configured weight the score is 0.
pub fn drop_risk_score(flags: &[DriverFlag], weights: &WeightConfig) -> f64 {
    let total = weights.total();
    if total <= 0.0 {
        return 0.0;
    }

    let signed: f64 = flags
        .iter()
        .map(|flag| {
            let w = weights.get(flag.kind.rule_id());
            if flag.kind.is_positive() { -w } else { w }
        })
        .sum();

    (100.0 * signed.max(0.0) / total).clamp(0.0, 100.0)
}
