//! Fleet snapshot: every raw record one recomputation pass reads.
//!
//! The dashboard refreshes its sources wholesale; the engine treats a
//! snapshot as immutable and swaps it out in one piece.

use crate::{
    error::ScoreResult,
    event::DispatcherEvent,
    records::{ContractStatusRecord, LiveLoad, PayStub, RosterEntry},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetSnapshot {
    pub stubs:             Vec<PayStub>,
    pub loads:             Vec<LiveLoad>,
    pub contract_statuses: Vec<ContractStatusRecord>,
    pub roster:            Vec<RosterEntry>,
    pub events:            Vec<DispatcherEvent>,
}

impl FleetSnapshot {
    pub fn from_json(json: &str) -> ScoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> ScoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Read a snapshot file written by the export job or by `to_json`.
    pub fn load(path: &str) -> ScoreResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let snapshot = Self::from_json(&json)?;
        log::debug!(
            "loaded snapshot {path}: {} stubs, {} loads, {} roster rows, {} events",
            snapshot.stubs.len(),
            snapshot.loads.len(),
            snapshot.roster.len(),
            snapshot.events.len(),
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_default_to_empty() {
        let snapshot = FleetSnapshot::from_json(r#"{"stubs": []}"#).expect("parse");
        assert!(snapshot.loads.is_empty());
        assert!(snapshot.roster.is_empty());
    }

    #[test]
    fn lenient_numbers_parse_from_strings() {
        let json = r#"{
            "stubs": [{
                "driver": "D1",
                "pay_date": "2026-10-15",
                "dispatcher": "Ann",
                "contract_type": "OO",
                "gross": "$4,250.50",
                "total_miles": "2,100",
                "net_pay": "n/a",
                "status": "Active"
            }]
        }"#;
        let snapshot = FleetSnapshot::from_json(json).expect("parse");
        let stub = &snapshot.stubs[0];
        assert!((stub.gross - 4250.5).abs() < 1e-9);
        assert!((stub.total_miles - 2100.0).abs() < 1e-9);
        assert_eq!(stub.net_pay, 0.0, "unparseable amounts fall back to 0");
    }
}
