//! Raw input records: settled pay stubs, live loads and roster feeds.
//!
//! RULE: Records are read-only. Anything derived from them (enrichment,
//! ownership maps) is built into new values, never written back.

use crate::types::{ContractType, DispatcherId, DriverId, RetentionStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

// ── Pay stubs ────────────────────────────────────────────────────────────────

/// One driver's settled weekly pay statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayStub {
    pub driver:        DriverId,
    pub pay_date:      NaiveDate,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub dispatcher:    Option<DispatcherId>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub team:          Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub company:       Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub franchise:     Option<String>,
    #[serde(default)]
    pub contract_type: ContractType,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_miles:   f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub gross:         f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub margin:        f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub net_pay:       f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub balance:       f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub balance_settle: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub po_deductions: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub po_settle:     f64,
    #[serde(default)]
    pub status:        RetentionStatus,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub toll_estimate: f64,
}

impl PayStub {
    pub fn new(driver: impl Into<DriverId>, pay_date: NaiveDate, dispatcher: impl Into<DispatcherId>) -> Self {
        Self {
            driver:         driver.into(),
            pay_date,
            dispatcher:     Some(dispatcher.into()),
            team:           None,
            company:        None,
            franchise:      None,
            contract_type:  ContractType::default(),
            total_miles:    0.0,
            gross:          0.0,
            margin:         0.0,
            net_pay:        0.0,
            balance:        0.0,
            balance_settle: 0.0,
            po_deductions:  0.0,
            po_settle:      0.0,
            status:         RetentionStatus::Active,
            toll_estimate:  0.0,
        }
    }

    pub fn with_status(mut self, status: RetentionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_contract(mut self, contract: ContractType) -> Self {
        self.contract_type = contract;
        self
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    pub fn with_franchise(mut self, franchise: impl Into<String>) -> Self {
        self.franchise = Some(franchise.into());
        self
    }

    /// Miles, gross and net pay for the week.
    pub fn with_pay(mut self, miles: f64, gross: f64, net_pay: f64) -> Self {
        self.total_miles = miles;
        self.gross = gross;
        self.net_pay = net_pay;
        self
    }

    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_balance(mut self, balance: f64, settle: f64) -> Self {
        self.balance = balance;
        self.balance_settle = settle;
        self
    }

    pub fn with_po(mut self, deductions: f64, settle: f64) -> Self {
        self.po_deductions = deductions;
        self.po_settle = settle;
        self
    }

    pub fn with_tolls(mut self, toll_estimate: f64) -> Self {
        self.toll_estimate = toll_estimate;
        self
    }

    pub fn without_dispatcher(mut self) -> Self {
        self.dispatcher = None;
        self
    }

    pub fn is_worked(&self) -> bool {
        self.total_miles > 0.0
    }

    /// Gross per mile; `None` when no miles were run.
    pub fn rpm(&self) -> Option<f64> {
        self.is_worked().then(|| self.gross / self.total_miles)
    }

    /// Outstanding balance plus unsettled purchase orders.
    pub fn liability(&self) -> f64 {
        (self.balance + self.balance_settle).abs() + (self.po_deductions - self.po_settle)
    }

    pub fn is_dispatched_by(&self, dispatcher: &str) -> bool {
        self.dispatcher.as_deref() == Some(dispatcher)
    }
}

// ── Live loads ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LoadStatus {
    Booked,
    InTransit,
    Delivered,
    Canceled,
    Tonu,
    Layover,
    Other(String),
}

impl LoadStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "booked" | "dispatched"    => Self::Booked,
            "in transit" | "in_transit" => Self::InTransit,
            "delivered" | "completed"  => Self::Delivered,
            "canceled" | "cancelled"   => Self::Canceled,
            "tonu"                     => Self::Tonu,
            "layover"                  => Self::Layover,
            _                          => Self::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Booked     => "Booked",
            Self::InTransit  => "In Transit",
            Self::Delivered  => "Delivered",
            Self::Canceled   => "Canceled",
            Self::Tonu       => "TONU",
            Self::Layover    => "Layover",
            Self::Other(raw) => raw,
        }
    }

    /// Canceled, TONU and layover entries never carried freight.
    pub fn carried_freight(&self) -> bool {
        !matches!(self, Self::Canceled | Self::Tonu | Self::Layover)
    }
}

impl Serialize for LoadStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LoadStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WellnessOutcome {
    Pass,
    Fail,
}

/// One in-progress shipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveLoad {
    pub driver:         DriverId,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub dispatcher:     Option<DispatcherId>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub team:           Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub company:        Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub franchise:      Option<String>,
    #[serde(default)]
    pub contract_type:  ContractType,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price:          f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub cut:            f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub trip_miles:     f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub deadhead_miles: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub weight_lbs:     f64,
    pub status:         LoadStatus,
    pub pickup_date:    NaiveDate,
    #[serde(default)]
    pub delivery_date:  Option<NaiveDate>,
    #[serde(default)]
    pub wellness:       Option<WellnessOutcome>,
    #[serde(default)]
    pub moved_load:     bool,
    #[serde(default)]
    pub hidden_miles:   bool,
    #[serde(default)]
    pub new_start:      bool,
}

impl LiveLoad {
    pub fn new(driver: impl Into<DriverId>, dispatcher: impl Into<DispatcherId>, pickup_date: NaiveDate) -> Self {
        Self {
            driver:         driver.into(),
            dispatcher:     Some(dispatcher.into()),
            team:           None,
            company:        None,
            franchise:      None,
            contract_type:  ContractType::default(),
            price:          0.0,
            cut:            0.0,
            trip_miles:     0.0,
            deadhead_miles: 0.0,
            weight_lbs:     0.0,
            status:         LoadStatus::Booked,
            pickup_date,
            delivery_date:  None,
            wellness:       None,
            moved_load:     false,
            hidden_miles:   false,
            new_start:      false,
        }
    }

    pub fn with_status(mut self, status: LoadStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_contract(mut self, contract: ContractType) -> Self {
        self.contract_type = contract;
        self
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    /// Price, trip miles and deadhead miles.
    pub fn with_trip(mut self, price: f64, trip_miles: f64, deadhead_miles: f64) -> Self {
        self.price = price;
        self.trip_miles = trip_miles;
        self.deadhead_miles = deadhead_miles;
        self
    }

    pub fn with_cut(mut self, cut: f64) -> Self {
        self.cut = cut;
        self
    }

    pub fn with_weight(mut self, weight_lbs: f64) -> Self {
        self.weight_lbs = weight_lbs;
        self
    }

    pub fn with_wellness(mut self, outcome: WellnessOutcome) -> Self {
        self.wellness = Some(outcome);
        self
    }

    pub fn moved(mut self) -> Self {
        self.moved_load = true;
        self
    }

    pub fn with_hidden_miles(mut self) -> Self {
        self.hidden_miles = true;
        self
    }

    pub fn total_miles(&self) -> f64 {
        self.trip_miles + self.deadhead_miles
    }

    /// Price per loaded-plus-empty mile; `None` without miles.
    pub fn rpm(&self) -> Option<f64> {
        let miles = self.total_miles();
        (miles > 0.0).then(|| self.price / miles)
    }

    pub fn is_dispatched_by(&self, dispatcher: &str) -> bool {
        self.dispatcher.as_deref() == Some(dispatcher)
    }
}

// ── Current-state feeds ──────────────────────────────────────────────────────

/// A driver's current contract status, as maintained by the carrier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractStatusRecord {
    pub driver: DriverId,
    pub status: RetentionStatus,
    #[serde(default)]
    pub as_of:  Option<NaiveDate>,
}

/// A row of the live roster: who a driver belongs to right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub driver:        DriverId,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub dispatcher:    Option<DispatcherId>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub team:          Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub company:       Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub franchise:     Option<String>,
    #[serde(default)]
    pub contract_type: ContractType,
}

// ── Record adapter ───────────────────────────────────────────────────────────

/// Either kind of activity record, for components that only need the
/// shared identity fields.
#[derive(Debug, Clone, Copy)]
pub enum Activity<'a> {
    Stub(&'a PayStub),
    Load(&'a LiveLoad),
}

impl<'a> Activity<'a> {
    pub fn driver(&self) -> &'a str {
        match self {
            Self::Stub(s) => &s.driver,
            Self::Load(l) => &l.driver,
        }
    }

    pub fn dispatcher(&self) -> Option<&'a str> {
        match self {
            Self::Stub(s) => s.dispatcher.as_deref(),
            Self::Load(l) => l.dispatcher.as_deref(),
        }
    }

    pub fn team(&self) -> Option<&'a str> {
        match self {
            Self::Stub(s) => s.team.as_deref(),
            Self::Load(l) => l.team.as_deref(),
        }
    }

    pub fn company(&self) -> Option<&'a str> {
        match self {
            Self::Stub(s) => s.company.as_deref(),
            Self::Load(l) => l.company.as_deref(),
        }
    }

    pub fn franchise(&self) -> Option<&'a str> {
        match self {
            Self::Stub(s) => s.franchise.as_deref(),
            Self::Load(l) => l.franchise.as_deref(),
        }
    }

    pub fn contract_type(&self) -> ContractType {
        match self {
            Self::Stub(s) => s.contract_type,
            Self::Load(l) => l.contract_type,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            Self::Stub(s) => s.pay_date,
            Self::Load(l) => l.pickup_date,
        }
    }
}

// ── Lenient field parsing ────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Number(f64),
    Text(String),
}

/// Parse a money-like string: thousands separators, `$`, whitespace and
/// accounting parentheses are accepted.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | ' ' | '\t'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    let parsed = match cleaned.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => inner.parse::<f64>().ok().map(|v| -v),
        None        => cleaned.parse::<f64>().ok(),
    };
    parsed.filter(|v| v.is_finite())
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let raw: Option<RawNumber> = Option::deserialize(deserializer)?;
    Ok(match raw {
        Some(RawNumber::Number(v)) => v,
        Some(RawNumber::Text(text)) => parse_amount(&text).unwrap_or_else(|| {
            if !text.trim().is_empty() {
                log::warn!("unparseable numeric field {text:?}, using 0");
            }
            0.0
        }),
        None => 0.0,
    })
}

fn blank_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_accept_separators_and_parentheses() {
        assert_eq!(parse_amount("1,234.50"), Some(1234.5));
        assert_eq!(parse_amount(" $2,000 "), Some(2000.0));
        assert_eq!(parse_amount("(75.25)"), Some(-75.25));
        assert_eq!(parse_amount("n/a"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn malformed_numbers_fall_back_to_zero() {
        let stub: PayStub = serde_json::from_str(
            r#"{
                "driver": "d-1",
                "pay_date": "2026-10-08",
                "dispatcher": "  ",
                "contract_type": "oo",
                "gross": "3,100.75",
                "net_pay": "pending",
                "total_miles": 2400,
                "status": "Active"
            }"#,
        )
        .expect("stub parses");

        assert_eq!(stub.gross, 3100.75);
        assert_eq!(stub.net_pay, 0.0);
        assert_eq!(stub.total_miles, 2400.0);
        assert_eq!(stub.dispatcher, None, "blank dispatcher must read as missing");
        assert_eq!(stub.contract_type, ContractType::OwnerOperator);
    }

    #[test]
    fn load_status_excludes_non_freight_entries() {
        assert!(!LoadStatus::parse("Cancelled").carried_freight());
        assert!(!LoadStatus::parse("TONU").carried_freight());
        assert!(!LoadStatus::parse("layover").carried_freight());
        assert!(LoadStatus::parse("Delivered").carried_freight());
    }
}
