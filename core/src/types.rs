//! Shared primitive types used across the scoring core.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Stable driver identifier as it appears on stubs and loads.
pub type DriverId = String;

/// Dispatcher name as it appears on stubs and loads.
pub type DispatcherId = String;

/// Contract a driver runs under. Every threshold can be overridden per
/// contract type, so anything that is not exactly "OO" is treated as LOO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ContractType {
    #[serde(rename = "OO")]
    OwnerOperator,
    #[serde(rename = "LOO")]
    LeaseOwnerOperator,
}

impl Default for ContractType {
    fn default() -> Self {
        Self::LeaseOwnerOperator
    }
}

impl ContractType {
    pub fn normalize(raw: &str) -> Self {
        if raw == "OO" {
            Self::OwnerOperator
        } else {
            Self::LeaseOwnerOperator
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OwnerOperator      => "OO",
            Self::LeaseOwnerOperator => "LOO",
        }
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ContractType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::normalize(&raw))
    }
}

/// Retention status carried on a stub or a contract status record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RetentionStatus {
    Active,
    Terminated,
    Start,
    Other(String),
}

impl RetentionStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active"                   => Self::Active,
            "terminated" | "term"      => Self::Terminated,
            "start" | "new start"      => Self::Start,
            _                          => Self::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Active     => "Active",
            Self::Terminated => "Terminated",
            Self::Start      => "Start",
            Self::Other(raw) => raw,
        }
    }

    /// Statuses that put a driver into a dispatcher's retention pool.
    pub fn is_poolable(&self) -> bool {
        matches!(self, Self::Active | Self::Terminated | Self::Start)
    }
}

impl Default for RetentionStatus {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl Serialize for RetentionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RetentionStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Dashboard contract filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractFilter {
    #[default]
    All,
    OwnerOperator,
    LeaseOwnerOperator,
}

impl ContractFilter {
    pub fn admits(&self, contract: ContractType) -> bool {
        match self {
            Self::All                => true,
            Self::OwnerOperator      => contract == ContractType::OwnerOperator,
            Self::LeaseOwnerOperator => contract == ContractType::LeaseOwnerOperator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_normalization_defaults_to_loo() {
        assert_eq!(ContractType::normalize("OO"), ContractType::OwnerOperator);
        assert_eq!(ContractType::normalize(" oo "), ContractType::LeaseOwnerOperator);
        assert_eq!(ContractType::normalize("oo"), ContractType::LeaseOwnerOperator);
        assert_eq!(ContractType::normalize("LOO"), ContractType::LeaseOwnerOperator);
        assert_eq!(ContractType::normalize("company"), ContractType::LeaseOwnerOperator);
        assert_eq!(ContractType::normalize(""), ContractType::LeaseOwnerOperator);
    }

    #[test]
    fn status_parsing_keeps_unknown_values() {
        assert_eq!(RetentionStatus::parse("Active"), RetentionStatus::Active);
        assert_eq!(RetentionStatus::parse("TERMINATED"), RetentionStatus::Terminated);
        assert_eq!(RetentionStatus::parse("Start"), RetentionStatus::Start);
        assert_eq!(
            RetentionStatus::parse("On Leave"),
            RetentionStatus::Other("On Leave".into())
        );
        assert!(!RetentionStatus::parse("On Leave").is_poolable());
    }
}
