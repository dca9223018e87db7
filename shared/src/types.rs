//! Common types used across the procurement engine

use rust_decimal::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};

/// Tolerance for floating comparisons of quantities (1e-9)
pub const QUANTITY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 9);

/// Decimal places monetary amounts are rounded to
pub const MONEY_SCALE: u32 = 2;

/// Document families that carry an approval workflow
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocType {
    /// Purchase requisition
    Pr,
    /// Purchase order
    Po,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Pr => "PR",
            DocType::Po => "PO",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PR" => Some(DocType::Pr),
            "PO" => Some(DocType::Po),
            _ => None,
        }
    }

    /// Label used in messages
    pub fn label(&self) -> &'static str {
        match self {
            DocType::Pr => "Purchase requisition",
            DocType::Po => "Purchase order",
        }
    }
}

impl std::fmt::Display for DocType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An approver's decision on the next pending stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
        }
    }
}

/// Round a monetary amount to two places, half away from zero
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// `a <= b` within [`QUANTITY_TOLERANCE`]
pub fn within_tolerance(a: Decimal, b: Decimal) -> bool {
    a.saturating_sub(b) <= QUANTITY_TOLERANCE
}

/// Accepts `true`/`false` as well as the `1`/`0` integers some clients send
pub fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => value,
        Flag::Int(value) => value != 0,
    })
}

pub fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_tolerance_constant() {
        assert_eq!(QUANTITY_TOLERANCE, dec("0.000000001"));
    }

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(dec("2.345")), dec("2.35"));
        assert_eq!(round_money(dec("-2.345")), dec("-2.35"));
        assert_eq!(round_money(dec("2.344")), dec("2.34"));
    }

    #[test]
    fn test_within_tolerance() {
        assert!(within_tolerance(dec("10.0000000005"), dec("10")));
        assert!(!within_tolerance(dec("10.00000001"), dec("10")));
        assert!(within_tolerance(Decimal::MAX, Decimal::MAX));
    }

    #[test]
    fn test_doc_type_parsing() {
        assert_eq!(DocType::from_str("po"), Some(DocType::Po));
        assert_eq!(DocType::from_str(" PR "), Some(DocType::Pr));
        assert_eq!(DocType::from_str("GRN"), None);
    }

    #[test]
    fn test_flag_accepts_integers() {
        #[derive(Deserialize)]
        struct Probe {
            #[serde(deserialize_with = "deserialize_flag")]
            active: bool,
        }

        let probe: Probe = serde_json::from_str(r#"{"active": 0}"#).unwrap();
        assert!(!probe.active);
        let probe: Probe = serde_json::from_str(r#"{"active": true}"#).unwrap();
        assert!(probe.active);
    }
}
