use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation failure for a structured decision parsed from engine output.
///
/// Unlike a missing report or a failed debate turn, this is surfaced to the
/// caller: a malformed trade instruction must never be silently executed.
#[derive(Error, Debug)]
pub enum DecisionError {
    #[error("decision JSON does not match schema: {0}")]
    Schema(String),

    #[error("invalid {field}: {detail}")]
    Invalid {
        field: &'static str,
        detail: String,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Approval {
    Yes,
    No,
}

/// Structured, executable instruction produced by the trader stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeInstruction {
    pub action: TradeAction,
    pub ticker: String,
    /// Fraction of portfolio to commit, 0.0 to 1.0.
    pub position_size: Decimal,
    pub order_type: OrderType,
    pub rationale: String,
}

impl TradeInstruction {
    /// A do-nothing instruction, used when the risk manager vetoes the plan.
    pub fn hold(ticker: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            action: TradeAction::Hold,
            ticker: ticker.into(),
            position_size: Decimal::ZERO,
            order_type: OrderType::Market,
            rationale: rationale.into(),
        }
    }

    /// Parse and validate an instruction from an engine JSON value.
    pub fn from_engine_json(value: &serde_json::Value) -> Result<Self, DecisionError> {
        let instruction: TradeInstruction = serde_json::from_value(value.clone())
            .map_err(|e| DecisionError::Schema(e.to_string()))?;
        instruction.validate()?;
        Ok(instruction)
    }

    pub fn validate(&self) -> Result<(), DecisionError> {
        if self.ticker.trim().is_empty() {
            return Err(DecisionError::Invalid {
                field: "ticker",
                detail: "must not be empty".into(),
            });
        }
        if self.position_size < Decimal::ZERO || self.position_size > Decimal::ONE {
            return Err(DecisionError::Invalid {
                field: "position_size",
                detail: format!("{} is outside [0, 1]", self.position_size),
            });
        }
        Ok(())
    }
}

/// Structured verdict produced by the risk manager stage. A `No` approval
/// gates the final instruction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskAssessment {
    pub approval: Approval,
    /// Composite risk score, 1 (lowest) to 10 (highest).
    pub risk_score: u8,
    /// Concrete adjustment suggestions, e.g. "cut position from 20% to 10%".
    pub adjustments: String,
    pub rationale: String,
}

impl RiskAssessment {
    pub fn from_engine_json(value: &serde_json::Value) -> Result<Self, DecisionError> {
        let assessment: RiskAssessment = serde_json::from_value(value.clone())
            .map_err(|e| DecisionError::Schema(e.to_string()))?;
        assessment.validate()?;
        Ok(assessment)
    }

    pub fn validate(&self) -> Result<(), DecisionError> {
        if !(1..=10).contains(&self.risk_score) {
            return Err(DecisionError::Invalid {
                field: "risk_score",
                detail: format!("{} is outside [1, 10]", self.risk_score),
            });
        }
        Ok(())
    }

    pub fn approved(&self) -> bool {
        self.approval == Approval::Yes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_instruction() -> TradeInstruction {
        TradeInstruction {
            action: TradeAction::Buy,
            ticker: "600519.SH".into(),
            position_size: dec!(0.15),
            order_type: OrderType::Limit,
            rationale: "Policy tailwind with technical confirmation.".into(),
        }
    }

    #[test]
    fn instruction_roundtrip_is_field_exact() {
        let instruction = sample_instruction();
        let json = serde_json::to_string(&instruction).unwrap();
        let parsed: TradeInstruction = serde_json::from_str(&json).unwrap();
        assert_eq!(instruction, parsed);
    }

    #[test]
    fn action_serializes_to_closed_uppercase_set() {
        assert_eq!(serde_json::to_string(&TradeAction::Buy).unwrap(), "\"BUY\"");
        assert_eq!(serde_json::to_string(&OrderType::Limit).unwrap(), "\"LIMIT\"");
        assert_eq!(serde_json::to_string(&Approval::No).unwrap(), "\"NO\"");
    }

    #[test]
    fn unknown_action_is_rejected() {
        let value = serde_json::json!({
            "action": "SHORT",
            "ticker": "600519.SH",
            "position_size": "0.1",
            "order_type": "MARKET",
            "rationale": "x"
        });
        assert!(matches!(
            TradeInstruction::from_engine_json(&value),
            Err(DecisionError::Schema(_))
        ));
    }

    #[test]
    fn position_size_outside_unit_interval_is_rejected() {
        let mut instruction = sample_instruction();
        instruction.position_size = dec!(1.2);
        assert!(matches!(
            instruction.validate(),
            Err(DecisionError::Invalid { field: "position_size", .. })
        ));

        instruction.position_size = dec!(-0.01);
        assert!(instruction.validate().is_err());

        instruction.position_size = Decimal::ONE;
        assert!(instruction.validate().is_ok());
    }

    #[test]
    fn from_engine_json_accepts_valid_instruction() {
        let value = serde_json::json!({
            "action": "BUY",
            "ticker": "600519.SH",
            "position_size": "0.15",
            "order_type": "LIMIT",
            "rationale": "ok"
        });
        let instruction = TradeInstruction::from_engine_json(&value).unwrap();
        assert_eq!(instruction.action, TradeAction::Buy);
        assert_eq!(instruction.position_size, dec!(0.15));
    }

    #[test]
    fn risk_score_bounds() {
        let mut assessment = RiskAssessment {
            approval: Approval::Yes,
            risk_score: 5,
            adjustments: "none".into(),
            rationale: "manageable".into(),
        };
        assert!(assessment.validate().is_ok());

        assessment.risk_score = 0;
        assert!(assessment.validate().is_err());
        assessment.risk_score = 11;
        assert!(assessment.validate().is_err());
    }

    #[test]
    fn hold_instruction_is_valid() {
        let hold = TradeInstruction::hold("600519.SH", "vetoed");
        assert!(hold.validate().is_ok());
        assert_eq!(hold.action, TradeAction::Hold);
        assert_eq!(hold.position_size, Decimal::ZERO);
    }
}
