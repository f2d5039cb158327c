use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::debate::{InvestDebateState, RiskDebateState};
use crate::decision::{RiskAssessment, TradeInstruction};

/// The four analyst report categories.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Fundamentals,
    Market,
    News,
    Sentiment,
}

impl ReportKind {
    pub const ALL: [ReportKind; 4] = [
        ReportKind::Fundamentals,
        ReportKind::Market,
        ReportKind::News,
        ReportKind::Sentiment,
    ];

    /// Field name used in serialized state and prompts.
    pub fn field_name(&self) -> &'static str {
        match self {
            ReportKind::Fundamentals => "fundamentals_report",
            ReportKind::Market => "market_report",
            ReportKind::News => "news_report",
            ReportKind::Sentiment => "sentiment_report",
        }
    }

    /// Category label used in memory snapshots.
    pub fn snapshot_label(&self) -> &'static str {
        match self {
            ReportKind::Fundamentals => "fundamental_risk",
            ReportKind::Market => "technical_structure",
            ReportKind::News => "policy_signal",
            ReportKind::Sentiment => "sentiment_stage",
        }
    }

    /// Text substituted when a downstream stage reads a report that was
    /// never produced. Absence is a sentinel, never an error.
    pub fn missing_default(&self) -> &'static str {
        match self {
            ReportKind::Fundamentals => "No fundamentals report available.",
            ReportKind::Market => "No market/technical report available.",
            ReportKind::News => "No news report available.",
            ReportKind::Sentiment => "No sentiment report available.",
        }
    }
}

/// The single shared context for one pipeline run.
///
/// Owned exclusively by the pipeline; stages receive a read view and hand
/// back a [`StateUpdate`] covering only the fields they own. `None` means
/// "not yet produced" and is distinct from an empty string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentState {
    pub run_id: Uuid,
    pub ticker: String,
    /// As-of date for the analysis, `YYYY-MM-DD`.
    pub trade_date: String,
    /// Name of the stage that produced the most recent update.
    pub sender: Option<String>,

    pub fundamentals_report: Option<String>,
    pub market_report: Option<String>,
    pub news_report: Option<String>,
    pub sentiment_report: Option<String>,

    pub investment_debate: Option<InvestDebateState>,
    pub investment_plan: Option<String>,
    pub risk_debate: Option<RiskDebateState>,
    pub risk_assessment: Option<RiskAssessment>,
    pub trade_instruction: Option<TradeInstruction>,
}

impl AgentState {
    /// Fresh state with only identity fields populated.
    pub fn new(ticker: impl Into<String>, trade_date: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            ticker: ticker.into(),
            trade_date: trade_date.into(),
            sender: None,
            fundamentals_report: None,
            market_report: None,
            news_report: None,
            sentiment_report: None,
            investment_debate: None,
            investment_plan: None,
            risk_debate: None,
            risk_assessment: None,
            trade_instruction: None,
        }
    }

    pub fn report(&self, kind: ReportKind) -> Option<&str> {
        match kind {
            ReportKind::Fundamentals => self.fundamentals_report.as_deref(),
            ReportKind::Market => self.market_report.as_deref(),
            ReportKind::News => self.news_report.as_deref(),
            ReportKind::Sentiment => self.sentiment_report.as_deref(),
        }
    }

    /// Report text with the documented default substituted for absence.
    pub fn report_or_default(&self, kind: ReportKind) -> &str {
        self.report(kind).unwrap_or_else(|| kind.missing_default())
    }

    pub fn investment_plan_or_default(&self) -> &str {
        self.investment_plan
            .as_deref()
            .unwrap_or("No investment plan available.")
    }

    /// Merge a partial update, field by field, last writer wins.
    ///
    /// An absent field in the update leaves the current value untouched, so
    /// a stage can never reset a present field back to the sentinel.
    pub fn merge(&mut self, update: StateUpdate) {
        macro_rules! take {
            ($field:ident) => {
                if let Some(value) = update.$field {
                    self.$field = Some(value);
                }
            };
        }
        take!(sender);
        take!(fundamentals_report);
        take!(market_report);
        take!(news_report);
        take!(sentiment_report);
        take!(investment_debate);
        take!(investment_plan);
        take!(risk_debate);
        take!(risk_assessment);
        take!(trade_instruction);
    }
}

/// Partial state returned by a stage. Every field defaults to absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StateUpdate {
    pub sender: Option<String>,
    pub fundamentals_report: Option<String>,
    pub market_report: Option<String>,
    pub news_report: Option<String>,
    pub sentiment_report: Option<String>,
    pub investment_debate: Option<InvestDebateState>,
    pub investment_plan: Option<String>,
    pub risk_debate: Option<RiskDebateState>,
    pub risk_assessment: Option<RiskAssessment>,
    pub trade_instruction: Option<TradeInstruction>,
}

impl StateUpdate {
    pub fn from_report(kind: ReportKind, text: String) -> Self {
        let mut update = StateUpdate::default();
        update.set_report(kind, text);
        update
    }

    pub fn set_report(&mut self, kind: ReportKind, text: String) {
        match kind {
            ReportKind::Fundamentals => self.fundamentals_report = Some(text),
            ReportKind::Market => self.market_report = Some(text),
            ReportKind::News => self.news_report = Some(text),
            ReportKind::Sentiment => self.sentiment_report = Some(text),
        }
    }
}
