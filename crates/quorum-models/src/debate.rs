use serde::{Deserialize, Serialize};

/// Accumulated state of the two-sided bull/bear investment debate.
///
/// `combined_history` is the ordered concatenation of every argument from
/// either side. `round_count` counts individual arguments, not bull+bear
/// cycles.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InvestDebateState {
    pub bull_transcript: String,
    pub bear_transcript: String,
    pub combined_history: String,
    /// Most recent argument from either side, the rebuttal target for the
    /// next speaker.
    pub last_argument: String,
    pub round_count: u32,
}

/// The three risk-debate participants, in rotation order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskSpeaker {
    Aggressive,
    Conservative,
    Neutral,
}

impl RiskSpeaker {
    pub const ROTATION: [RiskSpeaker; 3] = [
        RiskSpeaker::Aggressive,
        RiskSpeaker::Conservative,
        RiskSpeaker::Neutral,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RiskSpeaker::Aggressive => "aggressive",
            RiskSpeaker::Conservative => "conservative",
            RiskSpeaker::Neutral => "neutral",
        }
    }
}

/// Accumulated state of the three-sided risk debate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RiskDebateState {
    pub aggressive_transcript: String,
    pub conservative_transcript: String,
    pub neutral_transcript: String,
    pub combined_history: String,
    pub latest_speaker: Option<RiskSpeaker>,
    /// Per-participant cache of the most recent argument, fed to the other
    /// two speakers as their rebuttal targets.
    pub current_aggressive_response: String,
    pub current_conservative_response: String,
    pub current_neutral_response: String,
    pub round_count: u32,
}

impl RiskDebateState {
    pub fn current_response(&self, speaker: RiskSpeaker) -> &str {
        match speaker {
            RiskSpeaker::Aggressive => &self.current_aggressive_response,
            RiskSpeaker::Conservative => &self.current_conservative_response,
            RiskSpeaker::Neutral => &self.current_neutral_response,
        }
    }
}
