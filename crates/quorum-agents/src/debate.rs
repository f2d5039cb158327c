use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use quorum_models::{AgentState, InvestDebateState, RiskDebateState, RiskSpeaker};

use crate::error::AgentError;

/// One participant's reply for a single turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReply {
    pub argument: String,
    /// A terminal reply ends the debate before the round limit.
    pub terminal: bool,
}

impl TurnReply {
    pub fn of(argument: impl Into<String>) -> Self {
        Self { argument: argument.into(), terminal: false }
    }
}

/// A debate participant. `name` doubles as the transcript label and the
/// sentinel prefix when a turn fails.
#[async_trait]
pub trait Debater: Send + Sync {
    fn name(&self) -> &str;

    async fn argue(&self, state: &AgentState, log: &DebateLog) -> Result<TurnReply, AgentError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebatePhase {
    Idle,
    InProgress,
    Terminated,
}

/// One committed turn.
#[derive(Debug, Clone, PartialEq)]
pub struct DebateTurn {
    /// Index into the participant roster.
    pub speaker: usize,
    pub speaker_name: String,
    pub argument: String,
}

/// Ordered record of a debate, shared read-only with every participant.
///
/// The turn list and the per-participant current responses are committed
/// together, so a reader never observes a turn without its response cache
/// entry.
#[derive(Debug, Clone, PartialEq)]
pub struct DebateLog {
    participant_names: Vec<String>,
    turns: Vec<DebateTurn>,
    current_responses: Vec<Option<String>>,
    phase: DebatePhase,
}

impl DebateLog {
    pub fn new(participant_names: Vec<String>) -> Self {
        let count = participant_names.len();
        Self {
            participant_names,
            turns: Vec::new(),
            current_responses: vec![None; count],
            phase: DebatePhase::Idle,
        }
    }

    pub fn turn_count(&self) -> u32 {
        self.turns.len() as u32
    }

    pub fn phase(&self) -> DebatePhase {
        self.phase
    }

    pub fn turns(&self) -> &[DebateTurn] {
        &self.turns
    }

    /// Every argument so far, in speaking order.
    pub fn combined_history(&self) -> String {
        self.turns
            .iter()
            .map(|t| t.argument.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// All arguments by one participant, in speaking order.
    pub fn transcript_of(&self, speaker: usize) -> String {
        self.turns
            .iter()
            .filter(|t| t.speaker == speaker)
            .map(|t| t.argument.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Most recent argument by one participant, if any.
    pub fn current_response_of(&self, speaker: usize) -> Option<&str> {
        self.current_responses
            .get(speaker)
            .and_then(|r| r.as_deref())
    }

    /// Most recent argument from anyone, the rebuttal target for the next
    /// speaker.
    pub fn last_argument(&self) -> Option<&str> {
        self.turns.last().map(|t| t.argument.as_str())
    }

    pub fn last_speaker(&self) -> Option<usize> {
        self.turns.last().map(|t| t.speaker)
    }

    fn commit_turn(&mut self, speaker: usize, argument: String) {
        self.current_responses[speaker] = Some(argument.clone());
        self.turns.push(DebateTurn {
            speaker,
            speaker_name: self.participant_names[speaker].clone(),
            argument,
        });
    }
}

/// Drives a bounded round-robin debate.
///
/// Speakers rotate strictly by `turn_count % participants`, for exactly
/// `rounds * participants` turns. A failed or timed-out turn is replaced by
/// a sentinel argument and the rotation continues; a terminal reply ends the
/// debate early.
pub struct DebateController {
    rounds: u32,
    turn_timeout: Duration,
}

impl DebateController {
    pub fn new(rounds: u32, turn_timeout: Duration) -> Self {
        Self { rounds, turn_timeout }
    }

    pub async fn run(
        &self,
        participants: &[Arc<dyn Debater>],
        state: &AgentState,
        cancel: &CancellationToken,
    ) -> DebateLog {
        let names: Vec<String> = participants.iter().map(|p| p.name().to_string()).collect();
        let mut log = DebateLog::new(names);

        if participants.is_empty() || self.rounds == 0 {
            log.phase = DebatePhase::Terminated;
            return log;
        }

        log.phase = DebatePhase::InProgress;
        let total_turns = self.rounds * participants.len() as u32;

        while log.turn_count() < total_turns {
            if cancel.is_cancelled() {
                debug!(turns = log.turn_count(), "Debate cancelled at turn boundary");
                break;
            }

            let idx = (log.turn_count() as usize) % participants.len();
            let debater = &participants[idx];

            let reply = match tokio::time::timeout(self.turn_timeout, debater.argue(state, &log))
                .await
            {
                Ok(Ok(reply)) => reply,
                Ok(Err(e)) => {
                    warn!(speaker = %debater.name(), error = %e, "Debate turn failed");
                    TurnReply::of(format!("{} produced no response", debater.name()))
                }
                Err(_) => {
                    warn!(speaker = %debater.name(), "Debate turn timed out");
                    TurnReply::of(format!("{} produced no response", debater.name()))
                }
            };

            let terminal = reply.terminal;
            log.commit_turn(idx, reply.argument);
            if terminal {
                debug!(speaker = %debater.name(), turns = log.turn_count(), "Debate ended early");
                break;
            }
        }

        log.phase = DebatePhase::Terminated;
        log
    }
}

/// Fold a finished two-party log (bull at index 0, bear at index 1) into the
/// persisted investment-debate shape.
pub fn invest_debate_state(log: &DebateLog) -> InvestDebateState {
    InvestDebateState {
        bull_transcript: log.transcript_of(0),
        bear_transcript: log.transcript_of(1),
        combined_history: log.combined_history(),
        last_argument: log.last_argument().unwrap_or_default().to_string(),
        round_count: log.turn_count(),
    }
}

/// Fold a finished three-party log (rotation order aggressive, conservative,
/// neutral) into the persisted risk-debate shape.
pub fn risk_debate_state(log: &DebateLog) -> RiskDebateState {
    let current = |speaker: RiskSpeaker| {
        log.current_response_of(speaker as usize)
            .unwrap_or_default()
            .to_string()
    };
    RiskDebateState {
        aggressive_transcript: log.transcript_of(RiskSpeaker::Aggressive as usize),
        conservative_transcript: log.transcript_of(RiskSpeaker::Conservative as usize),
        neutral_transcript: log.transcript_of(RiskSpeaker::Neutral as usize),
        combined_history: log.combined_history(),
        latest_speaker: log
            .last_speaker()
            .and_then(|i| RiskSpeaker::ROTATION.get(i).copied()),
        current_aggressive_response: current(RiskSpeaker::Aggressive),
        current_conservative_response: current(RiskSpeaker::Conservative),
        current_neutral_response: current(RiskSpeaker::Neutral),
        round_count: log.turn_count(),
    }
}
