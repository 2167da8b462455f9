//! Phase number → model parameters.
//!
//! Phases 1–4 ask short clarifying questions on the cheaper model; phase 5
//! writes the final creative direction on the larger one. Transitions are
//! forward-only; the caller decides when to advance.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::CoreError;

/// Number of phases in a creative-direction conversation.
pub const PHASE_COUNT: u8 = 5;

const CLARIFICATION_MAX_TOKENS: u32 = 300;
const CLARIFICATION_TEMPERATURE: f32 = 0.7;
const GENERATION_MAX_TOKENS: u32 = 500;
const GENERATION_TEMPERATURE: f32 = 0.9;

/// A validated phase number in `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Phase(u8);

impl Phase {
    pub const FIRST: Phase = Phase(1);
    pub const GENERATION: Phase = Phase(PHASE_COUNT);

    pub fn new(number: u8) -> Result<Self, CoreError> {
        if (1..=PHASE_COUNT).contains(&number) {
            Ok(Self(number))
        } else {
            Err(CoreError::InvalidPhase(number))
        }
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn kind(self) -> PhaseKind {
        if self.0 < PHASE_COUNT {
            PhaseKind::Clarification
        } else {
            PhaseKind::Generation
        }
    }

    pub fn is_generation(self) -> bool {
        self.kind() == PhaseKind::Generation
    }

    /// The following phase, or `None` once generation has been reached.
    pub fn next(self) -> Option<Phase> {
        (self.0 < PHASE_COUNT).then(|| Phase(self.0 + 1))
    }

    /// Move to `target`, which may skip ahead but never go back.
    pub fn advance_to(self, target: Phase) -> Result<Phase, CoreError> {
        if target < self {
            return Err(CoreError::PhaseRegression {
                from: self.0,
                to: target.0,
            });
        }
        Ok(target)
    }

    /// Generation parameters for this phase.
    pub fn settings(self, models: &ModelSelection) -> PhaseSettings {
        match self.kind() {
            PhaseKind::Clarification => PhaseSettings {
                phase: self,
                kind: PhaseKind::Clarification,
                model: models.clarification.clone(),
                max_tokens: CLARIFICATION_MAX_TOKENS,
                temperature: CLARIFICATION_TEMPERATURE,
            },
            PhaseKind::Generation => PhaseSettings {
                phase: self,
                kind: PhaseKind::Generation,
                model: models.generation.clone(),
                max_tokens: GENERATION_MAX_TOKENS,
                temperature: GENERATION_TEMPERATURE,
            },
        }
    }
}

impl TryFrom<u8> for Phase {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Phase::new(value)
    }
}

impl From<Phase> for u8 {
    fn from(phase: Phase) -> Self {
        phase.0
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "phase {}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PhaseKind {
    Clarification,
    Generation,
}

/// Which model serves each kind of phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub clarification: String,
    pub generation: String,
}

impl Default for ModelSelection {
    fn default() -> Self {
        Self {
            clarification: "claude-3-5-haiku-latest".to_owned(),
            generation: "claude-3-7-sonnet-latest".to_owned(),
        }
    }
}

/// Everything the model call needs to know about the current phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSettings {
    pub phase: Phase,
    pub kind: PhaseKind,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_out_of_range_numbers() {
        assert_eq!(Phase::new(0), Err(CoreError::InvalidPhase(0)));
        assert_eq!(Phase::new(6), Err(CoreError::InvalidPhase(6)));
        assert!(Phase::new(1).is_ok());
        assert!(Phase::new(5).is_ok());
    }

    #[test]
    fn clarification_phases_use_small_model() {
        let models = ModelSelection::default();
        for n in 1..=4 {
            let settings = Phase::new(n).unwrap().settings(&models);
            assert_eq!(settings.kind, PhaseKind::Clarification);
            assert_eq!(settings.model, models.clarification);
            assert!(settings.max_tokens <= 300);
        }
    }

    #[test]
    fn generation_phase_uses_large_model() {
        let models = ModelSelection {
            clarification: "small".into(),
            generation: "large".into(),
        };
        let settings = Phase::GENERATION.settings(&models);
        assert_eq!(settings.kind, PhaseKind::Generation);
        assert_eq!(settings.model, "large");
        assert!(settings.max_tokens <= 500);
        assert!(settings.temperature > Phase::FIRST.settings(&models).temperature);
    }

    #[test]
    fn next_stops_after_generation() {
        assert_eq!(Phase::FIRST.next(), Some(Phase::new(2).unwrap()));
        assert_eq!(Phase::new(4).unwrap().next(), Some(Phase::GENERATION));
        assert_eq!(Phase::GENERATION.next(), None);
    }

    #[test]
    fn advance_is_forward_only() {
        let third = Phase::new(3).unwrap();
        assert_eq!(third.advance_to(Phase::GENERATION), Ok(Phase::GENERATION));
        assert_eq!(third.advance_to(third), Ok(third));
        assert_eq!(
            third.advance_to(Phase::FIRST),
            Err(CoreError::PhaseRegression { from: 3, to: 1 })
        );
    }

    #[test]
    fn deserialization_validates_range() {
        assert_eq!(serde_json::from_str::<Phase>("2").unwrap().number(), 2);
        assert!(serde_json::from_str::<Phase>("9").is_err());
    }
}
