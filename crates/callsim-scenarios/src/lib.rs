//! Patient scenario catalog for the callsim harness.
//!
//! Each scenario describes one synthetic patient persona used to exercise
//! the agent under test: who the caller is, how they behave, what they open
//! with, and when they should wrap the call up. The catalog is a plain
//! static table - scenarios have no behavior of their own and are safely
//! shared across concurrent calls without synchronization.

mod catalog;

pub use catalog::SCENARIOS;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("unknown scenario: {0}")]
    NotFound(String),
}

/// One synthetic patient persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scenario {
    /// Stable identifier, used on the CLI and in transcript paths.
    pub id: &'static str,
    /// Human-readable name for listings and summaries.
    pub name: &'static str,
    /// One-line description of what the scenario exercises.
    pub description: &'static str,
    /// Synthesis voice model for this persona.
    pub voice: &'static str,
    /// Persona instructions handed to the dialogue generator.
    pub persona: &'static str,
    /// The line the patient opens the conversation with.
    pub opening_line: &'static str,
    /// When and how the persona should end the call.
    pub termination_hints: &'static str,
}

/// Ground rules shared by every persona: phone-call register, short
/// answers, no volunteered information.
pub const BASE_RULES: &str = "\
IMPORTANT RULES:
- Keep every response to 1-3 short sentences. You are on a phone call, not writing an essay.
- Speak naturally and conversationally, as a real person would on the phone.
- Answer questions the agent asks you directly and clearly.
- Do NOT volunteer extra information unless asked.";

/// Default wrap-up guidance; every catalog entry currently uses it.
pub const DEFAULT_TERMINATION_HINTS: &str = "\
- When the conversation reaches a natural conclusion (appointment booked, question answered, etc.), say a brief goodbye and include [END_CALL] at the very end of that message.
- If the agent says goodbye or confirms everything is done, respond with a brief \"thank you, bye\" and include [END_CALL].
- If the conversation has been going in circles for a while, politely wrap up and include [END_CALL].";

impl Scenario {
    /// Builds the full system prompt for the dialogue generator.
    pub fn system_prompt(&self) -> String {
        format!(
            "{}\n{}\n\n{}\n\nStart by saying something like \"{}\".",
            BASE_RULES, self.termination_hints, self.persona, self.opening_line
        )
    }
}

/// Looks up a scenario by id.
pub fn get(id: &str) -> Result<&'static Scenario, ScenarioError> {
    SCENARIOS
        .iter()
        .find(|s| s.id == id)
        .ok_or_else(|| ScenarioError::NotFound(id.to_string()))
}

/// Returns the full catalog in definition order.
pub fn all() -> &'static [Scenario] {
    SCENARIOS
}

/// Returns every scenario id in definition order.
pub fn ids() -> impl Iterator<Item = &'static str> {
    SCENARIOS.iter().map(|s| s.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_has_eighteen_scenarios() {
        assert_eq!(SCENARIOS.len(), 18);
    }

    #[test]
    fn ids_are_unique() {
        let unique: HashSet<_> = ids().collect();
        assert_eq!(unique.len(), SCENARIOS.len());
    }

    #[test]
    fn every_scenario_has_a_non_empty_opening_line() {
        for scenario in all() {
            assert!(
                !scenario.opening_line.trim().is_empty(),
                "scenario {} has an empty opening line",
                scenario.id
            );
        }
    }

    #[test]
    fn get_returns_the_requested_scenario() {
        let scenario = get("prescription_refill").unwrap();
        assert_eq!(scenario.name, "Prescription Refill Request");
    }

    #[test]
    fn get_unknown_id_is_not_found() {
        let err = get("no_such_scenario").unwrap_err();
        assert!(matches!(err, ScenarioError::NotFound(_)));
        assert_eq!(err.to_string(), "unknown scenario: no_such_scenario");
    }

    #[test]
    fn system_prompt_includes_rules_persona_and_opening() {
        let scenario = get("new_patient_scheduling").unwrap();
        let prompt = scenario.system_prompt();
        assert!(prompt.contains("IMPORTANT RULES"));
        assert!(prompt.contains("[END_CALL]"));
        assert!(prompt.contains(scenario.opening_line));
        assert!(prompt.contains("Sarah Johnson"));
    }

    #[test]
    fn every_scenario_names_a_voice() {
        for scenario in all() {
            assert!(
                scenario.voice.starts_with("aura-"),
                "scenario {} has unexpected voice {}",
                scenario.id,
                scenario.voice
            );
        }
    }
}
