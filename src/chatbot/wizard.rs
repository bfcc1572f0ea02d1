//! Scripted, linear conversation that collects a near-miss report one field
//! at a time. The client holds the [`WizardState`] and sends it back with
//! each answer, so the server keeps no session.

use serde::{Deserialize, Serialize};

use crate::db::models::Severity;

pub const MAX_TITLE_CHARS: usize = 120;
pub const MIN_DESCRIPTION_CHARS: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    Title,
    Description,
    Zone,
    Severity,
    Confirm,
    Done,
}

/// Answers collected so far plus the step awaiting an answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardState {
    #[serde(default)]
    pub step: Step,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub severity: Option<Severity>,
}

/// A confirmed report, ready to be filed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub title: String,
    pub description: String,
    pub zone: String,
    pub severity: Severity,
}

/// Result of feeding one answer to the wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Turn {
    /// Ask the next (or same) question.
    Ask { state: WizardState, prompt: String },
    /// The user confirmed; file the draft.
    Submit(Draft),
}

impl WizardState {
    fn draft(&self) -> Option<Draft> {
        Some(Draft {
            title: self.title.clone()?,
            description: self.description.clone()?,
            zone: self.zone.clone()?,
            severity: self.severity?,
        })
    }
}

/// The question for `state`'s current step.
pub fn prompt_for(state: &WizardState, zones: &[String]) -> String {
    match state.step {
        Step::Title => "What happened? Give the near-miss a short title.".to_string(),
        Step::Description => {
            "Describe what happened and what could have gone wrong.".to_string()
        }
        Step::Zone if zones.is_empty() => {
            "In which zone did it happen? No zones are configured yet, ask an administrator \
             to add one."
                .to_string()
        }
        Step::Zone => format!("In which zone did it happen? Options: {}.", zones.join(", ")),
        Step::Severity => {
            "How severe could it have been? Answer low, medium, high or critical.".to_string()
        }
        Step::Confirm => match state.draft() {
            Some(d) => format!(
                "Please confirm the report: \"{}\" in {} ({}). {} Submit it? (yes/no)",
                d.title,
                d.zone,
                d.severity.as_str(),
                d.description
            ),
            None => "Submit the report? (yes/no)".to_string(),
        },
        Step::Done => "Thank you, your report was filed. Send any message to start a new one."
            .to_string(),
    }
}

fn ask(state: WizardState, zones: &[String]) -> Turn {
    let prompt = prompt_for(&state, zones);
    Turn::Ask { state, prompt }
}

fn reject(state: WizardState, zones: &[String], reason: &str) -> Turn {
    let prompt = format!("{} {}", reason, prompt_for(&state, zones));
    Turn::Ask { state, prompt }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.to_lowercase().as_str(), "yes" | "y" | "sim" | "s")
}

fn is_no(answer: &str) -> bool {
    matches!(
        answer.to_lowercase().as_str(),
        "no" | "n" | "não" | "nao"
    )
}

/// Advance the wizard by one answer.
///
/// Without an answer the current question is repeated. Invalid answers keep
/// the step and prefix its question with the reason. `zones` lists the valid
/// zone names; a zone missing from it at confirmation sends the user back to
/// the zone question.
pub fn advance(mut state: WizardState, answer: Option<&str>, zones: &[String]) -> Turn {
    let Some(answer) = answer.map(str::trim).filter(|a| !a.is_empty()) else {
        return ask(state, zones);
    };

    match state.step {
        Step::Title => {
            if answer.chars().count() > MAX_TITLE_CHARS {
                return reject(
                    state,
                    zones,
                    &format!("That title is too long (max {MAX_TITLE_CHARS} characters)."),
                );
            }
            state.title = Some(answer.to_string());
            state.step = Step::Description;
        }
        Step::Description => {
            if answer.chars().count() < MIN_DESCRIPTION_CHARS {
                return reject(state, zones, "Please give a bit more detail.");
            }
            state.description = Some(answer.to_string());
            state.step = Step::Zone;
        }
        Step::Zone => {
            if zones.is_empty() {
                return reject(state, zones, "No zones are configured.");
            }
            match zones.iter().find(|z| z.eq_ignore_ascii_case(answer)).cloned() {
                Some(zone) => {
                    state.zone = Some(zone);
                    state.step = Step::Severity;
                }
                None => return reject(state, zones, &format!("I don't know the zone '{answer}'.")),
            }
        }
        Step::Severity => match Severity::from_str_ci(answer) {
            Some(severity) => {
                state.severity = Some(severity);
                state.step = Step::Confirm;
            }
            None => return reject(state, zones, "That is not a severity level."),
        },
        Step::Confirm => {
            if is_yes(answer) {
                return match state.draft() {
                    Some(draft) if !zones.iter().any(|z| z == &draft.zone) => {
                        state.zone = None;
                        state.step = Step::Zone;
                        reject(
                            state,
                            zones,
                            &format!("The zone '{}' no longer exists.", draft.zone),
                        )
                    }
                    Some(draft) => Turn::Submit(draft),
                    // Tampered state: start over.
                    None => reject(WizardState::default(), zones, "Some answers were missing."),
                };
            }
            if is_no(answer) {
                return reject(WizardState::default(), zones, "Report discarded.");
            }
            return reject(state, zones, "Please answer yes or no.");
        }
        Step::Done => state = WizardState::default(),
    }

    ask(state, zones)
}

/// State shown after a report was filed.
pub fn finished() -> WizardState {
    WizardState {
        step: Step::Done,
        ..Default::default()
    }
}
