use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::incidents::{process_create_incident, CreateIncidentRequest, CreatedIncident};
use crate::app::AppState;
use crate::auth::models::AuthenticatedUser;
use crate::chatbot::wizard::{self, prompt_for, Step, Turn, WizardState};
use crate::error::AppError;

#[derive(Debug, Default, Deserialize)]
pub struct WizardRequest {
    #[serde(default)]
    pub state: WizardState,
    #[serde(default)]
    pub answer: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WizardResponse {
    pub state: WizardState,
    pub prompt: String,
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incident: Option<CreatedIncident>,
}

/// Feed one answer to the incident wizard, filing the report on confirmation.
pub async fn process_wizard(
    state: &AppState,
    caller: &AuthenticatedUser,
    request: WizardRequest,
) -> Result<WizardResponse, AppError> {
    let zones: Vec<String> = state
        .zones
        .list_all()
        .await?
        .into_iter()
        .map(|z| z.name)
        .collect();

    match wizard::advance(request.state, request.answer.as_deref(), &zones) {
        Turn::Ask { state, prompt } => Ok(WizardResponse {
            done: state.step == Step::Done,
            state,
            prompt,
            incident: None,
        }),
        Turn::Submit(draft) => {
            let created = process_create_incident(
                state,
                caller,
                CreateIncidentRequest {
                    title: draft.title,
                    description: draft.description,
                    zone: draft.zone,
                    location: None,
                    severity: draft.severity.as_str().to_string(),
                    occurred_at: None,
                },
            )
            .await?;

            tracing::info!(incident_id = %created.incident.id, "Incident filed through wizard");

            let done = wizard::finished();
            Ok(WizardResponse {
                prompt: prompt_for(&done, &zones),
                state: done,
                done: true,
                incident: Some(created),
            })
        }
    }
}

/// `POST /api/chatbot/incident`
pub async fn incident_wizard_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Json(request): Json<WizardRequest>,
) -> Result<Json<WizardResponse>, AppError> {
    Ok(Json(process_wizard(&state, &caller, request).await?))
}
