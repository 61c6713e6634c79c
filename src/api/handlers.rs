use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::{ApiError, AppState};
use crate::core::ai::AdviceRequest;
use crate::core::simulator::{SimulationMode, SimulatorSnapshot};
use crate::core::triage::TriageSummary;
use crate::core::ventilator::VentilatorReport;
use crate::models::patient::pick_child_name;
use crate::models::{ChatMessage, Feedback};

#[derive(Debug, Serialize)]
pub struct PatientView {
    #[serde(flatten)]
    pub snapshot: SimulatorSnapshot,
    pub triage: TriageSummary,
}

#[derive(Debug, Serialize)]
pub struct TriageView {
    pub triage: TriageSummary,
    pub ventilator: VentilatorReport,
}

#[derive(Debug, Serialize)]
pub struct ChatView {
    pub messages: Vec<ChatMessage>,
    pub suggestions: Vec<String>,
    pub loading: bool,
}

#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    pub mode: SimulationMode,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(alias = "message")]
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub feedback: Feedback,
}

fn patient_view(state: &AppState, snapshot: SimulatorSnapshot) -> PatientView {
    let triage = state.policy.summarize(&snapshot.patient);
    PatientView { snapshot, triage }
}

/// **GET /api/health**
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

/// **GET /api/patient**
///
/// Current simulator snapshot with its triage summary.
pub async fn get_patient(state: web::Data<AppState>) -> HttpResponse {
    let snapshot = state.simulator.snapshot();
    HttpResponse::Ok().json(patient_view(&state, snapshot))
}

/// **POST /api/patient/name**
pub async fn randomize_name(state: web::Data<AppState>) -> HttpResponse {
    let current = state.simulator.patient().identity.name;
    let name = pick_child_name(&mut rand::thread_rng(), Some(&current));
    info!(%name, "display name changed");

    let snapshot = state.simulator.rename(name);
    HttpResponse::Ok().json(patient_view(&state, snapshot))
}

/// **GET /api/triage**
pub async fn get_triage(state: web::Data<AppState>) -> HttpResponse {
    let patient = state.simulator.patient();
    HttpResponse::Ok().json(TriageView {
        triage: state.policy.summarize(&patient),
        ventilator: VentilatorReport::from_patient(&patient),
    })
}

/// **POST /api/simulation**
pub async fn set_mode(
    state: web::Data<AppState>,
    body: web::Json<ModeRequest>,
) -> HttpResponse {
    let snapshot = state.simulator.switch_mode(body.mode);
    HttpResponse::Ok().json(patient_view(&state, snapshot))
}

/// **POST /api/simulation/toggle**
///
/// The caregiver's status toggle: danger becomes safe and back.
pub async fn toggle_mode(state: web::Data<AppState>) -> HttpResponse {
    let snapshot = state.simulator.toggle();
    HttpResponse::Ok().json(patient_view(&state, snapshot))
}

/// **DELETE /api/simulation**
pub async fn stop_simulation(state: web::Data<AppState>) -> HttpResponse {
    let snapshot = state.simulator.stop();
    HttpResponse::Ok().json(patient_view(&state, snapshot))
}

/// **POST /api/medical-advice**
///
/// Relay to the advice service. Service failures are answered with the
/// canned fallback, so only malformed requests produce an error status.
pub async fn medical_advice(
    state: web::Data<AppState>,
    body: web::Json<AdviceRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = body.into_inner();
    request.validate()?;

    let question = request.question.trim();
    let advice = state.gateway.ask(question, &request.patient).await;
    Ok(HttpResponse::Ok().json(advice))
}

/// **GET /api/chat**
pub async fn get_chat(state: web::Data<AppState>) -> HttpResponse {
    let patient = state.simulator.patient();
    state.chat.sync_with(&patient);

    HttpResponse::Ok().json(ChatView {
        messages: state.chat.messages(),
        suggestions: state.chat.suggestions(&patient),
        loading: state.chat.is_loading(),
    })
}

/// **POST /api/chat**
pub async fn post_chat(
    state: web::Data<AppState>,
    body: web::Json<ChatRequest>,
) -> Result<HttpResponse, ApiError> {
    let patient = state.simulator.patient();
    state.chat.sync_with(&patient);

    let reply = state.chat.send(&body.question, &patient).await?;
    Ok(HttpResponse::Ok().json(reply))
}

/// **POST /api/chat/{id}/feedback**
pub async fn post_feedback(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<FeedbackRequest>,
) -> Result<HttpResponse, ApiError> {
    let message = state
        .chat
        .toggle_feedback(path.into_inner(), body.feedback)?;
    Ok(HttpResponse::Ok().json(message))
}
