//! HTTP handlers for recommendation sessions

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use shared::RecommendationContextStore;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::{SessionSnapshot, TurnRequest, TurnResponse};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    #[serde(flatten)]
    pub turn: TurnResponse,
}

#[derive(Debug, Deserialize)]
pub struct DetectionInput {
    /// Raw text as returned by the vision service
    pub raw: String,
}

#[derive(Debug, Deserialize)]
pub struct ImageInput {
    /// Base64 image bytes, optionally as a `data:` URL
    pub image_base64: String,
}

#[derive(Debug, Deserialize)]
pub struct LocationInput {
    pub zipcode: String,
}

#[derive(Debug, Deserialize)]
pub struct TextInput {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct MenuInput {
    pub selection: u32,
}

#[derive(Debug, Deserialize)]
pub struct QuestionInput {
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct ResumeInput {
    pub store: RecommendationContextStore,
}

/// Start a new session
pub async fn create_session(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<CreateSessionResponse>)> {
    let (session_id, turn) = state.sessions.create()?;
    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse { session_id, turn }),
    ))
}

/// Continue from a store returned when a session ended
pub async fn resume_session(
    State(state): State<AppState>,
    Json(input): Json<ResumeInput>,
) -> AppResult<(StatusCode, Json<SessionSnapshot>)> {
    let snapshot = state.sessions.resume(input.store)?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<SessionSnapshot>> {
    Ok(Json(state.sessions.snapshot(session_id).await?))
}

/// End a session and return its final context
pub async fn end_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<SessionSnapshot>> {
    Ok(Json(state.sessions.end(session_id).await?))
}

pub async fn submit_detection(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(input): Json<DetectionInput>,
) -> AppResult<Json<TurnResponse>> {
    turn(&state, session_id, TurnRequest::Detection(input.raw)).await
}

/// Analyze an uploaded photo and store the detection
pub async fn submit_image(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(input): Json<ImageInput>,
) -> AppResult<Json<TurnResponse>> {
    let image = decode_image(&input.image_base64)?;
    turn(&state, session_id, TurnRequest::Image(image)).await
}

pub async fn submit_location(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(input): Json<LocationInput>,
) -> AppResult<Json<TurnResponse>> {
    turn(&state, session_id, TurnRequest::Location(input.zipcode)).await
}

pub async fn submit_field_notes(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(input): Json<TextInput>,
) -> AppResult<Json<TurnResponse>> {
    turn(&state, session_id, TurnRequest::FieldNotes(input.text)).await
}

pub async fn submit_menu_selection(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(input): Json<MenuInput>,
) -> AppResult<Json<TurnResponse>> {
    turn(&state, session_id, TurnRequest::MenuSelection(input.selection)).await
}

pub async fn submit_question(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(input): Json<QuestionInput>,
) -> AppResult<Json<TurnResponse>> {
    turn(&state, session_id, TurnRequest::Question(input.question)).await
}

/// Free-form input routed the way a chat front end would route it
pub async fn submit_input(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(input): Json<TextInput>,
) -> AppResult<Json<TurnResponse>> {
    turn(&state, session_id, TurnRequest::Input(input.text)).await
}

async fn turn(
    state: &AppState,
    session_id: Uuid,
    request: TurnRequest,
) -> AppResult<Json<TurnResponse>> {
    Ok(Json(state.sessions.submit(session_id, request).await?))
}

fn decode_image(encoded: &str) -> AppResult<Vec<u8>> {
    let payload = match encoded.split_once(";base64,") {
        Some((_, data)) => data,
        None => encoded,
    };
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| AppError::invalid_input("image_base64", format!("Invalid base64: {}", e)))?;
    if bytes.is_empty() {
        return Err(AppError::invalid_input("image_base64", "Image is empty"));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_image_accepts_data_url() {
        assert_eq!(decode_image("data:image/png;base64,AQID").unwrap(), vec![1, 2, 3]);
        assert_eq!(decode_image("AQID").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_decode_image_rejects_garbage() {
        assert!(matches!(
            decode_image("not base64!"),
            Err(AppError::InvalidInput { .. })
        ));
        assert!(decode_image("").is_err());
    }
}
