use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::interview_dto::{
    AddParticipantPayload, EvaluationPayload, JoinInterviewPayload, JoinInterviewResponse,
    ListInterviewsQuery, NotePayload, ScheduleInterviewPayload, UpdateStatusPayload,
};
use crate::error::{Error, Result};
use crate::models::evaluation::{InterviewEvaluation, InterviewNote};
use crate::models::interview::Interview;
use crate::models::participant::InterviewParticipant;
use crate::AppState;

/// Authentication is delegated to the upstream gateway; it asserts the
/// acting user through this header.
fn acting_user(headers: &HeaderMap) -> Result<String> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .ok_or_else(|| Error::BadRequest("Missing x-user-id header".to_string()))
}

pub async fn schedule_interview(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ScheduleInterviewPayload>,
) -> Result<(StatusCode, Json<Interview>)> {
    payload.validate()?;
    let user = acting_user(&headers)?;
    let interview = state.interview_service.schedule(&user, payload).await?;
    Ok((StatusCode::CREATED, Json(interview)))
}

pub async fn list_interviews(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListInterviewsQuery>,
) -> Result<Json<Vec<Interview>>> {
    let user = acting_user(&headers)?;
    let interviews = state.interview_service.list(&user, query).await?;
    Ok(Json(interviews))
}

pub async fn get_interview(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Interview>> {
    let user = acting_user(&headers)?;
    let interview = state.interview_service.get(id, &user).await?;
    Ok(Json(interview))
}

pub async fn join_interview(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    payload: Option<Json<JoinInterviewPayload>>,
) -> Result<Json<JoinInterviewResponse>> {
    let user = acting_user(&headers)?;
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let response = state.interview_service.join(id, &user, payload).await?;
    Ok(Json(response))
}

pub async fn add_participant(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddParticipantPayload>,
) -> Result<(StatusCode, Json<InterviewParticipant>)> {
    payload.validate()?;
    let user = acting_user(&headers)?;
    let participant = state
        .interview_service
        .add_participant(id, &user, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(participant)))
}

pub async fn update_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusPayload>,
) -> Result<Json<Interview>> {
    let user = acting_user(&headers)?;
    let interview = state
        .interview_service
        .update_status(id, &user, payload)
        .await?;
    Ok(Json(interview))
}

pub async fn cancel_interview(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Interview>> {
    let user = acting_user(&headers)?;
    let interview = state.interview_service.cancel(id, &user).await?;
    Ok(Json(interview))
}

pub async fn submit_evaluation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<EvaluationPayload>,
) -> Result<(StatusCode, Json<InterviewEvaluation>)> {
    payload.validate()?;
    let user = acting_user(&headers)?;
    let evaluation = state
        .interview_service
        .submit_evaluation(id, &user, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(evaluation)))
}

pub async fn list_evaluations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<InterviewEvaluation>>> {
    let user = acting_user(&headers)?;
    let evaluations = state.interview_service.list_evaluations(id, &user).await?;
    Ok(Json(evaluations))
}

pub async fn add_note(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<NotePayload>,
) -> Result<(StatusCode, Json<InterviewNote>)> {
    payload.validate()?;
    let user = acting_user(&headers)?;
    let note = state.interview_service.add_note(id, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn list_notes(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<InterviewNote>>> {
    let user = acting_user(&headers)?;
    let notes = state.interview_service.list_notes(id, &user).await?;
    Ok(Json(notes))
}
