use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::Validate;

use crate::models::code_session::CodeEditorSession;
use crate::models::interview::{Interview, InterviewStatus, InterviewType};
use crate::models::participant::{InterviewParticipant, ParticipantRole};
use crate::services::token_service::MediaToken;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScheduleInterviewPayload {
    #[validate(length(min = 1))]
    pub client_id: String,
    #[validate(length(min = 1))]
    pub developer_id: String,
    pub project_id: Option<Uuid>,
    #[validate(length(min = 1))]
    pub title: String,
    pub description: Option<String>,
    pub agenda: Option<String>,
    pub interview_type: InterviewType,
    pub scheduled_at: DateTime<Utc>,
    #[validate(range(min = 1, max = 480))]
    pub duration_minutes: i64,
    pub timezone: Option<String>,
    pub client_name: Option<String>,
    pub developer_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JoinInterviewPayload {
    pub display_name: Option<String>,
}

/// Invitation of an additional (non-primary) participant.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddParticipantPayload {
    #[validate(length(min = 1))]
    pub user_id: String,
    pub display_name: Option<String>,
    pub role: ParticipantRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinInterviewResponse {
    pub interview: Interview,
    pub participants: Vec<InterviewParticipant>,
    pub media_token: MediaToken,
    pub code_session: CodeEditorSession,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusPayload {
    pub status: InterviewStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EvaluationPayload {
    #[validate(range(min = 1, max = 5))]
    pub overall_rating: i16,
    #[validate(range(min = 1, max = 5))]
    pub technical_rating: i16,
    #[validate(range(min = 1, max = 5))]
    pub communication_rating: i16,
    #[validate(range(min = 1, max = 5))]
    pub problem_solving_rating: i16,
    #[validate(range(min = 1, max = 5))]
    pub cultural_fit_rating: i16,
    #[validate(range(min = 1, max = 5))]
    pub code_quality_rating: i16,
    pub feedback: Option<String>,
    pub recommend_hire: bool,
    #[serde(default)]
    pub skills_assessment: JsonValue,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NotePayload {
    #[validate(length(min = 1))]
    pub content: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_flagged: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListInterviewsQuery {
    pub status: Option<InterviewStatus>,
    pub interview_type: Option<InterviewType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}
