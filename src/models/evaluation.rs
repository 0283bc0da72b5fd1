use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// One per (interview, evaluator); immutable once submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewEvaluation {
    pub id: Uuid,
    pub interview_id: Uuid,
    pub evaluator_id: String,
    pub overall_rating: i16,
    pub technical_rating: i16,
    pub communication_rating: i16,
    pub problem_solving_rating: i16,
    pub cultural_fit_rating: i16,
    pub code_quality_rating: i16,
    pub feedback: Option<String>,
    pub recommend_hire: bool,
    /// Free-form skill name -> assessment map.
    pub skills_assessment: JsonValue,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewNote {
    pub id: Uuid,
    pub interview_id: Uuid,
    pub author_id: String,
    pub content: String,
    pub is_private: bool,
    pub is_flagged: bool,
    pub created_at: DateTime<Utc>,
}
