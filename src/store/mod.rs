pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::code_session::{CodeEditorSession, ExecutionResult};
use crate::models::evaluation::{InterviewEvaluation, InterviewNote};
use crate::models::interview::{Interview, InterviewStatus, InterviewType};
use crate::models::participant::InterviewParticipant;

#[derive(Debug, Clone, Default)]
pub struct InterviewFilter {
    pub status: Option<InterviewStatus>,
    pub interview_type: Option<InterviewType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: u32,
    pub per_page: u32,
}

impl InterviewFilter {
    pub fn page_bounds(&self) -> (usize, usize) {
        let per_page = self.per_page.clamp(1, 100) as usize;
        let page = self.page.max(1) as usize;
        ((page - 1) * per_page, per_page)
    }
}

/// Seam to the persistent store the lifecycle service delegates to. The
/// overlap check and the no-show scan are the two RPC-style calls of the
/// interface; everything else is plain CRUD.
#[async_trait]
pub trait InterviewStore: Send + Sync {
    /// Inserts the interview together with its initial participant rows as
    /// one logical transaction: either all of it lands or none of it.
    async fn create_interview(
        &self,
        interview: &Interview,
        participants: &[InterviewParticipant],
    ) -> Result<()>;
    async fn get_interview(&self, id: Uuid) -> Result<Option<Interview>>;
    async fn update_interview(&self, interview: &Interview) -> Result<()>;
    async fn list_interviews(
        &self,
        user_id: &str,
        filter: &InterviewFilter,
    ) -> Result<Vec<Interview>>;
    /// Returns one interview of `user_id` whose scheduled window overlaps
    /// `[start, end)`, if any. Terminal-state interviews never conflict.
    async fn find_overlap(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<Interview>>;

    async fn insert_participant(&self, participant: &InterviewParticipant) -> Result<()>;
    async fn get_participant(
        &self,
        interview_id: Uuid,
        user_id: &str,
    ) -> Result<Option<InterviewParticipant>>;
    async fn list_participants(&self, interview_id: Uuid) -> Result<Vec<InterviewParticipant>>;
    async fn update_participant(&self, participant: &InterviewParticipant) -> Result<()>;

    async fn get_code_session(&self, interview_id: Uuid) -> Result<Option<CodeEditorSession>>;
    /// Lazily creates the 1:1 session with default language/theme.
    async fn get_or_create_code_session(&self, interview_id: Uuid) -> Result<CodeEditorSession>;
    /// Rejected once the session is finalized.
    async fn update_session_code(
        &self,
        interview_id: Uuid,
        code: &str,
        language: &str,
    ) -> Result<()>;
    async fn append_snapshot(
        &self,
        interview_id: Uuid,
        language: &str,
        code: &str,
        reason: &str,
    ) -> Result<()>;
    async fn append_execution(&self, interview_id: Uuid, result: &ExecutionResult) -> Result<()>;
    async fn finalize_session(&self, interview_id: Uuid, final_code: &str) -> Result<()>;

    async fn insert_evaluation(&self, evaluation: &InterviewEvaluation) -> Result<()>;
    async fn get_evaluation(
        &self,
        interview_id: Uuid,
        evaluator_id: &str,
    ) -> Result<Option<InterviewEvaluation>>;
    async fn list_evaluations(&self, interview_id: Uuid) -> Result<Vec<InterviewEvaluation>>;

    async fn insert_note(&self, note: &InterviewNote) -> Result<()>;
    async fn list_notes(&self, interview_id: Uuid) -> Result<Vec<InterviewNote>>;

    /// Interviews still `scheduled` whose start time is at or before
    /// `cutoff` — input to the no-show sweep.
    async fn no_show_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<Interview>>;
}
