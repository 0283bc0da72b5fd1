use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::dto::interview_dto::{
    AddParticipantPayload, EvaluationPayload, JoinInterviewPayload, JoinInterviewResponse,
    ListInterviewsQuery, NotePayload, ScheduleInterviewPayload, UpdateStatusPayload,
};
use crate::error::{Error, Result};
use crate::models::evaluation::{InterviewEvaluation, InterviewNote};
use crate::models::interview::{Interview, InterviewStatus};
use crate::models::participant::{InterviewParticipant, ParticipantRole};
use crate::relay::RoomRegistry;
use crate::services::token_service::MediaTokenService;
use crate::store::{InterviewFilter, InterviewStore};

const NOT_AUTHORIZED: &str = "Not authorized to access this interview";

/// Owns the interview state machine and authorizes session access.
#[derive(Clone)]
pub struct InterviewService {
    store: Arc<dyn InterviewStore>,
    tokens: MediaTokenService,
    rooms: Arc<RoomRegistry>,
}

impl InterviewService {
    pub fn new(
        store: Arc<dyn InterviewStore>,
        tokens: MediaTokenService,
        rooms: Arc<RoomRegistry>,
    ) -> Self {
        Self {
            store,
            tokens,
            rooms,
        }
    }

    /// Schedules a new interview. Fails with `Conflict` when either primary
    /// participant already has an interview overlapping the requested
    /// window; windows that merely touch do not conflict.
    pub async fn schedule(
        &self,
        acting_user: &str,
        payload: ScheduleInterviewPayload,
    ) -> Result<Interview> {
        if acting_user != payload.client_id && acting_user != payload.developer_id {
            return Err(Error::Authorization(NOT_AUTHORIZED.to_string()));
        }

        let start = payload.scheduled_at;
        let end = start + Duration::minutes(payload.duration_minutes);

        for user_id in [&payload.client_id, &payload.developer_id] {
            if let Some(existing) = self.store.find_overlap(user_id, start, end).await? {
                return Err(Error::Conflict(format!(
                    "Requested slot overlaps '{}' scheduled {} to {}",
                    existing.title,
                    existing.scheduled_at.to_rfc3339(),
                    existing.scheduled_end().to_rfc3339(),
                )));
            }
        }

        let now = Utc::now();
        let interview = Interview {
            id: Uuid::new_v4(),
            client_id: payload.client_id.clone(),
            developer_id: payload.developer_id.clone(),
            project_id: payload.project_id,
            title: payload.title,
            description: payload.description,
            agenda: payload.agenda,
            interview_type: payload.interview_type,
            status: InterviewStatus::Scheduled,
            scheduled_at: payload.scheduled_at,
            duration_minutes: payload.duration_minutes,
            timezone: payload.timezone.unwrap_or_else(|| "UTC".to_string()),
            started_at: None,
            ended_at: None,
            actual_duration_minutes: None,
            recording_url: None,
            created_by: acting_user.to_string(),
            created_at: now,
            updated_at: now,
        };

        let client_name = payload.client_name.unwrap_or_else(|| interview.client_id.clone());
        let developer_name = payload
            .developer_name
            .unwrap_or_else(|| interview.developer_id.clone());
        let participants = vec![
            InterviewParticipant::new(
                interview.id,
                &interview.client_id,
                &client_name,
                ParticipantRole::Client,
            ),
            InterviewParticipant::new(
                interview.id,
                &interview.developer_id,
                &developer_name,
                ParticipantRole::Developer,
            ),
        ];

        self.store.create_interview(&interview, &participants).await?;
        tracing::info!(interview_id = %interview.id, client = %interview.client_id, developer = %interview.developer_id, "interview scheduled");
        Ok(interview)
    }

    /// Authorizes a join, marks the participant joined, lazily creates the
    /// code session and issues a media-room token (best-effort).
    pub async fn join(
        &self,
        interview_id: Uuid,
        user_id: &str,
        payload: JoinInterviewPayload,
    ) -> Result<JoinInterviewResponse> {
        let interview = self.require_interview(interview_id).await?;
        if interview.status.is_terminal() {
            return Err(Error::BadRequest(format!(
                "Interview is {} and can no longer be joined",
                interview.status
            )));
        }

        let mut participant = match self.store.get_participant(interview_id, user_id).await? {
            Some(participant) => participant,
            None if interview.is_primary_participant(user_id) => {
                // Primary participants are implicitly authorized even
                // without a pre-existing row.
                let role = if interview.client_id == user_id {
                    ParticipantRole::Client
                } else {
                    ParticipantRole::Developer
                };
                let display_name = payload.display_name.clone().unwrap_or_else(|| user_id.to_string());
                let participant =
                    InterviewParticipant::new(interview_id, user_id, &display_name, role);
                self.store.insert_participant(&participant).await?;
                participant
            }
            None => return Err(Error::Authorization(NOT_AUTHORIZED.to_string())),
        };

        if participant.joined_at.is_none() {
            participant.joined_at = Some(Utc::now());
        }
        participant.left_at = None;
        self.store.update_participant(&participant).await?;

        let code_session = self.store.get_or_create_code_session(interview_id).await?;
        let participants = self.store.list_participants(interview_id).await?;
        let media_token = self.tokens.issue(interview_id, user_id);

        tracing::info!(%interview_id, user_id, "participant joined interview");
        Ok(JoinInterviewResponse {
            interview,
            participants,
            media_token,
            code_session,
        })
    }

    /// Grants an invited user access to the interview as an additional
    /// participant (interviewer, observer, note-taker, panelist). Only the
    /// two primary participants may invite.
    pub async fn add_participant(
        &self,
        interview_id: Uuid,
        acting_user: &str,
        payload: AddParticipantPayload,
    ) -> Result<InterviewParticipant> {
        let interview = self.require_interview(interview_id).await?;
        if !interview.is_primary_participant(acting_user) {
            return Err(Error::Authorization(NOT_AUTHORIZED.to_string()));
        }
        if interview.status.is_terminal() {
            return Err(Error::BadRequest(format!(
                "Interview is {} and can no longer be changed",
                interview.status
            )));
        }
        if self
            .store
            .get_participant(interview_id, &payload.user_id)
            .await?
            .is_some()
        {
            return Err(Error::Conflict(
                "User is already a participant of this interview".to_string(),
            ));
        }

        let display_name = payload
            .display_name
            .unwrap_or_else(|| payload.user_id.clone());
        let participant =
            InterviewParticipant::new(interview_id, &payload.user_id, &display_name, payload.role);
        self.store.insert_participant(&participant).await?;
        tracing::info!(%interview_id, user_id = %participant.user_id, role = %participant.role, "participant added");
        Ok(participant)
    }

    /// Records the leave time once a participant drops off the live
    /// session. Missing rows are ignored: a peer can disconnect after its
    /// interview was deleted out from under it.
    pub async fn mark_left(&self, interview_id: Uuid, user_id: &str) -> Result<()> {
        if let Some(mut participant) = self.store.get_participant(interview_id, user_id).await? {
            participant.left_at = Some(Utc::now());
            self.store.update_participant(&participant).await?;
        }
        Ok(())
    }

    /// Drives the status state machine. Completion computes the actual
    /// duration and fixes the final code of the editor session.
    pub async fn update_status(
        &self,
        interview_id: Uuid,
        acting_user: &str,
        payload: UpdateStatusPayload,
    ) -> Result<Interview> {
        let mut interview = self.require_interview(interview_id).await?;
        if !interview.is_primary_participant(acting_user) {
            return Err(Error::Authorization(NOT_AUTHORIZED.to_string()));
        }

        if !interview.status.can_transition_to(payload.status) {
            return Err(Error::InvalidTransition(format!(
                "{} -> {}",
                interview.status, payload.status
            )));
        }

        match payload.status {
            InterviewStatus::InProgress => {
                interview.started_at = Some(payload.started_at.unwrap_or_else(Utc::now));
            }
            InterviewStatus::Completed => {
                let ended_at = payload.ended_at.unwrap_or_else(Utc::now);
                interview.ended_at = Some(ended_at);
                if let Some(started_at) = interview.started_at {
                    interview.actual_duration_minutes =
                        Some((ended_at - started_at).num_minutes());
                }
                self.finalize_code_session(interview_id).await?;
            }
            InterviewStatus::Cancelled | InterviewStatus::NoShow => {}
            InterviewStatus::Scheduled => unreachable!("no transition leads back to scheduled"),
        }

        interview.status = payload.status;
        interview.updated_at = Utc::now();
        self.store.update_interview(&interview).await?;
        tracing::info!(%interview_id, status = %interview.status, "interview status updated");
        Ok(interview)
    }

    /// Only the two primary participants may cancel; allowed from any
    /// non-terminal state.
    pub async fn cancel(&self, interview_id: Uuid, acting_user: &str) -> Result<Interview> {
        let mut interview = self.require_interview(interview_id).await?;
        if !interview.is_primary_participant(acting_user) {
            return Err(Error::Authorization(NOT_AUTHORIZED.to_string()));
        }
        if interview.status.is_terminal() {
            return Err(Error::InvalidTransition(format!(
                "{} -> cancelled",
                interview.status
            )));
        }

        interview.status = InterviewStatus::Cancelled;
        interview.updated_at = Utc::now();
        self.store.update_interview(&interview).await?;
        tracing::info!(%interview_id, acting_user, "interview cancelled");
        Ok(interview)
    }

    /// One evaluation per (interview, evaluator); resubmission conflicts.
    pub async fn submit_evaluation(
        &self,
        interview_id: Uuid,
        evaluator_id: &str,
        payload: EvaluationPayload,
    ) -> Result<InterviewEvaluation> {
        let interview = self.require_interview(interview_id).await?;
        let is_participant = interview.is_primary_participant(evaluator_id)
            || self
                .store
                .get_participant(interview_id, evaluator_id)
                .await?
                .is_some();
        if !is_participant {
            return Err(Error::Authorization(NOT_AUTHORIZED.to_string()));
        }

        if self
            .store
            .get_evaluation(interview_id, evaluator_id)
            .await?
            .is_some()
        {
            return Err(Error::Conflict(
                "An evaluation for this interview has already been submitted".to_string(),
            ));
        }

        let evaluation = InterviewEvaluation {
            id: Uuid::new_v4(),
            interview_id,
            evaluator_id: evaluator_id.to_string(),
            overall_rating: payload.overall_rating,
            technical_rating: payload.technical_rating,
            communication_rating: payload.communication_rating,
            problem_solving_rating: payload.problem_solving_rating,
            cultural_fit_rating: payload.cultural_fit_rating,
            code_quality_rating: payload.code_quality_rating,
            feedback: payload.feedback,
            recommend_hire: payload.recommend_hire,
            skills_assessment: payload.skills_assessment,
            submitted_at: Utc::now(),
        };
        self.store.insert_evaluation(&evaluation).await?;
        Ok(evaluation)
    }

    pub async fn list_evaluations(
        &self,
        interview_id: Uuid,
        viewer: &str,
    ) -> Result<Vec<InterviewEvaluation>> {
        let interview = self.require_interview(interview_id).await?;
        if !interview.is_primary_participant(viewer) {
            return Err(Error::Authorization(NOT_AUTHORIZED.to_string()));
        }
        self.store.list_evaluations(interview_id).await
    }

    pub async fn add_note(
        &self,
        interview_id: Uuid,
        author_id: &str,
        payload: NotePayload,
    ) -> Result<InterviewNote> {
        let interview = self.require_interview(interview_id).await?;
        let is_participant = interview.is_primary_participant(author_id)
            || self
                .store
                .get_participant(interview_id, author_id)
                .await?
                .is_some();
        if !is_participant {
            return Err(Error::Authorization(NOT_AUTHORIZED.to_string()));
        }

        let note = InterviewNote {
            id: Uuid::new_v4(),
            interview_id,
            author_id: author_id.to_string(),
            content: payload.content,
            is_private: payload.is_private,
            is_flagged: payload.is_flagged,
            created_at: Utc::now(),
        };
        self.store.insert_note(&note).await?;
        Ok(note)
    }

    /// Private notes are visible only to their author.
    pub async fn list_notes(&self, interview_id: Uuid, viewer: &str) -> Result<Vec<InterviewNote>> {
        self.require_interview(interview_id).await?;
        let notes = self.store.list_notes(interview_id).await?;
        Ok(notes
            .into_iter()
            .filter(|n| !n.is_private || n.author_id == viewer)
            .collect())
    }

    pub async fn list(
        &self,
        user_id: &str,
        query: ListInterviewsQuery,
    ) -> Result<Vec<Interview>> {
        let filter = InterviewFilter {
            status: query.status,
            interview_type: query.interview_type,
            from: query.from,
            to: query.to,
            page: query.page.unwrap_or(1),
            per_page: query.per_page.unwrap_or(20),
        };
        self.store.list_interviews(user_id, &filter).await
    }

    pub async fn get(&self, interview_id: Uuid, viewer: &str) -> Result<Interview> {
        let interview = self.require_interview(interview_id).await?;
        let is_participant = interview.is_primary_participant(viewer)
            || self
                .store
                .get_participant(interview_id, viewer)
                .await?
                .is_some();
        if !is_participant {
            return Err(Error::Authorization(NOT_AUTHORIZED.to_string()));
        }
        Ok(interview)
    }

    /// Gatekeeper for the relay WebSocket: the connecting user must be a
    /// primary participant or hold a participant row.
    pub async fn authorize_session(
        &self,
        interview_id: Uuid,
        user_id: &str,
    ) -> Result<InterviewParticipant> {
        let interview = self.require_interview(interview_id).await?;
        match self.store.get_participant(interview_id, user_id).await? {
            Some(participant) => Ok(participant),
            None if interview.is_primary_participant(user_id) => {
                let role = if interview.client_id == user_id {
                    ParticipantRole::Client
                } else {
                    ParticipantRole::Developer
                };
                let mut participant =
                    InterviewParticipant::new(interview_id, user_id, user_id, role);
                participant.joined_at = Some(Utc::now());
                self.store.insert_participant(&participant).await?;
                Ok(participant)
            }
            None => Err(Error::Authorization(NOT_AUTHORIZED.to_string())),
        }
    }

    /// Marks stale scheduled interviews as no-shows: neither primary
    /// participant joined within the grace period after the scheduled
    /// start. Returns the number of interviews transitioned.
    pub async fn sweep_no_shows(&self, grace_minutes: i64) -> Result<u32> {
        let cutoff = Utc::now() - Duration::minutes(grace_minutes);
        let candidates = self.store.no_show_candidates(cutoff).await?;
        let mut marked = 0;

        for mut interview in candidates {
            let participants = self.store.list_participants(interview.id).await?;
            let primary_joined = participants.iter().any(|p| {
                p.joined_at.is_some() && interview.is_primary_participant(&p.user_id)
            });
            if primary_joined {
                continue;
            }
            if !interview.status.can_transition_to(InterviewStatus::NoShow) {
                continue;
            }
            interview.status = InterviewStatus::NoShow;
            interview.updated_at = Utc::now();
            self.store.update_interview(&interview).await?;
            tracing::info!(interview_id = %interview.id, "interview marked as no-show");
            marked += 1;
        }
        Ok(marked)
    }

    async fn require_interview(&self, interview_id: Uuid) -> Result<Interview> {
        self.store
            .get_interview(interview_id)
            .await?
            .ok_or_else(|| Error::NotFound("Interview not found".to_string()))
    }

    /// Fixes final_code from the live room if one exists, falling back to
    /// the persisted session text.
    async fn finalize_code_session(&self, interview_id: Uuid) -> Result<()> {
        let code = match self.rooms.get(interview_id).await {
            Some(room) => Some(room.current_code().await.0),
            None => self
                .store
                .get_code_session(interview_id)
                .await?
                .map(|s| s.code),
        };
        if let Some(code) = code {
            self.store.finalize_session(interview_id, &code).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::interview::InterviewType;
    use crate::services::execution_client::ExecutionClient;
    use crate::store::MemoryStore;

    fn service() -> (InterviewService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let execution = Arc::new(ExecutionClient::new(None, 30));
        let rooms = Arc::new(RoomRegistry::new(
            Arc::clone(&store) as Arc<dyn InterviewStore>,
            execution,
        ));
        let tokens = MediaTokenService::new(None, 3600);
        let service = InterviewService::new(
            Arc::clone(&store) as Arc<dyn InterviewStore>,
            tokens,
            rooms,
        );
        (service, store)
    }

    fn schedule_payload() -> ScheduleInterviewPayload {
        ScheduleInterviewPayload {
            client_id: "client-1".to_string(),
            developer_id: "dev-1".to_string(),
            project_id: None,
            title: "Technical screen".to_string(),
            description: None,
            agenda: None,
            interview_type: InterviewType::Technical,
            scheduled_at: Utc::now() + Duration::hours(1),
            duration_minutes: 60,
            timezone: None,
            client_name: None,
            developer_name: None,
        }
    }

    #[tokio::test]
    async fn leave_time_is_recorded_and_cleared_on_rejoin() {
        let (service, store) = service();
        let interview = service.schedule("client-1", schedule_payload()).await.unwrap();

        service
            .join(interview.id, "dev-1", JoinInterviewPayload::default())
            .await
            .unwrap();
        let joined = store
            .get_participant(interview.id, "dev-1")
            .await
            .unwrap()
            .unwrap();
        assert!(joined.joined_at.is_some());
        assert!(joined.left_at.is_none());

        service.mark_left(interview.id, "dev-1").await.unwrap();
        let left = store
            .get_participant(interview.id, "dev-1")
            .await
            .unwrap()
            .unwrap();
        assert!(left.left_at.is_some());

        // Rejoining clears the leave marker again.
        service
            .join(interview.id, "dev-1", JoinInterviewPayload::default())
            .await
            .unwrap();
        let rejoined = store
            .get_participant(interview.id, "dev-1")
            .await
            .unwrap()
            .unwrap();
        assert!(rejoined.left_at.is_none());
    }

    #[tokio::test]
    async fn mark_left_without_a_row_is_a_no_op() {
        let (service, _store) = service();
        let interview = service.schedule("client-1", schedule_payload()).await.unwrap();
        service.mark_left(interview.id, "ghost").await.unwrap();
    }

    #[tokio::test]
    async fn granted_observer_row_authorizes_join_and_session() {
        let (service, _store) = service();
        let interview = service.schedule("client-1", schedule_payload()).await.unwrap();

        // Strangers cannot invite.
        let denied = service
            .add_participant(
                interview.id,
                "stranger",
                AddParticipantPayload {
                    user_id: "observer-1".to_string(),
                    display_name: None,
                    role: ParticipantRole::Observer,
                },
            )
            .await;
        assert!(matches!(denied, Err(Error::Authorization(_))));

        let observer = service
            .add_participant(
                interview.id,
                "client-1",
                AddParticipantPayload {
                    user_id: "observer-1".to_string(),
                    display_name: Some("Silent Sam".to_string()),
                    role: ParticipantRole::Observer,
                },
            )
            .await
            .unwrap();
        assert_eq!(observer.role, ParticipantRole::Observer);
        assert!(!observer.capabilities.can_edit_code);

        // The row now authorizes both the REST join and the relay session.
        let joined = service
            .join(interview.id, "observer-1", JoinInterviewPayload::default())
            .await
            .unwrap();
        assert_eq!(joined.participants.len(), 3);
        service
            .authorize_session(interview.id, "observer-1")
            .await
            .unwrap();

        // Inviting the same user twice conflicts.
        let duplicate = service
            .add_participant(
                interview.id,
                "client-1",
                AddParticipantPayload {
                    user_id: "observer-1".to_string(),
                    display_name: None,
                    role: ParticipantRole::Panelist,
                },
            )
            .await;
        assert!(matches!(duplicate, Err(Error::Conflict(_))));
    }
}
