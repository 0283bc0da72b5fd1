use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::code_session::{CodeEditorSession, CodeSnapshot, ExecutionResult};
use crate::models::evaluation::{InterviewEvaluation, InterviewNote};
use crate::models::interview::{Interview, InterviewStatus};
use crate::models::participant::InterviewParticipant;
use crate::store::{InterviewFilter, InterviewStore};

#[derive(Default)]
struct Inner {
    interviews: HashMap<Uuid, Interview>,
    participants: HashMap<Uuid, Vec<InterviewParticipant>>,
    sessions: HashMap<Uuid, CodeEditorSession>,
    evaluations: HashMap<Uuid, Vec<InterviewEvaluation>>,
    notes: HashMap<Uuid, Vec<InterviewNote>>,
}

/// In-memory store. Used by the test suite and as the fallback when no
/// DATABASE_URL is configured.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InterviewStore for MemoryStore {
    async fn create_interview(
        &self,
        interview: &Interview,
        participants: &[InterviewParticipant],
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.interviews.insert(interview.id, interview.clone());
        inner
            .participants
            .insert(interview.id, participants.to_vec());
        Ok(())
    }

    async fn get_interview(&self, id: Uuid) -> Result<Option<Interview>> {
        Ok(self.inner.read().await.interviews.get(&id).cloned())
    }

    async fn update_interview(&self, interview: &Interview) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.interviews.contains_key(&interview.id) {
            return Err(Error::NotFound("Interview not found".to_string()));
        }
        inner.interviews.insert(interview.id, interview.clone());
        Ok(())
    }

    async fn list_interviews(
        &self,
        user_id: &str,
        filter: &InterviewFilter,
    ) -> Result<Vec<Interview>> {
        let inner = self.inner.read().await;
        let mut matching: Vec<Interview> = inner
            .interviews
            .values()
            .filter(|i| i.is_primary_participant(user_id))
            .filter(|i| filter.status.map_or(true, |s| i.status == s))
            .filter(|i| filter.interview_type.map_or(true, |t| i.interview_type == t))
            .filter(|i| filter.from.map_or(true, |from| i.scheduled_at >= from))
            .filter(|i| filter.to.map_or(true, |to| i.scheduled_at <= to))
            .cloned()
            .collect();
        matching.sort_by_key(|i| i.scheduled_at);

        let (offset, limit) = filter.page_bounds();
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }

    async fn find_overlap(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<Interview>> {
        let inner = self.inner.read().await;
        Ok(inner
            .interviews
            .values()
            .find(|i| {
                i.is_primary_participant(user_id)
                    && !i.status.is_terminal()
                    && i.overlaps(start, end)
            })
            .cloned())
    }

    async fn insert_participant(&self, participant: &InterviewParticipant) -> Result<()> {
        let mut inner = self.inner.write().await;
        let participants = inner
            .participants
            .entry(participant.interview_id)
            .or_default();
        // Mirrors the unique (interview_id, user_id) index of the Pg store.
        if participants.iter().any(|p| p.user_id == participant.user_id) {
            return Err(Error::Conflict(
                "User is already a participant of this interview".to_string(),
            ));
        }
        participants.push(participant.clone());
        Ok(())
    }

    async fn get_participant(
        &self,
        interview_id: Uuid,
        user_id: &str,
    ) -> Result<Option<InterviewParticipant>> {
        let inner = self.inner.read().await;
        Ok(inner
            .participants
            .get(&interview_id)
            .and_then(|ps| ps.iter().find(|p| p.user_id == user_id))
            .cloned())
    }

    async fn list_participants(&self, interview_id: Uuid) -> Result<Vec<InterviewParticipant>> {
        let inner = self.inner.read().await;
        Ok(inner
            .participants
            .get(&interview_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_participant(&self, participant: &InterviewParticipant) -> Result<()> {
        let mut inner = self.inner.write().await;
        let participants = inner
            .participants
            .get_mut(&participant.interview_id)
            .ok_or_else(|| Error::NotFound("Interview not found".to_string()))?;
        let slot = participants
            .iter_mut()
            .find(|p| p.id == participant.id)
            .ok_or_else(|| Error::NotFound("Participant not found".to_string()))?;
        *slot = participant.clone();
        Ok(())
    }

    async fn get_code_session(&self, interview_id: Uuid) -> Result<Option<CodeEditorSession>> {
        Ok(self.inner.read().await.sessions.get(&interview_id).cloned())
    }

    async fn get_or_create_code_session(&self, interview_id: Uuid) -> Result<CodeEditorSession> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .sessions
            .entry(interview_id)
            .or_insert_with(|| CodeEditorSession::new(interview_id))
            .clone())
    }

    async fn update_session_code(
        &self,
        interview_id: Uuid,
        code: &str,
        language: &str,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let session = inner
            .sessions
            .get_mut(&interview_id)
            .ok_or_else(|| Error::NotFound("Code session not found".to_string()))?;
        if session.is_finalized() {
            return Err(Error::BadRequest(
                "Code session is finalized".to_string(),
            ));
        }
        session.code = code.to_string();
        session.language = language.to_string();
        session.updated_at = Utc::now();
        Ok(())
    }

    async fn append_snapshot(
        &self,
        interview_id: Uuid,
        language: &str,
        code: &str,
        reason: &str,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let session = inner
            .sessions
            .get_mut(&interview_id)
            .ok_or_else(|| Error::NotFound("Code session not found".to_string()))?;
        session.snapshots.push(CodeSnapshot {
            taken_at: Utc::now(),
            language: language.to_string(),
            code: code.to_string(),
            reason: reason.to_string(),
        });
        session.updated_at = Utc::now();
        Ok(())
    }

    async fn append_execution(&self, interview_id: Uuid, result: &ExecutionResult) -> Result<()> {
        let mut inner = self.inner.write().await;
        let session = inner
            .sessions
            .get_mut(&interview_id)
            .ok_or_else(|| Error::NotFound("Code session not found".to_string()))?;
        session.execution_history.push(result.clone());
        session.updated_at = Utc::now();
        Ok(())
    }

    async fn finalize_session(&self, interview_id: Uuid, final_code: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let session = inner
            .sessions
            .get_mut(&interview_id)
            .ok_or_else(|| Error::NotFound("Code session not found".to_string()))?;
        if session.final_code.is_none() {
            session.final_code = Some(final_code.to_string());
            session.snapshots.push(CodeSnapshot {
                taken_at: Utc::now(),
                language: session.language.clone(),
                code: final_code.to_string(),
                reason: "interview_end".to_string(),
            });
            session.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn insert_evaluation(&self, evaluation: &InterviewEvaluation) -> Result<()> {
        let mut inner = self.inner.write().await;
        let evaluations = inner
            .evaluations
            .entry(evaluation.interview_id)
            .or_default();
        if evaluations
            .iter()
            .any(|e| e.evaluator_id == evaluation.evaluator_id)
        {
            return Err(Error::Conflict(
                "An evaluation for this interview has already been submitted".to_string(),
            ));
        }
        evaluations.push(evaluation.clone());
        Ok(())
    }

    async fn get_evaluation(
        &self,
        interview_id: Uuid,
        evaluator_id: &str,
    ) -> Result<Option<InterviewEvaluation>> {
        let inner = self.inner.read().await;
        Ok(inner
            .evaluations
            .get(&interview_id)
            .and_then(|es| es.iter().find(|e| e.evaluator_id == evaluator_id))
            .cloned())
    }

    async fn list_evaluations(&self, interview_id: Uuid) -> Result<Vec<InterviewEvaluation>> {
        let inner = self.inner.read().await;
        Ok(inner
            .evaluations
            .get(&interview_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_note(&self, note: &InterviewNote) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .notes
            .entry(note.interview_id)
            .or_default()
            .push(note.clone());
        Ok(())
    }

    async fn list_notes(&self, interview_id: Uuid) -> Result<Vec<InterviewNote>> {
        let inner = self.inner.read().await;
        Ok(inner.notes.get(&interview_id).cloned().unwrap_or_default())
    }

    async fn no_show_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<Interview>> {
        let inner = self.inner.read().await;
        Ok(inner
            .interviews
            .values()
            .filter(|i| i.status == InterviewStatus::Scheduled && i.scheduled_at <= cutoff)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::participant::ParticipantRole;

    fn evaluation(interview_id: Uuid, evaluator_id: &str) -> InterviewEvaluation {
        InterviewEvaluation {
            id: Uuid::new_v4(),
            interview_id,
            evaluator_id: evaluator_id.to_string(),
            overall_rating: 4,
            technical_rating: 4,
            communication_rating: 4,
            problem_solving_rating: 4,
            cultural_fit_rating: 4,
            code_quality_rating: 4,
            feedback: None,
            recommend_hire: true,
            skills_assessment: serde_json::Value::Null,
            submitted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn second_evaluation_by_same_evaluator_conflicts_at_insert() {
        let store = MemoryStore::new();
        let interview_id = Uuid::new_v4();

        store
            .insert_evaluation(&evaluation(interview_id, "client-1"))
            .await
            .unwrap();
        store
            .insert_evaluation(&evaluation(interview_id, "dev-1"))
            .await
            .unwrap();

        let duplicate = store
            .insert_evaluation(&evaluation(interview_id, "client-1"))
            .await;
        assert!(matches!(duplicate, Err(Error::Conflict(_))));
        assert_eq!(store.list_evaluations(interview_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn second_participant_row_for_same_user_conflicts_at_insert() {
        let store = MemoryStore::new();
        let interview_id = Uuid::new_v4();

        store
            .insert_participant(&InterviewParticipant::new(
                interview_id,
                "observer-1",
                "Sam",
                ParticipantRole::Observer,
            ))
            .await
            .unwrap();

        let duplicate = store
            .insert_participant(&InterviewParticipant::new(
                interview_id,
                "observer-1",
                "Sam",
                ParticipantRole::Panelist,
            ))
            .await;
        assert!(matches!(duplicate, Err(Error::Conflict(_))));
        assert_eq!(store.list_participants(interview_id).await.unwrap().len(), 1);
    }
}
