use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::code_session::{CodeEditorSession, CodeSnapshot, ExecutionResult};
use crate::models::evaluation::{InterviewEvaluation, InterviewNote};
use crate::models::interview::{Interview, InterviewStatus, InterviewType};
use crate::models::participant::{
    InterviewParticipant, ParticipantCapabilities, ParticipantRole,
};
use crate::store::{InterviewFilter, InterviewStore};

/// Postgres-backed store. Uses the runtime query API so the crate builds
/// without a live database.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(50)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| Error::Internal(format!("Migration failed: {}", e)))?;
        Ok(Self { pool })
    }
}

#[derive(Debug, FromRow)]
struct InterviewRow {
    id: Uuid,
    client_id: String,
    developer_id: String,
    project_id: Option<Uuid>,
    title: String,
    description: Option<String>,
    agenda: Option<String>,
    interview_type: String,
    status: String,
    scheduled_at: DateTime<Utc>,
    duration_minutes: i64,
    timezone: String,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    actual_duration_minutes: Option<i64>,
    recording_url: Option<String>,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InterviewRow> for Interview {
    type Error = Error;

    fn try_from(row: InterviewRow) -> Result<Self> {
        Ok(Interview {
            id: row.id,
            client_id: row.client_id,
            developer_id: row.developer_id,
            project_id: row.project_id,
            title: row.title,
            description: row.description,
            agenda: row.agenda,
            interview_type: InterviewType::from_str(&row.interview_type).ok_or_else(|| {
                Error::Internal(format!("Unknown interview type: {}", row.interview_type))
            })?,
            status: InterviewStatus::from_str(&row.status)
                .ok_or_else(|| Error::Internal(format!("Unknown status: {}", row.status)))?,
            scheduled_at: row.scheduled_at,
            duration_minutes: row.duration_minutes,
            timezone: row.timezone,
            started_at: row.started_at,
            ended_at: row.ended_at,
            actual_duration_minutes: row.actual_duration_minutes,
            recording_url: row.recording_url,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ParticipantRow {
    id: Uuid,
    interview_id: Uuid,
    user_id: String,
    display_name: String,
    role: String,
    can_speak: bool,
    can_share_screen: bool,
    can_edit_code: bool,
    joined_at: Option<DateTime<Utc>>,
    left_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ParticipantRow> for InterviewParticipant {
    type Error = Error;

    fn try_from(row: ParticipantRow) -> Result<Self> {
        Ok(InterviewParticipant {
            id: row.id,
            interview_id: row.interview_id,
            user_id: row.user_id,
            display_name: row.display_name,
            role: ParticipantRole::from_str(&row.role)
                .ok_or_else(|| Error::Internal(format!("Unknown role: {}", row.role)))?,
            capabilities: ParticipantCapabilities {
                can_speak: row.can_speak,
                can_share_screen: row.can_share_screen,
                can_edit_code: row.can_edit_code,
            },
            joined_at: row.joined_at,
            left_at: row.left_at,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SessionRow {
    id: Uuid,
    interview_id: Uuid,
    language: String,
    theme: String,
    code: String,
    final_code: Option<String>,
    snapshots: JsonValue,
    execution_history: JsonValue,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for CodeEditorSession {
    type Error = Error;

    fn try_from(row: SessionRow) -> Result<Self> {
        let snapshots: Vec<CodeSnapshot> = serde_json::from_value(row.snapshots)?;
        let execution_history: Vec<ExecutionResult> =
            serde_json::from_value(row.execution_history)?;
        Ok(CodeEditorSession {
            id: row.id,
            interview_id: row.interview_id,
            language: row.language,
            theme: row.theme,
            code: row.code,
            final_code: row.final_code,
            snapshots,
            execution_history,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct EvaluationRow {
    id: Uuid,
    interview_id: Uuid,
    evaluator_id: String,
    overall_rating: i16,
    technical_rating: i16,
    communication_rating: i16,
    problem_solving_rating: i16,
    cultural_fit_rating: i16,
    code_quality_rating: i16,
    feedback: Option<String>,
    recommend_hire: bool,
    skills_assessment: JsonValue,
    submitted_at: DateTime<Utc>,
}

impl From<EvaluationRow> for InterviewEvaluation {
    fn from(row: EvaluationRow) -> Self {
        InterviewEvaluation {
            id: row.id,
            interview_id: row.interview_id,
            evaluator_id: row.evaluator_id,
            overall_rating: row.overall_rating,
            technical_rating: row.technical_rating,
            communication_rating: row.communication_rating,
            problem_solving_rating: row.problem_solving_rating,
            cultural_fit_rating: row.cultural_fit_rating,
            code_quality_rating: row.code_quality_rating,
            feedback: row.feedback,
            recommend_hire: row.recommend_hire,
            skills_assessment: row.skills_assessment,
            submitted_at: row.submitted_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct NoteRow {
    id: Uuid,
    interview_id: Uuid,
    author_id: String,
    content: String,
    is_private: bool,
    is_flagged: bool,
    created_at: DateTime<Utc>,
}

impl From<NoteRow> for InterviewNote {
    fn from(row: NoteRow) -> Self {
        InterviewNote {
            id: row.id,
            interview_id: row.interview_id,
            author_id: row.author_id,
            content: row.content,
            is_private: row.is_private,
            is_flagged: row.is_flagged,
            created_at: row.created_at,
        }
    }
}

const INTERVIEW_COLUMNS: &str = "id, client_id, developer_id, project_id, title, description, agenda, interview_type, status, scheduled_at, duration_minutes, timezone, started_at, ended_at, actual_duration_minutes, recording_url, created_by, created_at, updated_at";

/// Two requests racing the same pre-check can both reach the insert; the
/// unique index decides.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl InterviewStore for PgStore {
    async fn create_interview(
        &self,
        interview: &Interview,
        participants: &[InterviewParticipant],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO interviews (id, client_id, developer_id, project_id, title, description, agenda,
                interview_type, status, scheduled_at, duration_minutes, timezone, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(interview.id)
        .bind(&interview.client_id)
        .bind(&interview.developer_id)
        .bind(interview.project_id)
        .bind(&interview.title)
        .bind(&interview.description)
        .bind(&interview.agenda)
        .bind(interview.interview_type.as_str())
        .bind(interview.status.as_str())
        .bind(interview.scheduled_at)
        .bind(interview.duration_minutes)
        .bind(&interview.timezone)
        .bind(&interview.created_by)
        .bind(interview.created_at)
        .bind(interview.updated_at)
        .execute(&mut *tx)
        .await?;

        for participant in participants {
            sqlx::query(
                r#"
                INSERT INTO interview_participants (id, interview_id, user_id, display_name, role,
                    can_speak, can_share_screen, can_edit_code, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(participant.id)
            .bind(participant.interview_id)
            .bind(&participant.user_id)
            .bind(&participant.display_name)
            .bind(participant.role.as_str())
            .bind(participant.capabilities.can_speak)
            .bind(participant.capabilities.can_share_screen)
            .bind(participant.capabilities.can_edit_code)
            .bind(participant.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_interview(&self, id: Uuid) -> Result<Option<Interview>> {
        let row = sqlx::query_as::<_, InterviewRow>(&format!(
            "SELECT {} FROM interviews WHERE id = $1",
            INTERVIEW_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Interview::try_from).transpose()
    }

    async fn update_interview(&self, interview: &Interview) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE interviews
            SET status = $2, started_at = $3, ended_at = $4, actual_duration_minutes = $5,
                recording_url = $6, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(interview.id)
        .bind(interview.status.as_str())
        .bind(interview.started_at)
        .bind(interview.ended_at)
        .bind(interview.actual_duration_minutes)
        .bind(&interview.recording_url)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound("Interview not found".to_string()));
        }
        Ok(())
    }

    async fn list_interviews(
        &self,
        user_id: &str,
        filter: &InterviewFilter,
    ) -> Result<Vec<Interview>> {
        let (offset, limit) = filter.page_bounds();
        let rows = sqlx::query_as::<_, InterviewRow>(&format!(
            r#"
            SELECT {}
            FROM interviews
            WHERE (client_id = $1 OR developer_id = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL OR interview_type = $3)
              AND ($4::timestamptz IS NULL OR scheduled_at >= $4)
              AND ($5::timestamptz IS NULL OR scheduled_at <= $5)
            ORDER BY scheduled_at
            LIMIT $6 OFFSET $7
            "#,
            INTERVIEW_COLUMNS
        ))
        .bind(user_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.interview_type.map(|t| t.as_str()))
        .bind(filter.from)
        .bind(filter.to)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Interview::try_from).collect()
    }

    async fn find_overlap(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<Interview>> {
        let row = sqlx::query_as::<_, InterviewRow>(&format!(
            r#"
            SELECT {}
            FROM interviews
            WHERE (client_id = $1 OR developer_id = $1)
              AND status NOT IN ('completed', 'cancelled', 'no_show')
              AND scheduled_at < $3
              AND scheduled_at + make_interval(mins => duration_minutes::int) > $2
            LIMIT 1
            "#,
            INTERVIEW_COLUMNS
        ))
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Interview::try_from).transpose()
    }

    async fn insert_participant(&self, participant: &InterviewParticipant) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO interview_participants (id, interview_id, user_id, display_name, role,
                can_speak, can_share_screen, can_edit_code, joined_at, left_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(participant.id)
        .bind(participant.interview_id)
        .bind(&participant.user_id)
        .bind(&participant.display_name)
        .bind(participant.role.as_str())
        .bind(participant.capabilities.can_speak)
        .bind(participant.capabilities.can_share_screen)
        .bind(participant.capabilities.can_edit_code)
        .bind(participant.joined_at)
        .bind(participant.left_at)
        .bind(participant.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict("User is already a participant of this interview".to_string())
            } else {
                Error::from(e)
            }
        })?;
        Ok(())
    }

    async fn get_participant(
        &self,
        interview_id: Uuid,
        user_id: &str,
    ) -> Result<Option<InterviewParticipant>> {
        let row = sqlx::query_as::<_, ParticipantRow>(
            "SELECT * FROM interview_participants WHERE interview_id = $1 AND user_id = $2",
        )
        .bind(interview_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(InterviewParticipant::try_from).transpose()
    }

    async fn list_participants(&self, interview_id: Uuid) -> Result<Vec<InterviewParticipant>> {
        let rows = sqlx::query_as::<_, ParticipantRow>(
            "SELECT * FROM interview_participants WHERE interview_id = $1 ORDER BY created_at",
        )
        .bind(interview_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(InterviewParticipant::try_from).collect()
    }

    async fn update_participant(&self, participant: &InterviewParticipant) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE interview_participants
            SET role = $2, can_speak = $3, can_share_screen = $4, can_edit_code = $5,
                joined_at = $6, left_at = $7
            WHERE id = $1
            "#,
        )
        .bind(participant.id)
        .bind(participant.role.as_str())
        .bind(participant.capabilities.can_speak)
        .bind(participant.capabilities.can_share_screen)
        .bind(participant.capabilities.can_edit_code)
        .bind(participant.joined_at)
        .bind(participant.left_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound("Participant not found".to_string()));
        }
        Ok(())
    }

    async fn get_code_session(&self, interview_id: Uuid) -> Result<Option<CodeEditorSession>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT * FROM code_editor_sessions WHERE interview_id = $1",
        )
        .bind(interview_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(CodeEditorSession::try_from).transpose()
    }

    async fn get_or_create_code_session(&self, interview_id: Uuid) -> Result<CodeEditorSession> {
        if let Some(session) = self.get_code_session(interview_id).await? {
            return Ok(session);
        }
        let session = CodeEditorSession::new(interview_id);
        sqlx::query(
            r#"
            INSERT INTO code_editor_sessions (id, interview_id, language, theme, code, snapshots,
                execution_history, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, '[]'::jsonb, '[]'::jsonb, $6, $7)
            ON CONFLICT (interview_id) DO NOTHING
            "#,
        )
        .bind(session.id)
        .bind(session.interview_id)
        .bind(&session.language)
        .bind(&session.theme)
        .bind(&session.code)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await?;
        // Re-read in case a concurrent join won the insert race.
        self.get_code_session(interview_id)
            .await?
            .ok_or_else(|| Error::Internal("Code session creation raced a delete".to_string()))
    }

    async fn update_session_code(
        &self,
        interview_id: Uuid,
        code: &str,
        language: &str,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE code_editor_sessions
            SET code = $2, language = $3, updated_at = NOW()
            WHERE interview_id = $1 AND final_code IS NULL
            "#,
        )
        .bind(interview_id)
        .bind(code)
        .bind(language)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::BadRequest(
                "Code session is finalized or missing".to_string(),
            ));
        }
        Ok(())
    }

    async fn append_snapshot(
        &self,
        interview_id: Uuid,
        language: &str,
        code: &str,
        reason: &str,
    ) -> Result<()> {
        let snapshot = serde_json::to_value(CodeSnapshot {
            taken_at: Utc::now(),
            language: language.to_string(),
            code: code.to_string(),
            reason: reason.to_string(),
        })?;
        sqlx::query(
            r#"
            UPDATE code_editor_sessions
            SET snapshots = snapshots || $2::jsonb, updated_at = NOW()
            WHERE interview_id = $1
            "#,
        )
        .bind(interview_id)
        .bind(snapshot)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_execution(&self, interview_id: Uuid, result: &ExecutionResult) -> Result<()> {
        let entry = serde_json::to_value(result)?;
        sqlx::query(
            r#"
            UPDATE code_editor_sessions
            SET execution_history = execution_history || $2::jsonb, updated_at = NOW()
            WHERE interview_id = $1
            "#,
        )
        .bind(interview_id)
        .bind(entry)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn finalize_session(&self, interview_id: Uuid, final_code: &str) -> Result<()> {
        let language = self
            .get_code_session(interview_id)
            .await?
            .map(|s| s.language)
            .unwrap_or_default();
        let snapshot = serde_json::to_value(CodeSnapshot {
            taken_at: Utc::now(),
            language,
            code: final_code.to_string(),
            reason: "interview_end".to_string(),
        })?;
        sqlx::query(
            r#"
            UPDATE code_editor_sessions
            SET final_code = $2, snapshots = snapshots || $3::jsonb, updated_at = NOW()
            WHERE interview_id = $1 AND final_code IS NULL
            "#,
        )
        .bind(interview_id)
        .bind(final_code)
        .bind(snapshot)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_evaluation(&self, evaluation: &InterviewEvaluation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO interview_evaluations (id, interview_id, evaluator_id, overall_rating,
                technical_rating, communication_rating, problem_solving_rating, cultural_fit_rating,
                code_quality_rating, feedback, recommend_hire, skills_assessment, submitted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(evaluation.id)
        .bind(evaluation.interview_id)
        .bind(&evaluation.evaluator_id)
        .bind(evaluation.overall_rating)
        .bind(evaluation.technical_rating)
        .bind(evaluation.communication_rating)
        .bind(evaluation.problem_solving_rating)
        .bind(evaluation.cultural_fit_rating)
        .bind(evaluation.code_quality_rating)
        .bind(&evaluation.feedback)
        .bind(evaluation.recommend_hire)
        .bind(&evaluation.skills_assessment)
        .bind(evaluation.submitted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict(
                    "An evaluation for this interview has already been submitted".to_string(),
                )
            } else {
                Error::from(e)
            }
        })?;
        Ok(())
    }

    async fn get_evaluation(
        &self,
        interview_id: Uuid,
        evaluator_id: &str,
    ) -> Result<Option<InterviewEvaluation>> {
        let row = sqlx::query_as::<_, EvaluationRow>(
            "SELECT * FROM interview_evaluations WHERE interview_id = $1 AND evaluator_id = $2",
        )
        .bind(interview_id)
        .bind(evaluator_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(InterviewEvaluation::from))
    }

    async fn list_evaluations(&self, interview_id: Uuid) -> Result<Vec<InterviewEvaluation>> {
        let rows = sqlx::query_as::<_, EvaluationRow>(
            "SELECT * FROM interview_evaluations WHERE interview_id = $1 ORDER BY submitted_at",
        )
        .bind(interview_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(InterviewEvaluation::from).collect())
    }

    async fn insert_note(&self, note: &InterviewNote) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO interview_notes (id, interview_id, author_id, content, is_private, is_flagged, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(note.id)
        .bind(note.interview_id)
        .bind(&note.author_id)
        .bind(&note.content)
        .bind(note.is_private)
        .bind(note.is_flagged)
        .bind(note.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_notes(&self, interview_id: Uuid) -> Result<Vec<InterviewNote>> {
        let rows = sqlx::query_as::<_, NoteRow>(
            "SELECT * FROM interview_notes WHERE interview_id = $1 ORDER BY created_at",
        )
        .bind(interview_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(InterviewNote::from).collect())
    }

    async fn no_show_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<Interview>> {
        let rows = sqlx::query_as::<_, InterviewRow>(&format!(
            "SELECT {} FROM interviews WHERE status = 'scheduled' AND scheduled_at <= $1",
            INTERVIEW_COLUMNS
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Interview::try_from).collect()
    }
}
