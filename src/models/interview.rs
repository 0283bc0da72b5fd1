use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl InterviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::NoShow => "no_show",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(Self::Scheduled),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "no_show" => Some(Self::NoShow),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::NoShow)
    }

    /// Allowed transitions: scheduled -> in_progress | cancelled | no_show,
    /// in_progress -> completed | cancelled. Terminal states accept nothing.
    pub fn can_transition_to(&self, next: InterviewStatus) -> bool {
        match (self, next) {
            (Self::Scheduled, Self::InProgress) => true,
            (Self::Scheduled, Self::Cancelled) => true,
            (Self::Scheduled, Self::NoShow) => true,
            (Self::InProgress, Self::Completed) => true,
            (Self::InProgress, Self::Cancelled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for InterviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewType {
    Behavioral,
    Technical,
    Mixed,
    CulturalFit,
}

impl InterviewType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Behavioral => "behavioral",
            Self::Technical => "technical",
            Self::Mixed => "mixed",
            Self::CulturalFit => "cultural_fit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "behavioral" => Some(Self::Behavioral),
            "technical" => Some(Self::Technical),
            "mixed" => Some(Self::Mixed),
            "cultural_fit" => Some(Self::CulturalFit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interview {
    pub id: Uuid,
    pub client_id: String,
    pub developer_id: String,
    pub project_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub agenda: Option<String>,
    pub interview_type: InterviewType,
    pub status: InterviewStatus,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub timezone: String,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub actual_duration_minutes: Option<i64>,
    pub recording_url: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Interview {
    pub fn scheduled_end(&self) -> DateTime<Utc> {
        self.scheduled_at + Duration::minutes(self.duration_minutes)
    }

    /// Client and developer are the primary participants; only they may
    /// cancel or drive status transitions.
    pub fn is_primary_participant(&self, user_id: &str) -> bool {
        self.client_id == user_id || self.developer_id == user_id
    }

    /// Half-open overlap check: windows that merely touch at a boundary do
    /// not conflict.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.scheduled_at < end && start < self.scheduled_end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_reject_all_transitions() {
        for terminal in [
            InterviewStatus::Completed,
            InterviewStatus::Cancelled,
            InterviewStatus::NoShow,
        ] {
            for next in [
                InterviewStatus::Scheduled,
                InterviewStatus::InProgress,
                InterviewStatus::Completed,
                InterviewStatus::Cancelled,
                InterviewStatus::NoShow,
            ] {
                assert!(
                    !terminal.can_transition_to(next),
                    "{} -> {} should be rejected",
                    terminal,
                    next
                );
            }
        }
    }

    #[test]
    fn happy_path_transitions_accepted() {
        assert!(InterviewStatus::Scheduled.can_transition_to(InterviewStatus::InProgress));
        assert!(InterviewStatus::InProgress.can_transition_to(InterviewStatus::Completed));
        assert!(InterviewStatus::Scheduled.can_transition_to(InterviewStatus::Cancelled));
        assert!(InterviewStatus::InProgress.can_transition_to(InterviewStatus::Cancelled));
        assert!(InterviewStatus::Scheduled.can_transition_to(InterviewStatus::NoShow));
        assert!(!InterviewStatus::Scheduled.can_transition_to(InterviewStatus::Completed));
        assert!(!InterviewStatus::InProgress.can_transition_to(InterviewStatus::NoShow));
    }

    #[test]
    fn touching_windows_do_not_overlap() {
        let start = Utc::now();
        let interview = Interview {
            id: Uuid::new_v4(),
            client_id: "client-1".into(),
            developer_id: "dev-1".into(),
            project_id: None,
            title: "t".into(),
            description: None,
            agenda: None,
            interview_type: InterviewType::Technical,
            status: InterviewStatus::Scheduled,
            scheduled_at: start,
            duration_minutes: 60,
            timezone: "UTC".into(),
            started_at: None,
            ended_at: None,
            actual_duration_minutes: None,
            recording_url: None,
            created_by: "client-1".into(),
            created_at: start,
            updated_at: start,
        };

        let end = interview.scheduled_end();
        assert!(!interview.overlaps(end, end + Duration::minutes(30)));
        assert!(interview.overlaps(start + Duration::minutes(30), start + Duration::minutes(90)));
        assert!(!interview.overlaps(start - Duration::minutes(30), start));
    }
}
