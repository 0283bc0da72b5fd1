use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Client,
    Developer,
    Interviewer,
    Observer,
    NoteTaker,
    Panelist,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Developer => "developer",
            Self::Interviewer => "interviewer",
            Self::Observer => "observer",
            Self::NoteTaker => "note_taker",
            Self::Panelist => "panelist",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "client" => Some(Self::Client),
            "developer" => Some(Self::Developer),
            "interviewer" => Some(Self::Interviewer),
            "observer" => Some(Self::Observer),
            "note_taker" => Some(Self::NoteTaker),
            "panelist" => Some(Self::Panelist),
            _ => None,
        }
    }

    /// Default capability set for a role. Observers and note-takers watch;
    /// everyone else gets the full set.
    pub fn default_capabilities(&self) -> ParticipantCapabilities {
        match self {
            Self::Observer | Self::NoteTaker => ParticipantCapabilities {
                can_speak: false,
                can_share_screen: false,
                can_edit_code: false,
            },
            _ => ParticipantCapabilities {
                can_speak: true,
                can_share_screen: true,
                can_edit_code: true,
            },
        }
    }
}

impl std::fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantCapabilities {
    pub can_speak: bool,
    pub can_share_screen: bool,
    pub can_edit_code: bool,
}

/// One row per (interview, user) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewParticipant {
    pub id: Uuid,
    pub interview_id: Uuid,
    pub user_id: String,
    pub display_name: String,
    pub role: ParticipantRole,
    pub capabilities: ParticipantCapabilities,
    pub joined_at: Option<DateTime<Utc>>,
    pub left_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl InterviewParticipant {
    pub fn new(interview_id: Uuid, user_id: &str, display_name: &str, role: ParticipantRole) -> Self {
        Self {
            id: Uuid::new_v4(),
            interview_id,
            user_id: user_id.to_string(),
            display_name: display_name.to_string(),
            role,
            capabilities: role.default_capabilities(),
            joined_at: None,
            left_at: None,
            created_at: Utc::now(),
        }
    }
}
