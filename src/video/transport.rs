use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackSource {
    Camera,
    Microphone,
    Screen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTrack {
    pub id: String,
    pub kind: TrackKind,
    pub source: TrackSource,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub id: String,
    pub kind: TrackKind,
    pub participant_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    Poor,
    Fair,
    Good,
    Excellent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionQuality {
    pub video: QualityLevel,
    pub audio: QualityLevel,
    pub network: QualityLevel,
}

impl Default for ConnectionQuality {
    fn default() -> Self {
        Self {
            video: QualityLevel::Good,
            audio: QualityLevel::Good,
            network: QualityLevel::Good,
        }
    }
}

/// Raw quality signal from the media transport. The manager classifies it;
/// it never computes quality itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionStats {
    pub video_packet_loss_pct: f32,
    pub audio_packet_loss_pct: f32,
    pub rtt_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandwidthProfile {
    Low,
    Standard,
    High,
}

#[derive(Debug, Clone, Copy)]
pub struct MediaConfig {
    pub audio: bool,
    pub video: bool,
    pub bandwidth: BandwidthProfile,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
            bandwidth: BandwidthProfile::Standard,
        }
    }
}

/// Events delivered by the media room, consumed as a channel: teardown is
/// "the channel closes", not handler unregistration.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    ParticipantConnected {
        participant_id: String,
        display_name: String,
    },
    ParticipantDisconnected {
        participant_id: String,
    },
    TrackSubscribed {
        participant_id: String,
        track: RemoteTrack,
    },
    TrackUnsubscribed {
        participant_id: String,
        track_id: String,
    },
    QualityChanged(ConnectionStats),
    /// Screen capture stopped outside our control (e.g. the browser's own
    /// "Stop sharing" button).
    ScreenShareEnded,
    Disconnected {
        reason: Option<String>,
    },
}

/// Seam to the media backend (room join, track publish/subscribe,
/// presence). The backend itself is an external collaborator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Joins the room; the returned receiver delivers room events until
    /// disconnect, when the channel closes.
    async fn connect(&mut self, token: &str, room_name: &str) -> Result<mpsc::Receiver<RoomEvent>>;
    async fn acquire_track(&mut self, kind: TrackKind, source: TrackSource) -> Result<LocalTrack>;
    async fn publish_track(&mut self, track: &LocalTrack) -> Result<()>;
    async fn unpublish_track(&mut self, track_id: &str) -> Result<()>;
    async fn set_track_enabled(&mut self, track_id: &str, enabled: bool) -> Result<()>;
    async fn disconnect(&mut self) -> Result<()>;
}
