use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::video::transport::{
    ConnectionQuality, ConnectionStats, LocalTrack, MediaConfig, MediaTransport, QualityLevel,
    RemoteTrack, RoomEvent, TrackKind, TrackSource,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Disconnected,
    Connected,
}

#[derive(Debug, Clone, Default)]
pub struct RemoteParticipant {
    pub display_name: String,
    pub tracks: Vec<RemoteTrack>,
}

/// Manages one peer's membership in a media room: local track acquisition,
/// remote track bookkeeping, screen-share substitution and coarse quality
/// classification. Reconnection policy is the caller's, not ours.
pub struct VideoSessionManager {
    transport: Box<dyn MediaTransport>,
    state: ConnectionState,
    microphone: Option<LocalTrack>,
    camera: Option<LocalTrack>,
    screen: Option<LocalTrack>,
    remote: HashMap<String, RemoteParticipant>,
    quality: ConnectionQuality,
    events: Option<mpsc::Receiver<RoomEvent>>,
}

impl VideoSessionManager {
    pub fn new(transport: Box<dyn MediaTransport>) -> Self {
        Self {
            transport,
            state: ConnectionState::Disconnected,
            microphone: None,
            camera: None,
            screen: None,
            remote: HashMap::new(),
            quality: ConnectionQuality::default(),
            events: None,
        }
    }

    /// Acquires local tracks per config, joins the room and starts
    /// receiving room events. On any failure the manager is left fully
    /// disconnected, never half-connected.
    pub async fn connect(
        &mut self,
        token: &str,
        room_name: &str,
        config: MediaConfig,
    ) -> Result<()> {
        if self.state == ConnectionState::Connected {
            return Err(Error::VideoConnection(
                "Already connected to a media room".to_string(),
            ));
        }

        let result = self.try_connect(token, room_name, config).await;
        if result.is_err() {
            self.release_local_tracks();
            self.events = None;
            self.state = ConnectionState::Disconnected;
        }
        result
    }

    async fn try_connect(
        &mut self,
        token: &str,
        room_name: &str,
        config: MediaConfig,
    ) -> Result<()> {
        if config.audio {
            let track = self
                .transport
                .acquire_track(TrackKind::Audio, TrackSource::Microphone)
                .await?;
            self.transport.publish_track(&track).await?;
            self.microphone = Some(track);
        }
        if config.video {
            let track = self
                .transport
                .acquire_track(TrackKind::Video, TrackSource::Camera)
                .await?;
            self.transport.publish_track(&track).await?;
            self.camera = Some(track);
        }

        let events = self.transport.connect(token, room_name).await?;
        self.events = Some(events);
        self.state = ConnectionState::Connected;
        tracing::info!(room_name, "connected to media room");
        Ok(())
    }

    /// Next room event, with internal bookkeeping applied before it is
    /// handed to the caller. Returns `None` once the room channel closes.
    pub async fn next_event(&mut self) -> Option<RoomEvent> {
        let event = match self.events.as_mut() {
            Some(rx) => rx.recv().await?,
            None => return None,
        };

        match &event {
            RoomEvent::ParticipantConnected {
                participant_id,
                display_name,
            } => {
                self.remote.insert(
                    participant_id.clone(),
                    RemoteParticipant {
                        display_name: display_name.clone(),
                        tracks: Vec::new(),
                    },
                );
            }
            RoomEvent::ParticipantDisconnected { participant_id } => {
                self.remote.remove(participant_id);
            }
            RoomEvent::TrackSubscribed {
                participant_id,
                track,
            } => {
                self.remote
                    .entry(participant_id.clone())
                    .or_default()
                    .tracks
                    .push(track.clone());
            }
            RoomEvent::TrackUnsubscribed {
                participant_id,
                track_id,
            } => {
                if let Some(participant) = self.remote.get_mut(participant_id) {
                    participant.tracks.retain(|t| t.id != *track_id);
                }
            }
            RoomEvent::QualityChanged(stats) => {
                self.quality = classify(*stats);
            }
            RoomEvent::ScreenShareEnded => {
                // Externally-triggered stop: fall back to the camera.
                if let Err(e) = self.stop_screen_share().await {
                    tracing::warn!(error = %e, "failed to restore camera after screen share ended");
                }
            }
            RoomEvent::Disconnected { reason } => {
                tracing::warn!(?reason, "media room dropped the connection");
                self.release_local_tracks();
                self.events = None;
                self.state = ConnectionState::Disconnected;
            }
        }
        Some(event)
    }

    /// Flips the microphone's enabled flag; returns the new state.
    pub async fn toggle_audio(&mut self) -> Result<bool> {
        let track = self
            .microphone
            .as_mut()
            .ok_or_else(|| Error::VideoConnection("No local audio track".to_string()))?;
        track.enabled = !track.enabled;
        let enabled = track.enabled;
        let track_id = track.id.clone();
        self.transport.set_track_enabled(&track_id, enabled).await?;
        Ok(enabled)
    }

    /// Flips the camera's enabled flag; returns the new state.
    pub async fn toggle_video(&mut self) -> Result<bool> {
        let track = self
            .camera
            .as_mut()
            .ok_or_else(|| Error::VideoConnection("No local video track".to_string()))?;
        track.enabled = !track.enabled;
        let enabled = track.enabled;
        let track_id = track.id.clone();
        self.transport.set_track_enabled(&track_id, enabled).await?;
        Ok(enabled)
    }

    /// Replaces the camera track with a captured display surface.
    pub async fn start_screen_share(&mut self) -> Result<()> {
        if self.state != ConnectionState::Connected {
            return Err(Error::VideoConnection(
                "Not connected to a media room".to_string(),
            ));
        }
        if self.screen.is_some() {
            return Ok(());
        }

        let track = self
            .transport
            .acquire_track(TrackKind::Video, TrackSource::Screen)
            .await?;
        if let Some(camera) = &self.camera {
            self.transport.unpublish_track(&camera.id).await?;
        }
        self.transport.publish_track(&track).await?;
        self.screen = Some(track);
        Ok(())
    }

    /// Stops sharing and restores the camera track. No-op when no share is
    /// active.
    pub async fn stop_screen_share(&mut self) -> Result<()> {
        let screen = match self.screen.take() {
            Some(screen) => screen,
            None => return Ok(()),
        };
        self.transport.unpublish_track(&screen.id).await?;
        if let Some(camera) = self.camera.clone() {
            self.transport.publish_track(&camera).await?;
        }
        Ok(())
    }

    /// Tears down the room connection, releases all local tracks and closes
    /// the event channel. Safe to call any number of times.
    pub async fn disconnect(&mut self) -> Result<()> {
        if self.state == ConnectionState::Disconnected {
            return Ok(());
        }
        self.transport.disconnect().await?;
        self.release_local_tracks();
        self.remote.clear();
        self.events = None;
        self.state = ConnectionState::Disconnected;
        tracing::info!("disconnected from media room");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn is_screen_sharing(&self) -> bool {
        self.screen.is_some()
    }

    pub fn active_local_tracks(&self) -> usize {
        [&self.microphone, &self.camera, &self.screen]
            .iter()
            .filter(|t| t.is_some())
            .count()
    }

    pub fn remote_participants(&self) -> &HashMap<String, RemoteParticipant> {
        &self.remote
    }

    pub fn connection_quality(&self) -> ConnectionQuality {
        self.quality
    }

    fn release_local_tracks(&mut self) {
        self.microphone = None;
        self.camera = None;
        self.screen = None;
    }
}

/// Coarse classification of the transport's raw quality signal.
fn classify(stats: ConnectionStats) -> ConnectionQuality {
    ConnectionQuality {
        video: classify_loss(stats.video_packet_loss_pct),
        audio: classify_loss(stats.audio_packet_loss_pct),
        network: classify_rtt(stats.rtt_ms),
    }
}

fn classify_loss(loss_pct: f32) -> QualityLevel {
    match loss_pct {
        l if l < 0.5 => QualityLevel::Excellent,
        l if l < 2.0 => QualityLevel::Good,
        l if l < 5.0 => QualityLevel::Fair,
        _ => QualityLevel::Poor,
    }
}

fn classify_rtt(rtt_ms: u32) -> QualityLevel {
    match rtt_ms {
        r if r < 50 => QualityLevel::Excellent,
        r if r < 150 => QualityLevel::Good,
        r if r < 300 => QualityLevel::Fair,
        _ => QualityLevel::Poor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::transport::MockMediaTransport;
    use mockall::predicate::eq;

    fn local_track(id: &str, kind: TrackKind, source: TrackSource) -> LocalTrack {
        LocalTrack {
            id: id.to_string(),
            kind,
            source,
            enabled: true,
        }
    }

    fn connected_manager() -> (VideoSessionManager, mpsc::Sender<RoomEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let mut transport = MockMediaTransport::new();
        transport
            .expect_acquire_track()
            .with(eq(TrackKind::Audio), eq(TrackSource::Microphone))
            .returning(|_, _| Ok(local_track("mic-1", TrackKind::Audio, TrackSource::Microphone)));
        transport
            .expect_acquire_track()
            .with(eq(TrackKind::Video), eq(TrackSource::Camera))
            .returning(|_, _| Ok(local_track("cam-1", TrackKind::Video, TrackSource::Camera)));
        transport.expect_publish_track().returning(|_| Ok(()));
        let mut rx = Some(rx);
        transport
            .expect_connect()
            .returning(move |_, _| Ok(rx.take().expect("connect called twice")));
        transport.expect_disconnect().returning(|| Ok(()));
        transport
            .expect_set_track_enabled()
            .returning(|_, _| Ok(()));
        transport.expect_unpublish_track().returning(|_| Ok(()));

        let manager = VideoSessionManager::new(Box::new(transport));
        (manager, tx)
    }

    #[tokio::test]
    async fn connect_acquires_and_publishes_tracks() {
        let (mut manager, _tx) = connected_manager();
        manager
            .connect("token", "interview-1", MediaConfig::default())
            .await
            .unwrap();
        assert!(manager.is_connected());
        assert_eq!(manager.active_local_tracks(), 2);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent_and_releases_tracks() {
        let (mut manager, _tx) = connected_manager();
        manager
            .connect("token", "interview-1", MediaConfig::default())
            .await
            .unwrap();

        manager.disconnect().await.unwrap();
        assert!(!manager.is_connected());
        assert_eq!(manager.active_local_tracks(), 0);

        // Second call is a no-op, not an error.
        manager.disconnect().await.unwrap();
        assert_eq!(manager.active_local_tracks(), 0);
    }

    #[tokio::test]
    async fn toggle_audio_flips_state() {
        let (mut manager, _tx) = connected_manager();
        manager
            .connect("token", "interview-1", MediaConfig::default())
            .await
            .unwrap();

        assert!(!manager.toggle_audio().await.unwrap());
        assert!(manager.toggle_audio().await.unwrap());
    }

    #[tokio::test]
    async fn toggle_without_track_fails() {
        let transport = MockMediaTransport::new();
        let mut manager = VideoSessionManager::new(Box::new(transport));
        assert!(manager.toggle_audio().await.is_err());
        assert!(manager.toggle_video().await.is_err());
    }

    #[tokio::test]
    async fn screen_share_substitutes_and_restores_camera() {
        let (tx, rx) = mpsc::channel(16);
        let mut transport = MockMediaTransport::new();
        transport.expect_acquire_track().returning(|kind, source| {
            let id = match source {
                TrackSource::Microphone => "mic-1",
                TrackSource::Camera => "cam-1",
                TrackSource::Screen => "screen-1",
            };
            Ok(local_track(id, kind, source))
        });
        transport.expect_publish_track().returning(|_| Ok(()));
        let mut rx = Some(rx);
        transport
            .expect_connect()
            .returning(move |_, _| Ok(rx.take().unwrap()));
        transport
            .expect_unpublish_track()
            .with(eq("cam-1"))
            .times(1)
            .returning(|_| Ok(()));
        transport
            .expect_unpublish_track()
            .with(eq("screen-1"))
            .times(1)
            .returning(|_| Ok(()));

        let mut manager = VideoSessionManager::new(Box::new(transport));
        manager
            .connect("token", "interview-1", MediaConfig::default())
            .await
            .unwrap();

        manager.start_screen_share().await.unwrap();
        assert!(manager.is_screen_sharing());

        // Externally-triggered stop restores the camera.
        tx.send(RoomEvent::ScreenShareEnded).await.unwrap();
        let event = manager.next_event().await.unwrap();
        assert!(matches!(event, RoomEvent::ScreenShareEnded));
        assert!(!manager.is_screen_sharing());
    }

    #[tokio::test]
    async fn room_events_update_remote_bookkeeping() {
        let (mut manager, tx) = connected_manager();
        manager
            .connect("token", "interview-1", MediaConfig::default())
            .await
            .unwrap();

        tx.send(RoomEvent::ParticipantConnected {
            participant_id: "peer-1".to_string(),
            display_name: "Remote Peer".to_string(),
        })
        .await
        .unwrap();
        tx.send(RoomEvent::TrackSubscribed {
            participant_id: "peer-1".to_string(),
            track: RemoteTrack {
                id: "rt-1".to_string(),
                kind: TrackKind::Video,
                participant_id: "peer-1".to_string(),
            },
        })
        .await
        .unwrap();
        manager.next_event().await.unwrap();
        manager.next_event().await.unwrap();

        assert_eq!(manager.remote_participants().len(), 1);
        assert_eq!(manager.remote_participants()["peer-1"].tracks.len(), 1);

        tx.send(RoomEvent::ParticipantDisconnected {
            participant_id: "peer-1".to_string(),
        })
        .await
        .unwrap();
        manager.next_event().await.unwrap();
        assert!(manager.remote_participants().is_empty());
    }

    #[tokio::test]
    async fn quality_signal_is_classified() {
        let (mut manager, tx) = connected_manager();
        manager
            .connect("token", "interview-1", MediaConfig::default())
            .await
            .unwrap();

        tx.send(RoomEvent::QualityChanged(ConnectionStats {
            video_packet_loss_pct: 3.0,
            audio_packet_loss_pct: 0.1,
            rtt_ms: 400,
        }))
        .await
        .unwrap();
        manager.next_event().await.unwrap();

        let quality = manager.connection_quality();
        assert_eq!(quality.video, QualityLevel::Fair);
        assert_eq!(quality.audio, QualityLevel::Excellent);
        assert_eq!(quality.network, QualityLevel::Poor);
    }

    #[tokio::test]
    async fn failed_connect_leaves_no_tracks() {
        let mut transport = MockMediaTransport::new();
        transport
            .expect_acquire_track()
            .returning(|_, _| Err(Error::VideoConnection("permission denied".to_string())));

        let mut manager = VideoSessionManager::new(Box::new(transport));
        let err = manager
            .connect("token", "interview-1", MediaConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::VideoConnection(_)));
        assert!(!manager.is_connected());
        assert_eq!(manager.active_local_tracks(), 0);
    }
}
