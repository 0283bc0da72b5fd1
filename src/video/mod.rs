//! Video session management over an abstract media transport. The actual
//! media backend (room join, SFU, device capture) is an external
//! collaborator behind the `MediaTransport` trait.

pub mod manager;
pub mod transport;

pub use manager::VideoSessionManager;
pub use transport::{MediaConfig, MediaTransport, RoomEvent};
