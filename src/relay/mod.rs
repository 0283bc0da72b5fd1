//! Session gateway: one WebSocket per participant, scoped to an interview
//! room, rebroadcasting typed messages to every other peer. At-most-once,
//! unordered across senders; late joiners catch up via `sync_request`.

pub mod gateway;
pub mod message;
pub mod room;

pub use message::{RelayEnvelope, RelayMessage};
pub use room::{RelayRoom, RoomRegistry};
