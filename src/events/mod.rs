//! Engine event system
//!
//! Broadcast-based pub/sub: the engine emits `task:execution:*` lifecycle
//! events, the pump emits and listens for `queue:item:*` events.

mod bus;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, create_event_bus};
pub use types::EngineEvent;
