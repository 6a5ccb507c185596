//! Domain events and their plumbing: envelopes, the pub/sub bus and the
//! projection contract read models implement.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;
pub mod projection;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use projection::{CursorCheck, Projection, ProjectionError, StreamCursors, decode};
