//! Domain model (ids, envelope, transport context, poll outcome, events).

pub mod context;
pub mod envelope;
pub mod events;
pub mod ids;
pub mod poll;

pub use context::TransportContext;
pub use envelope::Envelope;
pub use events::SystemEvent;
pub use ids::{EnvelopeId, ItemName};
pub use poll::GetMessageResult;
