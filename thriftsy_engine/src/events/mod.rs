//! Domain events.
//!
//! The order flow publishes an event whenever an order is created, paid for, or cancelled. Interested parties register
//! an async hook per event type in [`EventHooks`]. Hooks are stateless: they only see the event itself.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers, HookFuture};
