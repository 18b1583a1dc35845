//! Typed event subscription registry.
//!
//! Subscribers register for one event type with an [`EventPriority`] and an
//! ignore-cancelled flag. [`EventBus::dispatch`] walks the subscribers for
//! that type from lowest to highest priority (monitor last). Every
//! [`Subscription`] is a [`Disposable`](ticklane_scheduler::Disposable), so
//! an owner can unregister everything it started in one call.

pub mod bus;
pub mod event;
pub mod priority;
pub mod stream;
pub mod subscription;

pub use bus::EventBus;
pub use event::Event;
pub use priority::{EventPriority, SubscribeOptions};
pub use stream::EventStream;
pub use subscription::Subscription;
