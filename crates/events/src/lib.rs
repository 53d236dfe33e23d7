//! Job event bus and completion notification.
//!
//! - [`EventBus`] -- in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`JobEvent`] -- the lifecycle events a UI layer subscribes to.
//! - [`CompletionNotifier`] -- publishes success/failure, degraded and
//!   cancellation signals on the bus and logs them.

pub mod bus;
pub mod notifier;

pub use bus::{EventBus, JobEvent};
pub use notifier::CompletionNotifier;
