//! # PTM Bus
//!
//! Event-bus plumbing the orchestrator and facade use to communicate:
//! a `broadcast`-based `EventBus` for facade-observable status changes
//! (`GetTxStatus` long-polling), and the per-orchestrator `mpsc` channel
//! background tasks post `stage_result` events back into.
//!
//! ## Choreography
//!
//! Background work (endorse, submit) is `tokio::spawn`ed by the
//! orchestrator and reports completion by sending an
//! `OrchestratorEvent::StageResult` back into that contract's own
//! channel, never by calling another orchestrator directly.

pub mod channel;
pub mod events;
pub mod publisher;
pub mod subscriber;

pub use channel::{orchestrator_channel, OrchestratorReceiver, OrchestratorSender};
pub use events::{PtmEvent, EventFilter, EventTopic};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, EventSubscriber, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before backpressure.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Default bound on a single orchestrator's event channel.
pub const DEFAULT_ORCHESTRATOR_CHANNEL_CAPACITY: usize = 256;
