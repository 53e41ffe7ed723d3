//! Signing queue runtime.
//!
//! [`store::QueueStore`] holds queued documents and their per-document
//! settings, [`orchestrator::UploadOrchestrator`] drains it one document at a
//! time, and [`bridge::ExternalAuthBridge`] correlates the qualified flow's
//! second-factor callback with the document waiting for it.

pub mod bridge;
pub mod notifier;
pub mod orchestrator;
pub mod store;
pub mod strategy;

#[cfg(test)]
mod test_helpers;

pub use bridge::{BridgeMessage, BridgeOutcome, BridgeState, ExternalAuthBridge};
pub use notifier::{ChannelNotifier, Notification, Notifier, TracingNotifier};
pub use orchestrator::{OrchestratorHandle, OrchestratorStatus, StepOutcome, UploadOrchestrator};
pub use store::{QueueStore, QueuedDocument};
pub use strategy::{strategy_for, OfficialStrategy, QualifiedStrategy, SigningStrategy, SubmissionOutcome};
