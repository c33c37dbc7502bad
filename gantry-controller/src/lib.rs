//! Gantry Controller
//!
//! Graceful-shutdown engine for ephemeral CI runners backed by pods.
//!
//! Architecture:
//! - Annotator: the only writer of durable progress (pod annotations)
//! - Decider: removes the runner from the registry and classifies the outcome
//! - Graceful stop: sequences annotation and decision into one tick outcome
//! - Registration: records the registry-assigned runner id on the pod
//! - Drain: ticks one runner until its pod is deleted
//!
//! Callers invoke [`RunnerController::tick_graceful_stop`] repeatedly, honoring
//! the returned delay, until it reports the pod as deletable.

pub mod annotator;
pub mod clock;
pub mod config;
pub mod decider;
pub mod drain;
pub mod error;
pub mod graceful_stop;
pub mod pods;
pub mod registration;

#[cfg(test)]
mod testing;

pub use annotator::{PodStore, annotate_once};
pub use decider::Decision;
pub use error::{GracefulStopError, PodStoreError};
pub use graceful_stop::{
    DEFAULT_RETRY_DELAY, DEFAULT_UNREGISTRATION_TIMEOUT, RATE_LIMIT_RETRY_DELAY,
    REGISTRATION_POLL_DELAY, RunnerController, RunnerTarget, TickOutcome,
};
pub use pods::HttpPodStore;
pub use registration::RegistrationOutcome;
