//! The Vigil monitoring engine.
//!
//! Everything here is generic over a [`vigil_core::store::SubjectStore`] and,
//! where notifications are involved, an [`transport::AlertTransport`]. Both
//! are injected; there are no process-wide singletons, so every service can
//! be driven deterministically in tests with an in-memory store and a
//! recording transport.

pub mod dispatch;
pub mod profile;
pub mod recorder;
pub mod registry;
pub mod resend;
pub mod scheduler;
pub mod sweep;
pub mod transport;

#[cfg(test)]
mod tests;
