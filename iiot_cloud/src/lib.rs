//! # IIoT Cloud Liaison
//!
//! Boundary between the control core and the external cloud transport.
//! This crate never talks to the network itself — the transport is a
//! vendor collaborator behind the [`CloudTransport`] trait. What lives
//! here is the parsing of inbound action envelopes and the wiring that
//! turns them into typed control updates on the loop's input queue.

pub mod actions;
pub mod feedback;
pub mod transport;

pub use actions::{parse_inbound, Inbound};
pub use feedback::FeedbackChannel;
pub use transport::{send_telemetry, CloudError, CloudTransport, LoopbackTransport, RxCallback};
