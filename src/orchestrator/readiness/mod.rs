//! Startup readiness: the gate requests wait on, the port polling policy, and
//! the sequencer that drives both backends up.
//!
//! - [`gate`] - [`ReadinessGate`] state machine and FIFO waiter queue
//! - [`retry`] - bounded port polling
//! - [`sequence`] - bundler first, then packager

mod gate;
mod retry;
pub(crate) mod sequence;

pub use gate::{Phase, ReadinessGate};
pub use retry::{Probe, RetryPolicy, is_port_open, wait_until_reachable};
