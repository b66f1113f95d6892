//! HAL trait definitions and implementations.
//!
//! This module defines the process execution trait and provides both a real (HostHal) and a
//! fake (FakeHal) implementation.

pub mod fake_hal;
pub mod host_hal;
pub mod process_ops;

pub use fake_hal::{FakeHal, FakeReply, Operation};
pub use host_hal::HostHal;
pub use process_ops::{CommandLine, CommandOutput, ProcessOps, RunStatus};
