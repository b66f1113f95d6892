//! aftx host abstraction layer (HAL).
//!
//! Every external tool the flasher drives (adb, fastboot, archive utilities) is spawned through
//! [`ProcessOps`], so workflows can be exercised against [`FakeHal`] without a device attached.

pub mod error;
pub mod hal;
pub mod path;

pub use error::{HalError, HalResult};
pub use hal::{
    CommandLine, CommandOutput, FakeHal, FakeReply, HostHal, Operation, ProcessOps, RunStatus,
};
