//! aftx workflow orchestration.
//!
//! This crate holds the flash state machine and the provisioning workflow built on top of it.
//! Discovery, acquisition and classification primitives come from `aftx-core`; every external
//! process goes through an `aftx-hal` implementation supplied by the caller.

pub mod flash;
pub mod provision;

pub use flash::{
    build_plan, AbortReason, FlashOrchestrator, FlashPlan, FlashReport, FlashState, FlashStep,
    RunOutcome,
};
pub use provision::{
    BundleSource, ProvisionOutcome, ProvisionRequest, Provisioner, RescanPolicy,
};
