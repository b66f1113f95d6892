//! The flash state machine.
//!
//! `Idle -> Listing -> Confirming -> Flashing(i) -> {Rebooting -> Done | Aborted}`, with
//! `Listing -> Done` when there is nothing to flash.

mod plan;
mod run;

pub use plan::{build_plan, FlashPlan, FlashStep};
pub use run::{AbortReason, FlashOrchestrator, FlashReport, FlashState, RunOutcome};
