//! Confirmation helpers for destructive operations.

use aftx_workflow::FlashPlan;
use anyhow::{Context, Result};
use dialoguer::Confirm;

pub fn confirm_destructive_action(prompt: &str) -> Result<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to read confirmation input")
}

/// Print the plan and ask before flashing. `assume_yes` approves without asking.
pub fn confirm_plan_with<C>(plan: &FlashPlan, assume_yes: bool, confirm: C) -> Result<bool>
where
    C: FnOnce(&str) -> Result<bool>,
{
    for line in plan.summary_lines() {
        println!("{}", line);
    }
    if assume_yes {
        log::info!("Flash approved by --yes");
        return Ok(true);
    }
    let prompt = format!(
        "Flash {} image(s) to {}? This overwrites the device partitions",
        plan.steps.len(),
        plan.device.serial
    );
    confirm(&prompt)
}

pub fn confirm_plan(plan: &FlashPlan, assume_yes: bool) -> Result<bool> {
    confirm_plan_with(plan, assume_yes, confirm_destructive_action)
}
