//! Terminal UI helpers for the CLI flows.

use std::io::IsTerminal;

pub mod confirm;
pub mod progress;
pub mod style;

/// The confirmation prompt needs a TTY unless `--yes` was given.
pub fn ensure_can_prompt(assume_yes: bool) -> anyhow::Result<()> {
    if assume_yes || std::io::stdin().is_terminal() {
        return Ok(());
    }

    anyhow::bail!(
        "No TTY detected and --yes not given.\n\
         Flashing needs an explicit confirmation: run in a terminal or pass --yes."
    );
}
