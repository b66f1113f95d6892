use super::plan::{build_plan, FlashPlan};
use aftx_core::action_log::{now_ms, record_or_warn, ActionLogger, AttemptOutcome, FlashAttempt};
use aftx_core::commands::TransportCommands;
use aftx_core::device::{Device, Transport};
use aftx_core::errors::FlashToolError;
use aftx_core::outcome::OutcomeParser;
use aftx_core::partition::{ImageFile, PartitionClassifier};
use aftx_hal::ProcessOps;
use anyhow::Result;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashState {
    Idle,
    Listing,
    Confirming,
    /// Index into the plan's steps.
    Flashing(usize),
    Rebooting,
    Aborted,
    Done,
}

impl FlashState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlashState::Done | FlashState::Aborted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    UserDeclined,
    FlashFailed { partition: String },
    WrongTransport,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::UserDeclined => write!(f, "declined by user"),
            AbortReason::FlashFailed { partition } => write!(f, "flashing {} failed", partition),
            AbortReason::WrongTransport => write!(f, "device is not in fastboot mode"),
        }
    }
}

impl From<&AbortReason> for FlashToolError {
    fn from(reason: &AbortReason) -> Self {
        match reason {
            AbortReason::UserDeclined => FlashToolError::UserAborted,
            AbortReason::FlashFailed { partition } => FlashToolError::FlashFailure {
                partition: partition.clone(),
            },
            AbortReason::WrongTransport => FlashToolError::TransportParseEmpty {
                transport: Transport::Fastboot.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// Nothing flashable in the directory. Not an error.
    NoImages,
    Aborted(AbortReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashReport {
    pub outcome: RunOutcome,
    pub transitions: Vec<FlashState>,
    pub attempts: Vec<FlashAttempt>,
    pub skipped: Vec<ImageFile>,
}

impl FlashReport {
    pub fn final_state(&self) -> FlashState {
        self.transitions.last().copied().unwrap_or(FlashState::Idle)
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed | RunOutcome::NoImages)
    }
}

/// Drives one flash run against one fastboot device.
///
/// Each `run` starts from `Idle`; a finished run leaves no state behind.
pub struct FlashOrchestrator {
    hal: Arc<dyn ProcessOps>,
    logger: Arc<dyn ActionLogger>,
    commands: TransportCommands,
    classifier: PartitionClassifier,
    parser: OutcomeParser,
}

struct RunRecorder {
    transitions: Vec<FlashState>,
}

impl RunRecorder {
    fn enter(&mut self, state: FlashState) {
        log::debug!("flash state -> {:?}", state);
        self.transitions.push(state);
    }
}

impl FlashOrchestrator {
    pub fn new(
        hal: Arc<dyn ProcessOps>,
        logger: Arc<dyn ActionLogger>,
        commands: TransportCommands,
        classifier: PartitionClassifier,
        parser: OutcomeParser,
    ) -> Self {
        Self {
            hal,
            logger,
            commands,
            classifier,
            parser,
        }
    }

    pub fn classifier(&self) -> &PartitionClassifier {
        &self.classifier
    }

    pub fn plan(&self, device: &Device, image_dir: &Path) -> Result<FlashPlan> {
        build_plan(device, image_dir, &self.classifier)
    }

    /// Flash every classified image in `image_dir` to `device`.
    ///
    /// `confirm` sees the plan before anything is written; only `Ok(true)` proceeds. The run
    /// stops at the first failed image and never retries. Errors are returned only when the
    /// directory cannot be listed.
    pub fn run(
        &self,
        device: &Device,
        image_dir: &Path,
        confirm: &mut dyn FnMut(&FlashPlan) -> Result<bool>,
    ) -> Result<FlashReport> {
        let serial = device.serial.as_str();
        let mut rec = RunRecorder {
            transitions: vec![FlashState::Idle],
        };

        if device.transport != Transport::Fastboot {
            log::error!("{} is in {} mode; reboot it to the bootloader first", serial, device.transport);
            record_or_warn(self.logger.as_ref(), serial, "aborted", "wrong_transport");
            rec.enter(FlashState::Aborted);
            return Ok(FlashReport {
                outcome: RunOutcome::Aborted(AbortReason::WrongTransport),
                transitions: rec.transitions,
                attempts: Vec::new(),
                skipped: Vec::new(),
            });
        }

        rec.enter(FlashState::Listing);
        let plan = self.plan(device, image_dir)?;
        for image in &plan.skipped {
            log::warn!("⚠️  Skipping {}: no partition matches its name", image.file_name);
        }
        if plan.is_empty() {
            log::info!("No flashable images in {}", image_dir.display());
            rec.enter(FlashState::Done);
            return Ok(FlashReport {
                outcome: RunOutcome::NoImages,
                transitions: rec.transitions,
                attempts: Vec::new(),
                skipped: plan.skipped,
            });
        }

        rec.enter(FlashState::Confirming);
        let approved = match confirm(&plan) {
            Ok(answer) => answer,
            Err(err) => {
                log::warn!("confirmation failed: {:#}", err);
                false
            }
        };
        if !approved {
            log::info!("Flash of {} cancelled", serial);
            record_or_warn(self.logger.as_ref(), serial, "aborted_by_user", "declined");
            rec.enter(FlashState::Aborted);
            return Ok(FlashReport {
                outcome: RunOutcome::Aborted(AbortReason::UserDeclined),
                transitions: rec.transitions,
                attempts: Vec::new(),
                skipped: plan.skipped,
            });
        }

        let mut attempts = Vec::with_capacity(plan.steps.len());
        for (idx, step) in plan.steps.iter().enumerate() {
            rec.enter(FlashState::Flashing(idx));
            log::info!(
                "⚡ [{}/{}] {} <- {}",
                idx + 1,
                plan.steps.len(),
                step.partition,
                step.image.file_name
            );
            let out = self
                .hal
                .run(&self.commands.flash(serial, &step.partition, &step.image.path));
            let outcome = if self.parser.succeeded(&out.text) {
                AttemptOutcome::Ok
            } else {
                AttemptOutcome::Fail
            };
            let attempt = FlashAttempt {
                serial: serial.to_string(),
                partition: step.partition.clone(),
                image: step.image.path.clone(),
                outcome,
                timestamp_ms: now_ms(),
            };
            attempt.log_to(self.logger.as_ref());
            attempts.push(attempt);

            if outcome == AttemptOutcome::Fail {
                log::error!("❌ Flashing {} failed:\n{}", step.partition, out.text);
                record_or_warn(
                    self.logger.as_ref(),
                    serial,
                    "aborted",
                    &format!("flash_failed:{}", step.partition),
                );
                rec.enter(FlashState::Aborted);
                return Ok(FlashReport {
                    outcome: RunOutcome::Aborted(AbortReason::FlashFailed {
                        partition: step.partition.clone(),
                    }),
                    transitions: rec.transitions,
                    attempts,
                    skipped: plan.skipped,
                });
            }
        }

        rec.enter(FlashState::Rebooting);
        let reboot = self.hal.run(&self.commands.reboot(serial));
        log::debug!("reboot {} -> {:?}", serial, reboot.status);
        record_or_warn(self.logger.as_ref(), serial, "completed", "OK");
        log::info!("✅ Flashed {} image(s) to {}", attempts.len(), serial);
        rec.enter(FlashState::Done);

        Ok(FlashReport {
            outcome: RunOutcome::Completed,
            transitions: rec.transitions,
            attempts,
            skipped: plan.skipped,
        })
    }
}
