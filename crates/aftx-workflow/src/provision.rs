//! End-to-end provisioning: find a handset, get its images, flash them.

use crate::flash::{FlashOrchestrator, FlashPlan, FlashReport};
use aftx_core::action_log::{record_or_warn, ActionLogger};
use aftx_core::commands::TransportCommands;
use aftx_core::config::AppConfig;
use aftx_core::device::{Device, DeviceScanner, Transport};
use aftx_core::download_manager::{acquire_bundle, Acquisition};
use aftx_core::downloader::{DownloadProgress, Downloader};
use aftx_core::errors::FlashToolError;
use aftx_core::extract::ExtractorChain;
use aftx_core::outcome::OutcomeParser;
use aftx_core::partition::PartitionClassifier;
use aftx_hal::ProcessOps;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleSource {
    Url { url: String, sha256: Option<String> },
    Directory(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionRequest {
    pub source: BundleSource,
    /// Restrict to this serial; otherwise the first device found is used.
    pub serial: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    NoDevice,
    /// The handset was asked to enter its bootloader but never showed up in fastboot.
    BootloaderNotReached { serial: String },
    ManualExtractionRequired { archive: PathBuf, destination: PathBuf },
    Flashed(FlashReport),
}

/// How long to wait for a device to reappear in fastboot mode after a reboot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RescanPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for RescanPolicy {
    fn default() -> Self {
        Self {
            attempts: 20,
            interval: Duration::from_secs(3),
        }
    }
}

pub struct Provisioner {
    scanner: DeviceScanner,
    downloader: Downloader,
    chain: ExtractorChain,
    orchestrator: FlashOrchestrator,
    logger: Arc<dyn ActionLogger>,
    downloads_dir: PathBuf,
    rescan: RescanPolicy,
}

impl Provisioner {
    pub fn new(
        hal: Arc<dyn ProcessOps>,
        logger: Arc<dyn ActionLogger>,
        cfg: &AppConfig,
    ) -> Result<Self, FlashToolError> {
        let orchestrator = FlashOrchestrator::new(
            hal.clone(),
            logger.clone(),
            TransportCommands::new(cfg),
            PartitionClassifier::default(),
            OutcomeParser::from_markers(&cfg.markers),
        );
        Ok(Self {
            scanner: DeviceScanner::from_config(hal.clone(), cfg),
            downloader: Downloader::new(cfg)?,
            chain: ExtractorChain::platform_default(hal, cfg.timeouts.extract()),
            orchestrator,
            logger,
            downloads_dir: cfg.paths.downloads_dir.clone(),
            rescan: RescanPolicy::default(),
        })
    }

    pub fn with_rescan(mut self, rescan: RescanPolicy) -> Self {
        self.rescan = rescan;
        self
    }

    /// Discover, acquire, enter the bootloader if needed, then flash.
    ///
    /// Negative results (no device, manual extraction) are outcomes; only I/O and download
    /// failures are errors.
    pub fn provision(
        &self,
        request: &ProvisionRequest,
        confirm: &mut dyn FnMut(&FlashPlan) -> Result<bool>,
        observer: &mut dyn FnMut(DownloadProgress),
    ) -> Result<ProvisionOutcome> {
        let wanted = request.serial.as_deref();
        let Some(device) = self.discover(wanted) else {
            log::warn!("🔍 No device found{}", serial_hint(wanted));
            return Ok(ProvisionOutcome::NoDevice);
        };
        log::info!("🔍 Using {}", device);

        let image_dir = match &request.source {
            BundleSource::Directory(dir) => dir.clone(),
            BundleSource::Url { url, sha256 } => {
                let acquired = acquire_bundle(
                    &self.downloader,
                    &self.chain,
                    &self.downloads_dir,
                    url,
                    sha256.as_deref(),
                    observer,
                );
                match acquired {
                    Ok(Acquisition::Ready { extracted, .. }) => {
                        record_or_warn(self.logger.as_ref(), &device.serial, "download", "OK");
                        extracted.image_dir()
                    }
                    Ok(Acquisition::ManualExtractionRequired {
                        archive,
                        destination,
                    }) => {
                        record_or_warn(
                            self.logger.as_ref(),
                            &device.serial,
                            "extract",
                            "manual_required",
                        );
                        return Ok(ProvisionOutcome::ManualExtractionRequired {
                            archive,
                            destination,
                        });
                    }
                    Err(err) => {
                        record_or_warn(self.logger.as_ref(), &device.serial, "download", "FAIL");
                        return Err(err.into());
                    }
                }
            }
        };

        let device = match device.transport {
            Transport::Fastboot => device,
            Transport::Adb => {
                let serial = device.serial.clone();
                match self.enter_bootloader(device) {
                    Some(fastboot) => fastboot,
                    None => return Ok(ProvisionOutcome::BootloaderNotReached { serial }),
                }
            }
        };

        let report = self.orchestrator.run(&device, &image_dir, confirm)?;
        Ok(ProvisionOutcome::Flashed(report))
    }

    /// Fastboot devices take precedence; otherwise the first online ADB device.
    fn discover(&self, wanted: Option<&str>) -> Option<Device> {
        let matches = |d: &Device| wanted.map_or(true, |s| d.serial == s);
        self.scanner
            .fastboot_devices()
            .into_iter()
            .find(|d| matches(d))
            .or_else(|| self.scanner.adb_device().filter(|d| matches(d)))
    }

    fn enter_bootloader(&self, device: Device) -> Option<Device> {
        let serial = device.serial.clone();
        log::info!("🔁 Rebooting {} into the bootloader", serial);
        let started = self.scanner.reboot_to_bootloader(device);
        record_or_warn(
            self.logger.as_ref(),
            &serial,
            "reboot_bootloader",
            if started { "OK" } else { "FAIL" },
        );
        if !started {
            return None;
        }

        let attempts = self.rescan.attempts.max(1);
        for attempt in 1..=attempts {
            if let Some(found) = self
                .scanner
                .fastboot_devices()
                .into_iter()
                .find(|d| d.serial == serial)
            {
                return Some(found);
            }
            log::debug!("waiting for {} in fastboot ({}/{})", serial, attempt, attempts);
            if attempt < attempts {
                sleep(self.rescan.interval);
            }
        }
        log::error!("{} did not appear in fastboot mode", serial);
        None
    }
}

fn serial_hint(wanted: Option<&str>) -> String {
    wanted
        .map(|s| format!(" with serial {}", s))
        .unwrap_or_default()
}
