//! `aftx` command-line front end.

use aftx_core::action_log::{record_or_warn, ActionLogger, JsonlActionLog};
use aftx_core::cli::{Cli, Command};
use aftx_core::config::AppConfig;
use aftx_core::device::{Device, DeviceScanner};
use aftx_core::download_manager::{acquire_bundle, Acquisition};
use aftx_core::downloader::Downloader;
use aftx_core::errors::FlashToolError;
use aftx_core::extract::ExtractorChain;
use aftx_core::partition::{scan_images, PartitionClassifier};
use aftx_core::preflight;
use aftx_hal::{HostHal, ProcessOps};
use aftx_workflow::{
    BundleSource, FlashOrchestrator, FlashPlan, FlashReport, ProvisionOutcome, ProvisionRequest,
    Provisioner, RunOutcome,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

pub mod ui;

use ui::style::{emoji, with};

pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    aftx_core::logging::init_with(cli.log_file.as_deref(), cli.verbose);

    let cfg = AppConfig::load(cli.config.as_deref())?;
    let logger: Arc<dyn ActionLogger> = Arc::new(JsonlActionLog::new(cfg.action_log_path()));
    let app = App::new(cfg, Arc::new(HostHal::new()), logger);
    let mut out = std::io::stdout();

    match cli.command {
        Command::Devices => app.devices(&mut out),
        Command::Info { serial } => app.info(serial.as_deref(), &mut out),
        Command::Download { url, sha256 } => app.download(&url, sha256.as_deref(), &mut out),
        Command::Plan { dir } => app.plan(&dir, &mut out),
        Command::Flash { dir, serial, yes } => {
            ui::ensure_can_prompt(yes)?;
            let mut confirm = |plan: &FlashPlan| ui::confirm::confirm_plan(plan, yes);
            app.flash(&dir, serial.as_deref(), &mut confirm, &mut out)
        }
        Command::Provision {
            source,
            sha256,
            serial,
            yes,
        } => {
            ui::ensure_can_prompt(yes)?;
            let source = match (source.url, source.dir) {
                (Some(url), _) => BundleSource::Url { url, sha256 },
                (None, Some(_)) if sha256.is_some() => {
                    anyhow::bail!("--sha256 applies to --url downloads only")
                }
                (None, Some(dir)) => BundleSource::Directory(dir),
                (None, None) => anyhow::bail!("provision needs --url or --dir"),
            };
            let request = ProvisionRequest { source, serial };
            let mut confirm = |plan: &FlashPlan| ui::confirm::confirm_plan(plan, yes);
            app.provision(&request, &mut confirm, &mut out)
        }
        Command::Preflight => app.preflight(&mut out),
    }
}

/// Everything a command needs, built once from configuration.
pub struct App {
    cfg: AppConfig,
    hal: Arc<dyn ProcessOps>,
    logger: Arc<dyn ActionLogger>,
}

impl App {
    pub fn new(cfg: AppConfig, hal: Arc<dyn ProcessOps>, logger: Arc<dyn ActionLogger>) -> Self {
        Self { cfg, hal, logger }
    }

    fn scanner(&self) -> DeviceScanner {
        DeviceScanner::from_config(self.hal.clone(), &self.cfg)
    }

    fn orchestrator(&self) -> FlashOrchestrator {
        FlashOrchestrator::new(
            self.hal.clone(),
            self.logger.clone(),
            aftx_core::commands::TransportCommands::new(&self.cfg),
            PartitionClassifier::default(),
            aftx_core::outcome::OutcomeParser::from_markers(&self.cfg.markers),
        )
    }

    pub fn devices(&self, out: &mut dyn Write) -> Result<ExitCode> {
        let scanner = self.scanner();
        writeln!(out, "{}", with(emoji::DEVICE, "Attached devices"))?;
        match scanner.adb_device() {
            Some(device) => writeln!(out, "adb:      {}", device.serial)?,
            None => writeln!(out, "adb:      (none online)")?,
        }
        let fastboot = scanner.fastboot_devices();
        if fastboot.is_empty() {
            writeln!(out, "fastboot: (none)")?;
        }
        for device in fastboot {
            writeln!(out, "fastboot: {}", device.serial)?;
        }
        Ok(ExitCode::SUCCESS)
    }

    pub fn info(&self, serial: Option<&str>, out: &mut dyn Write) -> Result<ExitCode> {
        let serial = match serial {
            Some(serial) => serial.to_string(),
            None => match self.scanner().adb_device() {
                Some(device) => device.serial,
                None => {
                    writeln!(out, "{}", with(emoji::SEARCH, "No ADB device online"))?;
                    return Ok(ExitCode::SUCCESS);
                }
            },
        };

        let details = self.scanner().properties(&serial);
        for (label, value) in details.rows() {
            writeln!(out, "{:<16} {}", format!("{}:", label), value)?;
        }
        let outcome = match details.write_details(&self.cfg.paths.details_file) {
            Ok(()) => {
                writeln!(out, "Details written to {}", self.cfg.paths.details_file.display())?;
                "saved"
            }
            Err(err) => {
                log::warn!("{:#}", err);
                "write_failed"
            }
        };
        record_or_warn(self.logger.as_ref(), &serial, "device_info", outcome);
        Ok(ExitCode::SUCCESS)
    }

    pub fn download(&self, url: &str, sha256: Option<&str>, out: &mut dyn Write) -> Result<ExitCode> {
        let downloader = Downloader::new(&self.cfg)?;
        let chain = ExtractorChain::platform_default(self.hal.clone(), self.cfg.timeouts.extract());
        writeln!(out, "{}", with(emoji::DOWNLOAD, &format!("Fetching {}", url)))?;
        let mut bar = ui::progress::DownloadBar::new()?;
        let acquired = {
            let mut observer = bar.observer();
            acquire_bundle(
                &downloader,
                &chain,
                &self.cfg.paths.downloads_dir,
                url,
                sha256,
                &mut observer,
            )
        };
        bar.finish();

        match acquired {
            Ok(acquisition) => {
                self.print_acquisition(&acquisition, out)?;
                Ok(ExitCode::SUCCESS)
            }
            Err(err) => {
                writeln!(out, "{}", with(emoji::ERROR, &err.to_string()))?;
                writeln!(out, "The partial download was kept; run the command again to retry.")?;
                Ok(ExitCode::FAILURE)
            }
        }
    }

    fn print_acquisition(&self, acquisition: &Acquisition, out: &mut dyn Write) -> Result<()> {
        match acquisition {
            Acquisition::Ready { extracted, .. } => writeln!(
                out,
                "{}",
                with(
                    emoji::SUCCESS,
                    &format!(
                        "{} image(s) ready in {} (via {})",
                        extracted.images.len(),
                        extracted.image_dir().display(),
                        extracted.extractor
                    )
                )
            )?,
            Acquisition::ManualExtractionRequired {
                archive,
                destination,
            } => {
                writeln!(
                    out,
                    "{}",
                    with(emoji::WARNING, "No available extractor could unpack the archive.")
                )?;
                writeln!(out, "Extract {} by hand, e.g. into {}", archive.display(), destination.display())?;
                writeln!(out, "then run: aftx flash --dir <directory with the .img files>")?;
            }
        }
        Ok(())
    }

    pub fn plan(&self, dir: &Path, out: &mut dyn Write) -> Result<ExitCode> {
        let images = scan_images(dir, &PartitionClassifier::default())?;
        if images.is_empty() {
            writeln!(out, "No .img files in {}", dir.display())?;
            return Ok(ExitCode::SUCCESS);
        }
        for image in images {
            let target = image.partition.as_deref().unwrap_or("(skipped)");
            writeln!(out, "{:<28} -> {}", image.file_name, target)?;
        }
        Ok(ExitCode::SUCCESS)
    }

    pub fn flash(
        &self,
        dir: &Path,
        serial: Option<&str>,
        confirm: &mut dyn FnMut(&FlashPlan) -> Result<bool>,
        out: &mut dyn Write,
    ) -> Result<ExitCode> {
        let Some(device) = self.pick_fastboot(serial) else {
            writeln!(
                out,
                "{}",
                with(emoji::SEARCH, "No fastboot device found; reboot the handset to its bootloader")
            )?;
            return Ok(ExitCode::SUCCESS);
        };
        writeln!(
            out,
            "{}",
            with(emoji::FLASH, &format!("Flashing {} from {}", device.serial, dir.display()))
        )?;
        let report = self
            .orchestrator()
            .run(&device, dir, confirm)
            .with_context(|| format!("failed to flash from {}", dir.display()))?;
        print_report(&report, out)
    }

    fn pick_fastboot(&self, serial: Option<&str>) -> Option<Device> {
        self.scanner()
            .fastboot_devices()
            .into_iter()
            .find(|d| serial.map_or(true, |s| d.serial == s))
    }

    pub fn provision(
        &self,
        request: &ProvisionRequest,
        confirm: &mut dyn FnMut(&FlashPlan) -> Result<bool>,
        out: &mut dyn Write,
    ) -> Result<ExitCode> {
        let provisioner = Provisioner::new(self.hal.clone(), self.logger.clone(), &self.cfg)?;
        let mut bar = ui::progress::DownloadBar::new()?;
        let outcome = {
            let mut observer = bar.observer();
            provisioner.provision(request, confirm, &mut observer)
        };
        bar.finish();

        match outcome? {
            ProvisionOutcome::NoDevice => {
                let err = FlashToolError::TransportParseEmpty {
                    transport: "adb or fastboot".to_string(),
                };
                writeln!(out, "{}", with(emoji::SEARCH, &err.to_string()))?;
                Ok(ExitCode::SUCCESS)
            }
            ProvisionOutcome::BootloaderNotReached { serial } => {
                writeln!(
                    out,
                    "{}",
                    with(emoji::ERROR, &format!("{} never appeared in fastboot mode", serial))
                )?;
                Ok(ExitCode::FAILURE)
            }
            ProvisionOutcome::ManualExtractionRequired {
                archive,
                destination,
            } => {
                self.print_acquisition(
                    &Acquisition::ManualExtractionRequired {
                        archive,
                        destination,
                    },
                    out,
                )?;
                Ok(ExitCode::SUCCESS)
            }
            ProvisionOutcome::Flashed(report) => print_report(&report, out),
        }
    }

    pub fn preflight(&self, out: &mut dyn Write) -> Result<ExitCode> {
        let report = preflight::run(&self.cfg)?;
        for (tool, path) in report.tools {
            writeln!(out, "{} {} -> {}", emoji::SUCCESS, tool, path.display())?;
        }
        Ok(ExitCode::SUCCESS)
    }
}

/// Print the run summary. Aborted runs exit non-zero.
pub fn print_report(report: &FlashReport, out: &mut dyn Write) -> Result<ExitCode> {
    for attempt in &report.attempts {
        writeln!(
            out,
            "{:<14} {}",
            attempt.partition,
            attempt.outcome.as_str()
        )?;
    }
    for image in &report.skipped {
        writeln!(out, "{:<14} skipped ({})", "-", image.file_name)?;
    }
    let (line, code) = match &report.outcome {
        RunOutcome::Completed => (
            with(emoji::SUCCESS, "Flash complete; device rebooting"),
            ExitCode::SUCCESS,
        ),
        RunOutcome::NoImages => (
            with(emoji::SEARCH, "No flashable images found"),
            ExitCode::SUCCESS,
        ),
        RunOutcome::Aborted(reason) => (
            with(
                emoji::CANCEL,
                &format!("Aborted: {}", FlashToolError::from(reason)),
            ),
            ExitCode::FAILURE,
        ),
    };
    writeln!(out, "{}", line)?;
    Ok(code)
}
