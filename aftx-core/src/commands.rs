//! Command lines for the device transport tools.
//!
//! Only this module knows the adb/fastboot argument syntax; everything else asks it for a
//! [`CommandLine`] and hands that to the process runner.

use crate::config::AppConfig;
use aftx_hal::CommandLine;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportCommands {
    adb: String,
    fastboot: String,
    list_timeout: Option<Duration>,
    flash_timeout: Option<Duration>,
    reboot_timeout: Option<Duration>,
    shell_timeout: Option<Duration>,
}

impl TransportCommands {
    pub fn new(cfg: &AppConfig) -> Self {
        Self {
            adb: cfg.tools.adb.clone(),
            fastboot: cfg.tools.fastboot.clone(),
            list_timeout: cfg.timeouts.list(),
            flash_timeout: cfg.timeouts.flash(),
            reboot_timeout: cfg.timeouts.reboot(),
            shell_timeout: cfg.timeouts.shell(),
        }
    }

    pub fn adb_program(&self) -> &str {
        &self.adb
    }

    pub fn fastboot_program(&self) -> &str {
        &self.fastboot
    }

    pub fn adb_devices(&self) -> CommandLine {
        CommandLine::new(&self.adb)
            .arg("devices")
            .timeout(self.list_timeout)
    }

    pub fn fastboot_devices(&self) -> CommandLine {
        CommandLine::new(&self.fastboot)
            .arg("devices")
            .timeout(self.list_timeout)
    }

    /// `fastboot -s SERIAL flash PARTITION IMAGE`
    pub fn flash(&self, serial: &str, partition: &str, image: &Path) -> CommandLine {
        CommandLine::new(&self.fastboot)
            .args(["-s", serial, "flash", partition])
            .arg(image.to_string_lossy())
            .timeout(self.flash_timeout)
    }

    /// `fastboot -s SERIAL reboot`
    pub fn reboot(&self, serial: &str) -> CommandLine {
        CommandLine::new(&self.fastboot)
            .args(["-s", serial, "reboot"])
            .timeout(self.reboot_timeout)
    }

    pub fn getprop(&self, serial: &str, key: &str) -> CommandLine {
        CommandLine::new(&self.adb)
            .args(["-s", serial, "shell", "getprop", key])
            .timeout(self.shell_timeout)
    }

    pub fn reboot_bootloader(&self, serial: &str) -> CommandLine {
        CommandLine::new(&self.adb)
            .args(["-s", serial, "reboot", "bootloader"])
            .timeout(self.reboot_timeout)
    }
}

impl Default for TransportCommands {
    fn default() -> Self {
        Self::new(&AppConfig::default())
    }
}
