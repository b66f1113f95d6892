use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Identifying properties read from a device over ADB.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDetails {
    pub serial: String,
    pub model: String,
    pub brand: String,
    pub device: String,
    pub android_version: String,
    pub sdk_version: String,
}

impl DeviceDetails {
    pub fn rows(&self) -> [(&'static str, &str); 6] {
        [
            ("Serial", &self.serial),
            ("Model", &self.model),
            ("Brand", &self.brand),
            ("Device", &self.device),
            ("Android Version", &self.android_version),
            ("SDK Version", &self.sdk_version),
        ]
    }

    pub fn render(&self) -> String {
        self.rows()
            .iter()
            .map(|(label, value)| format!("{}: {}\n", label, value))
            .collect()
    }

    pub fn write_details(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(path, self.render())
            .with_context(|| format!("failed to write {}", path.display()))
    }
}
