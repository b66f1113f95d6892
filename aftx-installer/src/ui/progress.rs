//! Download progress bar.

use aftx_core::downloader::DownloadProgress;
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

pub struct DownloadBar {
    bar: ProgressBar,
    sized: bool,
}

impl DownloadBar {
    pub fn new() -> Result<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {bytes} ({bytes_per_sec})")?,
        );
        Ok(Self { bar, sized: false })
    }

    /// Switches from spinner to bar once the total size is known.
    pub fn update(&mut self, progress: DownloadProgress) -> Result<()> {
        if let (false, Some(total)) = (self.sized, progress.total) {
            self.bar.set_length(total);
            self.bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
                    .progress_chars("#>-"),
            );
            self.sized = true;
        }
        self.bar.set_position(progress.transferred);
        Ok(())
    }

    pub fn finish(&self) {
        self.bar.finish_with_message("done");
    }

    pub fn observer(&mut self) -> impl FnMut(DownloadProgress) + '_ {
        move |progress| {
            if let Err(err) = self.update(progress) {
                log::debug!("progress bar: {}", err);
            }
        }
    }
}
