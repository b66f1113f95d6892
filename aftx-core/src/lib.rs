//! 📱 aftx core library.
//!
//! `aftx-core` holds the building blocks of the flasher: configuration, device discovery,
//! bundle download and extraction, partition classification and the action log. The flash
//! state machine itself lives in `aftx-workflow`.

pub mod action_log;
pub mod cli;
pub mod commands;
pub mod config;
pub mod device;
pub mod device_report;
pub mod download_manager;
pub mod downloader;
pub mod errors;
pub mod extract;
pub mod logging;
pub mod outcome;
pub mod partition;
pub mod preflight;

#[cfg(test)]
mod test_env;
