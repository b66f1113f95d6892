//! Serializes tests that touch `AFTX_*` environment variables.

use once_cell::sync::Lazy;
use std::sync::{Mutex, MutexGuard};

static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub struct EnvLockGuard(#[allow(dead_code)] MutexGuard<'static, ()>);

/// Hold the returned guard for as long as the test reads or writes the environment.
pub fn lock() -> EnvLockGuard {
    EnvLockGuard(ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
}
