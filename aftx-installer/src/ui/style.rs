//! Emoji prefixes shared by the command output.

pub mod emoji {
    pub const DEVICE: &str = "📱";
    pub const DOWNLOAD: &str = "⬇️";
    pub const FLASH: &str = "⚡";
    pub const SEARCH: &str = "🔍";
    pub const SUCCESS: &str = "✅";
    pub const WARNING: &str = "⚠️";
    pub const ERROR: &str = "❌";
    pub const CANCEL: &str = "🛑";
}

/// `"<emoji> <message>"`
pub fn with(emoji: &str, message: &str) -> String {
    format!("{emoji} {message}")
}
