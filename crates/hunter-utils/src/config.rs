//! Environment and application metadata helpers

use serde::{Deserialize, Serialize};

/// Static application metadata shown in banners and logs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppInfo {
    /// Application name
    pub app_name: String,
    /// Application version
    pub version: String,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            app_name: "ai-hunter".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Load a `.env` file from the current directory or its parents.
///
/// Returns the path that was loaded, if any. A missing file is not an error.
pub fn load_dotenv() -> Option<std::path::PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::debug!("loaded environment from {}", path.display());
            Some(path)
        }
        Err(e) if e.not_found() => None,
        Err(e) => {
            tracing::warn!("failed to parse .env file: {e}");
            None
        }
    }
}

/// Read a boolean flag from the environment (`1/true/yes/on`, case-insensitive)
pub fn env_bool(key: &str) -> Option<bool> {
    let value = std::env::var(key).ok()?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Read an unsigned integer from the environment
pub fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.trim().parse().ok()
}
