//! Default paths for the delivery client
//!
//! Paths are user-writable by default:
//! - Config: `$XDG_CONFIG_HOME/delivery/config.toml` or `~/.config/delivery/config.toml`
//! - Data: `$XDG_DATA_HOME/delivery` or `~/.local/share/delivery`

use std::path::PathBuf;

/// Environment variable for overriding the config file
pub const DELIVERY_CONFIG_ENV: &str = "DELIVERY_CONFIG";

/// Environment variable for overriding the data directory
pub const DELIVERY_DATA_DIR_ENV: &str = "DELIVERY_DATA_DIR";

/// Store database filename within the data directory
pub const STORE_FILENAME: &str = "delivery.db";

/// Application subdirectory name
const APP_DIR: &str = "delivery";

/// Get the default config file path.
///
/// Order of precedence:
/// 1. `$DELIVERY_CONFIG` environment variable (if set)
/// 2. `$XDG_CONFIG_HOME/delivery/config.toml`
/// 3. `~/.config/delivery/config.toml`
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(DELIVERY_CONFIG_ENV) {
        return PathBuf::from(path);
    }

    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join("config.toml");
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join("config.toml");
    }

    PathBuf::from("/etc").join(APP_DIR).join("config.toml")
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$DELIVERY_DATA_DIR` environment variable (if set)
/// 2. `$XDG_DATA_HOME/delivery` (if XDG_DATA_HOME is set)
/// 3. `~/.local/share/delivery` (fallback)
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(DELIVERY_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// XDG data directory, ignoring `$DELIVERY_DATA_DIR`
fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    // Last resort
    PathBuf::from("/tmp").join(APP_DIR).join("data")
}
