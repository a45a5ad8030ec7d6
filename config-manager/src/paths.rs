use std::path::PathBuf;

use crate::error::ConfigError;

/// Get XDG config directory for the emulator
/// Returns ~/.config/onvif-emulator or $XDG_CONFIG_HOME/onvif-emulator
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|p| p.join("onvif-emulator"))
        .ok_or(ConfigError::NoConfigDir)
}

/// Get default config file path
/// Returns ~/.config/onvif-emulator/emulator.toml
pub fn emulator_config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("emulator.toml"))
}

/// Ensure config directory exists, creating it if necessary.
/// On Unix, sets directory permissions to 0700 (owner only).
pub fn ensure_config_dir() -> Result<PathBuf, ConfigError> {
    let dir = config_dir()?;
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            std::fs::set_permissions(&dir, perms)?;
        }
    }
    Ok(dir)
}
