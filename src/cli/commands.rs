//! Subcommand handlers for config actions.

use std::path::Path;

use super::args::ConfigAction;
use crate::config::{default_cache_root, default_path, Config, ConfigError};

/// Contents written by `config init`.
pub fn default_config_toml() -> &'static str {
    r#"# termcine configuration

[playback]
# Display frame rate, 1-120 (default: the video's own rate)
# fps = 15
# Skip frames to catch up when rendering falls behind
skip = true
# Show the measured frame rate in the top-right corner
debug = false
# Wait for a key press before playback starts
wait_for_key = true

[render]
# Color: off, ansi8, ansi256
color = "off"
# Glyph ramp: standard, classic, detailed, blocks
charset = "standard"
# Invert brightness (for light themes)
invert = false

[cache]
# Frame caches, downloads and termcine.log (default: the user cache dir)
# dir = "/path/to/cache"

[audio]
mute = false
"#
}

/// Handle config subcommand actions.
pub fn handle_config_action(action: ConfigAction, path: Option<&Path>) -> Result<(), ConfigError> {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(default_path);

    match action {
        ConfigAction::Show => {
            let config = Config::load(Some(&config_path))?;
            let rendered = toml::to_string_pretty(&config)
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;

            println!("Current configuration:");
            println!();
            println!("{}", rendered.trim_end());
            println!();
            if config_path.exists() {
                println!("Config file: {} (exists)", config_path.display());
            } else {
                println!("Config file: {} (not found)", config_path.display());
            }
            println!(
                "Cache directory: {}",
                config
                    .cache
                    .dir
                    .clone()
                    .unwrap_or_else(default_cache_root)
                    .display()
            );
            Ok(())
        }
        ConfigAction::Init => {
            if config_path.exists() {
                return Err(ConfigError::Invalid(format!(
                    "config file already exists: {} (use 'termcine config show' to view it)",
                    config_path.display()
                )));
            }

            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }

            std::fs::write(&config_path, default_config_toml()).map_err(|e| ConfigError::IoError {
                path: config_path.clone(),
                source: e,
            })?;

            println!("Created config file: {}", config_path.display());
            Ok(())
        }
    }
}
