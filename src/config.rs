// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Every section has defaults, so a missing file or a partial one is fine.

use anyhow::{Context, Result};
use ash::vk;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use vulkan_context::{ContextSettings, NativeWindow, Requirements};

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub device: DeviceConfig,
    pub debug: DebugConfig,
    pub shaders: ShaderConfig,
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan Context".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// What the selected GPU must provide
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub presentation: bool,
    pub graphics_queue: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            presentation: true,
            graphics_queue: true,
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
            log_level: "info".to_string(),
        }
    }
}

/// Precompiled SPIR-V for the demo pipeline. Both must be set for a
/// pipeline to be built.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ShaderConfig {
    pub vertex: Option<PathBuf>,
    pub fragment: Option<PathBuf>,
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load() -> Self {
        Self::load_from_path("config.toml").unwrap_or_else(|e| {
            log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Device requirements, with the window when presentation is on
    pub fn requirements(&self, window: Option<NativeWindow>) -> Requirements {
        Requirements {
            needs_presentation: self.device.presentation,
            needs_graphics_queue: self.device.graphics_queue,
            window: if self.device.presentation { window } else { None },
        }
    }

    /// Validation is only ever enabled in debug builds
    pub fn context_settings(&self) -> ContextSettings {
        ContextSettings {
            app_name: self.window.title.clone(),
            enable_validation: cfg!(debug_assertions) && self.debug.validation_layers,
            fallback_extent: vk::Extent2D {
                width: self.window.width,
                height: self.window.height,
            },
        }
    }

    /// Both shader paths, if configured
    pub fn shader_paths(&self) -> Option<(&Path, &Path)> {
        match (&self.shaders.vertex, &self.shaders.fragment) {
            (Some(vertex), Some(fragment)) => Some((vertex.as_path(), fragment.as_path())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 720);
        assert!(config.device.presentation);
        assert!(config.device.graphics_queue);
        assert_eq!(config.debug.log_level, "info");
        assert!(config.shader_paths().is_none());
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::parse(
            r#"
            [window]
            title = "Triangle"
            width = 640

            [device]
            presentation = false

            [shaders]
            vertex = "shaders/tri.vert.spv"
            fragment = "shaders/tri.frag.spv"
            "#,
        )
        .unwrap();

        assert_eq!(config.window.title, "Triangle");
        assert_eq!(config.window.width, 640);
        assert_eq!(config.window.height, 720);
        assert!(!config.device.presentation);
        assert!(config.device.graphics_queue);

        let (vertex, fragment) = config.shader_paths().unwrap();
        assert_eq!(vertex, Path::new("shaders/tri.vert.spv"));
        assert_eq!(fragment, Path::new("shaders/tri.frag.spv"));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(Config::parse("[window\nwidth = ").is_err());
        assert!(Config::parse("[window]\nwidth = \"wide\"").is_err());
    }

    #[test]
    fn test_requirements_bridge() {
        let mut config = Config::default();
        let requirements = config.requirements(None);
        assert!(requirements.needs_presentation);
        assert!(requirements.window.is_none());

        config.device.presentation = false;
        config.device.graphics_queue = false;
        let requirements = config.requirements(None);
        assert!(!requirements.needs_presentation);
        assert!(!requirements.needs_graphics_queue);
    }

    #[test]
    fn test_context_settings_bridge() {
        let mut config = Config::default();
        config.window.title = "Demo".to_string();
        config.window.width = 800;
        config.window.height = 600;
        config.debug.validation_layers = false;

        let settings = config.context_settings();
        assert_eq!(settings.app_name, "Demo");
        assert_eq!(settings.fallback_extent.width, 800);
        assert_eq!(settings.fallback_extent.height, 600);
        assert!(!settings.enable_validation);
    }
}
